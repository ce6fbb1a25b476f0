//! DID resolution over `ssi` resolvers and documents.
use ssi::did::{Document, Service, ServiceEndpoint, VerificationMethod};
use ssi::did_resolve::{
    DIDResolver, DocumentMetadata, ResolutionInputMetadata, ResolutionMetadata,
};
use ssi::jwk::JWK;
use ssi::one_or_many::OneOrMany;
use thiserror::Error;

/// DID resolution error code for a malformed DID.
pub const ERROR_INVALID_DID: &str = "invalidDid";
/// DID resolution error code for a DID without a document.
pub const ERROR_NOT_FOUND: &str = "notFound";
/// DID resolution error code for a DID method the resolver does not handle.
pub const ERROR_METHOD_NOT_SUPPORTED: &str = "methodNotSupported";

/// The output of `DIDResolver::resolve`.
pub type ResolverResult = (
    ResolutionMetadata,
    Option<Document>,
    Option<DocumentMetadata>,
);

/// An error relating to DID resolution.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ResolverError {
    /// DID method is not supported by the resolver.
    #[error("Unsupported DID method: {0}")]
    UnsupportedMethod(String),
    /// DID string is malformed.
    #[error("Invalid DID: {0}")]
    InvalidDID(String),
    /// DID document has no usable verification key.
    #[error("No verification key in DID document: {0}")]
    MissingVerificationKey(String),
    /// DID does not exist.
    #[error("DID: {0} does not exist.")]
    NonExistentDID(String),
    /// Resolution failed with another error code.
    #[error("DID resolution failed for {0}: {1}")]
    Failed(String, String),
}

impl ResolverError {
    /// DID resolution error code reported in resolution metadata.
    pub fn error_code(&self) -> &str {
        match self {
            ResolverError::UnsupportedMethod(_) => ERROR_METHOD_NOT_SUPPORTED,
            ResolverError::InvalidDID(_) | ResolverError::MissingVerificationKey(_) => {
                ERROR_INVALID_DID
            }
            ResolverError::NonExistentDID(_) => ERROR_NOT_FOUND,
            ResolverError::Failed(_, code) => code,
        }
    }

    fn from_error_code(code: &str, did: &str) -> Self {
        match code {
            ERROR_METHOD_NOT_SUPPORTED => ResolverError::UnsupportedMethod(
                did_method(did).map_or(did, |(method, _)| method).to_owned(),
            ),
            ERROR_INVALID_DID => ResolverError::InvalidDID(did.to_owned()),
            ERROR_NOT_FOUND => ResolverError::NonExistentDID(did.to_owned()),
            other => ResolverError::Failed(did.to_owned(), other.to_owned()),
        }
    }
}

/// Resolution output for a document.
pub fn resolved(document: Document) -> ResolverResult {
    let metadata = ResolutionMetadata {
        error: None,
        content_type: None,
        property_set: None,
    };
    (metadata, Some(document), None)
}

/// Resolution output for a failed resolution.
pub fn resolution_failure(err: &ResolverError) -> ResolverResult {
    (ResolutionMetadata::from_error(err.error_code()), None, None)
}

/// Resolves a DID with any resolver, turning resolution metadata errors into `ResolverError`.
pub async fn resolve_as_result<R: DIDResolver + ?Sized>(
    resolver: &R,
    did: &str,
) -> Result<Document, ResolverError> {
    let (metadata, document, _) = resolver
        .resolve(did, &ResolutionInputMetadata::default())
        .await;
    if let Some(code) = metadata.error {
        return Err(ResolverError::from_error_code(&code, did));
    }
    document.ok_or_else(|| ResolverError::NonExistentDID(did.to_owned()))
}

/// Public JWK of the first verification method carrying one.
pub fn document_key(document: &Document) -> Result<JWK, ResolverError> {
    document
        .verification_method
        .iter()
        .flatten()
        .find_map(|vm| match vm {
            VerificationMethod::Map(vm_map) => vm_map.get_jwk().ok(),
            _ => None,
        })
        .ok_or_else(|| ResolverError::MissingVerificationKey(document.id.to_owned()))
}

fn has_type(types: &OneOrMany<String>, service_type: &str) -> bool {
    match types {
        OneOrMany::One(type_) => type_ == service_type,
        OneOrMany::Many(types) => types.iter().any(|type_| type_ == service_type),
    }
}

fn endpoint_uri(endpoint: &ServiceEndpoint) -> Option<String> {
    match endpoint {
        ServiceEndpoint::URI(uri) => Some(uri.to_owned()),
        _ => None,
    }
}

/// URI of the first service of `service_type` in a document.
pub fn service_endpoint(document: &Document, service_type: &str) -> Option<String> {
    document
        .service
        .iter()
        .flatten()
        .filter(|service| has_type(&service.type_, service_type))
        .find_map(|service| match &service.service_endpoint {
            Some(OneOrMany::One(endpoint)) => endpoint_uri(endpoint),
            Some(OneOrMany::Many(endpoints)) => endpoints.iter().find_map(endpoint_uri),
            None => None,
        })
}

/// A service entry with a single URI endpoint.
pub fn uri_service(id: &str, service_type: &str, uri: &str) -> Service {
    Service {
        id: id.to_owned(),
        type_: OneOrMany::One(service_type.to_owned()),
        service_endpoint: Some(OneOrMany::One(ServiceEndpoint::URI(uri.to_owned()))),
        property_set: None,
    }
}

/// Splits a DID into its method and method-specific identifier.
pub fn did_method(did: &str) -> Result<(&str, &str), ResolverError> {
    let rest = did
        .strip_prefix("did:")
        .ok_or_else(|| ResolverError::InvalidDID(did.to_owned()))?;
    match rest.split_once(':') {
        Some((method, id)) if !method.is_empty() && !id.is_empty() => Ok((method, id)),
        _ => Err(ResolverError::InvalidDID(did.to_owned())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use mockall::mock;
    use serde_json::json;

    mock! {
        pub Resolver {}
        #[async_trait]
        impl DIDResolver for Resolver {
            async fn resolve(
                &self,
                did: &str,
                input_metadata: &ResolutionInputMetadata,
            ) -> (ResolutionMetadata, Option<Document>, Option<DocumentMetadata>);
        }
    }

    fn document(value: serde_json::Value) -> Document {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_did_method() {
        assert_eq!(did_method("did:example:abc"), Ok(("example", "abc")));
        assert_eq!(did_method("did:jwk:eyJ:x"), Ok(("jwk", "eyJ:x")));
        assert!(did_method("example:abc").is_err());
        assert!(did_method("did:example").is_err());
        assert!(did_method("did::abc").is_err());
    }

    #[test]
    fn test_missing_key() {
        let document = document(json!({
            "@context": "https://www.w3.org/ns/did/v1",
            "id": "did:example:abc"
        }));
        assert_eq!(
            document_key(&document).unwrap_err(),
            ResolverError::MissingVerificationKey(
                "did:example:abc".to_string()
            )
        );
    }

    #[test]
    fn test_service_endpoint() {
        let mut document = document(json!({
            "@context": "https://www.w3.org/ns/did/v1",
            "id": "did:example:abc"
        }));
        assert_eq!(service_endpoint(&document, "Messaging"), None);
        document.service = Some(vec![
            uri_service("did:example:abc#other", "Other", "https://example.com/other"),
            uri_service(
                "did:example:abc#messaging",
                "Messaging",
                "https://example.com/handle-message",
            ),
        ]);
        assert_eq!(
            service_endpoint(&document, "Messaging").as_deref(),
            Some("https://example.com/handle-message")
        );
    }

    #[tokio::test]
    async fn test_resolve_as_result_maps_error_codes() {
        let mut resolver = MockResolver::new();
        resolver.expect_resolve().returning(|did, _| match did {
            "did:example:abc" => resolved(document(json!({
                "@context": "https://www.w3.org/ns/did/v1",
                "id": "did:example:abc"
            }))),
            "did:other:abc" => resolution_failure(&ResolverError::UnsupportedMethod(
                "other".to_string(),
            )),
            "did:example:gone" => (ResolutionMetadata::from_error(ERROR_NOT_FOUND), None, None),
            _ => (ResolutionMetadata::from_error("internalError"), None, None),
        });

        let document = resolve_as_result(&resolver, "did:example:abc").await.unwrap();
        assert_eq!(document.id, "did:example:abc");
        assert_eq!(
            resolve_as_result(&resolver, "did:other:abc")
                .await
                .unwrap_err(),
            ResolverError::UnsupportedMethod("other".to_string())
        );
        assert_eq!(
            resolve_as_result(&resolver, "did:example:gone")
                .await
                .unwrap_err(),
            ResolverError::NonExistentDID("did:example:gone".to_string())
        );
        assert_eq!(
            resolve_as_result(&resolver, "did:example:broken")
                .await
                .unwrap_err(),
            ResolverError::Failed(
                "did:example:broken".to_string(),
                "internalError".to_string()
            )
        );
    }
}
