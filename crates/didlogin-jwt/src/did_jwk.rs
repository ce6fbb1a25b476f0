//! `did:jwk` identifiers: a DID embedding its public key.
use crate::DID_JWK_KEY_FRAGMENT;
use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use didlogin_core::resolver::{
    did_method, resolution_failure, resolved, ResolverError, ResolverResult,
};
use serde_json::json;
use ssi::did::Document;
use ssi::did_resolve::{DIDResolver, ResolutionInputMetadata};
use ssi::jwk::JWK;

const DID_JWK_METHOD: &str = "jwk";
const DID_CONTEXT: &str = "https://www.w3.org/ns/did/v1";
const JWK_2020_CONTEXT: &str = "https://w3id.org/security/suites/jws-2020/v1";

/// Returns true if the JWK carries private key material.
pub fn is_private(key: &JWK) -> bool {
    serde_json::to_value(key)
        .ok()
        .and_then(|value| value.get("d").cloned())
        .is_some()
}

/// Derives the `did:jwk` DID of a public key.
pub fn did_from_jwk(public_key: &JWK) -> Result<String, ResolverError> {
    if is_private(public_key) {
        return Err(ResolverError::InvalidDID(
            "private key material must not be embedded in a DID".to_string(),
        ));
    }
    let json = serde_json::to_string(public_key)
        .map_err(|err| ResolverError::InvalidDID(err.to_string()))?;
    Ok(format!("did:jwk:{}", URL_SAFE_NO_PAD.encode(json)))
}

/// Extracts the public key embedded in a `did:jwk` DID.
pub fn jwk_from_did(did: &str) -> Result<JWK, ResolverError> {
    let (method, id) = did_method(did)?;
    if method != DID_JWK_METHOD {
        return Err(ResolverError::UnsupportedMethod(method.to_owned()));
    }
    let bytes = URL_SAFE_NO_PAD
        .decode(id)
        .map_err(|_| ResolverError::InvalidDID(did.to_owned()))?;
    let key: JWK =
        serde_json::from_slice(&bytes).map_err(|_| ResolverError::InvalidDID(did.to_owned()))?;
    if is_private(&key) {
        return Err(ResolverError::InvalidDID(did.to_owned()));
    }
    Ok(key)
}

/// Builds the DID document of a `did:jwk` DID.
pub fn resolve_document(did: &str) -> Result<Document, ResolverError> {
    let key = jwk_from_did(did)?;
    let key_id = format!("{did}{DID_JWK_KEY_FRAGMENT}");
    serde_json::from_value(json!({
        "@context": [DID_CONTEXT, JWK_2020_CONTEXT],
        "id": did,
        "verificationMethod": [{
            "id": key_id,
            "type": "JsonWebKey2020",
            "controller": did,
            "publicKeyJwk": key,
        }],
        "authentication": [key_id],
        "assertionMethod": [key_id],
    }))
    .map_err(|_| ResolverError::InvalidDID(did.to_owned()))
}

/// Resolver for `did:jwk` DIDs. Needs no network access.
#[derive(Debug, Clone, Copy, Default)]
pub struct DIDJwkResolver;

#[async_trait]
impl DIDResolver for DIDJwkResolver {
    async fn resolve(
        &self,
        did: &str,
        _input_metadata: &ResolutionInputMetadata,
    ) -> ResolverResult {
        match resolve_document(did) {
            Ok(document) => resolved(document),
            Err(err) => resolution_failure(&err),
        }
    }
}
