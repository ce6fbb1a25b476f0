//! W3C credentials and presentations embedded in JWTs.
use chrono::Utc;
use serde_json::{json, Map, Value};
use ssi::one_or_many::OneOrMany;
use ssi::vc::{Credential, CredentialOrJWT, Issuer, Presentation, VCDateTime, URI};
use thiserror::Error;

/// Base context of W3C verifiable credentials.
pub const CREDENTIALS_V1_CONTEXT: &str = "https://www.w3.org/2018/credentials/v1";

/// An error building a credential.
#[derive(Error, Debug)]
pub enum CredentialError {
    #[error("Invalid credential: {0}")]
    Invalid(#[from] serde_json::Error),
}

/// A `VerifiableCredential` with the given subject claims.
pub fn credential(claims: Map<String, Value>) -> Result<Credential, CredentialError> {
    Ok(serde_json::from_value(json!({
        "@context": [CREDENTIALS_V1_CONTEXT],
        "type": ["VerifiableCredential"],
        "credentialSubject": claims,
    }))?)
}

/// A credential with a single subject claim.
pub fn credential_with_claim(
    name: &str,
    value: impl Into<Value>,
) -> Result<Credential, CredentialError> {
    let mut claims = Map::new();
    claims.insert(name.to_owned(), value.into());
    credential(claims)
}

/// Sets the issuer, subject id and issuance date of a credential.
pub fn bind_credential(credential: &mut Credential, issuer: &str, subject: &str) {
    credential.issuer = Some(Issuer::URI(URI::String(issuer.to_owned())));
    credential.issuance_date = Some(VCDateTime::from(Utc::now()));
    match credential.credential_subject {
        OneOrMany::One(ref mut cs) => cs.id = Some(URI::String(subject.to_owned())),
        OneOrMany::Many(ref mut subjects) => subjects
            .iter_mut()
            .for_each(|cs| cs.id = Some(URI::String(subject.to_owned()))),
    }
}

/// A `VerifiablePresentation` of credentials given as compact JWTs.
pub fn presentation(jwts: Vec<String>) -> Presentation {
    Presentation {
        verifiable_credential: Some(OneOrMany::Many(
            jwts.into_iter().map(CredentialOrJWT::JWT).collect(),
        )),
        ..Default::default()
    }
}

/// Value of a claim in the first subject carrying it.
pub fn subject_claim<'a>(credential: &'a Credential, name: &str) -> Option<&'a Value> {
    let claim = |cs: &'a ssi::vc::CredentialSubject| {
        cs.property_set.as_ref().and_then(|claims| claims.get(name))
    };
    match &credential.credential_subject {
        OneOrMany::One(cs) => claim(cs),
        OneOrMany::Many(subjects) => subjects.iter().find_map(claim),
    }
}
