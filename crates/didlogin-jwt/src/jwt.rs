//! Compact JWT signing, verification and unverified claim inspection.
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use didlogin_core::message::{MessageType, ValidationError};
use josekit::jwk::Jwk;
use josekit::jws::{JwsHeader, ES256K};
use josekit::jwt::{self, JwtPayload};
use josekit::JoseError;
use serde_json::{Map, Value};
use ssi::jwk::JWK;
use thiserror::Error;

/// An error signing or verifying a JWT.
#[derive(Error, Debug)]
pub enum JwtError {
    /// Key could not be converted for the JWS signer.
    #[error("Unusable key: {0}")]
    Key(#[from] serde_json::Error),
    /// Wrapped jose error.
    #[error("Wrapped jose error: {0}")]
    Jose(#[from] JoseError),
}

/// Converts key from ssi JWK into josekit Jwk.
pub fn ssi_to_josekit_jwk(key: &JWK) -> Result<Jwk, serde_json::Error> {
    serde_json::from_value(serde_json::to_value(key)?)
}

/// Signs a payload with an ES256K secret key.
pub fn sign(payload: &JwtPayload, secret_key: &JWK) -> Result<String, JwtError> {
    let mut header = JwsHeader::new();
    header.set_token_type("JWT");
    let signer = ES256K.signer_from_jwk(&ssi_to_josekit_jwk(secret_key)?)?;
    Ok(jwt::encode_with_signer(payload, &header, &signer)?)
}

/// Verifies the signature of a compact JWT and returns its payload.
pub fn verify(input: &str, public_key: &JWK) -> Result<JwtPayload, JwtError> {
    let verifier = ES256K.verifier_from_jwk(&ssi_to_josekit_jwk(public_key)?)?;
    let (payload, _) = jwt::decode_with_verifier(input, &verifier)?;
    Ok(payload)
}

/// Decodes the claims of a compact JWT without checking its signature.
pub fn decode_unverified(input: &str) -> Result<Map<String, Value>, ValidationError> {
    let mut parts = input.split('.');
    let (Some(_), Some(payload), Some(_), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(ValidationError::MalformedMessage(
            "expected a compact JWT".to_string(),
        ));
    };
    let bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|err| ValidationError::MalformedMessage(err.to_string()))?;
    match serde_json::from_slice(&bytes) {
        Ok(Value::Object(claims)) => Ok(claims),
        Ok(_) => Err(ValidationError::MalformedMessage(
            "JWT payload is not an object".to_string(),
        )),
        Err(err) => Err(ValidationError::MalformedMessage(err.to_string())),
    }
}

/// String valued claim.
pub fn claim_str<'a>(claims: &'a Map<String, Value>, name: &str) -> Option<&'a str> {
    claims.get(name).and_then(Value::as_str)
}

/// The `aud` claim, either a string or the first entry of an array.
pub fn audience(claims: &Map<String, Value>) -> Option<String> {
    match claims.get("aud") {
        Some(Value::String(aud)) => Some(aud.to_owned()),
        Some(Value::Array(auds)) => auds.first().and_then(Value::as_str).map(str::to_owned),
        _ => None,
    }
}

/// Classifies a JWT by its claims.
pub fn message_type(claims: &Map<String, Value>) -> Option<MessageType> {
    if claims.contains_key("vp") {
        Some(MessageType::VerifiablePresentation)
    } else if claims.contains_key("vc") {
        Some(MessageType::VerifiableCredential)
    } else if claim_str(claims, "type") == Some("sdr") {
        Some(MessageType::SelectiveDisclosureRequest)
    } else {
        None
    }
}
