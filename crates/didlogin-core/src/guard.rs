//! Access decisions for protected views.
use crate::session::Session;
use crate::LOGIN_ROUTE;

/// Result of guarding a protected view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
    /// The session is authenticated as the contained DID.
    Allow(String),
    /// The request must be redirected to the contained route.
    Redirect(&'static str),
}

/// Allows a session iff it exists and carries a DID.
pub fn guard(session: Option<&Session>) -> Access {
    match session.and_then(|session| session.did.as_ref()) {
        Some(did) => Access::Allow(did.to_owned()),
        None => Access::Redirect(LOGIN_ROUTE),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard() {
        assert_eq!(guard(None), Access::Redirect("/login"));

        let mut session = Session::new("sess-123");
        assert_eq!(guard(Some(&session)), Access::Redirect("/login"));

        session.views = 10;
        assert_eq!(guard(Some(&session)), Access::Redirect("/login"));

        session.did = Some("did:example:abc".to_string());
        assert_eq!(
            guard(Some(&session)),
            Access::Allow("did:example:abc".to_string())
        );
    }
}
