//! User-facing re-authorization prompts.
//!
//! Callers never show a [`VaultError`] to the tenant. Every failure that
//! needs a fresh authorization maps to the same [`ReauthPrompt`] so an
//! attacker cannot tell which check rejected them; the distinction lives
//! only in the audit trail.

use url::Url;

use crate::credential::TenantIdentity;
use crate::error::{Result, VaultError};

/// The one message shown for every re-authorization case.
pub const REAUTH_MESSAGE: &str =
    "We couldn't access your connected account. Please authorize again to continue.";

/// A generic message plus a personalized authorization link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReauthPrompt {
    pub message: String,
    pub authorize_url: Url,
}

impl ReauthPrompt {
    /// Build the prompt for `identity` against the service at `base_url`.
    ///
    /// The link is `<base>/authorize?user=<identity>`, with the identity
    /// percent-encoded.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Configuration`] if `base_url` cannot carry a
    /// path (`mailto:`, `data:` and similar).
    pub fn new(base_url: &Url, identity: &TenantIdentity) -> Result<Self> {
        let mut authorize_url = base_url.clone();
        authorize_url.set_query(None);
        authorize_url.set_fragment(None);
        authorize_url
            .path_segments_mut()
            .map_err(|()| VaultError::Configuration {
                reason: format!("base url {base_url} cannot hold an authorize path"),
            })?
            .pop_if_empty()
            .push("authorize");
        authorize_url
            .query_pairs_mut()
            .append_pair("user", identity.as_str());

        Ok(Self {
            message: REAUTH_MESSAGE.to_string(),
            authorize_url,
        })
    }

    /// The prompt for `err`, or `None` when the error is not something the
    /// tenant can fix by authorizing again (configuration, storage faults).
    ///
    /// # Errors
    ///
    /// Fails like [`ReauthPrompt::new`] on an unusable `base_url`.
    pub fn for_error(
        err: &VaultError,
        base_url: &Url,
        identity: &TenantIdentity,
    ) -> Result<Option<Self>> {
        if !err.requires_reauthorization() {
            return Ok(None);
        }
        Self::new(base_url, identity).map(Some)
    }
}

impl std::fmt::Display for ReauthPrompt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.message, self.authorize_url)
    }
}

#[cfg(test)]
mod tests {
    use keyward_store::StoreError;

    use super::*;
    use crate::error::CsrfError;

    fn base() -> Url {
        Url::parse("https://app.example.com").unwrap()
    }

    #[test]
    fn link_is_personalized_and_encoded() {
        let prompt = ReauthPrompt::new(&base(), &"alice+work@example.com".into()).unwrap();
        assert_eq!(
            prompt.authorize_url.as_str(),
            "https://app.example.com/authorize?user=alice%2Bwork%40example.com"
        );
    }

    #[test]
    fn base_path_is_kept() {
        let base = Url::parse("https://example.com/mail/?stale=1#top").unwrap();
        let prompt = ReauthPrompt::new(&base, &"bob@example.com".into()).unwrap();
        assert_eq!(
            prompt.authorize_url.as_str(),
            "https://example.com/mail/authorize?user=bob%40example.com"
        );
    }

    #[test]
    fn every_reauth_error_gets_the_same_message() {
        let identity = TenantIdentity::from("alice@example.com");
        let errors = [
            VaultError::NotFound,
            VaultError::MalformedData {
                reason: "bad json".into(),
            },
            VaultError::SessionValidation,
            VaultError::Decryption {
                reason: "tag".into(),
            },
            VaultError::Ownership {
                expected: "alice@example.com".into(),
                actual: "mallory@example.com".into(),
            },
            VaultError::Csrf(CsrfError::Expired),
        ];

        for err in &errors {
            let prompt = ReauthPrompt::for_error(err, &base(), &identity)
                .unwrap()
                .unwrap();
            assert_eq!(prompt.message, REAUTH_MESSAGE);
            assert!(!prompt.to_string().contains("mallory"));
        }
    }

    #[test]
    fn infrastructure_errors_get_no_prompt() {
        let identity = TenantIdentity::from("alice@example.com");
        let errors = [
            VaultError::Configuration {
                reason: "short key".into(),
            },
            VaultError::Entropy,
            VaultError::Store(StoreError::InvalidArgument("empty key".into())),
        ];
        for err in &errors {
            assert!(
                ReauthPrompt::for_error(err, &base(), &identity)
                    .unwrap()
                    .is_none()
            );
        }
    }

    #[test]
    fn base_without_path_is_rejected() {
        let base = Url::parse("mailto:support@example.com").unwrap();
        let identity = TenantIdentity::from("alice@example.com");

        assert!(matches!(
            ReauthPrompt::new(&base, &identity),
            Err(VaultError::Configuration { .. })
        ));
        assert!(matches!(
            ReauthPrompt::for_error(&VaultError::NotFound, &base, &identity),
            Err(VaultError::Configuration { .. })
        ));
    }
}
