//! Lifecycle configuration.

use crate::{CapabilityRequest, ResourceId, SignInMessage};
use pkp_common::time::{Duration, SystemTime, unix_seconds};
use pkp_credentials::Did;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Longest session lifetime accepted from configuration: one year.
pub const MAX_SESSION_TTL_SECONDS: u64 = 366 * 24 * 60 * 60;

/// Errors raised while loading [`Settings`].
#[derive(Debug, Error)]
pub enum SettingsError {
    /// The document is not valid settings JSON.
    #[error("Invalid settings: {0}")]
    Parse(#[from] serde_json::Error),

    /// The session lifetime is zero or longer than
    /// [`MAX_SESSION_TTL_SECONDS`].
    #[error("Session lifetime of {0} seconds is out of range")]
    SessionTtl(u64),
}

/// Settings shared by every lifecycle operation.
///
/// Every field has a default, so a partial JSON document only overrides what
/// it names:
///
/// ```
/// use pkp_auth::Settings;
///
/// let settings = Settings::from_json(r#"{ "network": "datil-test" }"#).unwrap();
/// assert_eq!(settings.network, "datil-test");
/// assert_eq!(settings.chain, "ethereum");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Name of the node network.
    pub network: String,
    /// Chain that wallet sign-ins refer to.
    pub chain: String,
    /// Domain presented in sign-in messages.
    pub domain: String,
    /// Origin URI presented in sign-in messages.
    pub origin: String,
    /// Lifetime of session credentials and sign-in messages, in seconds.
    pub session_ttl_seconds: u64,
    /// Capabilities requested for every session credential.
    pub capabilities: Vec<CapabilityRequest>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            network: "habanero".into(),
            chain: "ethereum".into(),
            domain: "localhost".into(),
            origin: "http://localhost:3000".into(),
            session_ttl_seconds: 24 * 60 * 60,
            capabilities: vec![
                CapabilityRequest::PkpSigning(ResourceId::Any),
                CapabilityRequest::ActionExecution(ResourceId::Any),
            ],
        }
    }
}

impl Settings {
    /// Parse settings from JSON, filling missing fields with defaults.
    pub fn from_json(source: &str) -> Result<Self, SettingsError> {
        let settings: Settings = serde_json::from_str(source)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Check that the values fit the ranges the lifecycle works with.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if (1..=MAX_SESSION_TTL_SECONDS).contains(&self.session_ttl_seconds) {
            Ok(())
        } else {
            Err(SettingsError::SessionTtl(self.session_ttl_seconds))
        }
    }

    /// Lifetime of session credentials.
    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_seconds)
    }

    /// A sign-in message for `address`, valid from `now` for one session
    /// lifetime.
    pub fn sign_in_message(
        &self,
        address: Did,
        nonce: impl Into<String>,
        now: SystemTime,
    ) -> SignInMessage {
        let issued_at = unix_seconds(now);
        SignInMessage {
            domain: self.domain.clone(),
            origin: self.origin.clone(),
            address,
            nonce: nonce.into(),
            issued_at,
            expiration: issued_at.saturating_add(self.session_ttl_seconds),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use testresult::TestResult;

    #[test]
    fn it_defaults_to_the_development_network() {
        let settings = Settings::default();
        assert_eq!(settings.network, "habanero");
        assert_eq!(settings.origin, "http://localhost:3000");
        assert_eq!(settings.session_ttl(), Duration::from_secs(86_400));
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn it_overrides_only_named_fields() -> TestResult {
        let settings = Settings::from_json(
            r#"{
                "session_ttl_seconds": 600,
                "capabilities": [{ "ability": "pkp-signing", "resource": "0x01" }]
            }"#,
        )?;

        assert_eq!(settings.domain, "localhost");
        assert_eq!(settings.session_ttl_seconds, 600);
        assert_eq!(
            settings.capabilities,
            vec![CapabilityRequest::PkpSigning(ResourceId::Specific(
                "0x01".into()
            ))]
        );
        Ok(())
    }

    #[test]
    fn it_rejects_malformed_settings() {
        assert!(matches!(
            Settings::from_json(r#"{ "session_ttl_seconds": "soon" }"#),
            Err(SettingsError::Parse(_))
        ));
    }

    #[test]
    fn it_rejects_session_lifetimes_out_of_range() {
        for ttl in [0, MAX_SESSION_TTL_SECONDS + 1, u64::MAX] {
            let source = format!(r#"{{ "session_ttl_seconds": {ttl} }}"#);
            assert!(matches!(
                Settings::from_json(&source),
                Err(SettingsError::SessionTtl(rejected)) if rejected == ttl
            ));
        }
        assert!(Settings::from_json(r#"{ "session_ttl_seconds": 31622400 }"#).is_ok());
    }

    #[test]
    fn it_ignores_scopes_for_the_initial_method() -> TestResult {
        let settings = Settings::from_json(r#"{ "initial_scopes": ["personal-sign"] }"#)?;
        assert_eq!(settings, Settings::default());
        Ok(())
    }

    #[test]
    fn it_builds_sign_in_messages_for_one_session() -> TestResult {
        let settings = Settings::default();
        let address: Did = "did:key:z6MkExample".parse()?;
        let now = pkp_common::time::from_unix_seconds(1_700_000_000);

        let message = settings.sign_in_message(address.clone(), "nonce", now);
        assert_eq!(message.address, address);
        assert_eq!(message.issued_at, 1_700_000_000);
        assert_eq!(message.expiration, 1_700_086_400);

        let unbounded = Settings {
            session_ttl_seconds: u64::MAX,
            ..Settings::default()
        };
        let message = unbounded.sign_in_message(address, "nonce", now);
        assert_eq!(message.expiration, u64::MAX);
        Ok(())
    }
}
