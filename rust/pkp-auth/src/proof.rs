//! Authentication proofs presented to a session provider.

use crate::AuthMethodType;
use pkp_common::time::{SystemTime, from_unix_seconds};
use pkp_credentials::{Authority, Did, SignError};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// A sign-in request a wallet signs to prove control of its key.
///
/// Renders in the Sign-In with Ethereum layout; the rendered text is what
/// gets signed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignInMessage {
    /// Domain requesting the sign-in.
    pub domain: String,
    /// Origin URI of the requesting application.
    pub origin: String,
    /// The wallet signing in.
    pub address: Did,
    /// Replay protection, typically a recent block hash.
    pub nonce: String,
    /// Unix seconds at which the message was created.
    pub issued_at: u64,
    /// Unix seconds after which the message is no longer accepted.
    pub expiration: u64,
}

impl SignInMessage {
    /// Whether the message has expired at `now`.
    pub fn is_expired_at(&self, now: SystemTime) -> bool {
        from_unix_seconds(self.expiration) <= now
    }
}

impl Display for SignInMessage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{} wants you to sign in with your account:", self.domain)?;
        writeln!(f, "{}", self.address)?;
        writeln!(f)?;
        writeln!(f, "URI: {}", self.origin)?;
        writeln!(f, "Version: 1")?;
        writeln!(f, "Nonce: {}", self.nonce)?;
        writeln!(f, "Issued At: {}", self.issued_at)?;
        write!(f, "Expiration Time: {}", self.expiration)
    }
}

/// Evidence that the caller satisfies an auth method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "kind")]
pub enum Proof {
    /// A wallet signature over a sign-in message.
    Wallet {
        /// The signed message.
        message: SignInMessage,
        /// Signature over the rendered message.
        #[serde(with = "crate::identity::hex_bytes")]
        signature: Vec<u8>,
    },
    /// A Google-issued JSON web token.
    GoogleJwt {
        /// The compact-serialized token.
        token: String,
    },
    /// The source of an executable action.
    Action {
        /// The action source text.
        source: String,
    },
}

impl Proof {
    /// Sign `message` with `wallet`, producing a wallet proof.
    pub async fn sign_in<A: Authority>(
        message: SignInMessage,
        wallet: &A,
    ) -> Result<Self, SignError> {
        let signature = wallet.sign(message.to_string().as_bytes()).await?;
        Ok(Proof::Wallet { message, signature })
    }

    /// The auth method type this proof satisfies.
    pub fn kind(&self) -> AuthMethodType {
        match self {
            Proof::Wallet { .. } => AuthMethodType::Wallet,
            Proof::GoogleJwt { .. } => AuthMethodType::GoogleJwt,
            Proof::Action { .. } => AuthMethodType::Action,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pkp_credentials::{Ed25519Signer, Principal};
    use testresult::TestResult;
    #[cfg(target_arch = "wasm32")]
    use wasm_bindgen_test::wasm_bindgen_test;

    fn message(address: Did) -> SignInMessage {
        SignInMessage {
            domain: "localhost".into(),
            origin: "http://localhost:3000".into(),
            address,
            nonce: "0x01".into(),
            issued_at: 1_700_000_000,
            expiration: 1_700_086_400,
        }
    }

    #[test]
    fn it_renders_the_sign_in_layout() {
        let address: Did = "did:key:z6MkhaXgBZDvotDkL5257faiztiGiC2QtKLGpbnnEGta2doK"
            .parse()
            .unwrap();
        let rendered = message(address).to_string();

        assert!(rendered.starts_with("localhost wants you to sign in with your account:\n"));
        assert!(rendered.contains("\nURI: http://localhost:3000\n"));
        assert!(rendered.ends_with("Expiration Time: 1700086400"));
    }

    #[cfg_attr(target_arch = "wasm32", wasm_bindgen_test)]
    #[cfg_attr(not(target_arch = "wasm32"), tokio::test)]
    async fn it_signs_the_rendered_message() -> TestResult {
        let wallet = Ed25519Signer::import(&[3u8; 32])?;
        let message = message(wallet.did());

        let proof = Proof::sign_in(message.clone(), &wallet).await?;
        let Proof::Wallet { signature, .. } = &proof else {
            panic!("expected a wallet proof");
        };

        wallet
            .verifier()
            .verify(message.to_string().as_bytes(), signature)?;
        assert_eq!(proof.kind(), AuthMethodType::Wallet);
        Ok(())
    }

    #[test]
    fn it_honors_expiration() {
        let address: Did = "did:web:example.com".parse().unwrap();
        let message = message(address);
        assert!(!message.is_expired_at(from_unix_seconds(1_700_000_001)));
        assert!(message.is_expired_at(from_unix_seconds(1_700_086_400)));
    }
}
