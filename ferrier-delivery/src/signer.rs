//! DKIM signing.
//!
//! Signs outbound messages with RSA-SHA256 and relaxed/relaxed
//! canonicalization. The private key is read from disk on every signing
//! call, so a key installed after startup is picked up without a restart.
//! Failure is a value, not an error: the orchestrator applies the
//! configured [`SigningFailurePolicy`] to a [`SigningOutcome::Failed`].

use mail_auth::common::{
    crypto::{RsaKey, Sha256},
    headers::HeaderWriter,
};

use crate::config::DkimConfig;

/// Result of a signing attempt.
#[derive(Debug)]
pub enum SigningOutcome {
    /// The message with its `DKIM-Signature` header prepended.
    Signed(Vec<u8>),
    /// Signing was not possible; the reason is for logs and the queue's
    /// error field.
    Failed(String),
}

/// Signs messages according to a [`DkimConfig`].
#[derive(Debug, Clone)]
pub struct MessageSigner {
    config: DkimConfig,
}

impl MessageSigner {
    #[must_use]
    pub const fn new(config: DkimConfig) -> Self {
        Self { config }
    }

    /// Produce a signed copy of `message`.
    ///
    /// Never returns an error: key trouble and signature trouble both
    /// come back as [`SigningOutcome::Failed`].
    pub async fn sign(&self, message: &[u8]) -> SigningOutcome {
        let pem = match tokio::fs::read_to_string(&self.config.key_path).await {
            Ok(pem) => pem,
            Err(e) => {
                return SigningOutcome::Failed(format!(
                    "cannot read key {}: {e}",
                    self.config.key_path.display()
                ));
            }
        };

        let key = match RsaKey::<Sha256>::from_rsa_pem(&pem) {
            Ok(key) => key,
            Err(e) => return SigningOutcome::Failed(format!("cannot parse RSA key: {e}")),
        };

        let signature = mail_auth::dkim::DkimSigner::from_key(key)
            .domain(&self.config.domain)
            .selector(&self.config.selector)
            .headers(["From", "To", "Subject", "Date", "Message-ID"])
            .sign(message);

        match signature {
            Ok(signature) => {
                let header = signature.to_header();
                let mut signed = Vec::with_capacity(header.len() + message.len());
                signed.extend_from_slice(header.as_bytes());
                signed.extend_from_slice(message);
                SigningOutcome::Signed(signed)
            }
            Err(e) => SigningOutcome::Failed(format!("signature computation failed: {e}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::config::SigningFailurePolicy;

    fn test_key_path() -> PathBuf {
        PathBuf::from(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/tests/fixtures/dkim-test.pem"
        ))
    }

    fn signer(key_path: PathBuf) -> MessageSigner {
        MessageSigner::new(DkimConfig {
            domain: "example.com".to_string(),
            selector: "mail".to_string(),
            key_path,
            on_failure: SigningFailurePolicy::Abort,
        })
    }

    const MESSAGE: &[u8] =
        b"From: a@example.com\r\nTo: b@example.net\r\nSubject: hi\r\n\r\nhello\r\n";

    #[tokio::test]
    async fn signs_with_fixture_key() {
        let outcome = signer(test_key_path()).sign(MESSAGE).await;

        let SigningOutcome::Signed(signed) = outcome else {
            panic!("expected signed outcome");
        };

        let text = String::from_utf8(signed).unwrap();
        assert!(text.starts_with("DKIM-Signature:"));
        assert!(text.contains("d=example.com"));
        assert!(text.contains("s=mail"));
        // The original message is intact after the signature header.
        assert!(text.ends_with("hello\r\n"));
    }

    #[tokio::test]
    async fn missing_key_fails_softly() {
        let outcome = signer(PathBuf::from("/nonexistent/dkim.pem"))
            .sign(MESSAGE)
            .await;

        let SigningOutcome::Failed(reason) = outcome else {
            panic!("expected failed outcome");
        };
        assert!(reason.contains("cannot read key"));
    }

    #[tokio::test]
    async fn garbage_key_fails_softly() {
        let dir = std::env::temp_dir().join("ferrier-signer-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("garbage.pem");
        std::fs::write(&path, "not a pem at all").unwrap();

        let outcome = signer(path).sign(MESSAGE).await;

        assert!(matches!(outcome, SigningOutcome::Failed(_)));
    }
}
