use billmod_types::Result;

/// Seam for decrypting `processingcryptedparam` values.
///
/// The panel encrypts vendor credentials with its instance key before they
/// land in the database. The concrete scheme is deployment-specific, so the
/// store only defines the seam; a decryption failure propagates as-is and
/// aborts the invocation.
pub trait SecretCipher {
    fn decrypt(&self, value: &str) -> Result<String>;
}

/// Passthrough cipher for deployments storing params in the clear, and for
/// tests.
#[derive(Debug, Default)]
pub struct PlainCipher;

impl SecretCipher for PlainCipher {
    fn decrypt(&self, value: &str) -> Result<String> {
        Ok(value.to_string())
    }
}
