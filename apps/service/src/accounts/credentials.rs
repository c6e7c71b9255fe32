//! Password hashing and random identifiers.

use hmac::{Hmac, Mac};
use rand::Rng;
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Ids are drawn from lowercase letters and digits.
const ID_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("Cannot hash an empty secret")]
    EmptySecret,

    #[error("Invalid hashing key")]
    InvalidKey,
}

pub trait Credentials: Send + Sync {
    fn hash(&self, secret: &str) -> Result<String, CredentialError>;

    fn random_id(&self, length: usize) -> String;

    fn verify(&self, secret: &str, digest: &str) -> bool {
        self.hash(secret).is_ok_and(|hashed| hashed == digest)
    }
}

/// HMAC-SHA256 keyed by the configured hashing secret, hex encoded.
pub struct HmacCredentials {
    key: Vec<u8>,
}

impl HmacCredentials {
    pub fn new(hashing_secret: impl Into<String>) -> Self {
        Self { key: hashing_secret.into().into_bytes() }
    }
}

impl Credentials for HmacCredentials {
    fn hash(&self, secret: &str) -> Result<String, CredentialError> {
        if secret.is_empty() {
            return Err(CredentialError::EmptySecret);
        }
        let mut mac = HmacSha256::new_from_slice(&self.key).map_err(|_| CredentialError::InvalidKey)?;
        mac.update(secret.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    fn random_id(&self, length: usize) -> String {
        let mut rng = rand::thread_rng();
        (0..length).map(|_| ID_CHARSET[rng.gen_range(0..ID_CHARSET.len())] as char).collect()
    }
}
