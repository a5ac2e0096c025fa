//! Password hashing and random secrets

use crate::error::{Error, Result};

const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// bcrypt with a configured work factor
#[derive(Debug, Clone, Copy)]
pub struct PasswordHasher {
    cost: u32,
}

impl PasswordHasher {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }

    pub fn hash(&self, password: &str) -> Result<String> {
        Ok(bcrypt::hash(password, self.cost)?)
    }

    /// Fails closed: an unreadable stored hash never matches
    pub fn verify(&self, password: &str, hash: &str) -> bool {
        match bcrypt::verify(password, hash) {
            Ok(matches) => matches,
            Err(e) => {
                tracing::warn!("Stored password hash could not be checked: {}", e);
                false
            }
        }
    }

    /// [`hash`](Self::hash) on the blocking thread pool
    pub async fn hash_blocking(&self, password: String) -> Result<String> {
        let hasher = *self;
        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| Error::Other(format!("Hashing task failed: {}", e)))?
    }

    /// [`verify`](Self::verify) on the blocking thread pool
    pub async fn verify_blocking(&self, password: String, hash: String) -> bool {
        let hasher = *self;
        tokio::task::spawn_blocking(move || hasher.verify(&password, &hash))
            .await
            .unwrap_or(false)
    }
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::new(bcrypt::DEFAULT_COST)
    }
}

/// 256-bit random secret as lowercase hex
pub fn generate_secret() -> String {
    let bytes: [u8; 32] = rand::random();
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Human-typeable single-use code (no 0/O or 1/I)
pub fn generate_code(len: usize) -> String {
    let mut code = String::with_capacity(len);
    while code.len() < len {
        let bytes: [u8; 16] = rand::random();
        code.extend(
            bytes
                .iter()
                .map(|b| CODE_ALPHABET[*b as usize % CODE_ALPHABET.len()] as char)
                .take(len - code.len()),
        );
    }
    code
}
