//! Password recovery codes

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::clock::Clock;
use super::password::generate_code;

const CODE_LENGTH: usize = 12;

/// Outstanding recovery code for one user
#[derive(Debug, Clone)]
struct PendingCode {
    code: String,
    expires_at: chrono::DateTime<chrono::Utc>,
}

/// In-memory store of single-use recovery codes, one per user
pub struct RecoveryManager {
    codes: Arc<RwLock<HashMap<String, PendingCode>>>,
    ttl: chrono::Duration,
    clock: Arc<dyn Clock>,
}

impl RecoveryManager {
    pub fn new(ttl_secs: i64, clock: Arc<dyn Clock>) -> Self {
        Self {
            codes: Arc::new(RwLock::new(HashMap::new())),
            ttl: chrono::Duration::seconds(ttl_secs),
            clock,
        }
    }

    /// Issue a fresh code for `username`, replacing any earlier one
    pub async fn issue(&self, username: &str) -> String {
        let code = generate_code(CODE_LENGTH);
        let pending = PendingCode {
            code: code.clone(),
            expires_at: self.clock.now() + self.ttl,
        };
        self.codes.write().await.insert(username.to_string(), pending);
        code
    }

    /// Consume the code if it matches and has not expired
    ///
    /// A wrong guess leaves the code in place; an expired one is dropped.
    pub async fn redeem(&self, username: &str, code: &str) -> bool {
        let mut codes = self.codes.write().await;
        let Some(pending) = codes.get(username) else {
            return false;
        };

        if pending.expires_at <= self.clock.now() {
            codes.remove(username);
            return false;
        }
        if pending.code != code.trim().to_ascii_uppercase() {
            return false;
        }

        codes.remove(username);
        true
    }

    /// Drop expired codes
    pub async fn cleanup_expired(&self) {
        let now = self.clock.now();
        self.codes.write().await.retain(|_, pending| pending.expires_at > now);
    }

    pub async fn pending_count(&self) -> usize {
        self.codes.read().await.len()
    }
}

impl Clone for RecoveryManager {
    fn clone(&self) -> Self {
        Self {
            codes: Arc::clone(&self.codes),
            ttl: self.ttl,
            clock: Arc::clone(&self.clock),
        }
    }
}
