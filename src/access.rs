//! Shared-secret gate. Passing it stores a 24h `AccessGrant` in the shared
//! store, so every process sees the same login.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::clock::Clock;
use crate::config::{ACCESS_GRANT_KEY, ACCESS_GRANT_TTL_HOURS};
use crate::error::{AppError, Result};
use crate::store::{SharedStore, WriterId};

const HOUR_MS: u64 = 60 * 60 * 1_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessGrant {
    pub name: String,
    /// Epoch milliseconds.
    pub granted_at: u64,
    pub expires_at: u64,
}

impl AccessGrant {
    pub fn is_valid_at(&self, now_ms: u64) -> bool {
        now_ms < self.expires_at
    }
}

pub struct AccessGate {
    secret_hash: Option<blake3::Hash>,
    store: Arc<dyn SharedStore>,
    clock: Arc<dyn Clock>,
    writer: WriterId,
}

impl AccessGate {
    /// A missing or empty secret disables the gate.
    pub fn new(
        secret: Option<&str>,
        store: Arc<dyn SharedStore>,
        clock: Arc<dyn Clock>,
    ) -> Arc<Self> {
        Arc::new(Self {
            secret_hash: secret
                .filter(|s| !s.is_empty())
                .map(|s| blake3::hash(s.as_bytes())),
            store,
            clock,
            writer: WriterId::new(),
        })
    }

    pub fn is_configured(&self) -> bool {
        self.secret_hash.is_some()
    }

    /// Check `input` against the secret and, on success, store a fresh grant.
    pub fn verify(&self, name: &str, input: &str) -> Result<AccessGrant> {
        let expected = self.secret_hash.ok_or(AppError::AccessNotConfigured)?;
        // blake3::Hash equality is constant-time.
        if blake3::hash(input.as_bytes()) != expected {
            warn!("access gate: wrong secret");
            return Err(AppError::WrongSecret);
        }

        let now = self.clock.now_ms();
        let grant = AccessGrant {
            name: name.trim().to_string(),
            granted_at: now,
            expires_at: now + ACCESS_GRANT_TTL_HOURS * HOUR_MS,
        };
        self.store
            .set(ACCESS_GRANT_KEY, &serde_json::to_string(&grant)?, self.writer)?;
        info!(name = %grant.name, "access granted");
        Ok(grant)
    }

    /// The stored grant if it is still valid. Expired or malformed grants are
    /// removed.
    pub fn current_grant(&self) -> Option<AccessGrant> {
        self.current().map(|(grant, _)| grant)
    }

    /// Raw stored grant, sent as the bearer token of submissions.
    pub fn bearer_token(&self) -> Option<String> {
        self.current().map(|(_, raw)| raw)
    }

    pub fn is_granted(&self) -> bool {
        self.current_grant().is_some()
    }

    pub fn name(&self) -> Option<String> {
        self.current_grant().map(|g| g.name)
    }

    /// Hours left on the grant, rounded to one decimal. 0 without a grant.
    pub fn remaining_hours(&self) -> f64 {
        let Some(grant) = self.current_grant() else {
            return 0.0;
        };
        let remaining_ms = grant.expires_at.saturating_sub(self.clock.now_ms());
        (remaining_ms as f64 / HOUR_MS as f64 * 10.0).round() / 10.0
    }

    /// Log out.
    pub fn clear(&self) {
        if let Err(e) = self.store.remove(ACCESS_GRANT_KEY, self.writer) {
            warn!("failed to clear access grant: {e}");
        }
    }

    fn current(&self) -> Option<(AccessGrant, String)> {
        let raw = self.store.get(ACCESS_GRANT_KEY)?;
        match serde_json::from_str::<AccessGrant>(&raw) {
            Ok(grant) if grant.is_valid_at(self.clock.now_ms()) => Some((grant, raw)),
            Ok(_) => {
                info!("access grant expired");
                self.clear();
                None
            }
            Err(e) => {
                warn!("malformed access grant, clearing it: {e}");
                self.clear();
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::clock::ManualClock;
    use crate::store::MemoryStore;

    const T0: u64 = 1_700_000_000_000;

    fn setup(secret: Option<&str>) -> (Arc<AccessGate>, Arc<MemoryStore>, Arc<ManualClock>) {
        let store = MemoryStore::new();
        let clock = Arc::new(ManualClock::new(T0));
        (AccessGate::new(secret, store.clone(), clock.clone()), store, clock)
    }

    #[test]
    fn right_secret_grants_for_a_day() {
        let (gate, store, clock) = setup(Some("s3cret"));
        let grant = gate.verify(" Ana ", "s3cret").unwrap();
        assert_eq!(grant.name, "Ana");
        assert_eq!(grant.expires_at - grant.granted_at, 24 * HOUR_MS);
        assert!(store.get(ACCESS_GRANT_KEY).is_some());

        assert!(gate.is_granted());
        assert_eq!(gate.name().as_deref(), Some("Ana"));
        assert_eq!(gate.remaining_hours(), 24.0);

        clock.advance(Duration::from_secs(90 * 60));
        assert_eq!(gate.remaining_hours(), 22.5);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let (gate, store, _) = setup(Some("s3cret"));
        assert!(matches!(gate.verify("Ana", "guess"), Err(AppError::WrongSecret)));
        assert!(store.get(ACCESS_GRANT_KEY).is_none());
    }

    #[test]
    fn gate_without_secret_is_disabled() {
        let (gate, _, _) = setup(Some(""));
        assert!(!gate.is_configured());
        assert!(matches!(gate.verify("Ana", ""), Err(AppError::AccessNotConfigured)));
    }

    #[test]
    fn expired_grant_is_cleared_on_read() {
        let (gate, store, clock) = setup(Some("s3cret"));
        gate.verify("Ana", "s3cret").unwrap();

        clock.advance(Duration::from_secs(24 * 60 * 60));
        assert!(!gate.is_granted());
        assert_eq!(gate.remaining_hours(), 0.0);
        assert!(store.get(ACCESS_GRANT_KEY).is_none());
    }

    #[test]
    fn malformed_grant_is_cleared() {
        let (gate, store, _) = setup(Some("s3cret"));
        store.set(ACCESS_GRANT_KEY, "not json", WriterId::new()).unwrap();
        assert!(gate.name().is_none());
        assert!(store.get(ACCESS_GRANT_KEY).is_none());
    }

    #[test]
    fn logout_clears_grant() {
        let (gate, _, _) = setup(Some("s3cret"));
        gate.verify("Ana", "s3cret").unwrap();
        let token = gate.bearer_token().unwrap();
        assert!(token.contains("\"expiresAt\""));

        gate.clear();
        assert!(!gate.is_granted());
        assert!(gate.bearer_token().is_none());
    }
}
