// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-oauth-login project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! OAuth state management
//!
//! Every login attempt gets an [`OAuthState`]: an unguessable nonce sent to
//! the provider as the `state` parameter, bound to the URI the user wanted
//! and to a PKCE code verifier. The callback must present the nonce back,
//! and each nonce can be consumed exactly once.
//!
//! ### Thread Safety
//!
//! The store sits behind a single mutex so that the check of a record and
//! its marking as consumed happen atomically: two concurrent callbacks
//! replaying the same nonce cannot both succeed.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use log::{debug, info, trace};
use rand::RngCore;
use thiserror::Error;

/// Default lifetime of a login attempt, in seconds
pub const DEFAULT_STATE_TTL_SECS: i64 = 600;

/// Longest accepted lifetime of a login attempt (one day)
pub const MAX_STATE_TTL_SECS: u64 = 86_400;

/// Default number of pending login attempts kept in memory
pub const DEFAULT_MAX_PENDING_STATES: usize = 10_000;

/// Nonce entropy in bytes (256 bits)
const NONCE_BYTES: usize = 32;

/// Reasons a callback's state is refused.
///
/// Only ever logged at trace level; the end user sees a generic failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    #[error("State does not match any login attempt")]
    StateMismatch,

    #[error("State has expired")]
    StateExpired,

    #[error("State was already used")]
    ReplayedState,
}

/// One login attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthState {
    /// Opaque value sent as `state` (and as OIDC `nonce`)
    pub nonce: String,
    /// Where to send the user once logged in
    pub original_uri: String,
    /// PKCE code verifier (RFC 7636)
    pub code_verifier: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug)]
struct StateEntry {
    state: OAuthState,
    consumed: bool,
}

/// In-memory store of pending login attempts.
///
/// Holds at most `max_pending` records; creating one more first drops the
/// expired records, then the oldest one.
#[derive(Debug)]
pub struct OAuthStateManager {
    ttl: Duration,
    max_pending: usize,
    entries: Mutex<HashMap<String, StateEntry>>,
}

impl Default for OAuthStateManager {
    fn default() -> Self {
        Self::new(Duration::seconds(DEFAULT_STATE_TTL_SECS))
    }
}

fn random_token() -> String {
    let mut bytes = [0u8; NONCE_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

impl OAuthStateManager {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            max_pending: DEFAULT_MAX_PENDING_STATES,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_max_pending(mut self, max_pending: usize) -> Self {
        self.max_pending = max_pending.max(1);
        self
    }

    pub fn max_pending(&self) -> usize {
        self.max_pending
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, StateEntry>> {
        // A panic while holding the lock cannot leave an entry half written
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Start a login attempt for `original_uri`
    pub fn create_state(&self, original_uri: impl Into<String>) -> OAuthState {
        self.create_state_at(original_uri, Utc::now())
    }

    pub fn create_state_at(&self, original_uri: impl Into<String>, now: DateTime<Utc>) -> OAuthState {
        let state = OAuthState {
            nonce: random_token(),
            original_uri: original_uri.into(),
            code_verifier: random_token(),
            created_at: now,
        };
        let mut entries = self.lock();
        if entries.len() >= self.max_pending {
            let ttl = self.ttl;
            entries.retain(|_, entry| now - entry.state.created_at < ttl);
        }
        while entries.len() >= self.max_pending {
            let oldest = entries
                .iter()
                .min_by_key(|(_, entry)| entry.state.created_at)
                .map(|(nonce, _)| nonce.clone());
            match oldest {
                Some(nonce) => {
                    entries.remove(&nonce);
                    debug!("OAuth state store full, dropped the oldest login attempt");
                }
                None => break,
            }
        }
        entries.insert(
            state.nonce.clone(),
            StateEntry {
                state: state.clone(),
                consumed: false,
            },
        );
        drop(entries);
        trace!("Created OAuth state for {}", state.original_uri);
        state
    }

    /// Check the nonce received at callback and consume it.
    ///
    /// On success the bound state (with its `original_uri`) is returned and
    /// the nonce can never be used again.
    pub fn validate_and_consume(&self, nonce: &str) -> Result<OAuthState, StateError> {
        self.validate_and_consume_at(nonce, Utc::now())
    }

    pub fn validate_and_consume_at(
        &self,
        nonce: &str,
        now: DateTime<Utc>,
    ) -> Result<OAuthState, StateError> {
        let mut entries = self.lock();
        let entry = entries.get_mut(nonce).ok_or(StateError::StateMismatch)?;
        if entry.consumed {
            trace!("Rejected replayed OAuth state");
            return Err(StateError::ReplayedState);
        }
        if now - entry.state.created_at >= self.ttl {
            trace!("Rejected expired OAuth state");
            return Err(StateError::StateExpired);
        }
        entry.consumed = true;
        Ok(entry.state.clone())
    }

    /// Drop every record older than the TTL, consumed or not.
    ///
    /// Consumed records are kept until then so replays inside the TTL are
    /// reported as such.
    pub fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let mut entries = self.lock();
        let before = entries.len();
        let ttl = self.ttl;
        entries.retain(|_, entry| now - entry.state.created_at < ttl);
        before - entries.len()
    }

    /// Number of records currently held
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Spawn a background task that periodically purges expired states.
///
/// Returns a `JoinHandle` that can be used to abort the task.
pub fn spawn_purge_task(
    manager: Arc<OAuthStateManager>,
    interval_secs: u64,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(std::time::Duration::from_secs(interval_secs.max(1)));
        // Skip the first immediate tick
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let purged = manager.purge_expired(Utc::now());
            if purged > 0 {
                info!("OAuth state purge removed {} records", purged);
            } else {
                debug!("OAuth state purge: nothing to remove");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nonce_is_opaque_and_unique() {
        let manager = OAuthStateManager::default();
        let a = manager.create_state("/a");
        let b = manager.create_state("/a");
        assert_ne!(a.nonce, b.nonce);
        // 32 bytes of entropy in unpadded base64url
        assert_eq!(a.nonce.len(), 43);
        assert!(a
            .nonce
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        assert_ne!(a.nonce, a.code_verifier);
    }

    #[test]
    fn test_consume_once() {
        let manager = OAuthStateManager::default();
        let state = manager.create_state("/dashboard");
        let consumed = manager.validate_and_consume(&state.nonce).unwrap();
        assert_eq!(consumed.original_uri, "/dashboard");
        assert_eq!(
            manager.validate_and_consume(&state.nonce),
            Err(StateError::ReplayedState)
        );
    }

    #[test]
    fn test_unknown_nonce() {
        let manager = OAuthStateManager::default();
        manager.create_state("/");
        assert_eq!(
            manager.validate_and_consume("never-issued"),
            Err(StateError::StateMismatch)
        );
        assert_eq!(
            manager.validate_and_consume(""),
            Err(StateError::StateMismatch)
        );
    }

    #[test]
    fn test_expired_state() {
        let manager = OAuthStateManager::new(Duration::minutes(5));
        let issued = Utc::now() - Duration::minutes(6);
        let state = manager.create_state_at("/", issued);
        assert_eq!(
            manager.validate_and_consume(&state.nonce),
            Err(StateError::StateExpired)
        );

        let fresh = manager.create_state_at("/", Utc::now() - Duration::minutes(4));
        assert!(manager.validate_and_consume(&fresh.nonce).is_ok());
    }

    #[test]
    fn test_purge_keeps_recent_consumed_records() {
        let manager = OAuthStateManager::new(Duration::minutes(5));
        let now = Utc::now();
        manager.create_state_at("/old", now - Duration::minutes(10));
        let recent = manager.create_state_at("/recent", now);
        manager.validate_and_consume_at(&recent.nonce, now).unwrap();

        assert_eq!(manager.purge_expired(now), 1);
        assert_eq!(manager.len(), 1);
        assert_eq!(
            manager.validate_and_consume_at(&recent.nonce, now),
            Err(StateError::ReplayedState)
        );
    }

    #[test]
    fn test_store_is_bounded() {
        let manager = OAuthStateManager::new(Duration::minutes(5)).with_max_pending(3);
        let start = Utc::now();
        let states: Vec<OAuthState> = (0..5)
            .map(|i| manager.create_state_at(format!("/page/{}", i), start + Duration::seconds(i)))
            .collect();
        assert_eq!(manager.len(), 3);

        let now = start + Duration::seconds(10);
        for evicted in &states[..2] {
            assert_eq!(
                manager.validate_and_consume_at(&evicted.nonce, now),
                Err(StateError::StateMismatch)
            );
        }
        let newest = manager.validate_and_consume_at(&states[4].nonce, now).unwrap();
        assert_eq!(newest.original_uri, "/page/4");
    }

    #[test]
    fn test_full_store_drops_expired_first() {
        let manager = OAuthStateManager::new(Duration::minutes(5)).with_max_pending(2);
        let now = Utc::now();
        manager.create_state_at("/stale", now - Duration::minutes(10));
        let kept = manager.create_state_at("/kept", now - Duration::minutes(1));
        let added = manager.create_state_at("/added", now);

        assert_eq!(manager.len(), 2);
        assert!(manager.validate_and_consume_at(&kept.nonce, now).is_ok());
        assert!(manager.validate_and_consume_at(&added.nonce, now).is_ok());
    }

    #[test]
    fn test_concurrent_replay_has_single_winner() {
        let manager = Arc::new(OAuthStateManager::default());
        let state = manager.create_state("/race");
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let manager = Arc::clone(&manager);
                let nonce = state.nonce.clone();
                std::thread::spawn(move || manager.validate_and_consume(&nonce).is_ok())
            })
            .collect();
        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn test_purge_task_runs() {
        let manager = Arc::new(OAuthStateManager::new(Duration::milliseconds(10)));
        manager.create_state("/soon-gone");
        let handle = spawn_purge_task(Arc::clone(&manager), 1);
        tokio::time::sleep(std::time::Duration::from_millis(2200)).await;
        handle.abort();
        assert!(manager.is_empty());
    }
}
