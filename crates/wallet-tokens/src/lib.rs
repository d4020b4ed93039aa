//! In-memory scoped-token store with TTL semantics.
//!
//! The store is a plain `HashMap` behind no lock — it has exactly one owner
//! at a time, the request pipeline, and is never shared across threads.
//! Expiry is lazy: a token past its `expires_at` is treated as absent and
//! removed the next time anyone asks for it by id.

pub mod error;
pub mod types;

pub use error::{Result, TokenError};
pub use types::{Attributes, IssueParams, ScopedToken};

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use uuid::Uuid;

const DEFAULT_TTL_SECONDS: u64 = 300;

/// In-memory mapping from token identifier to [`ScopedToken`].
#[derive(Debug, Default)]
pub struct TokenStore {
    tokens: HashMap<Uuid, ScopedToken>,
}

impl TokenStore {
    pub fn new() -> Self {
        Self { tokens: HashMap::new() }
    }

    /// Issue a fresh token. `token_id` is a new UUID v4; `issued_at` is now;
    /// `expires_at` is `issued_at + ttl_seconds * 1000` (`ttl_seconds`
    /// defaults to 300). A `ttl_seconds` of 0 is accepted and yields a
    /// token that is already expired by the time anyone calls [`Self::get`].
    pub fn issue(&mut self, params: IssueParams) -> ScopedToken {
        let ttl_seconds = params.ttl_seconds.unwrap_or(DEFAULT_TTL_SECONDS);
        let issued_at = now_ms();
        let expires_at = issued_at + (ttl_seconds as i64) * 1000;

        let token = ScopedToken {
            token_id: Uuid::new_v4(),
            credential_name: params.credential_name,
            credential_value: params.credential_value,
            policy_name: params.policy_name,
            agent_id: params.agent_id,
            skill_id: params.skill_id,
            scope: params.scope,
            issued_at,
            expires_at,
            used: false,
        };

        tracing::info!(
            token_id = %token.token_id,
            credential = %token.credential_name,
            ttl_seconds = ttl_seconds,
            "issued scoped token"
        );

        self.tokens.insert(token.token_id, token.clone());
        token
    }

    /// Retrieve a token by id. Returns `None` once `now_ms >= expires_at`,
    /// lazily removing the entry in that case.
    pub fn get(&mut self, token_id: Uuid) -> Option<ScopedToken> {
        let expired = self
            .tokens
            .get(&token_id)
            .map(|token| now_ms() >= token.expires_at)?;

        if expired {
            self.tokens.remove(&token_id);
            tracing::debug!(token_id = %token_id, "token expired on lookup");
            return None;
        }

        self.tokens.get(&token_id).cloned()
    }

    /// Mark a token as used. Idempotent: repeated calls return `true` while
    /// the token has not yet been purged, regardless of its prior `used`
    /// value. Does not change `expires_at`.
    pub fn mark_used(&mut self, token_id: Uuid) -> bool {
        match self.tokens.get_mut(&token_id) {
            Some(token) => {
                token.used = true;
                true
            }
            None => false,
        }
    }

    /// Remove every expired token. Idempotent. Returns the number removed.
    pub fn purge_expired(&mut self) -> usize {
        let now = now_ms();
        let before = self.tokens.len();
        self.tokens.retain(|_, token| token.expires_at > now);
        let purged = before - self.tokens.len();
        if purged > 0 {
            tracing::debug!(purged = purged, "purged expired tokens");
        }
        purged
    }

    /// Number of tokens currently held, including any not yet lazily purged.
    pub fn size(&self) -> usize {
        self.tokens.len()
    }
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is before the unix epoch")
        .as_millis() as i64
}
