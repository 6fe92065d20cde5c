//! Per-tenant last-answer cache.
//!
//! A single-slot store of the most recent answer produced for each tenant,
//! enabling "rewrite that in 20 words" follow-ups without the caller
//! resending the full answer. Last write wins; entries live for the
//! process lifetime and are not persisted.
//!
//! The cache is constructed once and injected into the router rather than
//! living in module-level state, so tests and embedders of the library can
//! scope it however they need.

use std::collections::HashMap;
use std::sync::Mutex;

/// Shared slot key for requests that carry no tenant id.
pub const DEFAULT_TENANT: &str = "default";

/// Maps an optional tenant id to its cache key.
pub fn tenant_key(tenant_id: Option<&str>) -> String {
    match tenant_id {
        Some(t) if !t.trim().is_empty() => t.to_string(),
        _ => DEFAULT_TENANT.to_string(),
    }
}

/// Mutex-guarded per-tenant answer store. Values are replaced whole; the
/// lock only covers O(1) map access.
#[derive(Default)]
pub struct AnswerCache {
    answers: Mutex<HashMap<String, String>>,
}

impl AnswerCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, tenant: &str) -> Option<String> {
        self.answers.lock().unwrap().get(tenant).cloned()
    }

    pub fn set(&self, tenant: &str, answer: &str) {
        self.answers
            .lock()
            .unwrap()
            .insert(tenant.to_string(), answer.to_string());
    }
}
