//! Tenant-scoped concurrent registry of session entries.

use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::trace;
use uuid::Uuid;

use crate::entry::{NewSession, SessionEntry};

/// Compound key: a session is only addressable together with its tenant.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct SessionKey {
    tenant: String,
    id: String,
}

impl SessionKey {
    fn new(tenant: &str, id: &str) -> Self {
        Self {
            tenant: tenant.to_string(),
            id: id.to_string(),
        }
    }
}

/// Thread-safe registry of [`SessionEntry`] values.
///
/// Lookups hand out `Arc` references, never copies, and never hold a shard
/// lock beyond the map operation itself.
#[derive(Debug, Default)]
pub struct SessionStore {
    entries: DashMap<SessionKey, Arc<SessionEntry>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a freshly created session under a newly minted id.
    ///
    /// Never overwrites: on the (theoretical) collision a new id is minted.
    pub fn put(&self, new_session: NewSession) -> Arc<SessionEntry> {
        let entry = loop {
            let id = Uuid::new_v4().to_string();
            match self.entries.entry(SessionKey::new(&new_session.tenant, &id)) {
                Entry::Occupied(_) => continue,
                Entry::Vacant(slot) => {
                    let entry = Arc::new(SessionEntry::new(id, new_session));
                    slot.insert(Arc::clone(&entry));
                    break entry;
                }
            }
        };
        trace!(
            tenant = %entry.tenant(),
            session_id = %entry.id(),
            store_size = self.entries.len(),
            "Session stored"
        );
        entry
    }

    /// Look up a live session.
    ///
    /// Returns `None` for unknown ids, ids owned by another tenant, and
    /// sessions whose deadline has passed, even before they are swept.
    pub fn get(&self, tenant: &str, id: &str) -> Option<Arc<SessionEntry>> {
        let now = Instant::now();
        let entry = self
            .entries
            .get(&SessionKey::new(tenant, id))
            .map(|e| Arc::clone(e.value()))?;
        if entry.is_expired_at(now) {
            trace!(tenant = %tenant, session_id = %id, "Session expired, hidden from lookup");
            return None;
        }
        Some(entry)
    }

    /// Remove a session. Returns false if it was not present for this tenant.
    pub fn remove(&self, tenant: &str, id: &str) -> bool {
        self.entries.remove(&SessionKey::new(tenant, id)).is_some()
    }

    /// Remove exactly this entry, if it is still the one stored under its key.
    pub(crate) fn remove_entry(&self, entry: &Arc<SessionEntry>) -> bool {
        self.entries
            .remove_if(&SessionKey::new(entry.tenant(), entry.id()), |_, stored| {
                Arc::ptr_eq(stored, entry)
            })
            .is_some()
    }

    /// Point-in-time list of every stored entry, expired ones included.
    pub fn snapshot(&self) -> Vec<Arc<SessionEntry>> {
        self.entries.iter().map(|e| Arc::clone(e.value())).collect()
    }

    /// Live entries owned by `tenant`.
    pub fn tenant_entries(&self, tenant: &str) -> Vec<Arc<SessionEntry>> {
        let now = Instant::now();
        self.entries
            .iter()
            .filter(|e| e.key().tenant == tenant && !e.value().is_expired_at(now))
            .map(|e| Arc::clone(e.value()))
            .collect()
    }

    /// Remove and return every entry.
    pub(crate) fn drain(&self) -> Vec<Arc<SessionEntry>> {
        let entries = self.snapshot();
        for entry in &entries {
            self.remove_entry(entry);
        }
        entries
    }

    /// Number of physically stored entries, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Store an entry under a caller-chosen id.
    #[cfg(test)]
    pub(crate) fn put_with_id(&self, id: &str, new_session: NewSession) -> Arc<SessionEntry> {
        let entry = Arc::new(SessionEntry::new(id.to_string(), new_session));
        self.entries
            .insert(SessionKey::new(entry.tenant(), id), Arc::clone(&entry));
        entry
    }
}
