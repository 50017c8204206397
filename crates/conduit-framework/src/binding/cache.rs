use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

use parking_lot::RwLock;

use super::candidate::{BindingCandidate, CandidateKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct CacheKey {
    pub type_id: TypeId,
    pub kind: CandidateKind,
    pub prefer_non_generic_enum_parse: bool,
    pub tolerate_invalid_methods: bool,
}

/// Memoises capability resolution per type.
///
/// Resolution is deterministic, so racing writers store equal results and
/// the first stored entry wins. Failed resolutions are never cached.
#[derive(Debug, Default)]
pub struct CapabilityCache {
    entries: RwLock<HashMap<CacheKey, Option<BindingCandidate>>>,
}

static SHARED: LazyLock<Arc<CapabilityCache>> = LazyLock::new(Default::default);

impl CapabilityCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide cache.
    pub fn shared() -> Arc<CapabilityCache> {
        SHARED.clone()
    }

    /// Number of cached resolutions.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns `true` if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Drops every cached resolution.
    pub fn clear(&self) {
        self.entries.write().clear();
    }

    pub(crate) fn get(&self, key: &CacheKey) -> Option<Option<BindingCandidate>> {
        self.entries.read().get(key).cloned()
    }

    pub(crate) fn insert(
        &self,
        key: CacheKey,
        value: Option<BindingCandidate>,
    ) -> Option<BindingCandidate> {
        self.entries.write().entry(key).or_insert(value).clone()
    }
}
