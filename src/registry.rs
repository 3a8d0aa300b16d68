use std::collections::HashMap;
use std::fmt::Display;
use std::sync::{Arc, Mutex};

use crate::controller::InstanceShared;

/// Engine-assigned identifier for a live browser instance.
///
/// Exists only between a successful creation and the before-close
/// acknowledgment; treat it as opaque.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(i32);

impl InstanceId {
    pub fn new(raw: i32) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> i32 {
        self.0
    }
}

impl Display for InstanceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Process-wide map from [`InstanceId`] to the per-instance shared state,
/// letting asynchronous engine callbacks find the right instance.
///
/// A handle is present iff its controller is live or still closing. All
/// operations are O(1) under a single mutex; the lock is never held across
/// a blocking engine wait.
#[derive(Default)]
pub struct InstanceRegistry {
    inner: Mutex<HashMap<InstanceId, Arc<InstanceShared>>>,
}

impl InstanceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, id: InstanceId, shared: Arc<InstanceShared>) {
        let mut map = self.inner.lock().unwrap();
        if map.insert(id, shared).is_some() {
            log::warn!("Instance {id} registered twice");
        }
    }

    /// Idempotent: removing an absent id is a no-op, tolerating duplicate
    /// close signals from the engine.
    pub fn unregister(&self, id: InstanceId) {
        self.inner.lock().unwrap().remove(&id);
    }

    /// A miss returns `None`; callbacks racing a forced teardown treat that
    /// as a no-op, never an error.
    pub fn lookup(&self, id: InstanceId) -> Option<Arc<InstanceShared>> {
        self.inner.lock().unwrap().get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().unwrap().is_empty()
    }
}
