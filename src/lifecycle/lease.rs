//! Scoped stream lease

use std::fmt;
use std::sync::Arc;

use super::manager::ManagerInner;

/// One consumer's claim on the camera
///
/// Returned by [`StreamManager::acquire`](super::StreamManager::acquire).
/// Dropping the lease releases it, on every exit path: normal completion,
/// error, task cancellation or client disconnect.
#[must_use = "dropping a lease releases the stream immediately"]
pub struct Lease {
    inner: Arc<ManagerInner>,
    id: u64,
}

impl Lease {
    pub(super) fn new(inner: Arc<ManagerInner>, id: u64) -> Self {
        Self { inner, id }
    }

    /// Identifier for log correlation
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        self.inner.release(self.id);
    }
}

impl fmt::Debug for Lease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lease").field("id", &self.id).finish()
    }
}
