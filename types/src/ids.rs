use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Process-wide counter backing [`HandleId::next`]. Starts at 1 so that
/// [`HandleId::NIL`] is never issued.
static NEXT_HANDLE: AtomicU64 = AtomicU64::new(1);

/// Opaque integer naming a host-side object registered for the native side.
///
/// Ids are unique for the whole process (every table draws from the same
/// counter) and are never reused.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(transparent)]
pub struct HandleId(u64);

impl HandleId {
    /// Reserved id meaning "no handle"; never returned by [`HandleId::next`].
    pub const NIL: HandleId = HandleId(0);

    /// Issue a fresh process-unique id.
    #[must_use]
    pub fn next() -> Self {
        Self(NEXT_HANDLE.fetch_add(1, Ordering::Relaxed))
    }

    /// Rebuild an id received from the native side.
    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }

    #[must_use]
    pub const fn is_nil(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
