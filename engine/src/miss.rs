use hostbridge_types::HandleId;
use serde::Deserialize;
use tracing::error;

use crate::handle_table::HandleError;

/// What the bridge does when a completion names a handle it cannot resolve.
///
/// A miss means the native side completed a call twice, completed after
/// teardown, or invented an id. It is always a defect, never a retryable
/// condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum MissPolicy {
    /// Panic on the thread that delivered the completion.
    #[serde(rename = "panic")]
    Panic,
    /// Log at `error` level and drop the completion.
    #[serde(rename = "log", alias = "log_and_drop")]
    LogAndDrop,
}

impl Default for MissPolicy {
    fn default() -> Self {
        if cfg!(debug_assertions) {
            Self::Panic
        } else {
            Self::LogAndDrop
        }
    }
}

impl MissPolicy {
    pub(crate) fn apply(self, err: &HandleError, is_final: bool) {
        match self {
            Self::Panic => panic!("completion could not be routed: {err} (final: {is_final})"),
            Self::LogAndDrop => {
                error!(%err, is_final, "dropping completion for unresolvable handle");
            }
        }
    }

    pub(crate) fn apply_closed(self, id: HandleId, is_final: bool) {
        match self {
            Self::Panic => {
                panic!("completion for handle {id} arrived after the dispatcher stopped")
            }
            Self::LogAndDrop => {
                error!(handle = %id, is_final, "dropping completion: dispatcher stopped");
            }
        }
    }
}
