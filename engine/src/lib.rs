//! Async call bridge between host tasks and a native runtime.
//!
//! Calls are registered under handles, submitted through a bounded
//! [`ConcurrencyLimiter`], and completed later from native threads via a
//! [`CompletionSink`]. Payloads travel in the `hostbridge-codec` wire format.

mod bridge;
mod config;
mod handle_table;
mod limiter;
mod miss;
mod registry;

use std::any::Any;

pub use bridge::{
    Bridge, BridgeError, CallRequest, Completion, CompletionSink, NativeCall, NativeSurface,
    Outcome,
};
pub use config::{BridgeConfig, CodecConfig, ConfigError, HandlesConfig, LimiterConfig};
pub use handle_table::{HandleError, HandleTable, Lifetime};
pub use hostbridge_codec as codec;
pub use hostbridge_types as types;
pub use limiter::{ConcurrencyLimiter, DEFAULT_CAPACITY, LimiterError, LimiterSlot};
pub use miss::MissPolicy;
pub use registry::{ObjectRegistry, SharedObject};

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
