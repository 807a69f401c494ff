//! Core value model for the host/native bridge.
//!
//! This crate contains the tagged value, the shared handle id, and the error
//! data that crosses the boundary. No IO, no async; both the codec and the
//! engine build on it.

mod error;
mod ids;
pub mod json;
mod value;

pub use error::{ErrorCode, NativeError};
pub use ids::HandleId;
pub use value::{NativePtr, TaggedValue, TypeMismatch, ValueKind};
