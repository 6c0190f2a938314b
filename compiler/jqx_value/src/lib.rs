//! jqx Value - reference-counted JSON values.
//!
//! # Sharing Model
//!
//! A [`Value`] is a handle. Scalars are stored inline, everything else sits
//! behind a [`Heap`] share:
//!
//! - `Clone` is the copy: it adds a share and never duplicates storage.
//! - `Drop` is the free: the last share releases the storage.
//! - Shared storage is never mutated. Updates such as [`Value::with_key`]
//!   return a new handle that reuses every unchanged child.
//!
//! Because handles are `Send + Sync`, values move freely between the caller
//! and the evaluator thread.
//!
//! # Conversions
//!
//! - JSON text: [`Value::from_json`] and [`Value::dump`]
//! - Host data: [`Value::from_native`] (any `Serialize`) and
//!   [`Value::to_native`] (returns [`Native`])

mod dump;
mod errors;
mod heap;
mod json;
mod kind;
mod native;
mod value;

pub use dump::DumpFlags;
pub use errors::ValueError;
pub use heap::Heap;
pub use kind::Kind;
pub use native::Native;
pub use value::{Map, Value};
