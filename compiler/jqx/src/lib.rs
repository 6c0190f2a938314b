//! jqx - jq filter sessions.
//!
//! A [`Session`] owns one evaluator. Programs are compiled into it and run
//! either synchronously with [`Session::execute`] or as a stream with
//! [`Session::start`], where a background pump thread reads inputs from a
//! channel and sends outputs and errors back on two others.
//!
//! ```ignore
//! let session = Session::new()?;
//! let stream = session.start(".a", &Value::null())?;
//! let (outputs, errors) = stream.collect_all([Value::from_json(r#"{"a":123}"#)?]);
//! session.close();
//! ```
//!
//! # Threading
//!
//! The evaluator is not reentrant. A session runs at most one program at a
//! time; a second `start`, `execute` or `compile` while one is in flight
//! fails with [`SessionError::Busy`]. [`Session::close`] may be called from
//! any thread, any number of times, including while a pump is running.

mod config;
mod errors;
mod pump;
mod session;
mod stream;

pub use config::SessionConfig;
pub use errors::{ExecuteError, SessionError};
pub use session::{Session, SessionState};
pub use stream::Stream;

pub use jqx_lang::{CompileError, EvalError, InitError};
pub use jqx_value::{DumpFlags, Kind, Map, Native, Value, ValueError};

use std::sync::Once;

static TRACING_INIT: Once = Once::new();

/// Install a `tracing` subscriber for debug output.
///
/// Safe to call multiple times. Does nothing unless `RUST_LOG` is set, e.g.
/// `RUST_LOG=jqx=debug` or `RUST_LOG=jqx=trace`.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        if std::env::var("RUST_LOG").is_ok() {
            let filter = EnvFilter::from_default_env();
            tracing_subscriber::registry()
                .with(fmt::layer().with_target(true).with_thread_names(true))
                .with(filter)
                .init();
        }
    });
}
