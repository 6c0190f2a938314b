//! The session: one evaluator, shared with at most one running pump.

use std::fmt;
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam::channel::{bounded, Sender};
use jqx_lang::Evaluator;
use jqx_value::Value;
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::config::SessionConfig;
use crate::errors::{catch_fault, ExecuteError, SessionError};
use crate::pump::Pump;
use crate::stream::Stream;

/// Where a session is in its lifecycle.
///
/// Compiling does not change the state: a session is `Ready` from
/// construction until it is closed, whether or not its last compile
/// succeeded. [`Session::execute`] is what checks for a program.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// Construction has not finished. [`Session::new`] returns either a
    /// ready session or an error, so a live session never reports this.
    Uninitialized,
    Ready,
    Closed,
}

/// State shared between a session and its pump threads.
pub(crate) struct Shared {
    /// `None` once the session is closed.
    pub evaluator: Mutex<Option<Evaluator>>,
    pub closed: AtomicBool,
    pub busy: AtomicBool,
    pumps: Mutex<Vec<PumpHandle>>,
}

impl Shared {
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

struct PumpHandle {
    /// Never sent on; dropping it tells the pump to stop.
    stop: Sender<()>,
    thread: JoinHandle<()>,
}

impl PumpHandle {
    /// Tell the pump to stop, then wait for it.
    fn join(self) {
        let PumpHandle { stop, thread } = self;
        drop(stop);
        if thread.join().is_err() {
            warn!("pump thread panicked");
        }
    }
}

/// Marks the evaluator as in use until dropped.
///
/// Owns its share of the session state so it can travel into a pump thread
/// and be released there.
pub(crate) struct BusyGuard(Arc<Shared>);

impl BusyGuard {
    pub fn acquire(shared: &Arc<Shared>) -> Result<Self, SessionError> {
        if shared.is_closed() {
            return Err(SessionError::Closed);
        }
        if shared.busy.swap(true, Ordering::SeqCst) {
            return Err(SessionError::Busy);
        }
        Ok(BusyGuard(Arc::clone(shared)))
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.busy.store(false, Ordering::SeqCst);
    }
}

/// An evaluator session.
///
/// `Session` is `Send + Sync`: it can be shared across threads, for example
/// to call [`close`](Session::close) while another thread consumes a stream.
/// Dropping a session closes it.
pub struct Session {
    shared: Arc<Shared>,
    config: SessionConfig,
}

impl Session {
    /// Create a session with the default configuration.
    pub fn new() -> Result<Self, SessionError> {
        Self::with_config(SessionConfig::default())
    }

    pub fn with_config(config: SessionConfig) -> Result<Self, SessionError> {
        let evaluator = Evaluator::new()?;
        debug!(?config, "session opened");
        Ok(Session {
            shared: Arc::new(Shared {
                evaluator: Mutex::new(Some(evaluator)),
                closed: AtomicBool::new(false),
                busy: AtomicBool::new(false),
                pumps: Mutex::new(Vec::new()),
            }),
            config,
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        if self.shared.is_closed() {
            SessionState::Closed
        } else {
            SessionState::Ready
        }
    }

    /// Compile `program`, replacing any previous one.
    ///
    /// `args` binds `$name` variables: an object of name to value, or an
    /// array of `{"name": .., "value": ..}` objects. Every diagnostic is
    /// returned; a failed compile leaves the session without a program.
    #[tracing::instrument(level = "debug", skip(self, args))]
    pub fn compile(&self, program: &str, args: &Value) -> Result<(), Vec<SessionError>> {
        let _busy = BusyGuard::acquire(&self.shared).map_err(|err| vec![err])?;
        let mut slot = self.shared.evaluator.lock();
        let evaluator = slot.as_mut().ok_or_else(|| vec![SessionError::Closed])?;
        evaluator.compile(program, args).map_err(|errors| {
            debug!(count = errors.len(), "compile failed");
            errors.into_iter().map(SessionError::Compile).collect()
        })
    }

    /// Run the compiled program on `input` on this thread and collect its
    /// outputs.
    #[tracing::instrument(level = "trace", skip_all)]
    pub fn execute(&self, input: Value) -> Result<Vec<Value>, ExecuteError> {
        let _busy = BusyGuard::acquire(&self.shared)?;
        let mut slot = self.shared.evaluator.lock();
        let evaluator = slot.as_mut().ok_or(SessionError::Closed)?;
        if !evaluator.is_compiled() {
            return Err(SessionError::NotCompiled.into());
        }
        let mut outputs = Vec::new();
        let run = catch_fault(|| {
            evaluator.run(input, &mut |value| {
                outputs.push(value);
                ControlFlow::Continue(())
            })
        });
        match run.and_then(|completion| completion) {
            Ok(_) => Ok(outputs),
            Err(err) => Err(ExecuteError {
                outputs,
                source: SessionError::Evaluation(err),
            }),
        }
    }

    /// Start a pump running `program` over a stream of inputs.
    ///
    /// The program is compiled on the pump thread, replacing the session's
    /// current program; compile diagnostics arrive on the error channel,
    /// after which the stream ends. Dropping [`Stream::input`] ends the
    /// stream once every earlier input has been evaluated.
    #[tracing::instrument(level = "debug", skip(self, args))]
    pub fn start(&self, program: &str, args: &Value) -> Result<Stream, SessionError> {
        let busy = BusyGuard::acquire(&self.shared)?;
        let capacity = self.config.channel_capacity;
        let (input_tx, input_rx) = bounded(capacity);
        let (output_tx, output_rx) = bounded(capacity);
        let (errors_tx, errors_rx) = bounded(capacity);
        let (stop_tx, stop_rx) = bounded(0);

        let pump = Pump {
            _busy: busy,
            shared: Arc::clone(&self.shared),
            program: program.to_owned(),
            args: args.clone(),
            input: input_rx,
            output: output_tx,
            errors: errors_tx,
            stop: stop_rx,
        };

        // Registering under the lock orders this against `close`: either
        // close sees the new pump, or the pump is never spawned.
        let mut pumps = self.shared.pumps.lock();
        if self.shared.is_closed() {
            return Err(SessionError::Closed);
        }
        let (finished, running) = std::mem::take(&mut *pumps)
            .into_iter()
            .partition::<Vec<_>, _>(|p| p.thread.is_finished());
        *pumps = running;
        for handle in finished {
            handle.join();
        }

        let thread = thread::Builder::new()
            .name(self.config.thread_name.clone())
            .spawn(move || pump.run())
            .map_err(SessionError::Spawn)?;
        pumps.push(PumpHandle {
            stop: stop_tx,
            thread,
        });

        Ok(Stream {
            input: input_tx,
            output: output_rx,
            errors: errors_rx,
        })
    }

    /// Release the evaluator.
    ///
    /// Running pumps are told to stop and joined first; they close their
    /// channels without sending anything further. Only the first call does
    /// any work, so `close` may be called repeatedly and from several
    /// threads at once.
    pub fn close(&self) {
        if self.shared.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let pumps = std::mem::take(&mut *self.shared.pumps.lock());
        debug!(pumps = pumps.len(), "closing session");
        for handle in pumps {
            handle.join();
        }
        drop(self.shared.evaluator.lock().take());
        debug!("session closed");
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests;
