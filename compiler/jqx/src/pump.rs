//! The pump thread behind a [`Stream`](crate::Stream).
//!
//! A pump compiles its program, then loops: wait for an input (or for the
//! session to close), run the evaluator on it, and send every output and
//! error back. Each wait also listens on the stop channel, which the session
//! disconnects on close, so a pump never blocks past its session.

use std::ops::ControlFlow;
use std::sync::Arc;

use crossbeam::channel::{select, Receiver, Sender};
use jqx_lang::Completion;
use jqx_value::Value;
use tracing::{debug, debug_span, trace};

use crate::errors::{catch_fault, SessionError};
use crate::session::{BusyGuard, Shared};

pub(crate) struct Pump {
    /// Dropped first, so the session is free again by the time the consumer
    /// sees the channels close.
    pub _busy: BusyGuard,
    pub shared: Arc<Shared>,
    pub program: String,
    pub args: Value,
    pub input: Receiver<Value>,
    pub output: Sender<Value>,
    pub errors: Sender<SessionError>,
    pub stop: Receiver<()>,
}

impl Pump {
    pub fn run(self) {
        let _span = debug_span!("pump").entered();
        debug!("pump started");
        if self.compile().is_continue() {
            self.serve();
        }
        debug!("pump stopped");
    }

    fn compile(&self) -> ControlFlow<()> {
        if self.shared.is_closed() {
            return ControlFlow::Break(());
        }
        let result = {
            let mut slot = self.shared.evaluator.lock();
            let Some(evaluator) = slot.as_mut() else {
                return ControlFlow::Break(());
            };
            evaluator.compile(&self.program, &self.args)
        };
        match result {
            Ok(()) => ControlFlow::Continue(()),
            Err(errors) => {
                debug!(count = errors.len(), "compile failed");
                for err in errors {
                    self.deliver(&self.errors, SessionError::Compile(err))?;
                }
                ControlFlow::Break(())
            }
        }
    }

    fn serve(&self) {
        loop {
            let input = select! {
                recv(self.input) -> msg => match msg {
                    Ok(value) => value,
                    Err(_) => return,
                },
                recv(self.stop) -> _ => return,
            };
            if self.feed(input).is_break() {
                return;
            }
        }
    }

    /// Evaluate one input. `Break` ends the pump.
    fn feed(&self, input: Value) -> ControlFlow<()> {
        if self.shared.is_closed() {
            return ControlFlow::Break(());
        }
        let mut slot = self.shared.evaluator.lock();
        let Some(evaluator) = slot.as_mut() else {
            return ControlFlow::Break(());
        };
        trace!("evaluating input");
        let result = catch_fault(|| {
            evaluator.run(input, &mut |value| self.deliver(&self.output, value))
        })
        .and_then(|completion| completion);
        drop(slot);
        match result {
            Ok(Completion::Finished) => ControlFlow::Continue(()),
            // `halt` ends the whole stream, as it would end a jq process.
            Ok(Completion::Halted | Completion::Stopped) => ControlFlow::Break(()),
            Err(err) => {
                trace!(error = %err, "evaluation failed");
                self.deliver(&self.errors, SessionError::Evaluation(err))
            }
        }
    }

    /// Send `msg`, waiting for the receiver unless the session closes first.
    /// A receiver that has hung up also ends the pump.
    fn deliver<T>(&self, channel: &Sender<T>, msg: T) -> ControlFlow<()> {
        if self.shared.is_closed() {
            return ControlFlow::Break(());
        }
        select! {
            send(channel, msg) -> sent => {
                if sent.is_ok() {
                    ControlFlow::Continue(())
                } else {
                    ControlFlow::Break(())
                }
            }
            recv(self.stop) -> _ => ControlFlow::Break(()),
        }
    }
}
