//! The caller's end of a running pump.

use std::thread;

use crossbeam::channel::{never, select, Receiver, Sender};
use jqx_value::Value;

use crate::errors::SessionError;

/// Channels connected to a pump started by [`Session::start`](crate::Session::start).
///
/// Send inputs on `input` and drop it to signal the end of input. `output`
/// and `errors` both disconnect once the pump is done, whether it ran out of
/// input, failed to compile, or its session was closed.
#[derive(Debug)]
pub struct Stream {
    pub input: Sender<Value>,
    pub output: Receiver<Value>,
    pub errors: Receiver<SessionError>,
}

impl Stream {
    /// Feed `inputs` to the pump and gather everything it sends back.
    ///
    /// Inputs are sent from a helper thread while this thread drains both
    /// receivers, so the call cannot deadlock on a full channel.
    pub fn collect_all(
        self,
        inputs: impl IntoIterator<Item = Value>,
    ) -> (Vec<Value>, Vec<SessionError>) {
        let Stream {
            input,
            output,
            errors,
        } = self;
        let inputs: Vec<Value> = inputs.into_iter().collect();

        thread::scope(|scope| {
            scope.spawn(move || {
                for value in inputs {
                    if input.send(value).is_err() {
                        break;
                    }
                }
            });
            drain(&output, &errors)
        })
    }

    /// Stop sending inputs and gather whatever the pump still produces.
    pub fn finish(self) -> (Vec<Value>, Vec<SessionError>) {
        let Stream {
            input,
            output,
            errors,
        } = self;
        drop(input);
        drain(&output, &errors)
    }
}

/// Receive from both channels until both have disconnected.
fn drain(
    output: &Receiver<Value>,
    errors: &Receiver<SessionError>,
) -> (Vec<Value>, Vec<SessionError>) {
    let mut values = Vec::new();
    let mut failures = Vec::new();
    let (no_output, no_errors) = (never(), never());
    let (mut output_open, mut errors_open) = (true, true);

    while output_open || errors_open {
        let output = if output_open { output } else { &no_output };
        let errors = if errors_open { errors } else { &no_errors };
        select! {
            recv(output) -> msg => match msg {
                Ok(value) => values.push(value),
                Err(_) => output_open = false,
            },
            recv(errors) -> msg => match msg {
                Ok(err) => failures.push(err),
                Err(_) => errors_open = false,
            },
        }
    }
    (values, failures)
}
