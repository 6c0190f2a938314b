//! Session configuration.

/// Name given to pump threads unless configured otherwise.
pub const DEFAULT_THREAD_NAME: &str = "jqx-pump";

/// Tunables for a [`Session`](crate::Session).
///
/// ```ignore
/// let config = SessionConfig::default().with_channel_capacity(16);
/// let session = Session::with_config(config)?;
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionConfig {
    /// Buffer size of the input, output and error channels of a stream.
    ///
    /// Zero (the default) makes every send wait for its receiver, so a
    /// pump never runs ahead of its consumer.
    pub channel_capacity: usize,
    /// Name of the pump thread spawned by `start`.
    pub thread_name: String,
}

impl SessionConfig {
    #[must_use]
    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }

    #[must_use]
    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            channel_capacity: 0,
            thread_name: DEFAULT_THREAD_NAME.to_owned(),
        }
    }
}
