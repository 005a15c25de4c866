//! Host sinks for script output.

use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Receives `trace()` output and `FSCommand:` requests.
pub trait LogSink: fmt::Debug + Send {
    /// One `trace()` line.
    fn trace(&mut self, message: &str);

    /// A `getURL("FSCommand:cmd", args)` request.
    fn fs_command(&mut self, command: &str, args: &str) {
        debug!(command, args, "fscommand ignored");
    }
}

/// Forwards trace output to `tracing` on target `tessera::trace`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogSink;

impl LogSink for TracingLogSink {
    fn trace(&mut self, message: &str) {
        info!(target: "tessera::trace", "{}", message);
    }
}

/// A recorded sink event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkEvent {
    /// `trace(message)`
    Trace(String),
    /// `FSCommand:command` with its argument string
    Command(String, String),
}

/// Keeps every line it receives. Clones share the same record.
///
/// # Examples
///
/// ```
/// use interpreter::{LogSink, RecordingLogSink};
///
/// let sink = RecordingLogSink::new();
/// let mut boxed: Box<dyn LogSink> = Box::new(sink.clone());
/// boxed.trace("hi");
/// assert_eq!(sink.lines(), vec!["hi".to_string()]);
/// ```
#[derive(Debug, Default, Clone)]
pub struct RecordingLogSink {
    events: Arc<Mutex<Vec<SinkEvent>>>,
}

impl RecordingLogSink {
    /// An empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Trace lines so far.
    pub fn lines(&self) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                SinkEvent::Trace(line) => Some(line.clone()),
                SinkEvent::Command(..) => None,
            })
            .collect()
    }

    /// Every event so far.
    pub fn events(&self) -> Vec<SinkEvent> {
        self.events.lock().clone()
    }

    /// Forgets everything recorded.
    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl LogSink for RecordingLogSink {
    fn trace(&mut self, message: &str) {
        self.events.lock().push(SinkEvent::Trace(message.to_string()));
    }

    fn fs_command(&mut self, command: &str, args: &str) {
        self.events
            .lock()
            .push(SinkEvent::Command(command.to_string(), args.to_string()));
    }
}
