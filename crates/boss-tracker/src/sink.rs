//! Error reporting path.
//!
//! Subscriber failures and loss of history continuity are reported to the
//! host through an [`ErrorSink`] instead of being propagated.

use std::sync::{Arc, Mutex};

/// Where the tracker reports problems it recovered from.
pub trait ErrorSink: Send {
    /// Reports a recovered error.
    fn report(&self, message: &str);

    /// Reports an informational notice. Defaults to [`ErrorSink::report`].
    fn notice(&self, message: &str) {
        self.report(message);
    }
}

/// Forwards reports to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl ErrorSink for TracingSink {
    fn report(&self, message: &str) {
        tracing::error!("{}", message);
    }

    fn notice(&self, message: &str) {
        tracing::info!("{}", message);
    }
}

/// Keeps every report in memory. Clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    messages: Arc<Mutex<Vec<String>>>,
}

impl MemorySink {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the recorded messages.
    pub fn messages(&self) -> Vec<String> {
        self.messages
            .lock()
            .map(|m| m.clone())
            .unwrap_or_default()
    }

    fn push(&self, message: String) {
        if let Ok(mut messages) = self.messages.lock() {
            messages.push(message);
        }
    }
}

impl ErrorSink for MemorySink {
    fn report(&self, message: &str) {
        self.push(format!("error: {}", message));
    }

    fn notice(&self, message: &str) {
        self.push(format!("notice: {}", message));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_sink_shares_buffer() {
        let sink = MemorySink::new();
        let handle = sink.clone();

        sink.report("handler failed");
        sink.notice("pool resized");

        assert_eq!(
            handle.messages(),
            vec!["error: handler failed", "notice: pool resized"]
        );
    }

    #[test]
    fn test_default_notice_uses_report() {
        struct Counting(Arc<Mutex<u32>>);
        impl ErrorSink for Counting {
            fn report(&self, _message: &str) {
                *self.0.lock().unwrap() += 1;
            }
        }

        let counter = Arc::new(Mutex::new(0));
        let sink = Counting(counter.clone());
        sink.notice("hello");

        assert_eq!(*counter.lock().unwrap(), 1);
    }
}
