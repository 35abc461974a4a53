//! Tokio mpsc channel sink implementation.

use tokio::sync::mpsc;

use crate::sink::Sink;
use crate::SinkError;

/// A sink that forwards each drained frame to a tokio mpsc channel.
///
/// Uses `blocking_send`, which is correct from the drain worker thread but
/// must not be called from inside an async task. A full channel stalls the
/// drain until the consumer catches up.
///
/// # Example
///
/// ```
/// use render_drain::ChannelSink;
/// use tokio::sync::mpsc;
///
/// let (tx, mut rx) = mpsc::channel::<Vec<i16>>(100);
/// let sink = ChannelSink::new(tx);
/// // Hand the sink to a RenderDrain, then:
/// // while let Some(frame) = rx.recv().await { ... }
/// ```
pub struct ChannelSink {
    name: String,
    sender: mpsc::Sender<Vec<i16>>,
}

impl ChannelSink {
    /// Creates a new channel sink with the given sender.
    pub fn new(sender: mpsc::Sender<Vec<i16>>) -> Self {
        Self {
            name: "channel".to_string(),
            sender,
        }
    }

    /// Creates a new channel sink with a custom name.
    pub fn with_name(name: impl Into<String>, sender: mpsc::Sender<Vec<i16>>) -> Self {
        Self {
            name: name.into(),
            sender,
        }
    }
}

impl Sink for ChannelSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn write(&mut self, samples: &[i16]) -> Result<(), SinkError> {
        self.sender
            .blocking_send(samples.to_vec())
            .map_err(|_| SinkError::ChannelClosed)
    }
}
