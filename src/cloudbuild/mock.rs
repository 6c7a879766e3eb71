use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use super::channel::{BuildChannel, ChannelEvent};
use crate::error::{PublishError, Result};

/// In-memory [BuildChannel] driven by a [MockChannelHandle].
///
/// Once disconnected it yields no more events.
pub struct MockChannel {
    events: mpsc::UnboundedReceiver<ChannelEvent>,
    emitted: Arc<Mutex<Vec<(String, Value)>>>,
    disconnects: Arc<AtomicUsize>,
    fail_emit: bool,
}

/// Test side of a [MockChannel]
#[derive(Clone)]
pub struct MockChannelHandle {
    sender: mpsc::UnboundedSender<ChannelEvent>,
    emitted: Arc<Mutex<Vec<(String, Value)>>>,
    disconnects: Arc<AtomicUsize>,
}

impl MockChannel {
    pub fn new() -> (MockChannel, MockChannelHandle) {
        let (sender, events) = mpsc::unbounded_channel();
        let emitted = Arc::new(Mutex::new(Vec::new()));
        let disconnects = Arc::new(AtomicUsize::new(0));
        let channel = MockChannel {
            events,
            emitted: Arc::clone(&emitted),
            disconnects: Arc::clone(&disconnects),
            fail_emit: false,
        };
        let handle = MockChannelHandle {
            sender,
            emitted,
            disconnects,
        };
        (channel, handle)
    }

    /// Make every emit fail
    pub fn failing_emit(mut self) -> Self {
        self.fail_emit = true;
        self
    }
}

impl MockChannelHandle {
    /// Queue an inbound event; ignored once the channel is gone
    pub fn push(&self, event: ChannelEvent) {
        let _ = self.sender.send(event);
    }

    /// Queue a `build` progress frame
    pub fn push_build(&self, action: &str, message: &str) {
        self.push(ChannelEvent::Message {
            event: "build".to_string(),
            data: serde_json::json!({
                "data": { "action": action, "payload": { "message": message } }
            }),
        });
    }

    pub fn emitted(&self) -> Vec<(String, Value)> {
        self.emitted
            .lock()
            .map(|e| e.clone())
            .unwrap_or_default()
    }

    pub fn disconnects(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BuildChannel for MockChannel {
    async fn next_event(&mut self) -> Option<ChannelEvent> {
        if self.disconnects.load(Ordering::SeqCst) > 0 {
            return None;
        }
        self.events.recv().await
    }

    async fn emit(&mut self, event: &str, data: Value) -> Result<()> {
        if self.fail_emit {
            return Err(PublishError::BuildSessionError(format!(
                "cannot emit '{}'",
                event
            )));
        }
        if let Ok(mut emitted) = self.emitted.lock() {
            emitted.push((event.to_string(), data));
        }
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
