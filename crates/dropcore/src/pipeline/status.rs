use std::sync::Arc;

use crate::pipeline::transport::{ChatTransport, MessageRef};

/// The job's editable status message.
///
/// Edits are skipped when the text did not change, and edit failures are
/// only logged: a stale status line never fails a job.
pub struct StatusMessage {
    transport: Arc<dyn ChatTransport>,
    message: MessageRef,
    last: Option<String>,
}

impl StatusMessage {
    pub fn new(transport: Arc<dyn ChatTransport>, message: MessageRef) -> Self {
        Self {
            transport,
            message,
            last: None,
        }
    }

    pub fn message(&self) -> MessageRef {
        self.message
    }

    pub async fn set(&mut self, text: &str) {
        if self.last.as_deref() == Some(text) {
            return;
        }
        match self.transport.edit_message(self.message, text).await {
            Ok(()) => self.last = Some(text.to_string()),
            Err(e) => log::warn!(
                "failed to edit status message {} in chat {}: {}",
                self.message.message_id,
                self.message.chat_id,
                e
            ),
        }
    }

    /// Progress edits bypass `set`; forget the cached text so the next `set` always lands.
    pub fn invalidate(&mut self) {
        self.last = None;
    }
}
