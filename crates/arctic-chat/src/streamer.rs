//! Write-through streaming of a reply into the session transcript.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::error::ChatError;
use crate::inference::{InferenceClient, InferenceRequest};
use crate::session::ChatSession;

/// Drains an inference stream into the last assistant message.
pub struct ResponseStreamer {
    client: Arc<dyn InferenceClient>,
}

impl ResponseStreamer {
    pub fn new(client: Arc<dyn InferenceClient>) -> Self {
        Self { client }
    }

    /// Append an empty assistant message and extend it with every fragment,
    /// forwarding each one to `sink` as it arrives.
    ///
    /// Returns the complete reply. On a transport failure the fragments
    /// received so far stay in the transcript and the error is returned.
    /// A closed sink does not stop the stream.
    pub async fn stream_into(
        &self,
        session: &mut ChatSession,
        request: InferenceRequest,
        sink: Option<&mpsc::Sender<String>>,
    ) -> Result<String, ChatError> {
        let mut fragments = self.client.stream(request).await?;
        session.begin_assistant();

        let mut content = String::new();
        let mut sink_open = sink.is_some();
        while let Some(item) = fragments.recv().await {
            let fragment = match item {
                Ok(fragment) => fragment,
                Err(e) => {
                    tracing::warn!(
                        session_id = %session.id,
                        received_chars = content.len(),
                        error = %e,
                        "Response stream failed"
                    );
                    return Err(e);
                }
            };
            session.append_to_last(&fragment);
            content.push_str(&fragment);

            if sink_open {
                if let Some(tx) = sink {
                    if tx.send(fragment).await.is_err() {
                        tracing::debug!(session_id = %session.id, "Client went away, still streaming");
                        sink_open = false;
                    }
                }
            }
        }
        Ok(content)
    }
}
