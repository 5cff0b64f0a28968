//! Replicate streaming predictions.
//!
//! A prediction is created with `stream: true`; the response carries a
//! server-sent-events URL that emits `output` events with text fragments,
//! an `error` event on failure and a final `done` event. The stream is read
//! until one of those ends it; there is no idle timeout.

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::StreamExt;
use reqwest::header::{ACCEPT, CACHE_CONTROL};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::mpsc;

use arctic_core::config::ModelConfig;

use crate::error::ChatError;
use crate::inference::{FragmentReceiver, InferenceClient, InferenceRequest, FRAGMENT_BUFFER};

#[derive(Debug, Deserialize)]
struct Prediction {
    id: String,
    #[serde(default)]
    urls: PredictionUrls,
}

#[derive(Debug, Default, Deserialize)]
struct PredictionUrls {
    stream: Option<String>,
}

/// Classified server-sent event of a prediction stream.
#[derive(Debug, PartialEq)]
enum StreamEvent {
    Output(String),
    Error(String),
    Done,
    Ignored,
}

fn classify_event(event: &str, data: String) -> StreamEvent {
    match event {
        "output" => StreamEvent::Output(data),
        "error" => StreamEvent::Error(data),
        "done" => StreamEvent::Done,
        _ => StreamEvent::Ignored,
    }
}

/// Client for the Replicate predictions API.
pub struct ReplicateClient {
    client: reqwest::Client,
    api_base: String,
    token: String,
}

impl ReplicateClient {
    pub fn new(config: &ModelConfig, token: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            token: token.to_string(),
        }
    }

    fn predictions_url(&self, model: &str) -> String {
        format!("{}/models/{}/predictions", self.api_base, model)
    }

    async fn create_prediction(&self, request: &InferenceRequest) -> Result<Prediction, ChatError> {
        let body = json!({
            "input": {
                "prompt": request.prompt,
                "prompt_template": request.prompt_template,
                "temperature": request.temperature,
                "top_p": request.top_p,
            },
            "stream": true,
        });

        let response = self
            .client
            .post(self.predictions_url(&request.model))
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(ChatError::Inference(format!(
                "prediction request failed ({}): {}",
                status, detail
            )));
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl InferenceClient for ReplicateClient {
    async fn stream(&self, request: InferenceRequest) -> Result<FragmentReceiver, ChatError> {
        let prediction = self.create_prediction(&request).await?;
        let stream_url = prediction.urls.stream.ok_or_else(|| {
            ChatError::Inference(format!("prediction {} has no stream URL", prediction.id))
        })?;

        tracing::debug!(
            prediction_id = %prediction.id,
            model = %request.model,
            "Prediction created, opening event stream"
        );

        let response = self
            .client
            .get(&stream_url)
            .header(ACCEPT, "text/event-stream")
            .header(CACHE_CONTROL, "no-store")
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(ChatError::Inference(format!(
                "event stream request failed ({})",
                response.status()
            )));
        }

        let (tx, rx) = mpsc::channel(FRAGMENT_BUFFER);
        tokio::spawn(forward_events(response, tx, prediction.id));
        Ok(rx)
    }
}

async fn forward_events(
    response: reqwest::Response,
    tx: mpsc::Sender<Result<String, ChatError>>,
    prediction_id: String,
) {
    let mut events = response.bytes_stream().eventsource();
    loop {
        let event = match events.next().await {
            Some(Ok(event)) => event,
            None => return,
            Some(Err(e)) => {
                tracing::error!(prediction_id = %prediction_id, error = %e, "Event stream failed");
                let _ = tx
                    .send(Err(ChatError::Inference(format!("event stream error: {}", e))))
                    .await;
                return;
            }
        };

        match classify_event(&event.event, event.data) {
            StreamEvent::Output(fragment) => {
                if tx.send(Ok(fragment)).await.is_err() {
                    return;
                }
            }
            StreamEvent::Error(detail) => {
                tracing::error!(prediction_id = %prediction_id, detail = %detail, "Prediction failed");
                let _ = tx.send(Err(ChatError::Inference(detail))).await;
                return;
            }
            StreamEvent::Done => {
                tracing::debug!(prediction_id = %prediction_id, "Prediction stream done");
                return;
            }
            StreamEvent::Ignored => {}
        }
    }
}
