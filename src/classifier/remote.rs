//! HuggingFace Inference API zero-shot client
//!
//! Posts `{inputs, parameters: {candidate_labels, multi_label: true}}` to
//! `{endpoint}/models/{model}` and normalizes whichever response shape the
//! endpoint returns into a [`ClassifierResult`].

use super::{ClassifierResult, ZeroShotClassifier};
use crate::ai::BackendError;
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::{json, Value};
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

pub struct HuggingFaceClassifier {
    endpoint: String,
    model: String,
    token: String,
    http_client: Client,
    timeout: Duration,
}

#[derive(Debug, Serialize)]
struct ZeroShotRequest<'a> {
    inputs: &'a str,
    parameters: ZeroShotParameters<'a>,
}

#[derive(Debug, Serialize)]
struct ZeroShotParameters<'a> {
    candidate_labels: &'a [String],
    multi_label: bool,
}

impl HuggingFaceClassifier {
    pub fn new(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, BackendError> {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BackendError::ConfigurationError {
                message: format!("Failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            model: model.into(),
            token: token.into(),
            http_client,
            timeout,
        })
    }

    fn url(&self) -> String {
        format!("{}/models/{}", self.endpoint, self.model)
    }

    /// Checks whether the model endpoint answers at all.
    ///
    /// `Ok(false)` for timeouts, refused connections and non-success statuses.
    pub async fn health_check(&self) -> Result<bool, BackendError> {
        let url = self.url();
        debug!("Checking classifier health at {}", url);

        match self
            .http_client
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await
        {
            Ok(response) => {
                let healthy = response.status().is_success();
                if !healthy {
                    warn!(
                        "Classifier health check failed with status: {}",
                        response.status()
                    );
                }
                Ok(healthy)
            }
            Err(e) if e.is_timeout() || e.is_connect() => {
                warn!("Cannot reach classifier at {}: {}", self.endpoint, e);
                Ok(false)
            }
            Err(e) => Err(BackendError::NetworkError {
                message: format!("Health check failed: {}", e),
            }),
        }
    }
}

#[async_trait]
impl ZeroShotClassifier for HuggingFaceClassifier {
    async fn classify(
        &self,
        summary: &str,
        labels: &[String],
    ) -> Result<ClassifierResult, BackendError> {
        let request = ZeroShotRequest {
            inputs: summary,
            parameters: ZeroShotParameters {
                candidate_labels: labels,
                multi_label: true,
            },
        };

        debug!(
            "Sending zero-shot request: model={}, labels={}, input_chars={}",
            self.model,
            labels.len(),
            summary.len()
        );
        let start = Instant::now();

        let response = self
            .http_client
            .post(self.url())
            .bearer_auth(&self.token)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!("Classifier request error: {}", e);
                BackendError::from_reqwest(&e, self.timeout)
            })?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok());
            let body = response.text().await.unwrap_or_default();
            error!("Classifier returned error status {}: {}", status, body);
            return Err(BackendError::from_status(status.as_u16(), &body, retry_after));
        }

        let body: Value = response.json().await.map_err(|e| {
            error!("Failed to decode classifier response: {}", e);
            BackendError::InvalidResponse {
                message: format!("JSON parse error: {}", e),
                raw_response: None,
            }
        })?;

        let result = normalize_response(&self.model, body)?;
        info!(
            "Classifier answered in {:.2}s with {} labels",
            start.elapsed().as_secs_f64(),
            result.len()
        );
        Ok(result)
    }

    fn name(&self) -> &str {
        "huggingface"
    }

    fn model(&self) -> &str {
        &self.model
    }
}

impl fmt::Debug for HuggingFaceClassifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HuggingFaceClassifier")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Normalizes a zero-shot response into parallel label/score arrays.
///
/// Accepted shapes:
/// - `{"labels": [...], "scores": [...]}`
/// - `[{"labels": [...], "scores": [...]}]`
/// - `[{"label": "...", "score": 0.9}, ...]`
///
/// An `{"error": "..."}` body or anything else is a malformed response.
pub fn normalize_response(model: &str, body: Value) -> Result<ClassifierResult, BackendError> {
    let malformed = |message: &str, body: &Value| BackendError::InvalidResponse {
        message: message.to_string(),
        raw_response: Some(body.to_string().chars().take(500).collect()),
    };

    match &body {
        Value::Object(map) => {
            if let Some(err) = map.get("error") {
                return Err(BackendError::ApiError {
                    message: err.as_str().map(str::to_string).unwrap_or_else(|| err.to_string()),
                    status_code: None,
                });
            }
            let (labels, scores) = parallel_arrays(&body)
                .ok_or_else(|| malformed("expected labels and scores arrays", &body))?;
            ClassifierResult::from_parallel(model, labels, scores, json!({"response": body.clone()}))
        }
        Value::Array(items) => match items.first() {
            None => Ok(ClassifierResult::empty(model, json!({"response": body.clone()}))),
            Some(first) if first.get("labels").is_some() => {
                let (labels, scores) = parallel_arrays(first)
                    .ok_or_else(|| malformed("expected labels and scores arrays", &body))?;
                ClassifierResult::from_parallel(model, labels, scores, json!({"response": body.clone()}))
            }
            Some(_) => {
                let mut pairs = Vec::with_capacity(items.len());
                for item in items {
                    let label = item.get("label").and_then(Value::as_str);
                    let score = item.get("score").and_then(Value::as_f64);
                    match (label, score) {
                        (Some(l), Some(s)) => pairs.push((l.to_string(), s)),
                        _ => return Err(malformed("expected label/score objects", &body)),
                    }
                }
                Ok(ClassifierResult::from_pairs(
                    model,
                    pairs,
                    json!({"response": body.clone()}),
                ))
            }
        },
        _ => Err(malformed("unexpected response type", &body)),
    }
}

fn parallel_arrays(value: &Value) -> Option<(Vec<String>, Vec<f64>)> {
    let labels = value
        .get("labels")?
        .as_array()?
        .iter()
        .map(|v| v.as_str().map(str::to_string))
        .collect::<Option<Vec<_>>>()?;
    let scores = value
        .get("scores")?
        .as_array()?
        .iter()
        .map(Value::as_f64)
        .collect::<Option<Vec<_>>>()?;
    Some((labels, scores))
}
