use super::{ClassifierResult, ZeroShotClassifier};
use crate::ai::BackendError;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Classifier returning a fixed answer, optionally after a delay
#[derive(Debug)]
pub struct MockClassifier {
    model: String,
    answer: Result<Vec<(String, f64)>, BackendError>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl MockClassifier {
    pub fn scoring(pairs: &[(&str, f64)]) -> Self {
        Self {
            model: "mock-zero-shot".to_string(),
            answer: Ok(pairs.iter().map(|(l, s)| (l.to_string(), *s)).collect()),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(error: BackendError) -> Self {
        Self {
            model: "mock-zero-shot".to_string(),
            answer: Err(error),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Number of `classify` calls received
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ZeroShotClassifier for MockClassifier {
    async fn classify(
        &self,
        _summary: &str,
        _labels: &[String],
    ) -> Result<ClassifierResult, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match &self.answer {
            Ok(pairs) => Ok(ClassifierResult::from_pairs(
                self.model.clone(),
                pairs.clone(),
                Value::Null,
            )),
            Err(e) => Err(e.clone()),
        }
    }

    fn name(&self) -> &str {
        "mock"
    }

    fn model(&self) -> &str {
        &self.model
    }
}
