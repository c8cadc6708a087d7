//! HTTP adapter for a remote expression classification service.
//!
//! The service exposes two endpoints:
//! - `POST /models/load` warms up the detector and expression networks.
//! - `POST /classify` takes `{image, content_type}` (image base64-encoded)
//!   and answers `{face_found, expressions}`.

use super::{Classification, ClassifierError, ExpressionClassifier, ModelLifecycle};
use crate::capture::Frame;
use crate::emotion::ExpressionDistribution;
use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

pub struct HttpExpressionClassifier {
    client: Client,
    base_url: String,
    lifecycle: ModelLifecycle,
}

impl HttpExpressionClassifier {
    /// Create a new classifier adapter.
    ///
    /// # Arguments
    /// * `base_url` - Base URL of the classification service (e.g., "http://localhost:8500").
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            client: Client::new(),
            base_url,
            lifecycle: ModelLifecycle::new(),
        }
    }

    async fn load_models(&self) -> Result<(), ClassifierError> {
        let url = format!("{}/models/load", self.base_url);
        let response = self
            .client
            .post(&url)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClassifierError::LoadFailed(format!(
                "status {}: {}",
                status.as_u16(),
                body
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl ExpressionClassifier for HttpExpressionClassifier {
    fn lifecycle(&self) -> &ModelLifecycle {
        &self.lifecycle
    }

    async fn initialize(&self) -> Result<(), ClassifierError> {
        self.lifecycle.ensure_ready(|| self.load_models()).await
    }

    async fn classify(&self, frame: &Frame) -> Result<Classification, ClassifierError> {
        self.initialize().await?;

        let url = format!("{}/classify", self.base_url);
        let request = ClassifyRequest {
            image: base64::engine::general_purpose::STANDARD.encode(frame.bytes()),
            content_type: frame.content_type(),
        };

        debug!(
            frame_bytes = frame.len(),
            content_type = %frame.content_type(),
            "Sending frame to expression classifier"
        );

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClassifierError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let body: ClassifyResponse = response.json().await.map_err(|e| {
            ClassifierError::InvalidResponse(format!("Failed to parse classifier response: {}", e))
        })?;

        let classification = body.into_classification()?;
        debug!(
            face_found = matches!(classification, Classification::Face(_)),
            "Received classifier response"
        );
        Ok(classification)
    }
}

fn map_transport_error(e: reqwest::Error) -> ClassifierError {
    if e.is_timeout() {
        ClassifierError::Timeout
    } else {
        ClassifierError::Connection(e.to_string())
    }
}

#[derive(Debug, Serialize)]
struct ClassifyRequest<'a> {
    image: String,
    content_type: &'a str,
}

#[derive(Debug, Deserialize)]
struct ClassifyResponse {
    face_found: bool,
    #[serde(default)]
    expressions: Option<HashMap<String, f32>>,
}

impl ClassifyResponse {
    fn into_classification(self) -> Result<Classification, ClassifierError> {
        if !self.face_found {
            return Ok(Classification::NoFaceFound);
        }
        let scores = self.expressions.ok_or_else(|| {
            ClassifierError::InvalidResponse("face found but no expressions returned".to_string())
        })?;
        Ok(Classification::Face(ExpressionDistribution::from_scores(
            &scores,
        )?))
    }
}
