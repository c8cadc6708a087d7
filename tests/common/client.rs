//! HTTP client for end-to-end tests
//!
//! Wraps reqwest with one method per moodtune endpoint. When API routes or
//! request formats change, update only this file.

use super::constants::*;
use reqwest::{Response, StatusCode};
use serde_json::{json, Value};
use std::time::Duration;

pub struct TestClient {
    /// The underlying reqwest client (public for custom requests in tests)
    pub client: reqwest::Client,
    /// The base URL of the test server
    pub base_url: String,
}

impl TestClient {
    pub fn new(base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("Failed to build reqwest client");

        Self { client, base_url }
    }

    pub async fn start_capture(&self) -> Response {
        self.client
            .post(format!("{}/v1/capture/start", self.base_url))
            .send()
            .await
            .expect("Start capture request failed")
    }

    pub async fn stop_capture(&self) -> Response {
        self.client
            .post(format!("{}/v1/capture/stop", self.base_url))
            .send()
            .await
            .expect("Stop capture request failed")
    }

    pub async fn put_frame(&self, bytes: &[u8]) -> Response {
        self.client
            .put(format!("{}/v1/capture/frame", self.base_url))
            .header("content-type", "image/jpeg")
            .body(bytes.to_vec())
            .send()
            .await
            .expect("Frame upload failed")
    }

    /// Start capturing and upload one frame.
    pub async fn start_with_frame(&self) {
        assert_eq!(self.start_capture().await.status(), StatusCode::NO_CONTENT);
        assert_eq!(self.put_frame(JPEG_FRAME).await.status(), StatusCode::NO_CONTENT);
    }

    /// Trigger a cycle and return the outcome body.
    pub async fn recommend(&self, language: &str) -> Value {
        let response = self
            .client
            .post(format!("{}/v1/recommendation", self.base_url))
            .json(&json!({ "language": language }))
            .send()
            .await
            .expect("Recommendation request failed");
        assert_eq!(response.status(), StatusCode::OK);
        response.json().await.expect("Outcome is not JSON")
    }

    pub async fn state(&self) -> Value {
        self.client
            .get(format!("{}/v1/state", self.base_url))
            .send()
            .await
            .expect("State request failed")
            .json()
            .await
            .expect("State is not JSON")
    }

    pub async fn metrics(&self) -> String {
        self.client
            .get(format!("{}/metrics", self.base_url))
            .send()
            .await
            .expect("Metrics request failed")
            .text()
            .await
            .expect("Metrics body unreadable")
    }
}
