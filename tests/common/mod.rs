//! Common test infrastructure
//!
//! Tests should only import from this module, not from internal submodules.
//!
//! # Example
//!
//! ```no_run
//! mod common;
//! use common::{TestClient, TestServer};
//!
//! #[tokio::test]
//! async fn test_recommendation() {
//!     let server = TestServer::spawn().await;
//!     let client = TestClient::new(server.base_url.clone());
//!
//!     client.start_with_frame().await;
//!     let outcome = client.recommend("english").await;
//!     assert_eq!(outcome["outcome"], "ready");
//! }
//! ```

#![allow(dead_code)]

mod client;
mod constants;
mod fakes;
mod server;

// Public API - this is what tests import
pub use client::TestClient;
pub use constants::*;
pub use fakes::{
    ClassifierReply, CompletionReply, FakeClassifierService, FakeOllama, FakeOpenAi,
};
pub use server::TestServer;
