//! Shared constants for end-to-end tests

/// Minimal JPEG header, enough for MIME sniffing.
pub const JPEG_FRAME: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, 0x4A, 0x46, 0x49, 0x46];

pub const TEST_API_KEY: &str = "sk-test-key";
pub const TEST_MODEL: &str = "gpt-3.5-turbo";

pub const SEARCH_BASE_URL: &str = "https://open.spotify.com/search/";

pub const REQUEST_TIMEOUT_SECS: u64 = 10;
pub const SERVER_READY_TIMEOUT_MS: u64 = 5000;
pub const SERVER_READY_POLL_INTERVAL_MS: u64 = 20;

pub const GENERIC_NOTICE: &str = "Error getting recommendation. Please try again.";
