use super::RequestsLoggingLevel;
use crate::config::DEFAULT_MAX_FRAME_BYTES;
use crate::recommendation::Language;

#[derive(Clone)]
pub struct ServerConfig {
    pub requests_logging_level: RequestsLoggingLevel,
    pub port: u16,
    /// Used when a recommendation request names no language.
    pub default_language: Language,
    /// Upper bound on an uploaded frame.
    pub max_frame_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            requests_logging_level: RequestsLoggingLevel::Path,
            port: 3005,
            default_language: Language::default(),
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
        }
    }
}
