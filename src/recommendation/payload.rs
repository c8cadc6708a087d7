//! Validating parser for the text service's song payload.

use super::{Language, RecommendationFailure, SongRecommendation};
use serde::Deserialize;
use tracing::debug;

/// Fields the service is asked to return. Anything else in the object,
/// a provider URL included, is ignored.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SongPayload {
    title: Option<String>,
    artist: Option<String>,
    language: Option<String>,
    search_query: Option<String>,
    /// Older name for `searchQuery`, used when `searchQuery` is absent or blank.
    spotify_search_query: Option<String>,
}

/// Turn the raw completion text into a [`SongRecommendation`].
///
/// The whole text (surrounding whitespace aside) must be one JSON object with
/// non-empty string `title`, `artist` and `searchQuery`. The returned language
/// is always `requested`.
pub fn parse_song_payload(
    text: &str,
    requested: Language,
    search_base_url: &str,
) -> Result<SongRecommendation, RecommendationFailure> {
    let payload: SongPayload = serde_json::from_str(text.trim())
        .map_err(|e| RecommendationFailure::MalformedPayload(e.to_string()))?;

    let title = required(payload.title, "title")?;
    let artist = required(payload.artist, "artist")?;
    let search_query = required(payload.search_query, "searchQuery")
        .or_else(|_| required(payload.spotify_search_query, "searchQuery"))?;

    if let Some(stated) = payload.language.as_deref() {
        if !stated.trim().eq_ignore_ascii_case(requested.as_str()) {
            debug!(
                stated = %stated,
                requested = %requested,
                "Service stated a different language, keeping the requested one"
            );
        }
    }

    let provider_url = provider_search_url(search_base_url, &search_query);
    Ok(SongRecommendation {
        title,
        artist,
        language: requested,
        search_query,
        provider_url,
    })
}

/// Streaming provider search link for `query`.
pub fn provider_search_url(search_base_url: &str, query: &str) -> String {
    let separator = if search_base_url.ends_with('/') { "" } else { "/" };
    format!(
        "{}{}{}",
        search_base_url,
        separator,
        urlencoding::encode(query)
    )
}

fn required(value: Option<String>, field: &'static str) -> Result<String, RecommendationFailure> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or(RecommendationFailure::MissingField(field))
}
