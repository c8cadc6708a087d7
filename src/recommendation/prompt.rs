use super::RecommendationRequest;

/// Build the single prompt sent to the text service.
pub fn build_prompt(request: &RecommendationRequest) -> String {
    format!(
        "Suggest a {language} song that matches the emotion: {emotion}.\n\
         Return in strict JSON format with only these fields:\n\
         {{\n\
         \x20 \"title\": \"song title\",\n\
         \x20 \"artist\": \"artist name\",\n\
         \x20 \"language\": \"{language}\",\n\
         \x20 \"searchQuery\": \"song title artist name\"\n\
         }}\n\
         Respond with the JSON object only, without any other text.\n\
         Choose a popular, well-known song that strongly matches the emotional tone.",
        language = request.language,
        emotion = request.emotion,
    )
}
