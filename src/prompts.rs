//! Prompt text for question generation and keyword extraction.
//!
//! Every string the model sees is defined here so prompt changes never touch
//! the retry or parsing code. The question system prompt can be overridden
//! through [`crate::config::GenerationConfig::system_prompt`]; the keyword
//! prompt is fixed.

use crate::mcq::Difficulty;

/// Default system prompt for question generation.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are an MCQ generator specialized in creating valid JSON \
and technical questions. Never create questions about paper authors, citations, or references.";

/// System prompt for keyword extraction.
pub const KEYWORD_SYSTEM_PROMPT: &str = "You are a technical keyword extractor.";

/// Build the user prompt asking for `count` questions about `chunk`.
///
/// `keywords` should already be limited to the handful worth mentioning;
/// an empty slice leaves the topic hint blank.
pub fn mcq_prompt(chunk: &str, count: usize, difficulty: Difficulty, keywords: &[&str]) -> String {
    let keyword_text = keywords.join(", ");
    let label = difficulty.as_str();
    format!(
        r#"Create exactly {count} {lower} MCQs from this text:
{chunk}

IMPORTANT INSTRUCTIONS:
1. DO NOT create questions about authors, citations, publication dates, or references
2. DO NOT ask about who wrote or published the content
3. DO NOT create questions that refer to specific citations like [1], [2], etc.
4. Focus on technical content, concepts, methods, and applications
5. If possible, focus on these key topics: {keyword_text}

For each MCQ, follow this JSON format EXACTLY:
{{
    "question": "Clear, concise question based on the technical content",
    "options": {{
        "A": "First option",
        "B": "Second option",
        "C": "Third option",
        "D": "Fourth option"
    }},
    "correct_answer": "A, B, C, or D",
    "explanation": "Brief explanation of why the answer is correct",
    "source": "PDF",
    "difficulty": "{label}"
}}

Return a JSON array containing {count} MCQ objects."#,
        lower = label.to_lowercase(),
    )
}

/// Build the user prompt for keyword extraction over `text`.
pub fn keyword_prompt(text: &str) -> String {
    format!(
        "Extract 15-20 most important technical keywords or concepts from this text.\n\
         Focus on subject-specific terminology that represents the core concepts.\n\
         Return ONLY a comma-separated list of these keywords, with no additional text.\n\
         TEXT:\n{text}"
    )
}
