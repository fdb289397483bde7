//! The multiple-choice question record and its validator.
//!
//! LLM output is untrusted. Each record the model returns goes through
//! [`McqItem::from_record`], which applies the defaults for `source` and
//! `difficulty`, rejects questions that are about authorship or citations
//! rather than the material, and enforces the A–D schema. A bad record is
//! dropped on its own; its siblings in the same batch are unaffected.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Substrings that mark a question as being about the document's authorship
/// or citations. Matched against the lower-cased question text.
pub const CITATION_MARKERS: &[&str] = &[
    "author",
    "wrote",
    "published",
    "cited",
    "reference",
    "et al",
    "citation",
    "paper",
    "article",
    "researcher",
    "study by",
    "according to",
];

/// Bracketed numerals (`[12]`) and "Author et al., 2020" forms.
static RE_CITATION_IN_QUESTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\[\s*\d+\s*\]|[a-z]+(?:,? \w+)* et al\.?,? \d{4}").unwrap()
});

/// Why a single candidate record was rejected.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("record is not a JSON object")]
    NotAnObject,

    #[error("missing or non-string field '{0}'")]
    MissingField(&'static str),

    #[error("question text is empty")]
    EmptyQuestion,

    #[error("question mentions authorship/citation ('{0}')")]
    CitationMarker(&'static str),

    #[error("question contains a citation reference")]
    CitationPattern,

    #[error("options must contain exactly keys A, B, C and D: {0}")]
    InvalidOptions(String),

    #[error("correct answer must be A, B, C or D, got '{0}'")]
    InvalidAnswer(String),

    #[error("difficulty must be Easy, Moderate or Hard, got '{0}'")]
    InvalidDifficulty(String),

    #[error("source must be PDF or Predefined, got '{0}'")]
    InvalidSource(String),
}

// ── Enums ────────────────────────────────────────────────────────────────

/// One of the four answer labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AnswerLabel {
    A,
    B,
    C,
    D,
}

impl AnswerLabel {
    pub const ALL: [AnswerLabel; 4] = [AnswerLabel::A, AnswerLabel::B, AnswerLabel::C, AnswerLabel::D];

    pub fn as_str(self) -> &'static str {
        match self {
            AnswerLabel::A => "A",
            AnswerLabel::B => "B",
            AnswerLabel::C => "C",
            AnswerLabel::D => "D",
        }
    }
}

impl FromStr for AnswerLabel {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "A" => Ok(AnswerLabel::A),
            "B" => Ok(AnswerLabel::B),
            "C" => Ok(AnswerLabel::C),
            "D" => Ok(AnswerLabel::D),
            other => Err(ValidationError::InvalidAnswer(other.to_string())),
        }
    }
}

/// Requested or reported difficulty of a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Difficulty {
    Easy,
    Moderate,
    #[default]
    Hard,
}

impl Difficulty {
    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Easy => "Easy",
            Difficulty::Moderate => "Moderate",
            Difficulty::Hard => "Hard",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Easy" => Ok(Difficulty::Easy),
            "Moderate" => Ok(Difficulty::Moderate),
            "Hard" => Ok(Difficulty::Hard),
            other => Err(ValidationError::InvalidDifficulty(other.to_string())),
        }
    }
}

/// Where a question came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Source {
    #[default]
    #[serde(rename = "PDF")]
    Pdf,
    Predefined,
}

impl Source {
    pub fn as_str(self) -> &'static str {
        match self {
            Source::Pdf => "PDF",
            Source::Predefined => "Predefined",
        }
    }
}

impl FromStr for Source {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PDF" => Ok(Source::Pdf),
            "Predefined" => Ok(Source::Predefined),
            other => Err(ValidationError::InvalidSource(other.to_string())),
        }
    }
}

// ── Record ───────────────────────────────────────────────────────────────

/// A validated multiple-choice question.
///
/// Fields are private: an `McqItem` can only be obtained through
/// [`McqItem::new`] or [`McqItem::from_record`], both of which validate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct McqItem {
    question: String,
    options: BTreeMap<AnswerLabel, String>,
    correct_answer: AnswerLabel,
    explanation: String,
    source: Source,
    difficulty: Difficulty,
}

impl McqItem {
    /// Build an item from already-typed parts.
    ///
    /// Still runs the question-content checks and the options/answer
    /// consistency check.
    pub fn new(
        question: impl Into<String>,
        options: BTreeMap<AnswerLabel, String>,
        correct_answer: AnswerLabel,
        explanation: impl Into<String>,
        source: Source,
        difficulty: Difficulty,
    ) -> Result<Self, ValidationError> {
        let question = question.into();
        check_question(&question)?;
        if options.len() != AnswerLabel::ALL.len() {
            return Err(ValidationError::InvalidOptions(format!(
                "expected 4 options, got {}",
                options.len()
            )));
        }
        if !options.contains_key(&correct_answer) {
            return Err(ValidationError::InvalidAnswer(
                correct_answer.as_str().to_string(),
            ));
        }
        Ok(Self {
            question,
            options,
            correct_answer,
            explanation: explanation.into(),
            source,
            difficulty,
        })
    }

    /// Validate one raw JSON record returned by the model.
    ///
    /// Absent `source` defaults to `PDF`; absent `difficulty` defaults to
    /// `requested`, the difficulty the prompt asked for.
    pub fn from_record(record: &Value, requested: Difficulty) -> Result<Self, ValidationError> {
        let obj = record.as_object().ok_or(ValidationError::NotAnObject)?;

        let question = str_field(obj, "question")?;
        check_question(question)?;

        let options = parse_options(obj.get("options"))?;

        let correct_answer: AnswerLabel = str_field(obj, "correct_answer")?.parse()?;
        let explanation = str_field(obj, "explanation")?;

        let source = match obj.get("source") {
            None => Source::Pdf,
            Some(Value::String(s)) => s.parse()?,
            Some(other) => return Err(ValidationError::InvalidSource(other.to_string())),
        };
        let difficulty = match obj.get("difficulty") {
            None => requested,
            Some(Value::String(s)) => s.parse()?,
            Some(other) => return Err(ValidationError::InvalidDifficulty(other.to_string())),
        };

        Self::new(question, options, correct_answer, explanation, source, difficulty)
    }

    pub fn question(&self) -> &str {
        &self.question
    }

    pub fn options(&self) -> &BTreeMap<AnswerLabel, String> {
        &self.options
    }

    pub fn option(&self, label: AnswerLabel) -> Option<&str> {
        self.options.get(&label).map(String::as_str)
    }

    pub fn correct_answer(&self) -> AnswerLabel {
        self.correct_answer
    }

    pub fn explanation(&self) -> &str {
        &self.explanation
    }

    pub fn source(&self) -> Source {
        self.source
    }

    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }
}

fn str_field<'a>(obj: &'a Map<String, Value>, key: &'static str) -> Result<&'a str, ValidationError> {
    obj.get(key)
        .and_then(Value::as_str)
        .ok_or(ValidationError::MissingField(key))
}

/// Reject empty questions and questions about authorship or citations.
pub fn check_question(question: &str) -> Result<(), ValidationError> {
    if question.trim().is_empty() {
        return Err(ValidationError::EmptyQuestion);
    }
    let lower = question.to_lowercase();
    if let Some(marker) = CITATION_MARKERS.iter().copied().find(|m| lower.contains(m)) {
        return Err(ValidationError::CitationMarker(marker));
    }
    if RE_CITATION_IN_QUESTION.is_match(question) {
        return Err(ValidationError::CitationPattern);
    }
    Ok(())
}

fn parse_options(value: Option<&Value>) -> Result<BTreeMap<AnswerLabel, String>, ValidationError> {
    let obj = match value {
        None => return Err(ValidationError::MissingField("options")),
        Some(Value::Object(obj)) => obj,
        Some(_) => {
            return Err(ValidationError::InvalidOptions(
                "options is not an object".to_string(),
            ))
        }
    };

    let mut options = BTreeMap::new();
    for (key, text) in obj {
        let label: AnswerLabel = key
            .parse()
            .map_err(|_| ValidationError::InvalidOptions(format!("unexpected key '{key}'")))?;
        let text = text.as_str().ok_or_else(|| {
            ValidationError::InvalidOptions(format!("option {key} is not a string"))
        })?;
        options.insert(label, text.to_string());
    }

    if let Some(missing) = AnswerLabel::ALL.iter().find(|l| !options.contains_key(l)) {
        return Err(ValidationError::InvalidOptions(format!(
            "missing key '{}'",
            missing.as_str()
        )));
    }
    Ok(options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid_record() -> Value {
        json!({
            "question": "Which data structure gives O(1) average lookup by key?",
            "options": {
                "A": "Linked list",
                "B": "Hash table",
                "C": "Binary heap",
                "D": "Stack"
            },
            "correct_answer": "B",
            "explanation": "Hash tables index buckets by hashing the key.",
            "source": "PDF",
            "difficulty": "Hard"
        })
    }

    #[test]
    fn accepts_valid_record() {
        let item = McqItem::from_record(&valid_record(), Difficulty::Hard).unwrap();
        assert_eq!(item.correct_answer(), AnswerLabel::B);
        assert_eq!(item.option(AnswerLabel::B), Some("Hash table"));
        assert_eq!(item.source(), Source::Pdf);
    }

    #[test]
    fn rejects_et_al_in_any_case() {
        for q in [
            "What did Smith et al show about caching?",
            "What did Smith ET AL. show about caching?",
            "What did Smith Et Al report?",
        ] {
            let mut rec = valid_record();
            rec["question"] = json!(q);
            let err = McqItem::from_record(&rec, Difficulty::Hard).unwrap_err();
            assert!(
                matches!(err, ValidationError::CitationMarker("et al")),
                "{q}: {err:?}"
            );
        }
    }

    #[test]
    fn rejects_each_citation_marker() {
        for marker in CITATION_MARKERS {
            let mut rec = valid_record();
            rec["question"] = json!(format!("Which claim is made {marker} here?"));
            assert!(McqItem::from_record(&rec, Difficulty::Hard).is_err(), "{marker}");
        }
    }

    #[test]
    fn rejects_bracketed_citation_number() {
        let mut rec = valid_record();
        rec["question"] = json!("Which method does [12] propose for hashing?");
        assert_eq!(
            McqItem::from_record(&rec, Difficulty::Hard).unwrap_err(),
            ValidationError::CitationPattern
        );
    }

    #[test]
    fn rejects_missing_option_c_even_with_answer_a() {
        let mut rec = valid_record();
        rec["correct_answer"] = json!("A");
        rec["options"].as_object_mut().unwrap().remove("C");
        let err = McqItem::from_record(&rec, Difficulty::Hard).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidOptions(_)), "{err:?}");
    }

    #[test]
    fn rejects_extra_option_key() {
        let mut rec = valid_record();
        rec["options"]["E"] = json!("Queue");
        assert!(matches!(
            McqItem::from_record(&rec, Difficulty::Hard).unwrap_err(),
            ValidationError::InvalidOptions(_)
        ));
    }

    #[test]
    fn rejects_bad_answer_label() {
        let mut rec = valid_record();
        rec["correct_answer"] = json!("E");
        assert_eq!(
            McqItem::from_record(&rec, Difficulty::Hard).unwrap_err(),
            ValidationError::InvalidAnswer("E".into())
        );
    }

    #[test]
    fn rejects_bad_difficulty_and_source() {
        let mut rec = valid_record();
        rec["difficulty"] = json!("Extreme");
        assert!(matches!(
            McqItem::from_record(&rec, Difficulty::Hard).unwrap_err(),
            ValidationError::InvalidDifficulty(_)
        ));

        let mut rec = valid_record();
        rec["source"] = json!("Web");
        assert!(matches!(
            McqItem::from_record(&rec, Difficulty::Hard).unwrap_err(),
            ValidationError::InvalidSource(_)
        ));
    }

    #[test]
    fn applies_defaults_for_source_and_difficulty() {
        let mut rec = valid_record();
        let obj = rec.as_object_mut().unwrap();
        obj.remove("source");
        obj.remove("difficulty");
        let item = McqItem::from_record(&rec, Difficulty::Moderate).unwrap();
        assert_eq!(item.source(), Source::Pdf);
        assert_eq!(item.difficulty(), Difficulty::Moderate);
    }

    #[test]
    fn rejects_missing_explanation() {
        let mut rec = valid_record();
        rec.as_object_mut().unwrap().remove("explanation");
        assert_eq!(
            McqItem::from_record(&rec, Difficulty::Hard).unwrap_err(),
            ValidationError::MissingField("explanation")
        );
    }

    #[test]
    fn rejects_empty_question_and_non_object() {
        let mut rec = valid_record();
        rec["question"] = json!("   ");
        assert_eq!(
            McqItem::from_record(&rec, Difficulty::Hard).unwrap_err(),
            ValidationError::EmptyQuestion
        );
        assert_eq!(
            McqItem::from_record(&json!(["not", "an", "object"]), Difficulty::Hard).unwrap_err(),
            ValidationError::NotAnObject
        );
    }

    #[test]
    fn serializes_with_wire_field_names() {
        let item = McqItem::from_record(&valid_record(), Difficulty::Hard).unwrap();
        let v = serde_json::to_value(&item).unwrap();
        assert_eq!(v["source"], "PDF");
        assert_eq!(v["difficulty"], "Hard");
        assert_eq!(v["correct_answer"], "B");
        assert_eq!(v["options"]["D"], "Stack");
    }
}
