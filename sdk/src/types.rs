//! Request, candidate, and result types
//!
//! These types flow through the generation pipeline:
//! `VariantRequest` → `KnowledgePoint` → `VariationDirective`s →
//! `VariantCandidate`s (checked into `ValidationOutcome`s) → `VariantResult`.

use crate::errors::VariantError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Smallest number of variants a caller may request
pub const MIN_VARIANT_COUNT: u8 = 1;

/// Largest number of variants a caller may request
pub const MAX_VARIANT_COUNT: u8 = 5;

/// Number of variants generated when the caller does not say
pub const DEFAULT_VARIANT_COUNT: u8 = 3;

/// One validated inbound generation request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantRequest {
    /// Source question text, trimmed and non-empty
    pub question: String,

    /// Requested number of variants, within `MIN_VARIANT_COUNT..=MAX_VARIANT_COUNT`
    pub num: u8,
}

impl VariantRequest {
    /// Build a request, enforcing the shape rules
    pub fn new(question: impl AsRef<str>, num: i64) -> Result<Self, VariantError> {
        let question = question.as_ref().trim();
        if question.is_empty() {
            return Err(VariantError::Validation(
                "`question` must be a non-empty string".to_string(),
            ));
        }

        let range = i64::from(MIN_VARIANT_COUNT)..=i64::from(MAX_VARIANT_COUNT);
        if !range.contains(&num) {
            return Err(VariantError::Validation(format!(
                "`num` must be an integer between {} and {}",
                MIN_VARIANT_COUNT, MAX_VARIANT_COUNT
            )));
        }

        Ok(Self {
            question: question.to_string(),
            num: num as u8,
        })
    }
}

/// The tested concept shared by the source question and all its variants
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgePoint {
    pub name: String,
    pub summary: String,
}

/// The dimension along which a variant departs from the source question
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FocusAxis {
    /// Change the situation the question is set in
    Scenario,

    /// Rephrase how the question is asked
    Wording,

    /// Change the quantities involved
    Numeric,

    /// Change a supporting detail of the context
    ContextDetail,
}

impl FocusAxis {
    /// All axes in assignment order
    pub const ALL: [FocusAxis; 4] = [
        FocusAxis::Scenario,
        FocusAxis::Wording,
        FocusAxis::Numeric,
        FocusAxis::ContextDetail,
    ];

    /// Axis for the directive at `index`, cycling once the axes run out
    pub fn for_index(index: usize) -> Self {
        Self::ALL[index % Self::ALL.len()]
    }

    /// Short label used in prompts and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            FocusAxis::Scenario => "scenario",
            FocusAxis::Wording => "wording",
            FocusAxis::Numeric => "numeric",
            FocusAxis::ContextDetail => "context-detail",
        }
    }

    /// Instruction describing what changing along this axis means
    pub fn describe(&self) -> &'static str {
        match self {
            FocusAxis::Scenario => {
                "place the same rule in a different real-world situation"
            }
            FocusAxis::Wording => {
                "ask about the same rule with different framing and sentence structure"
            }
            FocusAxis::Numeric => {
                "change the numbers, distances, speeds or quantities involved (or introduce them)"
            }
            FocusAxis::ContextDetail => {
                "change a supporting detail such as time of day, weather, road type or road user"
            }
        }
    }
}

impl fmt::Display for FocusAxis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Instruction for producing one variant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariationDirective {
    /// Stable id within the request (`d1`, `d2`, ...)
    pub id: String,

    /// Axis this variant changes
    pub axis: FocusAxis,

    /// Planner-written guidance, unique within the plan
    pub guidance: String,
}

/// Answer option label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OptionLetter {
    A,
    B,
    C,
    D,
}

impl OptionLetter {
    /// All labels in display order
    pub const ALL: [OptionLetter; 4] = [
        OptionLetter::A,
        OptionLetter::B,
        OptionLetter::C,
        OptionLetter::D,
    ];

    /// Zero-based position of the option
    pub fn index(&self) -> usize {
        match self {
            OptionLetter::A => 0,
            OptionLetter::B => 1,
            OptionLetter::C => 2,
            OptionLetter::D => 3,
        }
    }

    pub fn as_char(&self) -> char {
        match self {
            OptionLetter::A => 'A',
            OptionLetter::B => 'B',
            OptionLetter::C => 'C',
            OptionLetter::D => 'D',
        }
    }

    pub fn from_char(c: char) -> Option<Self> {
        match c.to_ascii_uppercase() {
            'A' => Some(OptionLetter::A),
            'B' => Some(OptionLetter::B),
            'C' => Some(OptionLetter::C),
            'D' => Some(OptionLetter::D),
            _ => None,
        }
    }

    /// Parse a model-written answer label
    ///
    /// Accepts `"B"`, `"b"`, `"(B)"`, `"B)"`, `"B. text"` and `"Option B"`.
    /// Rejects words that merely start with a letter, such as `"Answer"`.
    pub fn parse(raw: &str) -> Option<Self> {
        let mut s = raw.trim();
        if let Some(prefix) = s.get(..7) {
            if prefix.eq_ignore_ascii_case("option ") {
                s = s[7..].trim_start();
            }
        }
        let s = s.trim_start_matches('(');

        let mut chars = s.chars();
        let letter = Self::from_char(chars.next()?)?;
        match chars.next() {
            None => Some(letter),
            Some(next) if !next.is_alphanumeric() => Some(letter),
            Some(_) => None,
        }
    }
}

impl fmt::Display for OptionLetter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// One drafted attempt for a directive, prior to validation
///
/// Fields are kept as the model wrote them (trimmed) so that the validator
/// can report every problem; nothing here is guaranteed well-formed.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VariantCandidate {
    pub directive_id: String,
    pub attempt: u32,
    pub prompt: String,
    pub options: Vec<String>,
    pub correct_option: String,
    pub explanation: String,
}

impl VariantCandidate {
    /// Parsed answer label, if the raw value is one of A-D
    pub fn correct_letter(&self) -> Option<OptionLetter> {
        OptionLetter::parse(&self.correct_option)
    }

    /// Text of the option with the given label
    pub fn option_text(&self, letter: OptionLetter) -> Option<&str> {
        self.options.get(letter.index()).map(String::as_str)
    }

    /// Prompt and options joined, used for similarity comparisons
    pub fn comparison_text(&self) -> String {
        let mut text = self.prompt.clone();
        for option in &self.options {
            text.push(' ');
            text.push_str(option);
        }
        text
    }

    /// Convert into the wire shape
    ///
    /// Returns `None` unless there are exactly four options and a valid
    /// answer label; call only on candidates that passed validation.
    pub fn to_question(&self) -> Option<VariantQuestion> {
        let [a, b, c, d] = <&[String; 4]>::try_from(self.options.as_slice()).ok()?;
        Some(VariantQuestion {
            prompt: self.prompt.clone(),
            option_a: a.clone(),
            option_b: b.clone(),
            option_c: c.clone(),
            option_d: d.clone(),
            correct_option: self.correct_letter()?,
            explanation: self.explanation.clone(),
        })
    }
}

/// Result of checking one candidate
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ValidationOutcome {
    pub passed: bool,

    /// Human-readable reasons in check order; fed back to the next draft
    pub violations: Vec<String>,
}

impl ValidationOutcome {
    pub fn from_violations(violations: Vec<String>) -> Self {
        Self {
            passed: violations.is_empty(),
            violations,
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self::from_violations(vec![reason.into()])
    }
}

/// Token accounting for one upstream call, or the sum of many
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UsageRecord {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub reasoning_tokens: u64,
    pub total_tokens: u64,
}

impl UsageRecord {
    pub fn new(input: u64, output: u64, reasoning: u64, total: u64) -> Self {
        Self {
            input_tokens: input,
            output_tokens: output,
            reasoning_tokens: reasoning,
            total_tokens: total,
        }
    }

    /// Field-wise sum, saturating on overflow
    pub fn merge(&mut self, other: &UsageRecord) {
        self.input_tokens = self.input_tokens.saturating_add(other.input_tokens);
        self.output_tokens = self.output_tokens.saturating_add(other.output_tokens);
        self.reasoning_tokens = self.reasoning_tokens.saturating_add(other.reasoning_tokens);
        self.total_tokens = self.total_tokens.saturating_add(other.total_tokens);
    }
}

/// One accepted variant in the response body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantQuestion {
    pub prompt: String,
    pub option_a: String,
    pub option_b: String,
    pub option_c: String,
    pub option_d: String,
    pub correct_option: OptionLetter,
    pub explanation: String,
}

/// Final payload returned to the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantResult {
    pub knowledge_point_name: String,
    pub knowledge_point_summary: String,
    pub variant_questions: Vec<VariantQuestion>,

    /// Elapsed milliseconds from request acceptance to assembly
    pub time: u64,

    pub usage: UsageRecord,

    /// Directives that produced no question; only ever non-empty when
    /// partial results were explicitly enabled
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unmet_directives: Vec<String>,
}
