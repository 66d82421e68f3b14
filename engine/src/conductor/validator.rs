//! Candidate Validator
//!
//! Local, deterministic checks over one drafted candidate. Violations are
//! reported in check order and are fed verbatim to the next draft attempt,
//! so each one says what is wrong in terms the model can act on.
//!
//! The validator also owns the request's accepted set. [`Validator::try_accept`]
//! repeats the near-duplicate check under the same lock that inserts, so two
//! directives finishing together cannot both accept the same question.

use crate::config::GenerationConfig;
use regex::Regex;
use sdk::types::{OptionLetter, ValidationOutcome, VariantCandidate};
use std::collections::HashSet;
use std::sync::{Mutex, OnceLock};

/// Phrases that give away how a question was produced
const BUILTIN_BANNED_PHRASES: [&str; 9] = [
    "as an ai",
    "ai model",
    "language model",
    "chatgpt",
    "openai",
    "generated by",
    "variant question",
    "original question",
    "source question",
];

type Bigrams = HashSet<(char, char)>;

static ANSWER_CLAIMS: OnceLock<Vec<Regex>> = OnceLock::new();

/// Patterns that name a specific option as the right one
fn answer_claims() -> &'static [Regex] {
    ANSWER_CLAIMS.get_or_init(|| {
        [
            // "Option B is correct", "answer (C) is the right one"
            r"(?i:\b(?:option|answer|choice)\s*)\(?([A-D])\)?\s+(?i:is\s+(?:the\s+)?(?:correct|right))",
            // "The correct answer is B", "correct option is option D"
            r"(?i:\bcorrect\s+(?:answer|option|choice)\s+is\s+(?:option\s+)?)\(?([A-D])\b",
            r"(?:正确答案|答案)\s*[是为:：]?\s*([A-D])",
        ]
        .iter()
        .filter_map(|pattern| Regex::new(pattern).ok())
        .collect()
    })
}

struct AcceptedEntry {
    directive_id: String,
    bigrams: Bigrams,
}

pub struct Validator {
    source_bigrams: Bigrams,
    threshold: f64,
    banned_phrases: Vec<String>,
    accepted: Mutex<Vec<AcceptedEntry>>,
}

impl Validator {
    /// Build a validator for one request
    ///
    /// `model` is added to the banned phrases so a candidate never names it.
    /// Phrases only match as whole terms.
    pub fn new(source_question: &str, config: &GenerationConfig, model: &str) -> Self {
        let mut banned_phrases: Vec<String> = BUILTIN_BANNED_PHRASES
            .iter()
            .map(|p| p.to_string())
            .chain(config.banned_phrases.iter().map(|p| p.trim().to_lowercase()))
            .chain(std::iter::once(model.trim().to_lowercase()))
            .filter(|p| !p.is_empty())
            .collect();
        banned_phrases.dedup();

        Self {
            source_bigrams: bigrams(source_question),
            threshold: config.similarity_threshold,
            banned_phrases,
            accepted: Mutex::new(Vec::new()),
        }
    }

    /// Run every check; `None` means the draft had no structured shape
    pub fn check(&self, drafted: Option<&VariantCandidate>) -> ValidationOutcome {
        let Some(candidate) = drafted else {
            return ValidationOutcome::failed(
                "Response was not a JSON object with prompt, option_a to option_d, \
                 correct_option and explanation",
            );
        };

        let mut violations = Vec::new();

        if candidate.prompt.trim().is_empty() {
            violations.push("Question prompt is empty".to_string());
        }

        let four_options = candidate.options.len() == 4;
        if !four_options {
            violations.push(format!(
                "Expected exactly 4 options (A-D), got {}",
                candidate.options.len()
            ));
        } else {
            self.check_options(candidate, &mut violations);
        }

        let letter = candidate.correct_letter();
        match letter {
            None => violations.push(format!(
                "correct_option must be one of A, B, C, D (got '{}')",
                candidate.correct_option
            )),
            Some(letter) if four_options => {
                if candidate
                    .option_text(letter)
                    .map_or(true, |text| text.trim().is_empty())
                {
                    violations.push(format!("The correct option {} has no text", letter));
                }
            }
            Some(_) => {}
        }

        if candidate.explanation.trim().is_empty() {
            violations.push("Explanation is empty".to_string());
        } else if let Some(letter) = letter {
            if let Some(claimed) = contradicting_claim(&candidate.explanation, letter) {
                violations.push(format!(
                    "Explanation says option {} is correct, but correct_option is {}",
                    claimed, letter
                ));
            }
        }

        if let Some(phrase) = self.banned_phrase_in(candidate) {
            violations.push(format!(
                "Text mentions \"{}\"; the question must not reveal how it was written",
                phrase
            ));
        }

        let candidate_bigrams = bigrams(&candidate.comparison_text());
        let source_similarity = jaccard(&candidate_bigrams, &self.source_bigrams);
        if source_similarity >= self.threshold {
            violations.push(format!(
                "Too similar to the source question (similarity {:.2}); change it more along the focus axis",
                source_similarity
            ));
        }

        if let Some((directive_id, similarity)) = self.closest_accepted(&candidate_bigrams) {
            violations.push(format!(
                "Too similar to the variant already accepted for {} (similarity {:.2})",
                directive_id, similarity
            ));
        }

        ValidationOutcome::from_violations(violations)
    }

    /// Atomically re-check against the accepted set and insert
    ///
    /// Returns the violation when another directive accepted a near-duplicate first.
    pub fn try_accept(&self, candidate: &VariantCandidate) -> Result<(), String> {
        let candidate_bigrams = bigrams(&candidate.comparison_text());
        let mut accepted = self.accepted.lock().unwrap_or_else(|e| e.into_inner());

        for entry in accepted.iter() {
            let similarity = jaccard(&candidate_bigrams, &entry.bigrams);
            if similarity >= self.threshold {
                return Err(format!(
                    "Too similar to the variant already accepted for {} (similarity {:.2})",
                    entry.directive_id, similarity
                ));
            }
        }

        accepted.push(AcceptedEntry {
            directive_id: candidate.directive_id.clone(),
            bigrams: candidate_bigrams,
        });
        Ok(())
    }

    pub fn accepted_count(&self) -> usize {
        self.accepted.lock().map(|a| a.len()).unwrap_or_else(|e| e.into_inner().len())
    }

    fn check_options(&self, candidate: &VariantCandidate, violations: &mut Vec<String>) {
        for letter in OptionLetter::ALL {
            if candidate
                .option_text(letter)
                .map_or(true, |text| text.trim().is_empty())
            {
                violations.push(format!("Option {} is empty", letter));
            }
        }

        // Case-insensitive after trimming; punctuation and signs stay significant
        let folded: Vec<String> = candidate
            .options
            .iter()
            .map(|o| o.trim().to_lowercase())
            .collect();
        for i in 0..folded.len() {
            for j in (i + 1)..folded.len() {
                if !folded[i].is_empty() && folded[i] == folded[j] {
                    violations.push(format!(
                        "Options {} and {} are identical",
                        OptionLetter::ALL[i],
                        OptionLetter::ALL[j]
                    ));
                }
            }
        }
    }

    fn banned_phrase_in(&self, candidate: &VariantCandidate) -> Option<&str> {
        let text = format!(
            "{}\n{}\n{}",
            candidate.prompt,
            candidate.options.join("\n"),
            candidate.explanation
        )
        .to_lowercase();

        self.banned_phrases
            .iter()
            .find(|phrase| contains_term(&text, phrase))
            .map(String::as_str)
    }

    fn closest_accepted(&self, candidate_bigrams: &Bigrams) -> Option<(String, f64)> {
        let accepted = self.accepted.lock().unwrap_or_else(|e| e.into_inner());
        let closest = accepted
            .iter()
            .map(|entry| (entry.directive_id.as_str(), jaccard(candidate_bigrams, &entry.bigrams)))
            .filter(|(_, similarity)| *similarity >= self.threshold)
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(id, similarity)| (id.to_string(), similarity));
        closest
    }
}

/// First option named as correct that differs from `correct`
fn contradicting_claim(explanation: &str, correct: OptionLetter) -> Option<OptionLetter> {
    answer_claims()
        .iter()
        .flat_map(|pattern| pattern.captures_iter(explanation))
        .filter_map(|caps| caps.get(1))
        .filter_map(|m| m.as_str().chars().next().and_then(OptionLetter::from_char))
        .find(|claimed| *claimed != correct)
}

/// `term` occurs in `text` with no letter or digit directly on either side
///
/// Keeps a short model id like `o3` from matching inside `CaCO3`.
fn contains_term(text: &str, term: &str) -> bool {
    if term.is_empty() {
        return false;
    }
    text.match_indices(term).any(|(start, matched)| {
        let before = text[..start].chars().next_back();
        let after = text[start + matched.len()..].chars().next();
        !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
    })
}

/// Lowercase, alphanumerics only, whitespace collapsed
fn normalize(text: &str) -> String {
    text.chars()
        .map(|c| {
            if c.is_alphanumeric() {
                c.to_lowercase().next().unwrap_or(c)
            } else {
                ' '
            }
        })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn bigrams(text: &str) -> Bigrams {
    let chars: Vec<char> = normalize(text).chars().collect();
    chars.windows(2).map(|w| (w[0], w[1])).collect()
}

/// Jaccard index of two bigram sets; 0.0 when both are empty
pub fn jaccard(a: &Bigrams, b: &Bigrams) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / union as f64
}

/// Character-bigram similarity of two texts, in `[0, 1]`
pub fn similarity(a: &str, b: &str) -> f64 {
    jaccard(&bigrams(a), &bigrams(b))
}
