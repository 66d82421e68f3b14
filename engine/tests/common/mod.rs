//! Shared fixtures for integration tests
//!
//! `ScriptedProvider` stands in for the completion service. It routes on the
//! request's `CallStage`, records every call, and can inject delays and errors.

#![allow(dead_code)]

use async_trait::async_trait;
use sdk::types::UsageRecord;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use variant_engine::conductor::Conductor;
use variant_engine::config::Config;
use variant_engine::llm::{CallStage, Completion, CompletionRequest, LLMError, LLMProvider};

pub const LANES_QUESTION: &str = "If there are no lanes marked on the road, you should drive \
    near the left / anywhere on your side / along the middle.";

/// Usage reported by every successful scripted call
pub const CALL_USAGE: UsageRecord = UsageRecord {
    input_tokens: 100,
    output_tokens: 50,
    reasoning_tokens: 10,
    total_tokens: 160,
};

/// What the provider does with one request
pub enum Script {
    Reply(String),
    Fail(LLMError),
    Delayed(Duration, Box<Script>),
}

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub stage: CallStage,
    pub text: String,
}

type Responder = Box<dyn Fn(&CompletionRequest) -> Script + Send + Sync>;

pub struct ScriptedProvider {
    responder: Responder,
    calls: Mutex<Vec<RecordedCall>>,
    completed: AtomicUsize,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

/// Decrements the in-flight count even when the call future is dropped
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl ScriptedProvider {
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&CompletionRequest) -> Script + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(responder),
            calls: Mutex::new(Vec::new()),
            completed: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    /// Provider whose every answer is valid
    pub fn happy() -> Self {
        Self::new(happy_script)
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, stage: CallStage) -> usize {
        self.calls().iter().filter(|c| c.stage == stage).count()
    }

    /// Draft calls issued for the directive with the given 1-based index
    pub fn draft_calls_for(&self, index: usize) -> Vec<RecordedCall> {
        self.calls()
            .into_iter()
            .filter(|c| c.stage == CallStage::Draft && directive_index(&c.text) == Some(index))
            .collect()
    }

    /// Calls that returned a completion, and therefore usage
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    /// Calls currently awaiting a scripted answer
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Most calls ever awaiting an answer at once
    pub fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    async fn play(&self, script: Script) -> Result<Completion, LLMError> {
        let mut script = script;
        loop {
            match script {
                Script::Reply(content) => {
                    self.completed.fetch_add(1, Ordering::SeqCst);
                    return Ok(Completion::new(content, CALL_USAGE));
                }
                Script::Fail(error) => return Err(error),
                Script::Delayed(delay, inner) => {
                    tokio::time::sleep(delay).await;
                    script = *inner;
                }
            }
        }
    }
}

#[async_trait]
impl LLMProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> &str {
        "scripted-model"
    }

    async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> variant_engine::llm::Result<Completion> {
        self.calls.lock().unwrap().push(RecordedCall {
            stage: request.stage,
            text: request.text(),
        });
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlight(&self.in_flight);

        let script = (self.responder)(request);
        self.play(script).await
    }
}

/// The valid answer for every stage
pub fn happy_script(request: &CompletionRequest) -> Script {
    let text = request.text();
    match request.stage {
        CallStage::Analyze => Script::Reply(knowledge_json()),
        CallStage::Plan => Script::Reply(plan_json(requested_count(&text).unwrap_or(1))),
        CallStage::Draft => Script::Reply(candidate_json(directive_index(&text).unwrap_or(1))),
        CallStage::Review => Script::Reply(r#"{"is_valid": true, "feedback": ""}"#.to_string()),
    }
}

pub fn knowledge_json() -> String {
    json!({
        "knowledge_point_name": "Lane position on unmarked roads",
        "knowledge_point_summary": "Where no lanes are marked, keep to the left side of the road."
    })
    .to_string()
}

pub fn plan_json(count: usize) -> String {
    let variations: Vec<_> = (1..=count)
        .map(|i| {
            json!({
                "focus_axis": "any",
                "guidance": format!("Variation {} - {}", i, GUIDANCE[(i - 1) % GUIDANCE.len()]),
            })
        })
        .collect();
    json!({ "variations": variations }).to_string()
}

const GUIDANCE: [&str; 5] = [
    "a cyclist on a country lane",
    "ask which position is safest at night",
    "give the road width and an approaching truck's speed",
    "ask which statement is wrong",
    "a van pulling away from the kerb",
];

/// Five distinct valid questions, indexed from 1
pub fn candidate_json(index: usize) -> String {
    let (prompt, options, correct, explanation) = CANDIDATES[(index - 1) % CANDIDATES.len()];
    json!({
        "prompt": prompt,
        "option_a": options[0],
        "option_b": options[1],
        "option_c": options[2],
        "option_d": options[3],
        "correct_option": correct,
        "explanation": explanation,
    })
    .to_string()
}

pub fn candidate_prompt(index: usize) -> &'static str {
    CANDIDATES[(index - 1) % CANDIDATES.len()].0
}

/// A candidate that always fails validation
pub fn blank_option_json() -> String {
    json!({
        "prompt": "Where should a tractor travel on a lane without markings?",
        "option_a": "Near the left",
        "option_b": "",
        "option_c": "Astride the crown of the road",
        "option_d": "Near the right",
        "correct_option": "A",
        "explanation": "Slow vehicles keep left."
    })
    .to_string()
}

type Fixture = (&'static str, [&'static str; 4], &'static str, &'static str);

const CANDIDATES: [Fixture; 5] = [
    (
        "A cyclist reaches a narrow country lane with no painted markings. Where should they ride?",
        [
            "Close to the left edge",
            "In the centre of the lane",
            "Wherever feels comfortable",
            "Close to the right edge",
        ],
        "A",
        "Without lane markings, road users keep to the left so oncoming traffic can pass.",
    ),
    (
        "On a wet night you drive along an unmarked rural road. Which position is safest?",
        [
            "Keeping left of the middle",
            "Straddling the centre",
            "Hugging the right verge",
            "Switching sides at bends",
        ],
        "A",
        "Staying left leaves room for vehicles coming the other way, which matters more when visibility is poor.",
    ),
    (
        "A road 6 metres wide has no lane lines and a truck approaches at 50 km/h. What should you do?",
        [
            "Flash your lights and hold the middle",
            "Slow down and keep to your left",
            "Speed up to pass quickly",
            "Stop in the centre",
        ],
        "B",
        "Reducing speed and keeping left gives the truck enough width on a narrow road.",
    ),
    (
        "Which statement about driving on roads without marked lanes is wrong?",
        [
            "You must keep near the left",
            "You may drive along the middle at will",
            "You should leave space for oncoming vehicles",
            "You should stay on your own side",
        ],
        "B",
        "Driving along the middle at will blocks oncoming traffic, so that statement is wrong.",
    ),
    (
        "A delivery van is parked on a street that has no lane markings. When pulling away, where should the driver position it?",
        [
            "On the right-hand side",
            "Across the middle of the street",
            "Anywhere, since there are no lines",
            "Towards the left of the carriageway",
        ],
        "D",
        "Even without lines, vehicles keep to the left side of the road.",
    ),
];

/// 1-based directive index from a draft prompt's guidance line
pub fn directive_index(text: &str) -> Option<usize> {
    let rest = &text[text.find("Guidance: Variation ")? + "Guidance: Variation ".len()..];
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

/// Variant count a plan prompt asks for
pub fn requested_count(text: &str) -> Option<usize> {
    let rest = &text[text.find("for exactly ")? + "for exactly ".len()..];
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

/// Default configuration with a short upstream timeout
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.llm.timeout_secs = 1;
    config
}

pub fn conductor(provider: &Arc<ScriptedProvider>, config: Config) -> Conductor {
    let provider: Arc<dyn LLMProvider> = Arc::clone(provider) as Arc<dyn LLMProvider>;
    Conductor::new(provider, Arc::new(config))
}
