//! Instruction text for each pipeline stage
//!
//! Every builder returns the full message list for one call. Output formats
//! are plain JSON objects so that [`crate::llm::extract_json`] can recover
//! them even when the model wraps them in prose or code fences.

use crate::llm::Message;
use sdk::types::{KnowledgePoint, VariantCandidate, VariationDirective};

const LANGUAGE_RULE: &str = "Write in the same language as the source question.";

const DISCRETION_RULE: &str = "Never mention how the question was produced: no references to AI, \
language models, generation, variants, or the source question.";

pub fn analyze(question: &str) -> Vec<Message> {
    vec![
        Message::system(format!(
            "You analyse multiple-choice exam questions and name the single knowledge point \
             each one tests. {}\n\n\
             Respond with a JSON object only:\n\
             {{\"knowledge_point_name\": \"short name of the tested concept\", \
             \"knowledge_point_summary\": \"one or two sentences stating the rule or fact\"}}",
            LANGUAGE_RULE
        )),
        Message::user(format!("Source question:\n{}", question)),
    ]
}

/// One line per slot, each naming the axis the planner must write guidance for
pub fn plan(
    knowledge_point: &KnowledgePoint,
    question: &str,
    slots: &[&str],
    feedback: Option<&str>,
) -> Vec<Message> {
    let slot_lines: String = slots
        .iter()
        .enumerate()
        .map(|(i, slot)| format!("{}. {}\n", i + 1, slot))
        .collect();

    let mut user = format!(
        "Knowledge point: {}\nSummary: {}\n\nSource question:\n{}\n\n\
         Write guidance for exactly {} variants, one per slot, in this order:\n{}",
        knowledge_point.name,
        knowledge_point.summary,
        question,
        slots.len(),
        slot_lines
    );

    if let Some(feedback) = feedback {
        user.push_str(&format!(
            "\nYour previous plan was rejected: {}\nFix this in the new plan.\n",
            feedback
        ));
    }

    vec![
        Message::system(
            "You plan variants of an exam question. Each variant must test the same knowledge \
             point while differing from the source along its assigned axis. Guidance must be \
             concrete, and no two variants may share the same guidance.\n\n\
             Respond with a JSON object only:\n\
             {\"variations\": [{\"focus_axis\": \"axis from the slot\", \"guidance\": \"what this variant changes\"}]}",
        ),
        Message::user(user),
    ]
}

pub fn draft(
    knowledge_point: &KnowledgePoint,
    question: &str,
    directive: &VariationDirective,
    feedback: &[String],
) -> Vec<Message> {
    let mut user = format!(
        "Knowledge point: {}\nSummary: {}\n\nSource question:\n{}\n\n\
         Focus axis: {} ({})\nGuidance: {}\n",
        knowledge_point.name,
        knowledge_point.summary,
        question,
        directive.axis,
        directive.axis.describe(),
        directive.guidance
    );

    if !feedback.is_empty() {
        user.push_str("\nYour previous attempt was rejected for these reasons:\n");
        for (i, reason) in feedback.iter().enumerate() {
            user.push_str(&format!("{}. {}\n", i + 1, reason));
        }
        user.push_str("Write a new question that fixes every one of them.\n");
    }

    vec![
        Message::system(format!(
            "You write one new multiple-choice exam question that tests the given knowledge \
             point. Do not copy the source question; change it along the focus axis. \
             Give exactly four distinct options with exactly one correct answer, and explain \
             why that answer is correct. {} {}\n\n\
             Respond with a JSON object only:\n\
             {{\"prompt\": \"question text\", \"option_a\": \"...\", \"option_b\": \"...\", \
             \"option_c\": \"...\", \"option_d\": \"...\", \"correct_option\": \"A|B|C|D\", \
             \"explanation\": \"why the correct option is right\"}}",
            LANGUAGE_RULE, DISCRETION_RULE
        )),
        Message::user(user),
    ]
}

pub fn review(knowledge_point: &KnowledgePoint, candidate: &VariantCandidate) -> Vec<Message> {
    let options: String = candidate
        .options
        .iter()
        .zip(['A', 'B', 'C', 'D'])
        .map(|(text, letter)| format!("{}. {}\n", letter, text))
        .collect();

    vec![
        Message::system(
            "You review exam questions. Check that the question tests the stated knowledge \
             point, that exactly one option is correct, that the marked answer is that option, \
             and that the explanation is accurate.\n\n\
             Respond with a JSON object only:\n\
             {\"is_valid\": true or false, \"feedback\": \"what is wrong, empty when valid\"}",
        ),
        Message::user(format!(
            "Knowledge point: {}\nSummary: {}\n\nQuestion:\n{}\n{}\nMarked answer: {}\nExplanation: {}",
            knowledge_point.name,
            knowledge_point.summary,
            candidate.prompt,
            options,
            candidate.correct_option,
            candidate.explanation
        )),
    ]
}
