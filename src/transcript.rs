// src/transcript.rs

//! Flattens the nested conversation record (topics -> questions -> messages)
//! into the linear transcript the client renders.
//!
//! The engine delivers feedback for question N as the first JSON-bearing
//! interviewer message of question N+1 (a deliberate off-by-one in the
//! upstream protocol). Resolving an answer's score therefore looks one
//! question ahead, crossing topic boundaries; only the final question of the
//! final topic reads its feedback from its own trailing message. The same
//! payload also announces the next question's text, which is why every
//! prompt after the very first can be recovered even when the engine never
//! filled in the `prompt` field.

use serde::{Deserialize, Serialize};

use crate::models::conversation::{
    Author, ConversationRecord, FeedbackPayload, Message, Question,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Interviewer,
    User,
    System,
}

/// One display-ready line of the transcript. `feedback`/`score` are only
/// present on user entries whose payload actually resolved; they are omitted
/// from the JSON entirely otherwise, never serialized as null.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub role: Role,
    pub content: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<i64>,
}

impl TranscriptEntry {
    pub fn interviewer(content: impl Into<String>) -> Self {
        Self { role: Role::Interviewer, content: content.into(), feedback: None, score: None }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into(), feedback: None, score: None }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into(), feedback: None, score: None }
    }
}

/// A question slot in global traversal order, tagged with the topic it
/// belongs to so the lookahead can cross topic boundaries and the summary
/// can group scores per topic.
struct Slot<'a> {
    topic: usize,
    topic_name: &'a str,
    question: &'a Question,
}

/// Flattens a conversation into transcript entries.
///
/// Pure and deterministic: no I/O, the input is never mutated, and malformed
/// embedded JSON is skipped per message rather than propagated. Missing
/// pieces (no prompt, no answer yet, no resolvable feedback) are simply
/// omitted from the output.
///
/// When the record carries the completion sentinel, a trailing system entry
/// with the final score breakdown is appended.
pub fn flatten(conversation: &ConversationRecord) -> Vec<TranscriptEntry> {
    let slots = question_slots(conversation);

    let mut out = Vec::new();
    for (index, slot) in slots.iter().enumerate() {
        if let Some(prompt) = prompt_for(slot.question) {
            out.push(TranscriptEntry::interviewer(prompt));
        }

        let answer = slot
            .question
            .messages
            .iter()
            .find(|m| m.author == Author::User);
        if let Some(answer) = answer {
            let mut entry = TranscriptEntry::user(answer.content.clone());
            if let Some(payload) = feedback_for(&slots, index) {
                entry.feedback = payload.feedback;
                entry.score = payload.score;
            }
            out.push(entry);
        }
    }

    if conversation.is_finished() {
        out.push(summary_entry(&slots));
    }

    out
}

fn question_slots(conversation: &ConversationRecord) -> Vec<Slot<'_>> {
    let mut slots = Vec::new();
    for (topic, t) in conversation.ordered_topics().into_iter().enumerate() {
        for question in t.ordered_questions() {
            slots.push(Slot { topic, topic_name: &t.name, question });
        }
    }
    slots
}

/// Resolves the interviewer prompt for a question.
///
/// Preference order: the explicit `prompt` field, then the first plain-text
/// interviewer message, then the `next_question`/`question` field of the
/// question's own first parseable payload. The first question of the first
/// topic is the only one whose text has to come from plain text, since no
/// preceding payload exists to have announced it.
fn prompt_for(question: &Question) -> Option<String> {
    if let Some(prompt) = &question.prompt {
        if !prompt.trim().is_empty() {
            return Some(prompt.clone());
        }
    }

    let plain = question
        .messages
        .iter()
        .find(|m| m.author == Author::Interviewer && !m.content.trim().starts_with('{'));
    if let Some(m) = plain {
        return Some(m.content.clone());
    }

    let payload = first_payload(&question.messages)?;
    payload
        .next_question
        .filter(|q| !q.trim().is_empty())
        .or(payload.question.filter(|q| !q.trim().is_empty()))
}

/// Feedback for the answer in slot `index`: the first parseable payload in
/// the next slot's messages, or, for the terminal slot only, in its own.
///
/// The terminal scan runs backwards: the terminal question's messages can
/// hold both the previous question's payload (which announced this question)
/// and its own trailing terminal payload, and the trailing one is the one
/// that scores this answer.
fn feedback_for(slots: &[Slot<'_>], index: usize) -> Option<FeedbackPayload> {
    match slots.get(index + 1) {
        Some(next) => first_payload(&next.question.messages),
        None => slots[index]
            .question
            .messages
            .iter()
            .rev()
            .find_map(Message::feedback_payload),
    }
}

/// First interviewer message that parses as a payload. Candidates that look
/// like JSON but fail to parse are skipped and scanning continues.
fn first_payload(messages: &[Message]) -> Option<FeedbackPayload> {
    messages.iter().find_map(Message::feedback_payload)
}

/// Builds the trailing score summary for a completed interview.
///
/// Scores are re-resolved with the same lookahead rule used for display,
/// then grouped per topic. Topics without a single scored question are left
/// out of the breakdown.
fn summary_entry(slots: &[Slot<'_>]) -> TranscriptEntry {
    // (topic index, name, subtotal, scored question count)
    let mut totals: Vec<(usize, &str, i64, i64)> = Vec::new();
    for (index, slot) in slots.iter().enumerate() {
        let Some(score) = feedback_for(slots, index).and_then(|p| p.score) else {
            continue;
        };
        match totals.last_mut() {
            Some(t) if t.0 == slot.topic => {
                t.2 += score;
                t.3 += 1;
            }
            _ => totals.push((slot.topic, slot.topic_name, score, 1)),
        }
    }

    let total: i64 = totals.iter().map(|t| t.2).sum();
    let max: i64 = totals.iter().map(|t| t.3).sum::<i64>() * 10;

    let mut lines = vec![
        "=================================".to_string(),
        "    INTERVIEW COMPLETED".to_string(),
        "=================================".to_string(),
        String::new(),
        format!("Your final score: {}/{} ({}%)", total, max, percentage(total, max)),
    ];

    if !totals.is_empty() {
        lines.push(String::new());
        for (_, name, subtotal, count) in &totals {
            let topic_max = count * 10;
            lines.push(format!(
                "{}: {}/{} ({}%)",
                name,
                subtotal,
                topic_max,
                percentage(*subtotal, topic_max)
            ));
        }
    }

    lines.push(String::new());
    lines.push("Thank you for participating in our technical interview process!".to_string());
    lines.push(
        "Please take a moment to fill out our feedback survey - it helps us improve.".to_string(),
    );

    TranscriptEntry::system(lines.join("\n"))
}

fn percentage(total: i64, max: i64) -> i64 {
    if max == 0 {
        return 0;
    }
    (total as f64 * 100.0 / max as f64).round() as i64
}
