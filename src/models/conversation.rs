// src/models/conversation.rs

use serde::Deserialize;
use std::collections::HashMap;

/// The nested conversation record the interview engine maintains.
///
/// Topics and questions arrive as JSON objects keyed by stringified 1-based
/// integers, and key iteration order is not insertion order. String keys are
/// therefore confined to this deserialization boundary; traversal goes
/// through [`ConversationRecord::ordered_topics`] and
/// [`Topic::ordered_questions`], which sort numerically.
///
/// Every field is defaulted so a partial or early-stage record (no topics
/// yet, missing cursors) still deserializes instead of failing the request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConversationRecord {
    /// Opaque engine-side identifier. Never interpreted.
    #[serde(default)]
    pub id: Option<serde_json::Value>,

    #[serde(default)]
    pub current_topic: i64,

    #[serde(default)]
    pub current_subtopic: String,

    #[serde(default)]
    pub current_question_number: i64,

    #[serde(default)]
    pub topics: HashMap<String, Topic>,
}

impl ConversationRecord {
    /// Completion sentinel. The engine has emitted both "finished" and
    /// "Finished" across versions, so the comparison ignores ASCII case.
    pub fn is_finished(&self) -> bool {
        self.current_topic == 0
            && self.current_question_number == 0
            && self.current_subtopic.eq_ignore_ascii_case("finished")
    }

    /// Topics in numeric key order.
    pub fn ordered_topics(&self) -> Vec<&Topic> {
        ordered(&self.topics)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Topic {
    /// Display label, e.g. "Coding".
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub questions: HashMap<String, Question>,
}

impl Topic {
    /// Questions in numeric key order.
    pub fn ordered_questions(&self) -> Vec<&Question> {
        ordered(&self.questions)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Question {
    /// Literal question text, extracted engine-side in later versions.
    /// Older records omit it and the text must be dug out of `messages`.
    #[serde(default)]
    pub prompt: Option<String>,

    #[serde(default)]
    pub messages: Vec<Message>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Author {
    Interviewer,
    User,
    System,
    /// Anything the engine invents later. Ignored by the flattener.
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub author: Author,

    /// Free text, or a JSON-encoded [`FeedbackPayload`] when the author is
    /// the interviewer.
    #[serde(default)]
    pub content: String,
}

impl Message {
    /// Cheap shape check before attempting a real parse: trimmed content
    /// that starts with `{` and ends with `}`.
    pub fn looks_like_payload(&self) -> bool {
        let trimmed = self.content.trim();
        trimmed.starts_with('{') && trimmed.ends_with('}')
    }

    /// Decodes the content as an embedded feedback payload.
    ///
    /// Returns `None` for non-interviewer messages, content that is not
    /// payload-shaped, or content that merely looks like JSON but fails to
    /// parse. A failed parse is never an error for the caller.
    pub fn feedback_payload(&self) -> Option<FeedbackPayload> {
        if self.author != Author::Interviewer || !self.looks_like_payload() {
            return None;
        }
        serde_json::from_str(self.content.trim()).ok()
    }
}

/// Scoring payload the engine embeds as string content in an interviewer
/// message. Feedback for question N travels inside question N+1's first
/// such message; an empty `next_question` marks the terminal payload.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FeedbackPayload {
    pub score: Option<i64>,
    pub feedback: Option<String>,
    pub next_question: Option<String>,
    /// Older engine versions used `question` instead of `next_question`.
    pub question: Option<String>,
    pub next_topic: Option<String>,
    pub next_subtopic: Option<String>,
}

fn ordered<T>(map: &HashMap<String, T>) -> Vec<&T> {
    let mut keys: Vec<&String> = map.keys().collect();
    keys.sort_by_key(|k| (k.parse::<i64>().unwrap_or(i64::MAX), (*k).clone()));
    keys.into_iter().map(|k| &map[k]).collect()
}
