use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Points awarded for a question that does not declare its own value.
pub const DEFAULT_QUESTION_POINTS: u32 = 10;

/// Question as it is stored: a type tag plus a loosely shaped payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredQuestion {
    pub id: String,
    #[serde(rename = "type")]
    pub question_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub points: Option<u32>,
    #[serde(default)]
    pub payload: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

/// Question with a typed payload, ready for grading.
#[derive(Debug, Clone, PartialEq)]
pub struct Question {
    pub id: String,
    pub points: u32,
    pub kind: QuestionKind,
    pub explanation: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum QuestionKind {
    MultipleChoice(MultipleChoicePayload),
    TrueFalse(TrueFalsePayload),
    ShortAnswer(ShortAnswerPayload),
    Matching(MatchingPayload),
    Essay,
    /// Type tag that is unknown or whose payload failed to parse.
    Unsupported { type_tag: String },
}

impl QuestionKind {
    pub fn type_tag(&self) -> &str {
        match self {
            QuestionKind::MultipleChoice(_) => "MULTIPLE_CHOICE",
            QuestionKind::TrueFalse(_) => "TRUE_FALSE",
            QuestionKind::ShortAnswer(_) => "SHORT_ANSWER",
            QuestionKind::Matching(_) => "MATCHING",
            QuestionKind::Essay => "ESSAY",
            QuestionKind::Unsupported { type_tag } => type_tag,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultipleChoicePayload {
    #[serde(default)]
    pub options: Vec<ChoiceOption>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correct_index: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChoiceOption {
    pub text: String,
    #[serde(default)]
    pub is_correct: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrueFalsePayload {
    pub correct_answer: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShortAnswerPayload {
    #[serde(default)]
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchingPayload {
    #[serde(default)]
    pub pairs: Vec<MatchPair>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MatchPair {
    pub left: String,
    pub right: String,
}

impl Question {
    /// Parses a stored question once. Unknown tags and malformed payloads
    /// degrade to `QuestionKind::Unsupported` instead of failing the load.
    pub fn from_stored(stored: StoredQuestion) -> Self {
        let kind = parse_kind(&stored.question_type, stored.payload);
        if let QuestionKind::Unsupported { type_tag } = &kind {
            tracing::warn!(
                "Question {} has unsupported type or payload: {}",
                stored.id,
                type_tag
            );
        }

        Self {
            id: stored.id,
            points: stored.points.unwrap_or(DEFAULT_QUESTION_POINTS),
            kind,
            explanation: stored.explanation,
        }
    }

    pub fn to_stored(&self) -> StoredQuestion {
        let payload = match &self.kind {
            QuestionKind::MultipleChoice(p) => serde_json::to_value(p),
            QuestionKind::TrueFalse(p) => serde_json::to_value(p),
            QuestionKind::ShortAnswer(p) => serde_json::to_value(p),
            QuestionKind::Matching(p) => serde_json::to_value(p),
            QuestionKind::Essay | QuestionKind::Unsupported { .. } => Ok(Value::Null),
        }
        .unwrap_or(Value::Null);

        StoredQuestion {
            id: self.id.clone(),
            question_type: self.kind.type_tag().to_string(),
            points: Some(self.points),
            payload,
            explanation: self.explanation.clone(),
        }
    }
}

fn parse_kind(type_tag: &str, payload: Value) -> QuestionKind {
    let normalized = type_tag.to_uppercase().replace(['-', ' '], "_");
    let parsed = match normalized.as_str() {
        "MULTIPLE_CHOICE" | "MULTIPLECHOICE" => {
            serde_json::from_value(payload).map(QuestionKind::MultipleChoice)
        }
        "TRUE_FALSE" | "TRUEFALSE" => serde_json::from_value(payload).map(QuestionKind::TrueFalse),
        "SHORT_ANSWER" | "SHORTANSWER" => {
            serde_json::from_value(payload).map(QuestionKind::ShortAnswer)
        }
        "MATCHING" => serde_json::from_value(payload).map(QuestionKind::Matching),
        "ESSAY" => Ok(QuestionKind::Essay),
        _ => {
            return QuestionKind::Unsupported {
                type_tag: type_tag.to_string(),
            }
        }
    };

    parsed.unwrap_or_else(|_| QuestionKind::Unsupported {
        type_tag: type_tag.to_string(),
    })
}

/// Learner response value. Shape depends on the question kind it answers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnswerValue {
    Bool(bool),
    Index(u64),
    Text(String),
    Pairs(Vec<MatchPair>),
    Other(Value),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    pub question_id: String,
    #[serde(default)]
    pub value: Option<AnswerValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_spent: Option<u64>,
}
