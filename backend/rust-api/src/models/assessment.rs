use serde::{Deserialize, Serialize};

use super::question::{Question, StoredQuestion};

/// Assessment document as persisted in the `assessments` collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentDocument {
    #[serde(rename = "_id")]
    pub id: String,
    pub standard_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub questions: Vec<StoredQuestion>,
    pub passing_score: u32,
    pub allowed_attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_limit: Option<u64>,
    #[serde(default)]
    pub show_results: bool,
}

/// Read-only view of an assessment with its question set parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct Assessment {
    pub id: String,
    pub standard_id: String,
    pub title: String,
    pub questions: Vec<Question>,
    /// Percentage threshold for `passed`.
    pub passing_score: u32,
    pub allowed_attempts: u32,
    /// Seconds.
    pub time_limit: Option<u64>,
    pub show_results: bool,
}

impl From<AssessmentDocument> for Assessment {
    fn from(doc: AssessmentDocument) -> Self {
        Self {
            id: doc.id,
            standard_id: doc.standard_id,
            title: doc.title,
            questions: doc.questions.into_iter().map(Question::from_stored).collect(),
            passing_score: doc.passing_score,
            allowed_attempts: doc.allowed_attempts,
            time_limit: doc.time_limit,
            show_results: doc.show_results,
        }
    }
}

impl From<&Assessment> for AssessmentDocument {
    fn from(assessment: &Assessment) -> Self {
        Self {
            id: assessment.id.clone(),
            standard_id: assessment.standard_id.clone(),
            title: assessment.title.clone(),
            questions: assessment.questions.iter().map(Question::to_stored).collect(),
            passing_score: assessment.passing_score,
            allowed_attempts: assessment.allowed_attempts,
            time_limit: assessment.time_limit,
            show_results: assessment.show_results,
        }
    }
}

impl Assessment {
    pub fn max_points(&self) -> u32 {
        self.questions.iter().map(|q| q.points).sum()
    }
}
