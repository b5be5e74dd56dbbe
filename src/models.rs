use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One graded answer within an assignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionResponse {
    pub question_id: String,
    /// `None` marks a question that is not linked to any skill.
    pub skill_id: Option<String>,
    pub score: f64,
}

impl QuestionResponse {
    pub fn new(question_id: impl Into<String>, skill_id: Option<&str>, score: f64) -> Self {
        Self {
            question_id: question_id.into(),
            skill_id: skill_id.map(str::to_string),
            score,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SkillLevel {
    High,
    Medium,
    Low,
}

impl SkillLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            SkillLevel::High => "high",
            SkillLevel::Medium => "medium",
            SkillLevel::Low => "low",
        }
    }
}

impl fmt::Display for SkillLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillScoreEntry {
    pub skill_id: String,
    pub question_count: usize,
    pub average_score: u8,
    pub level: SkillLevel,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GapEntry {
    pub skill_id: String,
    pub average_score: u8,
}

impl From<&SkillScoreEntry> for GapEntry {
    fn from(entry: &SkillScoreEntry) -> Self {
        Self {
            skill_id: entry.skill_id.clone(),
            average_score: entry.average_score,
        }
    }
}

/// Analysis of one completed assignment. Built once and never patched;
/// regrading produces a fresh value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssessmentAnalysisResult {
    pub overall_score: u8,
    pub skill_scores: BTreeMap<String, SkillScoreEntry>,
    /// Worst gap first.
    pub gaps: Vec<GapEntry>,
    pub unlinked_question_count: usize,
}

impl AssessmentAnalysisResult {
    pub fn total_responses(&self) -> usize {
        self.skill_scores
            .values()
            .map(|entry| entry.question_count)
            .sum::<usize>()
            + self.unlinked_question_count
    }
}

#[derive(Debug, Clone)]
pub struct LevelSummary {
    pub level: SkillLevel,
    pub skill_count: usize,
}

#[derive(Debug, Clone)]
pub struct AssignmentRecord {
    pub id: Uuid,
    pub employee_email: String,
    pub test_name: String,
    pub completed_at: NaiveDate,
}

#[derive(Debug, Clone)]
pub struct UnlinkedQuestion {
    pub question_id: Uuid,
    pub question_key: String,
    pub test_name: String,
    pub prompt: String,
    pub response_count: i64,
}
