use thiserror::Error;

pub type AnalysisResult<T> = Result<T, AnalysisError>;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum AnalysisError {
    #[error("no graded responses supplied; nothing to analyze")]
    EmptyInput,

    #[error("invalid response for question '{question_id}': {reason}")]
    InvalidResponse { question_id: String, reason: String },

    #[error("invalid threshold configuration: {0}")]
    InvalidConfiguration(String),
}

impl AnalysisError {
    pub fn invalid_response(question_id: impl Into<String>, reason: impl Into<String>) -> Self {
        AnalysisError::InvalidResponse {
            question_id: question_id.into(),
            reason: reason.into(),
        }
    }
}
