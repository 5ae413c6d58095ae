use cb_core::core::{FieldName, QuestionName, UnifyError};

#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("dataset needs at least one field")]
    NoFields,
    #[error("dataset needs at least one question")]
    NoQuestions,
    #[error("duplicate field name: {0}")]
    DuplicateField(FieldName),
    #[error("duplicate question name: {0}")]
    DuplicateQuestion(QuestionName),
    #[error("unknown field: {0}")]
    UnknownField(String),
    #[error("unknown question: {0}")]
    UnknownQuestion(String),
    #[error(transparent)]
    Unify(#[from] UnifyError),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
