use crate::core::{QuestionKind, QuestionName};

// ---------------------------------------------------------------------------
// Sub-error types
// ---------------------------------------------------------------------------

/// Configuration validation failures raised while constructing fields and
/// questions.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SchemaError {
    #[error("name must not be empty")]
    EmptyName,
    #[error("rating question {name} needs at least 2 values, got {count}")]
    TooFewRatingValues { name: QuestionName, count: usize },
    #[error("rating question {name} has duplicate value {value}")]
    DuplicateRatingValue { name: QuestionName, value: i64 },
    #[error("label question {name} needs at least 2 labels, got {count}")]
    TooFewLabels { name: QuestionName, count: usize },
    #[error("label question {name} has duplicate label {label:?}")]
    DuplicateLabel { name: QuestionName, label: String },
    #[error("label question {name} has duplicate display text {text:?}")]
    DuplicateLabelText { name: QuestionName, text: String },
    #[error("label question {name} must show at least 3 labels, got visible_labels={visible}")]
    VisibleLabelsTooLow { name: QuestionName, visible: u32 },
}

/// Failures pairing a question with a strategy.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BindingError {
    #[error("{strategy} strategy is not compatible with {question} question {name}")]
    IncompatibleStrategy {
        strategy: QuestionKind,
        question: QuestionKind,
        name: QuestionName,
    },
    #[error("unknown {family} strategy {tag:?}")]
    UnknownStrategy { family: QuestionKind, tag: String },
    #[error("{question} question {name} cannot be unified")]
    UnsupportedQuestion {
        question: QuestionKind,
        name: QuestionName,
    },
}

/// Failures raised while reducing responses.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ReduceError {
    #[error("invalid field reference: expected a name or a {expected} question, got {found} question {name}")]
    InvalidFieldRef {
        expected: QuestionKind,
        found: QuestionKind,
        name: QuestionName,
    },
    #[error("no submitted responses for {field} in record {record}; {strategy} is undefined")]
    NoSubmittedResponses {
        field: QuestionName,
        record: usize,
        strategy: &'static str,
    },
    #[error("response value for {field} in record {record} is not {expected}")]
    InvalidValue {
        field: QuestionName,
        record: usize,
        expected: &'static str,
    },
    #[error("{strategy} strategy is not implemented yet")]
    NotImplemented { strategy: &'static str },
}

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum UnifyError {
    #[error(transparent)]
    Binding(#[from] BindingError),
    #[error(transparent)]
    Reduce(#[from] ReduceError),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
