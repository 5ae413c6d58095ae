use std::collections::BTreeSet;

use cb_core::core::{Question, QuestionSchema, StrategySpec, TextField, Unification, UnifyError};
use serde::{Deserialize, Serialize};

use crate::error::DatasetError;
use crate::training::TrainingDataForTextClassification;

/// Fields, questions and annotation guidelines of a feedback dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackDatasetConfig {
    pub fields: Vec<TextField>,
    pub questions: Vec<Question>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guidelines: Option<String>,
}

impl FeedbackDatasetConfig {
    pub fn new(
        fields: Vec<TextField>,
        questions: Vec<Question>,
        guidelines: Option<String>,
    ) -> Result<Self, DatasetError> {
        let config = Self {
            fields,
            questions,
            guidelines,
        };
        config.validate()?;
        Ok(config)
    }

    /// Requires at least one field and one question, with unique names in
    /// each group.
    pub fn validate(&self) -> Result<(), DatasetError> {
        if self.fields.is_empty() {
            return Err(DatasetError::NoFields);
        }
        if self.questions.is_empty() {
            return Err(DatasetError::NoQuestions);
        }

        let mut seen = BTreeSet::new();
        for field in &self.fields {
            if !seen.insert(field.name().as_str()) {
                return Err(DatasetError::DuplicateField(field.name().clone()));
            }
        }

        let mut seen = BTreeSet::new();
        for question in &self.questions {
            if !seen.insert(question.name().as_str()) {
                return Err(DatasetError::DuplicateQuestion(question.name().clone()));
            }
        }
        Ok(())
    }

    pub fn field(&self, name: &str) -> Result<&TextField, DatasetError> {
        self.fields
            .iter()
            .find(|field| field.name().as_str() == name)
            .ok_or_else(|| DatasetError::UnknownField(name.to_owned()))
    }

    pub fn question(&self, name: &str) -> Result<&Question, DatasetError> {
        self.questions
            .iter()
            .find(|question| question.name().as_str() == name)
            .ok_or_else(|| DatasetError::UnknownQuestion(name.to_owned()))
    }

    /// Binds the named question to `strategy`, or to the family default
    /// when no strategy is given.
    pub fn unification(
        &self,
        question: &str,
        strategy: Option<&str>,
    ) -> Result<Unification, DatasetError> {
        let question = self.question(question)?.clone();
        let bound = match strategy {
            Some(tag) => Unification::new(question, StrategySpec::from(tag)),
            None => Unification::with_default_strategy(question),
        };
        bound.map_err(|err| DatasetError::Unify(UnifyError::from(err)))
    }

    pub fn text_classification(
        &self,
        text: &str,
        label: &str,
        strategy: Option<&str>,
    ) -> Result<TrainingDataForTextClassification, DatasetError> {
        let text = self.field(text)?.clone();
        let label = self.unification(label, strategy)?;
        Ok(TrainingDataForTextClassification::new(text, label))
    }
}
