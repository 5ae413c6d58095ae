use rand::RngCore;
use serde::Serialize;

use crate::core::{
    unify_responses, BindingError, FeedbackRecord, LabelStrategy, MultiLabelStrategy, Question,
    QuestionKind, QuestionSchema, RatingStrategy, ReduceError, Strategy,
};

// ---------------------------------------------------------------------------
// StrategySpec — a strategy given by value or by tag
// ---------------------------------------------------------------------------

/// Strategy argument accepted by [`Unification::new`]. A tag is coerced to
/// the strategy of the bound question's family.
#[derive(Clone, Debug, PartialEq)]
pub enum StrategySpec {
    Tag(String),
    Strategy(Strategy),
}

impl From<&str> for StrategySpec {
    fn from(tag: &str) -> Self {
        Self::Tag(tag.to_owned())
    }
}

impl From<String> for StrategySpec {
    fn from(tag: String) -> Self {
        Self::Tag(tag)
    }
}

impl From<Strategy> for StrategySpec {
    fn from(strategy: Strategy) -> Self {
        Self::Strategy(strategy)
    }
}

impl From<RatingStrategy> for StrategySpec {
    fn from(strategy: RatingStrategy) -> Self {
        Self::Strategy(strategy.into())
    }
}

impl From<LabelStrategy> for StrategySpec {
    fn from(strategy: LabelStrategy) -> Self {
        Self::Strategy(strategy.into())
    }
}

impl From<MultiLabelStrategy> for StrategySpec {
    fn from(strategy: MultiLabelStrategy) -> Self {
        Self::Strategy(strategy.into())
    }
}

// ---------------------------------------------------------------------------
// Unification — one question bound to one compatible strategy
// ---------------------------------------------------------------------------

/// A question paired with a strategy of the same family.
///
/// The pairing is checked once, at construction, so [`Unification::unify`]
/// never sees a mismatched strategy.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Unification {
    question: Question,
    strategy: Strategy,
}

impl Unification {
    pub fn new(
        question: impl Into<Question>,
        strategy: impl Into<StrategySpec>,
    ) -> Result<Self, BindingError> {
        let question = question.into();
        let strategy = bind(&question, strategy.into())?;
        Ok(Self { question, strategy })
    }

    /// Binds `mean` to rating questions and `majority` to label questions.
    pub fn with_default_strategy(question: impl Into<Question>) -> Result<Self, BindingError> {
        let question = question.into();
        let strategy = match question.kind() {
            QuestionKind::Rating => Strategy::Rating(RatingStrategy::Mean),
            QuestionKind::LabelSelection => Strategy::Label(LabelStrategy::Majority),
            QuestionKind::MultiLabelSelection => {
                Strategy::MultiLabel(MultiLabelStrategy::Majority)
            }
            QuestionKind::Text => return Err(unsupported(&question)),
        };
        Ok(Self { question, strategy })
    }

    pub fn question(&self) -> &Question {
        &self.question
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// Unifies the bound question on every record, breaking ties with the
    /// thread-local RNG.
    pub fn unify<'r>(
        &self,
        records: &'r mut [FeedbackRecord],
    ) -> Result<&'r mut [FeedbackRecord], ReduceError> {
        self.unify_with_rng(records, &mut rand::rng())
    }

    pub fn unify_with_rng<'r, R: RngCore>(
        &self,
        records: &'r mut [FeedbackRecord],
        rng: &mut R,
    ) -> Result<&'r mut [FeedbackRecord], ReduceError> {
        unify_responses(self.strategy, records, &self.question, rng)
    }
}

fn unsupported(question: &Question) -> BindingError {
    BindingError::UnsupportedQuestion {
        question: question.kind(),
        name: question.name().clone(),
    }
}

fn bind(question: &Question, spec: StrategySpec) -> Result<Strategy, BindingError> {
    let family = question.kind();
    let strategy = match (spec, family) {
        (_, QuestionKind::Text) => return Err(unsupported(question)),
        (StrategySpec::Strategy(strategy), _) => strategy,
        (StrategySpec::Tag(tag), QuestionKind::Rating) => Strategy::Rating(tag.parse()?),
        (StrategySpec::Tag(tag), QuestionKind::LabelSelection) => Strategy::Label(tag.parse()?),
        (StrategySpec::Tag(tag), QuestionKind::MultiLabelSelection) => {
            Strategy::MultiLabel(tag.parse()?)
        }
    };

    if strategy.family() != family {
        return Err(BindingError::IncompatibleStrategy {
            strategy: strategy.family(),
            question: family,
            name: question.name().clone(),
        });
    }
    Ok(strategy)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
