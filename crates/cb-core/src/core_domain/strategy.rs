use std::fmt;
use std::str::FromStr;

use rand::seq::IndexedRandom;
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::core::{
    BindingError, FeedbackRecord, QuestionKind, QuestionName, QuestionSchema, ReduceError,
    UnificationValue, UnifiedResponse, Value,
};

// ---------------------------------------------------------------------------
// Strategy tags
// ---------------------------------------------------------------------------

/// Reductions available for rating questions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RatingStrategy {
    Mean,
    Majority,
    Max,
    Min,
}

/// Reductions available for single-label questions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelStrategy {
    Majority,
    MajorityWeighted,
    Disagreement,
}

/// Reductions available for multi-label questions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MultiLabelStrategy {
    Majority,
    MajorityWeighted,
    Disagreement,
}

impl RatingStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mean => "mean",
            Self::Majority => "majority",
            Self::Max => "max",
            Self::Min => "min",
        }
    }
}

impl FromStr for RatingStrategy {
    type Err = BindingError;

    fn from_str(tag: &str) -> Result<Self, Self::Err> {
        match tag {
            "mean" => Ok(Self::Mean),
            "majority" => Ok(Self::Majority),
            "max" => Ok(Self::Max),
            "min" => Ok(Self::Min),
            _ => Err(BindingError::UnknownStrategy {
                family: QuestionKind::Rating,
                tag: tag.to_owned(),
            }),
        }
    }
}

fn parse_label_route(family: QuestionKind, tag: &str) -> Result<LabelRoute, BindingError> {
    match tag {
        "majority" => Ok(LabelRoute::Majority),
        "majority_weighted" => Ok(LabelRoute::MajorityWeighted),
        "disagreement" => Ok(LabelRoute::Disagreement),
        _ => Err(BindingError::UnknownStrategy {
            family,
            tag: tag.to_owned(),
        }),
    }
}

impl FromStr for LabelStrategy {
    type Err = BindingError;

    fn from_str(tag: &str) -> Result<Self, Self::Err> {
        Ok(match parse_label_route(QuestionKind::LabelSelection, tag)? {
            LabelRoute::Majority => Self::Majority,
            LabelRoute::MajorityWeighted => Self::MajorityWeighted,
            LabelRoute::Disagreement => Self::Disagreement,
        })
    }
}

impl FromStr for MultiLabelStrategy {
    type Err = BindingError;

    fn from_str(tag: &str) -> Result<Self, Self::Err> {
        Ok(match parse_label_route(QuestionKind::MultiLabelSelection, tag)? {
            LabelRoute::Majority => Self::Majority,
            LabelRoute::MajorityWeighted => Self::MajorityWeighted,
            LabelRoute::Disagreement => Self::Disagreement,
        })
    }
}

// ---------------------------------------------------------------------------
// Strategy — tagged union over every family
// ---------------------------------------------------------------------------

/// Any strategy, tagged with its family.
///
/// Serializes as the bare tag. Deserialization tries the rating family
/// first, so an ambiguous tag such as `"majority"` reads back as
/// [`RatingStrategy::Majority`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Strategy {
    Rating(RatingStrategy),
    Label(LabelStrategy),
    MultiLabel(MultiLabelStrategy),
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rating(s) => s.as_str(),
            Self::Label(s) => s.route().as_str(),
            Self::MultiLabel(s) => s.route().as_str(),
        }
    }

    /// The question family this strategy can be bound to.
    pub fn family(&self) -> QuestionKind {
        match self {
            Self::Rating(_) => QuestionKind::Rating,
            Self::Label(_) => QuestionKind::LabelSelection,
            Self::MultiLabel(_) => QuestionKind::MultiLabelSelection,
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<RatingStrategy> for Strategy {
    fn from(strategy: RatingStrategy) -> Self {
        Self::Rating(strategy)
    }
}

impl From<LabelStrategy> for Strategy {
    fn from(strategy: LabelStrategy) -> Self {
        Self::Label(strategy)
    }
}

impl From<MultiLabelStrategy> for Strategy {
    fn from(strategy: MultiLabelStrategy) -> Self {
        Self::MultiLabel(strategy)
    }
}

// ---------------------------------------------------------------------------
// FieldRef — which question to unify
// ---------------------------------------------------------------------------

/// A question name, or a question whose name is used.
#[derive(Clone, Copy, Debug)]
pub enum FieldRef<'a> {
    Name(&'a str),
    Question {
        name: &'a QuestionName,
        kind: QuestionKind,
    },
}

impl<'a> FieldRef<'a> {
    /// Resolves the question name; a question of another family is rejected.
    pub fn resolve(self, expected: QuestionKind) -> Result<QuestionName, ReduceError> {
        match self {
            Self::Name(name) => Ok(QuestionName::new(name)),
            Self::Question { name, kind } if kind == expected => Ok(name.clone()),
            Self::Question { name, kind } => Err(ReduceError::InvalidFieldRef {
                expected,
                found: kind,
                name: name.clone(),
            }),
        }
    }
}

impl<'a> From<&'a str> for FieldRef<'a> {
    fn from(name: &'a str) -> Self {
        Self::Name(name)
    }
}

impl<'a> From<&'a String> for FieldRef<'a> {
    fn from(name: &'a String) -> Self {
        Self::Name(name)
    }
}

impl<'a> From<&'a QuestionName> for FieldRef<'a> {
    fn from(name: &'a QuestionName) -> Self {
        Self::Name(name.as_str())
    }
}

impl<'a, Q: QuestionSchema> From<&'a Q> for FieldRef<'a> {
    fn from(question: &'a Q) -> Self {
        Self::Question {
            name: question.name(),
            kind: question.kind(),
        }
    }
}

// ---------------------------------------------------------------------------
// Shared pipeline: FILTER -> REDUCE -> WRITE
// ---------------------------------------------------------------------------

/// Reduces every record first and writes afterwards, so a failing record
/// leaves the whole batch untouched.
fn apply<F>(
    records: &mut [FeedbackRecord],
    field: &QuestionName,
    mut reduce: F,
) -> Result<(), ReduceError>
where
    F: FnMut(usize, &FeedbackRecord) -> Result<UnifiedResponse, ReduceError>,
{
    let unified = records
        .iter()
        .enumerate()
        .map(|(index, record)| reduce(index, record))
        .collect::<Result<Vec<_>, _>>()?;

    for (index, (record, unified)) in records.iter_mut().zip(unified).enumerate() {
        tracing::debug!(record = index, field = %field, "unified record");
        record.set_unified(field.clone(), unified);
    }
    Ok(())
}

/// Values of submitted responses that answered `field`.
fn submitted_values<'r>(record: &'r FeedbackRecord, field: &QuestionName) -> Vec<&'r Value> {
    record
        .submitted_responses()
        .filter_map(|response| response.value(field.as_str()))
        .collect()
}

/// Most frequent item; ties are drawn uniformly at random.
fn pick_majority<T: PartialEq + Clone>(items: &[T], rng: &mut dyn RngCore) -> Option<T> {
    let mut counts: Vec<(&T, usize)> = Vec::new();
    for item in items {
        match counts.iter_mut().find(|(seen, _)| *seen == item) {
            Some(entry) => entry.1 += 1,
            None => counts.push((item, 1)),
        }
    }

    let max_count = counts.iter().map(|(_, count)| *count).max()?;
    let tied: Vec<&T> = counts
        .iter()
        .filter(|(_, count)| *count == max_count)
        .map(|(item, _)| *item)
        .collect();

    if tied.len() == 1 {
        return Some(tied[0].clone());
    }
    tied.choose(&mut *rng).map(|item| (*item).clone())
}

// ---------------------------------------------------------------------------
// Rating reductions
// ---------------------------------------------------------------------------

type RatingReducer = fn(
    &FeedbackRecord,
    usize,
    &QuestionName,
    &mut dyn RngCore,
) -> Result<UnifiedResponse, ReduceError>;

fn rating_reducer(strategy: RatingStrategy) -> RatingReducer {
    match strategy {
        RatingStrategy::Mean => rating_mean,
        RatingStrategy::Majority => rating_majority,
        RatingStrategy::Max => rating_max,
        RatingStrategy::Min => rating_min,
    }
}

fn ratings(
    record: &FeedbackRecord,
    index: usize,
    field: &QuestionName,
    strategy: RatingStrategy,
) -> Result<Vec<i64>, ReduceError> {
    let ratings = submitted_values(record, field)
        .into_iter()
        .map(|value| {
            value.as_integer().ok_or_else(|| ReduceError::InvalidValue {
                field: field.clone(),
                record: index,
                expected: "an integer rating",
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    if ratings.is_empty() {
        return Err(ReduceError::NoSubmittedResponses {
            field: field.clone(),
            record: index,
            strategy: strategy.as_str(),
        });
    }
    Ok(ratings)
}

fn rating_mean(
    record: &FeedbackRecord,
    index: usize,
    field: &QuestionName,
    _rng: &mut dyn RngCore,
) -> Result<UnifiedResponse, ReduceError> {
    let ratings = ratings(record, index, field, RatingStrategy::Mean)?;
    let mean = ratings.iter().map(|&r| r as f64).sum::<f64>() / ratings.len() as f64;
    Ok(UnifiedResponse::Single(UnificationValue::new(
        mean,
        RatingStrategy::Mean,
    )))
}

fn rating_max(
    record: &FeedbackRecord,
    index: usize,
    field: &QuestionName,
    _rng: &mut dyn RngCore,
) -> Result<UnifiedResponse, ReduceError> {
    let ratings = ratings(record, index, field, RatingStrategy::Max)?;
    let max = ratings.into_iter().max().unwrap_or_default();
    Ok(UnifiedResponse::Single(UnificationValue::new(
        max,
        RatingStrategy::Max,
    )))
}

fn rating_min(
    record: &FeedbackRecord,
    index: usize,
    field: &QuestionName,
    _rng: &mut dyn RngCore,
) -> Result<UnifiedResponse, ReduceError> {
    let ratings = ratings(record, index, field, RatingStrategy::Min)?;
    let min = ratings.into_iter().min().unwrap_or_default();
    Ok(UnifiedResponse::Single(UnificationValue::new(
        min,
        RatingStrategy::Min,
    )))
}

fn rating_majority(
    record: &FeedbackRecord,
    index: usize,
    field: &QuestionName,
    rng: &mut dyn RngCore,
) -> Result<UnifiedResponse, ReduceError> {
    let ratings = ratings(record, index, field, RatingStrategy::Majority)?;
    let winner = pick_majority(&ratings, rng).ok_or_else(|| ReduceError::NoSubmittedResponses {
        field: field.clone(),
        record: index,
        strategy: RatingStrategy::Majority.as_str(),
    })?;
    Ok(UnifiedResponse::Many(vec![UnificationValue::new(
        winner,
        RatingStrategy::Majority,
    )]))
}

/// Unifies a rating question across `records`.
pub fn unify_rating_responses<'r, 'f, R: RngCore>(
    strategy: RatingStrategy,
    records: &'r mut [FeedbackRecord],
    field: impl Into<FieldRef<'f>>,
    rng: &mut R,
) -> Result<&'r mut [FeedbackRecord], ReduceError> {
    let field = field.into().resolve(QuestionKind::Rating)?;
    let reduce = rating_reducer(strategy);
    let rng: &mut dyn RngCore = rng;

    apply(records, &field, |index, record| {
        reduce(record, index, &field, &mut *rng)
    })?;

    tracing::info!(
        strategy = strategy.as_str(),
        field = %field,
        records = records.len(),
        "unified rating responses"
    );
    Ok(records)
}

// ---------------------------------------------------------------------------
// Label-family reductions
// ---------------------------------------------------------------------------

/// Variant names shared by the single- and multi-label families.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LabelRoute {
    Majority,
    MajorityWeighted,
    Disagreement,
}

impl LabelRoute {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Majority => "majority",
            Self::MajorityWeighted => "majority_weighted",
            Self::Disagreement => "disagreement",
        }
    }
}

/// Implemented by each label family; [`unify_label_responses`] routes to
/// these by tag.
pub trait LabelFamilyStrategy: Copy + Into<Strategy> {
    /// Question family the strategy binds to.
    const QUESTION: QuestionKind;

    fn route(self) -> LabelRoute;

    fn majority(
        self,
        records: &mut [FeedbackRecord],
        field: &QuestionName,
        rng: &mut dyn RngCore,
    ) -> Result<(), ReduceError>;

    /// Extension point for weighting votes by annotator reliability.
    fn majority_weighted(
        self,
        records: &mut [FeedbackRecord],
        field: &QuestionName,
    ) -> Result<(), ReduceError>;

    /// Keeps every submitted value, one unification value per response.
    fn disagreement(
        self,
        records: &mut [FeedbackRecord],
        field: &QuestionName,
    ) -> Result<(), ReduceError> {
        let strategy: Strategy = self.into();
        apply(records, field, |_, record| {
            let values = submitted_values(record, field)
                .into_iter()
                .map(|value| UnificationValue::new(value.clone(), strategy))
                .collect();
            Ok(UnifiedResponse::Many(values))
        })
    }
}

impl LabelStrategy {
    pub fn as_str(&self) -> &'static str {
        self.route().as_str()
    }
}

impl MultiLabelStrategy {
    pub fn as_str(&self) -> &'static str {
        self.route().as_str()
    }
}

impl LabelFamilyStrategy for LabelStrategy {
    const QUESTION: QuestionKind = QuestionKind::LabelSelection;

    fn route(self) -> LabelRoute {
        match self {
            Self::Majority => LabelRoute::Majority,
            Self::MajorityWeighted => LabelRoute::MajorityWeighted,
            Self::Disagreement => LabelRoute::Disagreement,
        }
    }

    fn majority(
        self,
        records: &mut [FeedbackRecord],
        field: &QuestionName,
        rng: &mut dyn RngCore,
    ) -> Result<(), ReduceError> {
        apply(records, field, |index, record| {
            let labels = submitted_values(record, field)
                .into_iter()
                .map(|value| {
                    value.as_text().ok_or_else(|| ReduceError::InvalidValue {
                        field: field.clone(),
                        record: index,
                        expected: "a single label",
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;

            let winner = pick_majority(&labels, &mut *rng).ok_or_else(|| {
                ReduceError::NoSubmittedResponses {
                    field: field.clone(),
                    record: index,
                    strategy: self.as_str(),
                }
            })?;
            Ok(UnifiedResponse::Many(vec![UnificationValue::new(winner, self)]))
        })
    }

    fn majority_weighted(
        self,
        _records: &mut [FeedbackRecord],
        _field: &QuestionName,
    ) -> Result<(), ReduceError> {
        Err(ReduceError::NotImplemented {
            strategy: self.as_str(),
        })
    }
}

impl LabelFamilyStrategy for MultiLabelStrategy {
    const QUESTION: QuestionKind = QuestionKind::MultiLabelSelection;

    fn route(self) -> LabelRoute {
        match self {
            Self::Majority => LabelRoute::Majority,
            Self::MajorityWeighted => LabelRoute::MajorityWeighted,
            Self::Disagreement => LabelRoute::Disagreement,
        }
    }

    /// A label is accepted when more than half of the submitted responses
    /// chose it. The accepted labels are stored as one unification value.
    fn majority(
        self,
        records: &mut [FeedbackRecord],
        field: &QuestionName,
        _rng: &mut dyn RngCore,
    ) -> Result<(), ReduceError> {
        apply(records, field, |index, record| {
            let values = submitted_values(record, field);
            if values.is_empty() {
                return Err(ReduceError::NoSubmittedResponses {
                    field: field.clone(),
                    record: index,
                    strategy: self.as_str(),
                });
            }

            let mut counts: Vec<(&str, usize)> = Vec::new();
            for value in &values {
                let chosen: Vec<&str> = match value {
                    Value::Text(label) => vec![label.as_str()],
                    Value::Labels(labels) => labels.iter().map(String::as_str).collect(),
                    _ => {
                        return Err(ReduceError::InvalidValue {
                            field: field.clone(),
                            record: index,
                            expected: "a label or a list of labels",
                        })
                    }
                };
                // A response is a set: repeated labels vote once.
                let mut voted: Vec<&str> = Vec::with_capacity(chosen.len());
                for label in chosen {
                    if voted.contains(&label) {
                        continue;
                    }
                    voted.push(label);
                    match counts.iter_mut().find(|(seen, _)| *seen == label) {
                        Some(entry) => entry.1 += 1,
                        None => counts.push((label, 1)),
                    }
                }
            }

            let threshold = values.len() / 2 + 1;
            let accepted: Vec<String> = counts
                .into_iter()
                .filter(|(_, count)| *count >= threshold)
                .map(|(label, _)| label.to_owned())
                .collect();
            Ok(UnifiedResponse::Single(UnificationValue::new(accepted, self)))
        })
    }

    fn majority_weighted(
        self,
        _records: &mut [FeedbackRecord],
        _field: &QuestionName,
    ) -> Result<(), ReduceError> {
        Err(ReduceError::NotImplemented {
            strategy: self.as_str(),
        })
    }
}

/// Unifies a label or multi-label question across `records`.
pub fn unify_label_responses<'r, 'f, S: LabelFamilyStrategy, R: RngCore>(
    strategy: S,
    records: &'r mut [FeedbackRecord],
    field: impl Into<FieldRef<'f>>,
    rng: &mut R,
) -> Result<&'r mut [FeedbackRecord], ReduceError> {
    let field = field.into().resolve(S::QUESTION)?;

    match strategy.route() {
        LabelRoute::Majority => strategy.majority(records, &field, rng)?,
        LabelRoute::MajorityWeighted => strategy.majority_weighted(records, &field)?,
        LabelRoute::Disagreement => strategy.disagreement(records, &field)?,
    }

    let family = S::QUESTION;
    tracing::info!(
        strategy = strategy.route().as_str(),
        family = %family,
        field = %field,
        records = records.len(),
        "unified label responses"
    );
    Ok(records)
}

// ---------------------------------------------------------------------------
// unify_responses — dispatch keyed by strategy tag
// ---------------------------------------------------------------------------

/// Writes `unified_responses[field]` on every record and returns the same
/// records. On error no record is modified.
pub fn unify_responses<'r, 'f, R: RngCore>(
    strategy: Strategy,
    records: &'r mut [FeedbackRecord],
    field: impl Into<FieldRef<'f>>,
    rng: &mut R,
) -> Result<&'r mut [FeedbackRecord], ReduceError> {
    match strategy {
        Strategy::Rating(s) => unify_rating_responses(s, records, field, rng),
        Strategy::Label(s) => unify_label_responses(s, records, field, rng),
        Strategy::MultiLabel(s) => unify_label_responses(s, records, field, rng),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
