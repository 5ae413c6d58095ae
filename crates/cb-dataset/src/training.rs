use cb_core::core::{
    FeedbackRecord, QuestionSchema, Strategy, TextField, Unification, UnifyError, Value,
};
use rand::RngCore;
use serde::Serialize;

use crate::error::DatasetError;

/// One `{text, label}` row for a text-classification trainer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextClassificationExample {
    pub text: String,
    pub label: Value,
    pub strategy: Strategy,
}

/// Rows produced by [`TrainingDataForTextClassification::prepare`] and the
/// records left out of them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PreparedTrainingData {
    pub examples: Vec<TextClassificationExample>,
    /// Records without a value for the text field.
    pub skipped_missing_text: usize,
    /// Records without any submitted answer to the label question.
    pub skipped_unlabeled: usize,
}

/// Text-classification task: the input text comes from a field, the label
/// from unifying a question's responses.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrainingDataForTextClassification {
    text: TextField,
    label: Unification,
}

impl TrainingDataForTextClassification {
    pub fn new(text: TextField, label: Unification) -> Self {
        Self { text, label }
    }

    pub fn text(&self) -> &TextField {
        &self.text
    }

    pub fn label(&self) -> &Unification {
        &self.label
    }

    pub fn unify_responses<'r>(
        &self,
        records: &'r mut [FeedbackRecord],
    ) -> Result<&'r mut [FeedbackRecord], DatasetError> {
        self.unify_responses_with_rng(records, &mut rand::rng())
    }

    pub fn unify_responses_with_rng<'r, R: RngCore>(
        &self,
        records: &'r mut [FeedbackRecord],
        rng: &mut R,
    ) -> Result<&'r mut [FeedbackRecord], DatasetError> {
        self.label
            .unify_with_rng(records, rng)
            .map_err(|err| DatasetError::Unify(UnifyError::from(err)))
    }

    pub fn prepare(&self, records: &[FeedbackRecord]) -> Result<PreparedTrainingData, DatasetError> {
        self.prepare_with_rng(records, &mut rand::rng())
    }

    /// Unifies the eligible records and emits one example per unification
    /// value, so `disagreement` yields one example per annotator. The input
    /// records are not modified.
    pub fn prepare_with_rng<R: RngCore>(
        &self,
        records: &[FeedbackRecord],
        rng: &mut R,
    ) -> Result<PreparedTrainingData, DatasetError> {
        let text_field = self.text.name().as_str();
        let question = self.label.question().name().as_str();
        let mut prepared = PreparedTrainingData::default();

        let mut eligible = Vec::with_capacity(records.len());
        for (index, record) in records.iter().enumerate() {
            if record.field(text_field).is_none() {
                tracing::debug!(record = index, field = text_field, "skipping record without text");
                prepared.skipped_missing_text += 1;
                continue;
            }
            if !record
                .submitted_responses()
                .any(|response| response.value(question).is_some())
            {
                tracing::debug!(record = index, question, "skipping unlabeled record");
                prepared.skipped_unlabeled += 1;
                continue;
            }
            eligible.push(record.clone());
        }

        self.unify_responses_with_rng(&mut eligible, rng)?;

        for record in &eligible {
            let (Some(text), Some(unified)) = (record.field(text_field), record.unified(question))
            else {
                continue;
            };
            prepared
                .examples
                .extend(unified.values().iter().map(|value| TextClassificationExample {
                    text: text.to_owned(),
                    label: value.value.clone(),
                    strategy: value.strategy,
                }));
        }

        tracing::info!(
            examples = prepared.examples.len(),
            skipped_missing_text = prepared.skipped_missing_text,
            skipped_unlabeled = prepared.skipped_unlabeled,
            strategy = %self.label.strategy(),
            "prepared text classification data"
        );
        Ok(prepared)
    }
}

#[derive(Serialize)]
struct ExportJsonExample<'a> {
    text: &'a str,
    label: &'a Value,
}

/// Renders `{text, label}` rows as pretty-printed JSON.
pub fn export_to_json(examples: &[TextClassificationExample]) -> Result<String, DatasetError> {
    let export_examples: Vec<ExportJsonExample<'_>> = examples
        .iter()
        .map(|example| ExportJsonExample {
            text: example.text.as_str(),
            label: &example.label,
        })
        .collect();

    let json = serde_json::to_string_pretty(&export_examples)?;
    Ok(json)
}

#[cfg(test)]
mod tests {
    use cb_core::core::{
        LabelQuestion, LabelStrategy, MultiLabelQuestion, RatingQuestion, ReduceError, Response,
    };
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(3)
    }

    fn text_field() -> TextField {
        TextField::new("text").unwrap()
    }

    fn sentiment_task(strategy: &str) -> TrainingDataForTextClassification {
        let question = LabelQuestion::new("sentiment", ["positive", "negative", "neutral"]).unwrap();
        TrainingDataForTextClassification::new(
            text_field(),
            Unification::new(question, strategy).unwrap(),
        )
    }

    fn labelled(text: &str, labels: &[&str]) -> FeedbackRecord {
        FeedbackRecord::new([("text", text)]).with_responses(
            labels
                .iter()
                .map(|label| Response::submitted(None, [("sentiment", *label)])),
        )
    }

    // -- unify_responses --

    #[test]
    fn test_unify_responses_mutates_records() {
        let task = sentiment_task("majority");
        let mut records = vec![labelled("good", &["positive", "positive", "negative"])];
        task.unify_responses_with_rng(&mut records, &mut rng()).unwrap();
        assert!(records[0].unified("sentiment").is_some());
    }

    #[test]
    fn test_unify_responses_wraps_reduce_errors() {
        let task = sentiment_task("majority");
        let mut records = vec![labelled("empty", &[])];
        let err = task.unify_responses(&mut records).unwrap_err();
        assert!(matches!(
            err,
            DatasetError::Unify(UnifyError::Reduce(ReduceError::NoSubmittedResponses { .. }))
        ));
    }

    // -- prepare --

    #[test]
    fn test_prepare_majority_one_row_per_record() {
        let task = sentiment_task("majority");
        let records = vec![
            labelled("good", &["positive", "positive", "negative"]),
            labelled("bad", &["negative"]),
        ];

        let prepared = task.prepare_with_rng(&records, &mut rng()).unwrap();
        assert_eq!(prepared.examples.len(), 2);
        assert_eq!(prepared.examples[0].text, "good");
        assert_eq!(prepared.examples[0].label, Value::from("positive"));
        assert_eq!(
            prepared.examples[1].strategy,
            Strategy::Label(LabelStrategy::Majority)
        );
        // Input records are left as they were.
        assert!(records[0].unified("sentiment").is_none());
    }

    #[test]
    fn test_prepare_disagreement_one_row_per_annotator() {
        let task = sentiment_task("disagreement");
        let records = vec![labelled("mixed", &["positive", "negative", "neutral"])];

        let prepared = task.prepare_with_rng(&records, &mut rng()).unwrap();
        assert_eq!(prepared.examples.len(), 3);
        assert!(prepared.examples.iter().all(|e| e.text == "mixed"));
    }

    #[test]
    fn test_prepare_skips_and_counts_unusable_records() {
        let task = sentiment_task("majority");
        let mut discarded_only = FeedbackRecord::new([("text", "ignored")]);
        discarded_only.push_response(Response::discarded(None, [("sentiment", "positive")]));
        let records = vec![
            FeedbackRecord::new([("prompt", "no text field")])
                .with_response(Response::submitted(None, [("sentiment", "positive")])),
            discarded_only,
            labelled("kept", &["neutral"]),
        ];

        let prepared = task.prepare_with_rng(&records, &mut rng()).unwrap();
        assert_eq!(prepared.skipped_missing_text, 1);
        assert_eq!(prepared.skipped_unlabeled, 1);
        assert_eq!(prepared.examples.len(), 1);
        assert_eq!(prepared.examples[0].text, "kept");
    }

    #[test]
    fn test_prepare_rating_mean_label() {
        let question = RatingQuestion::new("quality", [1, 2, 3, 4, 5]).unwrap();
        let task = TrainingDataForTextClassification::new(
            text_field(),
            Unification::with_default_strategy(question).unwrap(),
        );
        let records = vec![FeedbackRecord::new([("text", "t")]).with_responses([
            Response::submitted(None, [("quality", 2)]),
            Response::submitted(None, [("quality", 4)]),
        ])];

        let prepared = task.prepare(&records).unwrap();
        assert_eq!(prepared.examples[0].label, Value::Float(3.0));
    }

    #[test]
    fn test_prepare_multi_label_majority_label_is_a_list() {
        let question = MultiLabelQuestion::new("topics", ["x", "y", "z"]).unwrap();
        let task = TrainingDataForTextClassification::new(
            text_field(),
            Unification::new(question, "majority").unwrap(),
        );
        let records = vec![FeedbackRecord::new([("text", "t")]).with_responses([
            Response::submitted(None, [("topics", vec!["x", "y"])]),
            Response::submitted(None, [("topics", vec!["x"])]),
        ])];

        let prepared = task.prepare_with_rng(&records, &mut rng()).unwrap();
        assert_eq!(prepared.examples.len(), 1);
        assert_eq!(prepared.examples[0].label, Value::from(vec!["x"]));
    }

    // -- export --

    #[test]
    fn test_export_to_json() {
        let examples = vec![TextClassificationExample {
            text: "good".into(),
            label: Value::from("positive"),
            strategy: Strategy::Label(LabelStrategy::Majority),
        }];
        let json = export_to_json(&examples).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(
            parsed,
            serde_json::json!([{ "text": "good", "label": "positive" }])
        );
    }

    #[test]
    fn test_export_empty() {
        assert_eq!(export_to_json(&[]).unwrap(), "[]");
    }
}
