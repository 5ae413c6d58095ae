use std::collections::BTreeMap;
use std::fmt;

use serde::de::value::MapAccessDeserializer;
use serde::de::{self, MapAccess, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::core::{FieldName, QuestionName, Strategy};

// ---------------------------------------------------------------------------
// Value — payload of a response or of a unification result
// ---------------------------------------------------------------------------

/// Free text, a rating, a single label, or a set of labels.
///
/// `Float` only appears in unification results (`mean`); annotators never
/// submit it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Integer(i64),
    Float(f64),
    Text(String),
    Labels(Vec<String>),
}

impl Value {
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(value) => Some(*value),
            Self::Integer(value) => Some(*value as f64),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_labels(&self) -> Option<&[String]> {
        match self {
            Self::Labels(labels) => Some(labels),
            _ => None,
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Vec<String>> for Value {
    fn from(labels: Vec<String>) -> Self {
        Self::Labels(labels)
    }
}

impl From<Vec<&str>> for Value {
    fn from(labels: Vec<&str>) -> Self {
        Self::Labels(labels.into_iter().map(str::to_owned).collect())
    }
}

/// Wire envelope of one answer inside a response: `{"value": ...}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResponseValue {
    pub value: Value,
}

impl ResponseValue {
    pub fn new(value: impl Into<Value>) -> Self {
        Self {
            value: value.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// UnificationValue — a value plus the strategy that produced it
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UnificationValue {
    pub value: Value,
    pub strategy: Strategy,
}

impl UnificationValue {
    pub fn new(value: impl Into<Value>, strategy: impl Into<Strategy>) -> Self {
        Self {
            value: value.into(),
            strategy: strategy.into(),
        }
    }
}

/// Content of one `unified_responses` entry.
///
/// Aggregates (`mean`, `max`, `min`) and multi-label `majority` store a
/// single value; single-value `majority` and `disagreement` store a list.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UnifiedResponse {
    Single(UnificationValue),
    Many(Vec<UnificationValue>),
}

impl UnifiedResponse {
    /// Every unification value in the entry, regardless of shape.
    pub fn values(&self) -> &[UnificationValue] {
        match self {
            Self::Single(value) => std::slice::from_ref(value),
            Self::Many(values) => values,
        }
    }
}

// ---------------------------------------------------------------------------
// Response
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    #[default]
    Submitted,
    Discarded,
}

/// One annotator's submission against one record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "ResponseRepr")]
pub struct Response {
    user_id: Option<Uuid>,
    values: BTreeMap<QuestionName, ResponseValue>,
    status: ResponseStatus,
}

impl Response {
    /// A missing `user_id` is accepted but logged: the judgment can no
    /// longer be attributed to an annotator.
    pub fn new<I, K, V>(user_id: Option<Uuid>, values: I, status: ResponseStatus) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<QuestionName>,
        V: Into<Value>,
    {
        let values = values
            .into_iter()
            .map(|(question, value)| (question.into(), ResponseValue::new(value)))
            .collect();
        Self::from_parts(user_id, values, status)
    }

    pub fn submitted<I, K, V>(user_id: Option<Uuid>, values: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<QuestionName>,
        V: Into<Value>,
    {
        Self::new(user_id, values, ResponseStatus::Submitted)
    }

    pub fn discarded<I, K, V>(user_id: Option<Uuid>, values: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<QuestionName>,
        V: Into<Value>,
    {
        Self::new(user_id, values, ResponseStatus::Discarded)
    }

    fn from_parts(
        user_id: Option<Uuid>,
        values: BTreeMap<QuestionName, ResponseValue>,
        status: ResponseStatus,
    ) -> Self {
        if user_id.is_none() {
            tracing::warn!(
                questions = values.len(),
                "response has no user_id; it cannot be attributed to an annotator"
            );
        }
        Self {
            user_id,
            values,
            status,
        }
    }

    pub fn user_id(&self) -> Option<Uuid> {
        self.user_id
    }

    pub fn values(&self) -> &BTreeMap<QuestionName, ResponseValue> {
        &self.values
    }

    pub fn value(&self, question: &str) -> Option<&Value> {
        self.values.get(question).map(|v| &v.value)
    }

    pub fn status(&self) -> ResponseStatus {
        self.status
    }

    pub fn is_submitted(&self) -> bool {
        self.status == ResponseStatus::Submitted
    }
}

#[derive(Deserialize)]
struct ResponseRepr {
    #[serde(default)]
    user_id: Option<Uuid>,
    values: BTreeMap<QuestionName, ResponseValue>,
    #[serde(default)]
    status: ResponseStatus,
}

impl From<ResponseRepr> for Response {
    fn from(repr: ResponseRepr) -> Self {
        Self::from_parts(repr.user_id, repr.values, repr.status)
    }
}

// ---------------------------------------------------------------------------
// FeedbackRecord
// ---------------------------------------------------------------------------

/// The unit being annotated.
///
/// `unified_responses` is written only by the strategy engine and is left
/// out of the serialized form.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "RecordRepr")]
pub struct FeedbackRecord {
    fields: BTreeMap<FieldName, String>,
    responses: Vec<Response>,
    #[serde(skip_serializing_if = "Option::is_none")]
    external_id: Option<String>,
    #[serde(skip)]
    unified_responses: BTreeMap<QuestionName, UnifiedResponse>,
}

impl FeedbackRecord {
    pub fn new<I, K, V>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<FieldName>,
        V: Into<String>,
    {
        Self {
            fields: fields
                .into_iter()
                .map(|(name, text)| (name.into(), text.into()))
                .collect(),
            responses: Vec::new(),
            external_id: None,
            unified_responses: BTreeMap::new(),
        }
    }

    pub fn with_response(mut self, response: Response) -> Self {
        self.responses.push(response);
        self
    }

    pub fn with_responses(mut self, responses: impl IntoIterator<Item = Response>) -> Self {
        self.responses.extend(responses);
        self
    }

    pub fn with_external_id(mut self, external_id: impl Into<String>) -> Self {
        self.external_id = Some(external_id.into());
        self
    }

    pub fn push_response(&mut self, response: Response) {
        self.responses.push(response);
    }

    pub fn fields(&self) -> &BTreeMap<FieldName, String> {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub fn responses(&self) -> &[Response] {
        &self.responses
    }

    pub fn submitted_responses(&self) -> impl Iterator<Item = &Response> {
        self.responses.iter().filter(|r| r.is_submitted())
    }

    pub fn external_id(&self) -> Option<&str> {
        self.external_id.as_deref()
    }

    pub fn unified_responses(&self) -> &BTreeMap<QuestionName, UnifiedResponse> {
        &self.unified_responses
    }

    pub fn unified(&self, question: &str) -> Option<&UnifiedResponse> {
        self.unified_responses.get(question)
    }

    pub(crate) fn set_unified(&mut self, question: QuestionName, unified: UnifiedResponse) {
        self.unified_responses.insert(question, unified);
    }
}

/// Accepts a list of responses, a single response, or null.
fn deserialize_responses<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Vec<Response>, D::Error> {
    struct ResponsesVisitor;

    impl<'de> Visitor<'de> for ResponsesVisitor {
        type Value = Vec<Response>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a response, a list of responses, or null")
        }

        fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Vec<Response>, A::Error> {
            let mut responses = Vec::with_capacity(seq.size_hint().unwrap_or(0));
            while let Some(response) = seq.next_element::<Response>()? {
                responses.push(response);
            }
            Ok(responses)
        }

        fn visit_map<A: MapAccess<'de>>(self, map: A) -> Result<Vec<Response>, A::Error> {
            let response = Response::deserialize(MapAccessDeserializer::new(map))?;
            Ok(vec![response])
        }

        fn visit_unit<E: de::Error>(self) -> Result<Vec<Response>, E> {
            Ok(Vec::new())
        }

        fn visit_none<E: de::Error>(self) -> Result<Vec<Response>, E> {
            Ok(Vec::new())
        }
    }

    deserializer.deserialize_any(ResponsesVisitor)
}

#[derive(Deserialize)]
struct RecordRepr {
    fields: BTreeMap<FieldName, String>,
    #[serde(default, deserialize_with = "deserialize_responses")]
    responses: Vec<Response>,
    #[serde(default)]
    external_id: Option<String>,
}

impl From<RecordRepr> for FeedbackRecord {
    fn from(repr: RecordRepr) -> Self {
        Self {
            fields: repr.fields,
            responses: repr.responses,
            external_id: repr.external_id,
            unified_responses: BTreeMap::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use serde_json::json;

    use super::*;
    use crate::core::RatingStrategy;

    #[test]
    fn test_value_untagged_shapes() {
        let values: Vec<Value> =
            serde_json::from_value(json!([5, 4.5, "yes", ["a", "b"]])).unwrap();
        assert_eq!(
            values,
            vec![
                Value::Integer(5),
                Value::Float(4.5),
                Value::Text("yes".into()),
                Value::Labels(vec!["a".into(), "b".into()]),
            ]
        );
    }

    #[test]
    fn test_response_defaults() {
        let response: Response = serde_json::from_value(json!({
            "values": { "quality": { "value": 4 } },
        }))
        .unwrap();
        assert_eq!(response.user_id(), None);
        assert_eq!(response.status(), ResponseStatus::Submitted);
        assert_eq!(response.value("quality"), Some(&Value::Integer(4)));
    }

    #[test]
    fn test_response_discarded_status() {
        let response: Response = serde_json::from_value(json!({
            "user_id": "6f1f3b52-6b5e-4c8a-9d3b-0a6c1a3e2f10",
            "values": { "quality": { "value": 1 } },
            "status": "discarded",
        }))
        .unwrap();
        assert!(!response.is_submitted());
        assert!(response.user_id().is_some());
    }

    #[test]
    fn test_record_single_response_normalized_to_list() {
        let record: FeedbackRecord = serde_json::from_value(json!({
            "fields": { "text": "hello" },
            "responses": { "values": { "sentiment": { "value": "positive" } } },
        }))
        .unwrap();
        assert_eq!(record.responses().len(), 1);
    }

    #[test]
    fn test_bad_response_error_names_the_cause() {
        let err = serde_json::from_value::<FeedbackRecord>(json!({
            "fields": { "text": "hello" },
            "responses": [{ "values": { "quality": { "value": 4 } }, "status": "submited" }],
        }))
        .unwrap_err();
        assert!(err.to_string().contains("submited"), "{err}");

        let err = serde_json::from_value::<FeedbackRecord>(json!({
            "fields": { "text": "hello" },
            "responses": { "values": { "quality": { "value": 4 } }, "status": "submited" },
        }))
        .unwrap_err();
        assert!(err.to_string().contains("submited"), "{err}");

        let err = serde_json::from_value::<FeedbackRecord>(json!({
            "fields": { "text": "hello" },
            "responses": "yes",
        }))
        .unwrap_err();
        assert!(err.to_string().contains("a response, a list of responses, or null"), "{err}");
    }

    // -- Missing user_id warning --

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl CapturedLogs {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn capture_logs(f: impl FnOnce()) -> String {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        tracing::subscriber::with_default(subscriber, f);
        logs.contents()
    }

    #[test]
    fn test_missing_user_id_is_warned() {
        let logs = capture_logs(|| {
            Response::submitted(None, [("quality", 4)]);
        });
        assert!(logs.contains("WARN"), "{logs}");
        assert!(logs.contains("response has no user_id"), "{logs}");

        let logs = capture_logs(|| {
            serde_json::from_value::<Response>(json!({
                "values": { "quality": { "value": 4 } },
            }))
            .unwrap();
        });
        assert!(logs.contains("response has no user_id"), "{logs}");
    }

    #[test]
    fn test_attributed_response_is_not_warned() {
        let logs = capture_logs(|| {
            Response::submitted(Some(Uuid::new_v4()), [("quality", 4)]);
        });
        assert!(!logs.contains("user_id"), "{logs}");
    }

    #[test]
    fn test_record_absent_responses_become_empty() {
        let missing: FeedbackRecord =
            serde_json::from_value(json!({ "fields": { "text": "hello" } })).unwrap();
        assert!(missing.responses().is_empty());

        let null: FeedbackRecord =
            serde_json::from_value(json!({ "fields": { "text": "hello" }, "responses": null }))
                .unwrap();
        assert!(null.responses().is_empty());
    }

    #[test]
    fn test_record_list_of_responses_and_external_id() {
        let record: FeedbackRecord = serde_json::from_value(json!({
            "fields": { "text": "hello" },
            "responses": [
                { "values": { "quality": { "value": 4 } } },
                { "values": { "quality": { "value": 2 } }, "status": "discarded" },
            ],
            "external_id": "entry-1",
            "metadata": { "ignored": true },
        }))
        .unwrap();
        assert_eq!(record.responses().len(), 2);
        assert_eq!(record.submitted_responses().count(), 1);
        assert_eq!(record.external_id(), Some("entry-1"));
        assert_eq!(record.field("text"), Some("hello"));
    }

    #[test]
    fn test_record_construction_never_populates_unified() {
        let record: FeedbackRecord = serde_json::from_value(json!({
            "fields": { "text": "hello" },
            "unified_responses": { "quality": { "value": 3, "strategy": "mean" } },
        }))
        .unwrap();
        assert!(record.unified_responses().is_empty());
    }

    #[test]
    fn test_unified_responses_excluded_from_serialization() {
        let mut record = FeedbackRecord::new([("text", "hello")])
            .with_response(Response::submitted(None, [("quality", 4)]));
        record.set_unified(
            QuestionName::new("quality"),
            UnifiedResponse::Single(UnificationValue::new(4.0, RatingStrategy::Mean)),
        );

        let json = serde_json::to_value(&record).unwrap();
        assert!(json.get("unified_responses").is_none());
        assert_eq!(json["responses"][0]["values"]["quality"]["value"], json!(4));
    }

    #[test]
    fn test_unified_response_values_view() {
        let single = UnifiedResponse::Single(UnificationValue::new(5, RatingStrategy::Max));
        assert_eq!(single.values().len(), 1);

        let many = UnifiedResponse::Many(vec![
            UnificationValue::new(5, RatingStrategy::Majority),
            UnificationValue::new(4, RatingStrategy::Majority),
        ]);
        assert_eq!(many.values().len(), 2);
    }
}
