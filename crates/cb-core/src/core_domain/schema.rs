use std::collections::HashSet;
use std::fmt;

use serde::de::{IgnoredAny, MapAccess, SeqAccess, Visitor};
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{json, Map, Value as JsonValue};

use crate::core::{FieldName, QuestionKind, QuestionName, SchemaError};

/// Derived configuration payload consumed by rendering and storage layers.
pub type Settings = Map<String, JsonValue>;

/// Number of label options shown when the caller does not choose.
pub const DEFAULT_VISIBLE_LABELS: u32 = 20;
pub const MIN_VISIBLE_LABELS: u32 = 3;
const MIN_OPTIONS: usize = 2;

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

/// Upper-cases the first character and lower-cases the rest.
fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

fn derive_title(name: &str, title: Option<String>) -> String {
    match title {
        Some(title) if !title.is_empty() => title,
        _ => capitalize(name),
    }
}

fn default_required() -> bool {
    true
}

fn default_visible_labels() -> Option<u32> {
    Some(DEFAULT_VISIBLE_LABELS)
}

fn validate_name(name: &str) -> Result<(), SchemaError> {
    if name.trim().is_empty() {
        return Err(SchemaError::EmptyName);
    }
    Ok(())
}

fn text_settings(use_markdown: bool) -> Settings {
    let mut settings = Settings::new();
    settings.insert("type".to_owned(), json!(QuestionKind::Text.as_str()));
    settings.insert("use_markdown".to_owned(), json!(use_markdown));
    settings
}

// ---------------------------------------------------------------------------
// TextField
// ---------------------------------------------------------------------------

/// A text input shown to annotators alongside the questions.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "TextFieldConfig")]
pub struct TextField {
    name: FieldName,
    title: String,
    required: bool,
    use_markdown: bool,
    settings: Settings,
}

impl TextField {
    pub fn new(name: impl Into<FieldName>) -> Result<Self, SchemaError> {
        let name = name.into();
        validate_name(name.as_str())?;
        let title = capitalize(name.as_str());
        let mut field = Self {
            name,
            title,
            required: true,
            use_markdown: false,
            settings: Settings::new(),
        };
        field.refresh_settings();
        Ok(field)
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = derive_title(self.name.as_str(), Some(title.into()));
        self
    }

    pub fn with_required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn with_markdown(mut self, use_markdown: bool) -> Self {
        self.set_use_markdown(use_markdown);
        self
    }

    pub fn name(&self) -> &FieldName {
        &self.name
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn required(&self) -> bool {
        self.required
    }

    pub fn use_markdown(&self) -> bool {
        self.use_markdown
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn set_use_markdown(&mut self, use_markdown: bool) {
        self.use_markdown = use_markdown;
        self.refresh_settings();
    }

    fn refresh_settings(&mut self) {
        self.settings = text_settings(self.use_markdown);
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct TextFieldConfig {
    name: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default = "default_required")]
    required: bool,
    #[serde(default)]
    use_markdown: bool,
    /// Derived on construction; an incoming payload is discarded.
    #[serde(default, rename = "settings")]
    _settings: Option<IgnoredAny>,
}

impl TryFrom<TextFieldConfig> for TextField {
    type Error = SchemaError;

    fn try_from(config: TextFieldConfig) -> Result<Self, Self::Error> {
        let mut field = TextField::new(config.name)?
            .with_required(config.required)
            .with_markdown(config.use_markdown);
        if let Some(title) = config.title {
            field = field.with_title(title);
        }
        Ok(field)
    }
}

// ---------------------------------------------------------------------------
// QuestionSchema — capability surface shared by every question variant
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct QuestionBase {
    name: QuestionName,
    title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    required: bool,
}

impl QuestionBase {
    /// Base with the title derived from the (already validated) name.
    fn titled(name: QuestionName) -> Self {
        let title = capitalize(name.as_str());
        Self {
            name,
            title,
            description: None,
            required: true,
        }
    }
}

pub trait QuestionSchema {
    fn kind(&self) -> QuestionKind;

    fn base(&self) -> &QuestionBase;

    fn settings(&self) -> &Settings;

    fn name(&self) -> &QuestionName {
        &self.base().name
    }

    fn title(&self) -> &str {
        &self.base().title
    }

    fn description(&self) -> Option<&str> {
        self.base().description.as_deref()
    }

    fn required(&self) -> bool {
        self.base().required
    }
}

macro_rules! question_schema {
    ($ty:ident, $kind:expr) => {
        impl $ty {
            pub fn with_title(mut self, title: impl Into<String>) -> Self {
                self.base.title = derive_title(self.base.name.as_str(), Some(title.into()));
                self
            }

            pub fn with_description(mut self, description: impl Into<String>) -> Self {
                self.base.description = Some(description.into());
                self
            }

            pub fn with_required(mut self, required: bool) -> Self {
                self.base.required = required;
                self
            }

            fn with_config_base(
                self,
                title: Option<String>,
                description: Option<String>,
                required: bool,
            ) -> Self {
                let mut question = self.with_required(required);
                if let Some(title) = title {
                    question = question.with_title(title);
                }
                question.base.description = description;
                question
            }
        }

        impl QuestionSchema for $ty {
            fn kind(&self) -> QuestionKind {
                $kind
            }

            fn base(&self) -> &QuestionBase {
                &self.base
            }

            fn settings(&self) -> &Settings {
                &self.settings
            }
        }
    };
}

// ---------------------------------------------------------------------------
// TextQuestion
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "TextQuestionConfig")]
pub struct TextQuestion {
    #[serde(flatten)]
    base: QuestionBase,
    use_markdown: bool,
    settings: Settings,
}

impl TextQuestion {
    pub fn new(name: impl Into<QuestionName>) -> Result<Self, SchemaError> {
        let name = name.into();
        validate_name(name.as_str())?;
        let mut question = Self {
            base: QuestionBase::titled(name),
            use_markdown: false,
            settings: Settings::new(),
        };
        question.refresh_settings();
        Ok(question)
    }

    pub fn with_markdown(mut self, use_markdown: bool) -> Self {
        self.set_use_markdown(use_markdown);
        self
    }

    pub fn use_markdown(&self) -> bool {
        self.use_markdown
    }

    pub fn set_use_markdown(&mut self, use_markdown: bool) {
        self.use_markdown = use_markdown;
        self.refresh_settings();
    }

    fn refresh_settings(&mut self) {
        self.settings = text_settings(self.use_markdown);
    }
}

question_schema!(TextQuestion, QuestionKind::Text);

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct TextQuestionConfig {
    name: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default = "default_required")]
    required: bool,
    #[serde(default)]
    use_markdown: bool,
    /// Derived on construction; an incoming payload is discarded.
    #[serde(default, rename = "settings")]
    _settings: Option<IgnoredAny>,
}

impl TryFrom<TextQuestionConfig> for TextQuestion {
    type Error = SchemaError;

    fn try_from(config: TextQuestionConfig) -> Result<Self, Self::Error> {
        Ok(TextQuestion::new(config.name)?
            .with_markdown(config.use_markdown)
            .with_config_base(config.title, config.description, config.required))
    }
}

// ---------------------------------------------------------------------------
// RatingQuestion
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RatingQuestionConfig")]
pub struct RatingQuestion {
    #[serde(flatten)]
    base: QuestionBase,
    values: Vec<i64>,
    settings: Settings,
}

impl RatingQuestion {
    pub fn new(
        name: impl Into<QuestionName>,
        values: impl IntoIterator<Item = i64>,
    ) -> Result<Self, SchemaError> {
        let name = name.into();
        let values: Vec<i64> = values.into_iter().collect();
        validate_name(name.as_str())?;
        validate_rating_values(&name, &values)?;
        let mut question = Self {
            base: QuestionBase::titled(name),
            values,
            settings: Settings::new(),
        };
        question.refresh_settings();
        Ok(question)
    }

    pub fn values(&self) -> &[i64] {
        &self.values
    }

    pub fn set_values(&mut self, values: impl IntoIterator<Item = i64>) -> Result<(), SchemaError> {
        let values: Vec<i64> = values.into_iter().collect();
        validate_rating_values(&self.base.name, &values)?;
        self.values = values;
        self.refresh_settings();
        Ok(())
    }

    fn refresh_settings(&mut self) {
        let options: Vec<JsonValue> = self
            .values
            .iter()
            .map(|value| json!({ "value": value }))
            .collect();
        let mut settings = Settings::new();
        settings.insert("type".to_owned(), json!(QuestionKind::Rating.as_str()));
        settings.insert("options".to_owned(), JsonValue::Array(options));
        self.settings = settings;
    }
}

question_schema!(RatingQuestion, QuestionKind::Rating);

fn validate_rating_values(name: &QuestionName, values: &[i64]) -> Result<(), SchemaError> {
    if values.len() < MIN_OPTIONS {
        return Err(SchemaError::TooFewRatingValues {
            name: name.clone(),
            count: values.len(),
        });
    }
    let mut seen = HashSet::with_capacity(values.len());
    for value in values {
        if !seen.insert(*value) {
            return Err(SchemaError::DuplicateRatingValue {
                name: name.clone(),
                value: *value,
            });
        }
    }
    Ok(())
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RatingQuestionConfig {
    name: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default = "default_required")]
    required: bool,
    values: Vec<i64>,
    /// Derived on construction; an incoming payload is discarded.
    #[serde(default, rename = "settings")]
    _settings: Option<IgnoredAny>,
}

impl TryFrom<RatingQuestionConfig> for RatingQuestion {
    type Error = SchemaError;

    fn try_from(config: RatingQuestionConfig) -> Result<Self, Self::Error> {
        Ok(RatingQuestion::new(config.name, config.values)?.with_config_base(
            config.title,
            config.description,
            config.required,
        ))
    }
}

// ---------------------------------------------------------------------------
// Labels — list or ordered key/display-text mapping
// ---------------------------------------------------------------------------

/// Label options of a label or multi-label question, in declaration order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Labels {
    /// Each label is both the stored value and the display text.
    List(Vec<String>),
    /// Stored value paired with its display text.
    Mapping(Vec<(String, String)>),
}

impl Labels {
    pub fn list<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::List(labels.into_iter().map(Into::into).collect())
    }

    pub fn mapping<I, K, V>(labels: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self::Mapping(
            labels
                .into_iter()
                .map(|(key, text)| (key.into(), text.into()))
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        match self {
            Self::List(labels) => labels.len(),
            Self::Mapping(labels) => labels.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `(value, text)` pairs in declaration order.
    pub fn options(&self) -> Vec<(&str, &str)> {
        match self {
            Self::List(labels) => labels.iter().map(|l| (l.as_str(), l.as_str())).collect(),
            Self::Mapping(labels) => labels
                .iter()
                .map(|(key, text)| (key.as_str(), text.as_str()))
                .collect(),
        }
    }
}

impl From<Vec<String>> for Labels {
    fn from(labels: Vec<String>) -> Self {
        Self::List(labels)
    }
}

impl From<Vec<&str>> for Labels {
    fn from(labels: Vec<&str>) -> Self {
        Self::list(labels)
    }
}

impl<const N: usize> From<[&str; N]> for Labels {
    fn from(labels: [&str; N]) -> Self {
        Self::list(labels)
    }
}

impl From<Vec<(String, String)>> for Labels {
    fn from(labels: Vec<(String, String)>) -> Self {
        Self::Mapping(labels)
    }
}

impl<const N: usize> From<[(&str, &str); N]> for Labels {
    fn from(labels: [(&str, &str); N]) -> Self {
        Self::mapping(labels)
    }
}

impl Serialize for Labels {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::List(labels) => {
                let mut seq = serializer.serialize_seq(Some(labels.len()))?;
                for label in labels {
                    seq.serialize_element(label)?;
                }
                seq.end()
            }
            Self::Mapping(labels) => {
                let mut map = serializer.serialize_map(Some(labels.len()))?;
                for (key, text) in labels {
                    map.serialize_entry(key, text)?;
                }
                map.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for Labels {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct LabelsVisitor;

        impl<'de> Visitor<'de> for LabelsVisitor {
            type Value = Labels;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a list of labels or a map of label to display text")
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Labels, A::Error> {
                let mut labels = Vec::with_capacity(seq.size_hint().unwrap_or(0));
                while let Some(label) = seq.next_element::<String>()? {
                    labels.push(label);
                }
                Ok(Labels::List(labels))
            }

            // Walks entries directly so declaration order survives.
            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Labels, A::Error> {
                let mut labels = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((key, text)) = map.next_entry::<String, String>()? {
                    labels.push((key, text));
                }
                Ok(Labels::Mapping(labels))
            }
        }

        deserializer.deserialize_any(LabelsVisitor)
    }
}

fn validate_labels(name: &QuestionName, labels: &Labels) -> Result<(), SchemaError> {
    if labels.len() < MIN_OPTIONS {
        return Err(SchemaError::TooFewLabels {
            name: name.clone(),
            count: labels.len(),
        });
    }
    let mut seen_values = HashSet::with_capacity(labels.len());
    let mut seen_texts = HashSet::with_capacity(labels.len());
    for (value, text) in labels.options() {
        if !seen_values.insert(value) {
            return Err(SchemaError::DuplicateLabel {
                name: name.clone(),
                label: value.to_owned(),
            });
        }
        if !seen_texts.insert(text) {
            return Err(SchemaError::DuplicateLabelText {
                name: name.clone(),
                text: text.to_owned(),
            });
        }
    }
    Ok(())
}

fn validate_visible_labels(name: &QuestionName, visible: Option<u32>) -> Result<(), SchemaError> {
    match visible {
        Some(visible) if visible < MIN_VISIBLE_LABELS => Err(SchemaError::VisibleLabelsTooLow {
            name: name.clone(),
            visible,
        }),
        _ => Ok(()),
    }
}

fn label_settings(kind: QuestionKind, labels: &Labels, visible: Option<u32>) -> Settings {
    let options: Vec<JsonValue> = labels
        .options()
        .into_iter()
        .map(|(value, text)| json!({ "value": value, "text": text }))
        .collect();
    let mut settings = Settings::new();
    settings.insert("type".to_owned(), json!(kind.as_str()));
    settings.insert("options".to_owned(), JsonValue::Array(options));
    // `null` means every label is visible.
    settings.insert("visible_options".to_owned(), json!(visible));
    settings
}

// ---------------------------------------------------------------------------
// LabelQuestion / MultiLabelQuestion
// ---------------------------------------------------------------------------

macro_rules! label_question {
    ($(#[$meta:meta])* $ty:ident, $config:ident, $config_name:literal, $kind:expr) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
        #[serde(try_from = $config_name)]
        pub struct $ty {
            #[serde(flatten)]
            base: QuestionBase,
            labels: Labels,
            visible_labels: Option<u32>,
            settings: Settings,
        }

        impl $ty {
            pub fn new(
                name: impl Into<QuestionName>,
                labels: impl Into<Labels>,
            ) -> Result<Self, SchemaError> {
                let name = name.into();
                let labels = labels.into();
                validate_name(name.as_str())?;
                validate_labels(&name, &labels)?;
                let mut question = Self {
                    base: QuestionBase::titled(name),
                    labels,
                    visible_labels: default_visible_labels(),
                    settings: Settings::new(),
                };
                question.refresh_settings();
                Ok(question)
            }

            /// `None` shows every label.
            pub fn with_visible_labels(mut self, visible: Option<u32>) -> Result<Self, SchemaError> {
                self.set_visible_labels(visible)?;
                Ok(self)
            }

            pub fn labels(&self) -> &Labels {
                &self.labels
            }

            pub fn visible_labels(&self) -> Option<u32> {
                self.visible_labels
            }

            pub fn set_labels(&mut self, labels: impl Into<Labels>) -> Result<(), SchemaError> {
                let labels = labels.into();
                validate_labels(&self.base.name, &labels)?;
                self.labels = labels;
                self.refresh_settings();
                Ok(())
            }

            pub fn set_visible_labels(&mut self, visible: Option<u32>) -> Result<(), SchemaError> {
                validate_visible_labels(&self.base.name, visible)?;
                self.visible_labels = visible;
                self.refresh_settings();
                Ok(())
            }

            fn refresh_settings(&mut self) {
                self.settings = label_settings($kind, &self.labels, self.visible_labels);
            }
        }

        question_schema!($ty, $kind);

        #[derive(Deserialize)]
        #[serde(deny_unknown_fields)]
        struct $config {
            name: String,
            #[serde(default)]
            title: Option<String>,
            #[serde(default)]
            description: Option<String>,
            #[serde(default = "default_required")]
            required: bool,
            labels: Labels,
            #[serde(default = "default_visible_labels")]
            visible_labels: Option<u32>,
            /// Derived on construction; an incoming payload is discarded.
            #[serde(default, rename = "settings")]
            _settings: Option<IgnoredAny>,
        }

        impl TryFrom<$config> for $ty {
            type Error = SchemaError;

            fn try_from(config: $config) -> Result<Self, Self::Error> {
                Ok($ty::new(config.name, config.labels)?
                    .with_visible_labels(config.visible_labels)?
                    .with_config_base(config.title, config.description, config.required))
            }
        }
    };
}

label_question!(
    /// Annotators pick exactly one label.
    LabelQuestion,
    LabelQuestionConfig,
    "LabelQuestionConfig",
    QuestionKind::LabelSelection
);

label_question!(
    /// Annotators pick any number of labels.
    MultiLabelQuestion,
    MultiLabelQuestionConfig,
    "MultiLabelQuestionConfig",
    QuestionKind::MultiLabelSelection
);

// ---------------------------------------------------------------------------
// Question — closed set of question variants
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Question {
    Text(TextQuestion),
    Rating(RatingQuestion),
    LabelSelection(LabelQuestion),
    MultiLabelSelection(MultiLabelQuestion),
}

impl QuestionSchema for Question {
    fn kind(&self) -> QuestionKind {
        match self {
            Self::Text(q) => q.kind(),
            Self::Rating(q) => q.kind(),
            Self::LabelSelection(q) => q.kind(),
            Self::MultiLabelSelection(q) => q.kind(),
        }
    }

    fn base(&self) -> &QuestionBase {
        match self {
            Self::Text(q) => q.base(),
            Self::Rating(q) => q.base(),
            Self::LabelSelection(q) => q.base(),
            Self::MultiLabelSelection(q) => q.base(),
        }
    }

    fn settings(&self) -> &Settings {
        match self {
            Self::Text(q) => q.settings(),
            Self::Rating(q) => q.settings(),
            Self::LabelSelection(q) => q.settings(),
            Self::MultiLabelSelection(q) => q.settings(),
        }
    }
}

impl From<TextQuestion> for Question {
    fn from(question: TextQuestion) -> Self {
        Self::Text(question)
    }
}

impl From<RatingQuestion> for Question {
    fn from(question: RatingQuestion) -> Self {
        Self::Rating(question)
    }
}

impl From<LabelQuestion> for Question {
    fn from(question: LabelQuestion) -> Self {
        Self::LabelSelection(question)
    }
}

impl From<MultiLabelQuestion> for Question {
    fn from(question: MultiLabelQuestion) -> Self {
        Self::MultiLabelSelection(question)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
