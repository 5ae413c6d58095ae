#![allow(dead_code)]

use std::path::{Path, PathBuf};

use cb_cli::bootstrap::{self, RuntimeConfig};
use cb_cli::config::AppConfig;

// ---------------------------------------------------------------------------
// TestDir — scratch directory removed on drop
// ---------------------------------------------------------------------------

pub struct TestDir {
    path: PathBuf,
}

impl TestDir {
    pub fn new() -> Self {
        let path = std::env::temp_dir().join(format!("cb-test-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&path).expect("create scratch dir");
        Self { path }
    }

    pub fn write(&self, name: &str, content: &str) -> PathBuf {
        let path = self.path.join(name);
        std::fs::write(&path, content).expect("write scratch file");
        path
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.path.join(name)
    }
}

impl Drop for TestDir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.path);
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub const ANNOTATOR_A: &str = "7f1c3a52-2a8e-4b53-9d0e-5a3f2f6c1b01";
pub const ANNOTATOR_B: &str = "0c6d9e0b-4f7a-4d1e-8a2b-3c5d7e9f1a02";
pub const ANNOTATOR_C: &str = "b2e4f6a8-1c3d-4e5f-9a7b-8c0d2e4f6a03";

/// Dataset config with one training task; `label` and `strategy` fill the
/// `[training]` section.
pub fn sample_config(label: &str, strategy: Option<&str>) -> String {
    let strategy = strategy
        .map(|tag| format!("strategy = \"{tag}\"\n"))
        .unwrap_or_default();
    format!(
        r#"
guidelines = "Label the sentiment of each review."

[logging]
level = "warn"
format = "pretty"

[[fields]]
name = "text"

[[questions]]
type = "rating"
name = "quality"
values = [1, 2, 3, 4, 5]

[[questions]]
type = "label_selection"
name = "sentiment"
labels = ["positive", "negative", "neutral"]

[[questions]]
type = "multi_label_selection"
name = "topics"
labels = {{ food = "Food", service = "Service", price = "Price" }}

[training]
text = "text"
label = "{label}"
{strategy}seed = 1234
"#
    )
}

fn response(user_id: &str, values: serde_json::Value) -> serde_json::Value {
    serde_json::json!({ "user_id": user_id, "values": values, "status": "submitted" })
}

/// Three records: a clear majority, one unlabeled, one missing the text.
pub fn sample_records() -> serde_json::Value {
    serde_json::json!([
        {
            "fields": { "text": "Great food, slow service." },
            "external_id": "review-1",
            "responses": [
                response(ANNOTATOR_A, serde_json::json!({
                    "sentiment": { "value": "positive" },
                    "quality": { "value": 4 },
                    "topics": { "value": ["food", "service"] }
                })),
                response(ANNOTATOR_B, serde_json::json!({
                    "sentiment": { "value": "positive" },
                    "quality": { "value": 5 },
                    "topics": { "value": ["food"] }
                })),
                response(ANNOTATOR_C, serde_json::json!({
                    "sentiment": { "value": "negative" },
                    "quality": { "value": 5 },
                    "topics": { "value": ["service"] }
                })),
                {
                    "user_id": ANNOTATOR_C,
                    "values": { "quality": { "value": 1 } },
                    "status": "discarded"
                }
            ]
        },
        {
            "fields": { "text": "Nobody looked at this one." },
            "external_id": "review-2"
        },
        {
            "fields": { "title": "No text field" },
            "external_id": "review-3",
            "responses": response(ANNOTATOR_A, serde_json::json!({
                "sentiment": { "value": "neutral" }
            }))
        }
    ])
}

pub fn load_runtime(dir: &TestDir, config: &str) -> Result<RuntimeConfig, anyhow::Error> {
    let path = dir.write("config.toml", config);
    let config = AppConfig::from_file(&path)?;
    bootstrap::into_runtime(config)
}

pub fn read_json(path: &Path) -> serde_json::Value {
    let content = std::fs::read_to_string(path).expect("read output");
    serde_json::from_str(&content).expect("valid JSON output")
}
