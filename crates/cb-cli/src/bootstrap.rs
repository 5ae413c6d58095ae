use anyhow::ensure;
use cb_core::core::QuestionSchema;
use cb_dataset::{FeedbackDatasetConfig, TrainingDataForTextClassification};

use crate::config::{AppConfig, LogFormatConfig};

// ---------------------------------------------------------------------------
// RuntimeConfig — fully validated runtime configuration
// ---------------------------------------------------------------------------

pub struct RuntimeConfig {
    pub dataset: FeedbackDatasetConfig,
    pub training: Option<TrainingDataForTextClassification>,
    pub seed: Option<u64>,
    pub log_level: String,
    pub log_format: LogFormatConfig,
}

impl RuntimeConfig {
    /// One-line description printed by `cb validate`.
    pub fn summary(&self) -> String {
        let mut summary = format!(
            "{} fields, {} questions",
            self.dataset.fields.len(),
            self.dataset.questions.len()
        );
        if let Some(task) = &self.training {
            summary.push_str(&format!(
                "; training {} <- {} ({})",
                task.text().name(),
                task.label().question().name(),
                task.label().strategy()
            ));
        }
        summary
    }
}

// ---------------------------------------------------------------------------
// into_runtime — converts raw AppConfig into validated RuntimeConfig
// ---------------------------------------------------------------------------

pub fn into_runtime(config: AppConfig) -> Result<RuntimeConfig, anyhow::Error> {
    ensure!(!config.fields.is_empty(), "at least one field required");
    ensure!(!config.questions.is_empty(), "at least one question required");
    ensure!(
        !config.logging.level.trim().is_empty(),
        "logging level must not be empty"
    );

    let dataset = FeedbackDatasetConfig::new(config.fields, config.questions, config.guidelines)?;

    // Bind the training task up front so a bad strategy fails validation
    let (training, seed) = match config.training {
        Some(training) => {
            let task = dataset.text_classification(
                &training.text,
                &training.label,
                training.strategy.as_deref(),
            )?;
            (Some(task), training.seed)
        }
        None => (None, None),
    };

    Ok(RuntimeConfig {
        dataset,
        training,
        seed,
        log_level: config.logging.level,
        log_format: config.logging.format,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
