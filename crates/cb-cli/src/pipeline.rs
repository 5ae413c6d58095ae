use std::path::Path;

use anyhow::{bail, Context};
use cb_core::core::FeedbackRecord;
use cb_dataset::{export_to_json, PreparedTrainingData};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::bootstrap::RuntimeConfig;

/// Reads a JSON array of records.
pub fn read_records(path: &Path) -> Result<Vec<FeedbackRecord>, anyhow::Error> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading records from {}", path.display()))?;
    let records: Vec<FeedbackRecord> = serde_json::from_str(&content)
        .with_context(|| format!("parsing records from {}", path.display()))?;
    Ok(records)
}

/// Prepares the configured training task over `records`.
pub fn prepare(
    runtime: &RuntimeConfig,
    records: &[FeedbackRecord],
) -> Result<PreparedTrainingData, anyhow::Error> {
    let Some(task) = runtime.training.as_ref() else {
        bail!("no [training] section configured");
    };

    let mut rng = match runtime.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };
    let prepared = task.prepare_with_rng(records, &mut rng)?;
    Ok(prepared)
}

/// Reads records, prepares training data and writes the examples as JSON to
/// `output`, or stdout when no path is given.
pub fn run_unify(
    runtime: &RuntimeConfig,
    records_path: &Path,
    output: Option<&Path>,
) -> Result<PreparedTrainingData, anyhow::Error> {
    let records = read_records(records_path)?;
    tracing::info!(
        records = records.len(),
        path = %records_path.display(),
        "loaded records"
    );

    let prepared = prepare(runtime, &records)?;
    let json = export_to_json(&prepared.examples)?;

    match output {
        Some(path) => {
            std::fs::write(path, json)
                .with_context(|| format!("writing examples to {}", path.display()))?;
            tracing::info!(path = %path.display(), "wrote examples");
        }
        None => println!("{json}"),
    }
    Ok(prepared)
}
