mod common;

use cb_cli::pipeline;
use common::*;

// ---------------------------------------------------------------------------
// End-to-end unification
// ---------------------------------------------------------------------------

#[test]
fn test_unify_majority_writes_examples() {
    let dir = TestDir::new();
    let runtime = load_runtime(&dir, &sample_config("sentiment", Some("majority"))).unwrap();
    let records = dir.write("records.json", &sample_records().to_string());
    let output = dir.path("examples.json");

    let prepared = pipeline::run_unify(&runtime, &records, Some(&output)).unwrap();

    assert_eq!(prepared.examples.len(), 1);
    assert_eq!(prepared.skipped_unlabeled, 1);
    assert_eq!(prepared.skipped_missing_text, 1);
    assert_eq!(
        read_json(&output),
        serde_json::json!([{ "text": "Great food, slow service.", "label": "positive" }])
    );
}

#[test]
fn test_unify_rating_default_strategy_is_mean() {
    let dir = TestDir::new();
    let runtime = load_runtime(&dir, &sample_config("quality", None)).unwrap();
    let records = dir.write("records.json", &sample_records().to_string());
    let output = dir.path("examples.json");

    pipeline::run_unify(&runtime, &records, Some(&output)).unwrap();

    // Discarded rating of 1 is ignored: (4 + 5 + 5) / 3.
    let label = read_json(&output)[0]["label"].as_f64().unwrap();
    assert!((label - 14.0 / 3.0).abs() < 1e-9);
}

#[test]
fn test_unify_multi_label_majority() {
    let dir = TestDir::new();
    let runtime = load_runtime(&dir, &sample_config("topics", Some("majority"))).unwrap();
    let records = dir.write("records.json", &sample_records().to_string());
    let output = dir.path("examples.json");

    pipeline::run_unify(&runtime, &records, Some(&output)).unwrap();

    // N = 3, threshold = 2: food and service both clear it.
    let mut labels: Vec<String> = serde_json::from_value(read_json(&output)[0]["label"].clone())
        .expect("label list");
    labels.sort();
    assert_eq!(labels, vec!["food", "service"]);
}

#[test]
fn test_unify_disagreement_one_example_per_annotator() {
    let dir = TestDir::new();
    let runtime = load_runtime(&dir, &sample_config("sentiment", Some("disagreement"))).unwrap();
    let records = pipeline::read_records(&dir.write("records.json", &sample_records().to_string()))
        .unwrap();

    let prepared = pipeline::prepare(&runtime, &records).unwrap();

    let mut labels: Vec<&str> = prepared
        .examples
        .iter()
        .filter_map(|example| example.label.as_text())
        .collect();
    labels.sort_unstable();
    assert_eq!(labels, vec!["negative", "positive", "positive"]);
}

#[test]
fn test_seeded_tie_break_is_reproducible() {
    let dir = TestDir::new();
    let runtime = load_runtime(&dir, &sample_config("sentiment", Some("majority"))).unwrap();
    let tied = serde_json::json!([{
        "fields": { "text": "Split decision." },
        "responses": [
            { "user_id": ANNOTATOR_A, "values": { "sentiment": { "value": "positive" } } },
            { "user_id": ANNOTATOR_B, "values": { "sentiment": { "value": "negative" } } }
        ]
    }]);
    let records = pipeline::read_records(&dir.write("tied.json", &tied.to_string())).unwrap();

    let first = pipeline::prepare(&runtime, &records).unwrap();
    let second = pipeline::prepare(&runtime, &records).unwrap();

    assert_eq!(first.examples, second.examples);
    let label = first.examples[0].label.as_text().unwrap();
    assert!(label == "positive" || label == "negative");
}

// ---------------------------------------------------------------------------
// Configuration and input errors
// ---------------------------------------------------------------------------

#[test]
fn test_validate_rejects_unknown_strategy() {
    let dir = TestDir::new();
    let err = load_runtime(&dir, &sample_config("sentiment", Some("mean")))
        .err()
        .expect("rating tag on a label question must fail");
    assert!(err.to_string().contains("unknown label_selection strategy"));
}

#[test]
fn test_validate_rejects_unknown_label_question() {
    let dir = TestDir::new();
    let err = load_runtime(&dir, &sample_config("difficulty", None))
        .err()
        .expect("unknown question must fail");
    assert!(err.to_string().contains("unknown question: difficulty"));
}

#[test]
fn test_majority_weighted_fails_at_unify() {
    let dir = TestDir::new();
    let runtime =
        load_runtime(&dir, &sample_config("sentiment", Some("majority_weighted"))).unwrap();
    let records = dir.write("records.json", &sample_records().to_string());

    let err = pipeline::run_unify(&runtime, &records, Some(&dir.path("out.json"))).unwrap_err();
    assert!(err.to_string().contains("not implemented"));
    assert!(!dir.path("out.json").exists());
}

#[test]
fn test_malformed_records_file() {
    let dir = TestDir::new();
    let runtime = load_runtime(&dir, &sample_config("sentiment", None)).unwrap();
    let records = dir.write("records.json", "{ not json");

    let err = pipeline::run_unify(&runtime, &records, None).unwrap_err();
    assert!(format!("{err:#}").contains("parsing records"));
}

#[test]
fn test_missing_records_file() {
    let dir = TestDir::new();
    let runtime = load_runtime(&dir, &sample_config("sentiment", None)).unwrap();

    let err = pipeline::read_records(&dir.path("absent.json")).unwrap_err();
    assert!(format!("{err:#}").contains("reading records"));
    assert!(runtime.training.is_some());
}
