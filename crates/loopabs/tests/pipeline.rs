//! End-to-end pipeline runs against a scripted stand-in for CBMC

#![cfg(unix)]

use loopabs::{Pipeline, PipelineConfig, Step, VerifiedRecord};
use loopabs_cbmc::{CbmcConfig, VerificationStatus};
use loopabs_store::Stage;
use serde_json::Value;
use std::time::Duration;
use tempfile::TempDir;

const LOOPS: &str = r#"[
    {"id": "musl/strlen.c:10", "source_code": "for (; *s; s++);", "function": "strlen", "file": "src/string/strlen.c", "line": 10, "kind": "for"},
    {"id": "musl/strstr.c:20", "source_code": "while (*h && *h == *n) { h++; n++; }", "function": "twoway", "file": "src/string/strstr.c", "line": 20},
    {"id": "musl/strcmp.c:5", "source_code": "while (strcmp(a, b)) i++;", "function": "f", "file": "x.c", "line": 5},
    {"id": "musl/list.c:7", "source_code": "while (p != q) p++;", "function": "g", "file": "y.c", "line": 7}
]"#;

/// A verifier that runs `script` under `/bin/sh -c`; CBMC's arguments become
/// the script's positional parameters.
fn scripted_cbmc(script: &str) -> CbmcConfig {
    CbmcConfig {
        extra_args: vec!["-c".to_string(), script.to_string(), "sh".to_string()],
        ..CbmcConfig::default()
    }
    .with_binary("/bin/sh")
}

fn pipeline(dir: &TempDir, cbmc: CbmcConfig, min_corpus_size: usize) -> Pipeline {
    let input = dir.path().join("loops.json");
    std::fs::write(&input, LOOPS).unwrap();
    let mut config = PipelineConfig::default()
        .with_input(input)
        .with_output_dir(dir.path().join("output"))
        .with_cbmc(cbmc);
    config.min_corpus_size = min_corpus_size;
    config.max_concurrent = 2;
    Pipeline::new(config).unwrap()
}

fn read_dataset(pipeline: &Pipeline) -> Vec<Value> {
    let path = pipeline.store().root().join("dataset.json");
    serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}

#[tokio::test]
async fn test_full_run_with_successful_verifier() {
    let dir = TempDir::new().unwrap();
    let pipeline = pipeline(&dir, scripted_cbmc("echo 'VERIFICATION SUCCESSFUL'"), 2);

    let summary = pipeline.run(&[]).await.unwrap();

    assert_eq!(summary.extracted, Some(4));
    let abstraction = summary.abstraction.as_ref().unwrap();
    assert_eq!(abstraction.abstracted, 2);
    assert_eq!(abstraction.rejected["function_call"], 1);
    assert_eq!(abstraction.rejected["incomplete_rewrite"], 1);

    let report = summary.verification.as_ref().unwrap();
    assert_eq!(report.count(VerificationStatus::Verified), 2);
    assert_eq!(report.count(VerificationStatus::Skipped), 2);
    assert!((report.coverage() - 0.5).abs() < 1e-9);
    assert!((report.success_rate() - 1.0).abs() < 1e-9);

    let merge = summary.merge.as_ref().unwrap();
    assert_eq!(merge.kept, 2);
    assert_eq!(merge.skipped, 2);
    assert!(summary.threshold_met());

    let dataset = read_dataset(&pipeline);
    assert_eq!(dataset.len(), 2);
    let strstr = dataset
        .iter()
        .find(|item| item["id"] == "musl/strstr.c:20")
        .unwrap();
    assert_eq!(
        strstr["abstracted_code"],
        "while (arr_h[h_idx] && arr_h[h_idx] == arr_n[n_idx]) { h_idx++; n_idx++; }"
    );
    assert_eq!(strstr["source_code"], "while (*h && *h == *n) { h++; n++; }");
    assert_eq!(strstr["function"], "twoway");
    assert_eq!(strstr["verified"], true);
    assert_eq!(strstr["invariant"], "h_idx >= 0 && n_idx >= 0");
    assert!(strstr.get("ptr_vars").is_none());
}

#[tokio::test]
async fn test_timeout_is_not_verified() {
    let dir = TempDir::new().unwrap();
    let cbmc = scripted_cbmc("sleep 30; echo 'VERIFICATION SUCCESSFUL'")
        .with_timeout(Duration::from_millis(300));
    let pipeline = pipeline(&dir, cbmc, 1);

    let summary = pipeline.run(&Step::ALL).await.unwrap();
    let report = summary.verification.as_ref().unwrap();
    assert_eq!(report.count(VerificationStatus::Timeout), 2);
    assert_eq!(report.count(VerificationStatus::Verified), 0);
    assert_eq!(report.count(VerificationStatus::Error), 0);

    let record: VerifiedRecord = pipeline
        .store()
        .read(Stage::Verified, "musl/strlen.c:10")
        .unwrap()
        .unwrap();
    assert_eq!(record.status, VerificationStatus::Timeout);
    assert!(!record.verified);

    assert!(!summary.threshold_met());
    assert!(read_dataset(&pipeline).is_empty());
}

#[tokio::test]
async fn test_refuted_and_anomalous_exit() {
    let dir = TempDir::new().unwrap();
    // Harness file names are random, so route on the entry function inside.
    let script = r#"for a; do last=$a; done
if grep -q strlen "$last"; then echo 'VERIFICATION FAILED'; exit 10; fi
exit 0"#;
    let pipeline = pipeline(&dir, scripted_cbmc(script), 1);

    let summary = pipeline.run(&[]).await.unwrap();
    let report = summary.verification.as_ref().unwrap();
    assert_eq!(report.count(VerificationStatus::Refuted), 1);
    assert_eq!(report.count(VerificationStatus::Error), 1);
    assert_eq!(report.examples(VerificationStatus::Refuted), vec!["musl/strlen.c:10"]);
    assert_eq!(summary.merge.as_ref().unwrap().kept, 0);
}

#[tokio::test]
async fn test_harness_reaches_verifier() {
    let dir = TempDir::new().unwrap();
    let script = r#"for a; do last=$a; done
grep -q 'unsigned char arr_s\[100\];' "$last" && grep -q 'assert(s_idx >= 0);' "$last" && echo 'VERIFICATION SUCCESSFUL'"#;
    let pipeline = pipeline(&dir, scripted_cbmc(script), 1);

    let summary = pipeline
        .run(&[Step::Extract, Step::Abstract, Step::Verify])
        .await
        .unwrap();
    let record: VerifiedRecord = pipeline
        .store()
        .read(Stage::Verified, "musl/strlen.c:10")
        .unwrap()
        .unwrap();
    assert!(record.verified, "log: {}", record.cbmc_log);
    assert!(summary.merge.is_none());
}

#[tokio::test]
async fn test_stage_rerun_uses_stored_records() {
    let dir = TempDir::new().unwrap();
    let pipeline = pipeline(&dir, scripted_cbmc("echo 'VERIFICATION SUCCESSFUL'"), 2);
    pipeline.run(&[Step::Extract, Step::Abstract]).await.unwrap();

    // Later invocation runs only the remaining stages from disk
    let summary = pipeline.run(&[Step::Clean, Step::Verify]).await.unwrap();
    assert!(summary.extracted.is_none());
    assert_eq!(summary.verification.as_ref().unwrap().total, 4);
    assert_eq!(summary.merge.as_ref().unwrap().kept, 2);
}
