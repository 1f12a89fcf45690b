use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

const AWS_CSV: &str = "\
InvoiceID,PayerAccountId,LinkedAccountId,RecordType,ProductCode,UsageType,UsageStartDate,UsageQuantity
inv-1,999,,AccountTotal,,,2024/01/01 00:00:00,
inv-1,999,111122223333,LineItem,AmazonEC2,USE1-BoxUsage:m5.large,2024/01/01 00:00:00,744
inv-1,999,111122223333,LineItem,AmazonECS,USE1-Fargate-vCPU-Hours:perCPU,2024/01/01 00:00:00,372
inv-1,999,444455556666,LineItem,AWSLambda,USE1-Lambda-GB-Second,2024/01/01 00:00:00,\"1,371,110.4\"
";

const GCP_CSV: &str = "\
Project ID,Service description,SKU description,Usage start date,Usage end date,Usage amount,Usage unit
proj-a,Compute Engine,N1 Predefined Instance Core running in Americas,2024-01-01,2024-01-15,372,hour
proj-b,App Engine,Frontend Instance Core,2024-01-16,2024-01-31,744,hour
proj-b,Cloud Storage,Standard Storage,2024-01-01,2024-01-31,12,gibibyte month
";

fn bin_path() -> &'static str {
    env!("CARGO_BIN_EXE_cloud-meter")
}

fn run_cmd(home: &TempDir, args: &[&str]) -> Output {
    Command::new(bin_path())
        .args(args)
        .env("CLOUD_METER_HOME", home.path())
        .env_remove("RUST_LOG")
        .env_remove("CLOUD_METER_LOOKUP_TOKEN")
        .output()
        .expect("run cloud-meter command")
}

fn write_input(home: &TempDir, name: &str, body: &str) -> PathBuf {
    let path = home.path().join(name);
    fs::write(&path, body).expect("write input csv");
    path
}

fn seed_instance_cache(home: &TempDir) {
    let data = home.path().join("data");
    fs::create_dir_all(&data).expect("create data dir");
    fs::write(
        data.join("instance_types_cache.json"),
        r#"{"instance_types":{"m5.large":2,"c5.xlarge":4}}"#,
    )
    .expect("write cache");
}

fn analyze_json(home: &TempDir, file: &Path, extra: &[&str]) -> Value {
    let file = file.to_str().expect("utf-8 path");
    let mut args = vec!["analyze", file, "--format", "json"];
    args.extend_from_slice(extra);
    let output = run_cmd(home, &args);
    assert!(
        output.status.success(),
        "analyze failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("valid json output")
}

#[test]
fn init_creates_config_and_data_paths() {
    let home = TempDir::new().expect("temp home");
    let output = run_cmd(&home, &["init"]);
    assert!(output.status.success());

    assert!(home.path().join("config").exists());
    assert!(home.path().join("data").exists());
    assert!(home.path().join("config").join("config.toml").exists());
}

#[test]
fn init_is_idempotent() {
    let home = TempDir::new().expect("temp home");

    assert!(run_cmd(&home, &["init"]).status.success());
    let first = fs::read_to_string(home.path().join("config").join("config.toml"))
        .expect("read config after first init");

    assert!(run_cmd(&home, &["init"]).status.success());
    let second = fs::read_to_string(home.path().join("config").join("config.toml"))
        .expect("read config after second init");

    assert_eq!(first, second);
}

#[test]
fn detect_prints_provider_label() {
    let home = TempDir::new().expect("temp home");
    let file = write_input(&home, "gcp.csv", GCP_CSV);

    let output = run_cmd(&home, &["detect", file.to_str().expect("utf-8 path")]);
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "GCP Billing Summary");
}

#[test]
fn analyze_rejects_invalid_format() {
    let home = TempDir::new().expect("temp home");
    let file = write_input(&home, "gcp.csv", GCP_CSV);

    let output = run_cmd(
        &home,
        &["analyze", file.to_str().expect("utf-8 path"), "--format", "xlsx"],
    );
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Unsupported format. Use table, json, or csv."));
}

#[test]
fn analyze_reports_unrecognized_files() {
    let home = TempDir::new().expect("temp home");
    let file = write_input(&home, "other.csv", "date,amount\n2024-01-01,3\n");

    let output = run_cmd(&home, &["analyze", file.to_str().expect("utf-8 path")]);
    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Invalid CSV format"));
}

#[test]
fn analyze_aws_uses_cached_instance_types() {
    let home = TempDir::new().expect("temp home");
    seed_instance_cache(&home);
    let file = write_input(&home, "aws.csv", AWS_CSV);

    let report = analyze_json(&home, &file, &[]);
    assert_eq!(report["provider"], "aws");
    assert_eq!(report["detail"]["rows"].as_array().map(Vec::len), Some(3));

    let summary = &report["summary"];
    assert_eq!(summary["group_column"], "Linked Account ID");
    assert_eq!(summary["groups"][0]["group"], "111122223333");
    assert_eq!(summary["groups"][0]["values"][0], 2.0);
    assert_eq!(summary["groups"][0]["values"][2], 0.5);
    assert_eq!(summary["total"]["group"], "Total");
    assert_eq!(summary["total"]["values"][0], 2.0);
}

#[test]
fn analyze_without_cache_falls_back_when_catalog_is_unavailable() {
    let home = TempDir::new().expect("temp home");
    seed_instance_cache(&home);
    let file = write_input(&home, "aws.csv", AWS_CSV);

    let report = analyze_json(&home, &file, &["--no-cache"]);
    assert_eq!(report["summary"]["total"]["values"][0], 2.0);
}

#[test]
fn analyze_writes_detail_and_summary_files() {
    let home = TempDir::new().expect("temp home");
    let file = write_input(&home, "gcp.csv", GCP_CSV);
    let out_dir = home.path().join("out");

    let output = run_cmd(
        &home,
        &[
            "analyze",
            file.to_str().expect("utf-8 path"),
            "--output-dir",
            out_dir.to_str().expect("utf-8 path"),
        ],
    );
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("GCP Billing Summary"));

    let summary = fs::read_to_string(out_dir.join("summary.csv")).expect("read summary csv");
    let lines: Vec<&str> = summary.lines().collect();
    assert_eq!(lines[0], "Project ID,Compute Engine,App Engine,Cloud Functions");
    assert_eq!(lines[1], "proj-a,0.5,0,0");
    assert_eq!(lines[2], "proj-b,0,1,0");
    assert_eq!(lines[3], "Total,0.5,1,0");

    let detail = fs::read_to_string(out_dir.join("detail.csv")).expect("read detail csv");
    assert!(detail.lines().next().expect("detail header").ends_with(
        "Usage unit,monthlyUsage,Compute Engine,App Engine,Cloud Functions"
    ));
    assert_eq!(detail.lines().count(), 4);
}

#[test]
fn analyze_is_deterministic_across_runs() {
    let home = TempDir::new().expect("temp home");
    seed_instance_cache(&home);
    let file = write_input(&home, "aws.csv", AWS_CSV);

    let first = run_cmd(&home, &["analyze", file.to_str().expect("utf-8 path"), "--format", "json"]);
    let second = run_cmd(&home, &["analyze", file.to_str().expect("utf-8 path"), "--format", "json"]);
    assert!(first.status.success());
    assert_eq!(first.stdout, second.stdout);
}

#[test]
fn analyze_fails_on_bad_quantity_without_partial_output() {
    let home = TempDir::new().expect("temp home");
    let body = AWS_CSV.replace(",744\n", ",seven\n");
    let file = write_input(&home, "aws.csv", &body);
    let out_dir = home.path().join("out");

    let output = run_cmd(
        &home,
        &[
            "analyze",
            file.to_str().expect("utf-8 path"),
            "--output-dir",
            out_dir.to_str().expect("utf-8 path"),
        ],
    );
    assert_eq!(output.status.code(), Some(3));
    assert!(output.stdout.is_empty());
    assert!(!out_dir.exists());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("UsageQuantity"));
}
