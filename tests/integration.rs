use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

const MISSING_KEY_ENV: &str = "GENIE_TEST_KEY_NEVER_SET";

fn genie_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("genie");
    path
}

fn setup_test_env(provider: &str) -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();
    fs::create_dir_all(root.join("data")).unwrap();

    fs::write(
        root.join("products.csv"),
        "Brand,Main Keyword,Core Keyword,Color\n\
         TechNova,Wireless Earbuds,Headphones,Black\n\
         EcoLife,Bamboo Toothbrush,Toothbrush Set,Natural\n",
    )
    .unwrap();

    let config_content = format!(
        r#"[db]
path = "{root}/data/genie.sqlite"

[generation]
provider = "{provider}"
api_key_env = "{key}"
max_retries = 0

[batch]
titles_per_row = 3

[history]
backend = "file"
path = "{root}/data/title_history.json"
"#,
        root = root.display(),
        provider = provider,
        key = MISSING_KEY_ENV,
    );

    let config_path = config_dir.join("genie.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_genie(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = genie_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .env_remove(MISSING_KEY_ENV)
        .env("RUST_LOG", "warn")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run genie binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

fn path_arg(root: &Path, name: &str) -> String {
    root.join(name).to_str().unwrap().to_string()
}

#[test]
fn test_init_is_idempotent() {
    let (tmp, config) = setup_test_env("disabled");
    let (stdout, stderr, ok) = run_genie(&config, &["init"]);
    assert!(ok, "init failed: {}", stderr);
    assert!(stdout.contains("Database initialized successfully."));
    assert!(tmp.path().join("data/genie.sqlite").exists());

    let (_, stderr, ok) = run_genie(&config, &["init"]);
    assert!(ok, "second init failed: {}", stderr);
}

#[test]
fn test_missing_config_fails() {
    let tmp = TempDir::new().unwrap();
    let (_, stderr, ok) = run_genie(&tmp.path().join("nope.toml"), &["init"]);
    assert!(!ok);
    assert!(stderr.contains("Failed to read config file"));
}

#[test]
fn test_missing_credentials_is_fatal_before_any_row() {
    let (tmp, config) = setup_test_env("dashscope");
    let input = path_arg(tmp.path(), "products.csv");
    let output = path_arg(tmp.path(), "results.csv");

    let (_, stderr, ok) = run_genie(&config, &["run", &input, "--output", &output]);
    assert!(!ok);
    assert!(stderr.contains("missing credentials"), "stderr: {}", stderr);
    assert!(stderr.contains(MISSING_KEY_ENV));
    assert!(!tmp.path().join("results.csv").exists());
}

#[test]
fn test_missing_columns_is_reported() {
    let (tmp, config) = setup_test_env("disabled");
    fs::write(tmp.path().join("bad.csv"), "Brand,Color\nTechNova,Black\n").unwrap();
    let input = path_arg(tmp.path(), "bad.csv");
    let output = path_arg(tmp.path(), "results.csv");

    let (_, stderr, ok) = run_genie(&config, &["run", &input, "--output", &output]);
    assert!(!ok);
    assert!(stderr.contains("missing mandatory columns: Main Keyword, Core Keyword"));
}

#[test]
fn test_dry_run_prints_prompt_without_credentials() {
    let (tmp, config) = setup_test_env("dashscope");
    let input = path_arg(tmp.path(), "products.csv");
    let output = path_arg(tmp.path(), "results.csv");

    let (stdout, stderr, ok) = run_genie(
        &config,
        &[
            "run",
            &input,
            "--output",
            &output,
            "--dry-run",
            "--mode",
            "strict",
            "--position",
            "brand=end",
            "--star",
            "Color",
        ],
    );
    assert!(ok, "dry run failed: {}", stderr);
    assert!(stdout.starts_with("Role:"));
    assert!(stdout.contains("strictly include \"TechNova\""));
    assert!(stdout.contains("\"TechNova\" must appear at the end of the title."));
    assert!(stdout.contains("- Color: \"Black\""));
    assert!(stdout.contains("Strategy: STRICT STRUCTURE"));
    assert!(stdout.contains("Task: Generate 3 distinct, professional titles"));
    assert!(!tmp.path().join("results.csv").exists());
}

#[test]
fn test_invalid_override_is_rejected() {
    let (tmp, config) = setup_test_env("disabled");
    let input = path_arg(tmp.path(), "products.csv");
    let output = path_arg(tmp.path(), "results.csv");

    let (_, stderr, ok) =
        run_genie(&config, &["run", &input, "--output", &output, "--titles", "11"]);
    assert!(!ok);
    assert!(stderr.contains("titles per row must be between 1 and 10"));

    let (_, _, ok) = run_genie(
        &config,
        &["run", &input, "--output", &output, "--star", "Weight"],
    );
    assert!(!ok);
}

#[test]
fn test_run_status_reset_cycle_offline() {
    // With generation disabled every call fails; the error text flows
    // through the pipeline as a low-scoring candidate.
    let (tmp, config) = setup_test_env("disabled");
    let input = path_arg(tmp.path(), "products.csv");
    let output = path_arg(tmp.path(), "results.csv");

    let (stdout, stderr, ok) = run_genie(&config, &["run", &input, "--output", &output]);
    assert!(ok, "run failed: {}", stderr);
    assert!(stdout.contains("rows processed: 2"));
    assert!(stdout.contains("rows failed: 0"));
    assert!(stdout.trim_end().ends_with("ok"));

    let results = fs::read_to_string(tmp.path().join("results.csv")).unwrap();
    let mut lines = results.lines();
    assert_eq!(
        lines.next(),
        Some("Row,Brand,Main Keyword,Core Keyword,Generated Title,SEO Score,Notes")
    );
    assert!(lines.next().unwrap().starts_with("1,TechNova,"));

    let (stdout, _, ok) = run_genie(&config, &["status", &input]);
    assert!(ok);
    assert!(stdout.contains("processed 2 / 2 rows"));

    // A second run resumes a finished batch and does no work.
    let (stdout, _, ok) = run_genie(&config, &["run", &input, "--output", &output]);
    assert!(ok);
    assert!(stdout.contains("rows processed: 0"));

    let (stdout, _, ok) = run_genie(&config, &["reset", &input]);
    assert!(ok);
    assert!(stdout.contains("Checkpoint cleared"));

    let (stdout, _, ok) = run_genie(&config, &["status", &input]);
    assert!(ok);
    assert!(stdout.contains("No checkpoint"));
}

#[test]
fn test_history_import_stats_clear() {
    let (tmp, config) = setup_test_env("disabled");
    fs::write(
        tmp.path().join("catalog.csv"),
        "SKU,Product Name\n1,TechNova Wireless Earbuds Pro\n2,EcoLife Bamboo Toothbrush\n3,\n",
    )
    .unwrap();
    let catalog = path_arg(tmp.path(), "catalog.csv");

    let (stdout, _, ok) = run_genie(&config, &["history", "stats"]);
    assert!(ok);
    assert!(stdout.contains("titles: 0"));

    let (stdout, stderr, ok) = run_genie(&config, &["history", "import", &catalog]);
    assert!(ok, "import failed: {}", stderr);
    assert!(stdout.contains("Imported 2 titles"));

    let (stdout, _, ok) = run_genie(&config, &["history", "stats"]);
    assert!(ok);
    assert!(stdout.contains("titles: 2"));
    assert!(stdout.contains("backend: file:"));

    let (stdout, _, ok) = run_genie(&config, &["history", "clear"]);
    assert!(ok);
    assert!(stdout.contains("Cleared 2 titles."));

    let (stdout, _, ok) = run_genie(&config, &["history", "stats"]);
    assert!(ok);
    assert!(stdout.contains("titles: 0"));
}

#[test]
fn test_sqlite_history_works_before_init() {
    let (tmp, config) = setup_test_env("disabled");
    let body = fs::read_to_string(&config).unwrap();
    fs::write(&config, body.replace("backend = \"file\"", "backend = \"sqlite\"")).unwrap();
    fs::write(
        tmp.path().join("catalog.csv"),
        "title\nTechNova Wireless Earbuds Pro\n",
    )
    .unwrap();
    let catalog = path_arg(tmp.path(), "catalog.csv");

    let (stdout, stderr, ok) = run_genie(&config, &["history", "import", &catalog]);
    assert!(ok, "import failed: {}", stderr);
    assert!(stdout.contains("Imported 1 titles"));

    let (stdout, _, ok) = run_genie(&config, &["history", "stats"]);
    assert!(ok);
    assert!(stdout.contains("titles: 1"));
    assert!(stdout.contains("backend: sqlite:kv_store"));

    let (stdout, stderr, ok) = run_genie(&config, &["history", "clear"]);
    assert!(ok, "clear failed: {}", stderr);
    assert!(stdout.contains("Cleared 1 titles."));
}

#[test]
fn test_history_import_without_title_column_fails() {
    let (tmp, config) = setup_test_env("disabled");
    fs::write(tmp.path().join("skus.csv"), "SKU,Price\n1,9.99\n").unwrap();
    let file = path_arg(tmp.path(), "skus.csv");

    let (_, stderr, ok) = run_genie(&config, &["history", "import", &file]);
    assert!(!ok);
    assert!(stderr.contains("No title column found"));
}

#[test]
fn test_analyze_report() {
    let tmp = TempDir::new().unwrap();
    let report = tmp.path().join("report.csv");
    fs::write(
        &report,
        "Product Name,Impressions,Clicks\n\
         Smart POS Terminal Android,1000,50\n\
         Smart Barcode Scanner,1000,40\n\
         Plain Cable,1000,5\n",
    )
    .unwrap();

    // analyze does not need a config file
    let (stdout, stderr, ok) = run_genie(
        &tmp.path().join("absent.toml"),
        &["analyze", report.to_str().unwrap()],
    );
    assert!(ok, "analyze failed: {}", stderr);
    assert!(stdout.contains("Found 2 high performers"));
    assert!(stdout.contains("'Smart' (appears 2 times in top titles)"));
    assert!(!stdout.contains("Cable"));
}
