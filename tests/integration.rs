use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn lexvox_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("lexvox");
    path
}

/// Build a statute-shaped source: ~3000 chars of space-separated tokens
/// wrapped in XML tags, with one marker token placed so it lands only in
/// the third chunk (positions 1900..2700 for chunk_size=1000, overlap=100).
fn sample_source() -> String {
    let mut tokens: Vec<String> = (0..500).map(|i| format!("w{:04}", i)).collect();
    tokens[370] = "zangyou".to_string(); // char offset ≈ 370 × 6 = 2220
    format!("<Law><LawBody>{}</LawBody></Law>", tokens.join(" "))
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let sources_dir = root.join("sources");
    fs::create_dir_all(&sources_dir).unwrap();
    fs::write(sources_dir.join("rouki.xml"), sample_source()).unwrap();

    let config_content = format!(
        r#"[db]
path = "{}/data/lexvox.sqlite"

[indexing]
chunk_size = 1000
chunk_overlap = 100

[retrieval]
limit = 5

[server]
bind = "127.0.0.1:7341"
"#,
        root.display()
    );

    let config_path = config_dir.join("lexvox.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_lexvox(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = lexvox_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run lexvox binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

fn source_path(config_path: &Path) -> String {
    let root = config_path.parent().unwrap().parent().unwrap();
    root.join("sources/rouki.xml").to_str().unwrap().to_string()
}

#[test]
fn test_init_creates_database() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_lexvox(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, success1) = run_lexvox(&config_path, &["init"]);
    assert!(success1, "First init failed");

    let (_, _, success2) = run_lexvox(&config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn test_index_reports_four_chunks() {
    let (_tmp, config_path) = setup_test_env();
    let source = source_path(&config_path);

    run_lexvox(&config_path, &["init"]);
    let (stdout, stderr, success) = run_lexvox(&config_path, &["index", &source]);
    assert!(success, "index failed: stdout={}, stderr={}", stdout, stderr);
    // 3001 normalized chars, stride 900: ceil(2901/900) = 4
    assert!(
        stdout.contains("Indexed chunks: 4"),
        "unexpected chunk count: {}",
        stdout
    );
}

#[test]
fn test_index_missing_file_fails() {
    let (_tmp, config_path) = setup_test_env();

    run_lexvox(&config_path, &["init"]);
    let (_, stderr, success) = run_lexvox(&config_path, &["index", "no/such/file.xml"]);
    assert!(!success);
    assert!(stderr.contains("cannot read"), "stderr: {}", stderr);
}

#[test]
fn test_search_finds_marker_in_third_chunk() {
    let (_tmp, config_path) = setup_test_env();
    let source = source_path(&config_path);

    run_lexvox(&config_path, &["init"]);
    run_lexvox(&config_path, &["index", &source]);

    let (stdout, stderr, success) = run_lexvox(&config_path, &["search", "zangyou"]);
    assert!(success, "search failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("rouki.xml"), "stdout: {}", stdout);
    assert!(
        stdout.contains("【zangyou】"),
        "match not highlighted: {}",
        stdout
    );
    // the marker exists in exactly one chunk
    assert_eq!(stdout.matches("excerpt:").count(), 1, "stdout: {}", stdout);
}

#[test]
fn test_reindex_replaces_instead_of_appending() {
    let (_tmp, config_path) = setup_test_env();
    let source = source_path(&config_path);

    run_lexvox(&config_path, &["init"]);
    run_lexvox(&config_path, &["index", &source]);
    let (stdout, _, _) = run_lexvox(&config_path, &["index", &source]);
    assert!(stdout.contains("Indexed chunks: 4"));

    // still exactly one hit; duplicated chunks would produce two
    let (stdout, _, _) = run_lexvox(&config_path, &["search", "zangyou"]);
    assert_eq!(stdout.matches("excerpt:").count(), 1, "stdout: {}", stdout);
}

#[test]
fn test_search_unknown_term_prints_no_results() {
    let (_tmp, config_path) = setup_test_env();
    let source = source_path(&config_path);

    run_lexvox(&config_path, &["init"]);
    run_lexvox(&config_path, &["index", &source]);

    let (stdout, _, success) = run_lexvox(&config_path, &["search", "sonzainashi"]);
    assert!(success);
    assert!(stdout.contains("No results."));
}

#[test]
fn test_search_symbols_only_query_prints_no_results() {
    let (_tmp, config_path) = setup_test_env();
    let source = source_path(&config_path);

    run_lexvox(&config_path, &["init"]);
    run_lexvox(&config_path, &["index", &source]);

    // normalizes to the empty query: no search is executed
    let (stdout, _, success) = run_lexvox(&config_path, &["search", "！？（）…"]);
    assert!(success);
    assert!(stdout.contains("No results."));
}

#[test]
fn test_sources_lists_indexed_source() {
    let (_tmp, config_path) = setup_test_env();
    let source = source_path(&config_path);

    run_lexvox(&config_path, &["init"]);
    run_lexvox(&config_path, &["index", &source, "--source-id", "rouki"]);

    let (stdout, _, success) = run_lexvox(&config_path, &["sources"]);
    assert!(success);
    assert!(stdout.contains("rouki"), "stdout: {}", stdout);
    assert!(stdout.contains('4'), "stdout: {}", stdout);
}
