use assert_cmd::cargo::cargo_bin_cmd;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

fn copy_fixture_repo(name: &str) -> (tempfile::TempDir, PathBuf) {
    let src_root = PathBuf::from("tests/fixtures").join(name);
    let tmp = tempdir().expect("tempdir");
    let dst_root = tmp.path().join(name);
    copy_dir(&src_root, &dst_root);
    (tmp, dst_root)
}

fn copy_dir(src: &Path, dst: &Path) {
    fs::create_dir_all(dst).expect("create dst dir");
    for entry in fs::read_dir(src).expect("read src dir") {
        let entry = entry.expect("entry");
        let file_type = entry.file_type().expect("file_type");
        let dst_path = dst.join(entry.file_name());
        if file_type.is_dir() {
            copy_dir(&entry.path(), &dst_path);
        } else {
            fs::copy(entry.path(), &dst_path).expect("copy file");
        }
    }
}

#[test]
fn cli_query_class_resolves_dependencies() {
    let (_tmp, repo_root) = copy_fixture_repo("py_repo");
    let cache_dir = repo_root.join("cache");

    let mut cmd = cargo_bin_cmd!("pysymindex");
    cmd.args([
        "query-class",
        "Service",
        "--project",
        repo_root.to_str().unwrap(),
        "--cache-dir",
        cache_dir.to_str().unwrap(),
        "--no-server",
    ]);

    let assert = cmd.assert().success();
    let value: Value = serde_json::from_slice(&assert.get_output().stdout).expect("valid json");

    assert!(value["content"].as_str().unwrap().contains("class Service"));
    let depends_path = value["depends_path"].as_array().unwrap();
    assert!(depends_path.iter().any(|p| p.as_str().unwrap().ends_with("helpers.py")));
}

#[test]
fn cli_query_function_resolves_method_dependency() {
    let (_tmp, repo_root) = copy_fixture_repo("py_repo");
    let cache_dir = repo_root.join("cache");

    let mut cmd = cargo_bin_cmd!("pysymindex");
    cmd.args([
        "query-function",
        "run",
        "--project",
        repo_root.to_str().unwrap(),
        "--cache-dir",
        cache_dir.to_str().unwrap(),
        "--no-server",
        "--host-class",
        "Service",
    ]);

    let assert = cmd.assert().success();
    let value: Value = serde_json::from_slice(&assert.get_output().stdout).expect("valid json");

    assert_eq!(value["host_class"], "Service");
    let depends = value["depends"].as_array().unwrap();
    assert!(!depends.is_empty());
}

#[test]
fn cli_query_class_missing_name_exits_nonzero() {
    let (_tmp, repo_root) = copy_fixture_repo("py_repo");
    let cache_dir = repo_root.join("cache");

    let mut cmd = cargo_bin_cmd!("pysymindex");
    cmd.args([
        "query-class",
        "DoesNotExist",
        "--project",
        repo_root.to_str().unwrap(),
        "--cache-dir",
        cache_dir.to_str().unwrap(),
        "--no-server",
    ]);

    cmd.assert().failure();
}

#[test]
fn cli_list_symbols_reports_classes_and_functions() {
    let (_tmp, repo_root) = copy_fixture_repo("py_repo");
    let cache_dir = repo_root.join("cache");

    let mut cmd = cargo_bin_cmd!("pysymindex");
    cmd.args([
        "list-symbols",
        "--project",
        repo_root.to_str().unwrap(),
        "--cache-dir",
        cache_dir.to_str().unwrap(),
        "--no-server",
    ]);

    let assert = cmd.assert().success();
    let value: Value = serde_json::from_slice(&assert.get_output().stdout).expect("valid json");

    let class_names: Vec<&str> = value["classes"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["name"].as_str().unwrap())
        .collect();
    assert!(class_names.contains(&"Service"));
    assert!(class_names.contains(&"Greeter"));

    let function_names: Vec<&str> = value["functions"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["name"].as_str().unwrap())
        .collect();
    assert!(function_names.contains(&"entrypoint"));
}
