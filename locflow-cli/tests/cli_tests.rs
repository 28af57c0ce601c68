use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use tempfile::TempDir;

fn locflow(dir: &Path, args: &[&str]) -> Output {
    Command::new(assert_cmd::cargo::cargo_bin!("locflow"))
        .current_dir(dir)
        .env_remove("RUST_LOG")
        .args(args)
        .output()
        .unwrap()
}

fn assert_success(output: &Output) {
    assert!(
        output.status.success(),
        "CLI failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn test_view_prints_entries_and_plurals() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(
        temp_dir.path().join("de.json"),
        r#"{"greeting": "Hallo {name}", "files": "{count, plural, one {# Datei} other {# Dateien}}"}"#,
    )
    .unwrap();

    let output = locflow(temp_dir.path(), &["view", "de.json"]);
    assert_success(&output);
    let out = stdout(&output);
    assert!(out.contains("Language: de"));
    assert!(out.contains("Entry 1: greeting"));
    assert!(out.contains("Value: Hallo {name}"));
    assert!(out.contains("Plural argument: count"));
    assert!(out.contains("other: # Dateien"));
}

#[test]
fn test_view_unknown_language_fails() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join("de.json"), r#"{"a": "A"}"#).unwrap();

    let output = locflow(temp_dir.path(), &["view", "de.json", "--lang", "fr"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("No resources found for language: fr"));
}

#[test]
fn test_convert_json_to_android() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join("de.json"), r#"{"greeting": "Hallo {name}"}"#).unwrap();

    let output = locflow(
        temp_dir.path(),
        &["convert", "de.json", "--output", "out", "--format", "android"],
    );
    assert_success(&output);
    assert!(stdout(&output).contains("Wrote 1 file(s) to out"));
    let xml = fs::read_to_string(temp_dir.path().join("out/values-de/strings.xml")).unwrap();
    assert!(xml.contains("<string name=\"greeting\">Hallo %s</string>"));
}

#[test]
fn test_convert_to_zip() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join("en.json"), r#"{"a": "A"}"#).unwrap();
    fs::write(temp_dir.path().join("de.json"), r#"{"a": "Ä"}"#).unwrap();

    let output = locflow(
        temp_dir.path(),
        &["convert", "en.json", "de.json", "-o", "bundle/export.zip", "-f", "po"],
    );
    assert_success(&output);
    let bytes = fs::read(temp_dir.path().join("bundle/export.zip")).unwrap();
    let entries = locflow::archive::unpack(&bytes).unwrap();
    let mut names: Vec<_> = entries.iter().map(|e| e.name.clone()).collect();
    names.sort();
    assert_eq!(names, vec!["de.po", "en.po"]);
}

#[test]
fn test_convert_rejects_unknown_format() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join("en.json"), r#"{"a": "A"}"#).unwrap();

    let output = locflow(temp_dir.path(), &["convert", "en.json", "-o", "out", "-f", "yaml"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("unknown format `yaml`"));
}

#[test]
fn test_config_file_supplies_export_format() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join("de.json"), r#"{"a": "A"}"#).unwrap();
    fs::write(temp_dir.path().join("locflow.toml"), "[export]\nformat = \"arb\"\n").unwrap();

    let output = locflow(temp_dir.path(), &["convert", "de.json", "-o", "out"]);
    assert_success(&output);
    assert!(temp_dir.path().join("out/app_de.arb").is_file());

    // Flags win over the file.
    let output = locflow(temp_dir.path(), &["convert", "de.json", "-o", "out2", "-f", "json"]);
    assert_success(&output);
    assert!(temp_dir.path().join("out2/de.json").is_file());
}

#[test]
fn test_import_then_export() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join("en.json"), r#"{"hello": "Hello", "bye": "Bye"}"#).unwrap();

    let output = locflow(temp_dir.path(), &["import", "en.json", "--snapshot", "project.json"]);
    assert_success(&output);
    let out = stdout(&output);
    assert!(out.contains("en.json [en -> new language]: 2 translation(s), 0 conflict(s), 0 issue(s)"));
    assert!(out.contains("Imported 2 translation(s)"));
    assert!(temp_dir.path().join("project.json").is_file());

    let output = locflow(
        temp_dir.path(),
        &["export", "--snapshot", "project.json", "-o", "out", "-f", "po"],
    );
    assert_success(&output);
    let po = fs::read_to_string(temp_dir.path().join("out/en.po")).unwrap();
    assert!(po.contains("msgid \"hello\"\nmsgstr \"Hello\""));
    assert!(po.contains("msgid \"bye\"\nmsgstr \"Bye\""));
}

#[test]
fn test_import_conflicts_need_force() {
    let temp_dir = TempDir::new().unwrap();
    let input = temp_dir.path().join("en.json");
    fs::write(&input, r#"{"hello": "Hello"}"#).unwrap();
    assert_success(&locflow(temp_dir.path(), &["import", "en.json", "-s", "project.json"]));

    fs::write(&input, r#"{"hello": "Hi"}"#).unwrap();
    let output = locflow(temp_dir.path(), &["import", "en.json", "-s", "project.json"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("unresolved conflict"), "stderr: {}", stderr);

    let output = locflow(
        temp_dir.path(),
        &["import", "en.json", "-s", "project.json", "--force", "override"],
    );
    assert_success(&output);

    let output = locflow(temp_dir.path(), &["export", "-s", "project.json", "-o", "out", "-f", "json"]);
    assert_success(&output);
    let json = fs::read_to_string(temp_dir.path().join("out/en.json")).unwrap();
    assert!(json.contains("\"Hi\""));
}

#[test]
fn test_import_streams_ndjson() {
    let temp_dir = TempDir::new().unwrap();
    let body: Vec<String> = (0..250).map(|i| format!("\"key{}\": \"Value {}\"", i, i)).collect();
    fs::write(temp_dir.path().join("en.json"), format!("{{{}}}", body.join(","))).unwrap();

    let output = locflow(
        temp_dir.path(),
        &["import", "en.json", "-s", "project.json", "--stream", "--chunk-size", "100"],
    );
    assert_success(&output);
    let out = stdout(&output);
    let lines: Vec<_> = out.lines().collect();
    for line in &lines {
        serde_json::from_str::<serde_json::Value>(line).unwrap();
    }
    assert_eq!(lines.last().copied(), Some(r#"{"status":"DONE","applied":250,"total":250}"#));
}

#[test]
fn test_import_reports_skipped_files() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join("en.json"), r#"{"a": "A"}"#).unwrap();
    fs::write(temp_dir.path().join("broken.json"), "{ not json").unwrap();

    let output = locflow(temp_dir.path(), &["import", "en.json", "broken.json", "-s", "project.json"]);
    assert_success(&output);
    assert!(String::from_utf8_lossy(&output.stderr).contains("Skipped broken.json"));
    assert!(stdout(&output).contains("Imported 1 translation(s)"));
}

#[test]
fn test_view_reports_missing_plural_forms() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(
        temp_dir.path().join("ru.json"),
        r#"{"files": "{count, plural, one {# файл} other {# файла}}"}"#,
    )
    .unwrap();

    let output = locflow(temp_dir.path(), &["view", "ru.json"]);
    assert_success(&output);
    assert!(stdout(&output).contains("files [ru]: few, many"));
}
