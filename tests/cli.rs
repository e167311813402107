// This product includes software developed at Datadog (https://www.datadoghq.com/) Copyright 2024 Datadog, Inc.

//! Drives the built `cargo-hotpath` binary against graphs written to disk.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use hotpath_lint_config::{ConfigBuilder, Severity};
use hotpath_lint_impl::ProgramGraphBuilder;
use hotpath_lint_impl::graph::Marker;
use tempfile::TempDir;

fn write_graph(dir: &Path) -> std::path::PathBuf {
    let src = dir.join("src");
    fs::create_dir_all(&src).unwrap();

    let mut b = ProgramGraphBuilder::new();
    b.source_file(src.join("Hot.cs"));
    let string = b.add_type("System", "String");
    let ctor = b.add_constructor(string);
    b.set_signature(ctor, "string.String(char, int)");
    let foo = b.add_type("App", "Foo");
    let hot = b.add_method(foo, "PerfCritical");
    b.mark(hot, Marker::Restricted);
    let block = b.body(hot);
    b.object_creation(block, Some(ctor), "new string('a', 5)");
    let graph = b.build().unwrap();

    let path = dir.join("graph.json");
    fs::write(&path, serde_json::to_string_pretty(&graph).unwrap()).unwrap();
    path
}

fn hotpath(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_cargo-hotpath"))
        .args(args)
        .current_dir(dir)
        .env("HOTPATH_LOG", "off")
        .output()
        .unwrap()
}

fn config(dir: &Path, builder: ConfigBuilder) -> String {
    let path = dir.join("hotpath.ron");
    builder.write_to_file(&path).unwrap();
    path.display().to_string()
}

#[test]
fn check_fails_on_violations() {
    let dir = TempDir::new().unwrap();
    let graph = write_graph(dir.path());
    let config = config(dir.path(), ConfigBuilder::new());

    let output = hotpath(dir.path(), &["check", "--graph", graph.to_str().unwrap(), "--config", &config]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert_eq!(output.status.code(), Some(1));
    assert!(stdout.contains("HAA0701"));
    assert!(stdout.contains("string.String(char, int)"));
}

#[test]
fn allow_flag_clears_the_violation() {
    let dir = TempDir::new().unwrap();
    let graph = write_graph(dir.path());
    let config = config(dir.path(), ConfigBuilder::new());

    let output = hotpath(
        dir.path(),
        &[
            "check",
            "--graph",
            graph.to_str().unwrap(),
            "--config",
            &config,
            "--allow",
            "string.String(char, int)",
        ],
    );

    assert_eq!(output.status.code(), Some(0));
    assert!(!String::from_utf8_lossy(&output.stdout).contains("HAA0701"));
}

#[test]
fn allowlist_file_is_picked_up() {
    let dir = TempDir::new().unwrap();
    let graph = write_graph(dir.path());
    let config = config(dir.path(), ConfigBuilder::new());
    fs::create_dir_all(dir.path().join(".hotpath")).unwrap();
    fs::write(
        dir.path().join(".hotpath").join("allowlist.txt"),
        "string.String(char, int)\n",
    )
    .unwrap();

    let output = hotpath(dir.path(), &["--graph", graph.to_str().unwrap(), "--config", &config]);
    assert_eq!(output.status.code(), Some(0));
}

#[test]
fn downgraded_rule_does_not_fail_the_run() {
    let dir = TempDir::new().unwrap();
    let graph = write_graph(dir.path());
    let config = config(
        dir.path(),
        ConfigBuilder::new().with_severity("HAA0701", Severity::Warn),
    );

    let output = hotpath(dir.path(), &["check", "--graph", graph.to_str().unwrap(), "--config", &config]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert_eq!(output.status.code(), Some(0));
    assert!(stdout.contains("warning[HAA0701]"));
}

#[test]
fn print_restricted_lists_members() {
    let dir = TempDir::new().unwrap();
    let graph = write_graph(dir.path());
    let config = config(dir.path(), ConfigBuilder::new());

    let output = hotpath(
        dir.path(),
        &["print-restricted", "--graph", graph.to_str().unwrap(), "--config", &config],
    );

    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("App.Foo.PerfCritical"));
}

#[test]
fn generate_config_writes_once() {
    let dir = TempDir::new().unwrap();

    let first = hotpath(dir.path(), &["generate-config"]);
    assert!(first.status.success());
    assert!(dir.path().join("hotpath.ron").is_file());

    let second = hotpath(dir.path(), &["generate-config"]);
    assert!(!second.status.success());
}

#[test]
fn missing_graph_is_an_error() {
    let dir = TempDir::new().unwrap();
    let config = config(dir.path(), ConfigBuilder::new());

    let output = hotpath(dir.path(), &["check", "--config", &config]);
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("--graph"));
}
