use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use tempfile::tempdir;

fn storyctl(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_storyctl"))
        .current_dir(dir)
        .env_remove("OPENAI_API_KEY")
        .env_remove("RUST_LOG")
        .args(args)
        .output()
        .expect("storyctl runs")
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn blank_idea_warns_even_with_broken_config() {
    let dir = tempdir().unwrap();
    let config = dir.path().join("config.json");
    fs::write(&config, "{ not json").unwrap();

    let output = storyctl(
        dir.path(),
        &["--config", config.to_str().unwrap(), "generate", "   "],
    );

    assert!(output.status.success(), "{}", stderr(&output));
    assert!(stderr(&output).contains("Please enter a story idea first!"));
    assert!(output.stdout.is_empty());
}

#[test]
fn blank_idea_warns_with_unknown_profile() {
    let dir = tempdir().unwrap();

    let output = storyctl(dir.path(), &["generate", "   ", "--llm-interface", "nope"]);

    assert!(output.status.success(), "{}", stderr(&output));
    assert!(stderr(&output).contains("Please enter a story idea first!"));
}

#[test]
fn missing_credential_fails_without_output() {
    let dir = tempdir().unwrap();

    let output = storyctl(
        dir.path(),
        &["generate", "A detective story set in Mumbai with a twist ending"],
    );

    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("OPENAI_API_KEY"), "{}", stderr(&output));
    assert!(output.stdout.is_empty());
    assert!(!dir.path().join("config.json").exists());
}
