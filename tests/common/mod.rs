// tests/common/mod.rs
// Shared test utilities for integration tests
#![allow(dead_code)]

use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};
use tempfile::TempDir;

/// One entry of `git log --pretty=raw -z` output
pub fn raw_entry(hash: &str, parents: &[&str], epoch: i64, offset: &str, message: &str) -> String {
    let mut entry = format!("commit {}\ntree {}\n", hash, "4b825dc642cb6eb9a060e54bf8d69288fbee4904");
    for parent in parents {
        entry.push_str(&format!("parent {}\n", parent));
    }
    entry.push_str(&format!("author Ann Author <ann@example.com> {} {}\n", epoch, offset));
    entry.push_str(&format!(
        "committer Cid Committer <cid@example.com> {} {}\n\n",
        epoch + 60,
        offset
    ));
    for line in message.lines() {
        entry.push_str("    ");
        entry.push_str(line);
        entry.push('\n');
    }
    entry
}

/// Join entries the way `git log -z` does
pub fn raw_log(entries: &[String]) -> String {
    entries.join("\0")
}

/// A log of `count` commits where every third message mentions an exploit
pub fn synthetic_log(count: usize) -> String {
    let entries: Vec<String> = (0..count)
        .map(|i| {
            let message = if i % 3 == 0 {
                format!("Block exploit path #{}", i)
            } else {
                format!("Refactor module #{}", i)
            };
            let hash = format!("{:040x}", i + 1);
            let parent = format!("{:040x}", i + 2);
            raw_entry(&hash, &[&parent], 1_500_000_000 + i as i64, "+0200", &message)
        })
        .collect();
    raw_log(&entries)
}

/// Run the binary in `dir`, isolated from the caller's config files and secret
pub fn run_scanchanges_in_dir(dir: &Path, args: &[&str], input: &str) -> (String, String, i32) {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_scanchanges"))
        .current_dir(dir)
        .args(args)
        .env("HOME", dir)
        .env("XDG_CONFIG_HOME", dir.join(".config"))
        .env_remove("SCANCHANGES_SECRET")
        .env_remove("RUST_LOG")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("Failed to start scanchanges");

    if let Some(mut stdin) = cmd.stdin.take() {
        stdin
            .write_all(input.as_bytes())
            .expect("Failed to write to stdin");
    }

    let output = cmd.wait_with_output().expect("Failed to read output");

    (
        String::from_utf8_lossy(&output.stdout).to_string(),
        String::from_utf8_lossy(&output.stderr).to_string(),
        output.status.code().unwrap_or(-1),
    )
}

/// Run the binary in a fresh temporary directory with input on stdin
pub fn run_scanchanges_with_input(args: &[&str], input: &str) -> (String, String, i32) {
    let dir = TempDir::new().expect("Failed to create temp dir");
    run_scanchanges_in_dir(dir.path(), args, input)
}
