//! Shared helpers for servicectl CLI tests

#![allow(dead_code)]

use anyhow::Result;
use std::path::PathBuf;
use std::process::Command;
use tempfile::TempDir;

/// A snapshot directory the CLI is run against
pub struct CliTestContext {
    test_dir: TempDir,
}

impl CliTestContext {
    pub fn new() -> Result<Self> {
        Ok(Self {
            test_dir: TempDir::new()?,
        })
    }

    /// Write a snapshot file and return its path
    pub fn create_config(&self, filename: &str, content: &str) -> Result<PathBuf> {
        let config_path = self.test_dir.path().join(filename);
        std::fs::write(&config_path, content)?;
        Ok(config_path)
    }

    /// Run servicectl with the given arguments
    pub fn run_cli_command(&self, args: &[&str]) -> Result<CliOutput> {
        let output = Command::new(env!("CARGO_BIN_EXE_servicectl"))
            .current_dir(self.test_dir.path())
            .args(args)
            .output()?;

        Ok(CliOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            success: output.status.success(),
            exit_code: output.status.code(),
        })
    }
}

#[derive(Debug)]
pub struct CliOutput {
    pub stdout: String,
    pub stderr: String,
    pub success: bool,
    pub exit_code: Option<i32>,
}

impl CliOutput {
    pub fn assert_success(&self) -> &Self {
        if !self.success {
            panic!(
                "Command failed with exit code {:?}\nSTDOUT:\n{}\nSTDERR:\n{}",
                self.exit_code, self.stdout, self.stderr
            );
        }
        self
    }

    pub fn assert_failure(&self) -> &Self {
        if self.success {
            panic!(
                "Command unexpectedly succeeded\nSTDOUT:\n{}\nSTDERR:\n{}",
                self.stdout, self.stderr
            );
        }
        self
    }

    pub fn assert_contains(&self, text: &str) -> &Self {
        if !self.stdout.contains(text) {
            panic!("STDOUT does not contain '{}'\nSTDOUT:\n{}", text, self.stdout);
        }
        self
    }

    pub fn assert_stderr_contains(&self, text: &str) -> &Self {
        if !self.stderr.contains(text) {
            panic!("STDERR does not contain '{}'\nSTDERR:\n{}", text, self.stderr);
        }
        self
    }
}
