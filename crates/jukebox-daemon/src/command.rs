use std::time::Duration;

use anyhow::{Context, Result};
use tokio::process::Command;
use tracing::{debug, warn};

/// Captured result of an OS command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    fn dry_run() -> Self {
        Self { success: true, stdout: String::new(), stderr: String::new() }
    }

    /// stdout followed by stderr, trimmed
    pub fn combined(&self) -> String {
        let mut text = self.stdout.trim().to_string();
        let stderr = self.stderr.trim();
        if !stderr.is_empty() {
            if !text.is_empty() {
                text.push('\n');
            }
            text.push_str(stderr);
        }
        text
    }
}

/// Runs OS tools with a timeout. In dry-run mode commands are only logged.
#[derive(Debug, Clone)]
pub struct CommandRunner {
    dry_run: bool,
}

impl CommandRunner {
    pub fn new(dry_run: bool) -> Self {
        Self { dry_run }
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    pub async fn run(
        &self,
        program: &str,
        args: &[&str],
        timeout: Duration,
    ) -> Result<CommandOutput> {
        let rendered = render(program, args);

        if self.dry_run {
            warn!("DRY RUN: Would run `{}`", rendered);
            return Ok(CommandOutput::dry_run());
        }

        debug!("Running `{}` (timeout {:?})", rendered, timeout);

        let child = Command::new(program).args(args).kill_on_drop(true).output();
        let output = tokio::time::timeout(timeout, child)
            .await
            .with_context(|| format!("`{}` timed out after {:?}", rendered, timeout))?
            .with_context(|| format!("Failed to execute `{}`", rendered))?;

        let result = CommandOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        };

        if !result.success {
            warn!("`{}` exited with {}: {}", rendered, output.status, result.stderr.trim());
        }
        Ok(result)
    }

    /// Like `run`, but a non-zero exit becomes an error
    pub async fn run_checked(
        &self,
        program: &str,
        args: &[&str],
        timeout: Duration,
    ) -> Result<CommandOutput> {
        let output = self.run(program, args, timeout).await?;
        if !output.success {
            anyhow::bail!("`{}` failed: {}", render(program, args), output.combined());
        }
        Ok(output)
    }
}

fn render(program: &str, args: &[&str]) -> String {
    std::iter::once(program).chain(args.iter().copied()).collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_dry_run_does_not_execute() {
        let runner = CommandRunner::new(true);
        let output = runner
            .run_checked("definitely-not-a-real-binary", &["--flag"], Duration::from_secs(1))
            .await
            .unwrap();
        assert!(output.success);
        assert!(output.stdout.is_empty());
    }

    #[tokio::test]
    async fn test_captures_stdout() {
        let runner = CommandRunner::new(false);
        let output = runner.run("echo", &["hello"], Duration::from_secs(5)).await.unwrap();
        assert!(output.success);
        assert_eq!(output.stdout.trim(), "hello");
    }

    #[tokio::test]
    async fn test_missing_binary_is_an_error() {
        let runner = CommandRunner::new(false);
        let result = runner.run("definitely-not-a-real-binary", &[], Duration::from_secs(1)).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_timeout_is_an_error() {
        let runner = CommandRunner::new(false);
        let result = runner.run("sleep", &["5"], Duration::from_millis(100)).await;
        assert!(result.unwrap_err().to_string().contains("timed out"));
    }

    #[test]
    fn test_combined_output() {
        let output = CommandOutput {
            success: false,
            stdout: "line one\n".to_string(),
            stderr: "oops\n".to_string(),
        };
        assert_eq!(output.combined(), "line one\noops");
    }
}
