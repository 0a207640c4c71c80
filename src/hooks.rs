//! # Deploy and Post Hooks
//!
//! A deploy hook runs once per certificate that was written. A post hook runs
//! once per invocation, after every certificate has been processed, with the
//! names and thumbprints of everything written under that hook.
//!
//! Hook command lines are split with POSIX shell quoting rules into a program
//! and its arguments, so `/bin/sh -c "systemctl reload nginx"` passes one
//! argument to `-c`. No shell is involved unless the hook names one.

use std::collections::HashMap;

use tokio::process::Command;
use tracing::{info, warn};

use crate::domain::SyncResult;
use crate::errors::{CertsyncError, Result};

pub const CERTIFICATE_NAME_ENV: &str = "CERTIFICATE_NAME";
pub const CERTIFICATE_THUMBPRINT_ENV: &str = "CERTIFICATE_THUMBPRINT";
pub const CERTIFICATE_PATH_ENV: &str = "CERTIFICATE_PATH";
pub const CERTIFICATE_NAMES_ENV: &str = "CERTIFICATE_NAMES";
pub const CERTIFICATE_THUMBPRINTS_ENV: &str = "CERTIFICATE_THUMBPRINTS";

/// Split a hook command line into program and arguments.
pub fn parse_command_line(command_line: &str) -> Result<(String, Vec<String>)> {
    let mut words = shlex::split(command_line).ok_or_else(|| {
        CertsyncError::config(format!("Hook command has unbalanced quotes: {}", command_line))
    })?;
    if words.is_empty() {
        return Err(CertsyncError::config("Hook command is empty"));
    }
    let program = words.remove(0);
    Ok((program, words))
}

/// Run a hook to completion and return its exit code.
///
/// The child inherits this process's environment plus `env`. Termination by
/// signal reports `-1`.
pub async fn run_hook(command_line: &str, env: &HashMap<String, String>) -> Result<i32> {
    let (program, args) = parse_command_line(command_line)?;

    info!(command = %command_line, "Running hook");

    let status = Command::new(program)
        .args(&args)
        .envs(env)
        .status()
        .await
        .map_err(|source| CertsyncError::HookStartFailure {
            command: command_line.to_string(),
            source,
        })?;

    let code = status.code().unwrap_or(-1);
    info!(command = %command_line, exit_code = code, "Hook finished");
    Ok(code)
}

/// Run the per-certificate deploy hook for a written certificate.
pub async fn run_deploy_hook(command: &str, result: &SyncResult) -> Result<()> {
    let mut env = HashMap::new();
    env.insert(
        CERTIFICATE_NAME_ENV.to_string(),
        result.certificate_name().unwrap_or_default().to_string(),
    );
    env.insert(
        CERTIFICATE_THUMBPRINT_ENV.to_string(),
        result.thumbprint().unwrap_or_default().to_string(),
    );
    if let Some(path) = result.path() {
        env.insert(CERTIFICATE_PATH_ENV.to_string(), path.display().to_string());
    }

    let code = run_hook(command, &env).await?;
    if code != 0 {
        warn!(
            command = %command,
            certificate = result.certificate_name().unwrap_or_default(),
            exit_code = code,
            "Deploy hook returned non-zero exit code"
        );
        return Err(CertsyncError::HookNonZeroExit { command: command.to_string(), code });
    }
    Ok(())
}

/// Collects written certificates per post-hook command for one invocation.
#[derive(Debug, Default)]
pub struct PostHookAggregator {
    batches: Vec<(String, Vec<SyncResult>)>,
}

impl PostHookAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, command: &str, result: SyncResult) {
        match self.batches.iter_mut().find(|(existing, _)| existing == command) {
            Some((_, results)) => results.push(result),
            None => self.batches.push((command.to_string(), vec![result])),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    pub fn commands(&self) -> impl Iterator<Item = &str> {
        self.batches.iter().map(|(command, _)| command.as_str())
    }

    /// Run every collected command once. Returns whether all exited zero.
    pub async fn run_all(self) -> bool {
        let mut success = true;

        for (command, results) in self.batches {
            let names: Vec<&str> =
                results.iter().map(|r| r.certificate_name().unwrap_or_default()).collect();
            let thumbprints: Vec<&str> =
                results.iter().map(|r| r.thumbprint().unwrap_or_default()).collect();

            let env = HashMap::from([
                (CERTIFICATE_NAMES_ENV.to_string(), names.join(",")),
                (CERTIFICATE_THUMBPRINTS_ENV.to_string(), thumbprints.join(",")),
            ]);

            match run_hook(&command, &env).await {
                Ok(0) => {}
                Ok(code) => {
                    warn!(command = %command, exit_code = code, "Post hook returned non-zero exit code");
                    success = false;
                }
                Err(e) => {
                    warn!(command = %command, error = %e, "Post hook failed to start");
                    success = false;
                }
            }
        }

        success
    }
}
