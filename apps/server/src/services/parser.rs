//! External parser invocation.
//!
//! The parser is a separate program that reads a run's log folder and posts
//! structured results back to `POST /api/upload-regression/json`. It is
//! launched without a shell, owned by a detached task, and never blocks the
//! upload response.
//!
//! A run whose parser exits, crashes or times out without reporting results
//! is marked `failed`; the guarded status update means a run that was already
//! reconciled is left untouched.

use std::ffi::OsString;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use secrecy::ExposeSecret;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, error, info, warn};

use crate::config::ParserSettings;
use crate::db::DbPool;
use crate::error::{AppError, AppResult};

/// Environment variable carrying the run id.
pub const ENV_RUN_ID: &str = "REGTRACK_RUN_ID";
/// Environment variable carrying the results callback URL.
pub const ENV_CALLBACK_URL: &str = "REGTRACK_CALLBACK_URL";
/// Environment variable carrying the token for `X-Parser-Token`.
pub const ENV_PARSER_TOKEN: &str = "REGTRACK_PARSER_TOKEN";

/// How a supervised parser process ended.
#[derive(Debug)]
pub enum ParserExit {
    Exited(ExitStatus),
    TimedOut,
    WaitFailed(String),
}

impl ParserExit {
    /// Message recorded on a run that this exit leaves without results.
    pub fn failure_reason(&self, timeout: Duration) -> String {
        match self {
            ParserExit::Exited(status) if status.success() => {
                "parser exited without reporting results".to_string()
            }
            ParserExit::Exited(status) => match status.code() {
                Some(code) => format!("parser exited with status {}", code),
                None => format!("parser terminated: {}", status),
            },
            ParserExit::TimedOut => {
                format!("parser timed out after {} seconds", timeout.as_secs())
            }
            ParserExit::WaitFailed(e) => format!("failed waiting for parser: {}", e),
        }
    }
}

/// Arguments passed to the parser program.
pub fn command_args(base_args: &[String], plugin: &str, folder: &Path, run_id: i64) -> Vec<OsString> {
    let mut args: Vec<OsString> = base_args.iter().map(OsString::from).collect();
    args.push("--plugin".into());
    args.push(plugin.into());
    args.push("--folder".into());
    args.push(folder.as_os_str().to_owned());
    args.push("--run-id".into());
    args.push(run_id.to_string().into());
    args
}

/// Wait for the child, killing it once `timeout` elapses.
pub async fn supervise(child: &mut Child, timeout: Duration) -> ParserExit {
    match tokio::time::timeout(timeout, child.wait()).await {
        Ok(Ok(status)) => ParserExit::Exited(status),
        Ok(Err(e)) => ParserExit::WaitFailed(e.to_string()),
        Err(_) => {
            if let Err(e) = child.kill().await {
                warn!("Failed to kill timed out parser: {}", e);
            }
            ParserExit::TimedOut
        }
    }
}

/// Forward each line of a parser stream into the log.
async fn forward_lines<R>(reader: R, run_id: i64, is_stderr: bool)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) if is_stderr => warn!(target: "parser", run_id, "{}", line),
            Ok(Some(line)) => info!(target: "parser", run_id, "{}", line),
            Ok(None) => break,
            Err(e) => {
                debug!(target: "parser", run_id, "Stopped reading parser output: {}", e);
                break;
            }
        }
    }
}

/// Launches the parser for uploaded runs.
#[derive(Clone)]
pub struct ParserLauncher {
    settings: ParserSettings,
    pool: DbPool,
}

impl ParserLauncher {
    pub fn new(settings: ParserSettings, pool: DbPool) -> Self {
        Self { settings, pool }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.settings.timeout_secs)
    }

    /// Spawn the parser for a run and hand it to a detached supervisor task.
    ///
    /// Only a spawn failure is reported to the caller; everything after that
    /// is observed through the run status.
    pub fn launch(&self, run_id: i64, plugin: &str, folder: &Path) -> AppResult<()> {
        let mut command = Command::new(&self.settings.program);
        command
            .args(command_args(&self.settings.base_args, plugin, folder, run_id))
            .env(ENV_RUN_ID, run_id.to_string())
            .env(ENV_CALLBACK_URL, &self.settings.callback_url)
            .env(ENV_PARSER_TOKEN, self.settings.token.expose_secret())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.settings.working_dir {
            command.current_dir(dir);
        }

        let mut child = command.spawn().map_err(|e| {
            AppError::Parser(format!(
                "Failed to launch parser '{}': {}",
                self.settings.program, e
            ))
        })?;

        info!(
            run_id,
            plugin,
            pid = child.id().unwrap_or_default(),
            "Parser launched"
        );

        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(forward_lines(stdout, run_id, false));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_lines(stderr, run_id, true));
        }

        let pool = self.pool.clone();
        let timeout = self.timeout();
        tokio::spawn(async move {
            let exit = supervise(&mut child, timeout).await;
            let reason = exit.failure_reason(timeout);

            match pool.fail_run(run_id, reason.as_str()).await {
                Ok(true) => warn!(run_id, "Run failed: {}", reason),
                Ok(false) => debug!(run_id, "Parser finished: {:?}", exit),
                Err(e) => error!(run_id, "Failed to record parser outcome: {}", e),
            }
        });

        Ok(())
    }
}
