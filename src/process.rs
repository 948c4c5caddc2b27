//! Subprocess plumbing shared by the fallback extractor and the transcoder.
//!
//! Output lines are turned into [`ToolEvent`]s by plain functions, so the
//! parsing can be tested without spawning anything.

use regex::Regex;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::LazyLock;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, warn};

use crate::error::{Result, TuneGrabError};

static PERCENT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+(?:\.\d+)?)%").unwrap());

#[derive(Debug, Clone, PartialEq)]
pub enum ToolEvent {
    Progress(f64),
    Info(String),
    /// A stderr line that marks the run as failed
    Error(String),
}

/// stdout: a percentage anywhere in the line is progress
pub fn parse_stdout_line(line: &str) -> ToolEvent {
    PERCENT_RE
        .captures(line)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .map(ToolEvent::Progress)
        .unwrap_or_else(|| ToolEvent::Info(line.to_string()))
}

/// stderr: "error" or "failed" in any case flags the run
pub fn classify_stderr_line(line: &str) -> ToolEvent {
    let lower = line.to_lowercase();
    if lower.contains("error") || lower.contains("failed") {
        ToolEvent::Error(line.to_string())
    } else {
        ToolEvent::Info(line.to_string())
    }
}

/// Explicit path if given, else the first existing candidate, else the bare
/// name for a `PATH` lookup.
pub fn locate_executable(name: &str, explicit: Option<&Path>, candidates: &[&str]) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }
    candidates
        .iter()
        .map(Path::new)
        .find(|p| p.is_file())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(name))
}

pub fn tool_name(program: &Path) -> String {
    program
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| program.display().to_string())
}

#[derive(Debug)]
pub struct ToolOutput {
    pub status: ExitStatus,
    /// stderr lines classified as errors
    pub errors: Vec<String>,
}

impl ToolOutput {
    pub fn succeeded(&self) -> bool {
        self.status.success() && self.errors.is_empty()
    }

    pub fn failure_reason(&self) -> String {
        match self.errors.last() {
            Some(line) => format!("{} ({})", describe_status(&self.status), line),
            None => describe_status(&self.status),
        }
    }
}

pub fn describe_status(status: &ExitStatus) -> String {
    match status.code() {
        Some(code) => format!("exit code {}", code),
        None => "terminated by signal".to_string(),
    }
}

/// Spawn with piped stdout/stderr. The child is killed if its handle is dropped.
pub fn spawn(program: &Path, args: &[String], stdin: Stdio) -> Result<Child> {
    debug!("Spawning {} {}", program.display(), args.join(" "));
    Command::new(program)
        .args(args)
        .stdin(stdin)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| TuneGrabError::subprocess(&tool_name(program), format!("could not start: {}", e)))
}

async fn drive(
    name: &str,
    child: &mut Child,
    on_event: &mut (dyn FnMut(ToolEvent) + Send),
) -> Result<Vec<String>> {
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| TuneGrabError::subprocess(name, "stdout not captured"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| TuneGrabError::subprocess(name, "stderr not captured"))?;
    let mut out_lines = BufReader::new(stdout).lines();
    let mut err_lines = BufReader::new(stderr).lines();
    let mut stdout_done = false;
    let mut stderr_done = false;
    let mut errors = Vec::new();

    while !(stdout_done && stderr_done) {
        tokio::select! {
            line = out_lines.next_line(), if !stdout_done => match line {
                Ok(Some(line)) => on_event(parse_stdout_line(&line)),
                Ok(None) => stdout_done = true,
                Err(e) => {
                    warn!("Error reading tool stdout: {}", e);
                    stdout_done = true;
                }
            },
            line = err_lines.next_line(), if !stderr_done => match line {
                Ok(Some(line)) => {
                    debug!("stderr: {}", line);
                    let event = classify_stderr_line(&line);
                    if let ToolEvent::Error(ref l) = event {
                        errors.push(l.clone());
                    }
                    on_event(event);
                }
                Ok(None) => stderr_done = true,
                Err(e) => {
                    warn!("Error reading tool stderr: {}", e);
                    stderr_done = true;
                }
            },
        }
    }
    Ok(errors)
}

/// Run a tool to completion, forwarding its output as events. Exceeding `budget`
/// kills the process and yields [`TuneGrabError::Timeout`].
pub async fn run_tool<F>(program: &Path, args: &[String], budget: Duration, mut on_event: F) -> Result<ToolOutput>
where
    F: FnMut(ToolEvent) + Send,
{
    let name = tool_name(program);
    let mut child = spawn(program, args, Stdio::null())?;

    let outcome = tokio::time::timeout(budget, async {
        let errors = drive(&name, &mut child, &mut on_event).await?;
        let status = child.wait().await?;
        Ok::<_, TuneGrabError>(ToolOutput { status, errors })
    })
    .await;

    match outcome {
        Ok(output) => output,
        Err(_) => {
            warn!("{} exceeded {:?}, killing it", name, budget);
            let _ = child.kill().await;
            Err(TuneGrabError::Timeout(name))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_download_percentages() {
        assert_eq!(
            parse_stdout_line("[download]  42.7% of 3.50MiB at 1.2MiB/s ETA 00:02"),
            ToolEvent::Progress(42.7)
        );
        assert_eq!(parse_stdout_line("[download] 100% of 3.50MiB"), ToolEvent::Progress(100.0));
        assert_eq!(
            parse_stdout_line("[youtube] abc: Downloading webpage"),
            ToolEvent::Info("[youtube] abc: Downloading webpage".to_string())
        );
    }

    #[test]
    fn flags_error_lines_case_insensitively() {
        assert!(matches!(
            classify_stderr_line("ERROR: [youtube] abc: Video unavailable"),
            ToolEvent::Error(_)
        ));
        assert!(matches!(classify_stderr_line("Postprocessing FAILED"), ToolEvent::Error(_)));
        assert!(matches!(
            classify_stderr_line("WARNING: falling back to generic extractor"),
            ToolEvent::Info(_)
        ));
    }

    #[test]
    fn explicit_path_wins_then_candidates_then_name() {
        let dir = tempfile::tempdir().unwrap();
        let installed = dir.path().join("yt-dlp");
        std::fs::write(&installed, b"").unwrap();
        let installed_str = installed.to_str().unwrap();

        assert_eq!(
            locate_executable("yt-dlp", Some(Path::new("/opt/custom/yt-dlp")), &[installed_str]),
            PathBuf::from("/opt/custom/yt-dlp")
        );
        assert_eq!(
            locate_executable("yt-dlp", None, &["/nonexistent/yt-dlp", installed_str]),
            installed
        );
        assert_eq!(
            locate_executable("yt-dlp", None, &["/nonexistent/yt-dlp"]),
            PathBuf::from("yt-dlp")
        );
    }

    #[test]
    fn names_tool_by_file_name() {
        assert_eq!(tool_name(Path::new("/usr/bin/ffmpeg")), "ffmpeg");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn collects_events_and_exit_status() {
        let script = "echo '[download]  10.0% of 1MiB'; echo 'ERROR: boom' >&2; echo 'done'; exit 3";
        let mut events = Vec::new();
        let output = run_tool(
            Path::new("sh"),
            &["-c".to_string(), script.to_string()],
            Duration::from_secs(10),
            |e| events.push(e),
        )
        .await
        .unwrap();

        assert!(!output.succeeded());
        assert_eq!(output.status.code(), Some(3));
        assert_eq!(output.errors, vec!["ERROR: boom".to_string()]);
        assert!(output.failure_reason().starts_with("exit code 3"));
        assert!(events.contains(&ToolEvent::Progress(10.0)));
        assert!(events.contains(&ToolEvent::Info("done".to_string())));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn stderr_error_fails_a_clean_exit() {
        let output = run_tool(
            Path::new("sh"),
            &["-c".to_string(), "echo 'download failed' >&2".to_string()],
            Duration::from_secs(10),
            |_| {},
        )
        .await
        .unwrap();
        assert!(output.status.success());
        assert!(!output.succeeded());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn overrunning_tool_is_killed() {
        let err = run_tool(
            Path::new("sh"),
            &["-c".to_string(), "sleep 30".to_string()],
            Duration::from_millis(200),
            |_| {},
        )
        .await
        .unwrap_err();
        assert!(matches!(err, TuneGrabError::Timeout(name) if name == "sh"));
    }

    #[tokio::test]
    async fn missing_binary_is_a_subprocess_error() {
        let err = run_tool(
            Path::new("/nonexistent/tunegrab-tool"),
            &[],
            Duration::from_secs(1),
            |_| {},
        )
        .await
        .unwrap_err();
        assert!(matches!(err, TuneGrabError::Subprocess { .. }));
    }
}
