use futures_util::{Stream, StreamExt};
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, info, warn};

use crate::core::{AudioStreamHandle, ProgressTracker};
use crate::error::{Result, TuneGrabError};
use crate::process::{describe_status, locate_executable, spawn, tool_name};

pub const FFMPEG_CANDIDATES: [&str; 3] = [
    "/opt/homebrew/bin/ffmpeg",
    "/usr/local/bin/ffmpeg",
    "/usr/bin/ffmpeg",
];
const STDERR_TAIL: usize = 5;

/// Constant 192k MP3 at 44.1kHz from stdin, overwriting `output`
pub fn build_args(output: &Path) -> Vec<String> {
    let mut args: Vec<String> = [
        "-i", "pipe:0", "-acodec", "libmp3lame", "-ab", "192k", "-ar", "44100", "-f", "mp3", "-y",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    args.push(output.to_string_lossy().into_owned());
    args
}

#[derive(Debug, Clone)]
pub struct Transcoder {
    program: PathBuf,
    timeout: Duration,
}

impl Transcoder {
    pub fn new(explicit: Option<&Path>, timeout: Duration) -> Self {
        Self {
            program: locate_executable("ffmpeg", explicit, &FFMPEG_CANDIDATES),
            timeout,
        }
    }

    /// Consume the stream into an MP3 at `output`
    pub async fn transcode(
        &self,
        handle: AudioStreamHandle,
        output: &Path,
        tracker: &mut ProgressTracker,
    ) -> Result<PathBuf> {
        let total = handle.encoding.content_length.unwrap_or(0);
        pipe_into_process(
            &self.program,
            &build_args(output),
            handle.response.bytes_stream(),
            total,
            tracker,
            self.timeout,
        )
        .await?;
        info!("Transcoded to {}", output.display());
        Ok(output.to_path_buf())
    }
}

/// Feed `stream` into the stdin of `program`, reporting progress per chunk.
///
/// A stream error is an [`TuneGrabError::Extraction`] (the source broke), a
/// bad exit is a [`TuneGrabError::Subprocess`], and running past `budget` kills
/// the process with [`TuneGrabError::Timeout`].
pub async fn pipe_into_process<S, B, E>(
    program: &Path,
    args: &[String],
    stream: S,
    total: u64,
    tracker: &mut ProgressTracker,
    budget: Duration,
) -> Result<()>
where
    S: Stream<Item = std::result::Result<B, E>>,
    B: AsRef<[u8]>,
    E: Display,
{
    let name = tool_name(program);
    let mut child = spawn(program, args, Stdio::piped())?;
    let mut stdin = child
        .stdin
        .take()
        .ok_or_else(|| TuneGrabError::subprocess(&name, "stdin not captured"))?;
    drop(child.stdout.take());

    let stderr = child.stderr.take();
    let stderr_task = tokio::spawn(async move {
        let mut tail = Vec::new();
        if let Some(stderr) = stderr {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!("transcoder: {}", line);
                if tail.len() == STDERR_TAIL {
                    tail.remove(0);
                }
                tail.push(line);
            }
        }
        tail
    });

    let run = async {
        let mut stream = std::pin::pin!(stream);
        let mut downloaded = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk =
                chunk.map_err(|e| TuneGrabError::Extraction(format!("stream interrupted: {}", e)))?;
            let bytes = chunk.as_ref();
            if let Err(e) = stdin.write_all(bytes).await {
                warn!("{} stopped reading its input: {}", name, e);
                break;
            }
            downloaded += bytes.len() as u64;
            tracker.update(downloaded, total);
        }
        drop(stdin);
        Ok::<_, TuneGrabError>(child.wait().await?)
    };

    let outcome = tokio::time::timeout(budget, run).await;
    let status = match outcome {
        Ok(Ok(status)) => status,
        Ok(Err(e)) => {
            let _ = child.kill().await;
            return Err(e);
        }
        Err(_) => {
            warn!("{} exceeded {:?}, killing it", name, budget);
            let _ = child.kill().await;
            return Err(TuneGrabError::Timeout(name));
        }
    };

    if status.success() {
        return Ok(());
    }
    let tail = stderr_task.await.unwrap_or_default();
    let reason = match tail.last() {
        Some(line) => format!("{} ({})", describe_status(&status), line),
        None => describe_status(&status),
    };
    Err(TuneGrabError::subprocess(&name, reason))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ProgressEvent;
    use futures_util::stream;
    use std::io;

    #[test]
    fn encodes_fixed_bitrate_mp3_from_stdin() {
        let args = build_args(Path::new("/music/out.mp3"));
        assert_eq!(
            args.join(" "),
            "-i pipe:0 -acodec libmp3lame -ab 192k -ar 44100 -f mp3 -y /music/out.mp3"
        );
    }

    fn sh(script: String) -> Vec<String> {
        vec!["-c".to_string(), script]
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn pipes_every_chunk_and_reports_progress() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.bin");
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let mut tracker = ProgressTracker::new("vid", Some(&tx));
        let chunks = stream::iter(vec![
            Ok::<_, io::Error>(vec![1u8; 50]),
            Ok(vec![2u8; 50]),
        ]);

        pipe_into_process(
            Path::new("sh"),
            &sh(format!("cat > '{}'", out.display())),
            chunks,
            100,
            &mut tracker,
            Duration::from_secs(10),
        )
        .await
        .unwrap();

        assert_eq!(std::fs::read(&out).unwrap().len(), 100);
        let mut percents = Vec::new();
        while let Ok(ProgressEvent::Download(p)) = rx.try_recv() {
            percents.push(p.percent);
        }
        assert_eq!(percents, vec![50, 99]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn broken_source_is_an_extraction_error() {
        let mut tracker = ProgressTracker::new("vid", None);
        let chunks = stream::iter(vec![
            Ok(vec![0u8; 10]),
            Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset")),
        ]);
        let err = pipe_into_process(
            Path::new("sh"),
            &sh("cat > /dev/null".to_string()),
            chunks,
            0,
            &mut tracker,
            Duration::from_secs(10),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, TuneGrabError::Extraction(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn nonzero_exit_carries_the_code() {
        let mut tracker = ProgressTracker::new("vid", None);
        let chunks = stream::iter(vec![Ok::<_, io::Error>(vec![0u8; 10])]);
        let err = pipe_into_process(
            Path::new("sh"),
            &sh("cat > /dev/null; echo 'Invalid data found' >&2; exit 1".to_string()),
            chunks,
            10,
            &mut tracker,
            Duration::from_secs(10),
        )
        .await
        .unwrap_err();
        let TuneGrabError::Subprocess { tool, reason } = err else {
            panic!("expected a subprocess error");
        };
        assert_eq!(tool, "sh");
        assert!(reason.contains("exit code 1"));
        assert!(reason.contains("Invalid data found"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn stalled_source_times_out() {
        let mut tracker = ProgressTracker::new("vid", None);
        let err = pipe_into_process(
            Path::new("sh"),
            &sh("cat > /dev/null".to_string()),
            stream::pending::<std::result::Result<Vec<u8>, io::Error>>(),
            0,
            &mut tracker,
            Duration::from_millis(200),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, TuneGrabError::Timeout(_)));
    }
}
