use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};
use worldstate_migrate::StepError;

/// Measures media files on behalf of migration steps.
#[async_trait]
pub trait MediaProbe: Send + Sync {
    /// Duration of the audio file at `path`, in milliseconds.
    async fn audio_duration_ms(&self, path: &Path) -> Result<f64, StepError>;
}

/// [`MediaProbe`] backed by the `ffprobe` binary from ffmpeg.
#[derive(Debug, Clone)]
pub struct FfprobeProbe {
    program: PathBuf,
}

impl FfprobeProbe {
    /// Use `ffprobe` from `PATH`.
    pub fn new() -> Self {
        Self::with_program("ffprobe")
    }

    /// Use a specific `ffprobe` executable.
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Run `ffprobe -version` and return the first line of its output.
    pub async fn check_installed(&self) -> Result<String, StepError> {
        let output = Command::new(&self.program)
            .arg("-version")
            .output()
            .await
            .map_err(|e| StepError::External {
                tool: self.tool(),
                message: format!(
                    "{e}; ffprobe measures audio files and ships with ffmpeg (e.g. `sudo apt install ffmpeg`)"
                ),
            })?;
        if !output.status.success() {
            return Err(StepError::External {
                tool: self.tool(),
                message: format!("`-version` exited with {}", output.status),
            });
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(stdout.lines().next().unwrap_or_default().to_string())
    }

    fn tool(&self) -> String {
        self.program.display().to_string()
    }
}

impl Default for FfprobeProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MediaProbe for FfprobeProbe {
    async fn audio_duration_ms(&self, path: &Path) -> Result<f64, StepError> {
        let output = Command::new(&self.program)
            .arg("-i")
            .arg(path)
            .args(["-show_entries", "format=duration", "-v", "quiet", "-of", "csv=p=0"])
            .output()
            .await
            .map_err(|e| StepError::External {
                tool: self.tool(),
                message: e.to_string(),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(path = %path.display(), stderr = %stderr.trim(), "ffprobe failed");
            return Err(StepError::External {
                tool: self.tool(),
                message: format!("exited with {} for {}", output.status, path.display()),
            });
        }

        let duration = parse_duration_ms(&String::from_utf8_lossy(&output.stdout))?;
        debug!(path = %path.display(), duration_ms = duration, "measured audio duration");
        Ok(duration)
    }
}

/// Turn ffprobe's `<seconds>` output into milliseconds.
fn parse_duration_ms(stdout: &str) -> Result<f64, StepError> {
    let seconds: f64 = stdout.trim().parse().map_err(|_| {
        StepError::InvalidData(format!("unreadable duration {:?}", stdout.trim()))
    })?;
    let duration = seconds * 1000.0;
    if !(duration > 0.0 && duration.is_finite()) {
        return Err(StepError::InvalidData(format!(
            "the measured duration was invalid ({duration})"
        )));
    }
    Ok(duration)
}
