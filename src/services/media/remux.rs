use super::{MediaError, ProcessRunner};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Appended to the input path to name the remuxed output
pub const FASTSTART_SUFFIX: &str = ".faststart.mp4";

/// Rewrites an mp4 so the `moov` atom precedes the media data, allowing
/// playback to start before the whole file has downloaded. Streams are
/// copied, never re-encoded.
pub struct FastStartRemuxer {
    runner: Arc<dyn ProcessRunner>,
    ffmpeg_path: String,
}

impl FastStartRemuxer {
    pub fn new(runner: Arc<dyn ProcessRunner>, ffmpeg_path: String) -> Self {
        Self {
            runner,
            ffmpeg_path,
        }
    }

    /// Where [`remux`](Self::remux) writes its output for a given input
    pub fn output_path_for(input: &Path) -> PathBuf {
        let mut output = input.as_os_str().to_owned();
        output.push(FASTSTART_SUFFIX);
        PathBuf::from(output)
    }

    fn args(input: &Path, output: &Path) -> Vec<OsString> {
        vec![
            "-y".into(), // Overwrite output
            "-i".into(),
            input.as_os_str().to_owned(),
            "-c".into(),
            "copy".into(),
            "-movflags".into(),
            "+faststart".into(),
            "-f".into(),
            "mp4".into(),
            output.as_os_str().to_owned(),
        ]
    }

    /// Remux `input` into a new fast-start file and return its path.
    /// `input` is left untouched.
    pub async fn remux(
        &self,
        input: &Path,
        cancel: &CancellationToken,
    ) -> Result<PathBuf, MediaError> {
        let output_path = Self::output_path_for(input);

        let output = self
            .runner
            .run(&self.ffmpeg_path, &Self::args(input, &output_path), cancel)
            .await?;

        if !output.success() {
            let err = MediaError::tool_failed(&self.ffmpeg_path, &output);
            error!("ffmpeg faststart remux failed: {}", err);
            return Err(err);
        }

        info!("Remuxed {} for fast start", input.display());
        Ok(output_path)
    }
}
