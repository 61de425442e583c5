use super::{MediaError, ProcessRunner};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Maximum distance from the reference ratio that still counts as a match
const RATIO_TOLERANCE: f64 = 0.05;
const LANDSCAPE_RATIO: f64 = 16.0 / 9.0;
const PORTRAIT_RATIO: f64 = 9.0 / 16.0;

/// Coarse geometry bucket. Used as the storage key prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AspectLabel {
    Landscape,
    Portrait,
    Other,
}

impl AspectLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AspectLabel::Landscape => "landscape",
            AspectLabel::Portrait => "portrait",
            AspectLabel::Other => "other",
        }
    }

    /// Bucket a width/height pair. Zero in either dimension is `Other`.
    pub fn from_dimensions(width: u32, height: u32) -> Self {
        if width == 0 || height == 0 {
            return AspectLabel::Other;
        }

        let ratio = f64::from(width) / f64::from(height);
        if (ratio - LANDSCAPE_RATIO).abs() < RATIO_TOLERANCE {
            AspectLabel::Landscape
        } else if (ratio - PORTRAIT_RATIO).abs() < RATIO_TOLERANCE {
            AspectLabel::Portrait
        } else {
            AspectLabel::Other
        }
    }
}

impl fmt::Display for AspectLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    #[serde(default)]
    width: u32,
    #[serde(default)]
    height: u32,
}

/// Classify ffprobe `-print_format json -show_streams` output.
///
/// Only the first stream with `codec_type == "video"` is considered; audio,
/// subtitle and data streams may precede it. A file without a video stream
/// classifies as `Other`.
pub fn classify_probe_output(stdout: &[u8]) -> Result<AspectLabel, serde_json::Error> {
    let probe: ProbeOutput = serde_json::from_slice(stdout)?;

    let label = probe
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .map(|s| AspectLabel::from_dimensions(s.width, s.height))
        .unwrap_or(AspectLabel::Other);

    Ok(label)
}

pub struct AspectClassifier {
    runner: Arc<dyn ProcessRunner>,
    ffprobe_path: String,
}

impl AspectClassifier {
    pub fn new(runner: Arc<dyn ProcessRunner>, ffprobe_path: String) -> Self {
        Self {
            runner,
            ffprobe_path,
        }
    }

    pub async fn classify(
        &self,
        path: &Path,
        cancel: &CancellationToken,
    ) -> Result<AspectLabel, MediaError> {
        let args: Vec<OsString> = vec![
            "-v".into(),
            "error".into(),
            "-print_format".into(),
            "json".into(),
            "-show_streams".into(),
            path.as_os_str().to_owned(),
        ];

        let output = self.runner.run(&self.ffprobe_path, &args, cancel).await?;

        if !output.success() {
            let err = MediaError::tool_failed(&self.ffprobe_path, &output);
            error!("ffprobe failed: {}", err);
            return Err(err);
        }

        let label =
            classify_probe_output(&output.stdout).map_err(|source| MediaError::InvalidOutput {
                tool: self.ffprobe_path.clone(),
                source,
            })?;

        info!("Classified {} as {}", path.display(), label);
        Ok(label)
    }
}
