use super::{MediaError, ProcessOutput, ProcessRunner};
use async_trait::async_trait;
use std::ffi::OsString;
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// Canned runner: `ffmpeg` copies its `-i` input to the last argument,
/// `ffprobe` prints `probe_json`.
pub(crate) struct FakeRunner {
    pub probe_json: String,
    pub remux_exit_code: i32,
    pub remux_stderr: String,
    pub calls: Mutex<Vec<(String, Vec<OsString>)>>,
}

impl FakeRunner {
    pub fn with_dimensions(width: u32, height: u32) -> Self {
        Self::with_probe_json(&format!(
            r#"{{"streams":[{{"index":0,"codec_type":"audio"}},{{"index":1,"codec_type":"video","width":{},"height":{}}}]}}"#,
            width, height
        ))
    }

    pub fn with_probe_json(json: &str) -> Self {
        Self {
            probe_json: json.to_string(),
            remux_exit_code: 0,
            remux_stderr: String::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_remux(stderr: &str) -> Self {
        Self {
            remux_exit_code: 1,
            remux_stderr: stderr.to_string(),
            ..Self::with_dimensions(1280, 720)
        }
    }

    pub fn calls_to(&self, tool: &str) -> Vec<Vec<OsString>> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(t, _)| t == tool)
            .map(|(_, args)| args.clone())
            .collect()
    }
}

#[async_trait]
impl ProcessRunner for FakeRunner {
    async fn run(
        &self,
        tool: &str,
        args: &[OsString],
        _cancel: &CancellationToken,
    ) -> Result<ProcessOutput, MediaError> {
        self.calls
            .lock()
            .unwrap()
            .push((tool.to_string(), args.to_vec()));

        match tool {
            "ffmpeg" => {
                if self.remux_exit_code != 0 {
                    return Ok(ProcessOutput {
                        stdout: Vec::new(),
                        stderr: self.remux_stderr.clone().into_bytes(),
                        exit_code: Some(self.remux_exit_code),
                    });
                }
                let input_at = args.iter().position(|a| a == "-i").unwrap() + 1;
                let output = args.last().unwrap();
                std::fs::copy(&args[input_at], output).unwrap();
                Ok(ProcessOutput {
                    exit_code: Some(0),
                    ..Default::default()
                })
            }
            "ffprobe" => Ok(ProcessOutput {
                stdout: self.probe_json.clone().into_bytes(),
                stderr: Vec::new(),
                exit_code: Some(0),
            }),
            other => Err(MediaError::Spawn {
                tool: other.to_string(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "unknown tool"),
            }),
        }
    }
}
