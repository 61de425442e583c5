use anyhow::{Result, anyhow};
use axum::http::{HeaderMap, header};
use uuid::Uuid;

/// The only media type accepted for video uploads
pub const VIDEO_MP4: &str = "video/mp4";

/// Parse a video id from a path segment
pub fn parse_video_id(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw.trim()).map_err(|e| anyhow!("Invalid video ID '{}': {}", raw, e))
}

/// Accept only `video/mp4`, ignoring media type parameters such as
/// `codecs=...`.
pub fn validate_video_content_type(content_type: Option<&str>) -> Result<()> {
    let raw = content_type.ok_or_else(|| anyhow!("Missing Content-Type for video"))?;

    let mime: mime::Mime = raw
        .parse()
        .map_err(|_| anyhow!("Invalid Content-Type: {}", raw))?;

    if mime.essence_str() != VIDEO_MP4 {
        return Err(anyhow!("Only video/mp4 is supported, got {}", mime.essence_str()));
    }

    Ok(())
}

/// Reject a request whose declared `Content-Length` is over `max` before
/// any of the body is read.
pub fn check_declared_length(headers: &HeaderMap, max: u64) -> Result<()> {
    let declared = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok());

    match declared {
        Some(len) if len > max => Err(anyhow!(
            "Request body of {} bytes exceeds the {} byte limit",
            len,
            max
        )),
        _ => Ok(()),
    }
}

/// Whether an error (or anything in its source chain) is the body-limit
/// rejection raised while streaming a request body.
pub fn is_body_limit_error(err: &(dyn std::error::Error + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(e) = current {
        if e.to_string().contains("length limit exceeded") {
            return true;
        }
        current = e.source();
    }
    false
}
