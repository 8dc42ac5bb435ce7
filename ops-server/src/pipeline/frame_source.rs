//! Frame source adapter
//!
//! Fetches one frame from a camera's video source. Failure is a value, not
//! a panic: the camera worker records a degraded flag and keeps ticking.
//!
//! Recognized URI schemes:
//! - `file://` or a bare path — read the referenced image from disk
//! - `http://` / `https://` — GET with a deadline; body bytes are the frame
//! - `rtsp://` — interface reserved; this adapter reports `Unsupported`

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use image::ImageFormat;
use shared::util::now_millis;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("source unreachable: {0}")]
    Unreachable(String),

    #[error("frame fetch timed out")]
    Timeout,

    #[error("frame decode failed: {0}")]
    Decode(String),

    #[error("unsupported source: {0}")]
    Unsupported(String),
}

/// One captured frame
#[derive(Debug, Clone)]
pub struct Frame {
    pub bytes: Vec<u8>,
    pub format: ImageFormat,
    /// Monotonic per camera
    pub frame_index: i64,
    /// Capture timestamp (Unix millis)
    pub captured_at: i64,
}

/// Fetches frames and assigns monotonic frame indices per camera
pub struct FrameSource {
    http: reqwest::Client,
    /// camera_id → last issued frame index
    counters: Mutex<HashMap<String, i64>>,
}

impl FrameSource {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
            counters: Mutex::new(HashMap::new()),
        }
    }

    /// Seed the per-camera counter from persisted state so indices stay
    /// monotonic across restarts.
    pub fn seed_counter(&self, camera_id: &str, last_frame_index: i64) {
        let mut counters = self.counters.lock().expect("counter lock poisoned");
        let entry = counters.entry(camera_id.to_string()).or_insert(last_frame_index);
        if *entry < last_frame_index {
            *entry = last_frame_index;
        }
    }

    fn next_index(&self, camera_id: &str) -> i64 {
        let mut counters = self.counters.lock().expect("counter lock poisoned");
        let entry = counters.entry(camera_id.to_string()).or_insert(0);
        *entry += 1;
        *entry
    }

    /// Fetch one frame within `deadline`
    pub async fn fetch_frame(
        &self,
        camera_id: &str,
        source_uri: &str,
        deadline: Duration,
    ) -> Result<Frame, FrameError> {
        let bytes = if source_uri.starts_with("rtsp://") {
            return Err(FrameError::Unsupported(source_uri.to_string()));
        } else if source_uri.starts_with("http://") || source_uri.starts_with("https://") {
            self.fetch_http(source_uri, deadline).await?
        } else {
            let path = source_uri.strip_prefix("file://").unwrap_or(source_uri);
            self.fetch_file(path, deadline).await?
        };

        let format = image::guess_format(&bytes)
            .map_err(|e| FrameError::Decode(format!("unknown image format: {e}")))?;

        Ok(Frame {
            bytes,
            format,
            frame_index: self.next_index(camera_id),
            captured_at: now_millis(),
        })
    }

    async fn fetch_http(&self, url: &str, deadline: Duration) -> Result<Vec<u8>, FrameError> {
        let response = self
            .http
            .get(url)
            .timeout(deadline)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    FrameError::Timeout
                } else {
                    FrameError::Unreachable(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            return Err(FrameError::Unreachable(format!(
                "HTTP {} from {url}",
                response.status()
            )));
        }

        let bytes = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                FrameError::Timeout
            } else {
                FrameError::Unreachable(e.to_string())
            }
        })?;
        Ok(bytes.to_vec())
    }

    async fn fetch_file(&self, path: &str, deadline: Duration) -> Result<Vec<u8>, FrameError> {
        match tokio::time::timeout(deadline, tokio::fs::read(path)).await {
            Ok(Ok(bytes)) => Ok(bytes),
            Ok(Err(e)) => Err(FrameError::Unreachable(format!("{path}: {e}"))),
            Err(_) => Err(FrameError::Timeout),
        }
    }
}

impl Default for FrameSource {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png_bytes() -> Vec<u8> {
        let img = image::RgbImage::from_pixel(16, 16, image::Rgb([40, 80, 120]));
        let mut out = std::io::Cursor::new(Vec::new());
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut out, ImageFormat::Png)
            .unwrap();
        out.into_inner()
    }

    #[tokio::test]
    async fn file_source_counts_monotonically() {
        let dir = std::env::temp_dir().join(format!("frame-src-{}", shared::util::new_id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("frame.png");
        std::fs::write(&path, png_bytes()).unwrap();

        let source = FrameSource::new();
        source.seed_counter("cam-1", 41);

        let uri = format!("file://{}", path.display());
        let a = source.fetch_frame("cam-1", &uri, Duration::from_secs(1)).await.unwrap();
        let b = source.fetch_frame("cam-1", &uri, Duration::from_secs(1)).await.unwrap();
        assert_eq!(a.frame_index, 42);
        assert_eq!(b.frame_index, 43);
        assert_eq!(a.format, ImageFormat::Png);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn missing_file_is_unreachable() {
        let source = FrameSource::new();
        let err = source
            .fetch_frame("cam-1", "/no/such/frame.jpg", Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, FrameError::Unreachable(_)));
    }

    #[tokio::test]
    async fn rtsp_reports_unsupported() {
        let source = FrameSource::new();
        let err = source
            .fetch_frame("cam-1", "rtsp://cam.local/stream", Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, FrameError::Unsupported(_)));
    }

    #[tokio::test]
    async fn garbage_bytes_fail_decode() {
        let dir = std::env::temp_dir().join(format!("frame-src-{}", shared::util::new_id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("bad.jpg");
        std::fs::write(&path, b"not an image").unwrap();

        let source = FrameSource::new();
        let err = source
            .fetch_frame("cam-1", path.to_str().unwrap(), Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, FrameError::Decode(_)));

        std::fs::remove_dir_all(&dir).ok();
    }
}
