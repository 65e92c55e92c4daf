use anyhow::{Context, Result};
use image::RgbImage;
use serde::Deserialize;
use tokio::process::Command;
use tracing::{debug, error};

#[derive(Debug, Clone, Deserialize)]
pub struct LiveViewConfig {
    /// "dummy" | "file" | "libcamera-jpeg" | "v4l2-mjpeg"
    #[serde(default = "default_mode")]
    pub mode: String,
    /// /dev/video0 (v4l2) or image path (file)
    #[serde(default)]
    pub device: String,
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default = "default_fps")]
    pub fps: u32,
}

fn default_mode() -> String {
    "dummy".into()
}

fn default_width() -> u32 {
    640
}

fn default_height() -> u32 {
    480
}

fn default_fps() -> u32 {
    15
}

impl Default for LiveViewConfig {
    fn default() -> Self {
        Self {
            mode: default_mode(),
            device: String::new(),
            width: default_width(),
            height: default_height(),
            fps: default_fps(),
        }
    }
}

/// Source of live-view frames. A missing frame is reported as `None` and
/// counts as "target lost" for that frame.
pub struct LiveView {
    cfg: LiveViewConfig,
}

impl LiveView {
    pub fn new(cfg: LiveViewConfig) -> Result<Self> {
        match cfg.mode.as_str() {
            "dummy" | "libcamera-jpeg" | "v4l2-mjpeg" => {}
            "file" => anyhow::ensure!(!cfg.device.is_empty(), "live_view.device missing for file mode"),
            other => anyhow::bail!("unknown live_view.mode: {}", other),
        }
        Ok(Self { cfg })
    }

    pub fn size(&self) -> (u32, u32) {
        (self.cfg.width, self.cfg.height)
    }

    pub async fn image(&self) -> Option<RgbImage> {
        if self.cfg.mode == "dummy" {
            return Some(RgbImage::new(self.cfg.width, self.cfg.height));
        }
        match self.read_frame().await {
            Ok(img) => Some(img),
            Err(e) => {
                error!("error reading live view image: {:#}", e);
                None
            }
        }
    }

    async fn read_frame(&self) -> Result<RgbImage> {
        let bytes = match self.cfg.mode.as_str() {
            "file" => tokio::fs::read(&self.cfg.device)
                .await
                .with_context(|| format!("read live view file {}", self.cfg.device))?,
            "libcamera-jpeg" => capture_libcamera(&self.cfg).await?,
            "v4l2-mjpeg" => capture_v4l2_ffmpeg(&self.cfg).await?,
            other => anyhow::bail!("unknown live_view.mode: {}", other),
        };
        decode(&bytes)
    }
}

pub fn decode(bytes: &[u8]) -> Result<RgbImage> {
    let img = image::load_from_memory(bytes).context("decode live view frame")?;
    Ok(img.to_rgb8())
}

async fn capture_libcamera(cfg: &LiveViewConfig) -> Result<Vec<u8>> {
    let mut cmd = Command::new("libcamera-still");
    cmd.args([
        "-n",
        "-t", "1",
        "--width", &cfg.width.to_string(),
        "--height", &cfg.height.to_string(),
        "-o", "-",
    ]);

    debug!("capture: libcamera-still");
    let out = cmd.output().await.context("run libcamera-still")?;
    anyhow::ensure!(out.status.success(), "libcamera-still failed");
    Ok(out.stdout)
}

async fn capture_v4l2_ffmpeg(cfg: &LiveViewConfig) -> Result<Vec<u8>> {
    let mut cmd = Command::new("ffmpeg");
    cmd.args([
        "-hide_banner", "-loglevel", "error",
        "-f", "video4linux2",
        "-input_format", "mjpeg",
        "-video_size", &format!("{}x{}", cfg.width, cfg.height),
        "-i", &cfg.device,
        "-vframes", "1",
        "-f", "image2pipe",
        "-vcodec", "mjpeg",
        "-",
    ]);

    debug!("capture: ffmpeg v4l2");
    let out = cmd.output().await.context("run ffmpeg capture")?;
    anyhow::ensure!(out.status.success(), "ffmpeg capture failed");
    Ok(out.stdout)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_mode_is_rejected() {
        let cfg = LiveViewConfig { mode: "panasonic".into(), ..Default::default() };
        assert!(LiveView::new(cfg).is_err());
    }

    #[test]
    fn file_mode_needs_a_path() {
        let cfg = LiveViewConfig { mode: "file".into(), ..Default::default() };
        assert!(LiveView::new(cfg).is_err());
    }

    #[test]
    fn truncated_frame_fails_to_decode() {
        assert!(decode(&[0xff, 0xd8, 0xff]).is_err());
    }

    #[tokio::test]
    async fn dummy_frames_have_configured_size() {
        let view = LiveView::new(LiveViewConfig::default()).unwrap();
        let img = view.image().await.unwrap();
        assert_eq!(img.dimensions(), (640, 480));
    }

    #[tokio::test]
    async fn unreadable_file_yields_no_frame() {
        let cfg = LiveViewConfig { mode: "file".into(), device: "/nonexistent/frame.jpg".into(), ..Default::default() };
        let view = LiveView::new(cfg).unwrap();
        assert!(view.image().await.is_none());
    }
}
