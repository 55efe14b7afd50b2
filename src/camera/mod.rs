//! Frame sources
//!
//! A [`Camera`] delivers one frame per pursuit step. `capture` returning
//! `None` is the normal way to report "not ready"; the driver retries.
//!
//! - [`MockCamera`] - synthetic frames with a moving marker line
//! - [`DirectoryCamera`] - replays still images from a directory, in name order

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use image::{Rgb, RgbImage};
use tracing::{debug, info, warn};

use crate::vision::Frame;

/// Default capture size
pub const DEFAULT_WIDTH: u32 = 320;
pub const DEFAULT_HEIGHT: u32 = 240;

/// Error raised while setting up a camera
#[derive(Debug, thiserror::Error)]
pub enum CameraError {
    #[error("failed to read frame directory {path}: {source}")]
    ReadDir {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("no images found in {0}")]
    NoFrames(String),
}

#[async_trait]
pub trait Camera: Send {
    async fn start(&mut self);

    /// Grab one frame; `None` on a transient failure
    async fn capture(&mut self) -> Option<Frame>;

    /// Release the device; idempotent
    async fn stop(&mut self);

    fn name(&self) -> &str;
}

/// Synthetic camera for running without hardware
///
/// Each frame is black with a green diagonal whose position moves with
/// every capture, so consecutive frames differ.
pub struct MockCamera {
    name: String,
    width: u32,
    height: u32,
    running: bool,
    tick: u32,
}

impl MockCamera {
    pub fn new(width: u32, height: u32) -> Self {
        info!(width, height, "[MOCK CAM] initialized");
        Self {
            name: "mock".to_string(),
            width,
            height,
            running: false,
            tick: 0,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    fn render(&self) -> RgbImage {
        let mut image = RgbImage::new(self.width, self.height);
        if self.width == 0 || self.height == 0 {
            return image;
        }

        // Line from (tick, 0) to (width - tick, height - 1)
        let start = (self.tick % self.width) as f64;
        let end = (self.width - 1) as f64 - start;
        let rows = self.height.max(2) - 1;
        for y in 0..self.height {
            let t = y as f64 / rows as f64;
            let x = (start + (end - start) * t).round() as u32;
            for dx in 0..2 {
                let px = (x + dx).min(self.width - 1);
                image.put_pixel(px, y, Rgb([0, 255, 0]));
            }
        }
        image
    }
}

impl Default for MockCamera {
    fn default() -> Self {
        Self::new(DEFAULT_WIDTH, DEFAULT_HEIGHT)
    }
}

#[async_trait]
impl Camera for MockCamera {
    async fn start(&mut self) {
        self.running = true;
        info!("[MOCK CAM] started");
    }

    async fn capture(&mut self) -> Option<Frame> {
        if !self.running {
            warn!("[MOCK CAM] capture called but camera not started");
            return None;
        }
        let frame = Frame::new(self.render());
        self.tick = self.tick.wrapping_add(7);
        Some(frame)
    }

    async fn stop(&mut self) {
        if self.running {
            info!("[MOCK CAM] stopped");
        }
        self.running = false;
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Replays JPEG/PNG stills from a directory, looping at the end
pub struct DirectoryCamera {
    dir: PathBuf,
    frames: Vec<PathBuf>,
    next: usize,
    running: bool,
}

impl DirectoryCamera {
    /// Index the directory; fails if it is unreadable or holds no images
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, CameraError> {
        let dir = dir.as_ref().to_path_buf();
        let entries = std::fs::read_dir(&dir).map_err(|source| CameraError::ReadDir {
            path: dir.display().to_string(),
            source,
        })?;

        let mut frames: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| is_image(path))
            .collect();
        frames.sort();

        if frames.is_empty() {
            return Err(CameraError::NoFrames(dir.display().to_string()));
        }

        info!(dir = %dir.display(), frames = frames.len(), "Frame directory indexed");
        Ok(Self {
            dir,
            frames,
            next: 0,
            running: false,
        })
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| matches!(e.to_ascii_lowercase().as_str(), "jpg" | "jpeg" | "png"))
        .unwrap_or(false)
}

#[async_trait]
impl Camera for DirectoryCamera {
    async fn start(&mut self) {
        self.running = true;
        info!(dir = %self.dir.display(), "Directory camera started");
    }

    async fn capture(&mut self) -> Option<Frame> {
        if !self.running {
            return None;
        }
        let path = self.frames[self.next % self.frames.len()].clone();
        self.next = (self.next + 1) % self.frames.len();

        let decoded = tokio::task::spawn_blocking(move || {
            image::open(&path).map(|img| (path, img.to_rgb8()))
        })
        .await;

        match decoded {
            Ok(Ok((path, image))) => {
                debug!(frame = %path.display(), "Frame loaded");
                Some(Frame::new(image))
            }
            Ok(Err(e)) => {
                warn!(error = %e, "Failed to decode frame");
                None
            }
            Err(e) => {
                warn!(error = %e, "Frame loader task failed");
                None
            }
        }
    }

    async fn stop(&mut self) {
        self.running = false;
    }

    fn name(&self) -> &str {
        "directory"
    }
}
