//! Video file decoding and encoding.
//!
//! Both directions go through OpenCV's `videoio` module, so any container and codec supported by
//! the local OpenCV build can be used.

mod convert;

pub(crate) use convert::image_to_bgr;

use std::path::{Path, PathBuf};

use opencv::core::{Mat, Size};
use opencv::prelude::*;
use opencv::videoio::{self, VideoCapture, VideoWriter};

use crate::image::{Image, Resolution};
use crate::timer::Timer;

/// Frame rate assumed when the container does not declare one.
pub const DEFAULT_FPS: f64 = 30.0;

/// A recorded video, read frame by frame.
pub struct VideoFile {
    capture: VideoCapture,
    path: PathBuf,
    frame: Mat,
    fps: f64,
    resolution: Resolution,
    t_decode: Timer,
}

impl VideoFile {
    /// Opens the video file at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        Self::open_impl(path.as_ref())
    }

    fn open_impl(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            anyhow::bail!("video file '{}' does not exist", path.display());
        }

        let capture = VideoCapture::from_file(&path.to_string_lossy(), videoio::CAP_ANY)?;
        if !capture.is_opened()? {
            anyhow::bail!("failed to open video file '{}'", path.display());
        }

        let fps = match capture.get(videoio::CAP_PROP_FPS)? {
            fps if fps.is_finite() && fps > 0.0 => fps,
            _ => DEFAULT_FPS,
        };
        let width = capture.get(videoio::CAP_PROP_FRAME_WIDTH)? as u32;
        let height = capture.get(videoio::CAP_PROP_FRAME_HEIGHT)? as u32;
        let resolution = Resolution::new(width, height);

        log::info!(
            "opened {}, {} @ {:.1} FPS",
            path.display(),
            resolution,
            fps
        );

        Ok(Self {
            capture,
            path: path.to_path_buf(),
            frame: Mat::default(),
            fps,
            resolution,
            t_decode: Timer::new("decode"),
        })
    }

    /// Decodes the next frame.
    ///
    /// Returns `Ok(None)` once the end of the stream is reached. A frame that fails to decode also
    /// ends the stream, since the decoder cannot resume after it.
    pub fn read(&mut self) -> anyhow::Result<Option<Image>> {
        let _guard = self.t_decode.start();
        match self.capture.read(&mut self.frame) {
            Ok(true) if !self.frame.empty() => {}
            Ok(_) => return Ok(None),
            Err(e) => {
                log::warn!("failed to decode frame of '{}': {}", self.path.display(), e);
                return Ok(None);
            }
        }

        convert::bgr_to_image(&self.frame).map(Some)
    }

    /// Frames per second declared by the container, or [`DEFAULT_FPS`].
    pub fn fps(&self) -> f64 {
        self.fps
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    pub fn timers(&self) -> impl Iterator<Item = &Timer> + '_ {
        [&self.t_decode].into_iter()
    }
}

/// Writes annotated frames to a video file.
pub struct VideoSink {
    writer: VideoWriter,
    resolution: Resolution,
    t_encode: Timer,
}

impl VideoSink {
    /// Creates (or truncates) the video file at `path`.
    ///
    /// `.avi` files are encoded as Motion JPEG, everything else with the `mp4v` codec.
    pub fn create<P: AsRef<Path>>(path: P, fps: f64, resolution: Resolution) -> anyhow::Result<Self> {
        Self::create_impl(path.as_ref(), fps, resolution)
    }

    fn create_impl(path: &Path, fps: f64, resolution: Resolution) -> anyhow::Result<Self> {
        let [c1, c2, c3, c4] = fourcc_code(path);
        let fourcc = VideoWriter::fourcc(c1, c2, c3, c4)?;
        let size = Size::new(resolution.width() as i32, resolution.height() as i32);
        let writer = VideoWriter::new(&path.to_string_lossy(), fourcc, fps, size, true)?;
        if !writer.is_opened()? {
            anyhow::bail!("failed to create video file '{}'", path.display());
        }

        log::info!("writing annotated video to {}", path.display());

        Ok(Self {
            writer,
            resolution,
            t_encode: Timer::new("encode"),
        })
    }

    /// Appends `image` to the video.
    ///
    /// The image must have the resolution passed to [`VideoSink::create`].
    pub fn write(&mut self, image: &Image) -> anyhow::Result<()> {
        anyhow::ensure!(
            image.resolution() == self.resolution,
            "frame resolution {} does not match video resolution {}",
            image.resolution(),
            self.resolution,
        );

        let _guard = self.t_encode.start();
        let bgr = convert::image_to_bgr(image)?;
        self.writer.write(&bgr)?;
        Ok(())
    }

    pub fn timers(&self) -> impl Iterator<Item = &Timer> + '_ {
        [&self.t_encode].into_iter()
    }
}

/// Selects the FOURCC code for an output file based on its extension.
fn fourcc_code(path: &Path) -> [char; 4] {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("avi") => ['M', 'J', 'P', 'G'],
        _ => ['m', 'p', '4', 'v'],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file() {
        let err = VideoFile::open("/nonexistent/video.mp4").err().unwrap();
        assert!(err.to_string().contains("does not exist"), "{}", err);
    }

    #[test]
    fn codec_selection() {
        assert_eq!(fourcc_code(Path::new("out.avi")), ['M', 'J', 'P', 'G']);
        assert_eq!(fourcc_code(Path::new("out.AVI")), ['M', 'J', 'P', 'G']);
        assert_eq!(fourcc_code(Path::new("out.mp4")), ['m', 'p', '4', 'v']);
        assert_eq!(fourcc_code(Path::new("out")), ['m', 'p', '4', 'v']);
    }
}
