use std::path::Path;

use anyhow::Context;
use image::{GrayImage, RgbImage};

use crate::frame::Frame;

/// Which samples to keep when loading an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorMode {
    /// One luma sample per pixel.
    #[default]
    Luma,
    /// Three samples per pixel, R G B.
    Rgb,
}

impl ColorMode {
    pub fn channels(self) -> usize {
        match self {
            ColorMode::Luma => 1,
            ColorMode::Rgb => 3,
        }
    }

    pub fn from_channels(channels: usize) -> Option<Self> {
        match channels {
            1 => Some(ColorMode::Luma),
            3 => Some(ColorMode::Rgb),
            _ => None,
        }
    }
}

/// Decode the image at `path` into a frame, converting to `color`.
pub fn load_frame(path: &Path, color: ColorMode) -> anyhow::Result<Frame> {
    let img = image::open(path).with_context(|| format!("decoding image {}", path.display()))?;
    let (width, height) = (img.width() as usize, img.height() as usize);
    let data = match color {
        ColorMode::Luma => img.to_luma8().into_raw(),
        ColorMode::Rgb => img.to_rgb8().into_raw(),
    };
    Ok(Frame::new(width, height, color.channels(), data)?)
}

/// Write `frame` to `path`; the format follows the file extension.
///
/// Residual frames must go through a lossless format (PNG) since Minimize
/// residuals only decode exactly when every sample survives.
pub fn save_frame(frame: &Frame, path: &Path) -> anyhow::Result<()> {
    let (w, h) = (frame.width() as u32, frame.height() as u32);
    let raw = frame.data().to_vec();
    let saved = match frame.channels() {
        1 => GrayImage::from_raw(w, h, raw)
            .ok_or_else(|| anyhow::anyhow!("luma buffer does not fit {w}x{h}"))?
            .save(path),
        3 => RgbImage::from_raw(w, h, raw)
            .ok_or_else(|| anyhow::anyhow!("rgb buffer does not fit {w}x{h}"))?
            .save(path),
        c => anyhow::bail!("cannot save a frame with {c} channels"),
    };
    saved.with_context(|| format!("writing image {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn png_round_trip_is_lossless() {
        for color in [ColorMode::Luma, ColorMode::Rgb] {
            let c = color.channels();
            let data: Vec<u8> = (0..16 * 8 * c).map(|i| (i * 37 % 256) as u8).collect();
            let frame = Frame::new(16, 8, c, data).unwrap();
            let path = std::env::temp_dir().join(format!("blockdelta_imageio_{c}.png"));
            save_frame(&frame, &path).unwrap();
            assert_eq!(load_frame(&path, color).unwrap(), frame);
        }
    }

    #[test]
    fn missing_file_reports_path() {
        let err = load_frame(Path::new("/nonexistent/frame.png"), ColorMode::Luma).unwrap_err();
        assert!(format!("{err:#}").contains("/nonexistent/frame.png"));
    }
}
