//! Frame type and pixel conversion: YUYV/MJPG to RGB, dark-frame detection.

use image::{ImageFormat, Rgb, RgbImage};

/// A captured colour webcam frame.
#[derive(Clone)]
pub struct Frame {
    pub image: RgbImage,
    pub sequence: u32,
}

impl Frame {
    /// Average luma (0.0–255.0).
    pub fn mean_luma(&self) -> f32 {
        let n = self.image.width() as usize * self.image.height() as usize;
        if n == 0 {
            return 0.0;
        }
        self.image.pixels().map(|p| luma(p) as f32).sum::<f32>() / n as f32
    }
}

/// BT.601 luma.
fn luma(pixel: &Rgb<u8>) -> u8 {
    let [r, g, b] = pixel.0;
    ((77 * r as u32 + 150 * g as u32 + 29 * b as u32) >> 8) as u8
}

fn clamp_u8(v: i32) -> u8 {
    v.clamp(0, 255) as u8
}

/// Convert packed YUYV 4:2:2 to RGB (BT.601, limited range).
///
/// Every 4 bytes `[Y0, U, Y1, V]` hold two pixels sharing one chroma pair.
pub fn yuyv_to_rgb(yuyv: &[u8], width: u32, height: u32) -> Result<RgbImage, FrameError> {
    let expected = (width * height * 2) as usize;
    if yuyv.len() < expected || width % 2 != 0 {
        return Err(FrameError::InvalidLength {
            expected,
            actual: yuyv.len(),
        });
    }

    let mut rgb = Vec::with_capacity((width * height * 3) as usize);
    for chunk in yuyv[..expected].chunks_exact(4) {
        let d = chunk[1] as i32 - 128;
        let e = chunk[3] as i32 - 128;
        for y in [chunk[0], chunk[2]] {
            let c = 298 * (y as i32 - 16);
            rgb.push(clamp_u8((c + 409 * e + 128) >> 8));
            rgb.push(clamp_u8((c - 100 * d - 208 * e + 128) >> 8));
            rgb.push(clamp_u8((c + 516 * d + 128) >> 8));
        }
    }

    RgbImage::from_raw(width, height, rgb).ok_or(FrameError::InvalidLength {
        expected,
        actual: yuyv.len(),
    })
}

/// Decode one MJPG buffer.
pub fn mjpg_to_rgb(jpeg: &[u8]) -> Result<RgbImage, FrameError> {
    Ok(image::load_from_memory_with_format(jpeg, ImageFormat::Jpeg)?.to_rgb8())
}

/// True if more than `threshold_pct` of pixels have luma below 32.
///
/// Webcams emit a few near-black frames while auto-exposure settles.
pub fn is_dark_frame(image: &RgbImage, threshold_pct: f32) -> bool {
    let total = image.width() as usize * image.height() as usize;
    if total == 0 {
        return true;
    }
    let dark = image.pixels().filter(|p| luma(p) < 32).count();
    (dark as f32 / total as f32) > threshold_pct
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("invalid YUYV length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
    #[error("image codec: {0}")]
    Codec(#[from] image::ImageError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yuyv_white_and_black() {
        // 2x1: one chroma pair, Y0 = white, Y1 = black.
        let rgb = yuyv_to_rgb(&[235, 128, 16, 128], 2, 1).unwrap();
        assert_eq!(rgb.get_pixel(0, 0), &Rgb([255, 255, 255]));
        assert_eq!(rgb.get_pixel(1, 0), &Rgb([0, 0, 0]));
    }

    #[test]
    fn test_yuyv_red_dominates_with_high_v() {
        let rgb = yuyv_to_rgb(&[81, 90, 81, 240], 2, 1).unwrap();
        let Rgb([r, g, b]) = *rgb.get_pixel(0, 0);
        assert!(r > 200 && g < 50 && b < 50, "got ({r}, {g}, {b})");
    }

    #[test]
    fn test_yuyv_invalid_length() {
        assert!(yuyv_to_rgb(&[100, 128], 2, 1).is_err());
        assert!(yuyv_to_rgb(&[0; 6], 3, 1).is_err());
    }

    #[test]
    fn test_dark_frame() {
        assert!(is_dark_frame(&RgbImage::new(10, 10), 0.95));
        assert!(!is_dark_frame(&RgbImage::from_pixel(10, 10, Rgb([128, 128, 128])), 0.95));
        assert!(is_dark_frame(&RgbImage::new(0, 0), 0.95));
    }

    #[test]
    fn test_dark_frame_borderline() {
        // 94 of 100 pixels dark → not dark at 95%.
        let mut image = RgbImage::new(10, 10);
        for i in 0..6 {
            image.put_pixel(i, 0, Rgb([200, 200, 200]));
        }
        assert!(!is_dark_frame(&image, 0.95));
    }

    #[test]
    fn test_mjpg_decode_keeps_dimensions() {
        let frame = Frame {
            image: RgbImage::from_pixel(16, 8, Rgb([90, 120, 150])),
            sequence: 0,
        };
        let mut jpeg = std::io::Cursor::new(Vec::new());
        frame.image.write_to(&mut jpeg, ImageFormat::Jpeg).unwrap();

        let decoded = mjpg_to_rgb(jpeg.get_ref()).unwrap();
        assert_eq!(decoded.dimensions(), (16, 8));
        assert!((frame.mean_luma() - 114.0).abs() < 2.0);
    }

    #[test]
    fn test_mjpg_garbage_is_an_error() {
        assert!(matches!(mjpg_to_rgb(b"\xff\xd8junk"), Err(FrameError::Codec(_))));
    }
}
