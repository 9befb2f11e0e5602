//! Image normalisation into the classifier's input tensor.
//!
//! Every numeric choice here is part of the classifier's contract: the
//! model was trained on 224×224 RGB input scaled to `[0, 1]`, resized with
//! bicubic interpolation. A mismatch lowers confidence without raising an
//! error.

use std::fmt;
use std::str::FromStr;

use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageFormat};
use ndarray::Array4;

use crate::error::DecodeError;

/// Spatial resolution the classifier was trained on.
pub const INPUT_SIZE: u32 = 224;
/// Colour channels after conversion (alpha dropped, grayscale replicated).
pub const CHANNELS: usize = 3;
/// Multiplier mapping `u8` intensities onto `[0.0, 1.0]`.
pub const PIXEL_SCALE: f32 = 1.0 / 255.0;
/// Bicubic resampling, matching the training pipeline's resize.
pub const RESIZE_FILTER: FilterType = FilterType::CatmullRom;

/// Batched image tensor handed to the classifier (batch size is always 1).
pub type Tensor = Array4<f32>;

/// Memory layout of the input tensor expected by the exported model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TensorLayout {
    /// `[1, H, W, C]`, the Keras/TensorFlow default.
    #[default]
    Nhwc,
    /// `[1, C, H, W]`, the PyTorch default.
    Nchw,
}

impl TensorLayout {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Nhwc => "nhwc",
            Self::Nchw => "nchw",
        }
    }

    pub fn shape(&self, height: usize, width: usize) -> [usize; 4] {
        match self {
            Self::Nhwc => [1, height, width, CHANNELS],
            Self::Nchw => [1, CHANNELS, height, width],
        }
    }
}

impl fmt::Display for TensorLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TensorLayout {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "nhwc" => Ok(Self::Nhwc),
            "nchw" => Ok(Self::Nchw),
            other => Err(format!("unknown tensor layout {other:?} (expected nhwc or nchw)")),
        }
    }
}

/// Decodes raw bytes and produces a normalised `[1, …]` tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImagePreprocessor {
    pub width: u32,
    pub height: u32,
    pub layout: TensorLayout,
}

impl Default for ImagePreprocessor {
    fn default() -> Self {
        Self::new(TensorLayout::default())
    }
}

impl ImagePreprocessor {
    /// Preprocessor for the reference 224×224 input in the given layout.
    pub fn new(layout: TensorLayout) -> Self {
        Self {
            width: INPUT_SIZE,
            height: INPUT_SIZE,
            layout,
        }
    }

    /// Shape of every tensor this preprocessor produces.
    pub fn input_shape(&self) -> [usize; 4] {
        self.layout.shape(self.height as usize, self.width as usize)
    }

    /// Decode `bytes` (JPEG, PNG, or any format the `image` crate reads) into a tensor.
    pub fn prepare(&self, bytes: &[u8]) -> Result<Tensor, DecodeError> {
        if bytes.is_empty() {
            return Err(DecodeError::Empty);
        }
        if image::guess_format(bytes).ok() == Some(ImageFormat::Jpeg) && !has_jpeg_eoi(bytes) {
            return Err(DecodeError::Truncated);
        }
        let image = image::load_from_memory(bytes)?;
        Ok(self.prepare_image(&image))
    }

    /// Normalise an already-decoded image.
    ///
    /// Resizes to the exact target size without cropping; aspect ratio is
    /// not preserved.
    pub fn prepare_image(&self, image: &DynamicImage) -> Tensor {
        let rgb = image.to_rgb8();
        let resized = imageops::resize(&rgb, self.width, self.height, RESIZE_FILTER);

        let mut tensor = Tensor::zeros(self.input_shape());
        for (x, y, pixel) in resized.enumerate_pixels() {
            let (x, y) = (x as usize, y as usize);
            for c in 0..CHANNELS {
                let v = pixel[c] as f32 * PIXEL_SCALE;
                match self.layout {
                    TensorLayout::Nhwc => tensor[[0, y, x, c]] = v,
                    TensorLayout::Nchw => tensor[[0, c, y, x]] = v,
                }
            }
        }
        tensor
    }
}

/// True if the JPEG stream ends with an EOI marker (`FF D9`), ignoring
/// trailing zero padding. The JPEG decoder fills missing scan data instead
/// of failing, so a cut-off upload is only detectable here.
fn has_jpeg_eoi(bytes: &[u8]) -> bool {
    let end = bytes.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
    bytes[..end].ends_with(&[0xFF, 0xD9])
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma, Rgb, RgbImage, Rgba, RgbaImage};
    use std::io::Cursor;

    const TOLERANCE: f32 = 1.0 / 255.0 + 1e-6;

    fn encode(image: DynamicImage, format: ImageFormat) -> Vec<u8> {
        let mut buf = Vec::new();
        image.write_to(&mut Cursor::new(&mut buf), format).unwrap();
        buf
    }

    fn solid_rgb(w: u32, h: u32, rgb: [u8; 3]) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(w, h, Rgb(rgb)))
    }

    fn assert_in_unit_range(t: &Tensor) {
        assert!(
            t.iter().all(|&v| (0.0..=1.0).contains(&v)),
            "tensor has values outside [0, 1]"
        );
    }

    #[test]
    fn reference_constants() {
        assert_eq!(INPUT_SIZE, 224);
        assert_eq!(CHANNELS, 3);
        assert!((PIXEL_SCALE * 255.0 - 1.0).abs() < 1e-6);
        assert_eq!(RESIZE_FILTER, FilterType::CatmullRom);
        assert_eq!(TensorLayout::default(), TensorLayout::Nhwc);
    }

    #[test]
    fn any_resolution_yields_fixed_shape() {
        let pre = ImagePreprocessor::default();
        for (w, h) in [(1, 1), (37, 500), (224, 224), (640, 480), (1000, 3)] {
            let bytes = encode(solid_rgb(w, h, [10, 200, 30]), ImageFormat::Png);
            let t = pre.prepare(&bytes).unwrap();
            assert_eq!(t.shape(), &[1, 224, 224, 3], "input {w}x{h}");
            assert_in_unit_range(&t);
        }
    }

    #[test]
    fn nchw_layout_puts_channels_first() {
        let pre = ImagePreprocessor::new(TensorLayout::Nchw);
        let bytes = encode(solid_rgb(64, 48, [255, 0, 0]), ImageFormat::Png);
        let t = pre.prepare(&bytes).unwrap();
        assert_eq!(t.shape(), &[1, 3, 224, 224]);
        assert!((t[[0, 0, 100, 100]] - 1.0).abs() <= TOLERANCE);
        assert!(t[[0, 1, 100, 100]].abs() <= TOLERANCE);
        assert!(t[[0, 2, 100, 100]].abs() <= TOLERANCE);
    }

    #[test]
    fn intensities_are_scaled_to_unit_range() {
        let pre = ImagePreprocessor::default();
        let bytes = encode(solid_rgb(30, 30, [255, 0, 51]), ImageFormat::Png);
        let t = pre.prepare(&bytes).unwrap();
        assert!((t[[0, 12, 200, 0]] - 1.0).abs() <= TOLERANCE);
        assert!(t[[0, 12, 200, 1]].abs() <= TOLERANCE);
        assert!((t[[0, 12, 200, 2]] - 0.2).abs() <= TOLERANCE);
    }

    #[test]
    fn jpeg_is_accepted() {
        let pre = ImagePreprocessor::default();
        let bytes = encode(solid_rgb(320, 240, [40, 160, 60]), ImageFormat::Jpeg);
        let t = pre.prepare(&bytes).unwrap();
        assert_eq!(t.shape(), &[1, 224, 224, 3]);
        assert_in_unit_range(&t);
    }

    #[test]
    fn alpha_channel_is_dropped() {
        let pre = ImagePreprocessor::default();
        let rgba = RgbaImage::from_pixel(20, 20, Rgba([0, 255, 0, 0]));
        let bytes = encode(DynamicImage::ImageRgba8(rgba), ImageFormat::Png);
        let t = pre.prepare(&bytes).unwrap();
        assert_eq!(t.shape(), &[1, 224, 224, 3]);
        // Fully transparent pixels keep their colour; alpha is discarded, not composited.
        assert!((t[[0, 5, 5, 1]] - 1.0).abs() <= TOLERANCE);
    }

    #[test]
    fn grayscale_is_replicated_across_channels() {
        let pre = ImagePreprocessor::default();
        let gray = GrayImage::from_pixel(16, 40, Luma([102]));
        let bytes = encode(DynamicImage::ImageLuma8(gray), ImageFormat::Png);
        let t = pre.prepare(&bytes).unwrap();
        assert_eq!(t.shape(), &[1, 224, 224, 3]);
        for c in 0..3 {
            assert!((t[[0, 50, 50, c]] - 0.4).abs() <= TOLERANCE, "channel {c}");
        }
    }

    #[test]
    fn empty_input_is_decode_error() {
        let err = ImagePreprocessor::default().prepare(&[]).unwrap_err();
        assert!(matches!(err, DecodeError::Empty));
    }

    #[test]
    fn garbage_bytes_are_decode_error() {
        let err = ImagePreprocessor::default()
            .prepare(b"definitely not an image")
            .unwrap_err();
        assert!(matches!(err, DecodeError::Image(_)));
    }

    #[test]
    fn truncated_png_is_decode_error() {
        let noisy = RgbImage::from_fn(64, 64, |x, y| {
            Rgb([(x * 7) as u8, (y * 13) as u8, (x ^ y) as u8])
        });
        let bytes = encode(DynamicImage::ImageRgb8(noisy), ImageFormat::Png);
        let truncated = &bytes[..bytes.len() / 2];
        let err = ImagePreprocessor::default().prepare(truncated).unwrap_err();
        assert!(matches!(err, DecodeError::Image(_)));
    }

    fn noisy_jpeg() -> Vec<u8> {
        let noisy = RgbImage::from_fn(320, 240, |x, y| {
            Rgb([(x * 7 + y) as u8, (y * 13) as u8, (x ^ y) as u8])
        });
        encode(DynamicImage::ImageRgb8(noisy), ImageFormat::Jpeg)
    }

    #[test]
    fn truncated_jpeg_is_decode_error() {
        let bytes = noisy_jpeg();
        let pre = ImagePreprocessor::default();
        for percent in [30, 50, 70, 90] {
            let cut = &bytes[..bytes.len() * percent / 100];
            let err = pre.prepare(cut).unwrap_err();
            assert!(matches!(err, DecodeError::Truncated), "cut at {percent}%: {err}");
        }
    }

    #[test]
    fn jpeg_with_trailing_padding_is_accepted() {
        let mut bytes = noisy_jpeg();
        bytes.extend_from_slice(&[0, 0, 0, 0]);
        let t = ImagePreprocessor::default().prepare(&bytes).unwrap();
        assert_eq!(t.shape(), &[1, 224, 224, 3]);
    }

    #[test]
    fn jpeg_end_marker_detection() {
        assert!(has_jpeg_eoi(&[0xFF, 0xD8, 0x01, 0xFF, 0xD9]));
        assert!(has_jpeg_eoi(&[0xFF, 0xD8, 0xFF, 0xD9, 0x00, 0x00]));
        assert!(!has_jpeg_eoi(&[0xFF, 0xD8, 0x01, 0x02]));
        assert!(!has_jpeg_eoi(&[0x00, 0x00]));
    }

    #[test]
    fn layout_parses_case_insensitively() {
        assert_eq!("NCHW".parse::<TensorLayout>().unwrap(), TensorLayout::Nchw);
        assert_eq!("nhwc".parse::<TensorLayout>().unwrap(), TensorLayout::Nhwc);
        assert!("hwc".parse::<TensorLayout>().is_err());
        assert_eq!(TensorLayout::Nchw.to_string(), "nchw");
    }
}
