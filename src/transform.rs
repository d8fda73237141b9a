use crate::config::ResizeBound;
use crate::constants::DEFAULT_PIXEL_LIMIT;
use crate::error::{NormalizeError, Result};
use crate::filter::{ConversionJob, SourceFormat};
use image::error::ImageError;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageReader};
use std::fs;
use std::io::Cursor;
use std::path::Path;

/// WebP bytes ready to be committed, plus what it took to get there.
#[derive(Debug, Clone)]
pub struct EncodedImage {
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub source_width: u32,
    pub source_height: u32,
    pub source_size: u64,
}

impl EncodedImage {
    pub fn was_resized(&self) -> bool {
        (self.width, self.height) != (self.source_width, self.source_height)
    }
}

/// Decode, shrink and encode the job's input entirely in memory.
///
/// Nothing touches the filesystem besides reading the source, so a failure
/// here never leaves a partial output behind.
pub fn transform(job: &ConversionJob, allow_oversized: bool) -> Result<EncodedImage> {
    let (img, source_size) = load_image(&job.input, job.format, allow_oversized)?;
    let (source_width, source_height) = img.dimensions();

    let img = resize_image(img, job.resize);
    let (width, height) = img.dimensions();
    let bytes = encode_webp(&img, job.quality, &job.input)?;

    Ok(EncodedImage {
        bytes,
        width,
        height,
        source_width,
        source_height,
        source_size,
    })
}

/// Reads and decodes `path`, enforcing the pixel ceiling unless `allow_oversized`.
///
/// # Returns
/// * `Ok((image, file_size))` - The decoded image and the source size in bytes
/// * `Err(NormalizeError::Decode)` - Unreadable, empty or corrupt source
/// * `Err(NormalizeError::PixelLimitExceeded)` - Source above the pixel ceiling
pub fn load_image(
    path: &Path,
    format: SourceFormat,
    allow_oversized: bool,
) -> Result<(DynamicImage, u64)> {
    let data = fs::read(path).map_err(|e| decode_error(path, e))?;
    let file_size = data.len() as u64;

    let (width, height) = reader_for(&data, format, path)?
        .into_dimensions()
        .map_err(|e| decode_error(path, e))?;
    let pixels = u64::from(width) * u64::from(height);
    if !allow_oversized && pixels > DEFAULT_PIXEL_LIMIT {
        return Err(NormalizeError::PixelLimitExceeded {
            path: path.to_path_buf(),
            width,
            height,
            pixels,
            limit: DEFAULT_PIXEL_LIMIT,
        });
    }

    let mut reader = reader_for(&data, format, path)?;
    if allow_oversized {
        reader.no_limits();
    }

    let img = reader.decode().map_err(|e| match e {
        ImageError::Limits(_) => NormalizeError::PixelLimitExceeded {
            path: path.to_path_buf(),
            width,
            height,
            pixels,
            limit: DEFAULT_PIXEL_LIMIT,
        },
        other => decode_error(path, other),
    })?;

    Ok((img, file_size))
}

fn reader_for<'a>(
    data: &'a [u8],
    format: SourceFormat,
    path: &Path,
) -> Result<ImageReader<Cursor<&'a [u8]>>> {
    let mut reader = ImageReader::new(Cursor::new(data));
    reader.set_format(format.image_format());
    // Content sniffing wins over the extension when it finds a signature.
    reader
        .with_guessed_format()
        .map_err(|e| decode_error(path, e))
}

fn decode_error(path: &Path, err: impl std::fmt::Display) -> NormalizeError {
    NormalizeError::Decode {
        path: path.to_path_buf(),
        reason: err.to_string(),
    }
}

/// Shrink-only resize to the bound, preserving aspect ratio.
pub fn resize_image(img: DynamicImage, bound: ResizeBound) -> DynamicImage {
    let (width, height) = img.dimensions();
    let (target_width, target_height) = bound.target_dimensions(width, height);
    if (target_width, target_height) == (width, height) {
        return img;
    }

    tracing::debug!(
        from = %format!("{}x{}", width, height),
        to = %format!("{}x{}", target_width, target_height),
        "Resizing"
    );
    img.resize_exact(target_width, target_height, FilterType::Lanczos3)
}

/// Lossy WebP at `quality`; keeps the alpha channel when the source has one.
pub fn encode_webp(img: &DynamicImage, quality: u8, path: &Path) -> Result<Vec<u8>> {
    let (width, height) = img.dimensions();
    let encoded = if img.color().has_alpha() {
        let rgba = img.to_rgba8();
        webp::Encoder::from_rgba(rgba.as_raw(), width, height)
            .encode_simple(false, f32::from(quality))
    } else {
        let rgb = img.to_rgb8();
        webp::Encoder::from_rgb(rgb.as_raw(), width, height)
            .encode_simple(false, f32::from(quality))
    };

    encoded
        .map(|memory| memory.to_vec())
        .map_err(|e| NormalizeError::Encode {
            path: path.to_path_buf(),
            reason: format!("{:?}", e),
        })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::ConversionOptions;
    use image::{ImageFormat, RgbImage, RgbaImage};
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn write_png(dir: &Path, name: &str, width: u32, height: u32) -> PathBuf {
        let path = dir.join(name);
        let img = RgbImage::from_fn(width, height, |x, y| image::Rgb([x as u8, y as u8, 128]));
        img.save_with_format(&path, ImageFormat::Png).unwrap();
        path
    }

    fn crc32(bytes: &[u8]) -> u32 {
        let mut crc = !0u32;
        for &byte in bytes {
            crc ^= u32::from(byte);
            for _ in 0..8 {
                crc = if crc & 1 != 0 { (crc >> 1) ^ 0xEDB8_8320 } else { crc >> 1 };
            }
        }
        !crc
    }

    fn png_chunk(out: &mut Vec<u8>, kind: &[u8; 4], data: &[u8]) {
        out.extend_from_slice(&(data.len() as u32).to_be_bytes());
        let start = out.len();
        out.extend_from_slice(kind);
        out.extend_from_slice(data);
        let crc = crc32(&out[start..]);
        out.extend_from_slice(&crc.to_be_bytes());
    }

    /// A grayscale PNG whose header claims 16500x16300 pixels, just over the
    /// ceiling, with no image data behind it.
    pub(crate) fn oversized_png_header() -> Vec<u8> {
        let mut ihdr = Vec::with_capacity(13);
        ihdr.extend_from_slice(&16_500u32.to_be_bytes());
        ihdr.extend_from_slice(&16_300u32.to_be_bytes());
        ihdr.extend_from_slice(&[8, 0, 0, 0, 0]);

        let mut png = b"\x89PNG\r\n\x1a\n".to_vec();
        png_chunk(&mut png, b"IHDR", &ihdr);
        png_chunk(&mut png, b"IDAT", &[]);
        png_chunk(&mut png, b"IEND", &[]);
        png
    }

    fn job_for(path: &Path, bound: ResizeBound) -> ConversionJob {
        let options = ConversionOptions::new(bound, Some(80)).unwrap();
        ConversionJob::for_path(path, &options).unwrap()
    }

    #[test]
    fn test_resize_image_shrinks_wide_images() {
        let img = DynamicImage::new_rgb8(2000, 1500);
        let img = resize_image(img, ResizeBound::MaxWidth(1000));
        assert_eq!(img.dimensions(), (1000, 750));
    }

    #[test]
    fn test_resize_image_never_upscales() {
        let img = DynamicImage::new_rgb8(640, 480);
        let img = resize_image(img, ResizeBound::MaxWidth(1920));
        assert_eq!(img.dimensions(), (640, 480));
    }

    #[test]
    fn test_resize_image_unbounded() {
        let img = DynamicImage::new_rgb8(3000, 200);
        let img = resize_image(img, ResizeBound::Unbounded);
        assert_eq!(img.dimensions(), (3000, 200));
    }

    #[test]
    fn test_transform_png_to_webp() {
        let temp_dir = TempDir::new().unwrap();
        let input = write_png(temp_dir.path(), "wide.png", 400, 100);

        let encoded = transform(&job_for(&input, ResizeBound::MaxWidth(200)), false).unwrap();

        assert_eq!((encoded.width, encoded.height), (200, 50));
        assert_eq!((encoded.source_width, encoded.source_height), (400, 100));
        assert!(encoded.was_resized());
        assert_eq!(&encoded.bytes[0..4], b"RIFF");
        assert_eq!(&encoded.bytes[8..12], b"WEBP");

        let decoded = image::load_from_memory_with_format(&encoded.bytes, ImageFormat::WebP).unwrap();
        assert_eq!(decoded.dimensions(), (200, 50));
    }

    #[test]
    fn test_transform_keeps_alpha() {
        let temp_dir = TempDir::new().unwrap();
        let input = temp_dir.path().join("logo.png");
        RgbaImage::from_pixel(32, 32, image::Rgba([10, 20, 30, 100]))
            .save_with_format(&input, ImageFormat::Png)
            .unwrap();

        let encoded = transform(&job_for(&input, ResizeBound::Unbounded), false).unwrap();
        let decoded = image::load_from_memory_with_format(&encoded.bytes, ImageFormat::WebP).unwrap();
        assert!(decoded.color().has_alpha());
    }

    #[test]
    fn test_transform_empty_file_is_decode_error() {
        let temp_dir = TempDir::new().unwrap();
        let input = temp_dir.path().join("broken.png");
        fs::write(&input, b"").unwrap();

        let result = transform(&job_for(&input, ResizeBound::Unbounded), false);
        assert!(matches!(result, Err(NormalizeError::Decode { .. })));
    }

    #[test]
    fn test_transform_truncated_file_is_decode_error() {
        let temp_dir = TempDir::new().unwrap();
        let input = write_png(temp_dir.path(), "broken.png", 64, 64);
        let bytes = fs::read(&input).unwrap();
        fs::write(&input, &bytes[..bytes.len() / 2]).unwrap();

        let result = transform(&job_for(&input, ResizeBound::Unbounded), false);
        assert!(matches!(result, Err(NormalizeError::Decode { .. })));
    }

    #[test]
    fn test_transform_missing_file_is_decode_error() {
        let job = job_for(Path::new("/nonexistent/photo.jpg"), ResizeBound::Unbounded);
        assert!(matches!(transform(&job, false), Err(NormalizeError::Decode { .. })));
    }

    #[test]
    fn test_load_image_sniffs_content_over_extension() {
        let temp_dir = TempDir::new().unwrap();
        let png = write_png(temp_dir.path(), "real.png", 8, 8);
        let misnamed = temp_dir.path().join("misnamed.jpg");
        fs::rename(&png, &misnamed).unwrap();

        let (img, size) = load_image(&misnamed, SourceFormat::Jpeg, false).unwrap();
        assert_eq!(img.dimensions(), (8, 8));
        assert!(size > 0);
    }

    #[test]
    fn test_pixel_ceiling_rejects_before_decoding() {
        let temp_dir = TempDir::new().unwrap();
        let input = temp_dir.path().join("huge.png");
        fs::write(&input, oversized_png_header()).unwrap();

        match transform(&job_for(&input, ResizeBound::MaxWidth(1920)), false) {
            Err(NormalizeError::PixelLimitExceeded {
                width,
                height,
                pixels,
                limit,
                ..
            }) => {
                assert_eq!((width, height), (16_500, 16_300));
                assert_eq!(pixels, 16_500 * 16_300);
                assert_eq!(limit, DEFAULT_PIXEL_LIMIT);
            }
            other => panic!("unexpected result: {:?}", other.map(|e| e.bytes.len())),
        }
    }

    #[test]
    fn test_allow_oversized_skips_pixel_ceiling() {
        let temp_dir = TempDir::new().unwrap();
        let input = temp_dir.path().join("huge.png");
        fs::write(&input, oversized_png_header()).unwrap();

        // Past the guard, the missing image data is what fails.
        let result = transform(&job_for(&input, ResizeBound::MaxWidth(1920)), true);
        assert!(matches!(result, Err(NormalizeError::Decode { .. })));
    }
}
