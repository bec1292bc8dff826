use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};

use image::codecs::pnm::{PnmEncoder, PnmSubtype, SampleEncoding};
use image::imageops::FilterType;
use image::{DynamicImage, ExtendedColorType, GenericImageView, ImageEncoder};
use tracing::debug;

use crate::errors::{BoxedSource, MvPeopleError, Result};
use crate::traits::ImageRenderer;

pub const DEFAULT_SIXEL_COMMAND: &str = "img2sixel";
pub const DEFAULT_MAX_WIDTH: u32 = 1000;

/// Size after shrinking to at most `max_width` columns, keeping the aspect ratio.
pub fn fit_width(width: u32, height: u32, max_width: u32) -> (u32, u32) {
    if width <= max_width || width == 0 {
        return (width, height);
    }
    let scaled = (u64::from(height) * u64::from(max_width) / u64::from(width)).max(1);
    (max_width, scaled as u32)
}

/// Encodes `image` as binary PPM, shrinking it first when it is wider than `max_width`.
pub fn encode_ppm(image: &DynamicImage, max_width: u32) -> image::ImageResult<Vec<u8>> {
    let (width, height) = image.dimensions();
    let (fit_w, fit_h) = fit_width(width, height, max_width);
    let rgb = if (fit_w, fit_h) == (width, height) {
        image.to_rgb8()
    } else {
        image.resize_exact(fit_w, fit_h, FilterType::Lanczos3).to_rgb8()
    };

    let mut buffer = Vec::new();
    PnmEncoder::new(&mut buffer)
        .with_subtype(PnmSubtype::Pixmap(SampleEncoding::Binary))
        .write_image(rgb.as_raw(), rgb.width(), rgb.height(), ExtendedColorType::Rgb8)?;
    Ok(buffer)
}

/// Draws images with an external sixel encoder fed a PPM on stdin.
#[derive(Debug, Clone)]
pub struct SixelRenderer {
    command: String,
    max_width: u32,
}

impl Default for SixelRenderer {
    fn default() -> Self {
        Self::new(DEFAULT_SIXEL_COMMAND, DEFAULT_MAX_WIDTH)
    }
}

impl SixelRenderer {
    pub fn new(command: impl Into<String>, max_width: u32) -> Self {
        Self {
            command: command.into(),
            max_width,
        }
    }

    fn error(path: &Path, operation: &str, source: impl Into<BoxedSource>) -> MvPeopleError {
        MvPeopleError::Render {
            path: path.to_path_buf(),
            operation: operation.to_string(),
            source: source.into(),
        }
    }
}

impl ImageRenderer for SixelRenderer {
    fn render(&self, path: &Path) -> Result<()> {
        let image = image::open(path).map_err(|e| Self::error(path, "decode image", e))?;
        let ppm = encode_ppm(&image, self.max_width)
            .map_err(|e| Self::error(path, "encode ppm", e))?;

        let mut child = Command::new(&self.command)
            .stdin(Stdio::piped())
            .spawn()
            .map_err(|e| Self::error(path, &format!("start {}", self.command), e))?;

        // stdin is closed before waiting so the encoder sees end of input
        let written = match child.stdin.take() {
            Some(mut stdin) => stdin.write_all(&ppm),
            None => Ok(()),
        };
        let status = child
            .wait()
            .map_err(|e| Self::error(path, "wait for sixel encoder", e))?;
        written.map_err(|e| Self::error(path, "write to sixel encoder", e))?;
        if !status.success() {
            return Err(Self::error(
                path,
                "run sixel encoder",
                format!("{} exited with {status}", self.command),
            ));
        }

        debug!(path = %path.display(), bytes = ppm.len(), "rendered");
        Ok(())
    }
}
