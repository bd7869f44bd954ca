//! Proof-of-payment handling.
//!
//! Uploads are classified by their leading bytes only; the declared content
//! type and the file name sent by the browser are never trusted. Raster
//! images are decoded, narrowed to the configured width and re-encoded, PDF
//! documents pass through untouched, and everything else is rejected.

use std::{io::Cursor, path::Path};

use image::{DynamicImage, ImageFormat, imageops::FilterType};
use thiserror::Error;

use crate::{
    config::{DEFAULT_MAX_UPLOAD_BYTES, DEFAULT_PROOF_MAX_WIDTH},
    error::{AppError, AppResult},
};

const PDF_MAGIC: &[u8] = b"%PDF-";
const FALLBACK_STEM: &str = "comprobante";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProofKind {
    Jpeg,
    Png,
    Gif,
    Bmp,
    Tiff,
    Pdf,
}

impl ProofKind {
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(PDF_MAGIC) {
            return Some(Self::Pdf);
        }

        match image::guess_format(bytes).ok()? {
            ImageFormat::Jpeg => Some(Self::Jpeg),
            ImageFormat::Png => Some(Self::Png),
            ImageFormat::Gif => Some(Self::Gif),
            ImageFormat::Bmp => Some(Self::Bmp),
            ImageFormat::Tiff => Some(Self::Tiff),
            _ => None,
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Gif => "image/gif",
            Self::Bmp => "image/bmp",
            Self::Tiff => "image/tiff",
            Self::Pdf => "application/pdf",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::Gif => "gif",
            Self::Bmp => "bmp",
            Self::Tiff => "tiff",
            Self::Pdf => "pdf",
        }
    }

    fn image_format(self) -> Option<ImageFormat> {
        match self {
            Self::Jpeg => Some(ImageFormat::Jpeg),
            Self::Png => Some(ImageFormat::Png),
            Self::Gif => Some(ImageFormat::Gif),
            Self::Bmp => Some(ImageFormat::Bmp),
            Self::Tiff => Some(ImageFormat::Tiff),
            Self::Pdf => None,
        }
    }

    /// Kind of the file that is stored and attached after processing.
    pub fn output_kind(self) -> Self {
        match self {
            Self::Bmp | Self::Tiff => Self::Jpeg,
            other => other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProofLimits {
    pub max_bytes: usize,
    pub max_width: u32,
}

impl Default for ProofLimits {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            max_width: DEFAULT_PROOF_MAX_WIDTH,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProofUpload {
    pub file_name: Option<String>,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct ProcessedProof {
    pub file_name: String,
    pub source_kind: ProofKind,
    pub kind: ProofKind,
    pub bytes: Vec<u8>,
}

impl ProcessedProof {
    pub fn content_type(&self) -> &'static str {
        self.kind.content_type()
    }
}

#[derive(Debug, Error)]
pub enum ProofError {
    #[error("proof file is empty")]
    Empty,
    #[error("proof file is {size} bytes, limit is {limit}")]
    TooLarge { size: usize, limit: usize },
    #[error("proof content is neither a supported image nor a PDF")]
    Unsupported,
    #[error("failed to decode {kind:?} image: {source}")]
    Decode {
        kind: ProofKind,
        #[source]
        source: image::ImageError,
    },
    #[error("failed to encode {kind:?} image: {source}")]
    Encode {
        kind: ProofKind,
        #[source]
        source: image::ImageError,
    },
}

impl From<ProofError> for AppError {
    fn from(err: ProofError) -> Self {
        match err {
            ProofError::Empty => AppError::MissingProof,
            ProofError::TooLarge { limit, .. } => AppError::FileTooLarge { limit },
            ProofError::Unsupported => AppError::UnsupportedFileType,
            ProofError::Decode { .. } => AppError::InvalidImage(err.to_string()),
            ProofError::Encode { .. } => AppError::internal(err.to_string()),
        }
    }
}

pub fn process_proof(upload: ProofUpload, limits: ProofLimits) -> Result<ProcessedProof, ProofError> {
    if upload.bytes.is_empty() {
        return Err(ProofError::Empty);
    }
    if upload.bytes.len() > limits.max_bytes {
        return Err(ProofError::TooLarge {
            size: upload.bytes.len(),
            limit: limits.max_bytes,
        });
    }

    let source_kind = ProofKind::sniff(&upload.bytes).ok_or(ProofError::Unsupported)?;
    let kind = source_kind.output_kind();
    let file_name = attachment_name(upload.file_name.as_deref(), kind);

    let bytes = match source_kind.image_format() {
        None => upload.bytes,
        Some(format) => {
            let decoded = image::load_from_memory_with_format(&upload.bytes, format).map_err(
                |source| ProofError::Decode {
                    kind: source_kind,
                    source,
                },
            )?;
            encode(&downscale(decoded, limits.max_width), kind)?
        }
    };

    Ok(ProcessedProof {
        file_name,
        source_kind,
        kind,
        bytes,
    })
}

/// Runs [`process_proof`] on the blocking pool; decoding and resizing are CPU bound.
pub async fn process_proof_blocking(
    upload: ProofUpload,
    limits: ProofLimits,
) -> AppResult<ProcessedProof> {
    tokio::task::spawn_blocking(move || process_proof(upload, limits))
        .await
        .map_err(|err| AppError::internal(format!("proof worker failed: {err}")))?
        .map_err(AppError::from)
}

fn downscale(image: DynamicImage, max_width: u32) -> DynamicImage {
    let (width, height) = (image.width(), image.height());
    if width <= max_width {
        return image;
    }

    let scaled_height = (u64::from(height) * u64::from(max_width) + u64::from(width) / 2)
        / u64::from(width);
    let scaled_height = u32::try_from(scaled_height.max(1)).unwrap_or(u32::MAX);

    image.resize_exact(max_width, scaled_height, FilterType::Lanczos3)
}

fn encode(image: &DynamicImage, kind: ProofKind) -> Result<Vec<u8>, ProofError> {
    let mut buffer = Cursor::new(Vec::new());

    // JPEG has no alpha channel and GIF frames are RGBA.
    let result = match kind {
        ProofKind::Jpeg => {
            DynamicImage::ImageRgb8(image.to_rgb8()).write_to(&mut buffer, ImageFormat::Jpeg)
        }
        ProofKind::Gif => {
            DynamicImage::ImageRgba8(image.to_rgba8()).write_to(&mut buffer, ImageFormat::Gif)
        }
        ProofKind::Png => image.write_to(&mut buffer, ImageFormat::Png),
        ProofKind::Bmp | ProofKind::Tiff | ProofKind::Pdf => return Err(ProofError::Unsupported),
    };

    result.map_err(|source| ProofError::Encode { kind, source })?;
    Ok(buffer.into_inner())
}

fn attachment_name(client_name: Option<&str>, kind: ProofKind) -> String {
    // Some browsers send the full client path.
    let name = client_name
        .and_then(|name| name.rsplit(['/', '\\']).next())
        .map(str::trim)
        .filter(|name| !name.is_empty());

    match name {
        Some(name) => Path::new(name)
            .with_extension(kind.extension())
            .to_string_lossy()
            .into_owned(),
        None => format!("{FALLBACK_STEM}.{}", kind.extension()),
    }
}
