#![forbid(unsafe_code)]

//! Estimate the native resolution of upscaled images.
//!
//! Upscaled material (mostly anime) is usually produced by rendering at some
//! lower "native" height and resizing with a known kernel. Descaling with the
//! right kernel at the right height undoes that resize almost perfectly, so
//! the reconstruction error of a descale → upscale round trip drops sharply at
//! the native height. This crate measures that error curve over a range of
//! candidate heights and picks the heights with the sharpest drop.
//!
//! The crate carries its own resampling engine:
//!
//! - [`kernel`]: bilinear, bicubic (b, c), lanczos (taps) and spline16/36.
//! - [`resample`]: weight tables, separable resize and least-squares descale.
//! - [`scaler`]: the fixed registry of named kernels.
//!
//! On top of it sit the two estimators, [`estimate`] (which height?) and
//! [`compare`] (which kernel?), the artifact writers in [`report`] and
//! [`graph`], a film [`grain`] synthesizer, and the [`command`] layer that
//! ties fetching, cooldowns and scratch directories together.

pub mod analysis;
pub mod command;
pub mod compare;
pub mod cooldown;
pub mod estimate;
pub mod fetch;
pub mod grain;
pub mod graph;
pub mod kernel;
pub mod luma;
pub mod metric;
pub mod report;
pub mod resample;
pub mod scaler;

use std::time::Duration;

pub use compare::{ScalerRanking, compare_scalers};
pub use cooldown::Cooldown;
pub use estimate::{EstimateRequest, NativeEstimate, NativeEstimator};
pub use grain::GrainParams;
pub use kernel::Kernel;
pub use luma::{load_luma, target_width, to_luma};
pub use metric::clamped_mean_abs_error;
pub use resample::{PixelWeights, WeightEntry, compute_weights, descale, resize};
pub use scaler::{NamedScaler, Scaler};

/// Error type for every fallible operation in the crate.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("min height {min_h} must be smaller than max height {max_h}")]
    InvalidRange { min_h: u32, max_h: u32 },
    #[error("height range {span} exceeds the maximum of {max}")]
    RangeTooLarge { span: u32, max: u32 },
    #[error("min height {min_h} is not below the image height {height}")]
    TooSmall { min_h: u32, height: u32 },
    #[error("max height {max_h} exceeds the image height {height}")]
    MaxAboveImage { max_h: u32, height: u32 },
    #[error("image has {pixels} pixels, the limit is {max}")]
    TooBig { pixels: u64, max: u64 },
    #[error("lossy input format: {0}")]
    LossyFormat(String),
    #[error("not a supported kernel: {0}")]
    UnknownKernel(String),
    #[error("no scaler named {0:?}")]
    UnknownScaler(String),
    #[error("invalid kernel parameter: {0}")]
    InvalidKernelParameter(String),
    #[error("invalid aspect ratio {0}")]
    InvalidAspectRatio(f64),
    #[error("invalid number: {0:?}")]
    InvalidNumber(String),
    #[error(
        "image dimensions differ: expected {expected_w}x{expected_h}, got {actual_w}x{actual_h}"
    )]
    WrongDimensions {
        expected_w: usize,
        expected_h: usize,
        actual_w: usize,
        actual_h: usize,
    },
    #[error("cannot resize to an empty {width}x{height} image")]
    EmptyTarget { width: usize, height: usize },
    #[error("{width}x{height} image is too small to exclude a {border} px border")]
    TooSmallToCrop {
        width: usize,
        height: usize,
        border: usize,
    },
    #[error("descale system for {src} -> {dst} is singular")]
    Singular { src: usize, dst: usize },
    #[error("command is on cooldown for another {remaining:?}")]
    Cooldown { remaining: Duration, window: Duration },
    #[error("can't load image: {0}")]
    Fetch(String),
    #[error(transparent)]
    Decode(#[from] image::ImageError),
    #[error(transparent)]
    Encode(#[from] png::EncodingError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("worker task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl Error {
    /// The message shown to the requesting user, for input-class failures.
    ///
    /// Returns `None` for processing failures: those are logged and replaced
    /// by a generic message, the detail never reaches the user.
    pub fn user_message(&self) -> Option<String> {
        let msg = match self {
            Self::InvalidRange { .. } => "Your min height is bigger or equal to max height.".into(),
            Self::RangeTooLarge { max, .. } => {
                format!("Max - min height bigger than {max} is not allowed")
            }
            Self::TooSmall { min_h, .. } => {
                format!("Picture is too small or equal for min height {min_h}.")
            }
            Self::MaxAboveImage { height, .. } => {
                format!("Your max height can't be bigger than your image height {height}.")
            }
            Self::TooBig { .. } => "Picture is too big.".into(),
            Self::LossyFormat(list) => format!("No lossy format pls. Lossy formats are:\n{list}"),
            Self::UnknownKernel(kernel) => format!("descale: {kernel} is not a supported kernel."),
            Self::UnknownScaler(_) => "Scaler is not defined, pls use \"showscaler\".".into(),
            Self::InvalidKernelParameter(what) => format!("Invalid kernel parameter: {what}"),
            Self::InvalidAspectRatio(ar) => format!("Invalid aspect ratio: {ar}"),
            Self::InvalidNumber(s) => format!("Invalid number: {s}"),
            Self::Cooldown { window, .. } => format!(
                "Pls use this command only every {}min.",
                window.as_secs().div_ceil(60).max(1)
            ),
            Self::Fetch(_) => "Can't load image. Pls try it again later.".into(),
            Self::Decode(_) => "Filetype is not allowed!".into(),
            _ => return None,
        };
        Some(msg)
    }
}

/// Verify that an image has the dimensions an operation expects.
pub(crate) fn check_dimensions<T>(
    img: &imgref::ImgRef<'_, T>,
    expected_w: usize,
    expected_h: usize,
) -> Result<(), Error> {
    if img.width() != expected_w || img.height() != expected_h {
        return Err(Error::WrongDimensions {
            expected_w,
            expected_h,
            actual_w: img.width(),
            actual_h: img.height(),
        });
    }
    Ok(())
}
