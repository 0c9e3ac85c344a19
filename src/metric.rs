use imgref::ImgRef;

use crate::{Error, check_dimensions};

/// Per-pixel differences above this are treated as noise and count as zero.
pub const CLAMP_THRESHOLD: f32 = 0.015;

/// Pixels excluded on every side before averaging.
pub const BORDER: usize = 5;

/// Mean absolute difference between two planes, ignoring outliers and borders.
///
/// Each `|a - b|` above [`CLAMP_THRESHOLD`] is replaced by zero so that
/// compression and antialiasing artifacts do not dominate; the mean is taken
/// over the image with a [`BORDER`] pixel frame cropped away.
pub fn clamped_mean_abs_error(a: ImgRef<'_, f32>, b: ImgRef<'_, f32>) -> Result<f64, Error> {
    check_dimensions(&b, a.width(), a.height())?;

    let (width, height) = (a.width(), a.height());
    if width <= 2 * BORDER || height <= 2 * BORDER {
        return Err(Error::TooSmallToCrop {
            width,
            height,
            border: BORDER,
        });
    }

    let mut sum = 0.0f64;
    for (row_a, row_b) in a
        .rows()
        .zip(b.rows())
        .skip(BORDER)
        .take(height - 2 * BORDER)
    {
        for (&x, &y) in row_a[BORDER..width - BORDER]
            .iter()
            .zip(&row_b[BORDER..width - BORDER])
        {
            let d = (x - y).abs();
            if d <= CLAMP_THRESHOLD {
                sum += d as f64;
            }
        }
    }

    let count = (width - 2 * BORDER) * (height - 2 * BORDER);
    Ok(sum / count as f64)
}
