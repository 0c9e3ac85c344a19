//! Rank every registered kernel at one fixed native height.

use std::fmt::Write as _;

use imgref::{ImgRef, ImgVec};
use tracing::info;

use crate::Error;
use crate::luma::target_width;
use crate::metric::clamped_mean_abs_error;
use crate::scaler::{NamedScaler, Scaler, registry};

/// Native height assumed when none is given.
pub const DEFAULT_NATIVE_HEIGHT: u32 = 720;

/// Round-trip error of one registry entry.
#[derive(Debug, Clone)]
pub struct ScalerError {
    pub name: &'static str,
    pub scaler: Scaler,
    pub error: f64,
}

/// Registry entries ranked ascending by round-trip error.
#[derive(Debug, Clone)]
pub struct ScalerRanking {
    pub native_height: u32,
    pub aspect_ratio: f64,
    pub results: Vec<ScalerError>,
}

/// Descale `src` to `h` and upscale back, returning the clamped error.
pub fn round_trip_error(
    src: ImgRef<'_, f32>,
    h: usize,
    ar: f64,
    scaler: Scaler,
) -> Result<f64, Error> {
    let display_w = target_width(ar, src.height());
    let down = scaler.descale(src, target_width(ar, h), h)?;
    let up = scaler.upscale(down.as_ref(), display_w, src.height())?;
    if display_w == src.width() {
        return clamped_mean_abs_error(src, up.as_ref());
    }
    // Odd source widths: compare at the even display width.
    let baseline = scaler.upscale(src, display_w, src.height())?;
    clamped_mean_abs_error(baseline.as_ref(), up.as_ref())
}

/// Evaluate every registered scaler at `native_height`.
pub fn compare_scalers(src: ImgRef<'_, f32>, native_height: u32) -> Result<ScalerRanking, Error> {
    compare_with(src, native_height, registry())
}

/// Evaluate `scalers` at `native_height`. Ties keep their input order.
pub fn compare_with(
    src: ImgRef<'_, f32>,
    native_height: u32,
    scalers: &[NamedScaler],
) -> Result<ScalerRanking, Error> {
    let ar = src.width() as f64 / src.height() as f64;
    let h = native_height as usize;

    let mut results = scalers
        .iter()
        .map(|s| {
            Ok(ScalerError {
                name: s.name,
                scaler: s.scaler,
                error: round_trip_error(src, h, ar, s.scaler)?,
            })
        })
        .collect::<Result<Vec<_>, Error>>()?;
    results.sort_by(|a, b| {
        a.error
            .partial_cmp(&b.error)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let ranking = ScalerRanking {
        native_height,
        aspect_ratio: ar,
        results,
    };
    if let Some(best) = ranking.best() {
        info!(native_height, best = best.name, error = best.error, "scalers ranked");
    }
    Ok(ranking)
}

impl ScalerRanking {
    pub fn best(&self) -> Option<&ScalerError> {
        self.results.first()
    }

    /// True when the best kernel reproduced the source exactly, so relative
    /// errors are undefined.
    pub fn is_broken(&self) -> bool {
        self.best().is_some_and(|b| b.error == 0.0)
    }

    /// Error of each entry above the best one, as a fraction (`0.0` for the best).
    ///
    /// `None` when the ranking [`is_broken`](Self::is_broken).
    pub fn relative(&self, error: f64) -> Option<f64> {
        let best = self.best()?.error;
        if best == 0.0 {
            return None;
        }
        Some(error / best - 1.0)
    }

    /// The ranking table: name, relative error, absolute error.
    pub fn table(&self) -> String {
        let longest = self.results.iter().map(|r| r.name.len()).max().unwrap_or(0);
        let mut out = String::new();
        if self.is_broken() {
            out.push_str("Broken Output!\n");
        }
        let best = self.best().map(|b| b.error).unwrap_or(0.0);
        for (i, r) in self.results.iter().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            let fraction = self.relative(r.error).unwrap_or(best);
            let _ = write!(
                out,
                "{:longest$}  {:>6.1}%  {:.10}",
                r.name,
                fraction * 100.0,
                r.error
            );
        }
        out
    }

    pub fn summary(&self) -> String {
        let mut out = format!(
            "Testing scalers for native height: {}\n{}\n",
            self.native_height,
            self.table()
        );
        if let Some(best) = self.best() {
            let _ = write!(
                out,
                "Smallest error achieved by \"{}\" ({:.10})",
                best.name, best.error
            );
        }
        out
    }

    /// The source descaled to the native height with the best kernel.
    pub fn best_preview(&self, src: ImgRef<'_, f32>) -> Result<Option<ImgVec<f32>>, Error> {
        let Some(best) = self.best() else {
            return Ok(None);
        };
        let h = self.native_height as usize;
        let preview = best
            .scaler
            .descale(src, target_width(self.aspect_ratio, h), h)?;
        Ok(Some(preview))
    }
}
