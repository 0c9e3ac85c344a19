//! Native resolution estimation.
//!
//! For every candidate height the source luma is descaled with a fixed
//! kernel, upscaled back to the display size and compared with the source.
//! The error drops sharply at the native height; [`crate::analysis`] turns
//! the resulting curve into a best guess.

use std::sync::Arc;

use imgref::ImgVec;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::Error;
use crate::analysis::{pick_candidates, ratio_curve};
use crate::luma::target_width;
use crate::metric::clamped_mean_abs_error;
use crate::scaler::Scaler;

/// Largest allowed `max_h - min_h`.
pub const MAX_SPAN: u32 = 1000;

/// Parameters of one estimation run.
#[derive(Debug, Clone)]
pub struct EstimateRequest {
    pub scaler: Scaler,
    /// Forced aspect ratio; `None` (or a non-positive value) derives it from the source.
    pub aspect_ratio: Option<f64>,
    pub min_h: u32,
    pub max_h: u32,
}

impl Default for EstimateRequest {
    fn default() -> Self {
        Self {
            scaler: Scaler::default(),
            aspect_ratio: None,
            min_h: 500,
            max_h: 1000,
        }
    }
}

impl EstimateRequest {
    fn check_bounds(&self, height: u32) -> Result<(), Error> {
        if self.min_h >= height {
            return Err(Error::TooSmall {
                min_h: self.min_h,
                height,
            });
        }
        if self.min_h >= self.max_h {
            return Err(Error::InvalidRange {
                min_h: self.min_h,
                max_h: self.max_h,
            });
        }
        let span = self.max_h - self.min_h;
        if span > MAX_SPAN {
            return Err(Error::RangeTooLarge {
                span,
                max: MAX_SPAN,
            });
        }
        if let Some(ar) = self.aspect_ratio {
            if !ar.is_finite() {
                return Err(Error::InvalidAspectRatio(ar));
            }
        }
        Ok(())
    }

    /// Reject the request for a source of `height`, without adjusting it.
    pub fn validate(&self, height: u32) -> Result<(), Error> {
        self.check_bounds(height)?;
        if self.max_h > height {
            return Err(Error::MaxAboveImage {
                max_h: self.max_h,
                height,
            });
        }
        Ok(())
    }

    /// Validate against a source of `height`, lowering `max_h` to the image
    /// height if it is above it. Returns whether `max_h` was lowered.
    pub fn fit_to_height(&mut self, height: u32) -> Result<bool, Error> {
        self.check_bounds(height)?;
        if self.max_h > height {
            warn!(
                max_h = self.max_h,
                height, "max height above image height, clamping"
            );
            self.max_h = height;
            return Ok(true);
        }
        Ok(false)
    }

    /// Number of candidate heights, `max_h - min_h + 1`.
    pub fn candidates(&self) -> usize {
        (self.max_h.saturating_sub(self.min_h) + 1) as usize
    }
}

/// The outcome of one estimation run.
#[derive(Debug, Clone)]
pub struct NativeEstimate {
    pub scaler: Scaler,
    /// Aspect ratio the candidates were built with.
    pub aspect_ratio: f64,
    pub min_h: u32,
    /// One error per candidate height, ascending height order.
    pub errors: Vec<f64>,
    pub ratios: Vec<f64>,
    /// Accepted native heights, in acceptance order.
    pub best: Vec<u32>,
}

impl NativeEstimate {
    /// Highest candidate height, `None` for an empty curve.
    pub fn max_h(&self) -> Option<u32> {
        let last = self.errors.len().checked_sub(1)?;
        Some(self.min_h + last as u32)
    }

    /// `(height, error, ratio)` for every candidate.
    pub fn rows(&self) -> impl Iterator<Item = (u32, f64, f64)> + '_ {
        self.errors
            .iter()
            .zip(&self.ratios)
            .enumerate()
            .map(|(i, (&e, &r))| (self.min_h + i as u32, e, r))
    }

    /// The accepted heights as `720p, 873p`, or `none`.
    pub fn best_values(&self) -> String {
        if self.best.is_empty() {
            return "none".to_string();
        }
        self.best
            .iter()
            .map(|h| format!("{h}p"))
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn best_guess(&self) -> String {
        format!("Native resolution(s) (best guess): {}", self.best_values())
    }
}

/// Runs an [`EstimateRequest`] against a source luma plane.
#[derive(Debug, Clone)]
pub struct NativeEstimator {
    request: EstimateRequest,
    worker_threads: usize,
}

impl NativeEstimator {
    pub fn new(request: EstimateRequest) -> Self {
        Self {
            request,
            worker_threads: num_cpus::get(),
        }
    }

    /// Override the worker count the in-flight cap is derived from.
    pub fn with_worker_threads(mut self, worker_threads: usize) -> Self {
        self.worker_threads = worker_threads;
        self
    }

    pub fn request(&self) -> &EstimateRequest {
        &self.request
    }

    /// Units of work allowed in flight: half the workers, at least one.
    pub fn in_flight_cap(&self) -> usize {
        (self.worker_threads / 2).max(1)
    }

    pub async fn run(&self, src: Arc<ImgVec<f32>>) -> Result<NativeEstimate, Error> {
        let (src_w, src_h) = (src.width(), src.height());
        self.request.validate(src_h as u32)?;

        let native_ar = src_w as f64 / src_h as f64;
        let ar = match self.request.aspect_ratio {
            Some(ar) if ar > 0.0 => ar,
            _ => native_ar,
        };
        let display_w = target_width(ar, src_h);
        let scaler = self.request.scaler;

        info!(
            kernel = %scaler.kernel,
            ar,
            min_h = self.request.min_h,
            max_h = self.request.max_h,
            "estimating native resolution of {src_w}x{src_h}"
        );

        // The comparison baseline has to match the display size of the
        // round-tripped candidates.
        let baseline = if display_w != src_w {
            let source: &ImgVec<f32> = &src;
            Arc::new(scaler.upscale(source.as_ref(), display_w, src_h)?)
        } else {
            Arc::clone(&src)
        };

        let cap = self.in_flight_cap();
        let mut pending = JoinSet::new();
        let mut vals: Vec<(usize, f64)> = Vec::with_capacity(self.request.candidates());

        for (index, h) in (self.request.min_h..=self.request.max_h).enumerate() {
            let src = Arc::clone(&src);
            let baseline = Arc::clone(&baseline);
            pending.spawn_blocking(move || -> Result<(usize, f64), Error> {
                let h = h as usize;
                let source: &ImgVec<f32> = &src;
                let down = scaler.descale(source.as_ref(), target_width(ar, h), h)?;
                let up = scaler.upscale(down.as_ref(), display_w, src_h)?;
                let baseline: &ImgVec<f32> = &baseline;
                let error = clamped_mean_abs_error(baseline.as_ref(), up.as_ref())?;
                Ok((index, error))
            });

            while pending.len() >= cap {
                if let Some(done) = pending.join_next().await {
                    vals.push(done??);
                }
            }
        }

        while let Some(done) = pending.join_next().await {
            vals.push(done??);
        }
        debug!(candidates = vals.len(), "all candidates measured");

        // Completion order is arbitrary.
        vals.sort_by_key(|&(index, _)| index);
        let errors: Vec<f64> = vals.into_iter().map(|(_, e)| e).collect();
        let ratios = ratio_curve(&errors);
        let best = pick_candidates(&ratios)
            .into_iter()
            .map(|i| self.request.min_h + i as u32)
            .collect();

        let estimate = NativeEstimate {
            scaler,
            aspect_ratio: ar,
            min_h: self.request.min_h,
            errors,
            ratios,
            best,
        };
        info!("{}", estimate.best_guess());
        Ok(estimate)
    }
}
