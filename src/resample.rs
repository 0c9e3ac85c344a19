//! Separable resampling on `f32` planes.
//!
//! [`resize`] is a plain weighted-sum resize. [`descale`] is its inverse: it
//! finds the smaller image that [`resize`] would have turned into the source,
//! in the least-squares sense. When the source really was produced by
//! upscaling with the same kernel, descaling recovers it exactly (up to float
//! rounding) and upscaling again reproduces the source.

use imgref::{ImgRef, ImgVec};

use crate::Error;
use crate::kernel::Kernel;

/// A single weight entry: which source pixel contributes and by how much.
#[derive(Debug, Clone)]
pub struct WeightEntry {
    pub src_pixel: usize,
    pub weight: f64,
}

/// The computed weights for a single output pixel.
#[derive(Debug, Clone)]
pub struct PixelWeights {
    pub entries: Vec<WeightEntry>,
}

/// Reflect an out-of-range index back into `0..n` (half-sample symmetric).
fn mirror(i: isize, n: usize) -> usize {
    let n = n as isize;
    let period = 2 * n;
    let m = i.rem_euclid(period);
    if m >= n { (period - 1 - m) as usize } else { m as usize }
}

/// Compute the pixel weight table for a 1D resize operation.
///
/// Output pixel centres map to `(x + 0.5) * src / dst - 0.5` in source
/// coordinates. When shrinking, the kernel is widened by `src / dst`.
/// Out-of-bounds taps are mirrored back into the image and weights are
/// normalized to sum to one.
pub fn compute_weights(kernel: Kernel, src_size: usize, dst_size: usize) -> Vec<PixelWeights> {
    let scale = dst_size as f64 / src_size as f64;
    let filter_scale = if scale < 1.0 { 1.0 / scale } else { 1.0 };
    let support = kernel.support() * filter_scale;

    let mut result = Vec::with_capacity(dst_size);

    for dst_x in 0..dst_size {
        let center = (dst_x as f64 + 0.5) / scale - 0.5;

        let left = (center - support).ceil() as isize;
        let right = (center + support).floor() as isize;

        let mut entries: Vec<WeightEntry> = Vec::new();
        let mut total = 0.0;

        for src_x in left..=right {
            let distance = (src_x as f64 - center) / filter_scale;
            let w = kernel.evaluate(distance);
            if w.abs() <= 1e-12 {
                continue;
            }

            let mirrored = mirror(src_x, src_size);
            // Merge with an existing entry for the same mirrored pixel.
            if let Some(existing) = entries.iter_mut().find(|e| e.src_pixel == mirrored) {
                existing.weight += w;
            } else {
                entries.push(WeightEntry {
                    src_pixel: mirrored,
                    weight: w,
                });
            }
            total += w;
        }

        if total.abs() > 1e-12 {
            for e in &mut entries {
                e.weight /= total;
            }
        }

        result.push(PixelWeights { entries });
    }

    result
}

fn apply_weights(weights: &[PixelWeights], src: &[f32], dst: &mut [f32]) {
    for (out, pw) in dst.iter_mut().zip(weights) {
        let val: f64 = pw
            .entries
            .iter()
            .map(|e| src[e.src_pixel] as f64 * e.weight)
            .sum();
        *out = val as f32;
    }
}

fn check_target(width: usize, height: usize) -> Result<(), Error> {
    if width == 0 || height == 0 {
        return Err(Error::EmptyTarget { width, height });
    }
    Ok(())
}

fn to_vec(src: ImgRef<'_, f32>) -> ImgVec<f32> {
    let buf = src.rows().flat_map(|row| row.iter().copied()).collect();
    ImgVec::new(buf, src.width(), src.height())
}

/// Horizontal pass: apply `weights` to every row.
fn resize_rows(src: ImgRef<'_, f32>, weights: &[PixelWeights]) -> ImgVec<f32> {
    let dst_width = weights.len();
    let mut out = vec![0.0f32; dst_width * src.height()];
    for (row, dst_row) in src.rows().zip(out.chunks_exact_mut(dst_width)) {
        apply_weights(weights, row, dst_row);
    }
    ImgVec::new(out, dst_width, src.height())
}

/// Vertical pass: each output row is a weighted sum of source rows.
fn resize_columns(src: ImgRef<'_, f32>, weights: &[PixelWeights]) -> ImgVec<f32> {
    let width = src.width();
    let mut out = vec![0.0f32; width * weights.len()];
    let mut acc = vec![0.0f64; width];
    for (pw, dst_row) in weights.iter().zip(out.chunks_exact_mut(width)) {
        acc.iter_mut().for_each(|a| *a = 0.0);
        for e in &pw.entries {
            let row = &src.buf()[e.src_pixel * src.stride()..][..width];
            for (a, &v) in acc.iter_mut().zip(row) {
                *a += v as f64 * e.weight;
            }
        }
        for (d, a) in dst_row.iter_mut().zip(&acc) {
            *d = *a as f32;
        }
    }
    ImgVec::new(out, width, weights.len())
}

/// Resize a plane with `kernel`: horizontal pass then vertical pass.
///
/// An axis whose size does not change is passed through untouched.
pub fn resize(
    src: ImgRef<'_, f32>,
    dst_width: usize,
    dst_height: usize,
    kernel: Kernel,
) -> Result<ImgVec<f32>, Error> {
    check_target(dst_width, dst_height)?;

    let horizontal = if dst_width != src.width() {
        let weights = compute_weights(kernel, src.width(), dst_width);
        Some(resize_rows(src, &weights))
    } else {
        None
    };
    let temp = horizontal.as_ref().map(|img| img.as_ref()).unwrap_or(src);

    if dst_height == temp.height() {
        return Ok(horizontal.unwrap_or_else(|| to_vec(src)));
    }

    let weights = compute_weights(kernel, temp.height(), dst_height);
    Ok(resize_columns(temp, &weights))
}

/// Least-squares inverse of a 1D upscale from `dst` to `src` samples.
///
/// `A` is the `src x dst` upscale matrix. The normal equations `AᵀA x = Aᵀy`
/// are banded, so `AᵀA` is factored once with a banded Cholesky and reused
/// for every row or column.
struct Inverse1d {
    upscale: Vec<PixelWeights>,
    /// Row-major lower band, `factor[i * (bandwidth + 1) + (i - j)] = L[i][j]`.
    factor: Vec<f64>,
    bandwidth: usize,
    size: usize,
}

impl Inverse1d {
    fn new(kernel: Kernel, src_size: usize, dst_size: usize) -> Result<Self, Error> {
        let upscale = compute_weights(kernel, dst_size, src_size);

        let bandwidth = upscale
            .iter()
            .map(|pw| {
                let lo = pw.entries.iter().map(|e| e.src_pixel).min().unwrap_or(0);
                let hi = pw.entries.iter().map(|e| e.src_pixel).max().unwrap_or(0);
                hi - lo
            })
            .max()
            .unwrap_or(0);
        let stride = bandwidth + 1;

        // AᵀA, lower band only.
        let mut normal = vec![0.0f64; dst_size * stride];
        for pw in &upscale {
            for a in &pw.entries {
                for b in &pw.entries {
                    if a.src_pixel >= b.src_pixel {
                        let offset = a.src_pixel - b.src_pixel;
                        normal[a.src_pixel * stride + offset] += a.weight * b.weight;
                    }
                }
            }
        }

        let singular = Error::Singular {
            src: src_size,
            dst: dst_size,
        };
        let mut factor = vec![0.0f64; dst_size * stride];
        for i in 0..dst_size {
            let first = i.saturating_sub(bandwidth);
            for j in first..=i {
                let mut sum = normal[i * stride + (i - j)];
                for p in first.max(j.saturating_sub(bandwidth))..j {
                    sum -= factor[i * stride + (i - p)] * factor[j * stride + (j - p)];
                }
                if i == j {
                    if sum <= 1e-12 || !sum.is_finite() {
                        return Err(singular);
                    }
                    factor[i * stride] = sum.sqrt();
                } else {
                    factor[i * stride + (i - j)] = sum / factor[j * stride];
                }
            }
        }

        Ok(Self {
            upscale,
            factor,
            bandwidth,
            size: dst_size,
        })
    }

    /// Solve for the `dst`-sample signal whose upscale best matches `y`.
    fn solve(&self, y: &[f64], out: &mut [f64]) {
        let stride = self.bandwidth + 1;
        let n = self.size;

        // Aᵀy
        out.iter_mut().for_each(|v| *v = 0.0);
        for (pw, &yi) in self.upscale.iter().zip(y) {
            for e in &pw.entries {
                out[e.src_pixel] += e.weight * yi;
            }
        }

        // Forward substitution with L.
        for i in 0..n {
            let first = i.saturating_sub(self.bandwidth);
            let mut sum = out[i];
            for p in first..i {
                sum -= self.factor[i * stride + (i - p)] * out[p];
            }
            out[i] = sum / self.factor[i * stride];
        }

        // Back substitution with Lᵀ.
        for i in (0..n).rev() {
            let last = (i + self.bandwidth).min(n - 1);
            let mut sum = out[i];
            for q in i + 1..=last {
                sum -= self.factor[q * stride + (q - i)] * out[q];
            }
            out[i] = sum / self.factor[i * stride];
        }
    }
}

fn descale_rows(src: ImgRef<'_, f32>, inverse: &Inverse1d) -> ImgVec<f32> {
    let dst_width = inverse.size;
    let mut y = vec![0.0f64; src.width()];
    let mut x = vec![0.0f64; dst_width];
    let mut out = vec![0.0f32; dst_width * src.height()];
    for (row, dst_row) in src.rows().zip(out.chunks_exact_mut(dst_width)) {
        for (yi, &v) in y.iter_mut().zip(row) {
            *yi = v as f64;
        }
        inverse.solve(&y, &mut x);
        for (d, &v) in dst_row.iter_mut().zip(&x) {
            *d = v as f32;
        }
    }
    ImgVec::new(out, dst_width, src.height())
}

fn descale_columns(src: ImgRef<'_, f32>, inverse: &Inverse1d) -> ImgVec<f32> {
    let width = src.width();
    let dst_height = inverse.size;
    let mut y = vec![0.0f64; src.height()];
    let mut x = vec![0.0f64; dst_height];
    let mut out = vec![0.0f32; width * dst_height];
    for col in 0..width {
        for (row, yi) in y.iter_mut().enumerate() {
            *yi = src.buf()[row * src.stride() + col] as f64;
        }
        inverse.solve(&y, &mut x);
        for (row, &v) in x.iter().enumerate() {
            out[row * width + col] = v as f32;
        }
    }
    ImgVec::new(out, width, dst_height)
}

/// Undo an upscale made with `kernel`, producing a `dst_width x dst_height` plane.
///
/// Each shrinking axis is solved in the least-squares sense. An axis that
/// keeps its size is passed through. An axis that would grow cannot be
/// descaled and is resized with `kernel` instead.
pub fn descale(
    src: ImgRef<'_, f32>,
    dst_width: usize,
    dst_height: usize,
    kernel: Kernel,
) -> Result<ImgVec<f32>, Error> {
    check_target(dst_width, dst_height)?;

    let horizontal = if dst_width < src.width() {
        let inverse = Inverse1d::new(kernel, src.width(), dst_width)?;
        Some(descale_rows(src, &inverse))
    } else if dst_width > src.width() {
        Some(resize(src, dst_width, src.height(), kernel)?)
    } else {
        None
    };
    let temp = horizontal.as_ref().map(|img| img.as_ref()).unwrap_or(src);

    if dst_height < temp.height() {
        let inverse = Inverse1d::new(kernel, temp.height(), dst_height)?;
        Ok(descale_columns(temp, &inverse))
    } else if dst_height > temp.height() {
        resize(temp, dst_width, dst_height, kernel)
    } else {
        Ok(horizontal.unwrap_or_else(|| to_vec(src)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn textured(width: usize, height: usize) -> ImgVec<f32> {
        let buf = (0..width * height)
            .map(|i| {
                let (x, y) = ((i % width) as f32, (i / width) as f32);
                0.5 + 0.2 * (x * 0.9).sin() * (y * 0.7).cos() + 0.1 * ((x * 7.3 + y * 3.1).sin())
            })
            .collect();
        ImgVec::new(buf, width, height)
    }

    fn max_abs_diff(a: ImgRef<'_, f32>, b: ImgRef<'_, f32>) -> f32 {
        a.pixels()
            .zip(b.pixels())
            .map(|(x, y)| (x - y).abs())
            .fold(0.0, f32::max)
    }

    #[test]
    fn mirror_reflects_both_edges() {
        assert_eq!(mirror(-1, 5), 0);
        assert_eq!(mirror(-2, 5), 1);
        assert_eq!(mirror(5, 5), 4);
        assert_eq!(mirror(6, 5), 3);
        assert_eq!(mirror(2, 5), 2);
        // Supports wider than the image keep bouncing.
        assert_eq!(mirror(-7, 3), 0);
    }

    #[test]
    fn weights_sum_to_one() {
        let kernels = [
            Kernel::Bilinear,
            Kernel::Bicubic { b: 0.0, c: 0.5 },
            Kernel::Lanczos { taps: 3 },
            Kernel::Spline36,
        ];
        for kernel in kernels {
            for (src, dst) in [(15, 555), (557, 555), (1080, 720)] {
                for (i, pw) in compute_weights(kernel, src, dst).iter().enumerate() {
                    let sum: f64 = pw.entries.iter().map(|e| e.weight).sum();
                    assert!((sum - 1.0).abs() < 1e-9, "{kernel} {src}->{dst} px {i}: {sum}");
                    assert!(pw.entries.iter().all(|e| e.src_pixel < src));
                }
            }
        }
    }

    #[test]
    fn resize_preserves_uniform() {
        let src = ImgVec::new(vec![0.25f32; 40 * 30], 40, 30);
        let dst = resize(src.as_ref(), 64, 48, Kernel::Lanczos { taps: 3 }).unwrap();
        assert_eq!((dst.width(), dst.height()), (64, 48));
        for &v in dst.buf() {
            assert!((v - 0.25).abs() < 1e-6, "uniform image not preserved: {v}");
        }
    }

    #[test]
    fn resize_same_size_is_identity() {
        let src = textured(20, 10);
        let dst = resize(src.as_ref(), 20, 10, Kernel::Bicubic { b: 1.0, c: 0.0 }).unwrap();
        assert_eq!(dst.buf(), src.buf());
    }

    #[test]
    fn descale_inverts_upscale() {
        for kernel in [
            Kernel::Bilinear,
            Kernel::Bicubic {
                b: 1.0 / 3.0,
                c: 1.0 / 3.0,
            },
            Kernel::Lanczos { taps: 3 },
            Kernel::Spline16,
        ] {
            let native = textured(32, 24);
            let upscaled = resize(native.as_ref(), 48, 36, kernel).unwrap();
            let recovered = descale(upscaled.as_ref(), 32, 24, kernel).unwrap();
            let diff = max_abs_diff(native.as_ref(), recovered.as_ref());
            assert!(diff < 1e-4, "{kernel}: max diff {diff}");
        }
    }

    #[test]
    fn descale_wrong_height_loses_detail() {
        let kernel = Kernel::Bilinear;
        let native = textured(32, 24);
        let upscaled = resize(native.as_ref(), 48, 36, kernel).unwrap();
        let down = descale(upscaled.as_ref(), 32, 22, kernel).unwrap();
        let up = resize(down.as_ref(), 48, 36, kernel).unwrap();
        assert!(max_abs_diff(upscaled.as_ref(), up.as_ref()) > 1e-3);
    }

    #[test]
    fn descale_growing_axis_falls_back_to_resize() {
        let src = textured(20, 20);
        let kernel = Kernel::Spline36;
        let grown = descale(src.as_ref(), 24, 20, kernel).unwrap();
        let resized = resize(src.as_ref(), 24, 20, kernel).unwrap();
        assert_eq!(grown.buf(), resized.buf());
    }

    #[test]
    fn empty_target_is_rejected() {
        let src = textured(8, 8);
        assert!(matches!(
            descale(src.as_ref(), 0, 4, Kernel::Bilinear),
            Err(Error::EmptyTarget { .. })
        ));
        assert!(matches!(
            resize(src.as_ref(), 4, 0, Kernel::Bilinear),
            Err(Error::EmptyTarget { .. })
        ));
    }
}
