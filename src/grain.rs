//! Randomized film grain.

use imgref::{ImgRef, ImgVec};
use rand::Rng;
use rand_distr::{Distribution, StandardNormal};
use rgb::RGB8;

/// Parameters of one grain pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GrainParams {
    /// Noise variance in 8-bit units.
    pub var: u32,
    /// Correlation between horizontal neighbours, `0..=1`.
    pub hcorr: f64,
    /// Correlation between vertical neighbours, `0..=1`.
    pub vcorr: f64,
}

impl GrainParams {
    pub const VAR_RANGE: std::ops::RangeInclusive<u32> = 100..=2000;

    /// Draw `var` uniformly from [`Self::VAR_RANGE`] and both correlations
    /// uniformly from `[0, 1]`.
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self {
            var: rng.gen_range(Self::VAR_RANGE),
            hcorr: rng.gen_range(0.0..=1.0),
            vcorr: rng.gen_range(0.0..=1.0),
        }
    }
}

impl std::fmt::Display for GrainParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "var: {}, hcorr: {}, vcorr: {}",
            self.var, self.hcorr, self.vcorr
        )
    }
}

/// Gaussian noise with variance `params.var`, correlated along rows by
/// `hcorr` and along columns by `vcorr`.
///
/// Each pass is a first-order recursive filter `n[i] = a * n[i-1] + sqrt(1 - a²) * x[i]`,
/// which keeps the variance unchanged.
pub fn noise_field<R: Rng + ?Sized>(
    width: usize,
    height: usize,
    params: GrainParams,
    rng: &mut R,
) -> Vec<f64> {
    if width == 0 || height == 0 {
        return Vec::new();
    }
    let sigma = (params.var as f64).sqrt();
    let mut field: Vec<f64> = (0..width * height)
        .map(|_| {
            let z: f64 = StandardNormal.sample(rng);
            z * sigma
        })
        .collect();

    let (a, gain_h) = (params.hcorr, (1.0 - params.hcorr * params.hcorr).sqrt());
    for row in field.chunks_exact_mut(width) {
        for x in 1..width {
            row[x] = a * row[x - 1] + gain_h * row[x];
        }
    }

    let (b, gain_v) = (params.vcorr, (1.0 - params.vcorr * params.vcorr).sqrt());
    for y in 1..height {
        for x in 0..width {
            let above = field[(y - 1) * width + x];
            let cur = &mut field[y * width + x];
            *cur = b * above + gain_v * *cur;
        }
    }

    field
}

/// Add grain to an 8-bit RGB image. The same noise is added to every channel.
pub fn add_grain<R: Rng + ?Sized>(
    src: ImgRef<'_, RGB8>,
    params: GrainParams,
    rng: &mut R,
) -> ImgVec<RGB8> {
    let noise = noise_field(src.width(), src.height(), params, rng);
    let apply = |v: u8, n: f64| (v as f64 + n).round().clamp(0.0, 255.0) as u8;
    let buf = src
        .pixels()
        .zip(noise)
        .map(|(p, n)| RGB8::new(apply(p.r, n), apply(p.g, n), apply(p.b, n)))
        .collect();
    ImgVec::new(buf, src.width(), src.height())
}

/// Convert a decoded image to the RGB buffer [`add_grain`] works on.
pub fn to_rgb8(img: &image::DynamicImage) -> ImgVec<RGB8> {
    let rgb = img.to_rgb8();
    let (w, h) = (rgb.width() as usize, rgb.height() as usize);
    let buf = rgb
        .into_raw()
        .chunks_exact(3)
        .map(|px| RGB8::new(px[0], px[1], px[2]))
        .collect();
    ImgVec::new(buf, w, h)
}
