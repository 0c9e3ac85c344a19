use imgref::{ImgRef, ImgVec};

use crate::Error;
use crate::kernel::Kernel;
use crate::resample;

/// A kernel paired with its descale and upscale operators.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scaler {
    pub kernel: Kernel,
}

impl Scaler {
    pub const fn new(kernel: Kernel) -> Self {
        Self { kernel }
    }

    pub fn descale(
        &self,
        src: ImgRef<'_, f32>,
        width: usize,
        height: usize,
    ) -> Result<ImgVec<f32>, Error> {
        resample::descale(src, width, height, self.kernel)
    }

    pub fn upscale(
        &self,
        src: ImgRef<'_, f32>,
        width: usize,
        height: usize,
    ) -> Result<ImgVec<f32>, Error> {
        resample::resize(src, width, height, self.kernel)
    }
}

impl Default for Scaler {
    fn default() -> Self {
        REGISTRY[1].scaler
    }
}

/// A registry entry: display name and scaler.
#[derive(Debug, Clone, Copy)]
pub struct NamedScaler {
    pub name: &'static str,
    pub scaler: Scaler,
}

pub const DEFAULT_SCALER: &str = "Bicubic (b=1/3, c=1/3)";

const fn bicubic(name: &'static str, b: f64, c: f64) -> NamedScaler {
    NamedScaler {
        name,
        scaler: Scaler::new(Kernel::Bicubic { b, c }),
    }
}

const fn named(name: &'static str, kernel: Kernel) -> NamedScaler {
    NamedScaler {
        name,
        scaler: Scaler::new(kernel),
    }
}

static REGISTRY: [NamedScaler; 12] = [
    named("Bilinear", Kernel::Bilinear),
    bicubic(DEFAULT_SCALER, 1.0 / 3.0, 1.0 / 3.0),
    bicubic("Bicubic (b=0.5, c=0)", 0.5, 0.0),
    bicubic("Bicubic (b=0, c=0.5)", 0.0, 0.5),
    bicubic("Bicubic (b=1, c=0)", 1.0, 0.0),
    bicubic("Bicubic (b=0, c=1)", 0.0, 1.0),
    bicubic("Bicubic (b=0.2, c=0.5)", 0.2, 0.5),
    named("Lanczos (3 Taps)", Kernel::Lanczos { taps: 3 }),
    named("Lanczos (4 Taps)", Kernel::Lanczos { taps: 4 }),
    named("Lanczos (5 Taps)", Kernel::Lanczos { taps: 5 }),
    named("Spline16", Kernel::Spline16),
    named("Spline36", Kernel::Spline36),
];

/// All registered scalers, in display order.
pub fn registry() -> &'static [NamedScaler] {
    &REGISTRY
}

pub fn by_name(name: &str) -> Option<&'static NamedScaler> {
    REGISTRY.iter().find(|s| s.name == name)
}

/// The registry listing shown by `showscaler`.
pub fn names() -> String {
    REGISTRY
        .iter()
        .map(|s| s.name)
        .collect::<Vec<_>>()
        .join(",\n")
}
