use std::f64::consts::PI;

use crate::Error;

/// A resampling kernel, optionally parameterized.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Kernel {
    Bilinear,
    /// Mitchell-Netravali family.
    Bicubic {
        b: f64,
        c: f64,
    },
    Lanczos {
        taps: u32,
    },
    Spline16,
    Spline36,
}

/// Kernel names accepted by [`Kernel::from_name`].
pub const KERNEL_NAMES: &[&str] = &["bilinear", "bicubic", "lanczos", "spline16", "spline36"];

impl Kernel {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Bilinear => "bilinear",
            Self::Bicubic { .. } => "bicubic",
            Self::Lanczos { .. } => "lanczos",
            Self::Spline16 => "spline16",
            Self::Spline36 => "spline36",
        }
    }

    /// Build a kernel from its lowercase name. Shape parameters that do not
    /// apply to the named kernel are ignored.
    pub fn from_name(name: &str, b: f64, c: f64, taps: u32) -> Result<Self, Error> {
        let kernel = match name.to_lowercase().as_str() {
            "bilinear" => Self::Bilinear,
            "bicubic" => {
                if !b.is_finite() || !c.is_finite() {
                    return Err(Error::InvalidKernelParameter(format!("b={b}, c={c}")));
                }
                Self::Bicubic { b, c }
            }
            "lanczos" => {
                if taps == 0 {
                    return Err(Error::InvalidKernelParameter("taps must be at least 1".into()));
                }
                Self::Lanczos { taps }
            }
            "spline16" => Self::Spline16,
            "spline36" => Self::Spline36,
            _ => return Err(Error::UnknownKernel(name.to_string())),
        };
        Ok(kernel)
    }

    pub fn support(&self) -> f64 {
        match self {
            Self::Bilinear => 1.0,
            Self::Bicubic { .. } | Self::Spline16 => 2.0,
            Self::Lanczos { taps } => *taps as f64,
            Self::Spline36 => 3.0,
        }
    }

    pub fn evaluate(&self, x: f64) -> f64 {
        match self {
            Self::Bilinear => triangle(x),
            Self::Bicubic { b, c } => mitchell_netravali(x, *b, *c),
            Self::Lanczos { taps } => lanczos(x, *taps),
            Self::Spline16 => spline16(x),
            Self::Spline36 => spline36(x),
        }
    }
}

impl std::fmt::Display for Kernel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bicubic { b, c } => write!(f, "bicubic (b={b:.2}, c={c:.2})"),
            Self::Lanczos { taps } => write!(f, "lanczos ({taps} taps)"),
            other => f.write_str(other.name()),
        }
    }
}

fn sinc(x: f64) -> f64 {
    if x.abs() < 1e-10 {
        1.0
    } else {
        let px = PI * x;
        px.sin() / px
    }
}

fn triangle(x: f64) -> f64 {
    let ax = x.abs();
    if ax < 1.0 { 1.0 - ax } else { 0.0 }
}

fn mitchell_netravali(x: f64, b: f64, c: f64) -> f64 {
    let ax = x.abs();
    if ax < 1.0 {
        ((12.0 - 9.0 * b - 6.0 * c) * ax * ax * ax
            + (-18.0 + 12.0 * b + 6.0 * c) * ax * ax
            + (6.0 - 2.0 * b))
            / 6.0
    } else if ax < 2.0 {
        ((-b - 6.0 * c) * ax * ax * ax
            + (6.0 * b + 30.0 * c) * ax * ax
            + (-12.0 * b - 48.0 * c) * ax
            + (8.0 * b + 24.0 * c))
            / 6.0
    } else {
        0.0
    }
}

fn lanczos(x: f64, taps: u32) -> f64 {
    let ax = x.abs();
    if ax < taps as f64 {
        sinc(x) * sinc(x / taps as f64)
    } else {
        0.0
    }
}

fn spline16(x: f64) -> f64 {
    let ax = x.abs();
    if ax < 1.0 {
        ((ax - 9.0 / 5.0) * ax - 1.0 / 5.0) * ax + 1.0
    } else if ax < 2.0 {
        let t = ax - 1.0;
        ((-1.0 / 3.0 * t + 4.0 / 5.0) * t - 7.0 / 15.0) * t
    } else {
        0.0
    }
}

fn spline36(x: f64) -> f64 {
    let ax = x.abs();
    if ax < 1.0 {
        ((13.0 / 11.0 * ax - 453.0 / 209.0) * ax - 3.0 / 209.0) * ax + 1.0
    } else if ax < 2.0 {
        let t = ax - 1.0;
        ((-6.0 / 11.0 * t + 270.0 / 209.0) * t - 156.0 / 209.0) * t
    } else if ax < 3.0 {
        let t = ax - 2.0;
        ((1.0 / 11.0 * t - 45.0 / 209.0) * t + 26.0 / 209.0) * t
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: &[Kernel] = &[
        Kernel::Bilinear,
        Kernel::Bicubic { b: 0.0, c: 0.5 },
        Kernel::Bicubic {
            b: 1.0 / 3.0,
            c: 1.0 / 3.0,
        },
        Kernel::Lanczos { taps: 3 },
        Kernel::Lanczos { taps: 5 },
        Kernel::Spline16,
        Kernel::Spline36,
    ];

    #[test]
    fn interpolating_kernels_hit_one_at_zero() {
        for k in [
            Kernel::Bilinear,
            Kernel::Bicubic { b: 0.0, c: 0.5 },
            Kernel::Lanczos { taps: 4 },
            Kernel::Spline16,
            Kernel::Spline36,
        ] {
            let v = k.evaluate(0.0);
            assert!((v - 1.0).abs() < 1e-10, "{k}: f(0) = {v}");
        }
        // Mitchell is approximating.
        let m = Kernel::Bicubic {
            b: 1.0 / 3.0,
            c: 1.0 / 3.0,
        }
        .evaluate(0.0);
        assert!((m - 8.0 / 9.0).abs() < 1e-10, "Mitchell f(0) = {m}");
    }

    #[test]
    fn kernels_vanish_outside_support() {
        for k in ALL {
            let s = k.support();
            assert!(k.evaluate(s).abs() < 1e-10, "{k}: f({s}) = {}", k.evaluate(s));
            assert!(k.evaluate(s + 0.5).abs() < 1e-10, "{k}");
        }
    }

    #[test]
    fn splines_are_continuous_at_knots() {
        for x in [1.0_f64, 2.0] {
            let left = spline36(x - 1e-9);
            let right = spline36(x + 1e-9);
            assert!((left - right).abs() < 1e-6, "spline36 jumps at {x}");
        }
        let left = spline16(1.0 - 1e-9);
        let right = spline16(1.0 + 1e-9);
        assert!((left - right).abs() < 1e-6, "spline16 jumps at 1");
    }

    #[test]
    fn kernels_are_symmetric() {
        for k in ALL {
            for &x in &[0.3, 0.7, 1.5, 2.5] {
                assert!((k.evaluate(x) - k.evaluate(-x)).abs() < 1e-12, "{k} at {x}");
            }
        }
    }

    #[test]
    fn from_name_parses_known_kernels() {
        assert_eq!(
            Kernel::from_name("Bicubic", 0.0, 0.5, 3).unwrap(),
            Kernel::Bicubic { b: 0.0, c: 0.5 }
        );
        assert_eq!(
            Kernel::from_name("lanczos", 0.0, 0.0, 4).unwrap(),
            Kernel::Lanczos { taps: 4 }
        );
        assert_eq!(Kernel::from_name("spline36", 0.0, 0.0, 3).unwrap(), Kernel::Spline36);
        assert!(matches!(
            Kernel::from_name("point", 0.0, 0.0, 3),
            Err(Error::UnknownKernel(_))
        ));
        assert!(matches!(
            Kernel::from_name("lanczos", 0.0, 0.0, 0),
            Err(Error::InvalidKernelParameter(_))
        ));
    }
}
