//! Artifacts written to a caller-owned scratch directory.

use std::fmt::Write as _;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use imgref::{ImgRef, ImgVec};
use rgb::RGB8;

use crate::Error;
use crate::estimate::NativeEstimate;
use crate::graph;
use crate::kernel::Kernel;

/// The plain-text report for an estimate.
pub fn render_text(estimate: &NativeEstimate) -> String {
    let kernel = estimate.scaler.kernel;
    let mut out = format!("Resize Kernel: {}\n", kernel.name());
    if let Kernel::Bicubic { b, c } = kernel {
        let _ = write!(out, "Scaling parameters:\nb = {b:.2}\nc = {c:.2}\n");
    }
    let _ = write!(
        out,
        "{}\nPlease check the graph manually for more accurate results\n\n",
        estimate.best_guess()
    );

    out.push_str("Raw data:\nResolution\t | Relative Error\t | Relative difference from last\n");
    for (h, error, ratio) in estimate.rows() {
        let _ = writeln!(out, "{h:4}\t\t | {error:.10}\t\t\t | {ratio:.2}");
    }
    out
}

/// One-paragraph summary of the run for the requesting user.
pub fn render_summary(estimate: &NativeEstimate) -> String {
    let kernel = estimate.scaler.kernel;
    let mut out = format!(
        "Output:\nKernel: {} AR: {:.2} ",
        kernel.name(),
        estimate.aspect_ratio
    );
    match kernel {
        Kernel::Bicubic { b, c } => {
            let _ = write!(out, "B: {b:.2} C: {c:.2} ");
        }
        Kernel::Lanczos { taps } => {
            let _ = write!(out, "Taps: {taps} ");
        }
        _ => {}
    }
    let _ = write!(out, "\n{}", estimate.best_guess());
    out
}

/// Write `<dir>/<filename>.txt`.
pub fn write_report(dir: &Path, filename: &str, estimate: &NativeEstimate) -> Result<PathBuf, Error> {
    let path = dir.join(format!("{filename}.txt"));
    fs::write(&path, render_text(estimate))?;
    Ok(path)
}

/// Write `<dir>/<filename>.png`, the error curve on a log scale.
pub fn write_plot(dir: &Path, filename: &str, estimate: &NativeEstimate) -> Result<PathBuf, Error> {
    let path = dir.join(format!("{filename}.png"));
    let img = graph::render(estimate.min_h, &estimate.errors, &estimate.best);
    write_rgb_png(&path, &img)?;
    Ok(path)
}

pub fn write_rgb_png(path: &Path, img: &ImgVec<RGB8>) -> Result<(), Error> {
    let file = BufWriter::new(File::create(path)?);
    let mut encoder = png::Encoder::new(file, img.width() as u32, img.height() as u32);
    encoder.set_color(png::ColorType::Rgb);
    encoder.set_depth(png::BitDepth::Eight);
    let mut writer = encoder.write_header()?;
    let raw: Vec<u8> = img.pixels().flat_map(|p| [p.r, p.g, p.b]).collect();
    writer.write_image_data(&raw)?;
    writer.finish()?;
    Ok(())
}

/// Write a `[0, 1]` float plane as a 16-bit grayscale PNG.
pub fn write_gray16_png(path: &Path, img: ImgRef<'_, f32>) -> Result<(), Error> {
    let file = BufWriter::new(File::create(path)?);
    let mut encoder = png::Encoder::new(file, img.width() as u32, img.height() as u32);
    encoder.set_color(png::ColorType::Grayscale);
    encoder.set_depth(png::BitDepth::Sixteen);
    let mut writer = encoder.write_header()?;
    let raw: Vec<u8> = img
        .pixels()
        .flat_map(|v| ((v.clamp(0.0, 1.0) * 65535.0).round() as u16).to_be_bytes())
        .collect();
    writer.write_image_data(&raw)?;
    writer.finish()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scaler::Scaler;

    fn estimate(kernel: Kernel) -> NativeEstimate {
        NativeEstimate {
            scaler: Scaler::new(kernel),
            aspect_ratio: 16.0 / 9.0,
            min_h: 718,
            errors: vec![0.002, 0.0015, 0.0000001, 0.001],
            ratios: vec![0.0, 2.0 / 1.5, 15000.0, 0.0001],
            best: vec![720],
        }
    }

    #[test]
    fn text_report_layout() {
        let text = render_text(&estimate(Kernel::Bicubic {
            b: 1.0 / 3.0,
            c: 1.0 / 3.0,
        }));
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Resize Kernel: bicubic");
        assert_eq!(lines[1], "Scaling parameters:");
        assert_eq!(lines[2], "b = 0.33");
        assert_eq!(lines[3], "c = 0.33");
        assert_eq!(lines[4], "Native resolution(s) (best guess): 720p");
        assert_eq!(lines[8], "Resolution\t | Relative Error\t | Relative difference from last");
        assert_eq!(lines[9], " 718\t\t | 0.0020000000\t\t\t | 0.00");
        assert_eq!(lines[10], " 719\t\t | 0.0015000000\t\t\t | 1.33");
        assert_eq!(lines[11], " 720\t\t | 0.0000001000\t\t\t | 15000.00");
        assert_eq!(lines.len(), 13);
    }

    #[test]
    fn text_report_without_bicubic_parameters() {
        let text = render_text(&estimate(Kernel::Spline36));
        assert!(text.starts_with("Resize Kernel: spline36\nNative resolution(s)"));
    }

    #[test]
    fn summary_lists_kernel_parameters() {
        let s = render_summary(&estimate(Kernel::Lanczos { taps: 4 }));
        assert_eq!(
            s,
            "Output:\nKernel: lanczos AR: 1.78 Taps: 4 \nNative resolution(s) (best guess): 720p"
        );
        let s = render_summary(&estimate(Kernel::Bicubic { b: 0.0, c: 0.5 }));
        assert!(s.contains("B: 0.00 C: 0.50 "));
    }

    #[test]
    fn artifacts_are_named_after_the_input() {
        let dir = tempfile::tempdir().unwrap();
        let est = estimate(Kernel::Bilinear);
        let txt = write_report(dir.path(), "shot.png", &est).unwrap();
        let plot = write_plot(dir.path(), "shot.png", &est).unwrap();
        assert_eq!(txt, dir.path().join("shot.png.txt"));
        assert_eq!(plot, dir.path().join("shot.png.png"));
        assert!(fs::read_to_string(&txt).unwrap().contains("Raw data:"));

        let decoded = image::open(&plot).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (800, 500));
    }

    #[test]
    fn gray16_round_trips_through_image() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preview.png");
        let plane = ImgVec::new(vec![0.0f32, 0.5, 1.0, 2.0], 2, 2);
        write_gray16_png(&path, plane.as_ref()).unwrap();
        let decoded = image::open(&path).unwrap().to_luma16();
        assert_eq!(decoded.into_raw(), vec![0, 32768, 65535, 65535]);
    }
}
