//! Error-versus-height plot, drawn straight into an RGB buffer.

use imgref::ImgVec;
use rgb::RGB8;

const WIDTH: usize = 800;
const HEIGHT: usize = 500;
const LEFT: f64 = 70.0;
const RIGHT: f64 = 30.0;
const TOP: f64 = 30.0;
const BOTTOM: f64 = 50.0;

const BACKGROUND: RGB8 = RGB8 { r: 0, g: 0, b: 0 };
const FOREGROUND: RGB8 = RGB8 {
    r: 255,
    g: 255,
    b: 255,
};
const GRID_GRAY: RGB8 = RGB8 {
    r: 64,
    g: 64,
    b: 64,
};
const AXIS_GRAY: RGB8 = RGB8 {
    r: 160,
    g: 160,
    b: 160,
};
const MARK_RED: RGB8 = RGB8 {
    r: 224,
    g: 64,
    b: 64,
};

/// Maps data coordinates (height, log10 error) to pixels.
struct Axes {
    x_min: f64,
    x_max: f64,
    y_min: f64,
    y_max: f64,
}

impl Axes {
    fn new(x_min: f64, x_max: f64, log_errors: impl Iterator<Item = f64>) -> Self {
        let (lo, hi) = log_errors.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });
        let (y_min, y_max) = if lo.is_finite() {
            (lo.floor(), hi.ceil().max(lo.floor() + 1.0))
        } else {
            (-6.0, 0.0)
        };
        let x_max = if x_max > x_min { x_max } else { x_min + 1.0 };
        Self {
            x_min,
            x_max,
            y_min,
            y_max,
        }
    }

    fn xcoord(&self, x: f64) -> i32 {
        let plot_w = WIDTH as f64 - LEFT - RIGHT;
        (0.5 + LEFT + (x - self.x_min) / (self.x_max - self.x_min) * plot_w).floor() as i32
    }

    fn ycoord(&self, log_y: f64) -> i32 {
        let plot_h = HEIGHT as f64 - TOP - BOTTOM;
        (0.5 + TOP + (self.y_max - log_y) / (self.y_max - self.y_min) * plot_h).floor() as i32
    }
}

fn set_pixel(buf: &mut [RGB8], x: i32, y: i32, color: RGB8) {
    if x >= 0 && x < WIDTH as i32 && y >= 0 && y < HEIGHT as i32 {
        buf[y as usize * WIDTH + x as usize] = color;
    }
}

/// Bresenham line; `dash` draws 4 on, 4 off.
fn draw_line(buf: &mut [RGB8], x0: i32, y0: i32, x1: i32, y1: i32, color: RGB8, dash: bool) {
    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx: i32 = if x0 < x1 { 1 } else { -1 };
    let sy: i32 = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;
    let mut x = x0;
    let mut y = y0;
    let mut step = 0u32;

    loop {
        if !dash || step % 8 < 4 {
            set_pixel(buf, x, y, color);
        }
        step += 1;
        if x == x1 && y == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            if x == x1 {
                break;
            }
            err += dy;
            x += sx;
        }
        if e2 <= dx {
            if y == y1 {
                break;
            }
            err += dx;
            y += sy;
        }
    }
}

fn draw_marker(buf: &mut [RGB8], x: i32, y: i32, color: RGB8) {
    for dy in -1..=1 {
        for dx in -1..=1 {
            set_pixel(buf, x + dx, y + dy, color);
        }
    }
}

/// Tick spacing giving roughly ten ticks over `span`.
fn tick_step(span: f64) -> f64 {
    let raw = (span / 10.0).max(1.0);
    let magnitude = 10f64.powf(raw.log10().floor());
    [1.0, 2.0, 5.0, 10.0]
        .into_iter()
        .map(|m| m * magnitude)
        .find(|&s| s >= raw)
        .unwrap_or(10.0 * magnitude)
}

fn draw_frame(buf: &mut [RGB8], axes: &Axes) {
    let (left, right) = (axes.xcoord(axes.x_min), axes.xcoord(axes.x_max));
    let (top, bottom) = (axes.ycoord(axes.y_max), axes.ycoord(axes.y_min));

    // Decades on the log axis, with minor ticks at 2..9.
    let mut decade = axes.y_min;
    while decade <= axes.y_max {
        let y = axes.ycoord(decade);
        draw_line(buf, left, y, right, y, GRID_GRAY, true);
        draw_line(buf, left - 6, y, left, y, AXIS_GRAY, false);
        if decade < axes.y_max {
            for m in 2..10 {
                let ym = axes.ycoord(decade + (m as f64).log10());
                draw_line(buf, left - 3, ym, left, ym, AXIS_GRAY, false);
            }
        }
        decade += 1.0;
    }

    let step = tick_step(axes.x_max - axes.x_min);
    let mut tick = (axes.x_min / step).ceil() * step;
    while tick <= axes.x_max {
        let x = axes.xcoord(tick);
        draw_line(buf, x, top, x, bottom, GRID_GRAY, true);
        draw_line(buf, x, bottom, x, bottom + 6, AXIS_GRAY, false);
        tick += step;
    }

    draw_line(buf, left, top, left, bottom, AXIS_GRAY, false);
    draw_line(buf, left, bottom, right, bottom, AXIS_GRAY, false);
    draw_line(buf, left, top, right, top, AXIS_GRAY, false);
    draw_line(buf, right, top, right, bottom, AXIS_GRAY, false);
}

/// Render `errors` (one per height from `min_h`) on a log-scaled error axis.
///
/// Non-positive errors cannot be placed on a log axis; they are skipped and
/// break the connecting line. Heights in `marks` get a red vertical line.
pub fn render(min_h: u32, errors: &[f64], marks: &[u32]) -> ImgVec<RGB8> {
    let mut buf = vec![BACKGROUND; WIDTH * HEIGHT];

    let x_min = min_h as f64;
    let x_max = x_min + errors.len().saturating_sub(1) as f64;
    let axes = Axes::new(
        x_min,
        x_max,
        errors.iter().filter(|&&e| e > 0.0).map(|e| e.log10()),
    );

    draw_frame(&mut buf, &axes);

    for &h in marks {
        let x = axes.xcoord(h as f64);
        let (top, bottom) = (axes.ycoord(axes.y_max), axes.ycoord(axes.y_min));
        draw_line(&mut buf, x, top, x, bottom, MARK_RED, false);
    }

    let mut last: Option<(i32, i32)> = None;
    for (i, &e) in errors.iter().enumerate() {
        if e <= 0.0 || !e.is_finite() {
            last = None;
            continue;
        }
        let px = axes.xcoord(x_min + i as f64);
        let py = axes.ycoord(e.log10());
        if let Some((lx, ly)) = last {
            draw_line(&mut buf, lx, ly, px, py, FOREGROUND, false);
        }
        draw_marker(&mut buf, px, py, FOREGROUND);
        last = Some((px, py));
    }

    ImgVec::new(buf, WIDTH, HEIGHT)
}
