//! The user-facing commands: `getnative`, `getscaler`, `grain`, `showscaler`.
//!
//! Each run checks its arguments, takes a cooldown marker for the requesting
//! user, fetches the image into a fresh scratch directory, computes, and
//! hands back a [`CommandOutput`] that owns the directory. The marker stays
//! whether or not the run succeeds. Processing errors
//! are logged and replaced by a generic message; input errors are reported
//! as is.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use rand::SeedableRng;
use rand::rngs::StdRng;
use tempfile::TempDir;
use tracing::{error, info};

use crate::compare::{DEFAULT_NATIVE_HEIGHT, compare_scalers};
use crate::cooldown::{Cooldown, DEFAULT_WINDOW};
use crate::estimate::{EstimateRequest, NativeEstimator};
use crate::grain::{GrainParams, add_grain, to_rgb8};
use crate::kernel::Kernel;
use crate::scaler::{self, DEFAULT_SCALER, Scaler};
use crate::{Error, fetch, luma, report};

/// Runtime settings shared by all commands.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Window between two runs of one command by the same user.
    pub cooldown: Duration,
    /// Largest accepted `width * height`.
    pub max_pixels: u64,
    /// Extensions refused by `getnative` and `getscaler`.
    pub lossy_extensions: Vec<String>,
    /// Worker count the estimator's in-flight cap is derived from.
    pub worker_threads: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            cooldown: DEFAULT_WINDOW,
            max_pixels: 8_300_000,
            lossy_extensions: ["jpg", "jpeg", "gif"].map(String::from).to_vec(),
            worker_threads: num_cpus::get(),
        }
    }
}

/// Where the image comes from and what it is called.
#[derive(Debug, Clone)]
pub struct Attachment {
    /// URL or local path.
    pub source: String,
    pub filename: String,
}

impl Attachment {
    pub fn new(source: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            filename: filename.into(),
        }
    }

    /// Use the last path component of `source` as the file name.
    pub fn from_source(source: impl Into<String>) -> Self {
        let source = source.into();
        let filename = source
            .rsplit(['/', '\\'])
            .next()
            .and_then(|s| s.split(['?', '#']).next())
            .filter(|s| !s.is_empty())
            .unwrap_or("image.png")
            .to_string();
        Self { source, filename }
    }

    fn extension(&self) -> String {
        Path::new(&self.filename)
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default()
    }
}

/// Arguments of `getnative`.
#[derive(Debug, Clone)]
pub struct GetNativeArgs {
    /// Forced aspect ratio; `None` or `0` derives it from the image.
    pub aspect_ratio: Option<f64>,
    pub min_h: u32,
    pub max_h: u32,
    /// Registry name, used unless `kernel` is set.
    pub scaler: String,
    pub kernel: Option<String>,
    pub b: f64,
    pub c: f64,
    pub taps: u32,
}

impl Default for GetNativeArgs {
    fn default() -> Self {
        Self {
            aspect_ratio: None,
            min_h: 500,
            max_h: 1000,
            scaler: DEFAULT_SCALER.to_string(),
            kernel: None,
            b: 1.0 / 3.0,
            c: 1.0 / 3.0,
            taps: 3,
        }
    }
}

impl GetNativeArgs {
    /// The scaler to run: an explicit kernel wins over the registry name.
    pub fn resolve_scaler(&self) -> Result<Scaler, Error> {
        match &self.kernel {
            Some(kernel) => Ok(Scaler::new(Kernel::from_name(
                kernel, self.b, self.c, self.taps,
            )?)),
            None => scaler::by_name(&self.scaler)
                .map(|s| s.scaler)
                .ok_or_else(|| Error::UnknownScaler(self.scaler.clone())),
        }
    }
}

/// A user-facing refusal or failure message.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct Rejected(pub String);

/// Result of a successful command run.
///
/// Owns the scratch directory holding the artifacts; dropping the output or
/// calling [`cleanup`](Self::cleanup) removes it.
#[derive(Debug)]
pub struct CommandOutput {
    scratch: TempDir,
    pub message: String,
    /// Artifacts inside the scratch directory, in delivery order.
    pub files: Vec<PathBuf>,
}

impl CommandOutput {
    pub fn dir(&self) -> &Path {
        self.scratch.path()
    }

    pub fn cleanup(self) -> std::io::Result<()> {
        self.scratch.close()
    }
}

/// Parse a decimal or a fraction such as `1/3`.
pub fn parse_fraction(s: &str) -> Result<f64, Error> {
    let invalid = || Error::InvalidNumber(s.to_string());
    if s.is_empty() || !s.chars().all(|c| c.is_ascii_digit() || c == '.' || c == '/') {
        return Err(invalid());
    }
    let mut parts = s.split('/').map(|p| p.parse::<f64>().map_err(|_| invalid()));
    let first = parts.next().ok_or_else(invalid)??;
    parts.try_fold(first, |acc, p| {
        let d = p?;
        if d == 0.0 { Err(invalid()) } else { Ok(acc / d) }
    })
}

/// Command service: settings, per-command cooldowns and the HTTP client.
#[derive(Debug)]
pub struct Commands {
    settings: Settings,
    client: reqwest::Client,
    getnative_cooldown: Cooldown<u64>,
    getscaler_cooldown: Cooldown<u64>,
    grain_cooldown: Cooldown<u64>,
}

impl Commands {
    pub fn new(settings: Settings) -> Self {
        let window = settings.cooldown;
        Self {
            settings,
            client: reqwest::Client::new(),
            getnative_cooldown: Cooldown::new(window),
            getscaler_cooldown: Cooldown::new(window),
            grain_cooldown: Cooldown::new(window),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// The registry listing.
    pub fn showscaler(&self) -> String {
        scaler::names()
    }

    pub async fn getnative(
        &self,
        user: u64,
        attachment: &Attachment,
        args: GetNativeArgs,
    ) -> Result<CommandOutput, Rejected> {
        self.run_getnative(user, attachment, args)
            .await
            .map_err(|e| reject("getnative", e))
    }

    pub async fn getscaler(
        &self,
        user: u64,
        attachment: &Attachment,
        native_height: Option<u32>,
    ) -> Result<CommandOutput, Rejected> {
        let native_height = native_height.unwrap_or(DEFAULT_NATIVE_HEIGHT);
        self.run_getscaler(user, attachment, native_height)
            .await
            .map_err(|e| reject("getscaler", e))
    }

    pub async fn grain(
        &self,
        user: u64,
        attachment: &Attachment,
    ) -> Result<CommandOutput, Rejected> {
        self.run_grain(user, attachment)
            .await
            .map_err(|e| reject("grain", e))
    }

    fn check_lossy(&self, attachment: &Attachment) -> Result<(), Error> {
        let ext = attachment.extension();
        if self.settings.lossy_extensions.iter().any(|l| *l == ext) {
            return Err(Error::LossyFormat(self.settings.lossy_extensions.join(", ")));
        }
        Ok(())
    }

    fn check_cooldown(cooldown: &Cooldown<u64>, user: u64) -> Result<(), Error> {
        match cooldown.remaining(&user) {
            Some(remaining) => Err(Error::Cooldown {
                remaining,
                window: cooldown.window(),
            }),
            None => Ok(()),
        }
    }

    fn acquire(cooldown: &Cooldown<u64>, user: u64) -> Result<(), Error> {
        cooldown
            .try_acquire(user)
            .map_err(|remaining| Error::Cooldown {
                remaining,
                window: cooldown.window(),
            })
    }

    /// Fetch into a fresh scratch directory and read the image size.
    async fn fetch_checked(
        &self,
        attachment: &Attachment,
    ) -> Result<(TempDir, PathBuf, u32, u32), Error> {
        let scratch = tempfile::Builder::new().prefix("getnative-").tempdir()?;
        let path = fetch::fetch(
            &self.client,
            &attachment.source,
            scratch.path(),
            &attachment.filename,
        )
        .await?;
        let probe = path.clone();
        let (width, height) =
            tokio::task::spawn_blocking(move || image::image_dimensions(&probe)).await??;
        let pixels = width as u64 * height as u64;
        if pixels > self.settings.max_pixels {
            return Err(Error::TooBig {
                pixels,
                max: self.settings.max_pixels,
            });
        }
        Ok((scratch, path, width, height))
    }

    async fn run_getnative(
        &self,
        user: u64,
        attachment: &Attachment,
        args: GetNativeArgs,
    ) -> Result<CommandOutput, Error> {
        Self::check_cooldown(&self.getnative_cooldown, user)?;
        self.check_lossy(attachment)?;
        let scaler = args.resolve_scaler()?;

        Self::acquire(&self.getnative_cooldown, user)?;
        info!(user, file = %attachment.filename, "getnative started");

        let (scratch, path, _, height) = self.fetch_checked(attachment).await?;
        let mut request = EstimateRequest {
            scaler,
            aspect_ratio: args.aspect_ratio.filter(|&ar| ar != 0.0),
            min_h: args.min_h,
            max_h: args.max_h,
        };
        let clamped = request.fit_to_height(height)?;

        let src = Arc::new(load_luma_blocking(path.clone()).await?);
        let estimator = NativeEstimator::new(request).with_worker_threads(self.settings.worker_threads);
        let estimate = estimator.run(src).await?;

        let dir = scratch.path().to_path_buf();
        let filename = attachment.filename.clone();
        let (txt, plot, estimate) = tokio::task::spawn_blocking(move || -> Result<_, Error> {
            let txt = report::write_report(&dir, &filename, &estimate)?;
            let plot = report::write_plot(&dir, &filename, &estimate)?;
            Ok((txt, plot, estimate))
        })
        .await??;

        let mut message = String::new();
        if clamped {
            message.push_str(&format!(
                "Your max height can't be bigger than your image dimensions. New max height is {height}\n"
            ));
        }
        message.push_str(&report::render_summary(&estimate));

        Ok(CommandOutput {
            scratch,
            message,
            files: vec![txt, path, plot],
        })
    }

    async fn run_getscaler(
        &self,
        user: u64,
        attachment: &Attachment,
        native_height: u32,
    ) -> Result<CommandOutput, Error> {
        Self::check_cooldown(&self.getscaler_cooldown, user)?;
        self.check_lossy(attachment)?;

        Self::acquire(&self.getscaler_cooldown, user)?;
        info!(user, native_height, file = %attachment.filename, "getscaler started");
        let (scratch, path, _, _) = self.fetch_checked(attachment).await?;

        let src = load_luma_blocking(path.clone()).await?;
        let preview_path = scratch
            .path()
            .join(format!("{}_source0.png", attachment.filename));
        let preview_dest = preview_path.clone();
        let ranking = tokio::task::spawn_blocking(move || -> Result<_, Error> {
            let ranking = compare_scalers(src.as_ref(), native_height)?;
            if let Some(preview) = ranking.best_preview(src.as_ref())? {
                report::write_gray16_png(&preview_dest, preview.as_ref())?;
            }
            Ok(ranking)
        })
        .await??;

        Ok(CommandOutput {
            scratch,
            message: ranking.summary(),
            files: vec![path, preview_path],
        })
    }

    async fn run_grain(&self, user: u64, attachment: &Attachment) -> Result<CommandOutput, Error> {
        Self::check_cooldown(&self.grain_cooldown, user)?;
        Self::acquire(&self.grain_cooldown, user)?;

        let (scratch, path, _, _) = self.fetch_checked(attachment).await?;

        let out_path = scratch
            .path()
            .join(format!("{}_grain0.png", attachment.filename));
        let dest = out_path.clone();
        let params = tokio::task::spawn_blocking(move || -> Result<_, Error> {
            let mut rng = StdRng::from_entropy();
            let params = GrainParams::random(&mut rng);
            let src = to_rgb8(&image::open(&path)?);
            let grained = add_grain(src.as_ref(), params, &mut rng);
            report::write_rgb_png(&dest, &grained)?;
            Ok(params)
        })
        .await??;
        info!(user, %params, "grain applied");

        Ok(CommandOutput {
            scratch,
            message: params.to_string(),
            files: vec![out_path],
        })
    }
}

impl Default for Commands {
    fn default() -> Self {
        Self::new(Settings::default())
    }
}

async fn load_luma_blocking(path: PathBuf) -> Result<imgref::ImgVec<f32>, Error> {
    tokio::task::spawn_blocking(move || luma::load_luma(&path)).await?
}

fn reject(command: &str, err: Error) -> Rejected {
    match err.user_message() {
        Some(msg) => {
            info!(command, %err, "request rejected");
            Rejected(msg)
        }
        None => {
            error!(command, %err, "Error in {command}");
            Rejected(format!("Error in {command}, can't process your picture."))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_fraction_accepts_decimals_and_fractions() {
        assert_eq!(parse_fraction("0.5").unwrap(), 0.5);
        assert!((parse_fraction("1/3").unwrap() - 1.0 / 3.0).abs() < 1e-12);
        assert!((parse_fraction("16/9").unwrap() - 16.0 / 9.0).abs() < 1e-12);
        assert_eq!(parse_fraction("8/2/2").unwrap(), 2.0);
    }

    #[test]
    fn parse_fraction_rejects_garbage() {
        for bad in ["", "-1", "1e3", "1/0", "1//2", "/", "abc", "1/3)"] {
            assert!(
                matches!(parse_fraction(bad), Err(Error::InvalidNumber(_))),
                "{bad:?} accepted"
            );
        }
    }

    #[test]
    fn explicit_kernel_wins_over_scaler_name() {
        let args = GetNativeArgs {
            kernel: Some("lanczos".into()),
            taps: 5,
            scaler: "nonsense".into(),
            ..Default::default()
        };
        assert_eq!(args.resolve_scaler().unwrap().kernel, Kernel::Lanczos { taps: 5 });

        let args = GetNativeArgs {
            scaler: "nonsense".into(),
            ..Default::default()
        };
        assert!(matches!(args.resolve_scaler(), Err(Error::UnknownScaler(_))));
        assert_eq!(GetNativeArgs::default().resolve_scaler().unwrap(), Scaler::default());
    }

    #[test]
    fn attachment_name_from_source() {
        let a = Attachment::from_source("https://cdn.example.com/a/b/shot.png?size=2");
        assert_eq!(a.filename, "shot.png");
        let a = Attachment::from_source("/tmp/frame.PNG");
        assert_eq!(a.filename, "frame.PNG");
        assert_eq!(a.extension(), "png");
        let a = Attachment::from_source("https://example.com/");
        assert_eq!(a.filename, "image.png");
    }

    #[test]
    fn showscaler_lists_registry() {
        let cmds = Commands::default();
        assert_eq!(cmds.showscaler().lines().count(), 12);
    }

    #[test]
    fn command_cooldowns_drop_expired_users() {
        let cmds = Commands::new(Settings {
            cooldown: Duration::from_millis(50),
            ..Settings::default()
        });
        for user in 0..100 {
            Commands::acquire(&cmds.grain_cooldown, user).unwrap();
        }
        assert_eq!(cmds.grain_cooldown.len(), 100);
        std::thread::sleep(Duration::from_millis(150));
        Commands::acquire(&cmds.grain_cooldown, 1000).unwrap();
        assert_eq!(cmds.grain_cooldown.len(), 1);
        assert!(cmds.getnative_cooldown.is_empty());
    }

    #[test]
    fn reject_hides_processing_detail() {
        let r = reject("getnative", Error::Singular { src: 10, dst: 5 });
        assert_eq!(r.0, "Error in getnative, can't process your picture.");
        let r = reject("getnative", Error::Fetch("status 404".into()));
        assert_eq!(r.0, "Can't load image. Pls try it again later.");
    }
}
