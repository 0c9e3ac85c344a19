use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use tracing::info;

use getnative::command::{
    Attachment, CommandOutput, Commands, GetNativeArgs, Settings, parse_fraction,
};
use getnative::scaler::DEFAULT_SCALER;

#[derive(Parser)]
#[command(name = "getnative")]
#[command(about = "Find the native resolution of upscaled images", long_about = None)]
struct Cli {
    /// Directory the artifacts are copied to
    #[arg(short, long, global = true, default_value = "results")]
    output: PathBuf,

    /// Worker count the estimator's parallelism is derived from
    #[arg(long, global = true)]
    workers: Option<usize>,

    /// Cooldown between runs in seconds (0 disables it)
    #[arg(long, global = true, default_value_t = 0)]
    cooldown: u64,

    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Estimate the native height of an upscaled image
    Getnative {
        /// Image URL or path
        image: String,

        /// Force an aspect ratio (e.g. 16/9); 0 uses the image's own
        #[arg(long, alias = "ar", value_parser = parse_fraction)]
        aspect_ratio: Option<f64>,

        /// Lowest candidate height
        #[arg(long = "min-height", alias = "min", default_value_t = 500)]
        min_h: u32,

        /// Highest candidate height
        #[arg(long = "max-height", alias = "max", default_value_t = 1000)]
        max_h: u32,

        /// Registry scaler name, see `showscaler`
        #[arg(short, long, default_value = DEFAULT_SCALER)]
        scaler: String,

        /// Kernel name, overrides --scaler
        #[arg(short, long)]
        kernel: Option<String>,

        /// Bicubic b
        #[arg(short, default_value = "1/3", value_parser = parse_fraction)]
        b: f64,

        /// Bicubic c
        #[arg(short, default_value = "1/3", value_parser = parse_fraction)]
        c: f64,

        /// Lanczos taps
        #[arg(short, long, default_value_t = 3)]
        taps: u32,
    },

    /// Rank every registered scaler at a given native height
    Getscaler {
        /// Image URL or path
        image: String,

        /// Native height to test
        #[arg(long = "native-height", alias = "nh")]
        native_height: Option<u32>,
    },

    /// Add random film grain
    Grain {
        /// Image URL or path
        image: String,
    },

    /// List the registered scalers
    Showscaler,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    let mut settings = Settings {
        cooldown: Duration::from_secs(cli.cooldown),
        ..Settings::default()
    };
    if let Some(workers) = cli.workers {
        settings.worker_threads = workers.max(1);
    }
    let commands = Commands::new(settings);
    // A local run has a single requester.
    let user = 0;

    let output = match cli.command {
        Cmd::Showscaler => {
            println!("{}", commands.showscaler());
            return Ok(());
        }
        Cmd::Getnative {
            image,
            aspect_ratio,
            min_h,
            max_h,
            scaler,
            kernel,
            b,
            c,
            taps,
        } => {
            let args = GetNativeArgs {
                aspect_ratio,
                min_h,
                max_h,
                scaler,
                kernel,
                b,
                c,
                taps,
            };
            commands
                .getnative(user, &Attachment::from_source(image), args)
                .await
        }
        Cmd::Getscaler {
            image,
            native_height,
        } => {
            commands
                .getscaler(user, &Attachment::from_source(image), native_height)
                .await
        }
        Cmd::Grain { image } => commands.grain(user, &Attachment::from_source(image)).await,
    };

    let output = match output {
        Ok(output) => output,
        Err(rejected) => {
            eprintln!("{rejected}");
            bail!("command failed");
        }
    };

    println!("{}", output.message);
    deliver(&output, &cli.output).await?;
    output.cleanup().context("removing scratch directory")?;
    Ok(())
}

/// Copy the artifacts out of the scratch directory.
async fn deliver(output: &CommandOutput, dest: &Path) -> anyhow::Result<()> {
    tokio::fs::create_dir_all(dest)
        .await
        .with_context(|| format!("creating {}", dest.display()))?;
    for file in &output.files {
        let Some(name) = file.file_name() else {
            continue;
        };
        let target = dest.join(name);
        tokio::fs::copy(file, &target)
            .await
            .with_context(|| format!("copying {}", file.display()))?;
        info!(path = %target.display(), "wrote");
    }
    Ok(())
}
