use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use audio_relay::cli::{Cli, Commands};
use audio_relay::config::Config;
use audio_relay::pipeline::exit_status;
use audio_relay::utils::{self, check_file_accessible, generate_unique_filename, source_stem};
use audio_relay::{
    output, AudioFetcher, CloudinaryUploader, ConsoleReporter, MediaUploader, RelayPipeline,
    Reporter, Stage, YtDlpFetcher,
};

#[tokio::main]
async fn main() -> ExitCode {
    // Merge .env into the process environment before anything reads it
    let dotenv = dotenvy::dotenv();

    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_json);

    match &dotenv {
        Ok(path) => tracing::debug!("Loaded environment from {}", path.display()),
        Err(e) if e.not_found() => {}
        Err(e) => tracing::warn!("Ignoring .env file: {}", e),
    }

    let command = cli.command.unwrap_or_default();
    let reporter = ConsoleReporter::new(cli.quiet, command.output_format());
    // Missing tools always exit non-zero
    let mut strict = matches!(command, Commands::Relay { strict: true, .. } | Commands::Check);

    let result = match Config::load(cli.settings.as_deref()) {
        Ok(config) => {
            strict |= config.app.strict_exit;
            dispatch(command, &config, &reporter).await
        }
        Err(e) => Err(e.into()),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::debug!("Run failed: {:?}", e);
            reporter.failed(&format!("{:#}", e));
            ExitCode::from(exit_status(true, strict))
        }
    }
}

fn init_tracing(verbose: bool, json: bool) {
    let default_filter = if verbose { "audio_relay=debug" } else { "audio_relay=info" };
    let registry = tracing_subscriber::registry().with(
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| default_filter.into()),
    );

    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

async fn dispatch(command: Commands, config: &Config, reporter: &ConsoleReporter) -> Result<()> {
    match command {
        Commands::Relay {
            url,
            output,
            keep_local,
            ..
        } => {
            let fetcher = YtDlpFetcher::from_config(&config.fetch);
            warn_missing_dependencies(&fetcher).await;

            let uploader = CloudinaryUploader::new(config.cloudinary.clone())?;
            let pipeline = RelayPipeline::new(fetcher, uploader)
                .keep_local(keep_local || config.app.keep_local);

            let output_path = output.unwrap_or_else(|| default_output_path(config, &url));
            tracing::info!("Starting relay for URL: {}", url);

            pipeline.run(&url, &output_path, reporter).await?;
        }
        Commands::Fetch { url, output } => {
            let fetcher = YtDlpFetcher::from_config(&config.fetch);
            warn_missing_dependencies(&fetcher).await;

            let output_path = output.unwrap_or_else(|| default_output_path(config, &url));

            reporter.stage(Stage::Fetching);
            reporter.message("Downloading audio...");
            let path = fetcher.fetch_audio(&url, &output_path).await?;
            reporter.stage(Stage::Done);

            println!("Audio saved to: {}", path.display());
        }
        Commands::Upload { file, format } => {
            check_file_accessible(&file)?;
            let uploader = CloudinaryUploader::new(config.cloudinary.clone())?;

            reporter.stage(Stage::Uploading);
            reporter.message(&format!("Uploading to {}...", uploader.service_name()));
            let asset = uploader.upload(&file).await?;
            reporter.stage(Stage::Done);

            println!("{}", output::render_asset(&asset, format));
        }
        Commands::Config { show } => {
            config.display();
            if !show {
                println!();
                println!("Settings are read from ./audio-relay.yaml or the user config directory,");
                println!(
                    "credentials from CLOUD_NAME, API_KEY, API_SECRET (or CLOUDINARY_URL) and .env."
                );
            }
        }
        Commands::Check => {
            let fetcher = YtDlpFetcher::from_config(&config.fetch);
            let missing = utils::check_dependencies(&fetcher).await;
            if !missing.is_empty() {
                eprintln!("Missing dependencies:");
                for dep in &missing {
                    eprintln!("   • {}", dep);
                }
                anyhow::bail!("{} required tool(s) not found", missing.len());
            }
            println!("All required tools found (yt-dlp, ffmpeg).");
        }
    }

    Ok(())
}

/// Unique download path for `url` inside the configured directory
fn default_output_path(config: &Config, url: &str) -> PathBuf {
    config
        .download_dir()
        .join(generate_unique_filename(&source_stem(url), &config.fetch.audio_format))
}

/// Check for required external tools (non-fatal; yt-dlp reports the real failure)
async fn warn_missing_dependencies(fetcher: &YtDlpFetcher) {
    let missing = utils::check_dependencies(fetcher).await;
    if !missing.is_empty() {
        eprintln!("⚠️  Dependency check warnings:");
        for dep in missing {
            eprintln!("   • {}", dep);
        }
        eprintln!("   (Continuing anyway - tools may be available)");
    }
}
