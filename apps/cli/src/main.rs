use std::time::{Duration, Instant};

use anyhow::Result;
use clap::{Parser, ValueEnum};
use console::style;
use cookit_core::{PipelineConfig, Provider, RunResult, events::BusConfig, format_recipe_readable};
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use crate::pipeline::{Pipeline, PipelineOptions, StageServices};

mod pipeline;
mod workers;

fn format_duration(d: Duration) -> String {
    let secs = d.as_secs_f64();
    if secs < 60.0 {
        format!("{:.1}s", secs)
    } else {
        format!("{:.0}m {:.0}s", (secs / 60.0).floor(), secs % 60.0)
    }
}

/// CLI wrapper for Provider enum (needed for clap ValueEnum)
#[derive(Clone, Default, ValueEnum)]
enum CliProvider {
    #[default]
    Gemini,
    Openai,
    Grok,
}

impl From<CliProvider> for Provider {
    fn from(cli: CliProvider) -> Self {
        match cli {
            CliProvider::Gemini => Provider::Gemini,
            CliProvider::Openai => Provider::Openai,
            CliProvider::Grok => Provider::Grok,
        }
    }
}

#[derive(Parser)]
#[command(name = "cookit")]
#[command(about = "Turn YouTube cooking videos into structured, timestamped recipes")]
struct Cli {
    /// Video URLs, processed one after another
    #[arg(required = true)]
    urls: Vec<String>,

    /// AI provider for recipe generation
    #[arg(short, long, default_value = "gemini")]
    provider: CliProvider,

    /// Reuse the artifacts of an earlier run instead of starting over
    #[arg(long, value_name = "RUN_ID")]
    resume: Option<Uuid>,

    /// Print the recipe without storing it
    #[arg(long)]
    no_upload: bool,

    /// Keep the run directory after a successful run
    #[arg(long)]
    keep_artifacts: bool,

    /// Frames recognized at the same time
    #[arg(long, env = "COOKIT_OCR_CONCURRENCY")]
    ocr_concurrency: Option<usize>,

    /// Extra attempts for a failed model call
    #[arg(long, env = "COOKIT_MODEL_RETRIES")]
    retries: Option<u32>,

    /// Give up on a model call after this many seconds
    #[arg(long, env = "COOKIT_MODEL_TIMEOUT_SECS")]
    timeout_secs: Option<u64>,

    /// Print pipeline logs (debug level)
    #[arg(short, long)]
    verbose: bool,
}

fn init_tracing(verbose: bool) -> Result<()> {
    // `cookit` also covers the `cookit_core` target
    let level = if verbose { "cookit=debug" } else { "cookit=info" };
    let env_filter = EnvFilter::from_default_env().add_directive(level.parse()?);

    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v == "json");
    if json {
        tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_writer(std::io::stderr),
            )
            .with(env_filter)
            .init();
    }
    Ok(())
}

fn create_spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(template) = ProgressStyle::default_spinner()
        .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
        .template("{spinner:.cyan} {msg}")
    {
        pb.set_style(template);
    }
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

extern "C" fn whisper_log_callback(
    _level: u32,
    _message: *const std::ffi::c_char,
    _user_data: *mut std::ffi::c_void,
) {
    // silent
}

fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("{} {}", style("Error:").red().bold(), message);
    std::process::exit(1);
}

fn report(result: &RunResult, spinner: &ProgressBar) {
    let elapsed = style(format!("[{}]", format_duration(result.elapsed))).dim();

    if !result.is_completed() {
        spinner.finish_with_message(format!(
            "{} {} failed at {}: {} {}",
            style("✗").red().bold(),
            result.video_url,
            style(result.failed_stage.as_deref().unwrap_or("unknown")).yellow(),
            result.error.as_deref().unwrap_or_default(),
            elapsed
        ));
        println!(
            "  {} {}",
            style("Run id:").dim(),
            style(result.run_id).cyan()
        );
        return;
    }

    let stored = match &result.recipe_id {
        Some(id) => format!("stored as {}", style(id).cyan()),
        None => style("not stored").dim().to_string(),
    };
    spinner.finish_with_message(format!(
        "{} {} {} {}",
        style("✓").green().bold(),
        result.video_id.as_deref().unwrap_or(&result.video_url),
        stored,
        elapsed
    ));

    for warning in &result.warnings {
        println!("  {} {}", style("!").yellow().bold(), style(warning).dim());
    }

    if let Some(recipe) = &result.recipe {
        println!("{}", style("─".repeat(60)).dim());
        println!("{}", format_recipe_readable(recipe));
        println!("{}", style("─".repeat(60)).dim());
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.verbose)?;

    unsafe {
        whisper_rs::set_log_callback(Some(whisper_log_callback), std::ptr::null_mut());
    }

    let provider: Provider = cli.provider.into();

    // Pre-flight: no work starts without credentials
    if let Err(e) = provider.validate_api_key() {
        fail(format!("{e} (set {})", provider.config().env_var));
    }
    let mut config = PipelineConfig::from_env(provider).unwrap_or_else(|e| fail(e));
    let upload = !cli.no_upload;
    if upload && let Err(e) = config.require_supabase() {
        fail(format!("{e} (or pass --no-upload)"));
    }

    if let Some(concurrency) = cli.ocr_concurrency.filter(|c| *c > 0) {
        config.ocr.concurrency = concurrency;
    }
    if let Some(retries) = cli.retries {
        config.generation.retries = retries;
    }
    if let Some(secs) = cli.timeout_secs.filter(|s| *s > 0) {
        config.generation.timeout = Some(Duration::from_secs(secs));
    }

    if cli.resume.is_some() && cli.urls.len() > 1 {
        fail("--resume applies to a single URL");
    }

    println!(
        "\n{}  {}\n",
        style("cookit").cyan().bold(),
        style("Video → Recipe").dim()
    );

    let spinner = create_spinner("Preparing models...");
    let services = StageServices::from_config(&config, upload).await?;
    spinner.finish_with_message(format!(
        "{} Ready ({}, {})",
        style("✓").green().bold(),
        config.provider.name(),
        style(&config.generation.model).yellow()
    ));

    let options = PipelineOptions {
        upload,
        keep_artifacts: cli.keep_artifacts,
        ..PipelineOptions::from_config(&config)
    };
    let pipeline = Pipeline::start(services, options, BusConfig::default())?;

    println!("{}", style("─".repeat(60)).dim());

    let total_start = Instant::now();
    let mut failures = 0usize;

    for url in &cli.urls {
        let spinner = create_spinner(&format!("Processing {url}..."));
        let result = pipeline.run(url, cli.resume).await;
        if !result.is_completed() {
            failures += 1;
        }
        report(&result, &spinner);
    }

    pipeline.shutdown();

    println!(
        "\n{} {}  {}\n",
        style("Total time:").dim(),
        style(format_duration(total_start.elapsed())).cyan().bold(),
        style(format!(
            "{} completed, {} failed",
            cli.urls.len() - failures,
            failures
        ))
        .dim()
    );

    if failures > 0 {
        std::process::exit(1);
    }
    Ok(())
}
