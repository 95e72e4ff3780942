//! Presento CLI - AI Presentation Maker
//!
//! Generates a slide-deck PDF, and optionally a narrated podcast, for one or
//! more topics.

use clap::{Parser, ValueEnum};
use colored::Colorize;
use presento_core::{
    ApiConfig, Backends, Config, HttpImageBackend, HttpSpeechBackend, KokoroSpeech,
    OpenAiBackend, PipelineOrchestrator, Progress, ProgressCallback, RunAdmission, RunRequest,
    SpeechBackend,
};
use std::env;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum TtsEngine {
    /// Local kokoro model (downloaded on first use)
    Kokoro,
    /// The API's /audio/speech route
    Http,
}

#[derive(Parser)]
#[command(
    name = "presento",
    version,
    about = "AI Presentation Maker - turn a topic into slides",
    long_about = "Generates a slide-deck PDF (and optionally a podcast) for each topic using OpenAI-compatible APIs."
)]
struct Cli {
    /// Presentation topics, e.g. "using Generative AI to write unit test cases"
    #[arg(value_name = "TOPIC", required = true)]
    topics: Vec<String>,

    /// Number of refinement rounds
    #[arg(short, long, default_value = "1", value_name = "ROUNDS",
          value_parser = clap::value_parser!(u32).range(1..=3))]
    rounds: u32,

    /// Also produce a two-voice podcast of the deck
    #[arg(long)]
    podcast: bool,

    /// TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Directory for generated files (overrides the config)
    #[arg(short, long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Speech engine for podcast mode
    #[arg(long, value_enum, default_value = "kokoro")]
    tts: TtsEngine,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if let Some(dir) = &cli.output_dir {
        config.output.directory = dir.clone();
    }

    init_logging(&config)?;

    // Get API configuration from environment
    let api_base = env::var("OPENAI_API_BASE")
        .or_else(|_| env::var("OPENAI_BASE_URL"))
        .unwrap_or_else(|_| "https://api.openai.com/v1".to_string());

    let api_key = env::var("OPENAI_API_KEY").unwrap_or_else(|_| {
        eprintln!(
            "{}",
            "Warning: OPENAI_API_KEY not set. API calls may fail.".yellow()
        );
        String::new()
    });

    let api = ApiConfig::new(api_base, api_key);
    let chat = Arc::new(OpenAiBackend::new(&api, &config.models.text_model)?);

    let speech: Option<Arc<dyn SpeechBackend>> = if cli.podcast {
        Some(match cli.tts {
            TtsEngine::Kokoro => {
                let kokoro = KokoroSpeech::new().await?;
                kokoro.validate_voice(&config.voices.host_voice)?;
                kokoro.validate_voice(&config.voices.guest_voice)?;
                Arc::new(kokoro) as Arc<dyn SpeechBackend>
            }
            TtsEngine::Http => Arc::new(HttpSpeechBackend::new(
                api.clone(),
                &config.models.speech_model,
            )?) as Arc<dyn SpeechBackend>,
        })
    } else {
        None
    };

    let backends = Backends {
        text: chat.clone(),
        agents: chat,
        images: Arc::new(HttpImageBackend::new(api, &config.models.image_model)?),
        speech,
    };

    let admission = RunAdmission::new(config.service.max_concurrent_runs);
    let orchestrator = Arc::new(
        PipelineOrchestrator::new(config, backends)?.with_callback(create_console_callback()),
    );

    // Print header
    println!();
    println!("{}", "═".repeat(70).bright_blue());
    println!(
        "{}",
        format!("  {} - AI Presentation Maker", "Presento".bold())
            .bright_blue()
            .bold()
    );
    println!("{}", "═".repeat(70).bright_blue());
    println!();
    for topic in &cli.topics {
        println!("{} {}", "Topic:".bold(), topic.bright_white());
    }
    println!(
        "{} {}{}",
        "Refinement rounds:".bold(),
        cli.rounds,
        if cli.podcast { " (with podcast)" } else { "" }
    );
    println!("{}", "─".repeat(70).dimmed());

    let mut tasks = tokio::task::JoinSet::new();
    for topic in cli.topics.clone() {
        let admission = admission.clone();
        let orchestrator = orchestrator.clone();
        let request = RunRequest::new(topic.clone(), cli.rounds).with_podcast(cli.podcast);
        tasks.spawn(async move { (topic, admission.run(&orchestrator, request).await) });
    }

    let mut failed = 0;
    while let Some(joined) = tasks.join_next().await {
        let (topic, result) = joined?;
        println!();
        match result {
            Ok(artifacts) => {
                println!("{} {}", "✔".bright_green(), topic.bright_white().bold());
                println!("  Slides:  {}", artifacts.document_path.display());
                if let Some(path) = artifacts.audio_path {
                    println!("  Podcast: {}", path.display());
                }
            }
            Err(e) => {
                failed += 1;
                println!("{} {}", "✘".red(), topic.bright_white().bold());
                println!("  {}", e.user_message().red());
            }
        }
    }

    println!();
    println!("{}", "═".repeat(70).bright_blue());
    if failed == 0 {
        println!("{}", "  Done.".bright_green().bold());
    } else {
        println!(
            "{}",
            format!("  {} of {} runs failed.", failed, cli.topics.len())
                .red()
                .bold()
        );
    }
    println!("{}", "═".repeat(70).bright_blue());
    println!();

    if failed > 0 {
        std::process::exit(1);
    }
    Ok(())
}

/// Append timestamped log lines to the configured log file.
fn init_logging(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.output.log_file)?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();

    Ok(())
}

/// Create a callback that prints progress to the console.
fn create_console_callback() -> ProgressCallback {
    Arc::new(move |progress: Progress| {
        let percent = (progress.fraction * 100.0).round() as u32;
        let run = &progress.run_id[..progress.run_id.len().min(8)];
        println!(
            "{} {} {}",
            format!("[{:>3}%]", percent).bright_cyan(),
            run.dimmed(),
            progress.label
        );
    })
}
