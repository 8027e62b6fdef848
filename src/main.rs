use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use jarvis::api::{ApiServer, ApiState};
use jarvis::resolve::build_index;
use jarvis::voice::{AudioCapture, AudioPlayback, TextToSpeech, tone};
use jarvis::{AppIndex, Assistant, Config, EventBus, TargetResolver};

/// Jarvis - Voice-triggered desktop assistant
#[derive(Parser)]
#[command(name = "jarvis", version, about)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Take typed commands instead of listening on the microphone
    #[arg(long, env = "JARVIS_DISABLE_VOICE")]
    disable_voice: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Listen for commands (default)
    Run,
    /// Handle one typed command and exit
    Ask {
        /// What to ask, e.g. "open my budget spreadsheet"
        #[arg(required = true)]
        text: Vec<String>,
    },
    /// Show what a target resolves to, without opening it
    Resolve {
        /// Thing to find, e.g. "chrome" or "quarterly report"
        target: String,
        /// Extra words that may appear in the file name
        #[arg(long = "hint")]
        hints: Vec<String>,
        /// Skip building the application index
        #[arg(long)]
        no_index: bool,
    },
    /// Build the application index and report its size
    Index {
        /// Print every indexed entry
        #[arg(short, long)]
        list: bool,
    },
    /// Test microphone input
    TestMic {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
    /// Test speaker output
    TestSpeaker,
    /// Test TTS output
    TestTts {
        /// Text to speak
        #[arg(default_value = "Hello! This is a test of the text to speech system.")]
        text: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,jarvis=info",
        1 => "info,jarvis=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

#[allow(clippy::future_not_send)]
async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::load()?;
    tracing::debug!(resolver = ?config.resolver, voice = ?config.voice, "loaded configuration");

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => serve(config, cli.disable_voice).await,
        Command::Ask { text } => ask(&config, &text.join(" ")).await,
        Command::Resolve {
            target,
            hints,
            no_index,
        } => resolve(&config, &target, &hints, no_index),
        Command::Index { list } => index(&config, list),
        Command::TestMic { duration } => test_mic(duration).await,
        Command::TestSpeaker => test_speaker().await,
        Command::TestTts { text } => test_tts(&config, &text).await,
    }
}

/// Index, overlay server, then the listen loop until Ctrl+C
#[allow(clippy::future_not_send)]
async fn serve(config: Config, disable_voice: bool) -> anyhow::Result<()> {
    tracing::info!(
        actions = %config.actions_path.display(),
        roots = config.resolver.search_roots.len(),
        "starting jarvis"
    );

    let resolver = Arc::new(TargetResolver::new(&config.resolver, AppIndex::new()));
    // Resolution works before the index is ready; it just skips the app step
    drop(resolver.rebuild_index());

    let events = EventBus::new();
    if config.server.ui_enabled {
        let state = ApiState {
            events: events.clone(),
            resolver: Arc::clone(&resolver),
        };
        let server = ApiServer::new(state, config.server.port, config.server.static_dir.clone());
        drop(server.spawn());
    }

    let assistant = Assistant::new(&config, resolver, events);
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    let voice_key = config
        .openai_api_key
        .as_deref()
        .filter(|_| config.voice.enabled && !disable_voice);

    match voice_key {
        Some(api_key) => assistant.run_voice(&config.voice, api_key, shutdown).await?,
        None => {
            if config.voice.enabled && !disable_voice {
                tracing::warn!("OPENAI_API_KEY not set, falling back to typed commands");
            }
            assistant.run_text(shutdown).await?;
        }
    }

    tracing::info!("goodbye");
    Ok(())
}

/// Handle a single typed command
async fn ask(config: &Config, text: &str) -> anyhow::Result<()> {
    let resolver = Arc::new(TargetResolver::new(&config.resolver, AppIndex::new()));
    if let Some(build) = resolver.rebuild_index() {
        let entries = build.await?;
        tracing::debug!(entries, "application index ready");
    }

    let assistant = Assistant::new(config, resolver, EventBus::new());
    let outcome = assistant.handle_text(text).await;
    tracing::debug!(?outcome, "handled command");
    Ok(())
}

/// Print what a target resolves to
fn resolve(config: &Config, target: &str, hints: &[String], no_index: bool) -> anyhow::Result<()> {
    let index = AppIndex::new();
    if !no_index {
        index.publish(build_index(&config.resolver.index_roots()));
    }

    let resolver = TargetResolver::new(&config.resolver, index);
    let resolved = resolver.resolve(target, hints);
    println!("{resolved}");

    if !resolved.is_found() {
        anyhow::bail!("nothing matched {target:?}");
    }
    Ok(())
}

/// Build the application index once
fn index(config: &Config, list: bool) -> anyhow::Result<()> {
    let roots = config.resolver.index_roots();
    println!(
        "Indexing {} search roots and {} install roots...",
        roots.search_roots.len(),
        roots.install_roots.len()
    );

    let snapshot = build_index(&roots);
    if list {
        for entry in snapshot.entries() {
            println!("{}", entry.path().display());
        }
    }
    println!("{} applications indexed", snapshot.len());
    Ok(())
}

/// Test microphone input
#[allow(clippy::future_not_send)]
async fn test_mic(duration: u64) -> anyhow::Result<()> {
    println!("Testing microphone for {duration} seconds...");
    println!("Speak into your microphone!\n");

    let mut capture = AudioCapture::new()?;
    capture.start()?;
    println!("Device: {}", capture.device_name());
    println!("---");

    for i in 0..duration {
        tokio::time::sleep(Duration::from_secs(1)).await;

        let samples = capture.take_buffer();
        let energy = calculate_rms(&samples);
        let peak = samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max);

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let meter_len = (energy * 100.0).min(50.0) as usize;
        let meter: String = "\u{2588}".repeat(meter_len) + &" ".repeat(50 - meter_len);

        println!(
            "[{:2}s] RMS: {:.4} | Peak: {:.4} | [{}]",
            i + 1,
            energy,
            peak,
            meter
        );
    }

    capture.stop();

    println!("\n---");
    println!("If you saw movement in the meter, your mic is working!");
    println!("If RMS stayed near 0, check your input device and levels.");

    Ok(())
}

/// Calculate RMS energy
#[allow(clippy::cast_precision_loss)]
fn calculate_rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}

/// Test speaker output with a sine wave
async fn test_speaker() -> anyhow::Result<()> {
    println!("Testing speaker output...");
    println!("You should hear a 440Hz tone for 2 seconds\n");

    let playback = AudioPlayback::new()?;
    let samples = tone(440.0, 2.0);
    println!("Playing {} samples...", samples.len());

    tokio::task::spawn_blocking(move || playback.play(samples)).await??;

    println!("\n---");
    println!("If you heard the tone, your speakers are working!");
    Ok(())
}

/// Test TTS output
async fn test_tts(config: &Config, text: &str) -> anyhow::Result<()> {
    println!("Testing TTS with text: \"{text}\"\n");

    let api_key = config
        .openai_api_key
        .clone()
        .ok_or_else(|| anyhow::anyhow!("OPENAI_API_KEY not set"))?;
    let tts = TextToSpeech::new(
        api_key,
        config.voice.tts_model.clone(),
        config.voice.tts_voice.clone(),
        config.voice.tts_speed,
    )?;

    println!("Synthesizing speech...");
    let mp3 = tts.synthesize(text).await?;
    println!("Got {} bytes of audio, playing...", mp3.len());

    let playback = AudioPlayback::new()?;
    tokio::task::spawn_blocking(move || playback.play_mp3(&mp3)).await??;

    println!("\nTTS test complete!");
    Ok(())
}
