//! Tablas - multiplication tables drill
//!
//! Run with `tablas` or `tablas quiz` to start a quiz in the terminal.
//! Use `tablas devices` to list microphones.
//! Use `tablas listen <file>` to check how a recorded answer is recognized.

use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tablas::capture::{self, AnswerListener, VoiceCapture};
use tablas::cli::{Cli, Commands, QuizArgs};
use tablas::config::{self, Config};
use tablas::console::{self, ConsoleOptions};
use tablas::engine::{EngineParts, QuizEngine};
use tablas::quiz::{RandomQuestions, RepeatPolicy};
use tablas::recognize::{self, RecognizerModel};
use tablas::speech::espeak::EspeakSynthesizer;
use tablas::speech::{ProfileTable, SilentSynthesizer, SpeechQueue, SpeechSynthesizer};
use tablas::text::{self, TextProcessor};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.quiet {
        "error"
    } else {
        match cli.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    // stderr keeps log lines out of the quiz prompt
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(format!("tablas={},warn", log_level))),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    // Load configuration
    let mut config = config::load_config(cli.config.as_deref())?;

    // Apply CLI overrides
    if let Some(model) = cli.model {
        config.recognizer.model = model;
    }
    if cli.mute {
        config.speech.enabled = false;
    }

    // Run the appropriate command
    match cli.command.unwrap_or(Commands::Quiz(QuizArgs::default())) {
        Commands::Quiz(args) => {
            run_quiz(config, args, !cli.no_voice).await?;
        }

        Commands::Devices => {
            list_devices()?;
        }

        Commands::Normalize { text } => {
            println!("{}", text::normalize(&text.join(" ")));
        }

        Commands::Listen { file } => {
            listen_file(&config, &file).await?;
        }

        Commands::Config { default } => {
            if default {
                print!("{}", config::DEFAULT_CONFIG);
            } else {
                show_config(&config)?;
            }
        }
    }

    Ok(())
}

/// Run one quiz in the terminal
async fn run_quiz(config: Config, args: QuizArgs, want_voice: bool) -> anyhow::Result<()> {
    if let Err(e) = Config::ensure_directories() {
        tracing::warn!("Could not create config/model directories: {}", e);
    }

    let model = if want_voice {
        load_model_if_possible(&config).await
    } else {
        tracing::info!("Voice answers disabled");
        None
    };
    let listener: Arc<dyn AnswerListener> = Arc::new(VoiceCapture::new(config.audio.clone(), model));

    let synthesizer: Box<dyn SpeechSynthesizer> = if config.speech.enabled {
        Box::new(EspeakSynthesizer::new(config.speech.command.clone()))
    } else {
        Box::new(SilentSynthesizer)
    };
    let speech = SpeechQueue::spawn(
        synthesizer,
        ProfileTable::from_config(&config.speech),
        TextProcessor::new(&config.speech.replacements),
    );

    let parts = EngineParts {
        questions: Arc::new(RandomQuestions::new(RepeatPolicy::from_allow(
            config.quiz.allow_repeats_when_exhausted,
        ))),
        speech: speech.handle(),
        listener: listener.clone(),
        capture_timeout: Duration::from_secs(config.quiz.capture_timeout_secs),
    };
    let (engine, handle, events) = QuizEngine::new(parts);
    let engine_task = tokio::spawn(engine.run());

    let options = ConsoleOptions {
        tables: args.tables,
        question_count: args.questions.unwrap_or(config.quiz.question_count),
        voice_available: listener.is_available(),
        json: args.json,
    };

    let outcome = tokio::select! {
        result = console::run(handle.clone(), events, options) => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received interrupt, exiting");
            Ok(None)
        }
    };

    handle.shutdown();
    if let Err(e) = engine_task.await {
        tracing::error!("Quiz engine panicked: {}", e);
    }
    // Let the last feedback finish speaking
    speech.shutdown().await;

    outcome.map(|_| ())
}

/// Load the recognizer model when a microphone exists, None otherwise
async fn load_model_if_possible(config: &Config) -> Option<Arc<dyn RecognizerModel>> {
    if !tablas::audio::has_microphone() {
        tracing::warn!("No microphone found, voice answers disabled");
        return None;
    }

    let recognizer_config = config.recognizer.clone();
    match tokio::task::spawn_blocking(move || recognize::load_model(&recognizer_config)).await {
        Ok(Ok(model)) => {
            tracing::info!("Voice answers enabled (model: {})", model.name());
            Some(model)
        }
        Ok(Err(e)) => {
            tracing::warn!("{}", e);
            tracing::warn!("Voice answers disabled");
            None
        }
        Err(e) => {
            tracing::error!("Model loading task failed: {}", e);
            None
        }
    }
}

fn list_devices() -> anyhow::Result<()> {
    let devices = tablas::audio::list_microphones()?;
    if devices.is_empty() {
        println!("No audio input devices found.");
        return Ok(());
    }

    println!("Audio input devices:\n");
    for name in devices {
        println!("  {}", name);
    }
    println!("\nSet one with [audio] device = \"NAME\" or TABLAS_AUDIO_DEVICE.");
    Ok(())
}

/// Recognize a recorded answer the same way a live capture would
async fn listen_file(config: &Config, path: &Path) -> anyhow::Result<()> {
    println!("Loading audio file: {:?}", path);

    let sample_rate = config.audio.sample_rate;
    let samples = capture::read_wav(path, sample_rate)?;
    println!(
        "Processing {} samples ({:.2}s)...",
        samples.len(),
        samples.len() as f32 / sample_rate as f32
    );

    let recognizer_config = config.recognizer.clone();
    let chunk_samples = config.audio.chunk_samples;
    let transcript = tokio::task::spawn_blocking(move || -> anyhow::Result<String> {
        let model = recognize::load_model(&recognizer_config)?;
        Ok(capture::recognize_samples(
            model.as_ref(),
            &samples,
            sample_rate,
            chunk_samples,
        )?)
    })
    .await??;

    if transcript.is_empty() {
        println!("\n(no speech recognized)");
        return Ok(());
    }

    println!("\nTranscript: {}", transcript);
    println!("Answer:     {}", text::normalize(&transcript));
    Ok(())
}

fn show_config(config: &Config) -> anyhow::Result<()> {
    println!("Current Configuration\n");
    println!("=====================\n");
    print!("{}", toml::to_string_pretty(config)?);

    println!("\n---");
    println!(
        "Config file: {:?}",
        Config::default_path().unwrap_or_else(|| PathBuf::from("(not found)"))
    );
    println!("Models dir: {:?}", Config::models_dir());

    Ok(())
}
