use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use log::{info, warn};

use light_remote::app::{self, AppEvent};
use light_remote::audio::Microphone;
use light_remote::config::Config;
use light_remote::controller::LightController;
use light_remote::panel::ViewIdGenerator;
use light_remote::transport::LogTransport;
use light_remote::tui;
use light_remote::voice;
use light_remote::wake_word::{FeatureConfig, WakeWordDetector};

#[derive(Parser)]
#[command(name = "light-remote")]
#[command(about = "Smart light remote with wake word voice control")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Terminal control panels, with the voice service in the background
    Run {
        /// Do not start the voice service
        #[arg(long)]
        no_voice: bool,

        /// Where logs go while the terminal UI owns the screen
        #[arg(long, default_value = "light-remote.log")]
        log_file: PathBuf,
    },
    /// Voice service only, no terminal UI
    Listen,
    /// Interpret one transcript as if it had been spoken
    Say {
        #[arg(required = true)]
        text: Vec<String>,
    },
    /// Record the wake word and save a detection template
    Train {
        #[arg(short, long, default_value = "5")]
        samples: usize,

        /// Seconds recorded per sample
        #[arg(long, default_value = "2")]
        seconds: u64,

        #[arg(long, default_value = "Hey Rux")]
        phrase: String,

        /// Defaults to WAKE_WORD_TEMPLATE
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn init_logging(log_file: Option<&Path>) -> Result<()> {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if let Some(path) = log_file {
        let file = File::create(path)
            .with_context(|| format!("Failed to create log file {}", path.display()))?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }
    builder.init();
    Ok(())
}

fn main() -> Result<()> {
    dotenv().ok();
    let cli = Cli::parse();

    let log_file = match &cli.command {
        Command::Run { log_file, .. } => Some(log_file.as_path()),
        _ => None,
    };
    init_logging(log_file)?;

    let config = Config::from_env().context("Invalid configuration")?;

    match cli.command {
        Command::Run { no_voice, .. } => run(config, !no_voice),
        Command::Listen => listen(config),
        Command::Say { text } => say(&text.join(" ")),
        Command::Train {
            samples,
            seconds,
            phrase,
            output,
        } => {
            let output = output.unwrap_or_else(|| config.wake_word_template.clone());
            train(samples, Duration::from_secs(seconds), &phrase, &output)
        }
    }
}

fn run(config: Config, with_voice: bool) -> Result<()> {
    let (events_tx, events_rx) = mpsc::channel::<AppEvent>();
    let shutdown = Arc::new(AtomicBool::new(false));
    let mut controller = LightController::new(&ViewIdGenerator::new());

    app::connect_log_transport(&mut controller, events_tx.clone())
        .context("Failed to start transport")?;
    let voice = if with_voice {
        Some(
            app::spawn_voice(config, events_tx.clone(), Arc::clone(&shutdown))
                .context("Failed to start voice service")?,
        )
    } else {
        None
    };
    drop(events_tx);

    let mut controller =
        tui::run(controller, &events_rx, &shutdown).context("Terminal UI failed")?;

    shutdown.store(true, Ordering::Relaxed);
    controller.link_mut().disconnected();
    if let Some(voice) = voice {
        if voice.join().is_err() {
            warn!("voice service panicked");
        }
    }
    Ok(())
}

fn listen(config: Config) -> Result<()> {
    let (events_tx, events_rx) = mpsc::channel::<AppEvent>();
    let shutdown = Arc::new(AtomicBool::new(false));
    let mut controller = LightController::new(&ViewIdGenerator::new());

    app::connect_log_transport(&mut controller, events_tx.clone())
        .context("Failed to start transport")?;
    let voice = app::spawn_voice(config, events_tx, Arc::clone(&shutdown))
        .context("Failed to start voice service")?;

    app::run_headless(&mut controller, &events_rx, &shutdown);

    shutdown.store(true, Ordering::Relaxed);
    if voice.join().is_err() {
        warn!("voice service panicked");
    }
    Ok(())
}

fn say(text: &str) -> Result<()> {
    let mut controller = LightController::new(&ViewIdGenerator::new());
    controller.link_mut().connecting();
    controller.link_mut().connected(Arc::new(LogTransport::new()));

    match voice::parse(text) {
        Ok(command) => {
            controller.apply_voice(command);
            println!("{:?}", command);
        }
        Err(reason) => println!("No command in \"{}\" ({:?})", text, reason),
    }

    controller.link_mut().disconnected();
    Ok(())
}

fn train(samples: usize, length: Duration, phrase: &str, output: &Path) -> Result<()> {
    if samples == 0 {
        anyhow::bail!("Need at least one sample to train");
    }

    let microphone = Microphone::open().context("No microphone for training")?;
    println!("Recording {} samples of \"{}\"", samples, phrase);

    let mut recordings = Vec::with_capacity(samples);
    for i in 1..=samples {
        print!("Sample {}/{}: press Enter, then say \"{}\"...", i, samples, phrase);
        io::stdout().flush()?;
        io::stdin().read_line(&mut String::new())?;

        let recording = microphone.record(length)?;
        println!(" {} samples captured", recording.len());
        recordings.push(recording);
    }

    let mut detector = WakeWordDetector::new(FeatureConfig {
        sample_rate: microphone.sample_rate(),
        ..FeatureConfig::default()
    });
    detector.train(&recordings)?;

    for (i, recording) in recordings.iter().enumerate() {
        let detection = detector.score(recording);
        println!(
            "  sample {}: similarity {:.1}%{}",
            i + 1,
            detection.similarity * 100.0,
            if detection.detected { "" } else { " (below threshold)" }
        );
    }

    let template = detector
        .export_template(phrase)
        .context("Training produced no template")?;
    template.save(output)?;
    info!("template saved to {}", output.display());
    println!("Template saved to {}", output.display());
    Ok(())
}
