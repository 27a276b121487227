// THEORY:
// `flight_tester` is the command-line cockpit for the `flight_focus` engine. It wires
// real or synthetic devices into a `Dispatcher`, drives it from a tokio interval at
// the configured tick rate, and prints the logbook.
//
// Without the `opencv` feature the runner flies entirely on synthetic devices: a
// fixed camera frame, a scripted classifier and a generated sky clip (or a directory
// of still images). With the feature enabled, `--camera`, `--model` and a video file
// passed to `--background` switch to the real webcam, a YOLOv8 ONNX detector and an
// OpenCV-decoded clip.

mod console;
#[cfg(feature = "opencv")]
mod devices;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use console::{ConsoleAudio, ConsoleCockpit};
use flight_focus::sources::{ImageSequence, ScriptedClassifier, SyntheticCamera};
use flight_focus::{
    AudioService, Classifier, Dispatcher, FlightCrew, FlightPlan, FocusConfig, FocusError, Frame,
    FrameSource, JsonLogbook, LoopMedia, SessionState, DESTINATIONS,
};
use log::{info, warn};
use std::future::Future;
use std::path::PathBuf;
use std::time::Instant;

const DEFAULT_SCRIPT: &str = "present:400,phone:40,present:400,absent:120";

#[derive(Parser)]
#[command(name = "flight_tester", about = "Fly a focus session from the terminal")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start a flight and run it until it lands, crashes or is interrupted.
    Fly(FlyArgs),
    /// Print every recorded trip and the landing score.
    Logbook {
        #[arg(long, default_value = "flight_log.json")]
        path: PathBuf,
    },
    /// List the destinations and their flight times.
    Destinations,
}

#[derive(clap::Args)]
struct FlyArgs {
    /// Destination city, see `destinations`.
    destination: String,
    /// Override the planned flight time, in hours.
    #[arg(long)]
    hours: Option<f64>,
    /// JSON file with engine settings; missing fields keep their defaults.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Where finished trips are appended.
    #[arg(long, default_value = "flight_log.json")]
    logbook: PathBuf,
    /// Scenario for the synthetic classifier, e.g. `present:200,phone:60`.
    #[arg(long, default_value = DEFAULT_SCRIPT)]
    script: String,
    /// Directory of still images (or, with opencv, a video file) to loop as background.
    #[arg(long)]
    background: Option<PathBuf>,
    /// Webcam index. Requires the `opencv` feature.
    #[arg(long)]
    camera: Option<i32>,
    /// YOLOv8 ONNX model. Requires the `opencv` feature.
    #[arg(long)]
    model: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match Cli::parse().command {
        Command::Fly(args) => fly(args).await,
        Command::Logbook { path } => print_logbook(&JsonLogbook::new(path)),
        Command::Destinations => {
            for destination in DESTINATIONS {
                let plan = FlightPlan::new(destination.name, destination.flight_hours)?;
                println!("{:<10} {}", destination.name, plan.describe());
            }
            Ok(())
        }
    }
}

async fn fly(args: FlyArgs) -> Result<()> {
    let config = match &args.config {
        Some(path) => FocusConfig::from_json_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => FocusConfig::default(),
    };
    let plan = match args.hours {
        Some(hours) => {
            let name = flight_focus::destinations::find(&args.destination)
                .map_or(args.destination.as_str(), |d| d.name);
            FlightPlan::new(name, hours)?
        }
        None => FlightPlan::to(&args.destination)?,
    };
    let crew = build_crew(&args, &config)?;
    let logbook = JsonLogbook::new(&args.logbook);

    let mut dispatcher = Dispatcher::new(
        config,
        Box::new(ConsoleCockpit::default()),
        AudioService::new(ConsoleAudio),
        Box::new(logbook.clone()),
    )
    .context("configuring the flight")?;
    dispatcher
        .start_flight(plan, crew, Instant::now())
        .context("starting the flight")?;

    fly_until_down(&mut dispatcher, tokio::signal::ctrl_c()).await;

    dispatcher.shutdown(Instant::now());
    print_logbook(&logbook)
}

/// Ticks the dispatcher until the session ends or `interrupt` resolves, which
/// aborts the flight. `interrupt` is polled across every tick, so a signal that
/// arrives while a tick is running is still seen.
async fn fly_until_down<F>(dispatcher: &mut Dispatcher, interrupt: F) -> SessionState
where
    F: Future<Output = std::io::Result<()>>,
{
    let mut ticker = tokio::time::interval(dispatcher.config().tick_interval());
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    tokio::pin!(interrupt);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let state = dispatcher.tick(Instant::now());
                if state.is_terminal() {
                    return state;
                }
            }
            signal = &mut interrupt => {
                if let Err(e) = signal {
                    warn!("could not listen for ctrl-c: {e}");
                }
                info!("interrupted, aborting the flight");
                dispatcher.abort(Instant::now());
                return dispatcher.state();
            }
        }
    }
}

fn build_crew(args: &FlyArgs, config: &FocusConfig) -> Result<FlightCrew> {
    Ok(FlightCrew {
        camera: camera_opener(args.camera, config)?,
        classifier: classifier_opener(args.model.clone(), &args.script)?,
        media: media_opener(args.background.clone())?,
    })
}

fn synthetic_camera(config: &FocusConfig) -> flight_focus::Opener<Box<dyn FrameSource>> {
    let interval = config.monitor_pacing();
    Box::new(move || -> Result<Box<dyn FrameSource>, FocusError> {
        let cabin = Frame::filled(640, 480, [70, 64, 58]);
        Ok(Box::new(SyntheticCamera::new(cabin, interval)))
    })
}

#[cfg(feature = "opencv")]
fn camera_opener(
    index: Option<i32>,
    config: &FocusConfig,
) -> Result<flight_focus::Opener<Box<dyn FrameSource>>> {
    let Some(index) = index else {
        return Ok(synthetic_camera(config));
    };
    let opener: flight_focus::Opener<Box<dyn FrameSource>> =
        Box::new(move || -> Result<Box<dyn FrameSource>, FocusError> {
            Ok(Box::new(devices::Webcam::open(index)?))
        });
    Ok(opener)
}

#[cfg(not(feature = "opencv"))]
fn camera_opener(
    index: Option<i32>,
    config: &FocusConfig,
) -> Result<flight_focus::Opener<Box<dyn FrameSource>>> {
    if index.is_some() {
        anyhow::bail!("--camera needs a build with the `opencv` feature");
    }
    Ok(synthetic_camera(config))
}

fn scripted_classifier(script: &str) -> Result<flight_focus::Opener<Box<dyn Classifier>>> {
    let classifier = ScriptedClassifier::parse(script).context("parsing --script")?;
    Ok(Box::new(move || -> Result<Box<dyn Classifier>, FocusError> {
        Ok(Box::new(classifier))
    }))
}

#[cfg(feature = "opencv")]
fn classifier_opener(
    model: Option<PathBuf>,
    script: &str,
) -> Result<flight_focus::Opener<Box<dyn Classifier>>> {
    let Some(model) = model else {
        return scripted_classifier(script);
    };
    let opener: flight_focus::Opener<Box<dyn Classifier>> =
        Box::new(move || -> Result<Box<dyn Classifier>, FocusError> {
            Ok(Box::new(devices::YoloDetector::load(&model.to_string_lossy())?))
        });
    Ok(opener)
}

#[cfg(not(feature = "opencv"))]
fn classifier_opener(
    model: Option<PathBuf>,
    script: &str,
) -> Result<flight_focus::Opener<Box<dyn Classifier>>> {
    if model.is_some() {
        anyhow::bail!("--model needs a build with the `opencv` feature");
    }
    scripted_classifier(script)
}

fn media_opener(background: Option<PathBuf>) -> Result<flight_focus::Opener<Box<dyn LoopMedia>>> {
    let Some(path) = background else {
        return Ok(Box::new(|| -> Result<Box<dyn LoopMedia>, FocusError> {
            Ok(Box::new(ImageSequence::sky(320, 180, 90)))
        }));
    };
    if path.is_dir() {
        return Ok(Box::new(move || -> Result<Box<dyn LoopMedia>, FocusError> {
            Ok(Box::new(ImageSequence::open_dir(&path, None)?))
        }));
    }
    video_file_opener(path)
}

#[cfg(feature = "opencv")]
fn video_file_opener(path: PathBuf) -> Result<flight_focus::Opener<Box<dyn LoopMedia>>> {
    Ok(Box::new(move || -> Result<Box<dyn LoopMedia>, FocusError> {
        Ok(Box::new(devices::VideoFile::open(&path.to_string_lossy())?))
    }))
}

#[cfg(not(feature = "opencv"))]
fn video_file_opener(path: PathBuf) -> Result<flight_focus::Opener<Box<dyn LoopMedia>>> {
    anyhow::bail!(
        "{} is not a directory; video files need a build with the `opencv` feature",
        path.display()
    )
}

fn print_logbook(logbook: &JsonLogbook) -> Result<()> {
    let entries = logbook
        .entries()
        .with_context(|| format!("reading {}", logbook.path().display()))?;
    if entries.is_empty() {
        println!("No flights logged yet.");
        return Ok(());
    }

    println!("{:<17} {:<8} {:<10} {:>8}  STATUS", "DATE", "FROM", "TO", "HOURS");
    for entry in &entries {
        println!(
            "{:<17} {:<8} {:<10} {:>8.2}  {}",
            entry.timestamp.format("%Y-%m-%d %H:%M"),
            entry.origin,
            entry.destination,
            entry.duration_hours,
            entry.outcome
        );
    }
    let summary = flight_focus::LogbookSummary::from_entries(&entries);
    println!(
        "\nLanded {} flights ({:.2} h flown)",
        summary.score(),
        summary.hours_landed
    );
    Ok(())
}
