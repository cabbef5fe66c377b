use anyhow::{Context, Result};
use clap::Parser;
use colored::*;
use std::io::BufRead;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;
use tracing::warn;
use tracing_subscriber::EnvFilter;

mod args;

use args::Args;
use rusty_snap::camera::{TestPatternSource, VideoSource};
use rusty_snap::config::AppConfig;
use rusty_snap::controller::{CaptureController, CapturePhase, FrameOutcome, FrameTicket};
use rusty_snap::countdown::SystemClock;
use rusty_snap::detector::DetectorLoader;
use rusty_snap::simulated::{parse_script, SimulatedLoader};
use rusty_snap::sink::{DirectorySink, SavedCapture};

type Controller<V> = CaptureController<V, DirectorySink, SystemClock>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Gesture,
    Manual,
    Cancel,
    Retake,
    Save,
    Help,
    Quit,
}

fn parse_command(line: &str) -> Option<Command> {
    match line.trim().to_ascii_lowercase().as_str() {
        "g" | "gesture" => Some(Command::Gesture),
        "m" | "manual" => Some(Command::Manual),
        "c" | "cancel" => Some(Command::Cancel),
        "r" | "retake" => Some(Command::Retake),
        "s" | "save" => Some(Command::Save),
        "h" | "help" | "?" => Some(Command::Help),
        "q" | "quit" | "exit" => Some(Command::Quit),
        _ => None,
    }
}

/// Reads commands from stdin on a worker thread so the frame loop never blocks.
fn spawn_command_reader() -> Receiver<Command> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            match parse_command(&line) {
                Some(cmd) => {
                    if tx.send(cmd).is_err() {
                        break;
                    }
                }
                None if line.trim().is_empty() => {}
                None => println!("{}", format!("Unknown command '{}'", line.trim()).yellow()),
            }
        }
    });
    rx
}

fn print_help() {
    println!("Controls: [g] Gesture capture [m] Manual capture [c] Cancel [r] Retake [s] Save [q] Quit");
}

fn list_cameras() -> Result<()> {
    #[cfg(feature = "camera")]
    {
        let cameras = rusty_snap::camera::CameraSource::list()?;
        println!("Available Cameras:");
        println!("{:<5} | {:<30}", "Index", "Name");
        println!("{}", "-".repeat(40));
        for (index, name) in cameras {
            println!("{:<5} | {:<30}", index, name);
        }
    }
    #[cfg(not(feature = "camera"))]
    println!("{}", "Built without the `camera` feature; no cameras to list.".yellow());
    Ok(())
}

fn build_loader(args: &Args, config: &AppConfig) -> Result<Box<dyn DetectorLoader>> {
    if args.simulate {
        let script = parse_script(&args.script).map_err(anyhow::Error::msg)?;
        // Hold each scripted count for about half a second
        return Ok(Box::new(
            SimulatedLoader::new(script).with_frames_per_step(15).repeating(),
        ));
    }

    #[cfg(feature = "onnx")]
    {
        Ok(Box::new(rusty_snap::inference::OnnxLoader::new(
            &config.detector.model_path,
            config.detector.min_confidence,
        )))
    }
    #[cfg(not(feature = "onnx"))]
    {
        let _ = config;
        Ok(Box::new(
            SimulatedLoader::new(Vec::new()).failing("built without the `onnx` feature"),
        ))
    }
}

fn report<V: VideoSource>(controller: &Controller<V>, json: bool, last: &mut String) -> Result<()> {
    let snapshot = controller.snapshot();
    let line = if json {
        serde_json::to_string(&snapshot)?
    } else {
        let mut line = format!(
            "[{:?}] {} | fingers: {} | sequence: {:?}",
            snapshot.phase, snapshot.status, snapshot.finger_count, snapshot.gesture_sequence
        );
        if let Some(n) = snapshot.countdown {
            line.push_str(&format!(" | {}...", n));
        }
        line
    };

    if *last != line {
        let painted = match snapshot.phase {
            CapturePhase::Reviewing => line.green(),
            CapturePhase::CountingDown => line.yellow().bold(),
            CapturePhase::CameraUnavailable => line.red(),
            _ => line.normal(),
        };
        println!("{}", painted);
        *last = line;
    }
    Ok(())
}

fn run<V: VideoSource>(mut controller: Controller<V>, json: bool) -> Result<()> {
    let commands = spawn_command_reader();
    print_help();

    if let Err(e) = controller.open_capture() {
        println!("{}", e.to_string().red());
    }

    #[cfg(feature = "preview")]
    let mut window = rusty_snap::output::PreviewWindow::new("Rusty Snap", 640, 480)?;

    let frame_interval = controller.settings().frame_interval();
    let mut ticket: Option<FrameTicket> = None;
    let mut last_line = String::new();

    loop {
        controller.poll_detector();

        match commands.try_recv() {
            Ok(Command::Quit) | Err(TryRecvError::Disconnected) => break,
            Ok(Command::Help) => print_help(),
            Ok(Command::Gesture) => match controller.start_gesture_capture() {
                Ok(t) => ticket = Some(t),
                Err(e) => println!("{}", e.to_string().red()),
            },
            Ok(Command::Manual) => {
                ticket = None;
                if let Err(e) = controller.manual_capture() {
                    println!("{}", e.to_string().red());
                }
            }
            Ok(Command::Cancel) => {
                ticket = None;
                if let Err(e) = controller.cancel_capture() {
                    println!("{}", e.to_string().red());
                }
            }
            Ok(Command::Retake) => match controller.retake() {
                Ok(t) => ticket = t,
                Err(e) => println!("{}", e.to_string().red()),
            },
            Ok(Command::Save) => match controller.save() {
                Ok(SavedCapture::File(path)) => {
                    println!("{}", format!("Saved {}", path.display()).green());
                    ticket = None;
                    controller
                        .open_capture()
                        .context("failed to reopen camera after save")?;
                }
                Ok(receipt) => println!("{}", format!("Saved {:?}", receipt).green()),
                Err(e) => println!("{}", e.to_string().red()),
            },
            Err(TryRecvError::Empty) => {}
        }

        if let Some(t) = ticket.take() {
            if let FrameOutcome::Continue(next) = controller.process_frame(t) {
                ticket = Some(next);
            }
        } else if controller.phase() == CapturePhase::PreviewActive {
            if let Err(e) = controller.refresh_preview() {
                warn!(error = %e, "preview frame failed");
            }
        }

        if let Err(e) = controller.poll_countdown() {
            println!("{}", e.to_string().red());
        }

        report(&controller, json, &mut last_line)?;

        #[cfg(feature = "preview")]
        {
            if !window.is_open() {
                break;
            }
            if let Some(frame) = controller.latest_frame() {
                let reviewing = controller.phase() == CapturePhase::Reviewing;
                window.show(frame, controller.latest_hand(), reviewing)?;
            }
        }

        thread::sleep(frame_interval);
    }

    controller.close();
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    if args.list {
        return list_cameras();
    }

    let mut config = AppConfig::load(&args.config).context("failed to load config")?;
    if let Some(index) = args.cam_index {
        config.camera.index = index;
    }
    if let Some(model) = &args.model {
        config.detector.model_path = model.clone();
    }
    if let Some(dir) = &args.output_dir {
        config.output.dir = dir.clone();
    }
    if args.mirror {
        config.camera.mirror = true;
    }

    let loader = build_loader(&args, &config)?;
    let sink = DirectorySink::new(&config.output.dir)
        .with_context(|| format!("failed to prepare output dir {}", config.output.dir))?;
    let clock = SystemClock::new();

    #[cfg(feature = "camera")]
    {
        if !args.simulate {
            let camera =
                rusty_snap::camera::CameraSource::new(config.camera.index, config.camera.mirror);
            let controller = CaptureController::new(camera, loader, sink, clock, config.capture);
            return run(controller, args.json);
        }
    }

    #[cfg(not(feature = "camera"))]
    {
        if !args.simulate {
            println!("{}", "Built without the `camera` feature; using a test pattern.".yellow());
        }
    }
    let controller = CaptureController::new(
        TestPatternSource::new(640, 480),
        loader,
        sink,
        clock,
        config.capture,
    );
    run(controller, args.json)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_command() {
        assert_eq!(parse_command(" G "), Some(Command::Gesture));
        assert_eq!(parse_command("save"), Some(Command::Save));
        assert_eq!(parse_command("x"), None);
    }
}
