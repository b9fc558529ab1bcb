use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, bail, Context, Result};
use crabcapture::recording::Codec;
use crabcapture::source::{FrameSource, SyntheticConfig, SyntheticSource};
use crabcapture::{AppConfig, CaptureCoordinator, CaptureEvent, NullPreview};

const USAGE: &str = "Usage: crabcapture-cli <command> [args]

Commands:
  record   [--device <id> | --synthetic] [--output <path>] [--duration <secs>] [--json]
  snapshot [--device <id> | --synthetic] [--output <path>]
  codec    <path>

Options:
  --config <path>   configuration file (default: crabcapture.toml)";

fn main() -> Result<()> {
    crabcapture::init_logging();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("{}", USAGE);
        std::process::exit(1);
    }

    let command = &args[1];
    match command.as_str() {
        "record" => cmd_record(&args),
        "snapshot" => cmd_snapshot(&args),
        "codec" => cmd_codec(&args),
        "-h" | "--help" | "help" => {
            println!("{}", USAGE);
            Ok(())
        }
        _ => {
            eprintln!("Unknown command: {}\n\n{}", command, USAGE);
            std::process::exit(1);
        }
    }
}

/// Options shared by the capture commands
struct CaptureArgs {
    device: Option<String>,
    synthetic: bool,
    output: Option<PathBuf>,
    duration: Option<Duration>,
    config: PathBuf,
    json: bool,
}

fn parse_capture_args(args: &[String]) -> Result<CaptureArgs> {
    let mut parsed = CaptureArgs {
        device: None,
        synthetic: false,
        output: None,
        duration: None,
        config: AppConfig::default_path(),
        json: false,
    };

    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            "--device" => parsed.device = Some(value(args, &mut i)?.to_string()),
            "--synthetic" => parsed.synthetic = true,
            "--output" => parsed.output = Some(PathBuf::from(value(args, &mut i)?)),
            "--duration" => {
                let secs: f64 = value(args, &mut i)?.parse().context("invalid --duration")?;
                if !(secs.is_finite() && secs > 0.0) {
                    bail!("--duration must be a positive number of seconds");
                }
                parsed.duration = Some(Duration::from_secs_f64(secs));
            }
            "--config" => parsed.config = PathBuf::from(value(args, &mut i)?),
            "--json" => parsed.json = true,
            other => bail!("unexpected argument '{}'\n\n{}", other, USAGE),
        }
        i += 1;
    }
    Ok(parsed)
}

fn value<'a>(args: &'a [String], i: &mut usize) -> Result<&'a str> {
    let flag = &args[*i];
    *i += 1;
    args.get(*i)
        .map(String::as_str)
        .ok_or_else(|| anyhow!("{} needs a value", flag))
}

/// Pick the frame source and the device handle to start it with
fn open_source(args: &CaptureArgs, config: &AppConfig) -> Result<(Box<dyn FrameSource>, String)> {
    let resolution = config.capture.resolution();
    if args.synthetic {
        let synthetic = SyntheticConfig::default()
            .with_size(resolution.width, resolution.height)
            .with_frame_rate(config.capture.frame_rate as f64);
        let device = synthetic.devices[0].clone();
        let source: Box<dyn FrameSource> = Box::new(SyntheticSource::new(synthetic));
        return Ok((source, device));
    }

    let device = args
        .device
        .clone()
        .unwrap_or_else(|| config.capture.device.clone());

    #[cfg(feature = "camera")]
    {
        let source: Box<dyn FrameSource> = Box::new(crabcapture::source::CameraSource::new(
            resolution,
            config.capture.frame_rate,
        ));
        return Ok((source, device));
    }

    #[cfg(not(feature = "camera"))]
    bail!(
        "camera input for '{}' is not compiled in; rebuild with --features camera or use --synthetic",
        device
    )
}

/// Timestamped file name inside the configured output directory
fn default_output(config: &AppConfig, extension: &str) -> Result<PathBuf> {
    let dir = Path::new(&config.recording.output_directory);
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create {}", dir.display()))?;
    let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    Ok(dir.join(format!("capture_{}.{}", stamp, extension)))
}

fn default_video_extension() -> &'static str {
    if cfg!(feature = "recording") {
        "mp4"
    } else {
        "avi"
    }
}

fn cmd_record(args: &[String]) -> Result<()> {
    let args = parse_capture_args(args)?;
    let config = AppConfig::load(&args.config)?;
    let (source, device) = open_source(&args, &config)?;

    let output = match args.output.clone() {
        Some(path) => path,
        None => default_output(&config, default_video_extension())?,
    };

    let coordinator = CaptureCoordinator::from_config(&config, source, Arc::new(NullPreview));
    let events = coordinator.events();

    let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(1);
    ctrlc::set_handler(move || {
        let _ = stop_tx.try_send(());
    })
    .context("failed to install Ctrl-C handler")?;

    coordinator.start_capture(&device)?;
    let codec = coordinator.start_recording(&output)?;
    if !args.json {
        println!("Recording {} to {} ({})", device, output.display(), codec);
        match args.duration {
            Some(d) => println!("Stopping after {:.1}s or on Ctrl-C", d.as_secs_f64()),
            None => println!("Press Ctrl-C to stop"),
        }
    }

    match args.duration {
        Some(duration) => {
            let _ = stop_rx.recv_timeout(duration);
        }
        None => {
            let _ = stop_rx.recv();
        }
    }

    let stats = coordinator.stop_recording()?;
    coordinator.stop_capture()?;

    let dropped = events
        .try_iter()
        .filter(|e| matches!(e, CaptureEvent::FrameDropped { .. }))
        .count();

    let stats = stats.ok_or_else(|| anyhow!("recording ended before it was finalized"))?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        println!(
            "Wrote {} frames ({:.1}s, {} bytes, {} dropped) to {}",
            stats.frames_written,
            stats.duration_secs,
            stats.bytes_written,
            dropped,
            stats.output_path
        );
    }
    Ok(())
}

fn cmd_snapshot(args: &[String]) -> Result<()> {
    let args = parse_capture_args(args)?;
    let config = AppConfig::load(&args.config)?;
    let (source, device) = open_source(&args, &config)?;

    let output = match args.output.clone() {
        Some(path) => path,
        None => default_output(&config, "png")?,
    };

    let coordinator = CaptureCoordinator::from_config(&config, source, Arc::new(NullPreview));
    coordinator.start_capture(&device)?;

    let deadline = Instant::now() + args.duration.unwrap_or(Duration::from_secs(5));
    while coordinator.latest_frame().is_none() {
        if Instant::now() >= deadline {
            coordinator.stop_capture()?;
            bail!("no frame arrived from '{}'", device);
        }
        std::thread::sleep(Duration::from_millis(10));
    }

    coordinator.save_snapshot(&output)?;
    coordinator.stop_capture()?;
    println!("Saved {}", output.display());
    Ok(())
}

fn cmd_codec(args: &[String]) -> Result<()> {
    let path = args
        .get(2)
        .ok_or_else(|| anyhow!("Usage: crabcapture-cli codec <path>"))?;
    let codec = Codec::for_path(path);
    println!("{} (fourcc {})", codec, codec.fourcc().code());
    Ok(())
}
