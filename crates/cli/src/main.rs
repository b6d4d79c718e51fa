mod settings;

use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use std::thread;

use clap::{Args, Parser, Subcommand};
use crossbeam_channel::{bounded, select, Receiver};

use fixcam_core::capture::domain::device_catalog::DeviceCatalog;
use fixcam_core::capture::infrastructure::nokhwa_camera::NokhwaCatalog;
use fixcam_core::overlay::infrastructure::glyph_timestamp_overlay::GlyphTimestampOverlay;
use fixcam_core::recording::capture_loop::RecordingSummary;
use fixcam_core::recording::capture_session::CaptureSession;
use fixcam_core::recording::recording_config::RecordingConfig;
use fixcam_core::recording::recording_error::RecordingError;
use fixcam_core::recording::segment_catalog::list_segments;
use fixcam_core::recording::session_event::SessionEvent;
use fixcam_core::recording::session_logger::StdoutSessionLogger;
use fixcam_core::recording::session_state::SessionState;
use fixcam_core::video::domain::video_writer::{VideoWriter, VideoWriterFactory};
use fixcam_core::video::infrastructure::ffmpeg_writer::FfmpegWriter;

use settings::{ResolutionPreset, Settings};

/// Fixed-position camera recorder writing timestamped, time-rotated segments.
#[derive(Parser)]
#[command(name = "fixcam", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List connected cameras.
    Devices,
    /// Record until interrupted (Ctrl-C or SIGTERM) or `q` + Enter is typed.
    Record(RecordArgs),
    /// List recorded segments in a directory, oldest first.
    Segments {
        /// Directory holding mv_*.mp4 files.
        dir: PathBuf,
    },
}

#[derive(Args)]
struct RecordArgs {
    /// Camera index as shown by `fixcam devices`.
    #[arg(long)]
    device: Option<u32>,

    /// Existing directory the segments are written to.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Frames per second (10, 15, 30 and 60 are typical).
    #[arg(long)]
    fps: Option<u32>,

    /// Length of each segment file in minutes.
    #[arg(long)]
    segment_minutes: Option<u32>,

    /// Capture size: hd, sd or WIDTHxHEIGHT.
    #[arg(long)]
    resolution: Option<ResolutionPreset>,

    /// TrueType/OpenType font for the timestamp overlay.
    #[arg(long)]
    font: Option<PathBuf>,

    /// Do not remember these choices for the next run.
    #[arg(long)]
    no_save: bool,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    match cli.command {
        Command::Devices => run_devices(),
        Command::Record(args) => run_record(args),
        Command::Segments { dir } => run_segments(&dir),
    }
}

fn run_devices() -> Result<(), Box<dyn std::error::Error>> {
    let devices = NokhwaCatalog::new().list_devices()?;
    if devices.is_empty() {
        println!("No cameras found");
    }
    for device in devices {
        println!("{}: {}", device.index, device.name);
    }
    Ok(())
}

fn run_record(args: RecordArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut settings = Settings::load();
    apply_overrides(&mut settings, &args);

    let output_dir = settings
        .output_dir
        .clone()
        .ok_or("No output directory: pass --output DIR")?;
    let config = RecordingConfig::new(
        output_dir,
        settings.fps,
        settings.segment_minutes,
        settings.resolution.resolution(),
    );
    config.validate()?;

    let overlay =
        GlyphTimestampOverlay::resolve(settings.font.as_deref()).map_err(RecordingError::from)?;
    let new_writer: VideoWriterFactory =
        Arc::new(|| -> Box<dyn VideoWriter> { Box::new(FfmpegWriter::new()) });
    let mut session =
        CaptureSession::new(Box::new(NokhwaCatalog::new()), Arc::new(overlay), new_writer)
            .with_logger(Box::new(StdoutSessionLogger::default()));
    let events = session.events();
    let quit = spawn_quit_listener()?;

    session.connect(settings.device)?;
    session.start(config)?;
    if !args.no_save {
        settings.save();
    }
    log::info!(
        "Recording camera {} at {} fps, {} in {}-minute segments. Press Ctrl-C or type q + Enter to stop.",
        settings.device,
        settings.fps,
        settings.resolution,
        settings.segment_minutes
    );

    loop {
        select! {
            recv(events) -> event => {
                let Ok(event) = event else { break };
                let finished = event == SessionEvent::StateChanged(SessionState::Idle);
                report(&event);
                if finished {
                    break;
                }
            }
            recv(quit) -> _ => break,
        }
    }

    session.stop();
    for event in events.try_iter() {
        report(&event);
    }

    match session.take_outcome() {
        Some(Ok(summary)) => {
            print_summary(&summary);
            Ok(())
        }
        Some(Err(e)) => Err(e.into()),
        None => Ok(()),
    }
}

fn run_segments(dir: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let segments = list_segments(dir)?;
    if segments.is_empty() {
        println!("No segments in {}", dir.display());
    }
    for segment in segments {
        let name = segment
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        match segment.probe() {
            Ok(meta) => println!(
                "{name}  {}x{}  {:.0} fps  {} frames  {:.1}s",
                meta.width,
                meta.height,
                meta.fps,
                meta.total_frames,
                meta.duration_secs()
            ),
            Err(e) => println!("{name}  unreadable: {e}"),
        }
    }
    Ok(())
}

fn apply_overrides(settings: &mut Settings, args: &RecordArgs) {
    if let Some(device) = args.device {
        settings.device = device;
    }
    if let Some(output) = &args.output {
        settings.output_dir = Some(output.clone());
    }
    if let Some(fps) = args.fps {
        settings.fps = fps;
    }
    if let Some(minutes) = args.segment_minutes {
        settings.segment_minutes = minutes;
    }
    if let Some(resolution) = args.resolution {
        settings.resolution = resolution;
    }
    if let Some(font) = &args.font {
        settings.font = Some(font.clone());
    }
}

/// Fires on Ctrl-C, SIGTERM or a `q` line on stdin. The signal handler
/// keeps a sender for the life of the process, so the channel never
/// disconnects when stdin closes.
fn spawn_quit_listener() -> Result<Receiver<()>, ctrlc::Error> {
    let (tx, rx) = bounded(1);
    let on_signal = tx.clone();
    ctrlc::set_handler(move || {
        let _ = on_signal.try_send(());
    })?;
    thread::spawn(move || {
        if wait_for_quit_command(io::stdin().lock()) {
            let _ = tx.try_send(());
        }
    });
    Ok(rx)
}

/// True once a `q` line is read. End of input means no keyboard is
/// attached (nohup, services), so it returns false and recording goes on.
fn wait_for_quit_command(input: impl BufRead) -> bool {
    for line in input.lines() {
        match line {
            Ok(line) if line.trim().eq_ignore_ascii_case("q") => return true,
            Ok(_) => continue,
            Err(e) => {
                log::warn!("Stopped reading stdin: {e}");
                return false;
            }
        }
    }
    false
}

fn report(event: &SessionEvent) {
    match event {
        SessionEvent::StateChanged(state) => log::info!("Session {state}"),
        SessionEvent::SegmentOpened { sequence, path } => {
            log::info!("Segment {sequence} -> {}", path.display())
        }
        SessionEvent::SegmentClosed {
            sequence,
            path,
            frames,
        } => log::info!(
            "Segment {sequence} saved: {} ({frames} frames)",
            path.display()
        ),
        SessionEvent::Failed { kind, message } => log::error!("{kind}: {message}"),
    }
}

fn print_summary(summary: &RecordingSummary) {
    println!(
        "Recorded {} frames in {} segments:",
        summary.total_frames(),
        summary.segments.len()
    );
    for segment in &summary.segments {
        println!(
            "  {:>3}  {}  {} frames",
            segment.sequence,
            segment.path.display(),
            segment.frames
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn record_args(argv: &[&str]) -> RecordArgs {
        let mut full = vec!["fixcam", "record"];
        full.extend_from_slice(argv);
        match Cli::try_parse_from(full).unwrap().command {
            Command::Record(args) => args,
            _ => panic!("expected record"),
        }
    }

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_flags_override_settings() {
        let mut settings = Settings {
            device: 1,
            output_dir: Some(PathBuf::from("/old")),
            ..Settings::default()
        };
        let args = record_args(&[
            "--output",
            "/new",
            "--fps",
            "30",
            "--segment-minutes",
            "2",
            "--resolution",
            "sd",
        ]);
        apply_overrides(&mut settings, &args);

        assert_eq!(settings.device, 1);
        assert_eq!(settings.output_dir, Some(PathBuf::from("/new")));
        assert_eq!(settings.fps, 30);
        assert_eq!(settings.segment_minutes, 2);
        assert_eq!(settings.resolution, ResolutionPreset::Sd);
    }

    #[test]
    fn test_no_flags_keep_settings() {
        let mut settings = Settings::default();
        apply_overrides(&mut settings, &record_args(&[]));
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_bad_resolution_rejected_by_parser() {
        assert!(Cli::try_parse_from(["fixcam", "record", "--resolution", "huge"]).is_err());
    }

    #[test]
    fn test_q_line_requests_stop() {
        assert!(wait_for_quit_command(io::Cursor::new("status\n Q \n")));
    }

    #[test]
    fn test_end_of_input_does_not_request_stop() {
        assert!(!wait_for_quit_command(io::empty()));
        assert!(!wait_for_quit_command(io::Cursor::new("quit later\n")));
    }

    #[test]
    fn test_segments_requires_directory() {
        assert!(Cli::try_parse_from(["fixcam", "segments"]).is_err());
    }
}
