use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use clap::Parser;
use metro_core::{
    ConfigManager, Effect, EffectParams, EffectType, Interval, Metro, Metronome, Ratio,
    SystemClock, TapTempo,
};
use tokio::io::{AsyncBufReadExt, BufReader};

/// Metronome that renders beat-synced oscillators once per frame.
#[derive(Parser, Debug)]
#[command(name = "metro")]
#[command(about = "Beat and bar clock for frame-driven effects")]
struct Args {
    /// Tempo in beats per minute (overrides the config file)
    #[arg(long)]
    bpm: Option<f64>,

    /// Beats per bar (overrides the config file)
    #[arg(long)]
    bpb: Option<u32>,

    /// Frames rendered per second (overrides the config file)
    #[arg(long)]
    fps: Option<u32>,

    /// Stop after this many frames; 0 runs until interrupted
    #[arg(long, default_value = "0")]
    frames: u64,

    /// Configuration file (default: metro.json)
    #[arg(long)]
    config: Option<PathBuf>,
}

fn demo_effects() -> Result<Vec<(&'static str, Effect)>, anyhow::Error> {
    Ok(vec![
        ("pulse", Effect::new(EffectType::Sine, EffectParams::default())),
        (
            "eighths",
            Effect::new(
                EffectType::Square,
                EffectParams {
                    ratio: Ratio::per_marker(2)?,
                    ..EffectParams::default()
                },
            ),
        ),
        (
            "sweep",
            Effect::new(
                EffectType::Triangle,
                EffectParams {
                    interval: Interval::Bar,
                    ratio: Ratio::integer(2)?,
                    phase: 0.25,
                },
            ),
        ),
    ])
}

/// Apply one line of operator input. An empty line is a tap.
fn handle_command(
    line: &str,
    metro: &Metronome<SystemClock>,
    tapper: &TapTempo,
) -> Result<(), anyhow::Error> {
    let mut parts = line.split_whitespace();
    let Some(command) = parts.next() else {
        if let Some(bpm) = tapper.tap(metro)? {
            log::info!("Tapped tempo: {:.2} BPM", bpm);
        }
        return Ok(());
    };

    let arg = parts.next();
    match (command, arg) {
        ("reset", None) => metro.reset(),
        ("bpm", Some(value)) => metro.set_bpm(value.parse()?)?,
        ("bpb", Some(value)) => metro.set_bpb(value.parse()?)?,
        ("beat", Some(value)) => metro.set_start(value.parse()?),
        ("bar", Some(value)) => metro.set_bar_start(value.parse()?),
        ("phase", Some(value)) => metro.set_beat_phase(value.parse()?)?,
        ("bar-phase", Some(value)) => metro.set_bar_phase(value.parse()?)?,
        _ => {
            return Err(anyhow!(
                "Unknown command '{}'. Try: <enter> (tap), reset, bpm N, bpb N, beat N, bar N, phase X, bar-phase X",
                line.trim()
            ))
        }
    }
    Ok(())
}

async fn read_commands(metro: Arc<Metronome<SystemClock>>) {
    let tapper = TapTempo::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if let Err(e) = handle_command(&line, &metro, &tapper) {
                    log::warn!("{}", e);
                }
            }
            Ok(None) => break,
            Err(e) => {
                log::warn!("Error reading input: {}", e);
                break;
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut config = ConfigManager::new(args.config.clone());
    let mut settings = config.load()?;
    if let Some(bpm) = args.bpm {
        settings.bpm = bpm;
    }
    if let Some(bpb) = args.bpb {
        settings.beats_per_bar = bpb;
    }
    if let Some(fps) = args.fps {
        settings.target_fps = fps;
    }
    ConfigManager::validate_settings(&settings).map_err(|errors| anyhow!(errors.join(", ")))?;

    println!("Config: {}", config.config_path().display());
    println!(
        "Tempo: {:.1} BPM, {} beats per bar, {} fps",
        settings.bpm, settings.beats_per_bar, settings.target_fps
    );

    let metro = Arc::new(settings.metronome(SystemClock)?);
    let effects = demo_effects()?;
    for (name, effect) in &effects {
        println!("  {:<8} {}", name, effect);
    }

    tokio::spawn(read_commands(Arc::clone(&metro)));

    let frame_time = Duration::from_secs_f64(1.0 / f64::from(settings.target_fps));
    let mut ticker = tokio::time::interval(frame_time);
    let mut frame: u64 = 0;

    loop {
        ticker.tick().await;

        // One snapshot per frame; every effect reads the same instant.
        let snapshot = metro.snapshot();
        let values: Vec<String> = effects
            .iter()
            .map(|(name, effect)| format!("{}={:3}", name, effect.value(&snapshot)))
            .collect();

        let downbeat = if snapshot.is_downbeat() { '*' } else { ' ' };
        print!(
            "\r{:>8} {} {}  {}",
            snapshot.marker(),
            downbeat,
            snapshot,
            values.join(" ")
        );
        std::io::stdout().flush()?;

        frame += 1;
        if args.frames != 0 && frame >= args.frames {
            println!();
            break;
        }
    }

    Ok(())
}
