// acidstep - Command line front end

use std::error::Error;
use std::io::BufRead;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clap::{Parser, Subcommand};

use acidstep::audio::device::AudioDeviceManager;
use acidstep::audio::export::{RenderSettings, export_wav, render_pattern};
use acidstep::midi::device::{PortSelector, list_output_ports, open_output};
use acidstep::synth::pitch::{PITCH_TABLE, note_name};
use acidstep::{
    AudioClock, AudioEngine, MidiBridge, MidiSink, MidirSink, Pattern, PatternStore, Scheduler,
    SequencerConfig, Sequencer, SharedSynthParams, SharedTransport, StepUpdate, SystemWallClock,
    VoiceCommandSender, WaveformType, create_command_channel,
};

#[derive(Parser)]
#[command(name = "acidstep", version, about = "16-step sequencer and monophonic bass synth")]
struct Cli {
    /// Config file (defaults to <config dir>/acidstep/config.ron)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Play the demo pattern in real time
    Play {
        /// MIDI output port, by name or index
        #[arg(long)]
        midi_port: Option<String>,
        /// Tempo in BPM (20..300)
        #[arg(long)]
        tempo: Option<f32>,
        /// Stop after this many seconds instead of waiting for Enter
        #[arg(long)]
        seconds: Option<f64>,
    },
    /// Render the demo pattern to a 16-bit mono WAV file
    Render {
        output: PathBuf,
        #[arg(long, default_value_t = 4)]
        loops: usize,
        #[arg(long)]
        tempo: Option<f32>,
        #[arg(long, default_value_t = 44100)]
        sample_rate: u32,
    },
    /// List audio and MIDI output devices
    ListDevices,
}

/// A short acid line exercising accents and slides
fn demo_pattern() -> Result<Pattern, acidstep::PatternError> {
    // (step, pitch index, accent, slide)
    const LINE: [(usize, usize, bool, bool); 11] = [
        (0, 0, true, false),
        (1, 0, false, false),
        (2, 12, false, true),
        (3, 10, false, false),
        (4, 0, true, false),
        (6, 3, false, true),
        (7, 5, false, false),
        (8, 0, true, false),
        (10, 7, false, true),
        (11, 8, true, false),
        (14, 12, false, true),
    ];

    let mut pattern = Pattern::new();
    for (step, pitch, accent, slide) in LINE {
        pattern.set(
            step,
            StepUpdate::new()
                .active(true)
                .pitch(pitch)
                .accent(accent)
                .slide(slide),
        )?;
    }
    Ok(pattern)
}

fn load_config(path: Option<PathBuf>) -> Result<SequencerConfig, Box<dyn Error>> {
    let config = match path {
        Some(path) => SequencerConfig::load(&path)?,
        None => SequencerConfig::load_default()?,
    };
    Ok(config)
}

fn open_midi_sink(port: &str, wall: SystemWallClock) -> Option<MidirSink> {
    let opened = open_output(&PortSelector::parse(port))
        .and_then(|(connection, name)| MidirSink::new(connection, name, wall));
    match opened {
        Ok(sink) => Some(sink),
        Err(e) => {
            log::warn!("{}; continuing with internal audio only", e);
            None
        }
    }
}

const CONSOLE_HELP: &str = "Commands: tempo <bpm>, cutoff|res|decay|env <0-100>, \
wave saw|square, vol <0-1>, step <0-15> <pitch 0-12|off> [accent] [slide], \
empty line to stop";

/// Apply one console line; returns `false` when playback should end
fn console_command<V>(line: &str, sequencer: &Sequencer<V>, engine: &AudioEngine) -> bool
where
    V: acidstep::VoiceTarget + Send + 'static,
{
    let mut words = line.split_whitespace();
    let Some(command) = words.next() else {
        return false;
    };
    let args: Vec<&str> = words.collect();
    let number = |i: usize| args.get(i).and_then(|w| w.parse::<f32>().ok());

    match (command, number(0)) {
        ("q" | "quit", _) => return false,
        ("tempo", Some(bpm)) => {
            sequencer.set_tempo(bpm);
        }
        ("cutoff", Some(v)) => {
            sequencer.set_cutoff(v);
        }
        ("res", Some(v)) => {
            sequencer.set_resonance(v);
        }
        ("decay", Some(v)) => {
            sequencer.set_decay(v);
        }
        ("env", Some(v)) => {
            sequencer.set_env_mod(v);
        }
        ("vol", Some(v)) => engine.set_volume(v),
        ("wave", _) => match args.first().copied() {
            Some("saw") => {
                sequencer.set_waveform(WaveformType::Saw);
            }
            Some("square") => {
                sequencer.set_waveform(WaveformType::Square);
            }
            _ => println!("wave saw|square"),
        },
        ("step", _) => {
            let Some(index) = args.first().and_then(|w| w.parse::<usize>().ok()) else {
                println!("step <0-15> <pitch 0-12|off> [accent] [slide]");
                return true;
            };
            let update = match args.get(1).copied() {
                Some("off") => StepUpdate::new().active(false),
                Some(pitch) => match pitch.parse::<usize>() {
                    Ok(pitch) => StepUpdate::new()
                        .active(true)
                        .pitch(pitch)
                        .accent(args.contains(&"accent"))
                        .slide(args.contains(&"slide")),
                    Err(_) => {
                        println!("step <0-15> <pitch 0-12|off> [accent] [slide]");
                        return true;
                    }
                },
                None => StepUpdate::new().active(true),
            };
            if let Err(e) = sequencer.set_step(index, update) {
                println!("{}", e);
            }
        }
        _ => println!("{}", CONSOLE_HELP),
    }
    true
}

fn play(
    config: SequencerConfig,
    midi_port: Option<String>,
    tempo: Option<f32>,
    seconds: Option<f64>,
) -> Result<(), Box<dyn Error>> {
    let (producer, consumer) = create_command_channel(config.command_queue_capacity);
    let engine = AudioEngine::new(config.audio_device.as_deref(), consumer, config.master_volume)?;

    let audio_clock: Arc<dyn AudioClock> = Arc::new(engine.clock());
    let wall = SystemWallClock::new();

    let pattern = PatternStore::new();
    pattern.replace(demo_pattern()?)?;

    let scheduler = Scheduler::new(
        audio_clock.clone(),
        pattern,
        SharedTransport::new(config.tempo),
        SharedSynthParams::new(config.synth),
        VoiceCommandSender::new(producer),
        MidiBridge::new(audio_clock, Arc::new(wall)),
    )
    .with_timing(config.scheduler_timing());
    let mut sequencer = Sequencer::new(scheduler, config.tick_interval());

    if let Some(bpm) = tempo {
        sequencer.set_tempo(bpm);
    }

    let mut midi_health = None;
    if let Some(port) = midi_port.or(config.midi_output.clone()) {
        if let Some(sink) = open_midi_sink(&port, wall) {
            midi_health = Some(sink.health().clone());
            sequencer.select_output(Some(Box::new(sink)));
        }
    }

    sequencer.start();
    match seconds {
        Some(seconds) => thread::sleep(Duration::from_secs_f64(seconds.max(0.0))),
        None => {
            println!("Playing at {:.0} BPM. {}", sequencer.tempo(), CONSOLE_HELP);
            for line in std::io::stdin().lock().lines() {
                if !console_command(line?.trim(), &sequencer, &engine) {
                    break;
                }
            }
        }
    }
    sequencer.stop();

    // Let All Notes Off reach the port before exiting
    if let Some(output) = sequencer.select_output(None) {
        output.close();
    }
    log::info!("Audio output '{}': {}", engine.device_name(), engine.health());
    if let Some(health) = midi_health {
        log::info!("MIDI output: {}", health);
    }
    Ok(())
}

fn render(
    config: SequencerConfig,
    output: PathBuf,
    loops: usize,
    tempo: Option<f32>,
    sample_rate: u32,
) -> Result<(), Box<dyn Error>> {
    let settings = RenderSettings {
        sample_rate,
        tempo: tempo.unwrap_or(config.tempo),
        loops,
        ..RenderSettings::default()
    };
    let samples = render_pattern(&demo_pattern()?, config.synth, &settings)?;
    export_wav(&output, &samples, sample_rate)?;
    println!("Wrote {}", output.display());
    Ok(())
}

fn list_devices() -> Result<(), Box<dyn Error>> {
    println!("Audio outputs:");
    match AudioDeviceManager::new().list_output_devices() {
        Ok(devices) if devices.is_empty() => println!("  (none)"),
        Ok(devices) => {
            for device in devices {
                let marker = if device.is_default { " (default)" } else { "" };
                println!("  {}{}", device.name, marker);
            }
        }
        Err(e) => println!("  unavailable: {}", e),
    }

    println!("MIDI outputs:");
    match list_output_ports() {
        Ok(ports) if ports.is_empty() => println!("  (none)"),
        Ok(ports) => {
            for port in ports {
                println!("  [{}] {}", port.index, port.name);
            }
        }
        Err(e) => println!("  unavailable: {}", e),
    }

    println!(
        "Pitch range: {} .. {}",
        note_name(PITCH_TABLE[0]),
        note_name(PITCH_TABLE[PITCH_TABLE.len() - 1])
    );
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let result = load_config(cli.config).and_then(|config| match cli.command {
        Command::Play {
            midi_port,
            tempo,
            seconds,
        } => play(config, midi_port, tempo, seconds),
        Command::Render {
            output,
            loops,
            tempo,
            sample_rate,
        } => render(config, output, loops, tempo, sample_rate),
        Command::ListDevices => list_devices(),
    });

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
