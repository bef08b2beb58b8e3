use anyhow::{Context, Result, anyhow};
use assert_no_alloc::AllocDisabler;
use chrono::Local;
use clap::{Args, Parser, Subcommand};
use crossbeam::channel::{self, Receiver, RecvTimeoutError};
use log::{info, warn};
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::thread;
use std::time::Duration;
use switchfx::audio::analysis::FrequencyResponse;
use switchfx::audio::engine::{Engine, EngineHandle};
use switchfx::audio::manager::Manager as AudioManager;
use switchfx::audio::offline;
use switchfx::control::{ControlCommand, ControlSurface, HELP};
use switchfx::fx::stages::filter::FilterTopology;
use switchfx::params::{ParamId, ProcessingMode};
use switchfx::preset::Manager as PresetManager;
use switchfx::settings::Settings;

#[cfg(debug_assertions)]
#[global_allocator]
static A: AllocDisabler = AllocDisabler;

#[derive(Parser, Debug)]
#[command(name = "switchfx")]
#[command(version)]
#[command(about = "A switchable filter / compressor effect.")]
struct Cli {
    #[arg(
        long,
        global = true,
        env = "SWITCHFX_PRESET_DIR",
        help = "Directory holding preset files (overrides settings)"
    )]
    preset_dir: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Process a WAV file offline
    Render {
        #[arg(long, short)]
        input: PathBuf,
        #[arg(long, short, help = "Defaults to processed_<timestamp>.wav")]
        output: Option<PathBuf>,
        #[arg(long, help = "Frames per processing block (overrides settings)")]
        block_size: Option<usize>,
        #[command(flatten)]
        params: ParamArgs,
    },
    /// Print the filter magnitude response at octave points
    Response {
        #[arg(long, value_enum, default_value_t = FilterTopology::Lowpass)]
        topology: FilterTopology,
        #[arg(long, default_value_t = 400.0)]
        frequency: f32,
        #[arg(long, default_value_t = 1.0)]
        resonance: f32,
        #[arg(long, default_value_t = 48_000.0)]
        sample_rate: f32,
        #[arg(long, default_value_t = 8192)]
        fft_size: usize,
    },
    /// Run the effect on live JACK ports
    Live {
        #[command(flatten)]
        params: ParamArgs,
    },
    /// List stored presets
    Presets,
}

#[derive(Args, Debug)]
struct ParamArgs {
    #[arg(long, help = "Load a stored preset before applying other flags")]
    preset: Option<String>,
    #[arg(long, value_enum)]
    mode: Option<ProcessingMode>,
    #[arg(long, value_enum)]
    topology: Option<FilterTopology>,
    #[arg(long, help = "Filter cutoff in Hz")]
    frequency: Option<f32>,
    #[arg(long, help = "Filter resonance (Q)")]
    resonance: Option<f32>,
    #[arg(long, help = "Compressor attack in ms")]
    attack: Option<f32>,
    #[arg(long, help = "Compressor ratio")]
    ratio: Option<f32>,
    #[arg(long, help = "Compressor release in ms")]
    release: Option<f32>,
    #[arg(long, allow_hyphen_values = true, help = "Compressor threshold in dB")]
    threshold: Option<f32>,
    #[arg(long, help = "Make-up gain in dB")]
    gain: Option<f32>,
}

impl ParamArgs {
    fn values(&self) -> [(ParamId, Option<f32>); ParamId::COUNT] {
        [
            (ParamId::FilterFrequency, self.frequency),
            (ParamId::FilterResonance, self.resonance),
            (ParamId::CompressorAttack, self.attack),
            (ParamId::CompressorRatio, self.ratio),
            (ParamId::CompressorRelease, self.release),
            (ParamId::CompressorThreshold, self.threshold),
            (ParamId::GainGain, self.gain),
        ]
    }

    /// Applies the preset first, then any explicit flags on top of it.
    fn apply(&self, engine: &EngineHandle, presets: &PresetManager) -> Result<()> {
        if let Some(name) = &self.preset {
            let preset = presets
                .get_preset_by_name(name)
                .ok_or_else(|| anyhow!("no preset named '{name}'"))?;
            engine.restore(&preset.state);
            info!("Loaded preset '{name}'");
        }

        if let Some(mode) = self.mode {
            engine.set_mode(mode);
        }
        if let Some(topology) = self.topology {
            engine.set_topology(topology);
        }

        for (id, value) in self.values() {
            let Some(value) = value else { continue };
            let applied = engine.parameters().set_clamped(id, value);
            if applied != value {
                warn!("{id} = {value} is out of range, using {applied}");
            }
        }

        Ok(())
    }
}

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    env_logger::init();

    let cli = Cli::parse();

    info!("switchfx v{}", env!("CARGO_PKG_VERSION"));
    info!("Args: {cli:?}");

    let settings = Settings::load().context("failed to load settings")?;
    let preset_dir = cli
        .preset_dir
        .clone()
        .unwrap_or_else(|| settings.preset_dir.clone());

    match cli.command {
        Command::Render {
            input,
            output,
            block_size,
            params,
        } => {
            let presets = PresetManager::new(&preset_dir)?;
            let (mut engine, handle) = Engine::new();
            params.apply(&handle, &presets)?;

            let output = output.unwrap_or_else(default_output_name);
            let block_size = block_size.unwrap_or(settings.render_block_size);
            info!("{}", handle.snapshot());

            let summary = offline::render(&input, &output, &mut engine, block_size)
                .with_context(|| format!("failed to render '{}'", input.display()))?;
            println!("{summary}");
        }
        Command::Response {
            topology,
            frequency,
            resonance,
            sample_rate,
            fft_size,
        } => {
            let frequency = ParamId::FilterFrequency.clamp(frequency);
            let resonance = ParamId::FilterResonance.clamp(resonance);
            let response = FrequencyResponse::of_filter(
                topology,
                frequency,
                resonance,
                sample_rate,
                fft_size,
            )?;
            println!("{topology} @ {frequency} Hz, Q {resonance}");
            for (freq, db) in response.octave_points() {
                println!("{freq:>10.2} Hz  {db:>8.2} dB");
            }
        }
        Command::Live { params } => {
            let presets = PresetManager::new(&preset_dir)?;
            run_live(&settings, presets, &params)?;
        }
        Command::Presets => {
            let presets = PresetManager::new(&preset_dir)?;
            if presets.get_presets().is_empty() {
                println!("No presets in '{preset_dir}'");
            }
            for preset in presets.get_presets() {
                println!("{preset}");
                if let Some(description) = &preset.description {
                    println!("    {description}");
                }
            }
        }
    }

    Ok(())
}

fn default_output_name() -> PathBuf {
    PathBuf::from(format!(
        "processed_{}.wav",
        Local::now().format("%Y%m%d_%H%M%S")
    ))
}

fn run_live(settings: &Settings, presets: PresetManager, params: &ParamArgs) -> Result<()> {
    settings.apply_to_environment();

    let (engine, handle) = Engine::new();
    params.apply(&handle, &presets)?;

    let manager = AudioManager::new(&settings.audio, engine).context("failed to start JACK")?;
    info!(
        "Running at {} Hz, {} frames per period",
        manager.sample_rate(),
        manager.buffer_size()
    );

    let running = Arc::new(AtomicBool::new(true));
    let shutdown_flag = Arc::clone(&running);

    ctrlc::set_handler(move || {
        info!("Ctrl+C received, shutting down...");
        shutdown_flag.store(false, Ordering::SeqCst);
    })
    .context("error setting Ctrl+C handler")?;

    let lines = spawn_stdin_reader();
    let mut surface = ControlSurface::new(manager.engine().clone(), presets);
    println!("{HELP}");

    while running.load(Ordering::SeqCst) {
        let line = match lines.recv_timeout(Duration::from_millis(200)) {
            Ok(line) => line,
            Err(RecvTimeoutError::Timeout) => continue,
            // stdin closed; keep running until Ctrl+C
            Err(RecvTimeoutError::Disconnected) => {
                thread::sleep(Duration::from_millis(200));
                continue;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let command = match line.parse::<ControlCommand>() {
            Ok(command) => command,
            Err(e) => {
                println!("{e}");
                continue;
            }
        };
        match surface.execute(&command) {
            Ok(reply) => println!("{reply}"),
            Err(e) => println!("{e:#}"),
        }
        if command == ControlCommand::Quit {
            break;
        }
    }

    manager.disconnect_all();
    Ok(())
}

fn spawn_stdin_reader() -> Receiver<String> {
    let (tx, rx) = channel::unbounded();
    thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}
