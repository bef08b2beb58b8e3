use anyhow::{Context, Result, bail};
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use log::{debug, info};
use std::path::Path;

use crate::audio::analysis::{peak_db, rms_db};
use crate::audio::engine::{AudioProcessor, BusLayout, Engine};

/// Interleaved audio loaded from disk.
pub struct WavData {
    pub samples: Vec<f32>,
    pub channels: usize,
    pub sample_rate: u32,
}

pub struct RenderSummary {
    pub frames: usize,
    pub channels: usize,
    pub sample_rate: u32,
    pub input_peak_db: f32,
    pub output_peak_db: f32,
    pub output_rms_db: f32,
}

impl std::fmt::Display for RenderSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "Frames: {} ({} ch @ {} Hz)",
            self.frames, self.channels, self.sample_rate
        )?;
        writeln!(f, "Input peak: {:.2} dBFS", self.input_peak_db)?;
        writeln!(f, "Output peak: {:.2} dBFS", self.output_peak_db)?;
        write!(f, "Output RMS: {:.2} dBFS", self.output_rms_db)
    }
}

pub fn read_wav(path: &Path) -> Result<WavData> {
    let mut reader = WavReader::open(path)
        .with_context(|| format!("failed to open WAV file '{}'", path.display()))?;
    let spec = reader.spec();

    let samples = match spec.sample_format {
        SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<Result<Vec<_>, _>>()
            .context("failed to read float samples")?,
        SampleFormat::Int => {
            let scale = 1.0 / (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 * scale))
                .collect::<Result<Vec<_>, _>>()
                .context("failed to read integer samples")?
        }
    };

    debug!(
        "Read {} samples from '{}' ({:?})",
        samples.len(),
        path.display(),
        spec
    );

    Ok(WavData {
        samples,
        channels: spec.channels as usize,
        sample_rate: spec.sample_rate,
    })
}

/// Writes interleaved samples as 32-bit float WAV.
pub fn write_wav(path: &Path, samples: &[f32], channels: usize, sample_rate: u32) -> Result<()> {
    let spec = WavSpec {
        channels: channels as u16,
        sample_rate,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };

    let mut writer = WavWriter::create(path, spec)
        .with_context(|| format!("failed to create WAV file '{}'", path.display()))?;
    for &sample in samples {
        writer
            .write_sample(sample)
            .context("failed to write sample")?;
    }
    writer.finalize().context("failed to finalize WAV file")?;

    Ok(())
}

/// Runs a whole file through the engine in blocks of `block_size` frames.
pub fn render(
    input: &Path,
    output: &Path,
    engine: &mut Engine,
    block_size: usize,
) -> Result<RenderSummary> {
    let WavData {
        mut samples,
        channels,
        sample_rate,
    } = read_wav(input)?;

    if !engine.set_bus_layout(BusLayout::new(channels, channels)) {
        bail!("unsupported channel count {channels}, only mono and stereo files can be processed");
    }
    engine
        .prepare(sample_rate as f32, block_size, channels)
        .context("failed to prepare engine")?;

    let input_peak_db = peak_db(&samples);
    engine.process_interleaved(&mut samples, channels)?;

    write_wav(output, &samples, channels, sample_rate)?;
    info!("Rendered '{}' -> '{}'", input.display(), output.display());

    Ok(RenderSummary {
        frames: samples.len() / channels,
        channels,
        sample_rate,
        input_peak_db,
        output_peak_db: peak_db(&samples),
        output_rms_db: rms_db(&samples),
    })
}
