use anyhow::Result;
use switchfx::audio::analysis::{FrequencyResponse, peak, rms, sine};
use switchfx::audio::engine::{AudioProcessor, BusLayout, Engine, EngineHandle};
use switchfx::fx::stages::common::{db_to_lin, lin_to_db};
use switchfx::fx::stages::filter::FilterTopology;
use switchfx::params::{ParamId, ProcessingMode};

const SAMPLE_RATE: f32 = 44_100.0;
const BLOCK_SIZE: usize = 512;

fn prepared_engine(sample_rate: f32, block_size: usize, channels: usize) -> (Engine, EngineHandle) {
    let (mut engine, handle) = Engine::new();
    assert!(engine.set_bus_layout(BusLayout::new(channels, channels)));
    engine
        .prepare(sample_rate, block_size, channels)
        .expect("prepare failed");
    (engine, handle)
}

fn process_mono(engine: &mut Engine, signal: &mut [f32], block_size: usize) -> Result<()> {
    for block in signal.chunks_mut(block_size) {
        engine.process(&mut [block])?;
    }
    Ok(())
}

fn set_compressor(handle: &EngineHandle, threshold: f32, ratio: f32, gain: f32) {
    handle.set_mode(ProcessingMode::Compressor);
    handle.set_parameter(ParamId::CompressorThreshold, threshold);
    handle.set_parameter(ParamId::CompressorRatio, ratio);
    handle.set_parameter(ParamId::CompressorAttack, 1.0);
    handle.set_parameter(ParamId::CompressorRelease, 50.0);
    handle.set_parameter(ParamId::GainGain, gain);
}

#[test]
fn silence_stays_silent_in_both_modes() -> Result<()> {
    for sample_rate in [8_000.0, 22_050.0, 44_100.0, 48_000.0, 96_000.0, 192_000.0] {
        for block_size in [1, 64, 512] {
            for mode in [ProcessingMode::Filter, ProcessingMode::Compressor] {
                let (mut engine, handle) = prepared_engine(sample_rate, block_size, 2);
                handle.set_mode(mode);
                handle.set_parameter(ParamId::FilterResonance, 10.0);
                handle.set_parameter(ParamId::GainGain, 20.0);

                let mut left = vec![0.0f32; block_size];
                let mut right = vec![0.0f32; block_size];
                for _ in 0..8 {
                    engine.process(&mut [&mut left[..], &mut right[..]])?;
                }

                assert!(
                    left.iter().chain(&right).all(|&s| s == 0.0),
                    "non-zero output at {sample_rate} Hz, block {block_size}, {mode}"
                );
            }
        }
    }
    Ok(())
}

#[test]
fn topologies_have_characteristic_responses() -> Result<()> {
    let level = |topology: FilterTopology, frequency: f32| -> Result<f32> {
        let (mut engine, handle) = prepared_engine(48_000.0, 256, 1);
        handle.set_topology(topology);
        handle.set_parameter(ParamId::FilterFrequency, 1_000.0);
        handle.set_parameter(ParamId::FilterResonance, 1.0);

        let mut signal = sine(frequency, 1.0, 48_000.0, 48_000);
        process_mono(&mut engine, &mut signal, 256)?;
        // skip the transient
        Ok(lin_to_db(rms(&signal[24_000..])))
    };

    let high = [
        level(FilterTopology::Lowpass, 8_000.0)?,
        level(FilterTopology::Bandpass, 8_000.0)?,
        level(FilterTopology::Highpass, 8_000.0)?,
    ];
    assert!(high[0] < high[1] - 6.0, "lowpass {high:?}");
    assert!(high[1] < high[2] - 6.0, "bandpass {high:?}");

    let low = [
        level(FilterTopology::Lowpass, 125.0)?,
        level(FilterTopology::Bandpass, 125.0)?,
        level(FilterTopology::Highpass, 125.0)?,
    ];
    assert!(low[2] < low[1] - 6.0, "highpass {low:?}");
    assert!(low[1] < low[0] - 6.0, "bandpass {low:?}");
    Ok(())
}

#[test]
fn measured_response_matches_processing_path() -> Result<()> {
    let response =
        FrequencyResponse::of_filter(FilterTopology::Lowpass, 1_000.0, 1.0, 48_000.0, 8192)?;
    assert!(response.magnitude_db_at(100.0).abs() < 0.5);
    assert!(response.magnitude_db_at(1_000.0).abs() < 0.5);
    assert!(response.magnitude_db_at(8_000.0) < -30.0);
    Ok(())
}

#[test]
fn compressor_leaves_quiet_signals_alone() -> Result<()> {
    let (mut engine, handle) = prepared_engine(SAMPLE_RATE, BLOCK_SIZE, 1);
    set_compressor(&handle, -10.0, 4.0, 0.0);

    let input = sine(440.0, db_to_lin(-20.0), SAMPLE_RATE, 44_100);
    let mut output = input.clone();
    process_mono(&mut engine, &mut output, BLOCK_SIZE)?;

    for (x, y) in input.iter().zip(&output).skip(4_410) {
        assert!((x - y).abs() < 1e-6, "{x} != {y}");
    }
    Ok(())
}

#[test]
fn compressor_follows_static_curve() -> Result<()> {
    for (threshold, ratio) in [(-10.0, 2.0), (-10.0, 4.0), (-20.0, 8.0), (-6.0, 10.0)] {
        let (mut engine, handle) = prepared_engine(SAMPLE_RATE, BLOCK_SIZE, 1);
        set_compressor(&handle, threshold, ratio, 0.0);

        let input_db = -3.0f32;
        let mut signal = vec![db_to_lin(input_db); 44_100];
        process_mono(&mut engine, &mut signal, BLOCK_SIZE)?;

        let expected = threshold + (input_db - threshold) / ratio;
        let measured = lin_to_db(signal[signal.len() - 1]);
        assert!(
            (measured - expected).abs() < 0.05,
            "T={threshold} R={ratio}: expected {expected} dB, measured {measured} dB"
        );
    }
    Ok(())
}

#[test]
fn mode_switch_takes_effect_at_next_block() -> Result<()> {
    let input = sine(1_000.0, 0.8, SAMPLE_RATE, BLOCK_SIZE * 6);

    let run = |switch_after: Option<usize>| -> Result<Vec<f32>> {
        let (mut engine, handle) = prepared_engine(SAMPLE_RATE, BLOCK_SIZE, 1);
        set_compressor(&handle, -20.0, 4.0, 0.0);
        handle.set_mode(ProcessingMode::Filter);

        let mut output = input.clone();
        for (i, block) in output.chunks_mut(BLOCK_SIZE).enumerate() {
            engine.process(&mut [block])?;
            if Some(i) == switch_after {
                handle.set_mode(ProcessingMode::Compressor);
                assert_eq!(engine.active_mode(), ProcessingMode::Filter);
            }
        }
        Ok(output)
    };

    let steady = run(None)?;
    let switched = run(Some(2))?;

    let boundary = BLOCK_SIZE * 3;
    assert_eq!(steady[..boundary], switched[..boundary]);
    assert_ne!(
        steady[boundary..boundary + BLOCK_SIZE],
        switched[boundary..boundary + BLOCK_SIZE]
    );
    Ok(())
}

#[test]
fn reset_makes_runs_bit_identical() -> Result<()> {
    for mode in [ProcessingMode::Filter, ProcessingMode::Compressor] {
        let (mut engine, handle) = prepared_engine(SAMPLE_RATE, BLOCK_SIZE, 2);
        set_compressor(&handle, -18.0, 3.0, 6.0);
        handle.set_mode(mode);
        handle.set_topology(FilterTopology::Bandpass);
        handle.set_parameter(ParamId::FilterResonance, 4.0);

        let input = sine(220.0, 0.9, SAMPLE_RATE, BLOCK_SIZE);

        let mut run = || -> Result<Vec<f32>> {
            engine.reset();
            let mut left = input.clone();
            let mut right = input.clone();
            for _ in 0..4 {
                left.copy_from_slice(&input);
                right.copy_from_slice(&input);
                engine.process(&mut [&mut left[..], &mut right[..]])?;
            }
            Ok(left.into_iter().chain(right).collect())
        };

        let first = run()?;
        let second = run()?;
        assert!(
            first.iter().zip(&second).all(|(a, b)| a.to_bits() == b.to_bits()),
            "{mode} output differs after reset"
        );
    }
    Ok(())
}

#[test]
fn lowpass_attenuates_above_cutoff() -> Result<()> {
    let measure = |frequency: f32| -> Result<f32> {
        let (mut engine, handle) = prepared_engine(SAMPLE_RATE, BLOCK_SIZE, 2);
        handle.set_mode(ProcessingMode::Filter);
        handle.set_topology(FilterTopology::Lowpass);
        handle.set_parameter(ParamId::FilterFrequency, 400.0);
        handle.set_parameter(ParamId::FilterResonance, 1.0);

        let mut left = sine(frequency, 1.0, SAMPLE_RATE, BLOCK_SIZE);
        let mut right = left.clone();
        engine.process(&mut [&mut left[..], &mut right[..]])?;
        assert_eq!(left, right);
        Ok(peak(&left[BLOCK_SIZE / 2..]))
    };

    let high = measure(1_000.0)?;
    let low = measure(100.0)?;
    assert!(high < low * 0.5, "1 kHz peak {high}, 100 Hz peak {low}");
    Ok(())
}

#[test]
fn compressor_with_makeup_converges_to_expected_level() -> Result<()> {
    let (mut engine, handle) = prepared_engine(SAMPLE_RATE, BLOCK_SIZE, 2);
    set_compressor(&handle, -10.0, 4.0, 6.0);

    let mut left = vec![0.0f32; BLOCK_SIZE];
    let mut right = vec![0.0f32; BLOCK_SIZE];
    for _ in 0..100 {
        left.fill(1.0);
        right.fill(1.0);
        engine.process(&mut [&mut left[..], &mut right[..]])?;
    }

    let level = lin_to_db(rms(&left));
    assert!((level + 1.5).abs() < 0.1, "settled at {level} dB");
    assert_eq!(left, right);
    Ok(())
}

#[test]
fn mono_input_on_stereo_output_silences_second_channel() -> Result<()> {
    let (mut engine, _handle) = Engine::new();
    assert!(engine.set_bus_layout(BusLayout::new(1, 2)));
    engine.prepare(SAMPLE_RATE, BLOCK_SIZE, 2)?;

    let mut left = vec![0.5f32; BLOCK_SIZE];
    let mut right = vec![0.5f32; BLOCK_SIZE];
    engine.process(&mut [&mut left[..], &mut right[..]])?;

    assert!(right.iter().all(|&s| s == 0.0));
    assert!(left.iter().any(|&s| s != 0.0));
    Ok(())
}

#[test]
fn state_restores_on_a_fresh_engine() -> Result<()> {
    let (source, handle) = Engine::new();
    set_compressor(&handle, -12.0, 6.0, 3.0);
    handle.set_topology(FilterTopology::Highpass);
    let bytes = source.get_state()?;

    let (target, target_handle) = Engine::new();
    target.set_state(&bytes)?;
    assert_eq!(target_handle.snapshot(), handle.snapshot());
    assert_eq!(target.get_parameter(ParamId::CompressorRatio), 6.0);
    assert!(target.set_state(b"{ \"version\": 99 }").is_err());
    Ok(())
}
