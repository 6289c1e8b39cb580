//! Synthesis of arbitrary waveform tables and of the phase increment that plays them back.
//!
//! The AWG of the 6000 series is a DDS: every `AWG_DAC_INTERVAL` a 32-bit phase accumulator is
//! advanced by `delta_phase`, and the top `AWG_BUFFER_ADDRESS_WIDTH` bits of the accumulator
//! select the table entry that is output.

use crate::{Error, Result};
use crate::config::IndexMode;

pub const AWG_PHASE_ACCUMULATOR_SIZE: u32 = 32;
pub const AWG_BUFFER_ADDRESS_WIDTH: u32 = 14;
pub const AWG_MAX_SAMPLES: usize = 1 << AWG_BUFFER_ADDRESS_WIDTH;

/// Time between two DAC updates, in seconds.
pub const AWG_DAC_INTERVAL: f64 = 5e-9;

// The programming guide documents a 16-bit signed range; the hardware only accepts 12 bits.
pub const AWG_MIN_VALUE: i16 = 0x0000;
pub const AWG_MAX_VALUE: i16 = 0x0fff;

const PHASE_FRACTION_BITS: u32 = AWG_PHASE_ACCUMULATOR_SIZE - AWG_BUFFER_ADDRESS_WIDTH;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaveformTable {
    min_value: i16,
    max_value: i16,
    samples: Vec<i32>,
}

/// Build a ramp of `sample_count` entries starting at `min_value`.
///
/// The step between entries is `max_value / (n - 1) - min_value / (n - 1)`, where each bound is
/// floor-divided on its own before the subtraction. This differs from dividing the span
/// whenever the bounds have different signs or do not divide evenly, and it means that the last
/// entries may fall short of or exceed `max_value`; e.g. `build_ramp(100, 0, 4095)` ends at
/// `4059`. The values are not clamped.
pub fn build_ramp(sample_count: usize, min_value: i16, max_value: i16) -> Result<WaveformTable> {
    if sample_count < 2 {
        return Err(Error::invalid(format!(
            "waveform needs at least 2 samples, got {}", sample_count)))
    }
    if sample_count > AWG_MAX_SAMPLES {
        return Err(Error::invalid(format!(
            "waveform can have at most {} samples, got {}", AWG_MAX_SAMPLES, sample_count)))
    }
    if min_value > max_value {
        return Err(Error::invalid(format!(
            "waveform minimum {} is above maximum {}", min_value, max_value)))
    }

    let intervals = (sample_count - 1) as i32;
    let step = (max_value as i32).div_euclid(intervals) - (min_value as i32).div_euclid(intervals);
    let samples = (0..sample_count as i32)
        .map(|index| min_value as i32 + index * step)
        .collect::<Vec<_>>();
    log::debug!("build_ramp({}, {}, {}): step = {}, last = {}",
        sample_count, min_value, max_value, step, samples[samples.len() - 1]);
    Ok(WaveformTable { min_value, max_value, samples })
}

impl WaveformTable {
    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    pub fn min_value(&self) -> i16 {
        self.min_value
    }

    pub fn max_value(&self) -> i16 {
        self.max_value
    }

    pub fn samples(&self) -> &[i32] {
        &self.samples[..]
    }

    /// Convert the table to the 16-bit codes the DAC is loaded with.
    pub fn to_dac_codes(&self) -> Result<Vec<i16>> {
        self.samples.iter().enumerate().map(|(index, &sample)| {
            i16::try_from(sample).map_err(|_| Error::invalid(format!(
                "waveform sample #{} ({}) does not fit a DAC code", index, sample)))
        }).collect()
    }
}

/// Playback rate of the AWG, expressed as a power-of-two slowdown of the DAC clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AwgTiming {
    exponent: u32,
    delta_phase: u32,
}

impl AwgTiming {
    /// Advance one table entry every `AWG_DAC_INTERVAL * 2^exponent` seconds.
    pub fn from_exponent(exponent: u32) -> Result<AwgTiming> {
        if exponent > PHASE_FRACTION_BITS {
            return Err(Error::invalid(format!(
                "time scale exponent {} exceeds the {}-bit phase fraction", exponent,
                PHASE_FRACTION_BITS)))
        }
        Ok(AwgTiming { exponent, delta_phase: 1 << (PHASE_FRACTION_BITS - exponent) })
    }

    pub fn exponent(&self) -> u32 {
        self.exponent
    }

    pub fn delta_phase(&self) -> u32 {
        self.delta_phase
    }

    /// Time each table entry is output for, in seconds.
    pub fn sample_interval(&self) -> f64 {
        AWG_DAC_INTERVAL * (1u64 << self.exponent) as f64
    }

    /// Time one pass over a table of `sample_count` entries takes, in seconds.
    pub fn duration(&self, sample_count: usize) -> f64 {
        self.sample_interval() * sample_count as f64
    }
}

/// Phase increment that advances one table entry every `interval` seconds.
pub fn delta_phase_for_interval(interval: f64) -> Result<u32> {
    if !(interval.is_finite() && interval > 0.0) {
        return Err(Error::invalid(format!("AWG sample interval {} s is not positive", interval)))
    }
    let delta_phase = (AWG_DAC_INTERVAL / interval * (1u64 << PHASE_FRACTION_BITS) as f64).floor();
    if delta_phase < 1.0 || delta_phase > u32::MAX as f64 {
        return Err(Error::invalid(format!(
            "AWG sample interval {} s is outside of the phase accumulator range", interval)))
    }
    Ok(delta_phase as u32)
}

/// Time between table entries for a given phase increment, in seconds.
pub fn interval_for_delta_phase(delta_phase: u32) -> f64 {
    AWG_DAC_INTERVAL * (1u64 << PHASE_FRACTION_BITS) as f64 / delta_phase as f64
}

/// Phase increment that plays `sample_count` entries, traversed as `index_mode` says, in
/// `duration` seconds.
pub fn delta_phase_for_duration(duration: f64, sample_count: usize, index_mode: IndexMode)
        -> Result<u32> {
    if sample_count == 0 {
        return Err(Error::invalid("waveform is empty"))
    }
    delta_phase_for_interval(duration / sample_count as f64 / index_mode.passes() as f64)
}

/// Time one period of a table of `sample_count` entries takes at `delta_phase`, in seconds.
pub fn awg_duration(delta_phase: u32, sample_count: usize, index_mode: IndexMode) -> f64 {
    interval_for_delta_phase(delta_phase) * sample_count as f64 * index_mode.passes() as f64
}

/// A waveform given in volts, quantized to the full AWG code range, together with the output
/// level that reproduces it.
#[derive(Debug, Clone, PartialEq)]
pub struct ScaledWaveform {
    pub table: WaveformTable,
    pub offset_volts: f64,
    pub peak_to_peak_volts: f64,
}

impl ScaledWaveform {
    /// Quantize `waveform` so that `offset_volts` maps to the middle of the AWG code range and
    /// `peak_to_peak_volts` spans all of it.
    ///
    /// If not given, the offset is the midpoint of the waveform, or its first sample in quad
    /// mode, where it is the point of symmetry; the peak-to-peak voltage is twice the largest
    /// deviation from the offset. Samples outside the resulting range are clipped.
    pub fn from_volts(waveform: &[f64], offset_volts: Option<f64>,
                      peak_to_peak_volts: Option<f64>, index_mode: IndexMode)
            -> Result<ScaledWaveform> {
        if waveform.is_empty() || waveform.len() > AWG_MAX_SAMPLES {
            return Err(Error::invalid(format!(
                "waveform must have 1 to {} samples, got {}", AWG_MAX_SAMPLES, waveform.len())))
        }
        if let Some(index) = waveform.iter().position(|volts| !volts.is_finite()) {
            return Err(Error::invalid(format!("waveform sample #{} is not finite", index)))
        }

        let offset_volts = match (offset_volts, index_mode) {
            (Some(offset), _) => offset,
            (None, IndexMode::Quad) => waveform[0],
            (None, _) => {
                let max = waveform.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                let min = waveform.iter().copied().fold(f64::INFINITY, f64::min);
                (max + min) / 2.0
            }
        };
        let peak_to_peak_volts = peak_to_peak_volts.unwrap_or_else(|| {
            waveform.iter().map(|volts| (volts - offset_volts).abs()).fold(0.0, f64::max) * 2.0
        });
        if !(offset_volts.is_finite() && peak_to_peak_volts.is_finite() &&
                peak_to_peak_volts > 0.0) {
            return Err(Error::invalid(format!(
                "cannot scale waveform to {} V pk-pk around {} V", peak_to_peak_volts,
                offset_volts)))
        }

        let span = (AWG_MAX_VALUE - AWG_MIN_VALUE) as f64;
        let samples = waveform.iter().map(|volts| {
            let fraction = (volts - offset_volts) / peak_to_peak_volts + 0.5;
            (fraction * span + AWG_MIN_VALUE as f64).round_ties_even()
                .clamp(AWG_MIN_VALUE as f64, AWG_MAX_VALUE as f64) as i32
        }).collect::<Vec<_>>();
        log::debug!("scaled {} samples to {} V pk-pk around {} V",
            samples.len(), peak_to_peak_volts, offset_volts);
        Ok(ScaledWaveform {
            table: WaveformTable { min_value: AWG_MIN_VALUE, max_value: AWG_MAX_VALUE, samples },
            offset_volts,
            peak_to_peak_volts,
        })
    }

    pub fn offset_microvolts(&self) -> i32 {
        (self.offset_volts * 1e6).round() as i32
    }

    pub fn peak_to_peak_microvolts(&self) -> u32 {
        (self.peak_to_peak_volts * 1e6).round() as u32
    }
}
