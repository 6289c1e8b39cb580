use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::time::Duration;

use bitflags::bitflags;

use crate::config::{Channel, ChannelConfiguration};

/// ADC code corresponding to the positive full scale of a channel.
pub const MAX_VALUE: i16 = 32764;
/// ADC code corresponding to the negative full scale of a channel.
pub const MIN_VALUE: i16 = -32764;

bitflags! {
    /// Channels whose input exceeded the selected range during a capture.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Overflow: u16 {
        const A = 1<<0;
        const B = 1<<1;
        const C = 1<<2;
        const D = 1<<3;
    }
}

impl Overflow {
    pub fn channel(channel: Channel) -> Self {
        match channel {
            Channel::A => Overflow::A,
            Channel::B => Overflow::B,
            Channel::C => Overflow::C,
            Channel::D => Overflow::D,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureRequest {
    pub channel: Channel,
    pub pre_trigger_samples: u32,
    pub post_trigger_samples: u32,
    pub timebase: u32,
}

impl CaptureRequest {
    /// Capture `sample_count` samples after the trigger.
    pub fn new(channel: Channel, sample_count: u32, timebase: u32) -> CaptureRequest {
        CaptureRequest {
            channel,
            pre_trigger_samples: 0,
            post_trigger_samples: sample_count,
            timebase,
        }
    }

    pub fn sample_count(&self) -> usize {
        self.pre_trigger_samples as usize + self.post_trigger_samples as usize
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureResult {
    pub(crate) samples: Vec<i16>,
    pub(crate) overflow: Overflow,
    pub(crate) time_indisposed: Duration,
}

impl CaptureResult {
    pub fn samples(&self) -> &[i16] {
        &self.samples[..]
    }

    pub fn into_samples(self) -> Vec<i16> {
        self.samples
    }

    pub fn overflow(&self) -> Overflow {
        self.overflow
    }

    /// Time the device spent acquiring, as estimated by the driver when the capture started.
    pub fn time_indisposed(&self) -> Duration {
        self.time_indisposed
    }

    /// Convert a code captured on a channel configured as `config` to volts.
    pub fn code_to_volts(config: &ChannelConfiguration, code: i16) -> f32 {
        code as f32 / MAX_VALUE as f32 * config.range.volts() - config.analog_offset
    }

    pub fn volts(&self, config: &ChannelConfiguration) -> Vec<f32> {
        self.samples.iter().map(|&code| Self::code_to_volts(config, code)).collect()
    }

    /// Write the samples as decimal integers, one per line.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        for sample in self.samples.iter() {
            writeln!(writer, "{}", sample)?;
        }
        Ok(())
    }

    pub fn write_text<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let mut writer = BufWriter::new(File::create(path.as_ref())?);
        self.write_to(&mut writer)?;
        writer.flush()?;
        log::debug!("wrote {} samples to {}", self.samples.len(), path.as_ref().display());
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimebaseInfo {
    /// Sample interval in seconds.
    pub interval: f64,
    /// Number of samples the device can store at this timebase.
    pub max_samples: u32,
}

/// Sample interval of `timebase`, in seconds.
///
/// Timebases 0..=4 select power-of-two fractions of the 5 GS/s clock; the rest count periods of
/// the 156.25 MHz clock, offset by 4.
pub fn timebase_interval(timebase: u32) -> f64 {
    if timebase < 5 {
        (1u32 << timebase) as f64 / 5e9
    } else {
        (timebase - 4) as f64 / 156_250_000.0
    }
}

/// The fastest timebase whose sample interval is not longer than `interval` seconds.
///
/// Intervals shorter than the fastest timebase select timebase 0, and intervals longer than the
/// slowest one select `u32::MAX`.
pub fn timebase_for_interval(interval: f64) -> u32 {
    const MAX_INTERVAL: f64 = (u32::MAX - 4) as f64 / 156_250_000.0;
    // absorbs rounding error when `interval` is exactly that of some timebase
    const EPSILON: f64 = 1e-6;
    if !(interval > 0.0) {
        0
    } else if interval >= MAX_INTERVAL {
        u32::MAX
    } else if interval < 6.4e-9 {
        ((interval * 5e9).log2() + EPSILON).floor().clamp(0.0, 4.0) as u32
    } else {
        (interval * 156_250_000.0 + 4.0 + EPSILON).floor() as u32
    }
}
