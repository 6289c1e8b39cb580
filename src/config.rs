//! Configuration of the device in terms of physical qualities, and its encoding for the
//! vendor API.

use crate::{Error, Result};
use crate::waveform::AwgTiming;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Channel {
    #[default]
    A,
    B,
    C,
    D,
}

impl Channel {
    pub const ALL: [Channel; 4] = [Channel::A, Channel::B, Channel::C, Channel::D];

    pub fn index(self) -> usize {
        match self {
            Self::A => 0,
            Self::B => 1,
            Self::C => 2,
            Self::D => 3,
        }
    }

    pub(crate) fn api_code(self) -> i32 {
        self.index() as i32
    }
}

/// Input range; the value is the positive full scale, i.e. `V2` spans -2 V..+2 V.
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Range {
    mV50,
    mV100,
    mV200,
    mV500,
    V1,
    #[default]
    V2,
    V5,
    V10,
    V20,
}

impl Range {
    pub const ALL: [Range; 9] = [
        Range::mV50, Range::mV100, Range::mV200, Range::mV500,
        Range::V1, Range::V2, Range::V5, Range::V10, Range::V20,
    ];

    pub fn volts(self) -> f32 {
        match self {
            Self::mV50  => 0.05,
            Self::mV100 => 0.1,
            Self::mV200 => 0.2,
            Self::mV500 => 0.5,
            Self::V1    => 1.0,
            Self::V2    => 2.0,
            Self::V5    => 5.0,
            Self::V10   => 10.0,
            Self::V20   => 20.0,
        }
    }

    pub(crate) fn api_code(self) -> i32 {
        match self {
            Self::mV50  => 2,
            Self::mV100 => 3,
            Self::mV200 => 4,
            Self::mV500 => 5,
            Self::V1    => 6,
            Self::V2    => 7,
            Self::V5    => 8,
            Self::V10   => 9,
            Self::V20   => 10,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Coupling {
    AC,
    #[default]
    DC1M,
    DC50,
}

impl Coupling {
    pub(crate) fn api_code(self) -> i32 {
        match self {
            Self::AC   => 0,
            Self::DC1M => 1,
            Self::DC50 => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Bandwidth {
    #[default]
    Full,
    MHz20,
    MHz25,
}

impl Bandwidth {
    pub(crate) fn api_code(self) -> i32 {
        match self {
            Self::Full  => 0,
            Self::MHz20 => 1,
            Self::MHz25 => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ThresholdDirection {
    Above,
    Below,
    #[default]
    Rising,
    Falling,
    RisingOrFalling,
}

impl ThresholdDirection {
    pub(crate) fn api_code(self) -> i32 {
        match self {
            Self::Above           => 0,
            Self::Below           => 1,
            Self::Rising          => 2,
            Self::Falling         => 3,
            Self::RisingOrFalling => 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WaveType {
    #[default]
    Sine,
    Square,
    Triangle,
    RampUp,
    RampDown,
    Sinc,
    Gaussian,
    HalfSine,
    DCVoltage,
    WhiteNoise,
}

impl WaveType {
    pub(crate) fn api_code(self) -> i16 {
        match self {
            Self::Sine       => 0,
            Self::Square     => 1,
            Self::Triangle   => 2,
            Self::RampUp     => 3,
            Self::RampDown   => 4,
            Self::Sinc       => 5,
            Self::Gaussian   => 6,
            Self::HalfSine   => 7,
            Self::DCVoltage  => 8,
            Self::WhiteNoise => 9,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SigGenTriggerType {
    #[default]
    Rising,
    Falling,
    GateHigh,
    GateLow,
}

impl SigGenTriggerType {
    pub(crate) fn api_code(self) -> i32 {
        match self {
            Self::Rising   => 0,
            Self::Falling  => 1,
            Self::GateHigh => 2,
            Self::GateLow  => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SigGenTriggerSource {
    #[default]
    None,
    ScopeTrig,
    AuxIn,
    ExtIn,
    SoftTrig,
}

impl SigGenTriggerSource {
    pub(crate) fn api_code(self) -> i32 {
        match self {
            Self::None      => 0,
            Self::ScopeTrig => 1,
            Self::AuxIn     => 2,
            Self::ExtIn     => 3,
            Self::SoftTrig  => 4,
        }
    }
}

/// How the AWG walks through its table. `Dual` plays the table forwards then backwards, `Quad`
/// additionally plays the inverted table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IndexMode {
    #[default]
    Single,
    Dual,
    Quad,
}

impl IndexMode {
    pub(crate) fn api_code(self) -> i32 {
        match self {
            Self::Single => 0,
            Self::Dual   => 1,
            Self::Quad   => 2,
        }
    }

    /// Number of table traversals the generator makes per period.
    pub fn passes(self) -> u32 {
        match self {
            Self::Single => 1,
            Self::Dual   => 2,
            Self::Quad   => 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelConfiguration {
    pub range: Range,
    pub coupling: Coupling,
    pub bandwidth: Bandwidth,
    /// Analog offset in volts, added to the input before digitization.
    pub analog_offset: f32,
}

impl Default for ChannelConfiguration {
    fn default() -> Self {
        Self {
            range: Default::default(),
            coupling: Default::default(),
            bandwidth: Default::default(),
            analog_offset: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerConfiguration {
    pub source: Channel,
    /// Threshold in ADC counts.
    pub threshold: i16,
    pub direction: ThresholdDirection,
    /// Samples between the trigger event and the start of the capture.
    pub delay_samples: u32,
    /// Time after which the device triggers by itself; zero waits forever.
    pub auto_trigger_ms: i16,
}

impl Default for TriggerConfiguration {
    fn default() -> Self {
        Self {
            source: Channel::A,
            threshold: 0,
            direction: ThresholdDirection::Rising,
            delay_samples: 0,
            auto_trigger_ms: 1000,
        }
    }
}

impl TriggerConfiguration {
    /// Create a trigger at `volts` on a channel configured as `channel`.
    ///
    /// Fails if the threshold lies outside of the input range of the channel.
    pub fn at_volts(source: Channel, channel: &ChannelConfiguration, volts: f32,
                    direction: ThresholdDirection) -> Result<TriggerConfiguration> {
        let full_scale = channel.range.volts();
        let counts = ((volts + channel.analog_offset) / full_scale * crate::MAX_VALUE as f32) as i32;
        if counts > crate::MAX_VALUE as i32 || counts < crate::MIN_VALUE as i32 {
            return Err(Error::invalid(format!(
                "trigger level of {} V outside allowed range ({} V, {} V)", volts,
                -full_scale - channel.analog_offset, full_scale - channel.analog_offset)))
        }
        Ok(TriggerConfiguration {
            source,
            threshold: counts as i16,
            direction,
            ..Default::default()
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArbitraryGenerator {
    pub offset_microvolts: i32,
    pub peak_to_peak_microvolts: u32,
    pub start_delta_phase: u32,
    pub stop_delta_phase: u32,
    pub index_mode: IndexMode,
    /// Number of times the waveform is played after a trigger; zero repeats forever.
    pub shots: u32,
    pub trigger_type: SigGenTriggerType,
    pub trigger_source: SigGenTriggerSource,
}

impl Default for ArbitraryGenerator {
    fn default() -> Self {
        Self {
            offset_microvolts: 0,
            peak_to_peak_microvolts: 4_000_000,
            start_delta_phase: 1 << 16,
            stop_delta_phase: 1 << 16,
            index_mode: Default::default(),
            shots: 1,
            trigger_type: Default::default(),
            trigger_source: Default::default(),
        }
    }
}

impl ArbitraryGenerator {
    /// A generator stepping through its table at a constant rate given by `timing`.
    pub fn with_timing(timing: &AwgTiming) -> ArbitraryGenerator {
        ArbitraryGenerator {
            start_delta_phase: timing.delta_phase(),
            stop_delta_phase: timing.delta_phase(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BuiltInGenerator {
    pub offset_microvolts: i32,
    pub peak_to_peak_microvolts: u32,
    pub wave_type: WaveType,
    pub start_frequency: f32,
    pub stop_frequency: f32,
    pub shots: u32,
    pub trigger_type: SigGenTriggerType,
    pub trigger_source: SigGenTriggerSource,
}

impl Default for BuiltInGenerator {
    fn default() -> Self {
        Self {
            offset_microvolts: 0,
            peak_to_peak_microvolts: 4_000_000,
            wave_type: Default::default(),
            start_frequency: 1000.0,
            stop_frequency: 1000.0,
            shots: 1,
            trigger_type: Default::default(),
            trigger_source: Default::default(),
        }
    }
}

impl BuiltInGenerator {
    /// A generator with a fixed (non-swept) output frequency.
    pub fn fixed(wave_type: WaveType, frequency: f32, peak_to_peak_microvolts: u32) -> BuiltInGenerator {
        BuiltInGenerator {
            wave_type,
            start_frequency: frequency,
            stop_frequency: frequency,
            peak_to_peak_microvolts,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_channel_codes() {
        for (index, channel) in Channel::ALL.into_iter().enumerate() {
            assert_eq!(channel.index(), index);
            assert_eq!(channel.api_code(), index as i32);
        }
    }

    #[test]
    fn test_range_codes() {
        assert_eq!(Range::mV50.api_code(), 2);
        assert_eq!(Range::V2.api_code(), 7);
        assert_eq!(Range::V20.api_code(), 10);
        for pair in Range::ALL.windows(2) {
            assert!(pair[0].volts() < pair[1].volts());
            assert_eq!(pair[0].api_code() + 1, pair[1].api_code());
        }
    }

    #[test]
    fn test_trigger_at_volts() {
        let channel = ChannelConfiguration::default();
        let trigger = TriggerConfiguration::at_volts(Channel::A, &channel, 1.0,
            ThresholdDirection::Falling).unwrap();
        assert_eq!(trigger.threshold, 16382);
        assert_eq!(trigger.direction, ThresholdDirection::Falling);
        assert_eq!(trigger.auto_trigger_ms, 1000);
    }

    #[test]
    fn test_trigger_at_volts_out_of_range() {
        let channel = ChannelConfiguration { range: Range::mV50, ..Default::default() };
        assert!(matches!(
            TriggerConfiguration::at_volts(Channel::A, &channel, 0.1, ThresholdDirection::Rising),
            Err(Error::InvalidParameter(_))));
    }

    #[test]
    fn test_arbitrary_generator_with_timing() {
        let timing = AwgTiming::from_exponent(2).unwrap();
        let generator = ArbitraryGenerator::with_timing(&timing);
        assert_eq!(generator.start_delta_phase, 65536);
        assert_eq!(generator.stop_delta_phase, 65536);
        assert_eq!(generator.peak_to_peak_microvolts, 4_000_000);
        assert_eq!(generator.shots, 1);
    }

    #[test]
    fn test_index_mode_passes() {
        assert_eq!(IndexMode::Single.passes(), 1);
        assert_eq!(IndexMode::Quad.passes(), 4);
    }
}
