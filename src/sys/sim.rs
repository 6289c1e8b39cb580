//! A software model of a PicoScope 6000 with its signal generator output looped back into one
//! of the inputs.
//!
//! The model is deterministic and only as detailed as needed to exercise the capture path: the
//! generator starts playing at the trigger point, the input is ideal apart from clipping at the
//! range limits, and a capture becomes ready after a configurable number of readiness polls.
//! Built-in waveforms play continuously regardless of the requested number of shots.

use std::f64::consts::PI;
use std::time::Duration;

use crate::{Error, PicoStatus, Result};
use crate::config::{ArbitraryGenerator, BuiltInGenerator, Channel, IndexMode, WaveType};
use crate::config::{ChannelConfiguration, TriggerConfiguration};
use crate::capture::{self, TimebaseInfo, MAX_VALUE, MIN_VALUE};
use crate::waveform::{self, AWG_MAX_SAMPLES, AWG_MAX_VALUE, AWG_MIN_VALUE};
use super::Overflow;

const INVALID_HANDLE: PicoStatus = PicoStatus(0x0c);
const INVALID_CHANNEL: PicoStatus = PicoStatus(0x10);
const TOO_MANY_SAMPLES: PicoStatus = PicoStatus(0x1d);
const BUSY: PicoStatus = PicoStatus(0x27);
const SIGGEN_OUTPUT_OVER_VOLTAGE: PicoStatus = PicoStatus(0x35);
const WAVETYPE_NOT_SUPPORTED: PicoStatus = PicoStatus(0x112);

/// Number of most recent calls kept in the call history.
const HISTORY_LENGTH: usize = 256;

/// Largest offset plus half amplitude the generator can output, in microvolts.
const GENERATOR_LIMIT_MICROVOLTS: i64 = 2_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimulatorConfiguration {
    /// Number of `is_ready` polls answered with `false` before a capture completes; `None`
    /// makes captures never complete.
    pub polls_until_ready: Option<u32>,
    /// Capture memory, in samples.
    pub max_samples: u32,
    /// Input that the generator output is wired to.
    pub loopback: Channel,
}

impl Default for SimulatorConfiguration {
    fn default() -> Self {
        Self {
            polls_until_ready: Some(3),
            max_samples: 1 << 24,
            loopback: Channel::A,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Output {
    Off,
    Arbitrary { waveform: Vec<i16>, generator: ArbitraryGenerator },
    BuiltIn(BuiltInGenerator),
}

#[derive(Debug, Clone, Copy)]
struct Block {
    pre_trigger_samples: u32,
    post_trigger_samples: u32,
    interval: f64,
    polls_remaining: Option<u32>,
}

#[derive(Debug)]
pub struct SimulatedDriver {
    config: SimulatorConfiguration,
    open: bool,
    channels: [Option<ChannelConfiguration>; 4],
    trigger: Option<TriggerConfiguration>,
    output: Output,
    block: Option<Block>,
    history: Vec<&'static str>,
}

impl SimulatedDriver {
    pub fn new(config: SimulatorConfiguration) -> SimulatedDriver {
        log::debug!("opened simulated unit with {:?}", config);
        SimulatedDriver {
            config,
            open: true,
            channels: [None; 4],
            trigger: None,
            output: Output::Off,
            block: None,
            history: Vec::new(),
        }
    }

    /// Names of the vendor functions that the last `HISTORY_LENGTH` calls correspond to, in order.
    pub fn history(&self) -> &[&'static str] {
        &self.history[self.history.len().saturating_sub(HISTORY_LENGTH)..]
    }

    pub fn trigger(&self) -> Option<&TriggerConfiguration> {
        self.trigger.as_ref()
    }

    pub fn channel(&self, channel: Channel) -> Option<&ChannelConfiguration> {
        self.channels[channel.index()].as_ref()
    }

    fn enter(&mut self, function: &'static str) -> Result<()> {
        if self.history.len() == 2 * HISTORY_LENGTH {
            self.history.drain(..HISTORY_LENGTH);
        }
        self.history.push(function);
        if self.open {
            Ok(())
        } else {
            Err(fail(function, INVALID_HANDLE))
        }
    }

    /// Generator output at `time` seconds after the trigger, in volts.
    fn output_volts(&self, time: f64) -> f64 {
        match &self.output {
            Output::Off => 0.0,
            Output::Arbitrary { waveform, generator } => {
                let offset = generator.offset_microvolts as f64 * 1e-6;
                let peak_to_peak = generator.peak_to_peak_microvolts as f64 * 1e-6;
                let interval = waveform::interval_for_delta_phase(generator.start_delta_phase);
                let entries = waveform.len() as u64 * generator.index_mode.passes() as u64;
                if time < 0.0 {
                    return offset
                }
                let step = (time / interval).floor() as u64;
                if generator.shots != 0 && step >= entries * generator.shots as u64 {
                    return offset
                }
                let code = arbitrary_code(waveform, generator.index_mode, (step % entries) as usize);
                let fraction = (code - AWG_MIN_VALUE as f64) /
                    (AWG_MAX_VALUE as f64 - AWG_MIN_VALUE as f64);
                offset + peak_to_peak * (fraction - 0.5)
            }
            Output::BuiltIn(generator) => {
                let offset = generator.offset_microvolts as f64 * 1e-6;
                let amplitude = generator.peak_to_peak_microvolts as f64 * 1e-6 / 2.0;
                let phase = (time * generator.start_frequency as f64).rem_euclid(1.0);
                offset + amplitude * match generator.wave_type {
                    WaveType::Sine      => (2.0 * PI * phase).sin(),
                    WaveType::Square    => if phase < 0.5 { 1.0 } else { -1.0 },
                    WaveType::Triangle  => 1.0 - 4.0 * (phase - 0.5).abs(),
                    WaveType::RampUp    => 2.0 * phase - 1.0,
                    WaveType::RampDown  => 1.0 - 2.0 * phase,
                    WaveType::DCVoltage => 0.0,
                    _ => unreachable!("rejected by set_sig_gen_built_in"),
                }
            }
        }
    }

    fn digitize(config: &ChannelConfiguration, volts: f64) -> (i16, bool) {
        let code = ((volts + config.analog_offset as f64) / config.range.volts() as f64 *
            MAX_VALUE as f64).round();
        if code > MAX_VALUE as f64 {
            (MAX_VALUE, true)
        } else if code < MIN_VALUE as f64 {
            (MIN_VALUE, true)
        } else {
            (code as i16, false)
        }
    }
}

fn fail(function: &'static str, status: PicoStatus) -> Error {
    log::debug!("{} returned {:?}", function, status);
    Error::Driver { function, status }
}

fn arbitrary_code(waveform: &[i16], index_mode: IndexMode, entry: usize) -> f64 {
    let length = waveform.len();
    let (pass, index) = (entry / length, entry % length);
    let forward = |index: usize| waveform[index] as f64;
    let backward = |index: usize| waveform[length - 1 - index] as f64;
    let invert = |code: f64| AWG_MIN_VALUE as f64 + AWG_MAX_VALUE as f64 - code;
    match (index_mode, pass) {
        (IndexMode::Single, _) => forward(index),
        (IndexMode::Dual | IndexMode::Quad, 0) => forward(index),
        (IndexMode::Dual | IndexMode::Quad, 1) => backward(index),
        (IndexMode::Quad, 2) => invert(forward(index)),
        (IndexMode::Quad, _) => invert(backward(index)),
        (IndexMode::Dual, _) => unreachable!(),
    }
}

impl super::Driver for SimulatedDriver {
    fn set_channel(&mut self, channel: Channel, config: Option<&ChannelConfiguration>)
            -> Result<()> {
        self.enter("ps6000SetChannel")?;
        self.channels[channel.index()] = config.copied();
        Ok(())
    }

    fn set_simple_trigger(&mut self, trigger: Option<&TriggerConfiguration>) -> Result<()> {
        self.enter("ps6000SetSimpleTrigger")?;
        self.trigger = trigger.copied();
        Ok(())
    }

    fn set_sig_gen_arbitrary(&mut self, waveform: &[i16], generator: &ArbitraryGenerator)
            -> Result<()> {
        const FUNCTION: &str = "ps6000SetSigGenArbitrary";
        self.enter(FUNCTION)?;
        if waveform.is_empty() || waveform.len() > AWG_MAX_SAMPLES ||
                generator.start_delta_phase == 0 || generator.stop_delta_phase == 0 ||
                waveform.iter().any(|&code| code < AWG_MIN_VALUE || code > AWG_MAX_VALUE) {
            return Err(fail(FUNCTION, PicoStatus::SIG_GEN_PARAM))
        }
        if generator.offset_microvolts.unsigned_abs() as i64 +
                generator.peak_to_peak_microvolts as i64 / 2 > GENERATOR_LIMIT_MICROVOLTS {
            return Err(fail(FUNCTION, SIGGEN_OUTPUT_OVER_VOLTAGE))
        }
        self.output = Output::Arbitrary { waveform: waveform.to_vec(), generator: *generator };
        Ok(())
    }

    fn set_sig_gen_built_in(&mut self, generator: &BuiltInGenerator) -> Result<()> {
        const FUNCTION: &str = "ps6000SetSigGenBuiltIn";
        self.enter(FUNCTION)?;
        match generator.wave_type {
            WaveType::Sinc | WaveType::Gaussian | WaveType::HalfSine | WaveType::WhiteNoise =>
                return Err(fail(FUNCTION, WAVETYPE_NOT_SUPPORTED)),
            _ => ()
        }
        if !(generator.start_frequency >= 0.0 && generator.stop_frequency >= 0.0) {
            return Err(fail(FUNCTION, PicoStatus::SIG_GEN_PARAM))
        }
        if generator.offset_microvolts.unsigned_abs() as i64 +
                generator.peak_to_peak_microvolts as i64 / 2 > GENERATOR_LIMIT_MICROVOLTS {
            return Err(fail(FUNCTION, SIGGEN_OUTPUT_OVER_VOLTAGE))
        }
        self.output = Output::BuiltIn(*generator);
        Ok(())
    }

    fn get_timebase(&mut self, timebase: u32, sample_count: u32) -> Result<TimebaseInfo> {
        self.enter("ps6000GetTimebase2")?;
        if sample_count > self.config.max_samples {
            return Err(fail("ps6000GetTimebase2", TOO_MANY_SAMPLES))
        }
        Ok(TimebaseInfo {
            interval: capture::timebase_interval(timebase),
            max_samples: self.config.max_samples,
        })
    }

    fn run_block(&mut self, pre_trigger_samples: u32, post_trigger_samples: u32, timebase: u32)
            -> Result<Duration> {
        const FUNCTION: &str = "ps6000RunBlock";
        self.enter(FUNCTION)?;
        if self.channels.iter().all(Option::is_none) {
            return Err(fail(FUNCTION, INVALID_CHANNEL))
        }
        let sample_count = pre_trigger_samples as u64 + post_trigger_samples as u64;
        if sample_count > self.config.max_samples as u64 {
            return Err(fail(FUNCTION, TOO_MANY_SAMPLES))
        }
        let interval = capture::timebase_interval(timebase);
        self.block = Some(Block {
            pre_trigger_samples,
            post_trigger_samples,
            interval,
            polls_remaining: self.config.polls_until_ready,
        });
        Ok(Duration::from_secs_f64(interval * sample_count as f64))
    }

    fn is_ready(&mut self) -> Result<bool> {
        self.enter("ps6000IsReady")?;
        match self.block.as_mut() {
            None => Err(fail("ps6000IsReady", PicoStatus::NO_SAMPLES_AVAILABLE)),
            Some(Block { polls_remaining: None, .. }) => Ok(false),
            Some(Block { polls_remaining: Some(0), .. }) => Ok(true),
            Some(Block { polls_remaining: Some(remaining), .. }) => {
                *remaining -= 1;
                Ok(false)
            }
        }
    }

    fn get_values(&mut self, channel: Channel, buffer: &mut [i16]) -> Result<(usize, Overflow)> {
        const FUNCTION: &str = "ps6000GetValues";
        self.enter(FUNCTION)?;
        let block = match self.block {
            None => return Err(fail(FUNCTION, PicoStatus::NO_SAMPLES_AVAILABLE)),
            Some(block @ Block { polls_remaining: Some(0), .. }) => block,
            Some(_) => return Err(fail(FUNCTION, BUSY)),
        };
        let config = match self.channels[channel.index()] {
            Some(config) => config,
            None => return Err(fail(FUNCTION, INVALID_CHANNEL)),
        };
        if buffer.is_empty() {
            return Err(fail(FUNCTION, PicoStatus::BUFFERS_NOT_SET))
        }

        let captured = block.pre_trigger_samples as usize + block.post_trigger_samples as usize;
        let sample_count = captured.min(buffer.len());
        let mut overflow = Overflow::empty();
        for (index, sample) in buffer[..sample_count].iter_mut().enumerate() {
            let time = (index as f64 - block.pre_trigger_samples as f64) * block.interval;
            let volts = if channel == self.config.loopback { self.output_volts(time) } else { 0.0 };
            let (code, clipped) = Self::digitize(&config, volts);
            if clipped {
                overflow |= Overflow::channel(channel)
            }
            *sample = code;
        }
        Ok((sample_count, overflow))
    }

    fn stop(&mut self) -> Result<()> {
        self.enter("ps6000Stop")?;
        self.block = None;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.enter("ps6000CloseUnit")?;
        self.open = false;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::Range;
    use crate::sys::Driver;

    fn primed(config: SimulatorConfiguration) -> SimulatedDriver {
        let mut driver = SimulatedDriver::new(config);
        driver.set_channel(Channel::A, Some(&ChannelConfiguration::default())).unwrap();
        driver
    }

    fn wait(driver: &mut SimulatedDriver) {
        while !driver.is_ready().unwrap() {}
    }

    #[test]
    fn test_ready_after_polls() {
        let mut driver = primed(SimulatorConfiguration {
            polls_until_ready: Some(2), ..Default::default()
        });
        driver.run_block(0, 10, 5).unwrap();
        assert!(!driver.is_ready().unwrap());
        assert!(!driver.is_ready().unwrap());
        assert!(driver.is_ready().unwrap());
        assert!(driver.is_ready().unwrap());
    }

    #[test]
    fn test_get_values_before_ready() {
        let mut driver = primed(Default::default());
        driver.run_block(0, 10, 5).unwrap();
        let mut buffer = [0; 10];
        assert!(matches!(driver.get_values(Channel::A, &mut buffer),
            Err(Error::Driver { status: BUSY, .. })));
    }

    #[test]
    fn test_is_ready_without_block() {
        let mut driver = primed(Default::default());
        assert!(matches!(driver.is_ready(),
            Err(Error::Driver { status: PicoStatus::NO_SAMPLES_AVAILABLE, .. })));
    }

    #[test]
    fn test_run_block_without_channels() {
        let mut driver = SimulatedDriver::new(Default::default());
        assert!(matches!(driver.run_block(0, 10, 5),
            Err(Error::Driver { status: INVALID_CHANNEL, .. })));
    }

    #[test]
    fn test_run_block_too_many_samples() {
        let mut driver = primed(SimulatorConfiguration { max_samples: 100, ..Default::default() });
        assert!(matches!(driver.run_block(50, 51, 5),
            Err(Error::Driver { status: TOO_MANY_SAMPLES, .. })));
        assert!(driver.run_block(50, 50, 5).is_ok());
    }

    #[test]
    fn test_arbitrary_loopback() {
        let mut driver = primed(Default::default());
        // full scale of the DAC at 4 V pk-pk is -2 V..+2 V, one entry per 20 ns
        let generator = ArbitraryGenerator { shots: 1, ..Default::default() };
        driver.set_sig_gen_arbitrary(&[0, 4095, 0x0800], &generator).unwrap();
        driver.run_block(0, 4, 9).unwrap(); // 32 ns
        wait(&mut driver);
        let mut buffer = [0; 4];
        let (count, overflow) = driver.get_values(Channel::A, &mut buffer).unwrap();
        assert_eq!(count, 4);
        assert_eq!(overflow, Overflow::empty());
        // t = 0 ns, 32 ns, 64 ns, 96 ns; entries 0, 1, 3 (after the only shot), 4
        assert_eq!(buffer[0], MIN_VALUE);
        assert_eq!(buffer[1], MAX_VALUE);
        assert_eq!(buffer[2], 0);
        assert_eq!(buffer[3], 0);
    }

    #[test]
    fn test_arbitrary_rejects_wide_codes() {
        let mut driver = primed(Default::default());
        let generator = ArbitraryGenerator::default();
        assert!(matches!(driver.set_sig_gen_arbitrary(&[0, 4096], &generator),
            Err(Error::Driver { status: PicoStatus::SIG_GEN_PARAM, .. })));
        assert!(matches!(driver.set_sig_gen_arbitrary(&[], &generator),
            Err(Error::Driver { status: PicoStatus::SIG_GEN_PARAM, .. })));
    }

    #[test]
    fn test_generator_over_voltage() {
        let mut driver = primed(Default::default());
        let generator = ArbitraryGenerator { offset_microvolts: 1, ..Default::default() };
        assert!(matches!(driver.set_sig_gen_arbitrary(&[0, 1], &generator),
            Err(Error::Driver { status: SIGGEN_OUTPUT_OVER_VOLTAGE, .. })));
    }

    #[test]
    fn test_square_clips_small_range() {
        let mut driver = SimulatedDriver::new(Default::default());
        let channel = ChannelConfiguration { range: Range::mV50, ..Default::default() };
        driver.set_channel(Channel::A, Some(&channel)).unwrap();
        driver.set_sig_gen_built_in(
            &BuiltInGenerator::fixed(WaveType::Square, 15_625_000.0, 4_000_000)).unwrap();
        driver.run_block(0, 10, 5).unwrap();
        wait(&mut driver);
        let mut buffer = [0; 10];
        let (count, overflow) = driver.get_values(Channel::A, &mut buffer).unwrap();
        assert_eq!(count, 10);
        assert_eq!(overflow, Overflow::A);
        // 10 samples per period; sample #5 sits right on the edge
        assert_eq!(&buffer[..5], &[MAX_VALUE; 5]);
        assert_eq!(&buffer[6..], &[MIN_VALUE; 4]);
    }

    #[test]
    fn test_unsupported_wave_type() {
        let mut driver = primed(Default::default());
        assert!(matches!(
            driver.set_sig_gen_built_in(&BuiltInGenerator::fixed(WaveType::WhiteNoise, 1e3, 1000)),
            Err(Error::Driver { status: WAVETYPE_NOT_SUPPORTED, .. })));
    }

    #[test]
    fn test_other_channel_is_quiet() {
        let mut driver = primed(Default::default());
        driver.set_channel(Channel::B, Some(&ChannelConfiguration::default())).unwrap();
        driver.set_sig_gen_built_in(&BuiltInGenerator::fixed(WaveType::DCVoltage, 0.0, 0)).unwrap();
        driver.run_block(2, 2, 5).unwrap();
        wait(&mut driver);
        let mut buffer = [1; 8];
        assert_eq!(driver.get_values(Channel::B, &mut buffer).unwrap(), (4, Overflow::empty()));
        assert_eq!(buffer, [0, 0, 0, 0, 1, 1, 1, 1]);
    }

    #[test]
    fn test_closed() {
        let mut driver = primed(Default::default());
        driver.close().unwrap();
        assert!(matches!(driver.stop(), Err(Error::Driver { status: INVALID_HANDLE, .. })));
        assert_eq!(driver.history(), &["ps6000SetChannel", "ps6000CloseUnit", "ps6000Stop"]);
    }

    #[test]
    fn test_history_bounded() {
        let mut driver = primed(Default::default());
        driver.run_block(0, 8, 5).unwrap();
        for _ in 0..5 * HISTORY_LENGTH {
            driver.is_ready().unwrap();
        }
        driver.stop().unwrap();
        assert_eq!(driver.history().len(), HISTORY_LENGTH);
        assert_eq!(driver.history().last(), Some(&"ps6000Stop"));
        assert!(driver.history()[..HISTORY_LENGTH - 1].iter().all(|&call| call == "ps6000IsReady"));
        assert!(driver.history.capacity() <= 4 * HISTORY_LENGTH);
    }

    #[test]
    fn test_index_modes() {
        let table = [1, 2, 3];
        let dual = (0..6).map(|entry| arbitrary_code(&table, IndexMode::Dual, entry) as i16)
            .collect::<Vec<_>>();
        assert_eq!(dual, vec![1, 2, 3, 3, 2, 1]);
        let quad = (0..12).map(|entry| arbitrary_code(&table, IndexMode::Quad, entry) as i16)
            .collect::<Vec<_>>();
        assert_eq!(quad, vec![1, 2, 3, 3, 2, 1, 4094, 4093, 4092, 4092, 4093, 4094]);
    }
}
