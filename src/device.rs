use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::sleep;
use std::time::{Duration, Instant};

use crate::{Error, Result};
use crate::sys::Driver;
use crate::config::{ArbitraryGenerator, BuiltInGenerator, Channel};
use crate::config::{ChannelConfiguration, TriggerConfiguration};
use crate::capture::{CaptureRequest, CaptureResult, TimebaseInfo};
use crate::waveform::{awg_duration, delta_phase_for_duration, ScaledWaveform, WaveformTable};

/// Bounds on how long `Device::capture_block` waits for the device to finish acquiring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    /// Time after which waiting is abandoned; measured from the end of `run_block`, on top of
    /// the time the driver says the device will be busy. Timeouts that do not fit an `Instant`,
    /// such as `Duration::MAX`, never expire.
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            poll_interval: Duration::from_millis(1),
        }
    }
}

/// Aborts a pending wait when cancelled; clones share the same state and may be moved to
/// another thread.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> CancelToken {
        Default::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst)
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug)]
pub struct Device<D: Driver> {
    driver: D,
}

impl<D: Driver> Device<D> {
    pub fn new(driver: D) -> Device<D> {
        Device { driver }
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn configure_channel(&mut self, channel: Channel, config: Option<ChannelConfiguration>)
            -> Result<()> {
        log::debug!("configure_channel({:?}, {:?})", channel, config);
        self.driver.set_channel(channel, config.as_ref())
    }

    pub fn configure_trigger(&mut self, trigger: Option<TriggerConfiguration>) -> Result<()> {
        log::debug!("configure_trigger({:?})", trigger);
        self.driver.set_simple_trigger(trigger.as_ref())
    }

    /// Load `table` into the arbitrary waveform generator and start it as `generator` says.
    pub fn configure_arbitrary_generator(&mut self, table: &WaveformTable,
                                         generator: &ArbitraryGenerator) -> Result<()> {
        log::debug!("configure_arbitrary_generator({} samples in {}..={}, {:?})",
            table.sample_count(), table.min_value(), table.max_value(), generator);
        if generator.start_delta_phase == 0 || generator.stop_delta_phase == 0 {
            return Err(Error::invalid("AWG phase increment must be nonzero"))
        }
        let codes = table.to_dac_codes()?;
        log::trace!("waveform = {:?}", codes);
        self.driver.set_sig_gen_arbitrary(&codes[..], generator)
    }

    /// Play `waveform`, given in volts, once every `duration` seconds.
    ///
    /// The offset and peak-to-peak voltage are derived from the waveform unless given; index
    /// mode, shots and triggering are taken from `generator`. Returns the duration actually
    /// achievable with the phase accumulator, and the phase increment used.
    pub fn configure_awg_simple(&mut self, waveform: &[f64], duration: f64,
                                offset_volts: Option<f64>, peak_to_peak_volts: Option<f64>,
                                generator: &ArbitraryGenerator) -> Result<(f64, u32)> {
        let delta_phase = delta_phase_for_duration(duration, waveform.len(),
            generator.index_mode)?;
        let actual_duration = self.configure_awg_simple_delta_phase(waveform, delta_phase,
            offset_volts, peak_to_peak_volts, generator)?;
        Ok((actual_duration, delta_phase))
    }

    /// Like `configure_awg_simple`, with the phase increment given directly. Returns the
    /// duration of one period.
    pub fn configure_awg_simple_delta_phase(&mut self, waveform: &[f64], delta_phase: u32,
                                            offset_volts: Option<f64>,
                                            peak_to_peak_volts: Option<f64>,
                                            generator: &ArbitraryGenerator) -> Result<f64> {
        let scaled = ScaledWaveform::from_volts(waveform, offset_volts, peak_to_peak_volts,
            generator.index_mode)?;
        let generator = ArbitraryGenerator {
            offset_microvolts: scaled.offset_microvolts(),
            peak_to_peak_microvolts: scaled.peak_to_peak_microvolts(),
            start_delta_phase: delta_phase,
            stop_delta_phase: delta_phase,
            ..*generator
        };
        self.configure_arbitrary_generator(&scaled.table, &generator)?;
        Ok(awg_duration(delta_phase, waveform.len(), generator.index_mode))
    }

    pub fn configure_built_in_generator(&mut self, generator: &BuiltInGenerator) -> Result<()> {
        log::debug!("configure_built_in_generator({:?})", generator);
        self.driver.set_sig_gen_built_in(generator)
    }

    pub fn timebase(&mut self, timebase: u32, sample_count: u32) -> Result<TimebaseInfo> {
        let info = self.driver.get_timebase(timebase, sample_count)?;
        log::debug!("timebase({}, {}) = {:?}", timebase, sample_count, info);
        Ok(info)
    }

    /// Acquire one block and fetch it from the device.
    ///
    /// If waiting is cancelled or times out, the acquisition is stopped before returning.
    pub fn capture_block(&mut self, request: &CaptureRequest, policy: &WaitPolicy,
                         cancel: &CancelToken) -> Result<CaptureResult> {
        log::debug!("capture_block({:?})", request);
        if request.sample_count() == 0 {
            return Err(Error::invalid("capture needs at least 1 sample"))
        }
        let time_indisposed = self.driver.run_block(request.pre_trigger_samples,
            request.post_trigger_samples, request.timebase)?;
        log::debug!("time indisposed = {:?}", time_indisposed);

        let timeout = time_indisposed.checked_add(policy.timeout);
        if let Err(error) = self.wait_ready(timeout, policy, cancel) {
            if let Err(stop_error) = self.driver.stop() {
                log::warn!("failed to stop acquisition: {}", stop_error);
            }
            return Err(error)
        }

        let mut samples = vec![0i16; request.sample_count()];
        let (sample_count, overflow) = self.driver.get_values(request.channel, &mut samples[..])?;
        if sample_count < samples.len() {
            log::warn!("got {} of {} requested samples", sample_count, samples.len());
        }
        if !overflow.is_empty() {
            log::warn!("input over range on {:?}", overflow);
        }
        samples.truncate(sample_count);
        Ok(CaptureResult { samples, overflow, time_indisposed })
    }

    /// Poll until the device is ready. A `timeout` of `None`, or one too long to be represented
    /// as an instant, waits until `cancel` is cancelled.
    fn wait_ready(&mut self, timeout: Option<Duration>, policy: &WaitPolicy, cancel: &CancelToken)
            -> Result<()> {
        let deadline = timeout.and_then(|timeout| Instant::now().checked_add(timeout));
        let mut polls = 0u64;
        loop {
            if cancel.is_cancelled() {
                log::debug!("wait cancelled after {} polls", polls);
                return Err(Error::Cancelled)
            }
            polls += 1;
            if self.driver.is_ready()? {
                log::trace!("ready after {} polls", polls);
                return Ok(())
            }
            match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        log::debug!("wait timed out after {} polls", polls);
                        return Err(Error::Timeout)
                    }
                    sleep(policy.poll_interval.min(deadline - now))
                }
                None => sleep(policy.poll_interval)
            }
        }
    }

    pub fn stop(&mut self) -> Result<()> {
        log::debug!("stop()");
        self.driver.stop()
    }

    pub fn close(mut self) -> Result<()> {
        log::debug!("close()");
        self.driver.close()
    }
}

impl Device<crate::sys::imp::Ps6000Driver> {
    /// Open a unit through the vendor library at its default location.
    pub fn open(serial: Option<&str>) -> Result<Self> {
        Self::open_library(crate::sys::imp::DEFAULT_LIBRARY, serial)
    }

    pub fn open_library(library_path: &str, serial: Option<&str>) -> Result<Self> {
        Ok(Device::new(crate::sys::imp::Ps6000Driver::open(library_path, serial)?))
    }
}

impl Device<crate::sys::sim::SimulatedDriver> {
    pub fn simulated(config: crate::sys::sim::SimulatorConfiguration) -> Self {
        Device::new(crate::sys::sim::SimulatedDriver::new(config))
    }
}

/// Open the device selected by the environment.
///
/// `PS6000_SIMULATE` selects the simulator. Otherwise the vendor library is loaded from
/// `PS6000_LIBRARY`, or its default location, and the unit with serial number `PS6000_SERIAL`
/// (or the first unit found) is opened.
pub fn open_device() -> Result<crate::AnyDevice> {
    if std::env::var_os("PS6000_SIMULATE").is_some() {
        log::info!("using simulated device");
        let device = Device::simulated(Default::default());
        return Ok(Device::new(Box::new(device.driver) as Box<dyn Driver>))
    }
    let library = std::env::var("PS6000_LIBRARY")
        .unwrap_or_else(|_| crate::sys::imp::DEFAULT_LIBRARY.to_owned());
    let serial = std::env::var("PS6000_SERIAL").ok();
    let device = Device::open_library(&library, serial.as_deref())?;
    Ok(Device::new(Box::new(device.driver) as Box<dyn Driver>))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::{IndexMode, Range, WaveType};
    use crate::sys::sim::SimulatorConfiguration;
    use crate::waveform::{build_ramp, AwgTiming};
    use crate::capture::{Overflow, MAX_VALUE, MIN_VALUE};

    type SimulatedDevice = Device<crate::sys::sim::SimulatedDriver>;

    const FAST: WaitPolicy = WaitPolicy {
        timeout: Duration::from_millis(20),
        poll_interval: Duration::from_micros(100),
    };

    fn device(polls_until_ready: Option<u32>) -> SimulatedDevice {
        let mut device = Device::simulated(SimulatorConfiguration {
            polls_until_ready, ..Default::default()
        });
        device.configure_channel(Channel::A, Some(ChannelConfiguration::default())).unwrap();
        device
    }

    #[test]
    fn test_awg_capture() {
        let mut device = device(Some(3));
        let table = build_ramp(100, 0, 4095).unwrap();
        let timing = AwgTiming::from_exponent(2).unwrap();
        device.configure_arbitrary_generator(&table, &ArbitraryGenerator::with_timing(&timing))
            .unwrap();
        // one AWG entry per 20 ns, one capture sample per 64 ns
        let request = CaptureRequest::new(Channel::A, 20, 14);
        let result = device.capture_block(&request, &FAST, &CancelToken::new()).unwrap();
        assert_eq!(result.samples().len(), 20);
        assert_eq!(result.overflow(), Overflow::empty());
        assert_eq!(result.samples()[0], MIN_VALUE);
        // the ramp lasts 2 us, longer than the capture
        assert!(result.samples().windows(2).all(|pair| pair[0] < pair[1]));
        assert_eq!(device.driver().history(), &[
            "ps6000SetChannel",
            "ps6000SetSigGenArbitrary",
            "ps6000RunBlock",
            "ps6000IsReady",
            "ps6000IsReady",
            "ps6000IsReady",
            "ps6000IsReady",
            "ps6000GetValues",
        ]);
    }

    #[test]
    fn test_awg_table_out_of_dac_range() {
        let mut device = device(Some(0));
        let table = build_ramp(4, 2, i16::MAX).unwrap();
        assert!(matches!(
            device.configure_arbitrary_generator(&table, &ArbitraryGenerator::default()),
            Err(Error::InvalidParameter(_))));
        assert_eq!(device.driver().history(), &["ps6000SetChannel"]);
    }

    #[test]
    fn test_awg_simple_loopback() {
        let mut device = device(Some(0));
        let generator = ArbitraryGenerator { shots: 0, ..Default::default() };
        // two entries of 640 ns each, sampled every 64 ns
        let (duration, delta_phase) = device.configure_awg_simple(&[0.5, 1.5], 1.28e-6,
            None, None, &generator).unwrap();
        assert_eq!(delta_phase, 2048);
        assert!((duration - 1.28e-6).abs() < 1e-15);
        let request = CaptureRequest::new(Channel::A, 20, 14);
        let result = device.capture_block(&request, &FAST, &CancelToken::new()).unwrap();
        // 0.5 V and 1.5 V on the 2 V range
        assert!(result.samples()[..9].iter().all(|&code| code == 8191));
        assert!(result.samples()[11..].iter().all(|&code| code == 24573));
    }

    #[test]
    fn test_awg_simple_dual_mode() {
        let mut device = device(Some(0));
        let generator = ArbitraryGenerator { index_mode: IndexMode::Dual, ..Default::default() };
        let waveform = (0..128).map(|index| index as f64 / 128.0).collect::<Vec<_>>();
        let (duration, delta_phase) = device.configure_awg_simple(&waveform, 2.56e-6,
            None, None, &generator).unwrap();
        // each entry is played twice per period
        assert_eq!(delta_phase, 131072);
        assert!((duration - 2.56e-6).abs() < 1e-15);
    }

    #[test]
    fn test_awg_simple_over_voltage() {
        let mut device = device(Some(0));
        assert!(matches!(
            device.configure_awg_simple(&[0.0, 3.0], 1e-6, None, None,
                &ArbitraryGenerator::default()),
            Err(Error::Driver { function: "ps6000SetSigGenArbitrary", .. })));
        assert!(matches!(
            device.configure_awg_simple(&[1.0, 1.0], 1e-6, None, None,
                &ArbitraryGenerator::default()),
            Err(Error::InvalidParameter(_))));
    }

    #[test]
    fn test_awg_zero_delta_phase() {
        let mut device = device(Some(0));
        let table = build_ramp(4, 0, 100).unwrap();
        let generator = ArbitraryGenerator { start_delta_phase: 0, ..Default::default() };
        assert!(matches!(device.configure_arbitrary_generator(&table, &generator),
            Err(Error::InvalidParameter(_))));
    }

    #[test]
    fn test_awg_16bit_table_rejected_by_device() {
        let mut device = device(Some(0));
        let table = build_ramp(100, i16::MIN, i16::MAX).unwrap();
        assert!(matches!(
            device.configure_arbitrary_generator(&table, &ArbitraryGenerator::default()),
            Err(Error::Driver { function: "ps6000SetSigGenArbitrary", .. })));
    }

    #[test]
    fn test_capture_timeout() {
        let mut device = device(None);
        let request = CaptureRequest::new(Channel::A, 100, 5);
        let started = Instant::now();
        assert!(matches!(device.capture_block(&request, &FAST, &CancelToken::new()),
            Err(Error::Timeout)));
        assert!(started.elapsed() >= FAST.timeout);
        assert_eq!(device.driver().history().last(), Some(&"ps6000Stop"));
        assert!(!device.driver().history().contains(&"ps6000GetValues"));
    }

    #[test]
    fn test_capture_cancelled() {
        let mut device = device(None);
        let cancel = CancelToken::new();
        cancel.clone().cancel();
        assert!(cancel.is_cancelled());
        let request = CaptureRequest::new(Channel::A, 100, 5);
        assert!(matches!(device.capture_block(&request, &WaitPolicy::default(), &cancel),
            Err(Error::Cancelled)));
        assert_eq!(device.driver().history(),
            &["ps6000SetChannel", "ps6000RunBlock", "ps6000Stop"]);
    }

    #[test]
    fn test_capture_cancelled_from_other_thread() {
        let mut device = device(None);
        let cancel = CancelToken::new();
        let canceller = {
            let cancel = cancel.clone();
            std::thread::spawn(move || {
                sleep(Duration::from_millis(10));
                cancel.cancel()
            })
        };
        let policy = WaitPolicy { timeout: Duration::from_secs(60), ..Default::default() };
        let request = CaptureRequest::new(Channel::A, 100, 5);
        assert!(matches!(device.capture_block(&request, &policy, &cancel), Err(Error::Cancelled)));
        canceller.join().unwrap();
    }

    #[test]
    fn test_capture_unbounded_wait_cancelled() {
        let mut device = device(None);
        let cancel = CancelToken::new();
        let canceller = {
            let cancel = cancel.clone();
            std::thread::spawn(move || {
                sleep(Duration::from_millis(10));
                cancel.cancel()
            })
        };
        let policy = WaitPolicy { timeout: Duration::MAX, ..Default::default() };
        let request = CaptureRequest::new(Channel::A, 8, 5);
        assert!(matches!(device.capture_block(&request, &policy, &cancel), Err(Error::Cancelled)));
        canceller.join().unwrap();
        assert_eq!(device.driver().history().last(), Some(&"ps6000Stop"));
    }

    #[test]
    fn test_capture_unbounded_wait_ready() {
        let mut device = device(Some(3));
        let policy = WaitPolicy { timeout: Duration::MAX, ..FAST };
        let request = CaptureRequest::new(Channel::A, 8, 5);
        let result = device.capture_block(&request, &policy, &CancelToken::new()).unwrap();
        assert_eq!(result.samples().len(), 8);
    }

    #[test]
    fn test_capture_empty_request() {
        let mut device = device(Some(0));
        let request = CaptureRequest::new(Channel::A, 0, 5);
        assert!(matches!(device.capture_block(&request, &FAST, &CancelToken::new()),
            Err(Error::InvalidParameter(_))));
    }

    #[test]
    fn test_capture_disabled_channel() {
        let mut device = device(Some(0));
        let request = CaptureRequest::new(Channel::C, 10, 5);
        assert!(matches!(device.capture_block(&request, &FAST, &CancelToken::new()),
            Err(Error::Driver { function: "ps6000GetValues", .. })));
    }

    #[test]
    fn test_capture_overflow() {
        let mut device = device(Some(1));
        device.configure_channel(Channel::A, Some(ChannelConfiguration {
            range: Range::mV50, ..Default::default()
        })).unwrap();
        device.configure_trigger(Some(TriggerConfiguration::default())).unwrap();
        device.configure_built_in_generator(
            &BuiltInGenerator::fixed(WaveType::Square, 15_625_000.0, 4_000_000)).unwrap();
        let request = CaptureRequest::new(Channel::A, 156, 5);
        let result = device.capture_block(&request, &FAST, &CancelToken::new()).unwrap();
        assert_eq!(result.samples().len(), 156);
        assert_eq!(result.overflow(), Overflow::A);
        assert!(result.samples().iter().all(|&code| code == MAX_VALUE || code == MIN_VALUE));
        assert_eq!(device.driver().trigger(), Some(&TriggerConfiguration::default()));
    }

    #[test]
    fn test_repeated_captures() {
        let mut device = device(Some(2));
        let request = CaptureRequest::new(Channel::A, 4096, 5);
        for _ in 0..16 {
            let result = device.capture_block(&request, &FAST, &CancelToken::new()).unwrap();
            assert_eq!(result.samples().len(), 4096);
        }
    }

    #[test]
    fn test_timebase() {
        let mut device = device(Some(0));
        let info = device.timebase(5, 1000).unwrap();
        assert!((info.interval - 6.4e-9).abs() < 1e-15);
        assert_eq!(info.max_samples, 1 << 24);
    }

    #[test]
    fn test_close() {
        let device = device(Some(0));
        assert!(device.close().is_ok());
    }

    #[test]
    fn test_boxed_driver() {
        let device = device(Some(0));
        let mut device: Device<Box<dyn Driver>> = Device::new(Box::new(device.driver) as Box<dyn Driver>);
        let request = CaptureRequest::new(Channel::A, 8, 5);
        let result = device.capture_block(&request, &FAST, &CancelToken::new()).unwrap();
        assert_eq!(result.samples(), &[0; 8]);
    }
}
