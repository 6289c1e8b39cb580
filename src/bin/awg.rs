use ps6000::{ArbitraryGenerator, AwgTiming, CancelToken, CaptureRequest, Channel};
use ps6000::{ChannelConfiguration, Coupling, Range, TriggerConfiguration, WaitPolicy};

const FILENAME: &str = "measured_waveform.txt";

const AWG_TIME_SCALE_EXPONENT: u32 = 2;
const AWG_SIZE: usize = 100;
const AWG_MIN_VALUE: i16 = ps6000::AWG_MIN_VALUE;
const AWG_MAX_VALUE: i16 = ps6000::AWG_MAX_VALUE;

const TIMEBASE: u32 = 5;
// capture this many waveform durations
const OVERSAMPLING: f64 = 5.0;

fn main() -> ps6000::Result<()> {
    env_logger::init();

    let timing = AwgTiming::from_exponent(AWG_TIME_SCALE_EXPONENT)?;
    let table = ps6000::build_ramp(AWG_SIZE, AWG_MIN_VALUE, AWG_MAX_VALUE)?;
    println!("Waveform is:");
    for (index, sample) in table.samples().iter().enumerate() {
        println!("awg[{:03}] = {:+06}", index, sample);
    }

    let mut device = ps6000::open_device()?;

    let awg_duration = timing.duration(table.sample_count());
    let wanted_samples = (awg_duration / ps6000::timebase_interval(TIMEBASE) * OVERSAMPLING) as u32;
    let timebase = device.timebase(TIMEBASE, wanted_samples)?;
    println!("timebase {} = {:.3} ns, {} samples of at most {}",
        TIMEBASE, timebase.interval * 1e9, wanted_samples, timebase.max_samples);

    let channel = ChannelConfiguration {
        range: Range::V2,
        coupling: Coupling::DC1M,
        ..Default::default()
    };
    device.configure_channel(Channel::A, Some(channel))?;
    for other in Channel::ALL.into_iter().filter(|&other| other != Channel::A) {
        device.configure_channel(other, None)?;
    }
    // the capture does not depend on this trigger; it only gives the capture a defined start
    device.configure_trigger(Some(TriggerConfiguration::default()))?;

    let generator = ArbitraryGenerator {
        peak_to_peak_microvolts: 4_000_000,
        ..ArbitraryGenerator::with_timing(&timing)
    };
    println!("AWG delta phase = {}, one pass takes {:.3} us",
        timing.delta_phase(), awg_duration * 1e6);
    device.configure_arbitrary_generator(&table, &generator)?;

    let request = CaptureRequest::new(Channel::A, wanted_samples, TIMEBASE);
    let result = device.capture_block(&request, &WaitPolicy::default(), &CancelToken::new())?;
    device.stop()?;
    device.close()?;

    result.write_text(FILENAME)?;
    println!("saved {} samples to {}", result.samples().len(), FILENAME);
    Ok(())
}
