//! Demonstrates the built-in signal generator of a 6403B sticking to low values: a square wave
//! of 4 V pk-pk looped back into channel A should saturate the 50 mV range in both directions.

use ps6000::{BuiltInGenerator, CancelToken, CaptureRequest, CaptureResult, Channel};
use ps6000::{ChannelConfiguration, Range, TriggerConfiguration, WaitPolicy, WaveType};

const TIMEBASE: u32 = 5;
const WANTED_DURATION: f64 = 1e-6;

fn main() -> ps6000::Result<()> {
    env_logger::init();
    println!("This is a demo about the weirdly behaving PicoScope 6403B");
    println!("signal generator sticking to low values");

    let mut device = ps6000::open_device()?;

    let interval = ps6000::timebase_interval(TIMEBASE);
    let wanted_samples = (WANTED_DURATION / interval) as u32;
    let timebase = device.timebase(TIMEBASE, wanted_samples)?;
    println!("Set timebase to {} = {:.3} ns", TIMEBASE, timebase.interval * 1e9);
    println!("Will measure for {} samples = {:.3} ns", wanted_samples, WANTED_DURATION * 1e9);
    println!("Max samples = {}", timebase.max_samples);
    if wanted_samples > timebase.max_samples {
        return Err(ps6000::Error::InvalidParameter(format!(
            "{} samples requested, device holds {}", wanted_samples, timebase.max_samples)))
    }

    let channel = ChannelConfiguration { range: Range::mV50, ..Default::default() };
    device.configure_channel(Channel::A, Some(channel))?;
    device.configure_trigger(Some(TriggerConfiguration::default()))?;

    let frequency = (1.0 / (10.0 * interval)) as f32;
    let generator = BuiltInGenerator::fixed(WaveType::Square, frequency, 4_000_000);
    device.configure_built_in_generator(&generator)?;
    println!("Just set signal generator to generate a {} uV pkToPk signal @ {:.3} MHz",
        generator.peak_to_peak_microvolts, frequency / 1e6);

    let request = CaptureRequest::new(Channel::A, wanted_samples, TIMEBASE);
    let result = device.capture_block(&request, &WaitPolicy::default(), &CancelToken::new())?;
    println!("Time indisposed = {} ms", result.time_indisposed().as_millis());
    device.stop()?;
    device.close()?;

    println!("Measured {} / {} samples", result.samples().len(), wanted_samples);
    println!("Printing results");
    for (index, &code) in result.samples().iter().enumerate() {
        println!("[{:03}] = {} | {:.7}V", index, code, CaptureResult::code_to_volts(&channel, code));
    }
    if !result.overflow().is_empty() {
        println!("Overflow on {:?}", result.overflow());
    }
    Ok(())
}
