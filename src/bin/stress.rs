//! Stress test for fetching data: runs back-to-back block captures, each into a fresh buffer,
//! stopping at the first driver failure. Tested with a 2.5 V pk-pk 1 kHz sine wave on channel A.

use ps6000::{CancelToken, CaptureRequest, Channel, ChannelConfiguration, Range};
use ps6000::{TriggerConfiguration, WaitPolicy};

const TIMEBASE: u32 = 5;
const WANTED_SAMPLES: u32 = 4096;
const CAPTURE_COUNT: usize = 4096;

fn main() -> ps6000::Result<()> {
    env_logger::init();
    println!("This is a demo about the weirdly behaving PicoScope 6403B");
    println!("getValues seems to crash the system after repeated calls");

    let mut device = ps6000::open_device()?;

    let timebase = device.timebase(TIMEBASE, WANTED_SAMPLES)?;
    println!("Set timebase to {} = {:.3} ns", TIMEBASE, timebase.interval * 1e9);
    println!("Will measure for {} samples = {:.3} ns",
        WANTED_SAMPLES, WANTED_SAMPLES as f64 * timebase.interval * 1e9);
    println!("Max samples = {}", timebase.max_samples);
    if WANTED_SAMPLES > timebase.max_samples {
        return Err(ps6000::Error::InvalidParameter(format!(
            "{} samples requested, device holds {}", WANTED_SAMPLES, timebase.max_samples)))
    }

    let channel = ChannelConfiguration { range: Range::V2, ..Default::default() };
    device.configure_channel(Channel::A, Some(channel))?;
    device.configure_trigger(Some(TriggerConfiguration::default()))?;
    println!("Set the trigger");

    let policy = WaitPolicy::default();
    let cancel = CancelToken::new();
    let request = CaptureRequest::new(Channel::A, WANTED_SAMPLES, TIMEBASE);
    for capture in 0..CAPTURE_COUNT {
        println!("Capture {}/{}", capture + 1, CAPTURE_COUNT);
        let result = device.capture_block(&request, &policy, &cancel)?;
        log::debug!("time indisposed = {:?}", result.time_indisposed());
        let samples = result.into_samples();
        println!("Obtained {}/{} samples", samples.len(), WANTED_SAMPLES);
    }

    device.stop()?;
    device.close()?;
    Ok(())
}
