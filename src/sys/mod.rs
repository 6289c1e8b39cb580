use std::time::Duration;

use crate::Error;
use crate::config::{ArbitraryGenerator, BuiltInGenerator, Channel};
use crate::config::{ChannelConfiguration, TriggerConfiguration};
use crate::capture::TimebaseInfo;

pub use crate::capture::Overflow;

/// Everything this crate needs from the vendor driver. Implementations own an open unit; opening
/// is done by their constructors.
pub trait Driver {
    /// Enable and configure `channel`, or disable it if `config` is `None`.
    fn set_channel(&mut self, channel: Channel, config: Option<&ChannelConfiguration>)
        -> Result<(), Error>;
    /// Arm the simple edge/level trigger, or disable triggering if `trigger` is `None`.
    fn set_simple_trigger(&mut self, trigger: Option<&TriggerConfiguration>) -> Result<(), Error>;

    fn set_sig_gen_arbitrary(&mut self, waveform: &[i16], generator: &ArbitraryGenerator)
        -> Result<(), Error>;
    fn set_sig_gen_built_in(&mut self, generator: &BuiltInGenerator) -> Result<(), Error>;

    fn get_timebase(&mut self, timebase: u32, sample_count: u32) -> Result<TimebaseInfo, Error>;
    /// Start a block capture; returns the time the device expects to be busy.
    fn run_block(&mut self, pre_trigger_samples: u32, post_trigger_samples: u32, timebase: u32)
        -> Result<Duration, Error>;
    fn is_ready(&mut self) -> Result<bool, Error>;
    /// Fetch the samples of the last capture on `channel` into `buffer`. Returns the number of
    /// samples written. The driver must not retain `buffer` after returning.
    fn get_values(&mut self, channel: Channel, buffer: &mut [i16])
        -> Result<(usize, Overflow), Error>;
    fn stop(&mut self) -> Result<(), Error>;

    fn close(&mut self) -> Result<(), Error>;
}

impl<D: Driver + ?Sized> Driver for Box<D> {
    fn set_channel(&mut self, channel: Channel, config: Option<&ChannelConfiguration>)
            -> Result<(), Error> {
        (**self).set_channel(channel, config)
    }

    fn set_simple_trigger(&mut self, trigger: Option<&TriggerConfiguration>) -> Result<(), Error> {
        (**self).set_simple_trigger(trigger)
    }

    fn set_sig_gen_arbitrary(&mut self, waveform: &[i16], generator: &ArbitraryGenerator)
            -> Result<(), Error> {
        (**self).set_sig_gen_arbitrary(waveform, generator)
    }

    fn set_sig_gen_built_in(&mut self, generator: &BuiltInGenerator) -> Result<(), Error> {
        (**self).set_sig_gen_built_in(generator)
    }

    fn get_timebase(&mut self, timebase: u32, sample_count: u32) -> Result<TimebaseInfo, Error> {
        (**self).get_timebase(timebase, sample_count)
    }

    fn run_block(&mut self, pre_trigger_samples: u32, post_trigger_samples: u32, timebase: u32)
            -> Result<Duration, Error> {
        (**self).run_block(pre_trigger_samples, post_trigger_samples, timebase)
    }

    fn is_ready(&mut self) -> Result<bool, Error> {
        (**self).is_ready()
    }

    fn get_values(&mut self, channel: Channel, buffer: &mut [i16])
            -> Result<(usize, Overflow), Error> {
        (**self).get_values(channel, buffer)
    }

    fn stop(&mut self) -> Result<(), Error> {
        (**self).stop()
    }

    fn close(&mut self) -> Result<(), Error> {
        (**self).close()
    }
}

#[cfg(all(unix, feature = "hardware"))]
#[path = "dlopen.rs"]
pub mod imp;

#[cfg(not(all(unix, feature = "hardware")))]
#[path = "stub.rs"]
pub mod imp;

pub mod sim;
