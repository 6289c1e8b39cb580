use std::time::Duration;

use crate::{Error, Result};
use crate::config::{ArbitraryGenerator, BuiltInGenerator, Channel};
use crate::config::{ChannelConfiguration, TriggerConfiguration};
use crate::capture::TimebaseInfo;
use super::Overflow;

pub const DEFAULT_LIBRARY: &str = "ps6000";

/// Stands in for the vendor binding when it is not built; can never be opened.
#[derive(Debug)]
pub enum Ps6000Driver {}

impl Ps6000Driver {
    pub fn open(library_path: &str, _serial: Option<&str>) -> Result<Ps6000Driver> {
        log::warn!("cannot load {}: built without hardware support", library_path);
        Err(Error::NotFound)
    }
}

impl super::Driver for Ps6000Driver {
    fn set_channel(&mut self, _channel: Channel, _config: Option<&ChannelConfiguration>)
            -> Result<()> {
        match *self {}
    }

    fn set_simple_trigger(&mut self, _trigger: Option<&TriggerConfiguration>) -> Result<()> {
        match *self {}
    }

    fn set_sig_gen_arbitrary(&mut self, _waveform: &[i16], _generator: &ArbitraryGenerator)
            -> Result<()> {
        match *self {}
    }

    fn set_sig_gen_built_in(&mut self, _generator: &BuiltInGenerator) -> Result<()> {
        match *self {}
    }

    fn get_timebase(&mut self, _timebase: u32, _sample_count: u32) -> Result<TimebaseInfo> {
        match *self {}
    }

    fn run_block(&mut self, _pre_trigger_samples: u32, _post_trigger_samples: u32,
                 _timebase: u32) -> Result<Duration> {
        match *self {}
    }

    fn is_ready(&mut self) -> Result<bool> {
        match *self {}
    }

    fn get_values(&mut self, _channel: Channel, _buffer: &mut [i16]) -> Result<(usize, Overflow)> {
        match *self {}
    }

    fn stop(&mut self) -> Result<()> {
        match *self {}
    }

    fn close(&mut self) -> Result<()> {
        match *self {}
    }
}
