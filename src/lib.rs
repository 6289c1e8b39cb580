mod sys;
mod status;
mod config;
mod waveform;
mod capture;
mod device;

use std::io;

#[derive(Debug)]
pub enum Error {
    NotFound,
    InvalidParameter(String),
    Driver { function: &'static str, status: PicoStatus },
    Timeout,
    Cancelled,
    Io(io::Error),
    Other(Box<dyn std::error::Error + Sync + Send + 'static>),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::NotFound =>
                write!(f, "device not connected"),
            Self::InvalidParameter(message) =>
                write!(f, "invalid parameter: {}", message),
            Self::Driver { function, status } =>
                write!(f, "error calling {}: {}", function, status),
            Self::Timeout =>
                write!(f, "timed out waiting for the device"),
            Self::Cancelled =>
                write!(f, "operation cancelled"),
            Self::Io(io_error) =>
                write!(f, "I/O error: {}", io_error),
            Self::Other(error) =>
                write!(f, "{}", error),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            &Self::Io(ref io_error) => Some(io_error),
            _ => None
        }
    }
}

impl From<io::Error> for Error {
    fn from(error: io::Error) -> Self {
        Error::Io(error)
    }
}

impl Error {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Error::InvalidParameter(message.into())
    }
}

pub type Result<T> =
    core::result::Result<T, Error>;

pub use status::PicoStatus;

pub use config::{
    Channel,
    Range,
    Coupling,
    Bandwidth,
    ThresholdDirection,
    WaveType,
    SigGenTriggerType,
    SigGenTriggerSource,
    IndexMode,
    ChannelConfiguration,
    TriggerConfiguration,
    ArbitraryGenerator,
    BuiltInGenerator,
};

pub use waveform::{
    AWG_PHASE_ACCUMULATOR_SIZE,
    AWG_BUFFER_ADDRESS_WIDTH,
    AWG_MAX_SAMPLES,
    AWG_DAC_INTERVAL,
    AWG_MIN_VALUE,
    AWG_MAX_VALUE,
    WaveformTable,
    AwgTiming,
    ScaledWaveform,
    build_ramp,
    delta_phase_for_interval,
    interval_for_delta_phase,
    delta_phase_for_duration,
    awg_duration,
};

pub use capture::{
    MAX_VALUE,
    MIN_VALUE,
    CaptureRequest,
    CaptureResult,
    TimebaseInfo,
    timebase_interval,
    timebase_for_interval,
};

pub use device::{
    WaitPolicy,
    CancelToken,
    open_device,
};

pub use sys::{
    Driver,
    Overflow,
    imp::Ps6000Driver,
    sim::{SimulatedDriver, SimulatorConfiguration},
};

/// A device driven by the vendor library, loaded at runtime.
pub type Device =
    device::Device<crate::sys::imp::Ps6000Driver>;

/// A device backed by the simulator; no hardware required.
pub type SimulatedDevice =
    device::Device<SimulatedDriver>;

/// A device whose backend is chosen at runtime, see [`open_device`].
pub type AnyDevice =
    device::Device<Box<dyn Driver>>;
