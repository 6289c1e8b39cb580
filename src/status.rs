//! Status codes returned by every call into the vendor library.

use std::fmt;

/// A `PICO_STATUS` value. Zero means success; everything else is a failure reported by the
/// vendor driver, which this crate does not interpret beyond looking up its name.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PicoStatus(pub u32);

const STATUS_TABLE: &[(u32, &str, &str)] = &[
    (0x00, "PICO_OK", "The device is functioning correctly."),
    (0x01, "PICO_MAX_UNITS_OPENED", "An attempt has been made to open more than the maximum number of units."),
    (0x02, "PICO_MEMORY_FAIL", "Not enough memory could be allocated on the host machine."),
    (0x03, "PICO_NOT_FOUND", "No device could be found."),
    (0x04, "PICO_FW_FAIL", "Unable to download firmware."),
    (0x05, "PICO_OPEN_OPERATION_IN_PROGRESS", ""),
    (0x06, "PICO_OPERATION_FAILED", ""),
    (0x07, "PICO_NOT_RESPONDING", "The device is not responding to commands from the PC."),
    (0x08, "PICO_CONFIG_FAIL", "The configuration information in the device has become corrupt or is missing."),
    (0x0C, "PICO_INVALID_HANDLE", "There is no device with the handle value passed."),
    (0x0D, "PICO_INVALID_PARAMETER", "A parameter value is not valid."),
    (0x0E, "PICO_INVALID_TIMEBASE", "The timebase is not supported or is invalid."),
    (0x0F, "PICO_INVALID_VOLTAGE_RANGE", "The voltage range is not supported or is invalid."),
    (0x10, "PICO_INVALID_CHANNEL", "The channel number is not valid on this device or no channels have been set."),
    (0x11, "PICO_INVALID_TRIGGER_CHANNEL", "The channel set for a trigger is not available on this device."),
    (0x13, "PICO_NO_SIGNAL_GENERATOR", "The device does not have a signal generator."),
    (0x15, "PICO_BLOCK_MODE_FAILED", "Block failed to start; a parameter may have been set wrongly."),
    (0x16, "PICO_NULL_PARAMETER", "A parameter that was required is NULL."),
    (0x18, "PICO_DATA_NOT_AVAILABLE", "No data is available from a run block call."),
    (0x1B, "PICO_AUTO_TRIGGER_TIME_TOO_SHORT", "The auto trigger time is less than the time it will take to collect the pre-trigger data."),
    (0x1C, "PICO_BUFFER_STALL", "The collection of data has stalled as unread data would be overwritten."),
    (0x1D, "PICO_TOO_MANY_SAMPLES", "Number of samples requested is more than available in the current memory segment."),
    (0x25, "PICO_NO_SAMPLES_AVAILABLE", "No samples are available because a run has not been completed."),
    (0x26, "PICO_SEGMENT_OUT_OF_RANGE", "The memory index is out of range."),
    (0x27, "PICO_BUSY", "Data cannot be returned yet."),
    (0x28, "PICO_STARTINDEX_INVALID", "The start time to get stored data is out of range."),
    (0x2D, "PICO_MEMORY", "Driver cannot allocate memory."),
    (0x2E, "PICO_SIG_GEN_PARAM", "Incorrect parameter passed to signal generator."),
    (0x35, "PICO_SIGGEN_OUTPUT_OVER_VOLTAGE", "The combined peak to peak voltage and the analog offset voltage exceed the allowable voltage the signal generator can produce."),
    (0x38, "PICO_SIGGEN_OFFSET_VOLTAGE", "The analog offset voltage is out of range."),
    (0x39, "PICO_SIGGEN_PK_TO_PK", "The analog peak to peak voltage is out of range."),
    (0x3A, "PICO_CANCELLED", "A block collection has been cancelled."),
    (0x3C, "PICO_INVALID_CALL", "The wrong GetValues function has been called for the collection mode in use."),
    (0x41, "PICO_INVALID_STATE", "Device is in an invalid state."),
    (0x43, "PICO_DRIVER_FUNCTION", "A driver function was called while another driver function was still being processed."),
    (0x45, "PICO_INVALID_COUPLING", "An invalid coupling type was specified."),
    (0x46, "PICO_BUFFERS_NOT_SET", "An attempt was made to get data before a data buffer was defined."),
    (0x4A, "PICO_INTERFACE_NOT_CONNECTED", "The driver was unable to contact the oscilloscope."),
    (0x4D, "PICO_SIGGEN_WAVEFORM_SETUP_FAILED", "A problem occurred while setting up the signal generator."),
    (0x53, "PICO_CONFIG_FAIL_AWG", "Unable to configure the signal generator."),
    (0x10F, "PICO_AWG_NOT_SUPPORTED", "The device does not have an arbitrary waveform generator."),
    (0x112, "PICO_SIG_GEN_WAVETYPE_NOT_SUPPORTED", "The wave type requested is not supported by the opened device."),
];

impl PicoStatus {
    pub const OK: PicoStatus = PicoStatus(0x00);
    pub const NOT_FOUND: PicoStatus = PicoStatus(0x03);
    pub const INVALID_PARAMETER: PicoStatus = PicoStatus(0x0D);
    pub const INVALID_TIMEBASE: PicoStatus = PicoStatus(0x0E);
    pub const NO_SAMPLES_AVAILABLE: PicoStatus = PicoStatus(0x25);
    pub const BUFFERS_NOT_SET: PicoStatus = PicoStatus(0x46);
    pub const SIG_GEN_PARAM: PicoStatus = PicoStatus(0x2E);

    pub fn is_ok(self) -> bool {
        self == Self::OK
    }

    fn lookup(self) -> Option<&'static (u32, &'static str, &'static str)> {
        STATUS_TABLE.iter().find(|(code, _, _)| *code == self.0)
    }

    pub fn name(self) -> Option<&'static str> {
        self.lookup().map(|&(_, name, _)| name)
    }

    pub fn description(self) -> Option<&'static str> {
        self.lookup().map(|&(_, _, description)| description).filter(|d| !d.is_empty())
    }

    /// Turns a raw status returned by `function` into a `Result`.
    pub(crate) fn check(self, function: &'static str) -> crate::Result<()> {
        if self.is_ok() {
            Ok(())
        } else if self == Self::NOT_FOUND {
            log::debug!("{} returned {:?}", function, self);
            Err(crate::Error::NotFound)
        } else {
            log::debug!("{} returned {:?}", function, self);
            Err(crate::Error::Driver { function, status: self })
        }
    }
}

impl fmt::Debug for PicoStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{}({:#x})", name, self.0),
            None => write!(f, "PicoStatus({:#x})", self.0),
        }
    }
}

impl fmt::Display for PicoStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match (self.name(), self.description()) {
            (Some(name), Some(description)) => write!(f, "{} ({})", name, description),
            (Some(name), None) => write!(f, "{}", name),
            (None, _) => write!(f, "error code {:#x}", self.0),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_check_ok() {
        assert!(PicoStatus(0).check("ps6000Stop").is_ok());
    }

    #[test]
    fn test_check_not_found() {
        assert!(matches!(PicoStatus(3).check("ps6000OpenUnit"), Err(crate::Error::NotFound)));
    }

    #[test]
    fn test_check_driver_error() {
        match PicoStatus(0x0e).check("ps6000GetTimebase2") {
            Err(crate::Error::Driver { function, status }) => {
                assert_eq!(function, "ps6000GetTimebase2");
                assert_eq!(status, PicoStatus::INVALID_TIMEBASE);
            }
            other => panic!("unexpected {:?}", other)
        }
    }

    #[test]
    fn test_format_known() {
        let status = PicoStatus(0x0d);
        assert_eq!(format!("{:?}", status), "PICO_INVALID_PARAMETER(0xd)");
        assert_eq!(format!("{}", status), "PICO_INVALID_PARAMETER (A parameter value is not valid.)");
    }

    #[test]
    fn test_format_without_description() {
        assert_eq!(format!("{}", PicoStatus(0x06)), "PICO_OPERATION_FAILED");
    }

    #[test]
    fn test_format_unknown() {
        let status = PicoStatus(0xdead);
        assert_eq!(status.name(), None);
        assert_eq!(format!("{:?}", status), "PicoStatus(0xdead)");
        assert_eq!(format!("{}", status), "error code 0xdead");
    }
}
