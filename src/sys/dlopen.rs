use std::ffi::{CStr, CString};
use std::ptr;
use std::time::Duration;
use libc::{c_char, c_float, c_int, c_void};

use crate::{Error, PicoStatus, Result};
use crate::config::{ArbitraryGenerator, BuiltInGenerator, Channel};
use crate::config::{ChannelConfiguration, TriggerConfiguration};
use crate::capture::TimebaseInfo;
use super::Overflow;

#[cfg(target_os = "macos")]
pub const DEFAULT_LIBRARY: &str = "libps6000.dylib";
#[cfg(not(target_os = "macos"))]
pub const DEFAULT_LIBRARY: &str = "libps6000.so";

// PS6000_RATIO_MODE_NONE
const RATIO_MODE_NONE: c_int = 0;
// PS6000_UP and PS6000_ES_OFF; sweeping and extra operations are not used
const SWEEP_TYPE_UP: c_int = 0;
const EXTRA_OPERATIONS_OFF: c_int = 0;

type Status = u32;
type Handle = i16;
type BlockReady = Option<unsafe extern "C" fn(Handle, Status, *mut c_void)>;

#[derive(Debug)]
struct Library(*mut c_void);

impl Library {
    fn open(path: &CStr) -> Result<Library> {
        unsafe {
            let handle = libc::dlopen(path.as_ptr(), libc::RTLD_NOW | libc::RTLD_LOCAL);
            if handle.is_null() {
                log::warn!("cannot load {:?}: {}", path, last_dl_error());
                Err(Error::NotFound)
            } else {
                Ok(Library(handle))
            }
        }
    }

    /// SAFETY: `T` must be a function pointer type matching the C prototype of `name`.
    unsafe fn symbol<T: Copy>(&self, name: &CStr) -> Result<T> {
        assert_eq!(std::mem::size_of::<T>(), std::mem::size_of::<*mut c_void>());
        let address = libc::dlsym(self.0, name.as_ptr());
        if address.is_null() {
            Err(Error::Other(format!("missing symbol {:?}: {}", name, last_dl_error()).into()))
        } else {
            Ok(std::mem::transmute_copy::<*mut c_void, T>(&address))
        }
    }
}

impl Drop for Library {
    fn drop(&mut self) {
        unsafe {
            if libc::dlclose(self.0) != 0 {
                log::error!("error unloading vendor library: {}", last_dl_error())
            }
        }
    }
}

fn last_dl_error() -> String {
    unsafe {
        let message = libc::dlerror();
        if message.is_null() {
            "unknown error".to_owned()
        } else {
            CStr::from_ptr(message).to_string_lossy().into_owned()
        }
    }
}

macro_rules! api {
    { $( fn $name:ident ( $( $arg:ty ),* ); )+ } => {
        #[allow(non_snake_case)]
        #[derive(Clone, Copy)]
        struct Api {
            $( $name: unsafe extern "C" fn($( $arg ),*) -> Status, )+
        }

        impl Api {
            fn load(library: &Library) -> Result<Api> {
                // SAFETY: The prototypes above are taken from `ps6000Api.h`.
                unsafe {
                    Ok(Api {
                        $( $name: library.symbol(
                            CStr::from_bytes_with_nul(concat!(stringify!($name), "\0").as_bytes())
                                .expect("symbol name is nul-terminated"))?, )+
                    })
                }
            }
        }
    };
}

api! {
    fn ps6000OpenUnit(*mut Handle, *const c_char);
    fn ps6000CloseUnit(Handle);
    fn ps6000SetChannel(Handle, c_int, i16, c_int, c_int, c_float, c_int);
    fn ps6000SetSimpleTrigger(Handle, i16, c_int, i16, c_int, u32, i16);
    fn ps6000SetSigGenArbitrary(Handle, i32, u32, u32, u32, u32, u32, *const i16, i32,
                                c_int, c_int, c_int, u32, u32, c_int, c_int, i16);
    fn ps6000SetSigGenBuiltIn(Handle, i32, u32, i16, c_float, c_float, c_float, c_float,
                              c_int, c_int, u32, u32, c_int, c_int, i16);
    fn ps6000GetTimebase2(Handle, u32, u32, *mut c_float, i16, *mut u32, u32);
    fn ps6000RunBlock(Handle, u32, u32, u32, i16, *mut i32, u32, BlockReady, *mut c_void);
    fn ps6000IsReady(Handle, *mut i16);
    fn ps6000SetDataBuffer(Handle, c_int, *mut i16, u32, c_int);
    fn ps6000GetValues(Handle, u32, *mut u32, u32, c_int, u32, *mut i16);
    fn ps6000Stop(Handle);
}

/// An open PicoScope 6000 unit, driven through the vendor library loaded at runtime.
pub struct Ps6000Driver {
    api: Api,
    handle: Option<Handle>,
    // must outlive every call through `api`; dropped after `Drop::drop` closes the unit
    _library: Library,
}

impl Ps6000Driver {
    /// Load the vendor library at `library_path` and open the unit with the given serial
    /// number, or the first unit found.
    pub fn open(library_path: &str, serial: Option<&str>) -> Result<Ps6000Driver> {
        let library_path = CString::new(library_path)
            .map_err(|_| Error::invalid("library path contains a nul byte"))?;
        let serial = serial.map(CString::new).transpose()
            .map_err(|_| Error::invalid("serial number contains a nul byte"))?;
        let library = Library::open(library_path.as_ref())?;
        let api = Api::load(&library)?;
        let mut handle: Handle = 0;
        let status = unsafe {
            (api.ps6000OpenUnit)(&mut handle, serial.as_ref().map_or(ptr::null(), |s| s.as_ptr()))
        };
        PicoStatus(status).check("ps6000OpenUnit")?;
        if handle <= 0 {
            return Err(Error::NotFound)
        }
        log::debug!("opened unit {:?} with handle {}", serial, handle);
        Ok(Ps6000Driver { api, handle: Some(handle), _library: library })
    }

    fn handle(&self) -> Result<Handle> {
        self.handle.ok_or_else(|| Error::Driver {
            function: "ps6000",
            status: PicoStatus(0x0c), // PICO_INVALID_HANDLE
        })
    }
}

impl std::fmt::Debug for Ps6000Driver {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("Ps6000Driver")
            .field("handle", &self.handle)
            .field("library", &self._library)
            .finish()
    }
}

impl Drop for Ps6000Driver {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            let status = unsafe { (self.api.ps6000CloseUnit)(handle) };
            if let Err(error) = PicoStatus(status).check("ps6000CloseUnit") {
                log::error!("error closing unit: {}", error)
            }
        }
    }
}

impl super::Driver for Ps6000Driver {
    fn set_channel(&mut self, channel: Channel, config: Option<&ChannelConfiguration>)
            -> Result<()> {
        let handle = self.handle()?;
        let status = match config {
            Some(config) => unsafe {
                (self.api.ps6000SetChannel)(handle, channel.api_code(), 1,
                    config.coupling.api_code(), config.range.api_code(), config.analog_offset,
                    config.bandwidth.api_code())
            }
            None => unsafe {
                let config = ChannelConfiguration::default();
                (self.api.ps6000SetChannel)(handle, channel.api_code(), 0,
                    config.coupling.api_code(), config.range.api_code(), 0.0,
                    config.bandwidth.api_code())
            }
        };
        PicoStatus(status).check("ps6000SetChannel")
    }

    fn set_simple_trigger(&mut self, trigger: Option<&TriggerConfiguration>) -> Result<()> {
        let handle = self.handle()?;
        let enabled = trigger.is_some() as i16;
        let trigger = trigger.copied().unwrap_or_default();
        let status = unsafe {
            (self.api.ps6000SetSimpleTrigger)(handle, enabled, trigger.source.api_code(),
                trigger.threshold, trigger.direction.api_code(), trigger.delay_samples,
                trigger.auto_trigger_ms)
        };
        PicoStatus(status).check("ps6000SetSimpleTrigger")
    }

    fn set_sig_gen_arbitrary(&mut self, waveform: &[i16], generator: &ArbitraryGenerator)
            -> Result<()> {
        let handle = self.handle()?;
        let status = unsafe {
            (self.api.ps6000SetSigGenArbitrary)(handle,
                generator.offset_microvolts,
                generator.peak_to_peak_microvolts,
                generator.start_delta_phase,
                generator.stop_delta_phase,
                0, // deltaPhaseIncrement
                0, // dwellCount
                waveform.as_ptr(),
                waveform.len() as i32,
                SWEEP_TYPE_UP,
                EXTRA_OPERATIONS_OFF,
                generator.index_mode.api_code(),
                generator.shots,
                0, // sweeps
                generator.trigger_type.api_code(),
                generator.trigger_source.api_code(),
                0) // extInThreshold
        };
        PicoStatus(status).check("ps6000SetSigGenArbitrary")
    }

    fn set_sig_gen_built_in(&mut self, generator: &BuiltInGenerator) -> Result<()> {
        let handle = self.handle()?;
        let status = unsafe {
            (self.api.ps6000SetSigGenBuiltIn)(handle,
                generator.offset_microvolts,
                generator.peak_to_peak_microvolts,
                generator.wave_type.api_code(),
                generator.start_frequency,
                generator.stop_frequency,
                0.0, // increment
                0.0, // dwellTime
                SWEEP_TYPE_UP,
                EXTRA_OPERATIONS_OFF,
                generator.shots,
                0, // sweeps
                generator.trigger_type.api_code(),
                generator.trigger_source.api_code(),
                0) // extInThreshold
        };
        PicoStatus(status).check("ps6000SetSigGenBuiltIn")
    }

    fn get_timebase(&mut self, timebase: u32, sample_count: u32) -> Result<TimebaseInfo> {
        let handle = self.handle()?;
        let mut interval_ns: c_float = 0.0;
        let mut max_samples: u32 = 0;
        let status = unsafe {
            (self.api.ps6000GetTimebase2)(handle, timebase, sample_count, &mut interval_ns, 0,
                &mut max_samples, 0)
        };
        PicoStatus(status).check("ps6000GetTimebase2")?;
        Ok(TimebaseInfo { interval: interval_ns as f64 / 1e9, max_samples })
    }

    fn run_block(&mut self, pre_trigger_samples: u32, post_trigger_samples: u32, timebase: u32)
            -> Result<Duration> {
        let handle = self.handle()?;
        let mut time_indisposed_ms: i32 = 0;
        let status = unsafe {
            (self.api.ps6000RunBlock)(handle, pre_trigger_samples, post_trigger_samples, timebase,
                0, &mut time_indisposed_ms, 0, None, ptr::null_mut())
        };
        PicoStatus(status).check("ps6000RunBlock")?;
        Ok(Duration::from_millis(time_indisposed_ms.max(0) as u64))
    }

    fn is_ready(&mut self) -> Result<bool> {
        let handle = self.handle()?;
        let mut ready: i16 = 0;
        let status = unsafe { (self.api.ps6000IsReady)(handle, &mut ready) };
        PicoStatus(status).check("ps6000IsReady")?;
        Ok(ready != 0)
    }

    fn get_values(&mut self, channel: Channel, buffer: &mut [i16]) -> Result<(usize, Overflow)> {
        let handle = self.handle()?;
        let length = u32::try_from(buffer.len())
            .map_err(|_| Error::invalid("sample buffer is too large"))?;
        let status = unsafe {
            (self.api.ps6000SetDataBuffer)(handle, channel.api_code(), buffer.as_mut_ptr(),
                length, RATIO_MODE_NONE)
        };
        PicoStatus(status).check("ps6000SetDataBuffer")?;

        let mut sample_count = length;
        let mut overflow: i16 = 0;
        let status = unsafe {
            (self.api.ps6000GetValues)(handle, 0, &mut sample_count, 1, RATIO_MODE_NONE, 0,
                &mut overflow)
        };

        // The driver keeps the buffer pointer until it is replaced; unregister it before the
        // buffer can be freed, whether or not fetching succeeded.
        let clear_status = unsafe {
            (self.api.ps6000SetDataBuffer)(handle, channel.api_code(), ptr::null_mut(), 0,
                RATIO_MODE_NONE)
        };
        PicoStatus(status).check("ps6000GetValues")?;
        PicoStatus(clear_status).check("ps6000SetDataBuffer")?;

        Ok((sample_count.min(length) as usize, Overflow::from_bits_truncate(overflow as u16)))
    }

    fn stop(&mut self) -> Result<()> {
        let handle = self.handle()?;
        let status = unsafe { (self.api.ps6000Stop)(handle) };
        PicoStatus(status).check("ps6000Stop")
    }

    fn close(&mut self) -> Result<()> {
        match self.handle.take() {
            Some(handle) => {
                let status = unsafe { (self.api.ps6000CloseUnit)(handle) };
                PicoStatus(status).check("ps6000CloseUnit")
            }
            None => Ok(())
        }
    }
}
