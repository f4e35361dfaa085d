//! Refresh timer using ESP-IDF's esp_timer API.
//!
//! A single one-shot `esp_timer` is created once and re-started for every
//! [`TimerPort::arm`].  Each arm bumps a generation counter that becomes the
//! [`TimerHandle`]; the expiry callback pushes the generation that was armed
//! into the event queue, so a callback racing a disarm delivers a stale
//! handle the scheduler ignores.  A timer that cannot be started is
//! reported to the caller instead of handing out a handle that never fires.
//!
//! Timer callbacks execute in the ESP timer task context (not ISR), so
//! they can safely call push_event().
//!
//! On simulation targets nothing fires on its own; tests call
//! [`HwTimer::sim_fire`] to deliver the armed expiry.

#[cfg(target_os = "espidf")]
use core::sync::atomic::{AtomicU32, Ordering};
use core::time::Duration;

use log::debug;

use crate::app::ports::{TimerHandle, TimerPort};
use crate::error::RadioError;
use crate::events::{push_event, Event};

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

/// Generations wrap within 24 bits; zero means "none armed".
const GENERATION_MASK: u32 = 0x00FF_FFFF;

/// Generation of the currently armed timer, read by the expiry callback.
#[cfg(target_os = "espidf")]
static ARMED_GENERATION: AtomicU32 = AtomicU32::new(0);

#[cfg(target_os = "espidf")]
unsafe extern "C" fn refresh_timer_cb(_arg: *mut core::ffi::c_void) {
    let generation = ARMED_GENERATION.swap(0, Ordering::AcqRel);
    if generation != 0 {
        push_event(Event::RefreshTimer(TimerHandle(generation)));
    }
}

pub struct HwTimer {
    generation: u32,
    #[cfg(target_os = "espidf")]
    handle: esp_timer_handle_t,
    #[cfg(not(target_os = "espidf"))]
    armed: Option<(TimerHandle, Duration)>,
    /// Make every later `arm` fail, as a refused `esp_timer_start_once`.
    #[cfg(not(target_os = "espidf"))]
    pub sim_fail_start: bool,
}

impl HwTimer {
    /// Create the one-shot timer.  Does not arm it.
    #[cfg(target_os = "espidf")]
    pub fn new() -> crate::error::Result<Self> {
        let args = esp_timer_create_args_t {
            callback: Some(refresh_timer_cb),
            arg: core::ptr::null_mut(),
            dispatch_method: esp_timer_dispatch_t_ESP_TIMER_TASK,
            name: b"refresh\0".as_ptr() as *const _,
            skip_unhandled_events: true,
        };
        let mut handle: esp_timer_handle_t = core::ptr::null_mut();
        // SAFETY: `args` outlives the call and `handle` is a valid out-pointer.
        let ret = unsafe { esp_timer_create(&args, &mut handle) };
        if ret != ESP_OK {
            log::error!("hw_timer: refresh timer create failed (rc={})", ret);
            return Err(crate::error::Error::Init("esp_timer_create"));
        }
        log::info!("hw_timer: refresh timer created");
        Ok(Self { generation: 0, handle })
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn new() -> crate::error::Result<Self> {
        log::info!("hw_timer(sim): refresh timer created");
        Ok(Self {
            generation: 0,
            armed: None,
            sim_fail_start: false,
        })
    }

    fn next_generation(&mut self) -> TimerHandle {
        self.generation = self.generation.wrapping_add(1) & GENERATION_MASK;
        if self.generation == 0 {
            self.generation = 1;
        }
        TimerHandle(self.generation)
    }

    /// The armed timer and its delay, if any.
    #[cfg(not(target_os = "espidf"))]
    pub fn armed(&self) -> Option<(TimerHandle, Duration)> {
        self.armed
    }

    /// Expire the armed timer now, as the esp_timer task would.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_fire(&mut self) -> Option<TimerHandle> {
        let (handle, _) = self.armed.take()?;
        push_event(Event::RefreshTimer(handle));
        Some(handle)
    }
}

impl TimerPort for HwTimer {
    fn arm(&mut self, after: Duration) -> Result<TimerHandle, RadioError> {
        let handle = self.next_generation();

        #[cfg(target_os = "espidf")]
        {
            ARMED_GENERATION.store(handle.0, Ordering::Release);
            let micros = u64::try_from(after.as_micros()).unwrap_or(u64::MAX);
            // SAFETY: `self.handle` was created in `new()` and never deleted.
            // Stopping an idle timer only returns ESP_ERR_INVALID_STATE.
            let ret = unsafe {
                esp_timer_stop(self.handle);
                esp_timer_start_once(self.handle, micros)
            };
            if ret != ESP_OK {
                ARMED_GENERATION.store(0, Ordering::Release);
                log::error!("hw_timer: start_once failed (rc={})", ret);
                return Err(RadioError::TimerUnavailable);
            }
        }
        #[cfg(not(target_os = "espidf"))]
        {
            if self.sim_fail_start {
                self.armed = None;
                log::error!("hw_timer(sim): start_once failed");
                return Err(RadioError::TimerUnavailable);
            }
            self.armed = Some((handle, after));
        }

        debug!("hw_timer: armed {:?} for {} ms", handle, after.as_millis());
        Ok(handle)
    }

    fn disarm(&mut self, handle: TimerHandle) {
        // Only the armed generation can be cancelled; anything else has
        // already fired or been superseded.
        #[cfg(target_os = "espidf")]
        {
            if ARMED_GENERATION
                .compare_exchange(handle.0, 0, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
            {
                return;
            }
            // SAFETY: see `arm`.
            unsafe {
                esp_timer_stop(self.handle);
            }
        }
        #[cfg(not(target_os = "espidf"))]
        {
            if self.armed.map(|(h, _)| h) != Some(handle) {
                return;
            }
            self.armed = None;
        }

        debug!("hw_timer: disarmed {:?}", handle);
    }
}

#[cfg(target_os = "espidf")]
impl Drop for HwTimer {
    fn drop(&mut self) {
        // SAFETY: the handle is valid and no longer used after this point.
        unsafe {
            esp_timer_stop(self.handle);
            esp_timer_delete(self.handle);
        }
    }
}
