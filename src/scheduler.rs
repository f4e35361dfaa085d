//! Refresh scheduler.
//!
//! Drives the broadcast: one refresh cycle re-samples the sensors, renders
//! both records and resubmits them to the radio.  A one-shot timer is
//! re-armed at half the configured period after every cycle, so a period
//! change takes effect within one refresh.  The controller only latches the
//! advertising interval when advertising starts, so a tick that changes it
//! restarts advertising.
//!
//! ```text
//!            start()                     on_timer(h)
//!   ┌──────┐ ───────▶ ┌──────────────┐ ──────────────┐
//!   │ Idle │          │ Broadcasting │               │ refresh + re-arm
//!   └──────┘ ◀─────── └──────────────┘ ◀─────────────┘
//!            stop()
//! ```
//!
//! A period of zero is not special-cased here; the service stops the
//! scheduler instead of ticking it.

use core::time::Duration;

use log::{debug, info, warn};

use crate::app::ports::{AdTarget, RadioPort, SensorPort, TimerHandle, TimerPort};
use crate::beacon::chunker;
use crate::beacon::encoder::{self, DynamicFields};
use crate::beacon::ConfigStore;
use crate::config::PlatformConfig;
use crate::error::RadioError;

/// Broadcast state.  `Broadcasting` always owns exactly one armed timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BroadcastState {
    Idle,
    Broadcasting { timer: TimerHandle, interval: Duration },
}

pub struct RefreshScheduler {
    state: BroadcastState,
    platform: PlatformConfig,
    /// Advertising interval last handed to the radio.
    adv_interval: Option<Duration>,
}

impl RefreshScheduler {
    pub fn new(platform: PlatformConfig) -> Self {
        Self {
            state: BroadcastState::Idle,
            platform,
            adv_interval: None,
        }
    }

    pub fn state(&self) -> BroadcastState {
        self.state
    }

    pub fn is_broadcasting(&self) -> bool {
        matches!(self.state, BroadcastState::Broadcasting { .. })
    }

    /// Whether `handle` is the timer this scheduler is waiting on.
    pub fn is_armed(&self, handle: TimerHandle) -> bool {
        matches!(self.state, BroadcastState::Broadcasting { timer, .. } if timer == handle)
    }

    /// Interval of the currently armed timer.
    pub fn armed_interval(&self) -> Option<Duration> {
        match self.state {
            BroadcastState::Broadcasting { interval, .. } => Some(interval),
            BroadcastState::Idle => None,
        }
    }

    /// Enter broadcaster mode, publish one refresh and arm the timer.
    /// Restarts from scratch when already broadcasting.
    ///
    /// Only fatal errors are returned, with advertising stopped; radio
    /// refusals are logged and the broadcast carries on.
    pub fn start(
        &mut self,
        store: &mut ConfigStore,
        hw: &mut (impl RadioPort + TimerPort + SensorPort),
    ) -> Result<(), RadioError> {
        self.stop(hw);
        tolerate(hw.set_broadcaster_role(), "set broadcaster role")?;
        tolerate(self.refresh(store, hw), "refresh")?;
        tolerate(hw.start_advertising(), "start advertising")?;
        self.arm(store.period(), hw)?;
        info!("Scheduler: broadcasting, period {} ms", store.period());
        Ok(())
    }

    /// Handle expiry of `handle`.  Returns `false` for a handle that is not
    /// the armed one (cancelled or superseded); nothing happens then.
    pub fn on_timer(
        &mut self,
        handle: TimerHandle,
        store: &mut ConfigStore,
        hw: &mut (impl RadioPort + TimerPort + SensorPort),
    ) -> Result<bool, RadioError> {
        match self.state {
            BroadcastState::Broadcasting { timer, .. } if timer == handle => {}
            _ => {
                debug!("Scheduler: ignoring stale timer {:?}", handle);
                return Ok(false);
            }
        }
        // The one-shot has fired; nothing left to disarm.
        self.state = BroadcastState::Idle;
        let before = self.adv_interval;
        if let Err(e) = tolerate(self.refresh(store, hw), "refresh") {
            hw.stop_advertising();
            return Err(e);
        }
        if self.adv_interval != before {
            debug!("Scheduler: interval changed, restarting advertising");
            hw.stop_advertising();
            tolerate(hw.start_advertising(), "restart advertising")?;
        }
        self.arm(store.period(), hw)?;
        Ok(true)
    }

    /// Stop advertising and cancel the timer.  Idempotent.
    pub fn stop(&mut self, hw: &mut (impl RadioPort + TimerPort)) {
        if let BroadcastState::Broadcasting { timer, .. } = self.state {
            hw.disarm(timer);
            hw.stop_advertising();
            info!("Scheduler: stopped");
        }
        self.state = BroadcastState::Idle;
    }

    /// One refresh cycle: clear both stores, set the interval, submit the
    /// name record to the scan response and the data record to the
    /// advertising data.
    pub fn refresh(
        &mut self,
        store: &mut ConfigStore,
        hw: &mut (impl RadioPort + SensorPort),
    ) -> Result<(), RadioError> {
        hw.clear(AdTarget::Advertise)?;
        hw.clear(AdTarget::ScanResponse)?;
        let interval_ms = self.platform.clamp_adv_interval(store.period());
        let interval = Duration::from_millis(u64::from(interval_ms));
        hw.set_interval(interval)?;
        self.adv_interval = Some(interval);

        let budget = self.platform.fragment_budget;
        let name = encoder::encode_name(&store.record().name)?;
        chunker::submit(hw, AdTarget::ScanResponse, &name, budget)?;

        let fields = DynamicFields {
            battery_percent: hw.battery_percent(),
            temperature: hw.temperature(),
            packet_counter: store.next_packet_counter(),
        };
        let data = encoder::encode_data(&store.record().uri, fields)?;
        chunker::submit(hw, AdTarget::Advertise, &data, budget)?;
        debug!(
            "Scheduler: refresh #{} (batt {}%, temp {:#06x})",
            fields.packet_counter, fields.battery_percent, fields.temperature
        );
        Ok(())
    }

    /// Arm the next refresh.  A timer that cannot be started leaves the
    /// scheduler idle with advertising stopped.
    fn arm(
        &mut self,
        period_ms: u16,
        hw: &mut (impl RadioPort + TimerPort),
    ) -> Result<(), RadioError> {
        debug_assert!(
            !self.is_broadcasting(),
            "refresh timer armed twice without disarm"
        );
        let interval = Duration::from_millis(u64::from(period_ms / 2));
        match hw.arm(interval) {
            Ok(timer) => {
                self.state = BroadcastState::Broadcasting { timer, interval };
                Ok(())
            }
            Err(e) => {
                hw.stop_advertising();
                Err(e)
            }
        }
    }
}

/// Pass fatal errors through, log the rest.
fn tolerate(result: Result<(), RadioError>, what: &str) -> Result<(), RadioError> {
    match result {
        Err(e) if e.is_fatal() => Err(e),
        Err(e) => {
            warn!("Scheduler: {} failed: {}", what, e);
            Ok(())
        }
        Ok(()) => Ok(()),
    }
}
