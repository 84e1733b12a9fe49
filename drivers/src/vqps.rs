/*++

Licensed under the Apache-2.0 license.

File Name:

    vqps.rs

Abstract:

    File contains API for sequencing the VQPS fuse-programming rail.

--*/

use crate::bus::{read_checked, Bus, RegAddr};
use crate::regmap::RegisterMap;
use crate::timer::SecureTimer;
use fub_error::{FubError, FubResult};

/// VQPS switch enable bit in the control register.
const VQPS_ENABLE: u32 = 1 << 0;

/// Accepted analog monitor window. Burning outside it risks partial or
/// unreliable burns, so the check fails closed.
const DUTY_MIN: u32 = 0x20;
const DUTY_MAX: u32 = 0x60;
const PERIOD_MIN: u32 = 0x80;
const PERIOD_MAX: u32 = 0x140;

/// Sequences the auxiliary rail the fuse macro needs to program bits.
pub struct VoltageSequencer {
    vqps_ctrl: RegAddr,
    vqps_duty: RegAddr,
    vqps_period: RegAddr,
    ramp_us: u32,
}

impl VoltageSequencer {
    pub fn new(map: &'static dyn RegisterMap) -> Self {
        let layout = map.layout();
        Self {
            vqps_ctrl: layout.vqps_ctrl,
            vqps_duty: layout.vqps_duty,
            vqps_period: layout.vqps_period,
            ramp_us: map.vqps_ramp_us(),
        }
    }

    /// Energize the rail. No-op if already enabled; after an actual
    /// transition, blocks on the secure timer until the ramp time elapses.
    pub fn enable(
        &self,
        bus: &mut impl Bus,
        timer: &SecureTimer,
        max_ramp_polls: u32,
    ) -> FubResult<()> {
        self.switch(bus, timer, max_ramp_polls, true)
    }

    /// De-energize the rail. No-op if already disabled.
    pub fn disable(
        &self,
        bus: &mut impl Bus,
        timer: &SecureTimer,
        max_ramp_polls: u32,
    ) -> FubResult<()> {
        self.switch(bus, timer, max_ramp_polls, false)
    }

    fn switch(
        &self,
        bus: &mut impl Bus,
        timer: &SecureTimer,
        max_ramp_polls: u32,
        on: bool,
    ) -> FubResult<()> {
        let current = read_checked(bus, self.vqps_ctrl)?;
        let desired = if on {
            current | VQPS_ENABLE
        } else {
            current & !VQPS_ENABLE
        };
        if current == desired {
            return Ok(());
        }

        bus.write(self.vqps_ctrl, desired)?;
        if read_checked(bus, self.vqps_ctrl)? != desired {
            return Err(FubError::VQPS_SWITCH_READBACK);
        }

        timer.delay_us(bus, self.ramp_us, max_ramp_polls, FubError::VQPS_RAMP_TIMEOUT)
    }

    /// Reject an out-of-spec supply before any burn is attempted.
    pub fn check_rail(&self, bus: &mut impl Bus) -> FubResult<()> {
        let duty = read_checked(bus, self.vqps_duty)?;
        if !(DUTY_MIN..=DUTY_MAX).contains(&duty) {
            return Err(FubError::VQPS_DUTY_OUT_OF_BOUNDS);
        }

        let period = read_checked(bus, self.vqps_period)?;
        if !(PERIOD_MIN..=PERIOD_MAX).contains(&period) {
            return Err(FubError::VQPS_PERIOD_OUT_OF_BOUNDS);
        }

        Ok(())
    }
}
