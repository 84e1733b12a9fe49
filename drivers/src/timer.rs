/*++

Licensed under the Apache-2.0 license.

File Name:

    timer.rs

Abstract:

    File contains API for the monotonic secure timer.

--*/

use crate::bus::{read_ambiguous, Bus, RegAddr};
use crate::regmap::RegisterMap;
use crate::wait;
use fub_error::{FubError, FubResult};

/// Re-samples taken before accepting a sentinel-looking timer value.
const SENTINEL_RETRIES: u32 = 4;

/// Monotonic secure timer. The counter is hardware-owned and read-only;
/// delays derived from it cannot be stretched by an attacker-influenced
/// register.
pub struct SecureTimer {
    timer_ns: RegAddr,
}

impl SecureTimer {
    pub fn new(map: &'static dyn RegisterMap) -> Self {
        Self {
            timer_ns: map.layout().timer_ns,
        }
    }

    /// Current counter value in nanoseconds. The counter legitimately passes
    /// through the fault-sentinel range, so reads are re-sampled rather than
    /// rejected.
    pub fn now_ns(&self, bus: &mut impl Bus) -> FubResult<u32> {
        read_ambiguous(bus, self.timer_ns, SENTINEL_RETRIES)
    }

    /// Block until `us` microseconds have elapsed, polling at most
    /// `max_polls` times.
    pub fn delay_us(
        &self,
        bus: &mut impl Bus,
        us: u32,
        max_polls: u32,
        on_timeout: FubError,
    ) -> FubResult<()> {
        let start = self.now_ns(bus)?;
        let target = us.saturating_mul(1000);
        wait::until_bounded(max_polls, on_timeout, || {
            let now = self.now_ns(bus)?;
            // Wrapping subtraction keeps the comparison valid across counter
            // rollover.
            Ok(now.wrapping_sub(start) >= target)
        })
    }
}
