/*++

Licensed under the Apache-2.0 license.

File Name:

    privilege.rs

Abstract:

    File contains API for raising and restoring register write protection.

--*/

use crate::bus::{read_checked, Bus, RegAddr};
use crate::regmap::RegisterMap;
use bitfield::bitfield;
use fub_error::{FubError, FubResult};
use zeroize::{Zeroize, ZeroizeOnDrop};

bitfield! {
    /// Privilege level mask. Set bits grant the corresponding lower
    /// privilege level access; the highest level retains access implicitly.
    #[derive(Debug, Default, PartialEq, Eq, Clone, Copy)]
    pub struct PrivLevelMask(u32);

    /// Level-0 read access
    pub read_l0, set_read_l0: 0;

    /// Level-1 read access
    pub read_l1, set_read_l1: 1;

    /// Level-2 read access
    pub read_l2, set_read_l2: 2;

    /// Level-0 write access
    pub write_l0, set_write_l0: 4;

    /// Level-1 write access
    pub write_l1, set_write_l1: 5;

    /// Level-2 write access
    pub write_l2, set_write_l2: 6;
}

impl PrivLevelMask {
    /// Most restrictive setting: no lower privilege level may read or write.
    pub fn locked() -> Self {
        Self(0)
    }

    pub fn from_raw(val: u32) -> Self {
        Self(val)
    }

    pub fn raw(&self) -> u32 {
        self.0
    }

    /// True when no lower privilege level can write the guarded register.
    pub fn write_locked(&self) -> bool {
        !self.write_l0() && !self.write_l1() && !self.write_l2()
    }
}

/// Number of access-control registers the guard manages.
pub const GUARDED_PLM_COUNT: usize = 4;

/// Prior values of every access-control register the guard modifies,
/// captured once at raise time. Scrubbed when dropped.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct PrivilegeSnapshot {
    values: [u32; GUARDED_PLM_COUNT],
}

/// Raises a fixed set of access-control registers to their most restrictive
/// level and restores their exact prior values on exit. `armed` tracks an
/// outstanding raise so a nested raise cannot mask a stale snapshot.
pub struct PrivilegeGuard {
    plm_regs: [RegAddr; GUARDED_PLM_COUNT],
    armed: bool,
}

impl PrivilegeGuard {
    pub fn new(map: &'static dyn RegisterMap) -> Self {
        let layout = map.layout();
        Self {
            plm_regs: [
                layout.reset_trigger_plm,
                layout.timer_plm,
                layout.fuse_ctrl_plm,
                layout.vqps_plm,
            ],
            armed: false,
        }
    }

    /// Capture the current protection level of each guarded register, then
    /// set each to its most restrictive setting. Fails if already armed.
    pub fn raise(&mut self, bus: &mut impl Bus) -> FubResult<PrivilegeSnapshot> {
        if self.armed {
            return Err(FubError::PRIVILEGE_ALREADY_RAISED);
        }

        let mut snapshot = PrivilegeSnapshot {
            values: [0; GUARDED_PLM_COUNT],
        };
        for (i, &reg) in self.plm_regs.iter().enumerate() {
            snapshot.values[i] = read_checked(bus, reg)?;
        }
        for &reg in self.plm_regs.iter() {
            bus.write(reg, PrivLevelMask::locked().raw())?;
        }

        self.armed = true;
        Ok(snapshot)
    }

    /// Write back every captured value and disarm. Fails if not armed.
    /// Registers are independent; order does not matter.
    pub fn restore(&mut self, bus: &mut impl Bus, snapshot: PrivilegeSnapshot) -> FubResult<()> {
        if !self.armed {
            return Err(FubError::PRIVILEGE_NOT_RAISED);
        }

        let mut result = Ok(());
        for (i, &reg) in self.plm_regs.iter().enumerate() {
            // Keep restoring the remaining registers even if one write
            // faults; report the first fault.
            if let Err(err) = bus.write(reg, snapshot.values[i]) {
                if result.is_ok() {
                    result = Err(err.into());
                }
            }
        }

        self.armed = false;
        result
    }

    pub fn armed(&self) -> bool {
        self.armed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locked_mask() {
        let locked = PrivLevelMask::locked();
        assert!(locked.write_locked());

        let mut open = PrivLevelMask::default();
        open.set_write_l0(true);
        assert!(!open.write_locked());

        let mut read_only = PrivLevelMask::default();
        read_only.set_read_l0(true);
        read_only.set_read_l2(true);
        assert!(read_only.write_locked());
    }
}
