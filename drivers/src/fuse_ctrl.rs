/*++

Licensed under the Apache-2.0 license.

File Name:

    fuse_ctrl.rs

Abstract:

    File contains API for burning and resensing hardware fuse rows.

--*/

use crate::bus::{read_checked, Bus, RegAddr};
use crate::cfi::{cfi_assert_eq, cfi_launder};
use crate::fuse_log::{BurnLog, BurnLogEntry, BurnRecord};
use crate::privilege::PrivLevelMask;
use crate::regmap::RegisterMap;
use crate::wait;
use bitfield::bitfield;
use fub_error::{FubError, FubResult};

bitfield! {
    /// Fuse controller status register.
    #[derive(Debug, Default, PartialEq, Eq, Clone, Copy)]
    pub struct FuseStatus(u32);

    /// Controller state field; `STATE_IDLE` when no operation is in flight
    pub u8, state, _: 2, 0;

    /// Set once a sense operation has copied the macro into the live registers
    pub sense_done, _: 8;
}

impl FuseStatus {
    pub const STATE_IDLE: u8 = 0;

    pub fn from_raw(val: u32) -> Self {
        Self(val)
    }

    pub fn idle(&self) -> bool {
        self.state() == Self::STATE_IDLE
    }
}

bitfield! {
    /// Fuse controller command register.
    #[derive(Debug, Default, PartialEq, Eq, Clone, Copy)]
    pub struct FuseCmd(u32);

    /// Burn the staged row/data
    pub write_trig, set_write_trig: 0;

    /// Copy the macro into the live option registers
    pub sense_trig, set_sense_trig: 1;
}

impl FuseCmd {
    pub fn raw(&self) -> u32 {
        self.0
    }
}

/// Result of a burn request that did not error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BurnOutcome {
    /// Write succeeded on both aliases
    Burnt,

    /// Every intended bit was already set; nothing was written
    Skipped,
}

/// One logical fuse row: where to read it back, the alias rows that program
/// it, and the bits this caller intends to end up set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FuseDescriptor {
    /// Live (sensed) register address for readback
    pub opt_addr: RegAddr,

    /// Primary alias row
    pub pri_row: u32,

    /// Redundant alias row
    pub red_row: u32,

    /// Bit pattern that must be set when this descriptor is satisfied
    pub intended: u32,

    /// Bits of `intended` already set in the macro
    pub burnt: u32,
}

impl FuseDescriptor {
    /// Only bits not already set are ever written. Zero means the descriptor
    /// is already satisfied and burning must be skipped.
    pub fn adjusted_burn_value(&self) -> u32 {
        self.intended & !self.burnt
    }
}

/// The primitive that burns one hardware fuse row and blocks until the
/// controller reports completion.
pub struct FuseCtrl {
    fuse_addr: RegAddr,
    fuse_wdata: RegAddr,
    fuse_cmd: RegAddr,
    fuse_status: RegAddr,
    fuse_ctrl_plm: RegAddr,
    row_limit: u32,
    max_idle_polls: u32,
    max_sense_polls: u32,
}

impl FuseCtrl {
    pub fn new(map: &'static dyn RegisterMap, max_idle_polls: u32, max_sense_polls: u32) -> Self {
        let layout = map.layout();
        Self {
            fuse_addr: layout.fuse_addr,
            fuse_wdata: layout.fuse_wdata,
            fuse_cmd: layout.fuse_cmd,
            fuse_status: layout.fuse_status,
            fuse_ctrl_plm: layout.fuse_ctrl_plm,
            row_limit: map.alias_row_limit(),
            max_idle_polls,
            max_sense_polls,
        }
    }

    /// Burn `descriptor`, primary alias then redundant alias.
    ///
    /// Skips (success, no writes) when the adjusted burn value is zero — the
    /// macro rejects zero-valued writes, and an already-satisfied row is
    /// nothing to do, not a failure. On success the descriptor's burnt mask
    /// absorbs the written bits, so a repeated call skips instead of issuing
    /// a second hardware write. The fuse-control PLM is re-checked here
    /// rather than trusting the earlier raise.
    pub fn burn(
        &self,
        bus: &mut impl Bus,
        descriptor: &mut FuseDescriptor,
        tag: u32,
        log: &mut BurnLog,
    ) -> FubResult<BurnOutcome> {
        let value = descriptor.adjusted_burn_value();
        if value == 0 {
            log.append(BurnLogEntry::new(tag, descriptor.pri_row, 0, BurnRecord::Skipped))?;
            return Ok(BurnOutcome::Skipped);
        }

        self.burn_row(bus, descriptor.pri_row, value)?;
        self.burn_row(bus, descriptor.red_row, value)?;
        descriptor.burnt |= value;

        log.append(BurnLogEntry::new(
            tag,
            descriptor.pri_row,
            value,
            BurnRecord::Burnt,
        ))?;
        Ok(BurnOutcome::Burnt)
    }

    /// Confirm the fuse-control register is writable only from the highest
    /// privilege level. A pass here with a lowered PLM means a prior step's
    /// invariant was violated.
    fn check_protection(&self, bus: &mut impl Bus) -> FubResult<()> {
        let plm = PrivLevelMask::from_raw(read_checked(bus, self.fuse_ctrl_plm)?);
        if !plm.write_locked() {
            return Err(FubError::FUSE_CTRL_PROTECTION_NOT_RAISED);
        }

        // Re-read and compare; a glitched first read must not skip the check.
        let plm2 = PrivLevelMask::from_raw(read_checked(bus, self.fuse_ctrl_plm)?);
        cfi_assert_eq(cfi_launder(plm.raw()), plm2.raw());
        Ok(())
    }

    fn burn_row(&self, bus: &mut impl Bus, row: u32, value: u32) -> FubResult<()> {
        if row >= self.row_limit {
            return Err(FubError::FUSE_CTRL_INVALID_ROW);
        }
        if value == 0 {
            return Err(FubError::FUSE_CTRL_ZERO_BURN_VALUE);
        }

        self.check_protection(bus)?;
        self.wait_idle(bus)?;

        bus.write(self.fuse_addr, row)?;
        bus.write(self.fuse_wdata, value)?;

        let mut cmd = FuseCmd::default();
        cmd.set_write_trig(true);
        bus.write(self.fuse_cmd, cmd.raw())?;

        self.wait_idle(bus)
    }

    /// Copy burnt macro bits into the live option registers. Burnt bits are
    /// not visible to readback until this completes.
    pub fn resense(&self, bus: &mut impl Bus) -> FubResult<()> {
        self.wait_idle(bus)?;

        let mut cmd = FuseCmd::default();
        cmd.set_sense_trig(true);
        bus.write(self.fuse_cmd, cmd.raw())?;

        wait::until_bounded(self.max_sense_polls, FubError::FUSE_CTRL_SENSE_TIMEOUT, || {
            let status = FuseStatus::from_raw(read_checked(bus, self.fuse_status)?);
            Ok(status.idle() && status.sense_done())
        })
    }

    /// Zero the row-address and write-data staging registers. These stay
    /// writable from lower privilege even while the fuse-control register is
    /// protected, so stale values must never outlive the invocation.
    pub fn clear_staging(&self, bus: &mut impl Bus) -> FubResult<()> {
        bus.write(self.fuse_addr, 0)?;
        bus.write(self.fuse_wdata, 0)?;
        Ok(())
    }

    fn wait_idle(&self, bus: &mut impl Bus) -> FubResult<()> {
        wait::until_bounded(self.max_idle_polls, FubError::FUSE_CTRL_IDLE_TIMEOUT, || {
            Ok(FuseStatus::from_raw(read_checked(bus, self.fuse_status)?).idle())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adjusted_burn_value() {
        let descriptor = FuseDescriptor {
            opt_addr: 0x0002_1404,
            pri_row: 2,
            red_row: 3,
            intended: 0b1011,
            burnt: 0b0010,
        };
        assert_eq!(descriptor.adjusted_burn_value(), 0b1001);

        let satisfied = FuseDescriptor {
            burnt: 0b1011,
            ..descriptor
        };
        assert_eq!(satisfied.adjusted_burn_value(), 0);
    }

    #[test]
    fn test_status_fields() {
        assert!(FuseStatus::from_raw(0).idle());
        assert!(!FuseStatus::from_raw(0x2).idle());
        assert!(FuseStatus::from_raw(0x100).sense_done());
    }
}
