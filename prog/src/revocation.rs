/*++

Licensed under the Apache-2.0 license.

File Name:

    revocation.rs

Abstract:

    File contains the self-revocation flow: burning the binary-version
    ladder so this build runs at most once per device.

--*/

use fub_drivers::cfi::{cfi_assert_eq, cfi_launder};
use fub_drivers::{
    read_checked, BurnLog, Bus, FubError, FubResult, FuseCtrl, FuseDescriptor, RegisterMap,
};

/// Version compiled into this build. Raising it revokes every earlier build
/// on any device this binary runs on.
pub const FUB_BINARY_VERSION: u32 = 3;

/// Logical fuse row holding the version ladder.
pub const VERSION_LADDER_ROW: u32 = 0;

/// Ladder width in bits; versions above this cannot be expressed.
pub const VERSION_LADDER_WIDTH: u32 = 16;

/// Burn-log tag for ladder burns (use-case burns are tagged with their
/// mask bit, which never reaches the high byte).
pub const VERSION_LADDER_TAG: u32 = 0x8000_0000;

/// Ladder encoding of a version: bit N set means "version >= N+1".
pub fn ladder_mask(version: u32) -> u32 {
    if version == 0 {
        0
    } else {
        (1u32 << version) - 1
    }
}

/// Decode a live ladder value. The value must be contiguous from bit 0 and
/// confined to the ladder field; anything else means the fuse was partially
/// or maliciously burnt.
pub fn burnt_version(live: u32) -> FubResult<u32> {
    let field_mask = ladder_mask(VERSION_LADDER_WIDTH);
    if live & !field_mask != 0 {
        return Err(FubError::REVOCATION_LADDER_CORRUPT);
    }
    // A contiguous-from-bit-0 value has no set bit above a cleared one.
    if live & (live + 1) != 0 {
        return Err(FubError::REVOCATION_LADDER_CORRUPT);
    }
    Ok(live.count_ones())
}

/// Burns the version ladder up to this binary's version before anything
/// else security-relevant happens. Re-invoking the same build afterwards is
/// refused by the boot-stage version check.
pub struct SelfRevocationGuard {
    version: u32,
}

impl SelfRevocationGuard {
    pub fn new(version: u32) -> Self {
        Self { version }
    }

    pub fn run(
        &self,
        bus: &mut impl Bus,
        map: &'static dyn RegisterMap,
        fuse_ctrl: &FuseCtrl,
        log: &mut BurnLog,
    ) -> FubResult<()> {
        if self.version > VERSION_LADDER_WIDTH {
            return Err(FubError::REVOCATION_VERSION_TOO_LARGE);
        }

        let opt_addr = map.opt_row_addr(VERSION_LADDER_ROW);
        let live = read_checked(bus, opt_addr)?;
        burnt_version(live)?;

        let intended = ladder_mask(self.version);
        let (pri_row, red_row) = map.alias_rows(VERSION_LADDER_ROW);
        let mut descriptor = FuseDescriptor {
            opt_addr,
            pri_row,
            red_row,
            intended,
            burnt: live & intended,
        };

        fuse_ctrl.burn(bus, &mut descriptor, VERSION_LADDER_TAG, log)?;
        fuse_ctrl.resense(bus)?;

        let sensed = read_checked(bus, opt_addr)? & ladder_mask(VERSION_LADDER_WIDTH);
        if sensed != intended {
            return Err(FubError::REVOCATION_VERIFY_MISMATCH);
        }

        // The ladder gates re-execution of this binary; a glitched verify
        // would defeat it.
        let sensed2 = read_checked(bus, opt_addr)? & ladder_mask(VERSION_LADDER_WIDTH);
        cfi_assert_eq(cfi_launder(sensed), sensed2);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ladder_mask() {
        assert_eq!(ladder_mask(0), 0);
        assert_eq!(ladder_mask(1), 0b1);
        assert_eq!(ladder_mask(3), 0b111);
        assert_eq!(ladder_mask(16), 0xFFFF);
    }

    #[test]
    fn test_burnt_version_decodes_contiguous_values() {
        assert_eq!(burnt_version(0), Ok(0));
        assert_eq!(burnt_version(0b1), Ok(1));
        assert_eq!(burnt_version(0b111), Ok(3));
        assert_eq!(burnt_version(0xFFFF), Ok(16));
    }

    #[test]
    fn test_burnt_version_rejects_gaps_and_overflow() {
        assert_eq!(
            burnt_version(0b101),
            Err(FubError::REVOCATION_LADDER_CORRUPT)
        );
        assert_eq!(
            burnt_version(0b110),
            Err(FubError::REVOCATION_LADDER_CORRUPT)
        );
        assert_eq!(
            burnt_version(0x1_0000),
            Err(FubError::REVOCATION_LADDER_CORRUPT)
        );
    }
}
