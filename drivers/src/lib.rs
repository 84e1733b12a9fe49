/*++

Licensed under the Apache-2.0 license.

File Name:

    lib.rs

Abstract:

    File contains exports for the FUB driver library.

--*/

#![cfg_attr(not(feature = "std"), no_std)]

pub mod bus;
pub mod cfi;
mod fuse_ctrl;
mod fuse_log;
pub mod printer;
mod privilege;
pub mod regmap;
mod status;
mod timer;
mod vqps;
pub mod wait;

pub use bus::{is_fault_sentinel, read_ambiguous, read_checked, Bus, BusError, RegAddr};
pub use fub_error::{FubError, FubResult};
pub use fuse_ctrl::{BurnOutcome, FuseCtrl, FuseDescriptor, FuseStatus};
pub use fuse_log::{BurnLog, BurnLogEntry, BurnRecord, BURN_LOG_CAPACITY};
pub use privilege::{PrivLevelMask, PrivilegeGuard, PrivilegeSnapshot, GUARDED_PLM_COUNT};
pub use regmap::{chip_revision, for_chip_id, ChipFamily, RegLayout, RegisterMap, CHIP_ID};
pub use status::{ProgStage, StatusReporter};
pub use timer::SecureTimer;
pub use vqps::VoltageSequencer;
