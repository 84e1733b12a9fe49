/*++

Licensed under the Apache-2.0 license.

File Name:

    lib.rs

Abstract:

    File contains the error type shared by every FUB crate.

--*/
#![cfg_attr(not(feature = "std"), no_std)]
use core::convert::From;
use core::num::{NonZeroU32, TryFromIntError};

/// FUB Error Type
///
/// The upper 16 bits identify the component that raised the error, the
/// lower 16 bits the condition. Zero is reserved for "no error" in the
/// status mailbox, hence the `NonZeroU32` representation.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct FubError(pub NonZeroU32);

/// Macro to define error constants ensuring uniqueness
///
/// This macro takes a list of (name, value, doc) tuples and generates
/// constant definitions for each error code.
#[macro_export]
macro_rules! define_error_constants {
    ($(($name:ident, $value:expr, $doc:expr)),* $(,)?) => {
        $(
            #[doc = $doc]
            pub const $name: FubError = FubError::new_const($value);
        )*

        #[cfg(test)]
        /// Returns a vector of all defined error constants for testing uniqueness
        pub fn all_constants() -> Vec<(&'static str, u32)> {
            vec![
                $(
                    (stringify!($name), $value),
                )*
            ]
        }
    };
}

impl FubError {
    /// Create a FUB error; intended to only be used from const contexts, as we
    /// don't want runtime panics if val is zero. The preferred way to get a
    /// FubError from a u32 is `FubError::try_from()`.
    const fn new_const(val: u32) -> Self {
        match NonZeroU32::new(val) {
            Some(val) => Self(val),
            None => panic!("FubError cannot be 0"),
        }
    }

    // Use the macro to define all error constants
    define_error_constants![
        // Register bus transport
        (BUS_LOAD_ACCESS_FAULT, 0x0001_0001, "Register read faulted"),
        (BUS_STORE_ACCESS_FAULT, 0x0001_0002, "Register write faulted"),
        (
            BUS_FAULT_SENTINEL,
            0x0001_0003,
            "Read returned the priv-ring fault sentinel"
        ),
        // Privilege guard
        (
            PRIVILEGE_ALREADY_RAISED,
            0x0002_0001,
            "Raise requested while a snapshot is armed"
        ),
        (
            PRIVILEGE_NOT_RAISED,
            0x0002_0002,
            "Restore requested without an armed snapshot"
        ),
        // VQPS rail sequencing
        (
            VQPS_DUTY_OUT_OF_BOUNDS,
            0x0003_0001,
            "VQPS duty cycle outside the accepted window"
        ),
        (
            VQPS_PERIOD_OUT_OF_BOUNDS,
            0x0003_0002,
            "VQPS period outside the accepted window"
        ),
        (VQPS_RAMP_TIMEOUT, 0x0003_0003, "VQPS ramp wait exceeded bound"),
        (
            VQPS_SWITCH_READBACK,
            0x0003_0004,
            "VQPS switch read-back disagrees with the written value"
        ),
        // Fuse controller
        (FUSE_CTRL_INVALID_ROW, 0x0004_0001, "Burn row outside macro range"),
        (
            FUSE_CTRL_ZERO_BURN_VALUE,
            0x0004_0002,
            "Zero burn value reached the controller"
        ),
        (
            FUSE_CTRL_PROTECTION_NOT_RAISED,
            0x0004_0003,
            "Fuse-control PLM not restrictive at burn time"
        ),
        (
            FUSE_CTRL_IDLE_TIMEOUT,
            0x0004_0004,
            "Controller did not return to idle within bound"
        ),
        (
            FUSE_CTRL_SENSE_TIMEOUT,
            0x0004_0005,
            "Resense did not complete within bound"
        ),
        (FUSE_CTRL_LOG_FULL, 0x0004_0006, "Burn log is full"),
        // Use-case catalog
        (
            CATALOG_VERIFY_MISMATCH,
            0x0005_0001,
            "Post-burn readback missing intended bits"
        ),
        (
            CATALOG_IDENTITY_MISMATCH,
            0x0005_0002,
            "Redundant device-identity fields disagree"
        ),
        // Self-revocation
        (
            REVOCATION_LADDER_CORRUPT,
            0x0006_0001,
            "Version fuse is not a contiguous ladder"
        ),
        (
            REVOCATION_VERIFY_MISMATCH,
            0x0006_0002,
            "Version fuse readback does not equal the intended ladder"
        ),
        (
            REVOCATION_VERSION_TOO_LARGE,
            0x0006_0003,
            "Binary version exceeds the ladder width"
        ),
        // Top-level flow
        (FLOW_UNSUPPORTED_CHIP, 0x0007_0001, "Chip family not supported"),
        (
            FLOW_WRONG_EXECUTION_UNIT,
            0x0007_0002,
            "Running on an unexpected execution unit"
        ),
        (
            FLOW_BINARY_REVOKED,
            0x0007_0003,
            "Burnt version fuse is at or above this binary's version"
        ),
        (
            FLOW_BOOT_STAGE_NOT_RUN,
            0x0007_0004,
            "Boot-stage sentinel is zero"
        ),
        (
            FLOW_LOWPOWER_SEQUENCE_ACTIVE,
            0x0007_0005,
            "A low-power exit sequence owns the control lines"
        ),
        (
            FLOW_MUTEX_NOT_ACQUIRED,
            0x0007_0006,
            "Sequencer mutex read-back mismatch"
        ),
    ];
}

impl From<FubError> for u32 {
    fn from(val: FubError) -> Self {
        val.0.get()
    }
}

impl TryFrom<u32> for FubError {
    type Error = TryFromIntError;

    fn try_from(val: u32) -> Result<Self, Self::Error> {
        Ok(Self(NonZeroU32::try_from(val)?))
    }
}

pub type FubResult<T> = Result<T, FubError>;
