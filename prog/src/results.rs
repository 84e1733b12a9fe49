/*++

Licensed under the Apache-2.0 license.

File Name:

    results.rs

Abstract:

    File contains per-invocation accumulation of use-case outcomes.

--*/

use crate::use_case::{UseCaseId, UseCaseMask};
use fub_error::FubError;

/// What happened to each requested use case, accumulated across one
/// invocation. Owned by the flow and destroyed when it returns.
pub struct UseCaseResults {
    /// Use cases burnt and verified
    pub burnt: UseCaseMask,

    /// Requested but rejected by a device-identity predicate
    pub not_applicable: UseCaseMask,

    /// Requested but a cross-fuse prerequisite was not met
    pub prereq_unmet: UseCaseMask,

    /// Applicable but the burn was rejected
    pub burn_failed: UseCaseMask,

    /// Burnt but the post-resense readback was wrong
    pub verify_failed: UseCaseMask,

    /// First per-use-case error; a later cleanup error must not mask it
    pub first_error: Option<FubError>,
}

impl Default for UseCaseResults {
    fn default() -> Self {
        Self {
            burnt: UseCaseMask::empty(),
            not_applicable: UseCaseMask::empty(),
            prereq_unmet: UseCaseMask::empty(),
            burn_failed: UseCaseMask::empty(),
            verify_failed: UseCaseMask::empty(),
            first_error: None,
        }
    }
}

impl UseCaseResults {
    pub fn mark_not_applicable(&mut self, id: UseCaseId) {
        self.not_applicable |= id.mask_bit();
    }

    pub fn mark_prereq_unmet(&mut self, id: UseCaseId) {
        self.prereq_unmet |= id.mask_bit();
    }

    pub fn mark_burn_failed(&mut self, id: UseCaseId, err: FubError) {
        self.burn_failed |= id.mask_bit();
        self.record_error(err);
    }

    pub fn mark_verify_failed(&mut self, id: UseCaseId, err: FubError) {
        self.verify_failed |= id.mask_bit();
        self.record_error(err);
    }

    pub fn mark_burnt(&mut self, id: UseCaseId) {
        self.burnt |= id.mask_bit();
    }

    fn record_error(&mut self, err: FubError) {
        if self.first_error.is_none() {
            self.first_error = Some(err);
        }
    }

    /// Pack the rejection categories into the applicability mailbox word:
    /// not-applicable in bits [7:0], burn-failed in [15:8], verify-failed
    /// in [23:16], prerequisite-not-met in [31:24].
    pub fn applicability_word(&self) -> u32 {
        (self.not_applicable.bits() & 0xFF)
            | ((self.burn_failed.bits() & 0xFF) << 8)
            | ((self.verify_failed.bits() & 0xFF) << 16)
            | ((self.prereq_unmet.bits() & 0xFF) << 24)
    }
}
