/*++

Licensed under the Apache-2.0 license.

File Name:

    status.rs

Abstract:

    File contains API for status reporting via the observability mailboxes.

--*/

use crate::bus::{Bus, RegAddr};
use crate::regmap::RegisterMap;

/// Stage codes reported to the status mailbox as the flow advances. The
/// final status code (zero or an error code) overwrites the last stage at
/// exit.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgStage {
    EntryChecksPassed = 1,
    Protected = 2,
    VoltageReady = 3,
    SelfRevoked = 4,
    ProcessingUseCases = 5,
    CleaningUp = 6,
    Done = 7,
}

/// Reports progress and results to the SoC-visible mailbox registers.
pub struct StatusReporter {
    status_mailbox: RegAddr,
    applicability_mailbox: RegAddr,
}

impl StatusReporter {
    pub fn new(map: &'static dyn RegisterMap) -> Self {
        let layout = map.layout();
        Self {
            status_mailbox: layout.status_mailbox,
            applicability_mailbox: layout.applicability_mailbox,
        }
    }

    /// Record the stage the flow has reached. Advisory; a mailbox fault must
    /// not alter the flow's outcome.
    pub fn report_stage(&self, bus: &mut impl Bus, stage: ProgStage) {
        let _ = bus.write(self.status_mailbox, stage as u32);
    }

    /// Record the final status: zero for success, the first error code
    /// encountered otherwise.
    pub fn report_status(&self, bus: &mut impl Bus, status: u32) {
        let _ = bus.write(self.status_mailbox, status);
    }

    /// Record which requested use cases were rejected and in which category.
    pub fn report_applicability(&self, bus: &mut impl Bus, mask: u32) {
        let _ = bus.write(self.applicability_mailbox, mask);
    }
}
