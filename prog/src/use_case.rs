/*++

Licensed under the Apache-2.0 license.

File Name:

    use_case.rs

Abstract:

    File contains the use-case catalog: which fuse each use case burns and
    whether it applies to the device the binary is running on.

--*/

use crate::results::UseCaseResults;
use fub_drivers::cfi::{cfi_assert_eq, cfi_launder};
use fub_drivers::{
    chip_revision, read_checked, Bus, ChipFamily, FubError, FubResult, FuseDescriptor,
    RegisterMap, StatusReporter,
};

bitflags::bitflags! {
    /// One bit per use case; the caller requests work with a mask of these.
    pub struct UseCaseMask: u32 {
        const AUX_DEBUG_ENABLE = 0b00_0001;
        const DEVID_LICENSE = 0b00_0010;
        const DEVID_LICENSE_REVOKE = 0b00_0100;
        const LICENSE_SCOPE_EXTEND = 0b00_1000;
        const WP_BYPASS = 0b01_0000;
        const FIELD_RETURN_UNLOCK = 0b10_0000;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UseCaseId {
    /// Enable the auxiliary debug bus
    AuxDebugEnable,

    /// Grant the device-id bound feature license
    DevidLicense,

    /// Permanently revoke the device-id bound license
    DevidLicenseRevoke,

    /// Widen the license scope; meaningless once revoked
    LicenseScopeExtend,

    /// Bypass the legacy write-protection mitigation
    WpBypass,

    /// Unlock a field-returned part for failure analysis
    FieldReturnUnlock,
}

impl UseCaseId {
    /// Fixed, deterministic evaluation order. Grants are evaluated before
    /// the revocations that depend on them.
    pub const EVALUATION_ORDER: [UseCaseId; 6] = [
        UseCaseId::AuxDebugEnable,
        UseCaseId::DevidLicense,
        UseCaseId::DevidLicenseRevoke,
        UseCaseId::LicenseScopeExtend,
        UseCaseId::WpBypass,
        UseCaseId::FieldReturnUnlock,
    ];

    pub fn mask_bit(self) -> UseCaseMask {
        match self {
            UseCaseId::AuxDebugEnable => UseCaseMask::AUX_DEBUG_ENABLE,
            UseCaseId::DevidLicense => UseCaseMask::DEVID_LICENSE,
            UseCaseId::DevidLicenseRevoke => UseCaseMask::DEVID_LICENSE_REVOKE,
            UseCaseId::LicenseScopeExtend => UseCaseMask::LICENSE_SCOPE_EXTEND,
            UseCaseId::WpBypass => UseCaseMask::WP_BYPASS,
            UseCaseId::FieldReturnUnlock => UseCaseMask::FIELD_RETURN_UNLOCK,
        }
    }
}

/// A device allowed to burn a given use case.
struct DeviceAllowEntry {
    family: ChipFamily,
    devid: u32,
}

/// Cross-fuse dependency. Ordering is a security property: a grant must
/// exist before its revocation, and a widening must be rejected once the
/// revocation exists.
enum Prereq {
    /// The other use case's bits must already be burnt
    Burnt(UseCaseId),

    /// None of the other use case's bits may be burnt yet
    NotBurnt(UseCaseId),
}

struct UseCaseSpec {
    /// Logical fuse row holding this use case's bits
    row: u32,

    /// Bits within the row owned by this use case
    bits: u32,

    /// Devices allowed to burn it; empty means any device
    allow_list: &'static [DeviceAllowEntry],

    /// Minimum chip revision, if revision-gated
    min_revision: Option<u32>,

    prereq: Option<Prereq>,
}

const AUX_DEBUG_ALLOW: &[DeviceAllowEntry] = &[
    DeviceAllowEntry {
        family: ChipFamily::Gen1,
        devid: 0x0000_1E07,
    },
    DeviceAllowEntry {
        family: ChipFamily::Gen2,
        devid: 0x0000_2204,
    },
];

const LICENSE_ALLOW: &[DeviceAllowEntry] = &[
    DeviceAllowEntry {
        family: ChipFamily::Gen1,
        devid: 0x0000_1E07,
    },
    DeviceAllowEntry {
        family: ChipFamily::Gen1,
        devid: 0x0000_1E84,
    },
    DeviceAllowEntry {
        family: ChipFamily::Gen2,
        devid: 0x0000_2204,
    },
];

const WP_BYPASS_ALLOW: &[DeviceAllowEntry] = &[DeviceAllowEntry {
    family: ChipFamily::Gen1,
    devid: 0x0000_1E07,
}];

/// Logical rows 1..=3; row 0 belongs to the binary-version ladder.
const ROW_DEBUG_CTRL: u32 = 1;
const ROW_LICENSE: u32 = 2;
const ROW_FIELD_RETURN: u32 = 3;

static AUX_DEBUG_ENABLE_SPEC: UseCaseSpec = UseCaseSpec {
    row: ROW_DEBUG_CTRL,
    bits: 0x1,
    allow_list: AUX_DEBUG_ALLOW,
    min_revision: None,
    prereq: None,
};

static DEVID_LICENSE_SPEC: UseCaseSpec = UseCaseSpec {
    row: ROW_LICENSE,
    bits: 0x1,
    allow_list: LICENSE_ALLOW,
    min_revision: None,
    prereq: None,
};

static DEVID_LICENSE_REVOKE_SPEC: UseCaseSpec = UseCaseSpec {
    row: ROW_LICENSE,
    bits: 0x2,
    allow_list: LICENSE_ALLOW,
    min_revision: None,
    prereq: Some(Prereq::Burnt(UseCaseId::DevidLicense)),
};

static LICENSE_SCOPE_EXTEND_SPEC: UseCaseSpec = UseCaseSpec {
    row: ROW_LICENSE,
    bits: 0x8,
    allow_list: LICENSE_ALLOW,
    min_revision: None,
    prereq: Some(Prereq::NotBurnt(UseCaseId::DevidLicenseRevoke)),
};

static WP_BYPASS_SPEC: UseCaseSpec = UseCaseSpec {
    row: ROW_DEBUG_CTRL,
    bits: 0x4,
    allow_list: WP_BYPASS_ALLOW,
    min_revision: None,
    prereq: None,
};

static FIELD_RETURN_UNLOCK_SPEC: UseCaseSpec = UseCaseSpec {
    row: ROW_FIELD_RETURN,
    bits: 0x1,
    allow_list: &[],
    min_revision: Some(0xB0),
    prereq: None,
};

impl UseCaseId {
    fn spec(self) -> &'static UseCaseSpec {
        match self {
            UseCaseId::AuxDebugEnable => &AUX_DEBUG_ENABLE_SPEC,
            UseCaseId::DevidLicense => &DEVID_LICENSE_SPEC,
            UseCaseId::DevidLicenseRevoke => &DEVID_LICENSE_REVOKE_SPEC,
            UseCaseId::LicenseScopeExtend => &LICENSE_SCOPE_EXTEND_SPEC,
            UseCaseId::WpBypass => &WP_BYPASS_SPEC,
            UseCaseId::FieldReturnUnlock => &FIELD_RETURN_UNLOCK_SPEC,
        }
    }
}

/// Maps use cases to fuse descriptors and decides applicability on the
/// running device.
pub struct UseCaseCatalog {
    map: &'static dyn RegisterMap,
    chip_id: u32,
}

impl UseCaseCatalog {
    pub fn new(map: &'static dyn RegisterMap, chip_id: u32) -> Self {
        Self { map, chip_id }
    }

    /// Decide whether `id` should be burnt on this device.
    ///
    /// An id absent from `request` is false with no further checks and no
    /// advisory report. A failing predicate marks the id in `results` —
    /// identity failures as not-applicable, dependency failures as
    /// prerequisite-not-met — and pushes the advisory mask to the mailbox
    /// before returning, so the caller can tell "nothing requested" from
    /// "requested but rejected", and why.
    pub fn is_applicable(
        &self,
        bus: &mut impl Bus,
        id: UseCaseId,
        request: UseCaseMask,
        results: &mut UseCaseResults,
        reporter: &StatusReporter,
    ) -> FubResult<bool> {
        if !request.contains(id.mask_bit()) {
            return Ok(false);
        }

        let spec = id.spec();

        if !self.device_allowed(bus, spec)? {
            results.mark_not_applicable(id);
            reporter.report_applicability(bus, results.applicability_word());
            return Ok(false);
        }

        if let Some(prereq) = &spec.prereq {
            if !self.prereq_met(bus, prereq)? {
                results.mark_prereq_unmet(id);
                reporter.report_applicability(bus, results.applicability_word());
                return Ok(false);
            }
        }

        Ok(true)
    }

    fn device_allowed(&self, bus: &mut impl Bus, spec: &UseCaseSpec) -> FubResult<bool> {
        if let Some(min_revision) = spec.min_revision {
            if chip_revision(self.chip_id) < min_revision {
                return Ok(false);
            }
        }

        if spec.allow_list.is_empty() {
            return Ok(true);
        }

        let layout = self.map.layout();
        let devid = read_checked(bus, layout.devid_a)?;
        let devid_redundant = read_checked(bus, layout.devid_b)?;

        // Disagreeing identity fields mean one was tampered with or
        // mis-strapped; fail the invocation rather than guess which.
        if devid != devid_redundant {
            return Err(FubError::CATALOG_IDENTITY_MISMATCH);
        }
        cfi_assert_eq(cfi_launder(devid), devid_redundant);

        Ok(spec
            .allow_list
            .iter()
            .any(|entry| entry.family == self.map.family() && entry.devid == devid))
    }

    fn prereq_met(&self, bus: &mut impl Bus, prereq: &Prereq) -> FubResult<bool> {
        match prereq {
            Prereq::Burnt(other) => {
                let spec = other.spec();
                let live = read_checked(bus, self.map.opt_row_addr(spec.row))?;
                Ok((live & spec.bits) == spec.bits)
            }
            Prereq::NotBurnt(other) => {
                let spec = other.spec();
                let live = read_checked(bus, self.map.opt_row_addr(spec.row))?;
                Ok((live & spec.bits) == 0)
            }
        }
    }

    /// Build the fuse descriptor for `id` from the current live row value.
    /// Pure lookup and computation; safe to call repeatedly.
    pub fn describe_fuse(&self, bus: &mut impl Bus, id: UseCaseId) -> FubResult<FuseDescriptor> {
        let spec = id.spec();
        let opt_addr = self.map.opt_row_addr(spec.row);
        let live = read_checked(bus, opt_addr)?;
        let (pri_row, red_row) = self.map.alias_rows(spec.row);

        Ok(FuseDescriptor {
            opt_addr,
            pri_row,
            red_row,
            intended: spec.bits,
            burnt: live & spec.bits,
        })
    }

    /// Re-read the row after resense and confirm every intended bit is set.
    /// The comparison is masked to exactly this use case's bits; unrelated
    /// bits sharing the row never influence the result.
    pub fn verify(
        &self,
        bus: &mut impl Bus,
        _id: UseCaseId,
        descriptor: &FuseDescriptor,
    ) -> FubResult<()> {
        let live = read_checked(bus, descriptor.opt_addr)?;
        if (live & descriptor.intended) != descriptor.intended {
            return Err(FubError::CATALOG_VERIFY_MISMATCH);
        }

        // Second read; a glitched verify pass must not stand.
        let live2 = read_checked(bus, descriptor.opt_addr)?;
        cfi_assert_eq(cfi_launder(live & descriptor.intended), live2 & descriptor.intended);
        Ok(())
    }
}
