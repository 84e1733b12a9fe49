/*++

Licensed under the Apache-2.0 license.

File Name:

    flow.rs

Abstract:

    File contains the top-level fuse-programming flow. Once privilege is
    raised the only way out is through the cleanup sequence.

--*/

use crate::results::UseCaseResults;
use crate::revocation::{burnt_version, SelfRevocationGuard, FUB_BINARY_VERSION, VERSION_LADDER_ROW};
use crate::use_case::{UseCaseCatalog, UseCaseId, UseCaseMask};
use fub_drivers::cfi::{cfi_assert_eq, cfi_launder};
use fub_drivers::{
    cprintln, for_chip_id, read_checked, BurnLog, BurnOutcome, Bus, FubError, FubResult, FuseCtrl,
    FuseDescriptor, PrivilegeGuard, ProgStage, RegisterMap, SecureTimer, StatusReporter,
    VoltageSequencer, CHIP_ID,
};

/// Token written to the sequencer mutex scratch; the low-power exit path
/// writes its own token, so a read-back mismatch means the lines are owned.
const SEQ_MUTEX_TOKEN: u32 = 0x4655_4221;

/// Busy bit in the low-power sequencer status register.
const LOWPOWER_BUSY: u32 = 1 << 0;

/// Poll and ramp bounds for every blocking wait in the flow. The hardware's
/// own notion of "busy" is unbounded; these are the caller's bounds.
#[derive(Debug, Clone, Copy)]
pub struct FlowParams {
    /// Version this build burns into the ladder
    pub binary_version: u32,

    /// Bound on fuse-controller idle polls
    pub max_idle_polls: u32,

    /// Bound on resense-complete polls
    pub max_sense_polls: u32,

    /// Bound on voltage-ramp timer polls
    pub max_ramp_polls: u32,
}

impl Default for FlowParams {
    fn default() -> Self {
        Self {
            binary_version: FUB_BINARY_VERSION,
            max_idle_polls: 1024,
            max_sense_polls: 4096,
            max_ramp_polls: 65536,
        }
    }
}

/// Everything the flow returns to its caller beyond the status code.
pub struct FlowOutput {
    /// Use cases burnt and verified this invocation
    pub burnt: UseCaseMask,

    /// Audit log of every burn request
    pub log: BurnLog,
}

/// Run the fuse-programming flow.
///
/// Precondition: the execution context has been verified and isolated by
/// the boot bootstrap (signature checked, traps routed to a halting
/// handler). This function assumes it and cannot check it.
///
/// Failures before privilege is raised abort with nothing to undo.
/// From the raise onward every path — success or failure — runs the full
/// cleanup sequence before the result is reported.
pub fn run(bus: &mut impl Bus, request: UseCaseMask, params: &FlowParams) -> FubResult<FlowOutput> {
    cprintln!("[fub] ++");

    let chip_id = read_checked(bus, CHIP_ID)?;
    let map = for_chip_id(chip_id).ok_or(FubError::FLOW_UNSUPPORTED_CHIP)?;
    let reporter = StatusReporter::new(map);

    let result = run_with_map(bus, map, chip_id, request, params, &reporter);

    let status = match &result {
        Ok(_) => 0,
        Err(err) => (*err).into(),
    };
    reporter.report_status(bus, status);
    cprintln!("[fub] -- status {}", status);

    result
}

fn run_with_map(
    bus: &mut impl Bus,
    map: &'static dyn RegisterMap,
    chip_id: u32,
    request: UseCaseMask,
    params: &FlowParams,
    reporter: &StatusReporter,
) -> FubResult<FlowOutput> {
    entry_checks(bus, map, params)?;
    acquire_seq_mutex(bus, map)?;
    reporter.report_stage(bus, ProgStage::EntryChecksPassed);

    let timer = SecureTimer::new(map);
    let vqps = VoltageSequencer::new(map);
    let fuse_ctrl = FuseCtrl::new(map, params.max_idle_polls, params.max_sense_polls);
    let catalog = UseCaseCatalog::new(map, chip_id);

    let mut guard = PrivilegeGuard::new(map);
    let snapshot = match guard.raise(bus) {
        Ok(snapshot) => snapshot,
        Err(err) => {
            // Nothing protected exists yet; only the mutex needs releasing.
            let _ = release_seq_mutex(bus, map);
            return Err(err);
        }
    };
    reporter.report_stage(bus, ProgStage::Protected);

    let mut results = UseCaseResults::default();
    let mut log = BurnLog::default();

    let main_result = (|| {
        vqps.check_rail(bus)?;
        vqps.enable(bus, &timer, params.max_ramp_polls)?;
        reporter.report_stage(bus, ProgStage::VoltageReady);

        SelfRevocationGuard::new(params.binary_version).run(bus, map, &fuse_ctrl, &mut log)?;
        reporter.report_stage(bus, ProgStage::SelfRevoked);

        reporter.report_stage(bus, ProgStage::ProcessingUseCases);
        process_use_cases(
            bus,
            &catalog,
            &fuse_ctrl,
            request,
            &mut results,
            &mut log,
            reporter,
        )
    })();

    reporter.report_stage(bus, ProgStage::CleaningUp);
    let cleanup_result = cleanup(bus, map, &fuse_ctrl, &vqps, &timer, &mut guard, snapshot, params);
    reporter.report_applicability(bus, results.applicability_word());
    reporter.report_stage(bus, ProgStage::Done);

    // First failure anywhere wins; a cleanup failure is reported only when
    // the rest of the run had nothing to report. A recorded per-use-case
    // error always predates a fatal abort, so it ranks first.
    if let Some(err) = results.first_error {
        return Err(err);
    }
    main_result?;
    cleanup_result?;

    Ok(FlowOutput {
        burnt: results.burnt,
        log,
    })
}

/// Validations that must hold before any protected resource is acquired.
/// A failure here aborts the invocation with nothing to clean up.
fn entry_checks(bus: &mut impl Bus, map: &'static dyn RegisterMap, params: &FlowParams) -> FubResult<()> {
    let layout = map.layout();

    let unit_id = read_checked(bus, layout.unit_id)?;
    if unit_id != map.expected_unit_id() {
        return Err(FubError::FLOW_WRONG_EXECUTION_UNIT);
    }
    cfi_assert_eq(cfi_launder(unit_id), map.expected_unit_id());

    // An attacker re-running this build is refused here, before anything is
    // raised; the ladder burn later enforces it for the next attempt.
    let ladder = read_checked(bus, map.opt_row_addr(VERSION_LADDER_ROW))?;
    if burnt_version(ladder)? >= params.binary_version {
        return Err(FubError::FLOW_BINARY_REVOKED);
    }

    if read_checked(bus, layout.boot_stage_sentinel)? == 0 {
        return Err(FubError::FLOW_BOOT_STAGE_NOT_RUN);
    }

    if read_checked(bus, layout.lowpower_status)? & LOWPOWER_BUSY != 0 {
        return Err(FubError::FLOW_LOWPOWER_SEQUENCE_ACTIVE);
    }

    Ok(())
}

/// Advisory claim on the shared control lines. The mutex is a scratch
/// register, not an atomic lock; the immediate read-back compensates.
fn acquire_seq_mutex(bus: &mut impl Bus, map: &'static dyn RegisterMap) -> FubResult<()> {
    let reg = map.layout().seq_mutex;
    bus.write(reg, SEQ_MUTEX_TOKEN)?;
    if read_checked(bus, reg)? != SEQ_MUTEX_TOKEN {
        return Err(FubError::FLOW_MUTEX_NOT_ACQUIRED);
    }
    Ok(())
}

fn release_seq_mutex(bus: &mut impl Bus, map: &'static dyn RegisterMap) -> FubResult<()> {
    bus.write(map.layout().seq_mutex, 0)?;
    Ok(())
}

/// True for burn errors that condemn only the current use case. Everything
/// else (bus faults, protection violations, controller timeouts) implies
/// the hardware or a prior invariant is broken and fails the invocation.
fn condemns_single_use_case(err: FubError) -> bool {
    err == FubError::FUSE_CTRL_INVALID_ROW || err == FubError::FUSE_CTRL_ZERO_BURN_VALUE
}

fn process_use_cases(
    bus: &mut impl Bus,
    catalog: &UseCaseCatalog,
    fuse_ctrl: &FuseCtrl,
    request: UseCaseMask,
    results: &mut UseCaseResults,
    log: &mut BurnLog,
    reporter: &StatusReporter,
) -> FubResult<()> {
    let mut pending: [Option<(UseCaseId, FuseDescriptor)>; UseCaseId::EVALUATION_ORDER.len()] =
        [None; UseCaseId::EVALUATION_ORDER.len()];
    let mut pending_count = 0;

    for id in UseCaseId::EVALUATION_ORDER {
        if !catalog.is_applicable(bus, id, request, results, reporter)? {
            continue;
        }

        let mut descriptor = catalog.describe_fuse(bus, id)?;
        match fuse_ctrl.burn(bus, &mut descriptor, id.mask_bit().bits(), log) {
            Ok(BurnOutcome::Burnt) => {
                pending[pending_count] = Some((id, descriptor));
                pending_count += 1;
            }
            Ok(BurnOutcome::Skipped) => {
                cprintln!("[fub] use case {} already satisfied", id.mask_bit().bits());
            }
            Err(err) if condemns_single_use_case(err) => {
                results.mark_burn_failed(id, err);
                reporter.report_applicability(bus, results.applicability_word());
            }
            Err(err) => return Err(err),
        }
    }

    if pending_count == 0 {
        // Nothing was written; resensing would be a pointless controller
        // round-trip.
        return Ok(());
    }

    // One batched resense makes every burn visible before any verify read.
    fuse_ctrl.resense(bus)?;

    for &(id, descriptor) in pending.iter().flatten() {
        match catalog.verify(bus, id, &descriptor) {
            Ok(()) => results.mark_burnt(id),
            Err(err) if err == FubError::CATALOG_VERIFY_MISMATCH => {
                // One bad row must not stop the remaining verifies; the
                // overall status still reports the failure.
                results.mark_verify_failed(id, err);
                reporter.report_applicability(bus, results.applicability_word());
            }
            Err(err) => return Err(err),
        }
    }

    Ok(())
}

/// The cleanup sequence. Every step executes even if a prior one failed;
/// the first error is remembered and reported to the caller, which ranks it
/// below any earlier functional failure.
fn cleanup(
    bus: &mut impl Bus,
    map: &'static dyn RegisterMap,
    fuse_ctrl: &FuseCtrl,
    vqps: &VoltageSequencer,
    timer: &SecureTimer,
    guard: &mut PrivilegeGuard,
    snapshot: fub_drivers::PrivilegeSnapshot,
    params: &FlowParams,
) -> FubResult<()> {
    let mut first = Ok(());
    let mut note = |result: FubResult<()>| {
        if first.is_ok() {
            if let Err(err) = result {
                first = Err(err);
            }
        }
    };

    note(fuse_ctrl.clear_staging(bus));
    note(vqps.disable(bus, timer, params.max_ramp_polls));
    note(guard.restore(bus, snapshot));
    note(release_seq_mutex(bus, map));

    first
}
