// Licensed under the Apache-2.0 license

use fub_drivers::{
    BurnLog, BurnOutcome, BurnRecord, Bus, FubError, FuseCtrl, FuseDescriptor, PrivLevelMask,
    RegisterMap,
};
use fub_hw_model::{HwModel, InitParams};

const IDLE_POLLS: u32 = 64;
const SENSE_POLLS: u32 = 64;

fn locked_model() -> HwModel {
    let mut model = HwModel::new(InitParams::default());
    let fuse_ctrl_plm = model.map().layout().fuse_ctrl_plm;
    model
        .write(fuse_ctrl_plm, PrivLevelMask::locked().raw())
        .unwrap();
    model
}

fn descriptor_for_row(map: &'static dyn RegisterMap, row: u32, intended: u32) -> FuseDescriptor {
    let (pri_row, red_row) = map.alias_rows(row);
    FuseDescriptor {
        opt_addr: map.opt_row_addr(row),
        pri_row,
        red_row,
        intended,
        burnt: 0,
    }
}

#[test]
fn test_burn_programs_both_aliases_and_resense_reveals_them() {
    let mut model = locked_model();
    let map = model.map();
    let fuse_ctrl = FuseCtrl::new(map, IDLE_POLLS, SENSE_POLLS);
    let mut log = BurnLog::default();
    let mut descriptor = descriptor_for_row(map, 2, 0b101);

    let outcome = fuse_ctrl
        .burn(&mut model, &mut descriptor, 0x1, &mut log)
        .unwrap();
    assert_eq!(outcome, BurnOutcome::Burnt);
    assert_eq!(model.macro_row(descriptor.pri_row), 0b101);
    assert_eq!(model.macro_row(descriptor.red_row), 0b101);

    // Not visible until resense.
    assert_eq!(model.sensed_row(2), 0);
    fuse_ctrl.resense(&mut model).unwrap();
    assert_eq!(model.sensed_row(2), 0b101);

    assert_eq!(log.entries().len(), 1);
    assert_eq!(BurnRecord::from(log.entries()[0].record), BurnRecord::Burnt);
}

#[test]
fn test_second_burn_of_same_descriptor_skips() {
    let mut model = locked_model();
    let map = model.map();
    let fuse_ctrl = FuseCtrl::new(map, IDLE_POLLS, SENSE_POLLS);
    let mut log = BurnLog::default();
    let mut descriptor = descriptor_for_row(map, 1, 0b11);

    assert_eq!(
        fuse_ctrl
            .burn(&mut model, &mut descriptor, 0x1, &mut log)
            .unwrap(),
        BurnOutcome::Burnt
    );
    let cmd_writes = model.write_count(map.layout().fuse_cmd);

    // Same descriptor, no resense or re-describe in between: the adjusted
    // value is now zero and no hardware write may happen.
    assert_eq!(descriptor.adjusted_burn_value(), 0);
    assert_eq!(
        fuse_ctrl
            .burn(&mut model, &mut descriptor, 0x1, &mut log)
            .unwrap(),
        BurnOutcome::Skipped
    );
    assert_eq!(model.write_count(map.layout().fuse_cmd), cmd_writes);
}

#[test]
fn test_already_satisfied_descriptor_skips_without_writes() {
    let mut model = locked_model();
    let map = model.map();
    let fuse_ctrl = FuseCtrl::new(map, IDLE_POLLS, SENSE_POLLS);
    let mut log = BurnLog::default();
    let mut descriptor = descriptor_for_row(map, 1, 0b11);
    descriptor.burnt = 0b11;

    assert_eq!(
        fuse_ctrl
            .burn(&mut model, &mut descriptor, 0x1, &mut log)
            .unwrap(),
        BurnOutcome::Skipped
    );
    assert_eq!(model.write_count(map.layout().fuse_cmd), 0);
    assert_eq!(BurnRecord::from(log.entries()[0].record), BurnRecord::Skipped);
}

#[test]
fn test_out_of_range_row_rejected() {
    let mut model = locked_model();
    let map = model.map();
    let fuse_ctrl = FuseCtrl::new(map, IDLE_POLLS, SENSE_POLLS);
    let mut log = BurnLog::default();

    let mut descriptor = descriptor_for_row(map, 1, 0b1);
    descriptor.red_row = map.alias_row_limit();

    assert_eq!(
        fuse_ctrl
            .burn(&mut model, &mut descriptor, 0x1, &mut log)
            .err(),
        Some(FubError::FUSE_CTRL_INVALID_ROW)
    );
}

#[test]
fn test_burn_refused_while_plm_open() {
    // Deliberately skip locking the fuse-control PLM.
    let mut model = HwModel::new(InitParams::default());
    let map = model.map();
    let fuse_ctrl = FuseCtrl::new(map, IDLE_POLLS, SENSE_POLLS);
    let mut log = BurnLog::default();
    let mut descriptor = descriptor_for_row(map, 1, 0b1);

    assert_eq!(
        fuse_ctrl
            .burn(&mut model, &mut descriptor, 0x1, &mut log)
            .err(),
        Some(FubError::FUSE_CTRL_PROTECTION_NOT_RAISED)
    );
    assert_eq!(model.macro_row(descriptor.pri_row), 0);
    assert_eq!(model.write_count(map.layout().fuse_cmd), 0);
}

#[test]
fn test_stuck_controller_reports_timeout() {
    let mut model = locked_model();
    let map = model.map();
    let fuse_ctrl = FuseCtrl::new(map, IDLE_POLLS, SENSE_POLLS);
    let mut log = BurnLog::default();
    let mut descriptor = descriptor_for_row(map, 1, 0b1);

    // Primary alias completes; the controller wedges on the redundant one.
    model.set_stuck_busy_after_cmds(1);
    assert_eq!(
        fuse_ctrl
            .burn(&mut model, &mut descriptor, 0x1, &mut log)
            .err(),
        Some(FubError::FUSE_CTRL_IDLE_TIMEOUT)
    );
    assert_eq!(model.macro_row(descriptor.pri_row), 0b1);
}

#[test]
fn test_clear_staging_zeroes_both_registers() {
    let mut model = locked_model();
    let map = model.map();
    let fuse_ctrl = FuseCtrl::new(map, IDLE_POLLS, SENSE_POLLS);
    let mut log = BurnLog::default();
    let mut descriptor = descriptor_for_row(map, 1, 0b1);

    fuse_ctrl
        .burn(&mut model, &mut descriptor, 0x1, &mut log)
        .unwrap();
    assert_ne!(model.staging_registers(), (0, 0));

    fuse_ctrl.clear_staging(&mut model).unwrap();
    assert_eq!(model.staging_registers(), (0, 0));
}
