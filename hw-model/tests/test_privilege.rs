// Licensed under the Apache-2.0 license

use fub_drivers::{Bus, FubError, PrivLevelMask, PrivilegeGuard};
use fub_hw_model::{HwModel, InitParams};

#[test]
fn test_raise_locks_every_guarded_register() {
    let mut model = HwModel::new(InitParams::default());
    let mut guard = PrivilegeGuard::new(model.map());

    let _snapshot = guard.raise(&mut model).unwrap();
    assert!(guard.armed());
    for val in model.plm_values() {
        assert!(PrivLevelMask::from_raw(val).write_locked());
    }
}

#[test]
fn test_restore_returns_exact_prior_values() {
    let mut model = HwModel::new(InitParams::default());
    let before = model.plm_values();

    let mut guard = PrivilegeGuard::new(model.map());
    let snapshot = guard.raise(&mut model).unwrap();
    assert_ne!(model.plm_values(), before);

    guard.restore(&mut model, snapshot).unwrap();
    assert!(!guard.armed());
    assert_eq!(model.plm_values(), before);
}

#[test]
fn test_double_raise_rejected() {
    let mut model = HwModel::new(InitParams::default());
    let mut guard = PrivilegeGuard::new(model.map());

    let _snapshot = guard.raise(&mut model).unwrap();
    assert_eq!(
        guard.raise(&mut model).err(),
        Some(FubError::PRIVILEGE_ALREADY_RAISED)
    );
}

#[test]
fn test_restore_requires_armed_guard() {
    let mut model = HwModel::new(InitParams::default());
    let mut armed_guard = PrivilegeGuard::new(model.map());
    let snapshot = armed_guard.raise(&mut model).unwrap();

    let mut unarmed_guard = PrivilegeGuard::new(model.map());
    assert_eq!(
        unarmed_guard.restore(&mut model, snapshot).err(),
        Some(FubError::PRIVILEGE_NOT_RAISED)
    );
}

#[test]
fn test_restore_continues_past_a_faulting_register() {
    let mut model = HwModel::new(InitParams::default());
    let before = model.plm_values();
    let reset_trigger_plm = model.map().layout().reset_trigger_plm;

    // Raise writes this register once; its restore write is the second.
    model.inject_write_fault(reset_trigger_plm, 2);

    let mut guard = PrivilegeGuard::new(model.map());
    let snapshot = guard.raise(&mut model).unwrap();

    assert_eq!(
        guard.restore(&mut model, snapshot).err(),
        Some(FubError::BUS_STORE_ACCESS_FAULT)
    );

    // The faulting register is stuck locked, but the rest were restored.
    let after = model.plm_values();
    assert_eq!(after[0], PrivLevelMask::locked().raw());
    assert_eq!(after[1..], before[1..]);
}

#[test]
fn test_raise_aborts_on_sentinel_read() {
    let mut model = HwModel::new(InitParams::default());
    let timer_plm = model.map().layout().timer_plm;

    // Simulate the priv ring dropping the capture read.
    model.write(timer_plm, 0xBAD0_0001).unwrap();

    let mut guard = PrivilegeGuard::new(model.map());
    assert_eq!(
        guard.raise(&mut model).err(),
        Some(FubError::BUS_FAULT_SENTINEL)
    );
    assert!(!guard.armed());
}
