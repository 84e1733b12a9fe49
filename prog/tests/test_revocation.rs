// Licensed under the Apache-2.0 license

use fub_drivers::FubError;
use fub_hw_model::{HwModel, InitParams};
use fub_prog::{ladder_mask, run, UseCaseMask, VERSION_LADDER_ROW};

pub mod helpers;
use helpers::{assert_cleaned_up, flow_params};

#[test]
fn test_ladder_raises_to_exactly_the_binary_version() {
    let mut model = HwModel::new(InitParams::default());

    for version in [1, 2, 3] {
        run(&mut model, UseCaseMask::empty(), &flow_params(version)).unwrap();
        assert_eq!(model.sensed_row(VERSION_LADDER_ROW), ladder_mask(version));
        assert_cleaned_up(&model);
    }
}

#[test]
fn test_version_skip_burns_only_the_missing_bits() {
    let mut model = HwModel::new(InitParams {
        burnt_rows: vec![(VERSION_LADDER_ROW, ladder_mask(1))],
        ..InitParams::default()
    });

    // Jumping 1 -> 3 burns bits 1 and 2; bit 0 stays as found.
    run(&mut model, UseCaseMask::empty(), &flow_params(3)).unwrap();
    assert_eq!(model.sensed_row(VERSION_LADDER_ROW), ladder_mask(3));
}

#[test]
fn test_rerun_at_burnt_version_refused_before_raising() {
    let mut model = HwModel::new(InitParams::default());
    let reset_trigger_plm = model.map().layout().reset_trigger_plm;

    run(&mut model, UseCaseMask::empty(), &flow_params(2)).unwrap();
    let plm_writes = model.write_count(reset_trigger_plm);

    // Same build again: the chip refuses it before anything is raised.
    let err = run(&mut model, UseCaseMask::empty(), &flow_params(2)).err();
    assert_eq!(err, Some(FubError::FLOW_BINARY_REVOKED));
    assert_eq!(model.write_count(reset_trigger_plm), plm_writes);
    assert_eq!(model.seq_mutex_value(), 0);
}

#[test]
fn test_older_binary_refused() {
    let mut model = HwModel::new(InitParams::default());

    run(&mut model, UseCaseMask::empty(), &flow_params(3)).unwrap();

    let err = run(&mut model, UseCaseMask::empty(), &flow_params(2)).err();
    assert_eq!(err, Some(FubError::FLOW_BINARY_REVOKED));
    assert_eq!(model.sensed_row(VERSION_LADDER_ROW), ladder_mask(3));
}

#[test]
fn test_corrupt_ladder_refused_at_entry() {
    let mut model = HwModel::new(InitParams {
        // Bit 2 without bit 1 is not a ladder value.
        burnt_rows: vec![(VERSION_LADDER_ROW, 0b101)],
        ..InitParams::default()
    });
    let reset_trigger_plm = model.map().layout().reset_trigger_plm;

    let err = run(&mut model, UseCaseMask::empty(), &flow_params(3)).err();
    assert_eq!(err, Some(FubError::REVOCATION_LADDER_CORRUPT));
    assert_eq!(model.write_count(reset_trigger_plm), 0);
}

#[test]
fn test_ladder_verify_failure_is_fatal_and_cleans_up() {
    let mut model = HwModel::new(InitParams::default());
    model.suppress_sense_for_row(VERSION_LADDER_ROW);

    let err = run(&mut model, UseCaseMask::AUX_DEBUG_ENABLE, &flow_params(3)).err();
    assert_eq!(err, Some(FubError::REVOCATION_VERIFY_MISMATCH));

    // The failure happened before use-case processing.
    assert_eq!(model.sensed_row(1), 0);
    assert_eq!(
        model.status_mailbox(),
        FubError::REVOCATION_VERIFY_MISMATCH.into()
    );
    assert_cleaned_up(&model);
}
