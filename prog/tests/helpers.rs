// Licensed under the Apache-2.0 license

use fub_hw_model::HwModel;
use fub_prog::FlowParams;

/// PLM reset values the model boots with; every clean exit must leave them
/// exactly as found.
pub const PLM_DEFAULTS: [u32; 4] = [0x71, 0x73, 0x75, 0x77];

pub fn flow_params(version: u32) -> FlowParams {
    FlowParams {
        binary_version: version,
        ..FlowParams::default()
    }
}

/// Restore totality: privilege, mutex, and staging registers are back to
/// their pre-invocation state regardless of how the flow exited.
pub fn assert_cleaned_up(model: &HwModel) {
    assert_eq!(model.plm_values(), PLM_DEFAULTS);
    assert_eq!(model.seq_mutex_value(), 0);
    assert_eq!(model.staging_registers(), (0, 0));
}
