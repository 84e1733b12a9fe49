/*++

Licensed under the Apache-2.0 license.

File Name:

    lib.rs

Abstract:

    File contains exports for the FUB fuse-programming flow.

--*/

#![cfg_attr(not(feature = "std"), no_std)]

mod flow;
mod results;
mod revocation;
mod use_case;

pub use flow::{run, FlowOutput, FlowParams};
pub use results::UseCaseResults;
pub use revocation::{
    burnt_version, ladder_mask, SelfRevocationGuard, FUB_BINARY_VERSION, VERSION_LADDER_ROW,
    VERSION_LADDER_TAG, VERSION_LADDER_WIDTH,
};
pub use use_case::{UseCaseCatalog, UseCaseId, UseCaseMask};
