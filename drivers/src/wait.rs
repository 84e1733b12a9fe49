/*++

Licensed under the Apache-2.0 license.

File Name:

    wait.rs

Abstract:

    File contains common functions to implement bounded wait routines.

--*/

use fub_error::{FubError, FubResult};

/// Poll `predicate` until it reports completion or `bound` iterations have
/// elapsed. The hardware's own notion of "busy" is unbounded; every caller
/// supplies the bound and the error to report when it is exceeded.
pub fn until_bounded<F>(bound: u32, on_timeout: FubError, mut predicate: F) -> FubResult<()>
where
    F: FnMut() -> FubResult<bool>,
{
    for _ in 0..bound {
        if predicate()? {
            return Ok(());
        }
    }
    Err(on_timeout)
}
