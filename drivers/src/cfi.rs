/*++

Licensed under the Apache-2.0 license.

File Name:

    cfi.rs

Abstract:

    File contains glitch-hardening helpers for security-critical checks.

References:
    https://github.com/lowRISC/opentitan/blob/7a61300cf7c409fa68fd892942c1d7b58a7cd4c0/sw/device/lib/base/hardened.h#L260

--*/

/// CFI Panic Information
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum CfiPanicInfo {
    /// CFI Assert Equal failed
    AssertEqFail,
}

/// Launder the value to prevent compiler optimization
///
/// # Arguments
///
/// * `val` - Value to launder
pub fn cfi_launder<T>(val: T) -> T {
    core::hint::black_box(val)
}

/// Raised when a doubled security check disagrees with itself. Resuming is
/// more dangerous than halting; the surrounding trap handler does not return.
#[inline(never)]
pub fn cfi_panic(info: CfiPanicInfo) -> ! {
    let _ = cfi_launder(info);
    panic!("CFI violation: {:?}", info);
}

/// CFI Binary Condition Assertion
///
/// # Arguments
///
/// `lhs` - Left hand side
/// `rhs` - Right hand side
#[inline(always)]
pub fn cfi_assert_eq<T>(lhs: T, rhs: T)
where
    T: PartialEq + Copy,
{
    if lhs != rhs {
        cfi_panic(CfiPanicInfo::AssertEqFail);
    }

    // Second check for glitch protection
    if cfi_launder(lhs) != cfi_launder(rhs) {
        cfi_panic(CfiPanicInfo::AssertEqFail);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assert_eq_passes() {
        cfi_assert_eq(7u32, 7u32);
    }

    #[test]
    #[should_panic(expected = "CFI violation")]
    fn test_assert_eq_panics() {
        cfi_assert_eq(1u32, 2u32);
    }
}
