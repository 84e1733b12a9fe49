/*++

Licensed under the Apache-2.0 license.

File Name:

    fuse_log.rs

Abstract:

    Burn-log types recording what was written to the fuse macro.

--*/

use fub_error::{FubError, FubResult};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};
use zeroize::Zeroize;

/// What a log entry records about its burn request.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BurnRecord {
    Invalid = 0,
    Burnt = 1,
    Skipped = 2,
}

impl From<u32> for BurnRecord {
    fn from(val: u32) -> BurnRecord {
        match val {
            1 => BurnRecord::Burnt,
            2 => BurnRecord::Skipped,
            _ => BurnRecord::Invalid,
        }
    }
}

/// Burn log entry
#[repr(C)]
#[derive(IntoBytes, Clone, Copy, Debug, Default, FromBytes, KnownLayout, Immutable, Zeroize)]
pub struct BurnLogEntry {
    /// Caller tag identifying what requested the burn
    pub tag: u32,

    /// Primary alias row the request targeted
    pub row: u32,

    /// Adjusted value written (zero for skipped entries)
    pub value: u32,

    /// `BurnRecord` discriminant
    pub record: u32,
}

impl BurnLogEntry {
    pub fn new(tag: u32, row: u32, value: u32, record: BurnRecord) -> Self {
        Self {
            tag,
            row,
            value,
            record: record as u32,
        }
    }
}

pub const BURN_LOG_CAPACITY: usize = 16;

/// Fixed-capacity audit log of burn requests, owned by the invocation and
/// handed back to the caller.
#[derive(Default)]
pub struct BurnLog {
    entries: [BurnLogEntry; BURN_LOG_CAPACITY],
    count: usize,
}

impl BurnLog {
    pub fn append(&mut self, entry: BurnLogEntry) -> FubResult<()> {
        if self.count >= self.entries.len() {
            return Err(FubError::FUSE_CTRL_LOG_FULL);
        }
        self.entries[self.count] = entry;
        self.count += 1;
        Ok(())
    }

    pub fn entries(&self) -> &[BurnLogEntry] {
        &self.entries[..self.count]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_and_read_back() {
        let mut log = BurnLog::default();
        log.append(BurnLogEntry::new(1, 4, 0xF, BurnRecord::Burnt))
            .unwrap();
        log.append(BurnLogEntry::new(2, 6, 0, BurnRecord::Skipped))
            .unwrap();

        let entries = log.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(BurnRecord::from(entries[0].record), BurnRecord::Burnt);
        assert_eq!(BurnRecord::from(entries[1].record), BurnRecord::Skipped);
    }

    #[test]
    fn test_full_log_rejected() {
        let mut log = BurnLog::default();
        for i in 0..BURN_LOG_CAPACITY {
            log.append(BurnLogEntry::new(i as u32, 0, 1, BurnRecord::Burnt))
                .unwrap();
        }
        assert_eq!(
            log.append(BurnLogEntry::new(99, 0, 1, BurnRecord::Burnt)),
            Err(FubError::FUSE_CTRL_LOG_FULL)
        );
    }
}
