/*++

Licensed under the Apache-2.0 license.

File Name:

    lib.rs

Abstract:

    Software model of the fuse-programming register file. Implements the
    register bus the drivers run against, with fault-injection knobs for
    exercising the paths real hardware makes hard to reach.

--*/

use std::collections::HashMap;

use fub_drivers::bus::FAULT_SENTINEL;
use fub_drivers::{for_chip_id, Bus, BusError, RegAddr, RegisterMap};

/// Logical option rows the model senses (row 0 is the version ladder).
pub const NUM_LOGICAL_ROWS: u32 = 8;

const STATUS_BUSY: u32 = 0x2;
const STATUS_SENSE_DONE: u32 = 0x100;

/// Controller stays busy this many status polls after a command.
const CMD_BUSY_POLLS: u32 = 2;

/// Initial state of the modeled device.
pub struct InitParams {
    pub chip_id: u32,
    pub devid: u32,
    /// Redundant identity field; `None` mirrors `devid`.
    pub devid_b: Option<u32>,
    /// Unit identity; `None` reports the family's expected unit.
    pub unit_id: Option<u32>,
    pub boot_stage_sentinel: u32,
    pub lowpower_busy: bool,
    pub vqps_duty: u32,
    pub vqps_period: u32,
    /// Pre-burnt logical rows: (row, bits), applied to both aliases.
    pub burnt_rows: Vec<(u32, u32)>,
    /// Nanoseconds the timer advances per timer read.
    pub timer_step_ns: u32,
}

impl Default for InitParams {
    fn default() -> Self {
        Self {
            chip_id: 0x0000_41A1,
            devid: 0x0000_1E07,
            devid_b: None,
            unit_id: None,
            boot_stage_sentinel: 0xB007_0001,
            lowpower_busy: false,
            vqps_duty: 0x40,
            vqps_period: 0x100,
            burnt_rows: Vec::new(),
            timer_step_ns: 1000,
        }
    }
}

pub struct HwModel {
    map: &'static dyn RegisterMap,

    plm: [u32; 4],
    staging_addr: u32,
    staging_wdata: u32,
    macro_rows: Vec<u32>,
    sensed: Vec<u32>,

    busy_polls_left: u32,
    pending_sense: bool,
    sense_done: bool,
    stuck_busy: bool,

    vqps_ctrl: u32,
    vqps_duty: u32,
    vqps_period: u32,

    timer_ns: u32,
    timer_step_ns: u32,

    chip_id: u32,
    unit_id: u32,
    devid_a: u32,
    devid_b: u32,
    boot_stage_sentinel: u32,
    lowpower_status: u32,
    seq_mutex: u32,
    status_mailbox: u32,
    applicability_mailbox: u32,

    // Fault injection
    read_faults: HashMap<RegAddr, u32>,
    write_faults: HashMap<RegAddr, u32>,
    stuck_busy_after_cmds: Option<u32>,
    timer_sentinel_reads: u32,
    suppress_sense_row: Option<u32>,
    write_cmd_count: u32,

    write_counts: HashMap<RegAddr, u32>,
}

impl HwModel {
    pub fn new(params: InitParams) -> Self {
        let map = for_chip_id(params.chip_id).expect("unsupported chip id for model");

        let mut macro_rows = vec![0u32; map.alias_row_limit() as usize];
        for &(row, bits) in &params.burnt_rows {
            let (pri, red) = map.alias_rows(row);
            macro_rows[pri as usize] |= bits;
            macro_rows[red as usize] |= bits;
        }

        let mut model = Self {
            map,
            // Distinct open values so a swapped restore is caught.
            plm: [0x71, 0x73, 0x75, 0x77],
            staging_addr: 0,
            staging_wdata: 0,
            macro_rows,
            sensed: vec![0u32; NUM_LOGICAL_ROWS as usize],
            busy_polls_left: 0,
            pending_sense: false,
            sense_done: false,
            stuck_busy: false,
            vqps_ctrl: 0,
            vqps_duty: params.vqps_duty,
            vqps_period: params.vqps_period,
            timer_ns: 0x1000,
            timer_step_ns: params.timer_step_ns,
            chip_id: params.chip_id,
            unit_id: params.unit_id.unwrap_or_else(|| map.expected_unit_id()),
            devid_a: params.devid,
            devid_b: params.devid_b.unwrap_or(params.devid),
            boot_stage_sentinel: params.boot_stage_sentinel,
            lowpower_status: params.lowpower_busy as u32,
            seq_mutex: 0,
            status_mailbox: 0,
            applicability_mailbox: 0,
            read_faults: HashMap::new(),
            write_faults: HashMap::new(),
            stuck_busy_after_cmds: None,
            timer_sentinel_reads: 0,
            suppress_sense_row: None,
            write_cmd_count: 0,
            write_counts: HashMap::new(),
        };
        // The boot bootstrap leaves the macro sensed.
        model.do_sense();
        model
    }

    pub fn map(&self) -> &'static dyn RegisterMap {
        self.map
    }

    // ---- fault injection ----

    /// Fault the `nth` upcoming read of `addr` (1-based), once.
    pub fn inject_read_fault(&mut self, addr: RegAddr, nth: u32) {
        self.read_faults.insert(addr, nth);
    }

    /// Fault the `nth` upcoming write of `addr` (1-based), once.
    pub fn inject_write_fault(&mut self, addr: RegAddr, nth: u32) {
        self.write_faults.insert(addr, nth);
    }

    /// Controller never returns to idle after `cmds` burn commands.
    pub fn set_stuck_busy_after_cmds(&mut self, cmds: u32) {
        self.stuck_busy_after_cmds = Some(cmds);
    }

    /// Next `n` timer reads return a fault-sentinel pattern.
    pub fn set_timer_sentinel_reads(&mut self, n: u32) {
        self.timer_sentinel_reads = n;
    }

    /// The next sense leaves this logical row's live register stale,
    /// forcing a verification mismatch for anything burnt into it.
    pub fn suppress_sense_for_row(&mut self, row: u32) {
        self.suppress_sense_row = Some(row);
    }

    // ---- observation ----

    pub fn plm_values(&self) -> [u32; 4] {
        self.plm
    }

    pub fn write_count(&self, addr: RegAddr) -> u32 {
        self.write_counts.get(&addr).copied().unwrap_or(0)
    }

    pub fn macro_row(&self, alias_row: u32) -> u32 {
        self.macro_rows[alias_row as usize]
    }

    pub fn sensed_row(&self, logical_row: u32) -> u32 {
        self.sensed[logical_row as usize]
    }

    pub fn status_mailbox(&self) -> u32 {
        self.status_mailbox
    }

    pub fn applicability_mailbox(&self) -> u32 {
        self.applicability_mailbox
    }

    pub fn seq_mutex_value(&self) -> u32 {
        self.seq_mutex
    }

    pub fn staging_registers(&self) -> (u32, u32) {
        (self.staging_addr, self.staging_wdata)
    }

    // ---- internals ----

    fn do_sense(&mut self) {
        for logical in 0..NUM_LOGICAL_ROWS {
            if self.suppress_sense_row == Some(logical) {
                continue;
            }
            let (pri, red) = self.map.alias_rows(logical);
            self.sensed[logical as usize] =
                self.macro_rows[pri as usize] | self.macro_rows[red as usize];
        }
    }

    fn plm_index(&self, addr: RegAddr) -> Option<usize> {
        let layout = self.map.layout();
        [
            layout.reset_trigger_plm,
            layout.timer_plm,
            layout.fuse_ctrl_plm,
            layout.vqps_plm,
        ]
        .iter()
        .position(|&plm_addr| plm_addr == addr)
    }

    fn opt_row_index(&self, addr: RegAddr) -> Option<usize> {
        let base = self.map.layout().fuse_opt_base;
        if addr >= base && addr < base + 4 * NUM_LOGICAL_ROWS && (addr - base) % 4 == 0 {
            Some(((addr - base) / 4) as usize)
        } else {
            None
        }
    }

    fn read_fuse_status(&mut self) -> u32 {
        if self.stuck_busy {
            return STATUS_BUSY;
        }
        if self.busy_polls_left > 0 {
            self.busy_polls_left -= 1;
            return STATUS_BUSY;
        }
        if self.pending_sense {
            self.do_sense();
            self.pending_sense = false;
            self.sense_done = true;
        }
        if self.sense_done {
            STATUS_SENSE_DONE
        } else {
            0
        }
    }

    fn handle_fuse_cmd(&mut self, val: u32) {
        if val & 0x1 != 0 {
            self.write_cmd_count += 1;
            if let Some(limit) = self.stuck_busy_after_cmds {
                if self.write_cmd_count > limit {
                    self.stuck_busy = true;
                    return;
                }
            }
            let row = self.staging_addr as usize;
            if row < self.macro_rows.len() && self.staging_wdata != 0 {
                self.macro_rows[row] |= self.staging_wdata;
            }
            // New burns are invisible until the next sense.
            self.sense_done = false;
            self.busy_polls_left = CMD_BUSY_POLLS;
        }
        if val & 0x2 != 0 {
            self.pending_sense = true;
            self.busy_polls_left = CMD_BUSY_POLLS;
        }
    }
}

impl Bus for HwModel {
    fn read(&mut self, addr: RegAddr) -> Result<u32, BusError> {
        if let Some(count) = self.read_faults.get_mut(&addr) {
            *count -= 1;
            if *count == 0 {
                self.read_faults.remove(&addr);
                return Err(BusError::LoadAccessFault);
            }
        }

        let layout = self.map.layout();

        if addr == fub_drivers::CHIP_ID {
            return Ok(self.chip_id);
        }
        if let Some(i) = self.plm_index(addr) {
            return Ok(self.plm[i]);
        }
        if let Some(i) = self.opt_row_index(addr) {
            return Ok(self.sensed[i]);
        }
        if addr == layout.timer_ns {
            if self.timer_sentinel_reads > 0 {
                self.timer_sentinel_reads -= 1;
                return Ok(FAULT_SENTINEL | 0xBEEF);
            }
            self.timer_ns = self.timer_ns.wrapping_add(self.timer_step_ns);
            return Ok(self.timer_ns);
        }
        if addr == layout.fuse_status {
            return Ok(self.read_fuse_status());
        }

        match addr {
            a if a == layout.fuse_addr => Ok(self.staging_addr),
            a if a == layout.fuse_wdata => Ok(self.staging_wdata),
            a if a == layout.vqps_ctrl => Ok(self.vqps_ctrl),
            a if a == layout.vqps_duty => Ok(self.vqps_duty),
            a if a == layout.vqps_period => Ok(self.vqps_period),
            a if a == layout.unit_id => Ok(self.unit_id),
            a if a == layout.devid_a => Ok(self.devid_a),
            a if a == layout.devid_b => Ok(self.devid_b),
            a if a == layout.boot_stage_sentinel => Ok(self.boot_stage_sentinel),
            a if a == layout.lowpower_status => Ok(self.lowpower_status),
            a if a == layout.seq_mutex => Ok(self.seq_mutex),
            a if a == layout.status_mailbox => Ok(self.status_mailbox),
            a if a == layout.applicability_mailbox => Ok(self.applicability_mailbox),
            _ => Err(BusError::LoadAccessFault),
        }
    }

    fn write(&mut self, addr: RegAddr, val: u32) -> Result<(), BusError> {
        if let Some(count) = self.write_faults.get_mut(&addr) {
            *count -= 1;
            if *count == 0 {
                self.write_faults.remove(&addr);
                return Err(BusError::StoreAccessFault);
            }
        }

        let layout = self.map.layout();

        if let Some(i) = self.plm_index(addr) {
            self.plm[i] = val;
            *self.write_counts.entry(addr).or_insert(0) += 1;
            return Ok(());
        }

        if addr == layout.fuse_cmd {
            self.handle_fuse_cmd(val);
            *self.write_counts.entry(addr).or_insert(0) += 1;
            return Ok(());
        }

        let slot = match addr {
            a if a == layout.fuse_addr => &mut self.staging_addr,
            a if a == layout.fuse_wdata => &mut self.staging_wdata,
            a if a == layout.vqps_ctrl => &mut self.vqps_ctrl,
            a if a == layout.seq_mutex => &mut self.seq_mutex,
            a if a == layout.status_mailbox => &mut self.status_mailbox,
            a if a == layout.applicability_mailbox => &mut self.applicability_mailbox,
            _ => return Err(BusError::StoreAccessFault),
        };
        *slot = val;
        *self.write_counts.entry(addr).or_insert(0) += 1;
        Ok(())
    }
}
