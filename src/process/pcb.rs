// Process control blocks and the slot table for the trios kernel core.
use core::array;

use super::{ProcessId, TerminalId, MAX_PROCESSES};
use crate::devices::LINE_BUF_SIZE;
use crate::fd::FdTable;
use crate::process::context::Continuation;

/// Occupancy state of one process slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    Free,
    Running,
}

/// Per-process record. Fully populated during launch; the descriptor
/// cursors are the only fields that move afterwards.
#[derive(Debug, Clone)]
pub struct Pcb {
    pub id: ProcessId,
    /// `None` marks a terminal's root shell.
    pub parent: Option<ProcessId>,
    /// The launcher's saved registers and replaced mapping, restored when
    /// this process halts. `Some` exactly when `parent` is.
    pub parent_context: Option<Continuation>,
    /// Terminal this process belongs to, inherited from the launcher.
    pub terminal: TerminalId,
    pub arg: [u8; LINE_BUF_SIZE],
    /// Stored argument length including the trailing terminator; 0 means
    /// the command line carried no argument.
    pub arg_len: usize,
    pub fds: FdTable,
}

impl Pcb {
    pub fn new(
        id: ProcessId,
        parent: Option<ProcessId>,
        parent_context: Option<Continuation>,
        terminal: TerminalId,
        arg: &[u8],
    ) -> Self {
        let mut arg_buf = [0u8; LINE_BUF_SIZE];
        let arg_len = if arg.is_empty() {
            0
        } else {
            let len = arg.len().min(LINE_BUF_SIZE - 1);
            arg_buf[..len].copy_from_slice(&arg[..len]);
            len + 1
        };
        Pcb {
            id,
            parent,
            parent_context,
            terminal,
            arg: arg_buf,
            arg_len,
            fds: FdTable::with_stdio(),
        }
    }
}

/// Fixed arena of process identities. Slots are found by linear scan;
/// freeing reclaims the slot without zeroing the PCB. The current-process
/// identity is an explicit field written at every context switch, never
/// reconstructed from stack-pointer arithmetic.
pub struct SlotTable {
    states: [SlotState; MAX_PROCESSES],
    pcbs: [Option<Pcb>; MAX_PROCESSES],
    current: ProcessId,
}

impl SlotTable {
    pub fn new() -> Self {
        SlotTable {
            states: [SlotState::Free; MAX_PROCESSES],
            pcbs: array::from_fn(|_| None),
            current: 0,
        }
    }

    /// Claim the lowest free slot, or `None` when the arena is full.
    pub fn allocate(&mut self) -> Option<ProcessId> {
        let id = self
            .states
            .iter()
            .position(|state| *state == SlotState::Free)?;
        self.states[id] = SlotState::Running;
        Some(id)
    }

    /// Release a slot. Must pair with exactly one `allocate`.
    pub fn free(&mut self, id: ProcessId) {
        if id >= MAX_PROCESSES || self.states[id] == SlotState::Free {
            log::warn!("freeing process slot {} which is not occupied", id);
            return;
        }
        self.states[id] = SlotState::Free;
    }

    pub fn is_occupied(&self, id: ProcessId) -> bool {
        id < MAX_PROCESSES && self.states[id] == SlotState::Running
    }

    pub fn occupied_count(&self) -> usize {
        self.states
            .iter()
            .filter(|state| **state == SlotState::Running)
            .count()
    }

    /// Identity of the process whose execution context is active. Valid
    /// once the first shell has launched.
    pub fn current(&self) -> ProcessId {
        self.current
    }

    pub fn set_current(&mut self, id: ProcessId) {
        self.current = id;
    }

    pub fn store(&mut self, pcb: Pcb) {
        let id = pcb.id;
        self.pcbs[id] = Some(pcb);
    }

    /// PCB for an occupied slot.
    pub fn pcb(&self, id: ProcessId) -> Option<&Pcb> {
        if !self.is_occupied(id) {
            return None;
        }
        self.pcbs[id].as_ref()
    }

    pub fn pcb_mut(&mut self, id: ProcessId) -> Option<&mut Pcb> {
        if !self.is_occupied(id) {
            return None;
        }
        self.pcbs[id].as_mut()
    }

    pub fn occupied_ids(&self) -> impl Iterator<Item = ProcessId> + '_ {
        (0..MAX_PROCESSES).filter(|id| self.is_occupied(*id))
    }
}
