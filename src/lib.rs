// trios -- process-management core for a small three-terminal kernel.
//
// Everything hardware-shaped (register capture, the privilege transfer,
// kernel stack loading, copying an image through the live user mapping) sits
// behind the `Platform` trait in `process::context`; the slot table, mapper,
// descriptor layer, dispatcher and scheduler are plain logic on top of it.
// Boot and trap glue embed a `Kernel` and feed it interrupts.
#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod devices;
pub mod fd;
pub mod fs;
pub mod logger;
pub mod memory;
pub mod process;
pub mod syscalls;
pub mod video;

use alloc::sync::Arc;
use spin::Mutex;

use crate::devices::{ConsoleInput, RtcClock};
use crate::fs::FileSystem;
use crate::memory::Mapper;
use crate::process::context::Platform;
use crate::process::pcb::SlotTable;
use crate::process::scheduler::{Scheduler, SHELL_COMMAND};
use crate::process::TerminalId;
use crate::syscalls::SyscallError;
use crate::video::VideoMemory;

pub use crate::process::{ProcessId, MAX_PROCESSES, NUM_TERMINALS};

/// The process-management core. One instance owns all mutable kernel state;
/// interrupt handlers reach it through the embedding kernel's lock.
pub struct Kernel<P: Platform, F: FileSystem> {
    pub(crate) slots: SlotTable,
    pub(crate) mapper: Mapper,
    pub(crate) sched: Scheduler,
    pub(crate) console: Arc<ConsoleInput>,
    pub(crate) rtc: Arc<RtcClock>,
    pub(crate) video: Arc<Mutex<VideoMemory>>,
    pub(crate) platform: P,
    pub(crate) fs: F,
}

impl<P: Platform, F: FileSystem> Kernel<P, F> {
    pub fn new(platform: P, fs: F) -> Self {
        Kernel {
            slots: SlotTable::new(),
            mapper: Mapper::new(),
            sched: Scheduler::new(),
            console: Arc::new(ConsoleInput::new()),
            rtc: Arc::new(RtcClock::new()),
            video: Arc::new(Mutex::new(VideoMemory::new())),
            platform,
            fs,
        }
    }

    /// Launch the root shell on terminal 0. Terminals 1 and 2 bootstrap
    /// lazily from the timer path on their first service ticks.
    pub fn start(&mut self) -> Result<process::ProcessId, SyscallError> {
        self.sched.terminal_mut(0).started = true;
        self.launch_on(SHELL_COMMAND, 0, None)
    }

    /// Entry point for the exception path: a fault inside the current
    /// process becomes a halt carrying the reserved fault status. Faults in
    /// kernel code never come through here; those panic at the trap site.
    pub fn process_fault(&mut self) -> Result<(), SyscallError> {
        log::warn!(
            "process {} faulted, converting to halt",
            self.slots.current()
        );
        self.halt_with(syscalls::FAULT_STATUS)
    }

    /// Entry point for the RTC interrupt path.
    pub fn rtc_tick(&self) {
        self.rtc.tick();
    }

    /// Entry point for the line discipline: deliver a completed input line
    /// to a terminal. Returns false when the line had to be dropped.
    pub fn push_input_line(&self, terminal: TerminalId, line: &[u8]) -> bool {
        if terminal >= process::NUM_TERMINALS {
            return false;
        }
        self.console.push_line(terminal, line)
    }

    /// Handle for the interrupt side of the console queues.
    pub fn console_handle(&self) -> Arc<ConsoleInput> {
        self.console.clone()
    }

    /// Handle for the interrupt side of the RTC.
    pub fn rtc_handle(&self) -> Arc<RtcClock> {
        self.rtc.clone()
    }

    /// Handle for display glue (and tests) to inspect the video buffers.
    pub fn video_handle(&self) -> Arc<Mutex<VideoMemory>> {
        self.video.clone()
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    pub fn slot_table(&self) -> &SlotTable {
        &self.slots
    }

    pub fn mapper(&self) -> &Mapper {
        &self.mapper
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.sched
    }
}
