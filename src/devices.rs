// Device collaborators for the trios kernel core: console input queues and
// the real-time clock. The scancode translator and the RTC register
// programming live outside the crate; these types are the hand-off points
// their interrupt paths push into.
use core::hint;
use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use crossbeam_queue::ArrayQueue;

use crate::process::{TerminalId, NUM_TERMINALS};
use crate::syscalls::SyscallError;

/// Size of the keyboard line buffer; arguments and input lines are bounded
/// by it.
pub const LINE_BUF_SIZE: usize = 128;

/// Completed lines a terminal can hold before the discipline must drop.
pub const LINE_QUEUE_DEPTH: usize = 8;

/// Fixed value an RTC read reports: "a tick occurred", not a byte count.
pub const RTC_READ_SENTINEL: usize = 0;

/// One completed input line.
#[derive(Debug, Clone, Copy)]
pub struct InputLine {
    bytes: [u8; LINE_BUF_SIZE],
    len: usize,
}

impl InputLine {
    pub fn from_bytes(line: &[u8]) -> Self {
        let len = line.len().min(LINE_BUF_SIZE);
        let mut bytes = [0u8; LINE_BUF_SIZE];
        bytes[..len].copy_from_slice(&line[..len]);
        InputLine { bytes, len }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }
}

/// Per-terminal queues of completed input lines. The line discipline pushes
/// into the visible terminal's queue from interrupt context; stdin reads
/// pop from the reading process's own terminal, so input never leaks across
/// sessions.
pub struct ConsoleInput {
    queues: [ArrayQueue<InputLine>; NUM_TERMINALS],
}

impl ConsoleInput {
    pub fn new() -> Self {
        ConsoleInput {
            queues: core::array::from_fn(|_| ArrayQueue::new(LINE_QUEUE_DEPTH)),
        }
    }

    /// Interrupt side: deliver a completed line. Returns false and drops
    /// the line when the terminal's queue is full.
    pub fn push_line(&self, terminal: TerminalId, line: &[u8]) -> bool {
        match self.queues[terminal].push(InputLine::from_bytes(line)) {
            Ok(()) => true,
            Err(_) => {
                log::warn!("terminal {} input queue full, line dropped", terminal);
                false
            }
        }
    }

    /// Block until the terminal has a completed line, then copy up to
    /// `buf.len()` bytes of it and report the count.
    pub fn read_line(&self, terminal: TerminalId, buf: &mut [u8]) -> usize {
        let line = loop {
            match self.queues[terminal].pop() {
                Some(line) => break line,
                None => hint::spin_loop(),
            }
        };
        let n = line.as_bytes().len().min(buf.len());
        buf[..n].copy_from_slice(&line.as_bytes()[..n]);
        n
    }
}

/// Real-time clock hand-off. The interrupt path raises the tick flag; a
/// reader spins on it, which is what makes an RTC read block for exactly
/// one tick.
pub struct RtcClock {
    tick_pending: AtomicBool,
    opened: AtomicBool,
    rate_hz: AtomicU32,
}

/// Frequency the RTC resets to whenever it is opened.
pub const RTC_DEFAULT_HZ: u32 = 2;
/// Highest programmable RTC frequency.
pub const RTC_MAX_HZ: u32 = 1024;

impl RtcClock {
    pub fn new() -> Self {
        RtcClock {
            tick_pending: AtomicBool::new(false),
            opened: AtomicBool::new(false),
            rate_hz: AtomicU32::new(RTC_DEFAULT_HZ),
        }
    }

    /// Interrupt side: a hardware tick arrived.
    pub fn tick(&self) {
        self.tick_pending.store(true, Ordering::Release);
    }

    /// Open resets the interrupt rate to the default 2 Hz.
    pub fn open(&self) {
        self.opened.store(true, Ordering::Release);
        self.rate_hz.store(RTC_DEFAULT_HZ, Ordering::Release);
    }

    pub fn close(&self) -> Result<(), SyscallError> {
        if !self.opened.swap(false, Ordering::AcqRel) {
            return Err(SyscallError::BadDescriptor);
        }
        Ok(())
    }

    /// Block until the next tick, then report the fixed sentinel.
    pub fn wait_tick(&self) -> usize {
        while !self.tick_pending.swap(false, Ordering::AcqRel) {
            hint::spin_loop();
        }
        RTC_READ_SENTINEL
    }

    /// Program the tick rate from a 4-byte little-endian frequency; only
    /// powers of two in [2, 1024] Hz are accepted.
    pub fn set_frequency(&self, buf: &[u8]) -> Result<(), SyscallError> {
        if buf.len() != 4 {
            return Err(SyscallError::InvalidArgument);
        }
        let hz = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
        if hz < RTC_DEFAULT_HZ || hz > RTC_MAX_HZ || !hz.is_power_of_two() {
            return Err(SyscallError::InvalidArgument);
        }
        self.rate_hz.store(hz, Ordering::Release);
        Ok(())
    }

    pub fn frequency(&self) -> u32 {
        self.rate_hz.load(Ordering::Acquire)
    }
}
