// Process management module for the trios kernel core.
pub mod context;
pub mod pcb;
pub mod scheduler;

/// Process identity; doubles as the index into the PCB arena and selects
/// the process's fixed kernel stack.
pub type ProcessId = usize;

/// One of the three virtual consoles.
pub type TerminalId = usize;

/// Total number of processes allowed at once.
pub const MAX_PROCESSES: usize = 6;

/// Number of independent terminal sessions.
pub const NUM_TERMINALS: usize = 3;

pub use context::{Continuation, Platform, TaskContext};
pub use pcb::{Pcb, SlotTable};
pub use scheduler::Scheduler;
