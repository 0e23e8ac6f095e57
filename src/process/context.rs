// Execution contexts and the platform boundary for the trios kernel core.
//
// A suspended execution is a captured frame/stack register pair plus the
// user-region mapping that was in force. Launch pushes one of these per
// nesting level (held in the child PCB), the timer keeps one per terminal;
// together they replace raw register scribbling with explicit
// continuations. Only `Platform` implementations touch real registers.
use x86_64::VirtAddr;

use crate::memory::MappingValue;

/// Saved frame/stack pointer pair for one suspended execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TaskContext {
    pub frame: u64,
    pub stack: u64,
}

/// A captured continuation: registers plus the shared user mapping that
/// must be reinstalled before the owner runs again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Continuation {
    pub regs: TaskContext,
    pub mapping: MappingValue,
}

/// The hardware operations the core needs and nothing more. A bare-metal
/// implementation backs these with register moves, an IRET frame and the
/// task register; `resume`, `switch_to` and `enter_user` then never return
/// to their caller. Hosted implementations (tests) record the calls and do
/// return, which is why the dispatcher treats "transferred" as `Ok(())`.
pub trait Platform {
    /// Snapshot the current frame/stack pointers.
    fn capture(&mut self) -> TaskContext;

    /// Restore a launcher's registers, delivering `status` as the return
    /// value of its launch call.
    fn resume(&mut self, regs: TaskContext, status: u32);

    /// Restore a timer snapshot without a return value.
    fn switch_to(&mut self, regs: TaskContext);

    /// Build the interrupt-return frame (user stack, interrupts-enabled
    /// flags, user code segment, entry address) and drop to user mode.
    fn enter_user(&mut self, entry: VirtAddr, user_stack: VirtAddr);

    /// Point the task register's privilege-0 stack at `stack_top`.
    fn load_kernel_stack(&mut self, stack_top: VirtAddr);

    /// Store bytes at `offset` within the currently installed user region.
    /// Hardware-dependent because the store goes through the live mapping.
    fn write_user(&mut self, offset: u64, bytes: &[u8]);
}
