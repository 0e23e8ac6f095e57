// Timer-driven round-robin scheduler for the trios kernel core.
//
// Rotation is over terminals, not processes: each terminal contributes the
// deepest live descendant of its root shell, and the snapshot saved on a
// tick belongs to the terminal that was interrupted. The launch/halt
// nesting below stays untouched by the rotation above it.
use super::context::{Continuation, Platform};
use super::{ProcessId, TerminalId, NUM_TERMINALS};
use crate::fs::FileSystem;
use crate::memory;
use crate::syscalls::SyscallError;
use crate::Kernel;

/// Command used to bootstrap every terminal's root shell.
pub const SHELL_COMMAND: &[u8] = b"shell";

/// Per-terminal scheduling state.
#[derive(Debug, Clone, Copy)]
pub struct Terminal {
    /// Whether this terminal's root shell has ever been launched.
    pub started: bool,
    pub root: Option<ProcessId>,
    /// Context of whichever process last owned this terminal's CPU slice.
    pub snapshot: Option<Continuation>,
}

const IDLE: Terminal = Terminal {
    started: false,
    root: None,
    snapshot: None,
};

pub struct Scheduler {
    terminals: [Terminal; NUM_TERMINALS],
    in_service: TerminalId,
    visible: TerminalId,
    ticks: u64,
}

impl Scheduler {
    pub fn new() -> Self {
        Scheduler {
            terminals: [IDLE; NUM_TERMINALS],
            in_service: 0,
            visible: 0,
            ticks: 0,
        }
    }

    /// Terminal whose process currently owns the CPU.
    pub fn in_service(&self) -> TerminalId {
        self.in_service
    }

    /// Terminal whose text is on the real screen.
    pub fn visible(&self) -> TerminalId {
        self.visible
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn terminal(&self, terminal: TerminalId) -> &Terminal {
        &self.terminals[terminal]
    }

    pub(crate) fn terminal_mut(&mut self, terminal: TerminalId) -> &mut Terminal {
        &mut self.terminals[terminal]
    }

    pub(crate) fn set_in_service(&mut self, terminal: TerminalId) {
        self.in_service = terminal;
    }

    pub(crate) fn set_visible(&mut self, terminal: TerminalId) {
        self.visible = terminal;
    }

    pub(crate) fn bump_ticks(&mut self) {
        self.ticks += 1;
    }
}

impl<P: Platform, F: FileSystem> Kernel<P, F> {
    /// Timer interrupt entry point: save the interrupted context, rotate
    /// to the next terminal, and hand it the CPU. Control leaves through
    /// the platform restore, not by returning up the handler.
    pub fn timer_tick(&mut self) {
        let interrupted = Continuation {
            regs: self.platform.capture(),
            mapping: self.mapper.user_entry(),
        };
        let current = self.sched.in_service();
        self.sched.terminal_mut(current).snapshot = Some(interrupted);

        let next = (current + 1) % NUM_TERMINALS;
        self.sched.set_in_service(next);
        self.sched.bump_ticks();
        let visible = self.sched.visible();

        if !self.sched.terminal(next).started {
            // first service of this terminal: run its root shell instead
            // of resuming a snapshot
            self.sched.terminal_mut(next).started = true;
            self.mapper.remap_video(next, visible);
            log::info!("bootstrapping shell on terminal {}", next);
            if let Err(err) = self.launch_on(SHELL_COMMAND, next, None) {
                log::error!("terminal {} shell failed to start: {}", next, err);
            }
            return;
        }

        let Some(pid) = self.runnable_on(next) else {
            log::warn!("terminal {} has no runnable process", next);
            return;
        };
        let Some(snapshot) = self.sched.terminal(next).snapshot else {
            log::warn!("terminal {} has no saved context", next);
            return;
        };

        self.mapper.remap_video(next, visible);
        self.platform
            .load_kernel_stack(memory::kernel_stack_top(pid));
        self.slots.set_current(pid);
        self.mapper.restore(snapshot.mapping);
        self.platform.switch_to(snapshot.regs);
    }

    /// The process terminal `terminal` contributes to the rotation: the
    /// deepest live descendant of its root shell with matching affinity.
    fn runnable_on(&self, terminal: TerminalId) -> Option<ProcessId> {
        let root = self.sched.terminal(terminal).root?;
        if !self.slots.is_occupied(root) {
            return None;
        }
        let mut deepest = root;
        loop {
            let child = self.slots.occupied_ids().find(|id| {
                self.slots
                    .pcb(*id)
                    .map_or(false, |pcb| pcb.parent == Some(deepest) && pcb.terminal == terminal)
            });
            match child {
                Some(id) => deepest = id,
                None => return Some(deepest),
            }
        }
    }

    /// Bring a terminal onto the real screen: park the outgoing text in
    /// its backing page, blit the incoming page in, and re-aim the video
    /// window for whichever terminal is in service.
    pub fn set_visible_terminal(&mut self, terminal: TerminalId) -> Result<(), SyscallError> {
        if terminal >= NUM_TERMINALS {
            return Err(SyscallError::InvalidArgument);
        }
        let old = self.sched.visible();
        if old == terminal {
            return Ok(());
        }
        self.video.lock().swap_visible(old, terminal);
        self.sched.set_visible(terminal);
        let in_service = self.sched.in_service();
        self.mapper.remap_video(in_service, terminal);
        log::info!("terminal {} now visible", terminal);
        Ok(())
    }
}
