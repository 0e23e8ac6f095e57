// Syscall dispatcher for the trios kernel core: process lifecycle plus the
// validating I/O wrappers over the descriptor layer.
use core::fmt;

use x86_64::VirtAddr;

use crate::fd::{DeviceClass, FIRST_DYNAMIC, MAX_DESCRIPTORS};
use crate::fs::{self, FileSystem, NodeHandle, NodeKind, MAX_FILENAME_LEN};
use crate::devices::LINE_BUF_SIZE;
use crate::memory::{
    self, USER_LOAD_OFFSET, USER_REGION_SIZE, USER_STACK_TOP, USER_VIDEO_BASE, USER_VIRTUAL_BASE,
};
use crate::process::context::{Continuation, Platform};
use crate::process::pcb::Pcb;
use crate::process::{ProcessId, TerminalId};
use crate::Kernel;

/// Reserved status delivered when a fault terminates a process. A process
/// reports its own status as 8 bits, so this value is unforgeable.
pub const FAULT_STATUS: u32 = 256;

/// Dispatcher failure taxonomy. Every variant encodes to a distinct
/// negative sentinel for the trap-return path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyscallError {
    /// No free process slot or descriptor slot.
    ResourceExhausted,
    /// Malformed command line, oversized name/argument, bad buffer.
    InvalidArgument,
    /// The named file lacks the executable magic header.
    NotExecutable,
    /// Descriptor index out of range or slot closed.
    BadDescriptor,
    /// Pointer outside the fixed user region.
    InvalidAddress,
}

impl SyscallError {
    pub fn code(self) -> i64 {
        match self {
            SyscallError::ResourceExhausted => -1,
            SyscallError::InvalidArgument => -2,
            SyscallError::NotExecutable => -3,
            SyscallError::BadDescriptor => -4,
            SyscallError::InvalidAddress => -5,
        }
    }
}

impl fmt::Display for SyscallError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SyscallError::ResourceExhausted => write!(f, "resource exhausted"),
            SyscallError::InvalidArgument => write!(f, "invalid argument"),
            SyscallError::NotExecutable => write!(f, "not an executable"),
            SyscallError::BadDescriptor => write!(f, "bad file descriptor"),
            SyscallError::InvalidAddress => write!(f, "invalid address"),
        }
    }
}

/// Encode a dispatcher result for the trap return: the value itself, or
/// the error's negative sentinel.
pub fn encode_result(result: Result<usize, SyscallError>) -> i64 {
    match result {
        Ok(value) => value as i64,
        Err(err) => err.code(),
    }
}

/// Syscall numbers as the trap gate sees them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u64)]
pub enum SyscallNumber {
    Halt = 1,
    Launch = 2,
    Read = 3,
    Write = 4,
    Open = 5,
    Close = 6,
    GetArguments = 7,
    MapVideo = 8,
}

impl TryFrom<u64> for SyscallNumber {
    type Error = SyscallError;

    fn try_from(raw: u64) -> Result<Self, SyscallError> {
        match raw {
            1 => Ok(SyscallNumber::Halt),
            2 => Ok(SyscallNumber::Launch),
            3 => Ok(SyscallNumber::Read),
            4 => Ok(SyscallNumber::Write),
            5 => Ok(SyscallNumber::Open),
            6 => Ok(SyscallNumber::Close),
            7 => Ok(SyscallNumber::GetArguments),
            8 => Ok(SyscallNumber::MapVideo),
            _ => Err(SyscallError::InvalidArgument),
        }
    }
}

/// Split a command line into the program name and the one flat argument
/// string. One space separates them; no further parsing.
pub(crate) fn parse_command(command: &[u8]) -> Result<(&[u8], &[u8]), SyscallError> {
    // the trap glue hands the line over NUL-terminated
    let end = command.iter().position(|b| *b == 0).unwrap_or(command.len());
    let command = &command[..end];

    let split = command.iter().position(|b| *b == b' ');
    let (name, arg) = match split {
        Some(at) => (&command[..at], &command[at + 1..]),
        None => (command, &command[command.len()..]),
    };
    if name.is_empty() || name.len() > MAX_FILENAME_LEN {
        return Err(SyscallError::InvalidArgument);
    }
    if arg.len() > LINE_BUF_SIZE - 1 {
        return Err(SyscallError::InvalidArgument);
    }
    Ok((name, arg))
}

impl<P: Platform, F: FileSystem> Kernel<P, F> {
    /// Launch a program on the caller's terminal. On success control has
    /// already transferred into the new program; the caller's own launch
    /// call completes only when the child chain halts back into it.
    pub fn launch(&mut self, command: &[u8]) -> Result<(), SyscallError> {
        let caller = self.slots.current();
        let terminal = self
            .slots
            .pcb(caller)
            .ok_or(SyscallError::InvalidArgument)?
            .terminal;
        self.launch_on(command, terminal, Some(caller)).map(|_| ())
    }

    /// Shared launch path; `parent == None` creates a terminal root shell.
    pub(crate) fn launch_on(
        &mut self,
        command: &[u8],
        terminal: TerminalId,
        parent: Option<ProcessId>,
    ) -> Result<ProcessId, SyscallError> {
        let (name, arg) = parse_command(command)?;
        let dentry = self
            .fs
            .lookup(name)
            .ok_or(SyscallError::InvalidArgument)?;

        let mut header = [0u8; fs::EXEC_HEADER_LEN];
        let got = self.fs.read(dentry.handle, 0, &mut header);
        let entry = fs::entry_point(&header[..got]).ok_or(SyscallError::NotExecutable)?;

        let id = self
            .slots
            .allocate()
            .ok_or(SyscallError::ResourceExhausted)?;
        let replaced = self.mapper.install(id);

        if let Err(err) = self.load_image(dentry.handle) {
            // roll the slot and mapping back or they leak permanently
            self.mapper.restore(replaced);
            self.slots.free(id);
            return Err(err);
        }

        let parent_context = parent.map(|_| Continuation {
            regs: self.platform.capture(),
            mapping: replaced,
        });

        self.slots
            .store(Pcb::new(id, parent, parent_context, terminal, arg));
        if parent.is_none() {
            self.sched.terminal_mut(terminal).root = Some(id);
        }
        self.slots.set_current(id);
        self.platform.load_kernel_stack(memory::kernel_stack_top(id));

        log::info!(
            "launch {:?} as process {} on terminal {} (entry {:#x})",
            core::str::from_utf8(name).unwrap_or("<binary>"),
            id,
            terminal,
            entry
        );
        self.platform
            .enter_user(VirtAddr::new(u64::from(entry)), VirtAddr::new(USER_STACK_TOP));
        Ok(id)
    }

    /// Stream an image into the freshly installed user region at the fixed
    /// load offset.
    fn load_image(&mut self, handle: NodeHandle) -> Result<(), SyscallError> {
        let limit = (USER_REGION_SIZE - USER_LOAD_OFFSET) as usize;
        let mut chunk = [0u8; 4096];
        let mut offset = 0usize;
        loop {
            let got = self.fs.read(handle, offset, &mut chunk);
            if got == 0 {
                return Ok(());
            }
            if offset + got > limit {
                return Err(SyscallError::NotExecutable);
            }
            self.platform
                .write_user(USER_LOAD_OFFSET + offset as u64, &chunk[..got]);
            offset += got;
            if got < chunk.len() {
                return Ok(());
            }
        }
    }

    /// Terminate the calling process, delivering the zero-extended status
    /// to its launcher. Halting a terminal's root shell is a no-op: a
    /// terminal always keeps a live shell.
    pub fn halt(&mut self, status: u8) -> Result<(), SyscallError> {
        self.halt_with(u32::from(status))
    }

    pub(crate) fn halt_with(&mut self, status: u32) -> Result<(), SyscallError> {
        let id = self.slots.current();
        let (parent, parent_context) = match self.slots.pcb(id) {
            Some(pcb) => (pcb.parent, pcb.parent_context),
            None => return Err(SyscallError::InvalidArgument),
        };
        let Some(parent) = parent else {
            log::info!("root shell on process {} ignored halt", id);
            return Ok(());
        };
        let continuation = parent_context.ok_or(SyscallError::InvalidArgument)?;

        let rtc = self.rtc.clone();
        if let Some(pcb) = self.slots.pcb_mut(id) {
            for index in FIRST_DYNAMIC..MAX_DESCRIPTORS {
                let _ = pcb.fds.release(index, &rtc);
            }
        }

        self.mapper.restore(continuation.mapping);
        self.slots.free(id);
        self.slots.set_current(parent);
        self.platform
            .load_kernel_stack(memory::kernel_stack_top(parent));

        log::info!(
            "process {} halted with status {}, resuming {}",
            id,
            status,
            parent
        );
        self.platform.resume(continuation.regs, status);
        Ok(())
    }

    /// Read through a descriptor. Stream and file classes advance the
    /// cursor by the reported byte count; directories advance one entry.
    pub fn read(&mut self, index: usize, buf: &mut [u8]) -> Result<usize, SyscallError> {
        let Kernel {
            slots,
            fs,
            console,
            rtc,
            ..
        } = self;
        let current = slots.current();
        let pcb = slots
            .pcb_mut(current)
            .ok_or(SyscallError::BadDescriptor)?;
        let terminal = pcb.terminal;
        let desc = pcb.fds.descriptor_mut(index)?;
        match desc.class {
            DeviceClass::StdIn => {
                let got = console.read_line(terminal, buf);
                desc.cursor += got;
                Ok(got)
            }
            DeviceClass::StdOut => Err(SyscallError::InvalidArgument),
            DeviceClass::Regular => {
                let got = fs.read(desc.handle, desc.cursor, buf);
                desc.cursor += got;
                Ok(got)
            }
            DeviceClass::Directory => match fs.lookup_index(desc.cursor) {
                Some(dentry) => {
                    let name = dentry.name_bytes();
                    let cleared = buf.len().min(MAX_FILENAME_LEN + 1);
                    buf[..cleared].fill(0);
                    let got = name.len().min(buf.len());
                    buf[..got].copy_from_slice(&name[..got]);
                    desc.cursor += 1;
                    Ok(got)
                }
                None => {
                    // end of directory: report nothing and start over
                    desc.cursor = 0;
                    Ok(0)
                }
            },
            DeviceClass::RealTimeClock => Ok(rtc.wait_tick()),
        }
    }

    /// Write through a descriptor. No class auto-advances the cursor;
    /// position tracking for writes belongs to the caller.
    pub fn write(&mut self, index: usize, buf: &[u8]) -> Result<usize, SyscallError> {
        let Kernel {
            slots,
            mapper,
            rtc,
            video,
            ..
        } = self;
        let current = slots.current();
        let pcb = slots
            .pcb_mut(current)
            .ok_or(SyscallError::BadDescriptor)?;
        let desc = pcb.fds.descriptor_mut(index)?;
        match desc.class {
            DeviceClass::StdOut => {
                let frame = mapper.video_frame();
                let mut pages = video.lock();
                Ok(pages.buffer_mut(frame).write_bytes(buf))
            }
            DeviceClass::RealTimeClock => {
                rtc.set_frequency(buf)?;
                Ok(0)
            }
            DeviceClass::StdIn | DeviceClass::Regular | DeviceClass::Directory => {
                Err(SyscallError::InvalidArgument)
            }
        }
    }

    /// Resolve a name and bind it to the first free dynamic descriptor.
    pub fn open(&mut self, name: &[u8]) -> Result<usize, SyscallError> {
        let Kernel {
            slots, fs, rtc, ..
        } = self;
        let dentry = fs.lookup(name).ok_or(SyscallError::InvalidArgument)?;
        let current = slots.current();
        let pcb = slots
            .pcb_mut(current)
            .ok_or(SyscallError::BadDescriptor)?;
        let index = pcb
            .fds
            .first_free()
            .ok_or(SyscallError::ResourceExhausted)?;
        let class = match dentry.kind {
            NodeKind::RealTimeClock => {
                rtc.open();
                DeviceClass::RealTimeClock
            }
            NodeKind::Directory => DeviceClass::Directory,
            NodeKind::Regular => DeviceClass::Regular,
        };
        pcb.fds.bind(index, class, dentry.handle);
        Ok(index)
    }

    /// Close a dynamic descriptor. Slots 0 and 1 are bound for the life of
    /// the process and cannot be closed.
    pub fn close(&mut self, index: usize) -> Result<(), SyscallError> {
        if index < FIRST_DYNAMIC {
            return Err(SyscallError::BadDescriptor);
        }
        let rtc = self.rtc.clone();
        let current = self.slots.current();
        let pcb = self
            .slots
            .pcb_mut(current)
            .ok_or(SyscallError::BadDescriptor)?;
        pcb.fds.release(index, &rtc)
    }

    /// Copy the launch argument into `buf`, terminated. Fails when no
    /// argument was supplied or the buffer cannot hold argument plus
    /// terminator.
    pub fn get_arguments(&self, buf: &mut [u8]) -> Result<(), SyscallError> {
        let current = self.slots.current();
        let pcb = self
            .slots
            .pcb(current)
            .ok_or(SyscallError::InvalidArgument)?;
        if pcb.arg_len == 0 || buf.len() < pcb.arg_len {
            return Err(SyscallError::InvalidArgument);
        }
        buf.fill(0);
        buf[..pcb.arg_len - 1].copy_from_slice(&pcb.arg[..pcb.arg_len - 1]);
        Ok(())
    }

    /// Map the video window for the caller and hand back the fixed
    /// user-visible address. The destination pointer must itself lie in
    /// the user region; nothing is remapped otherwise.
    pub fn map_video(&mut self, dest: u64) -> Result<VirtAddr, SyscallError> {
        if dest < USER_VIRTUAL_BASE || dest >= USER_VIRTUAL_BASE + USER_REGION_SIZE {
            return Err(SyscallError::InvalidAddress);
        }
        let current = self.slots.current();
        let terminal = self
            .slots
            .pcb(current)
            .ok_or(SyscallError::InvalidArgument)?
            .terminal;
        self.mapper.remap_video(terminal, self.sched.visible());
        Ok(VirtAddr::new(USER_VIDEO_BASE))
    }
}
