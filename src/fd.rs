// File descriptor layer for the trios kernel core.
//
// The operation table is a tagged variant: every descriptor carries the
// device class it was opened against, and the dispatcher routes each
// open/close/read/write through the class. The open flag is the sole
// source of truth for descriptor validity.
use crate::devices::RtcClock;
use crate::fs::NodeHandle;
use crate::syscalls::SyscallError;

/// Descriptors per process.
pub const MAX_DESCRIPTORS: usize = 8;
/// Slots 0 and 1 are stdin/stdout; dynamic assignment starts here.
pub const FIRST_DYNAMIC: usize = 2;

/// Device classes answering the uniform open/close/read/write contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceClass {
    StdIn,
    StdOut,
    Regular,
    Directory,
    RealTimeClock,
}

#[derive(Debug, Clone, Copy)]
pub struct FileDescriptor {
    pub class: DeviceClass,
    pub handle: NodeHandle,
    /// Byte cursor for file reads, entry ordinal for directory reads.
    /// Reads advance it; writes never do.
    pub cursor: usize,
    pub open: bool,
}

const CLOSED: FileDescriptor = FileDescriptor {
    class: DeviceClass::StdIn,
    handle: 0,
    cursor: 0,
    open: false,
};

/// Fixed 8-entry descriptor array held in each PCB.
#[derive(Debug, Clone, Copy)]
pub struct FdTable {
    entries: [FileDescriptor; MAX_DESCRIPTORS],
}

impl FdTable {
    /// Fresh table with stdin/stdout bound, as every launch leaves it.
    pub fn with_stdio() -> Self {
        let mut table = FdTable {
            entries: [CLOSED; MAX_DESCRIPTORS],
        };
        table.bind(0, DeviceClass::StdIn, 0);
        table.bind(1, DeviceClass::StdOut, 0);
        table
    }

    pub fn bind(&mut self, index: usize, class: DeviceClass, handle: NodeHandle) {
        self.entries[index] = FileDescriptor {
            class,
            handle,
            cursor: 0,
            open: true,
        };
    }

    /// Close a descriptor: run the class close hook, then clear the open
    /// flag regardless of the hook's outcome.
    pub fn release(&mut self, index: usize, rtc: &RtcClock) -> Result<(), SyscallError> {
        let desc = self.descriptor_mut(index)?;
        if desc.class == DeviceClass::RealTimeClock {
            if let Err(err) = rtc.close() {
                log::warn!("rtc close hook failed on fd {}: {}", index, err);
            }
        }
        desc.open = false;
        Ok(())
    }

    pub fn descriptor(&self, index: usize) -> Result<&FileDescriptor, SyscallError> {
        match self.entries.get(index) {
            Some(desc) if desc.open => Ok(desc),
            _ => Err(SyscallError::BadDescriptor),
        }
    }

    pub fn descriptor_mut(&mut self, index: usize) -> Result<&mut FileDescriptor, SyscallError> {
        match self.entries.get_mut(index) {
            Some(desc) if desc.open => Ok(desc),
            _ => Err(SyscallError::BadDescriptor),
        }
    }

    /// Lowest free dynamic slot.
    pub fn first_free(&self) -> Option<usize> {
        (FIRST_DYNAMIC..MAX_DESCRIPTORS).find(|index| !self.entries[*index].open)
    }

    pub fn is_open(&self, index: usize) -> bool {
        index < MAX_DESCRIPTORS && self.entries[index].open
    }
}
