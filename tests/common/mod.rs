// Shared test rig: a recording platform and an in-memory filesystem.
#![allow(dead_code)]

use trios::fs::{Dentry, FileSystem, NodeHandle, NodeKind, MAX_FILENAME_LEN};
use trios::fs::{ENTRY_POINT_OFFSET, EXEC_HEADER_LEN, EXEC_MAGIC};
use trios::process::context::{Platform, TaskContext};
use trios::Kernel;
use x86_64::VirtAddr;

/// Platform that records every hardware operation instead of performing
/// it. `capture` hands out strictly increasing context ids so tests can
/// tell continuations apart.
#[derive(Default)]
pub struct MockPlatform {
    next_context: u64,
    pub captured: Vec<TaskContext>,
    pub entered: Vec<(u64, u64)>,
    pub resumed: Vec<(TaskContext, u32)>,
    pub switched: Vec<TaskContext>,
    pub kernel_stacks: Vec<u64>,
    pub user_bytes: usize,
}

impl Platform for MockPlatform {
    fn capture(&mut self) -> TaskContext {
        self.next_context += 1;
        let context = TaskContext {
            frame: self.next_context,
            stack: self.next_context,
        };
        self.captured.push(context);
        context
    }

    fn resume(&mut self, regs: TaskContext, status: u32) {
        self.resumed.push((regs, status));
    }

    fn switch_to(&mut self, regs: TaskContext) {
        self.switched.push(regs);
    }

    fn enter_user(&mut self, entry: VirtAddr, user_stack: VirtAddr) {
        self.entered.push((entry.as_u64(), user_stack.as_u64()));
    }

    fn load_kernel_stack(&mut self, stack_top: VirtAddr) {
        self.kernel_stacks.push(stack_top.as_u64());
    }

    fn write_user(&mut self, _offset: u64, bytes: &[u8]) {
        self.user_bytes += bytes.len();
    }
}

pub struct MemFs {
    entries: Vec<(Vec<u8>, NodeKind, Vec<u8>)>,
}

impl MemFs {
    pub fn new() -> Self {
        MemFs {
            entries: Vec::new(),
        }
    }

    pub fn add(&mut self, name: &[u8], kind: NodeKind, data: Vec<u8>) {
        self.entries.push((name.to_vec(), kind, data));
    }
}

impl FileSystem for MemFs {
    fn lookup(&self, name: &[u8]) -> Option<Dentry> {
        self.entries
            .iter()
            .position(|(entry_name, _, _)| entry_name.as_slice() == name)
            .and_then(|index| self.lookup_index(index))
    }

    fn lookup_index(&self, index: usize) -> Option<Dentry> {
        let (name, kind, _) = self.entries.get(index)?;
        let mut name_buf = [0u8; MAX_FILENAME_LEN];
        let name_len = name.len().min(MAX_FILENAME_LEN);
        name_buf[..name_len].copy_from_slice(&name[..name_len]);
        Some(Dentry {
            name: name_buf,
            name_len,
            kind: *kind,
            handle: index as NodeHandle,
        })
    }

    fn read(&self, handle: NodeHandle, offset: usize, buf: &mut [u8]) -> usize {
        let Some((_, _, data)) = self.entries.get(handle as usize) else {
            return 0;
        };
        if offset >= data.len() {
            return 0;
        }
        let n = (data.len() - offset).min(buf.len());
        buf[..n].copy_from_slice(&data[offset..offset + n]);
        n
    }
}

/// Minimal executable image: magic header, entry point, a little payload.
pub fn exec_image(entry: u32) -> Vec<u8> {
    let mut image = vec![0u8; EXEC_HEADER_LEN + 24];
    image[..4].copy_from_slice(&EXEC_MAGIC);
    image[ENTRY_POINT_OFFSET..ENTRY_POINT_OFFSET + 4].copy_from_slice(&entry.to_le_bytes());
    image
}

pub const SHELL_ENTRY: u32 = 0x0804_8018;
pub const CAT_ENTRY: u32 = 0x0804_9020;

pub fn fixture_fs() -> MemFs {
    let mut fs = MemFs::new();
    fs.add(b".", NodeKind::Directory, Vec::new());
    fs.add(b"shell", NodeKind::Regular, exec_image(SHELL_ENTRY));
    fs.add(b"cat", NodeKind::Regular, exec_image(CAT_ENTRY));
    fs.add(b"rtc", NodeKind::RealTimeClock, Vec::new());
    fs.add(
        b"frame0.txt",
        NodeKind::Regular,
        b"a fish swims by".to_vec(),
    );
    fs.add(b"frame1.txt", NodeKind::Regular, b"another frame".to_vec());
    fs
}

/// Kernel with the fixture filesystem and terminal 0's shell running.
pub fn boot() -> Kernel<MockPlatform, MemFs> {
    let mut kernel = Kernel::new(MockPlatform::default(), fixture_fs());
    kernel.start().expect("terminal 0 shell should launch");
    kernel
}
