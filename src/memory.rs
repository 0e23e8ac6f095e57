// Virtual memory mapper for the trios kernel core.
//
// Two shared entries cover all per-process mapping: one large-page
// directory entry at the fixed user base, repointed to a different physical
// frame for whichever process holds the CPU, and one video-window entry
// repointed between real text memory and the per-terminal backing pages.
// Both words live only inside `Mapper`; every rewrite flushes the
// translation cache.
use x86_64::structures::paging::PageTableFlags;
use x86_64::VirtAddr;

use crate::process::{ProcessId, TerminalId};

/// Virtual base of the shared user region.
pub const USER_VIRTUAL_BASE: u64 = 0x0800_0000;
/// Size of the user region; one large page.
pub const USER_REGION_SIZE: u64 = 0x0040_0000;
/// Physical frames for user regions start here, one per process id.
pub const USER_FRAME_BASE: u64 = 0x0080_0000;
/// Executable images load at this offset within the user region.
pub const USER_LOAD_OFFSET: u64 = 0x0004_8000;
/// Initial user stack pointer, just under the top of the region.
pub const USER_STACK_TOP: u64 = USER_VIRTUAL_BASE + USER_REGION_SIZE - 4;
/// Fixed user-visible address handed out by map_video.
pub const USER_VIDEO_BASE: u64 = 0x4000_0000;
/// Physical text-mode video memory.
pub const VIDEO_MEMORY: u64 = 0xB8000;
/// Size of the video window and of each terminal backing page.
pub const VIDEO_PAGE_SIZE: u64 = 0x1000;
/// Kernel stacks descend from the top of the kernel region.
pub const KERNEL_REGION_TOP: u64 = 0x0080_0000;
/// Each process owns one fixed kernel stack of this size.
pub const KERNEL_STACK_SIZE: u64 = 0x2000;

/// One page-directory or page-table entry word: a frame base in the high
/// bits, attribute flags in the low twelve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MappingValue(u64);

impl MappingValue {
    /// Entry for a process's user region: present, writable, user, large.
    pub fn user_region(frame_base: u64) -> Self {
        let flags = PageTableFlags::PRESENT
            | PageTableFlags::WRITABLE
            | PageTableFlags::USER_ACCESSIBLE
            | PageTableFlags::HUGE_PAGE;
        MappingValue(frame_base | flags.bits())
    }

    /// Entry for the video window: present, writable, user.
    pub fn video_page(page_base: u64) -> Self {
        let flags = PageTableFlags::PRESENT
            | PageTableFlags::WRITABLE
            | PageTableFlags::USER_ACCESSIBLE;
        MappingValue(page_base | flags.bits())
    }

    /// A not-present entry, as the directory is initialized at boot.
    pub fn absent() -> Self {
        MappingValue(PageTableFlags::WRITABLE.bits())
    }

    pub fn frame_base(self) -> u64 {
        self.0 & !0xFFF
    }

    pub fn flags(self) -> PageTableFlags {
        PageTableFlags::from_bits_truncate(self.0)
    }

    pub fn bits(self) -> u64 {
        self.0
    }
}

/// Physical frame backing process `id`'s user region.
pub fn user_frame(id: ProcessId) -> u64 {
    USER_FRAME_BASE + id as u64 * USER_REGION_SIZE
}

/// Backing page holding terminal `terminal`'s off-screen text.
pub fn backing_page(terminal: TerminalId) -> u64 {
    VIDEO_MEMORY + (terminal as u64 + 1) * VIDEO_PAGE_SIZE
}

/// Top of process `id`'s fixed kernel stack.
pub fn kernel_stack_top(id: ProcessId) -> VirtAddr {
    VirtAddr::new(KERNEL_REGION_TOP - id as u64 * KERNEL_STACK_SIZE)
}

/// Owner of the two shared mapping entries. "Map region X to frame Y for
/// this scheduling slice" goes through here and nowhere else.
pub struct Mapper {
    user_entry: MappingValue,
    video_entry: MappingValue,
    tlb_flushes: u64,
}

impl Mapper {
    pub fn new() -> Self {
        Mapper {
            user_entry: MappingValue::absent(),
            video_entry: MappingValue::video_page(VIDEO_MEMORY),
            tlb_flushes: 0,
        }
    }

    /// Point the user region at process `id`'s frame. Returns the value
    /// that was replaced so launch can record it for restore-on-halt.
    pub fn install(&mut self, id: ProcessId) -> MappingValue {
        let replaced = self.user_entry;
        self.user_entry = MappingValue::user_region(user_frame(id));
        self.flush_tlb();
        replaced
    }

    /// Write back a previously captured user-region value.
    pub fn restore(&mut self, value: MappingValue) {
        self.user_entry = value;
        self.flush_tlb();
    }

    /// Aim the video window: the real screen when `target` is the visible
    /// terminal, its backing page otherwise.
    pub fn remap_video(&mut self, target: TerminalId, visible: TerminalId) {
        self.video_entry = if target != visible {
            MappingValue::video_page(backing_page(target))
        } else {
            MappingValue::video_page(VIDEO_MEMORY)
        };
        self.flush_tlb();
    }

    pub fn user_entry(&self) -> MappingValue {
        self.user_entry
    }

    pub fn video_entry(&self) -> MappingValue {
        self.video_entry
    }

    /// Physical page the video window currently resolves to.
    pub fn video_frame(&self) -> u64 {
        self.video_entry.frame_base()
    }

    pub fn tlb_flushes(&self) -> u64 {
        self.tlb_flushes
    }

    fn flush_tlb(&mut self) {
        // A bare-metal port reloads CR3 here; the count keeps the
        // flush-after-every-change rule observable.
        self.tlb_flushes += 1;
        log::trace!("translation cache flushed ({})", self.tlb_flushes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn install_targets_the_per_process_frame() {
        let mut mapper = Mapper::new();
        mapper.install(3);
        let entry = mapper.user_entry();
        assert_eq!(entry.frame_base(), USER_FRAME_BASE + 3 * USER_REGION_SIZE);
        assert!(entry.flags().contains(
            PageTableFlags::PRESENT
                | PageTableFlags::WRITABLE
                | PageTableFlags::USER_ACCESSIBLE
                | PageTableFlags::HUGE_PAGE
        ));
    }

    #[test]
    fn restore_round_trips_exactly() {
        let mut mapper = Mapper::new();
        let before = mapper.user_entry();
        let replaced = mapper.install(1);
        assert_eq!(replaced, before);
        mapper.restore(replaced);
        assert_eq!(mapper.user_entry(), before);
    }

    #[test]
    fn every_rewrite_flushes() {
        let mut mapper = Mapper::new();
        let start = mapper.tlb_flushes();
        mapper.install(0);
        mapper.remap_video(1, 0);
        mapper.restore(MappingValue::absent());
        assert_eq!(mapper.tlb_flushes(), start + 3);
    }

    #[test]
    fn video_window_follows_visibility() {
        let mut mapper = Mapper::new();
        mapper.remap_video(2, 0);
        assert_eq!(mapper.video_frame(), backing_page(2));
        mapper.remap_video(0, 0);
        assert_eq!(mapper.video_frame(), VIDEO_MEMORY);
    }

    #[test]
    fn kernel_stacks_descend_by_id() {
        assert_eq!(kernel_stack_top(0).as_u64(), KERNEL_REGION_TOP);
        assert_eq!(
            kernel_stack_top(5).as_u64(),
            KERNEL_REGION_TOP - 5 * KERNEL_STACK_SIZE
        );
    }
}
