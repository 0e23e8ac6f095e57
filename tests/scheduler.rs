// Round-robin rotation, lazy shell bootstrap, and video-window behavior.
mod common;

use common::{boot, SHELL_ENTRY};
use trios::memory::{self, USER_STACK_TOP, VIDEO_MEMORY};
use trios::syscalls::SyscallError;
use trios::NUM_TERMINALS;

#[test]
fn first_two_ticks_bootstrap_the_other_shells() {
    let mut kernel = boot();
    assert_eq!(kernel.platform().entered.len(), 1);

    kernel.timer_tick();
    assert_eq!(kernel.scheduler().in_service(), 1);
    assert_eq!(kernel.platform().entered.len(), 2);
    assert_eq!(
        kernel.platform().entered[1],
        (u64::from(SHELL_ENTRY), USER_STACK_TOP)
    );

    kernel.timer_tick();
    assert_eq!(kernel.scheduler().in_service(), 2);
    assert_eq!(kernel.platform().entered.len(), 3);

    // all three root shells are distinct live processes now
    assert_eq!(kernel.slot_table().occupied_count(), 3);
    for terminal in 0..NUM_TERMINALS {
        assert!(kernel.scheduler().terminal(terminal).root.is_some());
    }
}

#[test]
fn third_tick_resumes_terminal_zero_from_its_snapshot() {
    let mut kernel = boot();
    kernel.timer_tick();
    kernel.timer_tick();

    // the snapshot for terminal 0 was captured on the first tick
    let saved = kernel.scheduler().terminal(0).snapshot.unwrap();
    kernel.timer_tick();

    assert_eq!(kernel.scheduler().in_service(), 0);
    assert_eq!(kernel.slot_table().current(), 0);
    assert_eq!(kernel.platform().switched.last(), Some(&saved.regs));
    assert_eq!(kernel.mapper().user_entry(), saved.mapping);
    assert_eq!(
        kernel.platform().kernel_stacks.last(),
        Some(&memory::kernel_stack_top(0).as_u64())
    );
}

#[test]
fn rotation_services_every_terminal_equally() {
    let mut kernel = boot();
    kernel.timer_tick();
    kernel.timer_tick();

    let k = 40;
    let mut serviced = [0usize; NUM_TERMINALS];
    for _ in 0..NUM_TERMINALS * k {
        kernel.timer_tick();
        serviced[kernel.scheduler().in_service()] += 1;
    }
    for terminal in 0..NUM_TERMINALS {
        assert!(serviced[terminal] >= k);
    }
}

#[test]
fn snapshots_belong_to_terminals_not_processes() {
    let mut kernel = boot();
    kernel.timer_tick();
    kernel.timer_tick();
    kernel.timer_tick(); // back on terminal 0

    // a child takes over terminal 0's slice
    kernel.launch(b"cat").unwrap();
    let child = kernel.slot_table().current();

    kernel.timer_tick(); // interrupts the child, saves into terminal 0
    let snapshot = kernel.scheduler().terminal(0).snapshot.unwrap();
    assert_eq!(snapshot.regs, *kernel.platform().captured.last().unwrap());

    // rotate back around: terminal 0 must resume its deepest descendant
    kernel.timer_tick();
    kernel.timer_tick();
    assert_eq!(kernel.scheduler().in_service(), 0);
    assert_eq!(kernel.slot_table().current(), child);
    assert_eq!(
        kernel.platform().kernel_stacks.last(),
        Some(&memory::kernel_stack_top(child).as_u64())
    );
    assert_eq!(kernel.platform().switched.last(), Some(&snapshot.regs));
}

#[test]
fn background_terminals_write_to_their_backing_pages() {
    let mut kernel = boot();
    kernel.timer_tick(); // terminal 1 in service, terminal 0 visible
    assert_eq!(kernel.mapper().video_frame(), memory::backing_page(1));

    kernel.write(1, b"from terminal one").unwrap();
    let video = kernel.video_handle();
    assert_eq!(video.lock().backing(1).line(0), "from terminal one");
    assert_eq!(video.lock().screen().line(0), "");
}

#[test]
fn visible_terminal_writes_to_the_screen() {
    let mut kernel = boot();
    kernel.timer_tick();
    kernel.timer_tick();
    kernel.timer_tick(); // terminal 0 in service and visible
    assert_eq!(kernel.mapper().video_frame(), VIDEO_MEMORY);

    kernel.write(1, b"hello").unwrap();
    let video = kernel.video_handle();
    assert_eq!(video.lock().screen().line(0), "hello");
}

#[test]
fn switching_visibility_swaps_the_pages() {
    let mut kernel = boot();
    kernel.timer_tick();
    kernel.write(1, b"terminal one text").unwrap();

    kernel.set_visible_terminal(1).unwrap();
    assert_eq!(kernel.scheduler().visible(), 1);
    let video = kernel.video_handle();
    assert_eq!(video.lock().screen().line(0), "terminal one text");
    // the in-service terminal (1) is now the visible one, so its window
    // aims at the real screen
    assert_eq!(kernel.mapper().video_frame(), VIDEO_MEMORY);

    assert_eq!(
        kernel.set_visible_terminal(NUM_TERMINALS),
        Err(SyscallError::InvalidArgument)
    );
}
