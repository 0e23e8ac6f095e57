// Text-mode video window for the trios kernel core.
//
// One live screen plus one backing page per terminal. Writes land in
// whichever page the mapper's video-window entry currently resolves to, so
// a background terminal keeps printing into its own page and a visible one
// draws straight to the screen.
use alloc::string::String;
use core::array;

use volatile::Volatile;

use crate::memory::{self, VIDEO_MEMORY};
use crate::process::{TerminalId, NUM_TERMINALS};

pub const BUFFER_WIDTH: usize = 80;
pub const BUFFER_HEIGHT: usize = 25;

const DEFAULT_COLOR: u8 = 0x07; // light grey on black

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C)]
struct ScreenChar {
    ascii: u8,
    color: u8,
}

const BLANK: ScreenChar = ScreenChar {
    ascii: b' ',
    color: DEFAULT_COLOR,
};

/// One 80x25 page of text cells with its own cursor position.
pub struct TextBuffer {
    chars: [[Volatile<ScreenChar>; BUFFER_WIDTH]; BUFFER_HEIGHT],
    row: usize,
    col: usize,
}

impl TextBuffer {
    fn new() -> Self {
        TextBuffer {
            chars: array::from_fn(|_| array::from_fn(|_| Volatile::new(BLANK))),
            row: 0,
            col: 0,
        }
    }

    pub fn write_byte(&mut self, byte: u8) {
        match byte {
            b'\n' => self.new_line(),
            byte => {
                if self.col >= BUFFER_WIDTH {
                    self.new_line();
                }
                self.chars[self.row][self.col].write(ScreenChar {
                    ascii: byte,
                    color: DEFAULT_COLOR,
                });
                self.col += 1;
            }
        }
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> usize {
        for byte in bytes {
            self.write_byte(*byte);
        }
        bytes.len()
    }

    fn new_line(&mut self) {
        self.col = 0;
        if self.row + 1 < BUFFER_HEIGHT {
            self.row += 1;
            return;
        }
        for row in 1..BUFFER_HEIGHT {
            for col in 0..BUFFER_WIDTH {
                let ch = self.chars[row][col].read();
                self.chars[row - 1][col].write(ch);
            }
        }
        for col in 0..BUFFER_WIDTH {
            self.chars[BUFFER_HEIGHT - 1][col].write(BLANK);
        }
    }

    pub fn clear(&mut self) {
        for row in 0..BUFFER_HEIGHT {
            for col in 0..BUFFER_WIDTH {
                self.chars[row][col].write(BLANK);
            }
        }
        self.row = 0;
        self.col = 0;
    }

    fn copy_from(&mut self, other: &TextBuffer) {
        for row in 0..BUFFER_HEIGHT {
            for col in 0..BUFFER_WIDTH {
                self.chars[row][col].write(other.chars[row][col].read());
            }
        }
        self.row = other.row;
        self.col = other.col;
    }

    /// Text of one row with trailing blanks trimmed.
    pub fn line(&self, row: usize) -> String {
        let mut text = String::new();
        for col in 0..BUFFER_WIDTH {
            text.push(self.chars[row][col].read().ascii as char);
        }
        text.trim_end().into()
    }

    pub fn cursor(&self) -> (usize, usize) {
        (self.row, self.col)
    }
}

/// The screen and the three terminal backing pages.
pub struct VideoMemory {
    screen: TextBuffer,
    backing: [TextBuffer; NUM_TERMINALS],
}

impl VideoMemory {
    pub fn new() -> Self {
        VideoMemory {
            screen: TextBuffer::new(),
            backing: array::from_fn(|_| TextBuffer::new()),
        }
    }

    /// Page a video-window frame address resolves to.
    pub fn buffer_mut(&mut self, frame: u64) -> &mut TextBuffer {
        if frame == VIDEO_MEMORY {
            return &mut self.screen;
        }
        for terminal in 0..NUM_TERMINALS {
            if frame == memory::backing_page(terminal) {
                return &mut self.backing[terminal];
            }
        }
        log::warn!("video window aimed at unknown frame {:#x}", frame);
        &mut self.screen
    }

    pub fn screen(&self) -> &TextBuffer {
        &self.screen
    }

    pub fn backing(&self, terminal: TerminalId) -> &TextBuffer {
        &self.backing[terminal]
    }

    /// Terminal switch: park the outgoing terminal's screen in its backing
    /// page and bring the incoming terminal's page onto the screen.
    pub fn swap_visible(&mut self, old: TerminalId, new: TerminalId) {
        if old == new {
            return;
        }
        let VideoMemory { screen, backing } = self;
        backing[old].copy_from(screen);
        screen.copy_from(&backing[new]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_advance_and_wrap() {
        let mut buf = TextBuffer::new();
        buf.write_bytes(b"hi\nthere");
        assert_eq!(buf.line(0), "hi");
        assert_eq!(buf.line(1), "there");
        assert_eq!(buf.cursor(), (1, 5));
    }

    #[test]
    fn full_screen_scrolls() {
        let mut buf = TextBuffer::new();
        for i in 0..BUFFER_HEIGHT {
            buf.write_bytes(alloc::format!("row{}\n", i).as_bytes());
        }
        // row0 scrolled off; the last written row sits one above the bottom
        assert_eq!(buf.line(0), "row1");
        assert_eq!(buf.line(BUFFER_HEIGHT - 2), alloc::format!("row{}", BUFFER_HEIGHT - 1));
        assert_eq!(buf.line(BUFFER_HEIGHT - 1), "");
    }

    #[test]
    fn swap_parks_and_restores_pages() {
        let mut video = VideoMemory::new();
        video.buffer_mut(VIDEO_MEMORY).write_bytes(b"terminal zero");
        video
            .buffer_mut(memory::backing_page(1))
            .write_bytes(b"terminal one");
        video.swap_visible(0, 1);
        assert_eq!(video.screen().line(0), "terminal one");
        assert_eq!(video.backing(0).line(0), "terminal zero");
    }
}
