use core::{fmt, ptr::addr_of_mut, slice};

pub const VIDEO_MEMORY_BASE: usize = 0xb8000;
pub const VIDEO_MEMORY_COLS: usize = 80;
pub const VIDEO_MEMORY_LINES: usize = 25;
pub const VIDEO_MEMORY_SIZE: usize = VIDEO_MEMORY_COLS * VIDEO_MEMORY_LINES;

#[allow(dead_code)]
#[derive(Clone, Copy)]
pub enum Colour {
    Black = 0,
    Blue = 1,
    Green = 2,
    Cyan = 3,
    Red = 4,
    Purple = 5,
    Brown = 6,
    Gray = 7,
    DarkGray = 8,
    LightBlue = 9,
    LightGreen = 10,
    LightCyan = 11,
    LightRed = 12,
    LightPurple = 13,
    Yellow = 14,
    White = 15,
}

#[derive(Clone, Copy)]
#[repr(transparent)]
pub struct Attribute(u8);

impl Attribute {
    pub const fn new(fg: Colour, bg: Colour) -> Self {
        const MASK_3: u8 = (1 << 3) - 1;
        Self((((bg as u8) & MASK_3) << 4) | (fg as u8))
    }
}

#[derive(Clone, Copy)]
#[repr(C)]
struct Character {
    ascii: u8,
    attribute: Attribute,
}

fn cells() -> &'static mut [Character] {
    // SAFETY: The text buffer is identity mapped and only touched from the
    // single kernel context.
    unsafe { slice::from_raw_parts_mut(VIDEO_MEMORY_BASE as *mut Character, VIDEO_MEMORY_SIZE) }
}

pub struct VideoMemoryWriter {
    pub cursor: usize,
    pub attribute: Attribute,
}

impl VideoMemoryWriter {
    const fn new() -> Self {
        Self {
            cursor: 0,
            attribute: Attribute::new(Colour::White, Colour::Black),
        }
    }

    pub fn clear(&mut self) {
        let blank = Character {
            ascii: b' ',
            attribute: Attribute::new(Colour::Gray, Colour::Black),
        };
        cells().fill(blank);
        self.cursor = 0;
    }

    /// Writes `message` at the start of `line` without moving the cursor.
    /// Used for status lines that must stay put while the console scrolls.
    pub fn write_status(&mut self, line: usize, message: &str, attribute: Attribute) {
        let line = line.min(VIDEO_MEMORY_LINES - 1);
        let start = line * VIDEO_MEMORY_COLS;
        let cells = &mut cells()[start..start + VIDEO_MEMORY_COLS];
        for (cell, b) in cells.iter_mut().zip(message.bytes()) {
            *cell = Character {
                ascii: b,
                attribute,
            };
        }
    }

    fn scroll(&mut self) {
        let video_memory = cells();
        video_memory.copy_within(VIDEO_MEMORY_COLS..VIDEO_MEMORY_SIZE, 0);
        let blank = Character {
            ascii: b' ',
            attribute: self.attribute,
        };
        video_memory[VIDEO_MEMORY_SIZE - VIDEO_MEMORY_COLS..].fill(blank);
        self.cursor = VIDEO_MEMORY_SIZE - VIDEO_MEMORY_COLS;
    }
}

impl fmt::Write for VideoMemoryWriter {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for b in s.bytes() {
            if self.cursor >= VIDEO_MEMORY_SIZE {
                self.scroll();
            }

            if b == b'\n' {
                self.cursor = (self.cursor / VIDEO_MEMORY_COLS + 1) * VIDEO_MEMORY_COLS;
                continue;
            }

            cells()[self.cursor] = Character {
                ascii: b,
                attribute: self.attribute,
            };
            self.cursor += 1;
        }

        Ok(())
    }
}

static mut VIDEO_MEMORY_WRITER: VideoMemoryWriter = VideoMemoryWriter::new();

/// # Safety
///
/// Only one reference may be live at a time.
pub unsafe fn writer() -> &'static mut VideoMemoryWriter {
    &mut *addr_of_mut!(VIDEO_MEMORY_WRITER)
}
