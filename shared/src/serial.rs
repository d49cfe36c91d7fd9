use core::{arch::asm, fmt, ptr::addr_of_mut};

const IO_BASE: u16 = 0x3f8; // COM1
const RBR: u16 = IO_BASE; // Receiver Buffer Reg (read-only)
const THR: u16 = IO_BASE; // Transmitter Holding Reg (write-only)
const DLL: u16 = IO_BASE; // Divisor Latch Low (while DLAB is set)
const IER: u16 = IO_BASE + 1; // Interrupt Enable Reg
const FCR: u16 = IO_BASE + 2; // FIFO Control Reg (write-only)
const LCR: u16 = IO_BASE + 3; // Line Control Register
const MCR: u16 = IO_BASE + 4; // MODEM Control Register
const LSR: u16 = IO_BASE + 5; // Line Status Register (read-only)

const LSR_THR_EMPTY: u8 = 0x20;

/// # Safety
///
/// Writing to an arbitrary I/O port can do anything the device behind it does.
pub unsafe fn outb(port: u16, byte: u8) {
    asm!("out dx, al", in("dx") port, in("al") byte, options(nomem, nostack, preserves_flags));
}

/// # Safety
///
/// See [`outb`].
pub unsafe fn inb(port: u16) -> u8 {
    let res: u8;
    asm!("in al, dx", in("dx") port, out("al") res, options(nomem, nostack, preserves_flags));
    res
}

pub struct SerialWriter {
    state: State,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum State {
    Uninitialized,
    Ready,
    // Loopback test failed; there is nothing on the other end, so drop output
    // instead of spinning on LSR forever.
    Faulty,
}

impl SerialWriter {
    const fn new() -> Self {
        Self {
            state: State::Uninitialized,
        }
    }

    fn ensure_initialized(&mut self) {
        if self.state != State::Uninitialized {
            return;
        }

        // SAFETY: Follows the usual initialization sequence for a 16550 UART.
        // https://wiki.osdev.org/Serial_Ports#Initialization
        unsafe {
            outb(IER, 0x00); // No interrupts, we poll.
            outb(LCR, 0x80); // DLAB on.
            outb(DLL, 0x03); // 38400 baud.
            outb(IER, 0x00);
            outb(LCR, 0x03); // 8N1, DLAB off.
            outb(FCR, 0xC7); // FIFO on, cleared, 14 byte threshold.
            outb(MCR, 0x0B);

            outb(MCR, 0x1E); // Loopback.
            const EXPECTED: u8 = 0xAE;
            outb(THR, EXPECTED);
            self.state = if inb(RBR) == EXPECTED {
                State::Ready
            } else {
                State::Faulty
            };

            outb(MCR, 0x0F);
        }
    }

    fn write_byte(&mut self, byte: u8) {
        // SAFETY: Waits for the transmit holding register before writing.
        unsafe {
            while inb(LSR) & LSR_THR_EMPTY == 0 {}
            outb(THR, byte);
        }
    }
}

impl fmt::Write for SerialWriter {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.ensure_initialized();
        if self.state == State::Faulty {
            return Ok(());
        }

        for b in s.bytes() {
            if b == b'\n' {
                self.write_byte(b'\r');
            }
            self.write_byte(b);
        }

        Ok(())
    }
}

static mut SERIAL_WRITER: SerialWriter = SerialWriter::new();

/// # Safety
///
/// Only one reference may be live at a time. Single core, so that just means
/// not calling this while a previous reference is still in use.
pub unsafe fn writer() -> &'static mut SerialWriter {
    &mut *addr_of_mut!(SERIAL_WRITER)
}
