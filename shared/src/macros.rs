// On bare metal everything goes to both the VGA text buffer and COM1. Hosted
// builds (tests, the simulation binary) fall back to the standard streams.

#[macro_export]
macro_rules! print {
    ($($arg:tt)*) => {{
        #[cfg(target_os = "none")]
        {
            use core::fmt::Write;
            // SAFETY: Single core, and the writers are never used from the
            // page fault path while another print is in progress.
            unsafe {
                let _ = write!($crate::video_memory::writer(), "{}", format_args!($($arg)*));
                let _ = write!($crate::serial::writer(), "{}", format_args!($($arg)*));
            }
        }
        #[cfg(not(target_os = "none"))]
        std::print!($($arg)*);
    }};
}

#[macro_export]
macro_rules! println {
    () => {
        $crate::print!("\n")
    };
    ($($arg:tt)*) => {{
        $crate::print!("{}\n", format_args!($($arg)*));
    }};
}

#[macro_export]
macro_rules! eprint {
    ($($arg:tt)*) => {{
        #[cfg(target_os = "none")]
        {
            use core::fmt::Write;
            use $crate::video_memory::{Attribute, Colour};
            // SAFETY: See print!.
            unsafe {
                let video = $crate::video_memory::writer();
                let prev_attribute = video.attribute;
                video.attribute = Attribute::new(Colour::Red, Colour::Black);
                let _ = write!(video, "{}", format_args!($($arg)*));
                video.attribute = prev_attribute;
                let _ = write!($crate::serial::writer(), "{}", format_args!($($arg)*));
            }
        }
        #[cfg(not(target_os = "none"))]
        std::eprint!($($arg)*);
    }};
}

#[macro_export]
macro_rules! eprintln {
    () => {
        $crate::eprint!("\n")
    };
    ($($arg:tt)*) => {{
        $crate::eprint!("{}\n", format_args!($($arg)*));
    }};
}
