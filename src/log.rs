//! Logging facade over [`defmt`].
//!
//! Kernel code logs scheduling-relevant transitions through these
//! macros instead of calling `defmt` directly. `defmt`'s macros need a
//! `#[global_logger]` linked into the final binary; the real target
//! provides one, but the host `cargo test` binary doesn't, so logging
//! here compiles to nothing off-target rather than failing to link.

macro_rules! trace {
    ($($arg:tt)*) => {
        #[cfg(target_arch = "arm")]
        defmt::trace!($($arg)*);
    };
}

macro_rules! debug {
    ($($arg:tt)*) => {
        #[cfg(target_arch = "arm")]
        defmt::debug!($($arg)*);
    };
}

macro_rules! error {
    ($($arg:tt)*) => {
        #[cfg(target_arch = "arm")]
        defmt::error!($($arg)*);
    };
}

pub(crate) use debug;
pub(crate) use error;
pub(crate) use trace;
