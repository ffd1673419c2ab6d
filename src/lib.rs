//! Core refresh engine for HUB75-style RGB LED matrix panels.
//!
//! This crate is the hardware-neutral half of a panel driver: layout
//! planning, the gamma/remap tables, the scan state machine, and the
//! shifters that stream bits to the panel's shift-register chain. A
//! concrete target plugs in by implementing [`arch::HubArch`]; the crate
//! never assumes a specific MCU.
//!
//! `#![no_std]` except under `cfg(test)`, so the pure-logic modules (layout,
//! mask, remap, period, scan cursor math) can run under the host test
//! harness while the real target build stays freestanding.
#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod arch;
// Named `driver` rather than `core` to avoid shadowing the `core` crate in
// extern-prelude path resolution; the file itself stays `core.rs` per the
// module-to-file map, since `Core<A>` is the thing it implements.
#[path = "core.rs"]
pub mod driver;
pub mod error;
pub mod framebuffer;
pub mod layout;
pub mod mask;
pub mod period;
pub mod pin;
pub mod remap;
pub mod scan;
pub mod shifter;
pub mod util;

pub use crate::arch::HubArch;
pub use crate::driver::{Config, Core};
pub use crate::error::{Error, Result};

/// Gamma exponent used when the matrix has more than 6 bitplanes (§4.4).
pub const GAMMA: f32 = 2.6;

/// Refresh-rate cap used to derive `min_period` when a caller doesn't
/// specify `min_refresh_hz` (§4.8, §F.3).
pub const MAX_REFRESH_HZ: u32 = 250;

/// Delay, in microseconds, inserted between successive address-line writes
/// when address lines don't all share a toggle-capable port (§4.1, ported
/// from `_PM_ROW_DELAY` in `examples/original_source/core.c`).
pub const ROW_DELAY_US: u32 = 8;
