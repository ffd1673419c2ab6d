//! Layout Planner: infers the common port and element width for a pin set,
//! and sizes the framebuffer that follows from that choice.
//!
//! Ported from the byte/word/long classification in the original
//! Adafruit_Protomatter `_PM_begin()` (see `examples/original_source/core.c`),
//! expressed as a pure function of pin masks rather than as a procedure that
//! also performs the allocation.

use crate::arch::{ElementWidth, HubArch};
use crate::error::{Error, Result};

/// Output of the Layout Planner: everything downstream code (mask table,
/// framebuffer sizing, shifter selection) needs to know about where the RGB
/// signals live in the port and how big a scanline plane is.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Layout {
    pub element_width: ElementWidth,
    /// Which element (byte 0..=3, or half-word 0..=1) of the 32-bit port the
    /// RGB pins occupy. Zero when `element_width` is `Four`.
    pub port_offset: u8,
    /// `width` rounded up to a multiple of the arch's chunk size.
    pub columns: usize,
    /// Bytes in one (buffer, row, plane) scanline-sized block.
    ///
    /// `buffer_size = columns * num_row_pairs * num_planes * element_width`,
    /// matching §4.1 step 5.
    pub buffer_size: usize,
}

/// Runs the Layout Planner (§4.1).
///
/// `rgb_pins` must contain `6 * parallel` entries. Returns [`Error::Pins`] if
/// any RGB pin's port differs from the clock pin's port.
pub fn plan<A: HubArch>(
    rgb_pins: &[u8],
    clock_pin: u8,
    width: usize,
    num_row_pairs: usize,
    num_planes: usize,
) -> Result<Layout> {
    // Step 1: every RGB pin and the clock pin must share one port.
    let mut all_pins = heapless_pin_buf(rgb_pins, clock_pin);
    if !A::pins_share_port(&all_pins[..rgb_pins.len() + 1]) {
        return Err(Error::Pins);
    }
    // Silence "unused" if the helper buffer ends up larger than needed.
    let _ = &mut all_pins;

    // Step 2: union all RGB masks, plus the clock mask iff a toggle register
    // exists (on non-toggle hardware the clock bit doesn't affect storage
    // efficiency -- see the original's `#if defined(_PM_portToggleRegister)`).
    let mut bit_mask: u32 = 0;
    if A::HAS_TOGGLE_REGISTER {
        bit_mask |= A::port_bit_mask(clock_pin);
    }
    for &pin in rgb_pins {
        bit_mask |= A::port_bit_mask(pin);
    }

    // Step 3: classify into octets.
    let mut byte_mask = 0u8;
    if bit_mask & 0xFF00_0000 != 0 {
        byte_mask |= 0b1000;
    }
    if bit_mask & 0x00FF_0000 != 0 {
        byte_mask |= 0b0100;
    }
    if bit_mask & 0x0000_FF00 != 0 {
        byte_mask |= 0b0010;
    }
    if bit_mask & 0x0000_00FF != 0 {
        byte_mask |= 0b0001;
    }

    let (element_width, port_offset) = match byte_mask {
        0b0001 | 0b0010 | 0b0100 | 0b1000 => {
            (ElementWidth::One, A::byte_offset(rgb_pins[0]))
        }
        0b0011 | 0b1100 => (ElementWidth::Two, A::word_offset(rgb_pins[0])),
        // Anything spanning the unaligned middle half-word, or all four
        // octets, falls back to full 32-bit accesses.
        _ => (ElementWidth::Four, 0),
    };

    // Step 4-5: pad width to the arch's chunk size, then size one buffer.
    let chunk = A::CHUNK_SIZE.max(1);
    let chunks = (width + chunk - 1) / chunk;
    let columns = chunks * chunk;
    let buffer_size = columns * num_row_pairs * num_planes * element_width.bytes();

    Ok(Layout {
        element_width,
        port_offset,
        columns,
        buffer_size,
    })
}

/// Small stack-allocated scratch buffer combining the RGB pin list and the
/// clock pin, used only for the `pins_share_port` check. Caps out at the
/// spec's maximum of `parallel=5` (30 RGB pins) plus the clock pin.
fn heapless_pin_buf(rgb_pins: &[u8], clock_pin: u8) -> [u8; 31] {
    let mut buf = [0u8; 31];
    let n = rgb_pins.len().min(30);
    buf[..n].copy_from_slice(&rgb_pins[..n]);
    buf[n] = clock_pin;
    buf
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch::DiagSignal;

    /// A fake arch where pin numbers double as bit positions in a single
    /// 32-bit port, useful for exercising the planner without any hardware.
    struct FakeArch;

    unsafe impl HubArch for FakeArch {
        type Timer = ();
        const CHUNK_SIZE: usize = 8;
        const HAS_TOGGLE_REGISTER: bool = true;
        const STRICT_32BIT_IO: bool = false;
        const MIN_MIN_PERIOD: u32 = 1;
        const TIMER_FREQ: u32 = 1_000_000;

        fn port_set_register(_pin: u8) -> usize {
            0x1000
        }
        fn port_clear_register(_pin: u8) -> usize {
            0x1004
        }
        fn port_toggle_register(_pin: u8) -> Option<usize> {
            Some(0x1008)
        }
        fn port_bit_mask(pin: u8) -> u32 {
            1u32 << pin
        }
        fn byte_offset(pin: u8) -> u8 {
            pin / 8
        }
        fn word_offset(pin: u8) -> u8 {
            pin / 16
        }
        fn pins_share_port(_pins: &[u8]) -> bool {
            true
        }
        fn pin_output(_pin: u8) {}
        fn pin_high(_pin: u8) {}
        fn pin_low(_pin: u8) {}
        fn delay_microseconds(_us: u32) {}
        fn timer_init(_timer: &mut Self::Timer) {}
        fn timer_start(_timer: &mut Self::Timer, _ticks: u32) {}
        fn timer_stop(_timer: &mut Self::Timer) -> u32 {
            0
        }
        fn diag_high(_s: DiagSignal) {}
        fn diag_low(_s: DiagSignal) {}
    }

    struct FakeArchMismatch;
    unsafe impl HubArch for FakeArchMismatch {
        type Timer = ();
        const CHUNK_SIZE: usize = 1;
        const HAS_TOGGLE_REGISTER: bool = false;
        const STRICT_32BIT_IO: bool = false;
        const MIN_MIN_PERIOD: u32 = 1;
        const TIMER_FREQ: u32 = 1_000_000;
        fn port_set_register(_pin: u8) -> usize {
            0
        }
        fn port_clear_register(_pin: u8) -> usize {
            0
        }
        fn port_toggle_register(_pin: u8) -> Option<usize> {
            None
        }
        fn port_bit_mask(pin: u8) -> u32 {
            1u32 << pin
        }
        fn byte_offset(pin: u8) -> u8 {
            pin / 8
        }
        fn word_offset(pin: u8) -> u8 {
            pin / 16
        }
        fn pins_share_port(_pins: &[u8]) -> bool {
            false
        }
        fn pin_output(_pin: u8) {}
        fn pin_high(_pin: u8) {}
        fn pin_low(_pin: u8) {}
        fn delay_microseconds(_us: u32) {}
        fn timer_init(_timer: &mut Self::Timer) {}
        fn timer_start(_timer: &mut Self::Timer, _ticks: u32) {}
        fn timer_stop(_timer: &mut Self::Timer) -> u32 {
            0
        }
    }

    // Scenario 1 from §8: all pins in byte 0.
    #[test]
    fn minimal_config_byte_width() {
        let rgb = [0u8, 1, 2, 3, 4, 5];
        let layout = plan::<FakeArch>(&rgb, 6, 64, 16, 4).unwrap();
        assert_eq!(layout.element_width, ElementWidth::One);
        assert_eq!(layout.port_offset, 0);
        assert_eq!(layout.columns, 64);
        assert_eq!(layout.buffer_size, 64 * 16 * 4 * 1);
    }

    // Scenario 4: spans byte 0 and byte 1.
    #[test]
    fn half_word_layout() {
        let rgb = [0u8, 1, 2, 7, 9, 10];
        let layout = plan::<FakeArch>(&rgb, 11, 64, 16, 4).unwrap();
        assert_eq!(layout.element_width, ElementWidth::Two);
        assert_eq!(layout.port_offset, 0);
        assert_eq!(layout.buffer_size, 64 * 16 * 4 * 2);
    }

    // Scenario 5: spans byte 1 and byte 2 -- rejected into the 32-bit case.
    #[test]
    fn unaligned_half_word_falls_back_to_32bit() {
        let rgb = [8u8, 9, 10, 16, 17, 18];
        let layout = plan::<FakeArch>(&rgb, 11, 64, 16, 4).unwrap();
        assert_eq!(layout.element_width, ElementWidth::Four);
        assert_eq!(layout.port_offset, 0);
    }

    // Scenario 3: pin/port mismatch.
    #[test]
    fn pin_port_mismatch_is_rejected() {
        let rgb = [0u8, 1, 2, 3, 4, 5];
        let err = plan::<FakeArchMismatch>(&rgb, 6, 64, 16, 4).unwrap_err();
        assert_eq!(err, Error::Pins);
    }

    #[test]
    fn width_not_multiple_of_chunk_size_pads_columns() {
        let rgb = [0u8, 1, 2, 3, 4, 5];
        // FakeArch::CHUNK_SIZE == 8, width=61 should pad to 64.
        let layout = plan::<FakeArch>(&rgb, 6, 61, 16, 4).unwrap();
        assert_eq!(layout.columns, 64);
    }
}
