//! Mask Table: per-RGB-pin bitmasks narrowed into the chosen element width,
//! plus the clock/RGB-and-clock composite masks used to pre-fill the
//! framebuffer and to pulse the clock line during a shift.
//!
//! Grounded on the `rgbMask`/`clockMask`/`rgbAndClockMask` setup in
//! `examples/original_source/core.c` (the block immediately following the
//! layout classification), reworked as a table builder that owns its storage
//! instead of writing into a shared allocation.
//!
//! Two different shift policies are in play, both taken straight from
//! `core.c:250-312`:
//! - `rgb[i]` (the per-pixel masks the plotter ORs into the framebuffer) are
//!   *always* narrowed by `port_offset * 8 * element_width` bits, regardless
//!   of toggle register or `STRICT_32BIT_IO` -- storage is always
//!   element-width-sized, so the bit has to live at its in-element position.
//! - `clock_mask`/`rgb_and_clock_mask` (used directly by the shifter against
//!   the real PORT registers) are narrowed only when the target has a toggle
//!   register *and* isn't `STRICT_32BIT_IO`; every other combination writes
//!   through a full 32-bit register, so the mask must stay in its native
//!   position -- the `STRICT_32BIT_IO` shifter instead shifts the data left
//!   at write time (see `shifter::blast`).

use crate::arch::HubArch;
use crate::layout::Layout;

/// Maximum parallel chains `* 6` RGB signals this table can hold, matching
/// the spec's `parallel` clamp of `[1, 5]`.
pub const MAX_RGB_PINS: usize = 5 * 6;

/// Resolved bitmasks needed by the shifters and by framebuffer pre-fill.
#[derive(Copy, Clone, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MaskTable {
    /// One entry per RGB pin, narrowed to its in-element bit position.
    rgb: [u32; MAX_RGB_PINS],
    count: usize,
    pub clock_mask: u32,
    pub rgb_and_clock_mask: u32,
    /// Per-element clock bit pattern to pre-fill and preserve in the
    /// framebuffer on toggle-register targets; `0` (a no-op OR) when the
    /// target has no toggle register.
    pub toggle_fill: u32,
}

impl MaskTable {
    pub fn build<A: HubArch>(rgb_pins: &[u8], clock_pin: u8, layout: &Layout) -> Self {
        debug_assert!(rgb_pins.len() <= MAX_RGB_PINS);

        let elem_shift = layout.port_offset as u32 * 8 * layout.element_width.bytes() as u32;

        let mut rgb = [0u32; MAX_RGB_PINS];
        let mut raw_combined = 0u32;
        for (slot, &pin) in rgb.iter_mut().zip(rgb_pins.iter()) {
            let raw = A::port_bit_mask(pin);
            raw_combined |= raw;
            *slot = raw >> elem_shift;
        }

        let clock_bit = A::port_bit_mask(clock_pin);
        let (clock_mask, rgb_and_clock_mask) = if A::HAS_TOGGLE_REGISTER && !A::STRICT_32BIT_IO {
            let clock_mask = clock_bit >> elem_shift;
            (clock_mask, (raw_combined >> elem_shift) | clock_mask)
        } else {
            (clock_bit, raw_combined | clock_bit)
        };

        let toggle_fill = if A::HAS_TOGGLE_REGISTER {
            clock_bit >> elem_shift
        } else {
            0
        };

        MaskTable {
            rgb,
            count: rgb_pins.len(),
            clock_mask,
            rgb_and_clock_mask,
            toggle_fill,
        }
    }

    pub fn rgb_masks(&self) -> &[u32] {
        &self.rgb[..self.count]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch::DiagSignal;

    struct FakeArch;
    unsafe impl HubArch for FakeArch {
        type Timer = ();
        const CHUNK_SIZE: usize = 8;
        const HAS_TOGGLE_REGISTER: bool = true;
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
            Some(0)
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

    fn byte0_layout() -> crate::layout::Layout {
        crate::layout::Layout {
            element_width: crate::arch::ElementWidth::One,
            port_offset: 0,
            columns: 8,
            buffer_size: 0,
        }
    }

    #[test]
    fn single_chain_masks() {
        let rgb = [0u8, 1, 2, 3, 4, 5];
        let table = MaskTable::build::<FakeArch>(&rgb, 6, &byte0_layout());
        assert_eq!(table.rgb_masks(), &[1, 2, 4, 8, 16, 32]);
        assert_eq!(table.clock_mask, 1 << 6);
        assert_eq!(table.rgb_and_clock_mask, 0b111_1111);
        assert_eq!(table.toggle_fill, 1 << 6);
    }

    #[test]
    fn rgb_and_clock_masks_narrow_by_port_offset_on_toggle_nonstrict() {
        // Pins 8..=13 live in byte 1; port_offset selects that byte.
        let rgb = [8u8, 9, 10, 11, 12, 13];
        let layout = crate::layout::Layout {
            element_width: crate::arch::ElementWidth::One,
            port_offset: 1,
            columns: 8,
            buffer_size: 0,
        };
        let table = MaskTable::build::<FakeArch>(&rgb, 14, &layout);
        assert_eq!(table.rgb_masks(), &[1, 2, 4, 8, 16, 32]);
        assert_eq!(table.clock_mask, 1 << 6);
        assert_eq!(table.toggle_fill, 1 << 6);
    }

    #[test]
    fn strict_32bit_io_leaves_clock_mask_unshifted() {
        struct StrictArch;
        unsafe impl HubArch for StrictArch {
            type Timer = ();
            const CHUNK_SIZE: usize = 8;
            const HAS_TOGGLE_REGISTER: bool = true;
            const STRICT_32BIT_IO: bool = true;
            const MIN_MIN_PERIOD: u32 = 1;
            const TIMER_FREQ: u32 = 1_000_000;
            fn port_set_register(_pin: u8) -> usize {
                0
            }
            fn port_clear_register(_pin: u8) -> usize {
                0
            }
            fn port_toggle_register(_pin: u8) -> Option<usize> {
                Some(0)
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
        }

        let rgb = [8u8, 9, 10, 11, 12, 13];
        let layout = crate::layout::Layout {
            element_width: crate::arch::ElementWidth::One,
            port_offset: 1,
            columns: 8,
            buffer_size: 0,
        };
        let table = MaskTable::build::<StrictArch>(&rgb, 14, &layout);
        // rgb[] is still narrowed (storage is element-width-sized)...
        assert_eq!(table.rgb_masks(), &[1, 2, 4, 8, 16, 32]);
        // ...but clock_mask stays in its native port position, since the
        // strict shifter shifts left again at write time.
        assert_eq!(table.clock_mask, 1 << 14);
        // toggle_fill still narrows -- it's written into narrow storage too.
        assert_eq!(table.toggle_fill, 1 << 6);
    }
}
