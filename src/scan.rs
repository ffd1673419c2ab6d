//! Scan State Machine: the ISR body invoked once per bitplane interval.
//!
//! Step order is ported verbatim from `_PM_row_handler` in
//! `examples/original_source/core.c`: blank, latch, stop timer and capture
//! elapsed ticks, fold into the period estimate (plane-0-to-plane-0 spans
//! only), update the row address (only at a plane-0 boundary, and only if
//! the row actually changed), advance the plane/row/buffer cursor, arm the
//! next timer interval sized for the data that was *just* displayed
//! (`prev_plane`), unblank, and finally shift the *next* plane's data so
//! it's ready for the following interrupt.

use core::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};

use crate::arch::{DiagSignal, HubArch};
use crate::framebuffer::Framebuffer;
use crate::period::PeriodEstimator;
use crate::pin::PinBinding;
use crate::shifter::{self, ShiftElement, ShifterRegs};

/// Up to five address lines, per §3's `num_address_lines` range of 2..=5
/// (32 row pairs max).
pub const MAX_ADDRESS_LINES: usize = 5;

/// Mutable cursor and bookkeeping state advanced once per ISR firing.
/// Lives in `Core`, never touched by the plotter.
pub struct ScanState {
    pub plane: u8,
    pub row: u8,
    pub prev_row: u8,
    num_planes: u8,
    num_row_pairs: u8,
    frame_count: AtomicU32,
    swap_pending: AtomicBool,
    active_buffer: AtomicU8,
}

impl ScanState {
    pub fn new(num_planes: u8, num_row_pairs: u8) -> Self {
        ScanState {
            plane: 0,
            row: 0,
            // Matches core.c's `prevRow = (1 << numAddressLines) - 2`: an
            // address one less than max so the first real row always looks
            // "changed" and gets written out.
            prev_row: num_row_pairs.wrapping_sub(2),
            num_planes,
            num_row_pairs,
            frame_count: AtomicU32::new(0),
            swap_pending: AtomicBool::new(false),
            active_buffer: AtomicU8::new(0),
        }
    }

    pub fn frame_count(&self) -> u32 {
        self.frame_count.load(Ordering::Relaxed)
    }

    /// Consumes and resets the frame counter, per §4.8's `get_frame_count`.
    pub fn take_frame_count(&self) -> u32 {
        self.frame_count.swap(0, Ordering::Relaxed)
    }

    pub fn active_buffer(&self) -> u8 {
        self.active_buffer.load(Ordering::Acquire)
    }

    /// Requests a buffer swap at the next frame boundary (end of the last
    /// row's last plane). Called by the plotter after finishing a frame.
    pub fn request_swap(&self) {
        self.swap_pending.store(true, Ordering::Release);
    }

    /// Whether a buffer swap is still waiting for the next frame boundary.
    /// `Core::stop` spins on this before halting the timer, so it never
    /// blanks mid-swap.
    pub fn swap_pending(&self) -> bool {
        self.swap_pending.load(Ordering::Acquire)
    }

    /// Resets the cursor so the next ISR firing rolls over to plane 0, row
    /// 0, and clears the frame counter and any pending swap (`_PM_resume`).
    pub fn reset_for_resume(&mut self) {
        self.plane = self.num_planes - 1;
        self.row = self.num_row_pairs - 1;
        self.prev_row = if self.num_row_pairs > 1 {
            self.row - 1
        } else {
            1
        };
        self.swap_pending.store(false, Ordering::Release);
        self.frame_count.store(0, Ordering::Relaxed);
    }
}

/// Everything the scan step needs that doesn't change between interrupts:
/// resolved pin bindings and per-arch constants.
pub struct ScanWiring<A: HubArch> {
    pub oe: PinBinding,
    pub latch: PinBinding,
    pub addr_set: [PinBinding; MAX_ADDRESS_LINES],
    pub num_address_lines: u8,
    /// Present (and used in preference to per-line sets) when the arch has a
    /// toggle register and all address lines share one port -- `core.c`'s
    /// `singleAddrPort` fast path.
    pub addr_toggle_addr: Option<usize>,
    pub shifter_regs: ShifterRegs,
    pub chunks: usize,
    _arch: core::marker::PhantomData<A>,
}

impl<A: HubArch> ScanWiring<A> {
    pub fn new(
        oe: PinBinding,
        latch: PinBinding,
        addr_set: [PinBinding; MAX_ADDRESS_LINES],
        num_address_lines: u8,
        addr_toggle_addr: Option<usize>,
        shifter_regs: ShifterRegs,
        chunks: usize,
    ) -> Self {
        ScanWiring {
            oe,
            latch,
            addr_set,
            num_address_lines,
            addr_toggle_addr,
            shifter_regs,
            chunks,
            _arch: core::marker::PhantomData,
        }
    }
}

/// Runs one ISR firing. `E` is the element width chosen by the layout
/// planner (`u8`/`u16`/`u32`), `A` the concrete arch.
///
/// # Safety
/// Must only be called from the interrupt context the timer/pins were
/// configured for, with `wiring` describing live registers and `fb`/`period`
/// owned exclusively by the scan ISR (no concurrent foreground access to the
/// buffer currently being read).
pub unsafe fn tick<E: ShiftElement, A: HubArch>(
    state: &mut ScanState,
    wiring: &ScanWiring<A>,
    timer: &mut A::Timer,
    fb: &Framebuffer,
    period: &mut PeriodEstimator,
) {
    A::diag_high(DiagSignal::A);

    wiring.oe.set(); // blank: disable LED output

    // Latch pulse, with the harmless extra clear/set/clear dance the
    // original performs to keep OE and latch writes from colliding on
    // shared-port hardware where bit set/clear isn't atomic.
    wiring.latch.clear();
    wiring.latch.set();
    let elapsed = A::timer_stop(timer);
    let prev_plane = state.plane;
    wiring.latch.clear();

    if prev_plane == 1 || state.num_planes == 1 {
        period.update(elapsed);
    }

    if prev_plane == 0 {
        if let Some(toggle_addr) = wiring.addr_toggle_addr {
            let mut prior_bits = 0u32;
            let mut new_bits = 0u32;
            for line in 0..wiring.num_address_lines as usize {
                let bit = 1u8 << line;
                if state.row & bit != 0 {
                    new_bits |= wiring.addr_set[line].mask;
                }
                if state.prev_row & bit != 0 {
                    prior_bits |= wiring.addr_set[line].mask;
                }
            }
            if new_bits != prior_bits {
                core::ptr::write_volatile(toggle_addr as *mut u32, new_bits ^ prior_bits);
                A::delay_microseconds(crate::ROW_DELAY_US);
            }
        } else {
            for line in 0..wiring.num_address_lines as usize {
                let bit = 1u8 << line;
                if (state.row & bit) != (state.prev_row & bit) {
                    if state.row & bit != 0 {
                        wiring.addr_set[line].set();
                    } else {
                        wiring.addr_set[line].clear();
                    }
                    A::delay_microseconds(crate::ROW_DELAY_US);
                }
            }
        }
        state.prev_row = state.row;
    }

    state.plane += 1;
    if state.plane >= state.num_planes {
        state.plane = 0;
        state.row += 1;
        if state.row >= state.num_row_pairs {
            state.row = 0;
            if state.swap_pending.swap(false, Ordering::AcqRel) {
                let new_active = 1 - state.active_buffer();
                state.active_buffer.store(new_active, Ordering::Release);
                fb.set_active_buffer(new_active);
            }
            state.frame_count.fetch_add(1, Ordering::Relaxed);
        }
    }

    A::timer_start(timer, period.bit_zero_period() << prev_plane);
    A::delay_microseconds(1);
    wiring.oe.clear(); // unblank

    let data = fb.scan_slice(state.row as usize, state.plane, state.active_buffer());
    shifter::blast::<E, A>(
        &wiring.shifter_regs,
        data.as_ptr() as *const E,
        wiring.chunks,
    );

    A::diag_low(DiagSignal::A);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_advances_plane_then_row_then_wraps() {
        let mut st = ScanState::new(3, 4);
        assert_eq!((st.plane, st.row), (0, 0));
        // Manually mimic the advance logic in isolation.
        for _ in 0..3 {
            st.plane += 1;
            if st.plane >= 3 {
                st.plane = 0;
                st.row += 1;
            }
        }
        assert_eq!((st.plane, st.row), (0, 1));
    }

    #[test]
    fn frame_count_take_resets_to_zero() {
        let st = ScanState::new(3, 4);
        st.frame_count.store(42, Ordering::Relaxed);
        assert_eq!(st.take_frame_count(), 42);
        assert_eq!(st.frame_count(), 0);
    }

    #[test]
    fn initial_prev_row_is_one_less_than_row_pair_count() {
        let st = ScanState::new(3, 16);
        assert_eq!(st.prev_row, 14);
    }

    #[test]
    fn swap_only_happens_once_requested() {
        let st = ScanState::new(1, 1);
        assert_eq!(st.active_buffer(), 0);
        assert!(!st.swap_pending.load(Ordering::Relaxed));
        st.request_swap();
        assert!(st.swap_pending.load(Ordering::Relaxed));
    }
}
