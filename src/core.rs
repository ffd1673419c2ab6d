//! Lifecycle: the public `Core<A>` type and its `init`/`begin`/`stop`/
//! `resume`/`free`/`get_frame_count` operations (§4.8).
//!
//! Grounded on `examples/original_source/core.c`'s `_PM_begin`/`_PM_stop`/
//! `_PM_resume`/`_PM_free`, and on the small, explicit config-struct style
//! the teacher uses for `ClockConfig`/`Timing` rather than a long flat
//! argument list.

use core::sync::atomic::{AtomicBool, Ordering};

use crate::arch::HubArch;
use crate::error::{Error, Result};
use crate::framebuffer::Framebuffer;
use crate::layout::{self, Layout};
use crate::mask::{MaskTable, MAX_RGB_PINS};
use crate::period::{self, PeriodEstimator};
use crate::pin::PinBinding;
use crate::remap::RemapTables;
use crate::scan::{ScanState, ScanWiring, MAX_ADDRESS_LINES};
use crate::shifter::ShifterRegs;
use crate::util::spin_lock::SpinLock;
use crate::MAX_REFRESH_HZ;

/// Up to this many live `Core` instances may have their RGB port tracked at
/// once. Generous relative to the spec's `parallel` clamp of 5 chains, since
/// each chain is a separate `Core` sharing nothing with the others.
const MAX_TRACKED_PORTS: usize = 8;

/// Guards against two `Core`s independently bitbanging the same GPIO port,
/// which would corrupt each other's shift sequences. Tracked by the RGB
/// port's set-register address, since that uniquely identifies a port across
/// every arch in this crate.
static CLAIMED_PORTS: SpinLock<[usize; MAX_TRACKED_PORTS]> =
    SpinLock::new([0; MAX_TRACKED_PORTS]);

fn claim_port(addr: usize) -> Result<()> {
    let mut table = CLAIMED_PORTS.lock();
    if table.iter().any(|&a| a == addr) {
        return Err(Error::Pins);
    }
    match table.iter_mut().find(|a| **a == 0) {
        Some(slot) => {
            *slot = addr;
            Ok(())
        }
        None => Err(Error::Pins),
    }
}

fn release_port(addr: usize) {
    let mut table = CLAIMED_PORTS.lock();
    if let Some(slot) = table.iter_mut().find(|a| **a == addr) {
        *slot = 0;
    }
}

/// Construction-time configuration, the runtime analogue of the compile-time
/// `HubArch` impl (§D of the expanded spec).
pub struct Config<'a> {
    pub width: usize,
    pub rgb_pins: &'a [u8],
    pub clock_pin: u8,
    pub latch_pin: u8,
    pub oe_pin: u8,
    pub addr_pins: &'a [u8],
    pub num_planes: u8,
    pub double_buffer: bool,
    /// Defaults to [`MAX_REFRESH_HZ`] when `None`; may only raise the
    /// arch-derived floor, per §F.3.
    pub min_refresh_hz: Option<u32>,
}

/// Top-level driver instance. Generic over the target [`HubArch`]; the
/// plotter and the scan ISR both borrow from one `Core`.
pub struct Core<A: HubArch> {
    fb: Framebuffer,
    mask: MaskTable,
    remap: RemapTables,
    period: PeriodEstimator,
    state: ScanState,
    wiring: ScanWiring<A>,
    layout: Layout,
    timer: A::Timer,
    num_planes: u8,
    clock_pin: u8,
    rgb_pins: [u8; MAX_RGB_PINS],
    rgb_pin_count: usize,
    running: AtomicBool,
    claimed_port: usize,
}

impl<A: HubArch> Core<A> {
    /// Validates `config`, plans the pin layout, allocates the framebuffer,
    /// and configures pins as outputs -- but does not start the timer; call
    /// [`Core::begin`] for that. Mirrors `_PM_begin`'s two halves (layout +
    /// pin setup happen here; timer arm happens in the interrupt-attached
    /// `begin`).
    pub fn init(config: Config<'_>, timer: A::Timer) -> Result<Self> {
        if config.rgb_pins.is_empty()
            || config.rgb_pins.len() % 6 != 0
            || config.addr_pins.is_empty()
            || config.addr_pins.len() > MAX_ADDRESS_LINES
        {
            return Err(Error::Arg);
        }

        let num_row_pairs = 1usize << config.addr_pins.len();
        let layout = layout::plan::<A>(
            config.rgb_pins,
            config.clock_pin,
            config.width,
            num_row_pairs,
            config.num_planes,
        )?;

        let set_addr = A::port_set_register(config.rgb_pins[0]);
        claim_port(set_addr)?;
        let port_guard = scopeguard::guard(set_addr, |addr| release_port(addr));

        let mask = MaskTable::build::<A>(config.rgb_pins, config.clock_pin, &layout);
        let fb = Framebuffer::new(&layout, config.num_planes, config.double_buffer, mask.toggle_fill)
            .ok_or(Error::Malloc)?;

        let remap = RemapTables::build(config.num_planes);

        let min_refresh_hz = config.min_refresh_hz.unwrap_or(MAX_REFRESH_HZ);
        let min_period = period::min_period_for_refresh_hz(
            A::TIMER_FREQ,
            min_refresh_hz,
            num_row_pairs,
            config.num_planes,
            A::MIN_MIN_PERIOD,
        );
        let initial_guess = config.width as u32 * 5;
        let period = PeriodEstimator::new(initial_guess, min_period);

        // Configure pins as outputs, driven to their idle levels.
        A::pin_output(config.clock_pin);
        A::pin_low(config.clock_pin);
        A::pin_output(config.latch_pin);
        A::pin_low(config.latch_pin);
        A::pin_output(config.oe_pin);
        A::pin_high(config.oe_pin); // OE idles HIGH: output disabled
        for &pin in config.rgb_pins {
            A::pin_output(pin);
            A::pin_low(pin);
        }
        for &pin in config.addr_pins {
            A::pin_output(pin);
            A::pin_low(pin);
        }

        let oe = PinBinding::resolve::<A>(config.oe_pin);
        let latch = PinBinding::resolve::<A>(config.latch_pin);

        let mut addr_set = [PinBinding::default(); MAX_ADDRESS_LINES];
        for (slot, &pin) in addr_set.iter_mut().zip(config.addr_pins) {
            *slot = PinBinding::resolve::<A>(pin);
        }

        let addr_toggle_addr = if A::HAS_TOGGLE_REGISTER && config.addr_pins.len() > 1 {
            A::port_toggle_register(config.addr_pins[0])
        } else {
            None
        };

        let clear_addr = A::port_clear_register(config.rgb_pins[0]);
        let toggle_addr = A::port_toggle_register(config.rgb_pins[0]);
        let shifter_regs = ShifterRegs {
            set_addr,
            clear_addr,
            toggle_addr,
            port_offset: layout.port_offset,
            clock_mask: mask.clock_mask,
            rgb_and_clock_mask: mask.rgb_and_clock_mask,
        };
        let chunks = layout.columns / A::CHUNK_SIZE.max(1);

        let wiring = ScanWiring::new(
            oe,
            latch,
            addr_set,
            config.addr_pins.len() as u8,
            addr_toggle_addr,
            shifter_regs,
            chunks,
        );

        let state = ScanState::new(config.num_planes, num_row_pairs as u8);

        let mut rgb_pins = [0u8; MAX_RGB_PINS];
        rgb_pins[..config.rgb_pins.len()].copy_from_slice(config.rgb_pins);

        Ok(Core {
            fb,
            mask,
            remap,
            period,
            state,
            wiring,
            layout,
            timer,
            num_planes: config.num_planes,
            clock_pin: config.clock_pin,
            rgb_pins,
            rgb_pin_count: config.rgb_pins.len(),
            running: AtomicBool::new(false),
            claimed_port: scopeguard::ScopeGuard::into_inner(port_guard),
        })
    }

    /// Arms the timer and marks the driver running. Idempotent: calling
    /// `begin` twice without an intervening `stop` is a no-op.
    pub fn begin(&mut self) {
        if self.running.swap(true, Ordering::AcqRel) {
            return;
        }
        A::timer_init(&mut self.timer);
        A::timer_start(&mut self.timer, self.period.bit_zero_period());
    }

    /// Stops the timer and blanks the panel (`_PM_stop`): waits out any
    /// pending buffer swap, halts the timer, raises OE, then drives every RGB
    /// pin low and clocks `width` zero bits through the shift registers
    /// before latching, so a halted panel shows black rather than whatever
    /// was lit on the last active row.
    pub fn stop(&mut self) {
        if !self.running.swap(false, Ordering::AcqRel) {
            return;
        }
        while self.state.swap_pending() {}
        let _ = A::timer_stop(&mut self.timer);
        unsafe {
            self.wiring.oe.set();
        }
        for &pin in &self.rgb_pins[..self.rgb_pin_count] {
            A::pin_low(pin);
        }
        for _ in 0..self.layout.columns {
            A::pin_high(self.clock_pin);
            A::clock_hold();
            A::pin_low(self.clock_pin);
            A::clock_hold();
        }
        unsafe {
            self.wiring.latch.set();
            self.wiring.latch.clear();
        }
    }

    /// Re-arms the timer after a prior `stop()`, without re-running layout or
    /// pin setup (`_PM_resume`). Resets the plane/row cursor so the next
    /// interrupt rolls over to plane 0, row 0, clears the frame counter and
    /// any pending swap, and starts the timer at a fixed initial interval
    /// rather than the period estimate from before the stop.
    pub fn resume(&mut self) {
        self.state.reset_for_resume();
        A::timer_init(&mut self.timer);
        A::timer_start(&mut self.timer, 1000);
        self.running.store(true, Ordering::Release);
    }

    /// Runs one scan-state-machine step. Call this from the timer interrupt
    /// the `Config`'s timer is wired to.
    ///
    /// Dispatches to the byte/word/long shifter chosen by the layout
    /// planner at `init` time; the match is resolved once per call (cheap
    /// next to a bitbanged GPIO loop) rather than stored as a function
    /// pointer, so each arm still monomorphizes to a branch-free shifter.
    ///
    /// # Safety
    /// Must only be called from the interrupt context the timer was
    /// configured against, and never reentrantly.
    pub unsafe fn isr_tick(&mut self) {
        use crate::arch::ElementWidth;
        use crate::scan::tick;
        match self.layout.element_width {
            ElementWidth::One => {
                tick::<u8, A>(&mut self.state, &self.wiring, &mut self.timer, &self.fb, &mut self.period)
            }
            ElementWidth::Two => {
                tick::<u16, A>(&mut self.state, &self.wiring, &mut self.timer, &self.fb, &mut self.period)
            }
            ElementWidth::Four => {
                tick::<u32, A>(&mut self.state, &self.wiring, &mut self.timer, &self.fb, &mut self.period)
            }
        }
    }

    /// Returns the frame counter accumulated since the last call, resetting
    /// it to zero (`_PM_getFrameCount`).
    pub fn take_frame_count(&self) -> u32 {
        self.state.take_frame_count()
    }

    /// Read-only view of the buffer currently being scanned out, for
    /// diagnostics (§F.2).
    pub fn active_buffer_bytes(&self) -> &[u8] {
        self.fb.scan_slice(0, 0, self.state.active_buffer())
    }

    /// Mutable access to the inactive buffer for plotting, plus the mask and
    /// remap tables needed to call [`crate::framebuffer::set_pixel`]. The
    /// trailing `u32` is `toggle_fill`, which callers must pass through
    /// unchanged so toggle-register targets keep their clock bit set.
    pub fn plot(&mut self) -> (&mut [u8], usize, u8, &[u32], &RemapTables, u32) {
        (
            self.fb.plot_buffer_mut(),
            self.layout.columns,
            self.num_planes,
            self.mask.rgb_masks(),
            &self.remap,
            self.mask.toggle_fill,
        )
    }

    /// Marks the just-finished frame in the plot buffer ready for display,
    /// requesting a buffer swap at the next frame boundary. A no-op when the
    /// driver was configured without double buffering.
    pub fn swap_buffers(&self) {
        self.state.request_swap();
    }
}

/// Releases the claimed port and stops the timer, matching `_PM_free`'s
/// responsibility -- except here it happens automatically on drop rather
/// than via an explicit call.
impl<A: HubArch> Drop for Core<A> {
    fn drop(&mut self) {
        self.stop();
        release_port(self.claimed_port);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // These exercise the port registry directly; a full `Core::init` test
    // needs a concrete `HubArch`, which is exercised end-to-end in the
    // downstream arch crates instead.

    #[test]
    fn claiming_same_port_twice_fails() {
        claim_port(0xDEAD_0000).unwrap();
        let err = claim_port(0xDEAD_0000).unwrap_err();
        assert_eq!(err, Error::Pins);
        release_port(0xDEAD_0000);
    }

    #[test]
    fn releasing_frees_the_slot_for_reuse() {
        claim_port(0xBEEF_0000).unwrap();
        release_port(0xBEEF_0000);
        claim_port(0xBEEF_0000).unwrap();
        release_port(0xBEEF_0000);
    }
}
