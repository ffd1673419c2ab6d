//! The Arch Facade: everything this crate assumes a target platform provides
//! but does not implement itself.
//!
//! This mirrors the split the teacher driver draws between its portable ISR
//! logic and `util::stm32`/`util::armv7m` -- except here the facade is a
//! trait, not a hard dependency on one register crate, because §1 of the
//! design calls out timer wiring, interrupt wiring, GPIO register lookup,
//! pin direction, and microsecond delay as *collaborators*, not part of the
//! core. A concrete implementation (STM32, RP2040, ESP32, or a host
//! simulator for tests) lives downstream and plugs in via this trait; the
//! hot scan path is generic over it and monomorphizes to a branch-free
//! routine per target.

/// One of the four diagnostic signals the `measurement` feature can toggle
/// around ISR phases, named the way the teacher's `util::measurement` names
/// its GPIOC pins.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum DiagSignal {
    A,
    B,
    C,
    D,
}

/// Resolved width of the GPIO port element the RGB+clock pins live in.
///
/// See §4.1 of the design: the layout planner picks the smallest of these
/// that fits every relevant mask bit.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ElementWidth {
    One,
    Two,
    Four,
}

impl ElementWidth {
    pub const fn bytes(self) -> usize {
        match self {
            ElementWidth::One => 1,
            ElementWidth::Two => 2,
            ElementWidth::Four => 4,
        }
    }
}

/// Hardware-abstraction contract required by [`crate::Core`].
///
/// Every method that reads like a register lookup (`port_set_register`,
/// `port_bit_mask`, ...) is expected to be cheap/const-foldable -- on a real
/// target these are typically `match` statements over a small, fixed pin
/// enum, not runtime table lookups.
///
/// # Safety
///
/// Implementors must ensure the addresses returned by `port_*_register` are
/// valid, correctly-sized, volatile-safe memory-mapped I/O registers for the
/// lifetime of the program, and that `pin_*`/`delay_microseconds`/`timer_*`
/// faithfully perform the operations they name. `Core` trusts this contract
/// completely; it never validates addresses.
pub unsafe trait HubArch {
    /// Platform timer handle type (e.g. a peripheral timer register block).
    type Timer;

    /// Compile-time unroll factor for the shifter inner loop. Must be one of
    /// 1, 2, 4, 8, 16, 32, 64.
    const CHUNK_SIZE: usize;

    /// Whether the target exposes a single-write GPIO toggle register.
    const HAS_TOGGLE_REGISTER: bool;

    /// When set, shifters must always perform full 32-bit reads/writes to
    /// the port register and shift data into position by `port_offset *
    /// 8*element_width` bits rather than issuing narrower accesses.
    const STRICT_32BIT_IO: bool;

    /// Arch-defined floor under which [`crate::period::PeriodEstimator`]
    /// will not shrink `bit_zero_period`, regardless of measured timing.
    const MIN_MIN_PERIOD: u32;

    /// Timer tick rate, in ticks per second.
    const TIMER_FREQ: u32;

    /// Address of the atomic bit-set register for `pin`.
    fn port_set_register(pin: u8) -> usize;
    /// Address of the atomic bit-clear register for `pin`.
    fn port_clear_register(pin: u8) -> usize;
    /// Address of the atomic bit-toggle register for `pin`, if the platform
    /// has one. Must return `Some` consistently with `HAS_TOGGLE_REGISTER`.
    fn port_toggle_register(pin: u8) -> Option<usize>;
    /// 32-bit mask with exactly the bit corresponding to `pin` set, in its
    /// native, un-shifted port position.
    fn port_bit_mask(pin: u8) -> u32;
    /// Which byte (0..=3) of the 32-bit port `pin` lives in.
    fn byte_offset(pin: u8) -> u8;
    /// Which half-word (0..=1) of the 32-bit port `pin` lives in.
    fn word_offset(pin: u8) -> u8;
    /// Returns `true` if all the listed pins share one physical port.
    fn pins_share_port(pins: &[u8]) -> bool;

    fn pin_output(pin: u8);
    fn pin_high(pin: u8);
    fn pin_low(pin: u8);

    fn delay_microseconds(us: u32);

    /// Prepare a timer for use; called once from `begin`.
    fn timer_init(timer: &mut Self::Timer);
    /// (Re)arm `timer` to fire after `ticks` timer ticks.
    fn timer_start(timer: &mut Self::Timer, ticks: u32);
    /// Stop `timer` and return the number of ticks elapsed since it was
    /// started (used by the period estimator).
    fn timer_stop(timer: &mut Self::Timer) -> u32;

    /// Arch-defined no-op hold sequence inserted between a data write and
    /// the clock edge, for platforms whose CPU can outrun the panel's shift
    /// register. Default is empty.
    #[inline(always)]
    fn clock_hold() {}

    /// Raise a `measurement`-feature diagnostic signal. No-op unless the
    /// implementation overrides it; always compiled out when the
    /// `measurement` feature is disabled (see [`crate::util::measurement`]).
    #[inline(always)]
    fn diag_high(_signal: DiagSignal) {}
    /// Lower a `measurement`-feature diagnostic signal.
    #[inline(always)]
    fn diag_low(_signal: DiagSignal) {}
}
