//! Performance measurement support, adapted from the teacher's
//! `util::measurement` (itself toggling GPIOC pins 8-11 directly). Compiled
//! out entirely unless the `measurement` feature is set.
//!
//! Since this core is arch-neutral, the four signals go through
//! [`HubArch::diag_high`]/[`HubArch::diag_low`] instead of a hardcoded
//! register block; a concrete arch maps them to whatever scope-visible pins
//! it likes (or leaves them as no-ops).

use crate::arch::{DiagSignal, HubArch};

/// Raises signal A around the scope of a call, for bracketing ISR phases.
/// No-op unless the `measurement` feature is enabled.
#[inline(always)]
pub fn sig_a_set<A: HubArch>() {
    #[cfg(feature = "measurement")]
    A::diag_high(DiagSignal::A);
}

#[inline(always)]
pub fn sig_a_clear<A: HubArch>() {
    #[cfg(feature = "measurement")]
    A::diag_low(DiagSignal::A);
}

#[inline(always)]
pub fn sig_b_set<A: HubArch>() {
    #[cfg(feature = "measurement")]
    A::diag_high(DiagSignal::B);
}

#[inline(always)]
pub fn sig_b_clear<A: HubArch>() {
    #[cfg(feature = "measurement")]
    A::diag_low(DiagSignal::B);
}

#[inline(always)]
pub fn sig_c_set<A: HubArch>() {
    #[cfg(feature = "measurement")]
    A::diag_high(DiagSignal::C);
}

#[inline(always)]
pub fn sig_c_clear<A: HubArch>() {
    #[cfg(feature = "measurement")]
    A::diag_low(DiagSignal::C);
}

#[inline(always)]
pub fn sig_d_set<A: HubArch>() {
    #[cfg(feature = "measurement")]
    A::diag_high(DiagSignal::D);
}

#[inline(always)]
pub fn sig_d_clear<A: HubArch>() {
    #[cfg(feature = "measurement")]
    A::diag_low(DiagSignal::D);
}
