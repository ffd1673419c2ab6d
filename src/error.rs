//! Caller-visible error taxonomy.

use core::fmt;

/// Failure modes reported synchronously by [`crate::Core::init`] and
/// [`crate::Core::begin`].
///
/// The scan ISR never returns one of these -- per its contract it can only do
/// less work (clamp a period, skip an address update) when something is
/// off-nominal.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[non_exhaustive]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// A null/missing instance, or no timer was supplied and the arch has no
    /// default.
    Arg,
    /// Allocating the framebuffer, the pin-list copy, or the address-pin
    /// array failed.
    Malloc,
    /// The RGB pins and the clock pin do not all resolve to the same port.
    Pins,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Error::Arg => "missing instance or timer argument",
            Error::Malloc => "allocation failed",
            Error::Pins => "RGB pins and clock pin are not on one port",
        };
        f.write_str(msg)
    }
}

/// Shorthand used throughout the crate for fallible setup operations.
pub type Result<T> = core::result::Result<T, Error>;
