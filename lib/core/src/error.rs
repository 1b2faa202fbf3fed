//! Error handling foundation for spectrum-compass.
//!
//! This module provides only the `Result` type alias using rootcause.
//! Each crate defines its own domain-specific error types in their own
//! error modules; fallible setup paths return `Report<E>` so callers can
//! layer context on top as errors propagate.

use rootcause::Report;

/// A Result type alias using rootcause's Report for error handling.
pub type Result<T, C = ()> = std::result::Result<T, Report<C>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn result_type_works() {
        let ok: Result<&str> = Ok("ready");
        assert_eq!(ok.expect("should be ok"), "ready");
    }
}
