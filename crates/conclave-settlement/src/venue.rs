//! The external liquidity venue interface.
//!
//! The venue is called at most once per settlement, only by the
//! settlement engine, with the plaintext net residual. It is assumed
//! atomic: the swap either fully succeeds or the whole settlement
//! attempt is abandoned (and retried later against a PROCESSING batch).

use conclave_types::{Result, SwapDirection};

/// External swap venue for the unmatched residual of a batch.
pub trait LiquidityVenue {
    /// Swap `amount_in` in the given direction, returning the output.
    ///
    /// # Errors
    /// A failed swap returns [`conclave_types::ConclaveError::VenueFailure`];
    /// the caller must leave all ledger state untouched.
    fn swap(&mut self, amount_in: u64, direction: SwapDirection) -> Result<u64>;
}

/// Fixed-rate venue for tests, with one-shot failure injection.
/// **Never use in production.**
#[cfg(any(test, feature = "test-helpers"))]
pub use mock::MockVenue;

#[cfg(any(test, feature = "test-helpers"))]
mod mock {
    use conclave_types::{ConclaveError, Result, SwapDirection};

    use super::LiquidityVenue;

    /// Converts at a fixed `rate_num / rate_den` price in both directions.
    #[derive(Debug)]
    pub struct MockVenue {
        rate_num: u64,
        rate_den: u64,
        fail_next: bool,
        /// Every swap served, for assertions.
        pub swaps: Vec<(u64, SwapDirection)>,
    }

    impl MockVenue {
        /// 1:1 venue.
        #[must_use]
        pub fn flat() -> Self {
            Self::with_rate(1, 1)
        }

        #[must_use]
        pub fn with_rate(rate_num: u64, rate_den: u64) -> Self {
            assert!(rate_den > 0, "rate denominator must be non-zero");
            Self {
                rate_num,
                rate_den,
                fail_next: false,
                swaps: Vec::new(),
            }
        }

        /// Make the next swap fail.
        pub fn fail_next(&mut self) {
            self.fail_next = true;
        }
    }

    impl LiquidityVenue for MockVenue {
        #[allow(clippy::cast_possible_truncation)]
        fn swap(&mut self, amount_in: u64, direction: SwapDirection) -> Result<u64> {
            if self.fail_next {
                self.fail_next = false;
                return Err(ConclaveError::VenueFailure {
                    reason: "injected venue failure".into(),
                });
            }
            self.swaps.push((amount_in, direction));
            let out = u128::from(amount_in) * u128::from(self.rate_num) / u128::from(self.rate_den);
            Ok(out as u64)
        }
    }
}
