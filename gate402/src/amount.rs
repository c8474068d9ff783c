//! Human-readable prices and their conversion to token atomic units.
//!
//! Prices are written the way people write money (`"$0.01"`, `"0.01"`,
//! `"2"`) and converted to the smallest unit of a concrete token using the
//! token's decimals. All arithmetic goes through [`Decimal`]; floats never
//! touch an amount.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

/// Largest number of token decimals accepted by [`Price::to_atomic`].
///
/// `10^28` is the largest power of ten a [`Decimal`] can hold.
pub const MAX_DECIMALS: u8 = 28;

/// A non-negative price in whole currency units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Price(Decimal);

/// Errors produced when parsing or converting a [`Price`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PriceError {
    /// The price string was empty.
    #[error("price is empty")]
    Empty,
    /// The price string is not a decimal number.
    #[error("invalid price {input:?}: {reason}")]
    Invalid {
        /// The offending input.
        input: String,
        /// Parser message.
        reason: String,
    },
    /// The price is below zero.
    #[error("price must not be negative")]
    Negative,
    /// The price cannot be represented in the token's smallest unit.
    #[error("price {price} is finer than the smallest unit of a {decimals}-decimal token")]
    TooPrecise {
        /// The price that was being converted.
        price: Price,
        /// Decimals of the target token.
        decimals: u8,
    },
    /// The token decimals are outside the supported range.
    #[error("unsupported token decimals: {0}")]
    UnsupportedDecimals(u8),
    /// The converted amount does not fit the supported range.
    #[error("price {0} overflows the token amount range")]
    Overflow(Price),
}

impl Price {
    /// Zero price.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Creates a price from a decimal value.
    ///
    /// # Errors
    ///
    /// Returns [`PriceError::Negative`] for values below zero.
    pub fn new(value: Decimal) -> Result<Self, PriceError> {
        if value.is_sign_negative() && !value.is_zero() {
            return Err(PriceError::Negative);
        }
        Ok(Self(value))
    }

    /// Returns the underlying decimal value.
    #[must_use]
    pub const fn as_decimal(&self) -> Decimal {
        self.0
    }

    /// Converts the price into an integer amount of the token's smallest unit.
    ///
    /// `"$0.01"` of a 6-decimal token becomes `"10000"`.
    ///
    /// # Errors
    ///
    /// Returns [`PriceError::TooPrecise`] when the price has more fractional
    /// digits than the token, and [`PriceError::Overflow`] or
    /// [`PriceError::UnsupportedDecimals`] when the result cannot be represented.
    pub fn to_atomic(&self, decimals: u8) -> Result<String, PriceError> {
        if decimals > MAX_DECIMALS {
            return Err(PriceError::UnsupportedDecimals(decimals));
        }
        let scale = Decimal::from_i128_with_scale(10_i128.pow(u32::from(decimals)), 0);
        let scaled = self
            .0
            .checked_mul(scale)
            .ok_or(PriceError::Overflow(*self))?;
        if !scaled.fract().is_zero() {
            return Err(PriceError::TooPrecise {
                price: *self,
                decimals,
            });
        }
        let atomic = scaled.trunc().to_u128().ok_or(PriceError::Overflow(*self))?;
        Ok(atomic.to_string())
    }
}

impl FromStr for Price {
    type Err = PriceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed.strip_prefix('$').unwrap_or(trimmed).trim();
        if digits.is_empty() {
            return Err(PriceError::Empty);
        }
        let value = Decimal::from_str(digits).map_err(|e| PriceError::Invalid {
            input: s.to_owned(),
            reason: e.to_string(),
        })?;
        Self::new(value)
    }
}

impl Display for Price {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "${}", self.0.normalize())
    }
}
