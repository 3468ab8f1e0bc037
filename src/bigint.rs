//! Wide-integer primitives backing the fixed-point layer.
//!
//! `U256`/`U512` are generated with the `uint` crate's `construct_uint!` macro,
//! the same crate already used elsewhere in this codebase for decoding
//! wide on-chain integers. `I256` adds a sign on top of `U256` so the
//! fixed-point layer can represent the intermediate negatives that show up
//! during subtraction (`Wad`/`Ray` are non-negative in steady state, but
//! `a - b` can dip below zero mid-expression).

use crate::error::ArithmeticError;

uint::construct_uint! {
    pub struct U256(4);
}

uint::construct_uint! {
    pub struct U512(8);
}

/// Zero-extend a `U256` into a `U512`.
fn widen(x: U256) -> U512 {
    let mut limbs = [0u64; 8];
    limbs[..4].copy_from_slice(&x.0);
    U512(limbs)
}

/// Narrow a `U512` back down to `U256`, failing if the high limbs are non-zero.
fn narrow(x: U512) -> Result<U256, ArithmeticError> {
    if x.0[4..] != [0u64; 4] {
        return Err(ArithmeticError::Overflow);
    }
    let mut limbs = [0u64; 4];
    limbs.copy_from_slice(&x.0[..4]);
    Ok(U256(limbs))
}

/// A signed 256-bit integer: a sign bit plus a `U256` magnitude.
///
/// Zero is always canonicalized to the positive sign so that
/// `I256::zero() == -I256::zero()` and ordering stays well defined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct I256 {
    negative: bool,
    magnitude: U256,
}

impl I256 {
    pub fn zero() -> Self {
        I256 { negative: false, magnitude: U256::zero() }
    }

    pub fn is_zero(&self) -> bool {
        self.magnitude.is_zero()
    }

    pub fn is_negative(&self) -> bool {
        self.negative && !self.is_zero()
    }

    fn canonical(negative: bool, magnitude: U256) -> Self {
        I256 { negative: negative && !magnitude.is_zero(), magnitude }
    }

    pub fn from_u256(magnitude: U256) -> Self {
        I256::canonical(false, magnitude)
    }

    pub fn from_i128(value: i128) -> Self {
        if value < 0 {
            I256::canonical(true, U256::from(value.unsigned_abs()))
        } else {
            I256::canonical(false, U256::from(value as u128))
        }
    }

    pub fn to_i128(&self) -> Option<i128> {
        // U256's limbs are little-endian 64-bit words; anything above the
        // low two limbs means the magnitude cannot fit in 128 bits.
        if self.magnitude.0[2] != 0 || self.magnitude.0[3] != 0 {
            return None;
        }
        let magnitude = (self.magnitude.0[1] as u128) << 64 | self.magnitude.0[0] as u128;
        if self.negative {
            if magnitude > (i128::MAX as u128) + 1 {
                None
            } else {
                Some((magnitude as i128).wrapping_neg())
            }
        } else if magnitude > i128::MAX as u128 {
            None
        } else {
            Some(magnitude as i128)
        }
    }

    pub fn neg(&self) -> Self {
        I256::canonical(!self.negative, self.magnitude)
    }

    pub fn checked_add(&self, other: &Self) -> Result<Self, ArithmeticError> {
        if self.negative == other.negative {
            let magnitude = self
                .magnitude
                .checked_add(other.magnitude)
                .ok_or(ArithmeticError::Overflow)?;
            Ok(I256::canonical(self.negative, magnitude))
        } else if self.magnitude >= other.magnitude {
            Ok(I256::canonical(self.negative, self.magnitude - other.magnitude))
        } else {
            Ok(I256::canonical(other.negative, other.magnitude - self.magnitude))
        }
    }

    pub fn checked_sub(&self, other: &Self) -> Result<Self, ArithmeticError> {
        self.checked_add(&other.neg())
    }

    /// Raw wide multiplication: `self * other` as a sign plus a `U512`
    /// magnitude, with no scale division applied. The fixed-point layer
    /// divides this down by `SCALE` itself.
    pub fn checked_mul_wide(&self, other: &Self) -> (bool, U512) {
        let negative = self.negative ^ other.negative;
        let product = widen(self.magnitude).checked_mul(widen(other.magnitude));
        (negative, product.expect("U256 * U256 always fits in U512"))
    }

    pub fn checked_div(&self, other: &Self) -> Result<Self, ArithmeticError> {
        if other.magnitude.is_zero() {
            return Err(ArithmeticError::DivisionByZero);
        }
        let magnitude = self.magnitude / other.magnitude;
        Ok(I256::canonical(self.negative ^ other.negative, magnitude))
    }

    /// Divide a wide `U512` magnitude (as produced by `checked_mul_wide`) by
    /// `self`, truncating back down to `I256`. Used by `Wad`/`Ray` division,
    /// where the numerator has already been scaled up before the divide.
    pub fn checked_div_wide(negative: bool, numerator: U512, divisor: &Self) -> Result<Self, ArithmeticError> {
        if divisor.magnitude.is_zero() {
            return Err(ArithmeticError::DivisionByZero);
        }
        let quotient = numerator / widen(divisor.magnitude);
        let magnitude = narrow(quotient)?;
        Ok(I256::canonical(negative ^ divisor.negative, magnitude))
    }

    /// Truncate a wide `U512` product down to `I256`, failing if it does not
    /// fit back into 256 bits.
    pub fn from_wide(negative: bool, magnitude: U512) -> Result<Self, ArithmeticError> {
        let magnitude = narrow(magnitude)?;
        Ok(I256::canonical(negative, magnitude))
    }

    pub fn checked_mul_u128(&self, scalar: u128) -> Result<Self, ArithmeticError> {
        let (negative, wide) = self.checked_mul_wide(&I256::from_i128(scalar as i128));
        I256::from_wide(negative, wide)
    }
}

impl PartialOrd for I256 {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for I256 {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        use std::cmp::Ordering::*;
        match (self.negative, other.negative) {
            (false, true) => Greater,
            (true, false) => Less,
            (false, false) => self.magnitude.cmp(&other.magnitude),
            (true, true) => other.magnitude.cmp(&self.magnitude),
        }
    }
}

impl std::fmt::Display for I256 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.negative {
            write!(f, "-{}", self.magnitude)
        } else {
            write!(f, "{}", self.magnitude)
        }
    }
}
