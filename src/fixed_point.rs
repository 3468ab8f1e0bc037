//! `Wad` (18-decimal) and `Ray` (27-decimal) fixed-point scalars.
//!
//! Both are thin wrappers over [`I256`](crate::bigint::I256); arithmetic is
//! scale-preserving (`mul`/`div` divide or multiply through the scale
//! factor) and truncates toward zero, matching the reference implementation
//! this crate's semantics are pinned to.

use crate::bigint::I256;
use crate::error::ArithmeticError;

const WAD_DECIMALS: u32 = 18;
const RAY_DECIMALS: u32 = 27;
const WAD_RAY_RATIO_DECIMALS: u32 = RAY_DECIMALS - WAD_DECIMALS;

static_assertions::const_assert!(RAY_DECIMALS > WAD_DECIMALS);

fn pow10(decimals: u32) -> u128 {
    10u128.pow(decimals)
}

macro_rules! impl_scalar {
    ($name:ident, $decimals:expr) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name(I256);

        impl $name {
            pub const DECIMALS: u32 = $decimals;

            fn scale() -> u128 {
                pow10(Self::DECIMALS)
            }

            pub fn zero() -> Self {
                $name(I256::zero())
            }

            pub fn is_zero(&self) -> bool {
                self.0.is_zero()
            }

            pub fn raw(&self) -> I256 {
                self.0
            }

            pub fn from_raw(raw: I256) -> Self {
                $name(raw)
            }

            /// Lifts an integer literal `n` to the fixed-point value `n.0`.
            pub fn from_value(n: i128) -> Self {
                $name(I256::from_i128(n).checked_mul_u128(Self::scale()).expect(
                    "from_value overflow: literal too large for this scale",
                ))
            }

            pub fn checked_add(&self, other: &Self) -> Result<Self, ArithmeticError> {
                Ok($name(self.0.checked_add(&other.0)?))
            }

            pub fn checked_sub(&self, other: &Self) -> Result<Self, ArithmeticError> {
                Ok($name(self.0.checked_sub(&other.0)?))
            }

            /// `self * other`, scale-preserving: `(self.raw * other.raw) / SCALE`.
            pub fn checked_mul(&self, other: &Self) -> Result<Self, ArithmeticError> {
                let (negative, wide) = self.0.checked_mul_wide(&other.0);
                let scale = I256::from_i128(Self::scale() as i128);
                let raw = I256::checked_div_wide(negative, wide, &scale)?;
                Ok($name(raw))
            }

            /// `self / other`, scale-preserving: `(self.raw * SCALE) / other.raw`.
            pub fn checked_div(&self, other: &Self) -> Result<Self, ArithmeticError> {
                let scale = I256::from_i128(Self::scale() as i128);
                let (negative, wide) = self.0.checked_mul_wide(&scale);
                let raw = I256::checked_div_wide(negative, wide, &other.0)?;
                Ok($name(raw))
            }
        }

        impl PartialOrd for $name {
            fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
                self.0.partial_cmp(&other.0)
            }
        }

        impl Ord for $name {
            fn cmp(&self, other: &Self) -> std::cmp::Ordering {
                self.0.cmp(&other.0)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

impl_scalar!(Wad, WAD_DECIMALS);
impl_scalar!(Ray, RAY_DECIMALS);

impl Wad {
    /// Lossless conversion `Wad -> Ray`: multiply the raw value by `10^9`.
    pub fn to_ray(&self) -> Ray {
        let raw = self
            .0
            .checked_mul_u128(pow10(WAD_RAY_RATIO_DECIMALS))
            .expect("Wad -> Ray conversion overflow");
        Ray::from_raw(raw)
    }
}

impl Ray {
    /// Truncating conversion `Ray -> Wad`: divide the raw value by `10^9`.
    pub fn to_wad(&self) -> Wad {
        let divisor = I256::from_i128(pow10(WAD_RAY_RATIO_DECIMALS) as i128);
        let raw = self.0.checked_div(&divisor).expect("Ray -> Wad division by a constant cannot fail");
        Wad::from_raw(raw)
    }
}
