//! Fixed-point price conversion.
//!
//! Converts a pool's square-root price at 2^96 scale into an integer price
//! scaled to 6 decimals. Integer-only: the squared value is scaled by the
//! decimal difference of the pair, then divided down by 2^192. Inputs above
//! 2^128 are pre-divided by 2^64 before squaring so the square stays inside
//! 256 bits.

use alloy_primitives::U256;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConversionError {
	#[error("Price is non-positive")]
	NonPositive,

	#[error("Price conversion overflowed")]
	Overflow,
}

/// Output decimals of every converted price.
pub const PRICE_DECIMALS: u32 = 6;

/// Converts a sqrt price at 2^96 scale to an integer price at 6 decimals.
///
/// `decimals0`/`decimals1` are the pair's token decimals; `invert` quotes
/// the reciprocal, scaled by 10^12 so the result stays at 6 decimals.
pub fn price_e6(
	sqrt_price_x96: U256,
	decimals0: u8,
	decimals1: u8,
	invert: bool,
) -> Result<u128, ConversionError> {
	if sqrt_price_x96.is_zero() {
		return Err(ConversionError::NonPositive);
	}

	// Pre-divide before squaring once the square would not fit 256 bits.
	let threshold = U256::from(1) << 128;
	let (reduced, halved_shift) = if sqrt_price_x96 >= threshold {
		(sqrt_price_x96 >> 64, 64usize)
	} else {
		(sqrt_price_x96, 0usize)
	};

	let squared = reduced
		.checked_mul(reduced)
		.ok_or(ConversionError::Overflow)?;

	// (x / 2^64)^2 = x^2 / 2^128, so the remaining divisor shrinks by 128.
	let divisor_shift = 192 - 2 * halved_shift;

	let exponent = PRICE_DECIMALS as i32 + decimals0 as i32 - decimals1 as i32;

	let value = if exponent >= 0 {
		let scale = U256::from(10)
			.checked_pow(U256::from(exponent as u64))
			.ok_or(ConversionError::Overflow)?;
		squared
			.checked_mul(scale)
			.ok_or(ConversionError::Overflow)?
			>> divisor_shift
	} else {
		let scale = U256::from(10)
			.checked_pow(U256::from((-exponent) as u64))
			.ok_or(ConversionError::Overflow)?;
		let divisor = scale
			.checked_mul(U256::from(1) << divisor_shift)
			.ok_or(ConversionError::Overflow)?;
		squared / divisor
	};

	let value = if invert {
		if value.is_zero() {
			return Err(ConversionError::NonPositive);
		}
		// Reciprocal of a 6-decimal price, rescaled to 6 decimals.
		U256::from(10).pow(U256::from(12u64)) / value
	} else {
		value
	};

	if value.is_zero() {
		return Err(ConversionError::NonPositive);
	}

	u128::try_from(value).map_err(|_| ConversionError::Overflow)
}

#[cfg(test)]
mod tests {
	use super::*;

	fn q96() -> U256 {
		U256::from(1) << 96
	}

	#[test]
	fn test_unit_price() {
		// sqrtPrice = 2^96 encodes a price of exactly 1.0.
		assert_eq!(price_e6(q96(), 18, 18, false).unwrap(), 1_000_000);
	}

	#[test]
	fn test_unit_price_inverted() {
		assert_eq!(price_e6(q96(), 18, 18, true).unwrap(), 1_000_000);
	}

	#[test]
	fn test_inversion_is_reciprocal() {
		// Price 4.0: sqrtPrice = 2 * 2^96.
		let sqrt = q96() * U256::from(2);
		assert_eq!(price_e6(sqrt, 18, 18, false).unwrap(), 4_000_000);
		// Reciprocal: 10^12 / 4_000_000 = 250_000.
		assert_eq!(price_e6(sqrt, 18, 18, true).unwrap(), 250_000);
	}

	#[test]
	fn test_decimal_difference_scaling() {
		// 18/6 pair at nominal price 1.0: raw pool price is 10^-12,
		// the decimal shift brings it back to 1.0 at 6 decimals.
		//
		// sqrtPrice encoding raw 10^-12 is 2^96 / 10^6.
		let sqrt = q96() / U256::from(1_000_000u64);
		let out = price_e6(sqrt, 18, 6, false).unwrap();
		// Rounding down in the sqrt division loses a few ppm.
		assert!((999_990..=1_000_000).contains(&out), "out = {}", out);
	}

	#[test]
	fn test_large_input_predivision() {
		// 2^130 squares past 256 bits; the pre-division path must produce
		// the exact mathematical result (2^34)^2 * 10^6 = 2^68 * 10^6.
		let sqrt = U256::from(1) << 130;
		let expected = (1u128 << 68) * 1_000_000;
		assert_eq!(price_e6(sqrt, 18, 18, false).unwrap(), expected);
	}

	#[test]
	fn test_zero_rejected() {
		assert_eq!(
			price_e6(U256::ZERO, 18, 18, false),
			Err(ConversionError::NonPositive)
		);
	}

	#[test]
	fn test_dust_price_rejected() {
		// A sqrt price so small the 6-decimal output truncates to zero.
		assert_eq!(
			price_e6(U256::from(1u64), 18, 18, false),
			Err(ConversionError::NonPositive)
		);
	}
}
