// SPDX-License-Identifier: Apache-2.0

//! Typed writes over [`Buffer`]: fixed-width integers, decimal and
//! hexadecimal numeric text, and UTF-8.

use super::Buffer;

macro_rules! gen_int_writes {
	($($ty:ty => $be:ident, $le:ident);* $(;)?) => {
		$(
			#[doc = concat!("Writes a big-endian `", stringify!($ty), "`.")]
			pub fn $be(&mut self, value: $ty) {
				self.write_slice(&value.to_be_bytes());
			}

			#[doc = concat!("Writes a little-endian `", stringify!($ty), "`.")]
			pub fn $le(&mut self, value: $ty) {
				self.write_slice(&value.to_le_bytes());
			}
		)*
	};
}

impl Buffer {
	pub fn write_u8(&mut self, value: u8) {
		self.write_slice(&[value]);
	}

	pub fn write_i8(&mut self, value: i8) {
		self.write_slice(&[value as u8]);
	}

	gen_int_writes! {
		u16 => write_u16, write_u16_le;
		i16 => write_i16, write_i16_le;
		u32 => write_u32, write_u32_le;
		i32 => write_i32, write_i32_le;
		u64 => write_u64, write_u64_le;
		i64 => write_i64, write_i64_le;
	}

	/// Writes `value` as ASCII decimal digits, with a leading `-` for
	/// negative values.
	pub fn write_decimal_long(&mut self, value: i64) {
		let mut text = itoa_buf();
		write_decimal_into(&mut text, value);
		self.write_slice(text.as_bytes());
	}

	/// Writes `value` as lowercase ASCII hexadecimal digits, without
	/// leading zeroes (`0` itself writes a single `0`).
	pub fn write_hexadecimal_unsigned_long(&mut self, value: u64) {
		if value == 0 {
			self.write_slice(b"0");
			return;
		}
		let mut digits = [0u8; 16];
		let mut i = digits.len();
		let mut v = value;
		while v != 0 {
			i -= 1;
			digits[i] = HEX_DIGITS[(v & 0xf) as usize];
			v >>= 4;
		}
		self.write_slice(&digits[i..]);
	}

	/// Appends `text` as UTF-8.
	pub fn write_utf8(&mut self, text: &str) {
		self.write_slice(text.as_bytes());
	}

	/// Appends `text` as UTF-8 followed by `\n`.
	pub fn write_utf8_line(&mut self, text: &str) {
		self.write_utf8(text);
		self.write_slice(b"\n");
	}
}

const HEX_DIGITS: [u8; 16] = *b"0123456789abcdef";

fn itoa_buf() -> String {
	String::with_capacity(20)
}

fn write_decimal_into(out: &mut String, value: i64) {
	use std::fmt::Write;
	write!(out, "{value}").expect("writing into a String cannot fail");
}
