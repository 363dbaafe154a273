// SPDX-License-Identifier: Apache-2.0

//! Typed reads over [`Buffer`]: fixed-width integers, decimal and
//! hexadecimal numeric text, and UTF-8.

use super::Buffer;
use crate::error::{Error, ErrorKind, Result};

macro_rules! gen_int_reads {
	($($ty:ty => $be:ident, $le:ident);* $(;)?) => {
		$(
			#[doc = concat!("Reads a big-endian `", stringify!($ty), "`.")]
			pub fn $be(&mut self) -> Result<$ty> {
				let mut buf = [0u8; std::mem::size_of::<$ty>()];
				self.read_exact(&mut buf)?;
				Ok(<$ty>::from_be_bytes(buf))
			}

			#[doc = concat!("Reads a little-endian `", stringify!($ty), "`.")]
			pub fn $le(&mut self) -> Result<$ty> {
				let mut buf = [0u8; std::mem::size_of::<$ty>()];
				self.read_exact(&mut buf)?;
				Ok(<$ty>::from_le_bytes(buf))
			}
		)*
	};
}

impl Buffer {
	pub fn read_u8(&mut self) -> Result<u8> {
		let mut buf = [0u8; 1];
		self.read_exact(&mut buf)?;
		Ok(buf[0])
	}

	pub fn read_i8(&mut self) -> Result<i8> {
		self.read_u8().map(|b| b as i8)
	}

	gen_int_reads! {
		u16 => read_u16, read_u16_le;
		i16 => read_i16, read_i16_le;
		u32 => read_u32, read_u32_le;
		i32 => read_i32, read_i32_le;
		u64 => read_u64, read_u64_le;
		i64 => read_i64, read_i64_le;
	}

	/// Reads a sequence of ASCII decimal digits (with an optional leading
	/// `-`) as a signed 64-bit integer. Fails with `NumberFormat` on
	/// overflow or if no digits were consumed, `Eof` if the buffer was
	/// empty to begin with.
	pub fn read_decimal_long(&mut self) -> Result<i64> {
		if self.exhausted() {
			return Err(Error::eof());
		}
		let negative = self.peek_first_byte_is(b'-');
		if negative {
			self.skip(1);
		}
		// Accumulate as a negative value: i64::MIN's magnitude has no
		// positive counterpart, so "-9223372036854775808" would overflow
		// if accumulated positively and negated at the end.
		let mut value: i64 = 0;
		let mut digits = 0usize;
		loop {
			let Some(byte) = self.peek_first_byte() else { break };
			if !byte.is_ascii_digit() {
				break;
			}
			self.skip(1);
			digits += 1;
			let digit = (byte - b'0') as i64;
			value = value
				.checked_mul(10)
				.and_then(|v| v.checked_sub(digit))
				.ok_or_else(|| Error::with_message(ErrorKind::NumberFormat, "decimal value out of range"))?;
		}
		if digits == 0 {
			return Err(Error::with_message(ErrorKind::NumberFormat, "expected a decimal digit"));
		}
		if negative {
			Ok(value)
		} else {
			value
				.checked_neg()
				.ok_or_else(|| Error::with_message(ErrorKind::NumberFormat, "decimal value out of range"))
		}
	}

	/// Reads up to 16 ASCII hexadecimal digits as an unsigned 64-bit
	/// integer.
	pub fn read_hexadecimal_unsigned_long(&mut self) -> Result<u64> {
		if self.exhausted() {
			return Err(Error::eof());
		}
		let mut value: u64 = 0;
		let mut digits = 0usize;
		loop {
			let Some(byte) = self.peek_first_byte() else { break };
			let Some(digit) = (byte as char).to_digit(16) else { break };
			if digits == 16 {
				return Err(Error::with_message(ErrorKind::NumberFormat, "hexadecimal value out of range"));
			}
			self.skip(1);
			digits += 1;
			value = (value << 4) | digit as u64;
		}
		if digits == 0 {
			return Err(Error::with_message(ErrorKind::NumberFormat, "expected a hexadecimal digit"));
		}
		Ok(value)
	}

	/// Reads the entire remaining buffer as UTF-8, replacing invalid
	/// sequences with U+FFFD.
	pub fn read_utf8(&mut self) -> Result<String> {
		let n = self.size();
		self.read_utf8_count(n)
	}

	/// Reads exactly `byte_count` bytes and decodes them as UTF-8,
	/// replacing invalid sequences with U+FFFD.
	pub fn read_utf8_count(&mut self, byte_count: usize) -> Result<String> {
		let mut buf = vec![0u8; byte_count];
		self.read_exact(&mut buf)?;
		Ok(decode_lossy(&buf))
	}

	/// Reads a line terminated by `\n` or `\r\n`, excluding the
	/// terminator. If the buffer is exhausted without a terminator, the
	/// remaining bytes (possibly none) are returned as the final line.
	pub fn read_utf8_line(&mut self) -> Result<Option<String>> {
		if self.exhausted() {
			return Ok(None);
		}
		match self.index_of(b'\n', 0, None) {
			Some(pos) => {
				let has_cr = pos > 0 && self.get(pos - 1).ok() == Some(b'\r');
				let line_len = if has_cr { pos - 1 } else { pos };
				let line = self.read_utf8_count(line_len)?;
				self.skip(if has_cr { 2 } else { 1 });
				Ok(Some(line))
			}
			None => {
				let rest = self.size();
				Ok(Some(self.read_utf8_count(rest)?))
			}
		}
	}

	/// Like [`Self::read_utf8_line`], but fails with `Eof` instead of
	/// returning a final unterminated line.
	pub fn read_utf8_line_strict(&mut self) -> Result<String> {
		match self.index_of(b'\n', 0, None) {
			Some(pos) => {
				let has_cr = pos > 0 && self.get(pos - 1).ok() == Some(b'\r');
				let line_len = if has_cr { pos - 1 } else { pos };
				let line = self.read_utf8_count(line_len)?;
				self.skip(if has_cr { 2 } else { 1 });
				Ok(line)
			}
			None => Err(Error::eof()),
		}
	}

	fn peek_first_byte(&self) -> Option<u8> {
		self.get(0).ok()
	}

	fn peek_first_byte_is(&self, byte: u8) -> bool {
		self.peek_first_byte() == Some(byte)
	}
}

fn decode_lossy(bytes: &[u8]) -> String {
	match simdutf8::basic::from_utf8(bytes) {
		Ok(s) => s.to_owned(),
		Err(_) => String::from_utf8_lossy(bytes).into_owned(),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn reads_big_and_little_endian_integers() {
		let mut buf = Buffer::new();
		buf.write_slice(&0x01020304u32.to_be_bytes());
		assert_eq!(buf.read_u32().unwrap(), 0x01020304);

		buf.write_slice(&0x01020304u32.to_le_bytes());
		assert_eq!(buf.read_u32_le().unwrap(), 0x01020304);
	}

	#[test]
	fn reads_decimal_long_including_negative() {
		let mut buf = Buffer::new();
		buf.write_slice(b"-42");
		assert_eq!(buf.read_decimal_long().unwrap(), -42);
	}

	#[test]
	fn decimal_long_rejects_empty_input() {
		let mut buf = Buffer::new();
		buf.write_slice(b"x");
		assert!(buf.read_decimal_long().is_err());
	}

	#[test]
	fn decimal_long_parses_i64_min() {
		let mut buf = Buffer::new();
		buf.write_slice(b"-9223372036854775808");
		assert_eq!(buf.read_decimal_long().unwrap(), i64::MIN);
	}

	#[test]
	fn decimal_long_rejects_i64_min_magnitude_without_sign() {
		let mut buf = Buffer::new();
		buf.write_slice(b"9223372036854775808");
		assert!(buf.read_decimal_long().is_err());
	}

	#[test]
	fn reads_hexadecimal_unsigned_long() {
		let mut buf = Buffer::new();
		buf.write_slice(b"ff00");
		assert_eq!(buf.read_hexadecimal_unsigned_long().unwrap(), 0xff00);
	}

	#[test]
	fn reads_utf8_lines_with_and_without_cr() {
		let mut buf = Buffer::new();
		buf.write_slice(b"first\r\nsecond\nthird");
		assert_eq!(buf.read_utf8_line().unwrap().as_deref(), Some("first"));
		assert_eq!(buf.read_utf8_line().unwrap().as_deref(), Some("second"));
		assert_eq!(buf.read_utf8_line().unwrap().as_deref(), Some("third"));
		assert_eq!(buf.read_utf8_line().unwrap(), None);
	}

	#[test]
	fn strict_line_read_fails_without_terminator() {
		let mut buf = Buffer::new();
		buf.write_slice(b"no newline here");
		assert!(buf.read_utf8_line_strict().is_err());
	}

	#[test]
	fn invalid_utf8_is_replaced_with_replacement_char() {
		let mut buf = Buffer::new();
		buf.write_slice(&[0xff, 0xfe]);
		let text = buf.read_utf8().unwrap();
		assert!(text.contains('\u{FFFD}'));
	}
}
