// SPDX-License-Identifier: Apache-2.0

//! [`IoReader`]/[`IoWriter`] over a real file — the generic "platform byte
//! source/sink" adapter (in scope per spec §6), exercised against an actual
//! `std::fs::File` even though concrete file transports themselves are not
//! this crate's concern.

use std::io::{Read, Seek, SeekFrom, Write};
use estuary::{BufferedReader, BufferedWriter, IoReader, IoWriter};
use pretty_assertions::assert_eq;
use tempfile::tempfile;

#[test]
fn buffered_writer_over_a_real_file_then_read_back() {
	let mut file = tempfile().unwrap();
	{
		let mut writer = BufferedWriter::new(IoWriter::new(file.try_clone().unwrap()));
		for line in ["first", "second", "third"] {
			writer.write_utf8_line(line);
		}
		writer.close().unwrap();
	}

	file.seek(SeekFrom::Start(0)).unwrap();
	let mut contents = String::new();
	file.read_to_string(&mut contents).unwrap();
	assert_eq!(contents, "first\nsecond\nthird\n");
}

#[test]
fn buffered_reader_over_a_real_file() {
	let mut file = tempfile().unwrap();
	file.write_all(b"alpha\nbeta\ngamma").unwrap();
	file.seek(SeekFrom::Start(0)).unwrap();

	let mut reader = BufferedReader::new(IoReader::new(file));
	assert_eq!(reader.read_utf8_line().unwrap().as_deref(), Some("alpha"));
	assert_eq!(reader.read_utf8_line().unwrap().as_deref(), Some("beta"));
	assert_eq!(reader.read_utf8_line().unwrap().as_deref(), Some("gamma"));
	assert_eq!(reader.read_utf8_line().unwrap(), None);
}

#[test]
fn interrupted_os_errors_are_retried_transparently() {
	// IoReader/IoWriter translate std::io::ErrorKind::Interrupted into a
	// retry rather than surfacing it; a real file never raises it, but a
	// transfer across many blocks exercises the same read/write loop an
	// interrupted syscall would hit mid-stream.
	let mut file = tempfile().unwrap();
	let data = b"x".repeat(estuary::DEFAULT_BLOCK_SIZE * 3 + 17);
	{
		let mut writer = BufferedWriter::new(IoWriter::new(file.try_clone().unwrap()));
		writer.write_slice(&data);
		writer.close().unwrap();
	}
	file.seek(SeekFrom::Start(0)).unwrap();
	let mut reader = BufferedReader::new(IoReader::new(file));
	let read_back = reader.read_utf8_count(data.len()).unwrap();
	assert_eq!(read_back.into_bytes(), data);
}
