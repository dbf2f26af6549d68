//! # File Operations
//!
//! Low-level helpers shared by the block log files.
//!
//! Reads are positional (`pread`), so any number of readers can share one
//! file handle with the writer without touching a cursor.

use std::fs::File;
use std::io::{self, Write};

/// Write the whole buffer, retrying short and interrupted writes.
///
/// Either every byte has been handed to the OS when this returns `Ok`, or the
/// first unrecoverable error is returned.
pub fn write_with_retry<W: Write>(writer: &mut W, buffer: &[u8]) -> io::Result<()> {
    let mut remaining = buffer;
    while !remaining.is_empty() {
        match writer.write(remaining) {
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::WriteZero,
                    "write returned zero bytes",
                ))
            }
            Ok(written) => remaining = &remaining[written..],
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

/// Write the whole buffer at `offset` without moving the file cursor.
pub fn write_all_at(file: &File, buffer: &[u8], offset: u64) -> io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::FileExt;
        file.write_all_at(buffer, offset)
    }
    #[cfg(windows)]
    {
        use std::os::windows::fs::FileExt;
        let mut remaining = buffer;
        let mut offset = offset;
        while !remaining.is_empty() {
            match file.seek_write(remaining, offset) {
                Ok(0) => return Err(io::Error::from(io::ErrorKind::WriteZero)),
                Ok(n) => {
                    remaining = &remaining[n..];
                    offset += n as u64;
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

/// Read exactly `length` bytes starting at `offset`.
///
/// Fails with `UnexpectedEof` if the region is not fully present.
pub fn read_exact_at(file: &File, offset: u64, length: usize) -> io::Result<Vec<u8>> {
    let mut buffer = vec![0u8; length];
    #[cfg(unix)]
    {
        use std::os::unix::fs::FileExt;
        file.read_exact_at(&mut buffer, offset)?;
    }
    #[cfg(windows)]
    {
        use std::os::windows::fs::FileExt;
        let mut filled = 0;
        while filled < length {
            match file.seek_read(&mut buffer[filled..], offset + filled as u64) {
                Ok(0) => return Err(io::Error::from(io::ErrorKind::UnexpectedEof)),
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }
    Ok(buffer)
}

/// Read one little-endian u64 at `offset`.
pub fn read_u64_at(file: &File, offset: u64) -> io::Result<u64> {
    let bytes = read_exact_at(file, offset, 8)?;
    let mut word = [0u8; 8];
    word.copy_from_slice(&bytes);
    Ok(u64::from_le_bytes(word))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Writer that accepts at most `chunk` bytes per call and fails every
    /// other call with `Interrupted`.
    struct FlakyWriter {
        data: Vec<u8>,
        chunk: usize,
        calls: usize,
    }

    impl Write for FlakyWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.calls += 1;
            if self.calls % 2 == 1 {
                return Err(io::Error::from(io::ErrorKind::Interrupted));
            }
            let n = buf.len().min(self.chunk);
            self.data.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct BrokenWriter;

    impl Write for BrokenWriter {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::Other, "disk on fire"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct ZeroWriter;

    impl Write for ZeroWriter {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Ok(0)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_short_and_interrupted_writes_are_retried() {
        let mut writer = FlakyWriter {
            data: Vec::new(),
            chunk: 3,
            calls: 0,
        };
        let payload: Vec<u8> = (0..100u8).collect();

        write_with_retry(&mut writer, &payload).expect("write");

        assert_eq!(writer.data, payload);
        assert!(writer.calls > 60);
    }

    #[test]
    fn test_hard_error_is_reported() {
        let err = write_with_retry(&mut BrokenWriter, b"abc").expect_err("must fail");
        assert_eq!(err.kind(), io::ErrorKind::Other);
    }

    #[test]
    fn test_zero_length_write_is_an_error() {
        let err = write_with_retry(&mut ZeroWriter, b"abc").expect_err("must fail");
        assert_eq!(err.kind(), io::ErrorKind::WriteZero);
    }

    #[test]
    fn test_empty_buffer_is_noop() {
        write_with_retry(&mut ZeroWriter, b"").expect("nothing to write");
    }

    #[test]
    fn test_positional_reads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data");
        std::fs::write(&path, [1u8, 0, 0, 0, 0, 0, 0, 0, 9, 9]).unwrap();
        let file = File::open(&path).unwrap();

        assert_eq!(read_u64_at(&file, 0).unwrap(), 1);
        assert_eq!(read_exact_at(&file, 8, 2).unwrap(), vec![9, 9]);

        let err = read_exact_at(&file, 8, 3).expect_err("past end");
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }
}
