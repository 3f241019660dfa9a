//! Byte transports the containers read from and write to.
//!
//! LAZ data is normally read from and written to seekable streams
//! (files, in-memory cursors) which lets the containers jump to
//! the chunk table and to individual chunks.
//! Streams that cannot seek (pipes, sockets) are also supported by
//! wrapping them in [`Sequential`], in which case the chunk table
//! pointer is appended at the end of the data and random access is
//! not available.

use std::fs::File;
use std::io::{BufReader, BufWriter, Cursor, Read, Seek, SeekFrom, Write};

fn unsupported(what: &str) -> std::io::Error {
    std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        format!("{} is not supported on a sequential stream", what),
    )
}

/// A source of compressed bytes
pub trait ByteSource: Read {
    /// Current position, in bytes, from the start of the source
    fn position(&mut self) -> std::io::Result<u64>;

    fn seek_to(&mut self, position: u64) -> std::io::Result<()>;

    /// Seeks relative to the end of the source, returns the new position
    fn seek_end(&mut self, offset: i64) -> std::io::Result<u64>;

    fn is_seekable(&self) -> bool;

    /// Moves `num_bytes` forward, by seeking when possible or
    /// by reading and discarding otherwise.
    fn skip(&mut self, num_bytes: u64) -> std::io::Result<()> {
        if self.is_seekable() {
            let pos = self.position()?;
            self.seek_to(pos + num_bytes)
        } else {
            let mut limited = (&mut *self).take(num_bytes);
            let copied = std::io::copy(&mut limited, &mut std::io::sink())?;
            if copied != num_bytes {
                return Err(std::io::ErrorKind::UnexpectedEof.into());
            }
            Ok(())
        }
    }
}

/// A destination for compressed bytes
pub trait ByteSink: Write {
    fn position(&mut self) -> std::io::Result<u64>;

    fn seek_to(&mut self, position: u64) -> std::io::Result<()>;

    fn is_seekable(&self) -> bool;
}

macro_rules! seekable_source {
    () => {
        fn position(&mut self) -> std::io::Result<u64> {
            self.stream_position()
        }

        fn seek_to(&mut self, position: u64) -> std::io::Result<()> {
            self.seek(SeekFrom::Start(position)).map(|_| ())
        }

        fn seek_end(&mut self, offset: i64) -> std::io::Result<u64> {
            self.seek(SeekFrom::End(offset))
        }

        fn is_seekable(&self) -> bool {
            true
        }
    };
}

macro_rules! seekable_sink {
    () => {
        fn position(&mut self) -> std::io::Result<u64> {
            self.stream_position()
        }

        fn seek_to(&mut self, position: u64) -> std::io::Result<()> {
            self.seek(SeekFrom::Start(position)).map(|_| ())
        }

        fn is_seekable(&self) -> bool {
            true
        }
    };
}

impl<T: AsRef<[u8]>> ByteSource for Cursor<T> {
    seekable_source!();
}

impl ByteSource for File {
    seekable_source!();
}

impl<R: Read + Seek> ByteSource for BufReader<R> {
    seekable_source!();
}

impl<T> ByteSink for Cursor<T>
where
    Cursor<T>: Write + Seek,
{
    seekable_sink!();
}

impl ByteSink for File {
    seekable_sink!();
}

impl<W: Write + Seek> ByteSink for BufWriter<W> {
    seekable_sink!();
}

impl<S: ByteSource + ?Sized> ByteSource for &mut S {
    fn position(&mut self) -> std::io::Result<u64> {
        (**self).position()
    }

    fn seek_to(&mut self, position: u64) -> std::io::Result<()> {
        (**self).seek_to(position)
    }

    fn seek_end(&mut self, offset: i64) -> std::io::Result<u64> {
        (**self).seek_end(offset)
    }

    fn is_seekable(&self) -> bool {
        (**self).is_seekable()
    }

    fn skip(&mut self, num_bytes: u64) -> std::io::Result<()> {
        (**self).skip(num_bytes)
    }
}

impl<S: ByteSink + ?Sized> ByteSink for &mut S {
    fn position(&mut self) -> std::io::Result<u64> {
        (**self).position()
    }

    fn seek_to(&mut self, position: u64) -> std::io::Result<()> {
        (**self).seek_to(position)
    }

    fn is_seekable(&self) -> bool {
        (**self).is_seekable()
    }
}

/// Wraps a reader or writer and hides its ability to seek.
///
/// The number of bytes that went through is counted so that
/// positions can still be reported.
#[derive(Debug)]
pub struct Sequential<T> {
    inner: T,
    position: u64,
}

impl<T> Sequential<T> {
    pub fn new(inner: T) -> Self {
        Self { inner, position: 0 }
    }

    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl<R: Read> Read for Sequential<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.position += n as u64;
        Ok(n)
    }
}

impl<W: Write> Write for Sequential<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.position += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

impl<R: Read> ByteSource for Sequential<R> {
    fn position(&mut self) -> std::io::Result<u64> {
        Ok(self.position)
    }

    fn seek_to(&mut self, position: u64) -> std::io::Result<()> {
        if position == self.position {
            Ok(())
        } else {
            Err(unsupported("seeking"))
        }
    }

    fn seek_end(&mut self, _offset: i64) -> std::io::Result<u64> {
        Err(unsupported("seeking from the end"))
    }

    fn is_seekable(&self) -> bool {
        false
    }
}

impl<W: Write> ByteSink for Sequential<W> {
    fn position(&mut self) -> std::io::Result<u64> {
        Ok(self.position)
    }

    fn seek_to(&mut self, position: u64) -> std::io::Result<()> {
        if position == self.position {
            Ok(())
        } else {
            Err(unsupported("seeking"))
        }
    }

    fn is_seekable(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_sequential_counts_bytes() {
        let mut src = Sequential::new(Cursor::new(vec![1u8, 2, 3, 4, 5]));
        let mut buf = [0u8; 2];
        src.read_exact(&mut buf).unwrap();
        assert_eq!(ByteSource::position(&mut src).unwrap(), 2);
        assert!(!ByteSource::is_seekable(&src));
        assert!(ByteSource::seek_to(&mut src, 0).is_err());

        src.skip(2).unwrap();
        assert_eq!(ByteSource::position(&mut src).unwrap(), 4);
        assert_eq!(
            src.skip(5).unwrap_err().kind(),
            std::io::ErrorKind::UnexpectedEof
        );
    }

    #[test]
    fn test_cursor_skip_and_seek_end() {
        let mut src = Cursor::new(vec![0u8; 16]);
        src.skip(10).unwrap();
        assert_eq!(ByteSource::position(&mut src).unwrap(), 10);
        assert_eq!(src.seek_end(-8).unwrap(), 8);
    }

    #[test]
    fn test_sink_through_mut_ref() {
        let mut cursor = Cursor::new(Vec::<u8>::new());
        {
            let mut sink = &mut cursor;
            sink.write_all(&[1, 2, 3]).unwrap();
            assert_eq!(ByteSink::position(&mut sink).unwrap(), 3);
            ByteSink::seek_to(&mut sink, 1).unwrap();
            sink.write_all(&[9]).unwrap();
        }
        assert_eq!(cursor.into_inner(), vec![1, 9, 3]);
    }
}
