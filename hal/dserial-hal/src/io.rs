//! Adapter from `embedded-io` streams
//!
//! Most chip HALs expose their buffered UARTs through the `embedded-io`
//! traits. [`IoUart`] lifts any such stream into [`UartTx`] + [`UartRx`].

use embedded_io::{ErrorType, Read, ReadReady, Write};

use crate::uart::{UartRx, UartTx};

/// Wraps an `embedded-io` stream as a bus UART
#[derive(Debug)]
pub struct IoUart<T> {
    inner: T,
}

impl<T> IoUart<T> {
    /// Wrap a stream
    pub fn new(inner: T) -> Self {
        Self { inner }
    }

    /// Borrow the wrapped stream
    pub fn inner(&self) -> &T {
        &self.inner
    }

    /// Unwrap and return the stream
    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl<T: Write> UartTx for IoUart<T> {
    type Error = <T as ErrorType>::Error;

    fn write_blocking(&mut self, data: &[u8]) -> Result<(), Self::Error> {
        self.inner.write_all(data)
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        self.inner.flush()
    }
}

impl<T: Read + ReadReady> UartRx for IoUart<T> {
    type Error = <T as ErrorType>::Error;

    fn read_ready(&mut self) -> Result<bool, Self::Error> {
        self.inner.read_ready()
    }

    fn read_byte(&mut self) -> Result<Option<u8>, Self::Error> {
        let mut buf = [0u8; 1];
        match self.inner.read(&mut buf)? {
            0 => Ok(None),
            _ => Ok(Some(buf[0])),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::convert::Infallible;

    struct Loop {
        data: [u8; 8],
        len: usize,
        pos: usize,
    }

    impl ErrorType for Loop {
        type Error = Infallible;
    }

    impl Read for Loop {
        fn read(&mut self, buf: &mut [u8]) -> Result<usize, Infallible> {
            if self.pos >= self.len || buf.is_empty() {
                return Ok(0);
            }
            buf[0] = self.data[self.pos];
            self.pos += 1;
            Ok(1)
        }
    }

    impl ReadReady for Loop {
        fn read_ready(&mut self) -> Result<bool, Infallible> {
            Ok(self.pos < self.len)
        }
    }

    impl Write for Loop {
        fn write(&mut self, buf: &[u8]) -> Result<usize, Infallible> {
            let room = self.data.len() - self.len;
            let n = room.min(buf.len());
            self.data[self.len..self.len + n].copy_from_slice(&buf[..n]);
            self.len += n;
            Ok(n)
        }

        fn flush(&mut self) -> Result<(), Infallible> {
            Ok(())
        }
    }

    #[test]
    fn test_written_bytes_read_back() {
        let mut uart = IoUart::new(Loop {
            data: [0; 8],
            len: 0,
            pos: 0,
        });
        uart.write_blocking(&[0x82, 0x03, 0x83]).unwrap();
        assert_eq!(uart.try_read_byte(), Ok(Some(0x82)));
        assert_eq!(uart.try_read_byte(), Ok(Some(0x03)));
        assert_eq!(uart.try_read_byte(), Ok(Some(0x83)));
        assert_eq!(uart.try_read_byte(), Ok(None));
    }
}
