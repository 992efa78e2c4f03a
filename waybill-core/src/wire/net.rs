//! Line-oriented view of a blocking transport, shaped like the wire
//! protocol: CRLF-tolerant response lines interleaved with
//! length-bounded binary payload reads.

use crate::error::{Result, WaybillError};
use crate::report::Report;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::TcpStream;
use std::time::Duration;

/// Blocking byte stream with a per-read timeout knob. A timed-out read
/// surfaces as an ordinary read error and fails the fetch.
pub trait Transport: Read + Write {
    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> io::Result<()>;
}

impl Transport for TcpStream {
    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> io::Result<()> {
        TcpStream::set_read_timeout(self, timeout)
    }
}

pub struct LineStream<T: Transport> {
    io: BufReader<T>,
}

impl<T: Transport> LineStream<T> {
    /// `timeout` applies to every subsequent read on the transport.
    pub fn new(mut transport: T, timeout: Option<Duration>) -> Result<Self> {
        transport.set_read_timeout(timeout)?;
        Ok(Self {
            io: BufReader::new(transport),
        })
    }

    pub fn get_ref(&self) -> &T {
        self.io.get_ref()
    }

    pub fn write_line(&mut self, line: &str) -> Result<()> {
        let t = self.io.get_mut();
        t.write_all(line.as_bytes())?;
        t.write_all(b"\n")?;
        t.flush()?;
        Ok(())
    }

    /// Read one line, without its terminator. EOF mid-conversation is a
    /// protocol error: servers end responses with a line, not a hangup.
    pub fn getline(&mut self) -> Result<String> {
        let mut line = String::new();
        let n = self.io.read_line(&mut line)?;
        if n == 0 {
            return Err(WaybillError::Protocol("unexpected end of stream".into()));
        }
        if line.ends_with('\n') {
            line.pop();
            if line.ends_with('\r') {
                line.pop();
            }
        }
        Ok(line)
    }

    /// Read a possibly multi-line response. Continuation lines carry `-`
    /// as their fourth byte; the final line does not. Every line is
    /// echoed to the sink.
    pub fn getline_multi(&mut self, report: &mut dyn Report) -> Result<String> {
        loop {
            let line = self.getline()?;
            report.line(&line);
            if line.as_bytes().get(3) != Some(&b'-') {
                return Ok(line);
            }
        }
    }

    /// Read up to `buf.len()` payload bytes. A zero-byte read means the
    /// connection died mid-payload.
    pub fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize> {
        let n = self.io.read(buf)?;
        if n == 0 {
            return Err(WaybillError::Protocol(
                "connection closed mid-payload".into(),
            ));
        }
        Ok(n)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::Transport;
    use std::io::{self, Cursor, Read, Write};
    use std::time::Duration;

    /// In-memory transport: scripted server output, captured client input.
    pub(crate) struct Scripted {
        rx: Cursor<Vec<u8>>,
        pub(crate) tx: Vec<u8>,
    }

    impl Scripted {
        pub(crate) fn new(server_bytes: Vec<u8>) -> Self {
            Self {
                rx: Cursor::new(server_bytes),
                tx: Vec::new(),
            }
        }
    }

    impl Read for Scripted {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.rx.read(buf)
        }
    }

    impl Write for Scripted {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.tx.write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Transport for Scripted {
        fn set_read_timeout(&mut self, _timeout: Option<Duration>) -> io::Result<()> {
            Ok(())
        }
    }
}
