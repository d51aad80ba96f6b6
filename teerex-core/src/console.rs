//! The supervisor's one console write (spec §4.8, C4): "any blocking write
//! to a file descriptor that nothing reads ... can deadlock the writer."
//! The startup banner may reach the real console; every write after that is
//! redirected to a bit bucket so a dead reader downstream can never stall
//! the enclave.

use std::io::{self, Write};
use std::sync::Mutex;

enum Target {
    Open(Box<dyn Write + Send>),
    Sealed,
}

/// Owns the one file descriptor the enclave's startup banner is allowed to
/// reach. `seal` is one-way: once called, every further write is dropped
/// instead of reaching the underlying writer, no matter how slow or absent
/// its reader is.
pub struct Console {
    target: Mutex<Target>,
}

impl Console {
    /// Wrap `writer` (the serial console, or stdout) as the target banner
    /// writes reach until `seal` is called.
    pub fn new(writer: impl Write + Send + 'static) -> Self {
        Self {
            target: Mutex::new(Target::Open(Box::new(writer))),
        }
    }

    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }

    /// Write one line to the console, if it's still open. Used for the
    /// single startup banner line spec §4.8 allows through.
    pub fn banner(&self, line: &str) -> io::Result<()> {
        self.write(line.as_bytes())?;
        self.write(b"\n")
    }

    /// Permanently redirect subsequent writes to the bit bucket.
    pub fn seal(&self) {
        *self.target.lock().unwrap() = Target::Sealed;
    }

    pub fn write(&self, bytes: &[u8]) -> io::Result<()> {
        let mut target = self.target.lock().unwrap();
        match &mut *target {
            Target::Open(w) => {
                w.write_all(bytes)?;
                w.flush()
            }
            Target::Sealed => Ok(()),
        }
    }
}

#[cfg(test)]
mod test {
    use std::sync::mpsc;
    use std::time::{Duration, Instant};

    use super::*;

    struct BoundedBlockingWriter(mpsc::SyncSender<u8>);

    impl Write for BoundedBlockingWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            for &b in buf {
                self.0
                    .send(b)
                    .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "no reader"))?;
            }
            Ok(buf.len())
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn sealed_writes_never_block_on_a_dead_reader() {
        // A "console" whose backing buffer holds 256 bytes (room for the
        // banner) and is never drained, standing in for the serial tty's
        // small, unread buffer.
        let (tx, _rx) = mpsc::sync_channel(256);
        let console = Console::new(BoundedBlockingWriter(tx));

        let start = Instant::now();
        console.banner("teerex-enclave: prove service ready").unwrap();
        assert!(start.elapsed() < Duration::from_secs(1));

        console.seal();

        // Emit well over 4 KiB post-seal; must not block despite the
        // backing buffer having long since filled and nothing reading it.
        let start = Instant::now();
        for _ in 0..64 {
            console.write(&[0u8; 64]).unwrap();
        }
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
