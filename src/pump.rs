//! I/O Pump: the single-threaded cooperative loop multiplexing CONSOLE
//! (stdin/stdout) and DEVICE (the serial line).
//!
//! Grounded on `original_source/src/OpenRS.c`'s `main()` loop: CONSOLE is
//! polled first and drains immediately when ready; only when CONSOLE has
//! nothing pending does the pump check DEVICE. A short sleep follows
//! either a DEVICE read (original: `usleep(1000)`) or a fully idle pass
//! (original: `usleep(5000)`) to avoid busy-spinning the CPU. Readiness
//! is checked with `nix::poll` rather than the original's `select()` —
//! same level-triggered, zero-timeout shape, idiomatic for the crates
//! already in the dependency stack.

use std::fs::File;
use std::io::{self, Read, Write};
use std::os::unix::io::AsFd;
use std::thread::sleep;
use std::time::Duration;

use log::{error, warn};
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};

use crate::console::normalize_key;
use crate::session::Session;

/// CONSOLE byte that terminates the pump (Ctrl-C).
const EXIT_KEY: u8 = 0x03;

/// Max EAGAIN write retries before giving up on a DEVICE write.
const WRITE_RETRY_LIMIT: usize = 100;

/// Sleep after a DEVICE read was processed (original: `usleep(1000)`).
const BUSY_SLEEP: Duration = Duration::from_millis(1);
/// Sleep when neither endpoint had anything ready (original: `usleep(5000)`).
const IDLE_SLEEP: Duration = Duration::from_millis(5);

/// Outcome of one pump iteration.
pub enum Tick {
    /// Keep looping.
    Continue,
    /// CONSOLE sent the exit key; shut down cleanly.
    Exit,
}

/// Run the pump until CONSOLE sends the exit key or a fatal I/O error
/// occurs on DEVICE.
pub fn run(device: &mut File, session: &mut Session) -> io::Result<()> {
    loop {
        match tick(device, session)? {
            Tick::Continue => {}
            Tick::Exit => return Ok(()),
        }
    }
}

fn tick(device: &mut File, session: &mut Session) -> io::Result<Tick> {
    let stdin = io::stdin();
    if is_readable(stdin.as_fd())? {
        let mut byte = [0u8; 1];
        if stdin.lock().read(&mut byte)? == 0 {
            return Ok(Tick::Exit);
        }
        let key = normalize_key(byte[0]);
        if key == EXIT_KEY {
            return Ok(Tick::Exit);
        }
        put_port(device, key)?;
        return Ok(Tick::Continue);
    }

    if is_readable(device.as_fd())? {
        let mut buf = [0u8; 1024];
        let n = device.read(&mut buf)?;
        let mut reply = Vec::new();
        let mut echo = Vec::new();
        for &b in &buf[..n] {
            if let Some(c) = session.on_device_byte(b, &mut reply) {
                echo.push(c);
            }
        }
        if !echo.is_empty() {
            io::stdout().write_all(&echo)?;
            io::stdout().flush()?;
        }
        for b in reply {
            put_port(device, b)?;
        }
        sleep(BUSY_SLEEP);
        return Ok(Tick::Continue);
    }

    sleep(IDLE_SLEEP);
    Ok(Tick::Continue)
}

fn is_readable(fd: impl AsFd) -> io::Result<bool> {
    let mut fds = [PollFd::new(fd.as_fd(), PollFlags::POLLIN)];
    let n = poll(&mut fds, PollTimeout::from(0u16)).map_err(|e| io::Error::from_raw_os_error(e as i32))?;
    Ok(n > 0 && fds[0].revents().unwrap_or(PollFlags::empty()).contains(PollFlags::POLLIN))
}

/// Write a run of raw bytes to DEVICE up front, e.g. an initial command
/// line given on the CLI. Each byte goes through the same EAGAIN-retry
/// path as the pump's own writes.
pub fn send_bytes(device: &mut File, bytes: &[u8]) -> io::Result<()> {
    for &b in bytes {
        put_port(device, b)?;
    }
    Ok(())
}

/// Write one already-escaped byte to DEVICE, retrying on EAGAIN the way
/// the original's `putPort()` does (1ms sleep between attempts, up to
/// [`WRITE_RETRY_LIMIT`] tries). Once the retry budget is exhausted the
/// byte is logged and dropped rather than treated as fatal; any
/// non-EAGAIN write error is fatal and propagated.
fn put_port(device: &mut File, byte: u8) -> io::Result<()> {
    let mut attempts = 0;
    loop {
        match device.write_all(&[byte]) {
            Ok(()) => return Ok(()),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                if attempts >= WRITE_RETRY_LIMIT {
                    warn!("dropping byte {byte:#04x} after {WRITE_RETRY_LIMIT} EAGAIN retries");
                    return Ok(());
                }
                attempts += 1;
                sleep(Duration::from_millis(1));
            }
            Err(e) => {
                error!("unrecoverable error writing to serial port: {e}");
                return Err(e);
            }
        }
    }
}
