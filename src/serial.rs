//! DEVICE endpoint: opens and configures the serial line to the TNC.
//!
//! Grounded on `original_source/src/OpenRS.c`'s `openSerial()`: 8-N-1,
//! receiver enabled, no modem handshake, non-blocking reads (`VMIN=0`,
//! `VTIME=0`). Configured here with `nix::sys::termios` the way
//! `other_examples/.../tty.rs` configures its own serial line, rather
//! than hand-rolling raw `ioctl`/`libc::termios` calls.

use std::fs::{File, OpenOptions};
use std::os::unix::io::AsRawFd;
use std::path::Path;

use anyhow::{Context, Result};
use nix::fcntl::{fcntl, FcntlArg, OFlag};
use nix::sys::termios::{self, BaudRate, ControlFlags, SetArg};

/// Open and configure the serial device at `path` for 8-N-1 operation at
/// `bitrate`. Falls back to [`DEFAULT_BITRATE`] if `bitrate` doesn't match
/// a `termios` baud constant.
pub fn open_device(path: &Path, bitrate: u32) -> Result<File> {
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .open(path)
        .with_context(|| format!("can't open device {}", path.display()))?;
    let fd = file.as_raw_fd();

    let baud = baud_rate(bitrate).unwrap_or(BaudRate::B19200);

    let mut settings = termios::tcgetattr(&file)
        .with_context(|| format!("can't get terminal settings for {}", path.display()))?;

    settings.control_chars[termios::SpecialCharacterIndices::VTIME as usize] = 0;
    settings.control_chars[termios::SpecialCharacterIndices::VMIN as usize] = 0;
    settings.input_flags = termios::InputFlags::IGNBRK;
    settings.output_flags = termios::OutputFlags::empty();
    settings.local_flags = termios::LocalFlags::empty();
    settings.control_flags |= ControlFlags::CS8 | ControlFlags::CREAD | ControlFlags::CLOCAL;
    settings.control_flags &=
        !(ControlFlags::CSTOPB | ControlFlags::PARENB | ControlFlags::HUPCL);

    termios::cfsetispeed(&mut settings, baud)
        .with_context(|| format!("can't set input bitrate on {}", path.display()))?;
    termios::cfsetospeed(&mut settings, baud)
        .with_context(|| format!("can't set output bitrate on {}", path.display()))?;

    termios::tcsetattr(&file, SetArg::TCSADRAIN, &settings)
        .with_context(|| format!("can't apply terminal settings to {}", path.display()))?;

    // The read loop relies on a short non-blocking poll rather than VMIN/
    // VTIME timing to decide when data is available, so mark the fd
    // non-blocking as well.
    let flags = OFlag::from_bits_truncate(
        fcntl(fd, FcntlArg::F_GETFL).with_context(|| "can't read device fd flags")?,
    );
    fcntl(fd, FcntlArg::F_SETFL(flags | OFlag::O_NONBLOCK))
        .with_context(|| "can't set device fd non-blocking")?;

    Ok(file)
}

/// Map a requested bps value onto the handful of rates `termios` knows.
/// Anything unrecognized falls back to [`DEFAULT_BITRATE`] in the caller.
fn baud_rate(bitrate: u32) -> Option<BaudRate> {
    Some(match bitrate {
        1200 => BaudRate::B1200,
        2400 => BaudRate::B2400,
        4800 => BaudRate::B4800,
        9600 => BaudRate::B9600,
        19200 => BaudRate::B19200,
        38400 => BaudRate::B38400,
        57600 => BaudRate::B57600,
        115200 => BaudRate::B115200,
        230400 => BaudRate::B230400,
        _ => return None,
    })
}

/// Default bitrate used when none is given on the command line or the
/// given value doesn't parse (matches the original's `DEFAULT_BITRATE`).
pub const DEFAULT_BITRATE: u32 = 19200;
