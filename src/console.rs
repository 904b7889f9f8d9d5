//! CONSOLE endpoint: puts the controlling terminal into raw mode for the
//! duration of the session and restores it on drop.

use std::io;

use log::warn;
use nix::sys::termios::{self, SetArg, Termios};

/// RAII guard: puts stdin into raw mode on construction, restores the
/// original settings on drop.
pub struct RawConsole {
    original: Termios,
}

impl RawConsole {
    /// Snapshot the current terminal settings and switch stdin to raw
    /// mode (no echo, no canonical line buffering, no signal generation).
    pub fn enable() -> io::Result<Self> {
        let stdin = io::stdin();
        let original = termios::tcgetattr(&stdin)
            .map_err(|e| io::Error::from_raw_os_error(e as i32))?;

        let mut raw = original.clone();
        termios::cfmakeraw(&mut raw);
        termios::tcsetattr(&stdin, SetArg::TCSANOW, &raw)
            .map_err(|e| io::Error::from_raw_os_error(e as i32))?;

        Ok(RawConsole { original })
    }
}

impl Drop for RawConsole {
    fn drop(&mut self) {
        let stdin = io::stdin();
        if let Err(e) = termios::tcsetattr(&stdin, SetArg::TCSANOW, &self.original) {
            warn!("failed to restore console settings: {e}");
        }
    }
}

/// Translate a raw console byte: DEL (0x7f) becomes BS (0x08), so a
/// terminal that sends DEL for its backspace key still erases correctly.
/// Everything else passes through.
pub fn normalize_key(byte: u8) -> u8 {
    if byte == 0x7f {
        0x08
    } else {
        byte
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn del_is_remapped_to_backspace() {
        assert_eq!(normalize_key(0x7f), 0x08);
    }

    #[test]
    fn other_bytes_pass_through() {
        assert_eq!(normalize_key(b'a'), b'a');
        assert_eq!(normalize_key(0x03), 0x03);
    }
}
