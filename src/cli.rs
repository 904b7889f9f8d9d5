//! Command-line argument parsing: serial port, optional bitrate (falls
//! back to 19200 on a bad parse), and an optional trailing command line
//! sent to the TNC right after connecting.

use std::path::PathBuf;

use clap::Parser;

use crate::serial::DEFAULT_BITRATE;

/// Terminal bridge and remote-filesystem server for TNC3/TNC4e devices.
#[derive(Parser, Debug)]
#[command(name = "openrs", about, version)]
pub struct Args {
    /// Serial device to connect to, e.g. /dev/ttyUSB0.
    pub serial_port: PathBuf,

    /// Bitrate in bps. Falls back to 19200 if this doesn't parse as a
    /// number.
    #[arg(default_value_t = DEFAULT_BITRATE.to_string())]
    bitrate_raw: String,

    /// Optional command sent to the TNC immediately after connecting.
    pub command: Vec<String>,
}

impl Args {
    /// The effective bitrate: the parsed value, or [`DEFAULT_BITRATE`] if
    /// `bitrate_raw` didn't parse as an integer.
    pub fn bitrate(&self) -> u32 {
        self.bitrate_raw.parse().unwrap_or_else(|_| {
            eprintln!(
                "Could not parse bitrate. Argument ignored. Bitrate defaults to {DEFAULT_BITRATE} bps."
            );
            DEFAULT_BITRATE
        })
    }

    /// The trailing command words joined with single spaces, or `None`
    /// if no command was given.
    pub fn command_line(&self) -> Option<String> {
        if self.command.is_empty() {
            None
        } else {
            Some(self.command.join(" "))
        }
    }
}
