use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;

use openrs::cli::Args;
use openrs::console::RawConsole;
use openrs::pump;
use openrs::serial;
use openrs::session::Session;

fn main() -> ExitCode {
    env_logger::init();
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e:?}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    let args = Args::parse();
    let bitrate = args.bitrate();

    let mut device = serial::open_device(&args.serial_port, bitrate)
        .with_context(|| format!("could not open {}", args.serial_port.display()))?;
    info!(
        "connected to {} at {} bps",
        args.serial_port.display(),
        bitrate
    );

    let cwd = std::env::current_dir().context("could not determine current directory")?;
    let mut session = Session::new(cwd);

    // Raw mode is restored automatically when `_console` drops, including
    // on early return via `?`.
    let _console = RawConsole::enable().context("could not prepare console for raw mode")?;

    if let Some(cmd) = args.command_line() {
        let mut line = cmd.into_bytes();
        line.push(b'\n');
        pump::send_bytes(&mut device, &line).context("could not send initial command")?;
    }

    pump::run(&mut device, &mut session).context("I/O pump terminated with an error")?;
    Ok(())
}
