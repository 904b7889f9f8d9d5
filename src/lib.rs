//! openrs: a terminal bridge and remote-filesystem server for TNC3/TNC4e
//! devices attached over a serial line.

pub mod cli;
pub mod codec;
pub mod collector;
pub mod console;
pub mod dirscan;
pub mod fileinfo;
pub mod fsops;
pub mod handles;
pub mod opcodes;
pub mod pump;
pub mod serial;
pub mod session;
