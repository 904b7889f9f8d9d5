//! Wire opcodes understood by the command dispatcher.

/// A recognized command opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    FOpen = 0,
    FRead = 1,
    FWrite = 2,
    FClose = 3,
    FGetc = 4,
    FPutc = 5,
    FGets = 6,
    FPuts = 7,
    FindFirst = 8,
    FindNext = 9,
    Remove = 10,
    Rename = 11,
    FTell = 12,
    FSeek = 13,
    UngetC = 14,
}

impl Opcode {
    /// Decode a wire opcode byte, or `None` if unrecognized.
    pub fn from_byte(b: u8) -> Option<Opcode> {
        Some(match b {
            0 => Opcode::FOpen,
            1 => Opcode::FRead,
            2 => Opcode::FWrite,
            3 => Opcode::FClose,
            4 => Opcode::FGetc,
            5 => Opcode::FPutc,
            6 => Opcode::FGets,
            7 => Opcode::FPuts,
            8 => Opcode::FindFirst,
            9 => Opcode::FindNext,
            10 => Opcode::Remove,
            11 => Opcode::Rename,
            12 => Opcode::FTell,
            13 => Opcode::FSeek,
            14 => Opcode::UngetC,
            _ => return None,
        })
    }
}
