//! Byte-level DLE-style framing between this host and the DEVICE.
//!
//! The wire reserves three octets: `0x10` (DLE), `0x02` (START), `0x03`
//! (END). Any of the three can still appear as literal data; the decoder
//! and encoder agree on an escaping scheme so that a `0x10` prefix always
//! means "the next byte is data, not a frame marker".

/// DLE escape prefix.
pub const DLE: u8 = 0x10;
/// Start-of-command-frame marker.
pub const START: u8 = 0x02;
/// End-of-value / end-of-frame marker.
pub const END: u8 = 0x03;

/// A value yielded by the decoder for each input octet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    /// A literal data byte.
    Data(u8),
    /// Frame-start marker (unescaped `0x02`).
    Start,
    /// Frame-end marker (unescaped `0x03`).
    End,
    /// The decoder consumed a DLE prefix and needs the following byte
    /// before it can yield a token.
    NeedMore,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EscState {
    Off,
    On,
}

/// Stateful byte-to-token decoder.
///
/// One octet in, one [`Token`] out. No failure mode: malformed input (a
/// `START` arriving mid-argument, say) is a concern for the dispatcher,
/// not this codec.
#[derive(Debug)]
pub struct Decoder {
    state: EscState,
}

impl Default for Decoder {
    fn default() -> Self {
        Decoder {
            state: EscState::Off,
        }
    }
}

impl Decoder {
    /// Create a decoder in its initial (unescaped) state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one raw octet, get back one token.
    pub fn decode(&mut self, byte: u8) -> Token {
        match self.state {
            EscState::Off => match byte {
                DLE => {
                    self.state = EscState::On;
                    Token::NeedMore
                }
                START => Token::Start,
                END => Token::End,
                b => Token::Data(b),
            },
            EscState::On => {
                self.state = EscState::Off;
                Token::Data(byte)
            }
        }
    }
}

/// Stateless byte-to-bytes encoder: escapes reserved octets as they're
/// written toward DEVICE.
#[derive(Debug, Default)]
pub struct Encoder;

impl Encoder {
    /// Encode a single data byte, appending to `out`. Reserved octets are
    /// preceded by a literal DLE; everything else passes through.
    pub fn put_u8(&self, out: &mut Vec<u8>, byte: u8) {
        if matches!(byte, START | END | DLE) {
            out.push(DLE);
        }
        out.push(byte);
    }

    /// Append a slice of already-escaped-as-needed data bytes, no trailer.
    pub fn put_bytes(&self, out: &mut Vec<u8>, bytes: &[u8]) {
        for &b in bytes {
            self.put_u8(out, b);
        }
    }

    /// Encode a 32-bit value MSB-first.
    pub fn put_u32_be(&self, out: &mut Vec<u8>, value: u32) {
        for b in value.to_be_bytes() {
            self.put_u8(out, b);
        }
    }

    /// Encode a 16-bit value MSB-first.
    pub fn put_u16_be(&self, out: &mut Vec<u8>, value: u16) {
        for b in value.to_be_bytes() {
            self.put_u8(out, b);
        }
    }

    /// Encode a NUL-terminated C string: each byte of `s` escaped, followed
    /// by a literal (unescaped) `END`.
    pub fn put_cstring(&self, out: &mut Vec<u8>, s: &[u8]) {
        self.put_bytes(out, s);
        out.push(END);
    }
}
