//! Reserved byte values on the bus
//!
//! Every protocol control byte has the high bit set, which is why payload
//! bytes with the high bit set must be escaped on the wire. Values are
//! 0x80 plus the most fitting ASCII letter (`START` = 0x80 + STX, `READ` =
//! 0x80 + 'R', and so on).

/// Frame start marker
pub const START: u8 = 0x82;
/// Frame end marker
pub const END: u8 = 0x83;
/// Positive acknowledgement
pub const ACK: u8 = 0x86;
/// Negative acknowledgement, asks the peer to resend
pub const NAK: u8 = 0x95;
/// Escape marker: the next byte had its high bit cleared
pub const ESC: u8 = 0x9B;
/// Explicit "nothing to send"
pub const NO_DATA: u8 = 0xB0;
/// Presence probe used during discovery
pub const PING: u8 = 0xB1;
/// Master asks a client for pending data
pub const READ: u8 = 0xD2;
/// Master delivers data to a client
pub const WRITE: u8 = 0xD7;

/// Protocol control bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Control {
    Start,
    End,
    Ack,
    Nak,
    Escape,
    NoData,
    Ping,
    Read,
    Write,
}

impl Control {
    /// Parse a control byte
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            START => Some(Control::Start),
            END => Some(Control::End),
            ACK => Some(Control::Ack),
            NAK => Some(Control::Nak),
            ESC => Some(Control::Escape),
            NO_DATA => Some(Control::NoData),
            PING => Some(Control::Ping),
            READ => Some(Control::Read),
            WRITE => Some(Control::Write),
            _ => None,
        }
    }

    /// Convert to wire format byte
    pub fn to_byte(self) -> u8 {
        match self {
            Control::Start => START,
            Control::End => END,
            Control::Ack => ACK,
            Control::Nak => NAK,
            Control::Escape => ESC,
            Control::NoData => NO_DATA,
            Control::Ping => PING,
            Control::Read => READ,
            Control::Write => WRITE,
        }
    }

    /// Returns true for bytes that delimit or escape a frame
    ///
    /// These never appear unescaped inside a frame body.
    pub fn is_framing(&self) -> bool {
        matches!(self, Control::Start | Control::End | Control::Escape)
    }

    /// Full name used in bus traces
    pub fn name(&self) -> &'static str {
        match self {
            Control::Start => "START",
            Control::End => "END",
            Control::Ack => "ACK",
            Control::Nak => "NAK",
            Control::Escape => "ESC",
            Control::NoData => "NO_DATA",
            Control::Ping => "PING",
            Control::Read => "READ",
            Control::Write => "WRITE",
        }
    }

    /// Short mnemonic used in compact bus traces
    pub fn mnemonic(&self) -> &'static str {
        match self {
            Control::Start => "S",
            Control::End => "E",
            Control::Ack => "A",
            Control::Nak => "N",
            Control::Escape => "\\",
            Control::NoData => "ND",
            Control::Ping => "P",
            Control::Read => "R",
            Control::Write => "W",
        }
    }
}

// Application payload prefixes
pub const STRIKE: u8 = 0xC0;
pub const SOLVE: u8 = 0xC1;
pub const CONFIG: u8 = 0xC2;
pub const READY: u8 = 0xC3;
pub const RESET: u8 = 0xC4;
pub const NUM_STRIKES: u8 = 0xC5;

/// Application opcodes
///
/// First data byte of messages exchanged by game logic on top of the bus.
/// The bus itself treats them as opaque data and escapes them on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Opcode {
    /// Client reports a strike
    Strike,
    /// Client reports its module solved
    Solve,
    /// Master distributes the game configuration
    Config,
    /// Client reports it is ready to start
    Ready,
    /// Master orders a reset
    Reset,
    /// Master broadcasts the current strike count
    NumStrikes,
}

impl Opcode {
    /// Parse an opcode from its wire format byte
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            STRIKE => Some(Opcode::Strike),
            SOLVE => Some(Opcode::Solve),
            CONFIG => Some(Opcode::Config),
            READY => Some(Opcode::Ready),
            RESET => Some(Opcode::Reset),
            NUM_STRIKES => Some(Opcode::NumStrikes),
            _ => None,
        }
    }

    /// Convert to wire format byte
    pub fn to_byte(self) -> u8 {
        match self {
            Opcode::Strike => STRIKE,
            Opcode::Solve => SOLVE,
            Opcode::Config => CONFIG,
            Opcode::Ready => READY,
            Opcode::Reset => RESET,
            Opcode::NumStrikes => NUM_STRIKES,
        }
    }

    /// Full name used in bus traces
    pub fn name(&self) -> &'static str {
        match self {
            Opcode::Strike => "STRIKE",
            Opcode::Solve => "SOLVE",
            Opcode::Config => "CONFIG",
            Opcode::Ready => "READY",
            Opcode::Reset => "RESET",
            Opcode::NumStrikes => "NUM_STRIKES",
        }
    }

    /// Short mnemonic used in compact bus traces
    pub fn mnemonic(&self) -> &'static str {
        match self {
            Opcode::Strike => "XXX",
            Opcode::Solve => "YYY",
            Opcode::Config => "C",
            Opcode::Ready => "G",
            Opcode::Reset => "R",
            Opcode::NumStrikes => "#S",
        }
    }
}

/// Name for any byte that has one, control bytes first
pub fn byte_name(byte: u8) -> Option<&'static str> {
    Control::from_byte(byte)
        .map(|c| c.name())
        .or_else(|| Opcode::from_byte(byte).map(|o| o.name()))
}
