//! RF switch bank state

use serde::{Deserialize, Serialize};

/// One of the five channels of the RF-controlled switch bank
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SwitchChannel {
    A,
    B,
    C,
    D,
    E,
}

impl SwitchChannel {
    pub const ALL: [SwitchChannel; 5] = [
        SwitchChannel::A,
        SwitchChannel::B,
        SwitchChannel::C,
        SwitchChannel::D,
        SwitchChannel::E,
    ];

    /// Zero-based position of the channel within the wire frame
    pub fn index(self) -> usize {
        match self {
            SwitchChannel::A => 0,
            SwitchChannel::B => 1,
            SwitchChannel::C => 2,
            SwitchChannel::D => 3,
            SwitchChannel::E => 4,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SwitchChannel::A => "A",
            SwitchChannel::B => "B",
            SwitchChannel::C => "C",
            SwitchChannel::D => "D",
            SwitchChannel::E => "E",
        }
    }
}

impl std::str::FromStr for SwitchChannel {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "A" | "a" => Ok(SwitchChannel::A),
            "B" | "b" => Ok(SwitchChannel::B),
            "C" | "c" => Ok(SwitchChannel::C),
            "D" | "d" => Ok(SwitchChannel::D),
            "E" | "e" => Ok(SwitchChannel::E),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for SwitchChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Assumed on/off state of each channel
///
/// The RF link is transmit-only, so this mirrors the last frame sent rather
/// than a device readback.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwitchBankState {
    pub a: bool,
    pub b: bool,
    pub c: bool,
    pub d: bool,
    pub e: bool,
}

impl SwitchBankState {
    pub fn get(&self, channel: SwitchChannel) -> bool {
        match channel {
            SwitchChannel::A => self.a,
            SwitchChannel::B => self.b,
            SwitchChannel::C => self.c,
            SwitchChannel::D => self.d,
            SwitchChannel::E => self.e,
        }
    }

    pub fn set(&mut self, channel: SwitchChannel, on: bool) {
        match channel {
            SwitchChannel::A => self.a = on,
            SwitchChannel::B => self.b = on,
            SwitchChannel::C => self.c = on,
            SwitchChannel::D => self.d = on,
            SwitchChannel::E => self.e = on,
        }
    }
}
