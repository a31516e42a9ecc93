//! Communication channels and their public URL codes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::ids::Wave;

/// A communication channel (the medium a message travels over).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Email,
    Fax,
    Post,
}

impl Channel {
    /// All channels, in ledger ordering. Every non-control recipient gets
    /// one intervention per entry here.
    pub const ALL: [Channel; 3] = [Channel::Email, Channel::Fax, Channel::Post];

    /// The single-letter code used in allocation files and public URLs.
    pub fn letter(&self) -> char {
        match self {
            Channel::Email => 'e',
            Channel::Fax => 'f',
            Channel::Post => 'p',
        }
    }

    /// Lowercase display name, used as the directory segment in the
    /// artifact layout and as the `utm_medium` value.
    pub fn name(&self) -> &'static str {
        match self {
            Channel::Email => "email",
            Channel::Fax => "fax",
            Channel::Post => "post",
        }
    }

    /// The fixed artifact filename for this channel.
    pub fn artifact_filename(&self) -> &'static str {
        match self {
            Channel::Email => "email.html",
            Channel::Fax => "fax.pdf",
            Channel::Post => "letter.pdf",
        }
    }

    pub fn from_letter(c: char) -> Option<Channel> {
        match c.to_ascii_lowercase() {
            'e' => Some(Channel::Email),
            'f' => Some(Channel::Fax),
            'p' => Some(Channel::Post),
            _ => None,
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// The public URL code for a (channel, wave) pair.
///
/// Wave 1 uses the bare channel letter (`e`, `f`, `p`), so single-wave
/// URLs look exactly like the historical ones. Later waves append the wave
/// digit: `f2` is the wave-2 fax intervention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelCode {
    pub channel: Channel,
    pub wave: Wave,
}

impl ChannelCode {
    pub fn new(channel: Channel, wave: Wave) -> Self {
        ChannelCode { channel, wave }
    }
}

/// Error returned when a channel code cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid channel code: {0:?}")]
pub struct InvalidChannelCode(pub String);

impl FromStr for ChannelCode {
    type Err = InvalidChannelCode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars();
        let letter = chars.next().ok_or_else(|| InvalidChannelCode(s.into()))?;
        let channel = Channel::from_letter(letter).ok_or_else(|| InvalidChannelCode(s.into()))?;

        let rest = chars.as_str();
        let wave = if rest.is_empty() {
            Wave::ONE
        } else {
            rest.parse().map_err(|_| InvalidChannelCode(s.into()))?
        };

        Ok(ChannelCode { channel, wave })
    }
}

impl fmt::Display for ChannelCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.wave == Wave::ONE {
            write!(f, "{}", self.channel.letter())
        } else {
            write!(f, "{}{}", self.channel.letter(), self.wave.0)
        }
    }
}
