use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use crate::error::OpenEdgeDbError;

/// Character set used for text crossing the driver boundary.
///
/// The engine stores text in its internal codepage (`iso8859-1` unless the database was
/// built otherwise); the codepage is configured per connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "String")]
pub enum Codepage {
    #[default]
    Latin1,
    Utf8,
    Ascii,
}

impl Codepage {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Codepage::Latin1 => "iso8859-1",
            Codepage::Utf8 => "utf-8",
            Codepage::Ascii => "us-ascii",
        }
    }

    /// Encode text for the driver.
    ///
    /// # Errors
    /// Returns `OpenEdgeDbError::EncodingError` if a character has no representation in
    /// this codepage.
    pub fn encode(self, text: &str) -> Result<Vec<u8>, OpenEdgeDbError> {
        match self {
            Codepage::Utf8 => Ok(text.as_bytes().to_vec()),
            Codepage::Latin1 => narrow(text, 0xFF, self),
            Codepage::Ascii => narrow(text, 0x7F, self),
        }
    }

    /// Decode text coming back from the driver.
    ///
    /// # Errors
    /// Returns `OpenEdgeDbError::EncodingError` if the bytes are not valid in this codepage.
    pub fn decode(self, bytes: &[u8]) -> Result<String, OpenEdgeDbError> {
        match self {
            Codepage::Latin1 => Ok(bytes.iter().map(|&b| char::from(b)).collect()),
            Codepage::Utf8 => String::from_utf8(bytes.to_vec())
                .map_err(|e| OpenEdgeDbError::EncodingError(format!("invalid utf-8: {e}"))),
            Codepage::Ascii => {
                if let Some(pos) = bytes.iter().position(|b| !b.is_ascii()) {
                    return Err(OpenEdgeDbError::EncodingError(format!(
                        "byte 0x{:02x} at offset {pos} is not us-ascii",
                        bytes[pos]
                    )));
                }
                Ok(bytes.iter().map(|&b| char::from(b)).collect())
            }
        }
    }
}

fn narrow(text: &str, max: u32, codepage: Codepage) -> Result<Vec<u8>, OpenEdgeDbError> {
    text.chars()
        .map(|c| {
            let code = u32::from(c);
            if code <= max {
                u8::try_from(code).map_err(|e| OpenEdgeDbError::EncodingError(e.to_string()))
            } else {
                Err(OpenEdgeDbError::EncodingError(format!(
                    "character {c:?} cannot be encoded as {}",
                    codepage.name()
                )))
            }
        })
        .collect()
}

impl FromStr for Codepage {
    type Err = OpenEdgeDbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "iso8859-1" | "iso-8859-1" | "latin1" | "latin-1" => Ok(Codepage::Latin1),
            "utf-8" | "utf8" => Ok(Codepage::Utf8),
            "us-ascii" | "ascii" => Ok(Codepage::Ascii),
            other => Err(OpenEdgeDbError::ConfigError(format!(
                "unsupported codepage `{other}`"
            ))),
        }
    }
}

impl TryFrom<String> for Codepage {
    type Error = OpenEdgeDbError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for Codepage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
