use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use tiny_keccak::{Hasher, Keccak};

use crate::error::ValidationError;

const ADDRESS_HEX_LEN: usize = 40;

/// An EVM account address, stored in its EIP-55 checksummed form
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(String);

impl Address {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Address {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_address(s)
    }
}

impl TryFrom<String> for Address {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        parse_address(&value)
    }
}

impl From<Address> for String {
    fn from(value: Address) -> Self {
        value.0
    }
}

/// Returns true if `input` is a syntactically valid account address
pub fn is_address(input: &str) -> bool {
    parse_address(input).is_ok()
}

/// Parses an account address.
///
/// The `0x` prefix is optional. Single-case hex is accepted as is, mixed case
/// must match the EIP-55 checksum.
pub fn parse_address(input: &str) -> Result<Address, ValidationError> {
    let trimmed = input.trim();
    let hex_part = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);

    if hex_part.len() != ADDRESS_HEX_LEN || !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ValidationError::AddressInvalid);
    }

    let checksummed = to_checksum(hex_part);
    let has_lower = hex_part.chars().any(|c| c.is_ascii_lowercase());
    let has_upper = hex_part.chars().any(|c| c.is_ascii_uppercase());
    if has_lower && has_upper && checksummed[2..] != *hex_part {
        return Err(ValidationError::AddressInvalid);
    }

    Ok(Address(checksummed))
}

fn to_checksum(hex_part: &str) -> String {
    let lower = hex_part.to_ascii_lowercase();
    let mut hasher = Keccak::v256();
    let mut hash = [0u8; 32];
    hasher.update(lower.as_bytes());
    hasher.finalize(&mut hash);
    let hash_hex = hex::encode(hash);

    let mut out = String::with_capacity(ADDRESS_HEX_LEN + 2);
    out.push_str("0x");
    for (c, h) in lower.chars().zip(hash_hex.chars()) {
        // A nibble of 8 or more uppercases the matching letter
        if c.is_ascii_alphabetic() && h.to_digit(16).is_some_and(|n| n >= 8) {
            out.push(c.to_ascii_uppercase());
        } else {
            out.push(c);
        }
    }
    out
}
