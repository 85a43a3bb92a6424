//! human-typeable activation identifiers.
//!
//! activation codes must:
//! - Use the RFC 4648 Base32 alphabet (no padding)
//! - Be grouped as `XXXXX-XXXXX-XXXXX-XXXXX` (current) or `XXXXX-XXXXX` (legacy)
//! - Carry a Luhn mod-32 checksum in the last symbol (current format only)

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// RFC 4648 Base32 alphabet used for activation codes and legacy OTPs.
pub const CODE_ALPHABET: &[u8; 32] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";

/// number of symbol groups in a current-format activation code.
const CODE_GROUPS: usize = 4;

/// number of symbol groups in a legacy short activation id.
const SHORT_ID_GROUPS: usize = 2;

/// symbols per group.
const GROUP_LEN: usize = 5;

/// a validated activation code in the current `XXXXX-XXXXX-XXXXX-XXXXX` format.
///
/// the last symbol is a Luhn mod-32 checksum over the 19 preceding symbols,
/// computed over alphabet indexes. codes are unique across all records in a
/// non-terminal state; uniqueness is enforced by the store, not here.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ActivationCode(String);

impl ActivationCode {
    /// create a new activation code, validating format and checksum.
    pub fn new(s: impl Into<String>) -> Result<Self, ActivationCodeError> {
        let s = s.into();
        let symbols = parse_groups(&s, CODE_GROUPS)?;
        if !luhn_mod32_valid(&symbols) {
            return Err(ActivationCodeError::ChecksumMismatch);
        }
        Ok(Self(s))
    }

    /// generate a new random activation code with a valid checksum.
    pub fn generate() -> Self {
        use rand::Rng;
        let mut rng = rand::rng();
        let mut symbols: Vec<u8> = (0..CODE_GROUPS * GROUP_LEN - 1)
            .map(|_| rng.random_range(0..32) as u8)
            .collect();
        symbols.push(luhn_mod32_checksum(&symbols));
        Self(format_groups(&symbols))
    }

    /// get the full code string including dashes.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// consume the code and return the inner string.
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for ActivationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ActivationCode {
    type Err = ActivationCodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for ActivationCode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for ActivationCode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::new(s).map_err(serde::de::Error::custom)
    }
}

impl Serialize for ActivationCode {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.0.serialize(serializer)
    }
}

/// a legacy short activation id in the `XXXXX-XXXXX` format.
///
/// short ids carry no checksum. they identify a pending activation during the
/// legacy key exchange and are unique across non-terminal records.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ActivationIdShort(String);

impl ActivationIdShort {
    /// create a new short activation id, validating the format.
    pub fn new(s: impl Into<String>) -> Result<Self, ActivationCodeError> {
        let s = s.into();
        parse_groups(&s, SHORT_ID_GROUPS)?;
        Ok(Self(s))
    }

    /// generate a new random short activation id.
    pub fn generate() -> Self {
        Self(random_groups(SHORT_ID_GROUPS))
    }

    /// get the full id string including the dash.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// consume the id and return the inner string.
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for ActivationIdShort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ActivationIdShort {
    type Err = ActivationCodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// generate a legacy activation OTP in the `XXXXX-XXXXX` format.
///
/// legacy provisioning always pairs a short activation id with a
/// server-generated OTP of the same shape.
pub fn generate_legacy_otp() -> String {
    random_groups(SHORT_ID_GROUPS)
}

/// error type for invalid activation codes and short ids.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ActivationCodeError {
    /// wrong number of groups or wrong group length.
    #[error("activation code must be {expected} groups of {GROUP_LEN} symbols")]
    InvalidFormat {
        /// expected group count
        expected: usize,
    },

    /// a symbol outside the Base32 alphabet.
    #[error("activation code contains a symbol outside the Base32 alphabet")]
    InvalidSymbol,

    /// the Luhn mod-32 checksum does not match.
    #[error("activation code checksum mismatch")]
    ChecksumMismatch,
}

fn symbol_index(c: u8) -> Option<u8> {
    CODE_ALPHABET.iter().position(|&a| a == c).map(|i| i as u8)
}

/// split a dashed code into alphabet indexes, validating the group layout.
fn parse_groups(s: &str, groups: usize) -> Result<Vec<u8>, ActivationCodeError> {
    let parts: Vec<&str> = s.split('-').collect();
    if parts.len() != groups || parts.iter().any(|p| p.len() != GROUP_LEN) {
        return Err(ActivationCodeError::InvalidFormat { expected: groups });
    }
    let mut symbols = Vec::with_capacity(groups * GROUP_LEN);
    for part in parts {
        for c in part.bytes() {
            symbols.push(symbol_index(c).ok_or(ActivationCodeError::InvalidSymbol)?);
        }
    }
    Ok(symbols)
}

fn format_groups(symbols: &[u8]) -> String {
    symbols
        .chunks(GROUP_LEN)
        .map(|chunk| {
            chunk
                .iter()
                .map(|&i| CODE_ALPHABET[i as usize] as char)
                .collect::<String>()
        })
        .collect::<Vec<_>>()
        .join("-")
}

fn random_groups(groups: usize) -> String {
    use rand::Rng;
    let mut rng = rand::rng();
    let symbols: Vec<u8> = (0..groups * GROUP_LEN)
        .map(|_| rng.random_range(0..32) as u8)
        .collect();
    format_groups(&symbols)
}

/// compute the Luhn mod-32 check symbol for a sequence of alphabet indexes.
fn luhn_mod32_checksum(symbols: &[u8]) -> u8 {
    let mut factor = 2u32;
    let mut sum = 0u32;
    for &idx in symbols.iter().rev() {
        let addend = factor * u32::from(idx);
        sum += addend / 32 + addend % 32;
        factor = 3 - factor;
    }
    ((32 - sum % 32) % 32) as u8
}

/// validate a full sequence (data symbols plus trailing check symbol).
fn luhn_mod32_valid(symbols: &[u8]) -> bool {
    let mut factor = 1u32;
    let mut sum = 0u32;
    for &idx in symbols.iter().rev() {
        let addend = factor * u32::from(idx);
        sum += addend / 32 + addend % 32;
        factor = 3 - factor;
    }
    sum % 32 == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_code_is_valid() {
        let code = ActivationCode::generate();
        ActivationCode::new(code.as_str()).unwrap();
    }

    #[test]
    fn test_generated_code_format() {
        let code = ActivationCode::generate();
        let parts: Vec<&str> = code.as_str().split('-').collect();
        assert_eq!(parts.len(), 4);
        for part in parts {
            assert_eq!(part.len(), 5);
            assert!(part.bytes().all(|c| CODE_ALPHABET.contains(&c)));
        }
    }

    #[test]
    fn test_checksum_detects_single_symbol_change() {
        let code = ActivationCode::generate();
        let mut chars: Vec<char> = code.as_str().chars().collect();
        // flip the first symbol to a different alphabet member
        let original = chars[0];
        chars[0] = if original == 'A' { 'B' } else { 'A' };
        let tampered: String = chars.into_iter().collect();
        assert_eq!(
            ActivationCode::new(tampered),
            Err(ActivationCodeError::ChecksumMismatch)
        );
    }

    #[test]
    fn test_invalid_group_layout() {
        assert!(matches!(
            ActivationCode::new("AAAAA-AAAAA-AAAAA"),
            Err(ActivationCodeError::InvalidFormat { .. })
        ));
        assert!(matches!(
            ActivationCode::new("AAAA-AAAAA-AAAAA-AAAAAA"),
            Err(ActivationCodeError::InvalidFormat { .. })
        ));
    }

    #[test]
    fn test_invalid_symbol_rejected() {
        // '0' and '1' are not part of the RFC 4648 alphabet
        assert_eq!(
            ActivationCode::new("AAAA0-AAAAA-AAAAA-AAAAA"),
            Err(ActivationCodeError::InvalidSymbol)
        );
    }

    #[test]
    fn test_checksum_roundtrip_for_fixed_symbols() {
        let symbols: Vec<u8> = (0..19).map(|i| i % 32).collect();
        let check = luhn_mod32_checksum(&symbols);
        let mut full = symbols.clone();
        full.push(check);
        assert!(luhn_mod32_valid(&full));
        // any other check symbol must fail
        for wrong in 0..32u8 {
            if wrong == check {
                continue;
            }
            let mut bad = symbols.clone();
            bad.push(wrong);
            assert!(!luhn_mod32_valid(&bad));
        }
    }

    #[test]
    fn test_short_id_format() {
        let short = ActivationIdShort::generate();
        let parts: Vec<&str> = short.as_str().split('-').collect();
        assert_eq!(parts.len(), 2);
        assert!(parts.iter().all(|p| p.len() == 5));
        ActivationIdShort::new(short.as_str()).unwrap();
    }

    #[test]
    fn test_legacy_otp_format() {
        let otp = generate_legacy_otp();
        ActivationIdShort::new(otp).unwrap();
    }

    #[test]
    fn test_serde_roundtrip() {
        let code = ActivationCode::generate();
        let json = serde_json::to_string(&code).unwrap();
        let parsed: ActivationCode = serde_json::from_str(&json).unwrap();
        assert_eq!(code, parsed);
    }

    #[test]
    fn test_serde_invalid_rejected() {
        let json = r#""AAAAA-AAAAA""#;
        let result: Result<ActivationCode, _> = serde_json::from_str(json);
        assert!(result.is_err());
    }
}
