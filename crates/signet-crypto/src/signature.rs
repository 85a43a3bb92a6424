//! the symmetric request signature.
//!
//! a signature is one 8-digit decimal group per active factor, joined by `-`.
//! each group is derived from HMAC-SHA-256 of the canonical base string under
//! that factor's key: take the last 4 bytes big-endian, clear the top bit,
//! reduce modulo 10^8 and zero-pad.
//!
//! the base string is `data & base64(ctr_bytes) & application_secret` where
//! `ctr_bytes` is be64 of the integer counter (legacy) or the 16-byte
//! hash-chain value (current).

use base64::prelude::*;
use sha2::{Digest, Sha256};

use signet_types::{SignatureFactor, SignatureType};

use crate::cipher::{ct_eq, hmac_sha256};
use crate::kdf::SignatureKeys;
use crate::Result;

/// length of the hash-chain counter value.
pub const CTR_DATA_LEN: usize = 16;

/// generate a fresh random hash-chain counter seed.
pub fn generate_ctr_data() -> [u8; CTR_DATA_LEN] {
    use rand::RngCore;
    let mut rng = rand::rng();
    let mut ctr = [0u8; CTR_DATA_LEN];
    rng.fill_bytes(&mut ctr);
    ctr
}

/// advance the hash chain: `SHA-256(ctr_data)[0..16]`.
pub fn next_ctr_data(ctr_data: &[u8]) -> [u8; CTR_DATA_LEN] {
    let digest = Sha256::digest(ctr_data);
    let mut out = [0u8; CTR_DATA_LEN];
    out.copy_from_slice(&digest[..CTR_DATA_LEN]);
    out
}

/// counter bytes for the legacy integer counter.
pub fn counter_bytes(counter: u64) -> [u8; 8] {
    counter.to_be_bytes()
}

/// build the canonical signature base string.
///
/// `application_secret` is the stored Base64 credential string and enters the
/// base verbatim.
pub fn signature_base(data: &[u8], ctr_bytes: &[u8], application_secret: &str) -> Vec<u8> {
    let mut base = Vec::with_capacity(data.len() + 64);
    base.extend_from_slice(data);
    base.push(b'&');
    base.extend_from_slice(BASE64_STANDARD.encode(ctr_bytes).as_bytes());
    base.push(b'&');
    base.extend_from_slice(application_secret.as_bytes());
    base
}

/// compute the signature string for the given factor combination.
pub fn compute_signature(
    keys: &SignatureKeys,
    signature_type: SignatureType,
    base: &[u8],
) -> Result<String> {
    let mut components = Vec::with_capacity(signature_type.component_count());
    for factor in signature_type.factors() {
        let key = match factor {
            SignatureFactor::Possession => &keys.possession,
            SignatureFactor::Knowledge => &keys.knowledge,
            SignatureFactor::Biometry => &keys.biometry,
        };
        let mac = hmac_sha256(key, base)?;
        components.push(decimalize(&mac));
    }
    Ok(components.join("-"))
}

/// compare a computed signature against a client-provided one in constant time.
pub fn signatures_match(expected: &str, provided: &str) -> bool {
    ct_eq(expected.as_bytes(), provided.as_bytes())
}

/// fingerprint of signed data for the audit log: hex SHA-256.
pub fn data_fingerprint(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// reduce a MAC to one 8-digit decimal component.
fn decimalize(mac: &[u8; 32]) -> String {
    let value = u32::from_be_bytes([mac[28], mac[29], mac[30], mac[31]]) & 0x7FFF_FFFF;
    format!("{:08}", value % 100_000_000)
}
