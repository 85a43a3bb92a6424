//! signature factor combinations.

use std::fmt;

use serde::{Deserialize, Serialize};

/// a single authentication factor.
///
/// the order of this enum is the canonical component order inside a computed
/// signature: possession, then knowledge, then biometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignatureFactor {
    /// something the device has (derived possession key).
    Possession,
    /// something the user knows (PIN/password derived knowledge key).
    Knowledge,
    /// something the user is (biometry derived key).
    Biometry,
}

/// a factor combination a client can sign with.
///
/// possession is always present; the combination determines how many 8-digit
/// components the signature string carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignatureType {
    /// possession only (1 component).
    Possession,
    /// possession + knowledge (2 components).
    PossessionKnowledge,
    /// possession + biometry (2 components).
    PossessionBiometry,
    /// possession + knowledge + biometry (3 components).
    PossessionKnowledgeBiometry,
}

impl SignatureType {
    /// the factors this type combines, in canonical component order.
    pub fn factors(&self) -> &'static [SignatureFactor] {
        use SignatureFactor::*;
        match self {
            SignatureType::Possession => &[Possession],
            SignatureType::PossessionKnowledge => &[Possession, Knowledge],
            SignatureType::PossessionBiometry => &[Possession, Biometry],
            SignatureType::PossessionKnowledgeBiometry => &[Possession, Knowledge, Biometry],
        }
    }

    /// number of 8-digit components in a signature of this type.
    pub fn component_count(&self) -> usize {
        self.factors().len()
    }

    /// database column value for this type.
    pub fn as_db_str(&self) -> &'static str {
        match self {
            SignatureType::Possession => "possession",
            SignatureType::PossessionKnowledge => "possession_knowledge",
            SignatureType::PossessionBiometry => "possession_biometry",
            SignatureType::PossessionKnowledgeBiometry => "possession_knowledge_biometry",
        }
    }

    /// parse a database column value. unknown values map to the weakest type.
    pub fn from_db_str(s: &str) -> Self {
        match s {
            "possession_knowledge" => SignatureType::PossessionKnowledge,
            "possession_biometry" => SignatureType::PossessionBiometry,
            "possession_knowledge_biometry" => SignatureType::PossessionKnowledgeBiometry,
            _ => SignatureType::Possession,
        }
    }
}

impl fmt::Display for SignatureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_db_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factor_order_is_canonical() {
        let factors = SignatureType::PossessionKnowledgeBiometry.factors();
        assert_eq!(
            factors,
            &[
                SignatureFactor::Possession,
                SignatureFactor::Knowledge,
                SignatureFactor::Biometry
            ]
        );
    }

    #[test]
    fn test_component_counts() {
        assert_eq!(SignatureType::Possession.component_count(), 1);
        assert_eq!(SignatureType::PossessionKnowledge.component_count(), 2);
        assert_eq!(SignatureType::PossessionBiometry.component_count(), 2);
        assert_eq!(
            SignatureType::PossessionKnowledgeBiometry.component_count(),
            3
        );
    }

    #[test]
    fn test_serde_wire_format() {
        let json = serde_json::to_string(&SignatureType::PossessionKnowledge).unwrap();
        assert_eq!(json, "\"POSSESSION_KNOWLEDGE\"");
        let parsed: SignatureType = serde_json::from_str("\"POSSESSION_BIOMETRY\"").unwrap();
        assert_eq!(parsed, SignatureType::PossessionBiometry);
    }

    #[test]
    fn test_db_roundtrip() {
        use SignatureType::*;
        for ty in [
            Possession,
            PossessionKnowledge,
            PossessionBiometry,
            PossessionKnowledgeBiometry,
        ] {
            assert_eq!(SignatureType::from_db_str(ty.as_db_str()), ty);
        }
    }
}
