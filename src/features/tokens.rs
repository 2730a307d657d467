//! SMILES token ids for the `ChemBERTa` backbone

use rustc_hash::FxHashMap;
use std::sync::OnceLock;

use super::{DerivationError, Feature, FeatureExtractor};
use crate::dataset::Record;
use crate::smiles::{tokenize, Molecule};

/// Sequence start id
pub const BOS_ID: u32 = 0;
/// Padding id
pub const PAD_ID: u32 = 1;
/// Sequence end id
pub const EOS_ID: u32 = 2;
/// Unknown-token id
pub const UNK_ID: u32 = 3;

/// Default maximum sequence length, framing tokens included
pub const DEFAULT_MAX_LENGTH: usize = 512;

const VOCABULARY: &[&str] = &[
    "<s>", "<pad>", "</s>", "<unk>", "C", "c", "(", ")", "O", "1", "2", "=", "N", "n", "3", "F",
    "[C@@H]", "[C@H]", "Cl", "S", "4", "#", "Br", "o", "s", "[nH]", "-", "/", "\\", "[N+]",
    "[O-]", "5", "I", "P", "6", "[Na+]", "[Cl-]", ".", "B", "p", "7", "8", "9", "%10", "%11",
    "%12", "[Si]", "[Se]", "[se]", "[NH+]", "[N-]", "[n+]", "[NH2+]", "[NH3+]", "[S+]", "[K+]",
    "[Li+]", "[2H]", "[13C]", "[C@]", "[C@@]", "[S@]", "[S@@]", "[P+]", "[Br-]", "[I-]", "[H]",
    "[O]", "[N]", "[Zn]", "[Fe]", "[Pt]", "[Cu]", "[Ca+2]", "[Mg+2]", "*",
];

fn vocabulary() -> &'static FxHashMap<&'static str, u32> {
    static VOCAB: OnceLock<FxHashMap<&'static str, u32>> = OnceLock::new();
    VOCAB.get_or_init(|| {
        VOCABULARY
            .iter()
            .zip(0u32..)
            .map(|(token, id)| (*token, id))
            .collect()
    })
}

/// Vocabulary id of a token text, [`UNK_ID`] when unknown.
#[must_use]
pub fn token_id(text: &str) -> u32 {
    vocabulary().get(text).copied().unwrap_or(UNK_ID)
}

/// Tokenizes SMILES into `<s> tokens... </s>` id sequences.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenExtractor {
    max_length: usize,
}

impl Default for TokenExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LENGTH)
    }
}

impl TokenExtractor {
    /// Create an extractor; `max_length` is raised to at least 2.
    #[must_use]
    pub fn new(max_length: usize) -> Self {
        Self {
            max_length: max_length.max(2),
        }
    }

    /// Maximum sequence length.
    #[must_use]
    pub const fn max_length(&self) -> usize {
        self.max_length
    }
}

impl FeatureExtractor for TokenExtractor {
    fn backbone_id(&self) -> &str {
        "chemberta"
    }

    fn extract(&self, record: &Record) -> Result<Feature, DerivationError> {
        // Tokenizing alone accepts structurally broken strings like "C(".
        Molecule::parse(&record.smiles)?;

        let mut ids = Vec::with_capacity(self.max_length);
        ids.push(BOS_ID);
        ids.extend(
            tokenize(&record.smiles)?
                .iter()
                .take(self.max_length - 2)
                .map(|lexeme| token_id(lexeme.text)),
        );
        ids.push(EOS_ID);
        Ok(Feature::Tokens { ids })
    }

    fn config_fingerprint(&self) -> u64 {
        self.max_length as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(extractor: TokenExtractor, smiles: &str) -> Vec<u32> {
        match extractor.extract(&Record::new(smiles, vec![0.0])).unwrap() {
            Feature::Tokens { ids } => ids,
            other => panic!("unexpected feature {other:?}"),
        }
    }

    #[test]
    fn test_vocabulary_ids_are_positions() {
        assert_eq!(token_id("<s>"), BOS_ID);
        assert_eq!(token_id("<pad>"), PAD_ID);
        assert_eq!(token_id("</s>"), EOS_ID);
        assert_eq!(token_id("C"), 4);
        assert_eq!(token_id("[Xe]"), UNK_ID);
    }

    #[test]
    fn test_framing() {
        let seq = ids(TokenExtractor::default(), "CCO");
        assert_eq!(seq, vec![BOS_ID, token_id("C"), token_id("C"), token_id("O"), EOS_ID]);
    }

    #[test]
    fn test_bracket_atoms_are_single_tokens() {
        let seq = ids(TokenExtractor::default(), "C[C@@H](O)Cl");
        assert_eq!(seq[2], token_id("[C@@H]"));
        assert_eq!(seq.len(), 2 + 6);
    }

    #[test]
    fn test_truncation_keeps_end_token() {
        let seq = ids(TokenExtractor::new(4), "CCCCCC");
        assert_eq!(seq.len(), 4);
        assert_eq!(*seq.last().unwrap(), EOS_ID);
    }

    #[test]
    fn test_rejects_structurally_invalid_smiles() {
        let record = Record::new("CC(", vec![0.0]);
        assert!(TokenExtractor::default().extract(&record).is_err());
    }
}
