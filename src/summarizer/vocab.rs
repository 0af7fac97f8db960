//! Fixed vocabulary and article/abstract id mapping
//!
//! Ids `0..4` are reserved for padding, unknown, decode-start and decode-stop.
//! Words absent from the vocabulary get temporary ids `>= V` within one
//! article, numbered in first-occurrence order.

use crate::error::{DeepReleaseError, Result};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

pub const PAD_TOKEN: &str = "[PAD]";
pub const UNKNOWN_TOKEN: &str = "[UNK]";
pub const START_DECODING: &str = "[START]";
pub const STOP_DECODING: &str = "[STOP]";

pub const PAD_ID: usize = 0;
pub const UNK_ID: usize = 1;
pub const START_ID: usize = 2;
pub const STOP_ID: usize = 3;

/// Sentence markers must never appear as vocabulary words
const SENTENCE_START: &str = "<s>";
const SENTENCE_END: &str = "</s>";

const RESERVED: [&str; 4] = [PAD_TOKEN, UNKNOWN_TOKEN, START_DECODING, STOP_DECODING];

/// Bidirectional word/id mapping over `[0, V)`
#[derive(Debug, Clone)]
pub struct Vocab {
    word_to_id: HashMap<String, usize>,
    id_to_word: Vec<String>,
}

impl Vocab {
    /// Read a vocabulary file of `word [count]` lines
    ///
    /// At most `max_size` entries are kept, reserved tokens included; `0`
    /// means no limit.
    pub fn from_file(path: &Path, max_size: usize) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            DeepReleaseError::Vocabulary(format!("cannot read {}: {}", path.display(), e))
        })?;

        let words = content.lines().filter_map(|line| {
            let mut pieces = line.split_whitespace();
            match (pieces.next(), pieces.next(), pieces.next()) {
                (Some(word), _, None) => Some(word),
                (None, _, _) => None,
                _ => {
                    warn!("Incorrectly formatted line in vocabulary file: {}", line);
                    None
                }
            }
        });

        let vocab = Self::from_words(words, max_size)?;
        debug!(
            "Finished constructing vocabulary of {} total words. Last word added: {}",
            vocab.size(),
            vocab.id_to_word.last().map(String::as_str).unwrap_or_default()
        );
        Ok(vocab)
    }

    /// Build a vocabulary from words in id order, after the reserved tokens
    pub fn from_words<I, S>(words: I, max_size: usize) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut vocab = Self {
            word_to_id: HashMap::new(),
            id_to_word: Vec::new(),
        };
        for token in RESERVED {
            vocab.push(token);
        }

        for word in words {
            if max_size != 0 && vocab.size() >= max_size {
                break;
            }
            let word = word.as_ref();
            if RESERVED.contains(&word) || word == SENTENCE_START || word == SENTENCE_END {
                return Err(DeepReleaseError::Vocabulary(format!(
                    "reserved token '{}' must not appear in the vocabulary file",
                    word
                )));
            }
            if vocab.word_to_id.contains_key(word) {
                return Err(DeepReleaseError::Vocabulary(format!(
                    "duplicated word in vocabulary file: {}",
                    word
                )));
            }
            vocab.push(word);
        }
        Ok(vocab)
    }

    fn push(&mut self, word: &str) {
        self.word_to_id.insert(word.to_string(), self.id_to_word.len());
        self.id_to_word.push(word.to_string());
    }

    /// Id of a word, or the unknown id
    pub fn word2id(&self, word: &str) -> usize {
        self.word_to_id.get(word).copied().unwrap_or(UNK_ID)
    }

    /// Word of an in-vocabulary id
    pub fn id2word(&self, id: usize) -> Result<&str> {
        self.id_to_word
            .get(id)
            .map(String::as_str)
            .ok_or_else(|| DeepReleaseError::Vocabulary(format!("id not found in vocab: {}", id)))
    }

    /// Number of entries, reserved tokens included
    pub fn size(&self) -> usize {
        self.id_to_word.len()
    }
}

/// Map article words to ids and extended ids
///
/// Returns `(ids, extended_ids, oovs)` where `ids` use UNK for OOV words and
/// `extended_ids` give OOV word `i` the id `V + i`.
pub fn article2ids(words: &[&str], vocab: &Vocab) -> (Vec<usize>, Vec<usize>, Vec<String>) {
    let mut ids = Vec::with_capacity(words.len());
    let mut extended = Vec::with_capacity(words.len());
    let mut oovs: Vec<String> = Vec::new();

    for word in words {
        let id = vocab.word2id(word);
        ids.push(id);
        if id == UNK_ID {
            let oov_num = match oovs.iter().position(|o| o == word) {
                Some(pos) => pos,
                None => {
                    oovs.push(word.to_string());
                    oovs.len() - 1
                }
            };
            extended.push(vocab.size() + oov_num);
        } else {
            extended.push(id);
        }
    }
    (ids, extended, oovs)
}

/// Map abstract words to extended ids using the article's OOV list
///
/// OOV words that appear in the article get their extended id, others map to UNK.
pub fn abstract2ids(words: &[&str], vocab: &Vocab, article_oovs: &[String]) -> Vec<usize> {
    words
        .iter()
        .map(|word| {
            let id = vocab.word2id(word);
            if id != UNK_ID {
                return id;
            }
            match article_oovs.iter().position(|o| o == word) {
                Some(pos) => vocab.size() + pos,
                None => UNK_ID,
            }
        })
        .collect()
}

/// Map output ids back to words, resolving ids `>= V` through the article OOVs
pub fn outputids2words(ids: &[usize], vocab: &Vocab, article_oovs: &[String]) -> Result<Vec<String>> {
    ids.iter()
        .map(|&id| {
            if id < vocab.size() {
                return vocab.id2word(id).map(str::to_string);
            }
            let oov_index = id - vocab.size();
            article_oovs
                .get(oov_index)
                .cloned()
                .ok_or(DeepReleaseError::InvalidWordId {
                    id,
                    oov_index,
                    oov_count: article_oovs.len(),
                    vocab_size: vocab.size(),
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn tiny_vocab() -> Vocab {
        Vocab::from_words(["x"], 0).unwrap()
    }

    #[test]
    fn test_reserved_ids() {
        let vocab = tiny_vocab();
        assert_eq!(vocab.size(), 5);
        assert_eq!(vocab.word2id(PAD_TOKEN), PAD_ID);
        assert_eq!(vocab.word2id(UNKNOWN_TOKEN), UNK_ID);
        assert_eq!(vocab.word2id(START_DECODING), START_ID);
        assert_eq!(vocab.word2id(STOP_DECODING), STOP_ID);
        assert_eq!(vocab.word2id("x"), 4);
        assert_eq!(vocab.word2id("never-seen"), UNK_ID);
    }

    #[test]
    fn test_id2word_out_of_range() {
        let vocab = tiny_vocab();
        assert_eq!(vocab.id2word(4).unwrap(), "x");
        assert!(matches!(vocab.id2word(5), Err(DeepReleaseError::Vocabulary(_))));
    }

    #[test]
    fn test_corrupted_vocab_rejected() {
        assert!(Vocab::from_words(["a", "b", "a"], 0).is_err());
        assert!(Vocab::from_words(["a", "[UNK]"], 0).is_err());
        assert!(Vocab::from_words(["</s>"], 0).is_err());
    }

    #[test]
    fn test_max_size_truncates() {
        let vocab = Vocab::from_words(["a", "b", "c", "a"], 6).unwrap();
        assert_eq!(vocab.size(), 6);
        assert_eq!(vocab.word2id("c"), UNK_ID);
    }

    #[test]
    fn test_from_file_skips_malformed_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vocab.txt");
        std::fs::write(&path, "fix 120\nbug 80\nbad line here\n\nadd\n").unwrap();

        let vocab = Vocab::from_file(&path, 0).unwrap();
        assert_eq!(vocab.size(), 7);
        assert_eq!(vocab.word2id("fix"), 4);
        assert_eq!(vocab.word2id("add"), 6);
    }

    #[test]
    fn test_from_file_missing() {
        let result = Vocab::from_file(Path::new("/nonexistent/vocab.txt"), 0);
        assert!(matches!(result, Err(DeepReleaseError::Vocabulary(_))));
    }

    #[test]
    fn test_article2ids_oov_scenario() {
        let vocab = tiny_vocab();
        let (ids, extended, oovs) = article2ids(&["x", "y"], &vocab);
        assert_eq!(ids, vec![4, UNK_ID]);
        assert_eq!(extended, vec![4, 5]);
        assert_eq!(oovs, vec!["y"]);
    }

    #[test]
    fn test_abstract2ids_uses_article_oovs() {
        let vocab = tiny_vocab();
        let oovs = vec!["y".to_string()];
        assert_eq!(abstract2ids(&["x", "y", "z"], &vocab, &oovs), vec![4, 5, UNK_ID]);
    }

    #[test]
    fn test_outputids2words_invalid_id() {
        let vocab = tiny_vocab();
        let oovs = vec!["y".to_string()];
        assert_eq!(outputids2words(&[4, 5], &vocab, &oovs).unwrap(), vec!["x", "y"]);

        let err = outputids2words(&[6], &vocab, &oovs).unwrap_err();
        assert!(matches!(
            err,
            DeepReleaseError::InvalidWordId { id: 6, oov_index: 1, oov_count: 1, .. }
        ));
    }

    proptest! {
        #[test]
        fn prop_vocab_round_trip(words in prop::collection::hash_set("[a-z]{1,8}", 1..40)) {
            let vocab = Vocab::from_words(words.iter(), 0).unwrap();
            for word in &words {
                let id = vocab.word2id(word);
                prop_assert_eq!(vocab.id2word(id).unwrap(), word.as_str());
            }
        }

        #[test]
        fn prop_oov_ids_first_occurrence(article in prop::collection::vec("[a-e]", 0..30)) {
            let vocab = Vocab::from_words(["a", "b"], 0).unwrap();
            let words: Vec<&str> = article.iter().map(String::as_str).collect();
            let (_, extended, oovs) = article2ids(&words, &vocab);

            let mut next = vocab.size();
            for &id in &extended {
                if id >= vocab.size() {
                    prop_assert!(id <= next);
                    if id == next {
                        next += 1;
                    }
                }
            }
            prop_assert_eq!(next - vocab.size(), oovs.len());

            let decoded = outputids2words(&extended, &vocab, &oovs).unwrap();
            prop_assert_eq!(decoded, article);
        }
    }
}
