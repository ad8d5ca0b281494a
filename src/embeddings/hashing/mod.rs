//! Deterministic hashed bag-of-words embedder.
//!
//! Needs no network or model files, so it serves offline setups and tests.
//! Lower-cased alphanumeric tokens minus a small stop-word list are cut to
//! a short prefix (so "enter" and "entry" share a bucket) and hashed with
//! FNV-1a into `dimension` buckets. Same text, same vector.

use async_trait::async_trait;

use crate::Result;
use crate::embeddings::{Embedder, normalize};

const PREFIX_CHARS: usize = 3;
const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "at", "be", "by", "can", "do", "does", "for", "from", "how", "i",
    "in", "is", "it", "much", "of", "on", "or", "the", "to", "what", "when", "where", "which",
    "with", "you",
];

#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimension: usize,
    name: String,
}

impl HashingEmbedder {
    #[inline]
    pub fn new(dimension: usize) -> Self {
        let dimension = dimension.max(1);
        Self {
            dimension,
            name: format!("hashing-bow-{}", dimension),
        }
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0_f32; self.dimension];
        for token in tokens(text) {
            let bucket = (fnv1a(token.as_bytes()) % self.dimension as u64) as usize;
            vector[bucket] += 1.0;
        }
        normalize(&mut vector);
        vector
    }
}

fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(str::to_lowercase)
        .filter(|word| !STOP_WORDS.contains(&word.as_str()))
        .map(|word| word.chars().take(PREFIX_CHARS).collect())
}

fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET, |hash, byte| {
        (hash ^ u64::from(*byte)).wrapping_mul(FNV_PRIME)
    })
}

#[async_trait]
impl Embedder for HashingEmbedder {
    fn model_name(&self) -> &str {
        &self.name
    }

    fn normalizes(&self) -> bool {
        true
    }

    async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_text(text))
    }
}
