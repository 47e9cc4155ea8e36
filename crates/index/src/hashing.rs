//! Offline embedder based on feature hashing.
//!
//! Each lowercase alphanumeric token is hashed (FNV-1a) into one of
//! `dimensions` buckets with a hash-derived sign, and the resulting vector is
//! L2-normalised. Texts sharing vocabulary land close together under cosine
//! similarity. Useful for `embedding_provider = "hashing"`, tests, and
//! environments without network access.

use async_trait::async_trait;
use trialscout_core::error::ProviderError;
use trialscout_core::Embedder;

use crate::similarity::l2_normalize;

pub const DEFAULT_HASHING_DIMENSIONS: usize = 512;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimensions: usize,
    label: String,
}

impl HashingEmbedder {
    /// Create an embedder producing `dimensions`-sized vectors (minimum 1).
    pub fn new(dimensions: usize) -> Self {
        let dimensions = dimensions.max(1);
        Self {
            dimensions,
            label: format!("hashing:{dimensions}"),
        }
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Embed one text synchronously.
    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];
        for token in tokens(text) {
            let hash = fnv1a(token.as_bytes());
            let bucket = (hash % self.dimensions as u64) as usize;
            let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }
        l2_normalize(&mut vector);
        vector
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_HASHING_DIMENSIONS)
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    fn name(&self) -> &str {
        &self.label
    }

    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        Ok(inputs.iter().map(|text| self.embed_text(text)).collect())
    }
}

fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
}

fn fnv1a(bytes: &[u8]) -> u64 {
    bytes
        .iter()
        .fold(FNV_OFFSET, |hash, b| (hash ^ *b as u64).wrapping_mul(FNV_PRIME))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::similarity::cosine_similarity;

    #[test]
    fn vectors_are_unit_length() {
        let embedder = HashingEmbedder::new(64);
        let v = embedder.embed_text("Adults with moderate persistent asthma");
        assert_eq!(v.len(), 64);
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn case_and_punctuation_do_not_matter() {
        let embedder = HashingEmbedder::default();
        assert_eq!(
            embedder.embed_text("Lung Cancer!"),
            embedder.embed_text("lung, cancer")
        );
    }

    #[test]
    fn shared_vocabulary_scores_higher() {
        let embedder = HashingEmbedder::default();
        let query = embedder.embed_text("asthma inhaler trial");
        let related = embedder.embed_text("A randomized trial of a new asthma inhaler");
        let unrelated = embedder.embed_text("Pancreatic tumour surgery outcomes");
        assert!(cosine_similarity(&query, &related) > cosine_similarity(&query, &unrelated));
    }

    #[test]
    fn empty_text_is_zero_vector() {
        let embedder = HashingEmbedder::new(8);
        assert_eq!(embedder.embed_text("  ...  "), vec![0.0; 8]);
    }

    #[tokio::test]
    async fn batch_embedding_preserves_order() {
        let embedder = HashingEmbedder::new(32);
        let inputs = vec!["asthma".to_string(), "diabetes".to_string()];
        let vectors = embedder.embed(&inputs).await.unwrap();
        assert_eq!(vectors[0], embedder.embed_text("asthma"));
        assert_eq!(vectors[1], embedder.embed_text("diabetes"));
        assert_eq!(embedder.name(), "hashing:32");
    }
}
