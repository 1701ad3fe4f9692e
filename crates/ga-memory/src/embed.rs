//! The embedding seam.
//!
//! The vector index only needs one capability from the outside world:
//! `embed(text) → vector`.  `ga-llm` provides the HTTP-backed implementation;
//! [`HashEmbedder`] is the deterministic in-process fallback used by tests
//! and offline runs.  Each store owns its embedder — nothing is process
//! global.

use thiserror::Error;

/// Failure of an embedding backend.  Carried as a plain message so that
/// `ga-memory` stays independent of any HTTP client types.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct EmbedError(pub String);

/// Anything that can turn text into a fixed-dimension vector.
pub trait Embedder: Send {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError>;

    /// Backend label for logs.
    fn name(&self) -> &str {
        "embedder"
    }
}

// ── HashEmbedder ──────────────────────────────────────────────────────────────

/// Deterministic character-bucket embedder.
///
/// Each character is FNV-hashed into one of `dim` buckets and the resulting
/// histogram is L2-normalized.  Similar strings land on similar vectors, so
/// substring-style recall (e.g. `"对话 <name>"`) behaves sensibly without any
/// model behind it.
pub struct HashEmbedder {
    dim: usize,
}

impl HashEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim: dim.max(8) }
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(128)
    }
}

/// FNV-1a over a char's UTF-8 bytes.  Stable across platforms and releases,
/// unlike `DefaultHasher`.
fn fnv1a(c: char) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    let mut buf = [0u8; 4];
    for b in c.encode_utf8(&mut buf).bytes() {
        hash ^= b as u64;
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

impl Embedder for HashEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        let mut vector = vec![0.0f32; self.dim];
        for c in text.chars().filter(|c| !c.is_whitespace()) {
            vector[(fnv1a(c) % self.dim as u64) as usize] += 1.0;
        }
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        Ok(vector)
    }

    fn name(&self) -> &str {
        "hash"
    }
}

// ── FailingEmbedder (test aid) ────────────────────────────────────────────────

/// An embedder that always errors.  Lets tests exercise the transient-concept
/// path without a network.
pub struct FailingEmbedder;

impl Embedder for FailingEmbedder {
    fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbedError> {
        Err(EmbedError("embedding backend unavailable".into()))
    }

    fn name(&self) -> &str {
        "failing"
    }
}
