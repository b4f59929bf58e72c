//! Narrative type classification over candidate centroids.
//!
//! The four reference vectors come from embedding fixed exemplar sentences
//! once at worker startup; tasks share the classifier read-only.

use tracing::debug;

use super::types::{AttachedSegment, Candidate, SemanticType, SEMANTIC_TYPE_MAX};
use crate::embedding::{cosine_similarity, EmbeddingError, EmbeddingProvider};

/// One exemplar sentence per narrative type.
pub const SEMANTIC_EXAMPLES: [(SemanticType, &str); 4] = [
    (
        SemanticType::Exposition,
        "La palabra ensena que la gracia de Dios es un regalo que no podemos ganar con obras.",
    ),
    (
        SemanticType::Illustration,
        "Recuerdo a un hombre que cada manana caminaba kilometros para llevar agua a su familia.",
    ),
    (
        SemanticType::Application,
        "Esta semana toma un momento cada dia para perdonar a la persona que te ofendio.",
    ),
    (
        SemanticType::Conclusion,
        "Por eso pongamos nuestra confianza en Dios y vivamos cada dia con esperanza.",
    ),
];

/// Prefix sums of segment embeddings: one O(N·d) pass, then any range
/// centroid in O(d).
pub struct CentroidIndex {
    prefix: Vec<Vec<f64>>,
    dimension: usize,
}

impl CentroidIndex {
    /// Build the index. Returns None unless every segment carries an
    /// embedding of the given dimension.
    pub fn build(segments: &[AttachedSegment], dimension: usize) -> Option<Self> {
        let mut prefix = Vec::with_capacity(segments.len() + 1);
        prefix.push(vec![0.0f64; dimension]);

        for attached in segments {
            let embedding = attached.embedding.as_ref()?;
            if embedding.len() != dimension {
                return None;
            }
            let last = prefix.last().expect("prefix is never empty");
            let mut next = last.clone();
            for (acc, value) in next.iter_mut().zip(embedding) {
                *acc += *value as f64;
            }
            prefix.push(next);
        }

        Some(Self { prefix, dimension })
    }

    /// Mean embedding of the inclusive segment range [start_idx, end_idx].
    pub fn centroid(&self, start_idx: usize, end_idx: usize) -> Vec<f32> {
        let count = (end_idx + 1 - start_idx) as f64;
        let lo = &self.prefix[start_idx];
        let hi = &self.prefix[end_idx + 1];

        (0..self.dimension)
            .map(|d| ((hi[d] - lo[d]) / count) as f32)
            .collect()
    }
}

/// Reference vectors for the four narrative types.
pub struct SemanticClassifier {
    references: Vec<(SemanticType, Vec<f32>)>,
}

impl SemanticClassifier {
    /// Embed the exemplar sentences through the injected provider.
    pub async fn from_provider(
        provider: &dyn EmbeddingProvider,
    ) -> Result<Self, EmbeddingError> {
        let texts: Vec<String> = SEMANTIC_EXAMPLES
            .iter()
            .map(|(_, text)| text.to_string())
            .collect();
        let vectors = provider.embed(&texts).await?;

        if vectors.len() != SEMANTIC_EXAMPLES.len() {
            return Err(EmbeddingError::InvalidResponse(format!(
                "expected {} reference vectors, got {}",
                SEMANTIC_EXAMPLES.len(),
                vectors.len()
            )));
        }

        let references = SEMANTIC_EXAMPLES
            .iter()
            .map(|(kind, _)| *kind)
            .zip(vectors)
            .collect();

        Ok(Self { references })
    }

    /// Build directly from precomputed reference vectors.
    pub fn from_references(references: Vec<(SemanticType, Vec<f32>)>) -> Self {
        Self { references }
    }

    /// The narrative type whose reference vector is most similar to the
    /// centroid.
    pub fn classify(&self, centroid: &[f32]) -> (SemanticType, f32) {
        self.references
            .iter()
            .map(|(kind, reference)| (*kind, cosine_similarity(reference, centroid)))
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
            .expect("classifier always holds reference vectors")
    }
}

/// Store the range centroid on every candidate.
pub fn attach_centroids(candidates: &mut [Candidate], index: &CentroidIndex) {
    for candidate in candidates {
        candidate.centroid = Some(index.centroid(candidate.start_idx, candidate.end_idx));
    }
}

/// Classify the best SEMANTIC_TYPE_MAX candidates by working score and fold
/// the type multiplier into their score.
pub fn apply_semantic_types(candidates: &mut [Candidate], classifier: &SemanticClassifier) {
    let mut order: Vec<usize> = (0..candidates.len()).collect();
    order.sort_by(|&a, &b| {
        candidates[b]
            .score
            .partial_cmp(&candidates[a].score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(candidates[a].start_ms.cmp(&candidates[b].start_ms))
            .then(candidates[a].end_ms.cmp(&candidates[b].end_ms))
    });

    let mut classified = 0usize;
    for idx in order.into_iter().take(SEMANTIC_TYPE_MAX) {
        let candidate = &mut candidates[idx];
        let Some(centroid) = candidate.centroid.as_ref() else {
            continue;
        };

        let (kind, _) = classifier.classify(centroid);
        let multiplier = kind.multiplier();
        candidate.semantic_type = Some(kind);
        candidate.type_score = Some(multiplier);
        candidate.score *= multiplier;
        candidate.rationale = format!("{}; type={}", candidate.rationale, kind.label());
        classified += 1;
    }

    debug!(classified, "semantic type classification applied");
}
