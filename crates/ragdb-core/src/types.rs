//! Domain types used by the index, retrieval, and generation engines.

use serde::{Deserialize, Serialize};

pub type ChunkId = String;

/// A bounded span of source text treated as the retrieval unit.
///
/// - `id`: stable identifier, `"{source}:{position}"`
/// - `source`: document identity (file stem or external id)
/// - `heading_path`: enclosing section titles, outermost first
/// - `position`: ordinal within the source document
/// - `parent_id`: the coarser section chunk whose text contains this
///   chunk's text; `None` marks a parent chunk itself (no cycles)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub id: ChunkId,
    pub source: String,
    pub heading_path: Vec<String>,
    pub text: String,
    pub position: usize,
    pub parent_id: Option<ChunkId>,
}

impl Chunk {
    /// Parent (section-level) chunks carry no `parent_id`; only children
    /// are fed to the retrieval indexes.
    pub fn is_parent(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// Indicates which engine produced a hit.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SourceKind {
    Vector,
    Text,
}

/// The minimal surface returned by both engines.
///
/// `id` matches `Chunk::id`. `score` is method-local: higher is always
/// better, but values are not comparable across `SourceKind`s before
/// fusion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: ChunkId,
    pub score: f32,
    pub source: SourceKind,
}

/// A hit after reciprocal-rank fusion; scores are comparable across the
/// whole candidate pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FusedHit {
    pub id: ChunkId,
    pub score: f32,
}

/// Coarse classification of a question, driving retrieval breadth and the
/// prompt template. Always exactly one of these three.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Intent {
    List,
    Detail,
    General,
}

impl Intent {
    pub fn as_str(self) -> &'static str {
        match self {
            Intent::List => "list",
            Intent::Detail => "detail",
            Intent::General => "general",
        }
    }
}

/// Membership filter applied after fusion/rerank scoring; it removes
/// candidates but never changes relative scores.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetadataFilter {
    /// Keep only chunks from this source document.
    pub source: Option<String>,
    /// Keep only chunks whose heading path starts with these titles.
    pub heading_prefix: Option<Vec<String>>,
}

impl MetadataFilter {
    pub fn is_empty(&self) -> bool {
        self.source.is_none() && self.heading_prefix.is_none()
    }

    pub fn matches(&self, chunk: &Chunk) -> bool {
        if let Some(source) = &self.source {
            if &chunk.source != source {
                return false;
            }
        }
        if let Some(prefix) = &self.heading_prefix {
            if chunk.heading_path.len() < prefix.len() {
                return false;
            }
            if !chunk.heading_path.iter().zip(prefix.iter()).all(|(a, b)| a == b) {
                return false;
            }
        }
        true
    }
}

/// A document handed over by the ingestion collaborator: already-extracted
/// text with markdown-style `#` heading markers. The core never parses
/// binary formats itself.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub source: String,
    pub text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk() -> Chunk {
        Chunk {
            id: "soup:3".to_string(),
            source: "soup".to_string(),
            heading_path: vec!["Recipes".to_string(), "Soups".to_string()],
            text: "simmer gently".to_string(),
            position: 3,
            parent_id: Some("soup:2".to_string()),
        }
    }

    #[test]
    fn empty_filter_matches_everything() {
        let filter = MetadataFilter::default();
        assert!(filter.is_empty());
        assert!(filter.matches(&chunk()));
    }

    #[test]
    fn source_filter_is_exact() {
        let filter = MetadataFilter { source: Some("soup".to_string()), heading_prefix: None };
        assert!(filter.matches(&chunk()));
        let other = MetadataFilter { source: Some("bread".to_string()), heading_prefix: None };
        assert!(!other.matches(&chunk()));
    }

    #[test]
    fn heading_prefix_matches_from_the_root() {
        let yes = MetadataFilter {
            source: None,
            heading_prefix: Some(vec!["Recipes".to_string()]),
        };
        assert!(yes.matches(&chunk()));
        let deeper = MetadataFilter {
            source: None,
            heading_prefix: Some(vec!["Recipes".to_string(), "Soups".to_string()]),
        };
        assert!(deeper.matches(&chunk()));
        let no = MetadataFilter {
            source: None,
            heading_prefix: Some(vec!["Soups".to_string()]),
        };
        assert!(!no.matches(&chunk()));
    }
}
