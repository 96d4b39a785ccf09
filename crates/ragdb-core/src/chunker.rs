//! Heading-aware document chunking with parent/child linkage.
//!
//! Each section (delimited by markdown-style `#` headings) yields one
//! coarse parent chunk covering the whole section, followed by fine
//! children produced by a sliding word window. Children never span two
//! sections; a child may exceed the length budget only when a single
//! unbreakable token already does.

use crate::config::ChunkingConfig;
use crate::types::{Chunk, SourceDocument};

pub struct Chunker {
    config: ChunkingConfig,
}

struct Section {
    heading_path: Vec<String>,
    words: Vec<String>,
}

impl Chunker {
    pub fn new(config: ChunkingConfig) -> Self {
        Self { config }
    }

    /// Produce the ordered chunk sequence for one document: per section, a
    /// parent chunk followed by its children. A document with no
    /// extractable text yields an empty sequence, not an error.
    pub fn chunk_document(&self, doc: &SourceDocument) -> Vec<Chunk> {
        let mut out = Vec::new();
        let mut position = 0usize;
        for section in split_sections(&doc.text) {
            let words = split_oversized(section.words, self.config.max_chars);
            if words.is_empty() {
                continue;
            }
            let parent_id = format!("{}:{}", doc.source, position);
            out.push(Chunk {
                id: parent_id.clone(),
                source: doc.source.clone(),
                heading_path: section.heading_path.clone(),
                text: words.join(" "),
                position,
                parent_id: None,
            });
            position += 1;
            for window in word_windows(&words, self.config.max_chars, self.config.overlap_chars) {
                out.push(Chunk {
                    id: format!("{}:{}", doc.source, position),
                    source: doc.source.clone(),
                    heading_path: section.heading_path.clone(),
                    text: window,
                    position,
                    parent_id: Some(parent_id.clone()),
                });
                position += 1;
            }
        }
        out
    }
}

/// Split a document into sections on heading lines, tracking the heading
/// stack so each section carries its full heading path.
fn split_sections(text: &str) -> Vec<Section> {
    let mut sections = Vec::new();
    let mut stack: Vec<(usize, String)> = Vec::new();
    let mut current = Section { heading_path: Vec::new(), words: Vec::new() };

    for line in text.lines() {
        let trimmed = line.trim();
        if let Some((level, title)) = parse_heading(trimmed) {
            if !current.words.is_empty() {
                sections.push(std::mem::replace(
                    &mut current,
                    Section { heading_path: Vec::new(), words: Vec::new() },
                ));
            }
            while stack.last().is_some_and(|(l, _)| *l >= level) {
                stack.pop();
            }
            stack.push((level, title.to_string()));
            current = Section {
                heading_path: stack.iter().map(|(_, t)| t.clone()).collect(),
                words: Vec::new(),
            };
        } else if !trimmed.is_empty() {
            current.words.extend(trimmed.split_whitespace().map(str::to_string));
        }
    }
    if !current.words.is_empty() {
        sections.push(current);
    }
    sections
}

fn parse_heading(line: &str) -> Option<(usize, &str)> {
    let hashes = line.bytes().take_while(|b| *b == b'#').count();
    if hashes == 0 || hashes > 6 {
        return None;
    }
    let rest = line[hashes..].trim();
    if rest.is_empty() {
        None
    } else {
        Some((hashes, rest))
    }
}

/// Break tokens longer than the chunk budget (long CJK runs have no
/// whitespace to split on) into character pieces. Both the windows and
/// the parent text are built from the resulting list, so child text stays
/// a substring of its parent's text.
fn split_oversized(words: Vec<String>, max_chars: usize) -> Vec<String> {
    let mut out = Vec::with_capacity(words.len());
    for word in words {
        if word.chars().count() <= max_chars {
            out.push(word);
            continue;
        }
        let chars: Vec<char> = word.chars().collect();
        for piece in chars.chunks(max_chars) {
            out.push(piece.iter().collect());
        }
    }
    out
}

/// Greedy forward packing over words with a character budget. Each next
/// window re-seeds with the trailing words covering at least
/// `overlap_chars`, so adjacent windows share boundary context.
fn word_windows(words: &[String], max_chars: usize, overlap_chars: usize) -> Vec<String> {
    let mut out = Vec::new();
    let mut start = 0usize;
    while start < words.len() {
        let mut end = start;
        let mut len = 0usize;
        while end < words.len() {
            let add = words[end].chars().count() + usize::from(end > start);
            if len + add > max_chars && end > start {
                break;
            }
            len += add;
            end += 1;
        }
        out.push(words[start..end].join(" "));
        if end >= words.len() {
            break;
        }
        let mut back = end;
        let mut covered = 0usize;
        while back > start + 1 && covered < overlap_chars {
            back -= 1;
            covered += words[back].chars().count() + 1;
        }
        start = back;
    }
    out
}
