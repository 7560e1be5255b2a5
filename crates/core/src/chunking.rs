use crate::config::PipelineConfig;
use crate::error::QaError;
use crate::models::{Chunk, Document};
use sha2::{Digest, Sha256};
use std::ops::Range;

/// Joins documents into one corpus before chunking.
pub const DOCUMENT_SEPARATOR: &str = "\n\n";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub separator: String,
}

impl From<&PipelineConfig> for ChunkingConfig {
    fn from(value: &PipelineConfig) -> Self {
        Self {
            chunk_size: value.chunk_size,
            chunk_overlap: value.chunk_overlap,
            separator: value.separator.clone(),
        }
    }
}

impl ChunkingConfig {
    pub fn validate(&self) -> Result<(), QaError> {
        if self.chunk_size == 0 {
            return Err(QaError::Configuration("chunk_size must be at least 1".to_string()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(QaError::Configuration(format!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if self.separator.is_empty() {
            return Err(QaError::Configuration("separator must not be empty".to_string()));
        }
        Ok(())
    }
}

/// All documents of a request laid end to end, remembering where each one sits.
#[derive(Debug, Clone)]
pub struct Corpus {
    text: String,
    documents: Vec<(String, Range<usize>)>,
}

impl Corpus {
    pub fn concatenate(documents: &[Document]) -> Self {
        let mut text = String::new();
        let mut spans = Vec::with_capacity(documents.len());

        for (position, document) in documents.iter().enumerate() {
            if position > 0 {
                text.push_str(DOCUMENT_SEPARATOR);
            }
            let start = text.len();
            text.push_str(&document.content);
            spans.push((document.name.clone(), start..text.len()));
        }

        Self {
            text,
            documents: spans,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn sources_for(&self, bytes: Range<usize>) -> Vec<String> {
        self.documents
            .iter()
            .filter(|(_, span)| span.start < bytes.end && bytes.start < span.end)
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn split(&self, config: &ChunkingConfig) -> Result<Vec<Chunk>, QaError> {
        let mut chunks = split(&self.text, config)?;
        for chunk in &mut chunks {
            chunk.sources = self.sources_for(chunk.offset..chunk.offset + chunk.text.len());
        }
        Ok(chunks)
    }
}

#[derive(Debug, Clone, Copy)]
struct Span {
    start: usize,
    end: usize,
    chars: usize,
}

/// Splits `text` on the separator and packs the pieces greedily into chunks
/// of at most `chunk_size` characters. Each chunk after the first starts with
/// the last `chunk_overlap` characters of its predecessor, or with as many of
/// them as fit beside the next piece. Only a single piece longer than
/// `chunk_size` produces an oversized chunk, and it is kept whole.
pub fn split(text: &str, config: &ChunkingConfig) -> Result<Vec<Chunk>, QaError> {
    config.validate()?;
    if text.is_empty() {
        return Ok(Vec::new());
    }

    let separator_chars = config.separator.chars().count();
    let mut closed = Vec::new();
    let mut open: Option<Span> = None;

    for unit in units(text, &config.separator) {
        let unit_chars = text[unit.clone()].chars().count();

        let next = match open {
            None => Span {
                start: unit.start,
                end: unit.end,
                chars: unit_chars,
            },
            Some(current) if current.chars + separator_chars + unit_chars <= config.chunk_size => {
                Span {
                    start: current.start,
                    end: unit.end,
                    chars: current.chars + separator_chars + unit_chars,
                }
            }
            Some(current) => {
                closed.push(current);
                let carried = carried_overlap(config, current.chars, separator_chars, unit_chars);
                if carried == 0 {
                    Span {
                        start: unit.start,
                        end: unit.end,
                        chars: unit_chars,
                    }
                } else {
                    Span {
                        start: tail_start(text, current, carried),
                        end: unit.end,
                        chars: carried + separator_chars + unit_chars,
                    }
                }
            }
        };
        open = Some(next);
    }

    closed.extend(open);

    Ok(closed
        .into_iter()
        .filter(|span| span.end > span.start)
        .enumerate()
        .map(|(index, span)| {
            let text = text[span.start..span.end].to_string();
            Chunk {
                chunk_id: make_chunk_id(index, &text),
                index,
                offset: span.start,
                text,
                sources: Vec::new(),
            }
        })
        .collect())
}

/// Characters of the closed chunk repeated at the head of the next one. The
/// size limit wins: the overlap shrinks so the next unit still fits.
fn carried_overlap(
    config: &ChunkingConfig,
    closed_chars: usize,
    separator_chars: usize,
    unit_chars: usize,
) -> usize {
    let room = config
        .chunk_size
        .saturating_sub(separator_chars + unit_chars);
    config.chunk_overlap.min(room).min(closed_chars)
}

fn units(text: &str, separator: &str) -> Vec<Range<usize>> {
    let mut units = Vec::new();
    let mut start = 0;
    for (position, _) in text.match_indices(separator) {
        units.push(start..position);
        start = position + separator.len();
    }
    units.push(start..text.len());
    units
}

fn tail_start(text: &str, span: Span, overlap: usize) -> usize {
    let skip = span.chars.saturating_sub(overlap);
    text[span.start..span.end]
        .char_indices()
        .nth(skip)
        .map_or(span.start, |(offset, _)| span.start + offset)
}

fn make_chunk_id(index: usize, text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(index.to_le_bytes());
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}
