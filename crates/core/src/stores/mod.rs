pub mod memory;

pub use memory::{cosine_similarity, InMemoryIndex};
