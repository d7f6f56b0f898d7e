//! Vector store: append-only table of memory rows, cosine-similarity
//! search, scan, delete, refresh.

mod connection;
mod migrations;

pub use connection::{cosine_similarity, VectorStore};
