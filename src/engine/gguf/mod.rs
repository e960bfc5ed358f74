//! GGUF backend via llama-cpp-2.

mod backend;

pub use backend::{GgufBackend, GgufSession};
