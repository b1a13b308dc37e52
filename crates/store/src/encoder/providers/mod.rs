pub mod ollama;
pub mod trigram;
