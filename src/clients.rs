pub mod gemini;
pub mod graph;
