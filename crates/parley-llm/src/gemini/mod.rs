mod client;

pub use client::{GeminiChunkParser, GeminiClient, GEMINI_API_BASE};
