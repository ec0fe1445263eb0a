mod client;

pub use client::{OpenAIChunkParser, OpenAIClient, CEREBRAS_API_BASE, GROQ_API_BASE, OPENAI_API_BASE};
