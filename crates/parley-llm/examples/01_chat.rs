use anyhow::Result;
use parley_llm::{LlmProvider, OpenAIClient, DEFAULT_MAX_HISTORY};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    let api_key = std::env::var("OPENAI_API_KEY")?;
    let client = Arc::new(OpenAIClient::new(api_key)?);
    let mut provider = LlmProvider::new("openai", client, DEFAULT_MAX_HISTORY);

    let reply = provider.respond("What is the capital of France?", "gpt-4o-mini").await?;
    println!("Response: {}", reply);

    // The window carries the first exchange into the follow-up
    let reply = provider.respond("And roughly how many people live there?", "gpt-4o-mini").await?;
    println!("Follow-up: {}", reply);

    println!("\nHistory ({} turns):", provider.history().len());
    for message in provider.history().snapshot() {
        println!("  [{}] {}", message.role, message.content);
    }

    Ok(())
}
