use anyhow::Result;
use futures::StreamExt;
use parley_llm::{AnthropicClient, LlmProvider};
use std::io::Write;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    let api_key = std::env::var("ANTHROPIC_API_KEY")?;
    let client = Arc::new(AnthropicClient::new(api_key)?);
    let mut provider = LlmProvider::new("anthropic", client, 10);

    println!("Streaming response with reasoning:\n");

    {
        let stream = provider.stream(
            "Explain how photosynthesis works at the molecular level.",
            "claude-3-5-haiku-latest",
            true,
        );
        futures::pin_mut!(stream);

        while let Some(fragment) = stream.next().await {
            print!("{}", fragment?);
            std::io::stdout().flush()?;
        }
    }

    println!("\n\nDone. {} turns kept.", provider.history().len());

    Ok(())
}
