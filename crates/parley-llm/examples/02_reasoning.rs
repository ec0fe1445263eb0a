use anyhow::Result;
use parley_llm::{ProviderConfig, ProviderFactory, SessionState};

#[tokio::main]
async fn main() -> Result<()> {
    let provider_name = std::env::var("PARLEY_PROVIDER").unwrap_or_else(|_| "groq".to_string());
    let model = std::env::var("PARLEY_MODEL").unwrap_or_else(|_| "llama-3.1-8b-instant".to_string());

    let factory = ProviderFactory::from_config(&ProviderConfig::from_env())?;
    let mut provider = factory.resolve(&provider_name, false, &SessionState::new())?;

    println!("Provider: {} / {}\n", provider_name, model);

    let reply = provider
        .respond_with_reasoning("Is 221 a prime number?", &model)
        .await?;
    println!("{}", reply);

    Ok(())
}
