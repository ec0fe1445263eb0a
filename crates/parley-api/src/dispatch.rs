// Fan-out of one chat message to the selected providers
//
// Dispatch never touches the session store. It reads a loaded `SessionState`
// and hands back the provider states worth persisting; the handlers decide
// where they go.

use futures::future::join_all;
use futures::{Stream, StreamExt};
use parley_llm::{LlmError, ProviderFactory, ProviderState, SessionState};
use std::sync::Arc;

/// Terminator emitted after each provider's stream
pub const DONE_MARKER: &str = "[DONE]";

/// A parsed `/chat` request
#[derive(Debug, Clone, PartialEq)]
pub struct ChatParams {
    pub message: String,
    /// Provider name to model, in request order
    pub providers: Vec<(String, String)>,
    pub use_reasoning: bool,
    pub use_streaming: bool,
}

/// Inline text for a failed provider call
pub fn error_text(err: &LlmError) -> String {
    format!("Error: {}", err)
}

/// Result of a non-streaming dispatch
#[derive(Debug, Default)]
pub struct BatchOutcome {
    /// Reply text or `Error: ...`, one entry per requested provider, in order
    pub responses: Vec<(String, String)>,
    /// States of the providers that answered successfully
    pub updates: Vec<(String, ProviderState)>,
}

/// Call every provider concurrently and collect the answers
///
/// A failing provider only spoils its own slot.
pub async fn dispatch_batch(factory: &ProviderFactory, session: &SessionState, params: &ChatParams) -> BatchOutcome {
    let calls = params.providers.iter().map(|(name, model)| async move {
        let result = call_provider(factory, session, name, model, params).await;
        (name.clone(), result)
    });

    let mut outcome = BatchOutcome::default();
    for (name, result) in join_all(calls).await {
        match result {
            Ok((reply, state)) => {
                outcome.responses.push((name.clone(), reply));
                outcome.updates.push((name, state));
            }
            Err(e) => {
                tracing::error!(provider = %name, error = %e, "Error generating response");
                outcome.responses.push((name, error_text(&e)));
            }
        }
    }

    outcome
}

async fn call_provider(
    factory: &ProviderFactory,
    session: &SessionState,
    name: &str,
    model: &str,
    params: &ChatParams,
) -> parley_llm::Result<(String, ProviderState)> {
    let mut provider = factory.resolve(name, false, session)?;

    let reply = if params.use_reasoning {
        provider.respond_with_reasoning(&params.message, model).await?
    } else {
        provider.respond(&params.message, model).await?
    };

    Ok((reply, provider.to_state()))
}

/// One step of a streaming dispatch
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchEvent {
    /// A provider's section begins
    Provider(String),
    Fragment(String),
    /// The current provider's stream is exhausted
    Done,
    /// Terminal failure; nothing follows
    Error(String),
    /// State to save once a provider finished successfully
    Persist { provider: String, state: ProviderState },
}

impl DispatchEvent {
    /// Text sent to the client for this event, `None` for internal events
    pub fn client_data(&self) -> Option<&str> {
        match self {
            DispatchEvent::Provider(name) => Some(name),
            DispatchEvent::Fragment(text) => Some(text),
            DispatchEvent::Done => Some(DONE_MARKER),
            DispatchEvent::Error(text) => Some(text),
            DispatchEvent::Persist { .. } => None,
        }
    }
}

/// Stream the providers one after another
///
/// Each provider yields its name, its fragments, a `Persist` and then
/// `Done`. The next provider starts only after the previous one is drained.
/// The first failure yields one `Error` and ends the whole stream.
pub fn dispatch_stream(
    factory: Arc<ProviderFactory>,
    session: SessionState,
    params: ChatParams,
) -> impl Stream<Item = DispatchEvent> + Send + 'static {
    async_stream::stream! {
        for (name, model) in &params.providers {
            yield DispatchEvent::Provider(name.clone());

            let mut provider = match factory.resolve(name, false, &session) {
                Ok(provider) => provider,
                Err(e) => {
                    tracing::error!(provider = %name, error = %e, "Error in stream dispatch");
                    yield DispatchEvent::Error(error_text(&e));
                    return;
                }
            };

            {
                let fragments = provider.stream(&params.message, model, params.use_reasoning);
                futures::pin_mut!(fragments);

                while let Some(fragment) = fragments.next().await {
                    match fragment {
                        Ok(text) => yield DispatchEvent::Fragment(text),
                        Err(e) => {
                            tracing::error!(provider = %name, error = %e, "Error in stream dispatch");
                            yield DispatchEvent::Error(error_text(&e));
                            return;
                        }
                    }
                }
            }

            yield DispatchEvent::Persist {
                provider: name.clone(),
                state: provider.to_state(),
            };
            yield DispatchEvent::Done;
        }
    }
}

/// Fresh state replacing `name`'s history
///
/// Only providers that already have session state can be reset.
pub fn reset_provider(factory: &ProviderFactory, session: &SessionState, name: &str) -> parley_llm::Result<ProviderState> {
    if !session.contains(name) {
        return Err(LlmError::InvalidRequest(
            "Invalid provider or no conversation history".to_string(),
        ));
    }

    Ok(factory.resolve(name, true, session)?.to_state())
}
