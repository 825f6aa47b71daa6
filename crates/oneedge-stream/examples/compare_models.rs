use std::sync::Arc;

use oneedge_stream::prelude::*;
use oneedge_stream::providers::openai::OpenAiChatProvider;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), ClientError> {
    oneedge_stream::observability::init_observability();

    let prompt = "summarize the tradeoffs between SSE and WebSockets";
    println!("query kind: {:?}", classify(prompt));

    let client = ChatClient::builder()
        .register_provider(Arc::new(OpenAiChatProvider::from_env()?))
        .build()?;

    let run = client
        .conversation(ConversationConfig::named("compare"))
        .compare(vec![
            ModelRef::new("openai", "gpt-4o-mini"),
            ModelRef::new("openai", "gpt-4o"),
        ])
        .system_prompt("Answer in two sentences.")
        .prompt(prompt)
        .start()
        .await?;

    for outcome in run.finish().await? {
        println!("--- {} ({:?})", outcome.model, outcome.status);
        if let Some(failure) = &outcome.failure {
            println!("failure: {failure}");
        } else {
            println!("{}", outcome.content);
        }
    }
    Ok(())
}
