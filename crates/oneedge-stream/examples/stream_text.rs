use std::sync::Arc;

use oneedge_stream::prelude::*;
use oneedge_stream::providers::openai::OpenAiChatProvider;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), ClientError> {
    oneedge_stream::observability::init_observability();

    let client = ChatClient::builder()
        .register_provider(Arc::new(OpenAiChatProvider::from_env()?))
        .build()?;

    let mut turn = client
        .conversation(ConversationConfig::named("stream"))
        .turn(ModelRef::new("openai", "gpt-4o-mini"))
        .system_prompt("Reply with a short greeting.")
        .user_text("Stream a greeting.")
        .start_stream()
        .await?;

    while let Some(event) = turn.next_event().await {
        match event {
            StreamEvent::ContentDelta { text, .. } => print!("{text}"),
            StreamEvent::Completed { .. } => println!(),
            StreamEvent::Cancelled { .. } => println!("[stopped]"),
            StreamEvent::Error { failure, .. } => eprintln!("turn error: {failure}"),
            StreamEvent::TurnStarted { .. } => {}
        }
    }

    let _ = turn.finish().await?;
    Ok(())
}
