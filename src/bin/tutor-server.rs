//! Completion server for the tutor chat.
//!
//! Serves `POST /api/chat` and forwards conversations to an
//! OpenAI-compatible chat completions API.
//!
//! # Environment
//!
//! - `OPENAI_API_KEY` - upstream credential (required for replies)
//! - `OPENAI_MODEL` - model name (default: gpt-4o)
//! - `OPENAI_API_URL` - upstream URL (default: the OpenAI chat completions URL)
//! - `TUTOR_BIND` - listen address (default: 127.0.0.1:3000)
//! - `RUST_LOG` - log filter (default: info)

use tracing_subscriber::EnvFilter;

use tutorchat::server::{ServerConfig, serve};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = ServerConfig::from_env();
    tracing::info!(model = %config.model, upstream = %config.upstream_url, "starting completion server");
    let handle = serve(config).await?;
    println!("Listening on {}", handle.chat_url());

    tokio::signal::ctrl_c().await?;
    handle.shutdown().await?;
    Ok(())
}
