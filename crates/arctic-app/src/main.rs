//! Arctic Vision server binary - composition root.
//!
//! 1. Parse CLI arguments and initialise tracing
//! 2. Load configuration and secrets
//! 3. Build the inference, token counting and speech clients
//! 4. Start the axum server that serves the chat page and session API

mod cli;

use std::sync::Arc;

use clap::Parser;

use arctic_api::state::AppState;
use arctic_chat::{ApproximateTokenCounter, HfTokenCounter, ReplicateClient, TokenCounter};
use arctic_core::config::{expand_home, ArcticConfig};
use arctic_core::Secrets;
use arctic_speech::HttpSpeechService;

use cli::CliArgs;

fn token_counter(config: &ArcticConfig) -> Arc<dyn TokenCounter> {
    match config.chat.tokenizer_path.as_deref() {
        Some(path) if !path.is_empty() => {
            let path = expand_home(path);
            tracing::info!(path = %path.display(), "Counting prompt tokens with tokenizer file");
            Arc::new(HfTokenCounter::new(path))
        }
        _ => {
            tracing::warn!(
                "No chat.tokenizer_path configured; prompt token counts are approximate"
            );
            Arc::new(ApproximateTokenCounter)
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config is read before tracing starts so its log level can apply;
    // load problems are reported once the subscriber is up.
    let config_file = args.resolve_config_path();
    let loaded = ArcticConfig::load(&config_file);
    let mut config = match &loaded {
        Ok(config) => config.clone(),
        Err(_) => ArcticConfig::default(),
    };

    // Tracing. RUST_LOG wins over --log-level and the config file.
    let level = args.resolve_log_level(&config.general.log_level);
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&level)),
        )
        .init();

    tracing::info!("Starting Arctic Vision v{}", env!("CARGO_PKG_VERSION"));
    match loaded {
        Ok(_) => tracing::info!(path = %config_file.display(), "Configuration loaded"),
        Err(e) => tracing::warn!(
            path = %config_file.display(),
            error = %e,
            "Configuration not loaded, using defaults"
        ),
    }

    config.server.port = args.resolve_port(config.server.port);
    config.validate()?;

    // Secrets.
    let secrets_path = args.resolve_secrets_path(&config.general.secrets_path);
    let secrets = Secrets::load(&secrets_path)?;
    let token = match secrets.replicate_api_token() {
        Ok(token) => token.to_string(),
        Err(e) => {
            tracing::error!(
                path = %secrets_path.display(),
                "Set REPLICATE_API_TOKEN in the environment or the secret store"
            );
            return Err(e.into());
        }
    };
    match secrets.warehouse.target() {
        Some(target) if secrets.warehouse.is_complete() => {
            tracing::info!(target = %target, "Warehouse credentials present (unused)")
        }
        _ => tracing::debug!("Warehouse credentials incomplete"),
    }

    // Clients.
    let inference = Arc::new(ReplicateClient::new(&config.model, &token));
    tracing::info!(model = %config.model.name, "Inference client ready");

    let speech = Arc::new(HttpSpeechService::new(
        &config.voice,
        secrets.speech_api_key().map(str::to_string),
    ));
    if config.voice.enabled {
        tracing::info!(endpoint = %config.voice.endpoint, "Voice input enabled");
    } else {
        tracing::info!("Voice input disabled in config");
    }

    let counter = token_counter(&config);
    tracing::info!(
        ceiling = config.chat.max_prompt_tokens,
        "Prompt token budget configured"
    );

    // Server.
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = AppState::new(config, inference, counter, speech);
    tracing::info!("Chat UI at http://{}/", addr);

    arctic_api::start_server(state).await?;
    Ok(())
}
