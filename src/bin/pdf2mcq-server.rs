//! HTTP server binary: exposes `POST /generate` over the library pipeline.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_pdf2mcq::server::{build_router, AppState};
use edgequake_pdf2mcq::{Difficulty, GenerationConfig};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "pdf2mcq-server", version, about = "Serve MCQ generation over HTTP")]
struct Args {
    /// Bind address.
    #[arg(long, env = "PDF2MCQ_HOST", default_value = "127.0.0.1")]
    host: String,

    /// Bind port.
    #[arg(long, env = "PDF2MCQ_PORT", default_value_t = 8000)]
    port: u16,

    /// LLM model ID.
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider name.
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// Question difficulty: Easy, Moderate or Hard.
    #[arg(long, env = "PDF2MCQ_DIFFICULTY", default_value = "Hard")]
    difficulty: Difficulty,

    /// Maximum accepted upload size in MiB.
    #[arg(long, env = "PDF2MCQ_MAX_UPLOAD_MB", default_value_t = 50)]
    max_upload_mb: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut builder = GenerationConfig::builder().difficulty(args.difficulty);
    if let Some(ref model) = args.model {
        builder = builder.model(model);
    }
    if let Some(ref provider) = args.provider {
        builder = builder.provider_name(provider);
    }
    let config = builder.build().context("Invalid configuration")?;

    let mut state = AppState::new(config);
    state.max_upload_bytes = args.max_upload_mb * 1024 * 1024;
    let app = build_router(state);

    let addr = format!("{}:{}", args.host, args.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("pdf2mcq-server listening on http://{}", addr);

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
