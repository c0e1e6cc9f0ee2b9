//! Punto de entrada del CLI de sentencias-rag

use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    // inicializar logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    // el stream de audio no es Send, así que todo corre sobre block_on
    let cli = sentencias_rag::cli::Cli::parse();

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(sentencias_rag::cli::run(cli))
}
