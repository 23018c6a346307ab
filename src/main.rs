// SPDX-License-Identifier: EUPL-1.2

use clap::Parser;
use privacyguardian::config::{Cli, Config};
use privacyguardian::gateway::run_gateway;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive("privacyguardian=info".parse()?))
        .init();

    let cli = Cli::parse();
    let config = Config::load(&cli)?;

    run_gateway(config).await
}
