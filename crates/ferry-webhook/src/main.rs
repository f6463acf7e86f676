use clap::{Arg, Command};
use std::net::SocketAddr;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Command::new("ferry-webhook")
        .version(ferry_webhook::VERSION)
        .about("Provider admission webhook")
        .arg(
            Arg::new("listen")
                .long("listen")
                .default_value("0.0.0.0:8443")
                .value_parser(clap::value_parser!(SocketAddr))
                .help("Address to listen on"),
        )
        .get_matches();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let addr = cli
        .get_one::<SocketAddr>("listen")
        .copied()
        .ok_or_else(|| anyhow::anyhow!("--listen is required"))?;

    ferry_webhook::serve(addr).await;
    Ok(())
}
