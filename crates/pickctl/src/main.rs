use clap::Parser;
use tracing_subscriber::{filter::LevelFilter, EnvFilter};

fn main() -> Result<(), anyhow::Error> {
    let cli = pickctl::Cli::parse();

    // Required in order for reqwest and the Realtime websocket to use `rustls` for TLS.
    rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .expect("failed to install default crypto provider");

    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env_lossy();

    tracing_subscriber::fmt::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .worker_threads(2)
        .build()
        .expect("failed to start runtime");

    let handle = runtime.spawn(async move { cli.run().await });
    let result = runtime.block_on(handle);

    // Change channels and the auth listener are background tasks which
    // never complete on their own, and must not block exit.
    runtime.shutdown_background();

    result?
}
