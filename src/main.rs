use clap::Parser;
use log::{error, info};
use siptrace::configuration::{Args, Config};
use siptrace::web_interface::WebServer;
use siptrace::TraceStore;
use std::sync::Arc;

#[tokio::main]
async fn main() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .format_target(false)
        .init();

    println!(
        "
==============================================================================
        siptrace v{}: SIP <-> gRPC gateway backend with PCAP tracing
==============================================================================
",
        env!("CARGO_PKG_VERSION")
    );

    let args = Args::parse();

    let config = match Config::load(&args) {
        Ok(config) => config,
        Err(e) => {
            error!("Unable to load configuration: {}", e);
            std::process::exit(1);
        }
    };
    info!("Configuration loaded successfully");

    let store = Arc::new(TraceStore::new(&config.trace.logs_dir));
    info!("Capture files go to {}", store.logs_dir().display());

    let server = WebServer::new(store, Arc::new(config));
    if let Err(e) = server.start().await {
        error!("Web server stopped: {}, exiting...", e);
        std::process::exit(1);
    }
}
