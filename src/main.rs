use clap::Parser;
use log::{error, info};
use std::path::PathBuf;
use trawl::configuration::config::Config;
use trawl::controller::controller_handler::Controller;

#[derive(Parser)]
#[command(name = "trawl")]
#[command(version = "0.0.2")]
#[command(about = "Request/response reconstruction and capture retention for a packet capture worker")]
struct Args {
    /// Path to the TOML configuration file
    config_file: PathBuf,
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .format_target(false)
        .init();

    let args = Args::parse();

    info!("Importing configuration from {}", args.config_file.display());
    let config = match Config::from_file(&args.config_file) {
        Ok(config) => config,
        Err(e) => {
            error!("Unable to import configuration from file: {}", e);
            std::process::exit(1);
        }
    };

    let mut controller = match Controller::new(config) {
        Ok(controller) => controller,
        Err(e) => {
            error!("Unable to create a controller instance: {}, exiting...", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = controller.run().await {
        error!("Error occured in the controller process: {}, exiting...", e);
        std::process::exit(1);
    }
}
