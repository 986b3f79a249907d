use clap::Parser;

use qr_scanner::cli::{self, Args, Command};
use qr_scanner::config::Config;

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let config_path = args.config.as_deref();

    let result = match args.command {
        Command::ListCameras => cli::list_cameras(),
        Command::Config { action } => cli::handle_config_action(action, config_path),
        Command::Scan { camera, options } => match load_config(config_path) {
            Some(config) => cli::run_scan(&config, camera, &options).await,
            None => std::process::exit(1),
        },
        Command::Decode { image, options } => match load_config(config_path) {
            Some(config) => cli::run_decode(&config, &image, &options).await,
            None => std::process::exit(1),
        },
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// If --config is given the file must parse; a broken default config only
/// warns and falls back to defaults.
fn load_config(path: Option<&std::path::Path>) -> Option<Config> {
    match Config::load(path) {
        Ok(config) => Some(config),
        Err(e) if path.is_some() => {
            eprintln!("Error: {}", e);
            None
        }
        Err(e) => {
            eprintln!("Warning: Failed to load config file: {}", e);
            eprintln!("Using default settings.\n");
            Some(Config::default())
        }
    }
}
