// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

use clap::{Parser, Subcommand};
use tracing::{error, info};

mod config;
mod demo;

#[derive(Parser, Debug)]
#[command(author, version, about = "ndnrtc-rs demo CLI", long_about = None)]
struct Cli {
    /// Path to a TOML config file (layered under CLI defaults, overridden
    /// by `NDNRTC_`-prefixed environment variables).
    #[arg(short, long, default_value = "ndnrtc.toml")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Publish synthetic frames through a producer stream and fetch them
    /// back through a consumer pipeline, over an in-process simulated face.
    Demo {
        /// Override the configured frame count.
        #[arg(short, long)]
        frames: Option<u32>,
    },
    /// Print the effective configuration (defaults + file + env) as JSON.
    ShowConfig,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let loaded = match config::load(&cli.config) {
        Ok(loaded) => loaded,
        Err(err) => {
            error!(error = %err, "failed to load configuration");
            std::process::exit(2);
        },
    };
    if let Some(missing) = &loaded.file_missing {
        info!(path = %missing, "config file not found, using defaults and environment overrides");
    }

    match cli.command {
        Commands::Demo { frames } => {
            let mut demo_config = loaded.config.demo.clone();
            if let Some(frames) = frames {
                demo_config.frame_count = frames;
            }
            info!(
                stream = %demo_config.stream,
                thread = %demo_config.thread,
                frames = demo_config.frame_count,
                "starting ndnrtc demo"
            );
            match demo::run_demo(&loaded.config.engine, &demo_config).await {
                Ok(summary) => {
                    info!(%summary, "demo finished");
                    println!("{summary}");
                },
                Err(err) => {
                    error!(error = %err, "demo failed");
                    std::process::exit(1);
                },
            }
        },
        Commands::ShowConfig => match serde_json::to_string_pretty(&loaded.config) {
            Ok(json) => println!("{json}"),
            Err(err) => {
                error!(error = %err, "failed to serialize configuration");
                std::process::exit(1);
            },
        },
    }
}
