// Copyright 2025 DTC Contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

use anyhow::Result;
use clap::Parser;
use dtc_server::{cli::normalize_go_style_flags, config::GatewayConfig, run_server};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Port to run the server (overrides config file)
    #[arg(long = "serverPort", env = "DTC_SERVER_PORT")]
    server_port: Option<u16>,

    /// Port of the image generation backend (overrides config file)
    #[arg(long = "targetPort", env = "DTC_TARGET_PORT")]
    target_port: Option<u16>,

    /// Path to configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Results directory (overrides config file)
    #[arg(long, env = "DTC_RESULTS_DIR")]
    results_dir: Option<PathBuf>,

    /// Web UI directory (overrides config file)
    #[arg(long, env = "DTC_WEB_DIR")]
    web_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse_from(normalize_go_style_flags(std::env::args()));

    // Load configuration
    let mut config = GatewayConfig::load(args.config)?;

    // Apply CLI overrides
    if let Some(port) = args.server_port {
        config.server.port = port;
    }
    if let Some(port) = args.target_port {
        config.backend.port = port;
    }
    if let Some(dir) = args.results_dir {
        config.storage.results_dir = dir;
    }
    if let Some(dir) = args.web_dir {
        config.storage.web_dir = dir;
    }

    run_server(config).await
}
