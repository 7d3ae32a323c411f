//! E-commerce API gateway.
//!
//! A single entry point in front of the cart, order, payment, product and
//! user services, built with Tokio and Axum.
//!
//! # Architecture Overview
//!
//! ```text
//!                         ┌───────────────────────────────────────────────────────┐
//!                         │                      API GATEWAY                       │
//!                         │                                                        │
//!    Client Request       │  ┌──────────┐   ┌──────────┐   ┌──────────────────┐    │
//!    ─────────────────────┼─▶│ in-flight│──▶│   CORS   │──▶│   route table    │    │
//!                         │  │  limit   │   │(OPTIONS) │   │ first match wins │    │
//!                         │  └──────────┘   └──────────┘   └────────┬─────────┘    │
//!                         │                                         │              │
//!                         │                                         ▼              │
//!                         │                               ┌──────────────────┐     │
//!                         │                               │  filter chain    │     │
//!                         │                               │ auth/roles/X-User│     │
//!                         │                               └────────┬─────────┘     │
//!                         │                                        │               │
//!    Client Response      │  ┌──────────┐                 ┌────────▼─────────┐     │
//!    ◀────────────────────┼──│  error   │◀── deny ────────│    forwarder     │◀────┼──── Backend
//!                         │  │ responder│                 │ timeout / retry  │     │     Service
//!                         │  └──────────┘                 └──────────────────┘     │
//!                         └───────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use api_gateway::lifecycle::startup;

#[derive(Parser)]
#[command(name = "api-gateway")]
#[command(about = "Routing and authentication gateway for the shop services", long_about = None)]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "gateway.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    match startup::run_from_path(&args.config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            // Logging may not be initialized yet if the config failed to load.
            eprintln!("api-gateway: {e}");
            tracing::error!(error = %e, "Gateway exited with error");
            ExitCode::FAILURE
        }
    }
}
