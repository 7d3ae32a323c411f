use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use api_gateway::config::{load_config, GatewayConfig};
use api_gateway::pipeline::Pipeline;
use api_gateway::routing::table::parse_method;
use api_gateway::security::token::{TokenIssuer, TokenKind, TokenVerifier};

#[derive(Parser)]
#[command(name = "gateway-cli")]
#[command(about = "Operator tooling for the API gateway", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a configuration file and print the compiled route table
    Check { config: PathBuf },
    /// Show which route a request would take
    Route {
        config: PathBuf,
        method: String,
        path: String,
    },
    /// Mint a development token signed with the configured secret
    Token {
        config: PathBuf,
        #[arg(long)]
        sub: String,
        #[arg(long)]
        user_id: Option<String>,
        /// Comma-separated roles
        #[arg(long, value_delimiter = ',')]
        roles: Vec<String>,
        /// Mint a refresh token (no userId or roles)
        #[arg(long)]
        refresh: bool,
    },
    /// Verify a token and print its claims or the failure kind
    Verify { config: PathBuf, token: String },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match execute(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("Error: {message}");
            ExitCode::FAILURE
        }
    }
}

fn load(path: &Path) -> Result<GatewayConfig, String> {
    load_config(path).map_err(|e| e.to_string())
}

fn execute(command: Commands) -> Result<(), String> {
    match command {
        Commands::Check { config } => {
            let config = load(&config)?;
            let pipeline = Pipeline::from_config(&config).map_err(|e| format!("{e:?}"))?;
            println!("Configuration OK: {} routes, {} backends", pipeline.table().len(), config.backends.len());
            for (i, route) in pipeline.table().routes().iter().enumerate() {
                let rule = &route.rule;
                let methods = if rule.methods.is_empty() {
                    "*".to_string()
                } else {
                    rule.methods.iter().map(|m| m.as_str()).collect::<Vec<_>>().join(",")
                };
                let paths = rule.patterns.iter().map(|p| p.as_str()).collect::<Vec<_>>().join(" ");
                println!(
                    "{:>3}. {:<20} {:<16} {:<9} -> {:<12} {}",
                    i + 1,
                    rule.id,
                    methods,
                    rule.auth_policy.to_string(),
                    rule.backend,
                    paths
                );
            }
            match pipeline.table().fallback() {
                Some(f) => println!("     fallback -> {} ({})", f.rule.backend, f.rule.auth_policy),
                None => println!("     no fallback: unmatched requests get 404"),
            }
            Ok(())
        }
        Commands::Route { config, method, path } => {
            let config = load(&config)?;
            let method = parse_method(&method).ok_or_else(|| format!("'{method}' is not an HTTP method"))?;
            let pipeline = Pipeline::from_config(&config).map_err(|e| format!("{e:?}"))?;
            match pipeline.resolve(&method, &path) {
                Ok(route) => {
                    let output = serde_json::json!({
                        "route": route.rule.id,
                        "backend": route.rule.backend,
                        "auth": route.rule.auth_policy.to_string(),
                        "required_roles": route.rule.required_roles,
                        "timeout_ms": route.rule.timeout.as_millis() as u64,
                        "filters": route.filters.iter().map(|f| f.name()).collect::<Vec<_>>(),
                    });
                    println!("{}", serde_json::to_string_pretty(&output).map_err(|e| e.to_string())?);
                    Ok(())
                }
                Err(e) => Err(format!("{method} {path}: {e}")),
            }
        }
        Commands::Token {
            config,
            sub,
            user_id,
            roles,
            refresh,
        } => {
            let config = load(&config)?;
            let issuer = TokenIssuer::new(&config.jwt.secret, config.jwt.access_ttl_secs, config.jwt.refresh_ttl_secs);
            let kind = if refresh { TokenKind::Refresh } else { TokenKind::Access };
            let token = issuer
                .issue(kind, &sub, user_id.as_deref(), &roles)
                .map_err(|e| e.to_string())?;
            println!("{token}");
            Ok(())
        }
        Commands::Verify { config, token } => {
            let config = load(&config)?;
            let claims = TokenVerifier::new(&config.jwt.secret)
                .verify(token.trim())
                .map_err(|e| format!("rejected: {e}"))?;
            println!("{}", serde_json::to_string_pretty(&claims).map_err(|e| e.to_string())?);
            Ok(())
        }
    }
}
