use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "recovery-cli")]
#[command(about = "Management CLI for the error recovery admin API", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8081")]
    url: String,

    /// Bearer token, if the server has an API key configured.
    #[arg(short, long, env = "ERROR_RECOVERY_API_KEY")]
    key: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show every circuit breaker's state
    States,
    /// Show per-key retry statistics
    Stats,
    /// Force one circuit breaker back to CLOSED
    Reset {
        /// Dependency key
        key: String,
    },
    /// Force every circuit breaker back to CLOSED
    ResetAll,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut headers = HeaderMap::new();
    if let Some(key) = &cli.key {
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {key}"))?,
        );
    }
    let client = reqwest::Client::builder().default_headers(headers).build()?;
    let base = cli.url.trim_end_matches('/');

    let request = match &cli.command {
        Commands::States => client.get(format!("{base}/circuit-breakers")),
        Commands::Stats => client.get(format!("{base}/retry-stats")),
        Commands::Reset { key } => client
            .post(format!("{base}/reset-circuit-breaker"))
            .json(&json!({ "key": key })),
        Commands::ResetAll => client.post(format!("{base}/reset-all-circuit-breakers")),
    };

    let res = request.send().await?;
    let status = res.status();
    let body: Value = res.json().await.unwrap_or(Value::Null);

    if !status.is_success() {
        eprintln!("Error: {status}");
        eprintln!("{}", serde_json::to_string_pretty(&body)?);
        std::process::exit(1);
    }

    println!("{}", serde_json::to_string_pretty(&body)?);
    Ok(())
}
