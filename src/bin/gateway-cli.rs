use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "gateway-cli")]
#[command(about = "Management CLI for the local API gateway", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://127.0.0.1:46123")]
    url: String,

    /// Shared gateway token (LOCAL_API_TOKEN).
    #[arg(short, long, env = "LOCAL_API_TOKEN")]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show gateway status and loaded routes
    Status,
    /// Show the recent traffic log
    Traffic,
    /// Clear the traffic log
    ClearTraffic,
    /// Set an allowlisted key, or remove it when VALUE is omitted
    SetEnv { key: String, value: Option<String> },
    /// Validate a key against its provider and store it when valid
    Validate { key: String, value: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::builder().no_proxy().build()?;
    let base = cli.url.trim_end_matches('/');

    let mut headers = HeaderMap::new();
    if let Some(token) = &cli.token {
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}"))?,
        );
    }

    let request = match cli.command {
        Commands::Status => client.get(format!("{base}/api/service-status")),
        Commands::Traffic => client.get(format!("{base}/api/local-traffic-log")),
        Commands::ClearTraffic => client.delete(format!("{base}/api/local-traffic-log")),
        Commands::SetEnv { key, value } => client
            .post(format!("{base}/api/local-env-update"))
            .json(&json!({ "key": key, "value": value })),
        Commands::Validate { key, value } => client
            .post(format!("{base}/api/local-validate-secret"))
            .json(&json!({ "key": key, "value": value })),
    };

    let res = request.headers(headers).send().await?;
    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: gateway returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
