use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::StatusCode;
use serde_json::{Map, Value};

#[derive(Parser)]
#[command(name = "proxy-cli")]
#[command(about = "Manage routes on a running route-proxy", long_about = None)]
struct Cli {
    /// Control API base URL
    #[arg(short, long, default_value = "http://127.0.0.1:8001")]
    url: String,

    /// Control API token
    #[arg(short, long, env = "ROUTE_PROXY_AUTH_TOKEN", hide_env_values = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List routes
    List {
        /// Only routes idle since before this RFC 3339 time
        #[arg(long)]
        inactive_since: Option<DateTime<Utc>>,
    },
    /// Add or replace a route
    Add {
        path: String,
        target: String,
        /// Extra JSON object stored with the route
        #[arg(long)]
        extra: Option<String>,
    },
    /// Remove a route
    Remove { path: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    let mut headers = HeaderMap::new();
    if let Some(token) = &cli.token {
        headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("token {}", token))?);
    }

    match cli.command {
        Commands::List { inactive_since } => {
            let mut request = client.get(format!("{}/api/routes", base)).headers(headers);
            if let Some(since) = inactive_since {
                request = request.query(&[("inactive_since", since.to_rfc3339())]);
            }
            let res = request.send().await?;
            print_response(res).await?;
        }
        Commands::Add { path, target, extra } => {
            let mut body = match extra {
                Some(raw) => match serde_json::from_str::<Value>(&raw)? {
                    Value::Object(fields) => fields,
                    _ => return Err("--extra must be a JSON object".into()),
                },
                None => Map::new(),
            };
            body.insert("target".into(), Value::String(target));

            let res = client
                .post(route_url(base, &path))
                .headers(headers)
                .json(&body)
                .send()
                .await?;
            print_status(res).await?;
        }
        Commands::Remove { path } => {
            let res = client
                .delete(route_url(base, &path))
                .headers(headers)
                .send()
                .await?;
            print_status(res).await?;
        }
    }

    Ok(())
}

fn route_url(base: &str, path: &str) -> String {
    format!("{}/api/routes/{}", base, path.trim_start_matches('/'))
}

async fn print_status(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    match status {
        StatusCode::CREATED => println!("Route added"),
        StatusCode::ACCEPTED => println!("Route removed"),
        _ => {
            let text = res.text().await.unwrap_or_default();
            return Err(format!("control API returned {}: {}", status, text).into());
        }
    }
    Ok(())
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        let text = res.text().await.unwrap_or_default();
        return Err(format!("control API returned {}: {}", status, text).into());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
