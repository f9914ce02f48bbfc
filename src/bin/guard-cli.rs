use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "guard-cli")]
#[command(about = "Management CLI for Parlour Guard", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    #[arg(short, long, env = "PARLOUR_GUARD_ADMIN_KEY", default_value = "CHANGE_ME_IN_PRODUCTION")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check guard status
    Status,
    /// Aggregate security events over a trailing window
    Stats {
        /// Window in milliseconds (defaults to 24h on the server)
        #[arg(long)]
        window_ms: Option<u64>,
    },
    /// Dump every buffered security event
    Events,
    /// Most recent events for one user
    UserEvents {
        user_id: String,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Drop all buffered security events
    Clear,
    /// Clear the rate limit counters for a user/action pair
    Reset {
        action: String,
        #[arg(long)]
        user: Option<String>,
    },
    /// Block a user/action pair
    Block {
        action: String,
        #[arg(long)]
        user: Option<String>,
        #[arg(long)]
        duration_ms: u64,
    },
    /// Run a permission check as a client would
    Check {
        action: String,
        #[arg(long)]
        user: Option<String>,
        #[arg(long)]
        content: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", cli.key))?,
    );

    let request = match cli.command {
        Commands::Status => client.get(format!("{base}/admin/status")).headers(headers),
        Commands::Stats { window_ms } => {
            let mut req = client.get(format!("{base}/admin/stats")).headers(headers);
            if let Some(window_ms) = window_ms {
                req = req.query(&[("window_ms", window_ms)]);
            }
            req
        }
        Commands::Events => client.get(format!("{base}/admin/events")).headers(headers),
        Commands::UserEvents { user_id, limit } => {
            let mut req = client
                .get(format!("{base}/admin/users/{user_id}/events"))
                .headers(headers);
            if let Some(limit) = limit {
                req = req.query(&[("limit", limit)]);
            }
            req
        }
        Commands::Clear => client.delete(format!("{base}/admin/events")).headers(headers),
        Commands::Reset { action, user } => client
            .post(format!("{base}/admin/limits/reset"))
            .headers(headers)
            .json(&json!({ "user_id": user, "action": action })),
        Commands::Block {
            action,
            user,
            duration_ms,
        } => client
            .post(format!("{base}/admin/limits/block"))
            .headers(headers)
            .json(&json!({ "user_id": user, "action": action, "duration_ms": duration_ms })),
        Commands::Check {
            action,
            user,
            content,
        } => client
            .post(format!("{base}/v1/permissions/check"))
            .json(&json!({ "user_id": user, "action": action, "content": content })),
    };

    print_response(request.send().await?).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;

    if status.is_client_error() || status.is_server_error() {
        // Denied permission checks carry a useful body too.
        eprintln!("Guard returned status {}", status);
    }
    if text.is_empty() {
        println!("{}", status);
        return Ok(());
    }

    match serde_json::from_str::<Value>(&text) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{}", text),
    }
    Ok(())
}
