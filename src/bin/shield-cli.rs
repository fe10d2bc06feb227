use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::Value;

use auth_shield::security::constants::CSRF_TOKEN_BYTES;
use auth_shield::security::csrf::generate_token;
use auth_shield::security::input::{sanitize_input, validate_redirect_url};

#[derive(Parser)]
#[command(name = "shield-cli")]
#[command(about = "Management CLI for auth-shield", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    #[arg(short, long, env = "SHIELD_ADMIN_KEY", default_value = "")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a CSRF token
    Token {
        #[arg(long, default_value_t = CSRF_TOKEN_BYTES)]
        bytes: usize,
    },
    /// Show what the sanitizer keeps of an input
    Sanitize { input: String },
    /// Check a redirect target against an allow-list
    Redirect {
        url: String,
        #[arg(long = "allow")]
        allowed: Vec<String>,
    },
    /// Check server status
    Status,
    /// Inspect a rate-limit entry (`<limiter>:<key>`)
    Inspect { key: String },
    /// Reset a rate-limit entry (`<limiter>:<key>`)
    Reset { key: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Token { bytes } => println!("{}", generate_token(bytes)),
        Commands::Sanitize { input } => match sanitize_input(&input) {
            Ok(clean) => println!("{}", clean),
            Err(e) => exit_with(&e.to_string()),
        },
        Commands::Redirect { url, allowed } => match validate_redirect_url(&url, &allowed) {
            Ok(target) => println!("allowed: {}", target),
            Err(e) => exit_with(&e.to_string()),
        },
        Commands::Status => {
            let res = admin_client(&cli.key)?
                .get(format!("{}/admin/status", cli.url))
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Inspect { key } => {
            let res = admin_client(&cli.key)?
                .get(rate_limit_url(&cli.url, &key))
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Reset { key } => {
            let res = admin_client(&cli.key)?
                .delete(rate_limit_url(&cli.url, &key))
                .send()
                .await?;
            print_response(res).await?;
        }
    }

    Ok(())
}

fn admin_client(key: &str) -> Result<reqwest::Client, Box<dyn std::error::Error>> {
    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {}", key))?);
    Ok(reqwest::Client::builder().default_headers(headers).build()?)
}

fn rate_limit_url(base: &str, key: &str) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(key.as_bytes()).collect();
    format!("{}/admin/rate-limits/{}", base, encoded)
}

fn exit_with(message: &str) -> ! {
    eprintln!("Error: {}", message);
    std::process::exit(1);
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: Admin API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        std::process::exit(1);
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
