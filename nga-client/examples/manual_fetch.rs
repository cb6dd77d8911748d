//! Fetches one user's listing from the live site and prints what the
//! extractor makes of it.
//!
//! NGA_UID=123456 NGA_COOKIE='ngaPassportUid=..; ngaPassportCid=..' \
//!     cargo run -p nga-client --example manual_fetch

use nga_client::{extract, Extraction, NgaClient};
use ngawatch_core::{MonitoredSubject, NgaSettings, DEFAULT_BASE_URL};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter("nga_client=debug")
        .init();

    let uid = std::env::var("NGA_UID")?;
    let settings = NgaSettings {
        user_agent: std::env::var("NGA_USER_AGENT")
            .unwrap_or_else(|_| "Mozilla/5.0 (X11; Linux x86_64) ngawatch/0.1".to_string()),
        cookie: std::env::var("NGA_COOKIE").unwrap_or_default(),
        base_url: DEFAULT_BASE_URL.to_string(),
        request_timeout: 15,
        legacy_html: std::env::var("NGA_LEGACY_HTML").is_ok(),
    };

    println!("=== NGA listing for uid {} ===\n", uid);
    let client = NgaClient::new(&settings)?;
    println!("URL: {}", client.search_url(&uid)?);

    let body = client.fetch_author_posts(&uid).await?;
    println!("Fetched {} bytes\n", body.len());

    let subject = MonitoredSubject::new(uid.clone(), uid.clone());
    match extract(&body, &subject, client.format()) {
        Extraction::Posts(records) => {
            println!("✅ {} records", records.len());
            for record in records {
                println!(
                    "   {} author={} match={} subject={:?}",
                    record.identity(),
                    record.author_id,
                    record.raw_author_match,
                    record.subject
                );
            }
        }
        Extraction::Unparseable { reason } => {
            println!("❌ Unparseable payload: {}", reason);
            println!("{}", body.chars().take(500).collect::<String>());
        }
    }

    Ok(())
}
