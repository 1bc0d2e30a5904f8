mod models;
mod services;
mod utils;

use std::sync::Arc;

use services::github::GitHubClient;
use services::notifier::NotificationClient;
use services::scheduler::ReminderScheduler;
use services::store::{MemoryStore, StoreSnapshot};
use utils::config::Config;
use utils::validators::validate_url;

#[tokio::main]
async fn main() {
    // Load .env file FIRST before anything else
    dotenv::dotenv().ok();

    // Initialize logger with default level if RUST_LOG not set
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    println!("=================================================");
    println!("🚀 streakd reminder daemon");
    println!("=================================================");

    // Load configuration
    let config = Config::from_env().expect("Failed to load configuration");
    validate_url(&config.frontend_url).expect("FRONTEND_URL must be a valid http(s) URL");

    println!("📝 Configuration loaded:");
    println!("   - GitHub API: {}", config.github_api_base_url);
    println!("   - Scan interval: {}s", config.scan_interval_seconds);
    println!("   - Notify concurrency: {}", config.notify_concurrency);
    println!(
        "   - Email: {}",
        if config.smtp_host.is_some() && config.smtp_from_address.is_some() {
            "CONFIGURED"
        } else {
            "DISABLED"
        }
    );
    println!(
        "   - Push: {}",
        if config.vapid_private_key.is_some() {
            "VAPID CONFIGURED"
        } else {
            "NO VAPID KEYS"
        }
    );
    println!(
        "   - Log level: {}",
        std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string())
    );

    // Seed the store from the state file when one is present
    let state_file =
        std::env::var("STATE_FILE").unwrap_or_else(|_| "streakd.json".to_string());
    let store = match std::fs::read_to_string(&state_file) {
        Ok(contents) => {
            let snapshot: StoreSnapshot =
                serde_json::from_str(&contents).expect("Failed to parse state file");
            println!("💾 Seeded {} users from {}", snapshot.users.len(), state_file);
            Arc::new(MemoryStore::from_snapshot(snapshot))
        }
        Err(_) => {
            println!("💾 No state file at {}, starting empty", state_file);
            Arc::new(MemoryStore::new())
        }
    };

    log::info!("Store initialized");

    let github = Arc::new(GitHubClient::new(config.github_api_base_url.clone()));
    let notifier = Arc::new(
        NotificationClient::from_config(&config).expect("Failed to build notification client"),
    );

    // Start the reminder scheduler; it owns the process from here
    println!("⏰ Starting reminder scheduler");
    println!("=================================================");

    let scheduler = Arc::new(ReminderScheduler::new(store, github, notifier, &config));
    scheduler.start().await;
}
