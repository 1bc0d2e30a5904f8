use reqwest::{Client, ClientBuilder};
use std::time::Duration;

/// Create a configured HTTP client for GitHub API calls and push delivery.
///
/// The timeout bounds every outbound call so one slow request cannot stall
/// an entire scheduler tick.
pub fn create_http_client() -> Client {
    ClientBuilder::new()
        .timeout(Duration::from_secs(10))
        .user_agent("streakd/1.0")
        .build()
        .expect("Failed to create HTTP client")
}
