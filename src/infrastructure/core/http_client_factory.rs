use reqwest::Client;
use std::time::Duration;

pub struct HttpClientFactory;

impl HttpClientFactory {
    /// Creates the HTTP client used to report metrics.
    ///
    /// No retry middleware: a failed send is reported to the caller, which
    /// decides whether to resubmit.
    pub fn create_client() -> Client {
        Client::builder()
            .pool_max_idle_per_host(5)
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| Client::new())
    }
}

/// Turn a configured server address (`localhost:8080` or a full URL) into a
/// base URL without trailing slash.
pub fn base_url(address: &str) -> String {
    let address = address.trim_end_matches('/');
    if address.starts_with("http://") || address.starts_with("https://") {
        address.to_string()
    } else {
        format!("http://{}", address)
    }
}
