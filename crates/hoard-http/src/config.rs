//! Configuration for the HTTP client.

use std::time::Duration;

/// Configuration for [`HttpClient`](crate::HttpClient).
///
/// # Example
///
/// ```
/// use hoard_http::HttpClientConfig;
/// use std::time::Duration;
///
/// let config = HttpClientConfig::new()
///     .with_connect_timeout(Duration::from_secs(5))
///     .with_user_agent("my-app/1.0");
/// ```
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// User agent string for HTTP requests
    pub(crate) user_agent: String,
    /// Timeout for establishing a connection
    pub(crate) connect_timeout: Duration,
    /// Whole-request timeout for thumbnail fetches. Downloads have none, a
    /// large file may legitimately take hours.
    pub(crate) thumbnail_timeout: Duration,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            user_agent: concat!("hoard/", env!("CARGO_PKG_VERSION")).to_string(),
            connect_timeout: Duration::from_secs(15),
            thumbnail_timeout: Duration::from_secs(30),
        }
    }
}

impl HttpClientConfig {
    /// Create a new configuration with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the user agent string.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Set the connect timeout.
    ///
    /// Defaults to 15 seconds.
    #[must_use]
    pub const fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the thumbnail request timeout.
    ///
    /// Defaults to 30 seconds.
    #[must_use]
    pub const fn with_thumbnail_timeout(mut self, timeout: Duration) -> Self {
        self.thumbnail_timeout = timeout;
        self
    }
}
