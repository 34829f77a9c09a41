//! HTTP reachability and authenticated-GET probing

use super::ProbeError;
use schema::Expect;
use std::time::Duration;
use tracing::debug;

/// HTTP probe that issues a single GET and validates the response
///
/// Passed iff the status code equals the expected one and, when an expected
/// substring is configured, the body contains it. Credentials may be
/// attached as HTTP basic auth or as a secret-bearing header; TLS
/// verification can be disabled for self-signed appliances.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    /// Full URL to request
    url: String,
    /// Expected response criteria
    expect: Expect,
    /// Basic-auth credentials, when configured
    basic_auth: Option<(String, String)>,
    /// Extra headers (API keys and their companions)
    headers: Vec<(String, String)>,
    /// Verify TLS certificates
    verify_tls: bool,
    /// Follow redirects before judging the status
    follow_redirects: bool,
    /// Request timeout
    timeout: Duration,
}

impl HttpProbe {
    /// Create a new HTTP probe with a 5s timeout and TLS verification on
    pub fn new(url: impl Into<String>, expect: Expect) -> Self {
        Self {
            url: url.into(),
            expect,
            basic_auth: None,
            headers: Vec::new(),
            verify_tls: true,
            follow_redirects: false,
            timeout: Duration::from_secs(5),
        }
    }

    /// Attach basic-auth credentials
    pub fn basic_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.basic_auth = Some((username.into(), password.into()));
        self
    }

    /// Attach an extra request header
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Disable TLS certificate verification
    pub fn danger_accept_invalid_certs(mut self, accept: bool) -> Self {
        self.verify_tls = !accept;
        self
    }

    /// Follow redirects before judging the response
    pub fn follow_redirects(mut self, follow: bool) -> Self {
        self.follow_redirects = follow;
        self
    }

    /// Override the request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Get the target URL
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Execute the probe, returning the pass detail ("HTTP <code>")
    pub async fn check(&self) -> Result<String, ProbeError> {
        debug!("HTTP probe requesting {}", self.url);

        let client = build_client(self.verify_tls, self.follow_redirects, self.timeout)?;

        let mut request = client.get(&self.url);
        if let Some((user, pass)) = &self.basic_auth {
            request = request.basic_auth(user, Some(pass));
        }
        for (name, value) in &self.headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request.send().await.map_err(|e| {
            debug!("HTTP probe to {} failed: {}", self.url, e);
            ProbeError::from(e)
        })?;

        let status = response.status().as_u16();
        debug!("HTTP probe to {} returned status {}", self.url, status);

        if !self.expect.matches_status(status) {
            return Err(ProbeError::UnexpectedStatus {
                got: status,
                expected: self.expect.expected_status(),
            });
        }

        if let Expect::StatusAndBody { .. } = &self.expect {
            let body = response.text().await.map_err(ProbeError::from)?;
            if !self.expect.matches_body(&body) {
                debug!("HTTP probe to {} body mismatch", self.url);
                return Err(ProbeError::BodyMismatch { status });
            }
        }

        Ok(format!("HTTP {}", status))
    }
}

/// Build a reqwest client for the probe's TLS/redirect/timeout settings
pub(crate) fn build_client(
    verify_tls: bool,
    follow_redirects: bool,
    timeout: Duration,
) -> Result<reqwest::Client, ProbeError> {
    let redirect = if follow_redirects {
        reqwest::redirect::Policy::limited(10)
    } else {
        reqwest::redirect::Policy::none()
    };

    reqwest::Client::builder()
        .timeout(timeout)
        .danger_accept_invalid_certs(!verify_tls)
        .redirect(redirect)
        .build()
        .map_err(|e| ProbeError::Transport(e.to_string()))
}
