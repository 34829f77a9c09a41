//! Session-establishing login probes and session-bound GETs
//!
//! A login step owns the per-service [`Session`]: a cookie jar for
//! form/JSON logins, or a token/ticket pair for API auth. The session is
//! handed to later steps of the same service and discarded when the
//! service's probe sequence ends; it never crosses service boundaries.

use super::ProbeError;
use schema::Expect;
use std::time::Duration;
use tracing::debug;

/// Ephemeral per-service authentication context
#[derive(Debug)]
pub enum Session {
    /// Client with an accumulated cookie jar (form/JSON logins)
    Cookie(reqwest::Client),
    /// Client plus an `Authorization` header value (API token auth)
    Token {
        client: reqwest::Client,
        header: String,
    },
    /// Client plus an auth ticket cookie and anti-forgery token
    Ticket {
        client: reqwest::Client,
        ticket: String,
        csrf: String,
    },
}

impl Session {
    /// GET a URL with this session's credentials attached
    pub async fn get(&self, url: &str) -> Result<reqwest::Response, ProbeError> {
        let request = match self {
            Session::Cookie(client) => client.get(url),
            Session::Token { client, header } => {
                client.get(url).header("Authorization", header.as_str())
            }
            Session::Ticket {
                client,
                ticket,
                csrf,
            } => client
                .get(url)
                .header("Cookie", format!("PVEAuthCookie={}", ticket))
                .header("CSRFPreventionToken", csrf.as_str()),
        };
        request.send().await.map_err(ProbeError::from)
    }
}

/// Form-POST login with ordered endpoint fallback
///
/// The primary login path is tried first; the legacy fallback is attempted
/// only when the response carries an empty cookie set. An HTTP transport
/// error aborts the whole login instead of falling back.
pub struct CookieLoginProbe {
    /// Service base URL
    base: String,
    /// Login endpoints, primary first
    login_paths: Vec<String>,
    /// Form field names for the credentials
    user_field: String,
    pass_field: String,
    username: String,
    password: String,
    timeout: Duration,
}

impl CookieLoginProbe {
    pub fn new(
        base: impl Into<String>,
        login_paths: Vec<String>,
        user_field: impl Into<String>,
        pass_field: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            base: base.into(),
            login_paths,
            user_field: user_field.into(),
            pass_field: pass_field.into(),
            username: username.into(),
            password: password.into(),
            timeout: Duration::from_secs(10),
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Attempt the login; on success the cookie jar becomes the session
    pub async fn login(&self) -> Result<(Session, String), ProbeError> {
        // Web UIs behind self-signed TLS; redirects followed like a browser
        let client = build_session_client(self.timeout)?;

        for path in &self.login_paths {
            let url = format!("{}{}", self.base, path);
            debug!("cookie login POST {}", url);
            let form = [
                (self.user_field.as_str(), self.username.as_str()),
                (self.pass_field.as_str(), self.password.as_str()),
            ];
            let response = client
                .post(&url)
                .form(&form)
                .send()
                .await
                .map_err(ProbeError::from)?;

            let got_cookies = response.cookies().next().is_some();
            debug!(
                "cookie login {} returned {} (cookies: {})",
                url,
                response.status(),
                got_cookies
            );
            if got_cookies {
                return Ok((
                    Session::Cookie(client),
                    "got session cookie".to_string(),
                ));
            }
            // Empty cookie set: fall through to the legacy endpoint
        }

        Err(ProbeError::NoSessionCookie)
    }
}

/// JSON-body login judged on status and a named session cookie
///
/// A 400 response is an explicit credential rejection, distinct from other
/// status mismatches.
pub struct JsonLoginProbe {
    base: String,
    path: String,
    username: String,
    password: String,
    /// Cookie that marks a successful login
    session_cookie: String,
    timeout: Duration,
}

impl JsonLoginProbe {
    pub fn new(
        base: impl Into<String>,
        path: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        session_cookie: impl Into<String>,
    ) -> Self {
        Self {
            base: base.into(),
            path: path.into(),
            username: username.into(),
            password: password.into(),
            session_cookie: session_cookie.into(),
            timeout: Duration::from_secs(10),
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub async fn login(&self) -> Result<(Session, String), ProbeError> {
        let client = build_session_client(self.timeout)?;

        let url = format!("{}{}", self.base, self.path);
        debug!("json login POST {}", url);
        let body = serde_json::json!({
            "username": self.username,
            "password": self.password,
        });
        let response = client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(ProbeError::from)?;

        let status = response.status().as_u16();
        let has_session = response
            .cookies()
            .any(|c| c.name() == self.session_cookie);

        if status == 200 && has_session {
            Ok((
                Session::Cookie(client),
                "authenticated successfully".to_string(),
            ))
        } else if status == 400 {
            Err(ProbeError::AuthRejected)
        } else {
            Err(ProbeError::UnexpectedStatus {
                got: status,
                expected: 200,
            })
        }
    }
}

/// GET an ordered list of candidate paths with an established session,
/// stopping at the first recognizable response
pub struct SessionGetProbe {
    base: String,
    paths: Vec<String>,
    /// Body substrings of which at least one must appear; empty means the
    /// status alone decides
    markers: Vec<String>,
    expect: Expect,
}

impl SessionGetProbe {
    pub fn new(base: impl Into<String>, paths: Vec<String>) -> Self {
        Self {
            base: base.into(),
            paths,
            markers: Vec::new(),
            expect: Expect::default(),
        }
    }

    pub fn markers(mut self, markers: Vec<String>) -> Self {
        self.markers = markers;
        self
    }

    pub fn expect(mut self, expect: Expect) -> Self {
        self.expect = expect;
        self
    }

    pub async fn check(&self, session: &Session) -> Result<String, ProbeError> {
        if self.markers.is_empty() {
            // Single-path mode: judged on status alone
            let path = self.paths.first().ok_or(ProbeError::NoCandidate)?;
            let response = session.get(&format!("{}{}", self.base, path)).await?;
            let status = response.status().as_u16();
            if self.expect.matches_status(status) {
                return Ok(format!("HTTP {}", status));
            }
            return Err(ProbeError::UnexpectedStatus {
                got: status,
                expected: self.expect.expected_status(),
            });
        }

        for path in &self.paths {
            let url = format!("{}{}", self.base, path);
            debug!("session GET {}", url);
            let response = session.get(&url).await?;
            let status = response.status().as_u16();
            if !self.expect.matches_status(status) {
                continue;
            }
            let body = response.text().await.map_err(ProbeError::from)?;
            if self.markers.iter().any(|m| body.contains(m.as_str())) {
                return Ok(format!("found at {}", path));
            }
        }

        Err(ProbeError::NoCandidate)
    }
}

/// Session clients accept self-signed certificates, keep cookies, and
/// follow redirects
fn build_session_client(timeout: Duration) -> Result<reqwest::Client, ProbeError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .danger_accept_invalid_certs(true)
        .cookie_store(true)
        .redirect(reqwest::redirect::Policy::limited(10))
        .build()
        .map_err(|e| ProbeError::Transport(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::service::{make_service_fn, service_fn};
    use hyper::{Body, Response, Server};
    use std::convert::Infallible;
    use std::sync::Arc;
    use tokio::task;

    struct LoginServer {
        port: u16,
        /// POSTs seen per path, in arrival order
        hits: Arc<std::sync::Mutex<Vec<String>>>,
    }

    // Server whose primary login behavior is selectable per test:
    // "cookie" sets a session cookie, "nocookie" returns 200 without one.
    async fn start_login_server(primary_mode: &'static str) -> LoginServer {
        let hits: Arc<std::sync::Mutex<Vec<String>>> = Arc::new(std::sync::Mutex::new(Vec::new()));
        let hits_for_svc = hits.clone();

        let make_svc = make_service_fn(move |_conn| {
            let hits = hits_for_svc.clone();
            async move {
                Ok::<_, Infallible>(service_fn(move |req| {
                    let hits = hits.clone();
                    async move {
                        let path = req.uri().path().to_string();
                        hits.lock().unwrap().push(path.clone());
                        let response = match path.as_str() {
                            "/authorize.html" if primary_mode == "cookie" => Response::builder()
                                .header("Set-Cookie", "session=abc123; Path=/")
                                .body(Body::from("ok"))
                                .unwrap(),
                            "/authorize.html" => Response::new(Body::from("login page")),
                            "/lua/login.lua" => Response::builder()
                                .header("Set-Cookie", "session=legacy456; Path=/")
                                .body(Body::from("ok"))
                                .unwrap(),
                            "/lua/metrics.lua" => Response::builder()
                                .status(404)
                                .body(Body::from("not found"))
                                .unwrap(),
                            "/metrics" => {
                                Response::new(Body::from("# TYPE up gauge\nup 1\n"))
                            }
                            "/interfaces" => Response::new(Body::from("[]")),
                            _ => Response::builder()
                                .status(404)
                                .body(Body::from("not found"))
                                .unwrap(),
                        };
                        Ok::<_, Infallible>(response)
                    }
                }))
            }
        });

        let addr = ([127, 0, 0, 1], 0).into();
        let server = Server::bind(&addr).serve(make_svc);
        let port = server.local_addr().port();
        task::spawn(async move {
            if let Err(e) = server.await {
                eprintln!("Server error: {}", e);
            }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;

        LoginServer { port, hits }
    }

    fn login_probe(port: u16) -> CookieLoginProbe {
        CookieLoginProbe::new(
            format!("http://127.0.0.1:{}", port),
            vec!["/authorize.html".to_string(), "/lua/login.lua".to_string()],
            "user",
            "password",
            "admin",
            "hunter2",
        )
    }

    #[tokio::test]
    async fn test_primary_cookie_skips_fallback() {
        let server = start_login_server("cookie").await;
        let (session, detail) = login_probe(server.port).login().await.unwrap();
        assert_eq!(detail, "got session cookie");
        assert!(matches!(session, Session::Cookie(_)));

        let hits = server.hits.lock().unwrap().clone();
        assert_eq!(hits, vec!["/authorize.html"]);
    }

    #[tokio::test]
    async fn test_empty_cookie_set_falls_back_once() {
        let server = start_login_server("nocookie").await;
        let (_session, detail) = login_probe(server.port).login().await.unwrap();
        assert_eq!(detail, "got session cookie");

        let hits = server.hits.lock().unwrap().clone();
        assert_eq!(hits, vec!["/authorize.html", "/lua/login.lua"]);
    }

    #[tokio::test]
    async fn test_no_cookie_anywhere_is_distinct_failure() {
        let server = start_login_server("nocookie").await;
        let probe = CookieLoginProbe::new(
            format!("http://127.0.0.1:{}", server.port),
            // Both endpoints answer without cookies
            vec!["/authorize.html".to_string(), "/authorize.html".to_string()],
            "user",
            "password",
            "admin",
            "wrong",
        );
        let err = probe.login().await.unwrap_err();
        assert_eq!(err.to_string(), "no session cookie — check credentials");
    }

    #[tokio::test]
    async fn test_transport_error_does_not_fall_back() {
        // Base points at a closed port: the first POST fails at the
        // transport level and the probe errors out instead of reporting a
        // missing cookie.
        let probe = CookieLoginProbe::new(
            "http://127.0.0.1:1".to_string(),
            vec!["/authorize.html".to_string(), "/lua/login.lua".to_string()],
            "user",
            "password",
            "admin",
            "hunter2",
        );
        let err = probe.login().await.unwrap_err();
        assert_eq!(err.to_string(), "connection refused or host unreachable");
    }

    #[tokio::test]
    async fn test_session_get_stops_at_first_marker_hit() {
        let server = start_login_server("cookie").await;
        let base = format!("http://127.0.0.1:{}", server.port);
        let (session, _) = login_probe(server.port).login().await.unwrap();

        let probe = SessionGetProbe::new(
            base.as_str(),
            vec![
                "/lua/metrics.lua".to_string(),
                "/metrics".to_string(),
                "/never/reached".to_string(),
            ],
        )
        .markers(vec!["TYPE".to_string(), "HELP".to_string()]);

        let detail = probe.check(&session).await.unwrap();
        assert_eq!(detail, "found at /metrics");

        let hits = server.hits.lock().unwrap().clone();
        assert!(!hits.contains(&"/never/reached".to_string()));
    }

    #[tokio::test]
    async fn test_session_get_exhausted_candidates() {
        let server = start_login_server("cookie").await;
        let base = format!("http://127.0.0.1:{}", server.port);
        let (session, _) = login_probe(server.port).login().await.unwrap();

        let probe = SessionGetProbe::new(base.as_str(), vec!["/lua/metrics.lua".to_string()])
            .markers(vec!["TYPE".to_string()]);
        let err = probe.check(&session).await.unwrap_err();
        assert!(matches!(err, ProbeError::NoCandidate));
    }

    #[tokio::test]
    async fn test_session_get_single_path_status_only() {
        let server = start_login_server("cookie").await;
        let base = format!("http://127.0.0.1:{}", server.port);
        let (session, _) = login_probe(server.port).login().await.unwrap();

        let ok = SessionGetProbe::new(base.as_str(), vec!["/interfaces".to_string()]);
        assert_eq!(ok.check(&session).await.unwrap(), "HTTP 200");

        let missing = SessionGetProbe::new(base.as_str(), vec!["/nope".to_string()]);
        let err = missing.check(&session).await.unwrap_err();
        assert_eq!(err.to_string(), "HTTP 404 (expected 200)");
    }
}
