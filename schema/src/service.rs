//! Service and probe step declarations for the Preflight checker
//!
//! This module contains the declarative data structures that describe which
//! services are checked and how. A [`ServiceSpec`] names the configuration
//! keys a service needs and carries an ordered list of [`ProbeStep`]s; the
//! executor dispatches on each step's [`ProbeKind`] tag rather than on ad-hoc
//! credential presence checks.
//!
//! ## Gating
//!
//! A step may be gated on an earlier step of the same service: it only runs
//! when the named step passed. This prevents cascades of misleading failures
//! (there is no point probing a stats API when authentication already
//! failed).

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Complete declaration of one service to check
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServiceSpec {
    /// Unique identifier for this service (e.g. "adguard")
    pub id: String,

    /// Human-readable name shown as the report section header
    pub name: String,

    /// How to build the service's base URL from configuration
    pub endpoint: EndpointSpec,

    /// Configuration keys that must be set for any step to run.
    /// When one is missing the whole service is skipped with a single
    /// outcome naming the first absent key.
    #[serde(default)]
    pub required: Vec<String>,

    /// Ordered list of probe steps
    pub steps: Vec<ProbeStep>,
}

impl ServiceSpec {
    /// Validate the declaration: non-empty id/name, unique step names, and
    /// every gate referencing an earlier step of the same service.
    pub fn validate(&self) -> Result<(), String> {
        if self.id.trim().is_empty() {
            return Err("service id cannot be empty".to_string());
        }
        if self.name.trim().is_empty() {
            return Err(format!("service '{}': name cannot be empty", self.id));
        }
        let mut seen: Vec<&str> = Vec::with_capacity(self.steps.len());
        for step in &self.steps {
            if step.name.trim().is_empty() {
                return Err(format!("service '{}': step name cannot be empty", self.id));
            }
            if seen.contains(&step.name.as_str()) {
                return Err(format!(
                    "service '{}': duplicate step name '{}'",
                    self.id, step.name
                ));
            }
            if let Some(gate) = &step.gated_on {
                if !seen.contains(&gate.as_str()) {
                    return Err(format!(
                        "service '{}': step '{}' is gated on unknown or later step '{}'",
                        self.id, step.name, gate
                    ));
                }
            }
            seen.push(&step.name);
        }
        Ok(())
    }

    /// First required key that is unset in the given lookup, if any
    pub fn first_missing_key<'a>(
        &'a self,
        is_set: impl Fn(&str) -> bool,
    ) -> Option<&'a str> {
        self.required
            .iter()
            .map(String::as_str)
            .find(|key| !is_set(key))
    }
}

/// How to assemble a service's base URL from configuration values
///
/// The host always comes from a config key. Scheme and port may each come
/// from an optional key, falling back to a declared default; a service with
/// no port at all (e.g. plain `https://host`) leaves both port fields unset.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EndpointSpec {
    /// Config key holding the hostname or IP
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host_key: Option<String>,

    /// Literal hostname for services with a well-known address; takes
    /// precedence over `host_key`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fixed_host: Option<String>,

    /// Config key overriding the scheme, if the service supports one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheme_key: Option<String>,

    /// Scheme used when no override is configured
    #[serde(default = "default_scheme")]
    pub default_scheme: String,

    /// Config key overriding the port, if the service supports one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port_key: Option<String>,

    /// Port used when no override is configured; `None` means the URL
    /// carries no explicit port
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_port: Option<u16>,
}

impl EndpointSpec {
    /// Endpoint with a fixed scheme and no port component
    pub fn host_only(host_key: impl Into<String>, scheme: impl Into<String>) -> Self {
        Self {
            host_key: Some(host_key.into()),
            fixed_host: None,
            scheme_key: None,
            default_scheme: scheme.into(),
            port_key: None,
            default_port: None,
        }
    }

    /// Endpoint with a well-known literal host and no port component
    pub fn fixed(host: impl Into<String>, scheme: impl Into<String>) -> Self {
        Self {
            host_key: None,
            fixed_host: Some(host.into()),
            scheme_key: None,
            default_scheme: scheme.into(),
            port_key: None,
            default_port: None,
        }
    }

    /// Endpoint with configurable scheme and port keys
    pub fn with_keys(
        host_key: impl Into<String>,
        scheme_key: impl Into<String>,
        default_scheme: impl Into<String>,
        port_key: impl Into<String>,
        default_port: u16,
    ) -> Self {
        Self {
            host_key: Some(host_key.into()),
            fixed_host: None,
            scheme_key: Some(scheme_key.into()),
            default_scheme: default_scheme.into(),
            port_key: Some(port_key.into()),
            default_port: Some(default_port),
        }
    }

    /// Endpoint with a fixed scheme and a configurable port key
    pub fn with_port_key(
        host_key: impl Into<String>,
        scheme: impl Into<String>,
        port_key: impl Into<String>,
        default_port: u16,
    ) -> Self {
        Self {
            host_key: Some(host_key.into()),
            fixed_host: None,
            scheme_key: None,
            default_scheme: scheme.into(),
            port_key: Some(port_key.into()),
            default_port: Some(default_port),
        }
    }
}

fn default_scheme() -> String {
    "https".to_string()
}

/// A named unit of work within a service's probe sequence
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProbeStep {
    /// Step label shown in the report (e.g. "Auth + status API")
    pub name: String,

    /// Name of an earlier step that must have passed for this step to run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gated_on: Option<String>,

    /// Step-level config keys; when one is missing the step is skipped
    /// (the service still runs its other steps)
    #[serde(default)]
    pub requires: Vec<String>,

    /// Skip detail used when a `requires` key is missing; defaults to
    /// "<KEY> not set"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<String>,

    /// The strategy and its parameters
    pub kind: ProbeKind,
}

impl ProbeStep {
    pub fn new(name: impl Into<String>, kind: ProbeKind) -> Self {
        Self {
            name: name.into(),
            gated_on: None,
            requires: Vec::new(),
            skip_reason: None,
            kind,
        }
    }

    /// Gate this step on an earlier step's success
    pub fn gated_on(mut self, step_name: impl Into<String>) -> Self {
        self.gated_on = Some(step_name.into());
        self
    }

    /// Require extra config keys for this step only
    pub fn requires(mut self, keys: &[&str]) -> Self {
        self.requires = keys.iter().map(|k| k.to_string()).collect();
        self
    }

    /// Custom skip detail when a `requires` key is missing
    pub fn skip_reason(mut self, reason: impl Into<String>) -> Self {
        self.skip_reason = Some(reason.into());
        self
    }
}

/// Probe strategy selector, dispatched on by the executor
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ProbeKind {
    /// Plain GET against the service endpoint
    Http {
        /// Path appended to the base URL
        path: String,
        /// Scheme override for this step (e.g. a plain-HTTP metrics port)
        #[serde(skip_serializing_if = "Option::is_none")]
        scheme: Option<String>,
        /// Port override for this step
        #[serde(skip_serializing_if = "Option::is_none")]
        port: Option<u16>,
        /// Expected response
        #[serde(default)]
        expect: Expect,
        /// Verify TLS certificates (self-signed appliances disable this)
        #[serde(default = "default_true")]
        verify_tls: bool,
        /// Follow redirects before judging the status
        #[serde(default)]
        follow_redirects: bool,
        /// How credentials are attached, if any
        #[serde(default)]
        auth: HttpAuth,
        /// Request timeout in seconds
        #[serde(default = "default_http_timeout_secs")]
        timeout_secs: u64,
    },

    /// Form-POST login that must yield a session cookie; the first path is
    /// tried first and the remaining paths only when the response carries an
    /// empty cookie set
    CookieLogin {
        /// Login endpoints, primary first
        login_paths: Vec<String>,
        /// Form field name for the username
        user_field: String,
        /// Form field name for the password
        pass_field: String,
        /// Config key holding the username
        username_key: String,
        /// Config key holding the password
        password_key: String,
        #[serde(default = "default_session_timeout_secs")]
        timeout_secs: u64,
    },

    /// JSON-body login judged on status and the presence of a named cookie
    JsonLogin {
        path: String,
        username_key: String,
        password_key: String,
        /// Cookie that marks a successful login
        session_cookie: String,
        #[serde(default = "default_session_timeout_secs")]
        timeout_secs: u64,
    },

    /// GET an ordered list of candidate paths with the service session,
    /// stopping at the first recognizable response
    SessionGet {
        /// Candidate paths, tried in order
        paths: Vec<String>,
        /// Body substrings of which at least one must appear; empty means
        /// the status alone decides
        #[serde(default)]
        content_markers: Vec<String>,
        #[serde(default)]
        expect: Expect,
        /// When set, exhausting all candidates yields Skipped with this
        /// detail instead of Failed
        #[serde(skip_serializing_if = "Option::is_none")]
        miss_skip_reason: Option<String>,
    },

    /// Token-or-ticket API authentication. Token header auth wins when both
    /// credential sets are configured; with neither the step is skipped.
    ApiAuth {
        /// Config key for the API token id (user@realm!name)
        token_id_key: String,
        /// Config key for the API token secret
        token_secret_key: String,
        /// Config key for the fallback username
        username_key: String,
        /// Config key for the fallback password
        password_key: String,
        /// Config key for the auth realm
        realm_key: String,
        /// Realm used when no override is configured
        default_realm: String,
        /// Path POSTed with credentials to obtain a ticket
        ticket_path: String,
        /// Path GET with the established auth to prove it works
        probe_path: String,
        #[serde(default = "default_session_timeout_secs")]
        timeout_secs: u64,
    },

    /// SNMP sysDescr query; version and credentials resolved from config
    Snmp {
        /// Config key selecting "2c" or "3"; unset means v2c
        #[serde(skip_serializing_if = "Option::is_none")]
        version_key: Option<String>,
        /// Config key for the v2c community string
        #[serde(skip_serializing_if = "Option::is_none")]
        community_key: Option<String>,
        /// Config key for the v3 username
        #[serde(skip_serializing_if = "Option::is_none")]
        username_key: Option<String>,
        /// UDP port, normally 161
        #[serde(default = "default_snmp_port")]
        port: u16,
        /// Skip detail used when neither credential key is set
        #[serde(skip_serializing_if = "Option::is_none")]
        missing_credential_reason: Option<String>,
    },
}

/// How HTTP credentials are attached to a request
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Default)]
#[serde(tag = "mode", rename_all = "camelCase")]
pub enum HttpAuth {
    /// No credentials
    #[default]
    None,
    /// HTTP basic auth from two config keys
    Basic {
        username_key: String,
        password_key: String,
    },
    /// A header whose value comes from a config key, plus fixed extras
    Header {
        /// Header name carrying the secret (e.g. "x-api-key")
        header: String,
        /// Config key holding the secret
        value_key: String,
        /// Additional fixed headers sent alongside
        #[serde(default)]
        extra: Vec<(String, String)>,
    },
}

/// Expected HTTP response criteria
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(tag = "expect", rename_all = "camelCase")]
pub enum Expect {
    /// Require a specific status code
    Status { status: u16 },
    /// Require a specific status code and a body substring
    StatusAndBody { status: u16, needle: String },
}

impl Expect {
    pub fn status(status: u16) -> Self {
        Expect::Status { status }
    }

    pub fn status_and_body(status: u16, needle: impl Into<String>) -> Self {
        Expect::StatusAndBody {
            status,
            needle: needle.into(),
        }
    }

    /// The status code this expectation requires
    pub fn expected_status(&self) -> u16 {
        match self {
            Expect::Status { status } | Expect::StatusAndBody { status, .. } => *status,
        }
    }

    /// Check if a status code matches this expectation
    pub fn matches_status(&self, status: u16) -> bool {
        status == self.expected_status()
    }

    /// Check if a response body matches this expectation
    pub fn matches_body(&self, body: &str) -> bool {
        match self {
            Expect::Status { .. } => true,
            Expect::StatusAndBody { needle, .. } => body.contains(needle.as_str()),
        }
    }
}

impl Default for Expect {
    fn default() -> Self {
        Expect::Status { status: 200 }
    }
}

const fn default_true() -> bool {
    true
}

const fn default_http_timeout_secs() -> u64 {
    5
}

const fn default_session_timeout_secs() -> u64 {
    10
}

const fn default_snmp_port() -> u16 {
    161
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec_with_steps(steps: Vec<ProbeStep>) -> ServiceSpec {
        ServiceSpec {
            id: "svc".to_string(),
            name: "Service".to_string(),
            endpoint: EndpointSpec::host_only("SVC_HOST", "https"),
            required: vec!["SVC_HOST".to_string()],
            steps,
        }
    }

    fn http_step(name: &str) -> ProbeStep {
        ProbeStep::new(
            name,
            ProbeKind::Http {
                path: "/".to_string(),
                scheme: None,
                port: None,
                expect: Expect::default(),
                verify_tls: true,
                follow_redirects: false,
                auth: HttpAuth::None,
                timeout_secs: 5,
            },
        )
    }

    #[test]
    fn test_validate_accepts_forward_gating() {
        let spec = spec_with_steps(vec![
            http_step("first"),
            http_step("second").gated_on("first"),
        ]);
        assert!(spec.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_gate_on_later_step() {
        let spec = spec_with_steps(vec![
            http_step("first").gated_on("second"),
            http_step("second"),
        ]);
        let err = spec.validate().unwrap_err();
        assert!(err.contains("unknown or later step 'second'"), "{err}");
    }

    #[test]
    fn test_validate_rejects_duplicate_step_names() {
        let spec = spec_with_steps(vec![http_step("dup"), http_step("dup")]);
        let err = spec.validate().unwrap_err();
        assert!(err.contains("duplicate step name"), "{err}");
    }

    #[test]
    fn test_first_missing_key_order() {
        let mut spec = spec_with_steps(vec![http_step("first")]);
        spec.required = vec!["A".to_string(), "B".to_string()];

        assert_eq!(spec.first_missing_key(|_| true), None);
        assert_eq!(spec.first_missing_key(|k| k == "A"), Some("B"));
        assert_eq!(spec.first_missing_key(|_| false), Some("A"));
    }

    #[test]
    fn test_expect_matches_status() {
        let exact = Expect::status(302);
        assert!(exact.matches_status(302));
        assert!(!exact.matches_status(200));
        assert_eq!(exact.expected_status(), 302);

        let with_body = Expect::status_and_body(200, "pfSense");
        assert!(with_body.matches_status(200));
        assert!(!with_body.matches_status(302));
    }

    #[test]
    fn test_expect_matches_body() {
        let body = "<title>pfSense - Login</title>";
        assert!(Expect::status(200).matches_body(body));
        assert!(Expect::status_and_body(200, "pfSense").matches_body(body));
        assert!(!Expect::status_and_body(200, "OPNsense").matches_body(body));
    }

    #[test]
    fn test_default_expect_is_200() {
        assert_eq!(Expect::default().expected_status(), 200);
    }

    #[test]
    fn test_step_builders() {
        let step = http_step("API accessible")
            .requires(&["PFSENSE_API_KEY"])
            .skip_reason("no API key configured (syslog only)");
        assert_eq!(step.requires, vec!["PFSENSE_API_KEY".to_string()]);
        assert_eq!(
            step.skip_reason.as_deref(),
            Some("no API key configured (syslog only)")
        );
        assert!(step.gated_on.is_none());
    }
}
