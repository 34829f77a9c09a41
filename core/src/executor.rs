//! Per-service probe execution and run orchestration
//!
//! The executor walks a service's declared steps in order, skipping the
//! whole service when a required config key is missing and skipping
//! individual steps whose gate did not pass or whose own credentials are
//! absent. Every step yields exactly one outcome; probe errors are
//! converted to Failed outcomes here and never propagate further, so one
//! service's failure cannot abort probing of the others.
//!
//! Across services there is no shared mutable state: each worker owns its
//! own [`Session`] and record slice, merged only at the report boundary.
//! `run_all` therefore admits a bounded worker pool, but defaults to one
//! worker so the rendered output is deterministic.

use crate::config::ConfigMap;
use crate::probe::{
    query_v2c, ApiAuthMode, ApiAuthProbe, CookieLoginProbe, HttpProbe, JsonLoginProbe,
    ProbeError, Session, SessionGetProbe, SnmpCredentials, SnmpRawQuery, SnmpToolQuery,
    SnmpQuery,
};
use schema::{
    EndpointSpec, HttpAuth, Outcome, ProbeKind, ProbeOutcome, ProbeRecord, ProbeStep, Report,
    ServiceSpec,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, warn};

/// All records produced for one service, emitted as a unit so renderers
/// can print contiguous sections even when services run concurrently
#[derive(Debug, Clone)]
pub struct ServiceRun {
    /// Service display name
    pub service: String,
    /// Records in step order
    pub records: Vec<ProbeRecord>,
}

/// Base URL parts resolved from an [`EndpointSpec`] and the config map
#[derive(Debug, Clone)]
pub struct ResolvedEndpoint {
    pub scheme: String,
    pub host: String,
    pub port: Option<String>,
}

impl ResolvedEndpoint {
    /// `scheme://host[:port]`
    pub fn base(&self) -> String {
        self.base_with(None, None)
    }

    /// Base URL with optional per-step scheme/port overrides
    pub fn base_with(&self, scheme: Option<&str>, port: Option<u16>) -> String {
        let scheme = scheme.unwrap_or(&self.scheme);
        let port = match port {
            Some(p) => Some(p.to_string()),
            None => self.port.clone(),
        };
        match port {
            Some(p) => format!("{}://{}:{}", scheme, self.host, p),
            None => format!("{}://{}", scheme, self.host),
        }
    }
}

/// Resolve an endpoint; `None` when no host is configured
fn resolve_endpoint(spec: &EndpointSpec, config: &ConfigMap) -> Option<ResolvedEndpoint> {
    let host = match (&spec.fixed_host, &spec.host_key) {
        (Some(fixed), _) => fixed.clone(),
        (None, Some(key)) => config.get(key)?.to_string(),
        (None, None) => return None,
    };
    let scheme = spec
        .scheme_key
        .as_deref()
        .and_then(|k| config.get(k))
        .unwrap_or(&spec.default_scheme)
        .to_string();
    let port = match spec.port_key.as_deref().and_then(|k| config.get(k)) {
        Some(value) => Some(value.to_string()),
        None => spec.default_port.map(|p| p.to_string()),
    };
    Some(ResolvedEndpoint { scheme, host, port })
}

/// Run one service's probe sequence
///
/// Returns exactly one record per step, or a single Skipped record when a
/// required config key is missing.
pub async fn run_service(spec: &ServiceSpec, config: &ConfigMap) -> Vec<ProbeRecord> {
    if let Some(key) = spec.first_missing_key(|k| config.is_set(k)) {
        debug!("service '{}' skipped: {} not set", spec.id, key);
        return vec![ProbeRecord::new(
            &spec.name,
            &spec.name,
            ProbeOutcome::skipped(format!("{} not set", key)),
        )];
    }

    let Some(endpoint) = resolve_endpoint(&spec.endpoint, config) else {
        let key = spec.endpoint.host_key.as_deref().unwrap_or("host");
        return vec![ProbeRecord::new(
            &spec.name,
            &spec.name,
            ProbeOutcome::skipped(format!("{} not set", key)),
        )];
    };

    let mut records = Vec::with_capacity(spec.steps.len());
    let mut outcomes: HashMap<&str, Outcome> = HashMap::new();
    let mut session: Option<Session> = None;

    for step in &spec.steps {
        let outcome = run_step(step, &endpoint, config, &mut session, &outcomes).await;
        outcomes.insert(step.name.as_str(), outcome.outcome);
        records.push(ProbeRecord::new(&spec.name, &step.name, outcome));
    }

    records
}

/// Gate and credential checks, then strategy dispatch
async fn run_step(
    step: &ProbeStep,
    endpoint: &ResolvedEndpoint,
    config: &ConfigMap,
    session: &mut Option<Session>,
    outcomes: &HashMap<&str, Outcome>,
) -> ProbeOutcome {
    if let Some(gate) = &step.gated_on {
        if outcomes.get(gate.as_str()).copied() != Some(Outcome::Passed) {
            return ProbeOutcome::skipped(format!("{} did not pass", gate));
        }
    }

    if let Some(missing) = step.requires.iter().find(|k| !config.is_set(k)) {
        let reason = step
            .skip_reason
            .clone()
            .unwrap_or_else(|| format!("{} not set", missing));
        return ProbeOutcome::skipped(reason);
    }

    dispatch(&step.kind, endpoint, config, session).await
}

async fn dispatch(
    kind: &ProbeKind,
    endpoint: &ResolvedEndpoint,
    config: &ConfigMap,
    session: &mut Option<Session>,
) -> ProbeOutcome {
    match kind {
        ProbeKind::Http {
            path,
            scheme,
            port,
            expect,
            verify_tls,
            follow_redirects,
            auth,
            timeout_secs,
        } => {
            let url = format!("{}{}", endpoint.base_with(scheme.as_deref(), *port), path);
            let mut probe = HttpProbe::new(url, expect.clone())
                .danger_accept_invalid_certs(!verify_tls)
                .follow_redirects(*follow_redirects)
                .timeout(Duration::from_secs(*timeout_secs));

            match auth {
                HttpAuth::None => {}
                HttpAuth::Basic {
                    username_key,
                    password_key,
                } => {
                    let (Some(user), Some(pass)) =
                        (config.get(username_key), config.get(password_key))
                    else {
                        let missing = if config.is_set(username_key) {
                            password_key
                        } else {
                            username_key
                        };
                        return ProbeOutcome::skipped(format!("{} not set", missing));
                    };
                    probe = probe.basic_auth(user, pass);
                }
                HttpAuth::Header {
                    header,
                    value_key,
                    extra,
                } => {
                    let Some(value) = config.get(value_key) else {
                        return ProbeOutcome::skipped(format!("{} not set", value_key));
                    };
                    probe = probe.header(header.as_str(), value);
                    for (name, fixed) in extra {
                        probe = probe.header(name.as_str(), fixed.as_str());
                    }
                }
            }

            outcome_from(probe.check().await)
        }

        ProbeKind::CookieLogin {
            login_paths,
            user_field,
            pass_field,
            username_key,
            password_key,
            timeout_secs,
        } => {
            let (Some(user), Some(pass)) = (config.get(username_key), config.get(password_key))
            else {
                return ProbeOutcome::skipped("credentials not set");
            };
            let probe = CookieLoginProbe::new(
                endpoint.base(),
                login_paths.clone(),
                user_field.as_str(),
                pass_field.as_str(),
                user,
                pass,
            )
            .timeout(Duration::from_secs(*timeout_secs));

            match probe.login().await {
                Ok((established, detail)) => {
                    *session = Some(established);
                    ProbeOutcome::passed(detail)
                }
                Err(e) => ProbeOutcome::failed(e.to_string()),
            }
        }

        ProbeKind::JsonLogin {
            path,
            username_key,
            password_key,
            session_cookie,
            timeout_secs,
        } => {
            let (Some(user), Some(pass)) = (config.get(username_key), config.get(password_key))
            else {
                return ProbeOutcome::skipped("credentials not set");
            };
            let probe = JsonLoginProbe::new(
                endpoint.base(),
                path.as_str(),
                user,
                pass,
                session_cookie.as_str(),
            )
            .timeout(Duration::from_secs(*timeout_secs));

            match probe.login().await {
                Ok((established, detail)) => {
                    *session = Some(established);
                    ProbeOutcome::passed(detail)
                }
                Err(e) => ProbeOutcome::failed(e.to_string()),
            }
        }

        ProbeKind::SessionGet {
            paths,
            content_markers,
            expect,
            miss_skip_reason,
        } => {
            let Some(established) = session.as_ref() else {
                return ProbeOutcome::skipped("no session established");
            };
            let probe = SessionGetProbe::new(endpoint.base(), paths.clone())
                .markers(content_markers.clone())
                .expect(expect.clone());

            match probe.check(established).await {
                Ok(detail) => ProbeOutcome::passed(detail),
                Err(ProbeError::NoCandidate) => match miss_skip_reason {
                    Some(reason) => ProbeOutcome::skipped(reason.clone()),
                    None => ProbeOutcome::failed(ProbeError::NoCandidate.to_string()),
                },
                Err(e) => ProbeOutcome::failed(e.to_string()),
            }
        }

        ProbeKind::ApiAuth {
            token_id_key,
            token_secret_key,
            username_key,
            password_key,
            realm_key,
            default_realm,
            ticket_path,
            probe_path,
            timeout_secs,
        } => {
            let Some(mode) = resolve_api_auth_mode(
                config,
                token_id_key,
                token_secret_key,
                username_key,
                password_key,
                realm_key,
                default_realm,
            ) else {
                return ProbeOutcome::skipped("no token or credentials set");
            };
            let probe = ApiAuthProbe::new(
                endpoint.base(),
                mode,
                ticket_path.as_str(),
                probe_path.as_str(),
            )
            .timeout(Duration::from_secs(*timeout_secs));

            match probe.authenticate().await {
                Ok((established, detail)) => {
                    *session = Some(established);
                    ProbeOutcome::passed(detail)
                }
                Err(e) => ProbeOutcome::failed(e.to_string()),
            }
        }

        ProbeKind::Snmp {
            version_key,
            community_key,
            username_key,
            port,
            missing_credential_reason,
        } => {
            let version = version_key
                .as_deref()
                .and_then(|k| config.get(k))
                .unwrap_or("2c");
            let username = username_key.as_deref().and_then(|k| config.get(k));
            let community = community_key.as_deref().and_then(|k| config.get(k));

            let result = if version == "3" && username.is_some() {
                let user = username.unwrap_or_default().to_string();
                SnmpToolQuery::new(SnmpCredentials::User(user))
                    .query(&endpoint.host, *port)
                    .await
            } else if let Some(community) = community {
                let tool =
                    SnmpToolQuery::new(SnmpCredentials::Community(community.to_string()));
                let raw = SnmpRawQuery::new(community);
                query_v2c(&tool, &raw, &endpoint.host, *port).await
            } else {
                let reason = missing_credential_reason
                    .clone()
                    .unwrap_or_else(|| "SNMP credentials not set".to_string());
                return ProbeOutcome::skipped(reason);
            };

            outcome_from(result)
        }
    }
}

/// Resolve the auth mode for an API-auth step; token wins ties
pub fn resolve_api_auth_mode(
    config: &ConfigMap,
    token_id_key: &str,
    token_secret_key: &str,
    username_key: &str,
    password_key: &str,
    realm_key: &str,
    default_realm: &str,
) -> Option<ApiAuthMode> {
    if let (Some(id), Some(secret)) = (config.get(token_id_key), config.get(token_secret_key)) {
        return Some(ApiAuthMode::Token {
            id: id.to_string(),
            secret: secret.to_string(),
        });
    }
    if let (Some(username), Some(password)) =
        (config.get(username_key), config.get(password_key))
    {
        return Some(ApiAuthMode::Ticket {
            username: username.to_string(),
            realm: config.get_or(realm_key, default_realm).to_string(),
            password: password.to_string(),
        });
    }
    None
}

fn outcome_from(result: Result<String, ProbeError>) -> ProbeOutcome {
    match result {
        Ok(detail) => ProbeOutcome::passed(detail),
        Err(e) => ProbeOutcome::failed(e.to_string()),
    }
}

/// Probe every service and aggregate the report
///
/// Services run under a bounded worker pool (`parallel` permits); records
/// are merged in declaration order regardless of completion order. Each
/// completed service is also sent over `events`, so callers can render
/// sections live and still print partial results when a run is aborted.
pub async fn run_all(
    specs: Vec<ServiceSpec>,
    config: Arc<ConfigMap>,
    parallel: usize,
    events: Option<mpsc::UnboundedSender<ServiceRun>>,
) -> Report {
    let mut report = Report::new();

    if parallel <= 1 {
        // Sequential path keeps output order identical to declaration order
        for spec in &specs {
            let records = run_service(spec, &config).await;
            if let Some(tx) = &events {
                let _ = tx.send(ServiceRun {
                    service: spec.name.clone(),
                    records: records.clone(),
                });
            }
            report.extend(records);
        }
        return report;
    }

    let semaphore = Arc::new(Semaphore::new(parallel));
    let mut set = JoinSet::new();
    for (index, spec) in specs.into_iter().enumerate() {
        let semaphore = semaphore.clone();
        let config = config.clone();
        let events = events.clone();
        set.spawn(async move {
            let _permit = semaphore.acquire_owned().await.ok();
            let records = run_service(&spec, &config).await;
            let run = ServiceRun {
                service: spec.name.clone(),
                records,
            };
            if let Some(tx) = &events {
                let _ = tx.send(run.clone());
            }
            (index, run)
        });
    }

    let mut completed: Vec<(usize, ServiceRun)> = Vec::new();
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok(pair) => completed.push(pair),
            Err(e) => warn!("service probe task failed: {}", e),
        }
    }
    completed.sort_by_key(|(index, _)| *index);
    for (_, run) in completed {
        report.extend(run.records);
    }
    report
}
