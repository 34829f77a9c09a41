//! Declarative registry of the services Preflight checks
//!
//! Each entry names the config keys a service needs and the ordered probe
//! steps to run against it. The executor never branches on which
//! credentials happen to be set; everything credential-dependent is
//! declared here, either as service-level `required` keys, step-level
//! `requires` keys, or an auth-mode resolution inside a step kind.

use schema::{EndpointSpec, Expect, HttpAuth, ProbeKind, ProbeStep, ServiceSpec};

fn http_get(path: &str) -> ProbeKind {
    ProbeKind::Http {
        path: path.to_string(),
        scheme: None,
        port: None,
        expect: Expect::default(),
        verify_tls: true,
        follow_redirects: false,
        auth: HttpAuth::None,
        timeout_secs: 5,
    }
}

fn pfsense() -> ServiceSpec {
    ServiceSpec {
        id: "pfsense".to_string(),
        name: "pfSense Plus".to_string(),
        endpoint: EndpointSpec::host_only("PFSENSE_HOST", "https"),
        required: vec!["PFSENSE_HOST".to_string()],
        steps: vec![
            ProbeStep::new(
                "Web UI reachable",
                ProbeKind::Http {
                    path: "/".to_string(),
                    scheme: None,
                    port: None,
                    expect: Expect::status_and_body(200, "pfSense"),
                    verify_tls: false,
                    follow_redirects: false,
                    auth: HttpAuth::None,
                    timeout_secs: 5,
                },
            ),
            ProbeStep::new(
                "API accessible",
                ProbeKind::Http {
                    path: "/api/v1/system/info".to_string(),
                    scheme: None,
                    port: None,
                    expect: Expect::default(),
                    verify_tls: false,
                    follow_redirects: false,
                    auth: HttpAuth::None,
                    timeout_secs: 5,
                },
            )
            .requires(&["PFSENSE_API_KEY"])
            .skip_reason("no API key configured (syslog only)"),
        ],
    }
}

fn adguard() -> ServiceSpec {
    let authed_get = |path: &str| ProbeKind::Http {
        path: path.to_string(),
        scheme: None,
        port: None,
        expect: Expect::default(),
        verify_tls: false,
        follow_redirects: false,
        auth: HttpAuth::Basic {
            username_key: "ADGUARD_USERNAME".to_string(),
            password_key: "ADGUARD_PASSWORD".to_string(),
        },
        timeout_secs: 5,
    };

    ServiceSpec {
        id: "adguard".to_string(),
        name: "AdGuard Home".to_string(),
        endpoint: EndpointSpec::with_keys(
            "ADGUARD_HOST",
            "ADGUARD_PROTOCOL",
            "https",
            "ADGUARD_PORT",
            443,
        ),
        required: vec![
            "ADGUARD_HOST".to_string(),
            "ADGUARD_USERNAME".to_string(),
            "ADGUARD_PASSWORD".to_string(),
        ],
        steps: vec![
            // The status endpoint requires auth, so a 200 proves both
            // reachability and credentials in one request
            ProbeStep::new("Auth + status API", authed_get("/control/status")),
            ProbeStep::new("Stats API", authed_get("/control/stats"))
                .gated_on("Auth + status API"),
            ProbeStep::new("Query log enabled", authed_get("/control/querylog_info"))
                .gated_on("Auth + status API"),
        ],
    }
}

fn ntopng() -> ServiceSpec {
    ServiceSpec {
        id: "ntopng".to_string(),
        name: "ntopng".to_string(),
        endpoint: EndpointSpec::with_keys(
            "NTOPNG_HOST",
            "NTOPNG_PROTOCOL",
            "https",
            "NTOPNG_PORT",
            443,
        ),
        required: vec!["NTOPNG_HOST".to_string()],
        steps: vec![
            ProbeStep::new(
                "Reachable (expects redirect to login)",
                ProbeKind::Http {
                    path: "/".to_string(),
                    scheme: None,
                    port: None,
                    expect: Expect::status(302),
                    verify_tls: false,
                    follow_redirects: false,
                    auth: HttpAuth::None,
                    timeout_secs: 5,
                },
            ),
            ProbeStep::new(
                "Session login",
                ProbeKind::CookieLogin {
                    login_paths: vec![
                        "/authorize.html".to_string(),
                        "/lua/login.lua".to_string(),
                    ],
                    user_field: "user".to_string(),
                    pass_field: "password".to_string(),
                    username_key: "NTOPNG_USERNAME".to_string(),
                    password_key: "NTOPNG_PASSWORD".to_string(),
                    timeout_secs: 10,
                },
            )
            .requires(&["NTOPNG_USERNAME", "NTOPNG_PASSWORD"])
            .skip_reason("credentials not set"),
            ProbeStep::new(
                "Prometheus metrics",
                ProbeKind::SessionGet {
                    paths: vec![
                        "/lua/metrics.lua".to_string(),
                        "/metrics".to_string(),
                        "/lua/pro/rest/v2/get/ntopng/metrics.lua".to_string(),
                    ],
                    content_markers: vec!["TYPE".to_string(), "HELP".to_string()],
                    expect: Expect::default(),
                    // Community Edition only exposes the exporter via a
                    // launch flag, so a miss is a configuration hint
                    miss_skip_reason: Some(
                        "CE needs --prometheus-exporter-port=9000 in /etc/ntopng/ntopng.conf"
                            .to_string(),
                    ),
                },
            )
            .gated_on("Session login"),
            ProbeStep::new(
                "Interfaces API",
                ProbeKind::SessionGet {
                    paths: vec!["/lua/rest/v2/get/ntopng/interfaces.lua".to_string()],
                    content_markers: Vec::new(),
                    expect: Expect::default(),
                    miss_skip_reason: None,
                },
            )
            .gated_on("Session login"),
        ],
    }
}

fn switch_snmp() -> ServiceSpec {
    ServiceSpec {
        id: "switch".to_string(),
        name: "Switch (SNMP)".to_string(),
        endpoint: EndpointSpec::host_only("SWITCH_HOST", "http"),
        required: vec!["SWITCH_HOST".to_string(), "SNMP_COMMUNITY".to_string()],
        steps: vec![ProbeStep::new(
            "SNMP reachable",
            ProbeKind::Snmp {
                version_key: None,
                community_key: Some("SNMP_COMMUNITY".to_string()),
                username_key: None,
                port: 161,
                missing_credential_reason: None,
            },
        )],
    }
}

fn unifi() -> ServiceSpec {
    ServiceSpec {
        id: "unifi".to_string(),
        name: "UniFi Controller".to_string(),
        endpoint: EndpointSpec::with_port_key("UNIFI_HOST", "https", "UNIFI_PORT", 8443),
        required: vec![
            "UNIFI_HOST".to_string(),
            "UNIFI_USERNAME".to_string(),
            "UNIFI_PASSWORD".to_string(),
        ],
        steps: vec![
            ProbeStep::new(
                "Login",
                ProbeKind::JsonLogin {
                    path: "/api/login".to_string(),
                    username_key: "UNIFI_USERNAME".to_string(),
                    password_key: "UNIFI_PASSWORD".to_string(),
                    session_cookie: "unifises".to_string(),
                    timeout_secs: 10,
                },
            ),
            ProbeStep::new(
                "Sites API",
                ProbeKind::SessionGet {
                    paths: vec!["/api/self/sites".to_string()],
                    content_markers: Vec::new(),
                    expect: Expect::default(),
                    miss_skip_reason: None,
                },
            )
            .gated_on("Login"),
        ],
    }
}

fn proxmox() -> ServiceSpec {
    ServiceSpec {
        id: "proxmox".to_string(),
        name: "Proxmox VE".to_string(),
        endpoint: EndpointSpec::with_port_key("PROXMOX_HOST", "https", "PROXMOX_PORT", 8006),
        required: vec!["PROXMOX_HOST".to_string()],
        steps: vec![
            ProbeStep::new(
                "API auth",
                ProbeKind::ApiAuth {
                    token_id_key: "PROXMOX_TOKEN_ID".to_string(),
                    token_secret_key: "PROXMOX_TOKEN_SECRET".to_string(),
                    username_key: "PROXMOX_USERNAME".to_string(),
                    password_key: "PROXMOX_PASSWORD".to_string(),
                    realm_key: "PROXMOX_REALM".to_string(),
                    default_realm: "pam".to_string(),
                    ticket_path: "/api2/json/access/ticket".to_string(),
                    probe_path: "/api2/json/nodes".to_string(),
                    timeout_secs: 10,
                },
            ),
            ProbeStep::new(
                "Nodes API",
                ProbeKind::SessionGet {
                    paths: vec!["/api2/json/nodes".to_string()],
                    content_markers: Vec::new(),
                    expect: Expect::default(),
                    miss_skip_reason: None,
                },
            )
            .gated_on("API auth"),
            ProbeStep::new(
                "Version",
                ProbeKind::SessionGet {
                    paths: vec!["/api2/json/version".to_string()],
                    content_markers: Vec::new(),
                    expect: Expect::default(),
                    miss_skip_reason: None,
                },
            )
            .gated_on("API auth"),
        ],
    }
}

fn qnap() -> ServiceSpec {
    ServiceSpec {
        id: "qnap".to_string(),
        name: "QNAP NAS (SNMP)".to_string(),
        endpoint: EndpointSpec::host_only("QNAP_HOST", "http"),
        required: vec!["QNAP_HOST".to_string()],
        steps: vec![ProbeStep::new(
            "SNMP reachable",
            ProbeKind::Snmp {
                version_key: Some("QNAP_SNMP_VERSION".to_string()),
                community_key: Some("QNAP_SNMP_COMMUNITY".to_string()),
                username_key: Some("QNAP_SNMP_USERNAME".to_string()),
                port: 161,
                missing_credential_reason: Some(
                    "QNAP_SNMP_USERNAME not set — add an SNMP username on the device first"
                        .to_string(),
                ),
            },
        )],
    }
}

fn validator() -> ServiceSpec {
    let metrics_get = |path: &str, port: u16| ProbeKind::Http {
        path: path.to_string(),
        scheme: None,
        port: Some(port),
        expect: Expect::default(),
        verify_tls: true,
        follow_redirects: false,
        auth: HttpAuth::None,
        timeout_secs: 5,
    };

    ServiceSpec {
        id: "validator".to_string(),
        name: "Ethereum Validator".to_string(),
        endpoint: EndpointSpec::host_only("VALIDATOR_HOST", "http"),
        required: vec!["VALIDATOR_HOST".to_string()],
        // Consensus and execution clients are independent; none of these
        // gate on each other
        steps: vec![
            ProbeStep::new("Nimbus metrics (8008)", metrics_get("/metrics", 8008)),
            ProbeStep::new(
                "Nimbus beacon API (5052)",
                metrics_get("/eth/v1/node/version", 5052),
            ),
            ProbeStep::new("Nethermind metrics (6060)", metrics_get("/metrics", 6060)),
        ],
    }
}

fn uptime_kuma() -> ServiceSpec {
    ServiceSpec {
        id: "uptime-kuma".to_string(),
        name: "Uptime Kuma".to_string(),
        endpoint: EndpointSpec::with_keys(
            "UPTIME_KUMA_HOST",
            "UPTIME_KUMA_PROTOCOL",
            "https",
            "UPTIME_KUMA_PORT",
            443,
        ),
        required: vec!["UPTIME_KUMA_HOST".to_string()],
        steps: vec![
            ProbeStep::new(
                "Reachable",
                ProbeKind::Http {
                    path: "/".to_string(),
                    scheme: None,
                    port: None,
                    expect: Expect::default(),
                    verify_tls: false,
                    // The dashboard answers with a redirect chain
                    follow_redirects: true,
                    auth: HttpAuth::None,
                    timeout_secs: 10,
                },
            ),
            ProbeStep::new(
                "Metrics endpoint",
                ProbeKind::Http {
                    path: "/metrics".to_string(),
                    scheme: None,
                    port: None,
                    expect: Expect::default(),
                    verify_tls: false,
                    follow_redirects: false,
                    auth: HttpAuth::None,
                    timeout_secs: 5,
                },
            )
            .requires(&["UPTIME_KUMA_API_KEY"])
            .skip_reason("UPTIME_KUMA_API_KEY not set"),
        ],
    }
}

fn anthropic() -> ServiceSpec {
    ServiceSpec {
        id: "anthropic".to_string(),
        name: "Anthropic API".to_string(),
        endpoint: EndpointSpec::fixed("api.anthropic.com", "https"),
        required: vec!["ANTHROPIC_API_KEY".to_string()],
        steps: vec![ProbeStep::new(
            "API key valid",
            ProbeKind::Http {
                path: "/v1/models".to_string(),
                scheme: None,
                port: None,
                expect: Expect::default(),
                verify_tls: true,
                follow_redirects: false,
                auth: HttpAuth::Header {
                    header: "x-api-key".to_string(),
                    value_key: "ANTHROPIC_API_KEY".to_string(),
                    extra: vec![(
                        "anthropic-version".to_string(),
                        "2023-06-01".to_string(),
                    )],
                },
                timeout_secs: 10,
            },
        )],
    }
}

/// Every service Preflight knows about, in report order
pub fn default_registry() -> Vec<ServiceSpec> {
    vec![
        pfsense(),
        adguard(),
        ntopng(),
        switch_snmp(),
        unifi(),
        proxmox(),
        qnap(),
        validator(),
        uptime_kuma(),
        anthropic(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_registry_specs_validate() {
        for spec in default_registry() {
            spec.validate().expect("registry spec must validate");
        }
    }

    #[test]
    fn test_registry_ids_unique() {
        let registry = default_registry();
        let ids: HashSet<_> = registry.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids.len(), registry.len());
    }

    #[test]
    fn test_adguard_requires_full_credentials() {
        let spec = default_registry()
            .into_iter()
            .find(|s| s.id == "adguard")
            .expect("adguard registered");
        assert_eq!(
            spec.required,
            vec!["ADGUARD_HOST", "ADGUARD_USERNAME", "ADGUARD_PASSWORD"]
        );
        assert_eq!(spec.steps.len(), 3);
        assert_eq!(spec.steps[0].name, "Auth + status API");
        assert_eq!(spec.steps[1].gated_on.as_deref(), Some("Auth + status API"));
        assert_eq!(spec.steps[2].gated_on.as_deref(), Some("Auth + status API"));
    }

    #[test]
    fn test_ntopng_login_fallback_order() {
        let spec = default_registry()
            .into_iter()
            .find(|s| s.id == "ntopng")
            .expect("ntopng registered");
        let login = spec
            .steps
            .iter()
            .find(|s| s.name == "Session login")
            .expect("login step");
        match &login.kind {
            ProbeKind::CookieLogin { login_paths, .. } => {
                // Primary endpoint first, legacy fallback second
                assert_eq!(login_paths[0], "/authorize.html");
                assert_eq!(login_paths[1], "/lua/login.lua");
            }
            other => panic!("Expected CookieLogin, got {other:?}"),
        }
    }

    #[test]
    fn test_ntopng_metrics_miss_is_a_skip() {
        let spec = default_registry()
            .into_iter()
            .find(|s| s.id == "ntopng")
            .expect("ntopng registered");
        let metrics = spec
            .steps
            .iter()
            .find(|s| s.name == "Prometheus metrics")
            .expect("metrics step");
        match &metrics.kind {
            ProbeKind::SessionGet {
                miss_skip_reason, ..
            } => assert!(miss_skip_reason.is_some()),
            other => panic!("Expected SessionGet, got {other:?}"),
        }
    }

    #[test]
    fn test_validator_steps_are_independent() {
        let spec = default_registry()
            .into_iter()
            .find(|s| s.id == "validator")
            .expect("validator registered");
        assert_eq!(spec.steps.len(), 3);
        assert!(spec.steps.iter().all(|s| s.gated_on.is_none()));
    }

    #[test]
    fn test_proxmox_auth_gates_api_steps() {
        let spec = default_registry()
            .into_iter()
            .find(|s| s.id == "proxmox")
            .expect("proxmox registered");
        assert!(matches!(spec.steps[0].kind, ProbeKind::ApiAuth { .. }));
        assert!(spec.steps[1..]
            .iter()
            .all(|s| s.gated_on.as_deref() == Some("API auth")));
    }

    #[test]
    fn test_snmp_services_declare_credentials() {
        let registry = default_registry();
        let switch = registry.iter().find(|s| s.id == "switch").expect("switch");
        assert!(switch.required.contains(&"SNMP_COMMUNITY".to_string()));

        let qnap = registry.iter().find(|s| s.id == "qnap").expect("qnap");
        match &qnap.steps[0].kind {
            ProbeKind::Snmp {
                version_key,
                missing_credential_reason,
                ..
            } => {
                assert!(version_key.is_some());
                assert!(missing_credential_reason.is_some());
            }
            other => panic!("Expected Snmp, got {other:?}"),
        }
    }
}
