//! Probe strategies for connectivity and credential checking
//!
//! Each strategy is an independent unit implementing one kind of check:
//! plain or authenticated HTTP GETs, cookie-session logins with endpoint
//! fallback, token/ticket API auth, and SNMP sysDescr queries. Strategies
//! share no mutable state between invocations except an explicitly passed
//! [`Session`]; each converts its own failures into a typed [`ProbeError`]
//! whose display string is the report detail.
//!
//! ## Types
//!
//! - [`HttpProbe`]: single-GET reachability and auth checking
//! - [`CookieLoginProbe`] / [`JsonLoginProbe`]: session-establishing logins
//! - [`SessionGetProbe`]: candidate-path scans with an established session
//! - [`ApiAuthProbe`]: token-or-ticket API authentication
//! - [`SnmpQuery`]: capability interface over the external tool and the
//!   raw-socket fallback
//! - [`ProbeError`]: the error taxonomy shared by all strategies

pub mod cookie;
pub mod error;
pub mod http;
pub mod snmp;
pub mod token;

pub use cookie::{CookieLoginProbe, JsonLoginProbe, Session, SessionGetProbe};
pub use error::ProbeError;
pub use http::HttpProbe;
pub use snmp::{
    encode_get_request, query_v2c, SnmpCredentials, SnmpQuery, SnmpRawQuery, SnmpToolQuery,
};
pub use token::{ApiAuthMode, ApiAuthProbe};
