//! SNMP sysDescr probing
//!
//! The preferred implementation shells out to the net-snmp `snmpwalk` tool.
//! For v2c there is a raw-socket fallback used only when the tool is not
//! installed: it sends a minimal SNMPv2c GetRequest for `sysDescr.0` over
//! UDP and treats any response as reachable. The raw path cannot decode the
//! returned value and deliberately reports only that the device responded.
//! SNMPv3 has no fallback: it cannot be approximated without the tool.

use super::ProbeError;
use async_trait::async_trait;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

const SYSDESCR_OID: &str = "SNMPv2-MIB::sysDescr.0";
const SUBPROCESS_TIMEOUT: Duration = Duration::from_secs(8);
const RAW_SOCKET_TIMEOUT: Duration = Duration::from_secs(3);

/// Capability interface for querying a device's sysDescr
///
/// Implemented by the external-tool query and by the raw-socket fallback;
/// the fallback is selected only when the tool reports "not found", never
/// on other errors.
#[async_trait]
pub trait SnmpQuery {
    /// Query the device, returning the pass detail on success
    async fn query(&self, host: &str, port: u16) -> Result<String, ProbeError>;
}

/// SNMP credentials, which also select the protocol version
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnmpCredentials {
    /// v2c community string
    Community(String),
    /// v3 username (noAuthNoPriv)
    User(String),
}

/// sysDescr query via the external `snmpwalk` tool
pub struct SnmpToolQuery {
    /// Tool binary name; overridable for tests
    tool: String,
    credentials: SnmpCredentials,
    timeout: Duration,
}

impl SnmpToolQuery {
    pub fn new(credentials: SnmpCredentials) -> Self {
        Self {
            tool: "snmpwalk".to_string(),
            credentials,
            timeout: SUBPROCESS_TIMEOUT,
        }
    }

    pub fn tool(mut self, tool: impl Into<String>) -> Self {
        self.tool = tool.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn no_response_detail(&self) -> &'static str {
        match self.credentials {
            SnmpCredentials::Community(_) => "no response",
            SnmpCredentials::User(_) => "no response — check the SNMPv3 username on the device",
        }
    }
}

#[async_trait]
impl SnmpQuery for SnmpToolQuery {
    async fn query(&self, host: &str, port: u16) -> Result<String, ProbeError> {
        let target = if port == 161 {
            host.to_string()
        } else {
            format!("{}:{}", host, port)
        };

        let mut cmd = Command::new(&self.tool);
        match &self.credentials {
            SnmpCredentials::Community(community) => {
                cmd.args([
                    "-v2c",
                    "-c",
                    community.as_str(),
                    "-t",
                    "3",
                    target.as_str(),
                    SYSDESCR_OID,
                ]);
            }
            SnmpCredentials::User(username) => {
                cmd.args([
                    "-v3",
                    "-l",
                    "noAuthNoPriv",
                    "-u",
                    username.as_str(),
                    "-t",
                    "3",
                    target.as_str(),
                    SYSDESCR_OID,
                ]);
            }
        }
        cmd.kill_on_drop(true);
        debug!("snmp tool query {} for {}", self.tool, target);

        let output = match timeout(self.timeout, cmd.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ProbeError::ToolUnavailable(
                    "snmpwalk not found — install net-snmp".to_string(),
                ));
            }
            Ok(Err(e)) => return Err(ProbeError::Tool(e.to_string())),
            Err(_) => return Err(ProbeError::Timeout),
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        if output.status.success() && !stdout.trim().is_empty() {
            return Ok(parse_sysdescr(&stdout));
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let stderr = stderr.trim();
        if stderr.is_empty() {
            Err(ProbeError::Tool(self.no_response_detail().to_string()))
        } else {
            Err(ProbeError::Tool(stderr.to_string()))
        }
    }
}

/// Raw-socket v2c fallback: send a GetRequest, report whether anything
/// answered at all
pub struct SnmpRawQuery {
    community: String,
    timeout: Duration,
}

impl SnmpRawQuery {
    pub fn new(community: impl Into<String>) -> Self {
        Self {
            community: community.into(),
            timeout: RAW_SOCKET_TIMEOUT,
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl SnmpQuery for SnmpRawQuery {
    async fn query(&self, host: &str, port: u16) -> Result<String, ProbeError> {
        let socket = UdpSocket::bind("0.0.0.0:0")
            .await
            .map_err(|e| ProbeError::Socket(e.to_string()))?;

        let mut addrs = tokio::net::lookup_host((host, port))
            .await
            .map_err(|e| ProbeError::Socket(e.to_string()))?;
        let addr = addrs
            .next()
            .ok_or_else(|| ProbeError::Socket(format!("could not resolve {}", host)))?;

        let packet = encode_get_request(&self.community);
        debug!("snmp raw GetRequest to {} ({} bytes)", addr, packet.len());
        socket
            .send_to(&packet, addr)
            .await
            .map_err(|e| ProbeError::Socket(e.to_string()))?;

        let mut buf = [0u8; 1024];
        match timeout(self.timeout, socket.recv_from(&mut buf)).await {
            Ok(Ok(_)) => Ok("responding (install net-snmp for details)".to_string()),
            Ok(Err(e)) => Err(ProbeError::Socket(e.to_string())),
            Err(_) => Err(ProbeError::Timeout),
        }
    }
}

/// v2c query: tool first, raw-socket fallback only on tool-not-found
pub async fn query_v2c(
    tool: &SnmpToolQuery,
    raw: &SnmpRawQuery,
    host: &str,
    port: u16,
) -> Result<String, ProbeError> {
    match tool.query(host, port).await {
        Err(ProbeError::ToolUnavailable(_)) => {
            debug!("snmp tool unavailable, falling back to raw socket");
            raw.query(host, port).await
        }
        other => other,
    }
}

/// Minimal SNMPv2c GetRequest PDU for `sysDescr.0`
///
/// All lengths are single-byte, which holds for the short community
/// strings this packet is used with. The community travels in cleartext;
/// that is inherent to SNMP v1/v2c.
pub fn encode_get_request(community: &str) -> Vec<u8> {
    let comm = community.as_bytes();
    let mut packet = Vec::with_capacity(31 + comm.len());
    // SEQUENCE header
    packet.push(0x30);
    packet.push((29 + comm.len()) as u8);
    // version INTEGER 1 (v2c), community OCTET STRING
    packet.extend_from_slice(&[0x02, 0x01, 0x01, 0x04]);
    packet.push(comm.len() as u8);
    packet.extend_from_slice(comm);
    // GetRequest-PDU: request-id 0xdeadbeef, error-status 0, error-index 0,
    // varbind list with { sysDescr.0, NULL }
    packet.extend_from_slice(&[
        0xa0, 0x15, 0x02, 0x04, 0xde, 0xad, 0xbe, 0xef, 0x02, 0x01, 0x00, 0x02, 0x01, 0x00,
        0x30, 0x07, 0x30, 0x05, 0x06, 0x01, 0x00, 0x05, 0x00,
    ]);
    packet
}

/// Extract the sysDescr value from `snmpwalk` output, truncated to 60 chars
fn parse_sysdescr(stdout: &str) -> String {
    let value = stdout
        .trim()
        .rsplit('=')
        .next()
        .unwrap_or("")
        .trim()
        .trim_start_matches("STRING:")
        .trim();
    value.chars().take(60).collect()
}
