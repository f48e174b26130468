//! OpenVPN connection parameters
//!
//! An immutable description of one connection attempt: where to connect,
//! how (transport, proxy, obfuscation) and as whom. Validation happens at
//! construction time so the renderer only ever sees well-formed values.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr};

use crate::error::SynthesisError;
use crate::types::{Password, ProxyCredentials};

/// Transport protocol used to reach the VPN server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Transport {
    Tcp,
    #[default]
    Udp,
}

impl Transport {
    /// Get the protocol name as used by the `proto` directive
    pub fn as_str(&self) -> &'static str {
        match self {
            Transport::Tcp => "tcp",
            Transport::Udp => "udp",
        }
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of proxy the tunnel is chained through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyKind {
    Http,
    Socks,
}

impl ProxyKind {
    /// Directive prefix (`http-proxy`, `socks-proxy`, ...)
    pub fn as_str(&self) -> &'static str {
        match self {
            ProxyKind::Http => "http",
            ProxyKind::Socks => "socks",
        }
    }
}

impl std::str::FromStr for ProxyKind {
    type Err = SynthesisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "http" => Ok(ProxyKind::Http),
            "socks" | "socks5" => Ok(ProxyKind::Socks),
            other => Err(SynthesisError::InvalidParameters {
                reason: format!("Unknown proxy type: {}", other),
            }),
        }
    }
}

/// Proxy the tunnel connects through
#[derive(Debug, Clone)]
pub struct Proxy {
    kind: ProxyKind,
    address: IpAddr,
    port: u16,
    credentials: Option<ProxyCredentials>,
}

impl Proxy {
    /// Create a proxy definition
    ///
    /// # Errors
    ///
    /// Returns `SynthesisError::InvalidParameters` if the address is a
    /// wildcard address.
    pub fn new(kind: ProxyKind, address: IpAddr, port: u16) -> Result<Self, SynthesisError> {
        if address.is_unspecified() {
            return Err(SynthesisError::InvalidParameters {
                reason: "Proxy address not defined".to_string(),
            });
        }
        Ok(Self {
            kind,
            address,
            port,
            credentials: None,
        })
    }

    pub fn with_credentials(mut self, credentials: ProxyCredentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn kind(&self) -> ProxyKind {
        self.kind
    }

    pub fn address(&self) -> IpAddr {
        self.address
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn credentials(&self) -> Option<&ProxyCredentials> {
        self.credentials.as_ref()
    }

    /// True for the local obfuscation proxy (or any other loopback proxy)
    pub fn is_loopback(&self) -> bool {
        self.address.is_loopback()
    }
}

/// Local obfuscation proxy settings
///
/// `local_port` is where the obfuscation proxy listens on loopback,
/// `host_port` is the server port obfuscated traffic is sent to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Obfuscation {
    pub local_port: u16,
    pub host_port: u16,
}

/// Immutable parameters for one OpenVPN connection attempt
#[derive(Debug, Clone)]
pub struct ConnectionParameters {
    transport: Transport,
    host: IpAddr,
    port: u16,
    username: String,
    password: Password,
    multihop_exit: Option<String>,
    proxy: Option<Proxy>,
    obfuscation: Option<Obfuscation>,
}

impl ConnectionParameters {
    /// Create connection parameters for a remote endpoint
    ///
    /// # Errors
    ///
    /// Returns `SynthesisError::InvalidParameters` if `host` is a wildcard
    /// address (`0.0.0.0` or `::`).
    pub fn new(transport: Transport, host: IpAddr, port: u16) -> Result<Self, SynthesisError> {
        validate_host(host)?;
        Ok(Self {
            transport,
            host,
            port,
            username: String::new(),
            password: Password::new(String::new()),
            multihop_exit: None,
            proxy: None,
            obfuscation: None,
        })
    }

    /// Set the account credentials
    pub fn with_credentials(mut self, username: impl Into<String>, password: Password) -> Self {
        self.username = username.into();
        self.password = password;
        self
    }

    /// Route through an exit server (multihop)
    ///
    /// The server learns about the exit hop only through the username
    /// suffix; an empty identifier disables multihop.
    pub fn with_multihop_exit(mut self, exit_server_id: impl Into<String>) -> Self {
        let id = exit_server_id.into();
        self.multihop_exit = if id.is_empty() { None } else { Some(id) };
        self
    }

    pub fn with_proxy(mut self, proxy: Proxy) -> Self {
        self.proxy = Some(proxy);
        self
    }

    pub fn with_obfuscation(mut self, obfuscation: Obfuscation) -> Self {
        self.obfuscation = Some(obfuscation);
        self
    }

    /// Parameters as the tunnel will actually use them
    ///
    /// Obfuscation forces TCP, sends traffic to the obfuscation host port
    /// and replaces any user proxy with the local socks proxy, dropping its
    /// credentials.
    pub fn effective(&self) -> ConnectionParameters {
        let mut params = self.clone();
        if let Some(obfs) = params.obfuscation.take() {
            params.transport = Transport::Tcp;
            params.port = obfs.host_port;
            params.proxy = Some(Proxy {
                kind: ProxyKind::Socks,
                address: IpAddr::V4(Ipv4Addr::LOCALHOST),
                port: obfs.local_port,
                credentials: None,
            });
        }
        params
    }

    pub fn transport(&self) -> Transport {
        self.transport
    }

    pub fn host(&self) -> IpAddr {
        self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Username to authenticate with, including the multihop suffix
    pub fn username(&self) -> String {
        match &self.multihop_exit {
            Some(exit) => format!("{}@{}", self.username, exit),
            None => self.username.clone(),
        }
    }

    pub fn password(&self) -> &Password {
        &self.password
    }

    pub fn multihop_exit(&self) -> Option<&str> {
        self.multihop_exit.as_deref()
    }

    pub fn proxy(&self) -> Option<&Proxy> {
        self.proxy.as_ref()
    }

    pub fn obfuscation(&self) -> Option<Obfuscation> {
        self.obfuscation
    }
}

/// Reject endpoints the tunnel could never connect to
///
/// The port range is enforced by `u16`.
pub(crate) fn validate_host(host: IpAddr) -> Result<(), SynthesisError> {
    if host.is_unspecified() {
        return Err(SynthesisError::InvalidParameters {
            reason: "unable to connect. Host IP not defined".to_string(),
        });
    }
    Ok(())
}
