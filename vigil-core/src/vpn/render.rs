//! OpenVPN client configuration rendering
//!
//! Turns [`ConnectionParameters`] and per-attempt [`RenderOptions`] into the
//! ordered directive list OpenVPN is launched with. Rendering either fully
//! succeeds or leaves nothing behind on disk.

use std::fmt;
use std::net::IpAddr;
use std::path::{Path, PathBuf};

use tracing::{debug, error, info, warn};

use crate::config::{DaemonConfig, OpenVpnPaths};
use crate::error::SynthesisError;
use crate::netinfo::GatewayResolver;
use crate::types::ProxyCredentials;
use crate::vpn::merge::merge_user_directives;
use crate::vpn::params::{validate_host, ConnectionParameters};
use crate::vpn::secure_file::write_private;

/// Handshake must complete within this many seconds
const HANDSHAKE_WINDOW_SECS: u32 = 6;

/// Keepalive probe interval and dead-peer timeout, in seconds
const KEEPALIVE_INTERVAL_SECS: u32 = 8;
const KEEPALIVE_TIMEOUT_SECS: u32 = 30;

const CIPHER: &str = "AES-256-CBC";
const VERBOSITY: u32 = 4;

/// Per-render inputs supplied by the connection routine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOptions {
    /// Local port to bind; 0 lets the OS choose (`nobind`)
    pub local_port: u16,

    pub management_address: IpAddr,
    pub management_port: u16,

    /// OpenVPN log file, only used when logging is enabled
    pub log_file: Option<PathBuf>,

    /// Raw user directives merged over the generated ones
    pub extra_parameters: String,

    /// OpenVPN 2.4+ directives (`compress`, `pull-filter`) are available
    pub modern_directives: bool,
}

/// Rendered OpenVPN configuration, one directive per line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigDocument {
    lines: Vec<String>,
}

impl ConfigDocument {
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Configuration text as written to disk
    pub fn to_text(&self) -> String {
        self.lines.join("\n")
    }

    pub fn contains(&self, line: &str) -> bool {
        self.lines.iter().any(|l| l == line)
    }
}

impl fmt::Display for ConfigDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

/// Append-only directive list used while generating
#[derive(Default)]
struct DirectiveBuilder {
    lines: Vec<String>,
}

impl DirectiveBuilder {
    fn push(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }

    fn push_quoted(&mut self, directive: &str, path: &Path) {
        self.lines.push(format!("{} \"{}\"", directive, path.display()));
    }
}

/// Renders OpenVPN client configurations
///
/// Holds the installation paths and the gateway resolver; has no mutable
/// state, so one instance can serve every connection attempt.
pub struct ConfigSynthesizer<G: GatewayResolver> {
    paths: OpenVpnPaths,
    logging_enabled: bool,
    gateway: G,
}

impl<G: GatewayResolver> ConfigSynthesizer<G> {
    pub fn new(paths: OpenVpnPaths, gateway: G) -> Self {
        Self {
            paths,
            logging_enabled: true,
            gateway,
        }
    }

    /// Create a synthesizer from the daemon configuration
    pub fn from_config(config: &DaemonConfig, gateway: G) -> Self {
        Self::new(config.openvpn.clone(), gateway).with_logging(config.logging.enabled)
    }

    /// Process-wide logging switch; when off no `log` directive is emitted
    pub fn with_logging(mut self, enabled: bool) -> Self {
        self.logging_enabled = enabled;
        self
    }

    pub fn paths(&self) -> &OpenVpnPaths {
        &self.paths
    }

    /// Render the configuration document
    ///
    /// Writes the proxy credentials file when the proxy needs one, after the
    /// document has been generated successfully. A credentials file left
    /// over from an earlier render is removed otherwise.
    pub fn render(
        &self,
        params: &ConnectionParameters,
        options: &RenderOptions,
    ) -> Result<ConfigDocument, SynthesisError> {
        let (lines, proxy_auth) = self.generate(params, options)?;
        self.store_proxy_auth(proxy_auth.as_ref())?;
        Ok(ConfigDocument { lines })
    }

    /// Render the configuration and write it to `path` (owner-only)
    ///
    /// If the config cannot be written, the credentials file written for it
    /// is removed again.
    pub fn write_config_file(
        &self,
        params: &ConnectionParameters,
        options: &RenderOptions,
        path: &Path,
    ) -> Result<ConfigDocument, SynthesisError> {
        let (lines, proxy_auth) = self.generate(params, options)?;
        self.store_proxy_auth(proxy_auth.as_ref())?;

        let document = ConfigDocument { lines };
        let text = document.to_text();

        if let Err(e) = write_private(path, text.as_bytes()) {
            error!("Failed to save OpenVPN configuration into a file: {}", e);
            if proxy_auth.is_some() {
                self.remove_proxy_auth();
            }
            return Err(SynthesisError::ConfigWriteFailed {
                path: path.to_path_buf(),
                source: e,
            });
        }

        info!(
            "Configuring OpenVPN...\n=====================\n{}\n=====================",
            text
        );

        Ok(document)
    }

    /// Persist `credentials` to the proxy auth file, or drop a stale one
    fn store_proxy_auth(
        &self,
        credentials: Option<&ProxyCredentials>,
    ) -> Result<(), SynthesisError> {
        let path = &self.paths.proxy_auth_file;
        match credentials {
            Some(credentials) => {
                write_private(path, credentials.auth_file_contents().as_bytes()).map_err(|e| {
                    error!("Failed to save file with proxy credentials: {}", e);
                    SynthesisError::ProxyCredentialWriteFailed {
                        path: path.clone(),
                        source: e,
                    }
                })?;
                debug!("Proxy credentials saved to {:?}", path);
            }
            None => self.remove_proxy_auth(),
        }
        Ok(())
    }

    fn remove_proxy_auth(&self) {
        let path = &self.paths.proxy_auth_file;
        match std::fs::remove_file(path) {
            Ok(()) => debug!("Removed proxy credentials file {:?}", path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove proxy credentials file {:?}: {}", path, e),
        }
    }

    /// Generate directive lines and the proxy credentials to persist, if any
    fn generate(
        &self,
        params: &ConnectionParameters,
        options: &RenderOptions,
    ) -> Result<(Vec<String>, Option<ProxyCredentials>), SynthesisError> {
        let params = params.effective();
        let mut cfg = DirectiveBuilder::default();

        cfg.push("client");
        cfg.push(format!(
            "management {} {}",
            options.management_address, options.management_port
        ));
        cfg.push("management-client");
        cfg.push("management-hold");
        cfg.push("auth-user-pass");
        cfg.push("auth-nocache");
        cfg.push("management-query-passwords");
        cfg.push("management-signal");
        cfg.push(format!("hand-window {}", HANDSHAKE_WINDOW_SECS));

        if options.modern_directives {
            cfg.push("compress");
            cfg.push("pull-filter ignore \"ping\"");
        } else {
            cfg.push("comp-lzo no");
        }
        cfg.push(format!(
            "keepalive {} {}",
            KEEPALIVE_INTERVAL_SECS, KEEPALIVE_TIMEOUT_SECS
        ));

        let mut proxy_auth = None;
        if let Some(proxy) = params.proxy() {
            let kind = proxy.kind().as_str();
            let mut directive = format!("{}-proxy {} {}", kind, proxy.address(), proxy.port());

            if let Some(credentials) = proxy.credentials().filter(|c| c.is_complete()) {
                directive.push_str(&format!(" \"{}\"", self.paths.proxy_auth_file.display()));
                proxy_auth = Some(credentials.clone());
            }

            cfg.push(format!("{}-proxy-retry", kind));
            cfg.push(directive);
        }

        if let Some(log_file) = options.log_file.as_deref() {
            if self.logging_enabled {
                cfg.push_quoted("log", log_file);
            }
        }

        cfg.push("dev tun");
        cfg.push(format!("proto {}", params.transport()));

        validate_host(params.host())?;
        cfg.push(format!("remote {} {}", params.host(), params.port()));

        cfg.push("resolv-retry infinite");
        if options.local_port > 0 {
            cfg.push(format!("lport {}", options.local_port));
        } else {
            cfg.push("nobind");
        }
        cfg.push("persist-key");

        require_file("CA certificate", &self.paths.ca_file)?;
        cfg.push_quoted("ca", &self.paths.ca_file);

        require_file("TLS auth key", &self.paths.ta_file)?;
        cfg.push(format!("tls-auth \"{}\" 1", self.paths.ta_file.display()));

        cfg.push(format!("cipher {}", CIPHER));
        cfg.push("remote-cert-tls server");
        cfg.push(format!("verb {}", VERBOSITY));

        let mut has_scripts = false;
        if let Some(up) = self.paths.up_script.as_deref() {
            cfg.push_quoted("up", up);
            has_scripts = true;
        }
        if let Some(down) = self.paths.down_script.as_deref() {
            cfg.push_quoted("down", down);
            has_scripts = true;
        }
        if has_scripts {
            cfg.push("script-security 2");
        }

        if let Some(proxy) = params.proxy() {
            let gateway = self.gateway.default_gateway().map_err(|e| {
                error!("Failed to get local gateway: {}", e);
                SynthesisError::GatewayUnavailable {
                    reason: e.to_string(),
                }
            })?;

            // Traffic to the proxy must not enter the tunnel. The local
            // obfuscation proxy forwards to the VPN server itself.
            let target = if proxy.is_loopback() {
                params.host()
            } else {
                proxy.address()
            };
            cfg.push(host_route(target, gateway));
        }

        let lines = merge_user_directives(cfg.lines, &options.extra_parameters);
        Ok((lines, proxy_auth))
    }
}

fn require_file(what: &'static str, path: &Path) -> Result<(), SynthesisError> {
    if path.exists() {
        Ok(())
    } else {
        error!("{} not found: {:?}", what, path);
        Err(SynthesisError::MissingCredentialMaterial {
            what,
            path: path.to_path_buf(),
        })
    }
}

/// Single-host route through `gateway`
fn host_route(target: IpAddr, gateway: IpAddr) -> String {
    match (target, gateway) {
        (IpAddr::V4(_), _) => format!("route {} 255.255.255.255 {}", target, gateway),
        (IpAddr::V6(_), IpAddr::V6(_)) => format!("route-ipv6 {}/128 {}", target, gateway),
        // No IPv6 gateway known: let OpenVPN use the pre-tunnel default
        (IpAddr::V6(_), IpAddr::V4(_)) => format!("route-ipv6 {}/128 net_gateway_ipv6", target),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_route_v4() {
        assert_eq!(
            host_route("203.0.113.7".parse().unwrap(), "192.168.1.1".parse().unwrap()),
            "route 203.0.113.7 255.255.255.255 192.168.1.1"
        );
    }

    #[test]
    fn test_host_route_v6() {
        assert_eq!(
            host_route("2001:db8::7".parse().unwrap(), "fe80::1".parse().unwrap()),
            "route-ipv6 2001:db8::7/128 fe80::1"
        );
        assert_eq!(
            host_route("2001:db8::7".parse().unwrap(), "192.168.1.1".parse().unwrap()),
            "route-ipv6 2001:db8::7/128 net_gateway_ipv6"
        );
    }

    #[test]
    fn test_document_text() {
        let document = ConfigDocument {
            lines: vec!["client".to_string(), "verb 4".to_string()],
        };
        assert_eq!(document.to_text(), "client\nverb 4");
        assert_eq!(document.to_string(), "client\nverb 4");
        assert!(document.contains("verb 4"));
        assert!(!document.contains("verb"));
    }
}
