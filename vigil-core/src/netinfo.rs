//! Local network information
//!
//! Default gateway lookup, used to route proxy traffic around the tunnel.

use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;

/// Linux IPv4 routing table as exposed by procfs
pub const PROC_NET_ROUTE: &str = "/proc/net/route";

const RTF_UP: u32 = 0x0001;
const RTF_GATEWAY: u32 = 0x0002;

/// Source of the local network's default gateway address
pub trait GatewayResolver {
    fn default_gateway(&self) -> Result<IpAddr, GatewayError>;
}

/// Errors that can occur during gateway lookup
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Failed to read routing table: {0}")]
    RouteTableUnreadable(#[from] std::io::Error),

    #[error("No default route found")]
    NoDefaultRoute,

    #[error("Malformed routing table entry: {0}")]
    Malformed(String),
}

/// Gateway resolver reading the kernel routing table
#[derive(Debug, Clone)]
pub struct SystemGateway {
    route_table: PathBuf,
}

impl SystemGateway {
    pub fn new() -> Self {
        Self {
            route_table: PathBuf::from(PROC_NET_ROUTE),
        }
    }

    /// Read routes from a different file (same format as `/proc/net/route`)
    pub fn with_route_table(route_table: impl Into<PathBuf>) -> Self {
        Self {
            route_table: route_table.into(),
        }
    }
}

impl Default for SystemGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl GatewayResolver for SystemGateway {
    #[tracing::instrument(skip(self))]
    fn default_gateway(&self) -> Result<IpAddr, GatewayError> {
        let table = std::fs::read_to_string(&self.route_table)?;
        let gateway = parse_default_gateway(&table)?;
        tracing::debug!("Default gateway: {}", gateway);
        Ok(IpAddr::V4(gateway))
    }
}

/// Pick the default route with the lowest metric from a procfs route table
pub fn parse_default_gateway(table: &str) -> Result<Ipv4Addr, GatewayError> {
    let mut best: Option<(u32, Ipv4Addr)> = None;

    // First line is the column header
    for line in table.lines().skip(1) {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 8 {
            continue;
        }

        let destination = parse_hex(fields[1], line)?;
        let mask = parse_hex(fields[7], line)?;
        let flags = parse_hex(fields[3], line)?;
        if destination != 0 || mask != 0 {
            continue;
        }
        if flags & RTF_UP == 0 || flags & RTF_GATEWAY == 0 {
            continue;
        }

        // procfs prints addresses in host (little-endian) byte order
        let gateway = Ipv4Addr::from(parse_hex(fields[2], line)?.to_le_bytes());
        let metric: u32 = fields[6]
            .parse()
            .map_err(|_| GatewayError::Malformed(line.to_string()))?;

        if best.map_or(true, |(best_metric, _)| metric < best_metric) {
            best = Some((metric, gateway));
        }
    }

    best.map(|(_, gateway)| gateway)
        .ok_or(GatewayError::NoDefaultRoute)
}

fn parse_hex(field: &str, line: &str) -> Result<u32, GatewayError> {
    u32::from_str_radix(field, 16).map_err(|_| GatewayError::Malformed(line.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const HEADER: &str =
        "Iface\tDestination\tGateway \tFlags\tRefCnt\tUse\tMetric\tMask\t\tMTU\tWindow\tIRTT";

    #[test]
    fn test_parse_default_gateway() {
        let table = format!(
            "{}\neth0\t00000000\t0102A8C0\t0003\t0\t0\t100\t00000000\t0\t0\t0\neth0\t0002A8C0\t00000000\t0001\t0\t0\t100\t00FFFFFF\t0\t0\t0\n",
            HEADER
        );
        assert_eq!(
            parse_default_gateway(&table).unwrap(),
            Ipv4Addr::new(192, 168, 2, 1)
        );
    }

    #[test]
    fn test_lowest_metric_wins() {
        let table = format!(
            "{}\nwlan0\t00000000\t0100000A\t0003\t0\t0\t600\t00000000\t0\t0\t0\neth0\t00000000\t0101A8C0\t0003\t0\t0\t100\t00000000\t0\t0\t0\n",
            HEADER
        );
        assert_eq!(
            parse_default_gateway(&table).unwrap(),
            Ipv4Addr::new(192, 168, 1, 1)
        );
    }

    #[test]
    fn test_no_default_route() {
        let table = format!(
            "{}\neth0\t0002A8C0\t00000000\t0001\t0\t0\t100\t00FFFFFF\t0\t0\t0\n",
            HEADER
        );
        assert!(matches!(
            parse_default_gateway(&table),
            Err(GatewayError::NoDefaultRoute)
        ));
    }

    #[test]
    fn test_malformed_entry() {
        let table = format!("{}\neth0\tZZZZ\t0102A8C0\t0003\t0\t0\t100\t00000000\n", HEADER);
        assert!(matches!(
            parse_default_gateway(&table),
            Err(GatewayError::Malformed(_))
        ));
    }

    #[test]
    fn test_system_gateway_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "{}\neth0\t00000000\t0101A8C0\t0003\t0\t0\t0\t00000000\t0\t0\t0",
            HEADER
        )
        .unwrap();

        let resolver = SystemGateway::with_route_table(file.path());
        assert_eq!(
            resolver.default_gateway().unwrap(),
            IpAddr::V4(Ipv4Addr::new(192, 168, 1, 1))
        );
    }

    #[test]
    fn test_missing_route_table() {
        let resolver = SystemGateway::with_route_table("/nonexistent/vigil/route");
        assert!(matches!(
            resolver.default_gateway(),
            Err(GatewayError::RouteTableUnreadable(_))
        ));
    }
}
