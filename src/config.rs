use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, SocketAddrV6, ToSocketAddrs};
use std::num::IntErrorKind;

use log::{debug, LevelFilter};

use crate::cli::Args;
use crate::error::{Result, WolError};
use crate::wol::MacAddr;

pub const DEFAULT_PORT: u16 = 7;

/// Hostname lookup. Addresses come back with port 0 and, for link-local
/// IPv6, the scope of the interface they belong to.
pub trait Resolver {
    fn resolve(&self, host: &str) -> io::Result<Vec<SocketAddr>>;
}

/// Resolves through the operating system.
pub struct SystemResolver;

impl Resolver for SystemResolver {
    fn resolve(&self, host: &str) -> io::Result<Vec<SocketAddr>> {
        Ok((host, 0).to_socket_addrs()?.collect())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Verbosity {
    /// Errors only
    Silent,
    /// Confirms success
    Normal,
    /// Echoes every resolved field
    Debug,
}

impl Verbosity {
    /// Reads `--debug-level`, then lets `--silent` override it.
    pub fn from_args(args: &Args) -> Result<Self> {
        let verbosity = match non_empty(&args.debug_level) {
            None => Verbosity::Normal,
            Some(level) => match level.parse::<u64>() {
                Ok(0) => Verbosity::Silent,
                Ok(1) => Verbosity::Normal,
                Ok(_) => Verbosity::Debug,
                Err(source) if *source.kind() == IntErrorKind::PosOverflow => Verbosity::Debug,
                Err(source) => {
                    return Err(WolError::InvalidNumber {
                        field: "debug level",
                        value: level.to_string(),
                        source,
                    })
                }
            },
        };

        if args.silent {
            return Ok(Verbosity::Silent);
        }
        Ok(verbosity)
    }

    pub fn level_filter(self) -> LevelFilter {
        match self {
            Verbosity::Silent => LevelFilter::Error,
            Verbosity::Normal => LevelFilter::Info,
            Verbosity::Debug => LevelFilter::Debug,
        }
    }
}

/// A validated invocation, ready to send.
#[derive(Debug, PartialEq, Eq)]
pub struct Config {
    pub target: SocketAddr,
    pub mac: MacAddr,
}

impl Config {
    /// Validates the hardware address first, so that a bad invocation never
    /// waits on a hostname lookup.
    pub fn from_args<R: Resolver>(args: &Args, resolver: &R) -> Result<Self> {
        let mac = parse_mac(non_empty(&args.mac))?;
        let mut target = resolve_target(non_empty(&args.address), resolver)?;
        target.set_port(parse_port(non_empty(&args.port))?);

        Ok(Config { target, mac })
    }

    pub fn socket_addr(&self) -> SocketAddr {
        self.target
    }
}

/// Empty values count as omitted.
fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

fn parse_number<T>(field: &'static str, value: &str) -> Result<T>
where
    T: std::str::FromStr<Err = std::num::ParseIntError>,
{
    value.parse().map_err(|source| WolError::InvalidNumber {
        field,
        value: value.to_string(),
        source,
    })
}

fn parse_mac(mac: Option<&str>) -> Result<MacAddr> {
    let mac: MacAddr = mac.ok_or(WolError::MissingMac)?.parse()?;
    debug!("Physical address set to {mac}");
    Ok(mac)
}

/// Literal IPv4/IPv6 address, including IPv6 with a numeric scope such as
/// `fe80::1%2`.
fn parse_literal(host: &str) -> Option<SocketAddr> {
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Some(SocketAddr::new(ip, 0));
    }
    format!("[{host}]:0")
        .parse::<SocketAddrV6>()
        .ok()
        .map(SocketAddr::V6)
}

fn resolve_target<R: Resolver>(address: Option<&str>, resolver: &R) -> Result<SocketAddr> {
    let Some(host) = address else {
        debug!("ip address set to broadcast ({})", Ipv4Addr::BROADCAST);
        return Ok(SocketAddr::new(Ipv4Addr::BROADCAST.into(), 0));
    };

    if let Some(addr) = parse_literal(host) {
        debug!("ip address set to {}", addr.ip());
        return Ok(addr);
    }

    let addr = resolver
        .resolve(host)
        .map_err(|source| WolError::Resolve {
            host: host.to_string(),
            source,
        })?
        .into_iter()
        .next()
        .ok_or_else(|| WolError::NoAddress {
            host: host.to_string(),
        })?;
    debug!("Hostname {host} resolved to ip {}", addr.ip());
    Ok(addr)
}

fn parse_port(port: Option<&str>) -> Result<u16> {
    let Some(value) = port else {
        debug!("port set to default ({DEFAULT_PORT})");
        return Ok(DEFAULT_PORT);
    };

    let port = match parse_number::<u16>("port", value) {
        Ok(0) => return Err(WolError::InvalidPort(value.to_string())),
        Ok(port) => port,
        // digits that only overflow are a range problem, not a format one
        Err(WolError::InvalidNumber { .. }) if value.parse::<i64>().is_ok() => {
            return Err(WolError::InvalidPort(value.to_string()))
        }
        Err(err) => return Err(err),
    };
    debug!("Port set to {port}");
    Ok(port)
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::net::{Ipv6Addr, SocketAddrV4};

    use super::*;

    /// Answers every lookup with a fixed result and counts the calls.
    struct FakeResolver {
        answer: Vec<SocketAddr>,
        calls: Cell<usize>,
    }

    impl FakeResolver {
        fn new(answer: Vec<SocketAddr>) -> Self {
            FakeResolver {
                answer,
                calls: Cell::new(0),
            }
        }
    }

    impl Resolver for FakeResolver {
        fn resolve(&self, host: &str) -> io::Result<Vec<SocketAddr>> {
            self.calls.set(self.calls.get() + 1);
            if host == "unknown.invalid" {
                return Err(io::Error::new(io::ErrorKind::NotFound, "name not found"));
            }
            Ok(self.answer.clone())
        }
    }

    fn args(mac: Option<&str>, address: Option<&str>, port: Option<&str>) -> Args {
        Args {
            mac: mac.map(String::from),
            address: address.map(String::from),
            port: port.map(String::from),
            ..Args::default()
        }
    }

    fn config(args: &Args, resolver: &FakeResolver) -> Result<Config> {
        Config::from_args(args, resolver)
    }

    const MAC: &str = "00:11:22:33:44:55";

    #[test]
    fn verbosity_default_is_normal() {
        assert_eq!(Verbosity::from_args(&Args::default()).unwrap(), Verbosity::Normal);
    }

    #[test]
    fn verbosity_levels() {
        for (level, expected) in [
            ("0", Verbosity::Silent),
            ("1", Verbosity::Normal),
            ("2", Verbosity::Debug),
            ("5", Verbosity::Debug),
            ("300", Verbosity::Debug),
            ("99999999999999999999999", Verbosity::Debug),
        ] {
            let args = Args {
                debug_level: Some(level.to_string()),
                ..Args::default()
            };
            assert_eq!(Verbosity::from_args(&args).unwrap(), expected, "level {level}");
        }
    }

    #[test]
    fn silent_overrides_level() {
        let args = Args {
            debug_level: Some("2".to_string()),
            silent: true,
            ..Args::default()
        };
        assert_eq!(Verbosity::from_args(&args).unwrap(), Verbosity::Silent);
    }

    #[test]
    fn verbosity_not_a_number() {
        let args = Args {
            debug_level: Some("loud".to_string()),
            ..Args::default()
        };
        match Verbosity::from_args(&args) {
            Err(WolError::InvalidNumber { field, value, .. }) => {
                assert_eq!(field, "debug level");
                assert_eq!(value, "loud");
            }
            other => panic!("expected conversion error, got {other:?}"),
        }
    }

    #[test]
    fn level_filters() {
        assert_eq!(Verbosity::Silent.level_filter(), LevelFilter::Error);
        assert_eq!(Verbosity::Normal.level_filter(), LevelFilter::Info);
        assert_eq!(Verbosity::Debug.level_filter(), LevelFilter::Debug);
    }

    #[test]
    fn defaults_to_broadcast_without_lookup() {
        let resolver = FakeResolver::new(vec![]);
        let config = config(&args(Some(MAC), None, None), &resolver).unwrap();
        assert_eq!(config.target.ip(), IpAddr::V4(Ipv4Addr::BROADCAST));
        assert_eq!(config.target.port(), DEFAULT_PORT);
        assert_eq!(resolver.calls.get(), 0);
    }

    #[test]
    fn empty_address_is_omitted() {
        let resolver = FakeResolver::new(vec![]);
        let config = config(&args(Some(MAC), Some(""), None), &resolver).unwrap();
        assert_eq!(config.target.ip(), IpAddr::V4(Ipv4Addr::BROADCAST));
        assert_eq!(resolver.calls.get(), 0);
    }

    #[test]
    fn literal_addresses_skip_lookup() {
        let resolver = FakeResolver::new(vec![]);
        let v4 = config(&args(Some(MAC), Some("192.168.1.255"), None), &resolver).unwrap();
        assert_eq!(v4.target.ip(), IpAddr::V4(Ipv4Addr::new(192, 168, 1, 255)));

        let v6 = config(&args(Some(MAC), Some("fe80::1"), None), &resolver).unwrap();
        assert!(v6.target.is_ipv6());
        assert!(v6.socket_addr().is_ipv6());
        assert_eq!(resolver.calls.get(), 0);
    }

    #[test]
    fn scoped_literal_keeps_scope() {
        let resolver = FakeResolver::new(vec![]);
        let config = config(&args(Some(MAC), Some("fe80::1%1"), Some("9")), &resolver).unwrap();
        match config.socket_addr() {
            SocketAddr::V6(addr) => {
                assert_eq!(*addr.ip(), "fe80::1".parse::<Ipv6Addr>().unwrap());
                assert_eq!(addr.scope_id(), 1);
                assert_eq!(addr.port(), 9);
            }
            other => panic!("expected an IPv6 target, got {other}"),
        }
        assert_eq!(resolver.calls.get(), 0);
    }

    #[test]
    fn resolved_scope_reaches_target() {
        let link_local = SocketAddrV6::new("fe80::1".parse().unwrap(), 0, 0, 3);
        let resolver = FakeResolver::new(vec![SocketAddr::V6(link_local)]);
        let config = config(&args(Some(MAC), Some("fe80::1%eth0"), None), &resolver).unwrap();
        match config.socket_addr() {
            SocketAddr::V6(addr) => {
                assert_eq!(addr.scope_id(), 3);
                assert_eq!(addr.port(), DEFAULT_PORT);
            }
            other => panic!("expected an IPv6 target, got {other}"),
        }
    }

    #[test]
    fn hostname_takes_first_address() {
        let first = SocketAddr::new(IpAddr::V6(Ipv6Addr::LOCALHOST), 0);
        let second = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::LOCALHOST, 0));
        let resolver = FakeResolver::new(vec![first, second]);
        let config = config(&args(Some(MAC), Some("nas.lan"), None), &resolver).unwrap();
        assert_eq!(config.target.ip(), first.ip());
        assert_eq!(config.target.port(), DEFAULT_PORT);
        assert_eq!(resolver.calls.get(), 1);
    }

    #[test]
    fn hostname_lookup_failure() {
        let resolver = FakeResolver::new(vec![]);
        let err = config(&args(Some(MAC), Some("unknown.invalid"), None), &resolver).unwrap_err();
        assert!(matches!(err, WolError::Resolve { .. }));
        assert_eq!(err.to_string(), "unknown.invalid, name not found");
    }

    #[test]
    fn hostname_without_addresses() {
        let resolver = FakeResolver::new(vec![]);
        let err = config(&args(Some(MAC), Some("empty.lan"), None), &resolver).unwrap_err();
        assert!(matches!(err, WolError::NoAddress { ref host } if host == "empty.lan"));
    }

    #[test]
    fn missing_mac_is_fatal() {
        let resolver = FakeResolver::new(vec![]);
        for invocation in [
            args(None, None, None),
            args(None, Some("192.168.1.255"), Some("9")),
            args(Some(""), None, None),
        ] {
            assert!(matches!(config(&invocation, &resolver), Err(WolError::MissingMac)));
        }
    }

    #[test]
    fn malformed_mac_is_fatal() {
        let resolver = FakeResolver::new(vec![]);
        let err = config(&args(Some("00:11:22"), Some("nas.lan"), None), &resolver).unwrap_err();
        assert!(matches!(err, WolError::InvalidMac(_)));
        assert_eq!(resolver.calls.get(), 0);
    }

    #[test]
    fn explicit_port() {
        let resolver = FakeResolver::new(vec![]);
        let config = config(&args(Some(MAC), Some("192.168.1.255"), Some("9")), &resolver).unwrap();
        assert_eq!(
            config.socket_addr(),
            "192.168.1.255:9".parse::<SocketAddr>().unwrap()
        );
        assert_eq!(config.mac, MacAddr::from_raw([0x00, 0x11, 0x22, 0x33, 0x44, 0x55]));
    }

    #[test]
    fn port_out_of_range() {
        let resolver = FakeResolver::new(vec![]);
        for port in ["0", "65536", "-1"] {
            let err = config(&args(Some(MAC), None, Some(port)), &resolver).unwrap_err();
            assert!(matches!(err, WolError::InvalidPort(_)), "port {port}: {err:?}");
        }
    }

    #[test]
    fn port_not_a_number() {
        let resolver = FakeResolver::new(vec![]);
        let err = config(&args(Some(MAC), None, Some("echo")), &resolver).unwrap_err();
        assert!(matches!(err, WolError::InvalidNumber { field: "port", .. }));
    }
}
