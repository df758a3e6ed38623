//! Parses an IEEE EUI-48 MAC address and continues to construct and send a
//! WakeOnLAN packet (so called "Magic Packet Technology")
use std::fmt;
use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket};
use std::str::FromStr;

use thiserror::Error;

const MAC_LEN: usize = 6;
pub const MAGIC_PACKET_LEN: usize = 102;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ParseError {
    /// Neither 12 bare digits nor 17 separated characters
    #[error("invalid length")]
    InvalidLength,

    /// Expected a hyphen or a colon
    #[error("expected a separator at position {0}")]
    ExpectedSeparator(usize),

    /// Not a hexadecimal digit
    #[error("invalid hexadecimal digit at position {0}")]
    InvalidDigit(usize),
}

/// A 6-byte hardware address.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MacAddr([u8; MAC_LEN]);

impl MacAddr {
    pub const fn from_raw(bytes: [u8; MAC_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; MAC_LEN] {
        &self.0
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            self.0[0], self.0[1], self.0[2], self.0[3], self.0[4], self.0[5]
        )
    }
}

impl FromStr for MacAddr {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_eui48(s).map(MacAddr::from_raw)
    }
}

/// Parses an ASCII representation of an EUI-48 address. Accepts twelve bare
/// hexadecimal digits, or six pairs separated by hyphens or colons.
fn parse_eui48(input: &str) -> Result<[u8; MAC_LEN], ParseError> {
    let separated = match input.len() {
        12 => false,
        17 => true,
        _ => return Err(ParseError::InvalidLength),
    };

    let mut eui = [0u8; MAC_LEN];
    let mut nibbles = 0;
    for (index, &c) in input.as_bytes().iter().enumerate() {
        // every 3rd character separates two octets
        if separated && index % 3 == 2 {
            if c != b'-' && c != b':' {
                return Err(ParseError::ExpectedSeparator(index));
            }
            continue;
        }

        let nibble = char::from(c)
            .to_digit(16)
            .ok_or(ParseError::InvalidDigit(index))?;
        let octet = &mut eui[nibbles / 2];
        *octet = *octet << 4 | nibble as u8;
        nibbles += 1;
    }

    Ok(eui)
}

pub struct MagicPacket([u8; MAGIC_PACKET_LEN]);

impl MagicPacket {
    /// Creates a magic packet for the given MAC address: six bytes of 0xFF
    /// followed by 16 occurrences of the address.
    pub fn new(mac: MacAddr) -> Self {
        let mut packet = [0xFFu8; MAGIC_PACKET_LEN];
        // the first 6 bytes stay as 0xFF
        for chunk in packet[MAC_LEN..].chunks_exact_mut(MAC_LEN) {
            chunk.copy_from_slice(mac.as_bytes());
        }

        MagicPacket(packet)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Sends the packet as a single datagram to `target`. The socket lives
    /// only for the duration of this call.
    pub fn send_to(&self, target: SocketAddr) -> io::Result<()> {
        let socket = UdpSocket::bind(bind_addr_for(target.ip()))?;
        if target.is_ipv4() {
            socket.set_broadcast(true)?;
        }
        socket.connect(target)?;
        socket.send(self.as_bytes())?;

        Ok(())
    }
}

/// Local address of the same family as `target`, with an ephemeral port.
fn bind_addr_for(target: IpAddr) -> SocketAddr {
    match target {
        IpAddr::V4(_) => SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)),
        IpAddr::V6(_) => SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0)),
    }
}

#[test]
fn test_mac_gibberish() {
    assert_eq!("hello".parse::<MacAddr>(), Err(ParseError::InvalidLength));
}

#[test]
fn test_mac_invalid_alphabet() {
    assert_eq!(
        "he-js-an-cc-dd-ee".parse::<MacAddr>(),
        Err(ParseError::InvalidDigit(0))
    );
}

#[test]
fn test_mac_too_short() {
    assert!("ab-cd".parse::<MacAddr>().is_err());
    assert!("00:11:22".parse::<MacAddr>().is_err());
}

#[test]
fn test_mac_too_long() {
    assert!("ab-cd-ab-cd-ab-cd-ab-cd-ab".parse::<MacAddr>().is_err());
}

#[test]
fn test_mac_separator_mixed() {
    assert!("AA-aa:aa-aa-aa-aa".parse::<MacAddr>().is_ok());
}

#[test]
fn test_mac_separator_order() {
    assert!("-----abababababab".parse::<MacAddr>().is_err());
    assert_eq!(
        "aa-aa.aa-aa-aa-aa".parse::<MacAddr>(),
        Err(ParseError::ExpectedSeparator(5))
    );
}

#[test]
fn test_mac_forms() {
    let expected = MacAddr::from_raw([0x00, 0x11, 0x22, 0x33, 0x44, 0x55]);
    assert_eq!("00:11:22:33:44:55".parse(), Ok(expected));
    assert_eq!("00-11-22-33-44-55".parse(), Ok(expected));
    assert_eq!("001122334455".parse(), Ok(expected));
    assert_eq!(
        "AABBccDDeeFF".parse::<MacAddr>().map(|m| m.to_string()),
        Ok("aa:bb:cc:dd:ee:ff".to_string())
    );
}

#[test]
fn test_magic() {
    let mac = MacAddr::from_raw([0x00, 0x11, 0x22, 0x33, 0x44, 0x55]);
    let pkt = MagicPacket::new(mac);
    let bytes = pkt.as_bytes();
    assert_eq!(bytes.len(), MAGIC_PACKET_LEN);

    // starts with padding
    assert_eq!(&bytes[..6], &[0xFF; 6]);

    // followed by 16 repetitions of the mac
    for i in 6..MAGIC_PACKET_LEN {
        assert_eq!(bytes[i], mac.as_bytes()[(i - 6) % 6], "offset {i}");
    }
    assert_eq!(&bytes[102 - 6..], mac.as_bytes());
}

#[test]
fn test_bind_family() {
    let v4: IpAddr = "192.168.1.255".parse().unwrap();
    let v6: IpAddr = "fe80::1".parse().unwrap();
    assert!(bind_addr_for(v4).is_ipv4());
    assert!(bind_addr_for(Ipv4Addr::BROADCAST.into()).is_ipv4());
    assert!(bind_addr_for(v6).is_ipv6());
}

#[test]
fn test_send_loopback() {
    use std::time::Duration;

    let listener = UdpSocket::bind("127.0.0.1:0").unwrap();
    listener
        .set_read_timeout(Some(Duration::from_secs(5)))
        .unwrap();

    let mac: MacAddr = "00:11:22:33:44:55".parse().unwrap();
    let pkt = MagicPacket::new(mac);
    pkt.send_to(listener.local_addr().unwrap()).unwrap();

    let mut buf = [0u8; 256];
    let (len, _) = listener.recv_from(&mut buf).unwrap();
    assert_eq!(&buf[..len], pkt.as_bytes());
}

#[test]
fn test_send_loopback_v6() {
    use std::time::Duration;

    // hosts without IPv6 have nothing to test
    let Ok(listener) = UdpSocket::bind("[::1]:0") else {
        return;
    };
    listener
        .set_read_timeout(Some(Duration::from_secs(5)))
        .unwrap();

    let mac: MacAddr = "00-11-22-33-44-55".parse().unwrap();
    let pkt = MagicPacket::new(mac);
    let target = listener.local_addr().unwrap();
    assert!(target.is_ipv6());
    pkt.send_to(target).unwrap();

    let mut buf = [0u8; 256];
    let (len, from) = listener.recv_from(&mut buf).unwrap();
    assert!(from.is_ipv6());
    assert_eq!(&buf[..len], pkt.as_bytes());
}
