//! Address values: IP version and transport tags, raw addresses and
//! endpoints.
//!
//! Addresses are plain octet containers in network byte order. The crate
//! deliberately offers no textual parsing; construct addresses from octet
//! arrays (`Address::from([127, 0, 0, 1])`) or use the [`ipv4`]/[`ipv6`]
//! constants.

use std::fmt;

/// IP protocol version tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Ip {
  V4,
  V6,
}

/// Transport protocol tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transport {
  /// Connection-oriented byte stream.
  Tcp,
  /// Connectionless datagrams.
  Udp,
}

/// An IPv4 or IPv6 address: 4 or 16 octets in network byte order.
///
/// Equality is bytewise; two addresses of different versions never compare
/// equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Address {
  V4([u8; 4]),
  V6([u8; 16]),
}

impl Address {
  /// The IP version this address belongs to.
  pub fn version(self) -> Ip {
    match self {
      Address::V4(_) => Ip::V4,
      Address::V6(_) => Ip::V6,
    }
  }

  /// The raw octets in network byte order.
  pub fn octets(&self) -> &[u8] {
    match self {
      Address::V4(octets) => octets,
      Address::V6(octets) => octets,
    }
  }
}

impl From<[u8; 4]> for Address {
  fn from(octets: [u8; 4]) -> Self {
    Address::V4(octets)
  }
}

impl From<[u8; 16]> for Address {
  fn from(octets: [u8; 16]) -> Self {
    Address::V6(octets)
  }
}

impl fmt::Display for Address {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Address::V4([a, b, c, d]) => write!(f, "{a}.{b}.{c}.{d}"),
      Address::V6(octets) => {
        // Uncompressed colon-hex groups; enough for diagnostics.
        for (i, group) in octets.chunks_exact(2).enumerate() {
          if i > 0 {
            write!(f, ":")?;
          }
          write!(f, "{:x}", u16::from_be_bytes([group[0], group[1]]))?;
        }
        Ok(())
      }
    }
  }
}

/// Well-known IPv4 addresses.
pub mod ipv4 {
  use super::Address;

  /// The unspecified address `0.0.0.0`, used to bind to all interfaces.
  pub const ANY: Address = Address::V4([0; 4]);
  /// The loopback address `127.0.0.1`.
  pub const LOOPBACK: Address = Address::V4([127, 0, 0, 1]);
}

/// Well-known IPv6 addresses.
pub mod ipv6 {
  use super::Address;

  /// The unspecified address `::`, used to bind to all interfaces.
  pub const ANY: Address = Address::V6([0; 16]);
  /// The loopback address `::1`.
  pub const LOOPBACK: Address =
    Address::V6([0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1]);
}

/// One side of a network conversation: an address plus a port in host
/// order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Endpoint {
  pub addr: Address,
  pub port: u16,
}

impl Endpoint {
  /// The all-zero endpoint, returned by endpoint queries that fail.
  pub const ZERO: Endpoint = Endpoint { addr: ipv4::ANY, port: 0 };

  pub fn new(addr: Address, port: u16) -> Endpoint {
    Endpoint { addr, port }
  }
}

impl fmt::Display for Endpoint {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self.addr {
      Address::V4(_) => write!(f, "{}:{}", self.addr, self.port),
      Address::V6(_) => write!(f, "[{}]:{}", self.addr, self.port),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn equality_is_bytewise() {
    assert_eq!(Address::from([127, 0, 0, 1]), ipv4::LOOPBACK);
    assert_ne!(Address::from([127, 0, 0, 2]), ipv4::LOOPBACK);
    // A v4 address never equals a v6 address, whatever the octets.
    assert_ne!(Address::from([0u8; 16]), Address::from([0u8; 4]));
  }

  #[test]
  fn display_formats() {
    assert_eq!(ipv4::LOOPBACK.to_string(), "127.0.0.1");
    assert_eq!(ipv6::LOOPBACK.to_string(), "0:0:0:0:0:0:0:1");
    assert_eq!(
      Endpoint::new(ipv4::LOOPBACK, 7777).to_string(),
      "127.0.0.1:7777"
    );
    assert_eq!(
      Endpoint::new(ipv6::LOOPBACK, 7).to_string(),
      "[0:0:0:0:0:0:0:1]:7"
    );
  }

  #[test]
  fn zero_endpoint() {
    assert_eq!(Endpoint::ZERO, Endpoint::new(Address::V4([0; 4]), 0));
  }
}
