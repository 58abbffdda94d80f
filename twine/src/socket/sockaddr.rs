//! Conversions between [`Endpoint`] and the kernel's socket-address
//! structures.

use std::mem;
use std::os::fd::RawFd;

use crate::addr::{Address, Endpoint};
use crate::error::Error;

/// Encodes an endpoint into a `sockaddr_storage` plus the length of the
/// family-specific prefix that is actually populated.
pub(crate) fn endpoint_to_sockaddr(
  endpoint: Endpoint,
) -> (libc::sockaddr_storage, libc::socklen_t) {
  // SAFETY: sockaddr_storage is a plain-old-data C struct; all-zero is a
  // valid (if meaningless) value for every field.
  let mut storage: libc::sockaddr_storage = unsafe { mem::zeroed() };

  let len = match endpoint.addr {
    Address::V4(octets) => {
      let v4 = (&mut storage as *mut libc::sockaddr_storage)
        .cast::<libc::sockaddr_in>();
      // SAFETY: sockaddr_in fits inside sockaddr_storage and shares its
      // alignment; the cast pointer stays within the zeroed storage.
      unsafe {
        (*v4).sin_family = libc::AF_INET as libc::sa_family_t;
        (*v4).sin_port = endpoint.port.to_be();
        // Octets are already in network order; store them verbatim.
        (*v4).sin_addr = libc::in_addr { s_addr: u32::from_ne_bytes(octets) };
      }
      mem::size_of::<libc::sockaddr_in>()
    }
    Address::V6(octets) => {
      let v6 = (&mut storage as *mut libc::sockaddr_storage)
        .cast::<libc::sockaddr_in6>();
      // SAFETY: sockaddr_in6 fits inside sockaddr_storage and shares its
      // alignment; the cast pointer stays within the zeroed storage.
      unsafe {
        (*v6).sin6_family = libc::AF_INET6 as libc::sa_family_t;
        (*v6).sin6_port = endpoint.port.to_be();
        (*v6).sin6_addr = libc::in6_addr { s6_addr: octets };
      }
      mem::size_of::<libc::sockaddr_in6>()
    }
  };

  (storage, len as libc::socklen_t)
}

/// Decodes a kernel socket address. Returns `None` for address families
/// this library does not speak.
pub(crate) fn sockaddr_to_endpoint(
  storage: &libc::sockaddr_storage,
) -> Option<Endpoint> {
  match storage.ss_family as libc::c_int {
    libc::AF_INET => {
      let v4 = (storage as *const libc::sockaddr_storage)
        .cast::<libc::sockaddr_in>();
      // SAFETY: ss_family says the storage holds a sockaddr_in, which is
      // no larger than sockaddr_storage.
      let v4 = unsafe { &*v4 };
      Some(Endpoint::new(
        Address::V4(v4.sin_addr.s_addr.to_ne_bytes()),
        u16::from_be(v4.sin_port),
      ))
    }
    libc::AF_INET6 => {
      let v6 = (storage as *const libc::sockaddr_storage)
        .cast::<libc::sockaddr_in6>();
      // SAFETY: ss_family says the storage holds a sockaddr_in6, which is
      // no larger than sockaddr_storage.
      let v6 = unsafe { &*v6 };
      Some(Endpoint::new(
        Address::V6(v6.sin6_addr.s6_addr),
        u16::from_be(v6.sin6_port),
      ))
    }
    _ => None,
  }
}

/// Drains the pending asynchronous error (`SO_ERROR`) of a socket.
///
/// Returns `None` when no error is pending. Failing to query at all is
/// reported as [`Error::Unknown`]: the descriptor is in a state this
/// library cannot reason about.
pub(crate) fn pending_error(handle: RawFd) -> Option<Error> {
  let mut code: libc::c_int = 0;
  let mut len = mem::size_of::<libc::c_int>() as libc::socklen_t;

  let status = syscall!(getsockopt(
    handle,
    libc::SOL_SOCKET,
    libc::SO_ERROR,
    (&mut code as *mut libc::c_int).cast(),
    &mut len,
  ));

  match status {
    Err(_) => Some(Error::Unknown),
    Ok(_) if code == 0 => None,
    Ok(_) => Some(Error::from_errno(code)),
  }
}

#[cfg(test)]
mod tests {
  use proptest::prelude::*;

  use super::*;
  use crate::addr::{ipv4, ipv6};

  #[test]
  fn known_addresses_round_trip() {
    for endpoint in [
      Endpoint::new(ipv4::LOOPBACK, 7777),
      Endpoint::new(ipv4::ANY, 0),
      Endpoint::new(ipv6::LOOPBACK, 7),
      Endpoint::new(ipv6::ANY, 65535),
    ] {
      let (storage, _) = endpoint_to_sockaddr(endpoint);
      assert_eq!(sockaddr_to_endpoint(&storage), Some(endpoint));
    }
  }

  #[test]
  fn unknown_family_is_rejected() {
    // SAFETY: zeroed sockaddr_storage is a valid value; ss_family 0 is
    // AF_UNSPEC.
    let storage: libc::sockaddr_storage = unsafe { std::mem::zeroed() };
    assert_eq!(sockaddr_to_endpoint(&storage), None);
  }

  proptest! {
    #[test]
    fn v4_round_trip(octets: [u8; 4], port: u16) {
      let endpoint = Endpoint::new(Address::V4(octets), port);
      let (storage, len) = endpoint_to_sockaddr(endpoint);
      prop_assert_eq!(
        len as usize,
        std::mem::size_of::<libc::sockaddr_in>()
      );
      prop_assert_eq!(sockaddr_to_endpoint(&storage), Some(endpoint));
    }

    #[test]
    fn v6_round_trip(octets: [u8; 16], port: u16) {
      let endpoint = Endpoint::new(Address::V6(octets), port);
      let (storage, len) = endpoint_to_sockaddr(endpoint);
      prop_assert_eq!(
        len as usize,
        std::mem::size_of::<libc::sockaddr_in6>()
      );
      prop_assert_eq!(sockaddr_to_endpoint(&storage), Some(endpoint));
    }
  }
}
