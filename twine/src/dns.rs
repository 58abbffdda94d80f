//! Host name resolution.
//!
//! A thin wrapper over the system resolver. Resolution policy (ordering,
//! caching, service lookup) is intentionally out of scope; this translates
//! one name into the addresses the OS reports for it.

use std::ffi::CString;
use std::mem;
use std::ptr;

use thiserror::Error as ThisError;

use crate::addr::{Address, Ip};
use crate::error::Error;
use crate::socket::sockaddr::sockaddr_to_endpoint;

/// Resolver error conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ThisError)]
pub enum DnsError {
  #[error("Host not found (try again)")]
  HostNotFoundTryAgain,
  #[error("No address")]
  NoAddress,
  #[error("Unexpected resolver error")]
  Unexpected,
  #[error("Unknown resolver error")]
  Unknown,
}

impl DnsError {
  /// Maps a `getaddrinfo` status code to its canonical condition.
  ///
  /// `EAI_SYSTEM` defers the real failure to `errno`, so that case reads
  /// it and maps the OS condition instead.
  fn from_eai(code: libc::c_int) -> DnsError {
    match code {
      libc::EAI_AGAIN => DnsError::HostNotFoundTryAgain,
      libc::EAI_NONAME | libc::EAI_FAMILY => DnsError::NoAddress,
      libc::EAI_BADFLAGS | libc::EAI_SERVICE | libc::EAI_SOCKTYPE => {
        DnsError::Unexpected
      }
      libc::EAI_SYSTEM => DnsError::from_condition(Error::last_os()),
      _ => DnsError::Unknown,
    }
  }

  /// Folds an OS error condition into the resolver taxonomy.
  fn from_condition(condition: Error) -> DnsError {
    match condition {
      Error::TryAgain | Error::Interrupted => DnsError::HostNotFoundTryAgain,
      Error::Unexpected => DnsError::Unexpected,
      _ => DnsError::Unknown,
    }
  }
}

/// Resolves `name` to addresses of the requested IP version.
///
/// Duplicate addresses reported for multiple socket types are collapsed.
pub fn resolve(
  name: &str,
  ip_version: Ip,
) -> std::result::Result<Vec<Address>, DnsError> {
  let name = CString::new(name).map_err(|_| DnsError::NoAddress)?;

  // SAFETY: addrinfo is a plain-old-data C struct; all-zero is the
  // documented "no restrictions" hint value.
  let mut hints: libc::addrinfo = unsafe { mem::zeroed() };
  hints.ai_family = match ip_version {
    Ip::V4 => libc::AF_INET,
    Ip::V6 => libc::AF_INET6,
  };
  hints.ai_socktype = libc::SOCK_STREAM;

  let mut list: *mut libc::addrinfo = ptr::null_mut();
  // SAFETY: all pointers reference live locals; getaddrinfo either fails
  // or makes `list` point at a resolver-owned linked list.
  let status = unsafe {
    libc::getaddrinfo(name.as_ptr(), ptr::null(), &hints, &mut list)
  };
  if status != 0 {
    // errno is only meaningful for EAI_SYSTEM and must be read before
    // anything else touches it.
    if status == libc::EAI_SYSTEM {
      return Err(DnsError::from_condition(Error::last_os()));
    }
    return Err(DnsError::from_eai(status));
  }

  let mut addresses = Vec::new();
  let mut cursor = list;
  while !cursor.is_null() {
    // SAFETY: cursor walks the list getaddrinfo returned; entries are
    // valid until freeaddrinfo below.
    let entry = unsafe { &*cursor };
    if !entry.ai_addr.is_null() {
      // SAFETY: sockaddr_storage is a plain-old-data C struct; all-zero
      // is a valid value.
      let mut storage: libc::sockaddr_storage = unsafe { mem::zeroed() };
      // SAFETY: ai_addr is valid for ai_addrlen bytes, ai_addrlen never
      // exceeds sockaddr_storage, and the two regions do not overlap.
      unsafe {
        ptr::copy_nonoverlapping(
          entry.ai_addr.cast::<u8>(),
          (&mut storage as *mut libc::sockaddr_storage).cast::<u8>(),
          entry.ai_addrlen as usize,
        );
      }
      if let Some(endpoint) = sockaddr_to_endpoint(&storage) {
        if !addresses.contains(&endpoint.addr) {
          addresses.push(endpoint.addr);
        }
      }
    }
    cursor = entry.ai_next;
  }
  // SAFETY: list came from getaddrinfo and has not been freed yet.
  unsafe { libc::freeaddrinfo(list) };

  if addresses.is_empty() {
    return Err(DnsError::NoAddress);
  }
  Ok(addresses)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::addr::ipv4;

  #[test]
  fn localhost_resolves_to_loopback() {
    let addresses = resolve("localhost", Ip::V4).unwrap();
    assert!(addresses.contains(&ipv4::LOOPBACK));
  }

  #[test]
  fn embedded_nul_is_rejected() {
    assert_eq!(resolve("bad\0name", Ip::V4), Err(DnsError::NoAddress));
  }
}
