//! The library error taxonomy.
//!
//! Every fallible operation in this crate reports failures through the
//! closed [`Error`] condition set instead of leaking raw OS error codes.
//! The mapping from platform `errno` values happens in exactly one place,
//! [`Error::from_errno`], so the rest of the crate (and its users) only
//! ever see the canonical conditions.

use thiserror::Error as ThisError;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Canonical error conditions.
///
/// The set is closed: platform codes that have no canonical counterpart
/// collapse into [`Error::Unknown`]. [`Error::Unexpected`] is reserved for
/// codes that indicate a violated library invariant (bad descriptor, wrong
/// socket type); encountering it under correct usage is a bug.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ThisError)]
pub enum Error {
  #[error("Invalid argument")]
  InvalidArgument,
  #[error("Permission denied")]
  PermissionDenied,
  #[error("Operation would block")]
  TryAgain,
  #[error("Out of memory")]
  OutOfMemory,
  #[error("Operation in progress")]
  InProgress,
  #[error("Already running")]
  Already,
  #[error("System call interrupted")]
  Interrupted,
  #[error("Per-process limit hit")]
  ProcessLimitReached,
  #[error("Protocol not supported")]
  ProtocolNotSupported,
  #[error("Connection refused")]
  ConnectionRefused,
  #[error("Address already in use")]
  AlreadyInUse,
  #[error("Address not available")]
  AddressNotAvailable,
  #[error("Connection aborted")]
  ConnectionAborted,
  #[error("Connection reset")]
  ConnectionReset,
  #[error("Endpoint shutdown")]
  Shutdown,
  #[error("Host is down")]
  HostDown,
  #[error("Host is unreachable")]
  HostUnreachable,
  #[error("End of file")]
  EndOfFile,
  #[error("Unexpected error")]
  Unexpected,
  #[error("Unknown error")]
  Unknown,
}

impl Error {
  /// Maps a platform `errno` value to its canonical condition.
  pub fn from_errno(code: i32) -> Error {
    match code {
      libc::EINVAL => Error::InvalidArgument,
      libc::EACCES | libc::EPERM => Error::PermissionDenied,
      // EAGAIN and EWOULDBLOCK share a value on Linux but not everywhere.
      code if code == libc::EAGAIN || code == libc::EWOULDBLOCK => {
        Error::TryAgain
      }
      libc::ENOBUFS | libc::ENOMEM => Error::OutOfMemory,
      libc::EINPROGRESS => Error::InProgress,
      libc::EALREADY => Error::Already,
      libc::EINTR => Error::Interrupted,
      libc::EMFILE | libc::ENFILE => Error::ProcessLimitReached,
      libc::EPROTONOSUPPORT | libc::EAFNOSUPPORT => {
        Error::ProtocolNotSupported
      }
      libc::ECONNREFUSED => Error::ConnectionRefused,
      libc::EADDRINUSE => Error::AlreadyInUse,
      libc::EADDRNOTAVAIL => Error::AddressNotAvailable,
      libc::ECONNABORTED => Error::ConnectionAborted,
      libc::ECONNRESET => Error::ConnectionReset,
      libc::ESHUTDOWN | libc::EPIPE => Error::Shutdown,
      libc::EHOSTDOWN => Error::HostDown,
      libc::EHOSTUNREACH | libc::ENETUNREACH => Error::HostUnreachable,
      libc::EBADF
      | libc::EFAULT
      | libc::EISCONN
      | libc::EPROTOTYPE
      | libc::ENOTSOCK
      | libc::EOPNOTSUPP => Error::Unexpected,
      _ => Error::Unknown,
    }
  }

  /// Reads the calling thread's `errno` and maps it.
  pub fn last_os() -> Error {
    Error::from_errno(last_errno())
  }

  /// True for the aggregate "peer is gone" conditions: [`Error::EndOfFile`],
  /// [`Error::ConnectionAborted`], [`Error::ConnectionReset`] and
  /// [`Error::Shutdown`].
  pub fn is_disconnect(self) -> bool {
    matches!(
      self,
      Error::EndOfFile
        | Error::ConnectionAborted
        | Error::ConnectionReset
        | Error::Shutdown
    )
  }

  /// True for the aggregate resource-exhaustion conditions:
  /// [`Error::OutOfMemory`] and [`Error::ProcessLimitReached`].
  pub fn is_no_resources(self) -> bool {
    matches!(self, Error::OutOfMemory | Error::ProcessLimitReached)
  }
}

impl From<Error> for std::io::Error {
  fn from(err: Error) -> Self {
    use std::io::ErrorKind;

    let kind = match err {
      Error::InvalidArgument => ErrorKind::InvalidInput,
      Error::PermissionDenied => ErrorKind::PermissionDenied,
      Error::TryAgain => ErrorKind::WouldBlock,
      Error::OutOfMemory => ErrorKind::OutOfMemory,
      Error::Interrupted => ErrorKind::Interrupted,
      Error::ConnectionRefused => ErrorKind::ConnectionRefused,
      Error::AlreadyInUse => ErrorKind::AddrInUse,
      Error::AddressNotAvailable => ErrorKind::AddrNotAvailable,
      Error::ConnectionAborted => ErrorKind::ConnectionAborted,
      Error::ConnectionReset => ErrorKind::ConnectionReset,
      Error::EndOfFile => ErrorKind::UnexpectedEof,
      _ => ErrorKind::Other,
    };
    std::io::Error::new(kind, err)
  }
}

/// Returns the calling thread's current `errno` value.
pub(crate) fn last_errno() -> i32 {
  std::io::Error::last_os_error().raw_os_error().unwrap_or(0)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn errno_mapping_covers_the_common_conditions() {
    assert_eq!(Error::from_errno(libc::ECONNREFUSED), Error::ConnectionRefused);
    assert_eq!(Error::from_errno(libc::EADDRINUSE), Error::AlreadyInUse);
    assert_eq!(Error::from_errno(libc::EAGAIN), Error::TryAgain);
    assert_eq!(Error::from_errno(libc::EBADF), Error::Unexpected);
    // An implausible code falls through to the catch-all.
    assert_eq!(Error::from_errno(999_999), Error::Unknown);
  }

  #[test]
  fn generic_conditions_aggregate_their_members() {
    for member in [
      Error::EndOfFile,
      Error::ConnectionAborted,
      Error::ConnectionReset,
      Error::Shutdown,
    ] {
      assert!(member.is_disconnect());
    }
    assert!(!Error::TryAgain.is_disconnect());

    assert!(Error::OutOfMemory.is_no_resources());
    assert!(Error::ProcessLimitReached.is_no_resources());
    assert!(!Error::EndOfFile.is_no_resources());
  }
}
