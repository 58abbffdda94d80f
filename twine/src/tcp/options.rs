//! TCP-specific socket option tags.

use std::os::fd::AsRawFd;
use std::time::Duration;

use crate::error::Result;
use crate::options::{get_raw, set_raw, SocketOption};
use crate::socket::Socket;

/// Enables periodic keep-alive probing on an idle connection
/// (`SO_KEEPALIVE`).
pub struct KeepAlive;

impl SocketOption for KeepAlive {
  type Value = bool;

  fn get(&self, socket: &Socket) -> Result<bool> {
    let value: libc::c_int =
      get_raw(socket.as_raw_fd(), libc::SOL_SOCKET, libc::SO_KEEPALIVE)?;
    Ok(value != 0)
  }

  fn set(&self, socket: &mut Socket, value: bool) -> Result<()> {
    set_raw(
      socket.as_raw_fd(),
      libc::SOL_SOCKET,
      libc::SO_KEEPALIVE,
      &(value as libc::c_int),
    )
  }
}

/// Controls close behavior (`SO_LINGER`).
///
/// `Some(timeout)` makes `close` block for up to `timeout` while unsent
/// data drains; `Some(Duration::ZERO)` discards unsent data and resets the
/// connection. `None` restores the default background close.
pub struct Linger;

impl SocketOption for Linger {
  type Value = Option<Duration>;

  fn get(&self, socket: &Socket) -> Result<Option<Duration>> {
    let linger: libc::linger =
      get_raw(socket.as_raw_fd(), libc::SOL_SOCKET, libc::SO_LINGER)?;
    if linger.l_onoff == 0 {
      Ok(None)
    } else {
      Ok(Some(Duration::from_secs(linger.l_linger as u64)))
    }
  }

  fn set(&self, socket: &mut Socket, value: Option<Duration>) -> Result<()> {
    let linger = libc::linger {
      l_onoff: value.is_some() as libc::c_int,
      l_linger: value.map_or(0, |t| t.as_secs() as libc::c_int),
    };
    set_raw(socket.as_raw_fd(), libc::SOL_SOCKET, libc::SO_LINGER, &linger)
  }
}

/// How long sent data may stay unacknowledged before the connection is
/// forcibly closed (`TCP_USER_TIMEOUT`).
///
/// On platforms without kernel support the setter does nothing and the
/// getter reports the conventional default of two hours.
pub struct RetransmissionTimeout;

/// Fallback reported where `TCP_USER_TIMEOUT` is unavailable.
#[cfg(not(target_os = "linux"))]
const DEFAULT_RETRANSMISSION_TIMEOUT: Duration =
  Duration::from_secs(2 * 60 * 60);

impl SocketOption for RetransmissionTimeout {
  type Value = Duration;

  #[cfg(target_os = "linux")]
  fn get(&self, socket: &Socket) -> Result<Duration> {
    let millis: libc::c_uint = get_raw(
      socket.as_raw_fd(),
      libc::IPPROTO_TCP,
      libc::TCP_USER_TIMEOUT,
    )?;
    Ok(Duration::from_millis(millis as u64))
  }

  #[cfg(not(target_os = "linux"))]
  fn get(&self, _socket: &Socket) -> Result<Duration> {
    Ok(DEFAULT_RETRANSMISSION_TIMEOUT)
  }

  #[cfg(target_os = "linux")]
  fn set(&self, socket: &mut Socket, value: Duration) -> Result<()> {
    set_raw(
      socket.as_raw_fd(),
      libc::IPPROTO_TCP,
      libc::TCP_USER_TIMEOUT,
      &(value.as_millis() as libc::c_uint),
    )
  }

  #[cfg(not(target_os = "linux"))]
  fn set(&self, _socket: &mut Socket, _value: Duration) -> Result<()> {
    Ok(())
  }
}

/// Disables Nagle's algorithm (`TCP_NODELAY`): small writes go out
/// immediately instead of being coalesced.
pub struct NoDelay;

impl SocketOption for NoDelay {
  type Value = bool;

  fn get(&self, socket: &Socket) -> Result<bool> {
    let value: libc::c_int =
      get_raw(socket.as_raw_fd(), libc::IPPROTO_TCP, libc::TCP_NODELAY)?;
    Ok(value != 0)
  }

  fn set(&self, socket: &mut Socket, value: bool) -> Result<()> {
    set_raw(
      socket.as_raw_fd(),
      libc::IPPROTO_TCP,
      libc::TCP_NODELAY,
      &(value as libc::c_int),
    )
  }
}
