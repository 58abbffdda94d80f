//! Typed socket option tags.
//!
//! Each option is a zero-sized tag implementing [`SocketOption`]; the
//! typed handles forward `set_option`/`option` calls here. Options in this
//! module apply to any socket; TCP-specific options live in
//! [`crate::tcp`].

use std::mem::{self, MaybeUninit};
use std::os::fd::{AsRawFd, RawFd};
use std::time::Duration;

use crate::error::Result;
use crate::socket::Socket;

/// A typed getter/setter pair for one kernel socket option.
pub trait SocketOption {
  type Value;

  fn get(&self, socket: &Socket) -> Result<Self::Value>;
  fn set(&self, socket: &mut Socket, value: Self::Value) -> Result<()>;
}

pub(crate) fn set_raw<T>(
  handle: RawFd,
  level: libc::c_int,
  name: libc::c_int,
  value: &T,
) -> Result<()> {
  syscall!(setsockopt(
    handle,
    level,
    name,
    (value as *const T).cast(),
    mem::size_of::<T>() as libc::socklen_t,
  ))
  .map(drop)
}

pub(crate) fn get_raw<T: Copy>(
  handle: RawFd,
  level: libc::c_int,
  name: libc::c_int,
) -> Result<T> {
  let mut value = MaybeUninit::<T>::zeroed();
  let mut len = mem::size_of::<T>() as libc::socklen_t;
  syscall!(getsockopt(
    handle,
    level,
    name,
    value.as_mut_ptr().cast(),
    &mut len,
  ))?;
  // SAFETY: the kernel wrote a value of the requested option type; the
  // zeroed initialization covers options reported with a shorter length.
  Ok(unsafe { value.assume_init() })
}

fn duration_to_timeval(duration: Duration) -> libc::timeval {
  libc::timeval {
    tv_sec: duration.as_secs() as libc::time_t,
    tv_usec: duration.subsec_micros() as libc::suseconds_t,
  }
}

fn timeval_to_duration(tv: libc::timeval) -> Duration {
  Duration::new(tv.tv_sec as u64, (tv.tv_usec as u32) * 1_000)
}

/// Toggles non-blocking I/O mode.
///
/// While enabled, `read` and `write` fail with
/// [`Error::TryAgain`](crate::Error::TryAgain) instead of blocking when
/// the operation cannot complete immediately. The getter reports the mode
/// the user last requested.
pub struct NonBlocking;

impl SocketOption for NonBlocking {
  type Value = bool;

  fn get(&self, socket: &Socket) -> Result<bool> {
    Ok(socket.state.user_non_blocking)
  }

  fn set(&self, socket: &mut Socket, value: bool) -> Result<()> {
    socket.set_nonblocking(value)
  }
}

/// Timeout for blocking receive operations (`SO_RCVTIMEO`).
///
/// A socket whose blocking operation timed out is in an
/// implementation-defined state; the only safe follow-up is closing it.
pub struct ReceiveTimeout;

impl SocketOption for ReceiveTimeout {
  type Value = Duration;

  fn get(&self, socket: &Socket) -> Result<Duration> {
    let tv: libc::timeval = get_raw(
      socket.as_raw_fd(),
      libc::SOL_SOCKET,
      libc::SO_RCVTIMEO,
    )?;
    Ok(timeval_to_duration(tv))
  }

  fn set(&self, socket: &mut Socket, value: Duration) -> Result<()> {
    set_raw(
      socket.as_raw_fd(),
      libc::SOL_SOCKET,
      libc::SO_RCVTIMEO,
      &duration_to_timeval(value),
    )
  }
}

/// Timeout for blocking send operations (`SO_SNDTIMEO`).
///
/// The same caveat as [`ReceiveTimeout`] applies after a timeout fires.
pub struct SendTimeout;

impl SocketOption for SendTimeout {
  type Value = Duration;

  fn get(&self, socket: &Socket) -> Result<Duration> {
    let tv: libc::timeval = get_raw(
      socket.as_raw_fd(),
      libc::SOL_SOCKET,
      libc::SO_SNDTIMEO,
    )?;
    Ok(timeval_to_duration(tv))
  }

  fn set(&self, socket: &mut Socket, value: Duration) -> Result<()> {
    set_raw(
      socket.as_raw_fd(),
      libc::SOL_SOCKET,
      libc::SO_SNDTIMEO,
      &duration_to_timeval(value),
    )
  }
}

/// Kernel receive buffer size (`SO_RCVBUF`). The kernel may round the
/// requested size; the getter reports the effective value.
pub struct ReceiveBufferSize;

impl SocketOption for ReceiveBufferSize {
  type Value = usize;

  fn get(&self, socket: &Socket) -> Result<usize> {
    let size: libc::c_int =
      get_raw(socket.as_raw_fd(), libc::SOL_SOCKET, libc::SO_RCVBUF)?;
    Ok(size as usize)
  }

  fn set(&self, socket: &mut Socket, value: usize) -> Result<()> {
    set_raw(
      socket.as_raw_fd(),
      libc::SOL_SOCKET,
      libc::SO_RCVBUF,
      &(value as libc::c_int),
    )
  }
}

/// Kernel send buffer size (`SO_SNDBUF`). The kernel may round the
/// requested size; the getter reports the effective value.
pub struct SendBufferSize;

impl SocketOption for SendBufferSize {
  type Value = usize;

  fn get(&self, socket: &Socket) -> Result<usize> {
    let size: libc::c_int =
      get_raw(socket.as_raw_fd(), libc::SOL_SOCKET, libc::SO_SNDBUF)?;
    Ok(size as usize)
  }

  fn set(&self, socket: &mut Socket, value: usize) -> Result<()> {
    set_raw(
      socket.as_raw_fd(),
      libc::SOL_SOCKET,
      libc::SO_SNDBUF,
      &(value as libc::c_int),
    )
  }
}
