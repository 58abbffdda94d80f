//! Thin wrapper over BSD-style sockets.
//!
//! [`Socket`] owns exactly one live OS descriptor and exposes the blocking
//! and non-blocking primitives the typed handles and the reactor are built
//! from. The descriptor is closed exactly once, when the `Socket` is
//! dropped; the "no socket yet" state of the typed handles is expressed as
//! `Option<Socket>` rather than a sentinel descriptor value.
//!
//! `EINTR` is handled here by retrying the interrupted call; it never
//! reaches a caller.

pub(crate) mod sockaddr;

use std::mem;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::ptr;

use crate::addr::{Address, Endpoint, Ip, Transport};
use crate::error::{Error, Result};
use sockaddr::{endpoint_to_sockaddr, pending_error, sockaddr_to_endpoint};

/// Default `listen` backlog hint.
pub const MAX_PENDING_CONNECTIONS: u32 = libc::SOMAXCONN as u32;

#[cfg(not(any(target_os = "macos", target_os = "ios")))]
const MSG_NO_SIGPIPE: libc::c_int = libc::MSG_NOSIGNAL;
#[cfg(any(target_os = "macos", target_os = "ios"))]
const MSG_NO_SIGPIPE: libc::c_int = 0;

/// Blocking-mode bookkeeping for one socket.
///
/// `user_non_blocking` records what the user asked for through the
/// non-blocking option; `internal_non_blocking` records what the
/// descriptor is actually set to. The two only diverge transiently inside
/// the option layer, but read semantics depend on the internal bit, so
/// both are kept.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct State {
  pub user_non_blocking: bool,
  pub internal_non_blocking: bool,
}

/// One OS socket descriptor plus the tags it was created with.
#[derive(Debug)]
pub struct Socket {
  fd: OwnedFd,
  ip: Ip,
  transport: Transport,
  pub(crate) state: State,
}

impl Socket {
  /// Allocates a new kernel socket for the given IP version and
  /// transport.
  ///
  /// The descriptor is created close-on-exec. On platforms that support
  /// it, `SO_NOSIGPIPE` is set so a write to a closed peer reports an
  /// error instead of raising a signal; elsewhere the same is achieved per
  /// call with `MSG_NOSIGNAL`.
  pub fn new(ip: Ip, transport: Transport) -> Result<Socket> {
    let domain = match ip {
      Ip::V4 => libc::AF_INET,
      Ip::V6 => libc::AF_INET6,
    };
    let (ty, protocol) = match transport {
      Transport::Tcp => (libc::SOCK_STREAM, libc::IPPROTO_TCP),
      Transport::Udp => (libc::SOCK_DGRAM, libc::IPPROTO_UDP),
    };

    let fd = syscall!(socket(domain, ty | libc::SOCK_CLOEXEC, protocol))?;
    // SAFETY: socket(2) returned a fresh descriptor that nothing else
    // owns.
    let fd = unsafe { OwnedFd::from_raw_fd(fd) };

    #[cfg(any(target_os = "macos", target_os = "ios"))]
    {
      let one: libc::c_int = 1;
      let _ = syscall!(setsockopt(
        fd.as_raw_fd(),
        libc::SOL_SOCKET,
        libc::SO_NOSIGPIPE,
        (&one as *const libc::c_int).cast(),
        mem::size_of::<libc::c_int>() as libc::socklen_t,
      ));
    }

    Ok(Socket { fd, ip, transport, state: State::default() })
  }

  pub fn ip(&self) -> Ip {
    self.ip
  }

  pub fn transport(&self) -> Transport {
    self.transport
  }

  /// Connects to the remote endpoint.
  ///
  /// On datagram sockets this installs the association the kernel uses to
  /// route destination-less sends and filter receives.
  pub fn connect(&self, peer: Endpoint) -> Result<()> {
    let (addr, len) = endpoint_to_sockaddr(peer);
    loop {
      match syscall!(connect(
        self.fd.as_raw_fd(),
        (&addr as *const libc::sockaddr_storage).cast(),
        len,
      )) {
        Err(Error::Interrupted) => continue,
        Err(err) => return Err(err),
        Ok(_) => return Ok(()),
      }
    }
  }

  /// Binds to a local port on the interface named by `interface`.
  pub fn bind(&self, port: u16, interface: Address) -> Result<()> {
    let (addr, len) = endpoint_to_sockaddr(Endpoint::new(interface, port));
    syscall!(bind(
      self.fd.as_raw_fd(),
      (&addr as *const libc::sockaddr_storage).cast(),
      len,
    ))
    .map(drop)
  }

  /// Starts accepting connections. `backlog` is a hint for the kernel's
  /// pending-connection queue.
  pub fn listen(&self, backlog: u32) -> Result<()> {
    syscall!(listen(self.fd.as_raw_fd(), backlog as libc::c_int)).map(drop)
  }

  /// Blocks until a connection arrives and returns a socket for it.
  ///
  /// The accepted socket inherits this socket's IP version and transport
  /// tags.
  pub fn accept(&self) -> Result<Socket> {
    loop {
      match syscall!(accept(
        self.fd.as_raw_fd(),
        ptr::null_mut(),
        ptr::null_mut(),
      )) {
        Err(Error::Interrupted) => continue,
        Err(err) => return Err(err),
        Ok(fd) => {
          // SAFETY: accept(2) returned a fresh descriptor that nothing
          // else owns.
          let fd = unsafe { OwnedFd::from_raw_fd(fd) };
          return Ok(Socket {
            fd,
            ip: self.ip,
            transport: self.transport,
            state: State::default(),
          });
        }
      }
    }
  }

  /// Shuts down the read and/or write half of the connection. Requesting
  /// neither direction is an [`Error::InvalidArgument`].
  pub fn shutdown(&self, read: bool, write: bool) -> Result<()> {
    let how = match (read, write) {
      (true, false) => libc::SHUT_RD,
      (false, true) => libc::SHUT_WR,
      (true, true) => libc::SHUT_RDWR,
      (false, false) => return Err(Error::InvalidArgument),
    };
    syscall!(shutdown(self.fd.as_raw_fd(), how)).map(drop)
  }

  /// Sends bytes on a connected socket, returning how many were accepted.
  /// On datagram sockets the whole buffer forms a single datagram.
  pub fn write(&self, input: &[u8]) -> Result<usize> {
    loop {
      match syscall!(send(
        self.fd.as_raw_fd(),
        input.as_ptr().cast(),
        input.len(),
        MSG_NO_SIGPIPE,
      )) {
        Err(Error::Interrupted) => continue,
        Err(err) => return Err(err),
        Ok(sent) => return Ok(sent as usize),
      }
    }
  }

  /// Receives bytes from a connected socket.
  ///
  /// In blocking mode the kernel is asked to wait for the whole buffer
  /// (`MSG_WAITALL`); receiving fewer bytes without an error therefore
  /// means the peer closed the stream, reported as [`Error::EndOfFile`]
  /// with the received prefix left in `output`. In non-blocking mode a
  /// short read is ordinary and only a zero-byte result signals end of
  /// file.
  pub fn read(&self, output: &mut [u8]) -> Result<usize> {
    if output.is_empty() {
      return Ok(0);
    }

    let received = loop {
      match syscall!(recv(
        self.fd.as_raw_fd(),
        output.as_mut_ptr().cast(),
        output.len(),
        MSG_NO_SIGPIPE | libc::MSG_WAITALL,
      )) {
        Err(Error::Interrupted) => continue,
        Err(err) => return Err(err),
        Ok(received) => break received as usize,
      }
    };

    if self.state.internal_non_blocking {
      if received == 0 {
        return Err(Error::EndOfFile);
      }
    } else if received < output.len() {
      return Err(Error::EndOfFile);
    }

    Ok(received)
  }

  /// Non-blocking receive regardless of the descriptor's mode. Used by
  /// the reactor between readiness notifications.
  pub fn nonblocking_read(&self, output: &mut [u8]) -> Result<usize> {
    nonblocking_read(self.fd.as_raw_fd(), output)
  }

  /// Non-blocking send regardless of the descriptor's mode. Used by the
  /// reactor between readiness notifications.
  pub fn nonblocking_write(&self, input: &[u8]) -> Result<usize> {
    nonblocking_write(self.fd.as_raw_fd(), input)
  }

  /// Sends one datagram. Without an explicit destination the socket must
  /// be associated (see [`Socket::connect`]).
  pub fn send_to(
    &self,
    input: &[u8],
    destination: Option<Endpoint>,
  ) -> Result<usize> {
    let encoded = destination.map(endpoint_to_sockaddr);
    let (addr_ptr, addr_len): (*const libc::sockaddr, libc::socklen_t) =
      match &encoded {
        Some((addr, len)) => {
          ((addr as *const libc::sockaddr_storage).cast(), *len)
        }
        None => (ptr::null(), 0),
      };

    loop {
      match syscall!(sendto(
        self.fd.as_raw_fd(),
        input.as_ptr().cast(),
        input.len(),
        MSG_NO_SIGPIPE,
        addr_ptr,
        addr_len,
      )) {
        Err(Error::Interrupted) => continue,
        Err(err) => return Err(err),
        Ok(sent) => return Ok(sent as usize),
      }
    }
  }

  /// Receives one datagram, returning its length and source endpoint.
  /// A datagram larger than `output` is truncated without error.
  pub fn receive_from(&self, output: &mut [u8]) -> Result<(usize, Endpoint)> {
    // SAFETY: zeroed sockaddr_storage is a valid value for the kernel to
    // overwrite.
    let mut storage: libc::sockaddr_storage = unsafe { mem::zeroed() };
    let mut socklen = mem::size_of::<libc::sockaddr_storage>()
      as libc::socklen_t;

    let received = loop {
      match syscall!(recvfrom(
        self.fd.as_raw_fd(),
        output.as_mut_ptr().cast(),
        output.len(),
        MSG_NO_SIGPIPE,
        (&mut storage as *mut libc::sockaddr_storage).cast(),
        &mut socklen,
      )) {
        Err(Error::Interrupted) => continue,
        Err(err) => return Err(err),
        Ok(received) => break received as usize,
      }
    };

    let source = sockaddr_to_endpoint(&storage).unwrap_or(Endpoint::ZERO);
    Ok((received, source))
  }

  /// The local endpoint, or the zero endpoint if the query fails (for
  /// example on a socket that is not bound yet).
  pub fn local_endpoint(&self) -> Endpoint {
    self.query_endpoint(libc::getsockname)
  }

  /// The remote endpoint, or the zero endpoint if the socket is not
  /// connected.
  pub fn remote_endpoint(&self) -> Endpoint {
    self.query_endpoint(libc::getpeername)
  }

  fn query_endpoint(
    &self,
    query: unsafe extern "C" fn(
      libc::c_int,
      *mut libc::sockaddr,
      *mut libc::socklen_t,
    ) -> libc::c_int,
  ) -> Endpoint {
    // SAFETY: zeroed sockaddr_storage is a valid value for the kernel to
    // overwrite.
    let mut storage: libc::sockaddr_storage = unsafe { mem::zeroed() };
    let mut socklen = mem::size_of::<libc::sockaddr_storage>()
      as libc::socklen_t;

    // SAFETY: the descriptor is live and the out-pointers reference local
    // storage of the advertised length.
    let status = unsafe {
      query(
        self.fd.as_raw_fd(),
        (&mut storage as *mut libc::sockaddr_storage).cast(),
        &mut socklen,
      )
    };
    if status < 0 {
      return Endpoint::ZERO;
    }
    sockaddr_to_endpoint(&storage).unwrap_or(Endpoint::ZERO)
  }

  /// Drains the socket's pending asynchronous error, if any.
  pub fn take_error(&self) -> Option<Error> {
    pending_error(self.fd.as_raw_fd())
  }

  /// Switches the descriptor's `O_NONBLOCK` flag and records both state
  /// bits. Exposed to users through the non-blocking option tag.
  pub(crate) fn set_nonblocking(&mut self, enable: bool) -> Result<()> {
    let flags = syscall!(fcntl(self.fd.as_raw_fd(), libc::F_GETFL))?;
    let flags = if enable {
      flags | libc::O_NONBLOCK
    } else {
      flags & !libc::O_NONBLOCK
    };
    syscall!(fcntl(self.fd.as_raw_fd(), libc::F_SETFL, flags))?;

    self.state.user_non_blocking = enable;
    self.state.internal_non_blocking = enable;
    Ok(())
  }
}

impl AsRawFd for Socket {
  fn as_raw_fd(&self) -> RawFd {
    self.fd.as_raw_fd()
  }
}

/// recv with `MSG_DONTWAIT`: [`Error::TryAgain`] when the kernel buffer is
/// empty, [`Error::EndOfFile`] when the peer closed the stream.
pub(crate) fn nonblocking_read(
  handle: RawFd,
  output: &mut [u8],
) -> Result<usize> {
  loop {
    match syscall!(recv(
      handle,
      output.as_mut_ptr().cast(),
      output.len(),
      MSG_NO_SIGPIPE | libc::MSG_DONTWAIT,
    )) {
      Err(Error::Interrupted) => continue,
      Err(err) => return Err(err),
      Ok(0) if !output.is_empty() => return Err(Error::EndOfFile),
      Ok(received) => return Ok(received as usize),
    }
  }
}

/// send with `MSG_DONTWAIT`: [`Error::TryAgain`] when the kernel buffer is
/// full.
pub(crate) fn nonblocking_write(handle: RawFd, input: &[u8]) -> Result<usize> {
  loop {
    match syscall!(send(
      handle,
      input.as_ptr().cast(),
      input.len(),
      MSG_NO_SIGPIPE | libc::MSG_DONTWAIT,
    )) {
      Err(Error::Interrupted) => continue,
      Err(err) => return Err(err),
      Ok(sent) => return Ok(sent as usize),
    }
  }
}
