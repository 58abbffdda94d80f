//! Connectionless datagram socket.

use crate::addr::{Address, Endpoint, Ip, Transport};
use crate::error::{Error, Result};
use crate::options::SocketOption;
use crate::socket;

/// A UDP socket.
///
/// UDP is connectionless; [`associate`](Socket::associate) merely installs
/// a default destination in the kernel so that writes may omit one, and
/// narrows receives to that peer. Operations on an unopened socket fail
/// with [`Error::InvalidArgument`].
#[derive(Debug, Default)]
pub struct Socket {
  inner: Option<socket::Socket>,
}

impl Socket {
  /// Allocates a datagram socket for the given IP version.
  pub fn new(ip_version: Ip) -> Result<Socket> {
    let mut socket = Socket::default();
    socket.open(ip_version)?;
    Ok(socket)
  }

  /// Creates an unopened handle; call [`open`](Socket::open) before use.
  pub fn unopened() -> Socket {
    Socket::default()
  }

  /// Allocates (or replaces) the underlying descriptor.
  pub fn open(&mut self, ip_version: Ip) -> Result<()> {
    self.inner = Some(socket::Socket::new(ip_version, Transport::Udp)?);
    Ok(())
  }

  /// Releases the descriptor.
  pub fn close(&mut self) {
    self.inner = None;
  }

  /// Starts accepting datagrams on `(source, port)`.
  pub fn bind(&mut self, source: Address, port: u16) -> Result<()> {
    let Some(raw) = self.inner.as_ref() else {
      return Err(Error::InvalidArgument);
    };
    raw.bind(port, source)
  }

  /// Remembers `(destination, port)` as the default peer.
  ///
  /// Subsequent [`write`](Socket::write) calls may omit the destination,
  /// and [`read`](Socket::read) only returns datagrams from this peer.
  /// Replaces any previous association.
  pub fn associate(&mut self, destination: Address, port: u16) -> Result<()> {
    let Some(raw) = self.inner.as_ref() else {
      return Err(Error::InvalidArgument);
    };
    raw.connect(Endpoint::new(destination, port))
  }

  /// Receives one datagram of at most `max_size` bytes into `output`,
  /// resizing it to the actual length, and returns that length together
  /// with the source endpoint.
  ///
  /// A pending datagram larger than `max_size` is truncated; the excess
  /// is discarded by the kernel with no way to recover it.
  pub fn read(
    &mut self,
    max_size: usize,
    output: &mut Vec<u8>,
  ) -> Result<(usize, Endpoint)> {
    let Some(raw) = self.inner.as_ref() else {
      return Err(Error::InvalidArgument);
    };

    output.resize(max_size, 0);
    match raw.receive_from(output) {
      Ok((received, source)) => {
        output.truncate(received);
        Ok((received, source))
      }
      Err(err) => {
        output.clear();
        Err(err)
      }
    }
  }

  /// Sends `input` as a single datagram to `destination`, or to the
  /// associated peer when `destination` is `None`.
  pub fn write(
    &mut self,
    input: &[u8],
    destination: Option<Endpoint>,
  ) -> Result<usize> {
    let Some(raw) = self.inner.as_ref() else {
      return Err(Error::InvalidArgument);
    };
    raw.send_to(input, destination)
  }

  /// The local endpoint, or the zero endpoint when unopened/unbound.
  pub fn local_endpoint(&self) -> Endpoint {
    self.inner.as_ref().map_or(Endpoint::ZERO, |raw| raw.local_endpoint())
  }

  /// The associated endpoint, or the zero endpoint when none is set.
  pub fn remote_endpoint(&self) -> Endpoint {
    self.inner.as_ref().map_or(Endpoint::ZERO, |raw| raw.remote_endpoint())
  }

  /// Sets a socket option.
  pub fn set_option<O: SocketOption>(
    &mut self,
    option: O,
    value: O::Value,
  ) -> Result<()> {
    let Some(raw) = self.inner.as_mut() else {
      return Err(Error::InvalidArgument);
    };
    option.set(raw, value)
  }

  /// Reads a socket option.
  pub fn option<O: SocketOption>(&self, option: O) -> Result<O::Value> {
    let Some(raw) = self.inner.as_ref() else {
      return Err(Error::InvalidArgument);
    };
    option.get(raw)
  }

  /// The underlying raw socket, for registration with a
  /// [`Reactor`](crate::Reactor). `None` while unopened.
  pub fn implementation(&self) -> Option<&socket::Socket> {
    self.inner.as_ref()
  }
}
