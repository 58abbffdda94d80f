//! Connection-oriented stream socket.

use crate::addr::{Address, Endpoint, Transport};
use crate::error::{Error, Result};
use crate::options::SocketOption;
use crate::socket;

/// A TCP stream socket.
///
/// Starts out unopened; [`connect`](Socket::connect) allocates the
/// underlying descriptor, and [`Listener::accept`](crate::tcp::Listener)
/// produces already-open sockets. Operations on an unopened socket fail
/// with [`Error::InvalidArgument`].
#[derive(Debug, Default)]
pub struct Socket {
  inner: Option<socket::Socket>,
  open: bool,
}

impl Socket {
  /// Creates an unopened socket handle.
  pub fn new() -> Socket {
    Socket::default()
  }

  pub(crate) fn from_raw(raw: socket::Socket) -> Socket {
    Socket { inner: Some(raw), open: true }
  }

  /// Whether the socket currently holds an established connection.
  ///
  /// The flag is cleared by [`close`](Socket::close) and by read
  /// operations that observe the peer going away.
  pub fn is_open(&self) -> bool {
    self.open
  }

  /// Allocates a socket matching the target's IP version and connects it.
  pub fn connect(&mut self, target: Address, port: u16) -> Result<()> {
    let raw = socket::Socket::new(target.version(), Transport::Tcp)?;
    raw.connect(Endpoint::new(target, port))?;
    self.inner = Some(raw);
    self.open = true;
    Ok(())
  }

  /// Closes the connection and releases the descriptor.
  pub fn close(&mut self) {
    self.inner = None;
    self.open = false;
  }

  /// Half-closes the connection; `(true, true)` shuts down both
  /// directions.
  pub fn shutdown(&mut self, read: bool, write: bool) -> Result<()> {
    match self.inner.as_ref() {
      Some(raw) => raw.shutdown(read, write),
      None => Err(Error::InvalidArgument),
    }
  }

  /// Reads exactly `count` bytes into `output` (resizing it), unless the
  /// socket is in non-blocking mode, in which case whatever is available
  /// up to `count` is returned.
  ///
  /// A peer that closed before `count` bytes arrived yields
  /// [`Error::EndOfFile`] and clears the open flag.
  pub fn read(&mut self, count: usize, output: &mut Vec<u8>) -> Result<usize> {
    let Some(raw) = self.inner.as_ref() else {
      return Err(Error::InvalidArgument);
    };

    output.resize(count, 0);
    match raw.read(output) {
      Ok(received) => {
        output.truncate(received);
        Ok(received)
      }
      Err(err) => {
        output.clear();
        if err.is_disconnect() {
          self.open = false;
        }
        Err(err)
      }
    }
  }

  /// Reads one byte at a time until `delimiter` is seen or `max` bytes
  /// have been consumed. `output` receives every byte read, including the
  /// delimiter.
  pub fn read_until(
    &mut self,
    delimiter: u8,
    output: &mut Vec<u8>,
    max: usize,
  ) -> Result<usize> {
    let Some(raw) = self.inner.as_ref() else {
      return Err(Error::InvalidArgument);
    };

    output.clear();
    let mut byte = [0u8; 1];
    while output.len() < max {
      match raw.read(&mut byte) {
        Ok(_) => {
          output.push(byte[0]);
          if byte[0] == delimiter {
            break;
          }
        }
        Err(err) => {
          if err.is_disconnect() {
            self.open = false;
          }
          return Err(err);
        }
      }
    }
    Ok(output.len())
  }

  /// Sends bytes, returning how many the kernel accepted.
  pub fn write(&mut self, input: &[u8]) -> Result<usize> {
    let Some(raw) = self.inner.as_ref() else {
      return Err(Error::InvalidArgument);
    };
    raw.write(input)
  }

  /// The local endpoint, or the zero endpoint when unopened.
  pub fn local_endpoint(&self) -> Endpoint {
    self.inner.as_ref().map_or(Endpoint::ZERO, |raw| raw.local_endpoint())
  }

  /// The remote endpoint, or the zero endpoint when unopened.
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
