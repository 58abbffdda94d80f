//! Passive socket accepting stream connections.

use crate::addr::{Address, Endpoint, Transport};
use crate::error::{Error, Result};
use crate::socket;
use crate::tcp::Socket;

/// A TCP listener.
#[derive(Debug, Default)]
pub struct Listener {
  inner: Option<socket::Socket>,
}

impl Listener {
  /// Creates a listener that is not yet bound.
  pub fn new() -> Listener {
    Listener::default()
  }

  /// Allocates a socket for `local_address`'s IP version, binds it to
  /// `(local_address, port)` and starts listening. `backlog` is a hint
  /// bounding the kernel's pending-connection queue; pass
  /// [`socket::MAX_PENDING_CONNECTIONS`] when in doubt.
  pub fn listen(
    &mut self,
    local_address: Address,
    port: u16,
    backlog: u32,
  ) -> Result<()> {
    let raw = socket::Socket::new(local_address.version(), Transport::Tcp)?;
    raw.bind(port, local_address)?;
    raw.listen(backlog)?;
    self.inner = Some(raw);
    Ok(())
  }

  /// Blocks until a connection arrives; the returned socket is open.
  pub fn accept(&mut self) -> Result<Socket> {
    let Some(raw) = self.inner.as_ref() else {
      return Err(Error::InvalidArgument);
    };
    Ok(Socket::from_raw(raw.accept()?))
  }

  /// Stops listening and releases the descriptor.
  pub fn close(&mut self) {
    self.inner = None;
  }

  /// The bound endpoint, or the zero endpoint when not listening.
  pub fn local_endpoint(&self) -> Endpoint {
    self.inner.as_ref().map_or(Endpoint::ZERO, |raw| raw.local_endpoint())
  }

  /// The underlying raw socket, for registration with a
  /// [`Reactor`](crate::Reactor). `None` while not listening.
  pub fn implementation(&self) -> Option<&socket::Socket> {
    self.inner.as_ref()
  }
}
