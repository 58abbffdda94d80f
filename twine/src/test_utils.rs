//! Helpers shared by the integration tests.

use std::thread;

use crate::addr::Address;
use crate::socket::MAX_PENDING_CONNECTIONS;
use crate::tcp;

/// Builds a connected (server, client) stream pair over `local`:`port`.
///
/// Panics on any setup failure; tests treat an unusable loopback as fatal.
pub fn tcp_pair(local: Address, port: u16) -> (tcp::Socket, tcp::Socket) {
  let mut listener = tcp::Listener::new();
  listener
    .listen(local, port, MAX_PENDING_CONNECTIONS)
    .expect("failed to listen on loopback");

  let connector = thread::spawn(move || {
    let mut client = tcp::Socket::new();
    client.connect(local, port).expect("failed to connect to listener");
    client
  });

  let server = listener.accept().expect("failed to accept");
  let client = connector.join().expect("connect thread panicked");
  (server, client)
}
