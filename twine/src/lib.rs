#![deny(
  clippy::undocumented_unsafe_blocks,
  clippy::unnecessary_safety_comment,
  clippy::not_unsafe_ptr_arg_deref
)]

//! # Twine: thin-layer network I/O
//!
//! Twine wraps BSD-style sockets in a small, typed API: IPv4/IPv6
//! [stream sockets](tcp::Socket), [listeners](tcp::Listener) and
//! [datagram sockets](udp::Socket), typed [socket options](options), and a
//! single-threaded [`Reactor`] that multiplexes many sockets through the
//! OS readiness facility (epoll on Linux).
//!
//! All failures are reported through one closed [error taxonomy](Error);
//! raw OS codes never escape the crate.
//!
//! ### Blocking I/O
//!
//! ```no_run
//! use twine::{ipv4, tcp};
//!
//! fn fetch() -> twine::Result<Vec<u8>> {
//!   let mut socket = tcp::Socket::new();
//!   socket.connect(ipv4::LOOPBACK, 7)?;
//!   socket.write(b"ping")?;
//!
//!   let mut reply = Vec::new();
//!   socket.read(4, &mut reply)?;
//!   Ok(reply)
//! }
//! ```
//!
//! ### Asynchronous I/O
//!
//! Register a socket with a [`Reactor`], queue [`Operation`]s against it,
//! and call [`Reactor::run_once`] in a loop. Completion handlers run
//! inline on the dispatching thread, receive the operation's buffer back,
//! and may queue follow-up operations:
//!
//! ```no_run
//! use twine::{ipv4, tcp, Operation, Reactor};
//!
//! fn pump(socket: &tcp::Socket) -> twine::Result<()> {
//!   let mut reactor = Reactor::new()?;
//!   let raw = socket.implementation().expect("socket is open");
//!
//!   reactor.add_socket(raw)?;
//!   reactor.enqueue(
//!     raw,
//!     Operation::read(vec![0; 1024], |_reactor, result, buffer| {
//!       match result {
//!         Ok(count) => println!("got {count} bytes: {:?}", &buffer[..count]),
//!         Err(condition) => eprintln!("read failed: {condition}"),
//!       }
//!     }),
//!   );
//!
//!   loop {
//!     reactor.run_once()?;
//!   }
//! }
//! ```
//!
//! A reactor and every socket registered with it belong to one thread;
//! run one reactor per thread to scale out.

#[macro_use]
mod macros;

pub mod addr;
pub mod dns;
pub mod error;
pub mod options;
pub mod reactor;
pub mod socket;
pub mod tcp;
#[doc(hidden)]
pub mod test_utils;
pub mod udp;

pub use addr::{ipv4, ipv6, Address, Endpoint, Ip, Transport};
pub use error::{Error, Result};
pub use options::{
  NonBlocking, ReceiveBufferSize, ReceiveTimeout, SendBufferSize, SendTimeout,
  SocketOption,
};
pub use reactor::{Handler, Operation, Reactor};
