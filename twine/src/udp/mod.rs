//! Connectionless (UDP) socket handle.

mod socket;

pub use socket::Socket;
