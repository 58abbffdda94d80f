//! Connection-oriented (TCP) socket handles and options.

mod listener;
mod options;
mod socket;

pub use listener::Listener;
pub use options::{KeepAlive, Linger, NoDelay, RetransmissionTimeout};
pub use socket::Socket;
