//! Echoes every received datagram back to its sender.
//!
//! Usage: `udp_echo_server <port>`

use std::env;
use std::process;

use twine::{ipv4, udp, Ip};

/// Largest UDP payload that is safe under the default IPv4 MTU.
const MAX_DATAGRAM_SIZE: usize = 512;

fn main() {
  let mut args = env::args().skip(1);
  let port = match args.next().and_then(|arg| arg.parse::<u16>().ok()) {
    Some(port) if args.next().is_none() => port,
    _ => {
      eprintln!("Usage: udp-echo-server <port>");
      process::exit(1);
    }
  };

  let mut socket = udp::Socket::new(Ip::V4).expect("failed to create socket");
  socket.bind(ipv4::ANY, port).expect("failed to bind");

  println!("Listening on {port} port.");

  let mut datagram = Vec::new();
  loop {
    let source = match socket.read(MAX_DATAGRAM_SIZE, &mut datagram) {
      Ok((_, source)) => source,
      Err(condition) => {
        eprintln!("Read error: {condition}");
        continue;
      }
    };
    println!("{source} > {}", String::from_utf8_lossy(&datagram));

    if let Err(condition) = socket.write(&datagram, Some(source)) {
      eprintln!("Write error: {condition}");
      continue;
    }
    println!("{source} < {}", String::from_utf8_lossy(&datagram));
  }
}
