//! Line-oriented echo client: sends each stdin line as one datagram and
//! prints the echoed reply.
//!
//! Usage: `echo_client <ip> [port]` (port defaults to 7, the echo
//! service)

use std::env;
use std::io::{self, BufRead, Write};
use std::process;

use twine::{udp, Address, Ip};

fn parse_ipv4(text: &str) -> Option<Address> {
  let mut octets = [0u8; 4];
  let mut parts = text.split('.');
  for octet in &mut octets {
    *octet = parts.next()?.parse().ok()?;
  }
  if parts.next().is_some() {
    return None;
  }
  Some(Address::from(octets))
}

fn main() {
  let args: Vec<String> = env::args().skip(1).collect();
  let (address, port) = match args.as_slice() {
    [ip] => (parse_ipv4(ip), 7),
    [ip, port] => (parse_ipv4(ip), port.parse().unwrap_or(0)),
    _ => (None, 0),
  };
  let Some(address) = address.filter(|_| port != 0) else {
    eprintln!("Usage: echo-client <ip> [port]");
    process::exit(1);
  };

  let mut socket = udp::Socket::new(Ip::V4).expect("failed to create socket");
  socket.associate(address, port).expect("failed to associate");

  let stdin = io::stdin();
  let mut line = String::new();
  loop {
    print!("> ");
    io::stdout().flush().expect("failed to flush stdout");

    line.clear();
    match stdin.lock().read_line(&mut line) {
      Ok(0) | Err(_) => break,
      Ok(_) => {}
    }
    let message = line.trim_end_matches('\n');

    if let Err(condition) = socket.write(message.as_bytes(), None) {
      eprintln!("Write error: {condition}");
      continue;
    }

    let mut reply = Vec::new();
    if let Err(condition) = socket.read(message.len().max(1), &mut reply) {
      eprintln!("Read error: {condition}");
      continue;
    }
    println!("< {}", String::from_utf8_lossy(&reply));
  }
}
