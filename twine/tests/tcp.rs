//! Stream socket behavior over loopback.
//!
//! Each test binds its own port so the suite can run in parallel.

use std::time::Duration;

use twine::test_utils::tcp_pair;
use twine::{ipv4, ipv6, tcp, Endpoint, Error};

/// Prevents a wedged peer from hanging the suite, and lets the kernel
/// release the port immediately so reruns do not trip over TIME_WAIT.
fn guard(socket: &mut tcp::Socket) {
  socket
    .set_option(twine::ReceiveTimeout, Duration::from_secs(10))
    .unwrap();
  socket.set_option(twine::SendTimeout, Duration::from_secs(10)).unwrap();
  socket.set_option(tcp::Linger, Some(Duration::ZERO)).unwrap();
}

#[test]
fn stream_round_trip_preserves_bytes() {
  let (mut server, mut client) = tcp_pair(ipv4::LOOPBACK, 7777);
  guard(&mut server);
  guard(&mut client);

  for i in 1..=10usize {
    let outgoing = vec![0u8; 1024 * i];
    assert_eq!(client.write(&outgoing).unwrap(), outgoing.len());

    let mut incoming = Vec::new();
    server.read(outgoing.len(), &mut incoming).unwrap();
    assert_eq!(outgoing, incoming);
  }
}

#[test]
fn stream_round_trip_preserves_bytes_over_ipv6() {
  let (mut server, mut client) = tcp_pair(ipv6::LOOPBACK, 7741);
  guard(&mut server);
  guard(&mut client);

  for i in 1..=10usize {
    let outgoing = vec![0u8; 1024 * i];
    assert_eq!(client.write(&outgoing).unwrap(), outgoing.len());

    let mut incoming = Vec::new();
    server.read(outgoing.len(), &mut incoming).unwrap();
    assert_eq!(outgoing, incoming);
  }
}

#[test]
fn read_until_consumes_through_the_delimiter() {
  let (mut server, mut client) = tcp_pair(ipv4::LOOPBACK, 7742);
  guard(&mut server);
  guard(&mut client);

  for i in 1..=4usize {
    let mut outgoing = vec![0u8; 1024 * i];
    outgoing.push(0xFF);
    client.write(&outgoing).unwrap();

    let mut incoming = Vec::new();
    let consumed = server
      .read_until(0xFF, &mut incoming, 1 << 20)
      .unwrap();
    assert_eq!(consumed, outgoing.len());
    assert_eq!(outgoing, incoming);
  }
}

#[test]
fn read_until_stops_at_the_byte_limit() {
  let (mut server, mut client) = tcp_pair(ipv4::LOOPBACK, 7747);
  guard(&mut server);
  guard(&mut client);

  client.write(&[0u8; 16]).unwrap();

  let mut incoming = Vec::new();
  assert_eq!(server.read_until(0xFF, &mut incoming, 8).unwrap(), 8);
  assert_eq!(incoming, vec![0u8; 8]);
}

#[test]
fn read_after_peer_close_reports_disconnect() {
  let (mut server, mut client) = tcp_pair(ipv4::LOOPBACK, 7743);
  guard(&mut server);
  guard(&mut client);

  server.close();
  assert!(!server.is_open());

  let mut incoming = Vec::new();
  let condition = client.read(5, &mut incoming).unwrap_err();
  assert!(condition.is_disconnect(), "got {condition:?}");
  assert!(!client.is_open());
}

#[test]
fn short_stream_then_close_yields_prefix_then_eof() {
  let (mut server, mut client) = tcp_pair(ipv4::LOOPBACK, 7748);
  guard(&mut server);

  // Default linger on the client so close() sends an orderly FIN after
  // the three bytes instead of a reset.
  client.write(b"abc").unwrap();
  client.close();

  // Peer wrote 3 of the 5 requested bytes before closing.
  let mut incoming = Vec::new();
  assert_eq!(server.read(5, &mut incoming), Err(Error::EndOfFile));
  assert!(!server.is_open());
}

#[test]
fn connect_to_unbound_port_is_refused() {
  let mut socket = tcp::Socket::new();
  assert_eq!(
    socket.connect(ipv4::LOOPBACK, 65535),
    Err(Error::ConnectionRefused)
  );
  assert!(!socket.is_open());
}

#[test]
fn endpoint_queries_without_a_connection_return_zero() {
  let socket = tcp::Socket::new();
  assert_eq!(socket.local_endpoint(), Endpoint::ZERO);
  assert_eq!(socket.remote_endpoint(), Endpoint::ZERO);
}

#[test]
fn endpoints_are_consistent_across_the_pair() {
  let (mut server, mut client) = tcp_pair(ipv4::LOOPBACK, 7744);
  guard(&mut server);
  guard(&mut client);

  assert_eq!(
    client.remote_endpoint(),
    Endpoint::new(ipv4::LOOPBACK, 7744)
  );
  assert_eq!(client.local_endpoint().addr, ipv4::LOOPBACK);
  assert_eq!(client.remote_endpoint(), server.local_endpoint());
  assert_eq!(server.remote_endpoint(), client.local_endpoint());
}

#[test]
fn options_round_trip() {
  let (mut server, mut client) = tcp_pair(ipv4::LOOPBACK, 7745);
  guard(&mut server);

  client.set_option(tcp::NoDelay, true).unwrap();
  assert!(client.option(tcp::NoDelay).unwrap());

  client.set_option(tcp::KeepAlive, true).unwrap();
  assert!(client.option(tcp::KeepAlive).unwrap());

  client
    .set_option(tcp::Linger, Some(Duration::from_secs(5)))
    .unwrap();
  assert_eq!(
    client.option(tcp::Linger).unwrap(),
    Some(Duration::from_secs(5))
  );

  client
    .set_option(tcp::RetransmissionTimeout, Duration::from_secs(10))
    .unwrap();
  assert_eq!(
    client.option(tcp::RetransmissionTimeout).unwrap(),
    Duration::from_secs(10)
  );

  // The kernel rounds buffer sizes up; it never shrinks below the ask.
  client.set_option(twine::ReceiveBufferSize, 16 * 1024).unwrap();
  assert!(client.option(twine::ReceiveBufferSize).unwrap() >= 16 * 1024);

  client
    .set_option(twine::ReceiveTimeout, Duration::from_millis(1500))
    .unwrap();
  assert_eq!(
    client.option(twine::ReceiveTimeout).unwrap(),
    Duration::from_millis(1500)
  );
}

#[test]
fn non_blocking_read_reports_try_again() {
  let (mut server, mut client) = tcp_pair(ipv4::LOOPBACK, 7746);
  guard(&mut server);

  client.set_option(twine::NonBlocking, true).unwrap();
  assert!(client.option(twine::NonBlocking).unwrap());

  let mut incoming = Vec::new();
  assert_eq!(client.read(5, &mut incoming), Err(Error::TryAgain));
  // A would-block read is not a disconnect.
  assert!(client.is_open());
}

#[test]
fn write_after_shutdown_reports_disconnect() {
  let (mut server, mut client) = tcp_pair(ipv4::LOOPBACK, 7749);
  guard(&mut server);

  client.shutdown(false, true).unwrap();
  let condition = client.write(b"late").unwrap_err();
  assert!(condition.is_disconnect(), "got {condition:?}");
}

#[test]
fn operations_on_an_unopened_socket_are_invalid() {
  let mut socket = tcp::Socket::new();
  let mut buffer = Vec::new();
  assert_eq!(socket.read(1, &mut buffer), Err(Error::InvalidArgument));
  assert_eq!(socket.write(b"x"), Err(Error::InvalidArgument));
  assert_eq!(socket.shutdown(true, true), Err(Error::InvalidArgument));
  assert_eq!(
    socket.set_option(tcp::NoDelay, true),
    Err(Error::InvalidArgument)
  );
}
