//! Datagram socket behavior over loopback.

use std::mem::MaybeUninit;
use std::net::SocketAddr;
use std::time::Duration;

use socket2::{Domain, Socket as SysSocket, Type};
use twine::{ipv4, udp, Endpoint, Error, Ip};

fn bound(port: u16) -> udp::Socket {
  let mut socket = udp::Socket::new(Ip::V4).unwrap();
  socket
    .set_option(twine::ReceiveTimeout, Duration::from_secs(10))
    .unwrap();
  socket.bind(ipv4::LOOPBACK, port).unwrap();
  socket
}

#[test]
fn unicast_delivers_payload_and_source() {
  let mut receiver = bound(7777);
  let mut sender = udp::Socket::new(Ip::V4).unwrap();

  let outgoing = vec![0xAF; 32];
  let destination = Endpoint::new(ipv4::LOOPBACK, 7777);
  assert_eq!(sender.write(&outgoing, Some(destination)).unwrap(), 32);

  let mut incoming = Vec::new();
  let (received, source) =
    receiver.read(outgoing.len(), &mut incoming).unwrap();
  assert_eq!(received, outgoing.len());
  assert_eq!(incoming, outgoing);
  assert_eq!(source.addr, ipv4::LOOPBACK);
  assert_eq!(source.port, sender.local_endpoint().port);
}

#[test]
fn binding_the_same_endpoint_twice_fails() {
  let _first = bound(7752);
  let mut second = udp::Socket::new(Ip::V4).unwrap();
  assert_eq!(
    second.bind(ipv4::LOOPBACK, 7752),
    Err(Error::AlreadyInUse)
  );
}

#[test]
fn association_routes_writes_and_filters_reads() {
  let mut receiver = bound(7753);
  let mut sender = udp::Socket::new(Ip::V4).unwrap();
  sender
    .set_option(twine::ReceiveTimeout, Duration::from_secs(10))
    .unwrap();

  sender.associate(ipv4::LOOPBACK, 7753).unwrap();
  assert_eq!(
    sender.remote_endpoint(),
    Endpoint::new(ipv4::LOOPBACK, 7753)
  );

  // No destination given: the association supplies it.
  let outgoing = vec![0xAF; 32];
  sender.write(&outgoing, None).unwrap();

  let mut incoming = Vec::new();
  let (_, source) = receiver.read(outgoing.len(), &mut incoming).unwrap();
  assert_eq!(incoming, outgoing);

  // The receiver can reply to the observed source.
  receiver.write(b"reply", Some(source)).unwrap();
  let mut reply = Vec::new();
  let (received, _) = sender.read(16, &mut reply).unwrap();
  assert_eq!(received, 5);
  assert_eq!(reply, b"reply");
}

#[test]
fn oversize_datagram_is_silently_truncated() {
  let mut receiver = bound(7754);
  let mut sender = udp::Socket::new(Ip::V4).unwrap();

  let outgoing: Vec<u8> = (0..64).collect();
  sender
    .write(&outgoing, Some(Endpoint::new(ipv4::LOOPBACK, 7754)))
    .unwrap();

  let mut incoming = Vec::new();
  let (received, _) = receiver.read(16, &mut incoming).unwrap();
  assert_eq!(received, 16);
  assert_eq!(incoming, &outgoing[..16]);
}

#[test]
fn echoes_with_a_foreign_socket_implementation() {
  let mut server = bound(7755);

  // The peer side is built with socket2 so the wire format is checked
  // against an independent implementation.
  let peer = SysSocket::new(Domain::IPV4, Type::DGRAM, None).unwrap();
  peer.set_read_timeout(Some(Duration::from_secs(10))).unwrap();
  let peer_addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
  peer.bind(&peer_addr.into()).unwrap();
  let server_addr: SocketAddr = "127.0.0.1:7755".parse().unwrap();
  peer.send_to(b"ping", &server_addr.into()).unwrap();

  let mut incoming = Vec::new();
  let (received, source) = server.read(512, &mut incoming).unwrap();
  assert_eq!(received, 4);
  assert_eq!(incoming, b"ping");
  server.write(b"pong", Some(source)).unwrap();

  let mut reply = [MaybeUninit::<u8>::uninit(); 16];
  let (received, _) = peer.recv_from(&mut reply).unwrap();
  assert_eq!(received, 4);
  let reply: Vec<u8> =
    reply[..received].iter().map(|byte| unsafe { byte.assume_init() }).collect();
  assert_eq!(reply, b"pong");
}

#[test]
fn local_endpoint_reports_the_bound_address() {
  let receiver = bound(7756);
  assert_eq!(
    receiver.local_endpoint(),
    Endpoint::new(ipv4::LOOPBACK, 7756)
  );
}

#[test]
fn operations_on_an_unopened_socket_are_invalid() {
  let mut socket = udp::Socket::unopened();
  let mut buffer = Vec::new();
  assert_eq!(
    socket.bind(ipv4::LOOPBACK, 7757),
    Err(Error::InvalidArgument)
  );
  assert_eq!(socket.write(b"x", None), Err(Error::InvalidArgument));
  assert_eq!(socket.read(1, &mut buffer), Err(Error::InvalidArgument));
  assert_eq!(socket.local_endpoint(), Endpoint::ZERO);

  // Opening it afterwards makes it usable.
  socket.open(Ip::V4).unwrap();
  socket.bind(ipv4::LOOPBACK, 7757).unwrap();
}
