//! epoll-backed selector (Linux).
//!
//! Registrations are level-triggered. Each kernel event carries a pointer
//! to the boxed [`SocketData`] in its payload, so the dispatch hot path
//! never touches the registry map.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::ptr::{self, NonNull};
use std::time::Duration;

use log::trace;

use super::{EventMask, SocketData};
use crate::error::{Error, Result};
use crate::socket::Socket;

/// Number of events fetched per poll; further ready events stay queued in
/// the kernel until the next call.
pub(crate) const EVENT_BUFFER_SIZE: usize = 16;

/// Fixed-capacity buffer of kernel events filled by [`Selector::poll`].
pub(crate) struct Events {
  buffer: Vec<libc::epoll_event>,
  len: usize,
}

impl Events {
  pub fn new() -> Events {
    // SAFETY: epoll_event is a plain-old-data C struct; all-zero is a
    // valid value.
    Events {
      buffer: vec![unsafe { std::mem::zeroed() }; EVENT_BUFFER_SIZE],
      len: 0,
    }
  }

  pub fn len(&self) -> usize {
    self.len
  }

  pub fn iter(&self) -> impl Iterator<Item = libc::epoll_event> + '_ {
    self.buffer[..self.len].iter().copied()
  }
}

/// The epoll instance plus the registry of watched sockets.
pub(crate) struct Selector {
  epoll: OwnedFd,
  sockets: HashMap<RawFd, Box<SocketData>>,
}

fn epoll_interest(mask: EventMask) -> u32 {
  let mut events = 0u32;
  if mask.contains(EventMask::READABLE) {
    events |= libc::EPOLLIN as u32;
  }
  if mask.contains(EventMask::WRITABLE) {
    events |= libc::EPOLLOUT as u32;
  }
  if mask.contains(EventMask::ERROR) {
    events |= libc::EPOLLERR as u32;
  }
  if mask.contains(EventMask::EOF) {
    events |= libc::EPOLLHUP as u32;
  }
  events
}

impl Selector {
  pub fn new() -> Result<Selector> {
    let epoll = syscall!(epoll_create1(libc::EPOLL_CLOEXEC))?;
    // SAFETY: epoll_create1 returned a fresh descriptor that nothing else
    // owns.
    let epoll = unsafe { OwnedFd::from_raw_fd(epoll) };
    Ok(Selector { epoll, sockets: HashMap::new() })
  }

  /// Inserts the socket into the registry and the kernel interest set.
  ///
  /// Returns a pointer to the registration record; it stays valid until
  /// [`Selector::unregister`] removes the entry.
  ///
  /// # Panics
  ///
  /// Registering the same descriptor twice is a programming error and
  /// panics.
  pub fn register(
    &mut self,
    socket: &Socket,
    interest: EventMask,
  ) -> Result<NonNull<SocketData>> {
    let handle = socket.as_raw_fd();

    let entry = match self.sockets.entry(handle) {
      Entry::Occupied(_) => {
        panic!("socket {handle} is already registered with this selector")
      }
      Entry::Vacant(vacant) => {
        vacant.insert(Box::new(SocketData::new(handle, interest)))
      }
    };
    let data = NonNull::from(&mut **entry);

    let mut event = libc::epoll_event {
      events: epoll_interest(interest),
      u64: data.as_ptr() as u64,
    };
    if let Err(err) = syscall!(epoll_ctl(
      self.epoll.as_raw_fd(),
      libc::EPOLL_CTL_ADD,
      handle,
      &mut event,
    )) {
      self.sockets.remove(&handle);
      return Err(err);
    }

    trace!("registered socket {handle} (interest {interest:?})");
    Ok(data)
  }

  /// Updates the kernel interest set for a registered socket. The syscall
  /// is skipped when the mask already matches.
  ///
  /// # Panics
  ///
  /// Panics if the descriptor is not registered.
  pub fn change_mask(
    &mut self,
    handle: RawFd,
    interest: EventMask,
  ) -> Result<()> {
    let data = self
      .sockets
      .get_mut(&handle)
      .unwrap_or_else(|| panic!("socket {handle} is not registered"));

    if data.last_event_mask == interest {
      return Ok(());
    }

    let mut event = libc::epoll_event {
      events: epoll_interest(interest),
      u64: (&mut **data as *mut SocketData) as u64,
    };
    syscall!(epoll_ctl(
      self.epoll.as_raw_fd(),
      libc::EPOLL_CTL_MOD,
      handle,
      &mut event,
    ))?;
    data.last_event_mask = interest;
    Ok(())
  }

  /// Removes the socket from the kernel interest set and drops its
  /// registration record. Pointers previously returned for this handle
  /// are invalid afterwards.
  pub fn unregister(&mut self, handle: RawFd) -> Result<()> {
    let removed = self.sockets.remove(&handle);
    assert!(removed.is_some(), "socket {handle} is not registered");

    trace!("unregistered socket {handle}");
    syscall!(epoll_ctl(
      self.epoll.as_raw_fd(),
      libc::EPOLL_CTL_DEL,
      handle,
      ptr::null_mut(),
    ))
    .map(drop)
  }

  /// Blocks up to `timeout` for readiness events, filling `events` with
  /// up to [`EVENT_BUFFER_SIZE`] of them. Interrupted waits are retried.
  pub fn poll(&self, events: &mut Events, timeout: Duration) -> Result<()> {
    let millis = timeout.as_millis();
    let millis = if millis > i32::MAX as u128 {
      i32::MAX
    } else {
      millis as i32
    };

    loop {
      match syscall!(epoll_wait(
        self.epoll.as_raw_fd(),
        events.buffer.as_mut_ptr(),
        events.buffer.len() as i32,
        millis,
      )) {
        Err(Error::Interrupted) => continue,
        Err(err) => return Err(err),
        Ok(count) => {
          events.len = count as usize;
          trace!("poll returned {count} event(s)");
          return Ok(());
        }
      }
    }
  }

  /// Decodes the readiness conditions carried by a kernel event.
  pub fn event_mask(event: &libc::epoll_event) -> EventMask {
    let mut mask = EventMask::NONE;
    if event.events & libc::EPOLLIN as u32 != 0 {
      mask |= EventMask::READABLE;
    }
    if event.events & libc::EPOLLOUT as u32 != 0 {
      mask |= EventMask::WRITABLE;
    }
    if event.events & libc::EPOLLERR as u32 != 0 {
      mask |= EventMask::ERROR;
    }
    if event.events & libc::EPOLLHUP as u32 != 0 {
      mask |= EventMask::EOF;
    }
    mask
  }

  /// Recovers the registration record embedded in a kernel event.
  pub fn user_data(event: &libc::epoll_event) -> NonNull<SocketData> {
    NonNull::new(event.u64 as *mut SocketData)
      .expect("kernel event carries a null registration pointer")
  }

  /// Registration record for a handle, when present.
  pub fn data_for(&mut self, handle: RawFd) -> Option<NonNull<SocketData>> {
    self.sockets.get_mut(&handle).map(|data| NonNull::from(&mut **data))
  }

  /// Whether `data` still points at a record owned by this registry.
  /// Guards dispatch against registrations that a completion handler
  /// removed earlier in the same tick.
  pub fn contains(&self, data: NonNull<SocketData>) -> bool {
    self.sockets.values().any(|record| ptr::eq(&**record, data.as_ptr()))
  }

  /// Whether any registered socket has queued operations.
  pub fn have_pending_operations(&self) -> bool {
    self.sockets.values().any(|data| !data.pending_operations.is_empty())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::addr::{ipv4, Ip, Transport};

  fn bound_udp_socket() -> Socket {
    let socket = Socket::new(Ip::V4, Transport::Udp).unwrap();
    socket.bind(0, ipv4::LOOPBACK).unwrap();
    socket
  }

  #[test]
  fn register_poll_unregister() {
    let mut selector = Selector::new().unwrap();
    let socket = bound_udp_socket();
    let handle = socket.as_raw_fd();

    selector.register(&socket, EventMask::READABLE).unwrap();
    assert!(selector.data_for(handle).is_some());

    // Nothing was sent, so a zero-timeout poll reports no events.
    let mut events = Events::new();
    selector.poll(&mut events, Duration::ZERO).unwrap();
    assert_eq!(events.len(), 0);

    selector.unregister(handle).unwrap();
    assert!(selector.data_for(handle).is_none());
  }

  #[test]
  fn readiness_reaches_the_registration_record() {
    let mut selector = Selector::new().unwrap();
    let receiver = bound_udp_socket();
    let data = selector.register(&receiver, EventMask::READABLE).unwrap();

    let sender = Socket::new(Ip::V4, Transport::Udp).unwrap();
    sender.send_to(b"ping", Some(receiver.local_endpoint())).unwrap();

    let mut events = Events::new();
    selector.poll(&mut events, Duration::from_secs(10)).unwrap();
    assert_eq!(events.len(), 1);

    let event = events.iter().next().unwrap();
    assert!(Selector::event_mask(&event).contains(EventMask::READABLE));
    assert_eq!(Selector::user_data(&event), data);

    selector.unregister(receiver.as_raw_fd()).unwrap();
  }

  #[test]
  fn change_mask_updates_the_recorded_interest() {
    let mut selector = Selector::new().unwrap();
    let socket = bound_udp_socket();
    let handle = socket.as_raw_fd();

    let data = selector.register(&socket, EventMask::READABLE).unwrap();
    selector.change_mask(handle, EventMask::WRITABLE).unwrap();
    // SAFETY: the registration is still present; no other reference to it
    // exists in this test.
    assert_eq!(
      unsafe { data.as_ref() }.last_event_mask,
      EventMask::WRITABLE
    );

    selector.unregister(handle).unwrap();
  }

  #[test]
  #[should_panic(expected = "already registered")]
  fn double_registration_panics() {
    let mut selector = Selector::new().unwrap();
    let socket = bound_udp_socket();
    selector.register(&socket, EventMask::READABLE).unwrap();
    let _ = selector.register(&socket, EventMask::READABLE);
  }
}
