//! Single-threaded cooperative I/O dispatcher.
//!
//! Sockets are registered with a [`Reactor`], asynchronous operations are
//! queued per socket, and [`Reactor::run_once`] drives queued operations
//! forward whenever the platform selector reports readiness. Completion
//! handlers run inline on the dispatching thread and may enqueue further
//! operations through the `&mut Reactor` they receive.
//!
//! A reactor and every socket registered with it must stay on one thread.
//! Run one reactor per thread for parallelism; the lookup cache below is
//! keyed by reactor identity so several reactors on the same thread stay
//! correct.

mod selector;

use std::cell::Cell;
use std::os::fd::{AsRawFd, RawFd};
use std::ptr::NonNull;
use std::time::Duration;

use log::trace;

use crate::error::{Error, Result};
use crate::socket::{self, sockaddr::pending_error, Socket};
use selector::{EventMask, Events, Selector, SocketData};

/// Poll timeout for [`Reactor::run_once`]. Effectively "until something
/// happens"; the guard in `run_once` ensures we never park with an empty
/// queue.
const POLL_TIMEOUT: Duration = Duration::from_secs(60 * 60);

/// Completion callback: receives the dispatching reactor, the operation
/// outcome, and the operation's buffer back.
pub type Handler =
  Box<dyn FnOnce(&mut Reactor, std::result::Result<usize, Error>, Vec<u8>)>;

/// A queued asynchronous I/O operation.
///
/// The operation owns its buffer for its whole lifetime and hands it back
/// to the completion handler, so no borrow of user memory is held across
/// reactor ticks. `progress` counts the bytes transferred so far; an
/// operation completes when the buffer has been fully read into or fully
/// written out, or when a non-retryable condition arises.
pub enum Operation {
  Read { buffer: Vec<u8>, progress: usize, handler: Handler },
  Write { buffer: Vec<u8>, progress: usize, handler: Handler },
}

impl Operation {
  /// A read that completes once `buffer` (at its current length) is
  /// filled.
  pub fn read<F>(buffer: Vec<u8>, handler: F) -> Operation
  where
    F: FnOnce(&mut Reactor, std::result::Result<usize, Error>, Vec<u8>)
      + 'static,
  {
    Operation::Read { buffer, progress: 0, handler: Box::new(handler) }
  }

  /// A write that completes once all of `buffer` has been sent.
  pub fn write<F>(buffer: Vec<u8>, handler: F) -> Operation
  where
    F: FnOnce(&mut Reactor, std::result::Result<usize, Error>, Vec<u8>)
      + 'static,
  {
    Operation::Write { buffer, progress: 0, handler: Box::new(handler) }
  }

  /// The readiness condition this operation waits for.
  fn interest(&self) -> EventMask {
    match self {
      Operation::Read { .. } => EventMask::READABLE,
      Operation::Write { .. } => EventMask::WRITABLE,
    }
  }

  fn opcode(&self) -> &'static str {
    match self {
      Operation::Read { .. } => "read",
      Operation::Write { .. } => "write",
    }
  }

  /// Consumes the operation, invoking its handler with `result` and the
  /// buffer.
  fn complete(
    self,
    reactor: &mut Reactor,
    result: std::result::Result<usize, Error>,
  ) {
    let (handler, buffer) = match self {
      Operation::Read { buffer, handler, .. }
      | Operation::Write { buffer, handler, .. } => (handler, buffer),
    };
    handler(reactor, result, buffer);
  }
}

/// Last-touched registration, kept per thread.
///
/// `enqueue` is typically called for the socket that was just dispatched
/// (from inside its completion handler) or just registered; remembering
/// that registration skips the registry lookup on those paths. The cache
/// is only a shortcut: it is invalidated whenever its socket leaves the
/// registry or its reactor goes away, and a mismatch simply falls back to
/// the lookup. The reactor identity stored alongside keeps a thread that
/// hosts several reactors from mixing up their registries.
#[derive(Clone, Copy)]
struct QueueCache {
  data: NonNull<SocketData>,
  handle: RawFd,
  reactor: usize,
}

thread_local! {
  static QUEUE_CACHE: Cell<Option<QueueCache>> = const { Cell::new(None) };
}

/// The event dispatcher. See the module docs for the threading contract.
pub struct Reactor {
  selector: Selector,
}

impl Reactor {
  pub fn new() -> Result<Reactor> {
    Ok(Reactor { selector: Selector::new()? })
  }

  /// This reactor's identity for the per-thread cache. Stable for as long
  /// as the reactor does not move; moving a reactor only costs cache
  /// misses, never correctness.
  fn id(&self) -> usize {
    self as *const Reactor as usize
  }

  fn cache_store(&self, data: NonNull<SocketData>, handle: RawFd) {
    let entry = QueueCache { data, handle, reactor: self.id() };
    QUEUE_CACHE.with(|cache| cache.set(Some(entry)));
  }

  fn cache_lookup(&self, handle: RawFd) -> Option<NonNull<SocketData>> {
    QUEUE_CACHE.with(|cache| match cache.get() {
      Some(entry) if entry.handle == handle && entry.reactor == self.id() => {
        Some(entry.data)
      }
      _ => None,
    })
  }

  fn cache_invalidate(&self, handle: Option<RawFd>) {
    QUEUE_CACHE.with(|cache| {
      if let Some(entry) = cache.get() {
        let handle_matches = handle.map_or(true, |h| entry.handle == h);
        if handle_matches && entry.reactor == self.id() {
          cache.set(None);
        }
      }
    });
  }

  /// Registers a socket, watching it for readability by default.
  pub fn add_socket(&mut self, socket: &Socket) -> Result<()> {
    let handle = socket.as_raw_fd();
    let data = self.selector.register(socket, EventMask::READABLE)?;
    self.cache_store(data, handle);
    Ok(())
  }

  /// Unregisters a socket. Its queued operations are dropped without
  /// running their handlers; pointers into its registration die with it.
  pub fn remove_socket(&mut self, socket: &Socket) -> Result<()> {
    let handle = socket.as_raw_fd();
    self.cache_invalidate(Some(handle));
    self.selector.unregister(handle)
  }

  /// Appends an operation to the socket's FIFO.
  ///
  /// # Panics
  ///
  /// Panics if the socket was never added to this reactor.
  pub fn enqueue(&mut self, socket: &Socket, operation: Operation) {
    let handle = socket.as_raw_fd();
    trace!("queueing {} operation for socket {handle}", operation.opcode());

    let mut data = match self.cache_lookup(handle) {
      Some(data) => data,
      None => self.selector.data_for(handle).unwrap_or_else(|| {
        panic!("socket {handle} is not registered with this reactor")
      }),
    };
    // SAFETY: the cache entry or the registry lookup above proves the
    // registration is live, and both are cleared when it is removed.
    unsafe { data.as_mut() }.pending_operations.push_back(operation);
  }

  /// Declared for interface completeness; operations cannot currently be
  /// withdrawn once queued.
  pub fn cancel_oldest_operation(&mut self, _socket: &Socket) {}

  /// Declared for interface completeness; operations cannot currently be
  /// withdrawn once queued.
  pub fn cancel_all_operations(&mut self, _socket: &Socket) {}

  /// One dispatch iteration: poll the selector once and drive the queued
  /// operations of every socket it reports ready.
  ///
  /// Returns immediately when no registered socket has queued work. On an
  /// error event, the socket's pending error is fetched and every queued
  /// handler is invoked with it, after which the call returns without
  /// touching the remaining events of this tick.
  pub fn run_once(&mut self) -> Result<()> {
    if !self.selector.have_pending_operations() {
      return Ok(());
    }

    let mut events = Events::new();
    self.selector.poll(&mut events, POLL_TIMEOUT)?;
    trace!("dispatching {} event(s)", events.len());

    for event in events.iter() {
      let codes = Selector::event_mask(&event);
      if codes.is_empty() {
        continue;
      }
      let data = Selector::user_data(&event);

      // A handler run for an earlier event may have unregistered this
      // socket; its registration pointer would be dangling.
      if !self.selector.contains(data) {
        continue;
      }
      // SAFETY: the registry still owns this registration, so the
      // payload pointer is valid.
      let handle = unsafe { data.as_ref() }.handle;

      self.cache_store(data, handle);

      if codes.contains(EventMask::ERROR) {
        let condition = pending_error(handle).unwrap_or(Error::Unknown);
        trace!("socket {handle} raised {condition}; draining its queue");
        self.drain_with_error(data, handle, condition);
        return Ok(());
      }

      // SAFETY: as above; nothing has touched the registry since.
      if unsafe { data.as_ref() }.pending_operations.is_empty() {
        continue;
      }

      if codes.contains(EventMask::READABLE) {
        self.process_reads(data, handle);
      } else if codes.contains(EventMask::WRITABLE) {
        self.process_writes(data, handle);
      }

      // Re-arm for whatever the queue now waits on. The selector skips
      // the syscall when the mask did not change.
      if self.registration_of(handle) == Some(data) {
        // SAFETY: the registry check above proves the record is alive.
        let next = unsafe { data.as_ref() }
          .pending_operations
          .front()
          .map(Operation::interest);
        if let Some(interest) = next {
          self.selector.change_mask(handle, interest)?;
        }
      }
    }

    Ok(())
  }

  /// Current registration pointer for `handle`, if it is still in the
  /// registry. Used to detect handlers removing sockets mid-dispatch.
  fn registration_of(&mut self, handle: RawFd) -> Option<NonNull<SocketData>> {
    self.selector.data_for(handle)
  }

  fn drain_with_error(
    &mut self,
    mut data: NonNull<SocketData>,
    handle: RawFd,
    condition: Error,
  ) {
    loop {
      // SAFETY: the registration was verified live on entry and re-checked
      // after every handler below.
      let record = unsafe { data.as_mut() };
      let Some(operation) = record.pending_operations.pop_front() else {
        break;
      };
      operation.complete(self, Err(condition));
      if self.registration_of(handle) != Some(data) {
        break;
      }
    }
  }

  /// Runs queued reads while the FIFO head is a read operation.
  ///
  /// Stops on `TryAgain` or on a short read: after the kernel hands back
  /// less than requested, one more call is guaranteed to block, so the
  /// retry is left until the next readiness notification. The incomplete
  /// operation stays at the head of the queue.
  fn process_reads(&mut self, mut data: NonNull<SocketData>, handle: RawFd) {
    loop {
      // SAFETY: the registration was verified live on entry and re-checked
      // after every handler below; the borrow ends before any handler
      // runs.
      let record = unsafe { data.as_mut() };
      let Some(Operation::Read { buffer, progress, .. }) =
        record.pending_operations.front_mut()
      else {
        break;
      };

      let wanted = buffer.len() - *progress;
      match socket::nonblocking_read(handle, &mut buffer[*progress..]) {
        Err(Error::TryAgain) => break,
        Err(condition) => {
          let operation = record.pending_operations.pop_front();
          let Some(operation) = operation else { break };
          operation.complete(self, Err(condition));
          if self.registration_of(handle) != Some(data) {
            break;
          }
        }
        Ok(received) => {
          *progress += received;
          if received < wanted {
            break;
          }
          let done = *progress;
          let operation = record.pending_operations.pop_front();
          let Some(operation) = operation else { break };
          operation.complete(self, Ok(done));
          if self.registration_of(handle) != Some(data) {
            break;
          }
        }
      }
    }
  }

  /// Runs queued writes while the FIFO head is a write operation. The
  /// stop conditions mirror [`Reactor::process_reads`]: a short write
  /// means the kernel buffer is full.
  fn process_writes(&mut self, mut data: NonNull<SocketData>, handle: RawFd) {
    loop {
      // SAFETY: the registration was verified live on entry and re-checked
      // after every handler below; the borrow ends before any handler
      // runs.
      let record = unsafe { data.as_mut() };
      let Some(Operation::Write { buffer, progress, .. }) =
        record.pending_operations.front_mut()
      else {
        break;
      };

      let wanted = buffer.len() - *progress;
      match socket::nonblocking_write(handle, &buffer[*progress..]) {
        Err(Error::TryAgain) => break,
        Err(condition) => {
          let operation = record.pending_operations.pop_front();
          let Some(operation) = operation else { break };
          operation.complete(self, Err(condition));
          if self.registration_of(handle) != Some(data) {
            break;
          }
        }
        Ok(sent) => {
          *progress += sent;
          if sent < wanted {
            break;
          }
          let done = *progress;
          let operation = record.pending_operations.pop_front();
          let Some(operation) = operation else { break };
          operation.complete(self, Ok(done));
          if self.registration_of(handle) != Some(data) {
            break;
          }
        }
      }
    }
  }
}

impl Drop for Reactor {
  fn drop(&mut self) {
    // A stale cache entry must not outlive its reactor: another reactor
    // could later occupy the same address and satisfy the identity check.
    self.cache_invalidate(None);
  }
}
