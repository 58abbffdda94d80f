/// Invokes a libc function, mapping the conventional `-1` failure return
/// into the library error taxonomy via `errno`.
macro_rules! syscall {
  ($fn:ident ( $($arg:expr),* $(,)? )) => {{
    #[allow(unused_unsafe)]
    // SAFETY: caller provides arguments that are valid for the named
    // libc function; every use site passes pointers derived from live
    // Rust objects with correct lengths.
    let res = unsafe { libc::$fn($($arg),*) };
    if res == -1 {
      Err($crate::error::Error::last_os())
    } else {
      Ok(res)
    }
  }};
}
