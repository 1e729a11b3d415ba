//! Base types and error handling.
//!
//! - [`NetError`](neterror::NetError): network error codes modelled on
//!   Chromium's `net_error_list.h`
//! - [`IoResultExt`](context::IoResultExt): `io::Error` to `NetError` with context

pub mod context;
pub mod neterror;

#[cfg(test)]
mod tests;
