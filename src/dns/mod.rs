//! Pluggable DNS resolution.
//!
//! The [`Resolve`] trait is the seam; [`GaiResolver`] is the default and
//! [`DnsResolverWithOverrides`] pins chosen host names to fixed addresses
//! (handy in tests).

mod gai;
mod resolve;

pub use gai::GaiResolver;
pub use resolve::{Addrs, DnsResolverWithOverrides, Name, Resolve, Resolving};
