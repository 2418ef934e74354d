//! Small foundation pieces shared by the rest of the crate.
//!
//! This has no dependency on any other module in the crate, matching
//! `base`'s role in the teacher toolchain.

mod intern;

pub use intern::{IStr, Interner};
