//! Operator subcommands of the `tcoguard` binary.

pub mod info;
pub mod reset;
