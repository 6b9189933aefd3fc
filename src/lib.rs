//! Backtraces for MIPS code without any unwind info.
//!
//! Given a stopped [`Cpu`](host::Cpu), [`get_stack_pcs`] recovers the call stack by pattern
//! matching function prologues (see [`walk::prologue`]). This is a heuristic: the result can be
//! short or contain garbage on hand written assembly or corrupted stacks, but it never loops
//! forever and never fails.
#![cfg_attr(not(test), no_std)]

extern crate alloc;

#[macro_use]
extern crate tracing;

pub mod arch;
pub mod config;
mod diag;
pub mod hooks;
pub mod host;
pub mod walk;

pub use config::{Limits, LimitsError};
pub use diag::Diagnostic;
pub use walk::prologue::{analyze_fn, PrologueInfo, ScanStop};
pub use walk::{get_stack_pcs, Backtrace, Walker};
