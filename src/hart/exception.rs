//! Exceptions that halt the stepper
//!
//! There is no trap machinery here: a faulting step leaves the
//! architectural state (pc included) untouched and surfaces the
//! reason to whoever is driving the step loop. Host-side I/O
//! failures are not exceptions; they are reported to the guest as
//! negative values in a0.

use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum Exception {
    /// Program counter out of range or not 4-byte aligned
    #[error("instruction fetch fault")]
    FetchFault,
    /// No instruction matches the fetched word
    #[error("illegal instruction")]
    IllegalInstruction,
    /// Load address out of range
    #[error("load fault")]
    LoadFault,
    /// Store address out of range
    #[error("store fault")]
    StoreFault,
    /// The guest executed ebreak
    #[error("breakpoint")]
    Break,
}
