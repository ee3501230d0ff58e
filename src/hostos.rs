//! Host services bridge
//!
//! The guest reaches host files and UDP endpoints through
//! environment calls. The calls are marshalled into a small
//! request/response protocol (wire), executed against a descriptor
//! table (server), and optionally carried over a local stream
//! transport (client) to an out-of-process daemon. The transport is
//! behind the [`HostOs`] trait, so the server can equally be driven
//! in-process.

use std::time::Duration;

pub mod client;
pub mod pipe;
pub mod server;
pub mod wire;

pub use wire::{HostRequest, HostResponse};

// Syscall numbers serviced by the bridge
pub const SYSCALL_RESET: u32 = 0x00;
pub const SYSCALL_OPEN: u32 = 0x0a;
pub const SYSCALL_CLOSE: u32 = 0x0b;
pub const SYSCALL_SEEK: u32 = 0x0c;
pub const SYSCALL_READ: u32 = 0x0d;
pub const SYSCALL_WRITE: u32 = 0x0e;
pub const SYSCALL_SOCKET: u32 = 0x0f;

/// Marks a synthesised failure response (no such syscall, or the
/// transport failed before a real response arrived)
pub const SYSCALL_FAILED: u32 = 0xdead;

pub const STATUS_OK: i32 = 0;
pub const STATUS_FAILED: i32 = -1;
/// Non-fatal "no data available" for non-blocking pipe reads
pub const STATUS_EAGAIN: i32 = -64;

// Open flags (Linux numeric convention)
pub const OPEN_RDONLY: u32 = 0;
pub const OPEN_WRONLY: u32 = 1;
pub const OPEN_RDWR: u32 = 2;
pub const OPEN_ACCMODE: u32 = 3;
pub const OPEN_CREAT: u32 = 0o100;
pub const OPEN_EXCL: u32 = 0o200;
pub const OPEN_TRUNC: u32 = 0o1000;
pub const OPEN_APPEND: u32 = 0o2000;

// Seek whence values
pub const SEEK_SET: i32 = 0;
pub const SEEK_CUR: i32 = 1;
pub const SEEK_END: i32 = 2;

/// Something that can service host requests: the in-process server,
/// or a client forwarding to an out-of-process daemon.
pub trait HostOs {
    /// Execute one request. Never fails at this level: any error is
    /// folded into a response with a negative status, so the guest
    /// always gets a value in a0.
    fn call(&mut self, request: &HostRequest) -> HostResponse;
}

#[derive(Debug, Clone)]
pub struct HostConfig {
    /// Per-call transport deadline for both reads and writes
    pub call_deadline: Duration,
    /// Inbound datagrams buffered per UDP pipe
    pub pipe_queue_capacity: usize,
    /// First fd issued by the server (0-2 are reserved)
    pub descriptor_start: i32,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            call_deadline: Duration::from_millis(5000),
            pipe_queue_capacity: 32,
            descriptor_start: 3,
        }
    }
}
