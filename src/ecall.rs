//! Environment-call dispatch
//!
//! The syscall number sits in a7 and arguments in a0..a6; the result
//! goes back in a0. Print and draw are serviced inside the VM against
//! its own memory and sinks. The file and socket calls are marshalled
//! into host requests; their buffers are copied between guest memory
//! and the request/response payloads here, so the host never touches
//! guest memory. A syscall number outside the table puts -1 in a0 and
//! changes nothing else.

use log::debug;

use crate::hart::exception::Exception;
use crate::hart::{Frame, Hart};
use crate::hostos::{
    HostRequest, SYSCALL_CLOSE, SYSCALL_FAILED, SYSCALL_OPEN, SYSCALL_READ, SYSCALL_RESET,
    SYSCALL_SEEK, SYSCALL_SOCKET, SYSCALL_WRITE, STATUS_FAILED,
};
use crate::utils::{interpret_i32_as_unsigned, interpret_u32_as_signed};

// Built-in services
pub const SYSCALL_PRINT: u32 = 0x01;
pub const SYSCALL_DRAW: u32 = 0x02;

// Argument and result registers (RISC-V calling convention names)
pub const REG_A0: u8 = 10;
pub const REG_A1: u8 = 11;
pub const REG_A2: u8 = 12;
pub const REG_A7: u8 = 17;

impl Hart {
    /// Service the environment call encoded in the a-registers. Only
    /// print and draw can fault the VM (their buffers are VM memory
    /// reads); everything host-side folds into a negative a0.
    pub(crate) fn dispatch_ecall(&mut self) -> Result<(), Exception> {
        let syscall = self.registers.read(REG_A7);
        let a0 = self.registers.read(REG_A0);
        let a1 = self.registers.read(REG_A1);
        let a2 = self.registers.read(REG_A2);

        let result: i32 = match syscall {
            SYSCALL_PRINT => {
                let bytes = self
                    .memory
                    .read_range(a0, a1)
                    .map_err(|_| Exception::LoadFault)?;
                self.push_console(&bytes);
                0
            }
            SYSCALL_DRAW => {
                let data = self
                    .memory
                    .read_range(self.config.vram_base, self.config.vram_len)
                    .map_err(|_| Exception::LoadFault)?;
                self.push_frame(Frame::new(self.next_frame_seq, data));
                self.next_frame_seq += 1;
                0
            }
            SYSCALL_RESET => self.host_call(&HostRequest::Reset).status,
            SYSCALL_OPEN => match self.read_path(a0, a1) {
                Some(path) => {
                    self.host_call(&HostRequest::Open { path, flags: a2 }).status
                }
                None => STATUS_FAILED,
            },
            SYSCALL_CLOSE => {
                self.host_call(&HostRequest::Close {
                    fd: interpret_u32_as_signed(a0),
                })
                .status
            }
            SYSCALL_SEEK => {
                self.host_call(&HostRequest::Seek {
                    fd: interpret_u32_as_signed(a0),
                    offset: interpret_u32_as_signed(a1),
                    whence: interpret_u32_as_signed(a2),
                })
                .status
            }
            SYSCALL_READ => {
                let response = self.host_call(&HostRequest::Read {
                    fd: interpret_u32_as_signed(a0),
                    count: a2,
                });
                if response.status > 0 && self.memory.write_range(a1, &response.data).is_err() {
                    STATUS_FAILED
                } else {
                    response.status
                }
            }
            SYSCALL_WRITE => match self.memory.read_range(a1, a2) {
                Ok(data) => {
                    self.host_call(&HostRequest::Write {
                        fd: interpret_u32_as_signed(a0),
                        data,
                    })
                    .status
                }
                Err(_) => STATUS_FAILED,
            },
            SYSCALL_SOCKET => match self.memory.read_cstr(a0) {
                Ok(address) => self.host_call(&HostRequest::Socket { address }).status,
                Err(_) => STATUS_FAILED,
            },
            other => {
                debug!("no such syscall 0x{other:x} (dispatch error 0x{SYSCALL_FAILED:x})");
                STATUS_FAILED
            }
        };

        self.registers
            .write(REG_A0, interpret_i32_as_unsigned(result));
        Ok(())
    }

    /// Read an open path: a1 holds the length, or 0 for a
    /// NUL-terminated string at a0.
    fn read_path(&self, ptr: u32, len: u32) -> Option<Vec<u8>> {
        if len == 0 {
            self.memory.read_cstr(ptr).ok()
        } else {
            self.memory.read_range(ptr, len).ok()
        }
    }
}
