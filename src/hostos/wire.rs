//! Request/response codec
//!
//! A request is `u32 syscall_no` followed by fixed-width
//! little-endian fields and/or raw bytes; a response is `i32 status`
//! followed by optional bytes. On a stream transport each payload is
//! framed by a little-endian `u32` length prefix. Paths and socket
//! addresses travel as NUL-terminated byte strings.

use std::io::{Read, Write};

use thiserror::Error;

use super::{
    SYSCALL_CLOSE, SYSCALL_OPEN, SYSCALL_READ, SYSCALL_RESET, SYSCALL_SEEK, SYSCALL_SOCKET,
    SYSCALL_WRITE, STATUS_FAILED,
};

/// Frames above this size are corrupt, not merely large
pub const MAX_FRAME_LEN: u32 = 1 << 20;

#[derive(Debug, Error)]
pub enum WireError {
    #[error("payload truncated: wanted {wanted} more bytes")]
    Truncated { wanted: usize },
    #[error("unknown syscall number 0x{0:x}")]
    UnknownSyscall(u32),
    #[error("string field is missing its NUL terminator")]
    MissingNul,
    #[error("frame of {0} bytes exceeds the {MAX_FRAME_LEN} byte limit")]
    FrameTooLarge(u32),
    #[error("transport error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostRequest {
    Reset,
    Open { path: Vec<u8>, flags: u32 },
    Close { fd: i32 },
    Seek { fd: i32, offset: i32, whence: i32 },
    Read { fd: i32, count: u32 },
    Write { fd: i32, data: Vec<u8> },
    Socket { address: Vec<u8> },
}

impl HostRequest {
    pub fn syscall_no(&self) -> u32 {
        match self {
            Self::Reset => SYSCALL_RESET,
            Self::Open { .. } => SYSCALL_OPEN,
            Self::Close { .. } => SYSCALL_CLOSE,
            Self::Seek { .. } => SYSCALL_SEEK,
            Self::Read { .. } => SYSCALL_READ,
            Self::Write { .. } => SYSCALL_WRITE,
            Self::Socket { .. } => SYSCALL_SOCKET,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut payload = self.syscall_no().to_le_bytes().to_vec();
        match self {
            Self::Reset => {}
            Self::Open { path, flags } => {
                payload.extend_from_slice(path);
                payload.push(0);
                payload.extend_from_slice(&flags.to_le_bytes());
            }
            Self::Close { fd } => payload.extend_from_slice(&fd.to_le_bytes()),
            Self::Seek { fd, offset, whence } => {
                payload.extend_from_slice(&fd.to_le_bytes());
                payload.extend_from_slice(&offset.to_le_bytes());
                payload.extend_from_slice(&whence.to_le_bytes());
            }
            Self::Read { fd, count } => {
                payload.extend_from_slice(&fd.to_le_bytes());
                payload.extend_from_slice(&count.to_le_bytes());
            }
            Self::Write { fd, data } => {
                payload.extend_from_slice(&fd.to_le_bytes());
                payload.extend_from_slice(data);
            }
            Self::Socket { address } => {
                payload.extend_from_slice(address);
                payload.push(0);
            }
        }
        payload
    }

    pub fn decode(payload: &[u8]) -> Result<Self, WireError> {
        let mut cursor = Cursor::new(payload);
        let syscall_no = cursor.take_u32()?;
        let request = match syscall_no {
            SYSCALL_RESET => Self::Reset,
            SYSCALL_OPEN => {
                let path = cursor.take_cstr()?;
                let flags = cursor.take_u32()?;
                Self::Open { path, flags }
            }
            SYSCALL_CLOSE => Self::Close {
                fd: cursor.take_i32()?,
            },
            SYSCALL_SEEK => Self::Seek {
                fd: cursor.take_i32()?,
                offset: cursor.take_i32()?,
                whence: cursor.take_i32()?,
            },
            SYSCALL_READ => Self::Read {
                fd: cursor.take_i32()?,
                count: cursor.take_u32()?,
            },
            SYSCALL_WRITE => Self::Write {
                fd: cursor.take_i32()?,
                data: cursor.take_rest(),
            },
            SYSCALL_SOCKET => Self::Socket {
                address: cursor.take_cstr()?,
            },
            other => return Err(WireError::UnknownSyscall(other)),
        };
        Ok(request)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostResponse {
    pub status: i32,
    pub data: Vec<u8>,
}

impl HostResponse {
    pub fn ok(status: i32) -> Self {
        Self {
            status,
            data: Vec::new(),
        }
    }

    pub fn with_data(status: i32, data: Vec<u8>) -> Self {
        Self { status, data }
    }

    /// The synthesised failure every transport or dispatch error
    /// collapses to; the guest sees a0 = -1.
    pub fn failed() -> Self {
        Self::ok(STATUS_FAILED)
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut payload = self.status.to_le_bytes().to_vec();
        payload.extend_from_slice(&self.data);
        payload
    }

    pub fn decode(payload: &[u8]) -> Result<Self, WireError> {
        let mut cursor = Cursor::new(payload);
        let status = cursor.take_i32()?;
        Ok(Self {
            status,
            data: cursor.take_rest(),
        })
    }
}

/// Write one length-prefixed payload to the transport
pub fn write_frame(writer: &mut impl Write, payload: &[u8]) -> Result<(), WireError> {
    let len = u32::try_from(payload.len()).map_err(|_| WireError::FrameTooLarge(u32::MAX))?;
    if len > MAX_FRAME_LEN {
        return Err(WireError::FrameTooLarge(len));
    }
    writer.write_all(&len.to_le_bytes())?;
    writer.write_all(payload)?;
    writer.flush()?;
    Ok(())
}

/// Read one length-prefixed payload from the transport
pub fn read_frame(reader: &mut impl Read) -> Result<Vec<u8>, WireError> {
    let mut len_bytes = [0u8; 4];
    reader.read_exact(&mut len_bytes)?;
    let len = u32::from_le_bytes(len_bytes);
    if len > MAX_FRAME_LEN {
        return Err(WireError::FrameTooLarge(len));
    }
    let mut payload = vec![0u8; len as usize];
    reader.read_exact(&mut payload)?;
    Ok(payload)
}

struct Cursor<'a> {
    bytes: &'a [u8],
}

impl<'a> Cursor<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N], WireError> {
        if self.bytes.len() < N {
            return Err(WireError::Truncated {
                wanted: N - self.bytes.len(),
            });
        }
        let (head, rest) = self.bytes.split_at(N);
        self.bytes = rest;
        Ok(head.try_into().expect("split_at returns exactly N bytes"))
    }

    fn take_u32(&mut self) -> Result<u32, WireError> {
        Ok(u32::from_le_bytes(self.take_array()?))
    }

    fn take_i32(&mut self) -> Result<i32, WireError> {
        Ok(i32::from_le_bytes(self.take_array()?))
    }

    fn take_cstr(&mut self) -> Result<Vec<u8>, WireError> {
        let nul = self
            .bytes
            .iter()
            .position(|byte| *byte == 0)
            .ok_or(WireError::MissingNul)?;
        let string = self.bytes[..nul].to_vec();
        self.bytes = &self.bytes[nul + 1..];
        Ok(string)
    }

    fn take_rest(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.bytes).to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(request: HostRequest) {
        let decoded = HostRequest::decode(&request.encode()).unwrap();
        assert_eq!(decoded, request);
    }

    #[test]
    fn check_request_round_trips() {
        round_trip(HostRequest::Reset);
        round_trip(HostRequest::Open {
            path: b"/tmp/data.bin".to_vec(),
            flags: 0o102,
        });
        round_trip(HostRequest::Close { fd: 3 });
        round_trip(HostRequest::Seek {
            fd: 3,
            offset: -8,
            whence: 2,
        });
        round_trip(HostRequest::Read { fd: 0, count: 128 });
        round_trip(HostRequest::Write {
            fd: 4,
            data: b"datagram".to_vec(),
        });
        round_trip(HostRequest::Socket {
            address: b"localhost:9000".to_vec(),
        });
    }

    #[test]
    fn check_request_layout() {
        let encoded = HostRequest::Seek {
            fd: 3,
            offset: -8,
            whence: 2,
        }
        .encode();
        assert_eq!(
            encoded,
            [
                0x0c, 0, 0, 0, // syscall number
                3, 0, 0, 0, // fd
                0xf8, 0xff, 0xff, 0xff, // offset
                2, 0, 0, 0, // whence
            ]
        );
    }

    #[test]
    fn check_open_carries_nul_terminated_path() {
        let encoded = HostRequest::Open {
            path: b"a".to_vec(),
            flags: 1,
        }
        .encode();
        assert_eq!(encoded, [0x0a, 0, 0, 0, b'a', 0, 1, 0, 0, 0]);
    }

    #[test]
    fn check_response_round_trip() {
        let response = HostResponse::with_data(11, b"hello world".to_vec());
        let decoded = HostResponse::decode(&response.encode()).unwrap();
        assert_eq!(decoded, response);
        assert_eq!(decoded.status, 11);
    }

    #[test]
    fn check_negative_status_encoding() {
        let encoded = HostResponse::failed().encode();
        assert_eq!(encoded, [0xff, 0xff, 0xff, 0xff]);
    }

    #[test]
    fn check_truncated_request_is_error() {
        assert!(matches!(
            HostRequest::decode(&[0x0c, 0, 0, 0, 3]),
            Err(WireError::Truncated { .. })
        ));
    }

    #[test]
    fn check_unknown_syscall_is_error() {
        assert!(matches!(
            HostRequest::decode(&0xdead_u32.to_le_bytes()),
            Err(WireError::UnknownSyscall(0xdead))
        ));
    }

    #[test]
    fn check_missing_nul_is_error() {
        let mut payload = SYSCALL_SOCKET.to_le_bytes().to_vec();
        payload.extend_from_slice(b"localhost:9000");
        assert!(matches!(
            HostRequest::decode(&payload),
            Err(WireError::MissingNul)
        ));
    }

    #[test]
    fn check_frame_round_trip() {
        let mut buffer = Vec::new();
        write_frame(&mut buffer, b"payload").unwrap();
        assert_eq!(buffer[..4], [7, 0, 0, 0]);
        let payload = read_frame(&mut buffer.as_slice()).unwrap();
        assert_eq!(payload, b"payload");
    }

    #[test]
    fn check_oversized_frame_is_error() {
        let mut buffer = (MAX_FRAME_LEN + 1).to_le_bytes().to_vec();
        buffer.resize(16, 0);
        assert!(matches!(
            read_frame(&mut buffer.as_slice()),
            Err(WireError::FrameTooLarge(_))
        ));
    }

    #[test]
    fn check_truncated_frame_is_error() {
        let mut buffer = Vec::new();
        write_frame(&mut buffer, b"payload").unwrap();
        buffer.truncate(6);
        assert!(matches!(
            read_frame(&mut buffer.as_slice()),
            Err(WireError::Io(_))
        ));
    }
}
