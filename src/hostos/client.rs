//! HostOS client
//!
//! Forwards requests to an out-of-process daemon over a local stream
//! connection, one framed request/response pair per call. Reads and
//! writes each carry the configured deadline; a timeout or any other
//! transport failure is logged and collapsed into the synthesised
//! failure response, so the guest sees a0 = -1 rather than a dead VM.

use std::net::{TcpStream, ToSocketAddrs};

use log::{debug, warn};

use super::wire::{read_frame, write_frame, HostRequest, HostResponse, WireError};
use super::{HostConfig, HostOs};

#[derive(Debug)]
pub struct HostOsClient {
    stream: TcpStream,
}

impl HostOsClient {
    pub fn connect(address: impl ToSocketAddrs, config: &HostConfig) -> std::io::Result<Self> {
        let stream = TcpStream::connect(address)?;
        stream.set_read_timeout(Some(config.call_deadline))?;
        stream.set_write_timeout(Some(config.call_deadline))?;
        stream.set_nodelay(true)?;
        debug!("connected to hostos daemon at {:?}", stream.peer_addr());
        Ok(Self { stream })
    }

    fn try_call(&mut self, request: &HostRequest) -> Result<HostResponse, WireError> {
        write_frame(&mut self.stream, &request.encode())?;
        let payload = read_frame(&mut self.stream)?;
        HostResponse::decode(&payload)
    }
}

impl HostOs for HostOsClient {
    fn call(&mut self, request: &HostRequest) -> HostResponse {
        match self.try_call(request) {
            Ok(response) => response,
            Err(e) => {
                warn!("syscall 0x{:02x} failed in transport: {e}", request.syscall_no());
                HostResponse::failed()
            }
        }
    }
}
