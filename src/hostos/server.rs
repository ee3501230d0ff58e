//! HostOS server
//!
//! Owns the descriptor table and executes requests against it. The
//! executor is plain state-in, response-out, so it can be driven
//! in-process by the VM or wrapped in the framed stream transport by
//! the daemon. Host-side errors are folded into negative status
//! codes; nothing here takes the process down on a bad request.

use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::{Read, Seek, SeekFrom, Write};
use std::net::{TcpListener, TcpStream};

use log::{debug, warn};

use super::pipe::UdpPipe;
use super::wire::{read_frame, write_frame, HostRequest, HostResponse, WireError};
use super::{
    HostConfig, HostOs, OPEN_ACCMODE, OPEN_APPEND, OPEN_CREAT, OPEN_EXCL, OPEN_RDONLY, OPEN_RDWR,
    OPEN_TRUNC, OPEN_WRONLY, SEEK_CUR, SEEK_END, SEEK_SET, STATUS_EAGAIN, STATUS_FAILED, STATUS_OK,
};

#[derive(Debug)]
enum Descriptor {
    /// Pre-populated at fd 0
    Stdin,
    File(std::fs::File),
    Pipe(UdpPipe),
}

#[derive(Debug)]
pub struct HostOsServer {
    config: HostConfig,
    descriptors: HashMap<i32, Descriptor>,
    next_fd: i32,
}

impl HostOsServer {
    pub fn new(config: HostConfig) -> Self {
        let mut server = Self {
            config,
            descriptors: HashMap::new(),
            next_fd: 0,
        };
        server.reset();
        server
    }

    /// Drop every descriptor and restart fd allocation. Safe to call
    /// any number of times.
    pub fn reset(&mut self) {
        self.descriptors.clear();
        self.descriptors.insert(0, Descriptor::Stdin);
        self.next_fd = self.config.descriptor_start;
    }

    pub fn open_descriptors(&self) -> usize {
        self.descriptors.len()
    }

    fn allocate_fd(&mut self) -> i32 {
        let fd = self.next_fd;
        self.next_fd += 1;
        fd
    }

    /// Execute one request against the descriptor table.
    pub fn execute(&mut self, request: &HostRequest) -> HostResponse {
        let response = match request {
            HostRequest::Reset => {
                self.reset();
                HostResponse::ok(STATUS_OK)
            }
            HostRequest::Open { path, flags } => self.exec_open(path, *flags),
            HostRequest::Close { fd } => self.exec_close(*fd),
            HostRequest::Seek { fd, offset, whence } => self.exec_seek(*fd, *offset, *whence),
            HostRequest::Read { fd, count } => self.exec_read(*fd, *count),
            HostRequest::Write { fd, data } => self.exec_write(*fd, data),
            HostRequest::Socket { address } => self.exec_socket(address),
        };
        debug!(
            "syscall 0x{:02x} -> status {}",
            request.syscall_no(),
            response.status
        );
        response
    }

    fn exec_open(&mut self, path: &[u8], flags: u32) -> HostResponse {
        let Ok(path) = std::str::from_utf8(path) else {
            warn!("open: path is not valid utf-8");
            return HostResponse::failed();
        };
        let mut options = OpenOptions::new();
        match flags & OPEN_ACCMODE {
            OPEN_RDONLY => options.read(true),
            OPEN_WRONLY => options.write(true),
            OPEN_RDWR => options.read(true).write(true),
            _ => {
                warn!("open: bad access mode in flags 0o{flags:o}");
                return HostResponse::failed();
            }
        };
        options
            .create(flags & OPEN_CREAT != 0)
            .create_new(flags & OPEN_EXCL != 0)
            .truncate(flags & OPEN_TRUNC != 0)
            .append(flags & OPEN_APPEND != 0);
        match options.open(path) {
            Ok(file) => {
                let fd = self.allocate_fd();
                self.descriptors.insert(fd, Descriptor::File(file));
                HostResponse::ok(fd)
            }
            Err(e) => {
                warn!("open {path:?} failed: {e}");
                HostResponse::failed()
            }
        }
    }

    fn exec_close(&mut self, fd: i32) -> HostResponse {
        match self.descriptors.remove(&fd) {
            Some(_) => HostResponse::ok(STATUS_OK),
            None => HostResponse::failed(),
        }
    }

    fn exec_seek(&mut self, fd: i32, offset: i32, whence: i32) -> HostResponse {
        let Some(Descriptor::File(file)) = self.descriptors.get_mut(&fd) else {
            return HostResponse::failed();
        };
        let seek_from = match whence {
            SEEK_SET if offset >= 0 => SeekFrom::Start(offset as u64),
            SEEK_CUR => SeekFrom::Current(offset.into()),
            SEEK_END => SeekFrom::End(offset.into()),
            _ => return HostResponse::failed(),
        };
        match file.seek(seek_from) {
            Ok(position) => match i32::try_from(position) {
                Ok(position) => HostResponse::ok(position),
                Err(_) => HostResponse::failed(),
            },
            Err(e) => {
                warn!("seek on fd {fd} failed: {e}");
                HostResponse::failed()
            }
        }
    }

    fn exec_read(&mut self, fd: i32, count: u32) -> HostResponse {
        match self.descriptors.get_mut(&fd) {
            Some(Descriptor::Stdin) => {
                let mut buffer = vec![0u8; count as usize];
                match std::io::stdin().lock().read(&mut buffer) {
                    Ok(len) => {
                        buffer.truncate(len);
                        HostResponse::with_data(len as i32, buffer)
                    }
                    Err(e) => {
                        warn!("read from stdin failed: {e}");
                        HostResponse::failed()
                    }
                }
            }
            Some(Descriptor::File(file)) => {
                let mut buffer = vec![0u8; count as usize];
                match file.read(&mut buffer) {
                    Ok(len) => {
                        buffer.truncate(len);
                        HostResponse::with_data(len as i32, buffer)
                    }
                    Err(e) => {
                        warn!("read from fd {fd} failed: {e}");
                        HostResponse::failed()
                    }
                }
            }
            Some(Descriptor::Pipe(pipe)) => match pipe.recv_packet() {
                Some(mut packet) => {
                    packet.truncate(count as usize);
                    HostResponse::with_data(packet.len() as i32, packet)
                }
                None => HostResponse::ok(STATUS_EAGAIN),
            },
            None => HostResponse::failed(),
        }
    }

    fn exec_write(&mut self, fd: i32, data: &[u8]) -> HostResponse {
        match self.descriptors.get_mut(&fd) {
            Some(Descriptor::File(file)) => match file.write(data) {
                Ok(len) => HostResponse::ok(len as i32),
                Err(e) => {
                    warn!("write to fd {fd} failed: {e}");
                    HostResponse::failed()
                }
            },
            Some(Descriptor::Pipe(pipe)) => match pipe.send(data) {
                Ok(len) => HostResponse::ok(len as i32),
                Err(e) => {
                    warn!("send on fd {fd} failed: {e}");
                    HostResponse::failed()
                }
            },
            Some(Descriptor::Stdin) | None => HostResponse::failed(),
        }
    }

    fn exec_socket(&mut self, address: &[u8]) -> HostResponse {
        let Ok(address) = std::str::from_utf8(address) else {
            warn!("socket: address is not valid utf-8");
            return HostResponse::failed();
        };
        match UdpPipe::dial(address, self.config.pipe_queue_capacity) {
            Ok(pipe) => {
                let fd = self.allocate_fd();
                self.descriptors.insert(fd, Descriptor::Pipe(pipe));
                HostResponse::ok(fd)
            }
            Err(e) => {
                warn!("socket {address:?} failed: {e}");
                HostResponse::failed()
            }
        }
    }

    /// Accept connections and service framed requests until the
    /// listener fails. One bad frame drops its connection, not the
    /// daemon.
    pub fn serve(&mut self, listener: &TcpListener) -> std::io::Result<()> {
        for stream in listener.incoming() {
            match stream {
                Ok(stream) => {
                    if let Err(e) = self.serve_connection(stream) {
                        warn!("connection closed: {e}");
                    }
                }
                Err(e) => warn!("accept failed: {e}"),
            }
        }
        Ok(())
    }

    fn serve_connection(&mut self, mut stream: TcpStream) -> Result<(), WireError> {
        debug!("client connected from {:?}", stream.peer_addr());
        loop {
            let payload = match read_frame(&mut stream) {
                Ok(payload) => payload,
                // Clean disconnect between frames
                Err(WireError::Io(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    return Ok(())
                }
                Err(e) => return Err(e),
            };
            let response = match HostRequest::decode(&payload) {
                Ok(request) => self.execute(&request),
                Err(e) => {
                    warn!("undecodable request: {e}");
                    HostResponse::failed()
                }
            };
            write_frame(&mut stream, &response.encode())?;
        }
    }
}

impl HostOs for HostOsServer {
    fn call(&mut self, request: &HostRequest) -> HostResponse {
        self.execute(request)
    }
}

impl Default for HostOsServer {
    fn default() -> Self {
        Self::new(HostConfig::default())
    }
}
