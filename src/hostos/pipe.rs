//! UDP pipes
//!
//! A pipe is a connected UDP socket with a background receiver. The
//! receiver drains the socket into a bounded queue; the guest reads
//! from the queue without blocking and gets EAGAIN when it is empty.
//! Writes send one datagram each. The receiver polls a stop flag
//! between socket timeouts, so dropping the pipe tears the thread
//! down shortly after.

use std::io;
use std::net::UdpSocket;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{sync_channel, Receiver, TrySendError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use log::{debug, warn};

/// Largest datagram a pipe will accept
const MAX_DATAGRAM: usize = 65536;

/// How often the receiver thread checks the stop flag
const RECEIVER_POLL: Duration = Duration::from_millis(200);

#[derive(Debug)]
pub struct UdpPipe {
    socket: UdpSocket,
    inbound: Receiver<Vec<u8>>,
    stop: Arc<AtomicBool>,
}

impl UdpPipe {
    /// Resolve and connect to a `host:port` endpoint, and start the
    /// background receiver.
    pub fn dial(address: &str, queue_capacity: usize) -> io::Result<Self> {
        let socket = UdpSocket::bind(("0.0.0.0", 0))?;
        socket.connect(address)?;

        let receiver_socket = socket.try_clone()?;
        receiver_socket.set_read_timeout(Some(RECEIVER_POLL))?;
        let stop = Arc::new(AtomicBool::new(false));
        let (sender, inbound) = sync_channel(queue_capacity);

        let receiver_stop = Arc::clone(&stop);
        thread::spawn(move || {
            let mut buffer = vec![0u8; MAX_DATAGRAM];
            while !receiver_stop.load(Ordering::Relaxed) {
                match receiver_socket.recv(&mut buffer) {
                    Ok(len) => {
                        let packet = buffer[..len].to_vec();
                        match sender.try_send(packet) {
                            Ok(()) => {}
                            Err(TrySendError::Full(_)) => {
                                warn!("pipe queue full, dropping {len} byte datagram")
                            }
                            // The pipe itself is gone
                            Err(TrySendError::Disconnected(_)) => break,
                        }
                    }
                    Err(e)
                        if e.kind() == io::ErrorKind::WouldBlock
                            || e.kind() == io::ErrorKind::TimedOut => {}
                    Err(e) => {
                        warn!("pipe receiver stopping: {e}");
                        break;
                    }
                }
            }
            debug!("pipe receiver stopped");
        });

        Ok(Self {
            socket,
            inbound,
            stop,
        })
    }

    /// Take the next queued datagram, if any. Never blocks.
    pub fn recv_packet(&self) -> Option<Vec<u8>> {
        self.inbound.try_recv().ok()
    }

    /// Send one datagram to the connected endpoint.
    pub fn send(&self, data: &[u8]) -> io::Result<usize> {
        self.socket.send(data)
    }
}

impl Drop for UdpPipe {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local_peer() -> (UdpSocket, String) {
        let peer = UdpSocket::bind("127.0.0.1:0").unwrap();
        let address = format!("127.0.0.1:{}", peer.local_addr().unwrap().port());
        (peer, address)
    }

    #[test]
    fn check_empty_pipe_has_no_packet() {
        let (_peer, address) = local_peer();
        let pipe = UdpPipe::dial(&address, 4).unwrap();
        assert_eq!(pipe.recv_packet(), None);
    }

    #[test]
    fn check_datagram_round_trip() {
        let (peer, address) = local_peer();
        peer.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
        let pipe = UdpPipe::dial(&address, 4).unwrap();

        pipe.send(b"ping").unwrap();
        let mut buffer = [0u8; 16];
        let (len, from) = peer.recv_from(&mut buffer).unwrap();
        assert_eq!(&buffer[..len], b"ping");

        peer.send_to(b"pong", from).unwrap();
        // The receiver thread needs a moment to queue the reply
        let mut reply = None;
        for _ in 0..50 {
            reply = pipe.recv_packet();
            if reply.is_some() {
                break;
            }
            thread::sleep(Duration::from_millis(20));
        }
        assert_eq!(reply.as_deref(), Some(b"pong".as_slice()));
    }
}
