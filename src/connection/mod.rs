//! Agent link to the simulation server
//!
//! One [`Connection`] per agent: a blocking TCP stream, a reusable receive buffer
//! and the queue of commands committed during the current cycle.
//!
//! # Cycle
//!
//! ```text
//! commit(...) x N  ──►  send()  ──►  drain_available()  ──►  parse / update
//!                        │
//!                        └─ "(syn)" appended so the server can advance in sync mode
//! ```
//!
//! Transport failures are fatal by contract: a mid-match disconnect cannot be
//! recovered without restarting the simulation state, so every socket error is
//! returned as a fatal [`Error`] and bubbles up to `main`.

pub mod bootstrap;
pub mod frame;
pub mod monitor;

pub use bootstrap::{handshake, LockstepPeer, SYNC_ROUNDS};
pub use frame::{RawFrame, MAX_FRAME_SIZE};
pub use monitor::MonitorHandle;

use crate::error::{Error, Result};
use std::io::{ErrorKind, Write};
use std::net::TcpStream;
use std::thread;
use std::time::Duration;

/// Bare synchronization token
pub const SYNC_COMMAND: &[u8] = b"(syn)";

/// Longest payload the server relays for `say`
pub const MAX_ANNOUNCEMENT_LEN: usize = 20;

/// Back-off between refused connection attempts
const CONNECT_RETRY_INTERVAL: Duration = Duration::from_secs(1);

/// TCP link between one agent and the simulation server
pub struct Connection {
    stream: TcpStream,
    /// Commands committed this cycle, sent together by [`Connection::send`]
    send_queue: Vec<u8>,
    /// Reusable receive buffer (avoids allocation per frame)
    rcv_buffer: Vec<u8>,
    addr: String,
}

impl Connection {
    /// Connect to the server.
    ///
    /// With `retry` the call blocks until the server accepts, backing off for one
    /// second between refused attempts. Without it a refusal is returned as a fatal
    /// [`Error::ConnectionRefused`].
    pub fn connect(host: &str, port: u16, retry: bool) -> Result<Self> {
        let addr = format!("{}:{}", host, port);
        log::info!("Connecting to server at {}", addr);

        let mut attempts: u32 = 0;
        let stream = loop {
            match TcpStream::connect(addr.as_str()) {
                Ok(stream) => break stream,
                Err(e) if e.kind() == ErrorKind::ConnectionRefused => {
                    if !retry {
                        return Err(Error::ConnectionRefused { addr });
                    }
                    attempts += 1;
                    log::info!("Server at {} not up yet (attempt {}), waiting", addr, attempts);
                    thread::sleep(CONNECT_RETRY_INTERVAL);
                }
                Err(e) => return Err(Error::Io(e)),
            }
        };

        Self::from_stream(stream, addr)
    }

    /// Wrap an already connected stream
    pub fn from_stream(stream: TcpStream, addr: String) -> Result<Self> {
        if let Err(e) = stream.set_nodelay(true) {
            log::warn!("Failed to set TCP_NODELAY on {}: {}", addr, e);
        }
        log::info!("Connected to {} from {:?}", addr, stream.local_addr());
        Ok(Self {
            stream,
            send_queue: Vec::with_capacity(256),
            rcv_buffer: Vec::with_capacity(frame::INITIAL_BUFFER_CAPACITY),
            addr,
        })
    }

    /// Server address this link was opened against
    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Local socket address
    pub fn local_addr(&self) -> Result<std::net::SocketAddr> {
        Ok(self.stream.local_addr()?)
    }

    // ========================================================================
    // Sending
    // ========================================================================

    /// Write one frame right away, bypassing the commit queue
    pub fn send_immediate(&mut self, payload: &[u8]) -> Result<()> {
        log::trace!("-> {}", String::from_utf8_lossy(payload));
        frame::write_frame(&mut self.stream, payload)
    }

    /// Queue a command for the next [`Connection::send`]
    pub fn commit(&mut self, command: &[u8]) {
        self.send_queue.extend_from_slice(command);
    }

    /// Drop every committed command
    pub fn clear_buffer(&mut self) {
        self.send_queue.clear();
    }

    /// Bytes currently committed
    pub fn committed(&self) -> &[u8] {
        &self.send_queue
    }

    /// Send all committed commands followed by `(syn)`.
    ///
    /// If a new frame already arrived while the agent was thinking, the queue is
    /// discarded: those commands were computed from stale perception. Returns
    /// whether anything was sent.
    pub fn send(&mut self) -> Result<bool> {
        if self.has_pending()? {
            log::warn!("Received a new packet while thinking, dropping committed commands");
            self.send_queue.clear();
            return Ok(false);
        }

        self.send_queue.extend_from_slice(SYNC_COMMAND);
        let payload = std::mem::take(&mut self.send_queue);
        let result = self.send_immediate(&payload);

        // Keep the allocation for the next cycle
        self.send_queue = payload;
        self.send_queue.clear();
        result.map(|_| true)
    }

    /// Commit a `say` command heard by every player on the field.
    ///
    /// # Panics
    /// If `msg` is longer than [`MAX_ANNOUNCEMENT_LEN`] bytes; the codec never
    /// produces such messages so this is a caller bug.
    pub fn commit_announcement(&mut self, msg: &[u8]) {
        assert!(
            msg.len() <= MAX_ANNOUNCEMENT_LEN,
            "announcement of {} bytes exceeds {} bytes",
            msg.len(),
            MAX_ANNOUNCEMENT_LEN
        );
        self.send_queue.extend_from_slice(b"(say ");
        self.send_queue.extend_from_slice(msg);
        self.send_queue.push(b')');
    }

    /// Commit a 2D beam (the official server rejects 3D beams)
    pub fn commit_beam(&mut self, position: [f32; 2], rotation_deg: f32) {
        // Writing into a Vec cannot fail
        let _ = write!(
            self.send_queue,
            "(beam {} {} {})",
            position[0], position[1], rotation_deg
        );
    }

    /// Commit a pass-mode request
    pub fn commit_pass_command(&mut self) {
        self.send_queue.extend_from_slice(b"(pass)");
    }

    // ========================================================================
    // Receiving
    // ========================================================================

    /// Blocking read of exactly one frame
    pub fn receive_one(&mut self) -> Result<RawFrame> {
        frame::read_frame_into(&mut self.stream, &mut self.rcv_buffer)?;
        log::trace!("<- {} bytes", self.rcv_buffer.len());
        Ok(RawFrame::new(self.rcv_buffer.clone()))
    }

    /// Read one frame, then keep reading while more data is already waiting.
    ///
    /// Never returns an empty list: the first read blocks.
    pub fn drain_available(&mut self) -> Result<Vec<RawFrame>> {
        let mut frames = vec![self.receive_one()?];
        while self.has_pending()? {
            frames.push(self.receive_one()?);
        }
        Ok(frames)
    }

    /// Read one frame if data is waiting, without blocking.
    ///
    /// Once a header is available the frame is read to completion in blocking mode.
    pub fn poll_frame(&mut self) -> Result<Option<RawFrame>> {
        if self.has_pending()? {
            Ok(Some(self.receive_one()?))
        } else {
            Ok(None)
        }
    }

    /// Zero-timeout readiness check.
    ///
    /// The socket is switched to non-blocking only for the duration of a one-byte
    /// `peek`. A closed socket counts as readable so the following read reports it.
    pub fn has_pending(&self) -> Result<bool> {
        self.stream.set_nonblocking(true)?;
        let mut byte = [0u8; 1];
        let ready = match self.stream.peek(&mut byte) {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == ErrorKind::WouldBlock => Ok(false),
            Err(e) if e.kind() == ErrorKind::Interrupted => Ok(false),
            Err(e) => Err(Error::from_socket(e)),
        };
        self.stream.set_nonblocking(false)?;
        ready
    }

    /// Close the agent socket
    pub fn close(self) {
        log::info!("Closing connection to {}", self.addr);
        let _ = self.stream.shutdown(std::net::Shutdown::Both);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use std::net::TcpListener;

    fn pair() -> (Connection, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let conn = Connection::connect("127.0.0.1", port, false).unwrap();
        let (server, _) = listener.accept().unwrap();
        (conn, server)
    }

    fn read_server_frame(server: &mut TcpStream) -> Vec<u8> {
        frame::read_frame(server).unwrap().into_bytes()
    }

    #[test]
    fn test_send_immediate_and_receive_one() {
        let (mut conn, mut server) = pair();

        conn.send_immediate(b"(scene rsg/agent/nao/nao_hetero.rsg 0)")
            .unwrap();
        assert_eq!(
            read_server_frame(&mut server),
            b"(scene rsg/agent/nao/nao_hetero.rsg 0)"
        );

        frame::write_frame(&mut server, b"(time (now 0.00))").unwrap();
        let frame = conn.receive_one().unwrap();
        assert_eq!(frame.as_bytes(), b"(time (now 0.00))");
    }

    #[test]
    fn test_send_appends_sync_and_clears_queue() {
        let (mut conn, mut server) = pair();

        conn.commit_announcement(b"abc");
        conn.commit_pass_command();
        assert!(conn.send().unwrap());
        assert_eq!(read_server_frame(&mut server), b"(say abc)(pass)(syn)");
        assert!(conn.committed().is_empty());

        assert!(conn.send().unwrap());
        assert_eq!(read_server_frame(&mut server), b"(syn)");
    }

    #[test]
    fn test_send_dropped_when_frame_waiting() {
        let (mut conn, mut server) = pair();
        frame::write_frame(&mut server, b"(time (now 0.02))").unwrap();

        // Wait until the frame is visible on the client side
        while !conn.has_pending().unwrap() {
            thread::sleep(Duration::from_millis(1));
        }

        conn.commit_beam([-3.0, 0.5], 90.0);
        assert!(!conn.send().unwrap());
        assert!(conn.committed().is_empty());
    }

    #[test]
    fn test_commit_beam_format() {
        let (mut conn, _server) = pair();
        conn.commit_beam([-14.5, 0.0], 0.0);
        assert_eq!(conn.committed(), b"(beam -14.5 0 0)");
        conn.clear_buffer();
        assert!(conn.committed().is_empty());
    }

    #[test]
    #[should_panic(expected = "exceeds 20 bytes")]
    fn test_announcement_length_contract() {
        let (mut conn, _server) = pair();
        conn.commit_announcement(b"0123456789abcdefghijk");
    }

    #[test]
    fn test_drain_available_reads_burst() {
        let (mut conn, mut server) = pair();
        let mut burst = Vec::new();
        for i in 0..3 {
            burst.extend(frame::encode_frame(format!("(time (now {}))", i).as_bytes()));
        }
        server.write_all(&burst).unwrap();

        while !conn.has_pending().unwrap() {
            thread::sleep(Duration::from_millis(1));
        }
        // Give the whole burst time to land in the receive buffer
        thread::sleep(Duration::from_millis(20));

        let frames = conn.drain_available().unwrap();
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[2].as_bytes(), b"(time (now 2))");
        assert!(!conn.has_pending().unwrap());
    }

    #[test]
    fn test_poll_frame_without_data() {
        let (mut conn, _server) = pair();
        assert!(conn.poll_frame().unwrap().is_none());
    }

    #[test]
    fn test_server_close_is_connection_lost() {
        let (mut conn, server) = pair();
        drop(server);
        let err = conn.receive_one().unwrap_err();
        assert!(matches!(err, Error::ConnectionLost));
    }

    #[test]
    fn test_refused_without_retry() {
        // Bind then drop to obtain a port with no listener
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let err = Connection::connect("127.0.0.1", port, false).err().unwrap();
        assert!(matches!(err, Error::ConnectionRefused { .. }));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_close_shuts_down_socket() {
        let (conn, mut server) = pair();
        conn.close();
        let mut buf = [0u8; 1];
        assert_eq!(server.read(&mut buf).unwrap(), 0);
    }
}
