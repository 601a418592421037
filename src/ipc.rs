//! Inter-instance messaging for Ironpad
//!
//! One running instance owns a loopback TCP endpoint whose port is published
//! in a well-known file under the configuration directory. Later launches
//! connect there to forward their command line or to hand over a tab instead
//! of opening a second window.
//!
//! Wire format, per message: a 4-byte little-endian discriminator, a 4-byte
//! little-endian payload length in bytes, then the payload as UTF-16LE text.
//! The receiver answers with a single 4-byte little-endian result code;
//! nonzero means the message was accepted.

use crate::config::get_config_dir;
use crate::error::{Error, Result};
use log::{debug, info, warn};
use std::io::{ErrorKind, Read, Write};
use std::net::{Ipv4Addr, SocketAddr, TcpListener, TcpStream};
use std::path::PathBuf;
use std::time::Duration;

// ─────────────────────────────────────────────────────────────────────────────
// Message Types
// ─────────────────────────────────────────────────────────────────────────────

/// Discriminator identifying what a payload means.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Discriminator {
    /// Payload is a full command line to execute in the receiving instance
    CommandLine,
    /// Payload is a tab-transfer descriptor (see the transfer module)
    MoveTab,
}

impl Discriminator {
    pub fn code(&self) -> u32 {
        match self {
            Discriminator::CommandLine => 1,
            Discriminator::MoveTab => 2,
        }
    }

    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            1 => Some(Discriminator::CommandLine),
            2 => Some(Discriminator::MoveTab),
            _ => None,
        }
    }
}

/// One decoded inter-instance message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub discriminator: Discriminator,
    pub payload: String,
}

/// Result code answered for a handled message. Nonzero means accepted.
pub const REPLY_ACCEPTED: u32 = 1;
/// Result code for a message the instance could not act on.
pub const REPLY_REJECTED: u32 = 0;

// Payloads are bounded; anything bigger is a corrupt or hostile frame.
const MAX_PAYLOAD_BYTES: u32 = 64 * 1024 * 1024;

// ─────────────────────────────────────────────────────────────────────────────
// Frame Codec
// ─────────────────────────────────────────────────────────────────────────────

/// Encode a message into its wire frame.
pub fn encode_frame(discriminator: Discriminator, payload: &str) -> Vec<u8> {
    let utf16: Vec<u16> = payload.encode_utf16().collect();
    let mut frame = Vec::with_capacity(8 + utf16.len() * 2);
    frame.extend_from_slice(&discriminator.code().to_le_bytes());
    frame.extend_from_slice(&((utf16.len() * 2) as u32).to_le_bytes());
    for unit in utf16 {
        frame.extend_from_slice(&unit.to_le_bytes());
    }
    frame
}

/// Read one message frame from a stream.
fn read_frame(stream: &mut impl Read) -> Result<Message> {
    let mut header = [0u8; 8];
    stream.read_exact(&mut header)?;
    let code = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
    let len = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);

    let discriminator = Discriminator::from_code(code)
        .ok_or_else(|| Error::MalformedMessage(format!("unknown discriminator {}", code)))?;
    if len % 2 != 0 {
        return Err(Error::MalformedMessage(format!(
            "odd UTF-16 payload length {}",
            len
        )));
    }
    if len > MAX_PAYLOAD_BYTES {
        return Err(Error::MalformedMessage(format!(
            "payload length {} exceeds limit",
            len
        )));
    }

    let mut bytes = vec![0u8; len as usize];
    stream.read_exact(&mut bytes)?;
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect();
    let payload = String::from_utf16(&units)
        .map_err(|_| Error::MalformedMessage("payload is not valid UTF-16".to_string()))?;

    Ok(Message {
        discriminator,
        payload,
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Handler Seam
// ─────────────────────────────────────────────────────────────────────────────

/// What the owning instance does with an arriving message.
///
/// The endpoint only frames and routes; all tab and document work happens in
/// the handler, on the instance's own thread.
pub trait MessageHandler {
    /// Handle one message; the returned code is sent back to the peer.
    fn handle_message(&mut self, message: Message) -> u32;
}

// ─────────────────────────────────────────────────────────────────────────────
// Instance Endpoint (server side)
// ─────────────────────────────────────────────────────────────────────────────

/// File under the config directory publishing the owning instance's port.
const PORT_FILE_NAME: &str = "instance.port";

fn port_file_path() -> Result<PathBuf> {
    Ok(get_config_dir()?.join(PORT_FILE_NAME))
}

/// The single-instance endpoint owned by the primary running instance.
///
/// Binds an ephemeral loopback port and publishes it in the port file.
/// Dropping the endpoint removes the port file so later launches do not
/// connect to a dead socket.
pub struct InstanceEndpoint {
    listener: TcpListener,
    port_file: PathBuf,
}

impl std::fmt::Debug for InstanceEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstanceEndpoint")
            .field("addr", &self.listener.local_addr().ok())
            .finish_non_exhaustive()
    }
}

impl InstanceEndpoint {
    /// Claim the single-instance role: bind a port and publish it.
    pub fn claim() -> Result<Self> {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0))?;
        listener.set_nonblocking(true)?;
        let port = listener.local_addr()?.port();

        let port_file = port_file_path()?;
        if let Some(dir) = port_file.parent() {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::write(&port_file, port.to_string())?;
        info!("Instance endpoint listening on port {}", port);

        Ok(Self {
            listener,
            port_file,
        })
    }

    /// Port this endpoint listens on.
    pub fn port(&self) -> Result<u16> {
        Ok(self.listener.local_addr()?.port())
    }

    /// Accept and dispatch every pending connection, without blocking.
    ///
    /// Called from the instance's event loop. Each connection carries one
    /// message and receives one result code.
    pub fn poll(&self, handler: &mut dyn MessageHandler) {
        loop {
            match self.listener.accept() {
                Ok((stream, peer)) => {
                    debug!("Accepted inter-instance connection from {}", peer);
                    if let Err(e) = Self::serve_connection(stream, handler) {
                        warn!("Inter-instance connection failed: {}", e);
                    }
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) => {
                    warn!("Endpoint accept error: {}", e);
                    break;
                }
            }
        }
    }

    fn serve_connection(mut stream: TcpStream, handler: &mut dyn MessageHandler) -> Result<()> {
        stream.set_nonblocking(false)?;
        stream.set_read_timeout(Some(Duration::from_secs(5)))?;
        let reply = match read_frame(&mut stream) {
            Ok(message) => {
                debug!("Dispatching {:?} message", message.discriminator);
                handler.handle_message(message)
            }
            Err(e) => {
                warn!("Rejecting malformed inter-instance frame: {}", e);
                REPLY_REJECTED
            }
        };
        stream.write_all(&reply.to_le_bytes())?;
        Ok(())
    }
}

impl Drop for InstanceEndpoint {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.port_file) {
            if e.kind() != ErrorKind::NotFound {
                warn!("Could not remove port file: {}", e);
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Instance Client (sender side)
// ─────────────────────────────────────────────────────────────────────────────

/// Connects to the primary instance's endpoint and delivers messages.
#[derive(Debug)]
pub struct InstanceClient {
    addr: SocketAddr,
}

impl InstanceClient {
    /// Locate the primary instance through the published port file.
    ///
    /// # Errors
    ///
    /// [`Error::PeerUnreachable`] when no port file exists or it does not
    /// contain a port; a stale file with a dead port only fails later, at
    /// send time.
    pub fn discover() -> Result<Self> {
        let port_file = port_file_path()?;
        let contents = std::fs::read_to_string(&port_file).map_err(|_| Error::PeerUnreachable)?;
        let port: u16 = contents.trim().parse().map_err(|_| Error::PeerUnreachable)?;
        Ok(Self::for_port(port))
    }

    /// Client for a known port (tests, or a port learned out of band).
    pub fn for_port(port: u16) -> Self {
        Self {
            addr: SocketAddr::from((Ipv4Addr::LOCALHOST, port)),
        }
    }

    /// Send one message and wait for the result code.
    ///
    /// Retries the connection a few times with short sleeps: the primary
    /// instance polls its endpoint from an event loop and may be mid-dialog.
    pub fn send(&self, discriminator: Discriminator, payload: &str) -> Result<u32> {
        const ATTEMPTS: u32 = 10;
        let frame = encode_frame(discriminator, payload);

        let mut last_err: Option<std::io::Error> = None;
        for attempt in 0..ATTEMPTS {
            if attempt > 0 {
                std::thread::sleep(Duration::from_millis(200));
            }
            match TcpStream::connect_timeout(&self.addr, Duration::from_secs(2)) {
                Ok(mut stream) => {
                    stream.set_read_timeout(Some(Duration::from_secs(30)))?;
                    stream.write_all(&frame)?;
                    let mut reply = [0u8; 4];
                    stream.read_exact(&mut reply)?;
                    let code = u32::from_le_bytes(reply);
                    debug!("Peer answered {} for {:?}", code, discriminator);
                    return Ok(code);
                }
                Err(e) => {
                    debug!("Connect attempt {} failed: {}", attempt + 1, e);
                    last_err = Some(e);
                }
            }
        }
        warn!(
            "Could not reach peer at {} after {} attempts: {:?}",
            self.addr, ATTEMPTS, last_err
        );
        Err(Error::PeerUnreachable)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    struct Recording {
        received: Vec<Message>,
        reply: u32,
    }

    impl MessageHandler for Recording {
        fn handle_message(&mut self, message: Message) -> u32 {
            self.received.push(message);
            self.reply
        }
    }

    #[test]
    fn test_frame_round_trip() {
        let frame = encode_frame(Discriminator::CommandLine, "/path:\"C:\\src\\main.rs\" /line:42");
        let message = read_frame(&mut Cursor::new(frame)).unwrap();
        assert_eq!(message.discriminator, Discriminator::CommandLine);
        assert_eq!(message.payload, "/path:\"C:\\src\\main.rs\" /line:42");
    }

    #[test]
    fn test_frame_preserves_non_ascii_payload() {
        let frame = encode_frame(Discriminator::MoveTab, "/tmp/Übergabe_файл.txt*x*1*3");
        let message = read_frame(&mut Cursor::new(frame)).unwrap();
        assert_eq!(message.payload, "/tmp/Übergabe_файл.txt*x*1*3");
    }

    #[test]
    fn test_unknown_discriminator_is_malformed() {
        let mut frame = encode_frame(Discriminator::CommandLine, "x");
        frame[0] = 99;
        assert!(matches!(
            read_frame(&mut Cursor::new(frame)),
            Err(Error::MalformedMessage(_))
        ));
    }

    #[test]
    fn test_odd_payload_length_is_malformed() {
        let mut frame = encode_frame(Discriminator::CommandLine, "ab");
        // Corrupt the length field to an odd byte count
        frame[4] = 3;
        assert!(matches!(
            read_frame(&mut Cursor::new(frame)),
            Err(Error::MalformedMessage(_))
        ));
    }

    #[test]
    fn test_loopback_send_and_dispatch() {
        // Bind directly rather than through the config directory
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut handler = Recording {
                received: Vec::new(),
                reply: REPLY_ACCEPTED,
            };
            let message = read_frame(&mut stream).unwrap();
            let code = handler.handle_message(message);
            stream.write_all(&code.to_le_bytes()).unwrap();
            handler.received
        });

        let client = InstanceClient::for_port(port);
        let code = client
            .send(Discriminator::CommandLine, "/path:\"a.rs\"")
            .unwrap();
        assert_eq!(code, REPLY_ACCEPTED);

        let received = server.join().unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].payload, "/path:\"a.rs\"");
    }

    #[test]
    fn test_send_to_dead_port_is_peer_unreachable() {
        // Bind and immediately drop to get a port nobody listens on
        let port = {
            let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
            listener.local_addr().unwrap().port()
        };
        let client = InstanceClient::for_port(port);
        assert!(matches!(
            client.send(Discriminator::CommandLine, "x"),
            Err(Error::PeerUnreachable)
        ));
    }
}
