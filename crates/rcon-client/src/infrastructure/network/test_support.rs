//! In-memory RCON server used by the network layer's unit tests.

use rcon_core::protocol::{decode_frame, encode_frame, is_complete, Frame};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, DuplexStream};
use tokio::task::JoinHandle;

use super::auth::login_hash;

pub(crate) fn words(ws: &[&str]) -> Vec<String> {
    ws.iter().map(|w| (*w).to_string()).collect()
}

/// Reads the next complete frame, or `None` on EOF.
pub(crate) async fn read_frame<R: AsyncRead + Unpin>(
    reader: &mut R,
    buffer: &mut Vec<u8>,
) -> Option<Frame> {
    let mut chunk = [0u8; 1024];
    loop {
        if is_complete(buffer) {
            let (frame, consumed) = decode_frame(buffer).expect("client sent a malformed frame");
            buffer.drain(..consumed);
            return Some(frame);
        }
        let n = reader.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buffer.extend_from_slice(&chunk[..n]);
    }
}

pub(crate) async fn write_frame<W: AsyncWrite + Unpin>(writer: &mut W, frame: &Frame) {
    let bytes = encode_frame(frame).expect("test frame must encode");
    // The client may already be gone; tests assert on what it received.
    let _ = writer.write_all(&bytes).await;
}

/// How the fake server answers the handshake.
#[derive(Debug, Clone)]
pub(crate) struct FakeServer {
    pub salt: String,
    pub password: String,
    pub challenge_status: String,
    pub events_status: String,
    /// Events pushed right after `admin.eventsEnabled` is answered.
    pub events_after_login: Vec<Vec<String>>,
}

impl Default for FakeServer {
    fn default() -> Self {
        Self {
            salt: "0123456789ABCDEF".to_string(),
            password: "secret".to_string(),
            challenge_status: "OK".to_string(),
            events_status: "OK".to_string(),
            events_after_login: Vec::new(),
        }
    }
}

impl FakeServer {
    /// Serves `stream` until the client disconnects and returns every frame
    /// the client sent, acknowledgements included.
    pub(crate) fn spawn(self, mut stream: DuplexStream) -> JoinHandle<Vec<Frame>> {
        tokio::spawn(async move {
            let mut buffer = Vec::new();
            let mut received = Vec::new();
            let mut event_sequence = 1000;
            while let Some(frame) = read_frame(&mut stream, &mut buffer).await {
                received.push(frame.clone());
                if frame.is_response {
                    continue;
                }
                let reply = self.answer(&frame.words);
                write_frame(&mut stream, &Frame::new(frame.sequence, true, false, reply)).await;

                if frame.words.first().map(String::as_str) == Some("admin.eventsEnabled") {
                    for event in &self.events_after_login {
                        let push = Frame::new(event_sequence, false, true, event.clone());
                        write_frame(&mut stream, &push).await;
                        event_sequence += 1;
                    }
                }
            }
            received
        })
    }

    fn answer(&self, request: &[String]) -> Vec<String> {
        let request: Vec<&str> = request.iter().map(String::as_str).collect();
        match request.as_slice() {
            ["login.hashed"] => vec![self.challenge_status.clone(), self.salt.clone()],
            ["login.hashed", hash] => {
                let expected = login_hash(&self.salt, &self.password).expect("valid salt");
                if *hash == expected {
                    words(&["OK"])
                } else {
                    words(&["InvalidPasswordHash"])
                }
            }
            ["admin.eventsEnabled", "true"] => vec![self.events_status.clone()],
            ["serverInfo"] => words(&["OK", "Test Server", "0", "64"]),
            _ => words(&["UnknownCommand"]),
        }
    }
}
