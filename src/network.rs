// Wire codec: every event is one WebSocket text frame holding its JSON encoding.

use std::fmt;
use std::io;
use std::net::TcpStream;

use serde::{Serialize, de};
use tungstenite::protocol::Role;
use tungstenite::{Message, WebSocket};


pub const PORT: u16 = 38617;


#[derive(Debug)]
pub enum CommunicationError {
    // The other side closed the connection cleanly.
    ConnectionClosed,
    Socket(tungstenite::Error),
    Serde(serde_json::Error),
    // A frame arrived that cannot carry an event (e.g. binary data).
    UnexpectedFrame(String),
}

impl CommunicationError {
    // Whether the stream can still be read after this error. Bad payloads are the sender's
    // problem and only cost one message; transport failures end the connection.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, CommunicationError::Serde(_) | CommunicationError::UnexpectedFrame(_))
    }
}

impl fmt::Display for CommunicationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommunicationError::ConnectionClosed => write!(f, "connection closed"),
            CommunicationError::Socket(err) => write!(f, "socket error: {err}"),
            CommunicationError::Serde(err) => write!(f, "cannot decode message: {err}"),
            CommunicationError::UnexpectedFrame(frame) => write!(f, "unexpected frame: {frame}"),
        }
    }
}

impl std::error::Error for CommunicationError {}

impl From<tungstenite::Error> for CommunicationError {
    fn from(err: tungstenite::Error) -> Self {
        match err {
            tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => {
                CommunicationError::ConnectionClosed
            }
            err => CommunicationError::Socket(err),
        }
    }
}

pub fn write_obj<T, S>(socket: &mut WebSocket<S>, obj: &T) -> Result<(), CommunicationError>
where
    T: Serialize,
    S: io::Read + io::Write,
{
    let serialized = serde_json::to_string(obj).map_err(CommunicationError::Serde)?;
    socket.send(Message::text(serialized))?;
    Ok(())
}

// Blocks until a full event arrives. Control frames are handled by tungstenite and skipped here.
pub fn read_obj<T, S>(socket: &mut WebSocket<S>) -> Result<T, CommunicationError>
where
    T: de::DeserializeOwned,
    S: io::Read + io::Write,
{
    loop {
        match socket.read()? {
            Message::Text(text) => {
                return serde_json::from_str(text.as_str()).map_err(CommunicationError::Serde);
            }
            Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
            Message::Close(_) => return Err(CommunicationError::ConnectionClosed),
            Message::Binary(data) => {
                return Err(CommunicationError::UnexpectedFrame(format!(
                    "binary frame of {} bytes",
                    data.len()
                )));
            }
        }
    }
}

// Gives a second handle to the same connection so that reads and writes can happen on different
// threads.
pub fn clone_websocket(
    socket: &WebSocket<TcpStream>, role: Role,
) -> io::Result<WebSocket<TcpStream>> {
    let stream = socket.get_ref().try_clone()?;
    let config = *socket.get_config();
    Ok(WebSocket::from_raw_socket(stream, role, Some(config)))
}
