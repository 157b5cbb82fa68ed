use thiserror::Error;

/// Top-level error for every session operation.
#[derive(Error, Debug)]
pub enum PairViewError {
    #[error("connection error: {0}")]
    Connection(#[from] ConnectionError),

    #[error("authentication error: {0}")]
    Authentication(#[from] AuthenticationError),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("device error: {0}")]
    Device(#[from] DeviceError),
}

/// Socket lifecycle failures: bind, accept, connect, send, recv.
#[derive(Error, Debug)]
pub enum ConnectionError {
    #[error("bind on port {port} failed: {source}")]
    Bind {
        port: u16,
        #[source]
        source: std::io::Error,
    },

    #[error("accept failed: {0}")]
    Accept(#[source] std::io::Error),

    #[error("connect to {addr} failed: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("send failed: {0}")]
    Send(#[source] std::io::Error),

    #[error("recv failed: {0}")]
    Recv(#[source] std::io::Error),

    #[error("connection closed by peer")]
    Closed,
}

/// Handshake failures on the screen channel.
#[derive(Error, Debug)]
pub enum AuthenticationError {
    #[error("password rejected by host")]
    Rejected,

    #[error("malformed handshake response")]
    MalformedResponse,
}

/// Malformed wire data: short frames, bad lengths, undecodable payloads.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("peer closed mid-frame: got {got} of {expected} bytes")]
    ShortFrame { expected: usize, got: usize },

    #[error("declared frame length {len} exceeds limit")]
    FrameTooLarge { len: usize },

    #[error("cipher key must be 32 bytes, got {len}")]
    BadKeyLength { len: usize },

    #[error("cipher nonce must be 12 bytes, got {len}")]
    BadNonceLength { len: usize },

    #[error("undecodable payload: {0}")]
    Decode(String),
}

/// Capture / injection / audio device failures behind the device seams.
#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("screen capture failed: {0}")]
    Capture(String),

    #[error("input injection failed: {0}")]
    Inject(String),

    #[error("audio device failed: {0}")]
    Audio(String),

    #[error("webcam failed: {0}")]
    Webcam(String),

    #[error("device unavailable: {0}")]
    Unavailable(String),
}
