pub mod credentials;
pub mod crypto;
pub mod framing;
pub mod handshake;

pub use credentials::{SessionCredentials, SessionCrypto};
pub use framing::{recv_frame, send_frame, MAX_FRAME_LEN};
pub use handshake::{AUTH_FAILED, AUTH_SUCCESS};
