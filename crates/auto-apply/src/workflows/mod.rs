pub mod applications;
pub mod handshake;
