use crate::session::SessionState;
use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("already connected or connecting")]
    AlreadyConnected,
    #[error("not connected to a server")]
    NotConnected,
    #[error("{0} is reserved for the host")]
    HostOnly(&'static str),
    #[error("{0} cannot be sent by the host")]
    NonHostOnly(&'static str),
    #[error("{operation} is not allowed while {state}")]
    InvalidState {
        operation: &'static str,
        state: SessionState,
    },
}
