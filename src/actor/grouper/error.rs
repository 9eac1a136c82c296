use thiserror::Error;

use crate::sys::SysError;

#[derive(Debug, Error)]
pub enum GrouperError {
    #[error("grouper is not running")]
    ChannelClosed,
    #[error("grouper dropped the request without answering")]
    NoResponse,
    #[error(transparent)]
    System(#[from] SysError),
    #[error("failed to start grouper thread: {0}")]
    Spawn(#[from] std::io::Error),
}
