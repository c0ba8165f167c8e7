//! Type definitions for L2CAP operations

use super::psm::PSM;
use crate::addr::BdAddr;
use thiserror::Error;

/// Error types specific to L2CAP socket operations
#[derive(Debug, Error)]
pub enum L2capError {
    #[error("Failed to create L2CAP socket: {0}")]
    Socket(std::io::Error),

    #[error("Failed to listen on {psm}: {source}")]
    Listen {
        psm: PSM,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to accept on {psm}: {source}")]
    Accept {
        psm: PSM,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to connect to {remote} on {psm}: {source}")]
    Connect {
        remote: BdAddr,
        psm: PSM,
        #[source]
        source: std::io::Error,
    },
}

/// Result type for L2CAP operations
pub type L2capResult<T> = std::result::Result<T, L2capError>;
