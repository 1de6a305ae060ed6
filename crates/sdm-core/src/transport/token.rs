//! Resume token format used by the curl transport.
//!
//! The token is JSON naming the staged partial file and how many bytes of it
//! are valid. It is only meaningful inside the process that produced it.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::TransportError;
use crate::record::ResumeToken;

/// Partial download state carried inside a [`ResumeToken`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialFile {
    pub url: String,
    pub path: PathBuf,
    pub offset: u64,
}

impl PartialFile {
    pub fn to_token(&self) -> ResumeToken {
        // Serializing a struct of strings and integers cannot fail.
        ResumeToken::new(serde_json::to_vec(self).unwrap_or_default())
    }

    /// Decodes `token` and checks it still describes a partial file for `url`
    /// whose on-disk length matches the recorded offset.
    pub fn from_token(token: &ResumeToken, url: &str) -> Result<Self, TransportError> {
        let partial: PartialFile = serde_json::from_slice(token.as_bytes())
            .map_err(|_| TransportError::InvalidResumeToken)?;
        if partial.url != url {
            return Err(TransportError::InvalidResumeToken);
        }
        let on_disk = std::fs::metadata(&partial.path)
            .map_err(|_| TransportError::InvalidResumeToken)?
            .len();
        if on_disk != partial.offset {
            tracing::debug!(
                path = %partial.path.display(),
                on_disk,
                offset = partial.offset,
                "partial file does not match resume token"
            );
            return Err(TransportError::InvalidResumeToken);
        }
        Ok(partial)
    }
}
