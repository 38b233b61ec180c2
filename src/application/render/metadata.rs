use std::{fmt::Write as _, path::Path};

use async_trait::async_trait;

use super::types::RenderError;

/// Stamps document-level metadata onto a finished PDF in place.
#[async_trait]
pub trait MetadataTool: Send + Sync {
    async fn set_title(&self, path: &Path, title: &str) -> Result<(), RenderError>;
}

/// Decode tool output as UTF-8, rendering undecodable bytes as `\xNN`.
pub fn decode_tool_output(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    for chunk in bytes.utf8_chunks() {
        out.push_str(chunk.valid());
        for byte in chunk.invalid() {
            let _ = write!(out, "\\x{byte:02x}");
        }
    }
    out
}
