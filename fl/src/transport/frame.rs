//! Wire frames
//!
//! Each frame is a 4-byte big-endian body length followed by a JSON body.
//! A clean EOF before a header reads as "no more frames".

use flitterbytes::{read_u32, write_u32};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

use super::TransportError;
use crate::message::Message;

/// Length of the frame header in bytes
pub const HEADER_LEN: usize = 4;

/// Everything that travels over a flitter connection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Frame {
    /// Client event with positional arguments
    Client {
        event: String,
        #[serde(default)]
        args: serde_json::Value,
    },

    /// Reply to a client event
    Reply { value: String },

    /// Peer message
    Peer { message: Message },
}

impl Frame {
    pub fn kind(&self) -> &'static str {
        match self {
            Frame::Client { .. } => "client",
            Frame::Reply { .. } => "reply",
            Frame::Peer { .. } => "peer",
        }
    }
}

/// Write one frame and flush
pub async fn write_frame<W>(writer: &mut W, frame: &Frame, max_size: usize) -> Result<(), TransportError>
where
    W: AsyncWrite + Unpin,
{
    let body = serde_json::to_vec(frame)?;
    if body.len() > max_size {
        return Err(TransportError::FrameTooLarge {
            size: body.len(),
            max: max_size,
        });
    }

    let mut buf = Vec::with_capacity(HEADER_LEN + body.len());
    write_u32(&mut buf, body.len() as u32);
    buf.extend_from_slice(&body);
    writer.write_all(&buf).await?;
    writer.flush().await?;
    debug!(kind = frame.kind(), size = body.len(), "write_frame: sent");
    Ok(())
}

/// Read one frame; `None` on clean EOF
pub async fn read_frame<R>(reader: &mut R, max_size: usize) -> Result<Option<Frame>, TransportError>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; HEADER_LEN];
    match reader.read_exact(&mut header).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let size = read_u32(&header)? as usize;
    if size > max_size {
        return Err(TransportError::FrameTooLarge { size, max: max_size });
    }

    let mut body = vec![0u8; size];
    reader.read_exact(&mut body).await?;
    let frame: Frame = serde_json::from_slice(&body)?;
    debug!(kind = frame.kind(), size, "read_frame: received");
    Ok(Some(frame))
}
