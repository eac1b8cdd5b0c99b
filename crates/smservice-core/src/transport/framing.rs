//! Wire framing for TCP channels.
//!
//! Each frame is a 4-byte big-endian length prefix followed by the payload.
//! A message is two consecutive frames; a fresh connection starts with one
//! greeting frame carrying the sender's identity.
//!
//! ```text
//! [u32 BE: len][payload of len]
//! ```

use crate::config::TransportConfig;
use crate::{Result, ServiceError};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// Read a length-prefixed frame from an async reader.
///
/// Returns `None` on clean EOF (peer closed connection).
pub async fn read_frame<R: AsyncReadExt + Unpin>(
    reader: &mut R,
    endpoint: &str,
) -> Result<Option<Vec<u8>>> {
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(ServiceError::transport(endpoint, e)),
    }

    let len = u32::from_be_bytes(len_buf) as usize;

    if len > TransportConfig::MAX_FRAME_SIZE {
        return Err(ServiceError::transport_msg(
            endpoint,
            format!(
                "frame size {} exceeds maximum {}",
                len,
                TransportConfig::MAX_FRAME_SIZE
            ),
        ));
    }

    let mut payload = vec![0u8; len];
    reader
        .read_exact(&mut payload)
        .await
        .map_err(|e| ServiceError::transport(endpoint, e))?;

    Ok(Some(payload))
}

/// Read a two-frame message. EOF before or between the frames is a disconnect.
pub async fn read_message<R: AsyncReadExt + Unpin>(
    reader: &mut R,
    endpoint: &str,
) -> Result<(Vec<u8>, Vec<u8>)> {
    let headers = read_frame(reader, endpoint)
        .await?
        .ok_or_else(|| ServiceError::transport_msg(endpoint, "connection closed by peer"))?;
    let body = read_frame(reader, endpoint)
        .await?
        .ok_or_else(|| ServiceError::transport_msg(endpoint, "connection closed mid-message"))?;
    Ok((headers, body))
}

/// Append one length-prefixed frame to `buf`.
///
/// Payloads over [`TransportConfig::MAX_FRAME_SIZE`] are rejected, so nothing
/// is sent that the receiving side would refuse to read.
pub fn put_frame(buf: &mut Vec<u8>, payload: &[u8], endpoint: &str) -> Result<()> {
    let len = payload.len();
    if len > TransportConfig::MAX_FRAME_SIZE {
        return Err(ServiceError::transport_msg(
            endpoint,
            format!(
                "frame size {} exceeds maximum {}",
                len,
                TransportConfig::MAX_FRAME_SIZE
            ),
        ));
    }
    // MAX_FRAME_SIZE fits in a u32
    buf.extend_from_slice(&(len as u32).to_be_bytes());
    buf.extend_from_slice(payload);
    Ok(())
}

/// Write a single length-prefixed frame and flush.
pub async fn write_frame<W: AsyncWriteExt + Unpin>(
    writer: &mut W,
    payload: &[u8],
    endpoint: &str,
) -> Result<()> {
    let mut buf = Vec::with_capacity(4 + payload.len());
    put_frame(&mut buf, payload, endpoint)?;
    write_all(writer, &buf, endpoint).await
}

/// Write both frames of a message with a single `write_all`, then flush.
pub async fn write_message<W: AsyncWriteExt + Unpin>(
    writer: &mut W,
    headers: &[u8],
    body: &[u8],
    endpoint: &str,
) -> Result<()> {
    let mut buf = Vec::with_capacity(8 + headers.len() + body.len());
    put_frame(&mut buf, headers, endpoint)?;
    put_frame(&mut buf, body, endpoint)?;
    write_all(writer, &buf, endpoint).await
}

async fn write_all<W: AsyncWriteExt + Unpin>(writer: &mut W, buf: &[u8], endpoint: &str) -> Result<()> {
    writer
        .write_all(buf)
        .await
        .map_err(|e| ServiceError::transport(endpoint, e))?;
    writer
        .flush()
        .await
        .map_err(|e| ServiceError::transport(endpoint, e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_frame_read_write_roundtrip() {
        let payload = b"hello world";
        let mut buf = Vec::new();

        write_frame(&mut buf, payload, "test").await.unwrap();

        let mut cursor = std::io::Cursor::new(buf);
        let read_back = read_frame(&mut cursor, "test").await.unwrap();

        assert_eq!(read_back, Some(payload.to_vec()));
    }

    #[tokio::test]
    async fn test_message_frames_are_contiguous() {
        let mut buf = Vec::new();
        write_message(&mut buf, b"head", b"body!", "test").await.unwrap();

        assert_eq!(buf.len(), 4 + 4 + 4 + 5);
        let mut cursor = std::io::Cursor::new(buf);
        let (headers, body) = read_message(&mut cursor, "test").await.unwrap();
        assert_eq!(headers, b"head");
        assert_eq!(body, b"body!");
    }

    #[tokio::test]
    async fn test_frame_read_empty_stream_returns_none() {
        let mut cursor = std::io::Cursor::new(Vec::<u8>::new());
        let result = read_frame(&mut cursor, "test").await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_message_cut_after_headers_is_disconnect() {
        let mut buf = Vec::new();
        put_frame(&mut buf, b"head", "test").unwrap();

        let mut cursor = std::io::Cursor::new(buf);
        let err = read_message(&mut cursor, "test").await.unwrap_err();
        assert!(matches!(err, ServiceError::Transport { .. }));
        assert!(err.to_string().contains("mid-message"));
    }

    #[tokio::test]
    async fn test_oversized_message_is_not_written() {
        let body = vec![0u8; TransportConfig::MAX_FRAME_SIZE + 1];
        let mut buf = Vec::new();

        let err = write_message(&mut buf, b"head", &body, "test").await.unwrap_err();
        assert!(matches!(err, ServiceError::Transport { .. }));
        assert!(err.to_string().contains("exceeds maximum"));
        assert!(buf.is_empty(), "no partial message may reach the wire");
    }

    #[tokio::test]
    async fn test_frame_at_size_limit_is_written() {
        let payload = vec![7u8; TransportConfig::MAX_FRAME_SIZE];
        let mut buf = Vec::new();
        write_frame(&mut buf, &payload, "test").await.unwrap();

        let mut cursor = std::io::Cursor::new(buf);
        let read_back = read_frame(&mut cursor, "test").await.unwrap();
        assert_eq!(read_back.map(|p| p.len()), Some(TransportConfig::MAX_FRAME_SIZE));
    }

    #[tokio::test]
    async fn test_frame_read_oversized_returns_error() {
        // Header claiming a payload past the limit
        let huge_len: u32 = (TransportConfig::MAX_FRAME_SIZE + 1) as u32;
        let mut buf = Vec::new();
        buf.extend_from_slice(&huge_len.to_be_bytes());
        buf.extend_from_slice(&[0u8; 8]);

        let mut cursor = std::io::Cursor::new(buf);
        let result = read_frame(&mut cursor, "test").await;
        assert!(matches!(result, Err(ServiceError::Transport { .. })));
    }
}
