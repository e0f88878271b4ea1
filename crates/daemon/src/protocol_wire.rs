// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Length-prefixed JSON framing for the daemon's Unix-domain-socket wire.
//!
//! Each message is a 4-byte big-endian length prefix followed by a JSON
//! payload. One request, one response, per connection.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("message too large: {size} bytes (max {max})")]
    MessageTooLarge { size: usize, max: usize },
    #[error("connection closed")]
    ConnectionClosed,
    #[error("timed out")]
    Timeout,
}

/// Guards against a corrupt or malicious length prefix causing an
/// unbounded allocation.
pub const MAX_MESSAGE_SIZE: usize = 64 * 1024 * 1024;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

pub fn encode<T: Serialize>(msg: &T) -> Result<Vec<u8>, ProtocolError> {
    Ok(serde_json::to_vec(msg)?)
}

pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, ProtocolError> {
    Ok(serde_json::from_slice(bytes)?)
}

pub async fn write_message<W: tokio::io::AsyncWrite + Unpin>(
    writer: &mut W,
    data: &[u8],
) -> Result<(), ProtocolError> {
    if data.len() > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::MessageTooLarge {
            size: data.len(),
            max: MAX_MESSAGE_SIZE,
        });
    }
    writer.write_all(&(data.len() as u32).to_be_bytes()).await?;
    writer.write_all(data).await?;
    writer.flush().await?;
    Ok(())
}

pub async fn read_message<R: tokio::io::AsyncRead + Unpin>(reader: &mut R) -> Result<Vec<u8>, ProtocolError> {
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Err(ProtocolError::ConnectionClosed),
        Err(e) => return Err(e.into()),
    }
    let len = u32::from_be_bytes(len_buf) as usize;
    if len > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::MessageTooLarge { size: len, max: MAX_MESSAGE_SIZE });
    }
    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf).await?;
    Ok(buf)
}

pub async fn read_request<R, T>(reader: &mut R, timeout: Duration) -> Result<T, ProtocolError>
where
    R: tokio::io::AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let bytes = tokio::time::timeout(timeout, read_message(reader))
        .await
        .map_err(|_| ProtocolError::Timeout)??;
    decode(&bytes)
}

pub async fn write_response<W, T>(writer: &mut W, msg: &T, timeout: Duration) -> Result<(), ProtocolError>
where
    W: tokio::io::AsyncWrite + Unpin,
    T: Serialize,
{
    let data = encode(msg)?;
    tokio::time::timeout(timeout, write_message(writer, &data))
        .await
        .map_err(|_| ProtocolError::Timeout)?
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Sample {
        value: u32,
    }

    #[tokio::test]
    async fn round_trips_through_an_in_memory_pipe() {
        let (mut client, mut server) = tokio::io::duplex(4096);
        let msg = Sample { value: 42 };
        let data = encode(&msg).unwrap();
        write_message(&mut client, &data).await.unwrap();
        let received = read_message(&mut server).await.unwrap();
        let decoded: Sample = decode(&received).unwrap();
        assert_eq!(decoded, msg);
    }

    #[tokio::test]
    async fn read_message_reports_closed_connection() {
        let (client, mut server) = tokio::io::duplex(4096);
        drop(client);
        let err = read_message(&mut server).await.unwrap_err();
        assert!(matches!(err, ProtocolError::ConnectionClosed));
    }

    #[tokio::test]
    async fn write_message_rejects_oversized_payload() {
        let (mut client, _server) = tokio::io::duplex(4096);
        let data = vec![0u8; MAX_MESSAGE_SIZE + 1];
        let err = write_message(&mut client, &data).await.unwrap_err();
        assert!(matches!(err, ProtocolError::MessageTooLarge { .. }));
    }
}
