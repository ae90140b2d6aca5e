use anyhow::Result;
use sha2::{Digest, Sha256};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeek, AsyncSeekExt};

const HASH_CHUNK_SIZE: usize = 64 * 1024;

/// SHA-256 over the full content of `reader`, rendered as lowercase hex.
///
/// The reader is rewound to the start afterwards so the caller can hand the
/// same stream straight to an upload call without re-acquiring it.
pub async fn checksum_hex<R>(reader: &mut R) -> Result<String>
where
    R: AsyncRead + AsyncSeek + Unpin,
{
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; HASH_CHUNK_SIZE];
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    reader.rewind().await?;
    Ok(format!("{:x}", hasher.finalize()))
}

/// SHA-256 of an in-memory buffer, lowercase hex.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use tokio::io::AsyncReadExt;

    use super::*;

    const HELLO_SHA256: &str = "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9";

    #[tokio::test]
    async fn test_known_digest() {
        let mut reader = Cursor::new(b"hello world".to_vec());
        let digest = checksum_hex(&mut reader).await.unwrap();
        assert_eq!(digest, HELLO_SHA256);
    }

    #[tokio::test]
    async fn test_rewinds_reader() {
        let payload = b"payload that must survive hashing".to_vec();
        let mut reader = Cursor::new(payload.clone());
        checksum_hex(&mut reader).await.unwrap();

        let mut replay = Vec::new();
        reader.read_to_end(&mut replay).await.unwrap();
        assert_eq!(replay, payload);
    }

    #[tokio::test]
    async fn test_repeated_hash_is_deterministic() {
        let mut reader = Cursor::new(vec![7u8; 200_000]);
        let first = checksum_hex(&mut reader).await.unwrap();
        let second = checksum_hex(&mut reader).await.unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_buffer_digest_matches_stream_digest() {
        assert_eq!(sha256_hex(b"hello world"), HELLO_SHA256);
    }
}
