use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::{READ_CHUNK_SIZE, TransferError};

/// Reads exactly `n` bytes.
///
/// Keeps reading in chunks of at most [`READ_CHUNK_SIZE`] bytes until `n`
/// bytes have arrived. If the peer closes first the call fails with
/// [`TransferError::Incomplete`].
pub async fn recv_exact<R: AsyncRead + Unpin>(
    reader: &mut R,
    n: usize,
) -> Result<Vec<u8>, TransferError> {
    let mut out = Vec::with_capacity(n);
    let mut chunk = [0u8; READ_CHUNK_SIZE];

    while out.len() < n {
        let want = (n - out.len()).min(READ_CHUNK_SIZE);
        let got = reader.read(&mut chunk[..want]).await?;
        if got == 0 {
            return Err(TransferError::Incomplete {
                expected: n,
                received: out.len(),
            });
        }
        out.extend_from_slice(&chunk[..got]);
    }
    Ok(out)
}

/// Reads until the peer closes the stream.
///
/// The data channel has no length prefix; closure marks the end of the
/// payload. Fails with [`TransferError::TooLarge`] past `limit` bytes.
pub async fn recv_to_end<R: AsyncRead + Unpin>(
    reader: &mut R,
    limit: u64,
) -> Result<Vec<u8>, TransferError> {
    let mut out = Vec::new();
    copy_to_end(reader, &mut out, limit).await?;
    Ok(out)
}

/// Copies from `reader` into `writer` until the peer closes the stream.
///
/// Returns the number of bytes copied.
pub async fn copy_to_end<R, W>(
    reader: &mut R,
    writer: &mut W,
    limit: u64,
) -> Result<u64, TransferError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut chunk = vec![0u8; 64 * 1024];
    let mut total: u64 = 0;

    loop {
        let got = reader.read(&mut chunk).await?;
        if got == 0 {
            break;
        }
        total += got as u64;
        if total > limit {
            return Err(TransferError::TooLarge { limit });
        }
        writer.write_all(&chunk[..got]).await?;
    }
    writer.flush().await?;
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn collects_across_short_reads() {
        let (mut tx, mut rx) = tokio::io::duplex(5);
        let writer = tokio::spawn(async move {
            for part in [&b"ab"[..], b"cdefg", b"hij"] {
                tx.write_all(part).await.unwrap();
                tokio::task::yield_now().await;
            }
        });
        let got = recv_exact(&mut rx, 10).await.unwrap();
        assert_eq!(got, b"abcdefghij");
        writer.await.unwrap();
    }

    #[tokio::test]
    async fn larger_than_one_read_chunk() {
        let data = vec![7u8; READ_CHUNK_SIZE * 3 + 17];
        let mut cursor = &data[..];
        let got = recv_exact(&mut cursor, data.len()).await.unwrap();
        assert_eq!(got, data);
    }

    #[tokio::test]
    async fn leaves_surplus_unread() {
        let mut cursor = &b"HEADbody"[..];
        assert_eq!(recv_exact(&mut cursor, 4).await.unwrap(), b"HEAD");
        assert_eq!(cursor, b"body");
    }

    #[tokio::test]
    async fn early_close_is_incomplete() {
        let mut cursor = &b"short"[..];
        let err = recv_exact(&mut cursor, 9).await.unwrap_err();
        assert!(matches!(
            err,
            TransferError::Incomplete {
                expected: 9,
                received: 5
            }
        ));
    }

    #[tokio::test]
    async fn zero_bytes_needs_no_data() {
        let mut cursor = &b""[..];
        assert!(recv_exact(&mut cursor, 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn reads_until_close() {
        let mut cursor = &b"a.txt\nb.txt\n"[..];
        let got = recv_to_end(&mut cursor, 1024).await.unwrap();
        assert_eq!(got, b"a.txt\nb.txt\n");
    }

    #[tokio::test]
    async fn enforces_limit() {
        let data = vec![0u8; 100];
        let mut cursor = &data[..];
        let err = recv_to_end(&mut cursor, 99).await.unwrap_err();
        assert!(matches!(err, TransferError::TooLarge { limit: 99 }));
    }
}
