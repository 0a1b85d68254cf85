//! Incremental digests over async readers.
//!
//! Source archives can run to hundreds of megabytes, so the digest is fed
//! in fixed-size chunks instead of buffering the whole payload.

use std::io;
use std::path::Path;

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::Md5Digest;

const READ_BUFFER_SIZE: usize = 8192;

/// Digest everything the reader yields, returning the digest and the total
/// number of bytes read.
pub async fn digest_reader<R: AsyncRead + Unpin>(mut reader: R) -> io::Result<(Md5Digest, u64)> {
    let mut ctx = md5::Context::new();
    let mut buffer = vec![0u8; READ_BUFFER_SIZE];
    let mut total = 0u64;

    loop {
        let n = reader.read(&mut buffer).await?;
        if n == 0 {
            break;
        }
        ctx.consume(&buffer[..n]);
        total += n as u64;
    }

    Ok((Md5Digest::from_bytes(ctx.finalize().0), total))
}

/// Digest a file on disk.
pub async fn digest_file(path: &Path) -> io::Result<(Md5Digest, u64)> {
    let file = tokio::fs::File::open(path).await?;
    digest_reader(file).await
}
