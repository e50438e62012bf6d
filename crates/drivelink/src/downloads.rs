//! Content downloads: media, exports, and chunked streams.
//!
//! Media downloads (`alt=media`) are attempted first. Drive refuses them for
//! native Google documents with a 403 `fileNotDownloadable`, in which case the
//! export endpoint is used instead.

use std::path::{Path, PathBuf};

use log::{debug, info};
use reqwest::Response;
use tokio::io::AsyncWriteExt;

use drivelink_core::{remove_prefix, BLOCK_SIZE};

use crate::client::{DriveClient, ALL_DRIVES};
use crate::types::{mime_types, DriveError, DriveErrorKind, DriveResult};

/// Progress callback: `(bytes transferred, total size if known)`.
pub type Progress<'a> = &'a mut (dyn FnMut(u64, Option<u64>) + Send);

/// An open download and the MIME type it was requested as.
#[derive(Debug)]
pub struct OpenDownload {
    pub response: Response,
    /// `Some` when the export endpoint was used.
    pub export_mime: Option<String>,
}

/// `GET files/{id}?alt=media`.
pub async fn media(client: &DriveClient, file_id: &str) -> DriveResult<Response> {
    client
        .get_response(
            &client.api_url(&format!("files/{}", file_id)),
            &[("alt", "media"), ALL_DRIVES],
        )
        .await
}

/// `GET files/{id}/export?mimeType=...`.
pub async fn export(client: &DriveClient, file_id: &str, mime_type: &str) -> DriveResult<Response> {
    client
        .get_response(
            &client.api_url(&format!("files/{}/export", file_id)),
            &[("mimeType", mime_type), ALL_DRIVES],
        )
        .await
}

/// Open a media download, falling back to an export (default `text/plain`)
/// when the file has no binary content.
pub async fn open(
    client: &DriveClient,
    file_id: &str,
    mime_type: Option<&str>,
) -> DriveResult<OpenDownload> {
    match media(client, file_id).await {
        Ok(response) => Ok(OpenDownload {
            response,
            export_mime: None,
        }),
        Err(e) if e.is_not_downloadable() => {
            let mime = mime_type.unwrap_or(mime_types::TEXT_PLAIN);
            debug!("{} is not downloadable, exporting as {}", file_id, mime);
            let response = export(client, file_id, mime).await?;
            Ok(OpenDownload {
                response,
                export_mime: Some(mime.to_string()),
            })
        }
        Err(e) => Err(e),
    }
}

/// Stream a response body into `path`, reporting progress after each chunk.
pub async fn write_to_file(
    mut response: Response,
    path: &Path,
    mut progress: Option<Progress<'_>>,
) -> DriveResult<u64> {
    let total = response.content_length();
    let mut file = tokio::fs::File::create(path).await.map_err(|e| {
        DriveError::new(
            DriveErrorKind::DownloadFailed,
            format!("Cannot create file '{}': {}", path.display(), e),
        )
    })?;

    let mut transferred = 0u64;
    while let Some(chunk) = next_chunk(&mut response).await? {
        file.write_all(&chunk).await.map_err(|e| {
            DriveError::new(DriveErrorKind::DownloadFailed, format!("Write error: {e}"))
        })?;
        transferred += chunk.len() as u64;
        if let Some(cb) = progress.as_deref_mut() {
            cb(transferred, total);
        }
    }
    file.flush().await.map_err(|e| {
        DriveError::new(DriveErrorKind::DownloadFailed, format!("Flush error: {e}"))
    })?;

    info!("Downloaded {} bytes to {}", transferred, path.display());
    Ok(transferred)
}

/// Remove `prefix` from the start of a local file in place.
pub async fn strip_file_prefix(path: &Path, prefix: &'static [u8]) -> DriveResult<bool> {
    let path: PathBuf = path.to_path_buf();
    tokio::task::spawn_blocking(move || -> DriveResult<bool> {
        let mut file = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)?;
        Ok(remove_prefix(&mut file, prefix, BLOCK_SIZE)?)
    })
    .await
    .map_err(|e| DriveError::new(DriveErrorKind::Other, format!("Prefix task failed: {e}")))?
}

async fn next_chunk(response: &mut Response) -> DriveResult<Option<Vec<u8>>> {
    response
        .chunk()
        .await
        .map(|c| c.map(|b| b.to_vec()))
        .map_err(|e| DriveError::new(DriveErrorKind::DownloadFailed, e.to_string()))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Streaming reader
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Chunked reader over a download.
///
/// The first chunk is read on construction so that request errors surface
/// immediately; a prefix (e.g. a BOM) can be stripped from it.
#[derive(Debug)]
pub struct ContentStream {
    response: Response,
    pending: Option<Vec<u8>>,
    size: Option<u64>,
    done: bool,
}

impl ContentStream {
    pub async fn new(mut response: Response, strip: Option<&[u8]>) -> DriveResult<Self> {
        let size = response.content_length();
        let mut pending = next_chunk(&mut response).await?;
        let mut done = pending.is_none();

        if let (Some(prefix), Some(head)) = (strip, pending.as_mut()) {
            // Chunk boundaries are arbitrary: gather enough bytes to see the
            // whole prefix before deciding.
            while head.len() < prefix.len() && !done {
                match next_chunk(&mut response).await? {
                    Some(more) => head.extend_from_slice(&more),
                    None => done = true,
                }
            }
            remove_prefix(&mut std::io::Cursor::new(&mut *head), prefix, BLOCK_SIZE)?;
        }
        if pending.as_ref().is_some_and(Vec::is_empty) {
            pending = None;
        }
        Ok(Self {
            response,
            pending,
            size,
            done,
        })
    }

    /// Next chunk, or `None` once the body is exhausted.
    pub async fn next_chunk(&mut self) -> DriveResult<Option<Vec<u8>>> {
        if let Some(chunk) = self.pending.take() {
            return Ok(Some(chunk));
        }
        if self.done {
            return Ok(None);
        }
        let chunk = next_chunk(&mut self.response).await?;
        self.done = chunk.is_none();
        Ok(chunk)
    }

    /// Total size announced by the server, if any.
    pub fn size(&self) -> Option<u64> {
        self.size
    }

    /// Drain the remaining chunks into one buffer.
    pub async fn read_to_end(mut self) -> DriveResult<Vec<u8>> {
        let mut out = Vec::new();
        while let Some(chunk) = self.next_chunk().await? {
            out.extend_from_slice(&chunk);
        }
        Ok(out)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;
    use drivelink_core::UTF8_BOM;
    use std::time::Duration;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    /// Serve one chunked response, pausing between chunks so each arrives
    /// as its own read.
    async fn chunked_body(chunks: Vec<Vec<u8>>) -> Response {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 4096];
            let _ = socket.read(&mut request).await.unwrap();
            socket
                .write_all(
                    b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\nConnection: close\r\n\r\n",
                )
                .await
                .unwrap();
            for chunk in chunks {
                socket
                    .write_all(format!("{:x}\r\n", chunk.len()).as_bytes())
                    .await
                    .unwrap();
                socket.write_all(&chunk).await.unwrap();
                socket.write_all(b"\r\n").await.unwrap();
                socket.flush().await.unwrap();
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
            socket.write_all(b"0\r\n\r\n").await.unwrap();
        });
        reqwest::get(format!("http://{}/export", addr)).await.unwrap()
    }

    // ── Prefix stripping ─────────────────────────────────────────

    #[tokio::test]
    async fn prefix_split_across_chunks_is_stripped() {
        let response = chunked_body(vec![vec![0xEF, 0xBB], b"\xBFHello".to_vec()]).await;
        let stream = ContentStream::new(response, Some(UTF8_BOM)).await.unwrap();
        assert_eq!(stream.read_to_end().await.unwrap(), b"Hello");
    }

    #[tokio::test]
    async fn body_of_only_the_prefix_is_empty() {
        let response = chunked_body(vec![vec![0xEF], vec![0xBB, 0xBF]]).await;
        let stream = ContentStream::new(response, Some(UTF8_BOM)).await.unwrap();
        assert!(stream.read_to_end().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn short_body_without_prefix_is_kept() {
        let response = chunked_body(vec![b"Hi".to_vec()]).await;
        let stream = ContentStream::new(response, Some(UTF8_BOM)).await.unwrap();
        assert_eq!(stream.read_to_end().await.unwrap(), b"Hi");
    }

    #[tokio::test]
    async fn prefix_kept_without_strip() {
        let response = chunked_body(vec![vec![0xEF, 0xBB], b"\xBFHi".to_vec()]).await;
        let stream = ContentStream::new(response, None).await.unwrap();
        assert_eq!(stream.size(), None);
        assert_eq!(stream.read_to_end().await.unwrap(), b"\xEF\xBB\xBFHi");
    }
}
