//! Streaming upload validation and persistence.
//!
//! An upload moves through `Start → HeaderCheck → Streaming` and ends either
//! `Committed` (staging file renamed onto the destination) or `Aborted`
//! (staging file removed). The body is never held in memory as a whole: it is
//! processed in `chunk_size` slices and written through a buffer of the same
//! size.
//!
//! ## Cleanup
//!
//! The staging file is owned by a [`StagingFile`] guard that deletes it on
//! drop unless the upload was committed. Every error return goes through that
//! drop, and so does cancellation: if the request future is dropped because
//! the client went away, the guard still runs.

use std::fmt::Display;
use std::path::{Path, PathBuf};

use futures::{Stream, StreamExt};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt, BufWriter};
use tracing::{debug, info, trace};

use crate::config::IngestConfig;
use crate::error::{Error, Result};
use crate::store::{remove_if_exists, staging_path};

/// Leading bytes of every PDF file
pub const PDF_SIGNATURE: &[u8; 5] = b"%PDF-";

/// Validates and persists uploads according to an [`IngestConfig`].
#[derive(Debug, Clone)]
pub struct Ingestor {
    config: IngestConfig,
}

impl Ingestor {
    pub const fn new(config: IngestConfig) -> Self {
        Self { config }
    }

    pub const fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// Persist a byte stream at `destination`, returning the number of bytes
    /// written.
    ///
    /// Stream errors abort the upload as [`Error::UploadInterrupted`].
    pub async fn ingest<S, B, E>(&self, stream: S, destination: &Path) -> Result<u64>
    where
        S: Stream<Item = std::result::Result<B, E>>,
        B: AsRef<[u8]>,
        E: Display,
    {
        let mut stream = std::pin::pin!(stream);
        let mut upload = StagedUpload::create(&self.config, destination).await?;

        while let Some(item) = stream.next().await {
            let bytes = item.map_err(|e| Error::UploadInterrupted(e.to_string()))?;
            upload.accept(bytes.as_ref()).await?;
        }

        upload.commit(destination).await
    }

    /// Persist everything readable from `reader` at `destination`.
    pub async fn ingest_reader<R>(&self, reader: R, destination: &Path) -> Result<u64>
    where
        R: AsyncRead,
    {
        let mut reader = std::pin::pin!(reader);
        let mut upload = StagedUpload::create(&self.config, destination).await?;
        let mut buf = vec![0u8; self.config.chunk_size];

        loop {
            let n = reader
                .read(&mut buf)
                .await
                .map_err(|e| Error::UploadInterrupted(e.to_string()))?;
            if n == 0 {
                break;
            }
            upload.accept(&buf[..n]).await?;
        }

        upload.commit(destination).await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IngestState {
    HeaderCheck,
    Streaming,
}

/// An upload in progress: staging file, header buffer and running total.
struct StagedUpload<'a> {
    config: &'a IngestConfig,
    state: IngestState,
    header: Vec<u8>,
    total: u64,
    writer: BufWriter<File>,
    staging: StagingFile,
}

impl<'a> StagedUpload<'a> {
    async fn create(config: &'a IngestConfig, destination: &Path) -> Result<Self> {
        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let path = staging_path(destination);
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await?;
        trace!("Start -> HeaderCheck for {}", path.display());

        Ok(Self {
            config,
            state: IngestState::HeaderCheck,
            header: Vec::with_capacity(config.header_window.min(1024 * 64)),
            total: 0,
            writer: BufWriter::with_capacity(config.chunk_size, file),
            staging: StagingFile::new(path),
        })
    }

    /// Feed bytes from the source, one `chunk_size` slice at a time.
    async fn accept(&mut self, bytes: &[u8]) -> Result<()> {
        for chunk in bytes.chunks(self.config.chunk_size.max(1)) {
            self.accept_chunk(chunk).await?;
        }
        Ok(())
    }

    async fn accept_chunk(&mut self, chunk: &[u8]) -> Result<()> {
        if self.state == IngestState::HeaderCheck {
            let need = self.config.header_window.saturating_sub(self.header.len());
            self.header.extend_from_slice(&chunk[..need.min(chunk.len())]);

            match check_signature(&self.header, self.config.header_window) {
                Signature::Valid => {
                    trace!("HeaderCheck -> Streaming for {}", self.staging.path.display());
                    self.state = IngestState::Streaming;
                }
                Signature::Invalid => {
                    debug!("Rejected upload: missing PDF signature");
                    return Err(Error::InvalidFormat);
                }
                Signature::Undecided => {}
            }
        }

        self.total += chunk.len() as u64;
        if self.total > self.config.max_upload_bytes {
            debug!(
                "Rejected upload: {} bytes exceeds limit of {}",
                self.total, self.config.max_upload_bytes
            );
            return Err(Error::PayloadTooLarge {
                limit: self.config.max_upload_bytes,
            });
        }

        self.writer.write_all(chunk).await?;
        Ok(())
    }

    async fn commit(mut self, destination: &Path) -> Result<u64> {
        if self.total == 0 {
            return Err(Error::EmptyUpload);
        }
        // Too short to ever show the signature.
        if self.state == IngestState::HeaderCheck {
            return Err(Error::InvalidFormat);
        }

        self.writer.flush().await?;
        self.writer.get_ref().sync_all().await?;
        drop(self.writer);

        tokio::fs::rename(&self.staging.path, destination).await?;
        self.staging.disarm();

        info!("Stored {} ({} bytes)", destination.display(), self.total);
        Ok(self.total)
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Signature {
    Valid,
    Invalid,
    Undecided,
}

/// Check the accumulated header once enough non-whitespace bytes are in.
fn check_signature(header: &[u8], window: usize) -> Signature {
    let stripped = trim_leading_whitespace(header);
    if stripped.len() >= PDF_SIGNATURE.len() {
        if stripped.starts_with(PDF_SIGNATURE) {
            Signature::Valid
        } else {
            Signature::Invalid
        }
    } else if !stripped.is_empty() && !PDF_SIGNATURE.starts_with(stripped) {
        // Can no longer turn into a valid prefix.
        Signature::Invalid
    } else if header.len() >= window {
        Signature::Invalid
    } else {
        Signature::Undecided
    }
}

fn trim_leading_whitespace(bytes: &[u8]) -> &[u8] {
    let start = bytes
        .iter()
        .position(|b| !matches!(b, b' ' | b'\t' | b'\n' | b'\r' | 0x0b | 0x0c))
        .unwrap_or(bytes.len());
    &bytes[start..]
}

/// Deletes the staging file on drop unless disarmed.
struct StagingFile {
    path: PathBuf,
    armed: bool,
}

impl StagingFile {
    const fn new(path: PathBuf) -> Self {
        Self { path, armed: true }
    }

    const fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for StagingFile {
    fn drop(&mut self) {
        if self.armed {
            trace!("Aborted, discarding {}", self.path.display());
            remove_if_exists(&self.path);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use futures::stream;
    use std::io;
    use tempfile::TempDir;

    fn small_config() -> IngestConfig {
        IngestConfig {
            chunk_size: 8,
            header_window: 16,
            max_upload_bytes: 64,
        }
    }

    fn chunks(parts: &[&'static [u8]]) -> impl Stream<Item = io::Result<Bytes>> + use<> {
        let items: Vec<io::Result<Bytes>> =
            parts.iter().map(|p| Ok(Bytes::from_static(p))).collect();
        stream::iter(items)
    }

    fn dir_is_empty(dir: &Path) -> bool {
        std::fs::read_dir(dir).unwrap().next().is_none()
    }

    #[test]
    fn test_signature_checks() {
        assert_eq!(check_signature(b"%PDF-1.7", 1024), Signature::Valid);
        assert_eq!(check_signature(b" \r\n\t%PDF-1.4", 1024), Signature::Valid);
        assert_eq!(check_signature(b"%PD", 1024), Signature::Undecided);
        assert_eq!(check_signature(b"    ", 1024), Signature::Undecided);
        assert_eq!(check_signature(b"GIF89a", 1024), Signature::Invalid);
        assert_eq!(check_signature(b"x", 1024), Signature::Invalid);
        assert_eq!(check_signature(b"        ", 8), Signature::Invalid);
    }

    #[tokio::test]
    async fn test_valid_upload_commits() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("inputs").join("doc.pdf");
        let ingestor = Ingestor::new(small_config());

        let size = ingestor
            .ingest(chunks(&[b"%PDF-1.7\n", b"body bytes ", b"%%EOF"]), &dest)
            .await
            .unwrap();

        assert_eq!(size, 25);
        assert_eq!(std::fs::read(&dest).unwrap(), b"%PDF-1.7\nbody bytes %%EOF");
        assert!(!staging_path(&dest).exists());
    }

    #[tokio::test]
    async fn test_signature_split_across_items() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("doc.pdf");
        let ingestor = Ingestor::new(small_config());

        let size = ingestor
            .ingest(chunks(&[b"  ", b"%P", b"DF-1.3 rest"]), &dest)
            .await
            .unwrap();

        assert_eq!(size, 15);
        assert!(dest.exists());
    }

    #[tokio::test]
    async fn test_wrong_signature_is_rejected() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("doc.pdf");
        let ingestor = Ingestor::new(small_config());

        let err = ingestor
            .ingest(chunks(&[b"PK\x03\x04 zip archive"]), &dest)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::InvalidFormat));
        assert!(dir_is_empty(dir.path()));
    }

    #[tokio::test]
    async fn test_short_body_is_rejected() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("doc.pdf");
        let ingestor = Ingestor::new(small_config());

        let err = ingestor.ingest(chunks(&[b"%PD"]), &dest).await.unwrap_err();

        assert!(matches!(err, Error::InvalidFormat));
        assert!(dir_is_empty(dir.path()));
    }

    #[tokio::test]
    async fn test_empty_upload() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("doc.pdf");
        let ingestor = Ingestor::new(small_config());

        let err = ingestor.ingest(chunks(&[]), &dest).await.unwrap_err();

        assert!(matches!(err, Error::EmptyUpload));
        assert!(dir_is_empty(dir.path()));
    }

    #[tokio::test]
    async fn test_oversized_upload_stops_early() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("doc.pdf");
        let ingestor = Ingestor::new(small_config());

        let items: Vec<io::Result<Bytes>> = vec![
            Ok(Bytes::from_static(b"%PDF-1.7")),
            Ok(Bytes::from(vec![b'x'; 60])),
            // Reading this far would surface as UploadInterrupted instead.
            Err(io::Error::other("body should not be read past the limit")),
        ];

        let err = ingestor.ingest(stream::iter(items), &dest).await.unwrap_err();

        assert!(matches!(err, Error::PayloadTooLarge { limit: 64 }));
        assert!(dir_is_empty(dir.path()));
    }

    #[tokio::test]
    async fn test_exactly_at_limit_is_accepted() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("doc.pdf");
        let ingestor = Ingestor::new(small_config());

        let mut body = b"%PDF-".to_vec();
        body.resize(64, b'0');
        let size = ingestor
            .ingest(stream::iter(vec![Ok::<_, io::Error>(body)]), &dest)
            .await
            .unwrap();

        assert_eq!(size, 64);
    }

    #[tokio::test]
    async fn test_stream_error_cleans_up() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("doc.pdf");
        let ingestor = Ingestor::new(small_config());

        let items: Vec<io::Result<Bytes>> = vec![
            Ok(Bytes::from_static(b"%PDF-1.7 partial")),
            Err(io::Error::new(io::ErrorKind::ConnectionReset, "client went away")),
        ];

        let err = ingestor.ingest(stream::iter(items), &dest).await.unwrap_err();

        assert!(matches!(err, Error::UploadInterrupted(ref m) if m.contains("client went away")));
        assert!(dir_is_empty(dir.path()));
    }

    #[tokio::test]
    async fn test_cancelled_ingest_cleans_up() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("doc.pdf");
        let ingestor = Ingestor::new(small_config());

        // First chunk arrives, then the body stalls forever.
        let body = stream::iter(vec![Ok::<_, io::Error>(Bytes::from_static(b"%PDF-1.7"))])
            .chain(stream::pending());

        let result = tokio::time::timeout(
            std::time::Duration::from_millis(50),
            ingestor.ingest(body, &dest),
        )
        .await;

        assert!(result.is_err(), "ingest should still be waiting for data");
        assert!(dir_is_empty(dir.path()));
    }

    #[tokio::test]
    async fn test_ingest_reader() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("doc.pdf");
        let ingestor = Ingestor::new(small_config());

        let body: &[u8] = b"\n%PDF-1.4 read from a reader";
        let size = ingestor.ingest_reader(body, &dest).await.unwrap();

        assert_eq!(size, body.len() as u64);
        assert_eq!(std::fs::read(&dest).unwrap(), body);
    }

    #[tokio::test]
    async fn test_ingest_reader_rejects_non_pdf() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("doc.pdf");
        let ingestor = Ingestor::new(small_config());

        let body: &[u8] = b"<html>not a pdf</html>";
        let err = ingestor.ingest_reader(body, &dest).await.unwrap_err();

        assert!(matches!(err, Error::InvalidFormat));
        assert!(dir_is_empty(dir.path()));
    }

    #[tokio::test]
    async fn test_concurrent_ingests_stay_separate() {
        let dir = TempDir::new().unwrap();
        let first = dir.path().join("a.pdf");
        let second = dir.path().join("b.pdf");
        let ingestor = Ingestor::new(IngestConfig::default());

        let body_a: Vec<u8> = [b"%PDF-A".as_slice(), &[b'a'; 4096]].concat();
        let body_b: Vec<u8> = [b"%PDF-B".as_slice(), &[b'b'; 4096]].concat();
        let stream_a = stream::iter(
            body_a
                .chunks(100)
                .map(|c| Ok::<_, io::Error>(c.to_vec()))
                .collect::<Vec<_>>(),
        );
        let stream_b = stream::iter(
            body_b
                .chunks(100)
                .map(|c| Ok::<_, io::Error>(c.to_vec()))
                .collect::<Vec<_>>(),
        );

        let (a, b) = tokio::join!(
            ingestor.ingest(stream_a, &first),
            ingestor.ingest(stream_b, &second)
        );
        a.unwrap();
        b.unwrap();

        assert_eq!(std::fs::read(&first).unwrap(), body_a);
        assert_eq!(std::fs::read(&second).unwrap(), body_b);
    }

    #[tokio::test]
    async fn test_existing_staging_file_is_not_reused() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("doc.pdf");
        std::fs::write(staging_path(&dest), b"someone else's upload").unwrap();
        let ingestor = Ingestor::new(small_config());

        let err = ingestor
            .ingest(chunks(&[b"%PDF-1.7"]), &dest)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Io(_)));
        assert_eq!(
            std::fs::read(staging_path(&dest)).unwrap(),
            b"someone else's upload"
        );
    }
}
