//! Ephemeral working files.
//!
//! Every file the service writes lives in the configured output directory
//! under a fresh UUID name and is owned by an [`EphemeralFile`] guard. The
//! guard removes the file when dropped, so error paths clean up the same way
//! success paths do. Paths that know they are done with a file call
//! [`EphemeralFile::remove`] instead, which deletes it before returning.
//! Files that back a response body are handed to [`stream_then_delete`],
//! which keeps the guard alive until the body has been fully sent or
//! abandoned.

use crate::error::Result;
use axum::body::Body;
use axum::extract::multipart::Field;
use bytes::{Bytes, BytesMut};
use std::io::ErrorKind;
use std::mem::ManuallyDrop;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, warn};
use uuid::Uuid;

const CHUNK_SIZE: usize = 64 * 1024;

/// Build `<dir>/<uuid-v4>` with no extension
pub fn unique_prefix(dir: &Path) -> PathBuf {
    dir.join(Uuid::new_v4().to_string())
}

/// Build `<dir>/<uuid-v4>.<extension>`
pub fn unique_path(dir: &Path, extension: &str) -> PathBuf {
    unique_prefix(dir).with_extension(extension)
}

/// Remove a file if it is still there. Safe to call more than once.
pub fn delete_file(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => debug!("Deleted {}", path.display()),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to delete {}: {}", path.display(), e),
    }
}

/// Async form of [`delete_file`]
pub async fn delete_file_async(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!("Deleted {}", path.display()),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to delete {}: {}", path.display(), e),
    }
}

/// Owns a path on disk and deletes it on drop
#[derive(Debug)]
pub struct EphemeralFile {
    path: PathBuf,
}

impl EphemeralFile {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Give up ownership without deleting the file
    pub fn keep(self) -> PathBuf {
        let mut this = ManuallyDrop::new(self);
        std::mem::take(&mut this.path)
    }

    /// Delete the file now and wait for it to be gone
    pub async fn remove(self) {
        let path = self.keep();
        delete_file_async(&path).await;
    }
}

impl Drop for EphemeralFile {
    fn drop(&mut self) {
        let path = std::mem::take(&mut self.path);
        match tokio::runtime::Handle::try_current() {
            // Inside the runtime the unlink runs on the blocking pool.
            Ok(handle) => {
                handle.spawn_blocking(move || delete_file(&path));
            }
            Err(_) => delete_file(&path),
        }
    }
}

/// Stream a multipart field into a new file under `dir`.
///
/// The file is opened with create-new semantics so an existing file is never
/// overwritten.
pub async fn save_upload(
    mut field: Field<'_>,
    dir: &Path,
    extension: &str,
) -> Result<EphemeralFile> {
    let path = unique_path(dir, extension);
    let mut file = tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&path)
        .await?;

    // Only take ownership once the file is ours.
    let guard = EphemeralFile::new(path);

    match copy_field(&mut field, &mut file).await {
        Ok(written) => {
            debug!("Saved upload to {} ({} bytes)", guard.path().display(), written);
            Ok(guard)
        }
        Err(e) => {
            drop(file);
            guard.remove().await;
            Err(e)
        }
    }
}

async fn copy_field(field: &mut Field<'_>, file: &mut tokio::fs::File) -> Result<usize> {
    let mut written = 0usize;
    while let Some(chunk) = field.chunk().await? {
        file.write_all(&chunk).await?;
        written += chunk.len();
    }
    file.flush().await?;
    Ok(written)
}

/// Response body that streams `file` and deletes it once the stream is
/// exhausted or dropped.
pub fn stream_then_delete(file: tokio::fs::File, guard: EphemeralFile) -> Body {
    let stream = futures::stream::try_unfold((file, guard), |(mut file, guard)| async move {
        match next_chunk(&mut file).await {
            Ok(Some(bytes)) => Ok(Some((bytes, (file, guard)))),
            // EOF or a read error ends the body either way.
            done => {
                drop(file);
                guard.remove().await;
                done.map(|_| None)
            }
        }
    });

    Body::from_stream(stream)
}

async fn next_chunk(file: &mut tokio::fs::File) -> std::io::Result<Option<Bytes>> {
    let mut buf = BytesMut::with_capacity(CHUNK_SIZE);
    if file.read_buf(&mut buf).await? == 0 {
        return Ok(None);
    }
    Ok(Some(buf.freeze()))
}
