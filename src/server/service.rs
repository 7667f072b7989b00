//! File operation handlers.
//!
//! Each handler is stateless over the filesystem below the configured root
//! directory and produces a `Response` carrying the op-specific status, the
//! post-operation mtime (or -1 on error), and a short human-readable message.
//! Mutating handlers additionally push the new file content to the monitor
//! registry. I/O failures never escape as errors; they become the handler's
//! error status so the server keeps serving.

use crate::protocol::{Op, Request, Response, Status, NO_MODIFIED_TIME};
use crate::server::MonitorRegistry;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::net::SocketAddr;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, UNIX_EPOCH};
use tracing::debug;

/// Handlers for the file operations the server exposes.
#[derive(Debug)]
pub struct FileService {
    root: PathBuf,
    monitors: Arc<MonitorRegistry>,
}

impl FileService {
    pub fn new(root: PathBuf, monitors: Arc<MonitorRegistry>) -> Self {
        Self { root, monitors }
    }

    /// Resolves a request path below the configured root, or `None` for a
    /// path that would escape it. Only plain components are accepted; `..`
    /// is rejected rather than normalized. With the default root of `/`,
    /// absolute request paths map to themselves.
    fn resolve(&self, path: &str) -> Option<PathBuf> {
        let mut resolved = self.root.clone();
        for component in Path::new(path.trim_start_matches('/')).components() {
            match component {
                Component::Normal(part) => resolved.push(part),
                Component::CurDir => {}
                _ => return None,
            }
        }
        Some(resolved)
    }

    /// Dispatches one request to its handler.
    pub async fn handle(&self, request: &Request, peer: SocketAddr) -> Response {
        debug!(op = %request.op, path = %request.path, %peer, "handling request");
        match request.op {
            Op::Read => self.read(request),
            Op::WriteInsert => self.write_insert(request).await,
            Op::WriteDelete => self.write_delete(request).await,
            Op::Monitor => self.register_monitor(request, peer).await,
            Op::FileInfo => self.file_info(request),
            // Shutdown is intercepted before dispatch ever reaches us.
            Op::Shutdown => Response::status_only(
                Status::InvalidOperation,
                "operation not served by the file service",
            ),
        }
    }

    fn read(&self, request: &Request) -> Response {
        match self.read_inner(request) {
            Ok(response) => response,
            Err(e) => Response::status_only(
                Status::ReadError,
                format!("error reading {}: {e}", request.path),
            ),
        }
    }

    fn read_inner(&self, request: &Request) -> io::Result<Response> {
        let Some(path) = self.resolve(&request.path) else {
            return Ok(Response::status_only(
                Status::ReadError,
                format!("path {} escapes the served root", request.path),
            ));
        };
        if !path.exists() {
            return Ok(Response::status_only(
                Status::ReadError,
                format!("file {} does not exist", request.path),
            ));
        }

        let file = File::open(&path)?;
        let file_len = file.metadata()?.len();
        if request.offset >= file_len {
            return Ok(Response::status_only(
                Status::ReadError,
                format!(
                    "offset {} is beyond the file length {file_len}",
                    request.offset
                ),
            ));
        }

        let mut file = file;
        file.seek(SeekFrom::Start(request.offset))?;
        let mut data = Vec::with_capacity(request.length.min(file_len - request.offset) as usize);
        file.take(request.length).read_to_end(&mut data)?;

        let modified = mtime_ms(&path)?;
        if (data.len() as u64) < request.length {
            let message = format!(
                "read truncated to {} bytes by end of file (file length {file_len})",
                data.len()
            );
            return Ok(Response::new(Status::ReadIncomplete, data, message, modified));
        }

        let message = format!("read {} bytes (file length {file_len})", data.len());
        Ok(Response::new(Status::ReadSuccess, data, message, modified))
    }

    async fn write_insert(&self, request: &Request) -> Response {
        match self.write_insert_inner(request).await {
            Ok(response) => response,
            Err(e) => Response::status_only(
                Status::WriteInsertError,
                format!("error writing to {}: {e}", request.path),
            ),
        }
    }

    async fn write_insert_inner(&self, request: &Request) -> io::Result<Response> {
        let Some(path) = self.resolve(&request.path) else {
            return Ok(Response::status_only(
                Status::WriteInsertError,
                format!("path {} escapes the served root", request.path),
            ));
        };
        if !path.exists() {
            return Ok(Response::status_only(
                Status::WriteInsertError,
                format!("file {} does not exist", request.path),
            ));
        }

        // Preserve the suffix, overwrite it with the payload, then append the
        // suffix back. A crash mid-sequence leaves the file in an undefined
        // state; this service does not stage through a temporary file.
        let mut file = OpenOptions::new().read(true).write(true).open(&path)?;
        file.seek(SeekFrom::Start(request.offset))?;
        let mut suffix = Vec::new();
        file.read_to_end(&mut suffix)?;

        file.seek(SeekFrom::Start(request.offset))?;
        file.write_all(&request.payload)?;
        file.write_all(&suffix)?;
        file.flush()?;
        let new_len = file.metadata()?.len();
        drop(file);

        let modified = mtime_ms(&path)?;
        let content = fs::read(&path)?;
        self.monitors
            .notify(&request.path, &content, Op::WriteInsert, modified)
            .await;

        let message = format!(
            "inserted {} bytes at offset {} (file length now {new_len})",
            request.payload.len(),
            request.offset
        );
        Ok(Response::new(Status::WriteInsertSuccess, Vec::new(), message, modified))
    }

    async fn write_delete(&self, request: &Request) -> Response {
        match self.write_delete_inner(request).await {
            Ok(response) => response,
            Err(e) => Response::status_only(
                Status::WriteDeleteError,
                format!("error deleting from {}: {e}", request.path),
            ),
        }
    }

    async fn write_delete_inner(&self, request: &Request) -> io::Result<Response> {
        let Some(path) = self.resolve(&request.path) else {
            return Ok(Response::status_only(
                Status::WriteDeleteError,
                format!("path {} escapes the served root", request.path),
            ));
        };
        if !path.exists() {
            return Ok(Response::status_only(
                Status::WriteDeleteError,
                format!("file {} does not exist", request.path),
            ));
        }

        let mut file = OpenOptions::new().read(true).write(true).open(&path)?;
        let file_len = file.metadata()?.len();
        let delete_end = request.offset.checked_add(request.length);
        let out_of_bounds = delete_end.map_or(true, |end| end > file_len);
        if out_of_bounds {
            return Ok(Response::status_only(
                Status::WriteDeleteError,
                format!(
                    "cannot delete {} bytes at offset {}: file length is {file_len}",
                    request.length, request.offset
                ),
            ));
        }

        file.seek(SeekFrom::Start(request.offset + request.length))?;
        let mut suffix = Vec::new();
        file.read_to_end(&mut suffix)?;

        file.set_len(request.offset)?;
        file.seek(SeekFrom::Start(request.offset))?;
        file.write_all(&suffix)?;
        file.flush()?;
        let new_len = file.metadata()?.len();
        drop(file);

        let modified = mtime_ms(&path)?;
        let content = fs::read(&path)?;
        self.monitors
            .notify(&request.path, &content, Op::WriteDelete, modified)
            .await;

        let message = format!(
            "deleted {} bytes at offset {} (file length now {new_len})",
            request.length, request.offset
        );
        Ok(Response::new(Status::WriteDeleteSuccess, Vec::new(), message, modified))
    }

    async fn register_monitor(&self, request: &Request, peer: SocketAddr) -> Response {
        self.monitors
            .register(
                &request.path,
                peer,
                Duration::from_millis(request.monitor_duration_ms),
            )
            .await;
        Response::status_only(
            Status::MonitorSuccess,
            format!(
                "monitoring {} for {} ms",
                request.path, request.monitor_duration_ms
            ),
        )
    }

    fn file_info(&self, request: &Request) -> Response {
        match self.file_info_inner(request) {
            Ok(response) => response,
            Err(e) => Response::status_only(
                Status::FileInfoError,
                format!("error fetching info for {}: {e}", request.path),
            ),
        }
    }

    fn file_info_inner(&self, request: &Request) -> io::Result<Response> {
        let Some(path) = self.resolve(&request.path) else {
            return Ok(Response::status_only(
                Status::FileInfoError,
                format!("path {} escapes the served root", request.path),
            ));
        };
        if !path.exists() {
            return Ok(Response::status_only(
                Status::FileInfoError,
                format!("file {} does not exist", request.path),
            ));
        }

        let metadata = fs::metadata(&path)?;
        let modified = mtime_ms(&path)?;
        let last_modified: chrono::DateTime<chrono::Local> = metadata.modified()?.into();

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let hidden = name.starts_with('.');
        let (readable, writable, executable) = permission_flags(&metadata);
        let absolute = fs::canonicalize(&path)?;
        let parent = absolute
            .parent()
            .map(|p| p.display().to_string())
            .unwrap_or_default();

        let record = format!(
            "name: {name}\n\
             size: {} bytes\n\
             last-modified: {}\n\
             readable: {readable}\n\
             writable: {writable}\n\
             executable: {executable}\n\
             hidden: {hidden}\n\
             absolute-path: {}\n\
             parent: {parent}\n",
            metadata.len(),
            last_modified.format("%Y-%m-%d %H:%M:%S"),
            absolute.display(),
        );

        Ok(Response::new(
            Status::FileInfoSuccess,
            record.into_bytes(),
            "file info retrieved",
            modified,
        ))
    }
}

/// Owner read/write/execute flags for the file-info record.
#[cfg(unix)]
fn permission_flags(metadata: &fs::Metadata) -> (bool, bool, bool) {
    use std::os::unix::fs::PermissionsExt;
    let mode = metadata.permissions().mode();
    (mode & 0o400 != 0, mode & 0o200 != 0, mode & 0o100 != 0)
}

#[cfg(not(unix))]
fn permission_flags(metadata: &fs::Metadata) -> (bool, bool, bool) {
    (true, !metadata.permissions().readonly(), false)
}

/// Millisecond mtime of a file, for the reply's reconciliation field.
fn mtime_ms(path: &Path) -> io::Result<i64> {
    let modified = fs::metadata(path)?.modified()?;
    Ok(modified
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(NO_MODIFIED_TIME))
}
