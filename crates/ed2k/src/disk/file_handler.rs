use std::{
    io::{self, SeekFrom},
    path::{Path, PathBuf},
};

use bytes::BytesMut;
use tokio::{
    fs::{self, File, OpenOptions},
    io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt},
};
use tracing::debug;

/// The backing file of one transfer, opened on first use.
#[derive(Debug)]
pub struct FileHandler {
    path: PathBuf,
    writable: bool,
    file: Option<File>,
}

impl FileHandler {
    /// Handler that creates the file if needed and writes to it.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), writable: true, file: None }
    }

    /// Handler of a file that is only read, a finished download being
    /// shared for instance.
    pub fn read_only(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), writable: false, file: None }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_writable(&self) -> bool {
        self.writable
    }

    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }

    async fn file(&mut self) -> io::Result<&mut File> {
        let file = match self.file.take() {
            Some(file) => file,
            None => {
                let file = OpenOptions::new()
                    .read(true)
                    .write(self.writable)
                    .create(self.writable)
                    .truncate(false)
                    .open(&self.path)
                    .await?;
                debug!("opened {:?} writable: {}", self.path, self.writable);
                file
            }
        };
        Ok(self.file.insert(file))
    }

    /// Write all of `data` at `offset`.
    pub async fn write_at(&mut self, offset: u64, data: &[u8]) -> io::Result<()> {
        if !self.writable {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "file opened read only",
            ));
        }

        let file = self.file().await?;
        file.seek(SeekFrom::Start(offset)).await?;

        let mut written = 0;
        while written < data.len() {
            let n = file.write(&data[written..]).await?;
            if n == 0 {
                return Err(io::ErrorKind::WriteZero.into());
            }
            written += n;
        }
        file.flush().await
    }

    /// Replace the content of `buf` with the `len` bytes at `offset`.
    pub async fn read_at(&mut self, offset: u64, buf: &mut BytesMut, len: usize) -> io::Result<()> {
        let file = self.file().await?;
        file.seek(SeekFrom::Start(offset)).await?;

        buf.clear();
        buf.resize(len, 0);
        file.read_exact(&mut buf[..]).await?;
        Ok(())
    }

    /// Flush and close the file, the next operation opens it again.
    pub async fn close(&mut self) -> io::Result<()> {
        if let Some(mut file) = self.file.take() {
            file.flush().await?;
            debug!("closed {:?}", self.path);
        }
        Ok(())
    }

    /// Drop the file without flushing, used once an operation failed.
    pub fn force_close(&mut self) {
        self.file = None;
    }

    pub async fn delete_file(&mut self) -> io::Result<()> {
        self.force_close();
        fs::remove_file(&self.path).await
    }
}
