use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use fs_err::{File, OpenOptions};

use crate::error::{Result, SegyError};

/// How a [`FileDriver`] opens its file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileMode {
    Read,
    /// Read-write on an existing file.
    ReadWrite,
    /// Create or truncate, then read-write.
    Create,
}

/// Positional byte I/O with the bulk access patterns the trace stores need.
///
/// Offsets are absolute byte locations in the file.
pub trait BlockIo: Send {
    fn file_size(&mut self) -> Result<usize>;

    fn set_file_size(&mut self, size: usize) -> Result<()>;

    fn read(&mut self, offset: usize, buf: &mut [u8]) -> Result<()>;

    fn write(&mut self, offset: usize, buf: &[u8]) -> Result<()>;

    /// Read `count` blocks of `block` bytes, the `i`th starting at
    /// `offset + i * stride`, packed into `buf`.
    fn read_strided(
        &mut self,
        offset: usize,
        block: usize,
        stride: usize,
        count: usize,
        buf: &mut [u8],
    ) -> Result<()> {
        check_packed(block, count, buf.len())?;
        if block == 0 || count == 0 {
            return Ok(());
        }
        if stride == block {
            return self.read(offset, &mut buf[..block * count]);
        }
        for (i, chunk) in buf.chunks_exact_mut(block).take(count).enumerate() {
            self.read(offset + i * stride, chunk)?;
        }
        Ok(())
    }

    fn write_strided(
        &mut self,
        offset: usize,
        block: usize,
        stride: usize,
        count: usize,
        buf: &[u8],
    ) -> Result<()> {
        check_packed(block, count, buf.len())?;
        if block == 0 || count == 0 {
            return Ok(());
        }
        if stride == block {
            return self.write(offset, &buf[..block * count]);
        }
        for (i, chunk) in buf.chunks_exact(block).take(count).enumerate() {
            self.write(offset + i * stride, chunk)?;
        }
        Ok(())
    }

    /// Read one `block` at each of `offsets`, packed into `buf` in list order.
    /// Adjacent blocks are coalesced into a single read.
    fn read_list(&mut self, block: usize, offsets: &[usize], buf: &mut [u8]) -> Result<()> {
        check_packed(block, offsets.len(), buf.len())?;
        if block == 0 {
            return Ok(());
        }
        for (start, end) in contiguous_runs(block, offsets) {
            self.read(offsets[start], &mut buf[start * block..end * block])?;
        }
        Ok(())
    }

    fn write_list(&mut self, block: usize, offsets: &[usize], buf: &[u8]) -> Result<()> {
        check_packed(block, offsets.len(), buf.len())?;
        if block == 0 {
            return Ok(());
        }
        for (start, end) in contiguous_runs(block, offsets) {
            self.write(offsets[start], &buf[start * block..end * block])?;
        }
        Ok(())
    }

    fn sync(&mut self) -> Result<()>;
}

fn check_packed(block: usize, count: usize, len: usize) -> Result<()> {
    let needed = block.checked_mul(count).ok_or_else(|| SegyError::Codec {
        reason: format!("{count} blocks of {block} bytes overflow"),
    })?;
    if len < needed {
        return Err(SegyError::Codec {
            reason: format!("buffer of {len} bytes cannot hold {count} blocks of {block}"),
        });
    }
    Ok(())
}

/// Index ranges `[start, end)` of `offsets` that are back to back on disk.
fn contiguous_runs(block: usize, offsets: &[usize]) -> Vec<(usize, usize)> {
    let mut runs = Vec::new();
    let mut start = 0;
    for i in 1..=offsets.len() {
        if i == offsets.len() || offsets[i] != offsets[i - 1] + block {
            runs.push((start, i));
            start = i;
        }
    }
    runs
}

/// [`BlockIo`] over a local file.
#[derive(Debug)]
pub struct FileDriver {
    file: File,
    path: PathBuf,
    mode: FileMode,
}

impl FileDriver {
    pub fn open(path: impl AsRef<Path>, mode: FileMode) -> Result<Self> {
        let path = path.as_ref();
        let mut options = OpenOptions::new();
        match mode {
            FileMode::Read => options.read(true),
            FileMode::ReadWrite => options.read(true).write(true),
            FileMode::Create => options.read(true).write(true).create(true).truncate(true),
        };
        let file = options.open(path)?;
        tracing::debug!(path = %path.display(), ?mode, "opened block driver");
        Ok(Self {
            file,
            path: path.to_path_buf(),
            mode,
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn assert_writable(&self) -> Result<()> {
        if self.mode == FileMode::Read {
            return Err(SegyError::Config {
                reason: format!("{} is open read-only", self.path.display()),
            });
        }
        Ok(())
    }
}

impl BlockIo for FileDriver {
    fn file_size(&mut self) -> Result<usize> {
        Ok(self.file.metadata()?.len() as usize)
    }

    fn set_file_size(&mut self, size: usize) -> Result<()> {
        self.assert_writable()?;
        self.file.set_len(size as u64)?;
        Ok(())
    }

    fn read(&mut self, offset: usize, buf: &mut [u8]) -> Result<()> {
        if buf.is_empty() {
            return Ok(());
        }
        self.file.seek(SeekFrom::Start(offset as u64))?;
        self.file.read_exact(buf)?;
        Ok(())
    }

    fn write(&mut self, offset: usize, buf: &[u8]) -> Result<()> {
        self.assert_writable()?;
        if buf.is_empty() {
            return Ok(());
        }
        self.file.seek(SeekFrom::Start(offset as u64))?;
        self.file.write_all(buf)?;
        Ok(())
    }

    fn sync(&mut self) -> Result<()> {
        if self.mode != FileMode::Read {
            self.file.sync_all()?;
        }
        Ok(())
    }
}
