use std::path::Path;
use std::sync::Arc;

use crate::codec::{self, RecordLayout};
use crate::comm::CollectiveExt;
use crate::constants::{
    FILE_HEADER_SIZE, MAX_NS, MICROSECONDS, SAMPLE_SIZE, TEXT_HEADER_SIZE, TRACE_HEADER_SIZE,
    file_size, trace_data_location, trace_location, trace_size,
};
use crate::error::{Result, SegyError};
use crate::file::header::{BinaryHeader, encode_text};
use crate::file::{check_samples, chunk_records};
use crate::io::{BlockIo, FileDriver, FileMode};
use crate::log::Layer;
use crate::param::Param;
use crate::piol::Piol;

/// Write access to a SEG-Y file shared by every rank.
///
/// Trace writes are independent per rank. The trace count grows with the
/// highest trace written on each rank and is agreed collectively by
/// [`WriteSegy::read_nt`] and [`WriteSegy::close`], which also write the file
/// header from rank 0.
pub struct WriteSegy {
    piol: Arc<Piol>,
    io: Box<dyn BlockIo>,
    name: String,
    ns: Option<usize>,
    nt: usize,
    inc: f64,
    text: String,
    header_dirty: bool,
    nt_stale: bool,
    closed: bool,
}

impl std::fmt::Debug for WriteSegy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriteSegy")
            .field("name", &self.name)
            .field("ns", &self.ns)
            .field("nt", &self.nt)
            .field("inc", &self.inc)
            .finish_non_exhaustive()
    }
}

impl WriteSegy {
    /// Create (or truncate) `path` on rank 0 and open it on every rank. Collective.
    pub fn create(piol: Arc<Piol>, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let comm = piol.comm();
        let created = if comm.rank() == 0 {
            FileDriver::open(path, FileMode::Create).map(Some)
        } else {
            Ok(None)
        };
        let ok = comm.broadcast(0, &created.is_ok())?;
        let driver = match created {
            Ok(Some(driver)) => driver,
            Ok(None) if ok => FileDriver::open(path, FileMode::ReadWrite)
                .map_err(|err| piol.fail(Layer::Io, err))?,
            Ok(None) => {
                return Err(piol.fail(
                    Layer::Comm,
                    SegyError::Collective {
                        operation: "create",
                        reason: format!("rank 0 could not create {}", path.display()),
                    },
                ));
            }
            Err(err) => return Err(piol.fail(Layer::Io, err)),
        };
        Ok(Self::from_driver(
            piol,
            path.display().to_string(),
            Box::new(driver),
        ))
    }

    #[must_use]
    pub fn from_driver(piol: Arc<Piol>, name: String, io: Box<dyn BlockIo>) -> Self {
        tracing::debug!(file = %name, rank = piol.rank(), "opened SEG-Y for writing");
        Self {
            piol,
            io,
            name,
            ns: None,
            nt: 0,
            inc: 0.0,
            text: String::new(),
            header_dirty: true,
            nt_stale: false,
            closed: false,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn write_ns(&mut self, ns: usize) -> Result<()> {
        if ns > MAX_NS {
            return Err(self.piol.fail(
                Layer::File,
                SegyError::Limit {
                    what: "samples per trace",
                    value: ns as u64,
                    limit: MAX_NS as u64,
                },
            ));
        }
        self.ns = Some(ns);
        self.header_dirty = true;
        Ok(())
    }

    /// Declare the global trace count. Every rank passes the same value.
    pub fn write_nt(&mut self, nt: usize) -> Result<()> {
        self.check_trace_limit(nt)?;
        self.nt = nt;
        self.nt_stale = true;
        self.header_dirty = true;
        Ok(())
    }

    /// Sample interval in seconds.
    pub fn write_inc(&mut self, inc: f64) -> Result<()> {
        let micros = (inc / MICROSECONDS).round();
        if !(0.0..=f64::from(u16::MAX)).contains(&micros) {
            return Err(self.piol.fail(
                Layer::File,
                SegyError::Limit {
                    what: "sample interval (us)",
                    value: micros.max(0.0) as u64,
                    limit: u64::from(u16::MAX),
                },
            ));
        }
        self.inc = inc;
        self.header_dirty = true;
        Ok(())
    }

    pub fn write_text(&mut self, text: &str) {
        if text.len() > TEXT_HEADER_SIZE {
            self.piol.warn(
                Layer::File,
                format!("{}: text header truncated to {TEXT_HEADER_SIZE} bytes", self.name),
            );
        }
        self.text = text.to_string();
        self.header_dirty = true;
    }

    #[must_use]
    pub fn read_ns(&self) -> Option<usize> {
        self.ns
    }

    #[must_use]
    pub fn read_inc(&self) -> f64 {
        self.inc
    }

    #[must_use]
    pub fn read_text(&self) -> &str {
        &self.text
    }

    /// The global trace count, agreed across ranks. Collective.
    pub fn read_nt(&mut self) -> Result<usize> {
        self.resolve_nt()?;
        Ok(self.nt)
    }

    fn resolve_nt(&mut self) -> Result<()> {
        let nt = self
            .piol
            .comm()
            .max(self.nt as u64)
            .map_err(|err| self.piol.fail(Layer::Comm, err))?;
        self.nt = nt as usize;
        self.nt_stale = false;
        Ok(())
    }

    fn check_trace_limit(&self, nt: usize) -> Result<()> {
        let limit = self.piol.config().max_traces;
        if nt as u64 > limit {
            return Err(self.piol.fail(
                Layer::File,
                SegyError::Limit {
                    what: "trace count",
                    value: nt as u64,
                    limit,
                },
            ));
        }
        Ok(())
    }

    fn require_ns(&self) -> Result<usize> {
        self.ns.ok_or_else(|| {
            self.piol.fail(
                Layer::File,
                SegyError::Config {
                    reason: format!("{}: samples per trace must be set before traces", self.name),
                },
            )
        })
    }

    fn grow(&mut self, end: usize) -> Result<()> {
        if end > self.nt {
            self.check_trace_limit(end)?;
            self.nt = end;
            self.nt_stale = true;
        }
        Ok(())
    }

    /// Write `count` traces starting at `offset`.
    ///
    /// With both samples and headers whole records are written and header
    /// bytes outside the rule set become zero. With one of them only that
    /// part of each record is touched.
    pub fn write_trace(
        &mut self,
        offset: usize,
        count: usize,
        trc: Option<&[f32]>,
        prm: Option<&Param>,
        skip: usize,
    ) -> Result<()> {
        if count == 0 {
            return Ok(());
        }
        let ns = self.require_ns()?;
        if let Some(trc) = trc {
            check_samples(trc.len(), count, ns)?;
        }
        self.grow(offset + count)?;

        let stride = trace_size(ns);
        let per_chunk = chunk_records(self.piol.config().chunk_bytes, stride);
        let mut done = 0;
        while done < count {
            let n = per_chunk.min(count - done);
            let at = offset + done;
            let samples = trc.map(|trc| &trc[done * ns..(done + n) * ns]);
            let result = match (samples, prm) {
                (Some(samples), Some(prm)) => {
                    let mut buf = vec![0u8; n * stride];
                    self.pack_samples(samples, &mut buf, ns)?;
                    codec::encode(prm, prm.rule(), n, RecordLayout::traces(ns), &mut buf, skip + done)?;
                    self.io.write(trace_location(at, ns), &buf)
                }
                (Some(samples), None) => {
                    let mut buf = vec![0u8; n * ns * SAMPLE_SIZE];
                    codec::encode_samples(samples, &mut buf)?;
                    self.io
                        .write_strided(trace_data_location(at, ns), ns * SAMPLE_SIZE, stride, n, &buf)
                }
                (None, Some(prm)) => {
                    let extent = prm.rule().extent();
                    if extent.is_empty() {
                        Ok(())
                    } else {
                        let mut buf = vec![0u8; n * extent.len()];
                        codec::encode(prm, prm.rule(), n, RecordLayout::headers(prm.rule()), &mut buf, skip + done)?;
                        self.io.write_strided(
                            trace_location(at, ns) + extent.start,
                            extent.len(),
                            stride,
                            n,
                            &buf,
                        )
                    }
                }
                (None, None) => Ok(()),
            };
            result.map_err(|err| self.piol.fail(Layer::File, err))?;
            done += n;
        }
        tracing::trace!(file = %self.name, offset, count, "wrote traces");
        Ok(())
    }

    pub fn write_param(&mut self, offset: usize, count: usize, prm: &Param, skip: usize) -> Result<()> {
        self.write_trace(offset, count, None, Some(prm), skip)
    }

    /// Write traces to the positions listed in `offsets`, in any order.
    /// Runs of consecutive positions are written in one call.
    pub fn write_trace_noncontiguous(
        &mut self,
        offsets: &[usize],
        trc: Option<&[f32]>,
        prm: Option<&Param>,
        skip: usize,
    ) -> Result<()> {
        let Some(&last) = offsets.iter().max() else {
            return Ok(());
        };
        let ns = self.require_ns()?;
        if let Some(trc) = trc {
            check_samples(trc.len(), offsets.len(), ns)?;
        }
        self.grow(last + 1)?;

        let stride = trace_size(ns);
        let per_chunk = chunk_records(self.piol.config().chunk_bytes, stride);
        for (c, chunk) in offsets.chunks(per_chunk).enumerate() {
            let done = c * per_chunk;
            let n = chunk.len();
            let samples = trc.map(|trc| &trc[done * ns..(done + n) * ns]);
            let result = match (samples, prm) {
                (Some(samples), Some(prm)) => {
                    let mut buf = vec![0u8; n * stride];
                    self.pack_samples(samples, &mut buf, ns)?;
                    codec::encode(prm, prm.rule(), n, RecordLayout::traces(ns), &mut buf, skip + done)?;
                    let locations: Vec<usize> = chunk.iter().map(|&o| trace_location(o, ns)).collect();
                    self.io.write_list(stride, &locations, &buf)
                }
                (Some(samples), None) => {
                    let mut buf = vec![0u8; n * ns * SAMPLE_SIZE];
                    codec::encode_samples(samples, &mut buf)?;
                    let locations: Vec<usize> =
                        chunk.iter().map(|&o| trace_data_location(o, ns)).collect();
                    self.io.write_list(ns * SAMPLE_SIZE, &locations, &buf)
                }
                (None, Some(prm)) => {
                    let extent = prm.rule().extent();
                    if extent.is_empty() {
                        Ok(())
                    } else {
                        let mut buf = vec![0u8; n * extent.len()];
                        codec::encode(prm, prm.rule(), n, RecordLayout::headers(prm.rule()), &mut buf, skip + done)?;
                        let locations: Vec<usize> = chunk
                            .iter()
                            .map(|&o| trace_location(o, ns) + extent.start)
                            .collect();
                        self.io.write_list(extent.len(), &locations, &buf)
                    }
                }
                (None, None) => Ok(()),
            };
            result.map_err(|err| self.piol.fail(Layer::File, err))?;
        }
        Ok(())
    }

    pub fn write_param_noncontiguous(&mut self, offsets: &[usize], prm: &Param, skip: usize) -> Result<()> {
        self.write_trace_noncontiguous(offsets, None, Some(prm), skip)
    }

    fn pack_samples(&self, samples: &[f32], records: &mut [u8], ns: usize) -> Result<()> {
        if ns == 0 {
            return Ok(());
        }
        for (record, trace) in records
            .chunks_exact_mut(trace_size(ns))
            .zip(samples.chunks_exact(ns))
        {
            codec::encode_samples(trace, &mut record[TRACE_HEADER_SIZE..])?;
        }
        Ok(())
    }

    fn write_file_header(&mut self) -> Result<()> {
        let ns = self.ns.unwrap_or(0);
        let mut buf = vec![0u8; FILE_HEADER_SIZE];
        buf[..TEXT_HEADER_SIZE].copy_from_slice(&encode_text(&self.text));
        let binary = BinaryHeader {
            interval_us: (self.inc / MICROSECONDS).round() as u16,
            ns: ns as u16,
            ..BinaryHeader::default()
        };
        binary.encode(&mut buf)?;
        self.io.write(0, &buf)?;
        self.io.set_file_size(file_size(self.nt, ns))?;
        Ok(())
    }

    /// Agree on the trace count and, from rank 0, write the file header and
    /// size the file. Collective.
    pub fn flush(&mut self) -> Result<()> {
        let piol = Arc::clone(&self.piol);
        let comm = piol.comm();
        let update = comm.any(self.header_dirty || self.nt_stale)?;
        self.resolve_nt()?;

        let status = if update && comm.rank() == 0 {
            self.write_file_header()
        } else {
            Ok(())
        };
        let ok = comm.broadcast(0, &status.is_ok())?;
        status.map_err(|err| piol.fail(Layer::File, err))?;
        if !ok {
            return Err(piol.fail(
                Layer::File,
                SegyError::Collective {
                    operation: "flush",
                    reason: format!("rank 0 failed to write the header of {}", self.name),
                },
            ));
        }
        self.header_dirty = false;
        self.io.sync()?;
        tracing::debug!(file = %self.name, nt = self.nt, "flushed SEG-Y header");
        Ok(())
    }

    /// Flush and release the file. Collective.
    pub fn close(mut self) -> Result<()> {
        let result = self.flush();
        self.closed = true;
        result
    }
}

impl Drop for WriteSegy {
    fn drop(&mut self) {
        if !self.closed {
            tracing::warn!(
                file = %self.name,
                "SEG-Y writer dropped without close; header and size may be stale"
            );
        }
    }
}
