use std::path::Path;
use std::sync::Arc;

use crate::codec::{self, RecordLayout};
use crate::constants::{
    FILE_HEADER_SIZE, FORMAT_IBM, FORMAT_IEEE, MICROSECONDS, TEXT_HEADER_SIZE, TRACE_HEADER_SIZE,
    trace_count, trace_location, trace_size,
};
use crate::error::{Result, SegyError};
use crate::file::header::{BinaryHeader, decode_text};
use crate::file::{check_samples, chunk_records, fill_trace_numbers};
use crate::io::{BlockIo, FileDriver, FileMode};
use crate::log::{Layer, Verbosity, Severity};
use crate::param::{Param, copy_record};
use crate::piol::Piol;

/// Read access to a SEG-Y file shared by every rank.
///
/// The file header is read once at open. Trace reads are independent per
/// rank and never communicate.
pub struct ReadSegy {
    piol: Arc<Piol>,
    io: Box<dyn BlockIo>,
    name: String,
    ns: usize,
    nt: usize,
    inc: f64,
    format: i16,
    text: String,
}

impl std::fmt::Debug for ReadSegy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadSegy")
            .field("name", &self.name)
            .field("ns", &self.ns)
            .field("nt", &self.nt)
            .field("inc", &self.inc)
            .field("format", &self.format)
            .finish_non_exhaustive()
    }
}

impl ReadSegy {
    pub fn open(piol: Arc<Piol>, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let io = FileDriver::open(path, FileMode::Read).map_err(|err| piol.fail(Layer::Io, err))?;
        Self::from_driver(piol, path.display().to_string(), Box::new(io))
    }

    pub fn from_driver(piol: Arc<Piol>, name: String, mut io: Box<dyn BlockIo>) -> Result<Self> {
        let size = io.file_size().map_err(|err| piol.fail(Layer::Io, err))?;
        if size < FILE_HEADER_SIZE {
            return Err(piol.fail(
                Layer::File,
                SegyError::InvalidHeader {
                    reason: format!("{name} holds {size} bytes, less than a file header"),
                },
            ));
        }
        let mut buf = vec![0u8; FILE_HEADER_SIZE];
        io.read(0, &mut buf)
            .map_err(|err| piol.fail(Layer::Io, err))?;
        let binary = BinaryHeader::decode(&buf)?;

        let ns = usize::from(binary.ns);
        let nt = trace_count(size, ns);
        if !matches!(binary.format, FORMAT_IBM | FORMAT_IEEE) {
            piol.warn(
                Layer::File,
                format!("{name}: sample format {} is not supported", binary.format),
            );
        }
        if (size - FILE_HEADER_SIZE) % trace_size(ns) != 0 {
            piol.warn(Layer::File, format!("{name}: trailing partial trace ignored"));
        }
        tracing::debug!(file = %name, ns, nt, format = binary.format, "opened SEG-Y for reading");

        Ok(Self {
            text: decode_text(&buf[..TEXT_HEADER_SIZE]),
            inc: f64::from(binary.interval_us) * MICROSECONDS,
            format: binary.format,
            piol,
            io,
            name,
            ns,
            nt,
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn piol(&self) -> &Arc<Piol> {
        &self.piol
    }

    #[must_use]
    pub fn read_ns(&self) -> usize {
        self.ns
    }

    #[must_use]
    pub fn read_nt(&self) -> usize {
        self.nt
    }

    /// Sample interval in seconds.
    #[must_use]
    pub fn read_inc(&self) -> f64 {
        self.inc
    }

    #[must_use]
    pub fn read_text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn format(&self) -> i16 {
        self.format
    }

    /// Clamp a contiguous request to the file. `None` means nothing to read.
    fn clamp(&self, offset: usize, count: usize) -> Result<Option<usize>> {
        if count == 0 {
            self.piol.record(
                Layer::File,
                Severity::Warning,
                Verbosity::Extended,
                format!("{}: read of zero traces at {offset}", self.name),
            );
            return Ok(None);
        }
        if offset >= self.nt {
            self.piol.warn(
                Layer::File,
                format!(
                    "{}: read of {count} traces at {offset} starts past the end ({} traces)",
                    self.name, self.nt
                ),
            );
            return Err(SegyError::OutOfRange {
                offset,
                nt: self.nt,
            });
        }
        let available = self.nt - offset;
        if count > available {
            self.piol.record(
                Layer::File,
                Severity::Debug,
                Verbosity::Verbose,
                format!("{}: read of {count} traces clamped to {available}", self.name),
            );
        }
        Ok(Some(count.min(available)))
    }

    /// Read `count` traces starting at `offset`.
    ///
    /// Samples go to `trc` (`count * ns` floats) and headers to records
    /// `skip..skip + count` of `prm`. Either may be omitted. Requests running
    /// past the end of the file are clamped.
    pub fn read_trace(
        &mut self,
        offset: usize,
        count: usize,
        mut trc: Option<&mut [f32]>,
        mut prm: Option<&mut Param>,
        skip: usize,
    ) -> Result<()> {
        let Some(count) = self.clamp(offset, count)? else {
            return Ok(());
        };
        if let Some(trc) = trc.as_deref() {
            check_samples(trc.len(), count, self.ns)?;
        }
        let ns = self.ns;
        let stride = trace_size(ns);
        let per_chunk = chunk_records(self.piol.config().chunk_bytes, stride);

        let mut done = 0;
        while done < count {
            let n = per_chunk.min(count - done);
            let at = offset + done;
            match trc.as_deref_mut() {
                Some(trc) => {
                    let mut buf = vec![0u8; n * stride];
                    self.io
                        .read(trace_location(at, ns), &mut buf)
                        .map_err(|err| self.piol.fail(Layer::Io, err))?;
                    self.unpack_samples(&buf, &mut trc[done * ns..(done + n) * ns])?;
                    if let Some(prm) = prm.as_deref_mut() {
                        let rule = Arc::clone(prm.rule());
                        codec::decode(&buf, RecordLayout::traces(ns), &rule, n, prm, skip + done)?;
                    }
                }
                None => {
                    if let Some(prm) = prm.as_deref_mut() {
                        self.read_headers_strided(at, n, prm, skip + done)?;
                    }
                }
            }
            done += n;
        }

        if let Some(prm) = prm {
            fill_trace_numbers(prm, skip, (offset..offset + count).map(|gtn| gtn as u64))?;
        }
        tracing::trace!(file = %self.name, offset, count, "read traces");
        Ok(())
    }

    /// Headers only, for `count` traces from `offset`.
    pub fn read_param(
        &mut self,
        offset: usize,
        count: usize,
        prm: &mut Param,
        skip: usize,
    ) -> Result<()> {
        self.read_trace(offset, count, None, Some(prm), skip)
    }

    fn read_headers_strided(
        &mut self,
        offset: usize,
        count: usize,
        prm: &mut Param,
        skip: usize,
    ) -> Result<()> {
        let rule = Arc::clone(prm.rule());
        let extent = rule.extent();
        if extent.is_empty() {
            return Ok(());
        }
        let mut buf = vec![0u8; count * extent.len()];
        self.io
            .read_strided(
                trace_location(offset, self.ns) + extent.start,
                extent.len(),
                trace_size(self.ns),
                count,
                &mut buf,
            )
            .map_err(|err| self.piol.fail(Layer::Io, err))?;
        codec::decode(&buf, RecordLayout::headers(&rule), &rule, count, prm, skip)
    }

    fn unpack_samples(&self, records: &[u8], trc: &mut [f32]) -> Result<()> {
        let stride = trace_size(self.ns);
        if self.ns == 0 {
            return Ok(());
        }
        for (record, samples) in records
            .chunks_exact(stride)
            .zip(trc.chunks_exact_mut(self.ns))
        {
            codec::decode_samples(&record[TRACE_HEADER_SIZE..], self.format, samples)?;
        }
        Ok(())
    }

    fn check_offsets(&self, offsets: &[usize]) -> Result<()> {
        if let Some(&bad) = offsets.iter().find(|&&o| o >= self.nt) {
            self.piol.warn(
                Layer::File,
                format!("{}: trace {bad} requested from {} traces", self.name, self.nt),
            );
            return Err(SegyError::OutOfRange {
                offset: bad,
                nt: self.nt,
            });
        }
        Ok(())
    }

    /// Read the traces listed in `offsets`, which must be increasing.
    pub fn read_trace_noncontiguous(
        &mut self,
        offsets: &[usize],
        mut trc: Option<&mut [f32]>,
        mut prm: Option<&mut Param>,
        skip: usize,
    ) -> Result<()> {
        if offsets.is_empty() {
            return Ok(());
        }
        self.check_offsets(offsets)?;
        if let Some(trc) = trc.as_deref() {
            check_samples(trc.len(), offsets.len(), self.ns)?;
        }
        let ns = self.ns;
        let stride = trace_size(ns);
        let per_chunk = chunk_records(self.piol.config().chunk_bytes, stride);

        for (c, chunk) in offsets.chunks(per_chunk).enumerate() {
            let done = c * per_chunk;
            let n = chunk.len();
            match trc.as_deref_mut() {
                Some(trc) => {
                    let locations: Vec<usize> =
                        chunk.iter().map(|&o| trace_location(o, ns)).collect();
                    let mut buf = vec![0u8; n * stride];
                    self.io
                        .read_list(stride, &locations, &mut buf)
                        .map_err(|err| self.piol.fail(Layer::Io, err))?;
                    self.unpack_samples(&buf, &mut trc[done * ns..(done + n) * ns])?;
                    if let Some(prm) = prm.as_deref_mut() {
                        let rule = Arc::clone(prm.rule());
                        codec::decode(&buf, RecordLayout::traces(ns), &rule, n, prm, skip + done)?;
                    }
                }
                None => {
                    let Some(prm) = prm.as_deref_mut() else {
                        continue;
                    };
                    let rule = Arc::clone(prm.rule());
                    let extent = rule.extent();
                    if extent.is_empty() {
                        continue;
                    }
                    let locations: Vec<usize> = chunk
                        .iter()
                        .map(|&o| trace_location(o, ns) + extent.start)
                        .collect();
                    let mut buf = vec![0u8; n * extent.len()];
                    self.io
                        .read_list(extent.len(), &locations, &mut buf)
                        .map_err(|err| self.piol.fail(Layer::Io, err))?;
                    codec::decode(&buf, RecordLayout::headers(&rule), &rule, n, prm, skip + done)?;
                }
            }
        }

        if let Some(prm) = prm {
            fill_trace_numbers(prm, skip, offsets.iter().map(|&o| o as u64))?;
        }
        Ok(())
    }

    pub fn read_param_noncontiguous(
        &mut self,
        offsets: &[usize],
        prm: &mut Param,
        skip: usize,
    ) -> Result<()> {
        self.read_trace_noncontiguous(offsets, None, Some(prm), skip)
    }

    /// Read the traces listed in `offsets` in any order, repeats allowed.
    ///
    /// Each distinct trace is read once; results are scattered back so that
    /// slot `i` holds trace `offsets[i]`.
    pub fn read_trace_nonmonotonic(
        &mut self,
        offsets: &[usize],
        trc: Option<&mut [f32]>,
        prm: Option<&mut Param>,
        skip: usize,
    ) -> Result<()> {
        let mut unique = offsets.to_vec();
        unique.sort_unstable();
        unique.dedup();

        let ns = self.ns;
        let mut sorted_trc = trc.as_ref().map(|_| vec![0f32; unique.len() * ns]);
        let mut sorted_prm = prm
            .as_ref()
            .map(|p| Param::new(Arc::clone(p.rule()), unique.len()));
        self.read_trace_noncontiguous(&unique, sorted_trc.as_deref_mut(), sorted_prm.as_mut(), 0)?;

        let slots: Vec<usize> = offsets
            .iter()
            .map(|o| unique.binary_search(o).unwrap_or_default())
            .collect();
        if let (Some(trc), Some(sorted)) = (trc, sorted_trc.as_ref()) {
            check_samples(trc.len(), offsets.len(), ns)?;
            for (i, &slot) in slots.iter().enumerate() {
                trc[i * ns..(i + 1) * ns].copy_from_slice(&sorted[slot * ns..(slot + 1) * ns]);
            }
        }
        if let (Some(prm), Some(sorted)) = (prm, sorted_prm.as_ref()) {
            for (i, &slot) in slots.iter().enumerate() {
                copy_record(sorted, slot, prm, skip + i)?;
            }
        }
        Ok(())
    }
}
