//! Queue of operations over one or more input files, run on output.
//!
//! Operations fall into three classes. Sorts only compute where each trace
//! goes. Single-trace operations run while traces stream to the next file.
//! Gather operations need the data laid out in final order, so pending sorts
//! and single-trace operations are first written to a temporary SEG-Y file.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::NamedTempFile;

use crate::comm::CollectiveExt;
use crate::constants::trace_size;
use crate::error::{Result, SegyError};
use crate::file::{ReadSegy, WriteSegy};
use crate::log::Layer;
use crate::meta::Meta;
use crate::ops::{self, CoordElem, GatherInfo, SortType, decompose};
use crate::param::Param;
use crate::piol::Piol;
use crate::rule::Rule;

/// Operation applied to one trace: samples, the block holding its header, and
/// the record index in that block.
pub type TraceFn = Box<dyn Fn(&mut [f32], &mut Param, usize) -> Result<()> + Send + Sync>;

/// Operation applied to one gather: its traces' samples and headers.
pub type GatherFn = Box<dyn Fn(&GatherInfo, &mut [f32], &mut Param) -> Result<()> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpClass {
    SubSetOnly,
    SingleTrace,
    Gather,
}

enum Operation {
    Sort(SortType),
    Trace(TraceFn),
    Gather(GatherFn),
}

impl Operation {
    fn class(&self) -> OpClass {
        match self {
            Self::Sort(_) => OpClass::SubSetOnly,
            Self::Trace(_) => OpClass::SingleTrace,
            Self::Gather(_) => OpClass::Gather,
        }
    }
}

/// One input file and this rank's share of it.
pub struct FileDesc {
    pub store: ReadSegy,
    /// File trace numbers read by this rank.
    pub ilst: Vec<usize>,
    /// Destination of each trace in `ilst`, relative to the file's first output trace.
    pub olst: Vec<usize>,
    temp: Option<NamedTempFile>,
}

impl FileDesc {
    fn new(piol: &Piol, store: ReadSegy, temp: Option<NamedTempFile>) -> Self {
        let (offset, size) = decompose(store.read_nt(), piol.num_rank(), piol.rank());
        let ilst: Vec<usize> = (offset..offset + size).collect();
        Self {
            store,
            olst: ilst.clone(),
            ilst,
            temp,
        }
    }

    fn shard(&self) -> (usize, usize) {
        (self.ilst.first().copied().unwrap_or(0), self.ilst.len())
    }

    fn reordered(&self) -> bool {
        self.ilst != self.olst
    }
}

pub struct Set {
    piol: Arc<Piol>,
    rule: Arc<Rule>,
    files: Vec<FileDesc>,
    output: PathBuf,
    text: Option<String>,
    ops: Vec<Operation>,
}

impl std::fmt::Debug for Set {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Set")
            .field("files", &self.files.len())
            .field("output", &self.output)
            .field(
                "ops",
                &self.ops.iter().map(Operation::class).collect::<Vec<_>>(),
            )
            .finish_non_exhaustive()
    }
}

impl Set {
    /// Open every input on every rank. `rule` defaults to [`Set::default_rule`]. Collective.
    pub fn new<P: AsRef<Path>>(
        piol: Arc<Piol>,
        inputs: &[P],
        output: impl AsRef<Path>,
        rule: Option<Rule>,
    ) -> Result<Self> {
        let rule = Arc::new(rule.unwrap_or_else(|| Self::default_rule(&piol)));
        let mut files = Vec::with_capacity(inputs.len());
        for path in inputs {
            let store = ReadSegy::open(Arc::clone(&piol), path)?;
            files.push(FileDesc::new(&piol, store, None));
        }
        if let Some(first) = files.first() {
            let ns = first.store.read_ns();
            if let Some(odd) = files.iter().find(|f| f.store.read_ns() != ns) {
                return Err(piol.fail(
                    Layer::Set,
                    SegyError::Config {
                        reason: format!(
                            "{} has {} samples per trace, expected {ns}",
                            odd.store.name(),
                            odd.store.read_ns()
                        ),
                    },
                ));
            }
        }
        tracing::debug!(inputs = files.len(), output = %output.as_ref().display(), "set opened");
        Ok(Self {
            piol,
            rule,
            files,
            output: output.as_ref().to_path_buf(),
            text: None,
            ops: Vec::new(),
        })
    }

    /// Default rule set plus a verbatim header copy, so unmodelled fields survive.
    #[must_use]
    pub fn default_rule(piol: &Piol) -> Rule {
        let mut rule = Rule::with_defaults(piol.config().full_extent_rules);
        rule.add_copy();
        rule
    }

    #[must_use]
    pub fn files(&self) -> &[FileDesc] {
        &self.files
    }

    /// Text header of the output. Defaults to that of the first input.
    pub fn text(&mut self, text: impl Into<String>) {
        self.text = Some(text.into());
    }

    pub fn sort(&mut self, sort_type: SortType) {
        self.ops.push(Operation::Sort(sort_type));
    }

    pub fn map_traces<F>(&mut self, f: F)
    where
        F: Fn(&mut [f32], &mut Param, usize) -> Result<()> + Send + Sync + 'static,
    {
        self.ops.push(Operation::Trace(Box::new(f)));
    }

    pub fn map_gathers<F>(&mut self, f: F)
    where
        F: Fn(&GatherInfo, &mut [f32], &mut Param) -> Result<()> + Send + Sync + 'static,
    {
        self.ops.push(Operation::Gather(Box::new(f)));
    }

    /// Extremes of two attributes over every input, numbered across the
    /// concatenated inputs. Collective.
    pub fn min_max(&mut self, meta_x: Meta, meta_y: Meta) -> Result<[CoordElem; 4]> {
        let rule = Arc::new(Rule::from_metas(&[meta_x, meta_y], false));
        let mut result: Option<[CoordElem; 4]> = None;
        let mut base = 0;
        for file in &mut self.files {
            let nt = file.store.read_nt();
            if nt > 0 {
                let (offset, size) = file.shard();
                let mut prm = Param::new(Arc::clone(&rule), size);
                file.store.read_param(offset, size, &mut prm, 0)?;
                let part = ops::min_max(self.piol.comm(), base + offset, &prm, meta_x, meta_y)?;
                result = Some(match result {
                    None => part,
                    Some(acc) => ops::combine_min_max(acc, part),
                });
            }
            base += nt;
        }
        result.ok_or_else(|| SegyError::Config {
            reason: "min/max over inputs without traces".into(),
        })
    }

    /// Run the queued operations and write the result. Returns the number of
    /// traces written. Collective.
    pub fn output(&mut self) -> Result<usize> {
        let queue = std::mem::take(&mut self.ops);
        let mut files = std::mem::take(&mut self.files);
        let mut pending: Vec<&TraceFn> = Vec::new();

        for op in &queue {
            match op {
                Operation::Sort(sort_type) => {
                    if !pending.is_empty() {
                        files = self.materialize_all(files, &pending)?;
                        pending.clear();
                    }
                    for file in &mut files {
                        let (offset, size) = file.shard();
                        file.olst = ops::sort_file(
                            &self.piol,
                            &mut file.store,
                            offset,
                            size,
                            *sort_type,
                            true,
                        )?;
                    }
                }
                Operation::Trace(f) => pending.push(f),
                Operation::Gather(f) => {
                    if !pending.is_empty() || files.iter().any(FileDesc::reordered) {
                        files = self.materialize_all(files, &pending)?;
                        pending.clear();
                    }
                    let mut next = Vec::with_capacity(files.len());
                    for mut file in files {
                        next.push(self.gather_pass(&mut file, f)?);
                    }
                    files = next;
                }
            }
        }

        let mut out = WriteSegy::create(Arc::clone(&self.piol), &self.output)?;
        self.copy_header(&files, &mut out)?;
        let mut base = 0;
        for file in &mut files {
            self.copy_pass(file, &pending, &mut out, base)?;
            base += file.store.read_nt();
        }
        let nt = out.read_nt()?;
        out.close()?;
        tracing::info!(output = %self.output.display(), nt, ops = queue.len(), "set written");
        Ok(nt)
    }

    fn copy_header(&self, files: &[FileDesc], out: &mut WriteSegy) -> Result<()> {
        let Some(first) = files.first() else {
            out.write_ns(0)?;
            return Ok(());
        };
        out.write_ns(first.store.read_ns())?;
        out.write_inc(first.store.read_inc())?;
        match &self.text {
            Some(text) => out.write_text(text),
            None => out.write_text(first.store.read_text()),
        }
        Ok(())
    }

    /// Stream this rank's traces of `file` into `out` at `base + olst`,
    /// applying `pending` on the way.
    fn copy_pass(
        &self,
        file: &mut FileDesc,
        pending: &[&TraceFn],
        out: &mut WriteSegy,
        base: usize,
    ) -> Result<()> {
        let ns = file.store.read_ns();
        let (offset, size) = file.shard();
        let record = trace_size(ns) + self.rule.per_record_memory();
        let per_chunk = (self.piol.config().chunk_bytes / record.max(1)).max(1);

        let mut done = 0;
        while done < size {
            let n = per_chunk.min(size - done);
            let mut trc = vec![0f32; n * ns];
            let mut prm = Param::new(Arc::clone(&self.rule), n);
            file.store
                .read_trace(offset + done, n, Some(&mut trc), Some(&mut prm), 0)?;
            for f in pending {
                for i in 0..n {
                    f(&mut trc[i * ns..(i + 1) * ns], &mut prm, i)?;
                }
            }
            let positions: Vec<usize> = file.olst[done..done + n].iter().map(|&o| base + o).collect();
            out.write_trace_noncontiguous(&positions, Some(&trc), Some(&prm), 0)?;
            done += n;
        }
        Ok(())
    }

    /// Create an empty temporary file on rank 0 and share its path. Collective.
    fn temp_file(&self) -> Result<(PathBuf, Option<NamedTempFile>)> {
        let dir = match &self.piol.config().temp_dir {
            Some(dir) => dir.clone(),
            None => self
                .output
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map_or_else(std::env::temp_dir, Path::to_path_buf),
        };
        let comm = self.piol.comm();
        let created = if comm.rank() == 0 {
            Some(
                tempfile::Builder::new()
                    .prefix("segy-shard-")
                    .suffix(".segy")
                    .tempfile_in(&dir),
            )
        } else {
            None
        };
        let path = match &created {
            Some(Ok(temp)) => Some(temp.path().display().to_string()),
            _ => None,
        };
        let shared: Option<String> = comm.broadcast(0, &path)?;
        let Some(shared) = shared else {
            let reason = match created {
                Some(Err(err)) => err.to_string(),
                _ => format!("rank 0 could not create a temporary file in {}", dir.display()),
            };
            return Err(self.piol.fail(Layer::Set, SegyError::Config { reason }));
        };
        Ok((PathBuf::from(shared), created.and_then(std::result::Result::ok)))
    }

    fn materialize_all(&self, files: Vec<FileDesc>, pending: &[&TraceFn]) -> Result<Vec<FileDesc>> {
        let mut next = Vec::with_capacity(files.len());
        for mut file in files {
            let (path, temp) = self.temp_file()?;
            let mut out = WriteSegy::create(Arc::clone(&self.piol), &path)?;
            out.write_ns(file.store.read_ns())?;
            out.write_inc(file.store.read_inc())?;
            out.write_text(file.store.read_text());
            out.write_nt(file.store.read_nt())?;
            self.copy_pass(&mut file, pending, &mut out, 0)?;
            out.close()?;
            tracing::debug!(from = file.store.name(), to = %path.display(), "materialized");
            let store = ReadSegy::open(Arc::clone(&self.piol), &path)?;
            next.push(FileDesc::new(&self.piol, store, temp));
        }
        Ok(next)
    }

    fn gather_pass(&self, file: &mut FileDesc, f: &GatherFn) -> Result<FileDesc> {
        let dist = ops::gathers(&self.piol, &mut file.store)?;
        let (path, temp) = self.temp_file()?;
        let ns = file.store.read_ns();
        let mut out = WriteSegy::create(Arc::clone(&self.piol), &path)?;
        out.write_ns(ns)?;
        out.write_inc(file.store.read_inc())?;
        out.write_text(file.store.read_text());
        out.write_nt(file.store.read_nt())?;
        for gather in dist.local() {
            let mut trc = vec![0f32; gather.count * ns];
            let mut prm = Param::new(Arc::clone(&self.rule), gather.count);
            file.store
                .read_trace(gather.start, gather.count, Some(&mut trc), Some(&mut prm), 0)?;
            f(gather, &mut trc, &mut prm)?;
            out.write_trace(gather.start, gather.count, Some(&trc), Some(&prm), 0)?;
        }
        out.close()?;
        tracing::debug!(gathers = dist.total(), owned = dist.local().len(), "gather pass done");
        let store = ReadSegy::open(Arc::clone(&self.piol), &path)?;
        Ok(FileDesc::new(&self.piol, store, temp))
    }
}

impl std::fmt::Debug for FileDesc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileDesc")
            .field("store", &self.store)
            .field("traces", &self.ilst.len())
            .field("temporary", &self.temp.is_some())
            .finish()
    }
}
