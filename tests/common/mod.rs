#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use segy_shard::{Collective, LocalCluster, Meta, Param, Piol, PiolConfig, ReadSegy, WriteSegy, decompose};

pub const NS: usize = 6;
pub const INC: f64 = 0.004;

/// Header values of one synthetic trace.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Shot {
    pub il: i64,
    pub xl: i64,
    pub offset: i64,
    pub x_src: f64,
    pub y_src: f64,
}

pub fn piol(comm: impl Collective + 'static) -> Arc<Piol> {
    Arc::new(Piol::new(Arc::new(comm), PiolConfig::default()))
}

/// Samples of trace `t` in a file tagged `tag`; distinct over files and traces.
pub fn samples(tag: usize, t: usize) -> Vec<f32> {
    (0..NS)
        .map(|s| (tag * 10_000 + t * 10 + s) as f32)
        .collect()
}

/// A scrambled survey: lines and offsets out of order, a few repeats.
pub fn survey(nt: usize, seed: u64) -> Vec<Shot> {
    let mut rng = fastrand::Rng::with_seed(seed);
    (0..nt)
        .map(|_| Shot {
            il: rng.i64(100..104),
            xl: rng.i64(200..203),
            offset: rng.i64(0..40) * 25,
            x_src: f64::from(rng.i32(-500..500)),
            y_src: f64::from(rng.i32(0..1000)),
        })
        .collect()
}

/// Write `shots` with `num_rank` ranks, each writing its block.
pub fn write_survey(path: &Path, shots: &[Shot], tag: usize, num_rank: usize) {
    let results = LocalCluster::run(num_rank, |comm| {
        let (offset, size) = decompose(shots.len(), comm.num_rank(), comm.rank());
        let piol = piol(comm);
        let mut prm = Param::with_default_rule(size);
        let mut trc = Vec::with_capacity(size * NS);
        for i in 0..size {
            let shot = shots[offset + i];
            prm.set(i, Meta::Il, shot.il)?;
            prm.set(i, Meta::Xl, shot.xl)?;
            prm.set(i, Meta::Offset, shot.offset)?;
            prm.set(i, Meta::XSrc, shot.x_src)?;
            prm.set(i, Meta::YSrc, shot.y_src)?;
            trc.extend(samples(tag, offset + i));
        }
        let mut out = WriteSegy::create(Arc::clone(&piol), path)?;
        out.write_ns(NS)?;
        out.write_inc(INC)?;
        out.write_text("C 1 SYNTHETIC SURVEY");
        out.write_trace(offset, size, Some(&trc), Some(&prm), 0)?;
        out.close()
    }).expect("cluster");
    for result in results {
        result.expect("write survey");
    }
}

/// Every trace of `path`, read serially.
pub fn read_all(path: &Path) -> (Vec<Shot>, Vec<Vec<f32>>) {
    let mut file = ReadSegy::open(Arc::new(Piol::serial()), path).expect("open");
    let nt = file.read_nt();
    let mut prm = Param::with_default_rule(nt);
    let mut trc = vec![0f32; nt * NS];
    file.read_trace(0, nt, Some(&mut trc), Some(&mut prm), 0)
        .expect("read all");
    let shots = (0..nt)
        .map(|i| Shot {
            il: prm.get(i, Meta::Il).expect("il"),
            xl: prm.get(i, Meta::Xl).expect("xl"),
            offset: prm.get(i, Meta::Offset).expect("offset"),
            x_src: prm.get(i, Meta::XSrc).expect("x"),
            y_src: prm.get(i, Meta::YSrc).expect("y"),
        })
        .collect();
    let traces = trc.chunks(NS).map(<[f32]>::to_vec).collect();
    (shots, traces)
}

/// Input positions in (il, xl, offset) order, ties by position.
pub fn line_order(shots: &[Shot]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..shots.len()).collect();
    order.sort_by_key(|&i| (shots[i].il, shots[i].xl, shots[i].offset, i));
    order
}
