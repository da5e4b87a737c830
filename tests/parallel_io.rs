mod common;

use std::sync::Arc;

use common::{INC, NS, line_order, piol, read_all, samples, survey, write_survey};
use segy_shard::ops::{check_order, gathers, sort_file};
use segy_shard::{
    Collective, CollectiveExt, LocalCluster, Meta, Param, ReadSegy, SegyError, SortType, WriteSegy,
    decompose,
};

#[test]
fn ranks_write_blocks_that_read_back_whole() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("survey.segy");
    let shots = survey(23, 1);
    write_survey(&path, &shots, 1, 4);

    let (read, traces) = read_all(&path);
    assert_eq!(read, shots);
    for (t, trace) in traces.iter().enumerate() {
        assert_eq!(trace, &samples(1, t));
    }

    // a different rank count reads its own blocks of the same file
    let ok = LocalCluster::run(3, |comm| {
        let (offset, size) = decompose(23, comm.num_rank(), comm.rank());
        let piol = piol(comm);
        let mut file = ReadSegy::open(piol, &path).expect("open");
        assert_eq!(file.read_nt(), 23);
        assert_eq!(file.read_ns(), NS);
        assert!((file.read_inc() - INC).abs() < 1e-9);
        assert!(file.read_text().starts_with("C 1 SYNTHETIC SURVEY"));

        let mut prm = Param::with_default_rule(size);
        let mut trc = vec![0f32; size * NS];
        file.read_trace(offset, size, Some(&mut trc), Some(&mut prm), 0)
            .expect("read block");
        (0..size).all(|i| {
            prm.get::<i64>(i, Meta::Il).expect("il") == shots[offset + i].il
                && prm.get::<usize>(i, Meta::Gtn).expect("gtn") == offset + i
                && trc[i * NS..(i + 1) * NS] == samples(1, offset + i)[..]
        })
    }).expect("cluster");
    assert!(ok.into_iter().all(|ok| ok));
}

#[test]
fn trace_count_is_agreed_on_flush() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("sparse.segy");

    // only the last rank writes, and far into the file
    let counts = LocalCluster::run(3, |comm| {
        let last = comm.rank() == comm.num_rank() - 1;
        let piol = piol(comm);
        let mut out = WriteSegy::create(piol, &path).expect("create");
        out.write_ns(NS).expect("ns");
        if last {
            let trc = samples(0, 0);
            out.write_trace(9, 1, Some(&trc), None, 0).expect("write");
        }
        let nt = out.read_nt().expect("nt");
        out.close().expect("close");
        nt
    }).expect("cluster");
    assert_eq!(counts, vec![10, 10, 10]);

    let (shots, traces) = read_all(&path);
    assert_eq!(shots.len(), 10);
    assert_eq!(traces[9], samples(0, 0));
    assert!(traces[..9].iter().all(|t| t.iter().all(|&s| s == 0.0)));
}

#[test]
fn sorted_copy_passes_the_order_check() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = dir.path().join("scrambled.segy");
    let output = dir.path().join("sorted.segy");
    let shots = survey(40, 7);
    write_survey(&input, &shots, 2, 2);

    let results = LocalCluster::run(3, |comm| {
        let piol = piol(comm);
        let mut file = ReadSegy::open(Arc::clone(&piol), &input).expect("open");
        let (offset, size) = decompose(file.read_nt(), piol.num_rank(), piol.rank());

        let before = check_order(&piol, &mut file, offset, size, SortType::LineROff).expect("check");
        let dest = sort_file(&piol, &mut file, offset, size, SortType::LineROff, true).expect("sort");
        let all_dest: Vec<usize> = piol.comm().all_gather(&dest).expect("gather").concat();

        let mut trc = vec![0f32; size * NS];
        let mut prm = Param::with_default_rule(size);
        file.read_trace(offset, size, Some(&mut trc), Some(&mut prm), 0)
            .expect("read");
        let mut out = WriteSegy::create(Arc::clone(&piol), &output).expect("create");
        out.write_ns(NS).expect("ns");
        out.write_trace_noncontiguous(&dest, Some(&trc), Some(&prm), 0)
            .expect("scatter");
        out.close().expect("close");

        let mut sorted = ReadSegy::open(Arc::clone(&piol), &output).expect("reopen");
        let after = check_order(&piol, &mut sorted, offset, size, SortType::LineROff).expect("check");
        (before, after, all_dest)
    }).expect("cluster");

    let expected = line_order(&shots);
    for (before, after, dest) in results {
        assert!(!before);
        assert!(after);
        for (sorted_pos, &input_pos) in expected.iter().enumerate() {
            assert_eq!(dest[input_pos], sorted_pos);
        }
    }

    let (sorted, traces) = read_all(&output);
    for (slot, &from) in expected.iter().enumerate() {
        assert_eq!(sorted[slot], shots[from]);
        assert_eq!(traces[slot], samples(2, from));
    }
}

#[test]
fn gathers_of_a_sorted_file_cover_every_trace() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("lines.segy");
    let scrambled = survey(31, 3);
    let shots: Vec<_> = line_order(&scrambled).into_iter().map(|i| scrambled[i]).collect();
    write_survey(&path, &shots, 3, 1);

    let mut expected: Vec<(i64, i64, usize, usize)> = Vec::new();
    for (t, shot) in shots.iter().enumerate() {
        match expected.last_mut() {
            Some(run) if (run.0, run.1) == (shot.il, shot.xl) => run.2 += 1,
            _ => expected.push((shot.il, shot.xl, 1, t)),
        }
    }

    let lists = LocalCluster::run(4, |comm| {
        let piol = piol(comm);
        let mut file = ReadSegy::open(Arc::clone(&piol), &path).expect("open");
        let dist = gathers(&piol, &mut file).expect("gathers");
        assert_eq!(dist.total(), dist.all(piol.comm()).expect("all").len());
        dist.all(piol.comm()).expect("all")
    }).expect("cluster");
    for list in lists {
        let found: Vec<_> = list.iter().map(|g| (g.il, g.xl, g.count, g.start)).collect();
        assert_eq!(found, expected);
    }
}

#[test]
fn too_few_traces_per_rank_is_reported_everywhere() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("tiny.segy");
    write_survey(&path, &survey(8, 5), 4, 1);

    let outcomes = LocalCluster::run(4, |comm| {
        let piol = piol(comm);
        let mut file = ReadSegy::open(Arc::clone(&piol), &path).expect("open");
        let (offset, size) = decompose(file.read_nt(), piol.num_rank(), piol.rank());
        let result = sort_file(&piol, &mut file, offset, size, SortType::SrcROff, false);
        (result, piol.is_err())
    }).expect("cluster");
    for (result, logged_error) in outcomes {
        assert!(matches!(result, Err(SegyError::InsufficientData { .. })));
        assert!(!logged_error);
    }
}
