//! In-process cluster: one thread per rank, one channel per ordered rank pair.
//!
//! Channels are FIFO per pair, so as long as every rank issues the same
//! sequence of collectives the messages line up without tags. A rank that
//! exits early drops its senders and its peers see an error instead of
//! blocking forever.

use std::thread;

use crossbeam_channel::{Receiver, Sender, unbounded};

use super::{Collective, Neighbours};
use crate::error::{Result, SegyError};

/// Endpoint of one rank inside a [`LocalCluster`].
#[derive(Debug)]
pub struct LocalComm {
    rank: usize,
    num_rank: usize,
    /// Indexed by destination rank.
    outbox: Vec<Sender<Vec<u8>>>,
    /// Indexed by source rank.
    inbox: Vec<Receiver<Vec<u8>>>,
}

impl LocalComm {
    fn send(&self, operation: &'static str, to: usize, payload: Vec<u8>) -> Result<()> {
        self.outbox[to]
            .send(payload)
            .map_err(|_| SegyError::Collective {
                operation,
                reason: format!("rank {to} hung up"),
            })
    }

    fn recv(&self, operation: &'static str, from: usize) -> Result<Vec<u8>> {
        self.inbox[from].recv().map_err(|_| SegyError::Collective {
            operation,
            reason: format!("rank {from} hung up"),
        })
    }
}

impl Collective for LocalComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn num_rank(&self) -> usize {
        self.num_rank
    }

    fn all_gather_bytes(&self, local: Vec<u8>) -> Result<Vec<Vec<u8>>> {
        for to in (0..self.num_rank).filter(|&to| to != self.rank) {
            self.send("all_gather", to, local.clone())?;
        }
        let mut gathered = Vec::with_capacity(self.num_rank);
        for from in 0..self.num_rank {
            if from == self.rank {
                gathered.push(local.clone());
            } else {
                gathered.push(self.recv("all_gather", from)?);
            }
        }
        Ok(gathered)
    }

    fn exchange_neighbours(
        &self,
        to_left: Vec<u8>,
        to_right: Vec<u8>,
    ) -> Result<Neighbours<Vec<u8>>> {
        let left = self.rank.checked_sub(1);
        let right = Some(self.rank + 1).filter(|&r| r < self.num_rank);
        if let Some(left) = left {
            self.send("exchange", left, to_left)?;
        }
        if let Some(right) = right {
            self.send("exchange", right, to_right)?;
        }
        let from_left = left.map(|l| self.recv("exchange", l)).transpose()?;
        let from_right = right.map(|r| self.recv("exchange", r)).transpose()?;
        Ok((from_left, from_right))
    }
}

/// Builder and runner for a set of [`LocalComm`] endpoints.
pub struct LocalCluster;

impl LocalCluster {
    /// Create `num_rank` connected endpoints, in rank order.
    #[must_use]
    pub fn connect(num_rank: usize) -> Vec<LocalComm> {
        let mut senders: Vec<Vec<Sender<Vec<u8>>>> = Vec::with_capacity(num_rank);
        let mut receivers: Vec<Vec<Option<Receiver<Vec<u8>>>>> = Vec::with_capacity(num_rank);
        for _ in 0..num_rank {
            let (tx, rx): (Vec<_>, Vec<_>) = (0..num_rank).map(|_| unbounded()).unzip();
            senders.push(tx);
            receivers.push(rx.into_iter().map(Some).collect());
        }

        senders
            .into_iter()
            .enumerate()
            .map(|(rank, outbox)| {
                let inbox = receivers
                    .iter_mut()
                    .filter_map(|row| row[rank].take())
                    .collect();
                LocalComm {
                    rank,
                    num_rank,
                    outbox,
                    inbox,
                }
            })
            .collect()
    }

    /// Run `job` once per rank on its own thread and collect the results in
    /// rank order. A panic on any rank is resumed on the caller.
    ///
    /// If a rank thread cannot be spawned its endpoint is dropped, so the
    /// ranks that did start see a disconnected channel; they are joined
    /// before the spawn error is returned.
    pub fn run<T, F>(num_rank: usize, job: F) -> Result<Vec<T>>
    where
        T: Send,
        F: Fn(LocalComm) -> T + Sync,
    {
        let comms = Self::connect(num_rank);
        thread::scope(|scope| {
            let handles: Vec<_> = comms
                .into_iter()
                .map(|comm| {
                    let job = &job;
                    thread::Builder::new()
                        .name(format!("rank-{}", comm.rank))
                        .spawn_scoped(scope, move || job(comm))
                })
                .collect();
            let mut results = Vec::with_capacity(num_rank);
            let mut spawn_error = None;
            for handle in handles {
                match handle {
                    Ok(handle) => match handle.join() {
                        Ok(value) => results.push(value),
                        Err(panic) => std::panic::resume_unwind(panic),
                    },
                    Err(err) => {
                        tracing::error!(%err, "failed to spawn rank thread");
                        spawn_error.get_or_insert(err);
                    }
                }
            }
            match spawn_error {
                Some(err) => Err(SegyError::Io(err)),
                None => Ok(results),
            }
        })
    }
}
