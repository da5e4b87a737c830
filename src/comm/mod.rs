//! Collective communication between cooperating ranks.
//!
//! Every method here is a blocking collective: all ranks must issue the same
//! sequence of calls. A rank with nothing to contribute still calls with an
//! empty payload.

mod local;
mod serial;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::Result;

pub use local::{LocalCluster, LocalComm};
pub use serial::SerialComm;

/// Payloads received from the left and right neighbours. Edge ranks get `None`.
pub type Neighbours<T> = (Option<T>, Option<T>);

/// Transport-level collective operations over raw bytes.
pub trait Collective: Send + Sync {
    fn rank(&self) -> usize;

    fn num_rank(&self) -> usize;

    /// Every rank's `local` payload, in rank order.
    fn all_gather_bytes(&self, local: Vec<u8>) -> Result<Vec<Vec<u8>>>;

    /// Send `to_left` to rank - 1 and `to_right` to rank + 1, receiving theirs.
    fn exchange_neighbours(
        &self,
        to_left: Vec<u8>,
        to_right: Vec<u8>,
    ) -> Result<Neighbours<Vec<u8>>>;

    fn barrier(&self) -> Result<()> {
        self.all_gather_bytes(Vec::new()).map(|_| ())
    }
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    Ok(bincode::serde::encode_to_vec(
        value,
        bincode::config::standard(),
    )?)
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    let (value, _) = bincode::serde::decode_from_slice(bytes, bincode::config::standard())?;
    Ok(value)
}

/// Typed collectives built on [`Collective`].
pub trait CollectiveExt: Collective {
    fn all_gather<T: Serialize + DeserializeOwned>(&self, value: &T) -> Result<Vec<T>> {
        self.all_gather_bytes(encode(value)?)?
            .iter()
            .map(|bytes| decode(bytes))
            .collect()
    }

    fn exchange<T: Serialize + DeserializeOwned>(
        &self,
        to_left: &T,
        to_right: &T,
    ) -> Result<Neighbours<T>> {
        let (left, right) = self.exchange_neighbours(encode(to_left)?, encode(to_right)?)?;
        let left = left.map(|bytes| decode(&bytes)).transpose()?;
        let right = right.map(|bytes| decode(&bytes)).transpose()?;
        Ok((left, right))
    }

    fn sum<T>(&self, value: T) -> Result<T>
    where
        T: Serialize + DeserializeOwned + std::iter::Sum<T>,
    {
        Ok(self.all_gather(&value)?.into_iter().sum())
    }

    fn max<T>(&self, value: T) -> Result<T>
    where
        T: Serialize + DeserializeOwned + PartialOrd + Copy,
    {
        let all = self.all_gather(&value)?;
        Ok(all
            .into_iter()
            .fold(value, |acc, v| if v > acc { v } else { acc }))
    }

    fn min<T>(&self, value: T) -> Result<T>
    where
        T: Serialize + DeserializeOwned + PartialOrd + Copy,
    {
        let all = self.all_gather(&value)?;
        Ok(all
            .into_iter()
            .fold(value, |acc, v| if v < acc { v } else { acc }))
    }

    /// Exclusive prefix sum: the total of `value` over all lower ranks.
    fn offset(&self, value: usize) -> Result<usize> {
        let rank = self.rank();
        Ok(self.all_gather(&value)?.into_iter().take(rank).sum())
    }

    /// Logical OR across ranks.
    fn any(&self, flag: bool) -> Result<bool> {
        Ok(self.all_gather(&flag)?.into_iter().any(|f| f))
    }

    /// `value` as held by `root`.
    fn broadcast<T: Serialize + DeserializeOwned>(&self, root: usize, value: &T) -> Result<T> {
        let mut all = self.all_gather(value)?;
        if root >= all.len() {
            return Err(crate::SegyError::Collective {
                operation: "broadcast",
                reason: format!("root {root} outside {} ranks", all.len()),
            });
        }
        Ok(all.swap_remove(root))
    }
}

impl<C: Collective + ?Sized> CollectiveExt for C {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reductions_across_ranks() {
        let results = LocalCluster::run(4, |comm| {
            let rank = comm.rank();
            let sum: u64 = comm.sum(rank as u64 + 1).unwrap();
            let max = comm.max(rank as i64 * 3).unwrap();
            let min = comm.min(10.0 - rank as f64).unwrap();
            let offset = comm.offset(rank + 1).unwrap();
            let any = comm.any(rank == 2).unwrap();
            let none = comm.any(false).unwrap();
            (sum, max, min, offset, any, none)
        }).expect("cluster");
        for (rank, (sum, max, min, offset, any, none)) in results.into_iter().enumerate() {
            assert_eq!(sum, 10);
            assert_eq!(max, 9);
            assert_eq!(min, 7.0);
            assert_eq!(offset, (1..=rank).sum::<usize>());
            assert!(any);
            assert!(!none);
        }
    }

    #[test]
    fn neighbour_exchange_reaches_adjacent_ranks_only() {
        let results = LocalCluster::run(3, |comm| {
            let rank = comm.rank();
            comm.exchange(&format!("{rank}->left"), &format!("{rank}->right"))
                .unwrap()
        }).expect("cluster");
        assert_eq!(results[0], (None, Some("1->left".to_string())));
        assert_eq!(
            results[1],
            (Some("0->right".to_string()), Some("2->left".to_string()))
        );
        assert_eq!(results[2], (Some("1->right".to_string()), None));
    }

    #[test]
    fn broadcast_and_gather_keep_rank_order() {
        let results = LocalCluster::run(3, |comm| {
            let gathered = comm.all_gather(&vec![comm.rank(); comm.rank()]).unwrap();
            let root = comm.broadcast(1, &format!("from {}", comm.rank())).unwrap();
            (gathered, root)
        }).expect("cluster");
        for (gathered, root) in results {
            assert_eq!(gathered, vec![vec![], vec![1], vec![2, 2]]);
            assert_eq!(root, "from 1");
        }
    }

    #[test]
    fn serial_comm_is_the_identity() {
        let comm = SerialComm::default();
        assert_eq!(comm.sum(5_u64).unwrap(), 5);
        assert_eq!(comm.offset(9).unwrap(), 0);
        assert_eq!(comm.exchange(&1_u8, &2_u8).unwrap(), (None, None));
        comm.barrier().unwrap();
    }
}
