//! Process-level coordination between workers.
//!
//! Workers only meet at two points per diffusion call: the halo exchange and
//! the per-species convergence reduction. [`Communicator`] exposes exactly
//! those operations (plus sum/max reductions for aggregate diagnostics).

use std::ops::Range;

use anyhow::{Result, anyhow};
use crossbeam_channel::{Receiver, Sender, unbounded};

/// Point-to-point exchange and collective reductions across workers.
pub trait Communicator: Send {
    fn rank(&self) -> usize;

    fn size(&self) -> usize;

    /// Sends `send[range]` to every listed peer, then blocks until every
    /// listed receive has been filled into `recv[range]`.
    fn exchange(
        &mut self,
        send: &[f64],
        sends: &[(usize, Range<usize>)],
        recv: &mut [f64],
        recvs: &[(usize, Range<usize>)],
    ) -> Result<()>;

    /// Element-wise logical AND across all workers, in place.
    fn all_and(&mut self, flags: &mut [bool]) -> Result<()>;

    /// Element-wise sum across all workers, in place.
    fn all_sum(&mut self, values: &mut [f64]) -> Result<()>;

    /// Element-wise maximum across all workers, in place.
    fn all_max(&mut self, values: &mut [f64]) -> Result<()>;
}

/// The only worker of a run. Every collective is the identity.
#[derive(Debug, Clone, Copy, Default)]
pub struct SingleWorker;

impl Communicator for SingleWorker {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn exchange(
        &mut self,
        _send: &[f64],
        sends: &[(usize, Range<usize>)],
        _recv: &mut [f64],
        recvs: &[(usize, Range<usize>)],
    ) -> Result<()> {
        anyhow::ensure!(
            sends.is_empty() && recvs.is_empty(),
            "single worker has no peers to exchange with"
        );
        Ok(())
    }

    fn all_and(&mut self, _flags: &mut [bool]) -> Result<()> {
        Ok(())
    }

    fn all_sum(&mut self, _values: &mut [f64]) -> Result<()> {
        Ok(())
    }

    fn all_max(&mut self, _values: &mut [f64]) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug)]
enum Message {
    Halo(Vec<f64>),
    Flags(Vec<bool>),
    Values(Vec<f64>),
}

/// Endpoint of an in-process cluster of workers connected pairwise by channels.
///
/// Sends never block; receives block until the peer's message arrives. A peer
/// that hangs up turns every pending receive into an error, which aborts the run.
pub struct LocalWorker {
    rank: usize,
    senders: Vec<Sender<Message>>,
    receivers: Vec<Receiver<Message>>,
}

/// Builds the endpoints of a fully connected in-process cluster.
pub struct LocalCluster;

impl LocalCluster {
    /// Returns one endpoint per rank; move each into its own thread.
    pub fn new(size: usize) -> Vec<LocalWorker> {
        // channels[from][to]
        let mut senders: Vec<Vec<Sender<Message>>> = vec![Vec::with_capacity(size); size];
        let mut receivers: Vec<Vec<Option<Receiver<Message>>>> =
            (0..size).map(|_| (0..size).map(|_| None).collect()).collect();
        for (from, row) in senders.iter_mut().enumerate() {
            for to_receivers in receivers.iter_mut() {
                let (tx, rx) = unbounded();
                row.push(tx);
                to_receivers[from] = Some(rx);
            }
        }
        senders
            .into_iter()
            .zip(receivers)
            .enumerate()
            .map(|(rank, (senders, receivers))| LocalWorker {
                rank,
                senders,
                receivers: receivers.into_iter().flatten().collect(),
            })
            .collect()
    }
}

impl LocalWorker {
    fn send(&self, to: usize, msg: Message) -> Result<()> {
        self.senders[to]
            .send(msg)
            .map_err(|_| anyhow!("worker {to} disconnected"))
    }

    fn recv(&self, from: usize) -> Result<Message> {
        self.receivers[from]
            .recv()
            .map_err(|_| anyhow!("worker {from} disconnected"))
    }

    fn gather_values(&self, values: &[f64]) -> Result<Vec<Vec<f64>>> {
        for peer in self.peers() {
            self.send(peer, Message::Values(values.to_vec()))?;
        }
        let mut out = Vec::with_capacity(self.senders.len() - 1);
        for peer in self.peers() {
            match self.recv(peer)? {
                Message::Values(v) if v.len() == values.len() => out.push(v),
                other => anyhow::bail!("unexpected message from worker {peer}: {other:?}"),
            }
        }
        Ok(out)
    }

    fn peers(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.senders.len()).filter(move |&p| p != self.rank)
    }
}

impl Communicator for LocalWorker {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.senders.len()
    }

    fn exchange(
        &mut self,
        send: &[f64],
        sends: &[(usize, Range<usize>)],
        recv: &mut [f64],
        recvs: &[(usize, Range<usize>)],
    ) -> Result<()> {
        for (peer, range) in sends {
            self.send(*peer, Message::Halo(send[range.clone()].to_vec()))?;
        }
        for (peer, range) in recvs {
            match self.recv(*peer)? {
                Message::Halo(data) => {
                    anyhow::ensure!(
                        data.len() == range.len(),
                        "halo from worker {peer} has {} values, expected {}",
                        data.len(),
                        range.len()
                    );
                    recv[range.clone()].copy_from_slice(&data);
                }
                other => anyhow::bail!("unexpected message from worker {peer}: {other:?}"),
            }
        }
        Ok(())
    }

    fn all_and(&mut self, flags: &mut [bool]) -> Result<()> {
        for peer in self.peers() {
            self.send(peer, Message::Flags(flags.to_vec()))?;
        }
        let peers: Vec<usize> = self.peers().collect();
        for peer in peers {
            match self.recv(peer)? {
                Message::Flags(other) if other.len() == flags.len() => {
                    for (f, o) in flags.iter_mut().zip(other) {
                        *f &= o;
                    }
                }
                other => anyhow::bail!("unexpected message from worker {peer}: {other:?}"),
            }
        }
        Ok(())
    }

    fn all_sum(&mut self, values: &mut [f64]) -> Result<()> {
        // Sum in rank order so every worker gets bit-identical results.
        let gathered = self.gather_values(values)?;
        let mut by_rank: Vec<&[f64]> = Vec::with_capacity(gathered.len() + 1);
        let mut others = gathered.iter();
        let own = values.to_vec();
        for r in 0..self.size() {
            if r == self.rank {
                by_rank.push(&own);
            } else if let Some(v) = others.next() {
                by_rank.push(v);
            }
        }
        for (i, v) in values.iter_mut().enumerate() {
            *v = by_rank.iter().map(|row| row[i]).sum();
        }
        Ok(())
    }

    fn all_max(&mut self, values: &mut [f64]) -> Result<()> {
        for other in self.gather_values(values)? {
            for (v, o) in values.iter_mut().zip(other) {
                *v = v.max(o);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_single_worker_reductions_are_identity() -> Result<()> {
        let mut c = SingleWorker;
        let mut flags = [true, false];
        c.all_and(&mut flags)?;
        assert_eq!(flags, [true, false]);
        let mut v = [1.5];
        c.all_sum(&mut v)?;
        assert_eq!(v, [1.5]);
        c.exchange(&[], &[], &mut [], &[])?;
        Ok(())
    }

    #[test]
    fn test_local_cluster_reductions() {
        let handles: Vec<_> = LocalCluster::new(3)
            .into_iter()
            .map(|mut w| {
                thread::spawn(move || -> Result<(Vec<bool>, f64, f64)> {
                    let r = w.rank();
                    let mut flags = vec![true, r != 1];
                    w.all_and(&mut flags)?;
                    let mut sum = [r as f64 + 1.0];
                    w.all_sum(&mut sum)?;
                    let mut max = [r as f64];
                    w.all_max(&mut max)?;
                    Ok((flags, sum[0], max[0]))
                })
            })
            .collect();
        for h in handles {
            let (flags, sum, max) = h.join().unwrap().unwrap();
            assert_eq!(flags, vec![true, false]);
            assert_eq!(sum, 6.0);
            assert_eq!(max, 2.0);
        }
    }

    #[test]
    fn test_local_cluster_exchange() {
        let handles: Vec<_> = LocalCluster::new(2)
            .into_iter()
            .map(|mut w| {
                thread::spawn(move || -> Result<Vec<f64>> {
                    let peer = 1 - w.rank();
                    let send = vec![w.rank() as f64; 3];
                    let mut recv = vec![0.0; 3];
                    w.exchange(&send, &[(peer, 0..3)], &mut recv, &[(peer, 0..3)])?;
                    Ok(recv)
                })
            })
            .collect();
        let results: Vec<Vec<f64>> = handles.into_iter().map(|h| h.join().unwrap().unwrap()).collect();
        assert_eq!(results[0], vec![1.0; 3]);
        assert_eq!(results[1], vec![0.0; 3]);
    }

    #[test]
    fn test_disconnected_peer_is_an_error() {
        let mut workers = LocalCluster::new(2);
        let w1 = workers.pop().unwrap();
        let mut w0 = workers.pop().unwrap();
        drop(w1);
        let mut flags = [true];
        assert!(w0.all_and(&mut flags).is_err());
    }
}
