//! Handing a row to the chosen output channel.
//!
//! Selection never blocks; delivery can. The default [`RetryPolicy::Spin`]
//! keeps retrying a 1 ns put until the channel takes the row, with no
//! upper bound, so a channel that never drains stalls the caller.
//! [`RetryPolicy::Bounded`] gives up after a fixed number of attempts.

use std::sync::mpsc::{SyncSender, TrySendError};
use std::time::Duration;
use tracing::trace;

use crate::core::distribution::{DistributionError, RowDistribution};

/// Per-attempt wait handed to [`OutputChannel::try_put`].
pub const PUT_TIMEOUT: Duration = Duration::from_nanos(1);

/// Why a put did not go through. The row comes back either way.
#[derive(Debug)]
pub enum Rejected<T> {
    Full(T),
    Closed(T),
}

/// One outgoing edge.
pub trait OutputChannel<T> {
    /// Try to enqueue `row`, waiting at most `timeout`.
    fn try_put(&self, row: T, timeout: Duration) -> Result<(), Rejected<T>>;
}

/// `SyncSender` has no timed send: a full channel gets one more try after
/// sleeping `timeout`.
impl<T> OutputChannel<T> for SyncSender<T> {
    fn try_put(&self, row: T, timeout: Duration) -> Result<(), Rejected<T>> {
        let row = match self.try_send(row) {
            Ok(()) => return Ok(()),
            Err(TrySendError::Full(row)) => row,
            Err(TrySendError::Disconnected(row)) => return Err(Rejected::Closed(row)),
        };
        std::thread::sleep(timeout);
        match self.try_send(row) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(row)) => Err(Rejected::Full(row)),
            Err(TrySendError::Disconnected(row)) => Err(Rejected::Closed(row)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RetryPolicy {
    /// Retry until accepted.
    #[default]
    Spin,
    /// Give up after `attempts` puts, sleeping `backoff` between them.
    Bounded { attempts: u32, backoff: Duration },
}

/// Select an edge for `row` and deliver it there. Returns the edge index.
pub fn distribute_row<T, D, C>(
    distribution: &mut D,
    graph: &str,
    step: &str,
    row: T,
    channels: &[C],
    policy: RetryPolicy,
) -> Result<usize, DistributionError>
where
    D: RowDistribution + ?Sized,
    C: OutputChannel<T>,
{
    let index = distribution.select_edge(graph, step, channels.len())?;
    let channel = channels
        .get(index)
        .ok_or(DistributionError::EdgeOutOfRange {
            index,
            available: channels.len(),
        })?;

    let mut row = row;
    let mut attempts: u32 = 0;
    loop {
        attempts = attempts.saturating_add(1);
        match channel.try_put(row, PUT_TIMEOUT) {
            Ok(()) => return Ok(index),
            Err(Rejected::Closed(_)) => return Err(DistributionError::ChannelClosed(index)),
            Err(Rejected::Full(back)) => {
                row = back;
                match policy {
                    RetryPolicy::Spin => std::hint::spin_loop(),
                    RetryPolicy::Bounded {
                        attempts: max,
                        backoff,
                    } => {
                        if attempts >= max {
                            return Err(DistributionError::DeliveryExhausted { index, attempts });
                        }
                        trace!(index, attempts, "output channel full, backing off");
                        std::thread::sleep(backoff);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::random::RandomDistribution;
    use std::cell::Cell;
    use std::sync::mpsc::sync_channel;

    /// Refuses the first `refusals` puts.
    struct Stubborn {
        refusals: Cell<u32>,
        accepted: Cell<Option<u32>>,
    }

    impl OutputChannel<u32> for Stubborn {
        fn try_put(&self, row: u32, _timeout: Duration) -> Result<(), Rejected<u32>> {
            if self.refusals.get() > 0 {
                self.refusals.set(self.refusals.get() - 1);
                return Err(Rejected::Full(row));
            }
            self.accepted.set(Some(row));
            Ok(())
        }
    }

    #[test]
    fn spin_retries_until_accepted() {
        let mut dist = RandomDistribution::with_seed(3);
        let channel = Stubborn {
            refusals: Cell::new(50),
            accepted: Cell::new(None),
        };
        let index = distribute_row(
            &mut dist,
            "t",
            "s",
            7,
            std::slice::from_ref(&channel),
            RetryPolicy::Spin,
        )
        .unwrap();
        assert_eq!(index, 0);
        assert_eq!(channel.accepted.get(), Some(7));
    }

    #[test]
    fn bounded_policy_gives_up() {
        let mut dist = RandomDistribution::with_seed(3);
        let channel = Stubborn {
            refusals: Cell::new(10),
            accepted: Cell::new(None),
        };
        let result = distribute_row(
            &mut dist,
            "t",
            "s",
            7,
            std::slice::from_ref(&channel),
            RetryPolicy::Bounded {
                attempts: 3,
                backoff: Duration::ZERO,
            },
        );
        assert!(matches!(
            result,
            Err(DistributionError::DeliveryExhausted { index: 0, attempts: 3 })
        ));
        assert_eq!(channel.accepted.get(), None);
    }

    #[test]
    fn sync_sender_delivers_and_reports_closed() {
        let mut dist = RandomDistribution::with_seed(3);
        let (tx, rx) = sync_channel::<u32>(1);
        let index = distribute_row(&mut dist, "t", "s", 5, &[tx.clone()], RetryPolicy::Spin)
            .unwrap();
        assert_eq!(index, 0);
        assert_eq!(rx.recv().unwrap(), 5);

        drop(rx);
        assert!(matches!(
            distribute_row(&mut dist, "t", "s", 6, &[tx], RetryPolicy::Spin),
            Err(DistributionError::ChannelClosed(0))
        ));
    }

    #[test]
    fn sync_sender_put_waits_out_its_timeout() {
        let (tx, rx) = sync_channel::<u32>(1);
        tx.try_put(1, Duration::ZERO).unwrap();
        assert!(matches!(
            tx.try_put(2, Duration::from_millis(1)),
            Err(Rejected::Full(2))
        ));

        let reader = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(10));
            let first = rx.recv().unwrap();
            (first, rx)
        });
        // Full on the first try, drained while waiting.
        tx.try_put(2, Duration::from_millis(500)).unwrap();
        let (first, rx) = reader.join().unwrap();
        assert_eq!(first, 1);
        assert_eq!(rx.recv().unwrap(), 2);
    }

    #[test]
    fn no_channels_is_an_error() {
        let mut dist = RandomDistribution::with_seed(3);
        let channels: [SyncSender<u32>; 0] = [];
        assert!(matches!(
            distribute_row(&mut dist, "t", "s", 1, &channels, RetryPolicy::Spin),
            Err(DistributionError::NoEdges)
        ));
    }
}
