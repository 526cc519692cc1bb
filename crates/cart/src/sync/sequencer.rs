//! Per-product ordering of background sync operations.
//!
//! Each product id gets a lane with a ticket counter. A ticket is drawn
//! synchronously when the UI issues an operation, so tickets follow issue
//! order even though the tasks that carry them are scheduled in any order.
//! A task waits for its ticket to be served, runs, and the lane advances
//! when its [`Turn`] drops.
//!
//! A ticket dropped before its turn (the task was cancelled, or the runtime
//! shut down) is marked abandoned and skipped, so a lane never stalls.
//! Operations on different product ids do not wait for each other.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, PoisonError};

use storefront_cart_core::ProductId;
use tokio::sync::watch;

/// Hands out ordered tickets per product id.
#[derive(Debug, Default)]
pub struct Sequencer {
    lanes: Mutex<HashMap<ProductId, Arc<Lane>>>,
}

#[derive(Debug)]
struct Lane {
    state: Mutex<LaneState>,
    serving: watch::Sender<u64>,
}

#[derive(Debug, Default)]
struct LaneState {
    next_ticket: u64,
    abandoned: BTreeSet<u64>,
}

impl Lane {
    fn new() -> Self {
        let (serving, _) = watch::channel(0);
        Self {
            state: Mutex::new(LaneState::default()),
            serving,
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, LaneState> {
        // State is two integers and a set; a panic mid-update cannot leave
        // it inconsistent, so poisoning is ignored
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Move `serving` past the current ticket and any abandoned ones.
    fn advance(&self) {
        let mut state = self.state();
        let mut next = *self.serving.borrow() + 1;
        while state.abandoned.remove(&next) {
            next += 1;
        }
        self.serving.send_replace(next);
    }
}

impl Sequencer {
    /// Create an empty sequencer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Draw the next ticket for a product id.
    #[must_use]
    pub fn ticket(&self, key: &ProductId) -> Ticket {
        let lane = {
            let mut lanes = self.lanes.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(
                lanes
                    .entry(key.clone())
                    .or_insert_with(|| Arc::new(Lane::new())),
            )
        };

        let number = {
            let mut state = lane.state();
            let number = state.next_ticket;
            state.next_ticket += 1;
            number
        };

        Ticket {
            lane: Some(lane),
            number,
        }
    }

    /// Number of product ids that have had a ticket drawn.
    #[must_use]
    pub fn lane_count(&self) -> usize {
        self.lanes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// A place in a product's queue.
#[derive(Debug)]
pub struct Ticket {
    lane: Option<Arc<Lane>>,
    number: u64,
}

impl Ticket {
    /// The ticket's position in its lane.
    #[must_use]
    pub const fn number(&self) -> u64 {
        self.number
    }

    /// Wait until every earlier ticket in the lane has finished.
    pub async fn wait(mut self) -> Turn {
        let Some(lane) = self.lane.clone() else {
            return Turn { lane: None };
        };

        let mut serving = lane.serving.subscribe();
        // The sender lives in `lane`, which we hold, so this cannot fail
        let _ = serving.wait_for(|&now| now >= self.number).await;

        self.lane = None;
        Turn { lane: Some(lane) }
    }
}

impl Drop for Ticket {
    fn drop(&mut self) {
        let Some(lane) = self.lane.take() else {
            return;
        };
        let mut state = lane.state();
        if *lane.serving.borrow() == self.number {
            drop(state);
            lane.advance();
        } else {
            state.abandoned.insert(self.number);
        }
    }
}

/// Exclusive turn in a lane; the next ticket is served when this drops.
#[derive(Debug)]
#[must_use = "the lane advances as soon as the turn is dropped"]
pub struct Turn {
    lane: Option<Arc<Lane>>,
}

impl Drop for Turn {
    fn drop(&mut self) {
        if let Some(lane) = self.lane.take() {
            lane.advance();
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use tokio::sync::Mutex as AsyncMutex;

    use super::*;

    #[tokio::test]
    async fn test_tickets_run_in_issue_order() {
        let sequencer = Sequencer::new();
        let key = ProductId::from("7");
        let log = Arc::new(AsyncMutex::new(Vec::new()));

        let tickets: Vec<_> = (0..5).map(|_| sequencer.ticket(&key)).collect();

        // Spawn in reverse so scheduling order disagrees with issue order
        let mut handles = Vec::new();
        for ticket in tickets.into_iter().rev() {
            let log = Arc::clone(&log);
            handles.push(tokio::spawn(async move {
                let number = ticket.number();
                let _turn = ticket.wait().await;
                tokio::time::sleep(Duration::from_millis(2)).await;
                log.lock().await.push(number);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(*log.lock().await, vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_lanes_are_independent() {
        let sequencer = Sequencer::new();
        let first = sequencer.ticket(&ProductId::from("1"));
        let other = sequencer.ticket(&ProductId::from("2"));

        // `first` is never waited on, but the other lane is not blocked
        let turn = tokio::time::timeout(Duration::from_secs(1), other.wait()).await;
        assert!(turn.is_ok());
        assert_eq!(sequencer.lane_count(), 2);
        drop(first);
    }

    #[tokio::test]
    async fn test_abandoned_ticket_is_skipped() {
        let sequencer = Sequencer::new();
        let key = ProductId::from("7");

        let first = sequencer.ticket(&key);
        let second = sequencer.ticket(&key);
        let third = sequencer.ticket(&key);

        let first_turn = first.wait().await;
        drop(second);
        drop(first_turn);

        let turn = tokio::time::timeout(Duration::from_secs(1), third.wait()).await;
        assert!(turn.is_ok());
    }

    #[tokio::test]
    async fn test_dropping_ticket_on_its_turn_advances() {
        let sequencer = Sequencer::new();
        let key = ProductId::from("7");

        let first = sequencer.ticket(&key);
        let second = sequencer.ticket(&key);
        drop(first);

        let turn = tokio::time::timeout(Duration::from_secs(1), second.wait()).await;
        assert!(turn.is_ok());
    }

    #[tokio::test]
    async fn test_later_ticket_waits_for_turn() {
        let sequencer = Sequencer::new();
        let key = ProductId::from("7");

        let first = sequencer.ticket(&key);
        let second = sequencer.ticket(&key);

        let first_turn = first.wait().await;
        let blocked = tokio::time::timeout(Duration::from_millis(20), second.wait()).await;
        assert!(blocked.is_err());
        drop(first_turn);
    }
}
