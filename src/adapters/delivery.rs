//! Callback Delivery Contexts
//!
//! - [`InlineDelivery`] runs the job on whichever task produced the result
//! - [`SerialDelivery`] runs jobs one at a time, in submission order, on a
//!   dedicated task; the stand-in for a UI thread

use std::panic::{catch_unwind, AssertUnwindSafe};

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::domain::{Delivery, DeliveryJob};

/// Runs jobs immediately on the calling task
#[derive(Debug, Clone, Copy, Default)]
pub struct InlineDelivery;

impl Delivery for InlineDelivery {
    fn deliver(&self, job: DeliveryJob) {
        run_job(job);
    }
}

/// Runs jobs sequentially on one spawned task
#[derive(Debug, Clone)]
pub struct SerialDelivery {
    tx: mpsc::UnboundedSender<DeliveryJob>,
}

impl SerialDelivery {
    /// Spawn the delivery task. Must be called inside a tokio runtime.
    pub fn spawn() -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<DeliveryJob>();

        tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                run_job(job);
            }
            debug!("serial delivery context stopped");
        });

        Self { tx }
    }
}

impl Delivery for SerialDelivery {
    fn deliver(&self, job: DeliveryJob) {
        if let Err(mpsc::error::SendError(job)) = self.tx.send(job) {
            // Runtime is going away; better late on the wrong task than never
            run_job(job);
        }
    }
}

/// Run a job, containing panics so one bad callback cannot stop delivery
fn run_job(job: DeliveryJob) {
    if catch_unwind(AssertUnwindSafe(job)).is_err() {
        warn!("result callback panicked");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use tokio::sync::oneshot;

    use super::*;

    #[test]
    fn test_inline_runs_immediately() {
        let hit = Arc::new(Mutex::new(false));
        let flag = hit.clone();
        InlineDelivery.deliver(Box::new(move || *flag.lock().unwrap() = true));
        assert!(*hit.lock().unwrap());
    }

    #[tokio::test]
    async fn test_serial_preserves_order() {
        let delivery = SerialDelivery::spawn();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for i in 0..50 {
            let seen = seen.clone();
            delivery.deliver(Box::new(move || seen.lock().unwrap().push(i)));
        }

        let (done_tx, done_rx) = oneshot::channel();
        delivery.deliver(Box::new(move || {
            let _ = done_tx.send(());
        }));
        done_rx.await.unwrap();

        assert_eq!(*seen.lock().unwrap(), (0..50).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_serial_survives_panicking_job() {
        let delivery = SerialDelivery::spawn();
        delivery.deliver(Box::new(|| panic!("boom")));

        let (done_tx, done_rx) = oneshot::channel();
        delivery.deliver(Box::new(move || {
            let _ = done_tx.send(());
        }));
        assert!(done_rx.await.is_ok());
    }
}
