use std::{
    num::NonZeroUsize,
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use crate::{error::Error, result::Result};
use tokio::{
    runtime::Handle,
    sync::{Semaphore, SemaphorePermit},
    task::JoinHandle,
    time::sleep,
};

/// Default interval between the start of two requests.
pub const DEFAULT_HOLD: Duration = Duration::from_secs(1);

/// Default number of requests allowed to await a response at once.
pub const DEFAULT_LIMIT: NonZeroUsize = match NonZeroUsize::new(8000) {
    Some(limit) => limit,
    None => unreachable!(),
};

/// Paces and admits outbound requests.
///
/// Two independent constraints are enforced:
/// - consecutive requests start at least `hold` apart,
/// - no more than `limit` requests are admitted at the same time.
///
/// Pacing is enforced on the *next* requester: the caller that takes the
/// pacing lock proceeds right away, and a background task hands the lock
/// back once `hold` has elapsed. Waiters on either constraint are queued
/// first-in, first-out.
#[derive(Debug)]
pub struct RequestGate {
    hold: Duration,
    limit: usize,
    pacing: Arc<Semaphore>,
    admission: Semaphore,
    runtime: Option<Handle>,
    release: Mutex<Option<JoinHandle<()>>>,
}

impl RequestGate {
    /// Creates a gate spawning its pacing releases on the ambient runtime.
    ///
    /// A `hold` of zero disables pacing. Limits above
    /// [`Semaphore::MAX_PERMITS`] are clamped.
    pub fn new(hold: Duration, limit: NonZeroUsize) -> Self {
        Self::with_runtime(hold, limit, None)
    }

    /// Creates a gate spawning its pacing releases on `runtime`,
    /// or on the ambient runtime when `None`.
    pub fn with_runtime(hold: Duration, limit: NonZeroUsize, runtime: Option<Handle>) -> Self {
        let mut limit = limit.get();
        if limit > Semaphore::MAX_PERMITS {
            log::warn!(
                "concurrency limit {limit} clamped to {}",
                Semaphore::MAX_PERMITS
            );
            limit = Semaphore::MAX_PERMITS;
        }

        RequestGate {
            hold,
            limit,
            pacing: Arc::new(Semaphore::new(1)),
            admission: Semaphore::new(limit),
            runtime,
            release: Mutex::new(None),
        }
    }

    /// Waits for the pacing window, then for a free admission slot.
    ///
    /// The returned [`Admission`] must be kept alive for the whole network
    /// call. Dropping it frees the slot, whether the call succeeded or not.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Closed`] if the gate is closed while waiting.
    pub async fn admit(&self) -> Result<Admission<'_>> {
        if !self.hold.is_zero() {
            self.pace().await?;
        }

        let permit = self.admission.acquire().await.map_err(|_| Error::Closed)?;
        log::trace!("request admitted, {} in flight", self.in_flight());
        Ok(Admission { _permit: permit })
    }

    async fn pace(&self) -> Result<()> {
        let permit = Arc::clone(&self.pacing)
            .acquire_owned()
            .await
            .map_err(|_| Error::Closed)?;

        // The lock travels with the task so it is freed even if the caller
        // is cancelled, or the task is aborted.
        let hold = self.hold;
        let release = async move {
            sleep(hold).await;
            drop(permit);
            log::trace!("pacing lock released after {hold:?}");
        };
        let handle = match &self.runtime {
            Some(runtime) => runtime.spawn(release),
            None => tokio::spawn(release),
        };

        // Only one release can be pending: the lock is ours until it fires.
        *self.release.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
        Ok(())
    }

    /// Closes the gate.
    ///
    /// Every pending and future [`admit`] fails with [`Error::Closed`].
    /// A pending pacing release is aborted, which frees the pacing lock.
    ///
    /// [`admit`]: RequestGate::admit
    pub fn close(&self) {
        self.admission.close();
        self.pacing.close();
        let pending = self
            .release
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = pending {
            handle.abort();
        }
    }

    /// Returns `true` once [`close`](RequestGate::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.admission.is_closed()
    }

    /// Returns the hold interval.
    pub fn hold(&self) -> Duration {
        self.hold
    }

    /// Returns the concurrency limit.
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Returns the number of admission slots currently free.
    pub fn available_permits(&self) -> usize {
        self.admission.available_permits()
    }

    /// Returns the number of requests currently admitted.
    pub fn in_flight(&self) -> usize {
        self.limit.saturating_sub(self.available_permits())
    }
}

impl Drop for RequestGate {
    fn drop(&mut self) {
        self.close();
    }
}

/// A held admission slot. Dropping it lets the next request in.
#[derive(Debug)]
#[must_use = "dropping an admission releases it immediately"]
pub struct Admission<'a> {
    _permit: SemaphorePermit<'a>,
}

impl Admission<'_> {
    /// Releases the slot. Equivalent to dropping the admission.
    pub fn release(self) {
        drop(self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::{timeout, Instant};

    fn limit(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn acquisitions_are_spaced_by_hold() {
        let gate = Arc::new(RequestGate::new(Duration::from_secs(1), limit(10)));

        let mut handles = vec![];
        for _ in 0..4 {
            let gate = Arc::clone(&gate);
            handles.push(tokio::spawn(async move {
                let _admission = gate.admit().await.unwrap();
                let at = Instant::now();
                // a network phase far longer than the hold
                sleep(Duration::from_secs(5)).await;
                at
            }));
        }

        let mut starts = vec![];
        for handle in handles {
            starts.push(handle.await.unwrap());
        }
        starts.sort();

        for pair in starts.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_secs(1));
        }
        // spacing only, the network phase is not serialized
        assert!(starts[3] - starts[0] < Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn first_request_is_not_delayed_but_the_next_one_is() {
        let gate = RequestGate::new(Duration::from_secs(1), limit(10));
        let start = Instant::now();

        gate.admit().await.unwrap().release();
        assert_eq!(start.elapsed(), Duration::ZERO);

        gate.admit().await.unwrap().release();
        assert!(start.elapsed() >= Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn zero_hold_disables_pacing() {
        let gate = RequestGate::new(Duration::ZERO, limit(2));
        let start = Instant::now();

        for _ in 0..5 {
            gate.admit().await.unwrap().release();
        }

        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrency_is_capped() {
        let gate = Arc::new(RequestGate::new(Duration::ZERO, limit(2)));
        let current = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let start = Instant::now();

        let mut handles = vec![];
        for _ in 0..3 {
            let gate = Arc::clone(&gate);
            let current = Arc::clone(&current);
            let peak = Arc::clone(&peak);
            handles.push(tokio::spawn(async move {
                let _admission = gate.admit().await.unwrap();
                let admitted_at = start.elapsed();
                let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                sleep(Duration::from_secs(1)).await;
                current.fetch_sub(1, Ordering::SeqCst);
                admitted_at
            }));
        }

        let mut admitted = vec![];
        for handle in handles {
            admitted.push(handle.await.unwrap());
        }
        admitted.sort();

        assert_eq!(peak.load(Ordering::SeqCst), 2);
        assert_eq!(admitted[1], Duration::ZERO);
        assert!(admitted[2] >= Duration::from_secs(1));
        assert_eq!(gate.in_flight(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn admission_is_released_on_error() {
        async fn failing(gate: &RequestGate) -> Result<()> {
            let _admission = gate.admit().await?;
            Err(Error::UnexpectedPayload("boom".into()))
        }

        let gate = RequestGate::new(Duration::ZERO, limit(1));
        assert!(failing(&gate).await.is_err());
        assert_eq!(gate.available_permits(), 1);
        assert!(timeout(Duration::from_secs(1), gate.admit()).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_waiter_does_not_keep_pacing_lock() {
        let gate = RequestGate::new(Duration::from_secs(1), limit(1));

        let held = gate.admit().await.unwrap();
        // takes the pacing lock at t=1s, then waits on admission until cancelled
        let cancelled = timeout(Duration::from_secs(3), gate.admit()).await;
        assert!(cancelled.is_err());
        drop(held);

        let start = Instant::now();
        let next = timeout(Duration::from_secs(1), gate.admit()).await;
        assert!(next.is_ok());
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn close_wakes_waiters() {
        let gate = Arc::new(RequestGate::new(Duration::ZERO, limit(1)));
        let held = gate.admit().await.unwrap();

        let waiter = {
            let gate = Arc::clone(&gate);
            tokio::spawn(async move { gate.admit().await.map(drop) })
        };
        tokio::task::yield_now().await;

        gate.close();
        assert!(gate.is_closed());
        assert!(matches!(waiter.await.unwrap(), Err(Error::Closed)));
        drop(held);
    }

    #[tokio::test(start_paused = true)]
    async fn close_frees_pending_pacing_release() {
        let gate = RequestGate::new(Duration::from_secs(3600), limit(1));
        gate.admit().await.unwrap().release();

        gate.close();
        assert!(gate.release.lock().unwrap().is_none());
        assert!(matches!(gate.admit().await, Err(Error::Closed)));
    }

    #[test]
    fn pacing_releases_run_on_the_given_runtime() {
        let pacer = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_time()
            .build()
            .unwrap();
        // no timer here: a release spawned on this runtime could not sleep
        let caller = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap();

        let hold = Duration::from_millis(100);
        let gate = RequestGate::with_runtime(hold, limit(1), Some(pacer.handle().clone()));

        let elapsed = caller.block_on(async {
            let start = std::time::Instant::now();
            gate.admit().await.unwrap().release();
            gate.admit().await.unwrap().release();
            start.elapsed()
        });

        assert!(elapsed >= hold);
        assert_eq!(gate.in_flight(), 0);
    }

    #[test]
    fn limit_is_clamped() {
        let gate = RequestGate::new(Duration::ZERO, limit(usize::MAX));
        assert_eq!(gate.limit(), Semaphore::MAX_PERMITS);
        assert_eq!(gate.in_flight(), 0);
    }
}
