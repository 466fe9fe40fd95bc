// src/mirror/frontier.rs
// =============================================================================
// The frontier: pending resources, the set of URLs already seen, and the
// in-flight counter that tells us when the crawl is over.
//
// How termination works:
// 1. enqueue() marks a URL seen, bumps in_flight and pushes the resource,
//    all under one lock
// 2. a worker dequeue()s it, fetches it, extracts links (which may enqueue
//    more work), optionally rewrites it, then calls mark_done()
// 3. mark_done() decrements in_flight; at zero the queue is empty too (every
//    queued item is also counted in flight) so the frontier is drained and
//    every blocked dequeue() wakes up with None
//
// Workers feed the queue themselves, so "close the channel when the producer
// is done" doesn't work here: there is no separate producer to wait for.
// =============================================================================

use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;
use url::Url;

use super::resource::{Resource, UrlFilter, Verdict};

#[derive(Debug, Default)]
struct State {
    pending: VecDeque<Resource>,
    // Canonical URL strings; only ever grows
    seen: HashSet<String>,
    failed: HashSet<String>,
    in_flight: usize,
    drained: bool,
}

/// Outcome of offering a URL to the frontier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Queued,
    AlreadySeen,
    Filtered(Verdict),
    /// The frontier already drained or was cancelled.
    Closed,
}

impl Admission {
    pub fn is_queued(self) -> bool {
        self == Admission::Queued
    }
}

/// Shared work queue of one crawl. Hand out `&Frontier` (or an `Arc`) to
/// every worker; the seen set is never exposed directly.
#[derive(Debug)]
pub struct Frontier {
    state: Mutex<State>,
    wake: Notify,
    filter: UrlFilter,
    output_dir: PathBuf,
}

impl Frontier {
    pub fn new(filter: UrlFilter, output_dir: impl Into<PathBuf>) -> Self {
        Frontier {
            state: Mutex::new(State::default()),
            wake: Notify::new(),
            filter,
            output_dir: output_dir.into(),
        }
    }

    pub fn filter(&self) -> &UrlFilter {
        &self.filter
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Offers a URL; returns `true` when it was queued.
    pub fn enqueue(&self, url: Url, is_html: bool) -> bool {
        self.admit(url, is_html).is_queued()
    }

    /// Like [`Frontier::enqueue`] but reports why a URL was turned away.
    pub fn admit(&self, url: Url, is_html: bool) -> Admission {
        let verdict = self.filter.check(&url);
        if verdict != Verdict::Accept {
            return Admission::Filtered(verdict);
        }
        self.push(url, is_html)
    }

    /// Queues the start URL. It skips the exclude/reject rules (the user
    /// asked for it explicitly) but still goes through dedup.
    pub fn seed(&self, url: Url) -> bool {
        self.push(url, true).is_queued()
    }

    fn push(&self, mut url: Url, is_html: bool) -> Admission {
        url.set_fragment(None);

        {
            let mut state = self.lock();
            if state.drained {
                return Admission::Closed;
            }
            // Check-and-insert happens in one critical section, so two workers
            // finding the same link can't both queue it
            if !state.seen.insert(url.as_str().to_string()) {
                return Admission::AlreadySeen;
            }
            state.in_flight += 1;
            state
                .pending
                .push_back(Resource::new(url, &self.output_dir, is_html));
        }

        self.wake.notify_one();
        Admission::Queued
    }

    /// Waits for the next resource. `None` means the frontier drained (or was
    /// cancelled) and the worker should exit.
    pub async fn dequeue(&self) -> Option<Resource> {
        loop {
            // Register interest before looking at the state, so a push or a
            // drain between the check and the await can't be missed
            let notified = self.wake.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.lock();
                if let Some(resource) = state.pending.pop_front() {
                    return Some(resource);
                }
                if state.drained {
                    return None;
                }
            }

            notified.await;
        }
    }

    /// Settles one unit of work (fetch + extract + rewrite), whatever its
    /// outcome. Must be called exactly once per dequeued resource.
    pub fn mark_done(&self) {
        let drained_now = {
            let mut state = self.lock();
            state.in_flight = state.in_flight.saturating_sub(1);
            if state.in_flight == 0 && state.pending.is_empty() && !state.drained {
                state.drained = true;
                true
            } else {
                false
            }
        };

        if drained_now {
            tracing::debug!("frontier drained");
            self.wake.notify_waiters();
        }
    }

    /// Remembers that a queued URL never made it to disk.
    pub fn mark_failed(&self, url: &Url) {
        self.lock().failed.insert(url.as_str().to_string());
    }

    pub fn has_failed(&self, url: &Url) -> bool {
        self.lock().failed.contains(url.as_str())
    }

    /// Local file for `url` if it belongs to this mirror: accepted by the
    /// filter, queued at some point, and not known to have failed.
    pub fn mirrored_path(&self, url: &Url) -> Option<PathBuf> {
        if !self.filter.accepts(url) {
            return None;
        }
        let state = self.lock();
        let key = url.as_str();
        if state.seen.contains(key) && !state.failed.contains(key) {
            Some(super::resource::local_path(url, &self.output_dir))
        } else {
            None
        }
    }

    /// Stops the crawl: drops everything still queued (settling each item so
    /// the counter stays consistent), refuses new work and wakes all waiters.
    /// Dropped URLs count as failed, so no converted link may point at them.
    /// Resources already handed to workers are settled by those workers.
    pub fn cancel(&self) {
        let dropped = {
            let mut state = self.lock();
            if state.drained {
                return;
            }
            let State {
                pending, failed, ..
            } = &mut *state;
            let dropped = pending.len();
            failed.extend(pending.drain(..).map(|resource| resource.url().as_str().to_string()));
            state.in_flight = state.in_flight.saturating_sub(dropped);
            state.drained = true;
            dropped
        };

        tracing::debug!(dropped, "frontier cancelled");
        self.wake.notify_waiters();
    }

    pub fn is_drained(&self) -> bool {
        self.lock().drained
    }

    pub fn in_flight(&self) -> usize {
        self.lock().in_flight
    }

    pub fn seen_count(&self) -> usize {
        self.lock().seen.len()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // A panicking worker must not wedge the whole crawl
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// -----------------------------------------------------------------------------
// BEGINNER NOTES:
//
// 1. Why a std Mutex in async code?
//    - Every critical section here is a few HashSet/VecDeque operations
//    - We never .await while holding the lock, so a blocking mutex is fine
//    - tokio's own docs recommend this for short, non-async sections
//
// 2. What is Notify?
//    - A tokio primitive that wakes up tasks waiting on notified()
//    - notify_one() wakes a single waiter (a new item arrived)
//    - notify_waiters() wakes everybody (the crawl is over)
//
// 3. Why enable() before checking the queue?
//    - Without it, an item could be pushed right after we saw an empty
//      queue but before we started waiting, and we'd sleep forever
//
// 4. Why is in_flight incremented on enqueue and not on dequeue?
//    - A worker enqueues children *before* it calls mark_done() for the
//      parent, so the counter can never touch zero while work remains
// -----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    fn frontier() -> Frontier {
        let seed = Url::parse("http://example.test/").unwrap();
        let filter = UrlFilter::new(&seed, &["jpg".to_string()], &["/private".to_string()]);
        Frontier::new(filter, "out")
    }

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_enqueue_dedups_canonical_urls() {
        let frontier = frontier();
        assert!(frontier.enqueue(url("http://example.test/a.html"), true));
        assert!(!frontier.enqueue(url("http://example.test/a.html"), true));
        // Fragments don't make a new URL
        assert!(!frontier.enqueue(url("http://example.test/a.html#part"), true));
        assert_eq!(frontier.in_flight(), 1);
        assert_eq!(frontier.seen_count(), 1);
    }

    #[test]
    fn test_enqueue_applies_filter() {
        let frontier = frontier();
        assert_eq!(
            frontier.admit(url("http://other.test/a.html"), true),
            Admission::Filtered(Verdict::OtherHost)
        );
        assert_eq!(
            frontier.admit(url("http://example.test/private/a.html"), true),
            Admission::Filtered(Verdict::ExcludedPath)
        );
        assert_eq!(
            frontier.admit(url("http://example.test/cat.JPG"), false),
            Admission::Filtered(Verdict::RejectedExtension)
        );
        assert_eq!(frontier.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_dequeue_returns_resources_with_local_paths() {
        let frontier = frontier();
        frontier.enqueue(url("http://example.test/css/site.css"), false);

        let resource = frontier.dequeue().await.unwrap();
        assert_eq!(resource.url().as_str(), "http://example.test/css/site.css");
        assert_eq!(
            resource.local_path(),
            Path::new("out/example.test/css/site.css")
        );
        assert!(!resource.is_html());
    }

    #[tokio::test]
    async fn test_drains_when_last_unit_settles() {
        let frontier = frontier();
        frontier.seed(url("http://example.test/"));

        let seed = frontier.dequeue().await.unwrap();
        // Work spawned while the seed is still in flight
        frontier.enqueue(url("http://example.test/child.html"), true);
        frontier.mark_done();
        assert!(!frontier.is_drained(), "child is still pending");

        let child = frontier.dequeue().await.unwrap();
        assert_ne!(seed.url(), child.url());
        frontier.mark_done();

        assert!(frontier.is_drained());
        assert!(frontier.dequeue().await.is_none());
        // Nothing is accepted once drained
        assert!(!frontier.enqueue(url("http://example.test/late.html"), true));
    }

    #[tokio::test]
    async fn test_blocked_dequeuers_wake_on_drain() {
        let frontier = Arc::new(frontier());
        frontier.seed(url("http://example.test/"));
        let _seed = frontier.dequeue().await.unwrap();

        let mut waiters = Vec::new();
        for _ in 0..3 {
            let frontier = frontier.clone();
            waiters.push(tokio::spawn(async move { frontier.dequeue().await }));
        }

        tokio::time::sleep(Duration::from_millis(20)).await;
        frontier.mark_done();

        for waiter in waiters {
            let result = tokio::time::timeout(Duration::from_secs(2), waiter)
                .await
                .expect("waiter should wake up")
                .unwrap();
            assert!(result.is_none());
        }
    }

    #[tokio::test]
    async fn test_blocked_dequeuer_receives_new_work() {
        let frontier = Arc::new(frontier());
        frontier.seed(url("http://example.test/"));
        let _seed = frontier.dequeue().await.unwrap();

        let waiter = {
            let frontier = frontier.clone();
            tokio::spawn(async move { frontier.dequeue().await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        frontier.enqueue(url("http://example.test/next.html"), true);

        let got = tokio::time::timeout(Duration::from_secs(2), waiter)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(got.url().path(), "/next.html");
    }

    #[tokio::test]
    async fn test_concurrent_discovery_enqueues_once() {
        let frontier = Arc::new(frontier());
        let mut tasks = Vec::new();
        for _ in 0..16 {
            let frontier = frontier.clone();
            tasks.push(tokio::spawn(async move {
                frontier.enqueue(url("http://example.test/shared.html"), true)
            }));
        }

        let mut queued = 0;
        for task in tasks {
            if task.await.unwrap() {
                queued += 1;
            }
        }
        assert_eq!(queued, 1);
        assert_eq!(frontier.in_flight(), 1);
    }

    #[tokio::test]
    async fn test_cancel_settles_pending_and_unblocks() {
        let frontier = frontier();
        frontier.seed(url("http://example.test/"));
        frontier.enqueue(url("http://example.test/a.html"), true);
        frontier.enqueue(url("http://example.test/b.html"), true);

        let _taken = frontier.dequeue().await.unwrap();
        frontier.cancel();

        // Only the resource held by a worker is still in flight
        assert_eq!(frontier.in_flight(), 1);
        assert!(frontier.dequeue().await.is_none());
        frontier.mark_done();
        assert_eq!(frontier.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_cancel_marks_dropped_urls_failed() {
        let frontier = frontier();
        let a = url("http://example.test/a.html");
        let b = url("http://example.test/b.html");
        frontier.seed(url("http://example.test/"));
        frontier.enqueue(a.clone(), true);
        frontier.enqueue(b.clone(), true);

        let taken = frontier.dequeue().await.unwrap();
        frontier.cancel();

        assert!(frontier.has_failed(&a));
        assert!(frontier.has_failed(&b));
        assert_eq!(frontier.mirrored_path(&a), None);
        // Still owned by its worker, which decides how it ended
        assert!(!frontier.has_failed(taken.url()));
        frontier.mark_done();
    }

    #[test]
    fn test_mirrored_path_ignores_failed_and_unseen() {
        let frontier = frontier();
        let ok = url("http://example.test/ok.html");
        let broken = url("http://example.test/broken.html");
        frontier.enqueue(ok.clone(), true);
        frontier.enqueue(broken.clone(), true);
        frontier.mark_failed(&broken);

        assert_eq!(
            frontier.mirrored_path(&ok),
            Some(PathBuf::from("out/example.test/ok.html"))
        );
        assert_eq!(frontier.mirrored_path(&broken), None);
        assert_eq!(frontier.mirrored_path(&url("http://example.test/never.html")), None);
        assert!(frontier.has_failed(&broken));
    }
}
