//! Fan-out/fan-in over scoped threads.
//!
//! Each function here launches one thread per input, eagerly and without a
//! cap, and collects exactly one result per input before returning: from a
//! shared channel, or by joining every worker in [`concurrent_map_joined`].
//! Nothing is cancellable and nothing times out; for a bounded wait use
//! [`crate::orchestration::CheckOrchestrator`].

use std::collections::HashMap;
use std::time::Instant;

use crossbeam_channel::unbounded;

use crate::checker::WebsiteChecker;
use crate::sleeper::Sleeper;
use crate::{slog_debug, slog_trace};

/// One evaluation of the checker, tagged with its submission index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckResult {
    pub index: usize,
    pub url: String,
    pub ok: bool,
}

/// Places reports by submission index so assembly ignores completion order.
///
/// When a URL was submitted more than once, the occurrence with the highest
/// index decides its entry in the map.
#[derive(Debug)]
pub(crate) struct ResultSlots {
    slots: Vec<Option<bool>>,
    received: usize,
}

impl ResultSlots {
    pub(crate) fn new(len: usize) -> Self {
        Self {
            slots: vec![None; len],
            received: 0,
        }
    }

    pub(crate) fn record(&mut self, result: &CheckResult) {
        if let Some(slot) = self.slots.get_mut(result.index) {
            if slot.replace(result.ok).is_none() {
                self.received += 1;
            }
        }
    }

    pub(crate) fn received(&self) -> usize {
        self.received
    }

    pub(crate) fn is_complete(&self) -> bool {
        self.received == self.slots.len()
    }

    pub(crate) fn into_map<S: AsRef<str>>(self, urls: &[S]) -> HashMap<String, bool> {
        let mut results = HashMap::with_capacity(urls.len());
        for (url, slot) in urls.iter().zip(self.slots) {
            if let Some(ok) = slot {
                results.insert(url.as_ref().to_string(), ok);
            }
        }
        results
    }
}

/// Check every URL concurrently and map each one to the checker's verdict.
///
/// One thread is spawned per URL, duplicates included, and the call returns
/// once all of them have reported. The key set of the result is the set of
/// distinct URLs; a duplicated URL takes the verdict of its last occurrence.
///
/// This call has no timeout: if `checker` never returns for some URL, neither
/// does `check_websites`. A panic in `checker` is re-raised here after the
/// remaining threads finish.
pub fn check_websites<C, S>(checker: &C, urls: &[S]) -> HashMap<String, bool>
where
    C: WebsiteChecker + ?Sized,
    S: AsRef<str> + Sync,
{
    if urls.is_empty() {
        return HashMap::new();
    }

    let start = Instant::now();
    let (tx, rx) = unbounded::<CheckResult>();
    let mut slots = ResultSlots::new(urls.len());

    std::thread::scope(|s| {
        for (index, url) in urls.iter().enumerate() {
            let tx = tx.clone();
            s.spawn(move || {
                let url = url.as_ref();
                let started = Instant::now();
                let ok = checker.check(url);
                slog_trace!("check {} -> {} in {:?}", url, ok, started.elapsed());
                let _ = tx.send(CheckResult {
                    index,
                    url: url.to_string(),
                    ok,
                });
            });
        }
        drop(tx);

        for _ in 0..urls.len() {
            match rx.recv() {
                Ok(result) => slots.record(&result),
                // Every sender is gone: a checker panicked and the scope will re-raise it.
                Err(_) => break,
            }
        }
    });

    slog_debug!(
        "check_websites: {} urls in {:?}",
        urls.len(),
        start.elapsed()
    );
    slots.into_map(urls)
}

/// Reference mapping function for [`concurrent_map`].
pub fn double(n: i64) -> i64 {
    n * 2
}

/// Apply `f` to every item on its own thread, pausing via `sleeper` first.
///
/// Output order matches input order regardless of completion order. With a
/// sleeper that pauses for `d`, the whole call takes roughly `d` rather than
/// `items.len() * d`.
pub fn concurrent_map<T, U, F, S>(items: &[T], f: F, sleeper: &S) -> Vec<U>
where
    T: Sync,
    U: Send,
    F: Fn(&T) -> U + Sync,
    S: Sleeper + ?Sized,
{
    let (tx, rx) = unbounded::<(usize, U)>();
    let mut slots: Vec<Option<U>> = std::iter::repeat_with(|| None).take(items.len()).collect();
    let f = &f;

    std::thread::scope(|s| {
        for (index, item) in items.iter().enumerate() {
            let tx = tx.clone();
            s.spawn(move || {
                sleeper.sleep();
                let _ = tx.send((index, f(item)));
            });
        }
        drop(tx);

        for (index, value) in rx.iter().take(items.len()) {
            slots[index] = Some(value);
        }
    });

    slots.into_iter().flatten().collect()
}

/// Like [`concurrent_map`], but fans in by joining each worker instead of
/// draining a channel.
///
/// Every worker owns the output slot at its index; the caller waits for all
/// of them. A panic in `f` or `sleeper` is re-raised here.
pub fn concurrent_map_joined<T, U, F, S>(items: &[T], f: F, sleeper: &S) -> Vec<U>
where
    T: Sync,
    U: Send,
    F: Fn(&T) -> U + Sync,
    S: Sleeper + ?Sized,
{
    let f = &f;

    std::thread::scope(|s| {
        let handles: Vec<_> = items
            .iter()
            .map(|item| {
                s.spawn(move || {
                    sleeper.sleep();
                    f(item)
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|handle| match handle.join() {
                Ok(value) => value,
                Err(panic) => std::panic::resume_unwind(panic),
            })
            .collect()
    })
}
