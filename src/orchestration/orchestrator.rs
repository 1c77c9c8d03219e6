//! Async fan-out/fan-in checker with an explicit wait policy.
//!
//! `CheckOrchestrator` runs the same contract as
//! [`crate::fanout::check_websites`] on the tokio runtime: one unit of work
//! per submitted URL, exactly one report drained per unit. Unlike the
//! scoped-thread version it can stop waiting, either when the configured
//! timeout elapses or when its cancellation token fires. It never returns
//! partial results.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Serialize, Serializer};
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;

use crate::checker::WebsiteChecker;
use crate::error::{Error, Result};
use crate::fanout::{CheckResult, ResultSlots};
use crate::{slog, slog_debug, slog_error, slog_trace, slog_warn};

/// Orchestrator configuration.
///
/// The default waits forever and places no cap on in-flight checks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OrchestratorConfig {
    /// Give up on the run if not every URL has reported by then.
    pub timeout: Option<Duration>,
    /// Upper bound on checks evaluating at the same time.
    pub max_concurrent: Option<usize>,
}

/// Lifecycle events emitted during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckEvent {
    /// A unit of work was spawned for the URL at `index`.
    Dispatched {
        index: usize,
        url: String,
    },
    /// The checker reported for the URL at `index`.
    Reported {
        index: usize,
        url: String,
        ok: bool,
    },
    /// Every dispatched unit has reported.
    AllReported {
        total: usize,
    },
}

/// Outcome of a completed run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckReport {
    /// Verdict per distinct URL. Serialized in URL order.
    #[serde(serialize_with = "serialize_by_url")]
    pub results: HashMap<String, bool>,
    /// Number of checker invocations, duplicates included.
    pub evaluations: usize,
    pub elapsed_ms: u64,
}

impl CheckReport {
    pub fn all_ok(&self) -> bool {
        self.results.values().all(|ok| *ok)
    }

    /// URLs that failed the check, sorted.
    pub fn failed(&self) -> Vec<&str> {
        let mut failed: Vec<&str> = self
            .results
            .iter()
            .filter(|(_, ok)| !**ok)
            .map(|(url, _)| url.as_str())
            .collect();
        failed.sort_unstable();
        failed
    }

    /// Results ordered by URL, for stable output.
    pub fn sorted(&self) -> BTreeMap<&str, bool> {
        self.results
            .iter()
            .map(|(url, ok)| (url.as_str(), *ok))
            .collect()
    }
}

fn serialize_by_url<S: Serializer>(
    results: &HashMap<String, bool>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    results.iter().collect::<BTreeMap<_, _>>().serialize(serializer)
}

type Report = (usize, String, std::result::Result<bool, JoinError>);

/// Runs a checker over many URLs concurrently.
///
/// # Example
///
/// ```ignore
/// use std::sync::Arc;
/// use sitecheck::checker::PatternChecker;
/// use sitecheck::orchestration::{CheckOrchestrator, OrchestratorConfig};
///
/// let orchestrator = CheckOrchestrator::new(
///     Arc::new(PatternChecker::new()),
///     OrchestratorConfig::default(),
/// );
/// let report = orchestrator.run(&["http://good.example"]).await?;
/// assert!(report.all_ok());
/// ```
pub struct CheckOrchestrator<C: ?Sized> {
    checker: Arc<C>,
    config: OrchestratorConfig,
    event_tx: Option<mpsc::UnboundedSender<CheckEvent>>,
    cancel: CancellationToken,
}

impl<C> CheckOrchestrator<C>
where
    C: WebsiteChecker + ?Sized + 'static,
{
    pub fn new(checker: Arc<C>, config: OrchestratorConfig) -> Self {
        Self {
            checker,
            config,
            event_tx: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Emit lifecycle events on `event_tx`. Send failures are ignored.
    pub fn with_events(mut self, event_tx: mpsc::UnboundedSender<CheckEvent>) -> Self {
        self.event_tx = Some(event_tx);
        self
    }

    /// Token that aborts the current run and every later one once cancelled.
    pub fn cancel_handle(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Check every URL and wait for all of them to report.
    ///
    /// # Errors
    ///
    /// - `Error::Timeout` if the configured timeout elapses first
    /// - `Error::Cancelled` if the cancellation token fires first
    /// - `Error::TaskJoin` if the checker panicked for some URL
    ///
    /// Checks already running when the run is abandoned are left to finish
    /// on the blocking pool; their verdicts are discarded.
    pub async fn run<S: AsRef<str>>(&self, urls: &[S]) -> Result<CheckReport> {
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let start = Instant::now();
        let total = urls.len();
        let run_token = self.cancel.child_token();
        let deadline = self
            .config
            .timeout
            .map(|t| tokio::time::Instant::now() + t);
        let limiter = self.config.max_concurrent.map(|n| Arc::new(Semaphore::new(n)));

        slog_debug!(
            "CheckOrchestrator::run urls={} timeout={:?} max_concurrent={:?}",
            total,
            self.config.timeout,
            self.config.max_concurrent
        );

        let (tx, mut rx) = mpsc::unbounded_channel::<Report>();
        for (index, url) in urls.iter().enumerate() {
            let url = url.as_ref().to_string();
            self.emit(CheckEvent::Dispatched {
                index,
                url: url.clone(),
            });
            tokio::spawn(evaluate(
                Arc::clone(&self.checker),
                index,
                url,
                limiter.clone(),
                run_token.clone(),
                tx.clone(),
            ));
        }
        drop(tx);

        let outcome = self.drain(total, &mut rx, deadline, &run_token).await;
        // Units still queued behind the limiter skip the checker.
        run_token.cancel();
        let slots = outcome?;

        let report = CheckReport {
            results: slots.into_map(urls),
            evaluations: total,
            elapsed_ms: start.elapsed().as_millis() as u64,
        };
        self.emit(CheckEvent::AllReported { total });
        slog!(
            "Checked {} urls ({} distinct, {} failed) in {}ms",
            total,
            report.results.len(),
            report.failed().len(),
            report.elapsed_ms
        );
        Ok(report)
    }

    async fn drain(
        &self,
        total: usize,
        rx: &mut mpsc::UnboundedReceiver<Report>,
        deadline: Option<tokio::time::Instant>,
        run_token: &CancellationToken,
    ) -> Result<ResultSlots> {
        let mut slots = ResultSlots::new(total);

        while !slots.is_complete() {
            let next = tokio::select! {
                _ = run_token.cancelled() => {
                    slog_warn!(
                        "Check run cancelled with {}/{} reports",
                        slots.received(),
                        total
                    );
                    return Err(Error::Cancelled);
                }
                _ = wait_until(deadline) => {
                    let timeout = self.config.timeout.unwrap_or_default();
                    slog_error!(
                        "Check run timed out after {:?} with {}/{} reports",
                        timeout,
                        slots.received(),
                        total
                    );
                    return Err(Error::Timeout(timeout));
                }
                next = rx.recv() => next,
            };

            let Some((index, url, outcome)) = next else {
                return Err(Error::TaskJoin(format!(
                    "result channel closed after {}/{} reports",
                    slots.received(),
                    total
                )));
            };
            let ok = outcome.map_err(|e| Error::TaskJoin(format!("checking {url}: {e}")))?;

            let result = CheckResult { index, url, ok };
            slots.record(&result);
            self.emit(CheckEvent::Reported {
                index: result.index,
                url: result.url,
                ok: result.ok,
            });
        }

        Ok(slots)
    }

    fn emit(&self, event: CheckEvent) {
        if let Some(tx) = &self.event_tx {
            let _ = tx.send(event);
        }
    }
}

async fn evaluate<C>(
    checker: Arc<C>,
    index: usize,
    url: String,
    limiter: Option<Arc<Semaphore>>,
    run_token: CancellationToken,
    tx: mpsc::UnboundedSender<Report>,
) where
    C: WebsiteChecker + ?Sized + 'static,
{
    let _permit = match limiter {
        Some(limiter) => limiter.acquire_owned().await.ok(),
        None => None,
    };
    if run_token.is_cancelled() {
        slog_trace!("Skipping {} after the run was abandoned", url);
        return;
    }

    let probe = url.clone();
    let outcome = tokio::task::spawn_blocking(move || checker.check(&probe)).await;
    let _ = tx.send((index, url, outcome));
}

async fn wait_until(deadline: Option<tokio::time::Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
