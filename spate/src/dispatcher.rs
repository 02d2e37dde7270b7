use crate::reporter::Reporter;
use crate::transport::{RawResponse, Transport};
use futures_util::stream::{FuturesUnordered, StreamExt};
use spate_core::{Classification, RunConfig, SyntheticRequest, TransportErrorKind};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{timeout, Instant};
#[allow(unused)]
use tracing::{debug, trace, warn};

/// Cooperative stop signal for a run in progress.
///
/// Stopping halts further generation; everything already produced drains to
/// completion (or its timeout) and still shows up in the final summary.
#[derive(Clone, Debug, Default)]
pub struct StopHandle {
    stopped: Arc<AtomicBool>,
}

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.stopped.store(true, Ordering::Relaxed);
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Relaxed)
    }
}

/// One resolved call, before the reporter folds it into the run statistics.
pub(crate) struct Completion {
    pub index: u64,
    pub email: String,
    pub classification: Classification,
    pub error_detail: Option<String>,
    pub latency: Duration,
}

/// Admission-controlled dispatch loop.
///
/// A single control flow owns the in-flight set, the pending buffer and the
/// reporter, so completion accounting needs no locks. Invariants: the
/// in-flight set never exceeds the admission limit, a slot refills only when
/// a call resolves, and pending requests are admitted oldest first.
pub(crate) async fn drive<T, G>(
    transport: &T,
    mut generator: G,
    reporter: &mut Reporter,
    config: &RunConfig,
    stop: &StopHandle,
) where
    T: Transport + Sync,
    G: Iterator<Item = SyntheticRequest>,
{
    let limit = config.concurrency.get();
    let mut buffered: VecDeque<SyntheticRequest> = VecDeque::new();
    let mut in_flight = FuturesUnordered::new();
    let mut exhausted = false;

    loop {
        // Admit pending work first (oldest wins), then pull fresh requests.
        // A stop halts generation but pending requests still dispatch, so
        // every produced request ends up with exactly one outcome.
        while in_flight.len() < limit {
            let next = buffered.pop_front().or_else(|| {
                if exhausted || stop.is_stopped() {
                    None
                } else {
                    let item = generator.next();
                    exhausted = item.is_none();
                    item
                }
            });
            match next {
                Some(request) => {
                    trace!("Dispatching request {}", request.index);
                    in_flight.push(dispatch_one(transport, request, config.request_timeout));
                }
                None => break,
            }
        }

        // Optional lookahead: with every slot busy the generator may run a
        // bounded number of requests ahead of a free slot.
        while !exhausted
            && !stop.is_stopped()
            && in_flight.len() >= limit
            && buffered.len() < config.lookahead
        {
            match generator.next() {
                Some(request) => buffered.push_back(request),
                None => exhausted = true,
            }
        }

        match in_flight.next().await {
            Some(completion) => {
                reporter.record(completion);
            }
            // Nothing left after a refill that admitted nothing: the
            // generator is exhausted (or stopped) and the buffer is empty.
            None => break,
        }
    }

    debug_assert!(buffered.is_empty());
}

async fn dispatch_one<T: Transport>(
    transport: &T,
    request: SyntheticRequest,
    deadline: Duration,
) -> Completion {
    let started = Instant::now();
    let resolved = timeout(deadline, transport.send(&request)).await;
    let latency = started.elapsed();

    let (classification, error_detail) = match resolved {
        Ok(Ok(response)) => classify_response(response),
        Ok(Err(err)) => (Classification::Transport(err.kind), Some(err.message)),
        Err(_) => (
            Classification::Transport(TransportErrorKind::Timeout),
            Some(format!(
                "no response within {}",
                humantime::format_duration(deadline)
            )),
        ),
    };

    Completion {
        index: request.index,
        email: request.email,
        classification,
        error_detail,
        latency,
    }
}

fn classify_response(response: RawResponse) -> (Classification, Option<String>) {
    let classification = Classification::from_status(response.status);
    if classification.is_success() {
        (classification, None)
    } else {
        // Targets put the rejection reason in the body (`{"error": ...}`).
        let detail = (!response.body.is_empty()).then_some(response.body);
        (classification, detail)
    }
}
