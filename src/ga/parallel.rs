//! Slot scheduler for candidate production.
//!
//! Population initialization and offspring variation both reduce to the
//! same job: produce exactly one accepted chromosome for every slot index
//! in `0..n_add`. [`fill_slots`] executes that job under one of three
//! strategies:
//!
//! - **Sequential**: a plain loop on the driver thread.
//! - **Dynamic**: a bounded worker pool with one task per slot, so any
//!   free worker picks up the next slot.
//! - **Static**: the slot range split into contiguous chunks, one chunk
//!   per worker.
//!
//! Workers hand results back over a channel; the driver drains it with a
//! timeout, invoking the optional refresh hook between scans. Results are
//! returned in ascending slot order, so the caller observes the same
//! outcome as in-place slot writes regardless of completion order.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::time::Duration;

/// How slot production is scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Threading {
    Sequential,
    Dynamic { threads: usize },
    Static { threads: usize },
}

/// Driver-side idle behavior while workers run.
pub(crate) struct IdleWait<'a> {
    /// Result-scan timeout.
    pub delay: Duration,
    /// Invoked between result scans.
    pub refresh: Option<&'a (dyn Fn() + Send + Sync)>,
}

struct SlotOutcome<C> {
    slot: usize,
    chromosome: C,
    attempts: usize,
}

/// Produces one chromosome per slot index in `0..n_add`.
///
/// The producer yields the accepted chromosome for a slot together with
/// the number of evaluation attempts it consumed, or `None` once it
/// observes the stop flag. Returns the produced chromosomes in ascending
/// slot order and the total attempt count; when stopped early, only the
/// slots produced so far are returned.
pub(crate) fn fill_slots<C, F>(
    n_add: usize,
    threading: Threading,
    idle: &IdleWait<'_>,
    stop: &AtomicBool,
    produce: F,
) -> (Vec<C>, usize)
where
    C: Send,
    F: Fn(usize) -> Option<(C, usize)> + Sync,
{
    let mut outcomes = match threading {
        Threading::Sequential => {
            let mut out = Vec::with_capacity(n_add);
            for slot in 0..n_add {
                if stop.load(Ordering::Relaxed) {
                    break;
                }
                match produce(slot) {
                    Some((chromosome, attempts)) => out.push(SlotOutcome {
                        slot,
                        chromosome,
                        attempts,
                    }),
                    None => break,
                }
            }
            out
        }
        Threading::Dynamic { threads } => pooled(n_add, threads, idle, &produce, true),
        Threading::Static { threads } => pooled(n_add, threads, idle, &produce, false),
    };
    outcomes.sort_by_key(|o| o.slot);
    let attempts = outcomes.iter().map(|o| o.attempts).sum();
    (
        outcomes.into_iter().map(|o| o.chromosome).collect(),
        attempts,
    )
}

fn pooled<C, F>(
    n_add: usize,
    threads: usize,
    idle: &IdleWait<'_>,
    produce: &F,
    dynamic: bool,
) -> Vec<SlotOutcome<C>>
where
    C: Send,
    F: Fn(usize) -> Option<(C, usize)> + Sync,
{
    let threads = threads.max(1);
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .expect("failed to build worker pool");

    let (tx, rx) = mpsc::channel();
    let mut outcomes = Vec::with_capacity(n_add);

    pool.in_place_scope(|scope| {
        if dynamic {
            for slot in 0..n_add {
                let tx = tx.clone();
                scope.spawn(move |_| {
                    if let Some((chromosome, attempts)) = produce(slot) {
                        let _ = tx.send(SlotOutcome {
                            slot,
                            chromosome,
                            attempts,
                        });
                    }
                });
            }
        } else {
            // Chunks of ceil(n_add / threads); the last chunk takes the
            // remainder.
            let chunk = n_add.div_ceil(threads).max(1);
            let mut start = 0usize;
            while start < n_add {
                let end = (start + chunk).min(n_add);
                let tx = tx.clone();
                scope.spawn(move |_| {
                    for slot in start..end {
                        match produce(slot) {
                            Some((chromosome, attempts)) => {
                                let _ = tx.send(SlotOutcome {
                                    slot,
                                    chromosome,
                                    attempts,
                                });
                            }
                            None => break,
                        }
                    }
                });
                start = end;
            }
        }
        drop(tx);

        loop {
            match rx.recv_timeout(idle.delay) {
                Ok(outcome) => outcomes.push(outcome),
                Err(mpsc::RecvTimeoutError::Timeout) => {
                    if let Some(refresh) = idle.refresh {
                        refresh();
                    }
                }
                Err(mpsc::RecvTimeoutError::Disconnected) => break,
            }
        }
    });

    outcomes
}
