use std::sync::Arc;
use std::thread;

use crossbeam_channel::{bounded, Receiver, Sender};

use crate::detection::domain::report::ViolationReport;
use crate::pipeline::analysis_engine::AnalysisEngine;

const DEFAULT_QUEUE_CAPACITY: usize = 32;

/// One queued analysis request.
pub struct AnalysisJob {
    pub session_id: String,
    pub payload: String,
}

struct QueuedJob {
    job: AnalysisJob,
    reply: Sender<ViolationReport>,
}

/// Bounded worker pool driving a shared [`AnalysisEngine`].
///
/// Caps concurrent analysis work so per-frame latency stays predictable and
/// the host's request threads are never blocked on CPU-bound pixel work.
/// Same-session jobs still serialize on the session's state lock inside the
/// engine. Dropping the pool closes the queue and joins the workers.
pub struct AnalysisPool {
    job_tx: Option<Sender<QueuedJob>>,
    workers: Vec<thread::JoinHandle<()>>,
}

impl AnalysisPool {
    pub fn new(engine: Arc<AnalysisEngine>, workers: usize) -> Self {
        Self::with_queue_capacity(engine, workers, DEFAULT_QUEUE_CAPACITY)
    }

    pub fn with_queue_capacity(
        engine: Arc<AnalysisEngine>,
        workers: usize,
        capacity: usize,
    ) -> Self {
        let (job_tx, job_rx) = bounded::<QueuedJob>(capacity.max(1));

        let workers = (0..workers.max(1))
            .map(|_| {
                let jobs = job_rx.clone();
                let engine = engine.clone();
                thread::spawn(move || run_worker(&engine, &jobs))
            })
            .collect();

        Self {
            job_tx: Some(job_tx),
            workers,
        }
    }

    /// Queue a frame for analysis; the report arrives on the returned
    /// channel. Blocks while the queue is at capacity.
    ///
    /// A caller that no longer cares (the session terminated) may simply
    /// drop the receiver; the worker's send is then discarded.
    pub fn submit(&self, job: AnalysisJob) -> Receiver<ViolationReport> {
        let (reply_tx, reply_rx) = bounded(1);
        if let Some(tx) = &self.job_tx {
            let _ = tx.send(QueuedJob {
                job,
                reply: reply_tx,
            });
        }
        reply_rx
    }
}

fn run_worker(engine: &AnalysisEngine, jobs: &Receiver<QueuedJob>) {
    for queued in jobs {
        let report = engine.analyze(&queued.job.session_id, &queued.job.payload);
        let _ = queued.reply.send(report);
    }
}

impl Drop for AnalysisPool {
    fn drop(&mut self) {
        // Closing the queue lets each worker drain and exit its recv loop
        self.job_tx.take();
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}
