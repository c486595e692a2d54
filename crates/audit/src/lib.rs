//! Bounded, non-blocking-by-default audit event pipeline.
//!
//! [`AuditPipeline::record`] never runs the caller's request handler
//! inline with disk or network I/O: it enqueues onto a bounded channel and
//! returns immediately. A single consumer task drains the channel to a
//! [`sink::Sink`]. Under the `drop` backpressure policy a full channel
//! discards the event (and logs it); under `block` the caller awaits free
//! capacity, bounded by the caller's own cancellation.

mod sink;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use konsul_domain::model::AuditEvent;
use tokio::sync::{mpsc, oneshot, Mutex};
use uuid::Uuid;

pub use sink::Sink;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backpressure {
    Drop,
    Block,
}

pub struct AuditPipeline {
    tx: mpsc::Sender<AuditEvent>,
    backpressure: Backpressure,
    dropped: Arc<AtomicU64>,
    closed: Arc<AtomicBool>,
    shutdown: Mutex<Option<oneshot::Sender<()>>>,
    consumer: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl AuditPipeline {
    pub fn start(sink: Sink, buffer_size: usize, backpressure: Backpressure, flush_interval_secs: u64) -> Self {
        let (tx, mut rx) = mpsc::channel::<AuditEvent>(buffer_size.max(1));
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
        let mut sink = sink;

        let consumer = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(std::time::Duration::from_secs(flush_interval_secs.max(1)));
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    event = rx.recv() => {
                        match event {
                            Some(event) => {
                                if let Err(e) = sink.write(&event) {
                                    tracing::warn!(error = %e, "failed to write audit event");
                                }
                            }
                            None => break,
                        }
                    }
                    _ = ticker.tick() => {
                        if let Err(e) = sink.flush() {
                            tracing::warn!(error = %e, "failed to flush audit sink");
                        }
                    }
                    _ = &mut shutdown_rx => {
                        rx.close();
                        while let Ok(event) = rx.try_recv() {
                            let _ = sink.write(&event);
                        }
                        break;
                    }
                }
            }
            let _ = sink.flush();
        });

        Self {
            tx,
            backpressure,
            dropped: Arc::new(AtomicU64::new(0)),
            closed: Arc::new(AtomicBool::new(false)),
            shutdown: Mutex::new(Some(shutdown_tx)),
            consumer: Mutex::new(Some(consumer)),
        }
    }

    /// Fill in `id`/`ts`/default metadata, then enqueue. Returns quickly
    /// regardless of policy: `Drop` never waits, `Block` waits only for
    /// channel capacity (never for the sink's I/O).
    pub async fn record(&self, mut event: AuditEvent) {
        if event.id.is_nil() {
            event.id = Uuid::new_v4();
        }
        if event.ts.is_none() {
            event.ts = Some(chrono::Utc::now());
        }

        match self.backpressure {
            Backpressure::Drop => {
                if self.tx.try_send(event).is_err() {
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!("audit channel full, dropping event");
                }
            }
            Backpressure::Block => {
                if self.tx.send(event).await.is_err() {
                    tracing::warn!("audit pipeline closed, dropping event");
                }
            }
        }
    }

    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Stop accepting new events, drain what's queued, and flush the sink.
    /// Safe to call more than once; subsequent calls are no-ops.
    pub async fn close(&self, deadline: std::time::Duration) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(tx) = self.shutdown.lock().await.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.consumer.lock().await.take() {
            if tokio::time::timeout(deadline, handle).await.is_err() {
                tracing::warn!("audit pipeline did not shut down within deadline");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use konsul_domain::model::{AuditActor, AuditHttp, AuditResource, AuditResult};
    use std::time::Duration;

    fn sample_event() -> AuditEvent {
        AuditEvent {
            id: Uuid::nil(),
            ts: None,
            action: "kv.set".into(),
            result: AuditResult::Success,
            resource: AuditResource {
                kind: "kv".into(),
                id: "app/config".into(),
                namespace: None,
            },
            actor: AuditActor {
                id: "anonymous".into(),
                kind: konsul_domain::model::ActorType::Anonymous,
                name: None,
                roles: None,
                token_id: None,
            },
            source_ip: "127.0.0.1".into(),
            auth_method: "none".into(),
            http: AuditHttp {
                method: "PUT".into(),
                path: "/v1/kv/app/config".into(),
                status: 200,
            },
            trace_id: None,
            span_id: None,
            request_hash: None,
            metadata: Default::default(),
        }
    }

    #[tokio::test]
    async fn record_then_close_flushes_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.log");
        let pipeline = AuditPipeline::start(Sink::file(&path), 16, Backpressure::Block, 60);
        pipeline.record(sample_event()).await;
        pipeline.close(Duration::from_secs(5)).await;

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("kv.set"));
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = AuditPipeline::start(
            Sink::file(dir.path().join("audit.log")),
            16,
            Backpressure::Drop,
            60,
        );
        pipeline.close(Duration::from_secs(5)).await;
        pipeline.close(Duration::from_secs(5)).await;
    }

    #[tokio::test]
    async fn full_channel_drops_under_drop_policy() {
        let dir = tempfile::tempdir().unwrap();
        // Buffer of 1 with no consumer progress guarantee under load; we
        // instead assert the dropped counter never panics and stays
        // monotonic by sending more events than fit.
        let pipeline = AuditPipeline::start(
            Sink::file(dir.path().join("audit.log")),
            1,
            Backpressure::Drop,
            60,
        );
        for _ in 0..50 {
            pipeline.record(sample_event()).await;
        }
        pipeline.close(Duration::from_secs(5)).await;
        // Either all 50 were drained in time or some were dropped; both
        // are acceptable outcomes of the drop policy under fast drains.
        assert!(pipeline.dropped_count() <= 50);
    }
}
