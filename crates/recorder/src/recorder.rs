//! Rejection recorder that batches records and flushes to QuestDB.
//!
//! The [`Recorder`] runs an async loop that receives [`RejectionRecord`]s
//! through a bounded mpsc channel, buffers them via the QuestDB ILP client,
//! and flushes when the batch fills or the flush interval elapses. The gate
//! side holds a [`RecorderHandle`], which never blocks.

use std::time::{Duration, Instant};

use anyhow::Result;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use rg_core::config::RecorderConfig;
use rg_risk::{RejectionRecord, RejectionSink};

use crate::questdb::QuestDbClient;

/// Metrics tracked by the recorder.
#[derive(Debug, Clone, Default)]
pub struct RecorderMetrics {
    /// Total records received from the channel.
    pub records_received: u64,
    /// Total records successfully flushed to QuestDB.
    pub records_flushed: u64,
    /// Total records lost to a full buffer or a failed flush.
    pub records_dropped: u64,
    /// Number of flush operations performed.
    pub flush_count: u64,
    /// Duration of the last flush in microseconds.
    pub last_flush_duration_us: u64,
}

/// Rejection recorder.
///
/// Create via [`Recorder::new`], which returns both the recorder and a
/// clonable [`RecorderHandle`].
pub struct Recorder {
    config: RecorderConfig,
    rx: mpsc::Receiver<RejectionRecord>,
    client: QuestDbClient,
    metrics: RecorderMetrics,
}

/// Clonable, non-blocking sender of rejection records.
///
/// Dropping all handles causes the recorder loop to flush what remains and
/// shut down.
#[derive(Clone)]
pub struct RecorderHandle {
    tx: mpsc::Sender<RejectionRecord>,
}

impl Recorder {
    /// Creates a new recorder and its associated [`RecorderHandle`].
    pub fn new(config: RecorderConfig) -> (Self, RecorderHandle) {
        let (tx, rx) = mpsc::channel(config.channel_capacity.max(1));
        let client = QuestDbClient::new(config.questdb_ilp_addr.clone());

        let recorder = Self {
            config,
            rx,
            client,
            metrics: RecorderMetrics::default(),
        };
        (recorder, RecorderHandle { tx })
    }

    pub fn metrics(&self) -> &RecorderMetrics {
        &self.metrics
    }

    /// Runs the recorder loop until every handle is dropped.
    ///
    /// 1. Connects to QuestDB (failure is logged, not fatal).
    /// 2. Buffers each received record in the ILP client.
    /// 3. Flushes on a timer tick or when the batch size is reached.
    /// 4. On channel close, flushes remaining data and returns.
    pub async fn run(&mut self) -> Result<()> {
        if let Err(e) = self.client.connect().await {
            warn!(error = %e, "initial QuestDB connection failed, will retry on flush");
        }

        let flush_interval = Duration::from_millis(self.config.flush_interval_ms.max(1));
        let mut interval = tokio::time::interval(flush_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        info!(
            addr = %self.config.questdb_ilp_addr,
            batch_size = self.config.batch_size,
            flush_interval_ms = self.config.flush_interval_ms,
            "rejection recorder started",
        );

        loop {
            tokio::select! {
                biased;

                record = self.rx.recv() => {
                    match record {
                        Some(record) => {
                            self.handle_record(&record);
                            if self.client.pending_rows() >= self.config.batch_size {
                                self.do_flush().await;
                            }
                        }
                        None => {
                            info!("recorder channel closed, flushing remaining records");
                            self.do_flush().await;
                            return Ok(());
                        }
                    }
                }

                _ = interval.tick() => {
                    self.do_flush().await;
                }
            }
        }
    }

    fn handle_record(&mut self, record: &RejectionRecord) {
        self.metrics.records_received += 1;
        if !self.client.write_rejection(record) {
            self.metrics.records_dropped += 1;
        }
    }

    async fn do_flush(&mut self) {
        let batch = self.client.pending_rows();
        if batch == 0 {
            return;
        }
        let start = Instant::now();

        match self.client.flush().await {
            Ok(rows) => {
                self.metrics.records_flushed += rows as u64;
                self.metrics.flush_count += 1;
                self.metrics.last_flush_duration_us = start.elapsed().as_micros() as u64;
                debug!(
                    records = rows,
                    duration_us = self.metrics.last_flush_duration_us,
                    "flush complete",
                );
            }
            Err(e) => {
                warn!(error = %e, records = batch, "flush failed, attempting reconnect");
                self.metrics.records_dropped += self.client.clear() as u64;

                if let Err(re) = self.client.reconnect().await {
                    warn!(error = %re, "reconnect failed, records will be dropped until recovery");
                }
            }
        }
    }
}

impl RecorderHandle {
    /// Queue a record without blocking.
    ///
    /// A full channel drops the record with a warning. A closed channel is an
    /// error.
    pub fn send(&self, record: RejectionRecord) -> Result<()> {
        match self.tx.try_send(record) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(record)) => {
                warn!(
                    symbol = %record.symbol,
                    error_code = %record.error_code,
                    "recorder channel full, dropping rejection record"
                );
                Ok(())
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                Err(anyhow::anyhow!("recorder channel closed"))
            }
        }
    }
}

impl RejectionSink for RecorderHandle {
    fn record(&self, record: RejectionRecord) {
        if let Err(e) = self.send(record) {
            warn!(error = %e, "rejection record lost");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rg_core::types::*;

    fn make_config(capacity: usize, batch_size: usize, flush_interval_ms: u64) -> RecorderConfig {
        RecorderConfig {
            enabled: true,
            questdb_ilp_addr: "127.0.0.1:1".to_string(), // won't connect
            batch_size,
            flush_interval_ms,
            channel_capacity: capacity,
        }
    }

    fn sample_record() -> RejectionRecord {
        RejectionRecord {
            symbol: Symbol::new("rb2405"),
            exchange: Exchange::Shfe,
            error_code: "RISK".to_string(),
            message: "flow limit: 2 orders reached 2 per 1 s".to_string(),
            order_id: None,
            gateway: "CTP".to_string(),
            timestamp: Timestamp::from_millis(1_706_000_000_000),
        }
    }

    #[tokio::test]
    async fn test_handle_sends_records_to_channel() {
        let (_recorder, handle) = Recorder::new(make_config(10, 100, 100));
        assert!(handle.send(sample_record()).is_ok());
        assert!(handle.send(sample_record()).is_ok());
    }

    #[tokio::test]
    async fn test_backpressure_drops_records() {
        let (mut recorder, handle) = Recorder::new(make_config(2, 100, 100));
        handle.send(sample_record()).unwrap();
        handle.send(sample_record()).unwrap();

        // Full channel drops gracefully.
        assert!(handle.send(sample_record()).is_ok());

        drop(handle);
        recorder.run().await.unwrap();
        assert_eq!(recorder.metrics().records_received, 2);
    }

    #[tokio::test]
    async fn test_sink_never_fails_on_closed_channel() {
        let (recorder, handle) = Recorder::new(make_config(10, 100, 100));
        drop(recorder);

        let err = handle.send(sample_record()).unwrap_err();
        assert!(err.to_string().contains("closed"));
        // As a sink it only logs.
        handle.record(sample_record());
    }

    #[tokio::test]
    async fn test_handle_record_buffers_in_client() {
        let (mut recorder, _handle) = Recorder::new(make_config(10, 100, 100));
        recorder.handle_record(&sample_record());
        recorder.handle_record(&sample_record());

        assert_eq!(recorder.metrics.records_received, 2);
        assert_eq!(recorder.client.pending_rows(), 2);
        assert!(recorder.client.buffer_len() > 0);
    }

    #[tokio::test]
    async fn test_flush_failure_counts_dropped() {
        let (mut recorder, _handle) = Recorder::new(make_config(10, 100, 100));
        for _ in 0..3 {
            recorder.handle_record(&sample_record());
        }
        recorder.do_flush().await;

        assert_eq!(recorder.metrics.records_dropped, 3);
        assert_eq!(recorder.metrics.records_flushed, 0);
        assert_eq!(recorder.client.pending_rows(), 0);
        assert_eq!(recorder.client.buffer_len(), 0);
    }

    #[tokio::test]
    async fn test_run_exits_on_channel_close() {
        let (mut recorder, handle) = Recorder::new(make_config(10, 100, 10));
        handle.send(sample_record()).unwrap();
        handle.send(sample_record()).unwrap();
        drop(handle);

        assert!(recorder.run().await.is_ok());
        assert_eq!(recorder.metrics.records_received, 2);
    }

    #[tokio::test]
    async fn test_records_reach_questdb() {
        use tokio::io::AsyncReadExt;

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            socket.read_to_end(&mut buf).await.unwrap();
            String::from_utf8(buf).unwrap()
        });

        let config = RecorderConfig {
            questdb_ilp_addr: addr,
            ..make_config(10, 2, 10_000)
        };
        let (mut recorder, handle) = Recorder::new(config);
        for _ in 0..3 {
            handle.send(sample_record()).unwrap();
        }
        drop(handle);
        recorder.run().await.unwrap();

        assert_eq!(recorder.metrics.records_flushed, 3);
        // One batch at size 2, one final drain.
        assert_eq!(recorder.metrics.flush_count, 2);
        drop(recorder);

        let received = server.await.unwrap();
        assert_eq!(received.lines().count(), 3);
        assert!(received.lines().all(|l| l.starts_with("order_error,")));
    }

    #[tokio::test]
    async fn test_metrics_initial_state() {
        let (recorder, _handle) = Recorder::new(make_config(10, 100, 100));
        let m = recorder.metrics();
        assert_eq!(m.records_received, 0);
        assert_eq!(m.records_flushed, 0);
        assert_eq!(m.records_dropped, 0);
        assert_eq!(m.flush_count, 0);
    }
}
