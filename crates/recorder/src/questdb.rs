//! QuestDB ILP (InfluxDB Line Protocol) client for rejection records.
//!
//! Writes rejected orders to the `order_error` table over a raw TCP
//! connection using the ILP format:
//! `measurement,tag1=val1 field1=value1 timestamp_ns\n`

use std::fmt::Write as FmtWrite;
use std::io;
use std::time::Duration;

use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

use rg_risk::RejectionRecord;

/// Table rejection records are written to.
pub const ORDER_ERROR_TABLE: &str = "order_error";

/// Upper bound on undelivered ILP bytes held in memory.
const MAX_BUFFERED_BYTES: usize = 4 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum QuestDbError {
    #[error("could not reach QuestDB at {addr} after {attempts} attempts: {source}")]
    ConnectionFailed {
        addr: String,
        attempts: u32,
        #[source]
        source: io::Error,
    },
    #[error("ILP write failed: {0}")]
    WriteFailed(#[from] io::Error),
    #[error("not connected")]
    NotConnected,
}

/// Buffered ILP writer for the `order_error` table.
///
/// Rows accumulate in memory until [`flush`](QuestDbClient::flush) sends them
/// in one write. A buffer that has reached its byte cap refuses new rows
/// rather than growing while QuestDB is unreachable.
pub struct QuestDbClient {
    addr: String,
    stream: Option<TcpStream>,
    buffer: Vec<u8>,
    rows: usize,
}

impl QuestDbClient {
    const CONNECT_ATTEMPTS: u32 = 3;
    const RETRY_BASE_DELAY: Duration = Duration::from_millis(100);

    /// Client for the ILP endpoint at `addr` (`host:port`). Does not connect.
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            stream: None,
            buffer: Vec::with_capacity(16 * 1024),
            rows: 0,
        }
    }

    /// Open the TCP connection, backing off exponentially between attempts.
    pub async fn connect(&mut self) -> Result<(), QuestDbError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match TcpStream::connect(&self.addr).await {
                Ok(stream) => {
                    stream.set_nodelay(true).ok();
                    self.stream = Some(stream);
                    info!(addr = %self.addr, attempt, "connected to QuestDB");
                    return Ok(());
                }
                Err(source) if attempt >= Self::CONNECT_ATTEMPTS => {
                    return Err(QuestDbError::ConnectionFailed {
                        addr: self.addr.clone(),
                        attempts: attempt,
                        source,
                    });
                }
                Err(e) => {
                    let delay = Self::RETRY_BASE_DELAY * 2u32.pow(attempt - 1);
                    warn!(
                        addr = %self.addr,
                        attempt,
                        error = %e,
                        ?delay,
                        "QuestDB connect failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    /// Drop the current connection and open a fresh one.
    pub async fn reconnect(&mut self) -> Result<(), QuestDbError> {
        self.stream = None;
        debug!(addr = %self.addr, "reconnecting to QuestDB");
        self.connect().await
    }

    pub fn buffer_full(&self) -> bool {
        self.buffer.len() >= MAX_BUFFERED_BYTES
    }

    /// Append one `order_error` row. Returns `false` if the row was dropped
    /// because the buffer is at its cap.
    pub fn write_rejection(&mut self, record: &RejectionRecord) -> bool {
        if self.buffer_full() {
            warn!(
                buffered_rows = self.rows,
                symbol = %record.symbol,
                "ILP buffer full, dropping rejection record",
            );
            return false;
        }
        self.buffer.extend_from_slice(format_rejection(record).as_bytes());
        self.rows += 1;
        true
    }

    /// Send every buffered row. Returns the number of rows delivered.
    ///
    /// On error the rows stay buffered; the caller decides whether to retry
    /// or [`clear`](QuestDbClient::clear) them.
    pub async fn flush(&mut self) -> Result<usize, QuestDbError> {
        if self.rows == 0 {
            return Ok(0);
        }
        let stream = self.stream.as_mut().ok_or(QuestDbError::NotConnected)?;
        stream.write_all(&self.buffer).await?;
        stream.flush().await?;

        let rows = self.rows;
        debug!(rows, bytes = self.buffer.len(), "flushed ILP buffer to QuestDB");
        self.clear();
        Ok(rows)
    }

    /// Discard buffered rows. Returns how many were discarded.
    pub fn clear(&mut self) -> usize {
        let rows = self.rows;
        self.buffer.clear();
        self.rows = 0;
        rows
    }

    /// Rows waiting for the next flush.
    pub fn pending_rows(&self) -> usize {
        self.rows
    }

    pub fn buffer_len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }
}

/// Render one `order_error` row.
pub fn format_rejection(record: &RejectionRecord) -> String {
    let mut line = String::with_capacity(256);
    // Writing to a String cannot fail.
    let _ = write!(
        line,
        "{ORDER_ERROR_TABLE},symbol={},exchange={},error_code={}",
        escape_ilp_tag(record.symbol.as_str()),
        record.exchange.code(),
        escape_ilp_tag(&record.error_code),
    );
    let _ = write!(
        line,
        " message=\"{}\",order_id=\"{}\",gateway=\"{}\"",
        escape_ilp_string(&record.message),
        escape_ilp_string(record.order_id.as_ref().map_or("", |id| id.0.as_str())),
        escape_ilp_string(&record.gateway),
    );
    let _ = writeln!(line, " {}", record.timestamp.as_nanos());
    line
}

/// Escape characters with meaning in ILP tag values.
fn escape_ilp_tag(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            ',' | ' ' | '=' | '\\' => {
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out
}

/// Escape a quoted ILP string field. A raw line break would end the row.
fn escape_ilp_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\\' | '"' => {
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rg_core::types::*;

    fn sample_record() -> RejectionRecord {
        RejectionRecord {
            symbol: Symbol::new("rb2405"),
            exchange: Exchange::Shfe,
            error_code: "31".to_string(),
            message: "insufficient margin".to_string(),
            order_id: Some(OrderId::new("CTP.7")),
            gateway: "CTP".to_string(),
            timestamp: Timestamp::from_millis(1_706_000_000_000),
        }
    }

    #[test]
    fn test_rejection_ilp_format() {
        let line = format_rejection(&sample_record());
        assert_eq!(
            line,
            "order_error,symbol=rb2405,exchange=SHFE,error_code=31 \
             message=\"insufficient margin\",order_id=\"CTP.7\",gateway=\"CTP\" \
             1706000000000000000\n"
        );
    }

    #[test]
    fn test_risk_rejection_has_empty_order_id() {
        let mut record = sample_record();
        record.error_code = "RISK".to_string();
        record.order_id = None;
        let line = format_rejection(&record);
        assert!(line.contains(",error_code=RISK "));
        assert!(line.contains("order_id=\"\""));
    }

    #[test]
    fn test_string_field_escaping() {
        let mut record = sample_record();
        record.message = r#"bad "price" \ tick"#.to_string();
        let line = format_rejection(&record);
        assert!(line.contains(r#"message="bad \"price\" \\ tick""#));
    }

    #[test]
    fn test_tag_escaping() {
        let mut record = sample_record();
        record.error_code = "a b,c=d".to_string();
        let line = format_rejection(&record);
        assert!(line.contains(r"error_code=a\ b\,c\=d "));
    }

    #[test]
    fn test_line_breaks_stay_on_one_row() {
        let mut record = sample_record();
        record.message = "price out of band\norder_error,symbol=x error_code=y".to_string();
        record.error_code = "3\r\n1".to_string();
        let line = format_rejection(&record);

        assert_eq!(line.lines().count(), 1);
        assert_eq!(line.matches('\n').count(), 1);
        assert!(line.ends_with('\n'));
        assert!(line.contains(r#"message="price out of band\norder_error,symbol=x error_code=y""#));
        assert!(line.contains(r"error_code=3\r\n1 "));
    }

    #[test]
    fn test_rows_accumulate_until_cleared() {
        let mut client = QuestDbClient::new("localhost:9009");
        assert_eq!(client.pending_rows(), 0);

        assert!(client.write_rejection(&sample_record()));
        let one_row = client.buffer_len();
        assert!(client.write_rejection(&sample_record()));
        assert_eq!(client.pending_rows(), 2);
        assert_eq!(client.buffer_len(), one_row * 2);

        let content = String::from_utf8(client.buffer.clone()).unwrap();
        assert_eq!(content.lines().count(), 2);

        assert_eq!(client.clear(), 2);
        assert_eq!(client.buffer_len(), 0);
        assert!(!client.is_connected());
    }

    #[test]
    fn test_full_buffer_refuses_rows() {
        let mut client = QuestDbClient::new("localhost:9009");
        client.buffer.resize(MAX_BUFFERED_BYTES, b' ');
        assert!(client.buffer_full());
        assert!(!client.write_rejection(&sample_record()));
        assert_eq!(client.pending_rows(), 0);
    }

    #[tokio::test]
    async fn test_flush_keeps_rows_when_disconnected() {
        let mut client = QuestDbClient::new("localhost:9009");
        assert_eq!(client.flush().await.unwrap(), 0);

        client.write_rejection(&sample_record());
        let err = client.flush().await.unwrap_err();
        assert!(matches!(err, QuestDbError::NotConnected));
        assert_eq!(client.pending_rows(), 1);
    }

    #[tokio::test]
    async fn test_connect_failure_reports_attempts() {
        // Nothing listens on port 1.
        let mut client = QuestDbClient::new("127.0.0.1:1");
        match client.connect().await {
            Err(QuestDbError::ConnectionFailed { attempts, .. }) => assert_eq!(attempts, 3),
            other => panic!("expected connection failure, got {other:?}"),
        }
        assert!(!client.is_connected());
    }

    #[tokio::test]
    async fn test_flush_writes_to_socket() {
        use tokio::io::AsyncReadExt;

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            socket.read_to_end(&mut buf).await.unwrap();
            String::from_utf8(buf).unwrap()
        });

        let mut client = QuestDbClient::new(addr);
        client.connect().await.unwrap();
        client.write_rejection(&sample_record());
        client.write_rejection(&sample_record());
        assert_eq!(client.flush().await.unwrap(), 2);
        assert_eq!(client.pending_rows(), 0);
        drop(client);

        let received = server.await.unwrap();
        assert_eq!(received.lines().count(), 2);
        assert!(received.starts_with("order_error,symbol=rb2405"));
    }
}
