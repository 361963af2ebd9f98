//! Tracing setup for the riskgate binary.
//!
//! [`init_tracing`] installs an `EnvFilter` (`RUST_LOG`, default `info`) and
//! either a JSON layer with nanosecond timestamps or a pretty layer. A
//! [`SecretGuard`] layer sits beside them and warns whenever a log field
//! carries a gateway credential or the control-plane bearer token.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tracing::field::{Field, Visit};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Target of the guard's own warnings, which it never scans.
const GUARD_TARGET: &str = "riskgate::secrets";

/// Field names that carry gateway credentials whatever their value.
const CREDENTIAL_FIELDS: &[&str] = &["password", "auth_code", "app_id", "token", "secret"];

/// Initialize the global tracing subscriber.
///
/// `json` selects production JSON output over the pretty development format.
///
/// # Panics
///
/// Panics if the global subscriber has already been set.
pub fn init_tracing(json: bool, guard: SecretGuard) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(env_filter).with(guard);

    if json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_timer(NanosecondTimer)
                    .with_thread_ids(true)
                    .with_span_events(FmtSpan::CLOSE),
            )
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().pretty().with_thread_ids(false))
            .init();
    }
}

/// RFC 3339 timestamps with nanoseconds, for JSON logs.
#[derive(Debug, Clone)]
struct NanosecondTimer;

impl tracing_subscriber::fmt::time::FormatTime for NanosecondTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> fmt::Result {
        write!(w, "{}", chrono::Utc::now().format("%Y-%m-%dT%H:%M:%S%.9fZ"))
    }
}

/// Layer that flags events and spans leaking secrets.
///
/// A field is flagged when its name is a gateway credential name, or when its
/// value contains one of the configured secrets (the control token). Clones
/// share one count of flagged records.
#[derive(Debug, Clone)]
pub struct SecretGuard {
    secrets: Arc<[String]>,
    flagged: Arc<AtomicUsize>,
}

impl SecretGuard {
    /// Guard the given secret values. Empty strings are ignored.
    pub fn new(secrets: impl IntoIterator<Item = String>) -> Self {
        Self {
            secrets: secrets.into_iter().filter(|s| !s.is_empty()).collect(),
            flagged: Arc::default(),
        }
    }

    /// A guard that only checks credential field names.
    pub fn names_only() -> Self {
        Self::new(None::<String>)
    }

    /// Number of events and spans flagged so far.
    pub fn flagged(&self) -> usize {
        self.flagged.load(Ordering::Relaxed)
    }

    fn inspect(&self, kind: &str, record: impl FnOnce(&mut LeakVisitor<'_>)) {
        let mut visitor = LeakVisitor {
            secrets: &self.secrets,
            found: None,
        };
        record(&mut visitor);
        if let Some(field) = visitor.found {
            self.flagged.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(
                target: GUARD_TARGET,
                kind,
                field,
                "secret value in log fields, redact it at the call site"
            );
        }
    }
}

impl<S> Layer<S> for SecretGuard
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(
        &self,
        attrs: &tracing::span::Attributes<'_>,
        _id: &tracing::span::Id,
        _ctx: Context<'_, S>,
    ) {
        self.inspect("span", |v| attrs.record(v));
    }

    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        if event.metadata().target() == GUARD_TARGET {
            return;
        }
        self.inspect("event", |v| event.record(v));
    }
}

/// Records the name of the first leaking field.
struct LeakVisitor<'a> {
    secrets: &'a [String],
    found: Option<&'static str>,
}

impl LeakVisitor<'_> {
    fn check(&mut self, field: &Field, value: Option<&str>) {
        if self.found.is_some() {
            return;
        }
        let leaks = CREDENTIAL_FIELDS.contains(&field.name())
            || value.is_some_and(|v| self.secrets.iter().any(|s| v.contains(s.as_str())));
        if leaks {
            self.found = Some(field.name());
        }
    }
}

impl Visit for LeakVisitor<'_> {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.check(field, Some(value));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        // Formatting is only needed when there is a secret to look for.
        if self.secrets.is_empty() {
            self.check(field, None);
        } else {
            let text = format!("{value:?}");
            self.check(field, Some(&text));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_guard(guard: &SecretGuard, f: impl FnOnce()) {
        let subscriber = tracing_subscriber::registry().with(guard.clone());
        tracing::subscriber::with_default(subscriber, f);
    }

    #[test]
    fn test_credential_field_flagged() {
        let guard = SecretGuard::names_only();
        with_guard(&guard, || {
            tracing::info!(user_id = "9999", password = "hunter2", "gateway login");
        });
        assert_eq!(guard.flagged(), 1);
    }

    #[test]
    fn test_control_token_in_message_flagged() {
        let guard = SecretGuard::new(Some("tok-7f3a9c".to_string()));
        with_guard(&guard, || {
            tracing::info!("control request with Bearer {}", "tok-7f3a9c");
            tracing::info!(header = "Bearer tok-7f3a9c", "control request");
        });
        assert_eq!(guard.flagged(), 2);
    }

    #[test]
    fn test_ordinary_fields_pass() {
        let guard = SecretGuard::new(Some("tok-7f3a9c".to_string()));
        with_guard(&guard, || {
            tracing::warn!(
                instrument = "rb2405.SHFE",
                gateway = "CTP",
                reason = "price 3850 crosses own ask 3849",
                "order rejected by risk gate"
            );
            let _span = tracing::info_span!("submit", order_id = "CTP.7").entered();
        });
        assert_eq!(guard.flagged(), 0);
    }

    #[test]
    fn test_own_warning_not_rescanned() {
        // A one-letter secret matches the guard's own warning text.
        let guard = SecretGuard::new(Some("e".to_string()));
        with_guard(&guard, || {
            tracing::info!(token = 1);
        });
        assert_eq!(guard.flagged(), 1);
    }

    #[test]
    fn test_empty_token_ignored() {
        let guard = SecretGuard::new(Some(String::new()));
        with_guard(&guard, || {
            tracing::info!("risk control started");
        });
        assert_eq!(guard.flagged(), 0);
    }
}
