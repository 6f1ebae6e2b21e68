//! Operator audit tags and the line format that puts them first.
//! Every skip/copy/move/error line carries one of these as its structured `tag` field,
//! so log shippers can filter the audit trail without parsing messages.
//!
//! [`AuditFormat`] renders those events for humans as
//! `[2024-05-01 12:00:00] INFO  [SKIP] /pool/a.mkv: Already rewritten size=42`:
//! tag, then subject path(s), then the message and any remaining fields.

use chrono::Local;
use std::fmt::{self, Write as _};
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tag {
    Queue,
    Skip,
    Copy,
    Move,
    Error,
    Warning,
    Cleanup,
    DryRun,
    Ok,
}

impl Tag {
    pub const fn as_str(self) -> &'static str {
        match self {
            Tag::Queue => "QUEUE",
            Tag::Skip => "SKIP",
            Tag::Copy => "COPY",
            Tag::Move => "MOVE",
            Tag::Error => "ERROR",
            Tag::Warning => "WARNING",
            Tag::Cleanup => "CLEANUP",
            Tag::DryRun => "DRY-RUN",
            Tag::Ok => "OK",
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Local timestamp in the audit-log layout: `[YYYY-MM-DD HH:MM:SS]`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalHumanTime;

impl FormatTime for LocalHumanTime {
    fn format_time(&self, w: &mut Writer<'_>) -> fmt::Result {
        write!(w, "[{}]", Local::now().format("%Y-%m-%d %H:%M:%S"))
    }
}

/// Compact event formatter for the audit trail.
#[derive(Debug, Clone, Copy)]
pub struct AuditFormat {
    timer: Option<LocalHumanTime>,
}

impl Default for AuditFormat {
    fn default() -> Self {
        Self { timer: Some(LocalHumanTime) }
    }
}

impl AuditFormat {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop the leading timestamp (stable output for tests and log shippers that add their own).
    pub fn without_time(self) -> Self {
        Self { timer: None }
    }
}

impl<S, N> FormatEvent<S, N> for AuditFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        if let Some(timer) = &self.timer {
            timer.format_time(&mut writer)?;
            writer.write_char(' ')?;
        }
        write!(writer, "{:<5} ", event.metadata().level().as_str())?;

        let mut fields = AuditFields::default();
        event.record(&mut fields);
        writeln!(writer, "{}", fields.render())
    }
}

/// Splits an event's fields into the parts the audit line orders specially.
#[derive(Debug, Default)]
struct AuditFields {
    tag: Option<String>,
    path: Option<String>,
    src: Option<String>,
    dest: Option<String>,
    message: String,
    rest: String,
}

impl AuditFields {
    fn put(&mut self, field: &Field, value: String) {
        match field.name() {
            "message" => self.message = value,
            "tag" => self.tag = Some(value),
            "path" => self.path = Some(value),
            "src" => self.src = Some(value),
            "dest" => self.dest = Some(value),
            name => {
                let _ = write!(self.rest, " {name}={value}");
            }
        }
    }

    fn subject(&self) -> Option<String> {
        match (&self.path, &self.src, &self.dest) {
            (Some(p), _, _) => Some(p.clone()),
            (None, Some(s), Some(d)) => Some(format!("{s} -> {d}")),
            (None, Some(one), None) | (None, None, Some(one)) => Some(one.clone()),
            (None, None, None) => None,
        }
    }

    fn render(&self) -> String {
        let mut line = String::new();
        if let Some(tag) = &self.tag {
            let _ = write!(line, "[{tag}] ");
        }
        match self.subject() {
            Some(subject) if self.message.is_empty() => line.push_str(&subject),
            Some(subject) => {
                let _ = write!(line, "{subject}: {}", self.message);
            }
            None => line.push_str(&self.message),
        }
        line.push_str(&self.rest);
        line
    }
}

impl Visit for AuditFields {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.put(field, value.to_owned());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.put(field, format!("{value:?}"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::{Arc, Mutex};
    use tracing::{info, warn};
    use tracing_subscriber::layer::SubscriberExt;

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn capture(f: impl FnOnce()) -> String {
        let sink = Captured::default();
        let writer = sink.clone();
        let layer = tracing_subscriber::fmt::layer()
            .event_format(AuditFormat::new().without_time())
            .with_writer(move || writer.clone());
        let subscriber = tracing_subscriber::registry().with(layer);
        tracing::subscriber::with_default(subscriber, f);
        let bytes = sink.0.lock().unwrap().clone();
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn dry_run_tag_keeps_hyphen() {
        assert_eq!(Tag::DryRun.to_string(), "DRY-RUN");
        assert_eq!(Tag::Warning.as_str(), "WARNING");
    }

    #[test]
    fn tag_and_path_lead_the_line() {
        let out = capture(|| {
            info!(tag = %Tag::Skip, path = "/pool/a.mkv", "Already rewritten");
        });
        assert_eq!(out, "INFO  [SKIP] /pool/a.mkv: Already rewritten\n");
    }

    #[test]
    fn src_and_dest_render_as_arrow_and_extras_trail() {
        let out = capture(|| {
            info!(tag = %Tag::Copy, src = "/in/x", dest = "/d1/x", size = 42u64, "Copied");
        });
        assert_eq!(out, "INFO  [COPY] /in/x -> /d1/x: Copied size=42\n");
    }

    #[test]
    fn untagged_events_keep_plain_shape() {
        let out = capture(|| {
            warn!(count = 3, "Unwanted file scan complete");
        });
        assert_eq!(out, "WARN  Unwanted file scan complete count=3\n");
    }
}
