use std::{
    io::{self, Write},
    sync::{
        atomic::{AtomicU64, Ordering},
        Mutex,
    },
};

use time::format_description::well_known::Rfc3339;

use crate::{
    lock,
    logging::{SimLogEvent, SimLogWriter},
};

pub const ACTIVITY_CSV_HEADER: &str = "timestamp,severity,kind,message\n";

/// Appends activity events as CSV rows.
pub struct ActivityCsvWriter<W: Write> {
    writer: W,
}

impl<W: Write> ActivityCsvWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn write_header(&mut self) -> io::Result<()> {
        self.writer.write_all(ACTIVITY_CSV_HEADER.as_bytes())?;
        self.writer.flush()
    }

    pub fn append_event(&mut self, event: &SimLogEvent) -> io::Result<()> {
        let timestamp = event.timestamp.format(&Rfc3339).map_err(io::Error::other)?;
        let message = escape_csv_field(&event.message);
        writeln!(
            self.writer,
            "{timestamp},{},{},{message}",
            event.severity.as_str(),
            event.kind.as_str()
        )?;
        self.writer.flush()
    }
}

/// [`SimLogWriter`] over an [`ActivityCsvWriter`]. Write failures are counted
/// rather than surfaced, the log stream has no error channel.
pub struct CsvJournalLogWriter<W: Write + Send> {
    csv: Mutex<ActivityCsvWriter<W>>,
    failed_writes: AtomicU64,
}

impl<W: Write + Send> CsvJournalLogWriter<W> {
    pub fn new(csv: ActivityCsvWriter<W>) -> Self {
        Self {
            csv: Mutex::new(csv),
            failed_writes: AtomicU64::new(0),
        }
    }

    pub fn failed_writes(&self) -> u64 {
        self.failed_writes.load(Ordering::Relaxed)
    }
}

impl<W: Write + Send> SimLogWriter for CsvJournalLogWriter<W> {
    fn write(&self, event: SimLogEvent) {
        if lock(&self.csv).append_event(&event).is_err() {
            self.failed_writes.fetch_add(1, Ordering::Relaxed);
        }
    }
}

fn escape_csv_field(value: &str) -> String {
    let needs_quotes = value
        .chars()
        .any(|ch| matches!(ch, ',' | '"' | '\n' | '\r'));
    if !needs_quotes {
        return value.to_string();
    }

    let escaped = value.replace('"', "\"\"");
    format!("\"{escaped}\"")
}
