//! Downstream event sinks.
//!
//! A sink receives decoded events, either one at a time or as one ordered
//! batch per file. Sink failures are treated like any other per-file
//! processing failure: the file routes to error disposition.

use crate::parse::DecodedEvent;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};

/// Destination for decoded events. Implementations must not reorder events
/// within a file.
pub trait EventSink: Send {
    fn emit(&mut self, tag: &str, event: DecodedEvent) -> io::Result<()>;

    fn emit_batch(&mut self, tag: &str, events: Vec<DecodedEvent>) -> io::Result<()> {
        for event in events {
            self.emit(tag, event)?;
        }
        Ok(())
    }
}

/// Writes one JSON object per event: `{"tag":..,"time":..,"record":{..}}`.
pub struct JsonLinesSink<W: Write> {
    writer: W,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }
}

impl<W: Write + Send> EventSink for JsonLinesSink<W> {
    fn emit(&mut self, tag: &str, event: DecodedEvent) -> io::Result<()> {
        let line = serde_json::json!({
            "tag": tag,
            "time": event.timestamp.to_rfc3339(),
            "record": event.fields,
        });
        serde_json::to_writer(&mut self.writer, &line).map_err(io::Error::from)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()
    }
}

/// In-memory sink with shared, cloneable storage. Used by tests and by
/// embedders that drain events on their own schedule.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    events: Arc<Mutex<Vec<(String, DecodedEvent)>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<(String, DecodedEvent)> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

impl EventSink for MemorySink {
    fn emit(&mut self, tag: &str, event: DecodedEvent) -> io::Result<()> {
        self.events
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "sink lock poisoned"))?
            .push((tag.to_string(), event));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::Map;

    fn event(message: &str) -> DecodedEvent {
        let mut fields = Map::new();
        fields.insert("message".to_string(), message.into());
        DecodedEvent {
            timestamp: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            fields,
        }
    }

    #[test]
    fn json_lines_sink_writes_one_object_per_event() {
        let mut out = Vec::new();
        {
            let mut sink = JsonLinesSink::new(&mut out);
            sink.emit("t", event("a")).unwrap();
            sink.emit("t", event("b")).unwrap();
        }
        let lines: Vec<&str> = std::str::from_utf8(&out).unwrap().lines().collect();
        assert_eq!(lines.len(), 2);
        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["tag"], "t");
        assert_eq!(first["record"]["message"], "a");
    }

    #[test]
    fn memory_sink_preserves_order_across_batches() {
        let mut sink = MemorySink::new();
        sink.emit("t", event("1")).unwrap();
        sink.emit_batch("t", vec![event("2"), event("3")]).unwrap();
        let got: Vec<String> = sink
            .events()
            .iter()
            .map(|(_, e)| e.fields["message"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(got, vec!["1", "2", "3"]);
    }
}
