//! Sample collection and output
//!
//! `SampleLog` is attached to every signal as an observer and records each
//! new sample; the report functions print what was collected.

use crate::config::{OutputConfig, OutputFormat};
use anyhow::Result;
use can_signal_codec::{SampleObserver, Signal};
use chrono::SecondsFormat;
use serde::Serialize;
use std::io::Write;
use std::sync::{Mutex, PoisonError};

/// One observed sample, copied out of the signal at notification time
#[derive(Debug, Clone, Serialize)]
pub struct SampleRecord {
    pub can_id: u32,
    pub signal: String,
    pub timestamp: Option<String>,
    pub raw: String,
    pub value: String,
    pub unit: Option<String>,
}

#[derive(Debug, Default)]
pub struct SampleLog {
    records: Mutex<Vec<SampleRecord>>,
}

impl SampleLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take(&self) -> Vec<SampleRecord> {
        let mut records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        std::mem::take(&mut *records)
    }
}

impl SampleObserver for SampleLog {
    fn on_sample(&self, signal: &Signal) {
        let record = SampleRecord {
            can_id: signal.sample_can_id(),
            signal: signal.name().to_string(),
            timestamp: signal
                .sample_timestamp()
                .map(|ts| ts.to_rfc3339_opts(SecondsFormat::Micros, true)),
            raw: signal.channel_text().unwrap_or_default(),
            value: signal.engineering_text().unwrap_or_default(),
            unit: signal.unit().map(str::to_string),
        };
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record);
    }
}

/// Write the collected samples in the configured format
pub fn write_samples<W: Write>(out: &mut W, records: &[SampleRecord], config: &OutputConfig) -> Result<()> {
    match config.format {
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut *out, records)?;
            writeln!(out)?;
        }
        OutputFormat::Txt => {
            for record in records {
                write!(out, "0x{:03X} {:<24} {}", record.can_id, record.signal, record.value)?;
                if let Some(unit) = &record.unit {
                    write!(out, " {}", unit)?;
                }
                if config.include_raw {
                    write!(out, " (raw {})", record.raw)?;
                }
                writeln!(out)?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use can_signal_codec::{SignalDefinition, ValueKind};
    use std::sync::Arc;

    fn decoded_log() -> Vec<SampleRecord> {
        let log = Arc::new(SampleLog::new());
        let observer: Arc<dyn SampleObserver> = log.clone();

        let mut signal = Signal::new(
            SignalDefinition::new("Temp", 0, 8)
                .with_value_kind(ValueKind::Unsigned)
                .with_scaling(0.5, 10.0)
                .with_unit("degC"),
        );
        signal.attach_observer(&observer);
        signal.parse_message(&[0x14], 2_000_000_000, 0x321);
        log.take()
    }

    #[test]
    fn test_observer_records_samples() {
        let records = decoded_log();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].signal, "Temp");
        assert_eq!(records[0].raw, "20");
        assert_eq!(records[0].value, "20");
        assert_eq!(records[0].timestamp.as_deref(), Some("1970-01-01T00:00:02.000000Z"));
    }

    #[test]
    fn test_poisoned_log_keeps_recording() {
        let log = Arc::new(SampleLog::new());
        let poisoner = log.clone();
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.records.lock().unwrap();
            panic!("poison the sample log");
        })
        .join();
        assert!(log.records.is_poisoned());

        let observer: Arc<dyn SampleObserver> = log.clone();
        let mut signal = Signal::new(SignalDefinition::new("Temp", 0, 8));
        signal.attach_observer(&observer);
        signal.parse_message(&[0x05], 0, 0x10);

        let records = log.take();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].raw, "5");
    }

    #[test]
    fn test_text_output() {
        let records = decoded_log();
        let config = OutputConfig {
            format: OutputFormat::Txt,
            include_raw: true,
        };
        let mut out = Vec::new();
        write_samples(&mut out, &records, &config).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("0x321 Temp"));
        assert!(text.trim_end().ends_with("20 degC (raw 20)"));
    }

    #[test]
    fn test_json_output() {
        let records = decoded_log();
        let config = OutputConfig {
            format: OutputFormat::Json,
            include_raw: false,
        };
        let mut out = Vec::new();
        write_samples(&mut out, &records, &config).unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(parsed[0]["signal"], "Temp");
        assert_eq!(parsed[0]["can_id"], 0x321);
    }
}
