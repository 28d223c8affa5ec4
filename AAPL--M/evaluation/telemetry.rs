use std::{fmt, path::PathBuf, sync::Arc};

use anyhow::Result;
use serde_json::Value;
use shared_logging::{JsonLogger, LogLevel, LogRecord, LogSink};

/// Builder for evaluation telemetry sinks.
pub struct EvaluationTelemetryBuilder {
    module: String,
    log_path: Option<PathBuf>,
    sinks: Vec<Arc<dyn LogSink>>,
}

impl EvaluationTelemetryBuilder {
    /// Creates the builder.
    #[must_use]
    pub fn new(module: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            log_path: None,
            sinks: Vec::new(),
        }
    }

    /// Appends records as JSON lines to this file.
    #[must_use]
    pub fn log_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_path = Some(path.into());
        self
    }

    /// Adds another sink, e.g. a [`shared_logging::MemoryLogSink`].
    #[must_use]
    pub fn sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Builds the telemetry handle, opening the log file if one was set.
    pub fn build(self) -> Result<EvaluationTelemetry> {
        let mut sinks = self.sinks;
        if let Some(path) = self.log_path {
            sinks.insert(0, Arc::new(JsonLogger::new(path)?));
        }
        Ok(EvaluationTelemetry {
            inner: Arc::new(TelemetryInner {
                module: self.module,
                sinks,
            }),
        })
    }
}

/// Optional observer receiving warnings and progress from analysis calls.
#[derive(Clone)]
pub struct EvaluationTelemetry {
    inner: Arc<TelemetryInner>,
}

impl fmt::Debug for EvaluationTelemetry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EvaluationTelemetry")
            .field("module", &self.inner.module)
            .field("sinks", &self.inner.sinks.len())
            .finish()
    }
}

struct TelemetryInner {
    module: String,
    sinks: Vec<Arc<dyn LogSink>>,
}

impl EvaluationTelemetry {
    /// Returns a builder.
    #[must_use]
    pub fn builder(module: impl Into<String>) -> EvaluationTelemetryBuilder {
        EvaluationTelemetryBuilder::new(module)
    }

    /// Module name stamped on every record.
    #[must_use]
    pub fn module(&self) -> &str {
        &self.inner.module
    }

    /// Logs structured metadata to every sink. The first sink error is returned
    /// after the remaining sinks have been written.
    pub fn log(&self, level: LogLevel, message: &str, metadata: Value) -> Result<()> {
        let record = LogRecord::new(&self.inner.module, level, message).with_metadata(metadata);
        let mut first_err = None;
        for sink in &self.inner.sinks {
            if let Err(err) = sink.write(&record) {
                first_err.get_or_insert(err);
            }
        }
        first_err.map_or(Ok(()), Err)
    }
}

/// Logs through `telemetry` when present; sink failures never interrupt an analysis.
pub fn emit(
    telemetry: Option<&EvaluationTelemetry>,
    level: LogLevel,
    message: &str,
    metadata: Value,
) {
    if let Some(tel) = telemetry {
        let _ = tel.log(level, message, metadata);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use shared_logging::MemoryLogSink;
    use tempfile::tempdir;

    #[test]
    fn telemetry_writes_log_file_and_memory_sink() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("evaluation.log");
        let memory = Arc::new(MemoryLogSink::new());
        let telemetry = EvaluationTelemetry::builder("evaluation")
            .log_path(&path)
            .sink(memory.clone())
            .build()
            .unwrap();
        telemetry
            .log(LogLevel::Info, "bootstrap.start", json!({ "n_boot": 500 }))
            .unwrap();
        emit(
            Some(&telemetry),
            LogLevel::Warn,
            "sensitivity.scenario_skipped",
            json!({ "scenario": "zero_fill" }),
        );
        emit(None, LogLevel::Error, "ignored", Value::Null);

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("bootstrap.start"));
        assert_eq!(content.lines().count(), 2);
        let records = memory.snapshot();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].module, "evaluation");
        assert_eq!(records[0].field("n_boot"), Some(&json!(500)));
        assert_eq!(memory.count_at_least(LogLevel::Warn), 1);
    }

    #[test]
    fn telemetry_without_sinks_is_silent() {
        let telemetry = EvaluationTelemetry::builder("quiet").build().unwrap();
        assert_eq!(telemetry.module(), "quiet");
        telemetry.log(LogLevel::Info, "noop", json!({})).unwrap();
        assert!(format!("{telemetry:?}").contains("quiet"));
    }
}
