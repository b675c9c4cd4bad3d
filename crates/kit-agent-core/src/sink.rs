//! Log and metric sinks.
//!
//! Both sinks write through immediately: a worker tails stdout and
//! `metrics.log` while the agent runs, so nothing may sit in a buffer. Writes
//! happen in call order and are flushed before the call returns.

use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use tracing::warn;

use crate::config::OutputDirectory;
use crate::error::SinkError;

/// Series name reserved for [`MetricSink::report_progress`].
pub const PROGRESS_SERIES: &str = "progress";

/// Line-oriented log stream, stdout by default.
///
/// `log` never fails. A closed stream (`BrokenPipe`) is latched so the
/// entrypoint can fail the run afterwards; other write errors are dropped
/// after a warning on stderr.
pub struct LogStream {
    writer: Mutex<Box<dyn Write + Send>>,
    broken: AtomicBool,
}

impl LogStream {
    pub fn new(writer: impl Write + Send + 'static) -> Self {
        LogStream {
            writer: Mutex::new(Box::new(writer)),
            broken: AtomicBool::new(false),
        }
    }

    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }

    /// Write `message` plus a newline and flush.
    pub fn log(&self, message: &str) {
        let mut line = String::with_capacity(message.len() + 1);
        line.push_str(message);
        line.push('\n');

        let mut writer = match self.writer.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let result = writer
            .write_all(line.as_bytes())
            .and_then(|()| writer.flush());

        if let Err(e) = result {
            if e.kind() == ErrorKind::BrokenPipe {
                if !self.broken.swap(true, Ordering::SeqCst) {
                    warn!("log stream closed by reader; the run will be marked failed");
                }
            } else {
                warn!(error = %e, "failed to write log line");
            }
        }
    }

    pub fn is_broken(&self) -> bool {
        self.broken.load(Ordering::SeqCst)
    }
}

impl Default for LogStream {
    fn default() -> Self {
        Self::stdout()
    }
}

/// Append-only writer for `metrics.log`. Never reads the file back.
#[derive(Debug)]
pub struct MetricSink {
    path: PathBuf,
    last_progress: Mutex<Option<u64>>,
}

impl MetricSink {
    pub fn new(output: &OutputDirectory) -> Self {
        MetricSink {
            path: output.metrics_path(),
            last_progress: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append `name,step,value`.
    pub fn record_metric(&self, name: &str, step: u64, value: f64) -> Result<(), SinkError> {
        validate_metric_name(name)?;
        self.append(&format_metric_line(name, step, value))
    }

    /// Record the current training step under [`PROGRESS_SERIES`].
    ///
    /// Steps are expected to be non-decreasing; a step going backwards is
    /// still recorded, with a warning.
    pub fn report_progress(&self, step: u64) -> Result<(), SinkError> {
        {
            let mut last = match self.last_progress.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            if let Some(previous) = *last {
                if step < previous {
                    warn!(step, previous, "progress step went backwards");
                }
            }
            *last = Some(step);
        }
        self.append(&format_metric_line(PROGRESS_SERIES, step, step as f64))
    }

    fn append(&self, line: &str) -> Result<(), SinkError> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())?;
        file.flush()?;
        Ok(())
    }
}

/// Encode one metrics line. Values use the shortest round-trip form and
/// always carry a fractional part (`0.0`, `0.1`).
pub fn format_metric_line(name: &str, step: u64, value: f64) -> String {
    format!("{name},{step},{value:?}\n")
}

fn validate_metric_name(name: &str) -> Result<(), SinkError> {
    if name.is_empty() || name.contains([',', '\n', '\r']) {
        return Err(SinkError::InvalidName(name.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ensure_output_dir;
    use std::io;
    use std::sync::Arc;

    /// Writer that shares its buffer with the test.
    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct ClosedPipe;

    impl Write for ClosedPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::from(ErrorKind::BrokenPipe))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct FlakyWriter;

    impl Write for FlakyWriter {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::other("disk quota exceeded"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// Counts calls so tests can check that every line is flushed.
    #[derive(Clone, Default)]
    struct CountingWriter {
        calls: Arc<Mutex<(usize, usize)>>,
    }

    impl CountingWriter {
        fn writes_and_flushes(&self) -> (usize, usize) {
            *self.calls.lock().unwrap()
        }
    }

    impl Write for CountingWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.calls.lock().unwrap().0 += 1;
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            self.calls.lock().unwrap().1 += 1;
            Ok(())
        }
    }

    /// Accepts bytes but reports the reader gone on flush.
    struct ClosedOnFlush;

    impl Write for ClosedOnFlush {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Err(io::Error::from(ErrorKind::BrokenPipe))
        }
    }

    fn read_metrics(output: &OutputDirectory) -> String {
        std::fs::read_to_string(output.metrics_path()).unwrap()
    }

    #[test]
    fn log_lines_keep_call_order() {
        let buf = SharedBuf::default();
        let stream = LogStream::new(buf.clone());

        stream.log("starting");
        stream.log("epoch 1");
        stream.log("done");

        let out = String::from_utf8(buf.0.lock().unwrap().clone()).unwrap();
        assert_eq!(out, "starting\nepoch 1\ndone\n");
        assert!(!stream.is_broken());
    }

    #[test]
    fn every_log_line_is_flushed() {
        let writer = CountingWriter::default();
        let stream = LogStream::new(writer.clone());

        stream.log("first");
        assert_eq!(writer.writes_and_flushes(), (1, 1));

        stream.log("second");
        assert_eq!(writer.writes_and_flushes(), (2, 2));
    }

    #[test]
    fn broken_pipe_on_flush_is_latched() {
        let stream = LogStream::new(ClosedOnFlush);
        stream.log("buffered but never delivered");
        assert!(stream.is_broken());
    }

    #[test]
    fn broken_pipe_is_latched() {
        let stream = LogStream::new(ClosedPipe);
        stream.log("lost");
        stream.log("lost again");
        assert!(stream.is_broken());
    }

    #[test]
    fn other_write_errors_are_best_effort() {
        let stream = LogStream::new(FlakyWriter);
        stream.log("dropped");
        assert!(!stream.is_broken());
    }

    #[test]
    fn metrics_append_in_call_order() {
        let dir = tempfile::tempdir().unwrap();
        let output = ensure_output_dir(dir.path()).unwrap();
        let sink = MetricSink::new(&output);

        for i in 0..3u64 {
            sink.record_metric("pnl", i, i as f64 * 0.1).unwrap();
        }

        assert_eq!(read_metrics(&output), "pnl,0,0.0\npnl,1,0.1\npnl,2,0.2\n");
    }

    #[test]
    fn metrics_append_to_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let output = ensure_output_dir(dir.path()).unwrap();
        std::fs::write(output.metrics_path(), "loss,0,1.5\n").unwrap();

        MetricSink::new(&output).record_metric("loss", 1, 1.25).unwrap();

        assert_eq!(read_metrics(&output), "loss,0,1.5\nloss,1,1.25\n");
    }

    #[test]
    fn same_name_across_steps_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let output = ensure_output_dir(dir.path()).unwrap();
        let sink = MetricSink::new(&output);

        sink.record_metric("reward", 5, 2.0).unwrap();
        sink.record_metric("reward", 5, 3.0).unwrap();

        assert_eq!(read_metrics(&output).lines().count(), 2);
    }

    #[test]
    fn invalid_metric_names_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let output = ensure_output_dir(dir.path()).unwrap();
        let sink = MetricSink::new(&output);

        for bad in ["", "a,b", "multi\nline", "cr\r"] {
            assert!(matches!(
                sink.record_metric(bad, 0, 1.0),
                Err(SinkError::InvalidName(_))
            ));
        }
        assert!(!output.metrics_path().exists());
    }

    #[test]
    fn progress_is_recorded_even_when_decreasing() {
        let dir = tempfile::tempdir().unwrap();
        let output = ensure_output_dir(dir.path()).unwrap();
        let sink = MetricSink::new(&output);

        sink.report_progress(100).unwrap();
        sink.report_progress(50).unwrap();

        assert_eq!(read_metrics(&output), "progress,100,100.0\nprogress,50,50.0\n");
    }

    #[test]
    fn format_metric_line_shapes() {
        assert_eq!(format_metric_line("pnl", 0, 0.0), "pnl,0,0.0\n");
        assert_eq!(format_metric_line("pnl", 7, -1.5), "pnl,7,-1.5\n");
        assert_eq!(format_metric_line("pnl", 3, 3.0 * 0.1), "pnl,3,0.30000000000000004\n");
    }
}
