//! TensorBoard output of replay diagnostics.
use dher_core::record::{Record, RecordValue, Recorder};
use log::trace;
use std::path::Path;
use tensorboard_rs::summary_writer::SummaryWriter;

/// Writes scalar values of records to TensorBoard event files.
///
/// The step of each record is read from the scalar stored under the step
/// key, which is not written itself. Records without it are given the step
/// following the previous one. String values are skipped.
///
/// ```no_run
/// use dher_core::record::Recorder;
/// use dher_tensorboard::TensorboardRecorder;
/// # use dher_core::SampleDiagnostics;
///
/// let mut recorder = TensorboardRecorder::new("runs/dher").step_key("n_updates");
/// # let diagnostics = SampleDiagnostics::default();
/// recorder.write(diagnostics.to_record());
/// ```
pub struct TensorboardRecorder {
    writer: SummaryWriter,
    step_key: String,
    step: usize,
}

impl TensorboardRecorder {
    /// Creates a recorder writing event files under `logdir`.
    pub fn new<P: AsRef<Path>>(logdir: P) -> Self {
        Self {
            writer: SummaryWriter::new(logdir),
            step_key: "step".to_string(),
            step: 0,
        }
    }

    /// Sets the key holding the step of a record.
    pub fn step_key(mut self, step_key: impl Into<String>) -> Self {
        self.step_key = step_key.into();
        self
    }

    /// Step of the last written record.
    pub fn current_step(&self) -> usize {
        self.step
    }

    /// Flushes pending events to disk.
    pub fn flush(&mut self) {
        self.writer.flush();
    }
}

impl Recorder for TensorboardRecorder {
    fn write(&mut self, record: Record) {
        self.step = match record.get_scalar(&self.step_key) {
            Some(step) => step as usize,
            None => self.step + 1,
        };

        for (k, v) in record.iter() {
            if *k == self.step_key {
                continue;
            }
            match v {
                RecordValue::Scalar(v) => self.writer.add_scalar(k, *v, self.step),
                RecordValue::String(_) => trace!("Skipped string value `{}`", k),
            }
        }
    }
}
