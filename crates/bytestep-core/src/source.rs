//! Sample acquisition seam
//!
//! The coordinator never fetches audio itself. It asks a [`SampleSource`] on
//! a worker thread and feeds whatever comes back into the prefetch pools.

use std::path::PathBuf;

use thiserror::Error;

use crate::buffer::SampleBuffer;

/// Acquisition failures; the coordinator logs them and retries on its own cadence
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("no samples available from {0}")]
    Empty(String),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode {path}: {reason}")]
    Decode { path: PathBuf, reason: String },

    #[error("sample source unavailable: {0}")]
    Unavailable(String),
}

/// Something that can produce decoded sample buffers
///
/// Called only from the coordinator's fetch worker, never from the audio
/// thread, so implementations may block on disk or network.
pub trait SampleSource: Send + 'static {
    fn fetch_sample(&mut self) -> Result<SampleBuffer, FetchError>;

    /// Name used in log lines
    fn name(&self) -> &str {
        "sample source"
    }
}

/// Boxed sources are sources too, so a service can hold `Box<dyn SampleSource>`
impl<S: SampleSource + ?Sized> SampleSource for Box<S> {
    fn fetch_sample(&mut self) -> Result<SampleBuffer, FetchError> {
        (**self).fetch_sample()
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Closure-backed source
pub struct FnSource<F> {
    name: String,
    fetch: F,
}

impl<F> FnSource<F>
where
    F: FnMut() -> Result<SampleBuffer, FetchError> + Send + 'static,
{
    pub fn new(name: impl Into<String>, fetch: F) -> Self {
        Self {
            name: name.into(),
            fetch,
        }
    }
}

impl<F> SampleSource for FnSource<F>
where
    F: FnMut() -> Result<SampleBuffer, FetchError> + Send + 'static,
{
    fn fetch_sample(&mut self) -> Result<SampleBuffer, FetchError> {
        (self.fetch)()
    }

    fn name(&self) -> &str {
        &self.name
    }
}
