//! OCR collaborator interface and worker pool.
//!
//! The pipeline never depends on a concrete OCR engine. Callers plug one in
//! through [`OcrProvider`]: either a single concurrency-safe engine shared by
//! every worker, or a factory that gives each worker its own handle.
//! Recognition is best-effort; failures come back as [`OcrOutcome`] values,
//! never as errors.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, RecvTimeoutError};
use thiserror::Error;

use super::backend::ImageXObject;
use super::image::encode_for_ocr;

/// Failure reported by an OCR engine.
#[derive(Error, Debug)]
pub enum OcrError {
    /// The engine ran but could not recognize the image.
    #[error("recognition failed: {0}")]
    Engine(String),

    /// The image data is in a format the engine cannot read.
    #[error("unsupported image: {0}")]
    UnsupportedImage(String),

    /// The image could not be encoded for the engine.
    #[error("image encoding failed: {0}")]
    Encode(String),

    /// I/O error talking to the engine.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// An OCR engine handle owned by one worker.
pub trait OcrEngine: Send {
    /// Recognize the text in an encoded image.
    fn recognize(&mut self, image: &[u8]) -> Result<String, OcrError>;
}

/// An OCR engine that is safe to call from several workers at once.
pub trait SharedOcrEngine: Send + Sync {
    /// Recognize the text in an encoded image.
    fn recognize(&self, image: &[u8]) -> Result<String, OcrError>;
}

impl<F> SharedOcrEngine for F
where
    F: Fn(&[u8]) -> Result<String, OcrError> + Send + Sync,
{
    fn recognize(&self, image: &[u8]) -> Result<String, OcrError> {
        self(image)
    }
}

type EngineFactory = dyn Fn() -> Box<dyn OcrEngine> + Send + Sync;

#[derive(Clone)]
enum ProviderKind {
    Shared(Arc<dyn SharedOcrEngine>),
    PerWorker(Arc<EngineFactory>),
}

/// Source of OCR engine handles for the worker pool.
#[derive(Clone)]
pub struct OcrProvider {
    kind: ProviderKind,
}

impl OcrProvider {
    /// Share one concurrency-safe engine across all workers.
    pub fn shared(engine: impl SharedOcrEngine + 'static) -> Self {
        Self::shared_arc(Arc::new(engine))
    }

    /// Share an engine the caller also keeps a handle to.
    pub fn shared_arc(engine: Arc<dyn SharedOcrEngine>) -> Self {
        Self {
            kind: ProviderKind::Shared(engine),
        }
    }

    /// Give every worker an independent engine built by `factory`.
    pub fn per_worker<F>(factory: F) -> Self
    where
        F: Fn() -> Box<dyn OcrEngine> + Send + Sync + 'static,
    {
        Self {
            kind: ProviderKind::PerWorker(Arc::new(factory)),
        }
    }

    fn handle(&self) -> EngineHandle {
        match &self.kind {
            ProviderKind::Shared(engine) => EngineHandle::Shared(Arc::clone(engine)),
            ProviderKind::PerWorker(factory) => EngineHandle::Owned(factory()),
        }
    }
}

impl std::fmt::Debug for OcrProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self.kind {
            ProviderKind::Shared(_) => "shared",
            ProviderKind::PerWorker(_) => "per_worker",
        };
        f.debug_struct("OcrProvider").field("kind", &kind).finish()
    }
}

enum EngineHandle {
    Shared(Arc<dyn SharedOcrEngine>),
    Owned(Box<dyn OcrEngine>),
}

impl EngineHandle {
    fn recognize(&mut self, image: &[u8]) -> Result<String, OcrError> {
        match self {
            EngineHandle::Shared(engine) => engine.recognize(image),
            EngineHandle::Owned(engine) => engine.recognize(image),
        }
    }
}

/// One image waiting for recognition.
#[derive(Debug, Clone)]
pub struct OcrJob {
    /// 1-indexed page number
    pub page: u32,
    /// Image reference
    pub image_ref: String,
    /// The image as stored in the PDF; encoded for the engine by the worker
    pub image: ImageXObject,
}

/// Result of one recognition attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OcrOutcome {
    /// Recognized text (possibly empty)
    Text(String),
    /// The engine failed or panicked
    Failed(String),
    /// The document deadline passed before the job finished
    TimedOut,
}

/// Recognize every job on a bounded pool of `workers` threads.
///
/// Outcomes are returned in job order regardless of completion order. When
/// `timeout` elapses, queued jobs are abandoned and every unfinished job
/// reports [`OcrOutcome::TimedOut`]; an engine call already in progress is
/// left to finish on its detached thread.
pub fn run_ocr(
    provider: &OcrProvider,
    jobs: Vec<OcrJob>,
    workers: usize,
    timeout: Option<Duration>,
) -> Vec<OcrOutcome> {
    let total = jobs.len();
    if total == 0 {
        return Vec::new();
    }

    let deadline = timeout.map(|t| Instant::now() + t);
    let workers = workers.max(1).min(total);
    log::debug!("OCR: {} images on {} workers", total, workers);

    let (job_tx, job_rx) = bounded::<(usize, ImageXObject)>(total);
    let (result_tx, result_rx) = bounded::<(usize, OcrOutcome)>(total);
    let cancelled = Arc::new(AtomicBool::new(false));

    for (idx, job) in jobs.into_iter().enumerate() {
        if job_tx.send((idx, job.image)).is_err() {
            break;
        }
    }
    drop(job_tx);

    let mut handles = Vec::with_capacity(workers);
    for worker in 0..workers {
        let job_rx = job_rx.clone();
        let result_tx = result_tx.clone();
        let cancelled = Arc::clone(&cancelled);
        let provider = provider.clone();

        let spawned = thread::Builder::new()
            .name(format!("ocr-{}", worker))
            .spawn(move || {
                let mut engine = provider.handle();
                while let Ok((idx, image)) = job_rx.recv() {
                    if cancelled.load(Ordering::Relaxed) {
                        break;
                    }
                    let outcome = match encode_for_ocr(&image) {
                        Ok(data) => {
                            match panic::catch_unwind(AssertUnwindSafe(|| engine.recognize(&data)))
                            {
                                Ok(Ok(text)) => OcrOutcome::Text(text),
                                Ok(Err(e)) => OcrOutcome::Failed(e.to_string()),
                                Err(_) => OcrOutcome::Failed("OCR engine panicked".to_string()),
                            }
                        }
                        Err(e) => OcrOutcome::Failed(e.to_string()),
                    };
                    if result_tx.send((idx, outcome)).is_err() {
                        break;
                    }
                }
            });

        match spawned {
            Ok(handle) => handles.push(handle),
            Err(e) => log::warn!("OCR: failed to spawn worker {}: {}", worker, e),
        }
    }
    drop(result_tx);

    let mut outcomes: Vec<Option<OcrOutcome>> = (0..total).map(|_| None).collect();
    let mut received = 0;
    let mut timed_out = false;

    while received < total {
        let next = match deadline {
            Some(deadline) => result_rx.recv_deadline(deadline),
            None => result_rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };
        match next {
            Ok((idx, outcome)) => {
                outcomes[idx] = Some(outcome);
                received += 1;
            }
            Err(RecvTimeoutError::Timeout) => {
                log::warn!(
                    "OCR: deadline reached with {} of {} images unfinished",
                    total - received,
                    total
                );
                cancelled.store(true, Ordering::Relaxed);
                timed_out = true;
                break;
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    if !timed_out {
        for handle in handles {
            let _ = handle.join();
        }
    }

    outcomes
        .into_iter()
        .map(|o| match o {
            Some(outcome) => outcome,
            None if timed_out => OcrOutcome::TimedOut,
            None => OcrOutcome::Failed("OCR worker exited before finishing".to_string()),
        })
        .collect()
}
