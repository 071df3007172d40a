//! Background recognition thread fed by a request queue.
//!
//! The interactive thread submits captures and keeps running; each
//! submission gets its own [`CancellationToken`] and a receiver for the
//! outcome. Submitting a new capture cancels the one still in flight, so a
//! burst of requests only pays for the last full scan.

use crate::image::ColorImage;
use crate::search::{AdaptiveMatch, CancellationToken, Matcher, ScanOutcome};
use crate::trace::trace_warn;
use std::sync::mpsc::{self, Receiver, RecvError, Sender, TryRecvError};
use std::thread::JoinHandle;

/// What a submitted recognition produced.
#[derive(Clone, Debug, PartialEq)]
pub enum WorkerOutcome {
    Matched(AdaptiveMatch),
    /// The request was cancelled before its scan completed.
    Cancelled,
}

struct Request {
    image: ColorImage,
    token: CancellationToken,
    reply: Sender<WorkerOutcome>,
}

/// Handle to one submitted recognition.
#[derive(Debug)]
pub struct PendingRecognition {
    token: CancellationToken,
    receiver: Receiver<WorkerOutcome>,
}

impl PendingRecognition {
    /// Blocks until the worker answers.
    ///
    /// Returns [`WorkerOutcome::Cancelled`] if the worker shut down first.
    pub fn wait(self) -> WorkerOutcome {
        self.receiver.recv().unwrap_or(WorkerOutcome::Cancelled)
    }

    /// Returns the outcome if it is ready.
    pub fn try_result(&self) -> Option<WorkerOutcome> {
        match self.receiver.try_recv() {
            Ok(outcome) => Some(outcome),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(WorkerOutcome::Cancelled),
        }
    }

    /// Cancels this request; the worker stops at the next entry boundary.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

/// Dedicated thread running adaptive recognitions in submission order.
pub struct RecognitionWorker {
    sender: Option<Sender<Request>>,
    handle: Option<JoinHandle<()>>,
    in_flight: Option<CancellationToken>,
}

impl RecognitionWorker {
    /// Starts the worker thread.
    pub fn spawn(matcher: Matcher) -> std::io::Result<Self> {
        let (sender, receiver) = mpsc::channel::<Request>();
        let handle = std::thread::Builder::new()
            .name("iconmatch-worker".to_string())
            .spawn(move || run(matcher, receiver))?;
        Ok(Self {
            sender: Some(sender),
            handle: Some(handle),
            in_flight: None,
        })
    }

    /// Queues a capture, cancelling the previous submission.
    pub fn submit(&mut self, image: ColorImage) -> PendingRecognition {
        if let Some(previous) = self.in_flight.take() {
            previous.cancel();
        }
        let token = CancellationToken::new();
        let (reply, receiver) = mpsc::channel();
        let request = Request {
            image,
            token: token.clone(),
            reply,
        };
        let sent = self
            .sender
            .as_ref()
            .map(|sender| sender.send(request).is_ok())
            .unwrap_or(false);
        if !sent {
            trace_warn!("recognition worker is gone, dropping request");
            token.cancel();
        }
        self.in_flight = Some(token.clone());
        PendingRecognition { token, receiver }
    }

    /// Cancels the latest submission, if any.
    pub fn cancel_current(&mut self) {
        if let Some(token) = self.in_flight.take() {
            token.cancel();
        }
    }
}

impl Drop for RecognitionWorker {
    fn drop(&mut self) {
        self.cancel_current();
        self.sender.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                trace_warn!("recognition worker panicked");
            }
        }
    }
}

fn run(matcher: Matcher, receiver: Receiver<Request>) {
    loop {
        let request = match receiver.recv() {
            Ok(request) => request,
            Err(RecvError) => break,
        };
        let outcome = if request.token.is_cancelled() {
            WorkerOutcome::Cancelled
        } else {
            let scoped = matcher.clone().with_cancellation(request.token);
            let k = scoped.config().adaptive_k;
            match scoped.scan_top(&request.image, k) {
                ScanOutcome::Completed(ranked) => {
                    WorkerOutcome::Matched(AdaptiveMatch::classify(ranked, scoped.config()))
                }
                ScanOutcome::Cancelled { .. } => WorkerOutcome::Cancelled,
            }
        };
        // The submitter may have dropped its handle.
        let _ = request.reply.send(outcome);
    }
}

#[cfg(test)]
mod tests {
    use super::{run, RecognitionWorker, Request, WorkerOutcome};
    use crate::image::{ColorImage, IconSize};
    use crate::library::{LibraryConfig, ReferenceLibrary};
    use crate::preprocess::PreprocessConfig;
    use crate::search::{CancellationToken, MatchStatus, Matcher};
    use std::sync::mpsc;
    use std::sync::Arc;

    fn matcher() -> Matcher {
        let config = LibraryConfig {
            preprocess: PreprocessConfig {
                icon_size: IconSize::new(32, 32).unwrap(),
                ..PreprocessConfig::default()
            },
            ..LibraryConfig::default()
        };
        let gradient =
            ColorImage::from_fn(32, 32, |x, y| [(x * 7) as u8, (y * 7) as u8, 120]).unwrap();
        let lib = ReferenceLibrary::from_images(config, vec![("gradient", gradient)]).unwrap();
        Matcher::new(Arc::new(lib))
    }

    #[test]
    fn worker_answers_requests() {
        let mut worker = RecognitionWorker::spawn(matcher()).unwrap();
        let image = ColorImage::from_fn(32, 32, |x, y| [(x * 7) as u8, (y * 7) as u8, 120]).unwrap();
        match worker.submit(image).wait() {
            WorkerOutcome::Matched(m) => {
                assert_eq!(m.status, MatchStatus::Confident);
                assert_eq!(m.item_id.as_deref(), Some("gradient"));
            }
            WorkerOutcome::Cancelled => panic!("request was not cancelled"),
        }
    }

    #[test]
    fn request_cancelled_before_start_reports_cancelled() {
        let (sender, receiver) = mpsc::channel();
        let (reply, outcome) = mpsc::channel();
        let token = CancellationToken::new();
        token.cancel();
        sender
            .send(Request {
                image: ColorImage::filled(32, 32, [0, 0, 0]).unwrap(),
                token,
                reply,
            })
            .unwrap();
        drop(sender);

        run(matcher(), receiver);
        assert!(matches!(outcome.recv().unwrap(), WorkerOutcome::Cancelled));
    }

    #[test]
    fn later_submission_matches_after_cancel() {
        let mut worker = RecognitionWorker::spawn(matcher()).unwrap();
        let image = ColorImage::filled(32, 32, [0, 0, 0]).unwrap();
        let pending = worker.submit(image.clone());
        pending.cancel();
        let latest = worker.submit(image);
        assert!(pending.token().is_cancelled());
        assert!(matches!(latest.wait(), WorkerOutcome::Matched(_)));
    }
}
