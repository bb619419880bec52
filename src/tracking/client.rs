//! Background thread that runs tracking requests.
//!
//! Every request is tagged with a generation id. Cancelling, timing out or
//! issuing a newer request retires the current generation, and any reply that
//! later arrives for a retired generation is dropped instead of applied.

use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use web_time::Instant;

use super::service::{CancelToken, TrackingRequest, TrackingService};
use crate::error::TrackingError;
use crate::model::Track;

/// Generation id of a tracking request.
pub type Generation = u64;

/// Message sent to the tracking thread.
enum ThreadMessage {
    /// Run a request
    Run {
        generation: Generation,
        request: TrackingRequest,
        cancel: CancelToken,
    },
    /// Shutdown the thread
    Shutdown,
}

/// Reply from the tracking thread.
struct Reply {
    generation: Generation,
    result: Result<Vec<Track>, TrackingError>,
}

/// Final result of one tracking request.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackingOutcome {
    pub generation: Generation,
    pub request: TrackingRequest,
    pub result: Result<Vec<Track>, TrackingError>,
}

/// The request currently awaited.
struct InFlight {
    generation: Generation,
    request: TrackingRequest,
    cancel: CancelToken,
    started: Instant,
}

/// Runs tracking requests on a background thread and filters stale replies.
pub struct TrackingClient {
    /// Sender for requests to the background thread
    request_tx: Sender<ThreadMessage>,
    /// Receiver for results from the background thread
    reply_rx: Receiver<Reply>,
    /// Handle to the background thread (for joining on drop)
    thread_handle: Option<JoinHandle<()>>,
    /// Last generation handed out
    generation: Generation,
    in_flight: Option<InFlight>,
    timeout: Duration,
}

impl TrackingClient {
    /// Spawn the tracking thread.
    pub fn spawn(
        service: Arc<dyn TrackingService>,
        timeout: Duration,
    ) -> Result<Self, TrackingError> {
        let (request_tx, request_rx) = mpsc::channel::<ThreadMessage>();
        let (reply_tx, reply_rx) = mpsc::channel::<Reply>();

        let thread_handle = thread::Builder::new()
            .name("tracking-client".to_string())
            .spawn(move || {
                log::info!("Tracking thread started");
                Self::thread_loop(service.as_ref(), request_rx, reply_tx);
                log::info!("Tracking thread exiting");
            })
            .map_err(|e| {
                TrackingError::ServiceUnavailable(format!("failed to spawn tracking thread: {e}"))
            })?;

        Ok(Self {
            request_tx,
            reply_rx,
            thread_handle: Some(thread_handle),
            generation: 0,
            in_flight: None,
            timeout,
        })
    }

    /// Background thread main loop.
    fn thread_loop(
        service: &dyn TrackingService,
        request_rx: Receiver<ThreadMessage>,
        reply_tx: Sender<Reply>,
    ) {
        while let Ok(message) = request_rx.recv() {
            match message {
                ThreadMessage::Run {
                    generation,
                    request,
                    cancel,
                } => {
                    let result = if cancel.is_cancelled() {
                        Err(TrackingError::Cancelled)
                    } else {
                        log::debug!(
                            "Running tracking request {} ({} on {})",
                            generation,
                            request.model_name,
                            request.video_id
                        );
                        service.track(&request, &cancel)
                    };
                    if reply_tx.send(Reply { generation, result }).is_err() {
                        log::warn!("Reply channel closed, tracking thread exiting");
                        break;
                    }
                }
                ThreadMessage::Shutdown => {
                    log::debug!("Received shutdown signal");
                    break;
                }
            }
        }
    }

    /// Issue a request, retiring any request still in flight.
    pub fn request(&mut self, request: TrackingRequest) -> Result<Generation, TrackingError> {
        self.cancel();
        self.generation += 1;
        let generation = self.generation;
        let cancel = CancelToken::new();

        self.request_tx
            .send(ThreadMessage::Run {
                generation,
                request: request.clone(),
                cancel: cancel.clone(),
            })
            .map_err(|_| {
                TrackingError::ServiceUnavailable("tracking thread is not running".to_string())
            })?;

        log::debug!("Sent tracking request {}", generation);
        self.in_flight = Some(InFlight {
            generation,
            request,
            cancel,
            started: Instant::now(),
        });
        Ok(generation)
    }

    /// Cancel the request in flight; its reply will be discarded.
    ///
    /// Returns the cancelled generation, if any.
    pub fn cancel(&mut self) -> Option<Generation> {
        let in_flight = self.in_flight.take()?;
        in_flight.cancel.cancel();
        log::debug!("Cancelled tracking request {}", in_flight.generation);
        Some(in_flight.generation)
    }

    /// Take the outcome of the current request, if it finished or timed out.
    ///
    /// Non-blocking. Stale replies are dropped.
    pub fn poll(&mut self) -> Option<TrackingOutcome> {
        loop {
            match self.reply_rx.try_recv() {
                Ok(reply) => {
                    if let Some(outcome) = self.accept_reply(reply) {
                        return Some(outcome);
                    }
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    log::warn!("Tracking thread disconnected");
                    return self.fail_in_flight(TrackingError::ServiceUnavailable(
                        "tracking thread stopped".to_string(),
                    ));
                }
            }
        }
        self.check_timeout()
    }

    /// Block up to `max_wait` for the current request's outcome.
    pub fn wait(&mut self, max_wait: Duration) -> Option<TrackingOutcome> {
        let deadline = Instant::now() + max_wait;
        while self.in_flight.is_some() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return self.check_timeout();
            }
            match self.reply_rx.recv_timeout(remaining.min(self.timeout)) {
                Ok(reply) => {
                    if let Some(outcome) = self.accept_reply(reply) {
                        return Some(outcome);
                    }
                }
                Err(RecvTimeoutError::Timeout) => {
                    if let Some(outcome) = self.check_timeout() {
                        return Some(outcome);
                    }
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return self.fail_in_flight(TrackingError::ServiceUnavailable(
                        "tracking thread stopped".to_string(),
                    ));
                }
            }
        }
        None
    }

    /// Check if a request is awaiting its reply.
    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Generation of the request in flight.
    pub fn current_generation(&self) -> Option<Generation> {
        self.in_flight.as_ref().map(|f| f.generation)
    }

    fn accept_reply(&mut self, reply: Reply) -> Option<TrackingOutcome> {
        let current = self.current_generation();
        if current != Some(reply.generation) {
            log::debug!(
                "Discarding stale tracking reply {} (current {:?})",
                reply.generation,
                current
            );
            return None;
        }
        let in_flight = self.in_flight.take()?;
        Some(TrackingOutcome {
            generation: reply.generation,
            request: in_flight.request,
            result: reply.result,
        })
    }

    fn check_timeout(&mut self) -> Option<TrackingOutcome> {
        let elapsed = self.in_flight.as_ref()?.started.elapsed();
        if elapsed < self.timeout {
            return None;
        }
        log::warn!("Tracking request timed out after {:?}", elapsed);
        self.fail_in_flight(TrackingError::Timeout {
            elapsed_ms: elapsed.as_millis() as u64,
        })
    }

    fn fail_in_flight(&mut self, error: TrackingError) -> Option<TrackingOutcome> {
        let in_flight = self.in_flight.take()?;
        in_flight.cancel.cancel();
        Some(TrackingOutcome {
            generation: in_flight.generation,
            request: in_flight.request,
            result: Err(error),
        })
    }
}

impl Drop for TrackingClient {
    fn drop(&mut self) {
        log::debug!("Shutting down tracking thread");
        self.cancel();
        let _ = self.request_tx.send(ThreadMessage::Shutdown);

        if let Some(handle) = self.thread_handle.take() {
            if let Err(e) = handle.join() {
                log::warn!("Tracking thread panicked: {:?}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BoundingBox, Detection, TrackId};
    use std::sync::Mutex;

    /// Service that blocks until released, then returns one track named after the request.
    struct GatedService {
        gate: Mutex<Receiver<()>>,
    }

    impl TrackingService for GatedService {
        fn track(
            &self,
            request: &TrackingRequest,
            cancel: &CancelToken,
        ) -> Result<Vec<Track>, TrackingError> {
            let gate = self.gate.lock().map_err(|_| {
                TrackingError::ServiceUnavailable("gate poisoned".to_string())
            })?;
            let _ = gate.recv_timeout(Duration::from_secs(5));
            if cancel.is_cancelled() {
                return Err(TrackingError::Cancelled);
            }
            Ok(vec![Track::new(
                TrackId::new(request.video_id.clone()),
                request.model_name.clone(),
                vec![Detection::new(0, BoundingBox::new(0.0, 0.0, 1.0, 1.0), 1.0)],
            )])
        }
    }

    fn gated_client(timeout: Duration) -> (TrackingClient, Sender<()>) {
        let (gate_tx, gate_rx) = mpsc::channel();
        let service = Arc::new(GatedService {
            gate: Mutex::new(gate_rx),
        });
        (TrackingClient::spawn(service, timeout).unwrap(), gate_tx)
    }

    struct Unavailable;

    impl TrackingService for Unavailable {
        fn track(
            &self,
            _request: &TrackingRequest,
            _cancel: &CancelToken,
        ) -> Result<Vec<Track>, TrackingError> {
            Err(TrackingError::ServiceUnavailable("offline".to_string()))
        }
    }

    #[test]
    fn test_request_completes() {
        let (mut client, gate) = gated_client(Duration::from_secs(10));
        let generation = client.request(TrackingRequest::new("v1", "m")).unwrap();
        assert!(client.is_busy());
        gate.send(()).unwrap();

        let outcome = client.wait(Duration::from_secs(5)).unwrap();
        assert_eq!(outcome.generation, generation);
        let tracks = outcome.result.unwrap();
        assert_eq!(tracks[0].id, TrackId::new("v1"));
        assert!(!client.is_busy());
    }

    #[test]
    fn test_newer_request_discards_stale_reply() {
        let (mut client, gate) = gated_client(Duration::from_secs(10));
        let first = client.request(TrackingRequest::new("old", "m")).unwrap();
        let second = client.request(TrackingRequest::new("new", "m")).unwrap();
        assert!(second > first);

        gate.send(()).unwrap();
        gate.send(()).unwrap();
        let outcome = client.wait(Duration::from_secs(5)).unwrap();
        assert_eq!(outcome.generation, second);
        assert_eq!(outcome.result.unwrap()[0].id, TrackId::new("new"));
    }

    #[test]
    fn test_cancelled_reply_is_dropped() {
        let (mut client, gate) = gated_client(Duration::from_secs(10));
        let generation = client.request(TrackingRequest::new("v", "m")).unwrap();
        assert_eq!(client.cancel(), Some(generation));
        assert!(!client.is_busy());

        gate.send(()).unwrap();
        thread::sleep(Duration::from_millis(50));
        assert_eq!(client.poll(), None);
        assert_eq!(client.cancel(), None);
    }

    #[test]
    fn test_timeout() {
        let (mut client, gate) = gated_client(Duration::from_millis(20));
        client.request(TrackingRequest::new("v", "m")).unwrap();
        let outcome = client.wait(Duration::from_secs(2)).unwrap();
        assert!(matches!(
            outcome.result,
            Err(TrackingError::Timeout { .. })
        ));

        // The late reply must not surface.
        gate.send(()).unwrap();
        thread::sleep(Duration::from_millis(50));
        assert_eq!(client.poll(), None);
    }

    #[test]
    fn test_service_error_is_reported() {
        let mut client = TrackingClient::spawn(Arc::new(Unavailable), Duration::from_secs(5))
            .unwrap();
        client.request(TrackingRequest::new("v", "m")).unwrap();
        let outcome = client.wait(Duration::from_secs(5)).unwrap();
        assert_eq!(
            outcome.result,
            Err(TrackingError::ServiceUnavailable("offline".to_string()))
        );
    }
}
