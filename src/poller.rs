use std::cell::{Cell, RefCell};
use std::rc::Rc;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::spawn_local;

use crate::api::{ApiClient, JobId, JobStatus};
use crate::error::ClientError;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PollTick {
    generation: u64,
    job_id: JobId,
}

impl PollTick {
    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }
}

#[derive(Debug, PartialEq)]
pub enum PollEvent {
    /// Response for a job that is no longer tracked.
    Stale,
    Update { status: JobStatus, finished: bool },
    /// The request itself failed; polling stops without touching the status.
    Failed(ClientError),
}

/// Bookkeeping for one polling loop: which job, whether a request is out, and
/// whether the loop has ended.
#[derive(Debug, Default)]
pub struct PollTracker {
    generation: u64,
    job_id: Option<JobId>,
    in_flight: bool,
    finished: bool,
}

impl PollTracker {
    pub fn track(&mut self, job_id: JobId) {
        self.generation += 1;
        self.job_id = Some(job_id);
        self.in_flight = false;
        self.finished = false;
    }

    pub fn stop(&mut self) {
        self.generation += 1;
        self.job_id = None;
        self.in_flight = false;
        self.finished = true;
    }

    pub fn is_active(&self) -> bool {
        self.job_id.is_some() && !self.finished
    }

    pub fn next_tick(&mut self) -> Option<PollTick> {
        if !self.is_active() || self.in_flight {
            return None;
        }
        self.in_flight = true;
        Some(PollTick {
            generation: self.generation,
            job_id: self.job_id.clone()?,
        })
    }

    pub fn on_response(
        &mut self,
        tick: &PollTick,
        result: Result<JobStatus, ClientError>,
    ) -> PollEvent {
        if tick.generation != self.generation {
            return PollEvent::Stale;
        }
        self.in_flight = false;

        match result {
            Ok(status) => {
                let finished = status.status.is_terminal();
                self.finished |= finished;
                PollEvent::Update { status, finished }
            }
            Err(err) => {
                self.finished = true;
                PollEvent::Failed(err)
            }
        }
    }
}

pub type StatusCallback = Rc<dyn Fn(&JobId, JobStatus)>;

/// Drives a [`PollTracker`] from a `setInterval` timer.
pub struct StatusPoller {
    tracker: Rc<RefCell<PollTracker>>,
    interval_id: Rc<Cell<Option<i32>>>,
    tick_cb: Option<Closure<dyn FnMut()>>,
}

impl Default for StatusPoller {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusPoller {
    pub fn new() -> Self {
        Self {
            tracker: Rc::new(RefCell::new(PollTracker::default())),
            interval_id: Rc::new(Cell::new(None)),
            tick_cb: None,
        }
    }

    /// Starts polling `job_id`, tearing down any previous loop first.
    pub fn start(
        &mut self,
        client: ApiClient,
        job_id: JobId,
        interval_ms: i32,
        on_status: StatusCallback,
    ) -> Result<(), JsValue> {
        self.stop();
        log::info!("polling status for job {} every {}ms", job_id, interval_ms);
        self.tracker.borrow_mut().track(job_id);

        let tracker = Rc::clone(&self.tracker);
        let interval_id = Rc::clone(&self.interval_id);
        let tick_cb = Closure::wrap(Box::new(move || {
            let Some(tick) = tracker.borrow_mut().next_tick() else {
                return;
            };

            let tracker = Rc::clone(&tracker);
            let interval_id = Rc::clone(&interval_id);
            let client = client.clone();
            let on_status = Rc::clone(&on_status);
            spawn_local(async move {
                let result = client.status(tick.job_id()).await;
                let event = tracker.borrow_mut().on_response(&tick, result);
                match event {
                    PollEvent::Stale => {}
                    PollEvent::Update { status, finished } => {
                        if finished {
                            log::info!("job {} finished: {}", tick.job_id(), status.status.as_str());
                            clear_interval(&interval_id);
                        }
                        on_status(tick.job_id(), status);
                    }
                    PollEvent::Failed(err) => {
                        log::warn!("status poll for job {} stopped: {}", tick.job_id(), err);
                        clear_interval(&interval_id);
                    }
                }
            });
        }) as Box<dyn FnMut()>);

        let window = web_sys::window().ok_or_else(|| JsValue::from_str("missing window"))?;
        let id = window.set_interval_with_callback_and_timeout_and_arguments_0(
            tick_cb.as_ref().unchecked_ref(),
            interval_ms,
        )?;
        self.interval_id.set(Some(id));
        self.tick_cb = Some(tick_cb);
        Ok(())
    }

    pub fn stop(&mut self) {
        self.tracker.borrow_mut().stop();
        clear_interval(&self.interval_id);
        self.tick_cb = None;
    }
}

impl Drop for StatusPoller {
    fn drop(&mut self) {
        self.stop();
    }
}

fn clear_interval(interval_id: &Cell<Option<i32>>) {
    if let Some(id) = interval_id.take() {
        if let Some(window) = web_sys::window() {
            window.clear_interval_with_handle(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::JobState;

    fn status(state: JobState, progress: f64) -> JobStatus {
        JobStatus {
            status: state,
            progress,
            ..JobStatus::default()
        }
    }

    #[test]
    fn stops_exactly_at_done() {
        let mut tracker = PollTracker::default();
        tracker.track(JobId("job-7".to_string()));

        let sequence = [
            status(JobState::Building, 10.0),
            status(JobState::Building, 60.0),
            status(JobState::Done, 100.0),
        ];
        let mut seen = Vec::new();
        for response in sequence {
            let tick = tracker.next_tick().expect("loop still active");
            assert_eq!(tick.job_id(), &JobId("job-7".to_string()));
            match tracker.on_response(&tick, Ok(response)) {
                PollEvent::Update { status, finished } => seen.push((status.progress, finished)),
                other => panic!("unexpected {:?}", other),
            }
        }

        assert_eq!(seen, vec![(10.0, false), (60.0, false), (100.0, true)]);
        assert!(!tracker.is_active());
        assert!(tracker.next_tick().is_none());
    }

    #[test]
    fn error_status_stops_and_keeps_message() {
        let mut tracker = PollTracker::default();
        tracker.track(JobId("j".to_string()));
        let tick = tracker.next_tick().unwrap();
        let event = tracker.on_response(
            &tick,
            Ok(JobStatus {
                status: JobState::Error,
                progress: 30.0,
                status_message: Some("Error: disk full".to_string()),
                error: Some("disk full".to_string()),
            }),
        );
        match event {
            PollEvent::Update { status, finished } => {
                assert!(finished);
                assert_eq!(status.error.as_deref(), Some("disk full"));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(tracker.next_tick().is_none());
    }

    #[test]
    fn request_failure_stops_silently() {
        let mut tracker = PollTracker::default();
        tracker.track(JobId("j".to_string()));
        let tick = tracker.next_tick().unwrap();
        let event = tracker.on_response(
            &tick,
            Err(ClientError::Transport("NetworkError".to_string())),
        );
        assert!(matches!(event, PollEvent::Failed(_)));
        assert!(!tracker.is_active());
    }

    #[test]
    fn skips_ticks_while_a_request_is_out() {
        let mut tracker = PollTracker::default();
        tracker.track(JobId("j".to_string()));
        let tick = tracker.next_tick().unwrap();
        assert!(tracker.next_tick().is_none());
        tracker.on_response(&tick, Ok(status(JobState::Queued, 0.0)));
        assert!(tracker.next_tick().is_some());
    }

    #[test]
    fn switching_jobs_discards_late_responses() {
        let mut tracker = PollTracker::default();
        tracker.track(JobId("old".to_string()));
        let old_tick = tracker.next_tick().unwrap();

        tracker.track(JobId("new".to_string()));
        assert_eq!(
            tracker.on_response(&old_tick, Ok(status(JobState::Done, 100.0))),
            PollEvent::Stale
        );
        assert!(tracker.is_active());

        let tick = tracker.next_tick().unwrap();
        assert_eq!(tick.job_id(), &JobId("new".to_string()));
    }

    #[test]
    fn unknown_states_keep_polling() {
        let mut tracker = PollTracker::default();
        tracker.track(JobId("j".to_string()));
        let tick = tracker.next_tick().unwrap();
        tracker.on_response(&tick, Ok(status(JobState::Unknown, 5.0)));
        assert!(tracker.is_active());
    }
}
