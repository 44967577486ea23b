//! Background job host.
//!
//! [`submit`] runs a job on its own thread and hands back a [`JobHandle`].
//! The handle can cancel the job, poll it without blocking or wait for it.
//! Jobs observe cancellation through the [`CancelFlag`] they are given;
//! nothing is interrupted preemptively.
//!
//! [`BackgroundCompute`] keeps at most one job in flight, which is what an
//! interactive tool wants: changing a setting starts a new run and throws
//! the stale one away.
//!
//! ```
//! use uvlayout::host::submit;
//!
//! let handle = submit(|_cancel| 6 * 7);
//! assert_eq!(handle.wait(), Some(42));
//! ```

use std::thread;

use crossbeam_channel::{Receiver, TryRecvError};

use crate::algo::{CancelFlag, Cancellation, LayoutOperator, LayoutOutcome};
use crate::error::Result;

/// State of a job as seen by [`JobHandle::poll`].
#[derive(Debug)]
pub enum JobPoll<T> {
    /// The job is still running.
    NotReady,
    /// The job finished; its result.
    Ready(T),
    /// The job was cancelled, or ended without producing a result.
    Cancelled,
}

impl<T> JobPoll<T> {
    /// Whether the job is still running.
    pub fn is_pending(&self) -> bool {
        matches!(self, JobPoll::NotReady)
    }
}

/// Handle to a job started with [`submit`].
#[derive(Debug)]
pub struct JobHandle<T> {
    id: u64,
    cancel: CancelFlag,
    receiver: Receiver<T>,
}

impl<T> JobHandle<T> {
    /// Request cancellation. Any result the job still produces is discarded.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Check on the job without blocking.
    ///
    /// A result is delivered once; later polls report
    /// [`JobPoll::Cancelled`].
    pub fn poll(&self) -> JobPoll<T> {
        if self.is_cancelled() {
            return JobPoll::Cancelled;
        }
        match self.receiver.try_recv() {
            Ok(value) => JobPoll::Ready(value),
            Err(TryRecvError::Empty) => JobPoll::NotReady,
            Err(TryRecvError::Disconnected) => {
                log::debug!("job {} ended without a result", self.id);
                JobPoll::Cancelled
            }
        }
    }

    /// Block until the job finishes. Returns `None` if it was cancelled.
    pub fn wait(self) -> Option<T> {
        let value = self.receiver.recv().ok();
        if self.is_cancelled() {
            None
        } else {
            value
        }
    }
}

/// Run `job` on a new thread.
///
/// The job receives the flag its handle cancels. A job that panics is
/// reported as [`JobPoll::Cancelled`].
pub fn submit<T, F>(job: F) -> JobHandle<T>
where
    T: Send + 'static,
    F: FnOnce(&CancelFlag) -> T + Send + 'static,
{
    use std::sync::atomic::{AtomicU64, Ordering};
    static NEXT_ID: AtomicU64 = AtomicU64::new(0);

    let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    let cancel = CancelFlag::new();
    let (sender, receiver) = crossbeam_channel::bounded(1);

    let flag = cancel.clone();
    thread::spawn(move || {
        let value = job(&flag);
        if flag.is_cancelled() {
            log::debug!("job {} finished after cancellation, result dropped", id);
            return;
        }
        // The handle may already be gone.
        let _ = sender.send(value);
    });
    log::debug!("submitted job {}", id);

    JobHandle {
        id,
        cancel,
        receiver,
    }
}

/// Run a layout operator in the background.
pub fn submit_layout(operator: LayoutOperator) -> JobHandle<Result<LayoutOutcome>> {
    submit(move |cancel| operator.calculate(cancel))
}

/// A single background computation slot.
///
/// Starting a job cancels the one in flight, if any.
#[derive(Debug)]
pub struct BackgroundCompute<T> {
    current: Option<JobHandle<T>>,
}

impl<T> Default for BackgroundCompute<T> {
    fn default() -> Self {
        Self { current: None }
    }
}

impl<T: Send + 'static> BackgroundCompute<T> {
    /// Create an idle slot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a job, cancelling and discarding the previous one.
    pub fn start<F>(&mut self, job: F)
    where
        F: FnOnce(&CancelFlag) -> T + Send + 'static,
    {
        self.cancel();
        self.current = Some(submit(job));
    }

    /// Cancel the job in flight, if any.
    pub fn cancel(&mut self) {
        if let Some(previous) = self.current.take() {
            previous.cancel();
            log::debug!("cancelled job {}", previous.id);
        }
    }

    /// Whether a job is in flight.
    pub fn is_running(&self) -> bool {
        self.current.is_some()
    }

    /// Check on the job in flight.
    ///
    /// Returns [`JobPoll::Cancelled`] when idle. Once a result is delivered
    /// the slot becomes idle.
    pub fn poll(&mut self) -> JobPoll<T> {
        let Some(handle) = &self.current else {
            return JobPoll::Cancelled;
        };
        let state = handle.poll();
        if !state.is_pending() {
            self.current = None;
        }
        state
    }

    /// Block until the job in flight finishes.
    pub fn wait(&mut self) -> Option<T> {
        self.current.take().and_then(JobHandle::wait)
    }
}

impl<T> Drop for BackgroundCompute<T> {
    fn drop(&mut self) {
        if let Some(handle) = &self.current {
            handle.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algo::{LayoutOperatorFactory, LayoutPolicy};
    use crate::mesh::{build_from_triangles, build_uv_overlay};
    use crossbeam_channel::bounded;
    use nalgebra::{Point2, Point3};
    use std::sync::Arc;
    use std::time::Duration;

    fn poll_until_done<T>(handle: &JobHandle<T>) -> JobPoll<T> {
        loop {
            let state = handle.poll();
            if !state.is_pending() {
                return state;
            }
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn test_submit_and_poll() {
        let handle = submit(|_| "done");
        assert!(matches!(poll_until_done(&handle), JobPoll::Ready("done")));
        // Delivered once.
        assert!(matches!(handle.poll(), JobPoll::Cancelled));
    }

    #[test]
    fn test_poll_while_running() {
        let (release, gate) = bounded::<()>(0);
        let handle = submit(move |_| {
            let _ = gate.recv();
            1
        });
        assert!(handle.poll().is_pending());
        release.send(()).unwrap();
        assert_eq!(handle.wait(), Some(1));
    }

    #[test]
    fn test_cancel_discards_result() {
        let (release, gate) = bounded::<()>(0);
        let handle = submit(move |cancel: &CancelFlag| {
            let _ = gate.recv();
            cancel.is_cancelled()
        });
        handle.cancel();
        assert!(matches!(handle.poll(), JobPoll::Cancelled));
        release.send(()).unwrap();
        assert_eq!(handle.wait(), None);
    }

    #[test]
    fn test_panicking_job_reports_cancelled() {
        let handle = submit(|_| -> u32 { panic!("job failed") });
        assert!(matches!(poll_until_done(&handle), JobPoll::Cancelled));
    }

    #[test]
    fn test_background_compute_replaces_job() {
        let (release, gate) = bounded::<()>(0);
        let mut compute = BackgroundCompute::new();
        compute.start(move |cancel: &CancelFlag| {
            let _ = gate.recv();
            if cancel.is_cancelled() {
                0
            } else {
                1
            }
        });
        assert!(compute.is_running());

        compute.start(|_| 2);
        // Unblock the stale job; its result must never surface.
        release.send(()).unwrap();
        assert_eq!(compute.wait(), Some(2));
        assert!(!compute.is_running());
        assert!(matches!(compute.poll(), JobPoll::Cancelled));
    }

    #[test]
    fn test_submit_layout() {
        let vertices = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ];
        let mut mesh = build_from_triangles(&vertices, &[[0, 1, 2]]).unwrap();
        let uvs = vec![
            Point2::new(3.0, 3.0),
            Point2::new(5.0, 3.0),
            Point2::new(3.0, 5.0),
        ];
        let overlay = build_uv_overlay(&mesh, &uvs, &[Some([0, 1, 2])]).unwrap();
        mesh.add_uv_layer(overlay).unwrap();
        let mesh = Arc::new(mesh);

        let factory = LayoutOperatorFactory::new(LayoutPolicy::default(), Arc::clone(&mesh));
        let outcome = submit_layout(factory.make_operator())
            .wait()
            .unwrap()
            .unwrap();
        let result = outcome.completed().unwrap();

        let mut live = (*mesh).clone();
        result.patch.apply(&mut live).unwrap();
        let (min, max) = live.uv_layer(0).unwrap().external_bounding_box().unwrap();
        assert!(min.x >= 0.0 && min.y >= 0.0 && max.x <= 1.0 && max.y <= 1.0);
    }
}
