//! Termination detection across worker threads.
//!
//! A worker that drains its queues goes to sleep here; `new_job` re-arms the
//! sleepers. Termination is declared exactly when every worker is asleep and
//! no scheduled task is outstanding. The outstanding-task counter is what
//! closes the race where a message lands after every worker checked its
//! queues but before any of them went to sleep.

use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::{Condvar, Mutex};

struct TermState {
    num_active: usize,
    done: bool,
}

pub struct CriticalTermination {
    ncpus: usize,
    state: Mutex<TermState>,
    wake: Condvar,
    outstanding: AtomicUsize,
}

impl CriticalTermination {
    pub fn new(ncpus: usize) -> Self {
        Self {
            ncpus,
            state: Mutex::new(TermState { num_active: ncpus, done: false }),
            wake: Condvar::new(),
            outstanding: AtomicUsize::new(0),
        }
    }

    /// Re-arms the detector for a new run. The outstanding-task counter is
    /// left alone: it is zero after any terminated run, and work scheduled
    /// before the workers start has already been counted into it.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.num_active = self.ncpus;
        state.done = false;
    }

    /// Records a newly scheduled task and wakes sleeping workers. The worker
    /// hint mirrors the scheduler's enqueue target; any sleeper may consume
    /// the work, so all of them are woken.
    pub fn new_job(&self, _worker: usize) {
        self.outstanding.fetch_add(1, Ordering::SeqCst);
        let _state = self.state.lock();
        self.wake.notify_all();
    }

    /// Records that one delivered task finished processing.
    pub fn completed_job(&self) {
        self.outstanding.fetch_sub(1, Ordering::SeqCst);
    }

    /// Number of tasks scheduled but not yet completed.
    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::SeqCst)
    }

    /// Parks worker `worker` until there is work again or the system has
    /// globally terminated. Returns true on termination.
    pub fn sleep(&self, _worker: usize) -> bool {
        let mut state = self.state.lock();
        if state.done {
            return true;
        }
        if self.outstanding.load(Ordering::SeqCst) > 0 {
            return false;
        }
        state.num_active -= 1;
        loop {
            if state.done {
                return true;
            }
            if self.outstanding.load(Ordering::SeqCst) > 0 {
                state.num_active += 1;
                return false;
            }
            if state.num_active == 0 {
                state.done = true;
                self.wake.notify_all();
                return true;
            }
            self.wake.wait(&mut state);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    use super::*;

    #[test]
    fn lone_idle_worker_terminates() {
        let term = CriticalTermination::new(1);
        assert!(term.sleep(0));
    }

    #[test]
    fn outstanding_work_prevents_sleep() {
        let term = CriticalTermination::new(1);
        term.new_job(0);
        assert!(!term.sleep(0));
        term.completed_job();
        assert!(term.sleep(0));
    }

    #[test]
    fn new_job_wakes_a_sleeping_worker() {
        let term = Arc::new(CriticalTermination::new(2));
        let sleeper = Arc::clone(&term);
        let handle = thread::spawn(move || {
            let mut woke_for_work = false;
            loop {
                if sleeper.sleep(0) {
                    return woke_for_work;
                }
                // woken for work: consume the task
                woke_for_work = true;
                sleeper.completed_job();
            }
        });
        thread::sleep(Duration::from_millis(50));
        term.new_job(0);
        while !term.sleep(1) {
            thread::yield_now();
        }
        assert!(handle.join().unwrap());
    }

    #[test]
    fn reset_rearms_after_termination() {
        let term = CriticalTermination::new(1);
        assert!(term.sleep(0));
        term.reset();
        term.new_job(0);
        assert!(!term.sleep(0));
    }
}
