//! Approximate-FIFO multi-queue scheduler.
//!
//! Each worker owns an in-queue it pushes new vertex ids into and an
//! out-queue it drains; once an in-queue outgrows the configured threshold
//! the whole sub-queue moves to the tail of the shared master queue, and an
//! idle worker grabs the next sub-queue from its head. Ordering is FIFO
//! within a sub-queue and FIFO between sub-queues at the master, with no
//! global order of individual messages.

use std::collections::VecDeque;

use parking_lot::Mutex;
use rand::Rng;

use crate::config::SchedulerConfig;
use crate::error::fatal;
use crate::types::VertexId;

mod messages;
mod terminator;
mod vertex_map;

pub use messages::{MaxMessage, Message, SumMessage};
pub use terminator::CriticalTermination;
pub use vertex_map::VertexMessageMap;

const COMPONENT: &str = "scheduler";

/// Order in which [`MultiQueueScheduler::schedule_all`] walks the vertices.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ScheduleOrder {
    InOrder,
    Shuffle,
}

type Queue = VecDeque<VertexId>;

pub struct MultiQueueScheduler<M> {
    messages: VertexMessageMap<M>,
    master_queue: Mutex<VecDeque<Queue>>,
    sub_queue_size: usize,
    in_queues: Vec<Mutex<Queue>>,
    out_queues: Vec<Mutex<Queue>>,
    term: CriticalTermination,
}

impl<M: Message> MultiQueueScheduler<M> {
    pub fn new(num_vertices: usize, ncpus: usize, config: SchedulerConfig) -> Self {
        if ncpus == 0 {
            fatal!(COMPONENT, "scheduler needs at least one worker");
        }
        Self {
            messages: VertexMessageMap::new(num_vertices),
            master_queue: Mutex::new(VecDeque::new()),
            sub_queue_size: config.sub_queue_size,
            in_queues: (0..ncpus).map(|_| Mutex::new(Queue::new())).collect(),
            out_queues: (0..ncpus).map(|_| Mutex::new(Queue::new())).collect(),
            term: CriticalTermination::new(ncpus),
        }
    }

    pub fn num_workers(&self) -> usize {
        self.in_queues.len()
    }

    /// Flushes scheduling done before the workers existed onto the master in
    /// worker order, then re-arms the termination detector.
    pub fn start(&self) {
        let mut master = self.master_queue.lock();
        for in_queue in &self.in_queues {
            let mut queue = in_queue.lock();
            if !queue.is_empty() {
                master.push_back(std::mem::take(&mut *queue));
            }
        }
        drop(master);
        self.term.reset();
    }

    /// Schedules `message` for `vid` from outside any worker; the sub-queue
    /// is picked uniformly at random.
    pub fn schedule(&self, vid: VertexId, message: M) {
        if self.messages.add(vid, message) {
            let worker = rand::thread_rng().gen_range(0..self.in_queues.len());
            self.enqueue(worker, vid);
        }
    }

    /// Schedules `message` for `vid` from worker `worker`'s own thread,
    /// keeping the work on that worker's sub-queue.
    pub fn schedule_from_execution_thread(&self, worker: usize, vid: VertexId, message: M) {
        self.check_worker(worker);
        if self.messages.add(vid, message) {
            self.enqueue(worker, vid);
        }
    }

    /// Re-enqueues a vertex whose message was placed earlier and is still
    /// pending.
    pub fn schedule_placed(&self, vid: VertexId) {
        if self.messages.has_message(vid) {
            let worker = rand::thread_rng().gen_range(0..self.in_queues.len());
            self.enqueue(worker, vid);
        }
    }

    /// Worker-thread variant of [`MultiQueueScheduler::schedule_placed`].
    pub fn schedule_placed_from_execution_thread(&self, worker: usize, vid: VertexId) {
        self.check_worker(worker);
        if self.messages.has_message(vid) {
            self.enqueue(worker, vid);
        }
    }

    /// Folds `message` into the map without enqueueing the vertex.
    pub fn place(&self, vid: VertexId, message: M) {
        self.messages.add(vid, message);
    }

    /// Schedules every vertex with a copy of `message`.
    pub fn schedule_all(&self, message: M, order: ScheduleOrder) {
        match order {
            ScheduleOrder::InOrder => {
                for vid in 0..self.messages.len() as u32 {
                    self.schedule(VertexId(vid), message.clone());
                }
            }
            ScheduleOrder::Shuffle => {
                use rand::seq::SliceRandom;
                let mut permutation: Vec<u32> = (0..self.messages.len() as u32).collect();
                permutation.shuffle(&mut rand::thread_rng());
                for vid in permutation {
                    self.schedule(VertexId(vid), message.clone());
                }
            }
        }
    }

    /// Takes the pending message for exactly `vid`, bypassing the queues.
    pub fn get_specific(&self, vid: VertexId) -> Option<M> {
        self.messages.test_and_get(vid)
    }

    /// Next unit of work for `worker`: refill the out-queue from the master,
    /// then from the worker's own in-queue, then pop entries until one still
    /// has a live message. `None` means every queue is empty.
    pub fn get_next(&self, worker: usize) -> Option<(VertexId, M)> {
        self.check_worker(worker);
        loop {
            let mut out_queue = self.out_queues[worker].lock();
            if out_queue.is_empty() {
                let mut master = self.master_queue.lock();
                if let Some(sub_queue) = master.pop_front() {
                    *out_queue = sub_queue;
                }
            }
            if out_queue.is_empty() {
                let mut in_queue = self.in_queues[worker].lock();
                std::mem::swap(&mut *out_queue, &mut *in_queue);
            }
            match out_queue.pop_front() {
                Some(vid) => {
                    if let Some(message) = self.messages.test_and_get(vid) {
                        return Some((vid, message));
                    }
                    // stale entry: drained through another queue already
                }
                None => return None,
            }
        }
    }

    /// Reports one delivered task as processed.
    pub fn completed(&self, _worker: usize) {
        self.term.completed_job();
    }

    /// The distributed termination detector driving worker shutdown.
    pub fn terminator(&self) -> &CriticalTermination {
        &self.term
    }

    /// Number of messages folded into already scheduled vertices.
    pub fn num_joins(&self) -> u64 {
        self.messages.num_joins()
    }

    fn enqueue(&self, worker: usize, vid: VertexId) {
        {
            let mut in_queue = self.in_queues[worker].lock();
            in_queue.push_back(vid);
            if in_queue.len() > self.sub_queue_size {
                self.master_queue.lock().push_back(std::mem::take(&mut *in_queue));
            }
        }
        self.term.new_job(worker);
    }

    fn check_worker(&self, worker: usize) {
        if worker >= self.in_queues.len() {
            fatal!(COMPONENT, "worker {worker} out of range ({} workers)", self.in_queues.len());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scheduler(num_vertices: usize, ncpus: usize) -> MultiQueueScheduler<SumMessage> {
        MultiQueueScheduler::new(num_vertices, ncpus, SchedulerConfig::default())
    }

    fn drain(sched: &MultiQueueScheduler<SumMessage>) -> Vec<(VertexId, SumMessage)> {
        let mut tasks = Vec::new();
        loop {
            let mut progressed = false;
            for worker in 0..sched.num_workers() {
                while let Some(task) = sched.get_next(worker) {
                    sched.completed(worker);
                    tasks.push(task);
                    progressed = true;
                }
            }
            if !progressed {
                return tasks;
            }
        }
    }

    #[test]
    fn combiner_folds_messages_for_one_vertex() {
        let sched = scheduler(16, 2);
        sched.start();
        sched.schedule(VertexId(7), SumMessage::new(1.0));
        sched.schedule(VertexId(7), SumMessage::new(2.5));
        let tasks = drain(&sched);
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].0, VertexId(7));
        assert_eq!(tasks[0].1.priority(), 3.5);
        assert_eq!(sched.num_joins(), 1);
    }

    #[test]
    fn every_scheduled_vertex_is_delivered_once() {
        let sched = scheduler(64, 3);
        sched.start();
        for vid in 0..64u32 {
            sched.schedule(VertexId(vid), SumMessage::new(vid as f64));
        }
        let mut tasks = drain(&sched);
        tasks.sort_by_key(|(vid, _)| *vid);
        assert_eq!(tasks.len(), 64);
        for (i, (vid, message)) in tasks.iter().enumerate() {
            assert_eq!(*vid, VertexId(i as u32));
            assert_eq!(message.priority(), i as f64);
        }
    }

    #[test]
    fn scheduling_before_start_is_observed() {
        let sched = scheduler(8, 2);
        sched.schedule(VertexId(5), SumMessage::new(1.0));
        sched.start();
        let tasks = drain(&sched);
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].0, VertexId(5));
    }

    #[test]
    fn unit_sub_queues_still_deliver() {
        let sched: MultiQueueScheduler<SumMessage> =
            MultiQueueScheduler::new(32, 2, SchedulerConfig::with_sub_queue_size(1).unwrap());
        sched.start();
        for vid in 0..32u32 {
            sched.schedule(VertexId(vid), SumMessage::new(1.0));
        }
        let tasks = drain(&sched);
        assert_eq!(tasks.len(), 32);
    }

    #[test]
    fn empty_scheduler_reports_empty() {
        let sched = scheduler(4, 2);
        sched.start();
        assert!(sched.get_next(0).is_none());
        assert!(sched.get_next(1).is_none());
    }

    #[test]
    fn get_specific_and_place() {
        let sched = scheduler(8, 1);
        sched.start();
        sched.place(VertexId(2), SumMessage::new(4.0));
        // placed but not enqueued: queues stay empty
        assert!(sched.get_next(0).is_none());
        let message = sched.get_specific(VertexId(2)).expect("placed message");
        assert_eq!(message.priority(), 4.0);
        assert!(sched.get_specific(VertexId(2)).is_none());
    }

    #[test]
    fn placed_messages_can_be_enqueued_later() {
        let sched = scheduler(8, 1);
        sched.start();
        sched.place(VertexId(3), SumMessage::new(2.0));
        sched.schedule_placed_from_execution_thread(0, VertexId(3));
        let tasks = drain(&sched);
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].0, VertexId(3));

        // without a placed message, re-enqueueing is a no-op
        sched.schedule_placed(VertexId(3));
        assert!(sched.get_next(0).is_none());
        sched.place(VertexId(4), SumMessage::new(1.0));
        sched.schedule_placed(VertexId(4));
        assert_eq!(drain(&sched).len(), 1);
    }

    #[test]
    fn stale_queue_entries_are_skipped() {
        let sched = scheduler(8, 1);
        sched.start();
        sched.schedule_from_execution_thread(0, VertexId(1), SumMessage::new(1.0));
        sched.schedule_from_execution_thread(0, VertexId(2), SumMessage::new(2.0));
        // drain vertex 1's message out of band; its queue entry goes stale
        assert!(sched.get_specific(VertexId(1)).is_some());
        let tasks = drain(&sched);
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].0, VertexId(2));
    }

    #[test]
    fn schedule_all_covers_every_vertex() {
        let sched = scheduler(10, 2);
        sched.start();
        sched.schedule_all(SumMessage::new(1.0), ScheduleOrder::Shuffle);
        let tasks = drain(&sched);
        assert_eq!(tasks.len(), 10);
    }
}
