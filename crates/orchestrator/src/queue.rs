//! Priority task queue
//!
//! Four FIFO lanes (urgent > high > medium > low) plus an in-flight index
//! and a bounded terminated index. Every task lives in exactly one of the
//! three places at any time.

use chrono::Utc;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use tracing::debug;
use workstation_common::{TaskId, TaskPriority, TaskRef, TaskStatus};

struct QueueInner {
    lanes: HashMap<TaskPriority, VecDeque<TaskRef>>,
    active: HashMap<TaskId, TaskRef>,
    completed: HashMap<TaskId, TaskRef>,
}

impl QueueInner {
    fn new() -> Self {
        let mut lanes = HashMap::new();
        for priority in TaskPriority::lanes() {
            lanes.insert(priority, VecDeque::new());
        }
        Self {
            lanes,
            active: HashMap::new(),
            completed: HashMap::new(),
        }
    }

    /// Move a terminated task into the bounded window, evicting the oldest
    /// entry by completion time when over capacity.
    fn retire(&mut self, task_id: TaskId, task: TaskRef, retention: usize) {
        self.completed.insert(task_id, task);
        while self.completed.len() > retention {
            let oldest = self
                .completed
                .iter()
                .min_by_key(|(_, t)| {
                    let task = t.read();
                    task.completed_at.unwrap_or(task.created_at)
                })
                .map(|(id, _)| id.clone());
            match oldest {
                Some(id) => {
                    self.completed.remove(&id);
                }
                None => break,
            }
        }
    }
}

/// Concurrency-safe priority task store
pub struct TaskQueue {
    inner: Mutex<QueueInner>,
    max_concurrent: usize,
    completed_retention: usize,
}

impl TaskQueue {
    pub fn new(max_concurrent: usize, completed_retention: usize) -> Self {
        Self {
            inner: Mutex::new(QueueInner::new()),
            max_concurrent,
            completed_retention,
        }
    }

    /// Append the task to the lane matching its priority and mark it
    /// `waiting`. Re-enqueue of an in-flight task (the retry path) removes
    /// it from the in-flight index first.
    pub fn enqueue(&self, task: &TaskRef) {
        let mut inner = self.inner.lock();
        let (task_id, priority) = {
            let mut t = task.write();
            t.status = TaskStatus::Waiting;
            (t.id.clone(), t.priority)
        };
        inner.active.remove(&task_id);
        inner
            .lanes
            .get_mut(&priority)
            .expect("lane exists for every priority")
            .push_back(task.clone());
        debug!(task_id = %task_id, priority = priority.as_str(), "task enqueued");
    }

    /// Pop the first task from the highest non-empty lane, or `None` when
    /// all lanes are empty or the in-flight ceiling is reached. The returned
    /// task is not mutated here; the caller owns its status transitions.
    pub fn dequeue(&self) -> Option<TaskRef> {
        let mut inner = self.inner.lock();
        if inner.active.len() >= self.max_concurrent {
            return None;
        }

        for priority in TaskPriority::lanes() {
            if let Some(task) = inner
                .lanes
                .get_mut(&priority)
                .and_then(VecDeque::pop_front)
            {
                let task_id = task.read().id.clone();
                inner.active.insert(task_id, task.clone());
                return Some(task);
            }
        }

        None
    }

    /// Remove from in-flight and retire. No error if absent (the task may
    /// have been cancelled while running).
    pub fn complete(&self, task_id: &str) {
        let mut inner = self.inner.lock();
        if let Some(task) = inner.active.remove(task_id) {
            inner.retire(task_id.to_string(), task, self.completed_retention);
        }
    }

    /// Mark an in-flight task failed and retire it
    pub fn fail(&self, task_id: &str, error: &str) {
        let mut inner = self.inner.lock();
        if let Some(task) = inner.active.remove(task_id) {
            {
                let mut t = task.write();
                t.status = TaskStatus::Failed;
                t.error = Some(error.to_string());
                t.completed_at = Some(Utc::now());
            }
            inner.retire(task_id.to_string(), task, self.completed_retention);
        }
    }

    /// Cancel a queued or in-flight task. Returns whether a cancellation
    /// occurred; already-terminated tasks return `false`.
    pub fn cancel(&self, task_id: &str) -> bool {
        let mut inner = self.inner.lock();

        if let Some(task) = inner.active.remove(task_id) {
            {
                let mut t = task.write();
                t.status = TaskStatus::Cancelled;
                t.completed_at = Some(Utc::now());
            }
            inner.retire(task_id.to_string(), task, self.completed_retention);
            return true;
        }

        for priority in TaskPriority::lanes() {
            let lane = inner
                .lanes
                .get_mut(&priority)
                .expect("lane exists for every priority");
            if let Some(pos) = lane.iter().position(|t| t.read().id == task_id) {
                let task = lane.remove(pos).expect("position is in bounds");
                {
                    let mut t = task.write();
                    t.status = TaskStatus::Cancelled;
                    t.completed_at = Some(Utc::now());
                }
                inner.retire(task_id.to_string(), task, self.completed_retention);
                return true;
            }
        }

        false
    }

    /// Look a task up in the in-flight index, then the terminated window,
    /// then the lanes.
    pub fn get(&self, task_id: &str) -> Option<TaskRef> {
        let inner = self.inner.lock();
        if let Some(task) = inner.active.get(task_id) {
            return Some(task.clone());
        }
        if let Some(task) = inner.completed.get(task_id) {
            return Some(task.clone());
        }
        inner
            .lanes
            .values()
            .flat_map(|lane| lane.iter())
            .find(|t| t.read().id == task_id)
            .cloned()
    }

    pub fn active_tasks(&self) -> Vec<TaskRef> {
        self.inner.lock().active.values().cloned().collect()
    }

    /// Recently terminated tasks, most recent first
    pub fn completed_tasks(&self, limit: usize) -> Vec<TaskRef> {
        let inner = self.inner.lock();
        let mut tasks: Vec<TaskRef> = inner.completed.values().cloned().collect();
        tasks.sort_by_key(|t| {
            let task = t.read();
            std::cmp::Reverse(task.completed_at.unwrap_or(task.created_at))
        });
        tasks.truncate(limit);
        tasks
    }

    pub fn stats(&self) -> QueueStats {
        let inner = self.inner.lock();
        let mut queued = HashMap::new();
        for priority in TaskPriority::lanes() {
            queued.insert(
                priority.as_str().to_string(),
                inner.lanes[&priority].len(),
            );
        }
        let total_queued = queued.values().sum();
        let active = inner.active.len();
        #[allow(clippy::cast_precision_loss)]
        let utilization = active as f64 / self.max_concurrent as f64;

        QueueStats {
            queued,
            total_queued,
            active_tasks: active,
            completed_tasks: inner.completed.len(),
            capacity_used: active,
            capacity_max: self.max_concurrent,
            utilization,
        }
    }
}

/// Queue statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueStats {
    pub queued: HashMap<String, usize>,
    pub total_queued: usize,
    pub active_tasks: usize,
    pub completed_tasks: usize,
    pub capacity_used: usize,
    pub capacity_max: usize,
    pub utilization: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use workstation_common::{Metadata, Task};

    fn task(priority: TaskPriority) -> TaskRef {
        Task::new("execute", "test task", priority, Metadata::new()).into_ref()
    }

    #[test]
    fn strict_priority_across_lanes() {
        let queue = TaskQueue::new(10, 100);
        let low = task(TaskPriority::Low);
        let urgent = task(TaskPriority::Urgent);
        let medium = task(TaskPriority::Medium);
        queue.enqueue(&low);
        queue.enqueue(&medium);
        queue.enqueue(&urgent);

        let ids: Vec<String> = std::iter::from_fn(|| queue.dequeue())
            .map(|t| t.read().id.clone())
            .collect();
        assert_eq!(
            ids,
            vec![
                urgent.read().id.clone(),
                medium.read().id.clone(),
                low.read().id.clone()
            ]
        );
    }

    #[test]
    fn fifo_within_a_lane() {
        let queue = TaskQueue::new(10, 100);
        let first = task(TaskPriority::High);
        let second = task(TaskPriority::High);
        queue.enqueue(&first);
        queue.enqueue(&second);

        assert_eq!(queue.dequeue().unwrap().read().id, first.read().id);
        assert_eq!(queue.dequeue().unwrap().read().id, second.read().id);
    }

    #[test]
    fn enqueue_marks_waiting() {
        let queue = TaskQueue::new(10, 100);
        let t = task(TaskPriority::Medium);
        queue.enqueue(&t);
        assert_eq!(t.read().status, TaskStatus::Waiting);
    }

    #[test]
    fn dequeue_respects_capacity_ceiling() {
        let queue = TaskQueue::new(2, 100);
        for _ in 0..3 {
            queue.enqueue(&task(TaskPriority::Medium));
        }

        let first = queue.dequeue().unwrap();
        let _second = queue.dequeue().unwrap();
        // At capacity: lanes are non-empty but nothing comes out
        assert!(queue.dequeue().is_none());

        // Completing one admits exactly one more
        {
            let mut t = first.write();
            t.status = TaskStatus::Completed;
            t.completed_at = Some(Utc::now());
        }
        queue.complete(&first.read().id);
        assert!(queue.dequeue().is_some());
        assert!(queue.dequeue().is_none());
    }

    #[test]
    fn reenqueue_of_in_flight_task_moves_it_back_to_lane() {
        let queue = TaskQueue::new(10, 100);
        let t = task(TaskPriority::High);
        queue.enqueue(&t);
        let dequeued = queue.dequeue().unwrap();
        assert_eq!(queue.stats().active_tasks, 1);

        // Retry path: the task leaves in-flight and is queued again
        queue.enqueue(&dequeued);
        let stats = queue.stats();
        assert_eq!(stats.active_tasks, 0);
        assert_eq!(stats.total_queued, 1);
        assert_eq!(queue.dequeue().unwrap().read().id, t.read().id);
    }

    #[test]
    fn cancel_queued_task_never_dequeues() {
        let queue = TaskQueue::new(10, 100);
        let t = task(TaskPriority::Urgent);
        queue.enqueue(&t);

        assert!(queue.cancel(&t.read().id));
        assert_eq!(t.read().status, TaskStatus::Cancelled);
        assert!(t.read().completed_at.is_some());
        assert!(queue.dequeue().is_none());
    }

    #[test]
    fn cancel_in_flight_task_is_bookkeeping_only() {
        let queue = TaskQueue::new(10, 100);
        let t = task(TaskPriority::Medium);
        queue.enqueue(&t);
        let dequeued = queue.dequeue().unwrap();

        assert!(queue.cancel(&dequeued.read().id));
        assert_eq!(dequeued.read().status, TaskStatus::Cancelled);
        assert_eq!(queue.stats().active_tasks, 0);

        // Terminated tasks cannot be cancelled again
        assert!(!queue.cancel(&dequeued.read().id));
    }

    #[test]
    fn fail_sets_error_and_retires() {
        let queue = TaskQueue::new(10, 100);
        let t = task(TaskPriority::Low);
        queue.enqueue(&t);
        queue.dequeue().unwrap();

        queue.fail(&t.read().id, "agent exploded");
        let stored = queue.get(&t.read().id).unwrap();
        let stored = stored.read();
        assert_eq!(stored.status, TaskStatus::Failed);
        assert_eq!(stored.error.as_deref(), Some("agent exploded"));
        assert!(stored.completed_at.is_some());
    }

    #[test]
    fn get_finds_task_in_any_index() {
        let queue = TaskQueue::new(1, 100);
        let queued = task(TaskPriority::Low);
        let running = task(TaskPriority::High);
        queue.enqueue(&running);
        queue.enqueue(&queued);
        queue.dequeue().unwrap();

        assert!(queue.get(&queued.read().id).is_some());
        assert!(queue.get(&running.read().id).is_some());
        queue.complete(&running.read().id);
        assert!(queue.get(&running.read().id).is_some());
        assert!(queue.get("missing").is_none());
    }

    #[test]
    fn terminated_window_evicts_oldest() {
        let queue = TaskQueue::new(10, 2);
        let mut ids = Vec::new();
        for i in 0..3 {
            let t = task(TaskPriority::Medium);
            ids.push(t.read().id.clone());
            queue.enqueue(&t);
            let dequeued = queue.dequeue().unwrap();
            {
                let mut inner = dequeued.write();
                inner.status = TaskStatus::Completed;
                inner.completed_at =
                    Some(Utc::now() + chrono::Duration::seconds(i));
            }
            queue.complete(&ids[i as usize]);
        }

        assert_eq!(queue.stats().completed_tasks, 2);
        assert!(queue.get(&ids[0]).is_none());
        assert!(queue.get(&ids[1]).is_some());
        assert!(queue.get(&ids[2]).is_some());
    }

    #[test]
    fn completed_tasks_ordered_most_recent_first() {
        let queue = TaskQueue::new(10, 10);
        let mut ids = Vec::new();
        for i in 0..3 {
            let t = task(TaskPriority::Medium);
            ids.push(t.read().id.clone());
            queue.enqueue(&t);
            let dequeued = queue.dequeue().unwrap();
            dequeued.write().completed_at =
                Some(Utc::now() + chrono::Duration::seconds(i));
            queue.complete(&ids[i as usize]);
        }

        let recent = queue.completed_tasks(2);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].read().id, ids[2]);
        assert_eq!(recent[1].read().id, ids[1]);
    }

    proptest! {
        /// Every task is in exactly one of lane / in-flight / terminated,
        /// whatever order operations arrive in.
        #[test]
        fn task_lives_in_exactly_one_index(ops in proptest::collection::vec(0u8..4, 1..50)) {
            let queue = TaskQueue::new(3, 100);
            let mut submitted = 0usize;

            for op in ops {
                match op {
                    0 => {
                        queue.enqueue(&task(TaskPriority::Medium));
                        submitted += 1;
                    }
                    1 => { let _ = queue.dequeue(); }
                    2 => {
                        if let Some(t) = queue.active_tasks().first() {
                            let id = t.read().id.clone();
                            queue.complete(&id);
                        }
                    }
                    _ => {
                        if let Some(t) = queue.active_tasks().first() {
                            let id = t.read().id.clone();
                            queue.cancel(&id);
                        }
                    }
                }

                let stats = queue.stats();
                prop_assert_eq!(
                    stats.total_queued + stats.active_tasks + stats.completed_tasks,
                    submitted
                );
                prop_assert!(stats.active_tasks <= 3);
            }
        }
    }
}
