//! Deferred, fallible computations.
//!
//! A [`Task`] wraps a computation that has not run yet. Forking it runs the
//! computation and invokes exactly one of two continuations: the rejection
//! continuation with the error, or the resolution continuation with the
//! value. Composition never runs anything; it only builds a bigger task.
//!
//! ```
//! use tidemark::Task;
//!
//! let task: Task<i32, String> = Task::resolve(20)
//!     .map(|n| n + 1)
//!     .bind(|n| Task::resolve(n * 2));
//!
//! assert_eq!(task.run(), Ok(42));
//! ```

use crossbeam_channel::RecvError;
use log::{error, info};
use std::fmt::Display;
use std::thread::{self, JoinHandle};

type Computation<T, E> = Box<dyn FnOnce() -> Result<T, E> + Send + 'static>;

/// What [`Task::all_with`] does with component tasks that are still running
/// when another component has already failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Join {
    /// Settle immediately with the first failure. Component tasks that are
    /// still running are left to finish on their own and their results are
    /// discarded.
    #[default]
    Detach,
    /// Wait for every started component to finish, then settle with the
    /// first failure that was observed.
    Wait,
}

/// A deferred computation producing `Ok(T)` or `Err(E)`.
///
/// The computation is consumed when the task is forked, so a task settles
/// at most once.
#[must_use = "a Task does nothing until it is forked or run"]
pub struct Task<T, E> {
    computation: Computation<T, E>,
}

impl<T, E> Task<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    /// Wrap a computation without running it.
    pub fn new<F>(computation: F) -> Self
    where
        F: FnOnce() -> Result<T, E> + Send + 'static,
    {
        Self {
            computation: Box::new(computation),
        }
    }

    /// A task that is already resolved with `value`.
    pub fn resolve(value: T) -> Self {
        Self::new(move || Ok(value))
    }

    /// A task that is already rejected with `error`.
    pub fn reject(error: E) -> Self {
        Self::new(move || Err(error))
    }

    /// Run the computation and hand the outcome to exactly one continuation.
    pub fn fork<R, Rej, Res>(self, reject: Rej, resolve: Res) -> R
    where
        Rej: FnOnce(E) -> R,
        Res: FnOnce(T) -> R,
    {
        match (self.computation)() {
            Ok(value) => resolve(value),
            Err(error) => reject(error),
        }
    }

    /// Run the computation and return its outcome.
    pub fn run(self) -> Result<T, E> {
        (self.computation)()
    }

    /// Transform the resolved value. Rejections pass through untouched.
    pub fn map<U, F>(self, f: F) -> Task<U, E>
    where
        U: Send + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        Task::new(move || self.run().map(f))
    }

    /// Transform the rejection. Resolved values pass through untouched.
    pub fn map_err<G, F>(self, f: F) -> Task<T, G>
    where
        G: Send + 'static,
        F: FnOnce(E) -> G + Send + 'static,
    {
        Task::new(move || self.run().map_err(f))
    }

    /// Chain a follow-up task that only starts once this one resolved.
    pub fn bind<U, F>(self, f: F) -> Task<U, E>
    where
        U: Send + 'static,
        F: FnOnce(T) -> Task<U, E> + Send + 'static,
    {
        Task::new(move || f(self.run()?).run())
    }

    /// Transform both outcomes at once.
    pub fn bimap<U, G, FE, FT>(self, on_error: FE, on_success: FT) -> Task<U, G>
    where
        U: Send + 'static,
        G: Send + 'static,
        FE: FnOnce(E) -> G + Send + 'static,
        FT: FnOnce(T) -> U + Send + 'static,
    {
        Task::new(move || match self.run() {
            Ok(value) => Ok(on_success(value)),
            Err(error) => Err(on_error(error)),
        })
    }

    /// Observe the resolved value without changing it.
    pub fn inspect<F>(self, f: F) -> Self
    where
        F: FnOnce(&T) + Send + 'static,
    {
        self.map(move |value| {
            f(&value);
            value
        })
    }

    /// Log the start and the end of a named step, and the error if it fails.
    pub fn logged(self, step: impl Into<String>) -> Self
    where
        E: Display,
    {
        let step = step.into();
        Task::new(move || {
            info!("{step}: started");
            match self.run() {
                Ok(value) => {
                    info!("{step}: finished");
                    Ok(value)
                }
                Err(e) => {
                    error!("{step}: {e}");
                    Err(e)
                }
            }
        })
    }

    /// Run `tasks` one after another, stopping at the first failure.
    ///
    /// Tasks after the failing one are never started.
    pub fn sequence(tasks: Vec<Task<T, E>>) -> Task<Vec<T>, E> {
        Task::new(move || tasks.into_iter().map(Task::run).collect())
    }

    /// Run `tasks` concurrently and collect their values in input order.
    ///
    /// Equivalent to [`Task::all_with`] with [`Join::Detach`].
    pub fn all(tasks: Vec<Task<T, E>>) -> Task<Vec<T>, E> {
        Self::all_with(tasks, Join::Detach)
    }

    /// Run `tasks` concurrently, one worker thread each, and collect their
    /// values in input order.
    ///
    /// The combined task settles exactly once: with every value if all
    /// components resolve, otherwise with the first rejection received.
    /// Nothing is cancelled; `join` decides whether the combined task waits
    /// for the remaining components before settling.
    ///
    /// # Panics
    ///
    /// A panic inside a component task is resumed on the forking thread.
    pub fn all_with(tasks: Vec<Task<T, E>>, join: Join) -> Task<Vec<T>, E> {
        Task::new(move || {
            let total = tasks.len();
            if total == 0 {
                return Ok(Vec::new());
            }

            let (tx, rx) = crossbeam_channel::unbounded();
            let handles: Vec<JoinHandle<()>> = tasks
                .into_iter()
                .enumerate()
                .map(|(index, task)| {
                    let tx = tx.clone();
                    thread::spawn(move || {
                        // The receiver is gone once the combined task settled early.
                        let _ = tx.send((index, task.run()));
                    })
                })
                .collect();
            drop(tx);

            let mut slots: Vec<Option<T>> = std::iter::repeat_with(|| None).take(total).collect();
            let mut remaining = total;
            while remaining > 0 {
                match rx.recv() {
                    Ok((index, Ok(value))) => {
                        slots[index] = Some(value);
                        remaining -= 1;
                    }
                    Ok((_, Err(e))) => {
                        if join == Join::Wait {
                            drop(rx);
                            join_all(handles);
                        }
                        return Err(e);
                    }
                    Err(RecvError) => {
                        // Every sender is gone before all slots filled: a worker panicked.
                        join_all(handles);
                        unreachable!("a component task exited without reporting");
                    }
                }
            }

            Ok(slots.into_iter().flatten().collect())
        })
    }
}

fn join_all(handles: Vec<JoinHandle<()>>) {
    for handle in handles {
        if let Err(payload) = handle.join() {
            std::panic::resume_unwind(payload);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    #[test]
    fn test_fork_invokes_exactly_one_continuation() {
        let calls = Arc::new(AtomicUsize::new(0));

        let c1 = Arc::clone(&calls);
        let c2 = Arc::clone(&calls);
        let out = Task::<i32, String>::resolve(7).fork(
            move |_| {
                c1.fetch_add(100, Ordering::SeqCst);
                "rejected"
            },
            move |_| {
                c2.fetch_add(1, Ordering::SeqCst);
                "resolved"
            },
        );

        assert_eq!(out, "resolved");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_map_skips_rejected_task() {
        let mapped = Arc::new(AtomicUsize::new(0));
        let m = Arc::clone(&mapped);
        let task = Task::<i32, &str>::reject("boom").map(move |n| {
            m.fetch_add(1, Ordering::SeqCst);
            n + 1
        });

        assert_eq!(task.run(), Err("boom"));
        assert_eq!(mapped.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_bind_short_circuits_on_failure() {
        let started = Arc::new(AtomicUsize::new(0));
        let s = Arc::clone(&started);
        let task = Task::<i32, &str>::reject("first")
            .bind(move |n| {
                s.fetch_add(1, Ordering::SeqCst);
                Task::resolve(n)
            });

        assert_eq!(task.run(), Err("first"));
        assert_eq!(started.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_bind_splices_inner_outcome() {
        let ok = Task::<i32, String>::resolve(2).bind(|n| Task::resolve(n * 10));
        assert_eq!(ok.run(), Ok(20));

        let err = Task::<i32, String>::resolve(2)
            .bind(|n| Task::<i32, String>::reject(format!("bad {n}")));
        assert_eq!(err.run(), Err("bad 2".to_string()));
    }

    #[test]
    fn test_bimap_transforms_both_sides() {
        let ok = Task::<i32, i32>::resolve(1).bimap(|e| e.to_string(), |v| v + 1);
        assert_eq!(ok.run(), Ok(2));

        let err = Task::<i32, i32>::reject(5).bimap(|e| format!("error {e}"), |v| v + 1);
        assert_eq!(err.run(), Err("error 5".to_string()));
    }

    #[test]
    fn test_task_is_lazy_until_run() {
        let ran = Arc::new(AtomicUsize::new(0));
        let r = Arc::clone(&ran);
        let task = Task::<(), String>::new(move || {
            r.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .map(|()| 1);

        assert_eq!(ran.load(Ordering::SeqCst), 0);
        assert_eq!(task.run(), Ok(1));
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_sequence_stops_at_first_failure() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let step = |n: i32, fail: bool| {
            let order = Arc::clone(&order);
            Task::<i32, String>::new(move || {
                order.lock().unwrap().push(n);
                if fail { Err(format!("step {n}")) } else { Ok(n) }
            })
        };

        let result = Task::sequence(vec![step(1, false), step(2, true), step(3, false)]).run();

        assert_eq!(result, Err("step 2".to_string()));
        assert_eq!(*order.lock().unwrap(), vec![1, 2]);
    }

    #[test]
    fn test_all_empty_resolves_to_empty_list() {
        let result = Task::<i32, String>::all(Vec::new()).run();
        assert_eq!(result, Ok(Vec::new()));
    }

    #[test]
    fn test_all_preserves_input_order() {
        let tasks = (0..5u64)
            .map(|n| {
                Task::<u64, String>::new(move || {
                    // Later inputs finish first.
                    thread::sleep(Duration::from_millis((5 - n) * 10));
                    Ok(n)
                })
            })
            .collect();

        assert_eq!(Task::all(tasks).run(), Ok(vec![0, 1, 2, 3, 4]));
    }

    #[test]
    fn test_all_settles_once_with_failure() {
        let settled = Arc::new(AtomicUsize::new(0));
        let (s1, s2) = (Arc::clone(&settled), Arc::clone(&settled));

        let tasks = vec![
            Task::<i32, String>::new(|| {
                thread::sleep(Duration::from_millis(30));
                Ok(1)
            }),
            Task::new(|| Err("middle failed".to_string())),
            Task::resolve(3),
        ];

        let outcome = Task::all(tasks).fork(
            move |e| {
                s1.fetch_add(1, Ordering::SeqCst);
                Err(e)
            },
            move |v| {
                s2.fetch_add(1, Ordering::SeqCst);
                Ok(v)
            },
        );

        assert_eq!(outcome, Err("middle failed".to_string()));
        assert_eq!(settled.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_all_detach_does_not_wait_for_slow_tasks() {
        let finished = Arc::new(AtomicUsize::new(0));
        let f = Arc::clone(&finished);
        let tasks = vec![
            Task::<(), String>::new(move || {
                thread::sleep(Duration::from_millis(200));
                f.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }),
            Task::reject("fast failure".to_string()),
        ];

        assert_eq!(Task::all(tasks).run(), Err("fast failure".to_string()));
        assert_eq!(finished.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_all_wait_lets_running_tasks_finish() {
        let finished = Arc::new(AtomicUsize::new(0));
        let f = Arc::clone(&finished);
        let tasks = vec![
            Task::<(), String>::new(move || {
                thread::sleep(Duration::from_millis(50));
                f.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }),
            Task::reject("fast failure".to_string()),
        ];

        assert_eq!(Task::all_with(tasks, Join::Wait).run(), Err("fast failure".to_string()));
        assert_eq!(finished.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_inspect_sees_value() {
        let seen = Arc::new(Mutex::new(None));
        let s = Arc::clone(&seen);
        let value = Task::<i32, String>::resolve(9)
            .inspect(move |v| *s.lock().unwrap() = Some(*v))
            .run();

        assert_eq!(value, Ok(9));
        assert_eq!(*seen.lock().unwrap(), Some(9));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_all_keeps_input_order(delays in prop::collection::vec(0u64..15, 0..6)) {
            let expected: Vec<usize> = (0..delays.len()).collect();
            let tasks = delays
                .into_iter()
                .enumerate()
                .map(|(i, ms)| {
                    Task::<usize, String>::new(move || {
                        thread::sleep(Duration::from_millis(ms));
                        Ok(i)
                    })
                })
                .collect();

            prop_assert_eq!(Task::all(tasks).run(), Ok(expected));
        }

        #[test]
        fn prop_all_settles_once_with_the_failure(delays in prop::collection::vec(0u64..15, 3)) {
            let settled = Arc::new(AtomicUsize::new(0));
            let (s1, s2) = (Arc::clone(&settled), Arc::clone(&settled));
            let tasks = delays
                .into_iter()
                .enumerate()
                .map(|(i, ms)| {
                    Task::<usize, String>::new(move || {
                        thread::sleep(Duration::from_millis(ms));
                        if i == 1 { Err("middle failed".to_string()) } else { Ok(i) }
                    })
                })
                .collect();

            let outcome = Task::all(tasks).fork(
                move |e| {
                    s1.fetch_add(1, Ordering::SeqCst);
                    Err(e)
                },
                move |v| {
                    s2.fetch_add(1, Ordering::SeqCst);
                    Ok(v)
                },
            );

            prop_assert_eq!(outcome, Err::<Vec<usize>, String>("middle failed".to_string()));
            prop_assert_eq!(settled.load(Ordering::SeqCst), 1);
        }
    }
}
