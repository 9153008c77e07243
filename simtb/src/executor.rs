use futures::{
    future::{BoxFuture, FutureExt},
    task::{waker_ref, ArcWake, Context, Poll},
};
use futures_channel::oneshot;
use lazy_mut::lazy_mut;
use queues::{IsQueue, Queue};
use std::{
    future::Future,
    pin::Pin,
    sync::{Arc, Mutex},
};

use crate::value::Val;
use crate::TbResult;

lazy_mut! {
    static mut READY_QUEUE: Queue<Arc<Task>> = Queue::new();
}

pub fn schedule_task(task: Arc<Task>) {
    unsafe {
        READY_QUEUE.add(task).expect("Error queueing task.");
    }
}

fn next_task() -> Option<Arc<Task>> {
    if let Ok(task) = unsafe { READY_QUEUE.remove() } {
        Some(task)
    } else {
        None
    }
}

pub(crate) fn clear_ready_queue() {
    while next_task().is_some() {}
}

#[inline]
pub fn run_once() {
    loop {
        let next = next_task();
        if let Some(task) = next {
            process_task(task);
        } else {
            break;
        }
    }
}

#[inline]
fn process_task(task: Arc<Task>) {
    if *task.state.lock().unwrap() == TaskState::Cancelled {
        // do not execute if state is cancelled, will be dropped once all
        // references disappear
        return;
    }

    let mut fut_slot = task.future.lock().unwrap();
    if let Some(mut fut) = fut_slot.take() {
        let waker = waker_ref(&task);
        let context = &mut Context::from_waker(&waker);
        let result = match fut.as_mut().poll(context) {
            Poll::Pending => {
                *fut_slot = Some(fut);
                None
            }
            Poll::Ready(result) => Some(result),
        };
        if let Some(result) = result {
            let mut tx_slot = task.join_tx.lock().unwrap();
            let _ = tx_slot.take().unwrap().send(result);
        }
    } else {
        panic!("Scheduled completed or uninitialized task.");
    }
}

#[derive(PartialEq)]
enum TaskState {
    Pending,
    Cancelled,
}

pub struct Task {
    future: Mutex<Option<BoxFuture<'static, TbResult>>>,
    state: Mutex<TaskState>,
    join_tx: Mutex<Option<oneshot::Sender<TbResult>>>,
}

impl Task {
    pub fn fork(future: impl Future<Output = TbResult> + Send + 'static) -> JoinHandle {
        Task::spawn_from_future(future)
    }
    pub fn spawn_from_future(future: impl Future<Output = TbResult> + Send + 'static) -> JoinHandle {
        let (task, join_handle) = Task::new(future.boxed());
        schedule_task(task);
        join_handle
    }
    fn new(fut: BoxFuture<'static, TbResult>) -> (Arc<Self>, JoinHandle) {
        let (tx, mut join_handle) = new_join();
        let task = Self {
            future: Mutex::new(Some(fut)),
            state: Mutex::new(TaskState::Pending),
            join_tx: Mutex::new(Some(tx)),
        };
        let arc_task = Arc::new(task);

        join_handle = join_handle.set_task(arc_task.clone());
        (arc_task, join_handle)
    }
    pub fn cancel(&self) {
        // set state to Cancelled, executor will drop the Task without
        // execution on next wake
        *self.state.lock().unwrap() = TaskState::Cancelled;
    }
}

impl ArcWake for Task {
    fn wake_by_ref(arc_self: &Arc<Self>) {
        schedule_task(arc_self.clone());
    }
}

fn new_join() -> (oneshot::Sender<TbResult>, JoinHandle) {
    let (tx, rx) = oneshot::channel::<TbResult>();
    (
        tx,
        JoinHandle {
            join_rx: rx,
            awaited_task: None,
        },
    )
}

pub struct JoinHandle {
    awaited_task: Option<Arc<Task>>,
    join_rx: oneshot::Receiver<TbResult>,
}

impl JoinHandle {
    pub fn set_task(mut self, task: Arc<Task>) -> Self {
        self.awaited_task.replace(task);
        self
    }
    pub fn get_task(&self) -> Option<&Arc<Task>> {
        self.awaited_task.as_ref()
    }
    pub fn cancel(mut self) {
        // take awaited_task, cancel it and drop its reference
        let task = self.awaited_task.take().expect("Task already cancelled.");
        task.cancel();
    }
}

impl Future for JoinHandle {
    type Output = TbResult;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.join_rx.poll_unpin(cx) {
            // The sender is dropped without a value when the task is torn
            // down mid-flight.
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(_)) => Poll::Ready(Err(Val::String("task cancelled".to_string()))),
            Poll::Pending => Poll::Pending,
        }
    }
}
