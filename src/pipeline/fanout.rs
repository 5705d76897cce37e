//! Stage fan-out.
//!
//! [`Splitter`] hands every upstream record to each of its branches as an
//! independent deep copy. Branches pull at their own pace; records a branch
//! hasn't consumed yet wait in that branch's buffer.
//!
//! [`Shared`] lets several consumers pull from one stage. Consumers see an
//! interleaving of the stage's records, not copies.

use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::pipeline::id::ModuleId;
use crate::pipeline::record::Record;
use crate::pipeline::stage::{AsyncStage, Stage};
use futures_util::{Stream, StreamExt};
use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll, Waker};

fn poisoned(module_id: &ModuleId) -> PipelineError {
    PipelineError::Module(format!("fan-out state of {module_id} poisoned"))
}

struct SplitState<S> {
    module_id: ModuleId,
    upstream: S,
    /// Pending records per branch; `None` once the branch is gone.
    buffers: Vec<Option<VecDeque<Record>>>,
    wakers: Vec<Option<Waker>>,
    attached: usize,
    exhausted: bool,
}

impl<S> SplitState<S> {
    fn pop(&mut self, branch: usize) -> Option<Record> {
        self.buffers[branch].as_mut()?.pop_front()
    }

    /// Queue a copy of `record` for every live branch except `from`.
    fn distribute(&mut self, from: usize, record: &Record) {
        for (i, buffer) in self.buffers.iter_mut().enumerate() {
            if i == from {
                continue;
            }
            if let Some(buffer) = buffer {
                buffer.push_back(record.clone());
            }
        }
    }

    fn wake_others(&mut self, from: usize) {
        for (i, waker) in self.wakers.iter_mut().enumerate() {
            if i != from {
                if let Some(waker) = waker.take() {
                    waker.wake();
                }
            }
        }
    }
}

/// Fan-out of one upstream stage into a fixed number of branches.
pub struct Splitter<S> {
    state: Arc<Mutex<SplitState<S>>>,
    splits: usize,
}

impl<S> Splitter<S> {
    pub fn new(module_id: ModuleId, upstream: S, splits: usize) -> Self {
        let state = SplitState {
            module_id,
            upstream,
            buffers: (0..splits).map(|_| Some(VecDeque::new())).collect(),
            wakers: (0..splits).map(|_| None).collect(),
            attached: 0,
            exhausted: false,
        };
        Self {
            state: Arc::new(Mutex::new(state)),
            splits,
        }
    }

    pub fn splits(&self) -> usize {
        self.splits
    }

    fn lock(&self) -> PipelineResult<MutexGuard<'_, SplitState<S>>> {
        self.state.lock().map_err(|e| poisoned(&e.get_ref().module_id))
    }

    /// Attach the next branch.
    ///
    /// Fails with `SplitOveractivation` once all `splits` branches are taken.
    pub fn attach(&self) -> PipelineResult<Branch<S>> {
        let mut state = self.lock()?;
        if state.attached >= self.splits {
            return Err(PipelineError::SplitOveractivation {
                module_id: state.module_id.clone(),
                splits: self.splits,
            });
        }
        let index = state.attached;
        state.attached += 1;
        Ok(Branch {
            state: Arc::clone(&self.state),
            index,
        })
    }

    /// Stop buffering for branches nobody attached. Returns how many there were.
    pub fn seal(&self) -> PipelineResult<usize> {
        let mut state = self.lock()?;
        let attached = state.attached;
        for buffer in state.buffers.iter_mut().skip(attached) {
            *buffer = None;
        }
        Ok(self.splits - attached)
    }
}

/// One branch of a [`Splitter`].
pub struct Branch<S> {
    state: Arc<Mutex<SplitState<S>>>,
    index: usize,
}

impl<S> Drop for Branch<S> {
    fn drop(&mut self) {
        if let Ok(mut state) = self.state.lock() {
            state.buffers[self.index] = None;
            state.wakers[self.index] = None;
            state.wake_others(self.index);
        }
    }
}

impl Iterator for Branch<Stage> {
    type Item = PipelineResult<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut state = match self.state.lock() {
            Ok(state) => state,
            Err(e) => return Some(Err(poisoned(&e.get_ref().module_id))),
        };

        if let Some(record) = state.pop(self.index) {
            return Some(Ok(record));
        }
        if state.exhausted {
            return None;
        }

        match state.upstream.next() {
            Some(Ok(record)) => {
                state.distribute(self.index, &record);
                Some(Ok(record))
            }
            Some(Err(e)) => Some(Err(e)),
            None => {
                state.exhausted = true;
                None
            }
        }
    }
}

impl Stream for Branch<AsyncStage> {
    type Item = PipelineResult<Record>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let index = self.index;
        let mut state = match self.state.lock() {
            Ok(state) => state,
            Err(e) => return Poll::Ready(Some(Err(poisoned(&e.get_ref().module_id)))),
        };

        if let Some(record) = state.pop(index) {
            return Poll::Ready(Some(Ok(record)));
        }
        if state.exhausted {
            return Poll::Ready(None);
        }

        match state.upstream.poll_next_unpin(cx) {
            Poll::Ready(Some(Ok(record))) => {
                state.distribute(index, &record);
                state.wake_others(index);
                Poll::Ready(Some(Ok(record)))
            }
            Poll::Ready(Some(Err(e))) => Poll::Ready(Some(Err(e))),
            Poll::Ready(None) => {
                state.exhausted = true;
                state.wake_others(index);
                Poll::Ready(None)
            }
            Poll::Pending => {
                state.wakers[index] = Some(cx.waker().clone());
                Poll::Pending
            }
        }
    }
}

struct SharedState<S> {
    stage: S,
    /// Async consumers waiting for the stage to become ready.
    waiters: Vec<Waker>,
    /// The stage ended; it is never polled again.
    exhausted: bool,
}

/// Handle onto a stage pulled by several consumers.
pub struct Shared<S> {
    module_id: ModuleId,
    inner: Arc<Mutex<SharedState<S>>>,
}

impl<S> Shared<S> {
    pub fn new(module_id: ModuleId, stage: S) -> Self {
        Self {
            module_id,
            inner: Arc::new(Mutex::new(SharedState {
                stage,
                waiters: Vec::new(),
                exhausted: false,
            })),
        }
    }
}

impl<S> Clone for Shared<S> {
    fn clone(&self) -> Self {
        Self {
            module_id: self.module_id.clone(),
            inner: Arc::clone(&self.inner),
        }
    }
}

impl Iterator for Shared<Stage> {
    type Item = PipelineResult<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut state = match self.inner.lock() {
            Ok(state) => state,
            Err(_) => return Some(Err(poisoned(&self.module_id))),
        };
        if state.exhausted {
            return None;
        }
        let next = state.stage.next();
        state.exhausted = next.is_none();
        next
    }
}

impl Stream for Shared<AsyncStage> {
    type Item = PipelineResult<Record>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut state = match self.inner.lock() {
            Ok(state) => state,
            Err(_) => return Poll::Ready(Some(Err(poisoned(&self.module_id)))),
        };
        if state.exhausted {
            return Poll::Ready(None);
        }

        // The stage only remembers the latest poller; everyone else waits here
        match state.stage.poll_next_unpin(cx) {
            Poll::Pending => {
                if !state.waiters.iter().any(|w| w.will_wake(cx.waker())) {
                    state.waiters.push(cx.waker().clone());
                }
                Poll::Pending
            }
            Poll::Ready(next) => {
                state.exhausted = next.is_none();
                for waker in state.waiters.drain(..) {
                    waker.wake();
                }
                Poll::Ready(next)
            }
        }
    }
}
