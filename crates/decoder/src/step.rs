//! Suspend/resume protocol.
//!
//! A decode runs until it needs a storage word that is neither in the state nor already supplied.
//! It then stops with [`Step::NeedWord`]; the caller fetches the word (or gives up on it) and
//! resumes. Dropping a [`Suspended`] decode cancels it.
//!
//! ```ignore
//! let mut step = decoder.decode(&ty, &pointer, &state).start();
//! while let Step::NeedWord(suspended) = step {
//!     let Request::Storage { slot } = *suspended.request();
//!     step = suspended.resume(ledger.get(&slot).copied());
//! }
//! ```

use crate::{error::DecoderError, read::WordChannel};
use alloy_primitives::B256;
use futures::{future::LocalBoxFuture, task::noop_waker_ref};
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    fmt,
    hash::BuildHasher,
    rc::Rc,
    task::{Context, Poll},
};

/// A word the decode is waiting for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Request {
    /// The storage word at `slot`.
    Storage { slot: B256 },
}

/// A decode that hasn't started yet.
#[must_use = "a decode does nothing unless started or run"]
pub struct Suspendable<'a, T> {
    future: LocalBoxFuture<'a, Result<T, DecoderError>>,
    channel: Rc<WordChannel>,
}

impl<'a, T> Suspendable<'a, T> {
    pub(crate) fn new(
        channel: Rc<WordChannel>,
        future: LocalBoxFuture<'a, Result<T, DecoderError>>,
    ) -> Self {
        Self { future, channel }
    }

    /// Runs until the first missing word or completion.
    pub fn start(self) -> Step<'a, T> {
        self.step()
    }

    /// Runs to completion, answering every request from `source`.
    pub fn run(self, source: &mut impl WordSource) -> Result<T, DecoderError> {
        let mut step = self.start();
        loop {
            match step {
                Step::Done(result) => return result,
                Step::NeedWord(suspended) => {
                    let Request::Storage { slot } = suspended.request;
                    let word = source.word(&slot);
                    step = suspended.resume(word);
                }
            }
        }
    }

    fn step(mut self) -> Step<'a, T> {
        let mut cx = Context::from_waker(noop_waker_ref());
        match self.future.as_mut().poll(&mut cx) {
            Poll::Ready(result) => Step::Done(result),
            Poll::Pending => match self.channel.take_request() {
                Some(slot) => {
                    debug!(%slot, "decode suspended on storage word");
                    Step::NeedWord(Suspended { request: Request::Storage { slot }, inner: self })
                }
                None => Step::Done(Err(DecoderError::Internal(
                    "decode stalled without requesting a word".to_string(),
                ))),
            },
        }
    }
}

impl<T> fmt::Debug for Suspendable<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Suspendable").finish_non_exhaustive()
    }
}

/// The state of a decode after running as far as it can.
#[derive(Debug, derive_more::IsVariant)]
#[must_use]
pub enum Step<'a, T> {
    /// Waiting for a word.
    NeedWord(Suspended<'a, T>),
    /// Finished.
    Done(Result<T, DecoderError>),
}

impl<T> Step<'_, T> {
    /// Returns the result of a finished decode.
    pub fn into_done(self) -> Option<Result<T, DecoderError>> {
        match self {
            Self::Done(result) => Some(result),
            Self::NeedWord(_) => None,
        }
    }
}

/// A decode waiting for the word named by its [`Request`].
pub struct Suspended<'a, T> {
    inner: Suspendable<'a, T>,
    request: Request,
}

impl<'a, T> Suspended<'a, T> {
    pub fn request(&self) -> &Request {
        &self.request
    }

    /// Supplies the requested word and runs on.
    ///
    /// `None` marks the word as unavailable; it then reads as zero, like storage that was never
    /// written. Supplied words are kept for the rest of this decode, so a slot is requested at most
    /// once.
    pub fn resume(self, word: Option<B256>) -> Step<'a, T> {
        let Request::Storage { slot } = self.request;
        let word = word.unwrap_or_else(|| {
            warn!(%slot, "storage word unavailable, reading it as zero");
            B256::ZERO
        });
        self.inner.channel.supply(slot, word);
        self.inner.step()
    }
}

impl<T> fmt::Debug for Suspended<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Suspended").field("request", &self.request).finish_non_exhaustive()
    }
}

/// Answers storage requests.
pub trait WordSource {
    /// Returns the word at `slot`, or `None` if it is unavailable.
    fn word(&mut self, slot: &B256) -> Option<B256>;
}

impl<F: FnMut(&B256) -> Option<B256>> WordSource for F {
    fn word(&mut self, slot: &B256) -> Option<B256> {
        self(slot)
    }
}

impl<S: BuildHasher> WordSource for HashMap<B256, B256, S> {
    fn word(&mut self, slot: &B256) -> Option<B256> {
        self.get(slot).copied()
    }
}

/// A source that has no words; every missing word reads as zero.
#[derive(Clone, Copy, Debug, Default)]
pub struct Unavailable;

impl WordSource for Unavailable {
    fn word(&mut self, _slot: &B256) -> Option<B256> {
        None
    }
}
