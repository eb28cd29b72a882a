// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Single-slot delivery
//!
//! A slot accepts at most one value. Offering never blocks: once the slot is
//! filled, or once the receiving side is gone, further offers are dropped.

use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;

pub fn single_slot<T>() -> (SlotSender<T>, SlotReceiver<T>) {
    let (tx, rx) = oneshot::channel();
    (
        SlotSender {
            inner: Arc::new(Mutex::new(Some(tx))),
        },
        SlotReceiver { inner: rx },
    )
}

pub struct SlotSender<T> {
    inner: Arc<Mutex<Option<oneshot::Sender<T>>>>,
}

impl<T> Clone for SlotSender<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> SlotSender<T> {
    /// Deliver `value` if the slot is still empty and someone listens.
    /// Returns whether the value was delivered.
    pub fn offer(&self, value: T) -> bool {
        let sender = self.inner.lock().unwrap_or_else(|e| e.into_inner()).take();
        match sender {
            Some(tx) => tx.send(value).is_ok(),
            None => false,
        }
    }

    pub fn is_spent(&self) -> bool {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map_or(true, |tx| tx.is_closed())
    }
}

pub struct SlotReceiver<T> {
    inner: oneshot::Receiver<T>,
}

impl<T> SlotReceiver<T> {
    /// Wait for the value. `None` when every sender went away empty-handed.
    pub async fn recv(self) -> Option<T> {
        self.inner.await.ok()
    }

    /// Borrowing variant usable as a `tokio::select!` branch
    pub async fn recv_mut(&mut self) -> Option<T> {
        (&mut self.inner).await.ok()
    }
}
