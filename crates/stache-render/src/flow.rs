/*
 * flow.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Backpressure channel between a sink's consumer and the renderer.
 */

//! Pause/resume signalling for slow consumers.
//!
//! [`flow_control`] creates a connected pair. The consumer keeps the
//! [`FlowController`] and pauses it when it cannot accept more output. The
//! sink hands the [`Backpressure`] gate to the renderer, which waits on it
//! before every traversal step until the consumer resumes.

use tokio::sync::watch;

/// Create a connected controller/gate pair, initially running.
pub fn flow_control() -> (FlowController, Backpressure) {
    let (tx, rx) = watch::channel(false);
    (FlowController { tx }, Backpressure { rx })
}

/// Consumer side: pauses and resumes output production.
#[derive(Debug)]
pub struct FlowController {
    tx: watch::Sender<bool>,
}

impl FlowController {
    pub fn pause(&self) {
        self.tx.send_replace(true);
    }

    pub fn resume(&self) {
        self.tx.send_replace(false);
    }

    pub fn is_paused(&self) -> bool {
        *self.tx.borrow()
    }
}

/// Producer side: awaited by the renderer before each step.
#[derive(Debug, Clone)]
pub struct Backpressure {
    rx: watch::Receiver<bool>,
}

impl Backpressure {
    pub fn is_paused(&self) -> bool {
        *self.rx.borrow()
    }

    /// Wait until the consumer resumes.
    ///
    /// Returns immediately when not paused. If the controller is dropped
    /// while paused, nothing can resume the gate any more and it opens.
    pub async fn resumed(&self) {
        let mut rx = self.rx.clone();
        if rx.wait_for(|paused| !*paused).await.is_err() {
            tracing::debug!("Flow controller dropped while paused; resuming");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pause_and_resume_are_visible_to_gate() {
        let (controller, gate) = flow_control();
        assert!(!gate.is_paused());

        controller.pause();
        assert!(controller.is_paused());
        assert!(gate.is_paused());

        controller.resume();
        assert!(!gate.is_paused());
    }

    #[tokio::test]
    async fn test_resumed_waits_for_resume() {
        let (controller, gate) = flow_control();
        controller.pause();

        let waiter = tokio::spawn(async move {
            gate.resumed().await;
        });
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        controller.resume();
        waiter.await.unwrap();
    }

    #[tokio::test]
    async fn test_dropped_controller_opens_gate() {
        let (controller, gate) = flow_control();
        controller.pause();
        drop(controller);
        gate.resumed().await;
    }
}
