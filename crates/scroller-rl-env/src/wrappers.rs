//! Perception wrappers

use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use scroller_rl_core::{Frame, HudRead, Perception, Result, WorldState};

#[derive(Debug, Default)]
struct SkipState {
    calls: u64,
    last: Option<WorldState>,
}

/// Runs full state extraction on one frame in every `skip + 1` and returns
/// the previous result for the others.
#[derive(Debug)]
pub struct FrameSkip<P> {
    /// Inner perception
    pub inner: P,
    /// Frames skipped between full extractions
    pub skip: u64,
    state: Mutex<SkipState>,
}

impl<P> FrameSkip<P> {
    /// Wrap `inner`, skipping `skip` frames between extractions
    pub fn new(inner: P, skip: u64) -> Self {
        Self {
            inner,
            skip,
            state: Mutex::new(SkipState::default()),
        }
    }
}

#[async_trait]
impl<P: Perception> Perception for FrameSkip<P> {
    async fn ensure_ready(&mut self) -> Result<()> {
        self.inner.ensure_ready().await
    }

    async fn capture(&mut self) -> Result<Frame> {
        self.inner.capture().await
    }

    fn extract_state(&self, frame: &Frame) -> WorldState {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let call = state.calls;
        state.calls += 1;
        if self.skip > 0 && call % (self.skip + 1) != 0 {
            if let Some(last) = &state.last {
                return last.clone();
            }
        }
        let fresh = self.inner.extract_state(frame);
        state.last = Some(fresh.clone());
        fresh
    }

    fn extract_hud(&self, frame: &Frame) -> HudRead {
        self.inner.extract_hud(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    /// Reports how many extractions it has performed as the coin count
    #[derive(Default)]
    struct Counting(AtomicU64);

    #[async_trait]
    impl Perception for Counting {
        async fn capture(&mut self) -> Result<Frame> {
            Ok(Frame::blank(2, 2))
        }

        fn extract_state(&self, _frame: &Frame) -> WorldState {
            let n = self.0.fetch_add(1, Ordering::SeqCst) + 1;
            WorldState {
                coins: Some(u32::try_from(n).unwrap()),
                ..WorldState::default()
            }
        }

        fn extract_hud(&self, _frame: &Frame) -> HudRead {
            HudRead::default()
        }
    }

    #[tokio::test]
    async fn test_skips_between_extractions() {
        let mut wrapped = FrameSkip::new(Counting::default(), 1);
        let frame = wrapped.capture().await.unwrap();
        let coins: Vec<Option<u32>> = (0..5)
            .map(|_| wrapped.extract_state(&frame).coins)
            .collect();
        assert_eq!(coins, vec![Some(1), Some(1), Some(2), Some(2), Some(3)]);
    }

    #[test]
    fn test_zero_skip_always_extracts() {
        let wrapped = FrameSkip::new(Counting::default(), 0);
        let frame = Frame::blank(2, 2);
        for expected in 1..=3 {
            assert_eq!(wrapped.extract_state(&frame).coins, Some(expected));
        }
    }
}
