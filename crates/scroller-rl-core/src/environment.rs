//! Collaborator traits connecting the agent to a game.
//!
//! The decision loop never talks to a screen or keyboard directly. It is
//! handed a [`Perception`] backend (capture + feature extraction), an
//! [`Actuator`] (key presses) and a [`SpecialScreenDetector`] (respawn or
//! cut-scene frames that must be waited out).

use std::time::Duration;

use async_trait::async_trait;

use crate::{Frame, HudRead, Result, Symbol, WorldState};

/// Screen capture and feature extraction
#[async_trait]
pub trait Perception: Send + Sync {
    /// Verify the backend can produce frames. Called once before the first step.
    async fn ensure_ready(&mut self) -> Result<()> {
        Ok(())
    }

    /// Grab the current frame
    async fn capture(&mut self) -> Result<Frame>;

    /// Structured world state; unobservable fields stay `None`
    fn extract_state(&self, frame: &Frame) -> WorldState;

    /// HUD text of the frame; empty when nothing is readable
    fn extract_hud(&self, frame: &Frame) -> HudRead;
}

/// Keyboard (or equivalent) output
#[async_trait]
pub trait Actuator: Send + Sync {
    /// Hold every symbol in `symbols` together for `duration`
    async fn act(&mut self, symbols: &[Symbol], duration: Duration) -> Result<()>;

    /// Release anything still held. Called on shutdown.
    async fn release_all(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Detects frames during which the agent must not act
pub trait SpecialScreenDetector: Send + Sync {
    /// True while the game shows a respawn, transition or similar screen
    fn is_special(&self, frame: &Frame) -> bool;
}

/// Detector that never reports a special screen
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverSpecial;

impl SpecialScreenDetector for NeverSpecial {
    fn is_special(&self, _frame: &Frame) -> bool {
        false
    }
}

#[async_trait]
impl<T: Perception + ?Sized> Perception for Box<T> {
    async fn ensure_ready(&mut self) -> Result<()> {
        (**self).ensure_ready().await
    }

    async fn capture(&mut self) -> Result<Frame> {
        (**self).capture().await
    }

    fn extract_state(&self, frame: &Frame) -> WorldState {
        (**self).extract_state(frame)
    }

    fn extract_hud(&self, frame: &Frame) -> HudRead {
        (**self).extract_hud(frame)
    }
}

#[async_trait]
impl<T: Actuator + ?Sized> Actuator for Box<T> {
    async fn act(&mut self, symbols: &[Symbol], duration: Duration) -> Result<()> {
        (**self).act(symbols, duration).await
    }

    async fn release_all(&mut self) -> Result<()> {
        (**self).release_all().await
    }
}

impl<T: SpecialScreenDetector + ?Sized> SpecialScreenDetector for Box<T> {
    fn is_special(&self, frame: &Frame) -> bool {
        (**self).is_special(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RLError;

    struct Offline;

    #[async_trait]
    impl Perception for Offline {
        async fn ensure_ready(&mut self) -> Result<()> {
            Err(RLError::EnvironmentUnavailable("no window".into()))
        }

        async fn capture(&mut self) -> Result<Frame> {
            Ok(Frame::blank(4, 4))
        }

        fn extract_state(&self, _frame: &Frame) -> WorldState {
            WorldState::empty()
        }

        fn extract_hud(&self, _frame: &Frame) -> HudRead {
            HudRead::default()
        }
    }

    #[derive(Default)]
    struct Recorder(Vec<Vec<Symbol>>);

    #[async_trait]
    impl Actuator for Recorder {
        async fn act(&mut self, symbols: &[Symbol], _duration: Duration) -> Result<()> {
            self.0.push(symbols.to_vec());
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_boxed_perception_forwards() {
        let mut perception: Box<dyn Perception> = Box::new(Offline);
        assert!(matches!(
            perception.ensure_ready().await,
            Err(RLError::EnvironmentUnavailable(_))
        ));
        let frame = perception.capture().await.unwrap();
        assert!(perception.extract_state(&frame).is_empty());
        assert!(!NeverSpecial.is_special(&frame));
    }

    #[tokio::test]
    async fn test_actuator_defaults() {
        let mut actuator = Recorder::default();
        actuator
            .act(&[Symbol::Right, Symbol::Shift], Duration::from_millis(1))
            .await
            .unwrap();
        actuator.release_all().await.unwrap();
        assert_eq!(actuator.0, vec![vec![Symbol::Right, Symbol::Shift]]);
    }
}
