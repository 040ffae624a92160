//! Strategy lifecycle state machine
//!
//! A pure function from (status, event) to the next status and the side
//! effects the runtime must carry out, in order. No I/O happens here.
//!
//! ```text
//!  Stopped ──start──► Running ──pause──► Paused
//!     ▲                 │   │               │
//!     │                 │   └──fail──► Error│
//!     └──────stop───────┴──────stop─────┴───┘
//! ```
//!
//! Paused and Error return to Running on start.

use meridian_core::StrategyStatus;

use crate::error::RuntimeError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    Start,
    Stop,
    Pause,
    /// The polling task failed with this error text
    Fail(String),
}

/// Work the runtime performs to complete a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Cancel the polling task and wait for it to finish
    CancelTask,
    /// Save the strategy state with the new status
    Persist,
    /// Publish one state-change event
    Publish,
    /// Spawn the polling task
    SpawnTask,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub from: StrategyStatus,
    pub to: StrategyStatus,
    /// Error text to record; `None` clears any previous error
    pub error: Option<String>,
    pub effects: Vec<Effect>,
}

pub fn transition(
    status: StrategyStatus,
    event: &LifecycleEvent,
) -> Result<Transition, RuntimeError> {
    use Effect::*;
    use StrategyStatus::*;

    let (to, error, effects) = match (status, event) {
        (Running, LifecycleEvent::Start) => return Err(RuntimeError::AlreadyRunning),
        (Stopped | Paused | Error, LifecycleEvent::Start) => {
            (Running, None, vec![Persist, Publish, SpawnTask])
        }

        (Stopped, LifecycleEvent::Stop) => return Err(RuntimeError::NotRunning),
        (Running | Paused | Error, LifecycleEvent::Stop) => {
            (Stopped, None, vec![CancelTask, Persist, Publish])
        }

        (Running, LifecycleEvent::Pause) => (Paused, None, vec![CancelTask, Persist, Publish]),
        (Stopped | Paused | Error, LifecycleEvent::Pause) => {
            return Err(RuntimeError::CannotPause(status));
        }

        // The failing task ends itself, so there is nothing to cancel
        (Running, LifecycleEvent::Fail(reason)) => {
            (Error, Some(reason.clone()), vec![Persist, Publish])
        }
        (_, LifecycleEvent::Fail(_)) => return Err(RuntimeError::NotRunning),
    };

    Ok(Transition {
        from: status,
        to,
        error,
        effects,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use StrategyStatus::*;

    #[test]
    fn test_allowed_transitions() {
        let cases = [
            (Stopped, LifecycleEvent::Start, Running),
            (Running, LifecycleEvent::Stop, Stopped),
            (Running, LifecycleEvent::Pause, Paused),
            (Paused, LifecycleEvent::Start, Running),
            (Paused, LifecycleEvent::Stop, Stopped),
            (Error, LifecycleEvent::Start, Running),
            (Error, LifecycleEvent::Stop, Stopped),
            (Running, LifecycleEvent::Fail("boom".into()), Error),
        ];
        for (from, event, to) in cases {
            let t = transition(from, &event).unwrap();
            assert_eq!(t.to, to, "{:?} + {:?}", from, event);
            assert_eq!(
                t.effects.iter().filter(|e| **e == Effect::Publish).count(),
                1,
                "exactly one publish for {:?} + {:?}",
                from,
                event
            );
        }
    }

    #[test]
    fn test_rejected_transitions() {
        assert_eq!(
            transition(Running, &LifecycleEvent::Start),
            Err(RuntimeError::AlreadyRunning)
        );
        assert_eq!(
            transition(Stopped, &LifecycleEvent::Stop),
            Err(RuntimeError::NotRunning)
        );
        assert_eq!(
            transition(Stopped, &LifecycleEvent::Pause),
            Err(RuntimeError::CannotPause(Stopped))
        );
        assert_eq!(
            transition(Error, &LifecycleEvent::Pause),
            Err(RuntimeError::CannotPause(Error))
        );
        assert!(transition(Paused, &LifecycleEvent::Fail("late".into())).is_err());
    }

    #[test]
    fn test_effect_order() {
        let start = transition(Stopped, &LifecycleEvent::Start).unwrap();
        assert_eq!(start.effects, vec![Effect::Persist, Effect::Publish, Effect::SpawnTask]);

        let stop = transition(Running, &LifecycleEvent::Stop).unwrap();
        assert_eq!(stop.effects[0], Effect::CancelTask);

        let fail = transition(Running, &LifecycleEvent::Fail("boom".into())).unwrap();
        assert_eq!(fail.error.as_deref(), Some("boom"));
        assert!(!fail.effects.contains(&Effect::CancelTask));
    }
}
