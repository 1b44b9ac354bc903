//! Pedagogical `SoftwareAgent` wrapper (`spec.md` §9, `SPEC_FULL.md` §4.11).
//!
//! A design illustration only: expresses the scoring and retrain runners
//! as instances of the generic `Perception -> Policy -> Actuator`
//! quartet the educational side of the teacher crate uses
//! (`SequentialAgent`/`ParallelAgent`/`LoopAgent` in `core/workflow.rs`).
//! Adds no contract beyond §4.7-§4.8; the concrete runners do not depend
//! on this module.

use async_trait::async_trait;

/// Senses the environment and produces an observation of type `O`.
#[async_trait]
pub trait Perception: Send + Sync {
    type Observation: Send;
    async fn perceive(&self) -> Self::Observation;
}

/// Maps an observation to a decided action.
#[async_trait]
pub trait Policy: Send + Sync {
    type Observation: Send;
    type Action: Send;
    async fn decide(&self, observation: Self::Observation) -> Self::Action;
}

/// Carries out a decided action, producing an outcome of type `R`.
#[async_trait]
pub trait Actuator: Send + Sync {
    type Action: Send;
    type Outcome: Send;
    async fn act(&self, action: Self::Action) -> Self::Outcome;
}

/// One perceive -> decide -> act cycle, generic over the three roles.
///
/// The scoring runner's analogue: `Perception = ClaimNext`,
/// `Policy = the three-zone threshold decision`, `Actuator = persisting
/// the prediction and new status`. No runtime code in this crate actually
/// goes through this trait — the concrete runners call their services
/// directly — it exists solely to name the pattern the way the teacher's
/// educational layer does.
pub struct SoftwareAgent<P, Pol, A>
where
    P: Perception,
    Pol: Policy<Observation = P::Observation>,
    A: Actuator<Action = Pol::Action>,
{
    pub perception: P,
    pub policy: Pol,
    pub actuator: A,
}

impl<P, Pol, A> SoftwareAgent<P, Pol, A>
where
    P: Perception,
    Pol: Policy<Observation = P::Observation>,
    A: Actuator<Action = Pol::Action>,
{
    pub fn new(perception: P, policy: Pol, actuator: A) -> Self {
        SoftwareAgent {
            perception,
            policy,
            actuator,
        }
    }

    /// Runs exactly one perceive/decide/act cycle.
    pub async fn step(&self) -> A::Outcome {
        let observation = self.perception.perceive().await;
        let action = self.policy.decide(observation).await;
        self.actuator.act(action).await
    }
}
