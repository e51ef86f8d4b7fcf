//! Lock-guarded session state and turn phases.

use serde::{Deserialize, Serialize};
use strum::Display;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::FailurePolicy;
use crate::transcript::{Transcript, TranscriptElement, TranscriptElementId};

/// Where the session is in the turn state machine.
///
/// `Idle → AwaitingModel → (Done | ExecutingFunctions → AwaitingModel …)`;
/// `Failed` is entered from any phase when a turn ends with an error. A stopped
/// or reset session goes back to `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TurnPhase {
    Idle,
    AwaitingModel,
    ExecutingFunctions,
    Done,
    Failed,
}

impl TurnPhase {
    /// Whether a turn is in flight.
    pub fn is_active(self) -> bool {
        matches!(self, TurnPhase::AwaitingModel | TurnPhase::ExecutingFunctions)
    }
}

/// The turn currently holding the session.
#[derive(Debug)]
pub(crate) struct ActiveTurn {
    pub id: Uuid,
    pub cancel: CancellationToken,
    /// System prompt inserted by this turn, if the transcript was empty.
    pub system_id: Option<TranscriptElementId>,
    pub user_id: TranscriptElementId,
    /// Everything appended after the user message, in order.
    pub appended: Vec<TranscriptElementId>,
}

impl ActiveTurn {
    /// Remove this turn's elements from `transcript` according to `policy`.
    /// Returns how many elements were removed.
    pub fn unwind(&self, transcript: &mut Transcript, policy: FailurePolicy) -> usize {
        let mut doomed: Vec<TranscriptElementId> = self.appended.clone();
        if policy == FailurePolicy::Rollback {
            doomed.push(self.user_id);
            doomed.extend(self.system_id);
        }
        doomed
            .into_iter()
            .filter_map(|id| transcript.remove_element(id))
            .count()
    }
}

/// Everything the session lock guards.
#[derive(Debug, Default)]
pub(crate) struct SessionState {
    pub transcript: Transcript,
    pub active: Option<ActiveTurn>,
}

impl SessionState {
    /// The active turn, if it is `turn_id` and has not been cancelled.
    pub fn live_turn(&mut self, turn_id: Uuid) -> Option<&mut ActiveTurn> {
        self.active
            .as_mut()
            .filter(|turn| turn.id == turn_id && !turn.cancel.is_cancelled())
    }
}

/// Handed from `begin_turn` to the loop.
#[derive(Debug)]
pub(crate) struct TurnStart {
    pub id: Uuid,
    pub cancel: CancellationToken,
    pub user: TranscriptElement,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Message;

    fn turn_over(transcript: &mut Transcript, with_system: bool) -> ActiveTurn {
        let system_id = with_system.then(|| transcript.push_message(Message::system("sys")));
        let user_id = transcript.push_message(Message::user("q"));
        let appended = vec![
            transcript.push_message(Message::assistant("calling")),
            transcript.push_message(Message::tool("f", "out")),
        ];
        ActiveTurn {
            id: Uuid::new_v4(),
            cancel: CancellationToken::new(),
            system_id,
            user_id,
            appended,
        }
    }

    #[test]
    fn keep_request_leaves_system_and_user() {
        let mut transcript = Transcript::new();
        let turn = turn_over(&mut transcript, true);
        assert_eq!(turn.unwind(&mut transcript, FailurePolicy::KeepRequest), 2);
        let texts: Vec<String> = transcript.messages().into_iter().map(|m| m.content).collect();
        assert_eq!(texts, vec!["sys", "q"]);
    }

    #[test]
    fn rollback_restores_prior_transcript() {
        let mut transcript = Transcript::new();
        transcript.push_message(Message::user("earlier"));
        let turn = turn_over(&mut transcript, false);
        assert_eq!(turn.unwind(&mut transcript, FailurePolicy::Rollback), 3);
        assert_eq!(transcript.len(), 1);
        assert_eq!(transcript[0].message.content, "earlier");
    }

    #[test]
    fn live_turn_ignores_cancelled_or_foreign_ids() {
        let mut state = SessionState::default();
        let turn = turn_over(&mut state.transcript, false);
        let id = turn.id;
        state.active = Some(turn);
        assert!(state.live_turn(Uuid::new_v4()).is_none());
        assert!(state.live_turn(id).is_some());
        state.active.as_ref().unwrap().cancel.cancel();
        assert!(state.live_turn(id).is_none());
    }

    #[test]
    fn phase_names() {
        assert_eq!(TurnPhase::ExecutingFunctions.to_string(), "executing_functions");
        assert!(TurnPhase::AwaitingModel.is_active());
        assert!(!TurnPhase::Done.is_active());
    }
}
