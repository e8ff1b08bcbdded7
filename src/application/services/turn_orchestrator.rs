//! Turn Orchestrator - Sequences rounds of a session
//!
//! A round runs GM narration, then one declared action per living character
//! in turn-queue order, then GM resolution. The orchestrator owns the
//! [`GameState`] and is its only writer.
//!
//! Every model call is split into two halves so callers can drive it
//! themselves: [`TurnOrchestrator::prepare_step`] hands out a ticket stamped
//! with the state version, and [`TurnOrchestrator::complete_step`] commits the
//! result only if the state has not moved on since. [`TurnOrchestrator::advance`]
//! does both around a call to the configured [`LlmPort`].
//!
//! The machine blocks (returns without dispatching) when a pause is
//! requested, when a human-controlled character is next in the queue, after
//! a failed call and once the game is over.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::application::ports::outbound::{
    ChatMessage, LlmError, LlmPort, LlmRequest, PartialTextSink,
};
use crate::application::services::llm::prompt_builder::{
    build_character_action_messages, build_gm_narration_messages, build_gm_resolution_messages,
    DEFAULT_GM_RULES,
};
use crate::domain::entities::{DeclaredAction, GamePhase, GameState};
use crate::domain::events::{GameEvent, GM_SPEAKER};
use crate::domain::services::{apply_effects, parse_narrative};
use crate::domain::value_objects::{
    classify_action, difficulty_for, ActionType, CharacterId, DiceRoll,
};

/// Model parameters for GM calls
#[derive(Debug, Clone, PartialEq)]
pub struct GmSettings {
    /// Rules text opening every GM system prompt
    pub rules: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for GmSettings {
    fn default() -> Self {
        Self {
            rules: DEFAULT_GM_RULES.to_string(),
            model: "gpt-4o-mini".to_string(),
            temperature: 0.9,
            max_tokens: 2048,
        }
    }
}

impl GmSettings {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Self::default()
        }
    }

    pub fn with_rules(mut self, rules: impl Into<String>) -> Self {
        self.rules = rules.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    fn request(&self, messages: Vec<ChatMessage>) -> LlmRequest {
        LlmRequest::new(messages, self.model.clone())
            .with_temperature(self.temperature)
            .with_max_tokens(self.max_tokens)
    }
}

/// Where the session stands from the caller's point of view
#[derive(Debug, Clone, PartialEq)]
pub enum SessionStatus {
    /// The next step can be dispatched
    Ready,
    /// The human-controlled character is next; see `submit_human_action`
    AwaitingHuman { character_id: CharacterId },
    /// Stopped before a dispatch because a pause was requested
    Paused,
    /// The last model call failed; nothing was committed
    Failed { message: String },
    /// At most one character is left standing
    GameOver { survivor: Option<String> },
}

impl SessionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::GameOver { .. })
    }
}

/// Shared pause flag
///
/// Clones share the flag, so a handle can be moved into a signal handler or
/// another task. A pause never cancels a call already in flight; it is
/// honored before the next narration or AI character call.
#[derive(Debug, Clone, Default)]
pub struct PauseHandle(Arc<AtomicBool>);

impl PauseHandle {
    pub fn request_pause(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn clear(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// The model call a step needs
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Narration,
    CharacterAction { character_id: CharacterId },
    Resolution,
}

/// A step ready to be sent to the model
///
/// `version` is the state version the request was built from.
#[derive(Debug, Clone)]
pub struct PreparedStep {
    pub step: Step,
    /// Who is generating, for display
    pub speaker: String,
    pub request: LlmRequest,
    pub version: u64,
}

/// Text of the call currently in flight
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveText {
    pub speaker: String,
    pub text: String,
}

/// What `complete_step` did with a result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Committed,
    Failed,
    /// The state moved on after the ticket was issued; nothing changed
    Stale,
}

/// Caller misuse of the orchestrator
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OrchestratorError {
    #[error("No human action is awaited")]
    NotAwaitingHuman,
    #[error("Action description is empty")]
    EmptyAction,
    #[error("Nothing to retry")]
    NothingToRetry,
    #[error("Character not found: {0}")]
    UnknownCharacter(String),
}

pub struct TurnOrchestrator<L: LlmPort> {
    llm: L,
    gm: GmSettings,
    initial: GameState,
    state: GameState,
    status: SessionStatus,
    pause: PauseHandle,
    rng: StdRng,
    live: Arc<watch::Sender<Option<LiveText>>>,
}

impl<L: LlmPort> TurnOrchestrator<L> {
    pub fn new(llm: L, state: GameState, gm: GmSettings) -> Self {
        let (live, _) = watch::channel(None);
        Self {
            llm,
            gm,
            initial: state.clone(),
            state,
            status: SessionStatus::Ready,
            pause: PauseHandle::default(),
            rng: StdRng::from_entropy(),
            live: Arc::new(live),
        }
    }

    /// Use a fixed dice seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn status(&self) -> &SessionStatus {
        &self.status
    }

    pub fn gm_settings(&self) -> &GmSettings {
        &self.gm
    }

    pub fn pause_handle(&self) -> PauseHandle {
        self.pause.clone()
    }

    /// Receiver of the in-flight call's accumulated text; `None` between calls
    pub fn subscribe_live(&self) -> watch::Receiver<Option<LiveText>> {
        self.live.subscribe()
    }

    /// Clear the pause flag; a paused session becomes ready again
    pub fn resume(&mut self) {
        self.pause.clear();
        if self.status == SessionStatus::Paused {
            info!(round = self.state.round, phase = %self.state.phase, "Session resumed");
            self.status = SessionStatus::Ready;
        }
    }

    /// Restore the state the session started with
    pub fn reset(&mut self) {
        let version = self.state.version + 1;
        self.state = self.initial.clone();
        self.state.version = version;
        self.status = SessionStatus::Ready;
        self.pause.clear();
        self.live.send_replace(None);
        info!("Session reset");
    }

    /// Run one step: prepare, call the model, complete
    ///
    /// Returns false when the session is blocked and nothing was dispatched.
    pub async fn advance(&mut self) -> bool {
        let Some(ticket) = self.prepare_step() else {
            return false;
        };

        self.live.send_replace(Some(LiveText {
            speaker: ticket.speaker.clone(),
            text: String::new(),
        }));
        let result = self
            .llm
            .generate(ticket.request.clone(), Some(self.live_sink(ticket.speaker.clone())))
            .await;
        self.live.send_replace(None);

        self.complete_step(ticket, result);
        true
    }

    /// Advance until the session needs outside input or is over
    pub async fn run_until_blocked(&mut self) -> &SessionStatus {
        while self.advance().await {}
        &self.status
    }

    /// Re-issue the step that failed
    ///
    /// A failure commits nothing, so the step is rebuilt from the same state.
    /// A pause requested while the session sat failed takes precedence: the
    /// session becomes `Paused` and `Ok(false)` is returned without a call.
    /// `Ok(true)` means the step was dispatched again.
    pub async fn retry(&mut self) -> Result<bool, OrchestratorError> {
        if !matches!(self.status, SessionStatus::Failed { .. }) {
            return Err(OrchestratorError::NothingToRetry);
        }
        info!(round = self.state.round, phase = %self.state.phase, "Retrying failed step");
        self.status = SessionStatus::Ready;
        Ok(self.advance().await)
    }

    /// Work out the next model call, or block
    ///
    /// Bookkeeping that needs no model call (leaving an empty queue, skipping
    /// characters eliminated since the queue was built) is committed here.
    pub fn prepare_step(&mut self) -> Option<PreparedStep> {
        if self.status != SessionStatus::Ready {
            return None;
        }

        loop {
            match self.state.phase {
                GamePhase::GmNarration => {
                    if self.pause_requested() {
                        return None;
                    }
                    let messages = build_gm_narration_messages(&self.gm.rules, &self.state);
                    return Some(self.ticket(Step::Narration, GM_SPEAKER, self.gm.request(messages)));
                }
                GamePhase::PlayerActions => {
                    let Some(id) = self.state.next_in_queue().cloned() else {
                        debug!(round = self.state.round, "All actions declared");
                        self.state.phase = GamePhase::Resolution;
                        self.state.bump_version();
                        continue;
                    };

                    let Some(character) = self.state.character(&id).filter(|c| c.is_alive()).cloned() else {
                        debug!(character_id = %id, "Skipping character without a turn");
                        self.state.turn_queue.pop_front();
                        self.state.bump_version();
                        continue;
                    };

                    if character.is_human {
                        info!(character_id = %id, "Waiting for human action");
                        self.status = SessionStatus::AwaitingHuman { character_id: id };
                        return None;
                    }

                    if self.pause_requested() {
                        return None;
                    }

                    let request = LlmRequest::new(
                        build_character_action_messages(&character, &self.state),
                        character.generation.model.clone(),
                    )
                    .with_temperature(character.generation.temperature)
                    .with_max_tokens(character.generation.max_tokens);
                    return Some(self.ticket(Step::CharacterAction { character_id: id }, character.name, request));
                }
                GamePhase::Resolution => {
                    let messages = build_gm_resolution_messages(&self.gm.rules, &self.state);
                    return Some(self.ticket(Step::Resolution, GM_SPEAKER, self.gm.request(messages)));
                }
            }
        }
    }

    /// Commit a model result for a ticket from `prepare_step`
    pub fn complete_step(
        &mut self,
        ticket: PreparedStep,
        result: Result<String, LlmError>,
    ) -> Completion {
        if ticket.version != self.state.version || self.status.is_terminal() {
            debug!(
                ticket_version = ticket.version,
                state_version = self.state.version,
                "Discarding stale completion"
            );
            return Completion::Stale;
        }

        let text = match result {
            Ok(text) => text,
            Err(e) => {
                warn!(speaker = %ticket.speaker, error = %e, "Model call failed");
                self.status = SessionStatus::Failed {
                    message: e.to_string(),
                };
                return Completion::Failed;
            }
        };

        match ticket.step {
            Step::Narration => self.commit_narration(text),
            Step::CharacterAction { character_id } => {
                if let Err(e) = self.commit_ai_action(&character_id, text) {
                    warn!(error = %e, "Could not record action");
                    return Completion::Stale;
                }
            }
            Step::Resolution => self.commit_resolution(text),
        }
        self.state.bump_version();
        Completion::Committed
    }

    /// Record the human-controlled character's action for this round
    ///
    /// The action type picks the stat and difficulty directly; the text is
    /// not classified.
    pub fn submit_human_action(
        &mut self,
        action_type: ActionType,
        description: &str,
    ) -> Result<DiceRoll, OrchestratorError> {
        let SessionStatus::AwaitingHuman { character_id } = &self.status else {
            return Err(OrchestratorError::NotAwaitingHuman);
        };
        let character_id = character_id.clone();

        let description = description.trim();
        if description.is_empty() {
            return Err(OrchestratorError::EmptyAction);
        }

        let character = self
            .state
            .character(&character_id)
            .ok_or_else(|| OrchestratorError::UnknownCharacter(character_id.to_string()))?;
        let roll = DiceRoll::roll(
            &mut self.rng,
            character.modifier(action_type.stat()),
            Some(action_type.difficulty()),
        );

        info!(character_id = %character_id, action_type = %action_type, roll = %roll, "Human action submitted");
        self.record_action(&character_id, description.to_string(), roll.clone())?;
        self.state.bump_version();
        self.status = SessionStatus::Ready;
        Ok(roll)
    }

    fn pause_requested(&mut self) -> bool {
        if self.pause.is_requested() {
            info!(round = self.state.round, phase = %self.state.phase, "Session paused");
            self.status = SessionStatus::Paused;
            return true;
        }
        false
    }

    fn ticket(&self, step: Step, speaker: impl Into<String>, request: LlmRequest) -> PreparedStep {
        debug!(
            ?step,
            model = %request.model,
            prompt_chars = request.messages.iter().map(|m| m.content.chars().count()).sum::<usize>(),
            "Prepared step"
        );
        PreparedStep {
            step,
            speaker: speaker.into(),
            request,
            version: self.state.version,
        }
    }

    fn live_sink(&self, speaker: String) -> PartialTextSink {
        let live = self.live.clone();
        Arc::new(move |text: &str| {
            live.send_replace(Some(LiveText {
                speaker: speaker.clone(),
                text: text.to_string(),
            }));
        })
    }

    fn commit_narration(&mut self, text: String) {
        self.state.push_event(GameEvent::narration(text));
        self.state.phase = GamePhase::PlayerActions;
        info!(round = self.state.round, queue = self.state.turn_queue.len(), "Narration committed");
    }

    fn commit_ai_action(&mut self, character_id: &CharacterId, text: String) -> Result<(), OrchestratorError> {
        let character = self
            .state
            .character(character_id)
            .ok_or_else(|| OrchestratorError::UnknownCharacter(character_id.to_string()))?;

        let action = text.trim().to_string();
        let stat = classify_action(&action);
        let roll = DiceRoll::roll(&mut self.rng, character.modifier(stat), Some(difficulty_for(stat)));
        debug!(character_id = %character_id, %stat, roll = %roll, "Action classified");

        self.record_action(character_id, action, roll)
    }

    fn record_action(
        &mut self,
        character_id: &CharacterId,
        action: String,
        roll: DiceRoll,
    ) -> Result<(), OrchestratorError> {
        let name = self
            .state
            .character(character_id)
            .map(|c| c.name.clone())
            .ok_or_else(|| OrchestratorError::UnknownCharacter(character_id.to_string()))?;

        self.state.push_event(GameEvent::action(name.clone(), action.clone()));
        self.state.push_event(GameEvent::roll(name.clone(), roll.clone()));
        self.state.declared_actions.push(DeclaredAction {
            character_id: character_id.clone(),
            character_name: name,
            action,
            roll,
        });
        if self.state.next_in_queue() == Some(character_id) {
            self.state.turn_queue.pop_front();
        }
        Ok(())
    }

    fn commit_resolution(&mut self, text: String) {
        let effects = parse_narrative(&text);
        debug!(
            hp_changes = effects.hp_changes.len(),
            condition_changes = effects.condition_changes.len(),
            "Parsed resolution annotations"
        );
        let applied = apply_effects(&mut self.state, &effects);

        self.state.push_event(GameEvent::result(text));
        for id in &applied.newly_eliminated {
            if let Some(name) = self.state.character(id).map(|c| c.name.clone()) {
                info!(character_id = %id, "Character eliminated");
                self.state.push_event(GameEvent::system(format!("{} 已被淘汰！", name)));
            }
        }

        self.state.round += 1;
        self.state.rebuild_turn_queue();
        self.state.declared_actions.clear();
        self.state.phase = GamePhase::GmNarration;

        if self.state.is_over() {
            let survivor = self.state.alive_characters().next().map(|c| c.name.clone());
            let message = match &survivor {
                Some(name) => format!("游戏结束！{} 是最后的幸存者！", name),
                None => "游戏结束！所有角色均已淘汰。".to_string(),
            };
            info!(survivor = ?survivor, "Game over");
            self.state.push_event(GameEvent::system(message));
            self.status = SessionStatus::GameOver { survivor };
        } else {
            info!(round = self.state.round, alive = self.state.turn_queue.len(), "Round started");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::application::services::llm::prompt_builder::OPENING_SCENE_REQUEST;
    use crate::domain::entities::{Character, GenerationParams};
    use crate::domain::events::GameEventKind;
    use crate::domain::value_objects::{StatKind, Stats};

    /// Replays scripted responses in order and records every request
    struct MockLlm {
        responses: Mutex<VecDeque<Result<String, LlmError>>>,
        requests: Arc<Mutex<Vec<LlmRequest>>>,
    }

    impl MockLlm {
        fn new(responses: Vec<Result<String, LlmError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                requests: Arc::new(Mutex::new(Vec::new())),
            }
        }

        fn replies(texts: &[&str]) -> Self {
            Self::new(texts.iter().map(|t| Ok(t.to_string())).collect())
        }
    }

    #[async_trait]
    impl LlmPort for MockLlm {
        async fn generate(
            &self,
            request: LlmRequest,
            on_partial: Option<PartialTextSink>,
        ) -> Result<String, LlmError> {
            self.requests.lock().unwrap().push(request);
            let response = self
                .responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(LlmError::Transport("script exhausted".to_string())));
            if let (Ok(text), Some(sink)) = (&response, on_partial) {
                (*sink)(text);
            }
            response
        }
    }

    fn character(id: &str, name: &str, stats: Stats) -> Character {
        Character::new(
            id,
            name,
            stats,
            GenerationParams::new(format!("你是{}。", name), "char-model"),
        )
    }

    fn orchestrator(llm: MockLlm, characters: Vec<Character>) -> TurnOrchestrator<MockLlm> {
        let state = GameState::new("废弃的神殿", characters);
        TurnOrchestrator::new(llm, state, GmSettings::new("gm-model")).with_seed(7)
    }

    fn queue_ids(state: &GameState) -> Vec<&str> {
        state.turn_queue.iter().map(|id| id.as_str()).collect()
    }

    #[tokio::test]
    async fn test_full_round_eliminates_and_rebuilds_queue() {
        let a = Character::from_traits("a", "A", &["坚韧不拔"], GenerationParams::new("你是A。", "char-model"));
        let b = Character::from_traits("b", "B", &["感情极端", "暴力倾向"], GenerationParams::new("你是B。", "char-model"));
        let c = character("c", "C", Stats::default());
        assert_eq!(a.max_hp, 44);
        assert_eq!(b.max_hp, 36);

        let llm = MockLlm::replies(&[
            "神殿的大门在身后关闭。",
            "举剑攻击石像。",
            "躲到柱子后面。",
            "观察墙上的符文。",
            "石像的拳头砸中了B。[HP变动: B -40]",
        ]);
        let requests = llm.requests.clone();
        let mut orch = orchestrator(llm, vec![a, b, c]);

        for _ in 0..5 {
            assert!(orch.advance().await);
        }

        let requests = requests.lock().unwrap();
        assert_eq!(requests.len(), 5);
        assert_eq!(requests[0].model, "gm-model");
        assert_eq!(requests[0].temperature, 0.9);
        assert_eq!(requests[0].max_tokens, 2048);
        assert_eq!(requests[0].messages[1].content, OPENING_SCENE_REQUEST);
        assert_eq!(requests[1].model, "char-model");
        assert!(requests[1].messages[0].content.starts_with("你是A。"));
        assert!(requests[4].messages[1].content.contains("B: 躲到柱子后面。 | 骰子: d20("));

        let state = orch.state();
        let b = state.character(&"b".into()).unwrap();
        assert_eq!(b.hp, 0);
        assert!(b.eliminated);
        assert_eq!(state.round, 2);
        assert_eq!(state.phase, GamePhase::GmNarration);
        assert_eq!(queue_ids(state), vec!["a", "c"]);
        assert!(state.declared_actions.is_empty());
        assert_eq!(orch.status(), &SessionStatus::Ready);

        let last = state.log.last().unwrap();
        assert_eq!(last.kind, GameEventKind::System);
        assert_eq!(last.content, "B 已被淘汰！");
        assert_eq!(state.log.len(), 1 + 3 * 2 + 1 + 1);
    }

    #[tokio::test]
    async fn test_actions_are_classified_and_rolled() {
        let llm = MockLlm::replies(&["开场。", "尝试说服守卫让路。"]);
        let mut orch = orchestrator(llm, vec![character("a", "A", Stats::default()), character("b", "B", Stats::default())]);

        orch.advance().await;
        orch.advance().await;

        let state = orch.state();
        let declared = &state.declared_actions[0];
        assert_eq!(declared.action, "尝试说服守卫让路。");
        assert_eq!(declared.roll.difficulty, Some(13));
        assert_eq!(declared.roll.modifier, 0);
        assert!((1..=20).contains(&declared.roll.value));

        let roll_event = state.log.last().unwrap();
        assert_eq!(roll_event.kind, GameEventKind::Roll);
        assert_eq!(roll_event.roll.as_ref(), Some(&declared.roll));
        assert_eq!(queue_ids(state), vec!["b"]);
    }

    #[tokio::test]
    async fn test_pause_mid_queue_resumes_at_same_character() {
        let llm = MockLlm::replies(&["开场。", "行动一。", "行动二。", "行动三。", "行动四。"]);
        let requests = llm.requests.clone();
        let roster = ["a", "b", "c", "d"]
            .iter()
            .map(|id| character(id, &id.to_uppercase(), Stats::default()))
            .collect();
        let mut orch = orchestrator(llm, roster);
        let pause = orch.pause_handle();

        for _ in 0..3 {
            orch.advance().await;
        }
        pause.request_pause();

        assert!(!orch.advance().await);
        assert_eq!(orch.status(), &SessionStatus::Paused);
        assert_eq!(queue_ids(orch.state()), vec!["c", "d"]);
        assert_eq!(requests.lock().unwrap().len(), 3);

        orch.resume();
        assert!(!pause.is_requested());
        assert!(orch.advance().await);

        let requests = requests.lock().unwrap();
        assert_eq!(requests.len(), 4);
        assert!(requests[3].messages[0].content.starts_with("你是C。"));
        assert_eq!(queue_ids(orch.state()), vec!["d"]);
    }

    #[tokio::test]
    async fn test_pause_before_narration() {
        let llm = MockLlm::replies(&["开场。"]);
        let mut orch = orchestrator(llm, vec![character("a", "A", Stats::default())]);
        orch.pause_handle().request_pause();

        assert_eq!(orch.run_until_blocked().await, &SessionStatus::Paused);
        assert!(orch.state().log.is_empty());
    }

    #[tokio::test]
    async fn test_failure_keeps_state_and_retry_reissues_step() {
        let llm = MockLlm::new(vec![
            Ok("开场。".to_string()),
            Ok("行动一。".to_string()),
            Err(LlmError::Provider("rate limited".to_string())),
            Ok("行动二。".to_string()),
        ]);
        let requests = llm.requests.clone();
        let roster = vec![
            character("a", "A", Stats::default()),
            character("b", "B", Stats::default()),
            character("c", "C", Stats::default()),
        ];
        let mut orch = orchestrator(llm, roster);

        orch.advance().await;
        orch.advance().await;
        let before = orch.state().clone();

        assert!(orch.advance().await);
        match orch.status() {
            SessionStatus::Failed { message } => assert!(message.contains("rate limited")),
            other => panic!("expected failure, got {:?}", other),
        }
        assert_eq!(orch.state(), &before);
        assert!(!orch.advance().await);

        assert_eq!(orch.retry().await, Ok(true));
        assert_eq!(orch.status(), &SessionStatus::Ready);
        assert_eq!(orch.state().declared_actions.len(), 2);
        assert_eq!(queue_ids(orch.state()), vec!["c"]);

        assert_eq!(orch.retry().await, Err(OrchestratorError::NothingToRetry));

        let requests = requests.lock().unwrap();
        assert_eq!(requests.len(), 4);
        assert_eq!(requests[2], requests[3]);
    }

    #[tokio::test]
    async fn test_pause_requested_while_failed_wins_over_retry() {
        let llm = MockLlm::new(vec![
            Err(LlmError::Transport("connection reset".to_string())),
            Ok("开场。".to_string()),
        ]);
        let requests = llm.requests.clone();
        let mut orch = orchestrator(llm, vec![character("a", "A", Stats::default())]);

        assert!(orch.advance().await);
        assert!(matches!(orch.status(), SessionStatus::Failed { .. }));

        orch.pause_handle().request_pause();
        assert_eq!(orch.retry().await, Ok(false));
        assert_eq!(orch.status(), &SessionStatus::Paused);
        assert_eq!(requests.lock().unwrap().len(), 1);

        orch.resume();
        assert!(orch.advance().await);
        assert_eq!(orch.state().log.len(), 1);
        assert_eq!(requests.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_human_turn_blocks_until_submitted() {
        let llm = MockLlm::replies(&["开场。", "挥斧劈向木门。", "木门碎裂。"]);
        let roster = vec![
            character("a", "A", Stats::default()),
            character("h", "H", Stats::default().with_stat(StatKind::Charisma, 14))
                .human_controlled(),
        ];
        let mut orch = orchestrator(llm, roster);

        assert_eq!(
            orch.submit_human_action(ActionType::Talk, "你好"),
            Err(OrchestratorError::NotAwaitingHuman)
        );

        let status = orch.run_until_blocked().await.clone();
        assert_eq!(status, SessionStatus::AwaitingHuman { character_id: "h".into() });
        assert!(!orch.advance().await);

        assert_eq!(
            orch.submit_human_action(ActionType::Talk, "   "),
            Err(OrchestratorError::EmptyAction)
        );

        let roll = orch.submit_human_action(ActionType::Talk, " 劝说守卫放下武器。 ").unwrap();
        assert_eq!(roll.modifier, 2);
        assert_eq!(roll.difficulty, Some(13));
        assert_eq!(orch.status(), &SessionStatus::Ready);

        let state = orch.state();
        assert!(state.turn_queue.is_empty());
        let human = &state.declared_actions[1];
        assert_eq!(human.character_name, "H");
        assert_eq!(human.action, "劝说守卫放下武器。");

        assert!(orch.advance().await);
        assert_eq!(orch.state().round, 2);
    }

    #[tokio::test]
    async fn test_eliminated_character_is_skipped() {
        let llm = MockLlm::replies(&["开场。", "行动一。"]);
        let requests = llm.requests.clone();
        let roster = vec![
            character("a", "A", Stats::default()),
            character("b", "B", Stats::default()),
            character("c", "C", Stats::default()),
        ];
        let mut orch = orchestrator(llm, roster);
        orch.advance().await;
        orch.state.characters[0].apply_hp_delta(-1000);

        orch.advance().await;
        assert!(requests.lock().unwrap()[1].messages[0].content.starts_with("你是B。"));
        assert_eq!(queue_ids(orch.state()), vec!["c"]);
    }

    #[tokio::test]
    async fn test_stale_ticket_is_discarded() {
        let llm = MockLlm::replies(&[]);
        let mut orch = orchestrator(llm, vec![character("a", "A", Stats::default()), character("b", "B", Stats::default())]);

        let first = orch.prepare_step().unwrap();
        let duplicate = first.clone();
        assert_eq!(first.step, Step::Narration);
        assert_eq!(orch.complete_step(first, Ok("开场。".to_string())), Completion::Committed);
        assert_eq!(orch.complete_step(duplicate, Ok("又一次开场。".to_string())), Completion::Stale);
        assert_eq!(orch.state().log.len(), 1);

        let ticket = orch.prepare_step().unwrap();
        orch.reset();
        assert_eq!(orch.complete_step(ticket, Ok("挥剑。".to_string())), Completion::Stale);
        assert!(orch.state().log.is_empty());
        assert_eq!(orch.state().phase, GamePhase::GmNarration);
    }

    #[tokio::test]
    async fn test_game_over_with_survivor() {
        let llm = MockLlm::replies(&["开场。", "攻击。", "攻击。", "A的剑刺穿了B。[HP变动: B -100]", "不应调用"]);
        let mut orch = orchestrator(llm, vec![character("a", "A", Stats::default()), character("b", "B", Stats::default())]);

        let status = orch.run_until_blocked().await.clone();
        assert_eq!(status, SessionStatus::GameOver { survivor: Some("A".to_string()) });

        let log = &orch.state().log;
        assert_eq!(log[log.len() - 2].content, "B 已被淘汰！");
        assert_eq!(log[log.len() - 1].content, "游戏结束！A 是最后的幸存者！");
        assert!(!orch.advance().await);
    }

    #[tokio::test]
    async fn test_game_over_wipeout() {
        let llm = MockLlm::replies(&["开场。", "攻击。", "攻击。", "同归于尽。[HP变动: A -100][HP变动: B -100]"]);
        let mut orch = orchestrator(llm, vec![character("a", "A", Stats::default()), character("b", "B", Stats::default())]);

        let status = orch.run_until_blocked().await.clone();
        assert_eq!(status, SessionStatus::GameOver { survivor: None });
        assert_eq!(orch.state().log.last().unwrap().content, "游戏结束！所有角色均已淘汰。");
    }

    #[tokio::test]
    async fn test_live_text_cleared_after_call() {
        let llm = MockLlm::replies(&["开场。"]);
        let mut orch = orchestrator(llm, vec![character("a", "A", Stats::default()), character("b", "B", Stats::default())]);
        let mut live = orch.subscribe_live();

        orch.advance().await;
        assert!(live.has_changed().unwrap());
        assert!(live.borrow_and_update().is_none());
    }

    #[tokio::test]
    async fn test_seeded_dice_are_reproducible() {
        async fn first_roll() -> DiceRoll {
            let llm = MockLlm::replies(&["开场。", "攻击。"]);
            let mut orch = orchestrator(llm, vec![character("a", "A", Stats::default()), character("b", "B", Stats::default())]);
            orch.advance().await;
            orch.advance().await;
            orch.state().declared_actions[0].roll.clone()
        }

        assert_eq!(first_roll().await, first_roll().await);
    }

    #[test]
    fn test_gm_settings_defaults() {
        let settings = GmSettings::default();
        assert_eq!(settings.model, "gpt-4o-mini");
        assert_eq!(settings.temperature, 0.9);
        assert_eq!(settings.max_tokens, 2048);
        assert_eq!(settings.rules, DEFAULT_GM_RULES);
    }
}
