/// Story state machine — owns the game state and advances it one commit
/// per resolved choice.
///
/// ```text
/// Idle -> Generating -> AwaitingChoice -> Generating -> ... -> Epilogue
/// ```

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::sync::mpsc;
use thiserror::Error;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::{debug, info, warn};

use crate::core::analyzer::analyze;
use crate::core::consequences;
use crate::core::narrative::fallback::SceneFields;
use crate::core::narrative::{NarrativeSource, SceneContext};
use crate::core::store::{KvStore, MemoryStore, StoreError};
use crate::schema::commit::CommitRecord;
use crate::schema::scene::{Choice, Scene, Selection};
use crate::schema::state::{chapter_for, GameState, HistoryEntry, PlayerStats};
use crate::schema::style::Style;

/// Slot written after every ordinary turn.
pub const AUTOSAVE_SLOT: &str = "auto";
const SAVE_PREFIX: &str = "save:";

const EPILOGUE_CHOICES: [(&str, &str); 3] = [
    ("A", "Explore a new repository"),
    ("B", "Replay with a different style"),
    ("C", "Restart this journey"),
];

#[derive(Debug, Error)]
pub enum GameError {
    #[error("repository has no commits")]
    NoCommits,
    #[error("no game in progress")]
    NoGame,
    #[error("the story has ended")]
    GameOver,
    #[error("invalid choice: {0}")]
    InvalidChoice(String),
    #[error("invalid save slot name '{0}'")]
    InvalidSlot(String),
    #[error("save slot '{0}' not found")]
    SaveNotFound(String),
    #[error("save slot '{slot}' is corrupt: {source}")]
    CorruptSave {
        slot: String,
        #[source]
        source: ron::error::SpannedError,
    },
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("RON serialization error: {0}")]
    Serialize(#[from] ron::Error),
    #[error("timestamp formatting error: {0}")]
    Timestamp(#[from] time::error::Format),
}

/// Where the machine is in a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Idle,
    /// A scene request is in flight; choices are ignored.
    Generating,
    AwaitingChoice,
    Epilogue,
}

/// Notifications for the presentation layer, sent after each mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GameEvent {
    SceneReady {
        scene: Scene,
        commit: Option<CommitRecord>,
        progress: f64,
    },
    StatsUpdated(PlayerStats),
    QuestsUpdated(Vec<String>),
}

pub trait GameObserver {
    fn notify(&mut self, event: &GameEvent);
}

impl GameObserver for mpsc::Sender<GameEvent> {
    fn notify(&mut self, event: &GameEvent) {
        // A dropped receiver just means nobody is listening any more.
        let _ = self.send(event.clone());
    }
}

/// What the orchestrator should do after an epilogue choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EpilogueAction {
    NewRepository,
    ReplayWithStyle,
    Restart,
}

impl EpilogueAction {
    pub fn from_selection(selection: &Selection) -> Option<EpilogueAction> {
        match selection {
            Selection::Option(0) => Some(Self::NewRepository),
            Selection::Option(1) => Some(Self::ReplayWithStyle),
            Selection::Option(2) => Some(Self::Restart),
            _ => None,
        }
    }
}

/// Result of `make_choice`.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    /// The story moved on to a new scene.
    Scene(Scene),
    /// The last commit was reached.
    Epilogue(Scene),
    /// A scene was already being generated; nothing changed.
    Ignored,
}

/// One entry of `list_saves`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveSummary {
    pub slot: String,
    pub repo: String,
    pub style: Style,
    pub commit_index: usize,
    pub total_commits: usize,
    pub progress: f64,
    pub level: u32,
    pub saved_at: Option<String>,
}

fn now_rfc3339() -> Result<String, GameError> {
    Ok(OffsetDateTime::now_utc().format(&Rfc3339)?)
}

fn slot_key(slot: &str) -> Result<String, GameError> {
    if slot.trim().is_empty() {
        return Err(GameError::InvalidSlot(slot.to_string()));
    }
    Ok(format!("{SAVE_PREFIX}{slot}"))
}

/// Build the closing scene for a finished playthrough.
pub fn epilogue_scene(source: &NarrativeSource, state: &GameState) -> Scene {
    let fields = SceneFields::new(&state.commits, state.commit_index, &state.stats);
    Scene {
        narrative: source.profile(state.style).epilogue.render(&fields),
        choices: EPILOGUE_CHOICES
            .iter()
            .map(|(label, text)| Choice::new(label, text))
            .collect(),
        is_epilogue: true,
    }
}

pub struct StoryMachine<S: KvStore = MemoryStore> {
    narrative: NarrativeSource,
    store: S,
    rng: StdRng,
    state: Option<GameState>,
    phase: Phase,
    observers: Vec<Box<dyn GameObserver>>,
}

impl<S: KvStore> StoryMachine<S> {
    pub fn new(narrative: NarrativeSource, store: S) -> Self {
        Self::with_rng(narrative, store, StdRng::from_entropy())
    }

    /// Fixed gameplay randomness, for reproducible runs.
    pub fn with_seed(narrative: NarrativeSource, store: S, seed: u64) -> Self {
        Self::with_rng(narrative, store, StdRng::seed_from_u64(seed))
    }

    fn with_rng(narrative: NarrativeSource, store: S, rng: StdRng) -> Self {
        Self {
            narrative,
            store,
            rng,
            state: None,
            phase: Phase::Idle,
            observers: Vec::new(),
        }
    }

    pub fn subscribe(&mut self, observer: impl GameObserver + 'static) {
        self.observers.push(Box::new(observer));
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn state(&self) -> Option<&GameState> {
        self.state.as_ref()
    }

    pub fn current_scene(&self) -> Option<&Scene> {
        self.state.as_ref().and_then(|s| s.current_scene.as_ref())
    }

    pub fn narrative(&self) -> &NarrativeSource {
        &self.narrative
    }

    pub fn narrative_mut(&mut self) -> &mut NarrativeSource {
        &mut self.narrative
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    fn emit(observers: &mut [Box<dyn GameObserver>], event: GameEvent) {
        for observer in observers.iter_mut() {
            observer.notify(&event);
        }
    }

    fn emit_scene(observers: &mut [Box<dyn GameObserver>], state: &GameState, scene: &Scene) {
        Self::emit(
            observers,
            GameEvent::SceneReady {
                scene: scene.clone(),
                commit: state.current_commit().cloned(),
                progress: state.progress(),
            },
        );
    }

    /// Begin a new playthrough over `commits`, returning the first scene.
    pub fn start_game(
        &mut self,
        repo: &str,
        style: Style,
        commits: Vec<CommitRecord>,
    ) -> Result<Scene, GameError> {
        let analysis = analyze(&commits).ok_or(GameError::NoCommits)?;
        let mut state = GameState {
            repo: repo.to_string(),
            style,
            commits,
            analysis,
            commit_index: 0,
            chapter: chapter_for(0),
            stats: PlayerStats::default(),
            quest_log: Vec::new(),
            history: Vec::new(),
            current_scene: None,
            started_at: now_rfc3339()?,
            saved_at: None,
        };
        info!(repo = %repo, style = %style, commits = state.commits.len(), "game started");

        self.phase = Phase::Generating;
        let scene = self.narrative.produce_scene(&SceneContext {
            commits: &state.commits,
            current_index: 0,
            style,
            player: &state.stats,
            prior_choice: None,
        });
        state.current_scene = Some(scene.clone());
        self.phase = Phase::AwaitingChoice;

        Self::emit(&mut self.observers, GameEvent::StatsUpdated(state.stats.clone()));
        Self::emit(&mut self.observers, GameEvent::QuestsUpdated(Vec::new()));
        Self::emit_scene(&mut self.observers, &state, &scene);
        self.state = Some(state);
        Ok(scene)
    }

    /// Start over on the current history, optionally in another style.
    pub fn restart(&mut self, style: Option<Style>) -> Result<Scene, GameError> {
        let state = self.state.take().ok_or(GameError::NoGame)?;
        let style = style.unwrap_or(state.style);
        self.start_game(&state.repo, style, state.commits)
    }

    /// Resolve the current scene with the player's selection.
    pub fn make_choice(&mut self, selection: Selection) -> Result<TurnOutcome, GameError> {
        match self.phase {
            Phase::AwaitingChoice => {}
            Phase::Generating => {
                debug!("choice ignored while a scene is being generated");
                return Ok(TurnOutcome::Ignored);
            }
            Phase::Idle => return Err(GameError::NoGame),
            Phase::Epilogue => return Err(GameError::GameOver),
        }
        let state = self.state.as_mut().ok_or(GameError::NoGame)?;
        let scene = state.current_scene.clone().ok_or(GameError::NoGame)?;

        let (choice_text, option) = match &selection {
            Selection::Option(i) => match scene.choices.get(*i) {
                Some(choice) => (choice.text.clone(), Some(*i)),
                None => {
                    return Err(GameError::InvalidChoice(format!(
                        "option {i} of {}",
                        scene.choices.len()
                    )))
                }
            },
            Selection::Custom(text) if !text.trim().is_empty() => (text.trim().to_string(), None),
            Selection::Custom(_) => {
                return Err(GameError::InvalidChoice("empty custom text".to_string()))
            }
        };

        self.phase = Phase::Generating;
        state.history.push(HistoryEntry {
            narrative: scene.narrative.clone(),
            choice_text: choice_text.clone(),
            commit_sha: state
                .current_commit()
                .map(|c| c.sha.clone())
                .unwrap_or_default(),
        });

        let profile = self.narrative.profile(state.style);
        let report = consequences::apply(state, profile, option, &mut self.rng);
        debug!(
            index = state.commit_index,
            xp = report.xp_gained,
            level = ?report.new_level,
            hp_delta = report.hp_delta,
            item = ?report.item,
            quests = report.quests.len(),
            "consequences applied"
        );
        Self::emit(&mut self.observers, GameEvent::StatsUpdated(state.stats.clone()));
        Self::emit(&mut self.observers, GameEvent::QuestsUpdated(state.quest_log.clone()));

        state.commit_index = (state.commit_index + 1).min(state.last_index());
        state.chapter = chapter_for(state.commit_index);

        if state.commit_index == state.last_index() && state.history.len() > 1 {
            let scene = epilogue_scene(&self.narrative, state);
            state.current_scene = Some(scene.clone());
            self.phase = Phase::Epilogue;
            info!(
                repo = %state.repo,
                turns = state.history.len(),
                level = state.stats.level,
                "story reached its epilogue"
            );
            Self::emit_scene(&mut self.observers, state, &scene);
            return Ok(TurnOutcome::Epilogue(scene));
        }

        let scene = self.narrative.produce_scene(&SceneContext {
            commits: &state.commits,
            current_index: state.commit_index,
            style: state.style,
            player: &state.stats,
            prior_choice: Some(&choice_text),
        });
        state.current_scene = Some(scene.clone());
        self.phase = Phase::AwaitingChoice;

        if let Err(e) = self.save_game(AUTOSAVE_SLOT) {
            warn!(error = %e, "autosave failed");
        }
        if let Some(state) = &self.state {
            Self::emit_scene(&mut self.observers, state, &scene);
        }
        Ok(TurnOutcome::Scene(scene))
    }

    /// Write the current game under `slot`.
    pub fn save_game(&mut self, slot: &str) -> Result<(), GameError> {
        let key = slot_key(slot)?;
        let state = self.state.as_mut().ok_or(GameError::NoGame)?;
        state.saved_at = Some(now_rfc3339()?);
        let text = ron::to_string(state)?;
        self.store.set(&key, text, None)?;
        info!(slot = %slot, index = state.commit_index, "game saved");
        Ok(())
    }

    /// Replace the live game with the one saved under `slot`.
    pub fn load_game(&mut self, slot: &str) -> Result<&GameState, GameError> {
        let key = slot_key(slot)?;
        let text = match self.store.get(&key) {
            Ok(Some(text)) => text,
            Ok(None) => return Err(GameError::SaveNotFound(slot.to_string())),
            Err(StoreError::Corrupt { source, .. }) => {
                return Err(GameError::CorruptSave {
                    slot: slot.to_string(),
                    source,
                })
            }
            Err(e) => return Err(e.into()),
        };
        let mut state: GameState = ron::from_str(&text).map_err(|source| GameError::CorruptSave {
            slot: slot.to_string(),
            source,
        })?;
        if state.commits.is_empty() {
            return Err(GameError::NoCommits);
        }

        let scene = match state.current_scene.clone() {
            Some(scene) => scene,
            None => {
                self.phase = Phase::Generating;
                let scene = self.narrative.produce_scene(&SceneContext {
                    commits: &state.commits,
                    current_index: state.commit_index,
                    style: state.style,
                    player: &state.stats,
                    prior_choice: state.history.last().map(|h| h.choice_text.as_str()),
                });
                state.current_scene = Some(scene.clone());
                scene
            }
        };
        self.phase = if scene.is_epilogue {
            Phase::Epilogue
        } else {
            Phase::AwaitingChoice
        };
        info!(slot = %slot, repo = %state.repo, index = state.commit_index, "game loaded");

        Self::emit(&mut self.observers, GameEvent::StatsUpdated(state.stats.clone()));
        Self::emit(&mut self.observers, GameEvent::QuestsUpdated(state.quest_log.clone()));
        Self::emit_scene(&mut self.observers, &state, &scene);
        Ok(self.state.insert(state))
    }

    /// Saved games, newest first. Unreadable entries are skipped.
    pub fn list_saves(&mut self) -> Result<Vec<SaveSummary>, GameError> {
        let mut saves: Vec<SaveSummary> = self
            .store
            .list(SAVE_PREFIX)?
            .into_iter()
            .filter_map(|(key, text)| {
                let slot = key.strip_prefix(SAVE_PREFIX).unwrap_or(&key).to_string();
                match ron::from_str::<GameState>(&text) {
                    Ok(state) => Some(SaveSummary {
                        slot,
                        repo: state.repo.clone(),
                        style: state.style,
                        commit_index: state.commit_index,
                        total_commits: state.commits.len(),
                        progress: state.progress(),
                        level: state.stats.level,
                        saved_at: state.saved_at,
                    }),
                    Err(e) => {
                        warn!(slot = %slot, error = %e, "skipping unreadable save");
                        None
                    }
                }
            })
            .collect();
        saves.sort_by_key(|s| {
            std::cmp::Reverse(
                s.saved_at
                    .as_deref()
                    .and_then(|t| OffsetDateTime::parse(t, &Rfc3339).ok()),
            )
        });
        Ok(saves)
    }

    /// Remove a save slot. Returns whether it existed.
    pub fn delete_save(&mut self, slot: &str) -> Result<bool, GameError> {
        let key = slot_key(slot)?;
        Ok(self.store.delete(&key)?)
    }

    #[cfg(test)]
    pub(crate) fn force_phase(&mut self, phase: Phase) {
        self.phase = phase;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::commit::Author;

    fn commits(subjects: &[&str]) -> Vec<CommitRecord> {
        subjects
            .iter()
            .enumerate()
            .map(|(i, s)| {
                CommitRecord::new(
                    &format!("{i:08x}ffff"),
                    s,
                    Author {
                        name: "lee".to_string(),
                        login: None,
                        avatar: None,
                    },
                    "2024-04-01T12:00:00Z",
                )
                .unwrap()
            })
            .collect()
    }

    fn machine() -> StoryMachine {
        StoryMachine::with_seed(
            NarrativeSource::templates_only().unwrap(),
            MemoryStore::new(),
            7,
        )
    }

    #[test]
    fn empty_history_does_not_start() {
        let mut m = machine();
        assert!(matches!(
            m.start_game("a/b", Style::Fantasy, Vec::new()),
            Err(GameError::NoCommits)
        ));
        assert_eq!(m.phase(), Phase::Idle);
    }

    #[test]
    fn start_awaits_first_choice() {
        let mut m = machine();
        let scene = m
            .start_game("a/b", Style::Scifi, commits(&["one", "two", "three"]))
            .unwrap();
        assert_eq!(scene.choices.len(), 3);
        assert_eq!(m.phase(), Phase::AwaitingChoice);
        assert_eq!(m.state().unwrap().commit_index, 0);
    }

    #[test]
    fn choices_ignored_while_generating() {
        let mut m = machine();
        m.start_game("a/b", Style::Fantasy, commits(&["one", "two", "three"]))
            .unwrap();
        m.force_phase(Phase::Generating);
        assert_eq!(m.make_choice(Selection::Option(0)).unwrap(), TurnOutcome::Ignored);
        let state = m.state().unwrap();
        assert_eq!(state.commit_index, 0);
        assert!(state.history.is_empty());
    }

    #[test]
    fn invalid_option_rejected_without_side_effects() {
        let mut m = machine();
        m.start_game("a/b", Style::Fantasy, commits(&["one", "two"])).unwrap();
        assert!(matches!(
            m.make_choice(Selection::Option(7)),
            Err(GameError::InvalidChoice(_))
        ));
        assert!(matches!(
            m.make_choice(Selection::Custom("  ".to_string())),
            Err(GameError::InvalidChoice(_))
        ));
        assert!(m.state().unwrap().history.is_empty());
        assert_eq!(m.phase(), Phase::AwaitingChoice);
    }

    #[test]
    fn single_commit_needs_two_turns() {
        let mut m = machine();
        m.start_game("a/b", Style::Horror, commits(&["only"])).unwrap();
        assert!(matches!(
            m.make_choice(Selection::Option(1)).unwrap(),
            TurnOutcome::Scene(_)
        ));
        assert!(matches!(
            m.make_choice(Selection::Custom("wait".to_string())).unwrap(),
            TurnOutcome::Epilogue(_)
        ));
        assert!(matches!(
            m.make_choice(Selection::Option(0)),
            Err(GameError::GameOver)
        ));
    }

    #[test]
    fn turn_autosaves() {
        let mut m = machine();
        m.start_game("a/b", Style::Fantasy, commits(&["one", "two", "three", "four"]))
            .unwrap();
        m.make_choice(Selection::Option(1)).unwrap();
        let saves = m.list_saves().unwrap();
        assert_eq!(saves.len(), 1);
        assert_eq!(saves[0].slot, AUTOSAVE_SLOT);
        assert_eq!(saves[0].commit_index, 1);
    }

    #[test]
    fn observers_hear_every_turn() {
        let mut m = machine();
        let (tx, rx) = mpsc::channel();
        m.subscribe(tx);
        m.start_game("a/b", Style::Fantasy, commits(&["one", "two", "three"]))
            .unwrap();
        m.make_choice(Selection::Option(2)).unwrap();
        let events: Vec<GameEvent> = rx.try_iter().collect();
        assert_eq!(events.len(), 6);
        assert!(matches!(events[3], GameEvent::StatsUpdated(_)));
        assert!(matches!(events[4], GameEvent::QuestsUpdated(_)));
        match &events[5] {
            GameEvent::SceneReady { commit, progress, .. } => {
                assert_eq!(commit.as_ref().unwrap().subject, "two");
                assert_eq!(*progress, 0.5);
            }
            other => panic!("expected scene event, got {other:?}"),
        }
    }

    #[test]
    fn missing_and_corrupt_saves() {
        let mut m = machine();
        assert!(matches!(m.load_game("nope"), Err(GameError::SaveNotFound(_))));
        m.store_mut()
            .set("save:broken", "(((".to_string(), None)
            .unwrap();
        assert!(matches!(
            m.load_game("broken"),
            Err(GameError::CorruptSave { .. })
        ));
        assert!(m.list_saves().unwrap().is_empty());
        assert!(matches!(m.save_game(""), Err(GameError::InvalidSlot(_))));
    }

    #[cfg(feature = "fs")]
    #[test]
    fn corrupt_save_file_reports_corrupt_save() {
        use crate::core::store::DirStore;

        let dir = tempfile::tempdir().unwrap();
        let mut m = StoryMachine::with_seed(
            NarrativeSource::templates_only().unwrap(),
            DirStore::open(dir.path()).unwrap(),
            7,
        );
        m.start_game("a/b", Style::Fantasy, commits(&["one", "two"]))
            .unwrap();
        m.save_game("broken").unwrap();
        let path = m.store_mut().path_for("save:broken").unwrap();
        std::fs::write(&path, "Entry(key: ").unwrap();

        assert!(matches!(
            m.load_game("broken"),
            Err(GameError::CorruptSave { ref slot, .. }) if slot == "broken"
        ));
        assert!(m.delete_save("broken").unwrap());
    }

    #[cfg(feature = "fs")]
    #[test]
    fn slots_differing_only_in_punctuation_are_separate() {
        use crate::core::store::DirStore;

        let dir = tempfile::tempdir().unwrap();
        let mut m = StoryMachine::with_seed(
            NarrativeSource::templates_only().unwrap(),
            DirStore::open(dir.path()).unwrap(),
            7,
        );
        m.start_game("a/b", Style::Fantasy, commits(&["one", "two", "three"]))
            .unwrap();
        m.save_game("my run").unwrap();
        m.make_choice(Selection::Option(0)).unwrap();
        m.save_game("my/run").unwrap();

        assert_eq!(m.load_game("my run").unwrap().commit_index, 0);
        assert_eq!(m.load_game("my/run").unwrap().commit_index, 1);
        assert!(m.delete_save("my run").unwrap());
        assert_eq!(m.load_game("my/run").unwrap().commit_index, 1);
    }

    #[test]
    fn restart_keeps_history_and_changes_style() {
        let mut m = machine();
        m.start_game("a/b", Style::Fantasy, commits(&["one", "two", "three"]))
            .unwrap();
        m.make_choice(Selection::Option(0)).unwrap();
        m.restart(Some(Style::Horror)).unwrap();
        let state = m.state().unwrap();
        assert_eq!(state.style, Style::Horror);
        assert_eq!(state.commit_index, 0);
        assert!(state.history.is_empty());
        assert_eq!(state.commits.len(), 3);
    }

    #[test]
    fn epilogue_actions_decode() {
        assert_eq!(
            EpilogueAction::from_selection(&Selection::Option(1)),
            Some(EpilogueAction::ReplayWithStyle)
        );
        assert_eq!(EpilogueAction::from_selection(&Selection::Option(3)), None);
        assert_eq!(
            EpilogueAction::from_selection(&Selection::Custom("again".to_string())),
            None
        );
    }
}
