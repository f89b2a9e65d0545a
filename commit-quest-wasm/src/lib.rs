//! WASM bindings for commit-quest — powers the browser build of the game.
//!
//! The browser supplies commits as GitHub-shaped JSON (it does its own
//! fetching) and renders scenes and music from the JSON returned here.
//! Narration always comes from the style templates; saves live in memory
//! for the lifetime of the game object.

use wasm_bindgen::prelude::*;

use commit_quest::core::audio::HeadlessEngine;
use commit_quest::core::composer::Composer;
use commit_quest::core::narrative::NarrativeSource;
use commit_quest::core::session::Session;
use commit_quest::core::source::parse_commits_json;
use commit_quest::core::story::{EpilogueAction, Phase, StoryMachine, TurnOutcome};
use commit_quest::core::store::MemoryStore;
use commit_quest::schema::scene::{Scene, Selection};
use commit_quest::schema::style::Style;

// ---------------------------------------------------------------------------
// JSON helper types for communication across the WASM boundary
// ---------------------------------------------------------------------------
#[derive(serde::Serialize)]
struct TurnInfo<'a> {
    kind: &'a str,
    scene: Option<&'a Scene>,
}

#[derive(serde::Serialize)]
struct StyleInfo {
    id: String,
    title: String,
}

fn js_err(context: &str, e: impl std::fmt::Display) -> JsError {
    JsError::new(&format!("{context}: {e}"))
}

fn to_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<String, JsError> {
    serde_json::to_string(value).map_err(|e| js_err("Serialization error", e))
}

fn parse_style(s: &str) -> Result<Style, JsError> {
    s.parse::<Style>().map_err(|e| js_err("Invalid style", e))
}

fn phase_label(phase: Phase) -> &'static str {
    match phase {
        Phase::Idle => "idle",
        Phase::Generating => "generating",
        Phase::AwaitingChoice => "awaiting_choice",
        Phase::Epilogue => "epilogue",
    }
}

// ---------------------------------------------------------------------------
// Game handle
// ---------------------------------------------------------------------------
#[wasm_bindgen]
pub struct CommitQuestGame {
    session: Session<HeadlessEngine, MemoryStore>,
}

#[wasm_bindgen]
impl CommitQuestGame {
    /// Start a game for `repo` from a GitHub commits JSON array.
    #[wasm_bindgen(constructor)]
    pub fn new(
        repo: &str,
        commits_json: &str,
        style: &str,
        seed: u64,
    ) -> Result<CommitQuestGame, JsError> {
        let style = parse_style(style)?;
        let commits =
            parse_commits_json(commits_json).map_err(|e| js_err("Invalid commits JSON", e))?;
        let narrative =
            NarrativeSource::templates_only().map_err(|e| js_err("Style data error", e))?;
        let story = StoryMachine::with_seed(narrative, MemoryStore::new(), seed);
        let mut session = Session::new(Composer::new(HeadlessEngine::new()), story);
        session
            .new_game(repo, style, commits)
            .map_err(|e| js_err("Could not start game", e))?;
        Ok(CommitQuestGame { session })
    }

    /// Current phase: idle, generating, awaiting_choice or epilogue.
    pub fn phase(&self) -> String {
        phase_label(self.session.story().phase()).to_string()
    }

    /// JSON of the scene on screen, or `null`.
    pub fn scene(&self) -> Result<String, JsError> {
        to_json(&self.session.story().current_scene())
    }

    /// JSON of the full game state.
    pub fn state(&self) -> Result<String, JsError> {
        to_json(&self.session.state())
    }

    /// JSON of the player's stats.
    pub fn stats(&self) -> Result<String, JsError> {
        to_json(&self.session.state().map(|s| &s.stats))
    }

    /// JSON of the musical plan the browser should schedule.
    pub fn music_plan(&self) -> Result<String, JsError> {
        to_json(&self.session.composer().plan())
    }

    /// Pick a listed choice. Returns `{kind, scene}` JSON where `kind` is
    /// `scene`, `epilogue` or `ignored`.
    pub fn choose(&mut self, index: usize) -> Result<String, JsError> {
        self.turn(Selection::Option(index))
    }

    /// Answer in the player's own words.
    pub fn say(&mut self, text: &str) -> Result<String, JsError> {
        self.turn(Selection::Custom(text.to_string()))
    }

    /// Resolve an epilogue choice. Returns `new_repository`, `replay` or
    /// `restart`; the page handles `new_repository` itself.
    pub fn epilogue(&mut self, index: usize, replay_style: &str) -> Result<String, JsError> {
        let style = parse_style(replay_style)?;
        let action = self
            .session
            .handle_epilogue(&Selection::Option(index), style)
            .map_err(|e| js_err("Epilogue error", e))?;
        Ok(match action {
            Some(EpilogueAction::NewRepository) => "new_repository",
            Some(EpilogueAction::ReplayWithStyle) => "replay",
            Some(EpilogueAction::Restart) => "restart",
            None => "none",
        }
        .to_string())
    }

    pub fn save(&mut self, slot: &str) -> Result<(), JsError> {
        self.session
            .save_game(slot)
            .map_err(|e| js_err("Save failed", e))
    }

    /// Load a slot. Returns the loaded state as JSON.
    pub fn load(&mut self, slot: &str) -> Result<String, JsError> {
        let state = self
            .session
            .load_game(slot)
            .map_err(|e| js_err("Load failed", e))?;
        to_json(state)
    }

    /// JSON array of save summaries, newest first.
    pub fn saves(&mut self) -> Result<String, JsError> {
        let saves = self
            .session
            .story_mut()
            .list_saves()
            .map_err(|e| js_err("Could not list saves", e))?;
        to_json(&saves)
    }

    pub fn delete_save(&mut self, slot: &str) -> Result<bool, JsError> {
        self.session
            .story_mut()
            .delete_save(slot)
            .map_err(|e| js_err("Delete failed", e))
    }

    /// Toggle the transport. Returns whether music is now playing.
    pub fn toggle_music(&mut self) -> bool {
        self.session.composer_mut().toggle()
    }

    pub fn set_volume(&mut self, volume: f64) {
        self.session.composer_mut().set_volume(volume);
    }

    /// Return JSON array of `{id, title}` for the built-in styles.
    pub fn styles() -> Result<String, JsError> {
        let narrative =
            NarrativeSource::templates_only().map_err(|e| js_err("Style data error", e))?;
        let info: Vec<StyleInfo> = Style::ALL
            .iter()
            .map(|&style| StyleInfo {
                id: style.tag().to_string(),
                title: narrative.profile(style).title.clone(),
            })
            .collect();
        to_json(&info)
    }
}

// Private helpers
impl CommitQuestGame {
    fn turn(&mut self, selection: Selection) -> Result<String, JsError> {
        let outcome = self
            .session
            .make_choice(selection)
            .map_err(|e| js_err("Turn error", e))?;
        let info = match &outcome {
            TurnOutcome::Scene(scene) => TurnInfo {
                kind: "scene",
                scene: Some(scene),
            },
            TurnOutcome::Epilogue(scene) => TurnInfo {
                kind: "epilogue",
                scene: Some(scene),
            },
            TurnOutcome::Ignored => TurnInfo {
                kind: "ignored",
                scene: None,
            },
        };
        to_json(&info)
    }
}
