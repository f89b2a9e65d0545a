/// Session — the application context tying the story to the music.
///
/// Owns one composer and one story machine for the lifetime of a play
/// session. Audio trouble never stops the story: composer failures are
/// logged and the game continues in silence.

use tracing::warn;

use crate::core::audio::AudioEngine;
use crate::core::composer::Composer;
use crate::core::store::{KvStore, MemoryStore};
use crate::core::story::{EpilogueAction, GameError, StoryMachine, TurnOutcome};
use crate::schema::analysis::CommitAnalysis;
use crate::schema::commit::CommitRecord;
use crate::schema::scene::{Scene, Selection};
use crate::schema::state::GameState;
use crate::schema::style::Style;

pub struct Session<E: AudioEngine, S: KvStore = MemoryStore> {
    composer: Composer<E>,
    story: StoryMachine<S>,
}

impl<E: AudioEngine, S: KvStore> Session<E, S> {
    pub fn new(composer: Composer<E>, story: StoryMachine<S>) -> Self {
        Self { composer, story }
    }

    pub fn story(&self) -> &StoryMachine<S> {
        &self.story
    }

    pub fn story_mut(&mut self) -> &mut StoryMachine<S> {
        &mut self.story
    }

    pub fn composer(&self) -> &Composer<E> {
        &self.composer
    }

    pub fn composer_mut(&mut self) -> &mut Composer<E> {
        &mut self.composer
    }

    pub fn state(&self) -> Option<&GameState> {
        self.story.state()
    }

    fn rebuild_music(&mut self, style: Style, analysis: &CommitAnalysis) {
        let profile = self.story.narrative().profile(style);
        if let Err(e) = self.composer.initialize(profile, analysis) {
            warn!(error = %e, "continuing without music");
        }
    }

    fn rebuild_music_for_state(&mut self) {
        let Some((style, analysis)) = self
            .story
            .state()
            .map(|s| (s.style, s.analysis.clone()))
        else {
            return;
        };
        self.rebuild_music(style, &analysis);
    }

    /// Start a playthrough and arm its music.
    pub fn new_game(
        &mut self,
        repo: &str,
        style: Style,
        commits: Vec<CommitRecord>,
    ) -> Result<Scene, GameError> {
        let scene = self.story.start_game(repo, style, commits)?;
        self.rebuild_music_for_state();
        Ok(scene)
    }

    /// Replay the current history in another style.
    pub fn replay_with_style(&mut self, style: Style) -> Result<Scene, GameError> {
        let scene = self.story.restart(Some(style))?;
        self.rebuild_music_for_state();
        Ok(scene)
    }

    /// Replay the current history in the same style. The music is
    /// unchanged, so it is left playing.
    pub fn restart(&mut self) -> Result<Scene, GameError> {
        self.story.restart(None)
    }

    pub fn make_choice(&mut self, selection: Selection) -> Result<TurnOutcome, GameError> {
        self.story.make_choice(selection)
    }

    /// Resolve an epilogue selection. `NewRepository` is returned to the
    /// caller, which has to supply the commits; the other two actions are
    /// carried out here.
    pub fn handle_epilogue(
        &mut self,
        selection: &Selection,
        replay_style: Style,
    ) -> Result<Option<EpilogueAction>, GameError> {
        let Some(action) = EpilogueAction::from_selection(selection) else {
            return Ok(None);
        };
        match action {
            EpilogueAction::NewRepository => {}
            EpilogueAction::ReplayWithStyle => {
                self.replay_with_style(replay_style)?;
            }
            EpilogueAction::Restart => {
                self.restart()?;
            }
        }
        Ok(Some(action))
    }

    pub fn save_game(&mut self, slot: &str) -> Result<(), GameError> {
        self.story.save_game(slot)
    }

    /// Load a save and rebuild its music from the saved analysis.
    pub fn load_game(&mut self, slot: &str) -> Result<&GameState, GameError> {
        self.story.load_game(slot)?;
        self.rebuild_music_for_state();
        self.story.state().ok_or(GameError::NoGame)
    }

    /// Stop the music and release every audio resource.
    pub fn shutdown(&mut self) {
        self.composer.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::audio::{HeadlessEngine, Layer, TransportState};
    use crate::core::narrative::NarrativeSource;
    use crate::schema::commit::Author;

    fn commits() -> Vec<CommitRecord> {
        ["merge feature", "fix typo", "add docs", "bump version"]
            .iter()
            .enumerate()
            .map(|(i, s)| {
                CommitRecord::new(
                    &format!("{:08x}0000", i * 77),
                    s,
                    Author {
                        name: format!("author{i}"),
                        login: None,
                        avatar: None,
                    },
                    "2024-04-01T03:00:00Z",
                )
                .unwrap()
            })
            .collect()
    }

    fn session(engine: HeadlessEngine) -> Session<HeadlessEngine> {
        let story = StoryMachine::with_seed(
            NarrativeSource::templates_only().unwrap(),
            MemoryStore::new(),
            11,
        );
        Session::new(Composer::new(engine), story)
    }

    #[test]
    fn new_game_arms_music() {
        let mut s = session(HeadlessEngine::new());
        s.new_game("o/r", Style::Fantasy, commits()).unwrap();
        assert!(s.composer().is_initialized());
        assert_eq!(
            s.composer().layers(),
            &[Layer::Melody, Layer::Bass, Layer::Pad, Layer::Percussion]
        );
        assert_eq!(s.composer().engine().transport(), TransportState::Stopped);
    }

    #[test]
    fn silent_engine_does_not_block_story() {
        let mut s = session(HeadlessEngine::unavailable());
        let scene = s.new_game("o/r", Style::Scifi, commits()).unwrap();
        assert_eq!(scene.choices.len(), 3);
        assert!(!s.composer().is_initialized());
        assert!(s.make_choice(Selection::Option(0)).is_ok());
    }

    #[test]
    fn replay_switches_music_style() {
        let mut s = session(HeadlessEngine::new());
        s.new_game("o/r", Style::Fantasy, commits()).unwrap();
        let live = s.composer().engine().live_nodes();
        s.replay_with_style(Style::Horror).unwrap();
        assert_eq!(s.state().unwrap().style, Style::Horror);
        assert!(s.composer().engine().live_nodes() <= live);
    }

    #[test]
    fn load_rebuilds_music_from_save() {
        let mut s = session(HeadlessEngine::new());
        s.new_game("o/r", Style::Scifi, commits()).unwrap();
        s.make_choice(Selection::Option(1)).unwrap();
        s.save_game("slot1").unwrap();
        let plan = s.composer().plan().cloned();
        s.shutdown();
        assert_eq!(s.composer().engine().live_nodes(), 0);

        let state = s.load_game("slot1").unwrap();
        assert_eq!(state.commit_index, 1);
        assert_eq!(s.composer().plan().cloned(), plan);
    }

    #[test]
    fn epilogue_restart_and_new_repo() {
        let mut s = session(HeadlessEngine::new());
        s.new_game("o/r", Style::Fantasy, commits()).unwrap();
        assert_eq!(
            s.handle_epilogue(&Selection::Option(0), Style::Scifi).unwrap(),
            Some(EpilogueAction::NewRepository)
        );
        assert_eq!(
            s.handle_epilogue(&Selection::Option(2), Style::Scifi).unwrap(),
            Some(EpilogueAction::Restart)
        );
        assert_eq!(s.state().unwrap().commit_index, 0);
    }
}
