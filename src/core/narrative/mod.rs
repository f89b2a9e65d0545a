/// Narrative source — one scene contract over two producers.
///
/// The language-model producer is tried first when one is configured. Any
/// failure there (transport, quota, unusable text) is logged and the
/// deterministic template producer answers instead, so `produce_scene`
/// always returns a scene.

use tracing::{debug, warn};

use crate::core::style_profile::{StyleError, StyleLibrary, StyleProfile};
use crate::schema::commit::CommitRecord;
use crate::schema::scene::Scene;
use crate::schema::state::PlayerStats;
use crate::schema::style::Style;

pub mod completer;
pub mod fallback;
pub mod prompt;

pub use completer::{CachedCompleter, CompletionError, TextCompleter};

/// Everything a producer needs to write the scene for one commit.
#[derive(Debug, Clone, Copy)]
pub struct SceneContext<'a> {
    pub commits: &'a [CommitRecord],
    pub current_index: usize,
    pub style: Style,
    pub player: &'a PlayerStats,
    /// Text of the choice that led here, if any.
    pub prior_choice: Option<&'a str>,
}

impl<'a> SceneContext<'a> {
    pub fn current_commit(&self) -> Option<&'a CommitRecord> {
        self.commits.get(self.current_index)
    }
}

/// Which producer wrote a scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneOrigin {
    Model,
    Template,
}

/// Scene facade. Built via `NarrativeSource::builder()`.
pub struct NarrativeSource {
    styles: StyleLibrary,
    completer: Option<Box<dyn TextCompleter>>,
    last_origin: Option<SceneOrigin>,
}

/// Builder for constructing a `NarrativeSource`.
#[derive(Default)]
pub struct NarrativeSourceBuilder {
    styles: Option<StyleLibrary>,
    styles_dir: Option<String>,
    completer: Option<Box<dyn TextCompleter>>,
}

impl NarrativeSource {
    pub fn builder() -> NarrativeSourceBuilder {
        NarrativeSourceBuilder::default()
    }

    /// Template-only source over the built-in styles.
    pub fn templates_only() -> Result<NarrativeSource, StyleError> {
        Self::builder().build()
    }

    pub fn profile(&self, style: Style) -> &StyleProfile {
        self.styles.get(style)
    }

    pub fn styles(&self) -> &StyleLibrary {
        &self.styles
    }

    pub fn has_model(&self) -> bool {
        self.completer.is_some()
    }

    /// Producer behind the most recent scene.
    pub fn last_origin(&self) -> Option<SceneOrigin> {
        self.last_origin
    }

    /// Produce the scene for `ctx`. Never fails.
    pub fn produce_scene(&mut self, ctx: &SceneContext<'_>) -> Scene {
        if let Some(scene) = self.try_model(ctx) {
            self.last_origin = Some(SceneOrigin::Model);
            return scene;
        }
        self.last_origin = Some(SceneOrigin::Template);
        fallback::produce(self.styles.get(ctx.style), ctx)
    }

    fn try_model(&mut self, ctx: &SceneContext<'_>) -> Option<Scene> {
        let completer = self.completer.as_mut()?;
        let system = &self.styles.get(ctx.style).system_prompt;
        let user = prompt::build_prompt(ctx);
        match completer.complete(system, &user) {
            Ok(text) => match prompt::parse_response(&text) {
                Some(scene) => {
                    debug!(
                        index = ctx.current_index,
                        choices = scene.choices.len(),
                        "model scene accepted"
                    );
                    Some(scene)
                }
                None => {
                    warn!(
                        index = ctx.current_index,
                        "model response had no narrative, using templates"
                    );
                    None
                }
            },
            Err(e) => {
                warn!(index = ctx.current_index, error = %e, "narrative generation failed, using templates");
                None
            }
        }
    }
}

impl NarrativeSourceBuilder {
    /// Provide a style library directly instead of the built-in one.
    pub fn with_styles(mut self, styles: StyleLibrary) -> Self {
        self.styles = Some(styles);
        self
    }

    /// Directory of `.ron` style overrides.
    pub fn styles_dir(mut self, path: &str) -> Self {
        self.styles_dir = Some(path.to_string());
        self
    }

    pub fn completer(mut self, completer: impl TextCompleter + 'static) -> Self {
        self.completer = Some(Box::new(completer));
        self
    }

    pub fn build(self) -> Result<NarrativeSource, StyleError> {
        let mut styles = match self.styles {
            Some(styles) => styles,
            None => StyleLibrary::builtin()?,
        };
        if let Some(dir) = &self.styles_dir {
            let loaded = styles.load_dir(std::path::Path::new(dir))?;
            debug!(dir = %dir, loaded, "style overrides loaded");
        }
        Ok(NarrativeSource {
            styles,
            completer: self.completer,
            last_origin: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::commit::Author;

    struct Scripted(Vec<Result<String, String>>);

    impl TextCompleter for Scripted {
        fn complete(&mut self, _system: &str, _user: &str) -> Result<String, CompletionError> {
            match self.0.pop() {
                Some(Ok(text)) => Ok(text),
                Some(Err(e)) => Err(CompletionError::Transport(e)),
                None => Err(CompletionError::Unavailable("script exhausted".to_string())),
            }
        }
    }

    fn commits() -> Vec<CommitRecord> {
        vec![CommitRecord::new(
            "abcdef0123",
            "fix the lighthouse",
            Author {
                name: "mo".to_string(),
                login: None,
                avatar: None,
            },
            "2024-06-01T14:00:00Z",
        )
        .unwrap()]
    }

    #[test]
    fn model_scene_preferred() {
        let mut source = NarrativeSource::builder()
            .completer(Scripted(vec![Ok("The light flickers.\nA) Climb\nB) Wait\nC) Leave".to_string())]))
            .build()
            .unwrap();
        let commits = commits();
        let player = PlayerStats::default();
        let ctx = SceneContext {
            commits: &commits,
            current_index: 0,
            style: Style::Scifi,
            player: &player,
            prior_choice: None,
        };
        let scene = source.produce_scene(&ctx);
        assert_eq!(scene.narrative, "The light flickers.");
        assert_eq!(source.last_origin(), Some(SceneOrigin::Model));

        // Script is now empty: the next call falls back.
        let scene = source.produce_scene(&ctx);
        assert_eq!(source.last_origin(), Some(SceneOrigin::Template));
        assert_eq!(scene.choices, source.profile(Style::Scifi).choices);
    }

    #[test]
    fn unusable_text_falls_back() {
        let mut source = NarrativeSource::builder()
            .completer(Scripted(vec![Ok("A) only choices".to_string())]))
            .build()
            .unwrap();
        let commits = commits();
        let player = PlayerStats::default();
        let ctx = SceneContext {
            commits: &commits,
            current_index: 0,
            style: Style::Horror,
            player: &player,
            prior_choice: None,
        };
        let scene = source.produce_scene(&ctx);
        assert_eq!(source.last_origin(), Some(SceneOrigin::Template));
        assert!(scene.narrative.contains("fix the lighthouse"));
    }

    #[test]
    fn templates_only_source() {
        let source = NarrativeSource::templates_only().unwrap();
        assert!(!source.has_model());
        assert_eq!(source.last_origin(), None);
    }
}
