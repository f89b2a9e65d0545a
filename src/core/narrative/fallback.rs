/// Deterministic template producer. No I/O and no randomness: the same
/// context always renders the same scene.

use std::borrow::Cow;

use rustc_hash::FxHashSet;

use super::prompt::time_of_day;
use super::SceneContext;
use crate::core::style_profile::StyleProfile;
use crate::core::template::{FieldSource, TemplateField};
use crate::schema::commit::CommitRecord;
use crate::schema::scene::Scene;
use crate::schema::state::{chapter_for, progress_fraction, PlayerStats};

/// Template values for one position in a history.
pub struct SceneFields<'a> {
    pub commit: Option<&'a CommitRecord>,
    pub index: usize,
    pub total: usize,
    pub author_count: usize,
    pub player: &'a PlayerStats,
}

impl<'a> SceneFields<'a> {
    pub fn new(commits: &'a [CommitRecord], index: usize, player: &'a PlayerStats) -> Self {
        let authors: FxHashSet<&str> = commits.iter().map(|c| c.author.handle()).collect();
        Self {
            commit: commits.get(index),
            index,
            total: commits.len(),
            author_count: authors.len(),
            player,
        }
    }
}

impl FieldSource for SceneFields<'_> {
    fn field(&self, field: TemplateField) -> Cow<'_, str> {
        let commit = self.commit;
        match field {
            TemplateField::Subject => {
                Cow::Borrowed(commit.map_or("an unwritten page", |c| c.subject.as_str()))
            }
            TemplateField::Author => Cow::Borrowed(commit.map_or("a stranger", |c| c.author.handle())),
            TemplateField::ShortSha => Cow::Borrowed(commit.map_or("0000000", |c| c.short_sha.as_str())),
            TemplateField::Progress => {
                let pct = (progress_fraction(self.index, self.total) * 100.0).round() as u32;
                Cow::Owned(pct.to_string())
            }
            TemplateField::CommitNumber => Cow::Owned((self.index + 1).to_string()),
            TemplateField::Total => Cow::Owned(self.total.to_string()),
            TemplateField::Chapter => Cow::Owned(chapter_for(self.index).to_string()),
            TemplateField::TimeOfDay => Cow::Borrowed(time_of_day(commit.map_or(0, |c| c.hour))),
            TemplateField::Hp => Cow::Owned(self.player.hp.to_string()),
            TemplateField::MaxHp => Cow::Owned(self.player.max_hp.to_string()),
            TemplateField::Level => Cow::Owned(self.player.level.to_string()),
            TemplateField::Xp => Cow::Owned(self.player.xp.to_string()),
            TemplateField::ItemCount => Cow::Owned(self.player.inventory.len().to_string()),
            TemplateField::AuthorCount => Cow::Owned(self.author_count.to_string()),
        }
    }
}

/// Closing line keyed to remaining health.
pub fn health_flourish(player: &PlayerStats) -> &'static str {
    let max = player.max_hp.max(1);
    let pct = player.hp.max(0) * 100 / max;
    match pct {
        0..=24 => "You are badly hurt, and every step costs you.",
        25..=49 => "Your wounds ache, but you keep moving.",
        50..=74 => "A few scrapes, nothing you cannot carry.",
        _ => "You feel strong and ready.",
    }
}

/// Render the fallback scene for a context.
pub fn produce(profile: &StyleProfile, ctx: &SceneContext<'_>) -> Scene {
    let fields = SceneFields::new(ctx.commits, ctx.current_index, ctx.player);
    let mut narrative = match profile.templates.len() {
        0 => String::new(),
        n => profile.templates[ctx.current_index % n].render(&fields),
    };
    if !narrative.is_empty() {
        narrative.push_str("\n\n");
    }
    narrative.push_str(health_flourish(ctx.player));

    Scene {
        narrative,
        choices: profile.choices.clone(),
        is_epilogue: false,
    }
}
