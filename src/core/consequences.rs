/// Turn consequences: how a resolved choice changes the player.
///
/// Rules run in a fixed order (experience, health, items, quests) and only
/// read the subject of the commit the choice was made on.

use rand::seq::SliceRandom;
use rand::Rng;

use crate::core::classify::{is, CommitCategory};
use crate::core::style_profile::StyleProfile;
use crate::schema::state::{GameState, INVENTORY_CAPACITY, MAX_LEVEL};

/// Cumulative XP needed to leave each level, indexed by current level.
pub const XP_PER_LEVEL: [u32; 10] = [0, 100, 250, 450, 700, 1000, 1400, 1900, 2500, 3200];
pub const XP_GAIN_MIN: u32 = 20;
pub const XP_GAIN_MAX: u32 = 49;
pub const LEVEL_UP_MAX_HP: i32 = 10;
pub const LEVEL_UP_HEAL: i32 = 20;
/// Option 0 on a fix commit is the risky one.
pub const RISK_DAMAGE: i32 = 10;
/// Option 2 on a fix commit is the careful one.
pub const REST_HEAL: i32 = 5;
/// A feat commit drops an item when a uniform draw exceeds this.
pub const ITEM_DROP_THRESHOLD: f64 = 0.6;

/// What one turn did, for logging and tests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TurnReport {
    pub xp_gained: u32,
    pub new_level: Option<u32>,
    pub hp_delta: i32,
    pub item: Option<String>,
    pub quests: Vec<String>,
}

/// Level a player with `xp` total experience should be at.
pub fn level_for_xp(xp: u32) -> u32 {
    let crossed = XP_PER_LEVEL[1..].iter().filter(|&&t| xp >= t).count() as u32;
    (1 + crossed).min(MAX_LEVEL)
}

/// HP change for a choice on a fix commit. Custom choices are neutral.
pub fn fix_hp_delta(option: Option<usize>) -> i32 {
    match option {
        Some(0) => -RISK_DAMAGE,
        Some(2) => REST_HEAL,
        _ => 0,
    }
}

/// Apply every rule for the commit under the cursor.
///
/// `option` is the chosen option index, `None` for a free-text choice.
pub fn apply(
    state: &mut GameState,
    profile: &StyleProfile,
    option: Option<usize>,
    rng: &mut impl Rng,
) -> TurnReport {
    let subject = state
        .current_commit()
        .map(|c| c.subject.clone())
        .unwrap_or_default();
    let mut report = TurnReport::default();

    // Experience and levelling.
    let gain = rng.gen_range(XP_GAIN_MIN..=XP_GAIN_MAX);
    let stats = &mut state.stats;
    stats.xp += gain;
    report.xp_gained = gain;
    let level_index = stats.level as usize;
    if stats.level < MAX_LEVEL
        && XP_PER_LEVEL
            .get(level_index)
            .is_some_and(|&threshold| stats.xp >= threshold)
    {
        stats.level += 1;
        stats.max_hp += LEVEL_UP_MAX_HP;
        stats.hp = (stats.hp + LEVEL_UP_HEAL).min(stats.max_hp);
        report.new_level = Some(stats.level);
        let entry = format!("{}{}", profile.quests.level_up, stats.level);
        report.quests.push(entry.clone());
        state.log_quest(entry);
    }

    // Health.
    if is(CommitCategory::Fix, &subject) {
        let delta = fix_hp_delta(option);
        let stats = &mut state.stats;
        let before = stats.hp;
        stats.hp = (stats.hp + delta).clamp(1, stats.max_hp);
        report.hp_delta = stats.hp - before;
    }

    // Items.
    if is(CommitCategory::Feat, &subject) && rng.gen::<f64>() > ITEM_DROP_THRESHOLD {
        if let Some(item) = profile.items.choose(rng) {
            let inventory = &mut state.stats.inventory;
            if inventory.len() < INVENTORY_CAPACITY && !inventory.contains(item) {
                inventory.push(item.clone());
                report.item = Some(item.clone());
            }
        }
    }

    // Quests.
    for (category, flavor) in [
        (CommitCategory::Refactor, &profile.quests.refactor),
        (CommitCategory::Release, &profile.quests.release),
        (CommitCategory::Merge, &profile.quests.merge),
    ] {
        if is(category, &subject) {
            report.quests.push(flavor.clone());
            state.log_quest(flavor.clone());
        }
    }

    report
}
