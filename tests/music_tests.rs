/// Music integration tests — analysis, plan derivation and layer gating.
use commit_quest::core::analyzer::analyze;
use commit_quest::core::audio::{HeadlessEngine, Layer, TransportState};
use commit_quest::core::composer::Composer;
use commit_quest::core::plan::MusicalPlan;
use commit_quest::core::rng::SeededRng;
use commit_quest::core::style_profile::StyleLibrary;
use commit_quest::schema::commit::{Author, CommitRecord};
use commit_quest::schema::style::Style;
use pretty_assertions::assert_eq;

fn commit(sha: &str, subject: &str, author: &str, date: &str) -> CommitRecord {
    CommitRecord::new(
        sha,
        subject,
        Author {
            name: author.to_string(),
            login: None,
            avatar: None,
        },
        date,
    )
    .unwrap()
}

/// `count` commits spread over `authors` people, `per_day` commits a day.
fn burst(count: usize, authors: usize, per_day: usize) -> Vec<CommitRecord> {
    (0..count)
        .map(|i| {
            let day = 1 + i / per_day;
            let hour = 8 + (i % per_day) % 12;
            commit(
                &format!("{:040x}", 0xc0ffee + i * 131),
                "update things",
                &format!("author{}", i % authors),
                &format!("2024-02-{day:02}T{hour:02}:00:00Z"),
            )
        })
        .collect()
}

#[test]
fn hash_seed_folds_first_five_shas() {
    let commits = vec![
        commit("aaaaaaaa0123456789", "one", "a", "2024-01-01T10:00:00Z"),
        commit("11111111abcdef", "two", "a", "2024-01-01T11:00:00Z"),
        commit("22222222abcdef", "three", "a", "2024-01-01T12:00:00Z"),
        commit("33333333abcdef", "four", "a", "2024-01-01T13:00:00Z"),
        commit("44444444abcdef", "five", "a", "2024-01-01T14:00:00Z"),
        commit("ffffffffabcdef", "six is ignored", "a", "2024-01-01T15:00:00Z"),
    ];
    let analysis = analyze(&commits).unwrap();
    // 0xaaaaaaaa ^ 0x11111111 ^ 0x22222222 ^ 0x33333333 ^ 0x44444444
    assert_eq!(analysis.hash_seed, 0xeeee_eeee);
    assert_eq!(analysis.hash_seed, 4_008_636_142);
}

#[test]
fn analysis_is_pure() {
    let commits = burst(30, 3, 4);
    assert_eq!(analyze(&commits), analyze(&commits));
}

#[test]
fn seeded_rng_sequences_repeat() {
    let mut a = SeededRng::new(42);
    let mut b = SeededRng::new(42);
    let first: Vec<f64> = (0..1000).map(|_| a.next_f64()).collect();
    let second: Vec<f64> = (0..1000).map(|_| b.next_f64()).collect();
    assert_eq!(first, second);
    assert!(first.iter().all(|v| (0.0..=1.0).contains(v)));
}

#[test]
fn plan_is_reproducible_per_style() {
    let library = StyleLibrary::builtin().unwrap();
    let analysis = analyze(&burst(12, 2, 3)).unwrap();
    for style in Style::ALL {
        let profile = library.get(style);
        let plan = MusicalPlan::derive(profile, &analysis);
        assert_eq!(plan, MusicalPlan::derive(profile, &analysis));
        assert_eq!(plan.melody.len(), 16);
        assert_eq!(plan.bass.len(), 8);
        assert_eq!(plan.percussion.len(), 16);
        assert_eq!(plan.root, (analysis.hash_seed % 12) as u8);
        assert!(profile.music.scales.contains(&plan.scale));
    }
}

#[test]
fn single_author_gets_no_bass_or_pad() {
    let library = StyleLibrary::builtin().unwrap();
    let analysis = analyze(&burst(6, 1, 2)).unwrap();
    assert_eq!(analysis.music.voices, 1);

    let mut composer = Composer::new(HeadlessEngine::new());
    composer
        .initialize(library.get(Style::Fantasy), &analysis)
        .unwrap();
    let layers = composer.engine().voice_layers();
    assert!(layers.contains(&Layer::Melody));
    assert!(!layers.contains(&Layer::Bass));
    assert!(!layers.contains(&Layer::Pad));
    assert!(layers.contains(&Layer::Percussion));
    assert_eq!(composer.engine().transport(), TransportState::Stopped);
}

#[test]
fn full_band_for_four_authors() {
    let library = StyleLibrary::builtin().unwrap();
    let calm = analyze(&burst(8, 5, 1)).unwrap();
    let busy = analyze(&burst(40, 5, 8)).unwrap();
    assert_eq!(calm.music.voices, 4);
    assert!(calm.music.energy <= 0.5);
    assert!(busy.music.energy > 0.5);

    let mut composer = Composer::new(HeadlessEngine::new());
    composer
        .initialize(library.get(Style::Scifi), &calm)
        .unwrap();
    assert_eq!(
        composer.layers(),
        &[Layer::Melody, Layer::Bass, Layer::Pad, Layer::Percussion]
    );

    composer
        .initialize(library.get(Style::Horror), &calm)
        .unwrap();
    assert_eq!(composer.layers(), &[Layer::Melody, Layer::Bass, Layer::Pad]);

    composer
        .initialize(library.get(Style::Horror), &busy)
        .unwrap();
    assert_eq!(
        composer.layers(),
        &[Layer::Melody, Layer::Bass, Layer::Pad, Layer::Percussion]
    );
}

#[test]
fn reinitialize_leaves_one_plan_alive() {
    let library = StyleLibrary::builtin().unwrap();
    let analysis = analyze(&burst(10, 4, 2)).unwrap();
    let mut composer = Composer::new(HeadlessEngine::new());

    composer
        .initialize(library.get(Style::Fantasy), &analysis)
        .unwrap();
    let live = composer.engine().live_nodes();
    for style in [Style::Scifi, Style::Fantasy] {
        composer.initialize(library.get(style), &analysis).unwrap();
    }
    assert_eq!(composer.engine().live_nodes(), live);

    composer.play();
    assert!(composer.is_playing());
    composer.dispose();
    assert_eq!(composer.engine().live_nodes(), 0);
    assert!(!composer.is_initialized());
}
