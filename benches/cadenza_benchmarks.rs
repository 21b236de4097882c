//! # Cadenza Performance Benchmarks
//!
//! - **Scoring**: single track and batch discovery scores, ranking
//! - **Profile**: building a profile from a long history
//! - **Catalog**: filter compilation and evaluation in SQLite
//!
//! ```bash
//! cargo bench
//! cargo bench scoring
//! ```

use cadenza::algorithm::{self, ScoringContext};
use cadenza::db::SqliteStore;
use cadenza::discovery::{self, DiscoveryLimits};
use cadenza::models::{Dataset, ListenedTrack, ListeningRecord, RatedTrack, RatingRecord, Track, User};
use cadenza::profile::{self, PreferenceProfile, ProfileWeights};
use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use std::hint::black_box;

const GENRES: [&str; 6] = ["Jazz", "Rock", "Pop", "Folk", "Soul", "Techno"];
const MOODS: [&str; 4] = ["calm", "happy", "sad", "dark"];

fn create_test_tracks(count: usize) -> Vec<Track> {
    (0..count)
        .map(|i| {
            let id = i as i64 + 1;
            Track {
                id,
                title: format!("Track {id}"),
                genre: Some(GENRES[i % GENRES.len()].to_string()),
                mood: (i % 5 != 0).then(|| MOODS[i % MOODS.len()].to_string()),
                bpm: Some(70 + (i as u32 * 7) % 110),
                average_rating: (i % 11) as f64 / 2.0,
                like_count: (i * 13 % 200) as u32,
                uploaded_at: 1_700_000_000 + id,
                artist_ids: vec![1 + (i as i64 % 20)],
            }
        })
        .collect()
}

fn create_history(tracks: &[Track]) -> (Vec<RatedTrack>, Vec<ListenedTrack>) {
    let rated = tracks
        .iter()
        .step_by(3)
        .map(|track| RatedTrack {
            rating: RatingRecord { user_id: 100, track_id: track.id, liked: track.id % 2 == 0 },
            track: track.clone(),
        })
        .collect();
    let listened = tracks
        .iter()
        .step_by(2)
        .map(|track| ListenedTrack {
            record: ListeningRecord {
                user_id: 100,
                track_id: track.id,
                listen_count: (track.id % 9) as u32,
                last_listened_at: 1_700_100_000 + track.id,
            },
            track: track.clone(),
        })
        .collect();
    (rated, listened)
}

fn create_profile() -> PreferenceProfile {
    let tracks = create_test_tracks(200);
    let (rated, listened) = create_history(&tracks);
    profile::build_profile(&rated, &listened, [1, 2, 3], &ProfileWeights::default())
}

fn benchmark_scoring(c: &mut Criterion) {
    let mut group = c.benchmark_group("scoring");
    let profile = create_profile();
    let context = ScoringContext::default();

    let track = create_test_tracks(1).remove(0);
    group.bench_function("single_track_score", |b| {
        b.iter(|| algorithm::calculate_discovery_score(black_box(&track), black_box(&profile), black_box(&context)))
    });

    for size in [25, 100, 1000] {
        let tracks = create_test_tracks(size);
        group.bench_with_input(BenchmarkId::new("batch_scoring", size), &tracks, |b, tracks| {
            b.iter(|| {
                algorithm::batch_calculate_scores(black_box(tracks), &profile, &context).collect::<Vec<_>>()
            })
        });
    }

    let large = create_test_tracks(1000);
    group.bench_function("rank_1000_tracks", |b| {
        b.iter_batched(
            || large.clone(),
            |tracks| algorithm::rank_candidates(black_box(tracks), &profile, &context, 20),
            BatchSize::SmallInput,
        )
    });

    group.finish();
}

fn benchmark_profile(c: &mut Criterion) {
    let mut group = c.benchmark_group("profile");
    let weights = ProfileWeights::default();

    for size in [100, 1000, 10_000] {
        let tracks = create_test_tracks(size);
        let history = create_history(&tracks);
        group.bench_with_input(BenchmarkId::new("build_profile", size), &history, |b, (rated, listened)| {
            b.iter(|| profile::build_profile(black_box(rated), black_box(listened), [1, 2], &weights))
        });
    }

    group.finish();
}

fn benchmark_catalog(c: &mut Criterion) {
    let mut group = c.benchmark_group("catalog");

    let tracks = create_test_tracks(5000);
    let (rated, listened) = create_history(&tracks);
    let store = SqliteStore::open_in_memory().expect("Failed to open database");
    store
        .import_dataset(&Dataset {
            users: (1..=20)
                .chain([100])
                .map(|id| User { id, name: format!("user {id}") })
                .collect(),
            tracks,
            ratings: rated.iter().map(|entry| entry.rating.clone()).collect(),
            listens: listened.iter().map(|entry| entry.record.clone()).collect(),
            follows: vec![],
        })
        .expect("Failed to import benchmark dataset");

    let profile = create_profile();
    let limits = DiscoveryLimits::default();
    let context = ScoringContext::default();

    group.bench_function("discover_5000_tracks", |b| {
        b.iter(|| discovery::discover(&store, black_box(100), &profile, &limits, &context).expect("discover"))
    });

    group.finish();
}

criterion_group!(benches, benchmark_scoring, benchmark_profile, benchmark_catalog);
criterion_main!(benches);
