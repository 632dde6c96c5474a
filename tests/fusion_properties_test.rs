//! Numeric contract of fusion, smoothing and the stats ledger, exercised
//! through the public API.

use chrono::Utc;
use fruitscan::fusion::{FusionConfig, ResultFuser, SmoothingConfig, SmoothingState};
use fruitscan::stats::{DetectionStats, HISTORY_CAP};
use fruitscan::verdict::{ClassifierVerdict, FusedResult, Label, Source, Species};

fn fused(label: Label, species: Species, confidence: f32) -> FusedResult {
    FusedResult {
        label,
        confidence,
        source: Source::Both,
        bbox: None,
        species,
        species_confidence: 0.8,
        diagnostics: Vec::new(),
        timestamp: Utc::now(),
    }
}

#[test]
fn agreement_fusion_matches_documented_example() {
    let fuser = ResultFuser::new(FusionConfig::default());
    let (label, conf, source) = fuser.fuse(
        Some(ClassifierVerdict::new(Label::Spoiled, 0.9)),
        ClassifierVerdict::new(Label::Spoiled, 0.9),
    );
    assert_eq!(label, Label::Spoiled);
    assert!((conf - 0.9).abs() < 1e-6);
    assert_eq!(source, Source::Both);
}

#[test]
fn disagreement_fusion_matches_documented_example() {
    let fuser = ResultFuser::new(FusionConfig::default());
    let (label, conf, source) = fuser.fuse(
        Some(ClassifierVerdict::new(Label::Spoiled, 0.8)),
        ClassifierVerdict::new(Label::Fresh, 0.5),
    );
    assert_eq!(label, Label::Spoiled);
    assert!((conf - 0.71).abs() < 1e-6);
    assert_eq!(source, Source::Model);
}

#[test]
fn majority_vote_three_against_two() {
    let mut smoothing = SmoothingState::new(SmoothingConfig::default());
    let window = [
        Label::Spoiled,
        Label::Spoiled,
        Label::Fresh,
        Label::Spoiled,
        Label::Fresh,
    ];
    let mut voted = Label::Unknown;
    for label in window {
        (voted, _) = smoothing.update(label, 0.5);
    }
    assert_eq!(voted, Label::Spoiled);
}

#[test]
fn ema_halves_the_distance() {
    let mut smoothing = SmoothingState::new(SmoothingConfig::default());
    smoothing.update(Label::Fresh, 0.4);
    let (_, ema) = smoothing.update(Label::Fresh, 0.8);
    assert!((ema - 0.6).abs() < 1e-6);
}

#[test]
fn success_rate_after_three_fruit_records() {
    let mut stats = DetectionStats::new();
    stats.record(&fused(Label::Fresh, Species::Apple, 0.9));
    stats.record(&fused(Label::Fresh, Species::Apple, 0.85));
    stats.record(&fused(Label::Spoiled, Species::Apple, 0.7));
    assert!((stats.summary.success_rate - 2.0 / 3.0).abs() < 1e-9);
}

#[test]
fn history_drops_oldest_past_the_cap() {
    let mut stats = DetectionStats::new();
    for i in 0..(HISTORY_CAP + 1) {
        let mut result = fused(Label::Fresh, Species::Apple, 0.5);
        result.species_confidence = i as f32;
        stats.record(&result);
    }
    assert_eq!(stats.detection_history.len(), HISTORY_CAP);
    // The very first record was evicted: every remaining classification is
    // still fresh but the ledger total kept counting.
    assert_eq!(stats.summary.total_detections, (HISTORY_CAP + 1) as u64);
}
