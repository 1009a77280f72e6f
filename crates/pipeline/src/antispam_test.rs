//! Tests for the antispam filter

use super::Antispamer;
use crate::event::SourceId;

#[test]
fn test_zero_threshold_disables() {
    let antispam = Antispamer::new(0);
    for _ in 0..1000 {
        assert!(!antispam.is_spam(SourceId(1), "s", false));
    }
    assert_eq!(antispam.source_count(), 0);
}

#[test]
fn test_burst_is_banned_after_threshold() {
    let antispam = Antispamer::new(10);

    let mut passed = 0;
    let mut rejected = 0;
    for _ in 0..50 {
        if antispam.is_spam(SourceId(1), "s", false) {
            rejected += 1;
        } else {
            passed += 1;
        }
    }
    assert_eq!(passed, 10);
    assert_eq!(rejected, 40);
}

#[test]
fn test_decay_unbans_gradually() {
    let antispam = Antispamer::new(10);
    for _ in 0..50 {
        antispam.is_spam(SourceId(1), "s", false);
    }

    // counter 50 -> 12: still over the threshold
    antispam.maintenance();
    assert!(antispam.is_spam(SourceId(1), "s", false));

    // 13 -> 3: back under, traffic flows again
    antispam.maintenance();
    assert!(!antispam.is_spam(SourceId(1), "s", false));
}

#[test]
fn test_quiet_source_is_forgotten() {
    let antispam = Antispamer::new(10);
    antispam.is_spam(SourceId(1), "s", false);
    assert_eq!(antispam.source_count(), 1);

    // 1 -> 0 drops the entry
    antispam.maintenance();
    assert_eq!(antispam.source_count(), 0);
}

#[test]
fn test_new_source_resets_counter() {
    let antispam = Antispamer::new(5);
    for _ in 0..20 {
        antispam.is_spam(SourceId(1), "s", false);
    }
    assert!(antispam.is_spam(SourceId(1), "s", false));

    // the file was rotated or the container restarted: clean slate
    assert!(!antispam.is_spam(SourceId(1), "s", true));
}

#[test]
fn test_sources_are_independent() {
    let antispam = Antispamer::new(3);
    for _ in 0..10 {
        antispam.is_spam(SourceId(1), "noisy", false);
    }
    assert!(antispam.is_spam(SourceId(1), "noisy", false));
    assert!(!antispam.is_spam(SourceId(2), "calm", false));
}
