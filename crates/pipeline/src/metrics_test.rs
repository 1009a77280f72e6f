//! Tests for the metrics holder

use std::time::Duration;

use super::*;

fn holder() -> MetricsHolder {
    MetricsHolder::new(Duration::from_secs(3600))
}

#[test]
fn test_counts_per_action_and_status() {
    let holder = holder();
    holder.add_action(Some("first".into()));
    holder.add_action(Some("second".into()));

    holder.count_event(0, STATUS_RECEIVED);
    holder.count_event(0, STATUS_RECEIVED);
    holder.count_event(0, STATUS_PASSED);
    holder.count_event(1, STATUS_DISCARDED);

    let first = holder.action_values(0).unwrap();
    assert_eq!(first[0], (STATUS_RECEIVED.to_string(), 2));
    assert_eq!(first[1], (STATUS_DISCARDED.to_string(), 0));
    assert_eq!(first[2], (STATUS_PASSED.to_string(), 1));

    let second = holder.action_values(1).unwrap();
    assert_eq!(second[1], (STATUS_DISCARDED.to_string(), 1));
}

#[test]
fn test_unconfigured_action_is_a_noop() {
    let holder = holder();
    holder.add_action(None);

    holder.count_event(0, STATUS_RECEIVED);
    assert!(holder.action_values(0).is_none());
}

#[test]
fn test_out_of_range_index_is_ignored() {
    let holder = holder();
    holder.count_event(5, STATUS_RECEIVED);
    assert!(holder.action_values(5).is_none());
}

#[test]
fn test_rotation_clears_current_window() {
    let holder = MetricsHolder::new(Duration::from_millis(0));
    holder.add_action(Some("m".into()));
    holder.count_event(0, STATUS_RECEIVED);

    // interval of zero makes the next maintenance tick rotate
    holder.maintenance();

    let values = holder.action_values(0).unwrap();
    assert_eq!(values[0], (STATUS_RECEIVED.to_string(), 0));
}

#[test]
fn test_rotation_respects_interval() {
    let holder = MetricsHolder::new(Duration::from_secs(3600));
    holder.add_action(Some("m".into()));
    holder.count_event(0, STATUS_RECEIVED);

    // far from due: nothing rotates
    holder.maintenance();

    let values = holder.action_values(0).unwrap();
    assert_eq!(values[0], (STATUS_RECEIVED.to_string(), 1));
}

#[test]
fn test_custom_status_is_reported_after_well_known() {
    let holder = holder();
    holder.add_action(Some("m".into()));
    holder.count_event(0, "collapsed");

    let values = holder.action_values(0).unwrap();
    assert_eq!(values.len(), 4);
    assert_eq!(values[3], ("collapsed".to_string(), 1));
}
