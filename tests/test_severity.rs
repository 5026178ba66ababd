use std::path::Path;

use crackscan::detection::annotate::label_color;
use crackscan::models::{GREEN, ORANGE, RED};
use crackscan::storage::output_file_name;
use crackscan::{get_severity, parse_confidence, Outcome, Severity};

#[test]
fn severity_bands_are_inclusive_on_the_upper_band() {
    assert_eq!(get_severity(0.0), "No Crack");
    assert_eq!(get_severity(0.39), "No Crack");
    assert_eq!(get_severity(0.40), "Mild Crack");
    assert_eq!(get_severity(0.79), "Mild Crack");
    assert_eq!(get_severity(0.80), "Severe Crack");
    assert_eq!(get_severity(1.0), "Severe Crack");
}

#[test]
fn severity_colours() {
    assert_eq!(Severity::from_probability(0.1).color(), GREEN);
    assert_eq!(Severity::from_probability(0.5).color(), ORANGE);
    assert_eq!(Severity::from_probability(0.95).color(), RED);
}

#[test]
fn label_colour_is_strict_where_severity_is_inclusive() {
    assert_eq!(get_severity(0.8), "Severe Crack");
    assert_eq!(label_color(0.8), ORANGE);
    assert_eq!(label_color(0.80001), RED);

    assert_eq!(get_severity(0.4), "Mild Crack");
    assert_eq!(label_color(0.4), GREEN);
    assert_eq!(label_color(0.40001), ORANGE);
}

#[test]
fn threshold_decision_is_inclusive() {
    assert_eq!(Outcome::decide(0.5, 0.5), Outcome::Crack);
    assert_eq!(Outcome::decide(0.4999, 0.5), Outcome::NoCrack);
    assert_eq!(Outcome::decide(0.0, 0.0), Outcome::Crack);
    assert!(!Outcome::decide(0.99, 1.0).is_crack());
}

#[test]
fn file_name_confidence_round_trips() {
    let name = output_file_name("20260101_120000", Path::new("sample.jpg"), 0.8731);
    assert!(name.contains("conf_0.8731"));
    assert_eq!(parse_confidence(&name), Some(0.8731));

    for p in [0.0, 0.05, 0.5, 0.92, 1.0] {
        let name = output_file_name("20260101_120000", Path::new("x.png"), p);
        let parsed = parse_confidence(&name).unwrap();
        assert_eq!(format!("{parsed:.4}"), format!("{p:.4}"));
    }
}

#[test]
fn severity_serializes_snake_case() -> anyhow::Result<()> {
    assert_eq!(serde_json::to_string(&Severity::MildCrack)?, "\"mild_crack\"");
    assert_eq!(serde_json::to_string(&Outcome::NoCrack)?, "\"no_crack\"");
    Ok(())
}
