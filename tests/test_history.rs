mod common;

use std::fs::File;
use std::time::{Duration, SystemTime};

use common::*;
use crackscan::history::{scan, LEGACY_CRACK_CONFIDENCE};

fn touch(path: &std::path::Path, age_secs: u64) -> anyhow::Result<()> {
    let file = File::create(path)?;
    file.set_modified(SystemTime::now() - Duration::from_secs(age_secs))?;
    Ok(())
}

#[test]
fn missing_directory_is_empty_history() -> anyhow::Result<()> {
    let dir = tempfile::TempDir::new()?;
    let entries = scan(&dir.path().join("nothing-here"))?;
    assert!(entries.is_empty());
    Ok(())
}

#[test]
fn lists_images_newest_first() -> anyhow::Result<()> {
    let dir = tempfile::TempDir::new()?;
    touch(&dir.path().join("20260101_000000_old_conf_0.1000.jpg"), 300)?;
    touch(&dir.path().join("20260102_000000_mid_conf_0.6000.png"), 200)?;
    touch(&dir.path().join("20260103_000000_new_conf_0.9500.JPG"), 100)?;
    touch(&dir.path().join("notes.txt"), 50)?;
    std::fs::create_dir(dir.path().join("nested.jpg"))?;

    let entries = scan(dir.path())?;
    let names: Vec<&str> = entries.iter().map(|e| e.file_name.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "20260103_000000_new_conf_0.9500.JPG",
            "20260102_000000_mid_conf_0.6000.png",
            "20260101_000000_old_conf_0.1000.jpg",
        ]
    );

    assert_eq!(entries[0].confidence, Some(0.95));
    assert_eq!(entries[0].severity, Severity::SevereCrack);
    assert_eq!(entries[1].severity, Severity::MildCrack);
    assert_eq!(entries[2].severity, Severity::NoCrack);
    assert!(!entries[2].is_crack());
    Ok(())
}

#[test]
fn legacy_and_unknown_names() -> anyhow::Result<()> {
    let dir = tempfile::TempDir::new()?;
    touch(&dir.path().join("wall_crack_20240101.jpg"), 10)?;
    touch(&dir.path().join("holiday.bmp"), 20)?;

    let entries = scan(dir.path())?;
    assert_eq!(entries.len(), 2);

    let legacy = &entries[0];
    assert_eq!(legacy.confidence, Some(LEGACY_CRACK_CONFIDENCE));
    assert_eq!(legacy.severity, Severity::SevereCrack);

    let unknown = &entries[1];
    assert_eq!(unknown.confidence, None);
    assert_eq!(unknown.severity, Severity::NoCrack);
    Ok(())
}

#[test]
fn saved_detections_show_up_in_history() -> anyhow::Result<()> {
    let input_dir = tempfile::TempDir::new()?;
    let output_dir = tempfile::TempDir::new()?;
    let source = write_image(&crack_wall(), input_dir.path(), "garage.png");

    let analysis = fontless_extractor(output_dir.path()).analyze_and_save(&source, 0.92, 0.5)?;

    let entries = scan(output_dir.path())?;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].path, analysis.output_path);
    assert_eq!(entries[0].confidence, Some(0.92));
    assert_eq!(entries[0].severity, analysis.severity);
    Ok(())
}

#[test]
fn reanalyzed_output_reports_latest_confidence() -> anyhow::Result<()> {
    let input_dir = tempfile::TempDir::new()?;
    let output_dir = tempfile::TempDir::new()?;
    let source = write_image(&blank_wall(), input_dir.path(), "old_conf_0.1000.png");

    let analysis = fontless_extractor(output_dir.path()).analyze_and_save(&source, 0.92, 0.5)?;

    let entries = scan(output_dir.path())?;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].path, analysis.output_path);
    assert_eq!(entries[0].confidence, Some(0.92));
    assert_eq!(entries[0].severity, Severity::SevereCrack);
    Ok(())
}
