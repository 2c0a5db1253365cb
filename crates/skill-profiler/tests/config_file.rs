//! `ProfilerConfig` loaded from a TOML document.

use std::time::Duration;

use anyhow::Result;
use skill_profiler::ProfilerConfig;

#[test]
fn test_partial_document_keeps_defaults() -> Result<()> {
    let cfg: ProfilerConfig = toml::from_str(
        r#"
        max_workers = 12
        success_rate_threshold = 0.9
        item_timeout_ms = 2500
        "#,
    )?;

    assert_eq!(cfg.max_workers, 12);
    assert_eq!(cfg.success_rate_threshold, 0.9);
    assert_eq!(cfg.item_timeout(), Duration::from_millis(2500));
    assert_eq!(cfg.target_batch_size, 10);
    assert_eq!(cfg.top_k_candidates, 20);
    assert_eq!(cfg.dedup_confidence_floor, 0.3);
    cfg.validate()?;
    Ok(())
}

#[test]
fn test_empty_document_is_the_default() -> Result<()> {
    let cfg: ProfilerConfig = toml::from_str("")?;
    assert_eq!(cfg, ProfilerConfig::default());
    Ok(())
}

#[test]
fn test_unknown_option_is_rejected() {
    let err = toml::from_str::<ProfilerConfig>("max_wrokers = 4").unwrap_err();
    assert!(err.to_string().contains("max_wrokers"));
}

#[test]
fn test_parsed_but_invalid_document_fails_validation() -> Result<()> {
    let cfg: ProfilerConfig = toml::from_str(
        r#"
        success_rate_threshold = 0.4
        partial_success_threshold = 0.6
        "#,
    )?;

    let err = cfg.validate().unwrap_err();
    assert!(err.to_string().contains("partial_success_threshold"));
    Ok(())
}

#[test]
fn test_config_round_trips_through_toml() -> Result<()> {
    let cfg = ProfilerConfig {
        max_retry_rounds: 1,
        top_skills_limit: 5,
        ..Default::default()
    };
    let text = toml::to_string(&cfg)?;
    let back: ProfilerConfig = toml::from_str(&text)?;
    assert_eq!(back, cfg);
    Ok(())
}
