use sign_render::*;

#[test]
fn test_default_options_are_valid() {
    assert!(ExportOptions::default().validate().is_ok());
}

#[test]
fn test_validation_font_size_range() {
    let mut options = ExportOptions::default();
    options.font_size_pt = 5.0;
    let result = options.validate();
    assert!(result.is_err());
    match result {
        Err(RenderError::Config(msg)) => {
            assert!(msg.contains("Font size"));
        }
        _ => panic!("Expected Config error"),
    }

    options.font_size_pt = 200.0;
    assert!(options.validate().is_ok());
}

#[test]
fn test_validation_dpi_must_be_supported() {
    let mut options = ExportOptions::default();
    for dpi in [300, 600, 1200] {
        options.dpi = dpi;
        assert!(options.validate().is_ok());
    }

    options.dpi = 450;
    match options.validate() {
        Err(RenderError::Config(msg)) => assert!(msg.contains("DPI")),
        _ => panic!("Expected Config error"),
    }
}

#[test]
fn test_validation_geometry_ranges() {
    let mut options = ExportOptions::default();

    // Valid: large square
    options.finished_height_mm = 500.0;
    options.finished_width_mm = 500.0;
    assert!(options.validate().is_ok());

    // Invalid: too small
    options.finished_height_mm = 9.0;
    assert!(options.validate().is_err());

    // Invalid: bleed over 20mm
    options.finished_height_mm = 45.0;
    options.bleed_mm = 21.0;
    assert!(options.validate().is_err());

    // Invalid: safety margin eats the canvas
    options.bleed_mm = 3.0;
    options.finished_height_mm = 30.0;
    options.safety_mm = 15.0;
    match options.validate() {
        Err(RenderError::Config(msg)) => assert!(msg.contains("no canvas")),
        _ => panic!("Expected Config error"),
    }
}

#[test]
fn test_validation_strength_groups() {
    let mut options = ExportOptions::default();

    options.strength_digits = vec![1, 1, 2];
    match options.validate() {
        Err(RenderError::Config(msg)) => assert!(msg.contains("exactly 4")),
        _ => panic!("Expected Config error"),
    }

    options.strength_digits = vec![1, 1, 2, 21];
    assert!(options.validate().is_err());

    options.strength_digits = vec![20, 1, 2, 2];
    assert!(options.validate().is_ok());
}

#[test]
fn test_validation_dual_panel_ranges() {
    let mut options = ExportOptions::default();
    options.dual_panel.left_percent = 19;
    assert!(options.validate().is_err());

    options.dual_panel.left_percent = 80;
    options.dual_panel.rule_count = 11;
    assert!(options.validate().is_err());

    options.dual_panel.rule_count = 3;
    assert!(options.validate().is_ok());
}

#[test]
fn test_tasks_expand_copies() {
    let mut options = ExportOptions::default();
    options.templates = vec!["signs/Pumpe.svg".to_string(), "BLANKO_ruf".to_string()];
    assert_eq!(options.tasks().len(), 2);
    assert_eq!(options.tasks()[0].id, "Pumpe");

    options.copies = 3;
    let tasks = options.tasks();
    assert_eq!(tasks.len(), 6);
    assert_eq!(tasks[0].id, "Pumpe_1");
    assert_eq!(tasks[5].id, "BLANKO_ruf_3");
    assert!(tasks[5].template.is_blank());
}

#[test]
fn test_spec_carries_options() {
    let mut options = ExportOptions::default();
    options.dpi = 300;
    options.strength_digits = vec![2, 2, 3, 3];
    options.layout = LayoutKind::DualPanel;
    let spec = options.spec();
    assert_eq!(spec.dpi, 300);
    assert_eq!(spec.strength_digits, [2, 2, 3, 3]);
    assert!(spec.is_dual_panel());
}

#[test]
fn test_job_uses_scheduling_options() {
    let mut options = ExportOptions::default();
    options.templates = vec!["BLANKO_freitext".to_string()];
    options.threads = 2;
    options.chunk_size = Some(7);
    let job = options.job();
    assert_eq!(job.threads, 2);
    assert_eq!(job.effective_chunk_size(), 7);
    assert_eq!(job.tasks.len(), 1);
}

#[cfg(feature = "serde")]
#[tokio::test]
async fn test_save_and_load_options() {
    use tempfile::NamedTempFile;

    let mut options = ExportOptions::default();
    options.templates.push("signs/Zugtrupp.svg".to_string());
    options.layout = LayoutKind::DualPanel;
    options.finished_width_mm = 90.0;
    options.mode = TextMode::CallName {
        name: Some("Heros Musterstadt 21/1".to_string()),
    };
    options.custom_graphic_mm = Some(SizeMm::new(20.0, 25.0));
    options.dual_panel.rule_count = 5;
    options.draw_guides = true;

    let temp_file = NamedTempFile::new().unwrap();
    let path = temp_file.path();

    // Save
    options.save(path).await.unwrap();

    // Load
    let loaded = ExportOptions::load(path).await.unwrap();
    assert_eq!(loaded, options);
}

#[cfg(feature = "serde")]
#[tokio::test]
async fn test_partial_config_uses_defaults() {
    use tempfile::NamedTempFile;

    let temp_file = NamedTempFile::new().unwrap();
    tokio::fs::write(
        temp_file.path(),
        r#"{ "dpi": 300, "layout": "s1", "mode": { "mode": "ohne_text", "position": "unten" } }"#,
    )
    .await
    .unwrap();

    let loaded = ExportOptions::load(temp_file.path()).await.unwrap();
    assert_eq!(loaded.dpi, 300);
    assert_eq!(loaded.layout, LayoutKind::DualPanel);
    assert_eq!(
        loaded.mode,
        TextMode::GraphicOnly {
            position: GraphicPosition::Bottom
        }
    );
    assert_eq!(loaded.finished_height_mm, 45.0);
}

#[cfg(feature = "serde")]
#[tokio::test]
async fn test_load_rejects_garbage() {
    use tempfile::NamedTempFile;

    let temp_file = NamedTempFile::new().unwrap();
    tokio::fs::write(temp_file.path(), b"not json").await.unwrap();
    match ExportOptions::load(temp_file.path()).await {
        Err(RenderError::Config(msg)) => assert!(msg.contains("parse")),
        _ => panic!("Expected Config error"),
    }
}
