use sign_document::*;

#[test]
fn test_default_options() {
    let options = DocumentOptions::default();
    assert!(options.validate().is_ok());
    assert_eq!(options.kind, DocumentKind::PerPage);
    assert_eq!(options.margin_horizontal_mm, 10.0);
    assert_eq!(options.artifacts_per_file, 100);
    assert_eq!(DocumentOptions::cut_sheet().pages_per_file, 50);
}

#[test]
fn test_validation_margins() {
    let options = DocumentOptions {
        margin_vertical_mm: -1.0,
        ..DocumentOptions::default()
    };
    match options.validate() {
        Err(DocumentError::Config(msg)) => assert!(msg.contains("Vertical margin")),
        _ => panic!("Expected Config error"),
    }
}

#[test]
fn test_validation_split_sizes() {
    let options = DocumentOptions {
        pages_per_file: 0,
        ..DocumentOptions::cut_sheet()
    };
    assert!(options.validate().is_err());

    let options = DocumentOptions {
        paper: PaperSize::Custom {
            width_mm: 0.0,
            height_mm: 100.0,
        },
        ..DocumentOptions::cut_sheet()
    };
    assert!(options.validate().is_err());
}

#[test]
fn test_landscape_wins_when_it_holds_more() {
    let grid = GridLayout::fit(PaperSize::A4, sign_render::SizeMm::new(100.0, 50.0), 10.0, 10.0)
        .unwrap();
    assert_eq!(grid.orientation, Orientation::Landscape);
    assert_eq!((grid.cols, grid.rows), (2, 3));
    assert_eq!(grid.page.width, 297.0);
}

#[test]
fn test_dual_panel_cells() {
    let grid =
        GridLayout::fit(PaperSize::A4, sign_render::SizeMm::new(90.0, 45.0), 10.0, 10.0).unwrap();
    assert_eq!(grid.orientation, Orientation::Portrait);
    assert_eq!(grid.per_page(), 12);
}
