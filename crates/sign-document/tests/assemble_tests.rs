use lopdf::Document;
use sign_document::*;
use sign_render::{
    ArtifactRenderer, ArtifactSpec, BatchRunner, FontResolver, Rasterizer, RenderTask, TemplateRef,
};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

fn assembler() -> DocumentAssembler {
    DocumentAssembler::new(BatchRunner::new(ArtifactRenderer::new(
        Arc::new(FontResolver::builtin()),
        Rasterizer::new(),
    )))
}

fn spec() -> ArtifactSpec {
    ArtifactSpec {
        dpi: 300,
        ..ArtifactSpec::default()
    }
}

fn tasks(count: usize) -> Vec<RenderTask> {
    (1..=count)
        .map(|i| {
            RenderTask::with_id(
                format!("BLANKO_ruf_{i}"),
                TemplateRef::parse("BLANKO_ruf"),
                spec(),
            )
        })
        .collect()
}

fn media_box(doc: &Document, page: u32) -> (f32, f32) {
    let id = doc.get_pages()[&page];
    let dict = doc.get_dictionary(id).unwrap();
    let media = dict.get(b"MediaBox").unwrap().as_array().unwrap();
    (media[2].as_float().unwrap(), media[3].as_float().unwrap())
}

fn image_count(doc: &Document, page: u32) -> usize {
    let id = doc.get_pages()[&page];
    let dict = doc.get_dictionary(id).unwrap();
    let resources = dict.get(b"Resources").unwrap().as_dict().unwrap();
    resources.get(b"XObject").unwrap().as_dict().unwrap().len()
}

fn load(path: &Path) -> Document {
    Document::load(path).unwrap()
}

#[test]
fn test_one_artifact_per_page() {
    let dir = TempDir::new().unwrap();
    let job = DocumentJob::new(tasks(3), dir.path(), DocumentOptions::default())
        .with_timestamp("2024-05-01_12-00-00");

    let mut calls = Vec::new();
    let report = assembler()
        .assemble(&job, &mut |p| calls.push((p.completed, p.id.to_string())))
        .unwrap();

    assert!(report.is_success());
    assert_eq!(report.files.len(), 1);
    assert_eq!(report.pages, 3);
    assert_eq!(report.placed, 3);
    assert_eq!(
        report.files[0].file_name().unwrap().to_string_lossy(),
        "2024-05-01_12-00-00_Einzelzeichen_Zeichen_1_bis_3_Datei_1_von_1.pdf"
    );
    // submission order
    assert_eq!(calls[0], (1, "BLANKO_ruf_1".to_string()));
    assert_eq!(calls[2], (3, "BLANKO_ruf_3".to_string()));

    let doc = load(&report.files[0]);
    assert_eq!(doc.get_pages().len(), 3);
    // 51mm file size
    let (w, h) = media_box(&doc, 1);
    assert!((w - constants::mm_to_pt(51.0)).abs() < 0.01);
    assert!((h - constants::mm_to_pt(51.0)).abs() < 0.01);
    assert_eq!(image_count(&doc, 2), 1);
}

#[test]
fn test_per_page_documents_are_split() {
    let dir = TempDir::new().unwrap();
    let options = DocumentOptions {
        artifacts_per_file: 2,
        min_last_file_pages: 1,
        ..DocumentOptions::default()
    };
    let job = DocumentJob::new(tasks(5), dir.path(), options).with_timestamp("ts");
    let report = assembler().assemble(&job, &mut |_| {}).unwrap();

    let names: Vec<String> = report
        .files
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(
        names,
        [
            "ts_Einzelzeichen_Zeichen_1_bis_2_Datei_1_von_3.pdf",
            "ts_Einzelzeichen_Zeichen_3_bis_4_Datei_2_von_3.pdf",
            "ts_Einzelzeichen_Zeichen_5_bis_5_Datei_3_von_3.pdf",
        ]
    );
}

#[test]
fn test_short_last_document_is_merged() {
    let dir = TempDir::new().unwrap();
    let options = DocumentOptions {
        artifacts_per_file: 2,
        ..DocumentOptions::default()
    };
    let job = DocumentJob::new(tasks(5), dir.path(), options).with_timestamp("ts");
    let report = assembler().assemble(&job, &mut |_| {}).unwrap();

    assert_eq!(report.files.len(), 2);
    assert_eq!(load(&report.files[1]).get_pages().len(), 3);
}

#[test]
fn test_cut_sheet_grid_on_a4() {
    let dir = TempDir::new().unwrap();
    let job = DocumentJob::new(tasks(30), dir.path(), DocumentOptions::cut_sheet())
        .with_timestamp("ts");
    let report = assembler().assemble(&job, &mut |_| {}).unwrap();

    assert!(report.is_success());
    assert_eq!(report.placed, 30);
    assert_eq!(report.pages, 2);
    assert_eq!(report.files.len(), 1);
    assert!(report.files[0]
        .to_string_lossy()
        .ends_with("ts_Schnittbogen_Zeichen_1_bis_30_Datei_1_von_1.pdf"));

    let doc = load(&report.files[0]);
    let (w, h) = media_box(&doc, 1);
    assert!((w - constants::mm_to_pt(210.0)).abs() < 0.01);
    assert!((h - constants::mm_to_pt(297.0)).abs() < 0.01);
    // 4x6 grid
    assert_eq!(image_count(&doc, 1), 24);
    assert_eq!(image_count(&doc, 2), 6);
}

#[test]
fn test_failures_are_skipped() {
    let dir = TempDir::new().unwrap();
    let mut all = tasks(2);
    all.insert(
        1,
        RenderTask::new(TemplateRef::parse("/missing/Pumpe.svg"), spec()),
    );
    let job = DocumentJob::new(all, dir.path(), DocumentOptions::cut_sheet()).with_timestamp("ts");

    let mut calls = 0;
    let report = assembler().assemble(&job, &mut |_| calls += 1).unwrap();
    assert_eq!(calls, 3);
    assert_eq!(report.placed, 2);
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].0, "Pumpe");
    assert!(!report.is_success());
    assert_eq!(image_count(&load(&report.files[0]), 1), 2);
}

#[test]
fn test_empty_job_is_rejected() {
    let dir = TempDir::new().unwrap();
    let job = DocumentJob::new(Vec::new(), dir.path(), DocumentOptions::default());
    assert!(matches!(
        assembler().assemble(&job, &mut |_| {}),
        Err(DocumentError::NoArtifacts)
    ));
}

#[test]
fn test_artifact_larger_than_paper() {
    let dir = TempDir::new().unwrap();
    let big = ArtifactSpec {
        finished_height_mm: 300.0,
        finished_width_mm: 300.0,
        ..spec()
    };
    let job = DocumentJob::new(
        vec![RenderTask::new(TemplateRef::parse("BLANKO_ohne_text"), big)],
        dir.path(),
        DocumentOptions::cut_sheet(),
    );
    match assembler().assemble(&job, &mut |_| {}) {
        Err(DocumentError::Config(msg)) => assert!(msg.contains("does not fit")),
        _ => panic!("Expected Config error"),
    }
}

#[tokio::test]
async fn test_assemble_async() {
    let dir = TempDir::new().unwrap();
    let job = DocumentJob::new(tasks(2), dir.path(), DocumentOptions::default());
    let report = assembler().assemble_async(job, |_| {}).await.unwrap();
    assert_eq!(report.pages, 2);
    assert!(report.files[0].exists());
}

fn vector_tasks(dir: &Path, count: usize) -> Vec<RenderTask> {
    (0..count)
        .map(|i| {
            let path = dir.join(format!("Zeichen_{i}.svg"));
            let svg = format!(
                r##"<svg xmlns="http://www.w3.org/2000/svg" width="100" height="100"><rect x="10" y="10" width="80" height="80" fill="#{:02x}4080"/></svg>"##,
                i * 20
            );
            std::fs::write(&path, svg).unwrap();
            RenderTask::new(TemplateRef::Vector(path), spec())
        })
        .collect()
}

#[test]
fn test_one_raster_resident_regardless_of_file_size() {
    let templates = TempDir::new().unwrap();
    let file_px = sign_render::mm_to_px(51.0, 300) as usize;
    let one_raster = file_px * file_px * 4;

    for count in [2, 8] {
        let dir = TempDir::new().unwrap();
        let job = DocumentJob::new(
            vector_tasks(templates.path(), count),
            dir.path(),
            DocumentOptions::default(),
        );
        let report = assembler().assemble(&job, &mut |_| {}).unwrap();
        assert!(report.is_success());
        assert_eq!(report.placed, count);
        assert_eq!(report.peak_raster_bytes, one_raster);
    }
}

#[test]
fn test_cut_sheet_images_have_finished_size() {
    let templates = TempDir::new().unwrap();
    let dir = TempDir::new().unwrap();
    let job = DocumentJob::new(
        vector_tasks(templates.path(), 3),
        dir.path(),
        DocumentOptions::cut_sheet(),
    );
    let report = assembler().assemble(&job, &mut |_| {}).unwrap();
    assert_eq!(report.placed, 3);
    let file_px = sign_render::mm_to_px(51.0, 300) as usize;
    assert_eq!(report.peak_raster_bytes, file_px * file_px * 4);

    let finished_px = sign_render::mm_to_px(45.0, 300) as i64;
    let doc = load(&report.files[0]);
    let id = doc.get_pages()[&1];
    let resources = doc
        .get_dictionary(id)
        .unwrap()
        .get(b"Resources")
        .unwrap()
        .as_dict()
        .unwrap();
    let xobjects = resources.get(b"XObject").unwrap().as_dict().unwrap();
    assert_eq!(xobjects.len(), 3);
    for (_, image) in xobjects.iter() {
        let stream = doc
            .get_object(image.as_reference().unwrap())
            .unwrap()
            .as_stream()
            .unwrap();
        assert_eq!(stream.dict.get(b"Width").unwrap().as_i64().unwrap(), finished_px);
        assert_eq!(stream.dict.get(b"Height").unwrap().as_i64().unwrap(), finished_px);
    }
}
