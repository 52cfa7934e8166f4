use std::fs;
use std::path::{Path, PathBuf};

use image::{Rgb, RgbImage};
use tempfile::TempDir;

use custom_vision_batch::{
    config::{AppConfig, KEY_SOURCE_FOLDER},
    mocks::{DetectRequest, MockPredictionClient, MockTextRenderer},
    BatchProcessor, BoundingBox, Prediction, RunSummary, VisionBatchError,
};

const GRAY: Rgb<u8> = Rgb([40, 40, 40]);

fn test_config(source_folder: PathBuf, threshold: f64) -> AppConfig {
    AppConfig {
        endpoint: "https://example.cognitiveservices.azure.com/".to_string(),
        project_id: "project-1".to_string(),
        access_key: "ABCDEFGHIJ".to_string(),
        published_name: "Iteration3".to_string(),
        probability_threshold: threshold,
        source_folder,
        label_font_path: None,
    }
}

fn prediction(
    tag: &str,
    probability: f64,
    left: f64,
    top: f64,
    width: f64,
    height: f64,
) -> Prediction {
    Prediction {
        tag_name: tag.to_string(),
        probability,
        bounding_box: BoundingBox {
            left,
            top,
            width,
            height,
        },
    }
}

fn is_reddish(pixel: &Rgb<u8>) -> bool {
    pixel[0] > 180 && pixel[1] < 80 && pixel[2] < 80
}

fn is_grayish(pixel: &Rgb<u8>) -> bool {
    pixel.0.iter().all(|&c| (20..=60).contains(&c))
}

/// JPEG with an EXIF APP1 segment holding only the orientation tag.
fn jpeg_with_orientation(image: &RgbImage, orientation: u16) -> Vec<u8> {
    let mut encoded = Vec::new();
    image
        .write_to(&mut std::io::Cursor::new(&mut encoded), image::ImageFormat::Jpeg)
        .unwrap();

    // little-endian TIFF header, one IFD entry: 0x0112 SHORT x1
    let mut tiff = vec![b'I', b'I', 42, 0, 8, 0, 0, 0, 1, 0];
    tiff.extend_from_slice(&[0x12, 0x01, 3, 0, 1, 0, 0, 0]);
    tiff.extend_from_slice(&orientation.to_le_bytes());
    tiff.extend_from_slice(&[0, 0, 0, 0, 0, 0]);

    let mut app1 = vec![0xFF, 0xE1];
    app1.extend_from_slice(&((2 + 6 + tiff.len()) as u16).to_be_bytes());
    app1.extend_from_slice(b"Exif\0\0");
    app1.extend_from_slice(&tiff);

    // right after SOI
    let mut out = encoded[..2].to_vec();
    out.extend_from_slice(&app1);
    out.extend_from_slice(&encoded[2..]);
    out
}

fn output_entries(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[test]
fn test_end_to_end_single_jpg() {
    let temp_dir = TempDir::new().unwrap();
    let source = temp_dir.path().join("images");
    let output = temp_dir.path().join("output");
    fs::create_dir_all(&source).unwrap();
    RgbImage::from_pixel(1000, 500, GRAY)
        .save(source.join("img1.jpg"))
        .unwrap();

    let client = MockPredictionClient::new(vec![prediction("dog", 0.9, 0.1, 0.2, 0.3, 0.4)]);
    let processor = BatchProcessor::new(
        &client,
        MockTextRenderer::new(8, 12),
        test_config(source, 0.5),
    )
    .with_output_dir(&output);

    let summary = processor.process_directory().unwrap();
    assert_eq!(summary, RunSummary { files: 1, boxes: 1 });

    assert_eq!(output_entries(&output), vec!["img1.jpg".to_string()]);
    let requests = client.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].project_id, "project-1");
    assert_eq!(requests[0].published_name, "Iteration3");
    assert!(requests[0].image_len > 0);

    // box spans (100, 100) to (400, 300)
    let annotated = image::open(output.join("img1.jpg")).unwrap().into_rgb8();
    assert_eq!(annotated.dimensions(), (1000, 500));
    assert!(is_reddish(annotated.get_pixel(250, 300)));
    assert!(is_reddish(annotated.get_pixel(400, 200)));
    assert!(is_reddish(annotated.get_pixel(100, 200)));
    assert!(is_grayish(annotated.get_pixel(250, 200)));
    assert!(is_grayish(annotated.get_pixel(700, 400)));
}

#[test]
fn test_threshold_boundary_is_inclusive() {
    let temp_dir = TempDir::new().unwrap();
    let source = temp_dir.path().join("images");
    let output = temp_dir.path().join("output");
    fs::create_dir_all(&source).unwrap();
    // PNG content under a loosely matching name keeps pixel checks exact
    RgbImage::from_pixel(200, 100, GRAY)
        .save_with_format(source.join("shot.jpgx"), image::ImageFormat::Png)
        .unwrap();

    let client = MockPredictionClient::new(vec![
        prediction("dog", 0.5, 0.1, 0.2, 0.5, 0.5),
        prediction("cat", 0.49, 0.7, 0.6, 0.2, 0.3),
    ]);
    let processor = BatchProcessor::new(
        &client,
        MockTextRenderer::new(8, 12),
        test_config(source, 0.5),
    )
    .with_output_dir(&output);

    let summary = processor.process_directory().unwrap();
    assert_eq!(summary, RunSummary { files: 1, boxes: 1 });

    let annotated = image::load_from_memory(&fs::read(output.join("shot.jpgx")).unwrap())
        .unwrap()
        .into_rgb8();
    let red = Rgb([255, 0, 0]);

    // drawn: (20, 20) to (120, 70)
    assert_eq!(*annotated.get_pixel(70, 70), red);
    assert_eq!(*annotated.get_pixel(120, 50), red);
    assert_eq!(*annotated.get_pixel(70, 50), GRAY);

    // skipped: (140, 60) to (180, 90)
    assert_eq!(*annotated.get_pixel(180, 75), GRAY);
    assert_eq!(*annotated.get_pixel(160, 60), GRAY);
}

#[test]
fn test_exif_orientation_is_applied_before_drawing() {
    let temp_dir = TempDir::new().unwrap();
    let source = temp_dir.path().join("images");
    let output = temp_dir.path().join("output");
    fs::create_dir_all(&source).unwrap();

    // stored 200x100, displayed rotated 90 degrees clockwise as 100x200
    let stored = RgbImage::from_pixel(200, 100, GRAY);
    fs::write(source.join("phone.jpg"), jpeg_with_orientation(&stored, 6)).unwrap();

    let client = MockPredictionClient::new(vec![prediction("dog", 0.9, 0.1, 0.1, 0.5, 0.5)]);
    let processor = BatchProcessor::new(
        &client,
        MockTextRenderer::new(8, 12),
        test_config(source, 0.5),
    )
    .with_output_dir(&output);

    assert_eq!(
        processor.process_directory().unwrap(),
        RunSummary { files: 1, boxes: 1 }
    );

    // box spans (10, 20) to (60, 120) on the upright image
    let annotated = image::open(output.join("phone.jpg")).unwrap().into_rgb8();
    assert_eq!(annotated.dimensions(), (100, 200));
    assert!(is_reddish(annotated.get_pixel(35, 120)));
    assert!(is_reddish(annotated.get_pixel(60, 70)));
    assert!(is_grayish(annotated.get_pixel(35, 70)));
    assert!(is_grayish(annotated.get_pixel(50, 170)));
}

#[test]
fn test_output_names_are_flattened() {
    let temp_dir = TempDir::new().unwrap();
    let source = temp_dir.path().join("images");
    let output = temp_dir.path().join("output");
    for sub in ["a", "b"] {
        fs::create_dir_all(source.join(sub)).unwrap();
        RgbImage::from_pixel(64, 64, GRAY)
            .save(source.join(sub).join("img.jpg"))
            .unwrap();
    }
    RgbImage::from_pixel(64, 64, GRAY)
        .save(source.join("notes.png"))
        .unwrap();

    let client = MockPredictionClient::new(vec![]);
    let processor = BatchProcessor::new(
        &client,
        MockTextRenderer::new(8, 12),
        test_config(source, 0.5),
    )
    .with_output_dir(&output);

    let summary = processor.process_directory().unwrap();
    assert_eq!(summary, RunSummary { files: 2, boxes: 0 });
    assert_eq!(client.request_count(), 2);
    assert_eq!(output_entries(&output), vec!["img.jpg".to_string()]);
}

#[test]
fn test_prediction_failure_aborts_run() {
    let temp_dir = TempDir::new().unwrap();
    let source = temp_dir.path().join("images");
    let output = temp_dir.path().join("output");
    fs::create_dir_all(&source).unwrap();
    for name in ["a.jpg", "b.jpg"] {
        RgbImage::from_pixel(32, 32, GRAY)
            .save(source.join(name))
            .unwrap();
    }

    let client = MockPredictionClient::failing();
    let processor = BatchProcessor::new(
        &client,
        MockTextRenderer::new(8, 12),
        test_config(source, 0.5),
    )
    .with_output_dir(&output);

    let err = processor.process_directory().unwrap_err();
    assert!(matches!(err, VisionBatchError::Prediction { .. }));
    assert_eq!(client.request_count(), 1);
    assert!(output_entries(&output).is_empty());
}

#[test]
fn test_undecodable_image_aborts_after_prediction() {
    let temp_dir = TempDir::new().unwrap();
    let source = temp_dir.path().join("images");
    let output = temp_dir.path().join("output");
    fs::create_dir_all(&source).unwrap();
    fs::write(source.join("broken.jpg"), b"definitely not an image").unwrap();

    let client = MockPredictionClient::new(vec![]);
    let processor = BatchProcessor::new(
        &client,
        MockTextRenderer::new(8, 12),
        test_config(source, 0.5),
    )
    .with_output_dir(&output);

    let err = processor.process_directory().unwrap_err();
    match err {
        VisionBatchError::ImageProcessing { path, .. } => assert!(path.contains("broken.jpg")),
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(
        client.requests(),
        vec![DetectRequest {
            project_id: "project-1".to_string(),
            published_name: "Iteration3".to_string(),
            image_len: 23,
        }]
    );
}

#[test]
fn test_empty_source_folder() {
    let temp_dir = TempDir::new().unwrap();
    let source = temp_dir.path().join("images");
    let output = temp_dir.path().join("output");
    fs::create_dir_all(&source).unwrap();

    let client = MockPredictionClient::new(vec![]);
    let processor = BatchProcessor::new(
        &client,
        MockTextRenderer::new(8, 12),
        test_config(source, 0.5),
    )
    .with_output_dir(&output);

    assert_eq!(processor.process_directory().unwrap(), RunSummary::default());
    assert!(output.is_dir());
    assert_eq!(client.request_count(), 0);
}

#[test]
fn test_parameter_file_missing_source_folder() {
    let temp_dir = TempDir::new().unwrap();
    let parameter_file = temp_dir.path().join("params.json");
    fs::write(
        &parameter_file,
        r#"{
            "CUSTOM_VISION_ENDPOINT": "https://example.cognitiveservices.azure.com/",
            "CUSTOM_VISION_PROJECT_ID": "project-1",
            "CUSTOM_VISION_KEY": "ABCDEFGHIJ",
            "CUSTOM_VISION_PUBLISHED_ITERATION_NAME": "Iteration3",
            "PROBABILIY_THRESHOLD": 0.5
        }"#,
    )
    .unwrap();

    let err = AppConfig::load(&parameter_file).unwrap_err();
    match &err {
        VisionBatchError::MissingParameter { key, path } => {
            assert_eq!(key, KEY_SOURCE_FOLDER);
            assert_eq!(path, &parameter_file);
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert!(err.to_string().contains("SOURCE_FOLDER"));
}

#[test]
fn test_parameter_file_with_nonexistent_source_folder() {
    let temp_dir = TempDir::new().unwrap();
    let parameter_file = temp_dir.path().join("params.json");
    let missing = temp_dir.path().join("no-such-dir");
    let parameters = serde_json::json!({
        "CUSTOM_VISION_ENDPOINT": "https://example.cognitiveservices.azure.com/",
        "CUSTOM_VISION_PROJECT_ID": "project-1",
        "CUSTOM_VISION_KEY": "ABCDEFGHIJ",
        "CUSTOM_VISION_PUBLISHED_ITERATION_NAME": "Iteration3",
        "PROBABILIY_THRESHOLD": 0.5,
        "SOURCE_FOLDER": missing,
    });
    fs::write(&parameter_file, parameters.to_string()).unwrap();

    let err = AppConfig::load(&parameter_file).unwrap_err();
    assert!(matches!(err, VisionBatchError::SourceFolder { .. }));
    assert!(err.to_string().contains("no-such-dir"));
}
