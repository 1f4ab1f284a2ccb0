use base64::{engine::general_purpose::STANDARD, Engine as _};
use httpmock::prelude::*;
use sam_annotate::{Annotations, ClientError, Config, Mode, Point, PromptPayload, SegmentationClient};
use std::io::Cursor;

fn mask_b64(width: u32, height: u32) -> String {
    let img = image::GrayImage::from_fn(width, height, |x, _| {
        image::Luma([if x % 2 == 0 { 255 } else { 0 }])
    });
    let mut png = Vec::new();
    img.write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
        .unwrap();
    STANDARD.encode(png)
}

fn source_png() -> Vec<u8> {
    let img = image::DynamicImage::new_rgb8(8, 6);
    sam_annotate::client::encode_png(&img).unwrap()
}

fn client_for(server: &MockServer) -> SegmentationClient {
    let config = Config {
        endpoint: server.url("/sam"),
        timeout_secs: 5,
        ..Config::default()
    };
    SegmentationClient::new(&config).unwrap()
}

fn prompt() -> PromptPayload {
    let mut annotations = Annotations::new();
    annotations.add_point(Point::new(10.0, 20.0), 1.0);
    annotations.secondary_action(Point::new(3.0, 4.0), Mode::Point, 1.0);
    annotations.begin_box(Point::new(1.0, 1.0));
    annotations.drag_box(Point::new(7.0, 5.0));
    annotations.end_box(1.0);
    PromptPayload::from_annotations(&annotations).unwrap()
}

#[tokio::test]
async fn test_segment_posts_multipart_prompts_and_decodes_mask() {
    let server = MockServer::start_async().await;
    let sam_mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/sam")
                .header_exists("content-type")
                .body_contains("name=\"image\"; filename=\"image.png\"")
                .body_contains("name=\"points\"")
                .body_contains("[[10.0,20.0]]")
                .body_contains("name=\"boxes\"")
                .body_contains("[1.0,1.0,7.0,5.0]")
                .body_contains("name=\"negatives\"")
                .body_contains("[[3.0,4.0]]");
            then.status(200)
                .header("Content-Type", "application/json")
                .json_body(serde_json::json!({
                    "content": { "masks": [mask_b64(8, 6)], "scores": [0.87] }
                }));
        })
        .await;

    let client = client_for(&server);
    let mask = client.segment(source_png(), &prompt()).await.unwrap();

    sam_mock.assert_async().await;
    assert_eq!((mask.width(), mask.height()), (8, 6));
    assert_eq!(mask.score, Some(0.87));
    assert!((mask.coverage() - 0.5).abs() < 1e-6);
}

#[tokio::test]
async fn test_points_only_request_omits_optional_fields() {
    let server = MockServer::start_async().await;
    let with_box = server
        .mock_async(|when, then| {
            when.method(POST).path("/sam").body_contains("name=\"boxes\"");
            then.status(500);
        })
        .await;
    let points_only = server
        .mock_async(|when, then| {
            when.method(POST).path("/sam").body_contains("name=\"points\"");
            then.status(200).json_body(serde_json::json!({
                "content": { "masks": [mask_b64(2, 2)], "scores": [0.5] }
            }));
        })
        .await;

    let mut annotations = Annotations::new();
    annotations.add_point(Point::new(1.0, 1.0), 1.0);
    let payload = PromptPayload::from_annotations(&annotations).unwrap();

    let client = client_for(&server);
    let mask = client.segment(source_png(), &payload).await.unwrap();

    assert_eq!(mask.width(), 2);
    with_box.assert_hits_async(0).await;
    points_only.assert_async().await;
}

#[tokio::test]
async fn test_empty_masks_is_no_mask_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/sam");
            then.status(200)
                .json_body(serde_json::json!({ "content": { "masks": [], "scores": [] } }));
        })
        .await;

    let err = client_for(&server)
        .segment(source_png(), &prompt())
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::NoMask));
    assert_eq!(err.to_string(), "No mask found");
}

#[tokio::test]
async fn test_service_error_envelope() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/sam");
            then.status(400).json_body(serde_json::json!({
                "error": "Invalid input data",
                "message": "Expecting value: line 1 column 1"
            }));
        })
        .await;

    let err = client_for(&server)
        .segment(source_png(), &prompt())
        .await
        .unwrap_err();
    match err {
        ClientError::Service {
            status,
            error,
            message,
        } => {
            assert_eq!(status, 400);
            assert_eq!(error, "Invalid input data");
            assert_eq!(message.as_deref(), Some("Expecting value: line 1 column 1"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_non_json_error_body_is_kept_verbatim() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/sam");
            then.status(502).body("Bad Gateway\n");
        })
        .await;

    let err = client_for(&server)
        .segment(source_png(), &prompt())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ClientError::Service { status: 502, ref error, message: None } if error == "Bad Gateway"
    ));
}

#[tokio::test]
async fn test_corrupt_mask_is_reported() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/sam");
            then.status(200)
                .json_body(serde_json::json!({ "content": { "masks": ["%%%"] } }));
        })
        .await;

    let err = client_for(&server)
        .segment(source_png(), &prompt())
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Base64(_)));
}

#[tokio::test]
async fn test_unreachable_service_is_http_error() {
    let config = Config {
        endpoint: "http://127.0.0.1:1/sam".to_string(),
        timeout_secs: 2,
        ..Config::default()
    };
    let client = SegmentationClient::new(&config).unwrap();
    let err = client.segment(source_png(), &prompt()).await.unwrap_err();
    assert!(matches!(err, ClientError::Http(_)));
}
