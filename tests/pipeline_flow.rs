use motion_vision::{
    Frame, FrameStamp, MotionPipeline, NormRect, VisionConfig, VisionError, ZoneEvent, ZoneId,
};
use proptest::prelude::*;
use std::cell::RefCell;
use std::rc::Rc;

const SIZE: u32 = 20;

fn black(width: u32, height: u32) -> Vec<u8> {
    [0u8, 0, 0, 255]
        .iter()
        .copied()
        .cycle()
        .take((width * height * 4) as usize)
        .collect()
}

fn with_square(x0: u32, y0: u32, side: u32) -> Vec<u8> {
    let mut data = black(SIZE, SIZE);
    for y in y0..y0 + side {
        for x in x0..x0 + side {
            let i = ((y * SIZE + x) * 4) as usize;
            data[i..i + 4].copy_from_slice(&[255, 255, 255, 255]);
        }
    }
    data
}

fn static_pipeline(config: VisionConfig) -> MotionPipeline {
    let mut pipeline = MotionPipeline::new(VisionConfig {
        progressive_background: false,
        ..config
    });
    let background = black(SIZE, SIZE);
    pipeline
        .set_background(&Frame::new(SIZE, SIZE, &background).unwrap())
        .unwrap();
    pipeline
}

#[test]
fn zone_events_reach_handler_and_report() {
    let mut pipeline = static_pipeline(VisionConfig {
        handle_active_zones: true,
        ..VisionConfig::default()
    });
    let seen: Rc<RefCell<Vec<ZoneEvent>>> = Rc::default();
    let sink = Rc::clone(&seen);
    let desk = NormRect::new(0.25, 0.25, 0.25, 0.25);
    pipeline.add_zone_with_handler("desk", desk, move |e: &ZoneEvent| {
        sink.borrow_mut().push(e.clone())
    });
    pipeline.add_zone(7, NormRect::new(0.75, 0.75, 0.2, 0.2));

    let lit = with_square(5, 5, 6);
    let report = pipeline
        .update(&Frame::new(SIZE, SIZE, &lit).unwrap(), FrameStamp::new(100, 1))
        .unwrap();
    assert_eq!(report.zone_events.len(), 1);
    assert_eq!(report.zone_events[0].id, ZoneId::from("desk"));
    assert!(report.zone_events[0].occupied);
    assert!(pipeline.zone("desk").unwrap().is_occupied());
    assert!(pipeline.zone("desk").unwrap().is_changed());
    assert!(!pipeline.zone(7).unwrap().is_occupied());

    // Unchanged input raises nothing.
    let report = pipeline
        .update(&Frame::new(SIZE, SIZE, &lit).unwrap(), FrameStamp::new(133, 2))
        .unwrap();
    assert!(report.zone_events.is_empty());
    assert!(!pipeline.zone("desk").unwrap().is_changed());

    let dark = black(SIZE, SIZE);
    let report = pipeline
        .update(&Frame::new(SIZE, SIZE, &dark).unwrap(), FrameStamp::new(166, 3))
        .unwrap();
    assert_eq!(report.zone_events.len(), 1);
    assert!(!report.zone_events[0].occupied);

    let seen = seen.borrow();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0].stamp, FrameStamp::new(100, 1));
    assert_eq!(seen[1].stamp, FrameStamp::new(166, 3));
}

#[test]
fn disabled_zone_stays_quiet() {
    let mut pipeline = static_pipeline(VisionConfig {
        handle_active_zones: true,
        ..VisionConfig::default()
    });
    pipeline
        .add_zone(1, NormRect::new(0.25, 0.25, 0.25, 0.25))
        .set_enabled(false);
    let lit = with_square(5, 5, 6);
    let report = pipeline
        .update(&Frame::new(SIZE, SIZE, &lit).unwrap(), FrameStamp::default())
        .unwrap();
    assert!(report.zone_events.is_empty());
    assert!(!pipeline.zone(1).unwrap().is_occupied());
}

#[tokio::test]
async fn zone_events_forward_over_channel() {
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let mut pipeline = static_pipeline(VisionConfig {
        handle_active_zones: true,
        ..VisionConfig::default()
    });
    pipeline.add_zone_with_handler(3, NormRect::new(0.25, 0.25, 0.25, 0.25), tx);

    let lit = with_square(5, 5, 6);
    pipeline
        .update(&Frame::new(SIZE, SIZE, &lit).unwrap(), FrameStamp::new(5, 1))
        .unwrap();
    drop(pipeline);

    let event = rx.recv().await.expect("event forwarded");
    assert_eq!(event.id, ZoneId::Int(3));
    assert!(event.occupied);
    assert!(rx.recv().await.is_none());
}

#[test]
fn hit_test_reads_threshold_image() {
    let mut pipeline = static_pipeline(VisionConfig::default());
    let lit = with_square(5, 5, 6);
    pipeline
        .update(&Frame::new(SIZE, SIZE, &lit).unwrap(), FrameStamp::default())
        .unwrap();
    assert!(pipeline.hit_test(0.3, 0.3));
    assert!(!pipeline.hit_test(0.9, 0.1));
    assert!(!pipeline.hit_test(-0.1, 0.3));
    assert!(!pipeline.hit_test(1.0, 0.3));
}

#[test]
fn invalid_frames_leave_state_untouched() {
    let mut pipeline = MotionPipeline::default();
    let data = black(4, 4);
    pipeline
        .update(&Frame::new(4, 4, &data).unwrap(), FrameStamp::new(1, 1))
        .unwrap();

    let empty = image::RgbaImage::new(0, 0);
    let err = pipeline
        .update(&Frame::from(&empty), FrameStamp::new(2, 2))
        .unwrap_err();
    assert!(matches!(err, VisionError::InvalidFrame { .. }));
    assert_eq!(pipeline.last_update(), Some(FrameStamp::new(1, 1)));
    assert_eq!(pipeline.threshold_image().dimensions(), (4, 4));

    assert!(matches!(
        Frame::new(4, 4, &data[..10]),
        Err(VisionError::BufferSizeMismatch { expected: 64, actual: 10 })
    ));
}

#[test]
fn black_frames_settle_to_empty_difference() {
    let mut pipeline = MotionPipeline::new(VisionConfig {
        image_filter_feedback: 0.5,
        ..VisionConfig::default()
    });
    let lit = with_square(2, 2, 10);
    for i in 0..5 {
        pipeline
            .update(&Frame::new(SIZE, SIZE, &lit).unwrap(), FrameStamp::new(i, i))
            .unwrap();
    }
    let dark = black(SIZE, SIZE);
    for i in 5..40 {
        pipeline
            .update(&Frame::new(SIZE, SIZE, &dark).unwrap(), FrameStamp::new(i, i))
            .unwrap();
    }
    assert!(pipeline.difference_image().pixels().all(|p| p[0] <= 1));
    assert!(pipeline.threshold_image().pixels().all(|p| p[0] == 0));
}

#[test]
fn polygons_follow_config() {
    let mut pipeline = static_pipeline(VisionConfig {
        handle_blobs: true,
        approximate_blob_polygons: true,
        points_per_polygon: 1,
        ..VisionConfig::default()
    });
    assert_eq!(pipeline.config().points_per_polygon, 3);
    pipeline.config_mut().points_per_polygon = 8;

    let lit = with_square(5, 5, 6);
    pipeline
        .update(&Frame::new(SIZE, SIZE, &lit).unwrap(), FrameStamp::default())
        .unwrap();
    assert_eq!(pipeline.blob_count(), 1);
    assert_eq!(pipeline.blobs()[0].polygon.len(), 8);
}

#[test]
fn config_loads_from_json() {
    let config = VisionConfig::from_json_str(
        r#"{
            "mirror": "horizontal",
            "handle_blobs": true,
            "reject_blobs": "inner",
            "image_filter_feedback": 3.0
        }"#,
    )
    .unwrap();
    assert!(config.handle_blobs);
    assert_eq!(config.mirror, motion_vision::MirrorMode::Horizontal);
    assert_eq!(config.reject_blobs, motion_vision::RejectBlobs::Inner);
    assert_eq!(config.image_filter_feedback, 1.0);
    assert_eq!(config.points_per_polygon, 6);
}

proptest! {
    #[test]
    fn buffers_always_match_frame(width in 1u32..24, height in 1u32..24, seed in any::<u8>()) {
        let mut pipeline = MotionPipeline::new(VisionConfig {
            handle_blobs: true,
            handle_active_zones: true,
            ..VisionConfig::default()
        });
        pipeline.add_zone(0, NormRect::new(0.0, 0.0, 1.0, 1.0));
        let data: Vec<u8> = (0..width * height * 4).map(|i| (i as u8).wrapping_mul(seed)).collect();
        let frame = Frame::new(width, height, &data).unwrap();
        pipeline.update(&frame, FrameStamp::default()).unwrap();

        for buffer in [
            pipeline.current_image(),
            pipeline.background_image(),
            pipeline.difference_image(),
            pipeline.threshold_image(),
        ] {
            prop_assert_eq!(buffer.dimensions(), (width, height));
        }
        prop_assert!(pipeline.label_map().same_size_as(width, height));
        prop_assert!(pipeline.threshold_image().pixels().all(|p| p[0] == 0 || p[0] == 255));
    }
}
