use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use inference::postprocessing::PostProcessor;
use ndarray::{Array, IxDyn};
use preprocess::Letterbox;

const NUM_CLASSES: usize = 80;
const NUM_ANCHORS: usize = 8400;

/// Create a mock YOLOv8 head output `[1, 4 + classes, anchors]` with N
/// confident anchors spread over the image
fn create_mock_yolo_output(num_detections: usize) -> ndarray::ArrayD<f32> {
    let attrs = 4 + NUM_CLASSES;
    let mut data = vec![0.001f32; attrs * NUM_ANCHORS];

    for i in 0..num_detections.min(NUM_ANCHORS) {
        let cx = 20.0 + (i % 30) as f32 * 20.0;
        let cy = 20.0 + (i / 30 % 30) as f32 * 20.0;
        data[i] = cx;
        data[NUM_ANCHORS + i] = cy;
        data[2 * NUM_ANCHORS + i] = 30.0;
        data[3 * NUM_ANCHORS + i] = 30.0;
        data[(4 + i % NUM_CLASSES) * NUM_ANCHORS + i] = 0.9;
    }

    Array::from_shape_vec(IxDyn(&[1, attrs, NUM_ANCHORS]), data).unwrap()
}

fn benchmark_parse_detections(c: &mut Criterion) {
    let mut group = c.benchmark_group("postprocessing");
    let post_processor = PostProcessor::default().with_num_classes(NUM_CLASSES);
    let letterbox = Letterbox {
        scale: 0.5,
        offset_x: 0.0,
        offset_y: 140.0,
        orig_width: 1280,
        orig_height: 720,
    };

    for num_detections in [0, 10, 100, 1000] {
        let output = create_mock_yolo_output(num_detections);

        group.bench_with_input(
            BenchmarkId::new("parse_detections", num_detections),
            &output,
            |b, output| {
                b.iter(|| {
                    post_processor
                        .parse_detections(
                            black_box(&output.view()),
                            black_box(0.25),
                            black_box(0.45),
                            black_box(&letterbox),
                        )
                        .unwrap()
                });
            },
        );
    }

    group.finish();
}

fn benchmark_nms_heavy_overlap(c: &mut Criterion) {
    let mut group = c.benchmark_group("nms");
    let post_processor = PostProcessor::default().with_num_classes(NUM_CLASSES);
    let letterbox = Letterbox {
        scale: 1.0,
        offset_x: 0.0,
        offset_y: 0.0,
        orig_width: 640,
        orig_height: 640,
    };

    // Every anchor confident for class 0 at almost the same spot
    let attrs = 4 + NUM_CLASSES;
    let mut data = vec![0.0f32; attrs * NUM_ANCHORS];
    for i in 0..NUM_ANCHORS {
        data[i] = 320.0 + (i % 5) as f32;
        data[NUM_ANCHORS + i] = 320.0;
        data[2 * NUM_ANCHORS + i] = 100.0;
        data[3 * NUM_ANCHORS + i] = 100.0;
        data[4 * NUM_ANCHORS + i] = 0.5 + (i % 100) as f32 / 1000.0;
    }
    let output = Array::from_shape_vec(IxDyn(&[1, attrs, NUM_ANCHORS]), data).unwrap();

    group.bench_function("overlapping_8400", |b| {
        b.iter(|| {
            post_processor
                .parse_detections(black_box(&output.view()), 0.25, 0.45, &letterbox)
                .unwrap()
        });
    });

    group.finish();
}

criterion_group!(benches, benchmark_parse_detections, benchmark_nms_heavy_overlap);
criterion_main!(benches);
