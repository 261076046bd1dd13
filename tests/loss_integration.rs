use approx::assert_relative_eq;
use ferrox_loss::backend::{Device, cpu};
use ferrox_loss::error::LossError;
use ferrox_loss::nn::losses::{
    LossConfig, LossDataDescriptor, LossForward, LossKernel, LossLabels, LossType, ReductionType,
};
use ferrox_loss::tensor::{DataLayout, Size3, Tensor};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};

const STEP: f32 = 1e-2;

/// Summed loss of `values` against `labels`
fn summed_loss(config: &LossConfig, values: &[f32], size: Size3, labels: &LossLabels) -> f32 {
    let predictions = Tensor::from_vec(values.to_vec(), size).unwrap();
    let mut labels = labels.clone();
    LossForward::new(*config)
        .compute(&predictions, &mut labels)
        .unwrap();
    labels.loss_image().first().unwrap()
}

/// Compares the analytic gradient against central differences of the summed loss
fn check_gradient(config: LossConfig, predictions: Vec<f32>, targets: Vec<f32>, size: Size3) {
    let labels = LossLabels::from_slices(&targets, size, None, Size3::SCALAR).unwrap();
    let tensor = Tensor::from_vec(predictions.clone(), size).unwrap();
    let mut scratch = labels.clone();
    let analytic = LossKernel::new(config)
        .compute_gradient(&tensor, &mut scratch)
        .unwrap()
        .to_vec();

    for i in 0..predictions.len() {
        let mut plus = predictions.clone();
        let mut minus = predictions.clone();
        plus[i] += STEP;
        minus[i] -= STEP;
        let numeric = (summed_loss(&config, &plus, size, &labels)
            - summed_loss(&config, &minus, size, &labels))
            / (2.0 * STEP);
        assert!(
            (numeric - analytic[i]).abs() <= 2e-2 + 2e-2 * analytic[i].abs(),
            "{} element {}: numeric {} vs analytic {}",
            config.loss_type(),
            i,
            numeric,
            analytic[i]
        );
    }
}

fn sum_config(loss_type: LossType) -> LossConfig {
    LossConfig::new(loss_type, ReductionType::Sum)
}

// ============================================================================
// FINITE DIFFERENCE TESTS
// ============================================================================

#[test]
fn test_regression_gradients_match_finite_differences() {
    let mut rng = StdRng::seed_from_u64(7);
    let size = Size3::new(3, 2, 2);
    let targets: Vec<f32> = (0..size.len()).map(|_| rng.random_range(-1.0..1.0)).collect();
    // Keep predictions away from the MAE kink at y == t
    let predictions: Vec<f32> = targets
        .iter()
        .map(|&t| {
            let offset: f32 = rng.random_range(0.2..1.0);
            if rng.random_bool(0.5) { t + offset } else { t - offset }
        })
        .collect();

    for loss_type in [LossType::MeanAbsoluteError, LossType::MeanSquaredError] {
        check_gradient(sum_config(loss_type), predictions.clone(), targets.clone(), size);
    }
    let weighted = sum_config(LossType::MeanSquaredError).with_weight(0.25).unwrap();
    check_gradient(weighted, predictions, targets, size);
}

#[test]
fn test_softmax_cross_entropy_gradient_matches_finite_differences() {
    let mut rng = StdRng::seed_from_u64(11);
    let normal = Normal::new(0.0f32, 1.5).unwrap();
    let classes = 4;
    let size = Size3::new(2, 2, classes);

    let predictions: Vec<f32> = (0..size.len()).map(|_| normal.sample(&mut rng)).collect();
    // One-hot labels: each location's labels sum to one
    let mut targets = vec![0.0f32; size.len()];
    for location in 0..size.width * size.height {
        let class = rng.random_range(0..classes);
        targets[location * classes + class] = 1.0;
    }

    let plain = sum_config(LossType::SoftmaxCrossEntropy)
        .with_number_of_classes(classes as u32)
        .unwrap();
    check_gradient(plain, predictions.clone(), targets.clone(), size);

    let smoothed = plain.with_label_smoothing(0.1).unwrap();
    check_gradient(smoothed, predictions, targets, size);
}

#[test]
fn test_sigmoid_cross_entropy_gradient_matches_finite_differences() {
    let mut rng = StdRng::seed_from_u64(13);
    let normal = Normal::new(0.0f32, 2.0).unwrap();
    let size = Size3::new(4, 1, 3);
    let predictions: Vec<f32> = (0..size.len()).map(|_| normal.sample(&mut rng)).collect();
    let targets: Vec<f32> = (0..size.len()).map(|_| rng.random_range(0.0..1.0)).collect();

    check_gradient(
        sum_config(LossType::SigmoidCrossEntropy),
        predictions.clone(),
        targets.clone(),
        size,
    );
    let smoothed = sum_config(LossType::SigmoidCrossEntropy)
        .with_label_smoothing(0.2)
        .unwrap();
    check_gradient(smoothed, predictions, targets, size);
}

#[test]
fn test_probability_loss_gradients_match_finite_differences() {
    let mut rng = StdRng::seed_from_u64(17);
    let size = Size3::new(3, 3, 1);
    let predictions: Vec<f32> = (0..size.len()).map(|_| rng.random_range(0.2..0.8)).collect();
    let targets: Vec<f32> = (0..size.len()).map(|_| rng.random_range(0.0..1.0)).collect();

    for loss_type in [LossType::CategoricalCrossEntropy, LossType::Log] {
        check_gradient(sum_config(loss_type), predictions.clone(), targets.clone(), size);
    }
}

// ============================================================================
// BATCH TESTS
// ============================================================================

fn random_batch(rng: &mut StdRng, count: usize) -> (Vec<Tensor>, Vec<LossLabels>) {
    let normal = Normal::new(0.0f32, 1.0).unwrap();
    let mut predictions = Vec::with_capacity(count);
    let mut labels = Vec::with_capacity(count);
    for i in 0..count {
        let size = Size3::new(2 + i % 3, 1 + i % 2, 3);
        let values: Vec<f32> = (0..size.len()).map(|_| normal.sample(&mut *rng)).collect();
        let targets: Vec<f32> = (0..size.len()).map(|_| rng.random_range(0.0..1.0)).collect();
        predictions.push(Tensor::from_vec(values, size).unwrap());
        labels.push(LossLabels::from_slices(&targets, size, None, size).unwrap());
    }
    (predictions, labels)
}

#[test]
fn test_batch_matches_sequential_execution() {
    let mut rng = StdRng::seed_from_u64(23);
    let device = Device::with_threads(4).unwrap();

    for loss_type in [
        LossType::SoftmaxCrossEntropy,
        LossType::SigmoidCrossEntropy,
        LossType::Huber,
    ] {
        let kernel = LossKernel::new(LossConfig::new(loss_type, ReductionType::None));
        let (predictions, labels) = random_batch(&mut rng, 6);

        let mut batched = labels.clone();
        let gradients = kernel
            .compute_batch(&device, &predictions, &mut batched)
            .unwrap();

        for (i, (p, l)) in predictions.iter().zip(labels).enumerate() {
            let mut sequential = l;
            let expected = kernel.compute_gradient(p, &mut sequential).unwrap();
            let gradient = gradients[i].as_ref().unwrap();
            assert_eq!(gradient, &expected, "{} gradient {}", loss_type, i);
            assert_eq!(
                batched[i].loss_image(),
                sequential.loss_image(),
                "{} loss {}",
                loss_type,
                i
            );
        }
    }
}

#[test]
fn test_batch_failures_are_per_index() {
    let size = Size3::new(2, 1, 1);
    let predictions = vec![
        Tensor::from_vec(vec![1.0, 2.0], size).unwrap(),
        Tensor::from_vec(vec![1.0, 2.0, 3.0], Size3::new(3, 1, 1)).unwrap(),
        Tensor::from_vec(vec![0.0, 4.0], size).unwrap(),
    ];
    let mut labels = vec![
        LossLabels::from_slices(&[0.0, 0.0], size, None, Size3::SCALAR).unwrap(),
        LossLabels::from_slices(&[0.0, 0.0], size, None, Size3::SCALAR).unwrap(),
        LossLabels::from_slices(&[0.0, 1.0], size, None, Size3::SCALAR).unwrap(),
    ];

    let kernel = LossKernel::new(sum_config(LossType::MeanSquaredError));
    let results = kernel.compute_batch(&cpu(), &predictions, &mut labels).unwrap();
    assert_eq!(results.len(), 3);

    assert!(matches!(results[1], Err(LossError::ShapeMismatch { .. })));
    assert_eq!(labels[1].loss_image().first(), Some(0.0));

    assert_eq!(labels[0].loss_image().first(), Some(5.0));
    assert_eq!(results[0].as_ref().unwrap().to_vec(), vec![2.0, 4.0]);
    assert_eq!(labels[2].loss_image().first(), Some(9.0));
    assert_eq!(results[2].as_ref().unwrap().to_vec(), vec![0.0, 6.0]);
}

#[test]
fn test_batch_rejects_unsupported_reduction_per_index() {
    let size = Size3::new(2, 1, 1);
    let predictions = vec![Tensor::full(size, 1.0), Tensor::full(size, 2.0)];
    let mut labels = vec![
        LossLabels::from_slices(&[0.0, 0.0], size, None, size).unwrap(),
        LossLabels::from_slices(&[0.0, 0.0], size, None, Size3::SCALAR).unwrap(),
    ];
    let kernel = LossKernel::new(LossConfig::new(LossType::MeanAbsoluteError, ReductionType::None));
    let results = kernel.compute_batch(&cpu(), &predictions, &mut labels).unwrap();

    assert!(results[0].is_ok());
    assert_eq!(labels[0].loss_image().to_vec(), vec![1.0, 1.0]);
    assert!(matches!(results[1], Err(LossError::UnsupportedCombination { .. })));
}

#[test]
fn test_batch_length_mismatch() {
    let size = Size3::new(1, 1, 1);
    let predictions = vec![Tensor::zeros(size), Tensor::zeros(size)];
    let mut labels = vec![LossLabels::from_slices(&[0.0], size, None, size).unwrap()];
    let err = LossKernel::new(sum_config(LossType::Hinge))
        .compute_batch(&cpu(), &predictions, &mut labels)
        .unwrap_err();
    assert_eq!(
        err,
        LossError::BatchLengthMismatch {
            predictions: 2,
            labels: 1
        }
    );
}

#[test]
fn test_forward_batch_on_command_buffer() {
    let mut rng = StdRng::seed_from_u64(29);
    let (predictions, mut labels) = random_batch(&mut rng, 4);
    let forward = LossForward::new(LossConfig::new(LossType::SigmoidCrossEntropy, ReductionType::Mean));
    let device = Device::with_threads(2).unwrap();

    let mut cb = device.new_command_buffer().with_label("sigmoid batch");
    let encoded = forward.encode_batch(&mut cb, &predictions, &mut labels).unwrap();
    assert!(encoded.iter().all(|r| r.is_ok()));
    assert_eq!(cb.len(), 4);
    let completion = cb.commit();
    completion.wait_until_completed().unwrap();
    assert_eq!(completion.label(), Some("sigmoid batch"));

    // Mean into a per-element image: the scalar lands at the origin
    for l in &labels {
        let values = l.loss_image().to_vec();
        assert!(values[1..].iter().all(|&v| v == 0.0));
    }
}

// ============================================================================
// CONFIG AND LAYOUT TESTS
// ============================================================================

#[test]
fn test_config_json_round_trip() {
    let config = LossConfig::new(LossType::SoftmaxCrossEntropy, ReductionType::Mean)
        .with_label_smoothing(0.1)
        .unwrap()
        .with_number_of_classes(10)
        .unwrap()
        .with_weight(0.5)
        .unwrap();
    let json = serde_json::to_string(&config).unwrap();
    let parsed: LossConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, config);
}

#[test]
fn test_config_json_defaults_and_validation() {
    let parsed: LossConfig =
        serde_json::from_str(r#"{"loss_type": "Huber", "reduction_type": "Sum", "delta": 0.5}"#)
            .unwrap();
    assert_eq!(parsed.delta(), 0.5);
    assert_eq!(parsed.weight(), 1.0);
    assert_eq!(parsed.epsilon(), 1e-7);
    assert_eq!(parsed.number_of_classes(), 1);

    for bad in [
        r#"{"loss_type": "Log", "reduction_type": "Sum", "epsilon": 0.0}"#,
        r#"{"loss_type": "Huber", "reduction_type": "Sum", "delta": -2.0}"#,
        r#"{"loss_type": "SoftmaxCrossEntropy", "reduction_type": "Mean", "number_of_classes": 0}"#,
        r#"{"loss_type": "SigmoidCrossEntropy", "reduction_type": "Mean", "label_smoothing": 2.0}"#,
    ] {
        assert!(serde_json::from_str::<LossConfig>(bad).is_err(), "{}", bad);
    }
}

#[test]
fn test_padded_planar_labels_and_weights() {
    // 2x2 image, 2 channels, planes padded to 5 elements
    let size = Size3::new(2, 2, 2);
    let planar = [
        1.0, 0.0, 0.0, 1.0, f32::NAN, //
        0.0, 1.0, 1.0, 0.0, f32::NAN,
    ];
    let weights = [2.0, 0.5];
    let label_desc =
        LossDataDescriptor::new(&planar, DataLayout::ChannelsHeightWidth, size).with_slice_stride(5);
    let weight_desc =
        LossDataDescriptor::new(&weights, DataLayout::HeightWidthChannels, Size3::new(1, 1, 2));
    let mut labels = LossLabels::create(size, &label_desc, Some(&weight_desc)).unwrap();
    assert_eq!(
        labels.labels().to_vec(),
        vec![1.0, 0.0, 0.0, 1.0, 0.0, 1.0, 1.0, 0.0]
    );

    let predictions = Tensor::full(size, 0.5);
    let kernel = LossKernel::new(LossConfig::new(LossType::MeanSquaredError, ReductionType::None));
    let gradient = kernel.compute_gradient(&predictions, &mut labels).unwrap();

    // Every squared error is 0.25; channel 0 doubles it, channel 1 halves it
    let loss = labels.loss_image().to_vec();
    for pair in loss.chunks(2) {
        assert_relative_eq!(pair[0], 0.5);
        assert_relative_eq!(pair[1], 0.125);
    }
    let grad = gradient.to_vec();
    assert_relative_eq!(grad[0], -2.0);
    assert_relative_eq!(grad[1], 0.5);
}
