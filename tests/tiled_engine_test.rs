use rqa_rs::algorithms::baseline::recurrence_matrix;
use rqa_rs::{
    AnalysisConfig, CancellationToken, CellRepresentation, Device, DeviceDescriptor, EdgeRunPolicy,
    EmbeddingParams, Engine, EuclideanEngine, EuclideanMetric, ExecutionOptions, MaximumEngine,
    NeighbourhoodCondition, OverlapPolicy, RqaError, RqaResult, SelectorKind, Settings,
    SimilarityMeasure, TaxicabEngine, TimeSeriesView, VariantFlags,
};

const CHECKERBOARD: [f32; 8] = [0.0, 1.0, 0.0, 1.0, 0.0, 1.0, 0.0, 1.0];

fn noisy_series(n: usize, seed: u64) -> Vec<f32> {
    let mut s = seed;
    (0..n)
        .map(|i| {
            s = s
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            let noise = ((s >> 40) as f32 / (1u64 << 24) as f32) - 0.5;
            (i as f32 * 0.35).sin() + 0.3 * noise
        })
        .collect()
}

fn device(max_alloc_bytes: usize) -> Device {
    Device::new(DeviceDescriptor::new("test", max_alloc_bytes, 8))
}

fn assert_same(name: &str, tiled: &RqaResult, reference: &RqaResult) {
    assert_eq!(
        tiled.diagonal_histogram, reference.diagonal_histogram,
        "{name}: diagonal histograms differ"
    );
    assert_eq!(
        tiled.vertical_histogram, reference.vertical_histogram,
        "{name}: vertical histograms differ"
    );
    assert_eq!(
        tiled.white_vertical_histogram, reference.white_vertical_histogram,
        "{name}: white vertical histograms differ"
    );
    assert_eq!(
        tiled.recurrence_points, reference.recurrence_points,
        "{name}: recurrence points differ"
    );
}

fn engine_for<M: SimilarityMeasure>(settings: Settings, variant: VariantFlags) -> Engine<M> {
    Engine::<M>::new(settings, ExecutionOptions::default().with_variant(variant)).unwrap()
}

fn classic(
    samples: Vec<f32>,
    embedding: EmbeddingParams,
    condition: NeighbourhoodCondition,
    theiler: usize,
) -> Settings {
    let ts = TimeSeriesView::from_samples(samples, embedding).unwrap();
    Settings::classic(ts, condition, theiler).unwrap()
}

#[test]
fn checkerboard_matches_baseline_for_every_tile_size() {
    let settings = classic(
        CHECKERBOARD.to_vec(),
        EmbeddingParams::new(1, 1),
        NeighbourhoodCondition::FixedRadius(0.5),
        0,
    );
    let reference =
        engine_for::<EuclideanMetric>(settings.clone(), VariantFlags::default()).baseline();

    // main diagonal and the six even off-diagonals
    assert_eq!(reference.diagonal_histogram.get(8), 1);
    assert_eq!(reference.diagonal_histogram.get(6), 2);
    assert_eq!(reference.diagonal_histogram.get(4), 2);
    assert_eq!(reference.diagonal_histogram.get(2), 2);
    assert_eq!(reference.total_recurrence_points(), 32);

    for max_alloc in [4, 6, 9, 16, 64] {
        for variant in VariantFlags::all().filter(|v| v.overlap == OverlapPolicy::Recycle) {
            let engine = engine_for::<EuclideanMetric>(settings.clone(), variant);
            let tiled = engine.run(&mut device(max_alloc)).unwrap();
            assert_same(
                &format!("{} @ {max_alloc}", variant.name()),
                &tiled,
                &reference,
            );
        }
    }
}

#[test]
fn symmetric_and_full_runs_agree() {
    let settings = classic(
        noisy_series(60, 1),
        EmbeddingParams::new(2, 3),
        NeighbourhoodCondition::FixedRadius(0.4),
        0,
    );
    assert!(settings.is_matrix_symmetric());

    for theiler in [0, 1, 3] {
        let sym =
            Settings::classic(settings.x().clone(), settings.neighbourhood(), theiler).unwrap();
        let non_sym = sym.clone().without_symmetry();
        let a = EuclideanEngine::new(sym, ExecutionOptions::default()).unwrap();
        let b = EuclideanEngine::new(non_sym, ExecutionOptions::default()).unwrap();
        let ra = a.run(&mut device(200)).unwrap();
        let rb = b.run(&mut device(200)).unwrap();
        assert_same(&format!("theiler {theiler}"), &ra, &rb);
        assert_same(&format!("theiler {theiler} baseline"), &ra, &b.baseline());
        assert!(ra.tiles_processed() < rb.tiles_processed());
    }
}

#[test]
fn symmetric_and_full_runs_agree_without_overlap() {
    let variant = VariantFlags {
        overlap: OverlapPolicy::None,
        ..VariantFlags::default()
    };
    for n in [8, 13, 21, 34] {
        let settings = classic(
            noisy_series(n, n as u64),
            EmbeddingParams::new(1, 1),
            NeighbourhoodCondition::FixedRadius(0.4),
            0,
        );
        let sym = engine_for::<EuclideanMetric>(settings.clone(), variant);
        let full = engine_for::<EuclideanMetric>(settings.without_symmetry(), variant);
        for max_alloc in [40, 64, 100, 150] {
            let a = sym.run(&mut device(max_alloc)).unwrap();
            let b = full.run(&mut device(max_alloc)).unwrap();
            assert_same(&format!("n {n}, max_alloc {max_alloc}"), &a, &b);
            assert!(a.symmetric && !b.symmetric);
            assert!(a.tiles_processed() <= b.tiles_processed());
        }
    }
}

#[test]
fn recycling_with_small_tiles_matches_one_giant_tile() {
    let settings = classic(
        noisy_series(80, 2),
        EmbeddingParams::new(3, 1),
        NeighbourhoodCondition::FixedRadius(0.5),
        2,
    );
    let engine = EuclideanEngine::new(settings, ExecutionOptions::default()).unwrap();
    let giant = engine.run(&mut device(1 << 20)).unwrap();
    assert_eq!(giant.tiles_processed(), 1);
    for max_alloc in [16, 100, 333, 1000] {
        let small = engine.run(&mut device(max_alloc)).unwrap();
        assert!(small.tiles_processed() > 1);
        assert_same(&format!("max_alloc {max_alloc}"), &small, &giant);
    }
}

#[test]
fn runs_without_overlap_keep_cell_counts() {
    let settings = classic(
        noisy_series(50, 3),
        EmbeddingParams::new(1, 1),
        NeighbourhoodCondition::FixedRadius(0.3),
        0,
    )
    .without_symmetry();
    let variant = VariantFlags {
        overlap: OverlapPolicy::None,
        ..VariantFlags::default()
    };
    let engine = engine_for::<EuclideanMetric>(settings, variant);
    let giant = engine.run(&mut device(1 << 20)).unwrap();
    let reference = engine.baseline();
    assert_same("single tile without overlap", &giant, &reference);

    let split = engine.run(&mut device(64)).unwrap();
    assert_eq!(split.recurrence_points, reference.recurrence_points);
    // lines can only get shorter when they are cut at tile borders
    assert!(split.longest_diagonal_line() <= reference.longest_diagonal_line());
    assert!(split.longest_vertical_line() <= reference.longest_vertical_line());
}

#[test]
fn runs_are_idempotent() {
    let config = AnalysisConfig {
        embedding: EmbeddingParams::new(2, 2),
        neighbourhood: NeighbourhoodCondition::FixedRadius(0.35),
        theiler_corrector: 1,
        ..AnalysisConfig::default()
    };
    let engine = EuclideanEngine::from_config(&config, noisy_series(70, 4)).unwrap();
    let first = engine.run(&mut device(128)).unwrap();
    let second = engine.run(&mut device(128)).unwrap();
    assert!(first.same_statistics(&second));
    assert_eq!(first.tiles_processed(), second.tiles_processed());
}

#[test]
fn single_vector_yields_empty_histograms() {
    let embedding = EmbeddingParams::new(3, 2);
    let samples = vec![0.25; embedding.span()];
    let settings = classic(
        samples,
        embedding,
        NeighbourhoodCondition::FixedRadius(0.1),
        0,
    );
    assert_eq!(settings.number_of_vectors_x(), 1);

    let engine = EuclideanEngine::new(settings, ExecutionOptions::default()).unwrap();
    let result = engine.run(&mut device(64)).unwrap();
    assert!(result.diagonal_histogram.is_empty());
    assert!(result.vertical_histogram.is_empty());
    assert!(result.white_vertical_histogram.is_empty());
    assert_eq!(result.recurrence_points, vec![1]);
    assert_eq!(result.min_line_lengths.diagonal, 2);
}

#[test]
fn cross_analysis_matches_baseline() {
    let x = TimeSeriesView::from_samples(noisy_series(45, 5), EmbeddingParams::new(2, 1)).unwrap();
    let y = TimeSeriesView::from_samples(noisy_series(31, 6), EmbeddingParams::new(2, 1)).unwrap();
    let settings = Settings::cross(x, y, NeighbourhoodCondition::FixedRadius(0.45), 0).unwrap();
    assert!(!settings.is_matrix_symmetric());

    for variant in VariantFlags::all().filter(|v| v.overlap == OverlapPolicy::Recycle) {
        let engine = engine_for::<EuclideanMetric>(settings.clone(), variant);
        let tiled = engine.run(&mut device(150)).unwrap();
        assert_same(&variant.name(), &tiled, &engine.baseline());
        assert_eq!(tiled.recurrence_points.len(), 44);
    }
}

#[test]
fn other_metrics_and_corridors_match_baseline() {
    let samples = noisy_series(55, 7);
    let corridor = NeighbourhoodCondition::RadiusCorridor { min: 0.1, max: 0.6 };
    let settings = classic(samples.clone(), EmbeddingParams::new(2, 2), corridor, 1);

    let max = MaximumEngine::new(settings.clone(), ExecutionOptions::default()).unwrap();
    let result = max.run(&mut device(90)).unwrap();
    assert_same("maximum", &result, &max.baseline());

    let taxi = TaxicabEngine::new(settings, ExecutionOptions::default()).unwrap();
    let result = taxi.run(&mut device(90)).unwrap();
    assert_same("taxicab", &result, &taxi.baseline());
    assert_eq!(result.similarity_measure, "taxicab");

    // a corridor starting above zero excludes the main diagonal
    let full = MaximumEngine::new(
        classic(samples, EmbeddingParams::new(2, 2), corridor, 0),
        ExecutionOptions::default(),
    )
    .unwrap()
    .run(&mut device(90))
    .unwrap();
    assert_eq!(full.diagonal_histogram.get(full.number_of_vectors_x), 0);
}

#[test]
fn emitted_edge_runs_match_baseline() {
    let settings = classic(
        noisy_series(40, 8),
        EmbeddingParams::new(1, 1),
        NeighbourhoodCondition::FixedRadius(0.5),
        0,
    );
    let options = ExecutionOptions::default().with_vertical_edge_runs(EdgeRunPolicy::Emit);
    let engine = EuclideanEngine::new(settings.clone(), options).unwrap();
    let emitted = engine.run(&mut device(50)).unwrap();
    assert_same("emit", &emitted, &engine.baseline());

    let discarded = EuclideanEngine::new(settings, ExecutionOptions::default())
        .unwrap()
        .run(&mut device(50))
        .unwrap();
    assert!(emitted.number_of_vertical_lines() >= discarded.number_of_vertical_lines());
}

#[test]
fn epsilon_greedy_selection_matches_baseline() {
    let settings = classic(
        noisy_series(64, 9),
        EmbeddingParams::new(2, 1),
        NeighbourhoodCondition::FixedRadius(0.4),
        0,
    );
    let selector = SelectorKind::EpsilonGreedy {
        epsilon: 0.3,
        seed: 11,
    };
    let options = ExecutionOptions::default().with_selector(selector);
    let engine = EuclideanEngine::new(settings, options).unwrap();
    let result = engine.run(&mut device(40)).unwrap();
    assert_same("epsilon greedy", &result, &engine.baseline());
    assert!(result.tiles_processed() > 8);
    // every equivalent variant is tried once before exploiting
    assert_eq!(result.variant_usage.len(), 8);
    for name in result.variant_usage.keys() {
        assert!(name.contains("recycle"), "{name}");
    }
}

#[test]
fn every_adaptive_selector_matches_baseline() {
    let settings = classic(
        noisy_series(48, 18),
        EmbeddingParams::new(2, 1),
        NeighbourhoodCondition::FixedRadius(0.4),
        1,
    );
    let reference = EuclideanEngine::new(settings.clone(), ExecutionOptions::default())
        .unwrap()
        .baseline();
    for selector in [
        SelectorKind::EpsilonDecreasing {
            epsilon: 0.8,
            delta: 0.5,
            seed: 1,
        },
        SelectorKind::EpsilonFirst {
            explore: 6,
            seed: 2,
        },
        SelectorKind::VwGreedy {
            factor: 2.0,
            seed: 3,
        },
    ] {
        let options = ExecutionOptions::default().with_selector(selector);
        let engine = EuclideanEngine::new(settings.clone(), options).unwrap();
        let result = engine.run(&mut device(40)).unwrap();
        assert_same(&format!("{selector:?}"), &result, &reference);
        assert_eq!(result.variant_usage.len(), 8, "{selector:?}");
        for name in result.variant_usage.keys() {
            assert!(name.contains("recycle"), "{name}");
        }
    }
}

#[test]
fn partitioned_run_over_several_devices() {
    let settings = classic(
        noisy_series(90, 10),
        EmbeddingParams::new(2, 1),
        NeighbourhoodCondition::FixedRadius(0.4),
        0,
    );
    let engine = EuclideanEngine::new(settings, ExecutionOptions::default()).unwrap();
    let reference = engine.baseline();

    let mut one = vec![device(500)];
    let whole = engine.run_partitioned(&mut one).unwrap();
    assert_same("one device", &whole, &reference);
    // bands never use the symmetry of the matrix
    assert!(!whole.symmetric);
    assert!(engine.run(&mut device(500)).unwrap().symmetric);

    let mut devices: Vec<_> = (0..3).map(|_| device(500)).collect();
    let split = engine.run_partitioned(&mut devices).unwrap();
    assert_eq!(split.vertical_histogram, reference.vertical_histogram);
    assert_eq!(
        split.white_vertical_histogram,
        reference.white_vertical_histogram
    );
    assert_eq!(split.recurrence_points, reference.recurrence_points);
    assert!(!split.symmetric);
    for d in &devices {
        assert!(d.submitted_commands() > 0);
        assert_eq!(d.in_use_bytes(), 0);
    }
}

#[test]
fn failing_band_fails_the_partitioned_run() {
    let settings = classic(
        noisy_series(90, 19),
        EmbeddingParams::new(2, 1),
        NeighbourhoodCondition::FixedRadius(0.4),
        0,
    );
    let engine = EuclideanEngine::new(settings, ExecutionOptions::default()).unwrap();
    let tight = DeviceDescriptor::new("tight", 400, 8).with_global_mem_bytes(100);
    let mut devices = vec![device(500), Device::new(tight), device(500)];
    let err = engine.run_partitioned(&mut devices).unwrap_err();
    assert!(
        matches!(err, RqaError::SubMatrixNotProcessed { .. }),
        "{err}"
    );
    assert!(devices.iter().all(|d| d.in_use_bytes() == 0));
}

#[test]
fn joint_analysis_matches_baseline() {
    let first = classic(
        noisy_series(70, 16),
        EmbeddingParams::new(2, 1),
        NeighbourhoodCondition::FixedRadius(0.5),
        1,
    );
    let second = classic(
        noisy_series(64, 17),
        EmbeddingParams::new(1, 1),
        NeighbourhoodCondition::RadiusCorridor { min: 0.0, max: 0.6 },
        0,
    );
    let joint = Settings::joint(first.clone(), second.clone());
    assert!(joint.is_matrix_symmetric());
    assert_eq!(joint.number_of_vectors_x(), 64);

    for variant in VariantFlags::all().filter(|v| v.overlap == OverlapPolicy::Recycle) {
        let engine = engine_for::<EuclideanMetric>(joint.clone(), variant);
        let tiled = engine.run(&mut device(120)).unwrap();
        assert_same(&variant.name(), &tiled, &engine.baseline());
        assert_eq!(tiled.components, 2);
    }

    // a joint recurrence is a recurrence of every component
    let plot = engine_for::<EuclideanMetric>(joint, VariantFlags::default())
        .recurrence_plot(&mut device(120))
        .unwrap();
    let plot_first = recurrence_matrix::<EuclideanMetric>(&first);
    let plot_second = recurrence_matrix::<EuclideanMetric>(&second);
    for y in 0..64 {
        for x in 0..64 {
            let both = plot_first.get(x, y) && plot_second.get(x, y);
            assert_eq!(plot.get(x, y), both, "cell ({x},{y})");
        }
    }
}

#[test]
fn recurrence_plot_matches_full_matrix() {
    let settings = classic(
        noisy_series(30, 12),
        EmbeddingParams::new(2, 2),
        NeighbourhoodCondition::FixedRadius(0.5),
        0,
    );
    let expected = recurrence_matrix::<EuclideanMetric>(&settings);
    for variant in [VariantFlags::from_index(0), VariantFlags::from_index(9)] {
        let engine = engine_for::<EuclideanMetric>(settings.clone(), variant);
        let plot = engine.recurrence_plot(&mut device(20)).unwrap();
        assert_eq!(plot, expected, "{}", variant.name());
    }
}

#[test]
fn minimal_tile_too_large_fails_before_device_work() {
    let settings = classic(
        CHECKERBOARD.to_vec(),
        EmbeddingParams::new(1, 1),
        NeighbourhoodCondition::FixedRadius(0.5),
        0,
    );
    let engine = EuclideanEngine::new(settings, ExecutionOptions::default()).unwrap();
    let mut dev = device(0);
    let err = engine.run(&mut dev).unwrap_err();
    assert!(matches!(err, RqaError::SubMatrixTooLarge { .. }), "{err}");
    assert_eq!(dev.submitted_commands(), 0);
}

#[test]
fn exhausted_device_memory_aborts_run() {
    let settings = classic(
        noisy_series(40, 13),
        EmbeddingParams::new(1, 1),
        NeighbourhoodCondition::FixedRadius(0.5),
        0,
    );
    let engine = EuclideanEngine::new(settings, ExecutionOptions::default()).unwrap();
    let mut dev = Device::new(DeviceDescriptor::new("tight", 400, 8).with_global_mem_bytes(100));
    let err = engine.run(&mut dev).unwrap_err();
    assert!(
        matches!(err, RqaError::SubMatrixNotProcessed { .. }),
        "{err}"
    );
    assert_eq!(dev.in_use_bytes(), 0);
}

#[test]
fn cancelled_run_returns_no_result() {
    let settings = classic(
        noisy_series(40, 14),
        EmbeddingParams::new(1, 1),
        NeighbourhoodCondition::FixedRadius(0.5),
        0,
    );
    let engine = EuclideanEngine::new(settings, ExecutionOptions::default()).unwrap();
    let token = CancellationToken::new();
    let observer = token.clone();
    observer.cancel();
    let mut dev = device(64);
    let err = engine.run_with_cancellation(&mut dev, &token).unwrap_err();
    assert!(matches!(err, RqaError::Cancelled { tiles_completed: 0 }));
    assert_eq!(dev.in_use_bytes(), 0);
}

#[test]
fn invalid_configuration_is_rejected_up_front() {
    let config = AnalysisConfig {
        neighbourhood: NeighbourhoodCondition::RadiusCorridor { min: 0.5, max: 0.5 },
        ..AnalysisConfig::default()
    };
    let err = EuclideanEngine::from_config(&config, CHECKERBOARD.to_vec());
    assert!(matches!(err, Err(RqaError::InvalidNeighbourhoodCondition(_))));

    let config = AnalysisConfig {
        embedding: EmbeddingParams::new(5, 3),
        ..AnalysisConfig::default()
    };
    let err = EuclideanEngine::from_config(&config, CHECKERBOARD.to_vec());
    let Err(RqaError::SeriesTooShort { samples, required }) = err else {
        panic!("eight samples cannot hold a (5, 3) embedding");
    };
    assert_eq!((samples, required), (8, 13));

    let selector = SelectorKind::EpsilonGreedy {
        epsilon: -0.1,
        seed: 0,
    };
    let options = ExecutionOptions::default().with_selector(selector);
    let settings = classic(
        CHECKERBOARD.to_vec(),
        EmbeddingParams::new(1, 1),
        NeighbourhoodCondition::FixedRadius(0.5),
        0,
    );
    assert!(matches!(
        EuclideanEngine::new(settings, options),
        Err(RqaError::InvalidConfig(_))
    ));
}

#[test]
fn bit_representation_fits_more_cells_per_tile() {
    let settings = classic(
        noisy_series(100, 15),
        EmbeddingParams::new(1, 1),
        NeighbourhoodCondition::FixedRadius(0.4),
        0,
    );
    let byte = engine_for::<EuclideanMetric>(settings.clone(), VariantFlags::default());
    let bit = engine_for::<EuclideanMetric>(
        settings,
        VariantFlags {
            representation: CellRepresentation::Bit,
            ..VariantFlags::default()
        },
    );
    let rb = byte.run(&mut device(256)).unwrap();
    let rp = bit.run(&mut device(256)).unwrap();
    assert!(rp.tiles_processed() < rb.tiles_processed());
    assert_same("bit vs byte", &rp, &rb);
}
