use std::num::NonZeroUsize;

use machine_learning::{
    arch::{
        layers::{dropout, embedding},
        loss::temporal_softmax_loss,
        scaled_normal,
    },
    classifiers::{DistanceAlgorithm, FullyConnectedNet, KNearestNeighbor, TwoLayerFcNet},
    gradient_check::max_abs_diff,
    specs::{FcNetSpec, FcTwoLayerSpec, NormalizationSpec},
    Classifier, Float, Mode, Trainable,
};
use ml_core::generate_rng;
use ndarray::prelude::*;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn knn_tie_goes_to_smaller_label() {
    init_logger();

    let x_train = array![[0.], [1.], [-1.5], [2.5], [10.]];
    let y_train = array![5, 3, 5, 3, 1];
    let mut knn = KNearestNeighbor::new();
    knn.train(x_train.view(), y_train.view()).unwrap();

    let k = NonZeroUsize::new(4).unwrap();
    let pred = knn.predict(array![[0.2]].view(), k, DistanceAlgorithm::default()).unwrap();
    assert_eq!(pred, array![3]);
}

#[test]
fn knn_distance_algorithms_agree() {
    let mut rng = generate_rng(Some(9));
    let x_train: Array2<Float> = scaled_normal((30, 8), 1., &mut rng);
    let x_test: Array2<Float> = scaled_normal((7, 8), 1., &mut rng);

    let mut knn = KNearestNeighbor::new();
    knn.train(x_train.view(), Array1::zeros(30).view()).unwrap();

    let reference = knn.compute_distances(x_test.view(), DistanceAlgorithm::TwoLoops).unwrap();
    for num_loops in [0, 1] {
        let algorithm = DistanceAlgorithm::try_from(num_loops).unwrap();
        let dists = knn.compute_distances(x_test.view(), algorithm).unwrap();
        assert!(max_abs_diff(dists.view(), reference.view()) < 1e-9);
    }

    assert!(DistanceAlgorithm::try_from(3).is_err());
}

#[test]
fn masked_positions_are_ignored_by_temporal_softmax() {
    let mut rng = generate_rng(Some(4));
    let x: Array3<Float> = scaled_normal((2, 3, 4), 1., &mut rng);
    let mask = array![[true, false, true], [false, true, true]];

    // Masked targets may even be out of range.
    let y = array![[1, 99, 2], [99, 0, 3]];
    let (loss, dx) = temporal_softmax_loss(x.view(), y.view(), mask.view()).unwrap();

    let y_clean = array![[1, 0, 2], [0, 0, 3]];
    let (clean_loss, _) = temporal_softmax_loss(x.view(), y_clean.view(), mask.view()).unwrap();

    assert!((loss - clean_loss).abs() < 1e-12);
    assert!(dx.slice(s![0, 1, ..]).iter().all(|&g| g == 0.));
    assert!(dx.slice(s![1, 0, ..]).iter().all(|&g| g == 0.));
}

#[test]
fn embedding_gradient_sums_repeated_words() {
    let w: Array2<Float> = scaled_normal((5, 3), 1., &mut generate_rng(Some(2)));
    let x = array![[0, 2, 0], [4, 0, 2]];

    let (out, cache) = embedding::forward(x.view(), w.view()).unwrap();
    assert_eq!(out.slice(s![1, 0, ..]), w.row(4));

    let dw = embedding::backward(Array3::ones((2, 3, 3)).view(), cache);
    assert_eq!(dw.column(0), array![3., 0., 2., 0., 1.]);
}

#[test]
fn dropout_keeping_everything_is_identity() {
    let mut rng = generate_rng(Some(6));
    let x: Array2<Float> = scaled_normal((4, 5), 1., &mut rng);

    let (out, cache) = dropout::forward(x.view(), 1., Mode::Train, &mut rng).unwrap();
    assert_eq!(out, x);
    assert_eq!(dropout::backward(x.view(), cache), x);
}

#[test]
fn unnormalized_net_matches_plain_two_layer_net() {
    init_logger();

    let reg = 0.3;
    let mut deep = FullyConnectedNet::new(&FcNetSpec {
        hidden_dims: vec![6],
        input_dim: 4,
        num_classes: 3,
        normalization: NormalizationSpec::None,
        reg,
        weight_scale: 0.5,
        seed: Some(1),
        ..Default::default()
    })
    .unwrap();
    let mut plain = TwoLayerFcNet::new(&FcTwoLayerSpec {
        input_dim: 4,
        hidden_dim: 6,
        num_classes: 3,
        reg,
        ..Default::default()
    });

    let layers = &deep.params().layers;
    assert!(layers.iter().all(|layer| layer.norm.is_none()));

    let p = plain.params_mut();
    p.w1.assign(&layers[0].w);
    p.b1.assign(&layers[0].b);
    p.w2.assign(&layers[1].w);
    p.b2.assign(&layers[1].b);

    let x: Array2<Float> = scaled_normal((5, 4), 1., &mut generate_rng(Some(3)));
    let y = array![0, 2, 1, 1, 0];

    let deep_out = deep.loss(x.view(), Some(y.view())).unwrap();
    let (deep_loss, deep_grads) = deep_out.into_loss().unwrap();
    let plain_out = plain.loss(x.view(), Some(y.view())).unwrap();
    let (plain_loss, plain_grads) = plain_out.into_loss().unwrap();

    assert!((deep_loss - plain_loss).abs() < 1e-12);
    assert!(max_abs_diff(deep_grads.layers[0].w.view(), plain_grads.w1.view()) < 1e-12);
    assert!(max_abs_diff(deep_grads.layers[1].b.view(), plain_grads.b2.view()) < 1e-12);
}

#[test]
fn nets_are_built_from_json_specs() {
    let json = r#"{
        "hidden_dims": [12, 8],
        "input_dim": 6,
        "num_classes": 4,
        "normalization": "layer_norm",
        "dropout_keep_prob": 0.5,
        "seed": 3
    }"#;
    let spec: FcNetSpec = serde_json::from_str(json).unwrap();
    let mut net = FullyConnectedNet::new(&spec).unwrap();

    assert_eq!(net.num_layers(), 3);
    assert!(net.batch_norms().is_empty());

    let x: Array2<Float> = scaled_normal((3, 6), 1., &mut generate_rng(Some(0)));
    let pred = net.predict(x.view()).unwrap();
    assert!(pred.iter().all(|&class| class < 4));
}
