use log::info;
use machine_learning::{
    arch::scaled_normal,
    classifiers::TwoLayerNet,
    specs::{TrainSpec, TwoLayerSpec},
    training::accuracy,
    Classifier, Float, Result,
};
use ml_core::generate_rng;
use ndarray::prelude::*;

const CLASSES: usize = 4;

/// Noisy points around `CLASSES` centers evenly spaced on a circle.
fn blobs(n: usize, seed: u64) -> (Array2<Float>, Array1<usize>) {
    let mut rng = generate_rng(Some(seed));
    let mut x: Array2<Float> = scaled_normal((n, 2), 0.6, &mut rng);
    let y = Array1::from_shape_fn(n, |i| i % CLASSES);

    for (mut row, &class) in x.outer_iter_mut().zip(&y) {
        let angle = class as Float * std::f64::consts::TAU as Float / CLASSES as Float;
        row[0] += 3. * angle.cos();
        row[1] += 3. * angle.sin();
    }

    (x, y)
}

fn main() -> Result<()> {
    env_logger::init();

    let (x_train, y_train) = blobs(800, 0);
    let (x_val, y_val) = blobs(200, 1);

    let mut net = TwoLayerNet::new(&TwoLayerSpec {
        input_size: 2,
        hidden_size: 32,
        output_size: CLASSES,
        std: 0.1,
        seed: Some(0),
    });

    let spec = TrainSpec {
        learning_rate: 0.1,
        num_iters: 1000,
        batch_size: 100,
        reg: 1e-4,
        verbose: true,
        seed: Some(1),
        ..Default::default()
    };
    let history = net.train(x_train.view(), y_train.view(), x_val.view(), y_val.view(), &spec)?;

    let val_acc = accuracy(net.predict(x_val.view())?.view(), y_val.view())?;
    info!(
        final_loss = history.loss_history().last().copied().unwrap_or(Float::NAN),
        val_acc = val_acc;
        "training finished"
    );

    Ok(())
}
