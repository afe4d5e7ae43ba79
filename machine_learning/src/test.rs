#![cfg(test)]

use std::{io::Cursor, num::NonZeroUsize};

use ndarray::{Array2, ArrayView2, ArrayViewMut2};
use rand::{SeedableRng, rngs::StdRng};

use crate::{
    MlErr, Result,
    arch::{
        Layer, LinearRegression, Model, ParamKind, ProcessorOpt, Stack,
        activations::ActFn,
        loss::{CrossEntropy, LossFn, Mse},
    },
    dataset::{Dataset, Label, Sample},
    graph::Graph,
    initialization::{InitScheme, Initializer, gain},
    optimization::{GradientDescent, Optimizer},
    training::{Trainer, TrainerConfig},
};

/// Records every update without touching the parameters.
#[derive(Default)]
struct RecordingOptimizer {
    updates: Vec<(usize, (usize, usize))>,
}

impl Optimizer for RecordingOptimizer {
    fn update_param(
        &mut self,
        slot: usize,
        _value: ArrayViewMut2<f32>,
        grad: ArrayView2<f32>,
    ) -> Result<()> {
        self.updates.push((slot, grad.dim()));
        Ok(())
    }
}

fn mlp(hidden: usize) -> Stack {
    Stack::new([
        Layer::perceptron(784, hidden, ActFn::ReLU),
        Layer::perceptron(hidden, 10, ActFn::Identity),
    ])
}

fn init(stack: &mut Stack, seed: u64) {
    let initializer = Initializer::new(ActFn::SoftMax, InitScheme::XavierUniform);
    initializer
        .init(stack, &mut StdRng::seed_from_u64(seed))
        .unwrap();
}

fn snapshot(model: &dyn Model) -> Vec<Array2<f32>> {
    model.params().iter().map(|p| p.value().to_owned()).collect()
}

fn synthetic_digits(n: usize) -> Vec<Sample> {
    (0..n)
        .map(|i| {
            let x = (0..784).map(|j| ((i * 31 + j) % 17) as f32 / 17.).collect();
            Sample::new(x, Label::Class(i % 10))
        })
        .collect()
}

#[test]
fn params_survive_a_serialization_round_trip() {
    let mut source = mlp(32);
    init(&mut source, 1);

    let mut buf = Vec::new();
    source.serialize(&mut buf).unwrap();

    let mut target = mlp(32);
    target.deserialize(&mut Cursor::new(buf)).unwrap();

    assert_eq!(target.params().len(), source.params().len());
    assert_eq!(snapshot(&target), snapshot(&source));
}

#[test]
fn children_params_are_visited_in_order() {
    let stack = Stack::new([
        Layer::perceptron(5, 4, ActFn::ReLU),
        Layer::linear_regression(4, 3),
        Layer::perceptron(3, 2, ActFn::Tanh),
    ]);

    let mut visited = Vec::new();
    stack.for_each_param(&mut |p| visited.push((p.kind(), p.shape())));

    assert_eq!(
        visited,
        [
            (ParamKind::Weights, (4, 5)),
            (ParamKind::Biases, (4, 1)),
            (ParamKind::Weights, (3, 4)),
            (ParamKind::Weights, (2, 3)),
            (ParamKind::Biases, (2, 1)),
        ]
    );
}

#[test]
fn initialization_skips_biases_and_follows_the_seed() {
    let mut a = mlp(16);
    a.for_each_param_mut(&mut |p| {
        if p.kind() == ParamKind::Biases {
            p.value_mut().fill(0.25);
        }
    });

    init(&mut a, 1);
    for p in a.params() {
        if p.kind() == ParamKind::Biases {
            assert!(p.value().iter().all(|&v| v == 0.25));
        }
    }

    let mut b = mlp(16);
    init(&mut b, 1);
    let mut c = mlp(16);
    init(&mut c, 2);

    let weights = |s: &Stack| -> Vec<Array2<f32>> {
        s.params()
            .iter()
            .filter(|p| p.kind() == ParamKind::Weights)
            .map(|p| p.value().to_owned())
            .collect()
    };
    assert_eq!(weights(&a), weights(&b));
    assert_ne!(weights(&b), weights(&c));
}

#[test]
fn hidden_layers_get_their_gain_and_the_last_one_the_output_gain() {
    let mut stack = Stack::new([
        Layer::perceptron(64, 64, ActFn::ReLU),
        Layer::perceptron(64, 64, ActFn::ReLU),
        Layer::perceptron(64, 64, ActFn::ReLU),
    ]);
    let initializer = Initializer::new(ActFn::Sigmoid, InitScheme::XavierUniform);

    let gains = initializer.gains(&stack);
    assert_eq!(gains, [gain(ActFn::ReLU), gain(ActFn::ReLU), gain(ActFn::Sigmoid)]);

    initializer
        .init(&mut stack, &mut StdRng::seed_from_u64(3))
        .unwrap();

    let unit_bound = (6f32 / 128.).sqrt();
    let max_abs = |i: usize| -> f32 {
        stack.layers()[i].params()[0]
            .value()
            .fold(0f32, |m, v| m.max(v.abs()))
    };

    let relu_bound = 2f32.sqrt() * unit_bound + 1e-6;
    assert!(max_abs(0) > unit_bound && max_abs(0) <= relu_bound);
    assert!(max_abs(1) > unit_bound && max_abs(1) <= relu_bound);
    assert!(max_abs(2) <= unit_bound + 1e-6);
}

#[test]
fn linear_regression_maps_three_values_to_two() {
    let model = LinearRegression::new(3, 2);
    let graph = Graph::new();
    let mut proc = model.new_processor(&graph, &[]).unwrap();

    let x = graph.new_vector(vec![1.0, 2.0, 3.0]);
    let ys = proc.forward(&[x]).unwrap();
    assert_eq!(ys.len(), 1);
    assert_eq!(graph.value(ys[0]).unwrap().dim(), (2, 1));

    let x = graph.new_vector(vec![1.0, 2.0, 3.0, 4.0]);
    assert!(matches!(
        proc.forward(&[x]),
        Err(MlErr::DimensionMismatch { .. })
    ));
}

#[test]
fn unsupported_option_is_rejected_at_construction() {
    let model = LinearRegression::new(3, 2);
    let graph = Graph::new();

    let res = model.new_processor(&graph, &[ProcessorOpt::Concurrent]);
    assert!(matches!(res, Err(MlErr::Configuration { .. })));
}

#[test]
fn one_step_of_the_mnist_mlp_only_touches_reachable_params() {
    let mut model = mlp(100);
    init(&mut model, 1);
    let before = snapshot(&model);
    let samples = synthetic_digits(5);

    {
        let graph = Graph::new();
        let mut proc = model.new_processor(&graph, &[]).unwrap();

        let mut ys = Vec::new();
        for sample in &samples {
            let x = graph.new_vector(sample.x.clone());
            ys.extend(proc.forward(&[x]).unwrap());
        }
        assert_eq!(ys.len(), 5);

        let indexed: Vec<_> = samples.iter().enumerate().collect();
        let loss = CrossEntropy.batch_loss(&graph, &ys, &indexed).unwrap();
        graph.backward(loss).unwrap();

        for (param, value) in model.params().iter().zip(&before) {
            assert!(param.has_grad());
            assert_eq!(param.grad().unwrap().dim(), param.shape());
            assert_eq!(&param.value(), value);
        }
    }

    let mut optimizer = RecordingOptimizer::default();
    optimizer.step(&mut model).unwrap();

    let expected: Vec<_> = model
        .params()
        .iter()
        .enumerate()
        .map(|(i, p)| (i, p.shape()))
        .collect();
    assert_eq!(optimizer.updates, expected);
    assert_eq!(snapshot(&model), before);
    assert!(model.params().iter().all(|p| !p.has_grad()));
}

#[test]
fn trainer_step_with_a_recording_optimizer() {
    let mut model = mlp(100);
    init(&mut model, 1);
    let before = snapshot(&model);

    let samples = synthetic_digits(5);
    let mut trainer = Trainer::new(
        model,
        RecordingOptimizer::default(),
        CrossEntropy,
        StdRng::seed_from_u64(743),
        TrainerConfig::default(),
    );

    let batch: Vec<_> = samples.iter().enumerate().collect();
    let loss = trainer.step(&batch).unwrap();

    assert!(loss.is_finite() && loss > 0.);
    assert_eq!(snapshot(trainer.model()), before);
}

#[test]
fn concurrent_forward_yields_the_same_gradients() {
    let mut model = Stack::new([
        Layer::perceptron(6, 8, ActFn::Tanh),
        Layer::perceptron(8, 3, ActFn::Identity),
    ]);
    Initializer::new(ActFn::SoftMax, InitScheme::XavierNormal)
        .init(&mut model, &mut StdRng::seed_from_u64(5))
        .unwrap();

    let samples: Vec<_> = (0..16)
        .map(|i| Sample::new(vec![i as f32 / 16.; 6], Label::Class(i % 3)))
        .collect();
    let indexed: Vec<_> = samples.iter().enumerate().collect();

    let mut grads = Vec::new();
    for opts in [&[][..], &[ProcessorOpt::Concurrent][..]] {
        let graph = Graph::new();
        let mut proc = model.new_processor(&graph, opts).unwrap();
        let xs: Vec<_> = samples
            .iter()
            .map(|s| graph.new_vector(s.x.clone()))
            .collect();

        let ys = proc.forward(&xs).unwrap();
        let loss = CrossEntropy.batch_loss(&graph, &ys, &indexed).unwrap();
        graph.backward(loss).unwrap();
        drop(proc);
        drop(graph);

        grads.push(
            model
                .params()
                .iter()
                .map(|p| p.grad().unwrap())
                .collect::<Vec<_>>(),
        );
        model.zero_grad();
    }

    for (a, b) in grads[0].iter().zip(&grads[1]) {
        assert!((a - b).iter().all(|d| d.abs() < 1e-5));
    }
}

#[test]
fn and_gate_convergence() {
    let and2: [([f32; 2], f32); 4] = [
        ([0.0, 0.0], 0.0),
        ([0.0, 1.0], 0.0),
        ([1.0, 0.0], 0.0),
        ([1.0, 1.0], 1.0),
    ];
    let samples = and2
        .iter()
        .map(|(x, y)| Sample::new(x.to_vec(), Label::Values(vec![*y])))
        .collect();
    let mut dataset = Dataset::new(samples).unwrap();

    let model = Stack::new([Layer::perceptron(2, 1, ActFn::Sigmoid)]);
    let config = TrainerConfig {
        epochs: 3000,
        batch_size: NonZeroUsize::new(4).unwrap(),
        eval_every: None,
        ..Default::default()
    };
    let mut trainer = Trainer::new(
        model,
        GradientDescent::new(2.),
        Mse,
        StdRng::seed_from_u64(743),
        config,
    );
    trainer.train(&mut dataset, None).unwrap();

    let model = trainer.model();
    let graph = Graph::new();
    let mut proc = model.new_processor(&graph, &[]).unwrap();
    for (x, y) in and2 {
        let x = graph.new_vector(x.to_vec());
        let y_pred = graph.scalar(proc.forward(&[x]).unwrap()[0]).unwrap();
        assert_eq!(y_pred > 0.5, y > 0.5, "expected {y}, got {y_pred}");
    }
}
