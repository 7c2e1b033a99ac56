//! Stacked Elman network with a dense head
//!
//! `h_t = relu(W_x · x_t + W_h · h_{t-1} + b)` per layer, inverted dropout on
//! every layer output that feeds the next layer or the head, and a single
//! linear output read from the last time step. Trained with full
//! backpropagation through time and Adam.

use ndarray::{Array1, Array2, ArrayD, ArrayViewD, ArrayViewMutD, Zip};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;
use rand_distr::{Distribution, Normal};

const CLIP_NORM: f64 = 1.0;
const ADAM_BETA1: f64 = 0.9;
const ADAM_BETA2: f64 = 0.999;
const ADAM_EPSILON: f64 = 1e-7;

/// Network shape and optimiser settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct NetworkSpec {
    pub hidden_units: usize,
    pub layers: usize,
    pub dropout: f64,
    pub learning_rate: f64,
}

#[derive(Debug, Clone)]
struct RecurrentLayer {
    w_x: Array2<f64>,
    w_h: Array2<f64>,
    b: Array1<f64>,
}

impl RecurrentLayer {
    fn zeros(input: usize, hidden: usize) -> Self {
        Self {
            w_x: Array2::zeros((hidden, input)),
            w_h: Array2::zeros((hidden, hidden)),
            b: Array1::zeros(hidden),
        }
    }

    fn random(input: usize, hidden: usize, rng: &mut StdRng) -> Option<Self> {
        let input_std = (2.0 / (input + hidden) as f64).sqrt();
        let recurrent_std = 0.5 / (hidden as f64).sqrt();
        Some(Self {
            w_x: random_matrix((hidden, input), input_std, rng)?,
            w_h: random_matrix((hidden, hidden), recurrent_std, rng)?,
            b: Array1::zeros(hidden),
        })
    }
}

/// Trainable parameters, also used to hold their gradients
#[derive(Debug, Clone)]
struct Parameters {
    layers: Vec<RecurrentLayer>,
    head_w: Array1<f64>,
    head_b: Array1<f64>,
}

impl Parameters {
    fn zeros_like(other: &Parameters) -> Self {
        Self {
            layers: other
                .layers
                .iter()
                .map(|l| RecurrentLayer::zeros(l.w_x.ncols(), l.w_x.nrows()))
                .collect(),
            head_w: Array1::zeros(other.head_w.len()),
            head_b: Array1::zeros(1),
        }
    }

    fn tensors(&self) -> Vec<ArrayViewD<'_, f64>> {
        let mut out = Vec::with_capacity(self.layers.len() * 3 + 2);
        for layer in &self.layers {
            out.push(layer.w_x.view().into_dyn());
            out.push(layer.w_h.view().into_dyn());
            out.push(layer.b.view().into_dyn());
        }
        out.push(self.head_w.view().into_dyn());
        out.push(self.head_b.view().into_dyn());
        out
    }

    fn tensors_mut(&mut self) -> Vec<ArrayViewMutD<'_, f64>> {
        let mut out = Vec::with_capacity(self.layers.len() * 3 + 2);
        for layer in &mut self.layers {
            out.push(layer.w_x.view_mut().into_dyn());
            out.push(layer.w_h.view_mut().into_dyn());
            out.push(layer.b.view_mut().into_dyn());
        }
        out.push(self.head_w.view_mut().into_dyn());
        out.push(self.head_b.view_mut().into_dyn());
        out
    }

    fn scale(&mut self, factor: f64) {
        for mut tensor in self.tensors_mut() {
            tensor.mapv_inplace(|g| g * factor);
        }
    }

    fn norm(&self) -> f64 {
        self.tensors()
            .iter()
            .map(|t| t.iter().map(|g| g * g).sum::<f64>())
            .sum::<f64>()
            .sqrt()
    }
}

/// Adam moment estimates
#[derive(Debug, Clone)]
struct Adam {
    m: Vec<ArrayD<f64>>,
    v: Vec<ArrayD<f64>>,
    step: i32,
}

impl Adam {
    fn new(params: &Parameters) -> Self {
        let zeros: Vec<ArrayD<f64>> = params
            .tensors()
            .iter()
            .map(|t| ArrayD::zeros(t.raw_dim()))
            .collect();
        Self {
            m: zeros.clone(),
            v: zeros,
            step: 0,
        }
    }

    fn update(&mut self, params: &mut Parameters, grads: &Parameters, learning_rate: f64) {
        self.step += 1;
        let bias1 = 1.0 - ADAM_BETA1.powi(self.step);
        let bias2 = 1.0 - ADAM_BETA2.powi(self.step);

        for ((param, grad), (m, v)) in params
            .tensors_mut()
            .into_iter()
            .zip(grads.tensors())
            .zip(self.m.iter_mut().zip(self.v.iter_mut()))
        {
            Zip::from(param)
                .and(&grad)
                .and(m)
                .and(v)
                .for_each(|p, &g, m, v| {
                    *m = ADAM_BETA1 * *m + (1.0 - ADAM_BETA1) * g;
                    *v = ADAM_BETA2 * *v + (1.0 - ADAM_BETA2) * g * g;
                    let m_hat = *m / bias1;
                    let v_hat = *v / bias2;
                    *p -= learning_rate * m_hat / (v_hat.sqrt() + ADAM_EPSILON);
                });
        }
    }
}

/// Activations of one layer over a sequence
struct LayerTrace {
    inputs: Vec<Array1<f64>>,
    pre: Vec<Array1<f64>>,
    hidden: Vec<Array1<f64>>,
}

/// Everything the backward pass needs from a forward pass
struct Trace {
    layers: Vec<LayerTrace>,
    /// Dropout masks applied to each layer's output (scaled by 1 / keep)
    masks: Vec<Array1<f64>>,
    head_input: Array1<f64>,
    output: f64,
}

#[derive(Debug, Clone)]
pub(crate) struct ElmanNetwork {
    spec: NetworkSpec,
    params: Parameters,
}

impl ElmanNetwork {
    /// Randomly initialised network for scalar input sequences
    pub fn new(spec: NetworkSpec, rng: &mut StdRng) -> Option<Self> {
        let hidden = spec.hidden_units;
        let layers = (0..spec.layers)
            .map(|i| RecurrentLayer::random(if i == 0 { 1 } else { hidden }, hidden, rng))
            .collect::<Option<Vec<_>>>()?;
        let head_normal = Normal::new(0.0, (1.0 / hidden as f64).sqrt()).ok()?;
        let head_w = Array1::from_shape_fn(hidden, |_| head_normal.sample(&mut *rng));

        Some(Self {
            spec,
            params: Parameters {
                layers,
                head_w,
                head_b: Array1::zeros(1),
            },
        })
    }

    /// Inference pass, dropout disabled
    pub fn predict(&self, sequence: &[f64]) -> f64 {
        self.forward(sequence, None).output
    }

    /// One epoch of mini-batch training over `(window, target)` pairs.
    /// Returns the mean squared training error of the epoch.
    pub fn train_epoch(
        &mut self,
        samples: &[(&[f64], f64)],
        batch_size: usize,
        optimiser: &mut NetworkOptimiser,
        rng: &mut StdRng,
    ) -> f64 {
        let mut order: Vec<usize> = (0..samples.len()).collect();
        order.shuffle(rng);

        let mut loss = 0.0;
        for batch in order.chunks(batch_size.max(1)) {
            let mut grads = Parameters::zeros_like(&self.params);
            for &idx in batch {
                let (sequence, target) = samples[idx];
                let masks = self.sample_masks(rng);
                let trace = self.forward(sequence, Some(masks));
                let error = trace.output - target;
                loss += error * error;
                self.backward(&trace, 2.0 * error, &mut grads);
            }

            grads.scale(1.0 / batch.len() as f64);
            let norm = grads.norm();
            if norm > CLIP_NORM {
                grads.scale(CLIP_NORM / norm);
            }
            optimiser
                .adam
                .update(&mut self.params, &grads, self.spec.learning_rate);
        }

        loss / samples.len().max(1) as f64
    }

    pub fn optimiser(&self) -> NetworkOptimiser {
        NetworkOptimiser {
            adam: Adam::new(&self.params),
        }
    }

    fn sample_masks(&self, rng: &mut StdRng) -> Vec<Array1<f64>> {
        let keep = 1.0 - self.spec.dropout;
        (0..self.spec.layers)
            .map(|_| {
                Array1::from_shape_fn(self.spec.hidden_units, |_| {
                    if rng.gen::<f64>() < keep {
                        1.0 / keep
                    } else {
                        0.0
                    }
                })
            })
            .collect()
    }

    fn forward(&self, sequence: &[f64], masks: Option<Vec<Array1<f64>>>) -> Trace {
        let hidden = self.spec.hidden_units;
        let masks =
            masks.unwrap_or_else(|| vec![Array1::ones(hidden); self.params.layers.len()]);

        let mut inputs: Vec<Array1<f64>> =
            sequence.iter().map(|&x| Array1::from_elem(1, x)).collect();
        let mut layers = Vec::with_capacity(self.params.layers.len());

        for (layer, mask) in self.params.layers.iter().zip(&masks) {
            let mut state = Array1::zeros(hidden);
            let mut pre = Vec::with_capacity(inputs.len());
            let mut states = Vec::with_capacity(inputs.len());

            for x in &inputs {
                let a = layer.w_x.dot(x) + layer.w_h.dot(&state) + &layer.b;
                state = a.mapv(relu);
                pre.push(a);
                states.push(state.clone());
            }

            let next_inputs = states.iter().map(|h| h * mask).collect();
            layers.push(LayerTrace {
                inputs: std::mem::replace(&mut inputs, next_inputs),
                pre,
                hidden: states,
            });
        }

        let head_input = inputs.pop().unwrap_or_else(|| Array1::zeros(hidden));
        let output = self.params.head_w.dot(&head_input) + self.params.head_b[0];

        Trace {
            layers,
            masks,
            head_input,
            output,
        }
    }

    fn backward(&self, trace: &Trace, d_output: f64, grads: &mut Parameters) {
        let hidden = self.spec.hidden_units;
        grads.head_w.scaled_add(d_output, &trace.head_input);
        grads.head_b[0] += d_output;

        let steps = trace.layers.first().map_or(0, |l| l.inputs.len());
        if steps == 0 {
            return;
        }

        // Gradient reaching each layer output from above, per time step
        let mut from_above = vec![Array1::zeros(hidden); steps];
        if let Some(head_mask) = trace.masks.last() {
            from_above[steps - 1] = &self.params.head_w * d_output * head_mask;
        }

        for l in (0..trace.layers.len()).rev() {
            let layer = &self.params.layers[l];
            let layer_trace = &trace.layers[l];
            let grad = &mut grads.layers[l];

            let mut d_next = Array1::zeros(hidden);
            let mut to_below = vec![Array1::zeros(layer.w_x.ncols()); steps];

            for t in (0..steps).rev() {
                let d_h = &from_above[t] + &d_next;
                let d_a = &d_h * &layer_trace.pre[t].mapv(relu_grad);

                let x = &layer_trace.inputs[t];
                grad.w_x += &outer(&d_a, x);
                if t > 0 {
                    grad.w_h += &outer(&d_a, &layer_trace.hidden[t - 1]);
                }
                grad.b += &d_a;

                d_next = layer.w_h.t().dot(&d_a);
                to_below[t] = layer.w_x.t().dot(&d_a);
            }

            if l > 0 {
                let mask = &trace.masks[l - 1];
                from_above = to_below.into_iter().map(|d| d * mask).collect();
            }
        }
    }
}

/// Optimiser state owned by one training run
#[derive(Debug, Clone)]
pub(crate) struct NetworkOptimiser {
    adam: Adam,
}

fn relu(x: f64) -> f64 {
    x.max(0.0)
}

fn relu_grad(x: f64) -> f64 {
    if x > 0.0 {
        1.0
    } else {
        0.0
    }
}

fn outer(a: &Array1<f64>, b: &Array1<f64>) -> Array2<f64> {
    let column = a.view().insert_axis(ndarray::Axis(1));
    let row = b.view().insert_axis(ndarray::Axis(0));
    column.dot(&row)
}

fn random_matrix(shape: (usize, usize), std: f64, rng: &mut StdRng) -> Option<Array2<f64>> {
    let normal = Normal::new(0.0, std).ok()?;
    Some(Array2::from_shape_fn(shape, |_| normal.sample(&mut *rng)))
}
