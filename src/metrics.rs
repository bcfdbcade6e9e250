use burn::prelude::*;

/// Metrics observed on one processed batch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatchMetrics {
    /// Scalar loss value for the batch.
    pub loss: f64,
    /// Share of correctly classified items, in percent (0.0..=100.0).
    pub accuracy: f64,
    /// Number of items in the batch.
    pub batch_size: usize,
}

impl BatchMetrics {
    /// Derives the (accuracy, loss, batch size) triple from one forward pass.
    ///
    /// # Shapes
    ///   - `loss` [1]
    ///   - `logits` [batch, num_classes]
    ///   - `targets` [batch]
    pub fn from_output<B: Backend>(
        loss: &Tensor<B, 1>,
        logits: &Tensor<B, 2>,
        targets: &Tensor<B, 1, Int>,
    ) -> Self {
        let [batch_size, _num_classes] = logits.dims();
        debug_assert_eq!([batch_size], targets.dims());

        let predictions = logits.clone().argmax(1).squeeze::<1>(1);
        let correct = predictions
            .equal(targets.clone())
            .int()
            .sum()
            .into_scalar()
            .elem::<f64>();

        BatchMetrics {
            loss: loss.clone().into_scalar().elem::<f64>(),
            accuracy: 100.0 * correct / batch_size as f64,
            batch_size,
        }
    }
}

/// Size-weighted accumulator for per-batch metrics.
///
/// The reported value is `Σ(value_i · n_i) / Σ(n_i)`, which reduces to the
/// plain mean when every batch has the same size and weights a smaller
/// trailing batch by its actual item count.
#[derive(Debug, Default, Clone, Copy)]
pub struct EpochMetrics {
    loss_sum: f64,
    accuracy_sum: f64,
    items: usize,
}

impl EpochMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one batch into the running totals.
    pub fn update(&mut self, batch: BatchMetrics) {
        self.loss_sum += batch.loss * batch.batch_size as f64;
        self.accuracy_sum += batch.accuracy * batch.batch_size as f64;
        self.items += batch.batch_size;
    }

    /// Total number of items folded in so far.
    pub fn items(&self) -> usize {
        self.items
    }

    /// Size-weighted average loss. Panics if no batch was recorded.
    pub fn loss(&self) -> f64 {
        assert_ne!(self.items, 0, "no batch was recorded");
        self.loss_sum / self.items as f64
    }

    /// Size-weighted average accuracy, in percent. Panics if no batch was recorded.
    pub fn accuracy(&self) -> f64 {
        assert_ne!(self.items, 0, "no batch was recorded");
        self.accuracy_sum / self.items as f64
    }
}
