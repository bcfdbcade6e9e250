use crate::metrics::BatchMetrics;
use crate::residual::{ResidualBlock, ResidualBlockConfig};
use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::nn::loss::CrossEntropyLossConfig;
use burn::nn::{BatchNorm, BatchNormConfig, PaddingConfig2d};
use burn::prelude::*;

/// Residual convolutional classifier for single-channel square images.
///
/// Two residual blocks followed by a projection-and-pooling head: a
/// convolution projecting to one channel per class, batch normalization, a
/// global max over the spatial positions, and a flatten down to one score per
/// class. Outputs are unnormalized scores (logits).
#[derive(Module, Debug)]
pub struct ResCnn<B: Backend> {
    pub block1: ResidualBlock<B>,
    pub block2: ResidualBlock<B>,

    /// Input channel: block2 output.
    /// Output channel: num_classes.
    pub head_conv: Conv2d<B>,
    pub head_norm: BatchNorm<B, 2>,

    /// Height and width of the input images.
    pub image_size: usize,
}

#[derive(Config, Debug)]
pub struct ResCnnConfig {
    #[config(default = 10)]
    pub num_classes: usize,

    /// Height and width of the input images.
    #[config(default = 28)]
    pub image_size: usize,

    /// Channel counts for the first residual block. The single input channel
    /// broadcasts against the block output in the skip connection.
    #[config(default = "[1, 8, 16]")]
    pub block1_channels: [usize; 3],

    /// Channel counts for the second residual block. Input and output counts
    /// are equal, so its skip connection is an exact elementwise sum.
    #[config(default = "[16, 32, 16]")]
    pub block2_channels: [usize; 3],
}

impl ResCnnConfig {
    /// Returns the initialized model.
    pub fn init<B: Backend>(&self, device: &B::Device) -> ResCnn<B> {
        debug_assert_eq!(self.block1_channels[2], self.block2_channels[0]);
        ResCnn {
            block1: ResidualBlockConfig::new(self.block1_channels).init(device),
            block2: ResidualBlockConfig::new(self.block2_channels).init(device),
            head_conv: Conv2dConfig::new([self.block2_channels[2], self.num_classes], [3, 3])
                .with_padding(PaddingConfig2d::Explicit(1, 1))
                .init(device),
            head_norm: BatchNormConfig::new(self.num_classes).init(device),
            image_size: self.image_size,
        }
    }
}

impl<B: Backend> ResCnn<B> {
    /// # Shapes
    ///   - Input [batch, image_size * image_size]
    ///   - Output [batch, num_classes]
    pub fn forward(&self, images: Tensor<B, 2>) -> Tensor<B, 2> {
        let [batch_size, pixels] = images.dims();
        debug_assert_eq!(self.image_size * self.image_size, pixels);

        let x = images.reshape([batch_size, 1, self.image_size, self.image_size]);
        let x = self.block1.forward(x);
        let x = self.block2.forward(x);
        let x = self.head_conv.forward(x);
        let x = self.head_norm.forward(x);

        // global max over the spatial positions (adaptive max pool down to 1x1)
        let [_, classes, height, width] = x.dims();
        let x = x.reshape([batch_size, classes, height * width]).max_dim(2);
        x.reshape([batch_size, classes])
    }

    /// Runs one forward pass and derives both the loss and the batch metrics
    /// from the same logits.
    pub fn forward_classification(
        &self,
        images: Tensor<B, 2>,
        targets: Tensor<B, 1, Int>,
    ) -> (Tensor<B, 1>, BatchMetrics) {
        let logits = self.forward(images);
        let loss = CrossEntropyLossConfig::new()
            .init(&logits.device())
            .forward(logits.clone(), targets.clone());
        let metrics = BatchMetrics::from_output(&loss, &logits, &targets);

        (loss, metrics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::tensor::Distribution;

    type TestBackend = burn::backend::NdArray;

    #[test]
    fn output_is_one_score_per_class() {
        let device = Default::default();
        let model = ResCnnConfig::new().init::<TestBackend>(&device);

        let images = Tensor::random([5, 28 * 28], Distribution::Default, &device);
        let logits = model.forward(images);
        assert_eq!([5, 10], logits.dims());
    }

    #[test]
    fn forward_is_deterministic_for_fixed_weights() {
        let device = Default::default();
        let model = ResCnnConfig::new().init::<TestBackend>(&device);

        let images = Tensor::random([2, 28 * 28], Distribution::Default, &device);
        let first = model.forward(images.clone());
        let second = model.forward(images);
        assert_eq!(first.to_data(), second.to_data());
    }

    #[test]
    fn seeding_makes_initialization_reproducible() {
        let device = Default::default();
        let images_data =
            Tensor::<TestBackend, 2>::random([2, 28 * 28], Distribution::Default, &device)
                .to_data();

        TestBackend::seed(7);
        let first = ResCnnConfig::new()
            .init::<TestBackend>(&device)
            .forward(Tensor::from_data(images_data.clone(), &device));

        TestBackend::seed(7);
        let second = ResCnnConfig::new()
            .init::<TestBackend>(&device)
            .forward(Tensor::from_data(images_data, &device));

        assert_eq!(first.to_data(), second.to_data());
    }

    #[test]
    fn classification_metrics_cover_the_whole_batch() {
        let device = Default::default();
        let model = ResCnnConfig::new().init::<TestBackend>(&device);

        let images = Tensor::random([4, 28 * 28], Distribution::Default, &device);
        let targets = Tensor::from_ints([0, 1, 2, 3], &device);
        let (loss, metrics) = model.forward_classification(images, targets);

        assert_eq!([1], loss.dims());
        assert_eq!(4, metrics.batch_size);
        assert!(metrics.loss.is_finite());
        assert!((0.0..=100.0).contains(&metrics.accuracy));
    }
}
