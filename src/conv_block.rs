use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::nn::{BatchNorm, BatchNormConfig, PaddingConfig2d, Relu};
use burn::prelude::*;

/// A single convolution → batch normalization → rectification stage.
#[derive(Module, Debug)]
pub struct ConvBlock<B: Backend> {
    pub conv: Conv2d<B>,
    pub norm: BatchNorm<B, 2>,
    pub activation: Relu,
}

#[derive(Config, Debug)]
pub struct ConvBlockConfig {
    /// Input and output channel counts.
    pub channels: [usize; 2],

    #[config(default = 3)]
    pub kernel_size: usize,

    #[config(default = 1)]
    pub stride: usize,

    /// Explicit padding on both spatial axes.
    ///
    /// By default, set to (kernel_size - 1) / 2, which preserves the spatial
    /// dimensions when the stride is 1.
    pub padding: Option<usize>,
}

impl ConvBlockConfig {
    /// Returns the initialized block.
    pub fn init<B: Backend>(&self, device: &B::Device) -> ConvBlock<B> {
        let padding = self.padding.unwrap_or((self.kernel_size - 1) / 2);
        ConvBlock {
            conv: Conv2dConfig::new(self.channels, [self.kernel_size; 2])
                .with_stride([self.stride; 2])
                .with_padding(PaddingConfig2d::Explicit(padding, padding))
                .init(device),
            norm: BatchNormConfig::new(self.channels[1]).init(device),
            activation: Relu::new(),
        }
    }
}

impl<B: Backend> ConvBlock<B> {
    /// # Shapes
    ///   - Input [batch, channels_in, height, width]
    ///   - Output [batch, channels_out, height_out, width_out]
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.conv.forward(x);
        let x = self.norm.forward(x);
        self.activation.forward(x)
    }
}
