use crate::conv_block::{ConvBlock, ConvBlockConfig};
use burn::prelude::*;

/// Two consecutive [`ConvBlock`]s with an additive skip connection.
///
/// The input is added, unchanged, to the transformed output. The caller must
/// pick channels, stride, and padding such that the addition is defined: the
/// transformed output must have the same spatial dimensions as the input, and
/// either the same channel count or an input channel count of 1 (which
/// broadcasts over the output channels). Violations fail loudly in the
/// backend's add kernel.
#[derive(Module, Debug)]
pub struct ResidualBlock<B: Backend> {
    pub conv1: ConvBlock<B>,
    pub conv2: ConvBlock<B>,
}

#[derive(Config, Debug)]
pub struct ResidualBlockConfig {
    /// Channel counts [input, intermediate, output].
    pub channels: [usize; 3],

    #[config(default = 3)]
    pub kernel_size: usize,
}

impl ResidualBlockConfig {
    /// Returns the initialized block.
    pub fn init<B: Backend>(&self, device: &B::Device) -> ResidualBlock<B> {
        let [c_in, c_mid, c_out] = self.channels;
        ResidualBlock {
            conv1: ConvBlockConfig::new([c_in, c_mid])
                .with_kernel_size(self.kernel_size)
                .init(device),
            conv2: ConvBlockConfig::new([c_mid, c_out])
                .with_kernel_size(self.kernel_size)
                .init(device),
        }
    }
}

impl<B: Backend> ResidualBlock<B> {
    /// # Shapes
    ///   - Input [batch, channels_in, height, width]
    ///   - Output [batch, channels_out, height, width]
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let [batch, _channels, height, width] = x.dims();

        let res = x.clone();
        let x = self.conv1.forward(x);
        let x = self.conv2.forward(x);
        debug_assert_eq!([batch, height, width], {
            let [b, _c, h, w] = x.dims();
            [b, h, w]
        });

        x + res
    }
}
