pub mod conv_block;
pub mod metrics;
pub mod network;
pub mod residual;

pub mod prelude {
    pub use crate::conv_block::*;
    pub use crate::metrics::*;
    pub use crate::network::*;
    pub use crate::residual::*;
}
