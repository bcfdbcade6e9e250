use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;

pub type Element = f32;

#[cfg(all(feature = "ndarray", not(any(feature = "wgpu", feature = "tch"))))]
pub type MainBackend = burn::backend::NdArray<Element, i32>;
#[cfg(all(feature = "wgpu", not(feature = "tch")))]
pub type MainBackend = burn::backend::wgpu::Wgpu<Element, i32>;
#[cfg(feature = "tch")]
pub type MainBackend = burn::backend::libtorch::LibTorch<Element>;

#[cfg(not(any(feature = "ndarray", feature = "wgpu", feature = "tch")))]
std::compile_error!("No backend selected. Please check burn-rescnn/Cargo.toml for more info.");

pub trait MainDevice: Backend {
    fn main_device() -> <Self as Backend>::Device {
        Default::default()
    }
}

impl MainDevice for MainBackend {}

pub type MainAutoBackend = burn::backend::Autodiff<MainBackend>;
impl MainDevice for MainAutoBackend {
    fn main_device() -> <Self as Backend>::Device {
        <<Self as AutodiffBackend>::InnerBackend as MainDevice>::main_device()
    }
}
