pub mod backend;
pub mod dataset;
pub mod training;

use backend::{MainAutoBackend, MainDevice};
use burn_rescnn::prelude::*;
use training::TrainingConfig;

fn main() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let device = MainAutoBackend::main_device();
    let config = TrainingConfig::new(ResCnnConfig::new(), training::optimizer_config());

    training::train::<MainAutoBackend>(config, device);
}
