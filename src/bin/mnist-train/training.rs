use crate::dataset::{DigitBatch, DigitBatcher, MnistDataset};
use burn::data::dataloader::{DataLoader, DataLoaderBuilder};
use burn::module::AutodiffModule;
use burn::optim::momentum::MomentumConfig;
use burn::optim::{GradientsParams, Optimizer, SgdConfig};
use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;
use burn_rescnn::prelude::*;
use std::sync::Arc;

#[derive(Config)]
pub struct TrainingConfig {
    pub model: ResCnnConfig,
    pub optimizer: SgdConfig,
    #[config(default = 5)]
    pub num_epochs: usize,
    #[config(default = 64)]
    pub batch_size: usize,
    #[config(default = 2)]
    pub num_workers: usize,
    #[config(default = 0.1)]
    pub lr: f64,
    #[config(default = 42)]
    pub seed: u64,
}

type Dataloader<B> = Arc<dyn DataLoader<B, DigitBatch<B>> + 'static>;

/// Stochastic gradient descent with a per-parameter momentum accumulator.
pub fn optimizer_config() -> SgdConfig {
    SgdConfig::new().with_momentum(Some(MomentumConfig::new().with_dampening(0.0)))
}

pub fn train<AutoB: AutodiffBackend>(config: TrainingConfig, device: AutoB::Device) {
    AutoB::seed(config.seed);

    let mut model: ResCnn<AutoB> = config.model.init(&device);
    let mut optim = config.optimizer.init();

    let batcher = DigitBatcher::default();

    // Training batches are reshuffled each epoch from the run seed; the
    // validation order stays fixed.
    let dataloader_train = DataLoaderBuilder::new(batcher.clone())
        .batch_size(config.batch_size)
        .shuffle(config.seed)
        .num_workers(config.num_workers)
        .build(MnistDataset::train());
    let dataloader_valid = DataLoaderBuilder::new(batcher)
        .batch_size(config.batch_size)
        .num_workers(config.num_workers)
        .build(MnistDataset::valid());

    log::info!(
        "starting training: {} epochs, batch size {}, lr {}",
        config.num_epochs,
        config.batch_size,
        config.lr
    );

    for epoch in 1..=config.num_epochs {
        model = epoch_train::<AutoB>(Arc::clone(&dataloader_train), model, &mut optim, config.lr);

        let summary = epoch_valid::<AutoB::InnerBackend>(Arc::clone(&dataloader_valid), model.valid());
        println!(
            "Epoch {epoch}/{}, Valid Loss {:.4}, Valid Acc {:.2}%",
            config.num_epochs,
            summary.loss(),
            summary.accuracy(),
        );
    }
    log::info!("training finished");
}

/// Runs one gradient-update pass over every training batch.
///
/// Per-batch metrics are logged but otherwise discarded; the per-epoch report
/// comes from the validation pass only.
pub fn epoch_train<AutoB: AutodiffBackend>(
    dataloader: Dataloader<AutoB>,
    mut model: ResCnn<AutoB>,
    optim: &mut impl Optimizer<ResCnn<AutoB>, AutoB>,
    lr: f64,
) -> ResCnn<AutoB> {
    for batch in dataloader.iter() {
        let (loss, metrics) = model.forward_classification(batch.images, batch.targets);

        let grads = GradientsParams::from_grads(loss.backward(), &model);
        model = optim.step(lr, model, grads);

        log::debug!(
            "train batch: loss {:.4}, acc {:.2}%, {} items",
            metrics.loss,
            metrics.accuracy,
            metrics.batch_size
        );
    }

    model
}

/// Runs one pass over every validation batch without gradient updates and
/// returns the size-weighted epoch summary.
pub fn epoch_valid<B: Backend>(dataloader: Dataloader<B>, model: ResCnn<B>) -> EpochMetrics {
    let mut summary = EpochMetrics::new();

    for batch in dataloader.iter() {
        let (_loss, metrics) = model.forward_classification(batch.images, batch.targets);
        summary.update(metrics);
    }

    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{DigitItem, HEIGHT, WIDTH};
    use burn::data::dataset::InMemDataset;

    type TestBackend = burn::backend::NdArray<f32, i32>;
    type TestAutoBackend = burn::backend::Autodiff<TestBackend>;

    fn tiny_model_config() -> ResCnnConfig {
        ResCnnConfig::new()
            .with_block1_channels([1, 2, 4])
            .with_block2_channels([4, 4, 4])
    }

    fn synthetic_items(count: usize) -> Vec<DigitItem> {
        (0..count)
            .map(|i| DigitItem {
                image: (0..WIDTH * HEIGHT)
                    .map(|p| ((i * 37 + p * 11) % 256) as f32)
                    .collect(),
                label: (i % 10) as u8,
            })
            .collect()
    }

    fn loader<B: Backend>(count: usize, batch_size: usize, shuffle: Option<u64>) -> Dataloader<B> {
        let mut builder = DataLoaderBuilder::new(DigitBatcher::default()).batch_size(batch_size);
        if let Some(seed) = shuffle {
            builder = builder.shuffle(seed);
        }
        builder.build(InMemDataset::new(synthetic_items(count)))
    }

    #[test]
    fn validation_pass_covers_every_item_once() {
        let device = Default::default();
        let model = tiny_model_config().init::<TestBackend>(&device);

        // 160 items in batches of 64 leave a smaller trailing batch of 32
        let summary = epoch_valid::<TestBackend>(loader(160, 64, None), model);
        assert_eq!(160, summary.items());
        assert!(summary.loss().is_finite());
        assert!((0.0..=100.0).contains(&summary.accuracy()));
    }

    #[test]
    fn training_step_updates_parameters() {
        let device = Default::default();
        TestAutoBackend::seed(3);
        let model = tiny_model_config().init::<TestAutoBackend>(&device);
        let before = model.head_conv.weight.val().to_data();

        let mut optim = SgdConfig::new().init();
        let model = epoch_train::<TestAutoBackend>(loader(32, 16, Some(3)), model, &mut optim, 0.1);

        let after = model.head_conv.weight.val().to_data();
        assert_ne!(before, after);
    }

    #[test]
    fn evaluation_leaves_parameters_and_running_stats_untouched() {
        let device = Default::default();
        let model = tiny_model_config().init::<TestAutoBackend>(&device);
        let valid_model = model.valid();

        let weight_before = valid_model.head_conv.weight.val().to_data();
        let mean_before = valid_model.head_norm.running_mean.value().to_data();

        let summary = epoch_valid::<TestBackend>(loader(48, 16, None), valid_model.clone());
        assert_eq!(48, summary.items());

        assert_eq!(weight_before, valid_model.head_conv.weight.val().to_data());
        assert_eq!(mean_before, valid_model.head_norm.running_mean.value().to_data());
    }

    #[test]
    fn validation_is_deterministic_across_passes() {
        let device = Default::default();
        let model = tiny_model_config().init::<TestBackend>(&device);

        let first = epoch_valid::<TestBackend>(loader(48, 16, None), model.clone());
        let second = epoch_valid::<TestBackend>(loader(48, 16, None), model);
        assert_eq!(first.loss(), second.loss());
        assert_eq!(first.accuracy(), second.accuracy());
    }
}
