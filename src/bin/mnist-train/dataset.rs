use crate::backend::Element;
use burn::data::dataloader::batcher::Batcher;
use burn::data::dataset::transform::{Mapper, MapperDataset};
use burn::data::dataset::{Dataset, InMemDataset};
use burn::prelude::*;
use flate2::read::GzDecoder;
use num_traits::AsPrimitive;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

// The standard IDX distribution of MNIST. The files are expected in the local
// data directory, either raw or still gzipped; fetching them is left to the
// user (e.g. from the CVDF mirror of http://yann.lecun.com/exdb/mnist/).
const TRAIN_IMAGES: &str = "train-images-idx3-ubyte";
const TRAIN_LABELS: &str = "train-labels-idx1-ubyte";
const VALID_IMAGES: &str = "t10k-images-idx3-ubyte";
const VALID_LABELS: &str = "t10k-labels-idx1-ubyte";

pub const WIDTH: usize = 28;
pub const HEIGHT: usize = 28;

/// One digit image as a flat row of brightness values.
/// Each value is in between 0.0 and 255.0.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct DigitItem {
    /// # Shape
    /// [WIDTH * HEIGHT]
    pub image: Vec<Element>,

    /// Label of the image, in between 0 and 9.
    pub label: u8,
}

#[derive(Deserialize, Debug, Clone)]
struct DigitItemRaw {
    image_bytes: Vec<u8>,
    label: u8,
}

struct BytesToRow;

impl Mapper<DigitItemRaw, DigitItem> for BytesToRow {
    fn map(&self, item: &DigitItemRaw) -> DigitItem {
        debug_assert_eq!(WIDTH * HEIGHT, item.image_bytes.len());

        let image = item
            .image_bytes
            .iter()
            .map(|brightness| {
                let element: Element = (*brightness).as_();
                element
            })
            .collect();

        DigitItem {
            image,
            label: item.label,
        }
    }
}

type MappedDataset = MapperDataset<InMemDataset<DigitItemRaw>, BytesToRow, DigitItemRaw>;

/// The training (60,000 items) or validation (10,000 items) split of the
/// handwritten-digit dataset, loaded fully in memory.
pub struct MnistDataset {
    dataset: MappedDataset,
}

impl Dataset<DigitItem> for MnistDataset {
    fn get(&self, index: usize) -> Option<DigitItem> {
        self.dataset.get(index)
    }

    fn len(&self) -> usize {
        self.dataset.len()
    }
}

impl MnistDataset {
    /// Creates the training split.
    pub fn train() -> Self {
        Self::new(TRAIN_IMAGES, TRAIN_LABELS)
    }

    /// Creates the held-out validation split.
    pub fn valid() -> Self {
        Self::new(VALID_IMAGES, VALID_LABELS)
    }

    fn new(images_file: &str, labels_file: &str) -> Self {
        let root = data_dir();
        let images = read_images(&root.join(images_file));
        let labels = read_labels(&root.join(labels_file));
        assert_eq!(
            images.len(),
            labels.len(),
            "image and label counts disagree"
        );

        let items: Vec<_> = images
            .into_iter()
            .zip(labels)
            .map(|(image_bytes, label)| DigitItemRaw { image_bytes, label })
            .collect();

        let dataset = InMemDataset::new(items);
        let dataset = MapperDataset::new(dataset, BytesToRow);

        Self { dataset }
    }
}

/// Local directory holding the four IDX files.
fn data_dir() -> PathBuf {
    match std::env::var_os("MNIST_DATA_DIR") {
        Some(dir) => dir.into(),
        None => dirs::home_dir()
            .expect("Could not get home directory")
            .join(".cache")
            .join("burn-rescnn")
            .join("mnist"),
    }
}

/// Reads a dataset file, transparently decompressing `<name>.gz` when the
/// plain file is absent.
fn read_file(path: &Path) -> Vec<u8> {
    let mut bytes = Vec::new();
    if path.exists() {
        File::open(path)
            .and_then(|mut file| file.read_to_end(&mut bytes))
            .unwrap_or_else(|err| panic!("failed to read {path:?}: {err}"));
    } else {
        let gz_path = path.with_extension("gz");
        let file = File::open(&gz_path).unwrap_or_else(|err| {
            panic!("missing dataset file {path:?} (also tried {gz_path:?}): {err}")
        });
        GzDecoder::new(file)
            .read_to_end(&mut bytes)
            .unwrap_or_else(|err| panic!("failed to decompress {gz_path:?}: {err}"));
    }
    bytes
}

/// Reads every image of an IDX image file as one byte row per image.
fn read_images(path: &Path) -> Vec<Vec<u8>> {
    let bytes = read_file(path);
    // 16-byte header: magic, count, rows, cols
    let count = be_u32(&bytes[4..8]) as usize;
    let data = &bytes[16..];
    assert_eq!(count * WIDTH * HEIGHT, data.len(), "truncated image file");

    data.chunks(WIDTH * HEIGHT).map(|row| row.to_vec()).collect()
}

/// Reads every label of an IDX label file.
fn read_labels(path: &Path) -> Vec<u8> {
    let bytes = read_file(path);
    // 8-byte header: magic, count
    let count = be_u32(&bytes[4..8]) as usize;
    let data = &bytes[8..];
    assert_eq!(count, data.len(), "truncated label file");

    data.to_vec()
}

fn be_u32(bytes: &[u8]) -> u32 {
    u32::from_be_bytes(bytes.try_into().expect("truncated header"))
}

#[derive(Clone, Default)]
pub struct DigitBatcher {}

#[derive(Clone, Debug)]
pub struct DigitBatch<B: Backend> {
    /// The input feature is the brightness, z-score normalized (mean=0.0,
    /// stddev=1.0). The original dataset has mean=0.1307, stddev=0.3081 after
    /// scaling into [0, 1].
    ///
    /// # Shape
    /// [batch_size, WIDTH * HEIGHT]
    pub images: Tensor<B, 2>,
    /// # Shape
    /// [batch_size]
    pub targets: Tensor<B, 1, Int>,
}

impl<B: Backend> Batcher<B, DigitItem, DigitBatch<B>> for DigitBatcher {
    fn batch(&self, items: Vec<DigitItem>, device: &B::Device) -> DigitBatch<B> {
        let (items_image, items_label): (Vec<_>, Vec<_>) = items
            .into_iter()
            .map(|item| (item.image, item.label))
            .unzip();

        let images = items_image
            .into_iter()
            .map(|image: Vec<Element>| {
                TensorData::new(image, [1, WIDTH * HEIGHT]).convert::<B::FloatElem>()
            })
            .map(|data| Tensor::<B, 2>::from_data(data, device))
            // Scale between [0,1], then normalize to mean=0 and std=1.
            // The values mean=0.1307,std=0.3081 are from the PyTorch MNIST example
            // https://github.com/pytorch/examples/blob/54f4572509891883a947411fd7239237dd2a39c3/mnist/main.py#L122
            .map(|tensor| ((tensor / 255) - 0.1307) / 0.3081)
            .collect();

        let targets = items_label
            .into_iter()
            .map(|label: u8| {
                Tensor::<B, 1, Int>::from_data([(label as i64).elem::<B::IntElem>()], device)
            })
            .collect();

        let images = Tensor::cat(images, 0);
        let targets = Tensor::cat(targets, 0);

        DigitBatch { images, targets }
    }
}
