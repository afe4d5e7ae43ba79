//! Loader for the MNIST handwritten digits in their IDX format.
//!
//! The four uncompressed files are expected to live in the same directory under their
//! usual names: `train-images-idx3-ubyte`, `train-labels-idx1-ubyte`,
//! `t10k-images-idx3-ubyte` and `t10k-labels-idx1-ubyte`.

use std::{fs, path::Path};

use log::info;
use machine_learning::{
    MlErr, Result,
    dataset::{Dataset, Label, Sample},
};

pub const DEFAULT_PATH: &str = "data/mnist";

pub const IMAGE_SIZE: usize = 28 * 28;
pub const NUM_CLASSES: usize = 10;

const IMAGES_MAGIC: u32 = 0x0000_0803;
const LABELS_MAGIC: u32 = 0x0000_0801;

/// Loads the training and test sets found in `dir`.
///
/// Pixels are scaled to `[0, 1]` and every label becomes a `Label::Class`.
pub fn load(dir: impl AsRef<Path>) -> Result<(Dataset, Dataset)> {
    let dir = dir.as_ref();

    let train = load_set(dir, "train")?;
    let test = load_set(dir, "t10k")?;

    info!(path:? = dir, train = train.len(), test = test.len(); "loaded mnist");
    Ok((train, test))
}

fn load_set(dir: &Path, prefix: &str) -> Result<Dataset> {
    let images = parse_images(&read(&dir.join(format!("{prefix}-images-idx3-ubyte")))?)?;
    let labels = parse_labels(&read(&dir.join(format!("{prefix}-labels-idx1-ubyte")))?)?;

    if images.len() != labels.len() {
        return Err(MlErr::DatasetLoad(format!(
            "{prefix} set has {} images and {} labels",
            images.len(),
            labels.len()
        )));
    }

    let samples = images
        .into_iter()
        .zip(labels)
        .map(|(x, class)| Sample::new(x, Label::Class(class)))
        .collect();

    Dataset::new(samples)
}

fn read(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|e| MlErr::DatasetLoad(format!("{}: {e}", path.display())))
}

/// Parses an IDX file of `u8` images into flattened, normalized vectors.
pub fn parse_images(bytes: &[u8]) -> Result<Vec<Vec<f32>>> {
    let mut header = Header::new(bytes);
    header.expect_magic(IMAGES_MAGIC)?;
    let count = header.next()?;
    let rows = header.next()?;
    let cols = header.next()?;

    if rows * cols != IMAGE_SIZE {
        return Err(MlErr::DatasetLoad(format!(
            "expected {IMAGE_SIZE} pixels per image, got {rows}x{cols}"
        )));
    }

    let data = header.body(count * IMAGE_SIZE)?;
    Ok(data
        .chunks_exact(IMAGE_SIZE)
        .map(|image| image.iter().map(|&p| p as f32 / 255.).collect())
        .collect())
}

/// Parses an IDX file of `u8` labels.
pub fn parse_labels(bytes: &[u8]) -> Result<Vec<usize>> {
    let mut header = Header::new(bytes);
    header.expect_magic(LABELS_MAGIC)?;
    let count = header.next()?;

    let data = header.body(count)?;
    data.iter()
        .map(|&label| {
            let label = label as usize;
            if label >= NUM_CLASSES {
                return Err(MlErr::DatasetLoad(format!("label {label} is not a digit")));
            }
            Ok(label)
        })
        .collect()
}

/// Reads the big endian `u32`s at the start of an IDX file.
struct Header<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> Header<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, offset: 0 }
    }

    fn next_u32(&mut self) -> Result<u32> {
        let end = self.offset + 4;
        let Some(word) = self.bytes.get(self.offset..end) else {
            return Err(MlErr::DatasetLoad("truncated idx header".into()));
        };

        self.offset = end;
        Ok(u32::from_be_bytes([word[0], word[1], word[2], word[3]]))
    }

    fn next(&mut self) -> Result<usize> {
        self.next_u32().map(|n| n as usize)
    }

    fn expect_magic(&mut self, magic: u32) -> Result<()> {
        let got = self.next_u32()?;
        if got != magic {
            return Err(MlErr::DatasetLoad(format!(
                "bad idx magic number {got:#010x}, expected {magic:#010x}"
            )));
        }
        Ok(())
    }

    fn body(self, len: usize) -> Result<&'a [u8]> {
        let rest = &self.bytes[self.offset..];
        if rest.len() != len {
            return Err(MlErr::DatasetLoad(format!(
                "expected {len} bytes of data, got {}",
                rest.len()
            )));
        }
        Ok(rest)
    }
}
