use std::num::NonZeroUsize;

use rand::{Rng, seq::SliceRandom};
use serde::{Deserialize, Serialize};

use crate::{MlErr, Result};

/// The expected output for a sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Label {
    /// The index of the expected class.
    Class(usize),
    /// The expected output values.
    Values(Vec<f32>),
}

/// An input paired with its label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub x: Vec<f32>,
    pub label: Label,
}

impl Sample {
    pub fn new(x: Vec<f32>, label: Label) -> Self {
        Self { x, label }
    }
}

/// A sample together with its position inside its dataset.
pub type Indexed<'a> = (usize, &'a Sample);

/// An ordered, indexable collection of samples.
///
/// The samples are never moved around, shuffling only permutes the order in which they're
/// visited.
#[derive(Debug, Clone)]
pub struct Dataset {
    samples: Vec<Sample>,
    order: Vec<usize>,
}

impl Dataset {
    /// Creates a new `Dataset`.
    ///
    /// # Arguments
    /// * `samples` - The samples of the dataset, at least one.
    ///
    /// # Returns
    /// A new `Dataset` or a `DatasetLoad` error if `samples` is empty.
    pub fn new(samples: Vec<Sample>) -> Result<Self> {
        if samples.is_empty() {
            return Err(MlErr::DatasetLoad("the dataset has no samples".into()));
        }

        Ok(Self {
            order: (0..samples.len()).collect(),
            samples,
        })
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Returns the sample at `index`, regardless of the current order.
    pub fn get(&self, index: usize) -> Option<&Sample> {
        self.samples.get(index)
    }

    /// Iterates over the samples in the current order.
    pub fn iter(&self) -> impl Iterator<Item = Indexed<'_>> {
        self.order.iter().map(|&i| (i, &self.samples[i]))
    }

    /// Splits the dataset in two, the first one holding the first `at` samples.
    ///
    /// # Returns
    /// Both datasets or a `DatasetLoad` error if either of them would be empty.
    pub fn split(mut self, at: usize) -> Result<(Self, Self)> {
        if at == 0 || at >= self.len() {
            return Err(MlErr::DatasetLoad(format!(
                "can't split {} samples at {at}",
                self.len()
            )));
        }

        let rest = self.samples.split_off(at);
        Ok((Self::new(self.samples)?, Self::new(rest)?))
    }

    /// Permutes the order in which the samples are visited.
    pub fn shuffle<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.order.shuffle(rng);
    }

    /// Partitions the samples, in the current order, into batches of `batch_size`.
    ///
    /// The last batch holds the remaining samples and may be smaller.
    pub fn batches(&self, batch_size: NonZeroUsize) -> impl Iterator<Item = Vec<Indexed<'_>>> {
        self.order.chunks(batch_size.get()).map(|chunk| {
            chunk
                .iter()
                .map(|&i| (i, &self.samples[i]))
                .collect()
        })
    }

    /// Returns the amount of batches `batches` yields for `batch_size`.
    pub fn num_batches(&self, batch_size: NonZeroUsize) -> usize {
        self.len().div_ceil(batch_size.get())
    }
}
