// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::collections::BTreeMap;

use ndarray::{Array, ArrayD, ArrayViewD, Axis, Dimension, IxDyn};

use crate::error::DataError;

/// One training example: named tensors.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Example {
    tensors: BTreeMap<String, ArrayD<f32>>,
}

impl Example {
    pub fn new() -> Example {
        Example::default()
    }

    /// Inserts a tensor, replacing any previous one under the same key.
    pub fn insert<D: Dimension>(&mut self, key: impl Into<String>, tensor: Array<f32, D>) {
        self.tensors.insert(key.into(), tensor.into_dyn());
    }

    /// Inserts a 0-d tensor.
    pub fn insert_scalar(&mut self, key: impl Into<String>, value: f32) {
        self.tensors
            .insert(key.into(), ArrayD::from_elem(IxDyn(&[]), value));
    }

    /// Inserts a tensor under a key that must not be present yet.
    pub fn try_insert(&mut self, key: String, tensor: ArrayD<f32>) -> Result<(), DataError> {
        if self.tensors.contains_key(&key) {
            return Err(DataError::DuplicateKey(key));
        }
        self.tensors.insert(key, tensor);
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&ArrayD<f32>> {
        self.tensors.get(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<ArrayD<f32>> {
        self.tensors.remove(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.tensors.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ArrayD<f32>)> {
        self.tensors.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.tensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tensors.is_empty()
    }

    /// Moves every tensor of `other` into this example. Keys must not collide.
    pub fn merge(&mut self, other: Example) -> Result<(), DataError> {
        for (key, tensor) in other.tensors {
            self.try_insert(key, tensor)?;
        }
        Ok(())
    }
}

/// Per-key tensors stacked along a new leading batch axis.
#[derive(Clone, Debug, PartialEq)]
pub struct Batch {
    size: usize,
    tensors: BTreeMap<String, ArrayD<f32>>,
}

impl Batch {
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn get(&self, key: &str) -> Option<&ArrayD<f32>> {
        self.tensors.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ArrayD<f32>)> {
        self.tensors.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn into_tensors(self) -> BTreeMap<String, ArrayD<f32>> {
        self.tensors
    }
}

/// Stacks examples that share one key set and per-key shapes.
///
/// The first example fixes the expected keys and shapes. Any disagreement is
/// an error naming the offending example; nothing is defaulted or dropped.
pub fn collate(examples: &[Example]) -> Result<Batch, DataError> {
    let first = examples.first().ok_or(DataError::EmptyBatch)?;

    for (index, example) in examples.iter().enumerate().skip(1) {
        let missing: Vec<String> = first
            .keys()
            .filter(|key| !example.tensors.contains_key(*key))
            .map(str::to_string)
            .collect();
        let extra: Vec<String> = example
            .keys()
            .filter(|key| !first.tensors.contains_key(*key))
            .map(str::to_string)
            .collect();
        if !missing.is_empty() || !extra.is_empty() {
            return Err(DataError::ShapeMismatch {
                index,
                missing,
                extra,
            });
        }
    }

    let mut tensors = BTreeMap::new();
    for (key, expected) in first.iter() {
        let mut views: Vec<ArrayViewD<f32>> = Vec::with_capacity(examples.len());
        for (index, example) in examples.iter().enumerate() {
            let tensor = &example.tensors[key];
            if tensor.shape() != expected.shape() {
                return Err(DataError::TensorShapeMismatch {
                    key: key.to_string(),
                    index,
                    expected: expected.shape().to_vec(),
                    found: tensor.shape().to_vec(),
                });
            }
            views.push(tensor.view());
        }
        tensors.insert(key.to_string(), ndarray::stack(Axis(0), &views)?);
    }

    Ok(Batch {
        size: examples.len(),
        tensors,
    })
}
