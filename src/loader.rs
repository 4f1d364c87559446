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
use std::sync::Arc;
use std::time::Instant;

use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::{debug, info};

use crate::collate::{collate, Batch, Example};
use crate::dataset::{Descriptor, ExampleSource};
use crate::error::DataError;

/// Notified of every example built. Implementations must be cheap and thread safe.
pub trait ExampleObserver: Send + Sync {
    fn on_example(&self, descriptor: &str, example: &Example);
}

/// Logs a summary of every example at debug level.
pub struct TracingObserver;

impl ExampleObserver for TracingObserver {
    fn on_example(&self, descriptor: &str, example: &Example) {
        let valid_length = example
            .get("valid_length")
            .and_then(|tensor| tensor.first())
            .copied();
        debug!(
            descriptor,
            keys = example.len(),
            valid_length = ?valid_length,
            "Built example."
        );
    }
}

/// Builds batches of examples in parallel on a dedicated thread pool.
pub struct BatchLoader<S: ExampleSource> {
    source: Arc<S>,
    pool: ThreadPool,
    seed: u64,
    observer: Option<Arc<dyn ExampleObserver>>,
}

impl<S: ExampleSource> BatchLoader<S> {
    pub fn new(source: Arc<S>, threads: usize, seed: u64) -> Result<BatchLoader<S>, DataError> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("rolltrack-example-{i}"))
            .build()?;
        Ok(BatchLoader {
            source,
            pool,
            seed,
            observer: None,
        })
    }

    pub fn with_observer(mut self, observer: Arc<dyn ExampleObserver>) -> BatchLoader<S> {
        self.observer = Some(observer);
        self
    }

    /// Builds a single example with its own seeded generator.
    pub fn example(&self, descriptor: &S::Descriptor) -> Result<Example, DataError> {
        let mut rng = StdRng::seed_from_u64(self.seed ^ descriptor.seed_key());
        let example = self.source.example(descriptor, &mut rng)?;
        if let Some(observer) = &self.observer {
            observer.on_example(&descriptor.describe(), &example);
        }
        Ok(example)
    }

    /// Builds every example in parallel and collates them in descriptor order.
    /// The first failure aborts the batch.
    pub fn load_batch(&self, descriptors: &[S::Descriptor]) -> Result<Batch, DataError> {
        let started = Instant::now();
        let examples = self.pool.install(|| {
            descriptors
                .par_iter()
                .map(|descriptor| self.example(descriptor))
                .collect::<Result<Vec<Example>, DataError>>()
        })?;
        let batch = collate(&examples)?;
        info!(
            size = batch.size(),
            elapsed = ?started.elapsed(),
            "Loaded batch."
        );
        Ok(batch)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use ndarray::Array1;
    use rand::rngs::StdRng;
    use rand::Rng;

    use super::{BatchLoader, ExampleObserver, TracingObserver};
    use crate::collate::Example;
    use crate::dataset::{ExampleSource, Requirement, SegmentDescriptor};
    use crate::error::DataError;

    /// Emits the start time and one random draw; fails on negative start times.
    struct FakeSource;

    impl ExampleSource for FakeSource {
        type Descriptor = SegmentDescriptor;

        fn example(
            &self,
            descriptor: &SegmentDescriptor,
            rng: &mut StdRng,
        ) -> Result<Example, DataError> {
            if descriptor.start_time < 0.0 {
                return Err(DataError::InvalidDescriptor(descriptor.track_id.clone()));
            }
            let mut example = Example::new();
            example.insert("start", Array1::from_elem(1, descriptor.start_time as f32));
            example.insert_scalar("draw", rng.gen::<f32>());
            Ok(example)
        }

        fn requirements(&self, _: &SegmentDescriptor) -> Vec<Requirement> {
            Vec::new()
        }
    }

    #[derive(Default)]
    struct CountingObserver {
        seen: AtomicUsize,
        descriptors: Mutex<Vec<String>>,
    }

    impl ExampleObserver for CountingObserver {
        fn on_example(&self, descriptor: &str, _: &Example) {
            self.seen.fetch_add(1, Ordering::SeqCst);
            if let Ok(mut descriptors) = self.descriptors.lock() {
                descriptors.push(descriptor.to_string());
            }
        }
    }

    fn descriptors(count: usize) -> Vec<SegmentDescriptor> {
        (0..count)
            .map(|i| {
                let track_id = format!("Track{i:05}");
                SegmentDescriptor::new("train", &track_id, i as f64)
            })
            .collect()
    }

    #[test]
    fn batches_keep_descriptor_order() -> Result<(), DataError> {
        let loader = BatchLoader::new(Arc::new(FakeSource), 4, 1234)?;
        let batch = loader.load_batch(&descriptors(16))?;

        assert_eq!(16, batch.size());
        let starts = batch.get("start").ok_or(DataError::EmptyBatch)?;
        let expected: Vec<f32> = (0..16).map(|i| i as f32).collect();
        assert_eq!(expected, starts.iter().cloned().collect::<Vec<f32>>());
        Ok(())
    }

    #[test]
    fn examples_are_reproducible() -> Result<(), DataError> {
        let descriptors = descriptors(8);
        let a = BatchLoader::new(Arc::new(FakeSource), 4, 1234)?.load_batch(&descriptors)?;
        let b = BatchLoader::new(Arc::new(FakeSource), 1, 1234)?.load_batch(&descriptors)?;
        let c = BatchLoader::new(Arc::new(FakeSource), 4, 99)?.load_batch(&descriptors)?;

        assert_eq!(a, b);
        assert_ne!(a.get("draw"), c.get("draw"));
        Ok(())
    }

    #[test]
    fn failures_abort_the_batch() -> Result<(), DataError> {
        let mut descriptors = descriptors(8);
        descriptors[5].start_time = -1.0;
        let loader = BatchLoader::new(Arc::new(FakeSource), 2, 1234)?;

        assert!(matches!(
            loader.load_batch(&descriptors),
            Err(DataError::InvalidDescriptor(track)) if track == "Track00005"
        ));
        Ok(())
    }

    #[test]
    fn observer_sees_every_example() -> Result<(), DataError> {
        let observer = Arc::new(CountingObserver::default());
        let loader = BatchLoader::new(Arc::new(FakeSource), 3, 0)?
            .with_observer(observer.clone());
        loader.load_batch(&descriptors(5))?;

        assert_eq!(5, observer.seen.load(Ordering::SeqCst));
        let descriptors = observer.descriptors.lock().expect("observer lock");
        assert!(descriptors.contains(&"train/Track00003@3".to_string()));

        let traced = BatchLoader::new(Arc::new(FakeSource), 1, 0)?
            .with_observer(Arc::new(TracingObserver));
        traced.example(&SegmentDescriptor::new("train", "Track00000", 0.0))?;
        Ok(())
    }
}
