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
use std::error::Error;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use clap::{crate_version, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use rolltrack::collate::Example;
use rolltrack::config::{DatasetConfig, Task};
use rolltrack::dataset::{
    ClassificationDataset, ClusterDataset, CompoundDataset, CountDataset, Descriptor,
    ExampleSource, FilterDataset, TranscriptionDataset,
};
use rolltrack::loader::{BatchLoader, TracingObserver};
use rolltrack::verify;

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "Builds frame-roll training examples for multi-instrument transcription."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Builds a single example and prints its tensors.
    Example {
        /// The path to the dataset configuration.
        config: PathBuf,
        /// A YAML list of descriptors for the configured task.
        descriptors: PathBuf,
        /// Which descriptor in the list to build.
        #[arg(short, long, default_value_t = 0)]
        index: usize,
    },
    /// Builds every descriptor in batches and prints the batch shapes.
    Batch {
        /// The path to the dataset configuration.
        config: PathBuf,
        /// A YAML list of descriptors for the configured task.
        descriptors: PathBuf,
        /// The number of examples per batch.
        #[arg(short, long, default_value_t = 8)]
        batch_size: usize,
    },
    /// Checks that every track and archive the descriptors need is present.
    Verify {
        /// The path to the dataset configuration.
        config: PathBuf,
        /// A YAML list of descriptors for the configured task.
        descriptors: PathBuf,
    },
}

impl Commands {
    fn config(&self) -> &Path {
        match self {
            Commands::Example { config, .. }
            | Commands::Batch { config, .. }
            | Commands::Verify { config, .. } => config.as_path(),
        }
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = DatasetConfig::deserialize(cli.command.config())?;

    let command = &cli.command;
    match config.task() {
        Task::Transcription(task) => {
            run(TranscriptionDataset::new(&config, task)?, &config, command)
        }
        Task::Compound(task) => run(CompoundDataset::new(&config, task)?, &config, command),
        Task::Classification(task) => {
            run(ClassificationDataset::new(&config, task)?, &config, command)
        }
        Task::Cluster(task) => run(ClusterDataset::new(&config, task)?, &config, command),
        Task::Count(task) => run(CountDataset::new(&config, task)?, &config, command),
        Task::Filter(task) => run(FilterDataset::new(&config, task)?, &config, command),
    }
}

fn run<S: ExampleSource + 'static>(
    source: S,
    config: &DatasetConfig,
    command: &Commands,
) -> Result<(), Box<dyn Error>> {
    match command {
        Commands::Example {
            descriptors, index, ..
        } => {
            let descriptors: Vec<S::Descriptor> = read_descriptors(descriptors)?;
            let Some(descriptor) = descriptors.get(*index) else {
                return Err(format!(
                    "descriptor {} requested but only {} found",
                    index,
                    descriptors.len()
                )
                .into());
            };

            let loader = BatchLoader::new(Arc::new(source), 1, config.seed())?;
            let example = loader.example(descriptor)?;
            println!("Example {}:", descriptor.describe());
            print_tensors(&example);
        }
        Commands::Batch {
            descriptors,
            batch_size,
            ..
        } => {
            if *batch_size == 0 {
                return Err("batch size must be positive".into());
            }
            let descriptors: Vec<S::Descriptor> = read_descriptors(descriptors)?;
            let loader = BatchLoader::new(Arc::new(source), config.threads(), config.seed())?
                .with_observer(Arc::new(TracingObserver));

            for (i, chunk) in descriptors.chunks(*batch_size).enumerate() {
                let batch = loader.load_batch(chunk)?;
                println!("Batch {} (size: {}):", i, batch.size());
                for (key, tensor) in batch.into_tensors() {
                    println!("- {}: {:?}", key, tensor.shape());
                }
            }
        }
        Commands::Verify { descriptors, .. } => {
            let descriptors: Vec<S::Descriptor> = read_descriptors(descriptors)?;
            let report = verify::verify(&source, &descriptors);
            verify::print_report(&report, descriptors.len());
            if report.has_errors() {
                process::exit(1);
            }
        }
    }
    Ok(())
}

fn read_descriptors<D: Descriptor>(path: &Path) -> Result<Vec<D>, Box<dyn Error>> {
    let file = File::open(path).map_err(|e| format!("unable to open {}: {}", path.display(), e))?;
    Ok(serde_yml::from_reader(file)?)
}

fn print_tensors(example: &Example) {
    for (key, tensor) in example.iter() {
        let sum: f32 = tensor.iter().sum();
        println!("- {}: {:?} (sum: {})", key, tensor.shape(), sum);
    }
}
