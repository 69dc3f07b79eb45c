//! Synthetic "which is larger" dataset
//!
//! Each sample is two uniform values in `[0, 1)`; the target is `1,0` when the first
//! is larger and `0,1` otherwise.

use std::fs::OpenOptions;
use std::io::{BufWriter, Write};

use rand::{Rng, SeedableRng};

use crate::{Result, TrainingSample, TrainingSet};

pub const DEFAULT_SAMPLE_COUNT: usize = i16::MAX as usize;

pub fn generate_samples<R: Rng>(rng: &mut R, count: usize) -> TrainingSet {
    (0..count)
        .map(|_| {
            let a: f64 = rng.gen();
            let b: f64 = rng.gen();
            let output = if a > b { vec![1.0, 0.0] } else { vec![0.0, 1.0] };
            TrainingSample::new(vec![a, b], output)
        })
        .collect()
}

/// Write samples in the sample-file format
pub fn write_samples<W: Write>(writer: &mut W, samples: &[TrainingSample]) -> Result<()> {
    for sample in samples {
        writeln!(
            writer,
            "{} {}",
            format_vector(&sample.input),
            format_vector(&sample.output)
        )?;
    }
    Ok(())
}

fn format_vector(values: &[f64]) -> String {
    values
        .iter()
        .map(|v| {
            if v.fract() == 0.0 {
                format!("{}", v)
            } else {
                format!("{:.6}", v)
            }
        })
        .collect::<Vec<_>>()
        .join(",")
}

/// Generate `count` samples into a new file. Refuses to overwrite an existing file.
pub fn generate_file(path: &str, count: usize, seed: Option<u64>) -> Result<usize> {
    let file = OpenOptions::new().write(true).create_new(true).open(path)?;
    let mut writer = BufWriter::new(file);

    let mut rng = match seed {
        Some(seed) => rand::rngs::StdRng::seed_from_u64(seed),
        None => rand::rngs::StdRng::from_entropy(),
    };
    let samples = generate_samples(&mut rng, count);
    write_samples(&mut writer, &samples)?;
    writer.flush()?;

    log::info!("Wrote {} samples to {}", samples.len(), path);
    Ok(samples.len())
}
