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
use ndarray::{Array1, ArrayView1};

/// Mean power over the valid part of a waveform: `sum(x^2) / valid_length`.
///
/// The sum runs over the whole waveform; padding is zero so it adds nothing.
/// A waveform with no valid samples has zero energy.
pub fn energy(waveform: ArrayView1<f32>, valid_length: usize) -> f64 {
    if valid_length == 0 {
        return 0.0;
    }
    let sum: f64 = waveform.iter().map(|&x| f64::from(x) * f64::from(x)).sum();
    sum / valid_length as f64
}

/// The gain that gives the reference the loudness of the target.
///
/// A silent reference cannot be scaled up and gets 0. A silent target leaves
/// the reference as it is.
pub fn loudness_ratio(reference_energy: f64, target_energy: f64) -> f64 {
    if target_energy == 0.0 {
        1.0
    } else if reference_energy > 0.0 {
        (target_energy / reference_energy).sqrt()
    } else {
        0.0
    }
}

/// One waveform contributing to a mixture.
#[derive(Clone, Copy, Debug)]
pub struct MixInput<'a> {
    pub waveform: ArrayView1<'a, f32>,
    pub valid_length: usize,
}

/// Scales `reference` to the loudness of `target` and adds the pass-through
/// waveforms unscaled. `target` only sets the loudness; it is not mixed in.
///
/// Returns the mixture and the ratio applied to the reference.
pub fn mix(reference: MixInput, target: MixInput, pass_through: &[MixInput]) -> (Array1<f32>, f64) {
    let ratio = loudness_ratio(
        energy(reference.waveform, reference.valid_length),
        energy(target.waveform, target.valid_length),
    );

    let mut mixture = reference.waveform.mapv(|x| (f64::from(x) * ratio) as f32);
    for input in pass_through {
        mixture += &input.waveform;
    }
    (mixture, ratio)
}
