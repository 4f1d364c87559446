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

/// Distances beyond this many seconds saturate to a target of zero.
const MAX_DISTANCE: f64 = 0.05;

/// Converts a column of sub-frame offsets into soft regression targets.
///
/// Cells below 0.5 mark event frames and hold the event's offset from the
/// frame center; every other cell is 1. Each frame is assigned to its nearest
/// event frame, and its target is `1 - min(|d|, 0.05) * 20` where `d` is the
/// distance in seconds to that event's true time. With no events the output is
/// all zeros.
pub fn regression(input: ArrayView1<f32>, frames_per_second: u32) -> Array1<f32> {
    let step = 1.0 / f64::from(frames_per_second);
    let len = input.len();
    let mut output = Array1::<f64>::ones(len);

    let locations: Vec<usize> = input
        .iter()
        .enumerate()
        .filter(|&(_, &v)| v < 0.5)
        .map(|(i, _)| i)
        .collect();

    let distance = |t: usize, loc: usize| step * (t as f64 - loc as f64) - f64::from(input[loc]);

    if let (Some(&first), Some(&last)) = (locations.first(), locations.last()) {
        for t in 0..first {
            output[t] = distance(t, first);
        }
        for pair in locations.windows(2) {
            let (left, right) = (pair[0], pair[1]);
            let middle = (left + right) / 2;
            for t in left..middle {
                output[t] = distance(t, left);
            }
            for t in middle..right {
                output[t] = distance(t, right);
            }
        }
        for t in last..len {
            output[t] = distance(t, last);
        }
    }

    output.mapv(|d| (1.0 - d.abs().min(MAX_DISTANCE) / MAX_DISTANCE) as f32)
}
