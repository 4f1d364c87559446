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
use ndarray::{s, Array1, Array2, ArrayD, Axis};

use crate::error::DataError;

pub mod pedal;
pub mod regression;
pub mod window;

pub use pedal::extend_pedal;
pub use regression::regression;
pub use window::{parse_event, EventWindow, NoteEvent, PedalEvent};

/// Half-width, in frames, of the triangular single-note onset.
const SINGLE_NOTE_HALF_WIDTH: usize = 5;

/// Floors a non-negative product, treating values within 1e-6 of an integer as that integer.
///
/// Products like `10.0 * 100` or `0.3 * 10` should count the frames they are
/// meant to rather than one fewer.
pub fn floor_tolerant(value: f64) -> usize {
    if !(value > 0.0) {
        return 0;
    }
    let rounded = value.round();
    if (value - rounded).abs() < 1e-6 {
        rounded as usize
    } else {
        value.floor() as usize
    }
}

/// The frame and pitch dimensions of the rolls for one segment.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RollGeometry {
    segment_seconds: f64,
    frames_per_second: u32,
    begin_note: u8,
    classes_num: usize,
}

impl RollGeometry {
    pub fn new(
        segment_seconds: f64,
        frames_per_second: u32,
        begin_note: u8,
        classes_num: usize,
    ) -> RollGeometry {
        RollGeometry {
            segment_seconds,
            frames_per_second,
            begin_note,
            classes_num,
        }
    }

    /// The same pitch layout over a window of another length, e.g. a whole track.
    pub fn with_segment_seconds(&self, segment_seconds: f64) -> RollGeometry {
        RollGeometry {
            segment_seconds,
            ..*self
        }
    }

    pub fn segment_seconds(&self) -> f64 {
        self.segment_seconds
    }

    pub fn frames_per_second(&self) -> u32 {
        self.frames_per_second
    }

    pub fn classes_num(&self) -> usize {
        self.classes_num
    }

    /// floor(segment_seconds * frames_per_second) + 1.
    pub fn frames_num(&self) -> usize {
        floor_tolerant(self.segment_seconds * f64::from(self.frames_per_second)) + 1
    }

    /// The roll column of a MIDI note, or `None` if it falls outside the range.
    pub fn pitch_index(&self, midi_note: u8, note_shift: i32) -> Option<usize> {
        let index = i32::from(midi_note) - i32::from(self.begin_note) + note_shift;
        usize::try_from(index)
            .ok()
            .filter(|&index| index < self.classes_num)
    }

    /// The nearest frame of a segment-local time, rounding half to even.
    pub fn frame_of(&self, local_time: f64) -> i64 {
        (local_time * f64::from(self.frames_per_second)).round_ties_even() as i64
    }

    /// A zeroed `[frames, pitches]` roll.
    pub fn zeros(&self) -> Array2<f32> {
        Array2::zeros((self.frames_num(), self.classes_num))
    }
}

/// The rolls produced for one stem over one segment.
#[derive(Clone, Debug)]
pub struct Targets {
    pub onset_roll: Array2<f32>,
    pub offset_roll: Array2<f32>,
    pub reg_onset_roll: Array2<f32>,
    pub reg_offset_roll: Array2<f32>,
    pub frame_roll: Array2<f32>,
    pub velocity_roll: Array2<f32>,
    pub mask_roll: Array2<f32>,
    pub pedal_onset_roll: Array1<f32>,
    pub pedal_offset_roll: Array1<f32>,
    pub reg_pedal_onset_roll: Array1<f32>,
    pub reg_pedal_offset_roll: Array1<f32>,
    pub pedal_frame_roll: Array1<f32>,
}

impl Targets {
    fn new(geometry: &RollGeometry) -> Targets {
        let frames = geometry.frames_num();
        let pitches = geometry.classes_num;
        Targets {
            onset_roll: Array2::zeros((frames, pitches)),
            offset_roll: Array2::zeros((frames, pitches)),
            reg_onset_roll: Array2::ones((frames, pitches)),
            reg_offset_roll: Array2::ones((frames, pitches)),
            frame_roll: Array2::zeros((frames, pitches)),
            velocity_roll: Array2::zeros((frames, pitches)),
            mask_roll: Array2::ones((frames, pitches)),
            pedal_onset_roll: Array1::zeros(frames),
            pedal_offset_roll: Array1::zeros(frames),
            reg_pedal_onset_roll: Array1::ones(frames),
            reg_pedal_offset_roll: Array1::ones(frames),
            pedal_frame_roll: Array1::zeros(frames),
        }
    }

    /// The rolls under their output names, in a fixed order.
    pub fn into_entries(self) -> Vec<(&'static str, ArrayD<f32>)> {
        vec![
            ("onset_roll", self.onset_roll.into_dyn()),
            ("offset_roll", self.offset_roll.into_dyn()),
            ("reg_onset_roll", self.reg_onset_roll.into_dyn()),
            ("reg_offset_roll", self.reg_offset_roll.into_dyn()),
            ("frame_roll", self.frame_roll.into_dyn()),
            ("velocity_roll", self.velocity_roll.into_dyn()),
            ("mask_roll", self.mask_roll.into_dyn()),
            ("pedal_onset_roll", self.pedal_onset_roll.into_dyn()),
            ("pedal_offset_roll", self.pedal_offset_roll.into_dyn()),
            ("reg_pedal_onset_roll", self.reg_pedal_onset_roll.into_dyn()),
            ("reg_pedal_offset_roll", self.reg_pedal_offset_roll.into_dyn()),
            ("pedal_frame_roll", self.pedal_frame_roll.into_dyn()),
        ]
    }
}

/// The rolls of one segment along with the notes and pedal presses that produced them.
#[derive(Debug)]
pub struct EncodedSegment {
    pub targets: Targets,
    /// Notes sounding in the segment, in segment-local time.
    pub notes: Vec<NoteEvent>,
    /// Pedal presses in the segment, in segment-local time.
    pub pedals: Vec<PedalEvent>,
}

/// Encodes event streams into frame-quantized rolls.
#[derive(Clone, Debug)]
pub struct TargetEncoder {
    geometry: RollGeometry,
    extend_pedal: bool,
    note_shift: i32,
}

impl TargetEncoder {
    pub fn new(geometry: RollGeometry, extend_pedal: bool, note_shift: i32) -> TargetEncoder {
        TargetEncoder {
            geometry,
            extend_pedal,
            note_shift,
        }
    }

    /// The same encoder over a different geometry.
    pub fn with_geometry(&self, geometry: RollGeometry) -> TargetEncoder {
        TargetEncoder {
            geometry,
            ..self.clone()
        }
    }

    pub fn geometry(&self) -> &RollGeometry {
        &self.geometry
    }

    /// Encodes the segment starting at `start` from a textual event log with
    /// parallel absolute timestamps.
    pub fn process(
        &self,
        start: f64,
        times: &[f64],
        events: &[String],
    ) -> Result<EncodedSegment, DataError> {
        let end = start + self.geometry.segment_seconds;
        let window = EventWindow::select(start, self.geometry.segment_seconds, times, events)?;
        let notes = if self.extend_pedal {
            extend_pedal(&window.notes, &window.pedals)
        } else {
            window.notes
        };

        let targets = self.rolls(start, &notes, &window.pedals);
        Ok(EncodedSegment {
            targets,
            notes: notes
                .iter()
                .filter(|n| n.offset_time >= start && n.onset_time <= end)
                .map(|n| n.shifted(start))
                .collect(),
            pedals: window
                .pedals
                .iter()
                .filter(|p| p.offset_time >= start && p.onset_time <= end)
                .map(|p| p.shifted(start))
                .collect(),
        })
    }

    /// Encodes notes and pedal presses given in absolute time.
    pub fn encode_notes(&self, start: f64, notes: &[NoteEvent], pedals: &[PedalEvent]) -> Targets {
        if self.extend_pedal && !pedals.is_empty() {
            self.rolls(start, &extend_pedal(notes, pedals), pedals)
        } else {
            self.rolls(start, notes, pedals)
        }
    }

    fn rolls(&self, start: f64, notes: &[NoteEvent], pedals: &[PedalEvent]) -> Targets {
        let geometry = &self.geometry;
        let fps = f64::from(geometry.frames_per_second);
        let last = geometry.frames_num() as i64 - 1;
        let mut targets = Targets::new(geometry);

        for note in notes {
            let pitch = match geometry.pitch_index(note.pitch, self.note_shift) {
                Some(pitch) => pitch,
                None => continue,
            };
            let bgn = geometry.frame_of(note.onset_time - start);
            let fin = geometry.frame_of(note.offset_time - start);
            if fin < 0 || bgn > last {
                continue;
            }

            let span = bgn.max(0) as usize..=fin.min(last) as usize;
            targets
                .frame_roll
                .slice_mut(s![span.clone(), pitch])
                .fill(1.0);
            targets
                .velocity_roll
                .slice_mut(s![span, pitch])
                .fill(f32::from(note.velocity));

            if fin <= last {
                let fin = fin as usize;
                targets.offset_roll[[fin, pitch]] = 1.0;
                targets.reg_offset_roll[[fin, pitch]] =
                    ((note.offset_time - start) - fin as f64 / fps) as f32;
            }

            if bgn >= 0 {
                let bgn = bgn as usize;
                targets.onset_roll[[bgn, pitch]] = 1.0;
                targets.reg_onset_roll[[bgn, pitch]] =
                    ((note.onset_time - start) - bgn as f64 / fps) as f32;
            } else {
                // Started before the window: no onset to learn from.
                targets
                    .mask_roll
                    .slice_mut(s![..=fin.min(last) as usize, pitch])
                    .fill(0.0);
            }
        }

        for pedal in pedals {
            let bgn = geometry.frame_of(pedal.onset_time - start);
            let fin = geometry.frame_of(pedal.offset_time - start);
            if fin < 0 || bgn > last {
                continue;
            }

            targets
                .pedal_frame_roll
                .slice_mut(s![bgn.max(0) as usize..=fin.min(last) as usize])
                .fill(1.0);
            if fin <= last {
                let fin = fin as usize;
                targets.pedal_offset_roll[fin] = 1.0;
                targets.reg_pedal_offset_roll[fin] =
                    ((pedal.offset_time - start) - fin as f64 / fps) as f32;
            }
            if bgn >= 0 {
                let bgn = bgn as usize;
                targets.pedal_onset_roll[bgn] = 1.0;
                targets.reg_pedal_onset_roll[bgn] =
                    ((pedal.onset_time - start) - bgn as f64 / fps) as f32;
            }
        }

        for roll in [&mut targets.reg_onset_roll, &mut targets.reg_offset_roll] {
            for mut column in roll.axis_iter_mut(Axis(1)) {
                let soft = regression(column.view(), geometry.frames_per_second);
                column.assign(&soft);
            }
        }
        let fps = geometry.frames_per_second;
        targets.reg_pedal_onset_roll = regression(targets.reg_pedal_onset_roll.view(), fps);
        targets.reg_pedal_offset_roll = regression(targets.reg_pedal_offset_roll.view(), fps);

        targets
    }
}

/// A `[frames, pitches]` roll with one triangular onset centered in the window.
///
/// The center frame is 1.0 and each frame away from it drops by 0.2, reaching
/// zero five frames out. Returns `None` when the pitch is out of range.
pub fn single_note_onset_roll(geometry: &RollGeometry, midi_note: u8) -> Option<Array2<f32>> {
    let pitch = geometry.pitch_index(midi_note, 0)?;
    let mut roll = geometry.zeros();
    let frames = roll.len_of(Axis(0));
    let center = frames / 2;

    for i in 0..SINGLE_NOTE_HALF_WIDTH {
        let value = 1.0 - i as f32 / SINGLE_NOTE_HALF_WIDTH as f32;
        if let Some(before) = center.checked_sub(i) {
            roll[[before, pitch]] = value;
        }
        if center + i < frames {
            roll[[center + i, pitch]] = value;
        }
    }
    Some(roll)
}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use ndarray::{s, Array1, Axis};

    use super::{
        floor_tolerant, single_note_onset_roll, NoteEvent, PedalEvent, RollGeometry,
        TargetEncoder,
    };

    fn geometry(segment_seconds: f64) -> RollGeometry {
        RollGeometry::new(segment_seconds, 100, 21, 88)
    }

    fn encoder(segment_seconds: f64) -> TargetEncoder {
        TargetEncoder::new(geometry(segment_seconds), true, 0)
    }

    #[test]
    fn frame_count() {
        assert_eq!(1001, geometry(10.0).frames_num());
        assert_eq!(201, geometry(2.0).frames_num());
        assert_eq!(31, geometry(0.3).frames_num());
        assert_eq!(3, floor_tolerant(3.5));
        assert_eq!(0, floor_tolerant(-1.0));
    }

    #[test]
    fn pitch_range() {
        let geometry = geometry(1.0);
        assert_eq!(Some(0), geometry.pitch_index(21, 0));
        assert_eq!(Some(87), geometry.pitch_index(108, 0));
        assert_eq!(None, geometry.pitch_index(109, 0));
        assert_eq!(None, geometry.pitch_index(20, 0));
        assert_eq!(Some(2), geometry.pitch_index(21, 2));
    }

    #[test]
    fn note_inside_the_window_fills_its_frames() {
        let targets = encoder(2.0).encode_notes(10.0, &[NoteEvent::new(10.5, 11.0, 60, 100)], &[]);
        let column = targets.frame_roll.column(60 - 21).to_owned();

        assert_eq!(51.0, column.sum());
        assert!(column.slice(s![50..=100]).iter().all(|&v| v == 1.0));
        assert_eq!(0.0, column[49]);
        assert_eq!(0.0, column[101]);
        assert_eq!(1.0, targets.onset_roll[[50, 39]]);
        assert_eq!(1.0, targets.offset_roll[[100, 39]]);
        assert_eq!(100.0, targets.velocity_roll[[75, 39]]);
        assert_eq!(1.0, targets.onset_roll.sum());
        assert_eq!(1.0, targets.mask_roll.column(39).iter().product::<f32>());
    }

    #[test]
    fn note_before_the_window_is_clamped_to_frame_zero() {
        let targets = encoder(2.0).encode_notes(10.0, &[NoteEvent::new(9.0, 10.3, 60, 100)], &[]);
        let column = targets.frame_roll.column(39).to_owned();

        assert!(column.slice(s![0..=30]).iter().all(|&v| v == 1.0));
        assert_eq!(31.0, column.sum());
        assert_eq!(0.0, targets.onset_roll.sum());
        let masked = targets.mask_roll.slice(s![0..=30, 39]);
        assert!(masked.iter().all(|&v| v == 0.0));
        assert_eq!(1.0, targets.mask_roll[[31, 39]]);
    }

    #[test]
    fn onset_rounds_half_to_even() {
        // 0.125s at 100fps is 12.5 frames.
        let targets = encoder(1.0).encode_notes(0.0, &[NoteEvent::new(0.125, 0.5, 60, 100)], &[]);
        assert_eq!(1.0, targets.onset_roll[[12, 39]]);
    }

    #[test]
    fn out_of_range_pitches_are_dropped() {
        let targets = encoder(1.0).encode_notes(0.0, &[NoteEvent::new(0.1, 0.5, 10, 100)], &[]);
        assert_eq!(0.0, targets.frame_roll.sum());
    }

    #[test]
    fn encoding_recovers_the_onset_within_one_frame() -> Result<(), Box<dyn Error>> {
        let onset = 3.4567;
        let times = vec![onset, 4.2];
        let events = vec![
            "note_on channel=0 note=64 velocity=90 time=0".to_string(),
            "note_off channel=0 note=64 velocity=0 time=0".to_string(),
        ];

        let start = 2.0;
        let segment = encoder(4.0).process(start, &times, &events)?;
        let onsets = segment.targets.onset_roll.column(64 - 21).to_owned();
        let frame = onsets
            .iter()
            .position(|&v| v == 1.0)
            .ok_or("no onset decoded")?;

        let decoded = start + frame as f64 / 100.0;
        assert!((decoded - onset).abs() <= 0.01);
        assert_eq!(1, segment.notes.len());
        assert!((segment.notes[0].onset_time - (onset - start)).abs() < 1e-9);

        let reg = segment.targets.reg_onset_roll.column(64 - 21).to_owned();
        let peak = reg.iter().cloned().fold(f32::MIN, f32::max);
        assert_eq!(reg[frame], peak);
        Ok(())
    }

    #[test]
    fn pedal_extends_notes_and_fills_pedal_rolls() -> Result<(), Box<dyn Error>> {
        let times = vec![0.1, 0.2, 0.5, 1.0];
        let events = vec![
            "control_change channel=0 control=64 value=127 time=0".to_string(),
            "note_on channel=0 note=60 velocity=80 time=0".to_string(),
            "note_off channel=0 note=60 velocity=0 time=0".to_string(),
            "control_change channel=0 control=64 value=0 time=0".to_string(),
        ];

        let segment = encoder(2.0).process(0.0, &times, &events)?;
        let targets = &segment.targets;
        assert_eq!(1.0, targets.frame_roll[[100, 39]]);
        assert_eq!(1.0, targets.offset_roll[[100, 39]]);
        assert_eq!(1.0, targets.pedal_onset_roll[10]);
        assert_eq!(1.0, targets.pedal_offset_roll[100]);
        assert_eq!(91.0, targets.pedal_frame_roll.sum());

        let plain = TargetEncoder::new(geometry(2.0), false, 0).process(0.0, &times, &events)?;
        assert_eq!(1.0, plain.targets.offset_roll[[50, 39]]);
        assert_eq!(0.0, plain.targets.frame_roll[[51, 39]]);
        Ok(())
    }

    #[test]
    fn regression_rolls_without_events_are_zero() {
        let targets = encoder(1.0).encode_notes(0.0, &[], &[]);
        assert_eq!(0.0, targets.reg_onset_roll.sum());
        assert_eq!(Array1::<f32>::zeros(101), targets.reg_pedal_offset_roll);
        assert_eq!(101.0 * 88.0, targets.mask_roll.sum());
    }

    #[test]
    fn whole_track_geometry() {
        let encoder = encoder(2.0);
        let track = encoder.with_geometry(encoder.geometry().with_segment_seconds(30.0));
        let targets = track.encode_notes(0.0, &[NoteEvent::new(25.0, 26.0, 60, 100)], &[]);
        assert_eq!(3001, targets.frame_roll.len_of(Axis(0)));
        assert_eq!(1.0, targets.onset_roll[[2500, 39]]);
    }

    #[test]
    fn pedal_only_window() {
        let targets = encoder(1.0).encode_notes(0.0, &[], &[PedalEvent::new(-0.5, 0.25)]);
        assert_eq!(0.0, targets.pedal_onset_roll.sum());
        assert_eq!(26.0, targets.pedal_frame_roll.sum());
    }

    #[test]
    fn single_note_triangle() {
        let geometry = geometry(2.0);
        let roll = single_note_onset_roll(&geometry, 60).expect("pitch in range");
        let column = roll.column(39);

        assert_eq!(1.0, column[100]);
        assert!((column[99] - 0.8).abs() < 1e-6);
        assert!((column[104] - 0.2).abs() < 1e-6);
        assert_eq!(0.0, column[105]);
        assert_eq!(0.0, column[95]);
        assert!(single_note_onset_roll(&geometry, 120).is_none());
    }
}
