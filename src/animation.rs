//! Animation clips, keyframe tracks and their interpolants

use glam::Quat;
use uuid::Uuid;

/// Sampler interpolation mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Interpolation {
    #[default]
    Linear,
    Step,
    /// Hermite spline; every key stores in-tangent, value and out-tangent
    CubicSpline,
}

impl Interpolation {
    /// Unknown or missing names fall back to linear
    pub fn from_name(name: Option<&str>) -> Self {
        match name {
            Some("STEP") => Self::Step,
            Some("CUBICSPLINE") => Self::CubicSpline,
            _ => Self::Linear,
        }
    }
}

/// Value type of a track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackKind {
    Vector,
    Quaternion,
    Number,
}

/// Keyed values for one `<target>.<property>` binding
#[derive(Debug, Clone, PartialEq)]
pub struct KeyframeTrack {
    pub name: String,
    pub kind: TrackKind,
    pub times: Vec<f32>,
    pub values: Vec<f32>,
    pub interpolation: Interpolation,
}

impl KeyframeTrack {
    pub fn new(
        name: impl Into<String>,
        kind: TrackKind,
        times: Vec<f32>,
        values: Vec<f32>,
        interpolation: Interpolation,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            times,
            values,
            interpolation,
        }
    }

    /// Stored components per key, tangents included
    pub fn value_size(&self) -> usize {
        if self.times.is_empty() {
            0
        } else {
            self.values.len() / self.times.len()
        }
    }

    /// Components of one evaluated value
    pub fn sample_size(&self) -> usize {
        match self.interpolation {
            Interpolation::CubicSpline => self.value_size() / 3,
            _ => self.value_size(),
        }
    }

    /// Time of the last key
    pub fn duration(&self) -> f32 {
        self.times.last().copied().unwrap_or(0.0)
    }

    /// Value at time `t`, clamped to the first and last keys
    pub fn evaluate(&self, t: f32) -> Vec<f32> {
        let samples = Samples {
            times: &self.times,
            values: &self.values,
            size: self.sample_size(),
        };
        match (self.interpolation, self.kind) {
            (Interpolation::Step, _) => DiscreteInterpolant { samples }.evaluate(t),
            (Interpolation::CubicSpline, _) => CubicSplineInterpolant { samples }.evaluate(t),
            (Interpolation::Linear, TrackKind::Quaternion) => {
                QuaternionLinearInterpolant { samples }.evaluate(t)
            }
            (Interpolation::Linear, _) => LinearInterpolant { samples }.evaluate(t),
        }
    }
}

/// Key times and values seen by an interpolant
#[derive(Debug, Clone, Copy)]
pub struct Samples<'a> {
    pub times: &'a [f32],
    pub values: &'a [f32],
    /// Components per evaluated value
    pub size: usize,
}

impl Samples<'_> {
    fn read(&self, offset: usize) -> Vec<f32> {
        (0..self.size)
            .map(|i| self.values.get(offset + i).copied().unwrap_or(0.0))
            .collect()
    }

    fn at(&self, index: usize) -> f32 {
        self.values.get(index).copied().unwrap_or(0.0)
    }
}

/// Turns keyed samples into a value at an arbitrary time
pub trait Interpolant {
    fn samples(&self) -> &Samples<'_>;

    /// The value stored at key `index`
    fn copy_sample_value(&self, index: usize) -> Vec<f32> {
        let samples = self.samples();
        samples.read(index * samples.size)
    }

    /// Value between key `i1 - 1` (at `t0`) and key `i1` (at `t1`)
    fn interpolate(&self, i1: usize, t0: f32, t: f32, t1: f32) -> Vec<f32>;

    fn evaluate(&self, t: f32) -> Vec<f32> {
        let times = self.samples().times;
        let Some(last) = times.len().checked_sub(1) else {
            return vec![0.0; self.samples().size];
        };
        if t < times[0] {
            return self.copy_sample_value(0);
        }
        if t >= times[last] {
            return self.copy_sample_value(last);
        }
        // NaN keys or a NaN time leave no key at or before `t`
        match times.partition_point(|key| *key <= t) {
            0 => self.copy_sample_value(0),
            i1 => self.interpolate(i1, times[i1 - 1], t, times[i1]),
        }
    }
}

pub struct LinearInterpolant<'a> {
    pub samples: Samples<'a>,
}

impl Interpolant for LinearInterpolant<'_> {
    fn samples(&self) -> &Samples<'_> {
        &self.samples
    }

    fn interpolate(&self, i1: usize, t0: f32, t: f32, t1: f32) -> Vec<f32> {
        let size = self.samples.size;
        let weight = (t - t0) / (t1 - t0);
        let offset1 = i1 * size;
        let offset0 = offset1 - size;
        (0..size)
            .map(|i| {
                let v0 = self.samples.at(offset0 + i);
                let v1 = self.samples.at(offset1 + i);
                v0 * (1.0 - weight) + v1 * weight
            })
            .collect()
    }
}

/// Spherical interpolation of xyzw quaternions
pub struct QuaternionLinearInterpolant<'a> {
    pub samples: Samples<'a>,
}

impl Interpolant for QuaternionLinearInterpolant<'_> {
    fn samples(&self) -> &Samples<'_> {
        &self.samples
    }

    fn interpolate(&self, i1: usize, t0: f32, t: f32, t1: f32) -> Vec<f32> {
        let size = self.samples.size;
        let weight = (t - t0) / (t1 - t0);
        let offset1 = i1 * size;
        let offset0 = offset1 - size;

        let mut result = Vec::with_capacity(size);
        let mut start = 0;
        while start + 4 <= size {
            let q0 = quat(&self.samples, offset0 + start);
            let q1 = quat(&self.samples, offset1 + start);
            result.extend_from_slice(&q0.slerp(q1, weight).to_array());
            start += 4;
        }
        result
    }
}

fn quat(samples: &Samples<'_>, offset: usize) -> Quat {
    Quat::from_xyzw(
        samples.at(offset),
        samples.at(offset + 1),
        samples.at(offset + 2),
        samples.at(offset + 3),
    )
}

/// Holds each key's value until the next key
pub struct DiscreteInterpolant<'a> {
    pub samples: Samples<'a>,
}

impl Interpolant for DiscreteInterpolant<'_> {
    fn samples(&self) -> &Samples<'_> {
        &self.samples
    }

    fn interpolate(&self, i1: usize, _t0: f32, _t: f32, _t1: f32) -> Vec<f32> {
        self.copy_sample_value(i1 - 1)
    }
}

/// Cubic Hermite spline over `[in-tangent, value, out-tangent]` keys
///
/// Tangents are stored per unit time and scaled by the key interval.
pub struct CubicSplineInterpolant<'a> {
    pub samples: Samples<'a>,
}

impl Interpolant for CubicSplineInterpolant<'_> {
    fn samples(&self) -> &Samples<'_> {
        &self.samples
    }

    fn copy_sample_value(&self, index: usize) -> Vec<f32> {
        let stride = self.samples.size;
        self.samples.read(index * stride * 3 + stride)
    }

    fn interpolate(&self, i1: usize, t0: f32, t: f32, t1: f32) -> Vec<f32> {
        let stride = self.samples.size;
        let stride2 = stride * 2;
        let stride3 = stride * 3;

        let td = t1 - t0;
        let p = (t - t0) / td;
        let pp = p * p;
        let ppp = pp * p;

        let offset1 = i1 * stride3;
        let offset0 = offset1 - stride3;

        let s2 = -2.0 * ppp + 3.0 * pp;
        let s3 = ppp - pp;
        let s0 = 1.0 - s2;
        let s1 = s3 - pp + p;

        (0..stride)
            .map(|i| {
                let p0 = self.samples.at(offset0 + i + stride);
                let m0 = self.samples.at(offset0 + i + stride2) * td;
                let p1 = self.samples.at(offset1 + i + stride);
                let m1 = self.samples.at(offset1 + i) * td;
                s0 * p0 + s1 * m0 + s2 * p1 + s3 * m1
            })
            .collect()
    }
}

/// A named set of tracks
#[derive(Debug, Clone)]
pub struct AnimationClip {
    pub uuid: Uuid,
    pub name: String,
    /// Latest key time over all tracks
    pub duration: f32,
    pub tracks: Vec<KeyframeTrack>,
}

impl AnimationClip {
    pub fn new(name: impl Into<String>, tracks: Vec<KeyframeTrack>) -> Self {
        let duration = tracks
            .iter()
            .map(KeyframeTrack::duration)
            .fold(0.0, f32::max);
        Self {
            uuid: Uuid::new_v4(),
            name: name.into(),
            duration,
            tracks,
        }
    }

    pub fn track(&self, name: &str) -> Option<&KeyframeTrack> {
        self.tracks.iter().find(|track| track.name == name)
    }
}
