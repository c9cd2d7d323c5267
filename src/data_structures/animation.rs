//! Keyframe animation: channel tracks and their evaluation at a point in time.
//!
//! Every sampler loops on its own period (its last keyframe time), so channels
//! of different lengths wrap independently. Evaluation never fails: times that
//! fall outside the keyframes clamp to the last interval.

use cgmath::{InnerSpace, Matrix4, Quaternion, VectorSpace, Vector3};

/// Keyframe values of one sampler, typed by the property they drive.
#[derive(Clone, Debug)]
pub enum Keyframes {
    Translation(Vec<Vector3<f32>>),
    Rotation(Vec<Quaternion<f32>>),
    Scale(Vec<Vector3<f32>>),
    Other,
}

impl Keyframes {
    pub fn len(&self) -> usize {
        match self {
            Keyframes::Translation(v) | Keyframes::Scale(v) => v.len(),
            Keyframes::Rotation(q) => q.len(),
            Keyframes::Other => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn property(&self) -> Option<Property> {
        match self {
            Keyframes::Translation(_) => Some(Property::Translation),
            Keyframes::Rotation(_) => Some(Property::Rotation),
            Keyframes::Scale(_) => Some(Property::Scale),
            Keyframes::Other => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Interpolation {
    Linear,
    Step,
    /// Tangents are dropped at load time and the values are blended linearly.
    CubicSpline,
}

/// Node property an animation channel writes to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Property {
    Translation,
    Rotation,
    Scale,
}

/// One interpolated value, ready to be composed onto a node transform.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Sample {
    Translation(Vector3<f32>),
    Rotation(Quaternion<f32>),
    Scale(Vector3<f32>),
}

impl Sample {
    pub fn property(&self) -> Property {
        match self {
            Sample::Translation(_) => Property::Translation,
            Sample::Rotation(_) => Property::Rotation,
            Sample::Scale(_) => Property::Scale,
        }
    }

    pub fn to_matrix(&self) -> Matrix4<f32> {
        match *self {
            Sample::Translation(t) => Matrix4::from_translation(t),
            Sample::Rotation(r) => Matrix4::from(r),
            Sample::Scale(s) => Matrix4::from_nonuniform_scale(s.x, s.y, s.z),
        }
    }
}

/// Time track (`input`, seconds, ascending) and value track (`output`) of equal length.
#[derive(Clone, Debug)]
pub struct Sampler {
    pub input: Vec<f32>,
    pub output: Keyframes,
    pub interpolation: Interpolation,
}

impl Sampler {
    /// Loop period: the time of the last keyframe.
    pub fn period(&self) -> f32 {
        self.input.last().copied().unwrap_or(0.0)
    }

    /// Evaluate the track at `time`, wrapped into this sampler's period.
    pub fn sample(&self, time: f32) -> Option<Sample> {
        let len = self.input.len().min(self.output.len());
        if len == 0 {
            return None;
        }
        if len == 1 {
            return self.value_between(0, 0, 0.0);
        }
        let times = &self.input[..len];
        let anim_time = wrap_time(time, times[len - 1]);
        let k = find_keyframe_index(times, anim_time);
        let frac = match self.interpolation {
            Interpolation::Step => 0.0,
            Interpolation::Linear | Interpolation::CubicSpline => {
                interpolation_fraction(times[k], times[k + 1], anim_time)
            }
        };
        self.value_between(k, k + 1, frac)
    }

    fn value_between(&self, from: usize, to: usize, frac: f32) -> Option<Sample> {
        match &self.output {
            Keyframes::Translation(values) => Some(Sample::Translation(
                values.get(from)?.lerp(*values.get(to)?, frac),
            )),
            Keyframes::Rotation(values) => Some(Sample::Rotation(shortest_slerp(
                *values.get(from)?,
                *values.get(to)?,
                frac,
            ))),
            Keyframes::Scale(values) => Some(Sample::Scale(
                values.get(from)?.lerp(*values.get(to)?, frac),
            )),
            Keyframes::Other => None,
        }
    }
}

/// Binds a sampler to a node property.
#[derive(Clone, Debug)]
pub struct Channel {
    pub target_node: usize,
    pub property: Property,
    pub sampler: usize,
}

#[derive(Clone, Debug)]
pub struct Animation {
    pub name: String,
    pub channels: Vec<Channel>,
    pub samplers: Vec<Sampler>,
}

impl Animation {
    /// Longest sampler period of the clip.
    pub fn duration(&self) -> f32 {
        self.samplers
            .iter()
            .map(Sampler::period)
            .fold(0.0, f32::max)
    }

    /// Compose every channel's value at `time` onto `node_transforms`.
    ///
    /// The accumulators are mutated in place and in channel order, so several
    /// channels targeting the same node stack (translate, then rotate, then
    /// scale when authored in that order). Callers seed the accumulators with
    /// the identity each frame.
    pub fn apply(&self, time: f32, node_transforms: &mut [Matrix4<f32>]) {
        for channel in &self.channels {
            let Some(sampler) = self.samplers.get(channel.sampler) else {
                log::trace!("channel refers to missing sampler {}", channel.sampler);
                continue;
            };
            let Some(sample) = sampler.sample(time) else {
                continue;
            };
            if sample.property() != channel.property {
                log::trace!(
                    "channel targets {:?} but its sampler holds {:?}",
                    channel.property,
                    sample.property()
                );
                continue;
            }
            if let Some(transform) = node_transforms.get_mut(channel.target_node) {
                *transform = *transform * sample.to_matrix();
            }
        }
    }
}

/// `time mod period`; a non-positive period pins the track to its start.
pub fn wrap_time(time: f32, period: f32) -> f32 {
    if period > 0.0 { time % period } else { 0.0 }
}

/// Binary search for `k` with `times[k] <= time < times[k + 1]`.
///
/// Falls back to the last valid interval, `times.len() - 2`, whenever no such
/// interval exists (before the first key, at or past the last one, NaN).
pub fn find_keyframe_index(times: &[f32], time: f32) -> usize {
    let len = times.len();
    let mut left = 0isize;
    let mut right = len as isize - 1;
    while left <= right {
        let mid = ((left + right) / 2) as usize;
        if mid + 1 < len && times[mid] <= time && time < times[mid + 1] {
            return mid;
        } else if times[mid] > time {
            right = mid as isize - 1;
        } else {
            left = mid as isize + 1;
        }
    }
    len.saturating_sub(2)
}

fn interpolation_fraction(start: f32, end: f32, time: f32) -> f32 {
    let span = end - start;
    if span <= 0.0 {
        return 0.0;
    }
    ((time - start) / span).clamp(0.0, 1.0)
}

/// Dot products within this distance of zero count as orthogonal, so a
/// half turn keeps its sign regardless of f32 rounding in `w`.
const ANTIPODAL_EPSILON: f32 = 1e-6;

/// Above this dot product the arc is short enough to lerp.
const NLERP_THRESHOLD: f32 = 0.9995;

/// Spherical interpolation along the shorter arc.
///
/// Unlike `cgmath`'s `slerp`, only a clearly negative dot product flips `to`.
pub fn shortest_slerp(from: Quaternion<f32>, to: Quaternion<f32>, frac: f32) -> Quaternion<f32> {
    let mut dot = from.dot(to);
    let to = if dot < -ANTIPODAL_EPSILON {
        dot = -dot;
        -to
    } else {
        to
    };
    if dot > NLERP_THRESHOLD {
        return (from * (1.0 - frac) + to * frac).normalize();
    }
    let theta = dot.clamp(-1.0, 1.0).acos();
    let sin_theta = theta.sin();
    let a = ((1.0 - frac) * theta).sin() / sin_theta;
    let b = (frac * theta).sin() / sin_theta;
    (from * a + to * b).normalize()
}
