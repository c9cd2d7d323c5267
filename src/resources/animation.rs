use cgmath::Quaternion;
use gltf::animation::util::ReadOutputs;

use crate::{
    data_structures::animation::{Animation, Channel, Interpolation, Keyframes, Property, Sampler},
    resources::buffer_reader,
};

/**
 * Reads every animation clip of the document.
 *
 * Samplers are read through the channels that use them, so a sampler no channel refers to
 * stays empty. Channels driving morph target weights are dropped.
 */
pub fn load_animations(document: &gltf::Document, buffers: &[gltf::buffer::Data]) -> Vec<Animation> {
    let mut cubic_warned = false;
    document
        .animations()
        .map(|animation| {
            let name = animation
                .name()
                .map(str::to_string)
                .unwrap_or_else(|| format!("Animation {}", animation.index()));
            let mut samplers: Vec<Sampler> = animation
                .samplers()
                .map(|sampler| Sampler {
                    input: Vec::new(),
                    output: Keyframes::Other,
                    interpolation: sampler.interpolation().into(),
                })
                .collect();
            let mut channels = Vec::new();

            for channel in animation.channels() {
                let target = channel.target();
                let property = match target.property() {
                    gltf::animation::Property::Translation => Property::Translation,
                    gltf::animation::Property::Rotation => Property::Rotation,
                    gltf::animation::Property::Scale => Property::Scale,
                    gltf::animation::Property::MorphTargetWeights => {
                        log::warn!(
                            "Skipping morph target channel {} of {:?}",
                            channel.index(),
                            name
                        );
                        continue;
                    }
                };
                let sampler_idx = channel.sampler().index();
                let Some(sampler) = samplers.get_mut(sampler_idx) else {
                    continue;
                };
                if sampler.input.is_empty() {
                    let reader = channel.reader(buffer_reader(buffers));
                    let Some(inputs) = reader.read_inputs() else {
                        log::warn!("No keyframe times found in channel {}", channel.index());
                        continue;
                    };
                    sampler.input = inputs.collect();
                    sampler.output = reader
                        .read_outputs()
                        .map(to_keyframes)
                        .unwrap_or(Keyframes::Other);
                    if sampler.interpolation == Interpolation::CubicSpline {
                        if !cubic_warned {
                            log::warn!(
                                "Cubic spline animation in {:?}: tangents are ignored and keyframes blend linearly",
                                name
                            );
                            cubic_warned = true;
                        }
                        sampler.output = spline_values(sampler.output.clone());
                    }
                }
                if sampler.output.property() != Some(property) {
                    log::warn!(
                        "Channel {} of {:?} targets {:?} but its keyframes don't match",
                        channel.index(),
                        name,
                        property
                    );
                    continue;
                }
                channels.push(Channel {
                    target_node: target.node().index(),
                    property,
                    sampler: sampler_idx,
                });
            }

            Animation {
                name,
                channels,
                samplers,
            }
        })
        .collect()
}

impl From<gltf::animation::Interpolation> for Interpolation {
    fn from(interpolation: gltf::animation::Interpolation) -> Self {
        match interpolation {
            gltf::animation::Interpolation::Linear => Interpolation::Linear,
            gltf::animation::Interpolation::Step => Interpolation::Step,
            gltf::animation::Interpolation::CubicSpline => Interpolation::CubicSpline,
        }
    }
}

fn to_keyframes(outputs: ReadOutputs<'_>) -> Keyframes {
    match outputs {
        ReadOutputs::Translations(translations) => {
            Keyframes::Translation(translations.map(Into::into).collect())
        }
        ReadOutputs::Rotations(rotations) => Keyframes::Rotation(
            rotations
                .into_f32()
                .map(|[x, y, z, w]| Quaternion::new(w, x, y, z))
                .collect(),
        ),
        ReadOutputs::Scales(scales) => Keyframes::Scale(scales.map(Into::into).collect()),
        ReadOutputs::MorphTargetWeights(_) => Keyframes::Other,
    }
}

/// Keep the value of every (in-tangent, value, out-tangent) triple.
fn spline_values(keyframes: Keyframes) -> Keyframes {
    fn middle<T: Copy>(values: Vec<T>) -> Vec<T> {
        values.chunks_exact(3).map(|triple| triple[1]).collect()
    }
    match keyframes {
        Keyframes::Translation(v) => Keyframes::Translation(middle(v)),
        Keyframes::Rotation(q) => Keyframes::Rotation(middle(q)),
        Keyframes::Scale(v) => Keyframes::Scale(middle(v)),
        Keyframes::Other => Keyframes::Other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::Vector3;

    #[test]
    fn spline_keeps_middle_of_each_triple() {
        let triples = Keyframes::Translation(vec![
            Vector3::new(9.0, 9.0, 9.0),
            Vector3::new(1.0, 0.0, 0.0),
            Vector3::new(9.0, 9.0, 9.0),
            Vector3::new(8.0, 8.0, 8.0),
            Vector3::new(2.0, 0.0, 0.0),
            Vector3::new(8.0, 8.0, 8.0),
        ]);
        match spline_values(triples) {
            Keyframes::Translation(values) => assert_eq!(
                values,
                vec![Vector3::new(1.0, 0.0, 0.0), Vector3::new(2.0, 0.0, 0.0)]
            ),
            other => panic!("unexpected keyframes {:?}", other),
        }
    }
}
