use super::GltfParser;
use crate::animation::{AnimationClip, Interpolation, KeyframeTrack, TrackKind};
use crate::attribute::Attribute;
use crate::document::{self, AnimationDef, ChannelDef, ComponentType};
use crate::error::{DecodeError, Result};
use futures::future::try_join_all;
use std::sync::Arc;

/// Scene property driven by a channel target path
fn path_property(path: &str) -> Option<(&'static str, TrackKind)> {
    match path {
        "translation" => Some(("position", TrackKind::Vector)),
        "rotation" => Some(("quaternion", TrackKind::Quaternion)),
        "scale" => Some(("scale", TrackKind::Vector)),
        "weights" => Some(("morphTargetInfluences", TrackKind::Number)),
        _ => None,
    }
}

impl GltfParser {
    pub(super) async fn load_animation(&self, index: usize) -> Result<Arc<AnimationClip>> {
        let def = document::get(&self.document().animations, index, "animation")?;

        let tracks = try_join_all(
            def.channels
                .iter()
                .enumerate()
                .map(|(channel_index, channel)| self.channel_tracks(def, channel_index, channel)),
        )
        .await?
        .into_iter()
        .flatten()
        .collect::<Vec<_>>();

        let name = def
            .name
            .clone()
            .unwrap_or_else(|| format!("animation_{index}"));
        log::debug!("Animation {index} \"{name}\": {} tracks", tracks.len());
        Ok(Arc::new(AnimationClip::new(name, tracks)))
    }

    /// Tracks for one channel; empty when the channel cannot be bound
    async fn channel_tracks(
        &self,
        animation: &AnimationDef,
        channel_index: usize,
        channel: &ChannelDef,
    ) -> Result<Vec<KeyframeTrack>> {
        let sampler = document::get(&animation.samplers, channel.sampler, "animation sampler")?;

        let Some(node_index) = channel.target.target_node() else {
            log::warn!("Animation channel {channel_index} has no target node");
            return Ok(Vec::new());
        };
        let Some((property, kind)) = path_property(&channel.target.path) else {
            log::warn!(
                "Unsupported animation path \"{}\" on channel {channel_index}",
                channel.target.path
            );
            return Ok(Vec::new());
        };

        let (node, input, output) = futures::join!(
            self.node(node_index),
            self.accessor(sampler.input),
            self.accessor(sampler.output)
        );
        let node = match node {
            Ok(node) => node,
            Err(err) => {
                log::warn!("Animation target node {node_index} could not be loaded: {err}");
                return Ok(Vec::new());
            }
        };
        let (Some(input), Some(output)) = (input?, output?) else {
            log::warn!("Animation channel {channel_index} has an accessor without data");
            return Ok(Vec::new());
        };

        let times = input.to_f32_vec();
        let values = output_values(&output)?;
        let interpolation = Interpolation::from_name(sampler.interpolation.as_deref());

        let targets: Vec<String> = if kind == TrackKind::Number {
            node.renderables()
                .iter()
                .filter(|renderable| renderable.has_morph_targets())
                .map(|renderable| {
                    if renderable.name.is_empty() {
                        renderable.uuid.to_string()
                    } else {
                        renderable.name.clone()
                    }
                })
                .collect()
        } else {
            vec![node.binding_name()]
        };

        Ok(targets
            .into_iter()
            .map(|target| {
                KeyframeTrack::new(
                    format!("{target}.{property}"),
                    kind,
                    times.clone(),
                    values.clone(),
                    interpolation,
                )
            })
            .collect())
    }
}

/// Output values as floats, rescaling normalized integer data to [-1, 1]
fn output_values(output: &Attribute) -> Result<Vec<f32>> {
    let values = output.to_f32_vec();
    if !output.normalized() {
        return Ok(values);
    }
    // the type maximum maps to exactly 1.0
    let max = match output.component_type() {
        ComponentType::I8 => 127.0,
        ComponentType::U8 => 255.0,
        ComponentType::I16 => 32767.0,
        ComponentType::U16 => 65535.0,
        _ => {
            return Err(DecodeError::format(
                "Unsupported output accessor component type",
            ))
        }
    };
    Ok(values.into_iter().map(|value| value / max).collect())
}

#[cfg(test)]
mod tests {
    use crate::animation::{Interpolation, TrackKind};
    use crate::parser::tests::parser_for;
    use futures::executor::block_on;

    fn body() -> Vec<u8> {
        let mut body: Vec<u8> = [0.0f32, 1.0]
            .iter()
            .flat_map(|v| v.to_le_bytes())
            .collect();
        // translation keys: two VEC3 values
        body.extend(
            [0.0f32, 0.0, 0.0, 2.0, 4.0, 6.0]
                .iter()
                .flat_map(|v| v.to_le_bytes()),
        );
        // normalized i8 weights
        body.extend([0i8, 127].iter().map(|v| *v as u8));
        body.resize(36, 0);
        // base positions of the morphed mesh
        body.extend([0.0f32; 9].iter().flat_map(|v| v.to_le_bytes()));
        body
    }

    const ANIMATED: &str = r#"{"asset":{"version":"2.0"},"buffers":[{"byteLength":72}],
        "bufferViews":[
            {"buffer":0,"byteLength":8},
            {"buffer":0,"byteOffset":8,"byteLength":24},
            {"buffer":0,"byteOffset":32,"byteLength":2},
            {"buffer":0,"byteOffset":36,"byteLength":36}],
        "accessors":[
            {"bufferView":0,"componentType":5126,"count":2,"type":"SCALAR"},
            {"bufferView":1,"componentType":5126,"count":2,"type":"VEC3"},
            {"bufferView":2,"componentType":5120,"normalized":true,"count":2,"type":"SCALAR"},
            {"bufferView":3,"componentType":5126,"count":3,"type":"VEC3"}],
        "meshes":[{"name":"face","primitives":[{"attributes":{"POSITION":3},"targets":[{"POSITION":3}]}]}],
        "nodes":[{"name":"mover"},{"mesh":0}],
        "animations":[
            {"name":"walk","channels":[
                {"sampler":0,"target":{"node":0,"path":"translation"}},
                {"sampler":1,"target":{"node":1,"path":"weights"}},
                {"sampler":0,"target":{"node":7,"path":"translation"}},
                {"sampler":0,"target":{"node":0,"path":"pointer"}}],
             "samplers":[
                {"input":0,"output":1,"interpolation":"STEP"},
                {"input":0,"output":2}]},
            {"channels":[{"sampler":4,"target":{"node":0,"path":"scale"}}],"samplers":[]}]}"#;

    #[test]
    fn test_tracks_bind_to_node_names() {
        let parser = parser_for(ANIMATED, Some(body()));
        let clip = block_on(parser.animation(0)).unwrap();
        assert_eq!(clip.name, "walk");
        assert_eq!(clip.duration, 1.0);

        let track = clip.track("mover.position").unwrap();
        assert_eq!(track.kind, TrackKind::Vector);
        assert_eq!(track.interpolation, Interpolation::Step);
        assert_eq!(track.times, vec![0.0, 1.0]);
        assert_eq!(track.evaluate(0.5), vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_weights_fan_out_and_are_rescaled() {
        let parser = parser_for(ANIMATED, Some(body()));
        let clip = block_on(parser.animation(0)).unwrap();

        let track = clip.track("face.morphTargetInfluences").unwrap();
        assert_eq!(track.kind, TrackKind::Number);
        assert_eq!(track.values.len(), 2);
        assert_eq!(track.values[0], 0.0);
        assert_eq!(track.values[1], 1.0);
        assert_eq!(track.interpolation, Interpolation::Linear);
    }

    #[test]
    fn test_unbindable_channels_are_skipped() {
        let parser = parser_for(ANIMATED, Some(body()));
        let clip = block_on(parser.animation(0)).unwrap();
        assert_eq!(clip.tracks.len(), 2);
    }

    #[test]
    fn test_bad_sampler_index() {
        let parser = parser_for(ANIMATED, Some(body()));
        assert!(block_on(parser.animation(1)).unwrap_err().is_format());
    }
}
