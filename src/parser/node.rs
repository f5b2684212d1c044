use super::GltfParser;
use crate::document::{self, Extensions};
use crate::error::{DecodeError, Result};
use crate::extensions::{node_light, KnownExtension};
use crate::scene::{
    sanitize_node_name, Camera, Light, LightKind, MeshInstance, Node, Projection, Scene,
    SceneNode, Skeleton, Skin, Transform,
};
use futures::future::{join_all, try_join_all};
use glam::Mat4;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::f32::consts::FRAC_PI_4;
use std::sync::Arc;
use uuid::Uuid;

impl GltfParser {
    pub(super) async fn load_node(&self, index: usize) -> Result<Arc<Node>> {
        let def = document::get(&self.document().nodes, index, "node")?;

        let light_index = if self.extensions().is_enabled(KnownExtension::LightsPunctual) {
            node_light(def)?
        } else {
            None
        };

        let mesh = async {
            match def.mesh {
                Some(mesh) => self.mesh(mesh).await.map(Some),
                None => Ok(None),
            }
        };
        let camera = async {
            match def.camera {
                Some(camera) => self.camera(camera).await,
                None => Ok(None),
            }
        };
        let light = async {
            match light_index {
                Some(light) => self.light(light).await.map(Some),
                None => Ok(None),
            }
        };
        let (mesh, camera, light) = futures::try_join!(mesh, camera, light)?;

        let mesh = mesh.map(|mesh| {
            MeshInstance::new(
                mesh,
                self.state.refs.instance_numbers.get(&index).copied(),
                def.weights.as_deref(),
            )
        });

        let mut user_data = self.user_data(def.extras.as_ref(), &def.extensions);
        if let Some(name) = &def.name {
            user_data.insert("name".to_string(), Value::String(name.clone()));
        }

        let transform = match &def.matrix {
            Some(matrix) => Transform::from_matrix(matrix),
            None => {
                let defaults = Transform::default();
                Transform {
                    translation: def.translation.unwrap_or(defaults.translation),
                    rotation: def.rotation.unwrap_or(defaults.rotation),
                    scale: def.scale.unwrap_or(defaults.scale),
                }
            }
        };

        Ok(Arc::new(Node {
            uuid: Uuid::new_v4(),
            index,
            name: def.name.as_deref().map(sanitize_node_name),
            is_bone: self.state.refs.bones.contains(&index),
            transform,
            mesh,
            camera,
            light,
            user_data,
        }))
    }

    pub(super) async fn load_skin(&self, index: usize) -> Result<Arc<Skin>> {
        let def = document::get(&self.document().skins, index, "skin")?;
        let inverse_bind_matrices = match def.inverse_bind_matrices {
            Some(accessor) => self.accessor(accessor).await?,
            None => None,
        };
        Ok(Arc::new(Skin {
            joints: def.joints.clone(),
            inverse_bind_matrices,
        }))
    }

    /// `None` when the camera's projection parameters are missing
    pub(super) fn load_camera(&self, index: usize) -> Result<Option<Arc<Camera>>> {
        let def = document::get(&self.document().cameras, index, "camera")?;

        let projection = match (def.kind.as_str(), &def.perspective, &def.orthographic) {
            ("perspective", Some(params), _) => Projection::Perspective {
                fov: params.yfov.to_degrees(),
                aspect: nonzero_or(params.aspect_ratio, 1.0),
                near: nonzero_or(params.znear, 1.0),
                far: nonzero_or(params.zfar, 2e6),
            },
            ("orthographic", _, Some(params)) => Projection::Orthographic {
                left: -params.xmag / 2.0,
                right: params.xmag / 2.0,
                top: params.ymag / 2.0,
                bottom: -params.ymag / 2.0,
                near: params.znear,
                far: params.zfar,
            },
            _ => {
                log::warn!("Missing camera parameters.");
                return Ok(None);
            }
        };

        Ok(Some(Arc::new(Camera {
            uuid: Uuid::new_v4(),
            name: def.name.clone(),
            projection,
            user_data: self.user_data(def.extras.as_ref(), &Extensions::new()),
        })))
    }

    pub(super) fn load_light(&self, index: usize) -> Result<Arc<Light>> {
        let def = document::get(&self.state.lights, index, "light")?;
        let range = def.range.unwrap_or(0.0);
        let down = Some([0.0, 0.0, -1.0]);

        let (kind, distance, target) = match def.kind.as_str() {
            "directional" => (LightKind::Directional, 0.0, down),
            "point" => (LightKind::Point, range, None),
            "spot" => {
                let spot = def.spot.clone().unwrap_or_default();
                let inner = spot.inner_cone_angle.unwrap_or(0.0);
                let outer = spot.outer_cone_angle.unwrap_or(FRAC_PI_4);
                let kind = LightKind::Spot {
                    angle: outer,
                    penumbra: 1.0 - inner / outer,
                };
                (kind, range, down)
            }
            other => {
                return Err(DecodeError::format(format!(
                    "Unexpected light type, \"{other}\"."
                )))
            }
        };

        Ok(Arc::new(Light {
            uuid: Uuid::new_v4(),
            name: def.name.clone().unwrap_or_else(|| format!("light_{index}")),
            kind,
            color: def.color.unwrap_or([1.0, 1.0, 1.0]),
            intensity: def.intensity.unwrap_or(1.0),
            distance,
            decay: 2.0,
            target,
        }))
    }

    /// Place a scene's node hierarchy into an arena
    ///
    /// The hierarchy is walked with an explicit stack. Each node is placed at
    /// most once: an edge to a node that is already placed (a cycle, or a
    /// child shared by several parents) is reported and skipped, so the node
    /// stays under the first parent that reached it.
    pub(super) async fn load_scene(&self, index: usize) -> Result<Arc<Scene>> {
        let document = self.document();
        let def = document::get(&document.scenes, index, "scene")?;

        let mut placed: Vec<(usize, Option<usize>)> = Vec::new();
        let mut children: Vec<Vec<usize>> = Vec::new();
        let mut roots = Vec::new();
        let mut stack: Vec<(usize, Option<usize>)> =
            def.nodes.iter().rev().map(|node| (*node, None)).collect();

        let mut visited = HashSet::new();

        while let Some((node, parent)) = stack.pop() {
            if !visited.insert(node) {
                log::warn!("Node {node} is already placed in scene {index}; skipping the edge");
                continue;
            }
            let node_def = document::get(&document.nodes, node, "node")?;

            let id = placed.len();
            placed.push((node, parent));
            children.push(Vec::new());
            match parent {
                Some(parent) => children[parent].push(id),
                None => roots.push(id),
            }
            stack.extend(node_def.children.iter().rev().map(|child| (*child, Some(id))));
        }

        let nodes = try_join_all(placed.iter().map(|(node, _)| self.node(*node))).await?;

        let mut skeletons: HashMap<usize, Option<Arc<Skeleton>>> = HashMap::new();
        for (node, _) in &placed {
            if skeletons.contains_key(node) {
                continue;
            }
            let skeleton = self.node_skeleton(*node).await?;
            skeletons.insert(*node, skeleton);
        }

        let arena = placed
            .iter()
            .zip(nodes)
            .zip(children)
            .map(|(((node, parent), decoded), children)| SceneNode {
                node: decoded,
                parent: *parent,
                children,
                skeleton: skeletons.get(node).cloned().flatten(),
            })
            .collect::<Vec<_>>();

        log::debug!("Scene {index}: {} placed nodes", arena.len());

        Ok(Arc::new(Scene {
            uuid: Uuid::new_v4(),
            name: def.name.clone(),
            nodes: arena,
            roots,
            user_data: self.user_data(def.extras.as_ref(), &def.extensions),
        }))
    }

    /// Skeleton binding the skinned mesh of a node, if it has one
    ///
    /// Joints that fail to resolve are reported and left out.
    async fn node_skeleton(&self, index: usize) -> Result<Option<Arc<Skeleton>>> {
        let def = document::get(&self.document().nodes, index, "node")?;
        let (Some(skin_index), Some(_)) = (def.skin, def.mesh) else {
            return Ok(None);
        };

        let skin = self.skin(skin_index).await?;
        let joints = join_all(skin.joints.iter().map(|joint| self.node(*joint))).await;
        let inverses = skin
            .inverse_bind_matrices
            .as_ref()
            .map(|matrices| matrices.to_f32_vec());

        let mut bones = Vec::with_capacity(joints.len());
        let mut bone_inverses = Vec::with_capacity(joints.len());
        for (i, (joint, resolved)) in skin.joints.iter().zip(joints).enumerate() {
            let Ok(bone) = resolved else {
                log::warn!("Joint \"{joint}\" could not be found.");
                continue;
            };
            bones.push(bone);
            let inverse = inverses
                .as_ref()
                .and_then(|values| values.get(i * 16..i * 16 + 16))
                .map_or(Mat4::IDENTITY, Mat4::from_cols_slice);
            bone_inverses.push(inverse);
        }

        Ok(Some(Arc::new(Skeleton {
            bones,
            bone_inverses,
        })))
    }
}

/// Zero and absent both fall back to `default`
fn nonzero_or(value: Option<f32>, default: f32) -> f32 {
    match value {
        Some(value) if value != 0.0 => value,
        _ => default,
    }
}

#[cfg(test)]
mod tests {
    use crate::scene::{LightKind, NodeKind, Projection, RenderableKind};
    use crate::parser::tests::parser_for;
    use futures::executor::block_on;
    use glam::Mat4;
    use std::sync::Arc;

    #[test]
    fn test_node_name_transform_and_user_data() {
        let parser = parser_for(
            r#"{"asset":{"version":"2.0"},"nodes":[
                {"name":"Left Arm.001","translation":[1.0,2.0,3.0],"extras":{"id":7}},
                {"matrix":[2,0,0,0, 0,2,0,0, 0,0,2,0, 5,6,7,1]}]}"#,
            None,
        );
        let node = block_on(parser.node(0)).unwrap();
        assert_eq!(node.name.as_deref(), Some("Left_Arm001"));
        assert_eq!(node.user_data["name"], serde_json::json!("Left Arm.001"));
        assert_eq!(node.user_data["id"], serde_json::json!(7));
        assert_eq!(node.transform.translation, [1.0, 2.0, 3.0]);
        assert_eq!(node.transform.scale, [1.0, 1.0, 1.0]);
        assert_eq!(node.kind(), NodeKind::Object);

        let node = block_on(parser.node(1)).unwrap();
        assert_eq!(node.transform.translation, [5.0, 6.0, 7.0]);
        assert_eq!(node.transform.scale, [2.0, 2.0, 2.0]);
        assert_eq!(node.binding_name(), node.uuid.to_string());
    }

    #[test]
    fn test_shared_mesh_is_instanced() {
        let parser = parser_for(
            r#"{"asset":{"version":"2.0"},
                "accessors":[{"componentType":5126,"count":3,"type":"VEC3"}],
                "meshes":[{"name":"rock","primitives":[{"attributes":{"POSITION":0}}]},
                          {"name":"tree","primitives":[{"attributes":{"POSITION":0}}]}],
                "nodes":[{"mesh":0},{"mesh":0},{"mesh":1}]}"#,
            None,
        );
        let first = block_on(parser.node(0)).unwrap();
        let second = block_on(parser.node(1)).unwrap();
        let single = block_on(parser.node(2)).unwrap();

        let first_mesh = first.mesh.as_ref().unwrap();
        let second_mesh = second.mesh.as_ref().unwrap();
        assert_eq!(first_mesh.name, "rock_instance_0");
        assert_eq!(second_mesh.name, "rock_instance_1");
        assert_eq!(first_mesh.renderables[0].name, "rock_instance_0");
        assert_ne!(first_mesh.renderables[0].uuid, second_mesh.renderables[0].uuid);
        assert!(Arc::ptr_eq(&first_mesh.mesh, &second_mesh.mesh));
        assert!(Arc::ptr_eq(
            &first_mesh.renderables[0].geometry,
            &second_mesh.renderables[0].geometry
        ));

        let single_mesh = single.mesh.as_ref().unwrap();
        assert_eq!(single_mesh.name, "tree");
        assert_eq!(single_mesh.instance, None);
        assert_eq!(single.kind(), NodeKind::Mesh);
    }

    #[test]
    fn test_cameras() {
        let parser = parser_for(
            r#"{"asset":{"version":"2.0"},"cameras":[
                {"type":"perspective","perspective":{"yfov":1.0,"znear":0.0}},
                {"type":"orthographic","orthographic":{"xmag":4.0,"ymag":2.0,"znear":0.1,"zfar":50.0}},
                {"type":"perspective"}]}"#,
            None,
        );
        let camera = block_on(parser.camera(0)).unwrap().unwrap();
        match camera.projection {
            Projection::Perspective { fov, aspect, near, far } => {
                assert!((fov - 57.29578).abs() < 1e-3);
                assert_eq!((aspect, near, far), (1.0, 1.0, 2e6));
            }
            other => panic!("unexpected projection {other:?}"),
        }

        let camera = block_on(parser.camera(1)).unwrap().unwrap();
        assert_eq!(
            camera.projection,
            Projection::Orthographic {
                left: -2.0,
                right: 2.0,
                top: 1.0,
                bottom: -1.0,
                near: 0.1,
                far: 50.0
            }
        );

        assert!(block_on(parser.camera(2)).unwrap().is_none());
    }

    #[test]
    fn test_lights() {
        let parser = parser_for(
            r#"{"asset":{"version":"2.0"},"extensionsUsed":["KHR_lights_punctual"],
                "extensions":{"KHR_lights_punctual":{"lights":[
                    {"type":"spot","range":10.0,"spot":{"innerConeAngle":0.25,"outerConeAngle":0.5}},
                    {"type":"point","name":"bulb","intensity":3.0},
                    {"type":"area"}]}},
                "nodes":[{"extensions":{"KHR_lights_punctual":{"light":1}}}]}"#,
            None,
        );
        let spot = block_on(parser.light(0)).unwrap();
        assert_eq!(spot.name, "light_0");
        assert_eq!(spot.kind, LightKind::Spot { angle: 0.5, penumbra: 0.5 });
        assert_eq!(spot.distance, 10.0);
        assert_eq!(spot.decay, 2.0);
        assert_eq!(spot.target, Some([0.0, 0.0, -1.0]));

        let node = block_on(parser.node(0)).unwrap();
        let bulb = node.light.as_ref().unwrap();
        assert_eq!(bulb.name, "bulb");
        assert_eq!(bulb.intensity, 3.0);
        assert_eq!(bulb.color, [1.0, 1.0, 1.0]);
        assert_eq!(node.kind(), NodeKind::Light);

        let err = block_on(parser.light(2)).unwrap_err();
        assert!(err.to_string().contains("Unexpected light type, \"area\"."));
    }

    #[test]
    fn test_scene_skips_cycles() {
        let parser = parser_for(
            r#"{"asset":{"version":"2.0"},"scenes":[{"name":"loop","nodes":[0]}],
                "nodes":[{"name":"a","children":[1]},{"name":"b","children":[0,2]},{"name":"c"}]}"#,
            None,
        );
        let scene = block_on(parser.scene(0)).unwrap();
        assert_eq!(scene.name.as_deref(), Some("loop"));
        assert_eq!(scene.len(), 3);
        let names: Vec<_> = scene
            .traverse()
            .into_iter()
            .map(|id| scene.nodes[id].node.name.clone().unwrap())
            .collect();
        assert_eq!(names, ["a", "b", "c"]);
        let c = scene.find_by_name("c").unwrap();
        assert_eq!(scene.nodes[c.parent.unwrap()].node.name.as_deref(), Some("b"));
    }

    #[test]
    fn test_shared_child_stays_under_first_parent() {
        let parser = parser_for(
            r#"{"asset":{"version":"2.0"},"scenes":[{"nodes":[0,1,0]}],
                "nodes":[{"name":"left","children":[2]},{"name":"right","children":[2]},{"name":"leaf"}]}"#,
            None,
        );
        let scene = block_on(parser.scene(0)).unwrap();
        assert_eq!(scene.len(), 3);
        assert_eq!(scene.roots.len(), 2);
        let leaf = scene.find_by_name("leaf").unwrap();
        assert_eq!(scene.nodes[leaf.parent.unwrap()].node.name.as_deref(), Some("left"));
        let right = scene.find_by_name("right").unwrap();
        assert!(right.children.is_empty());
    }

    #[test]
    fn test_skeleton_skips_missing_joints() {
        let mut ibm: Vec<f32> = Mat4::from_translation(glam::Vec3::new(0.0, -1.0, 0.0))
            .to_cols_array()
            .to_vec();
        ibm.extend(Mat4::IDENTITY.to_cols_array());
        let body: Vec<u8> = ibm.iter().flat_map(|v| v.to_le_bytes()).collect();
        let parser = parser_for(
            r#"{"asset":{"version":"2.0"},"buffers":[{"byteLength":128}],
                "bufferViews":[{"buffer":0,"byteLength":128}],
                "accessors":[
                    {"bufferView":0,"componentType":5126,"count":2,"type":"MAT4"},
                    {"componentType":5126,"count":3,"type":"VEC3"}],
                "meshes":[{"primitives":[{"attributes":{"POSITION":1}}]}],
                "skins":[{"joints":[1,9],"inverseBindMatrices":0}],
                "scenes":[{"nodes":[0]}],
                "nodes":[{"mesh":0,"skin":0,"children":[1]},{"name":"hip"}]}"#,
            Some(body),
        );
        let scene = block_on(parser.scene(0)).unwrap();
        let root = &scene.nodes[scene.roots[0]];
        let skeleton = root.skeleton.as_ref().unwrap();

        assert_eq!(skeleton.bones.len(), 1);
        assert_eq!(skeleton.bones[0].name.as_deref(), Some("hip"));
        assert!(skeleton.bones[0].is_bone);
        assert_eq!(
            skeleton.bone_inverses[0],
            Mat4::from_translation(glam::Vec3::new(0.0, -1.0, 0.0))
        );
        assert_eq!(
            root.node.renderables()[0].kind,
            RenderableKind::SkinnedMesh
        );
        assert!(scene.find_by_name("hip").unwrap().skeleton.is_none());
    }
}
