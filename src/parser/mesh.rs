use super::{GltfParser, ParserState};
use crate::attribute::{Attribute, BufferAttribute};
use crate::cache::{primitive_key, Lookup};
use crate::document::{self, PrimitiveDef};
use crate::error::{DecodeError, Result};
use crate::extensions::{DracoPrimitive, KnownExtension};
use crate::geometry::{attribute_name, Geometry};
use crate::material::{default_material, Material, MaterialVariant, TextureSlot};
use crate::scene::{DrawMode, Mesh, Renderable, RenderableKind};
use futures::future::{try_join_all, FutureExt};
use std::collections::BTreeMap;
use std::sync::{Arc, Weak};
use uuid::Uuid;

type MorphTargets = [BTreeMap<String, usize>];

impl GltfParser {
    pub(super) async fn load_mesh(&self, index: usize) -> Result<Arc<Mesh>> {
        let def = document::get(&self.document().meshes, index, "mesh")?;

        let materials = try_join_all(def.primitives.iter().map(|primitive| async move {
            match primitive.material {
                Some(material) => self.material(material).await,
                None => Ok(default_material()),
            }
        }));
        let (materials, geometries) =
            futures::try_join!(materials, self.load_geometries(&def.primitives))?;

        let skinned = self.state.refs.skinned_meshes.contains(&index);
        let base_name = def.name.clone().unwrap_or_else(|| format!("mesh_{index}"));
        let user_data = self.user_data(def.extras.as_ref(), &def.extensions);
        let target_names = def.target_names();
        let is_group = def.primitives.len() > 1;

        let mut renderables = Vec::with_capacity(def.primitives.len());
        for (i, ((primitive, geometry), material)) in def
            .primitives
            .iter()
            .zip(geometries)
            .zip(materials)
            .enumerate()
        {
            let (kind, draw_mode) = match primitive.mode {
                None | Some(4) | Some(5) | Some(6) => {
                    let kind = if skinned {
                        RenderableKind::SkinnedMesh
                    } else {
                        RenderableKind::Mesh
                    };
                    let draw_mode = match primitive.mode {
                        Some(5) => DrawMode::TriangleStrip,
                        Some(6) => DrawMode::TriangleFan,
                        _ => DrawMode::Triangles,
                    };
                    (kind, draw_mode)
                }
                Some(1) => (RenderableKind::LineSegments, DrawMode::Triangles),
                Some(3) => (RenderableKind::Line, DrawMode::Triangles),
                Some(2) => (RenderableKind::LineLoop, DrawMode::Triangles),
                Some(0) => (RenderableKind::Points, DrawMode::Triangles),
                Some(mode) => {
                    return Err(DecodeError::format(format!(
                        "Primitive mode unsupported: {mode}"
                    )))
                }
            };

            if kind == RenderableKind::SkinnedMesh
                && geometry
                    .attribute("skinWeight")
                    .map_or(false, |weights| !weights.normalized())
            {
                geometry.normalize_skin_weights();
            }

            let name = if is_group {
                format!("{base_name}_{i}")
            } else {
                base_name.clone()
            };
            let material = self.assign_final_material(kind, &geometry, material);

            let mut renderable = Renderable::new(name, kind, geometry, material);
            renderable.draw_mode = draw_mode;
            renderable.user_data = user_data.clone();

            if renderable.has_morph_targets() {
                if let Some(weights) = &def.weights {
                    renderable.set_influences(weights);
                }
                if let Some(names) = &target_names {
                    if names.len() == renderable.morph_target_influences.len() {
                        renderable.morph_target_dictionary = names
                            .iter()
                            .enumerate()
                            .map(|(target, name)| (name.clone(), target))
                            .collect();
                    } else {
                        log::warn!("Invalid extras.targetNames length. Ignoring names.");
                    }
                }
            }

            renderables.push(renderable);
        }

        log::debug!(
            "Mesh {index} \"{base_name}\": {} renderables",
            renderables.len()
        );

        Ok(Arc::new(Mesh {
            uuid: Uuid::new_v4(),
            index,
            name: base_name,
            renderables,
            is_group,
            user_data,
        }))
    }

    /// Geometries for `primitives`, shared with earlier primitives of the
    /// same key
    async fn load_geometries(&self, primitives: &[PrimitiveDef]) -> Result<Vec<Arc<Geometry>>> {
        try_join_all(primitives.iter().map(|primitive| {
            let weak = Arc::downgrade(&self.state);
            let owned = primitive.clone();
            let (future, lookup) = self
                .state
                .primitives
                .get_or_insert_with(primitive_key(primitive), move || {
                    decode_primitive(weak, owned).boxed()
                });
            if lookup == Lookup::Hit {
                self.metrics().record_primitive_hit();
            }
            future
        }))
        .await
    }

    async fn load_geometry(&self, primitive: &PrimitiveDef) -> Result<Geometry> {
        let extension = KnownExtension::DracoMeshCompression;
        let draco = if self.extensions().is_enabled(extension) {
            match DracoPrimitive::from_extensions(&primitive.extensions) {
                Ok(draco) => draco,
                Err(err) if self.extensions().is_required(extension) => return Err(err),
                Err(err) => {
                    log::warn!("Ignoring compressed primitive: {err}");
                    None
                }
            }
        } else {
            None
        };

        let mut geometry = match draco {
            Some(draco) => self.decode_compressed(primitive, &draco).await?,
            None => Geometry::new(),
        };
        self.add_primitive_attributes(&mut geometry, primitive).await?;
        Ok(geometry)
    }

    async fn decode_compressed(
        &self,
        primitive: &PrimitiveDef,
        draco: &DracoPrimitive,
    ) -> Result<Geometry> {
        let decompressor = self
            .state
            .options
            .geometry_decompressor
            .as_ref()
            .ok_or_else(|| DecodeError::MissingDependencyExtension {
                extension: KnownExtension::DracoMeshCompression.name().to_string(),
                requirement: "a geometry decompressor".to_string(),
            })?;
        let data = self.buffer_view(draco.buffer_view).await?;

        let attribute_ids: BTreeMap<String, u32> = draco
            .attributes
            .iter()
            .map(|(semantic, id)| (attribute_name(semantic), *id))
            .collect();

        let mut attribute_types = BTreeMap::new();
        let mut normalized = BTreeMap::new();
        for (semantic, accessor) in &primitive.attributes {
            let name = attribute_name(semantic);
            if !attribute_ids.contains_key(&name) {
                continue;
            }
            let accessor = document::get(&self.document().accessors, *accessor, "accessor")?;
            attribute_types.insert(name.clone(), accessor.component_type);
            normalized.insert(name, accessor.normalized);
        }

        let geometry = decompressor
            .decode(&data, &attribute_ids, &attribute_types)
            .await?;

        for (name, flag) in normalized {
            if let Some(attribute) = geometry.attribute(&name) {
                let mut attribute = (*attribute).clone();
                attribute.set_normalized(flag);
                geometry.set_attribute(name, Arc::new(attribute));
            }
        }

        Ok(geometry)
    }

    /// Fill in accessor attributes the geometry does not have yet, then the
    /// index and morph targets
    async fn add_primitive_attributes(
        &self,
        geometry: &mut Geometry,
        primitive: &PrimitiveDef,
    ) -> Result<()> {
        let pending: Vec<(String, usize)> = primitive
            .attributes
            .iter()
            .map(|(semantic, accessor)| (attribute_name(semantic), *accessor))
            .filter(|(name, _)| !geometry.has_attribute(name))
            .collect();

        let indices = primitive.indices.filter(|_| geometry.index().is_none());

        let accessors = try_join_all(pending.iter().map(|(_, accessor)| self.accessor(*accessor)));
        let index = async {
            match indices {
                Some(indices) => self.accessor(indices).await,
                None => Ok(None),
            }
        };
        let (accessors, index) = futures::try_join!(accessors, index)?;

        for ((name, _), attribute) in pending.into_iter().zip(accessors) {
            if let Some(attribute) = attribute {
                geometry.set_attribute(name, attribute);
            }
        }
        if let Some(index) = index {
            geometry.set_index(index);
        }

        geometry.user_data = self.user_data(primitive.extras.as_ref(), &primitive.extensions);

        if !primitive.targets.is_empty() {
            self.add_morph_targets(geometry, &primitive.targets).await?;
        }
        Ok(())
    }

    /// Morph targets as absolute attribute values
    ///
    /// A target that leaves out an attribute other targets morph reuses the
    /// base attribute.
    async fn add_morph_targets(&self, geometry: &mut Geometry, targets: &MorphTargets) -> Result<()> {
        let wants = |semantic: &str| targets.iter().any(|target| target.contains_key(semantic));

        for (semantic, name) in [("POSITION", "position"), ("NORMAL", "normal")] {
            if !wants(semantic) {
                continue;
            }
            let Some(base) = geometry.attribute(name) else {
                log::warn!("Morph target {semantic} without a base {name} attribute");
                continue;
            };
            let morphed = self.morph_attribute(&base, targets, semantic).await?;
            geometry.set_morph_attributes(name, morphed);
        }
        Ok(())
    }

    async fn morph_attribute(
        &self,
        base: &Arc<Attribute>,
        targets: &MorphTargets,
        semantic: &str,
    ) -> Result<Vec<Arc<Attribute>>> {
        let deltas = try_join_all(targets.iter().map(|target| async move {
            match target.get(semantic) {
                Some(accessor) => self.accessor(*accessor).await,
                None => Ok(None),
            }
        }))
        .await?;

        Ok(deltas
            .into_iter()
            .enumerate()
            .map(|(i, delta)| match delta {
                Some(delta) => Arc::new(Attribute::Buffer(absolute_target(base, &delta, i))),
                None => Arc::clone(base),
            })
            .collect())
    }

    /// Material a renderable of `kind` over `geometry` is drawn with
    ///
    /// Points and lines get their own material kind, and geometry-driven
    /// shading flags get a copy; both are shared through the material
    /// registry so equal requests return the same material.
    pub(super) fn assign_final_material(
        &self,
        kind: RenderableKind,
        geometry: &Geometry,
        material: Arc<Material>,
    ) -> Arc<Material> {
        let registry = &self.state.materials;

        let material = if kind == RenderableKind::Points {
            registry.get_or_insert_with(format!("PointsMaterial:{}", material.uuid), || {
                material.to_points()
            })
        } else if kind.is_line() {
            registry.get_or_insert_with(format!("LineBasicMaterial:{}", material.uuid), || {
                material.to_line()
            })
        } else {
            material
        };

        let morph_targets = geometry.has_morph_targets();
        let variant = MaterialVariant {
            skinning: kind == RenderableKind::SkinnedMesh,
            vertex_tangents: geometry.has_attribute("tangent"),
            vertex_colors: geometry.has_attribute("color"),
            flat_shading: !geometry.has_attribute("normal"),
            morph_targets,
            morph_normals: morph_targets && !geometry.morph_attributes("normal").is_empty(),
        };
        let material = if variant.is_base() {
            material
        } else {
            registry.get_or_insert_with(variant.cache_key(&material), || variant.apply(&material))
        };

        if material.texture(TextureSlot::AoMap).is_some() && !geometry.has_attribute("uv2") {
            if let Some(uv) = geometry.attribute("uv") {
                log::debug!("Duplicating UVs to support aoMap");
                geometry.set_attribute("uv2", uv);
            }
        }

        material
    }
}

async fn decode_primitive(state: Weak<ParserState>, primitive: PrimitiveDef) -> Result<Arc<Geometry>> {
    let state = state
        .upgrade()
        .ok_or_else(|| DecodeError::format("Parser dropped before a primitive was decoded"))?;
    let parser = GltfParser { state };
    Ok(Arc::new(parser.load_geometry(&primitive).await?))
}

/// `base + delta` for the first three components of every element
fn absolute_target(base: &Attribute, delta: &Attribute, target: usize) -> BufferAttribute {
    let item_size = delta.item_size();
    let count = delta.count();
    let mut values = Vec::with_capacity(count * item_size);
    for i in 0..count {
        for c in 0..item_size {
            let value = if c < 3 {
                delta.get(i, c) + base.get(i, c)
            } else {
                delta.get(i, c)
            };
            values.push(value as f32);
        }
    }
    let mut attribute = BufferAttribute::from_f32(values, item_size);
    attribute.name = Some(format!("morphTarget{target}"));
    attribute
}
