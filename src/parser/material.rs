use super::GltfParser;
use crate::document::{self, MaterialDef, TextureInfo};
use crate::error::Result;
use crate::extensions::{parse_extension, KnownExtension, MaterialExtension, SpecularGlossinessDef};
use crate::material::{AlphaMode, Material, MaterialKind, Side, TextureSlot};
use futures::future::try_join_all;
use std::sync::Arc;

/// Texture assignments collected while reading material parameters
type PendingTextures = Vec<(TextureSlot, TextureInfo)>;

impl GltfParser {
    pub(super) async fn load_material(&self, index: usize) -> Result<Arc<Material>> {
        let def = document::get(&self.document().materials, index, "material")?;

        let extension = MaterialExtension::for_material(def)
            .filter(|ext| self.extensions().is_enabled(ext.extension()));
        let kind = extension.map_or(MaterialKind::Standard, MaterialExtension::material_kind);

        let mut material = Material::new(kind);
        let mut pending = PendingTextures::new();

        match extension {
            Some(MaterialExtension::SpecularGlossiness) => {
                extend_specular_glossiness(def, &mut material, &mut pending)?
            }
            Some(MaterialExtension::Unlit) => extend_unlit(def, &mut material, &mut pending),
            None => extend_metal_roughness(def, &mut material, &mut pending),
        }
        extend_common(def, &mut material, &mut pending);

        let textures = try_join_all(
            pending
                .iter()
                .map(|(slot, info)| self.slot_texture(*slot, info)),
        )
        .await?;
        for ((slot, _), texture) in pending.iter().zip(textures) {
            material.set_texture(*slot, texture);
        }

        material.name = def.name.clone();
        material.user_data = self.user_data(def.extras.as_ref(), &def.extensions);

        Ok(Arc::new(material))
    }
}

fn apply_base_color(factor: Option<[f32; 4]>, material: &mut Material) {
    if let Some([r, g, b, a]) = factor {
        material.color = [r, g, b];
        material.opacity = a;
    }
}

fn extend_unlit(def: &MaterialDef, material: &mut Material, pending: &mut PendingTextures) {
    let Some(pbr) = &def.pbr_metallic_roughness else {
        return;
    };
    apply_base_color(pbr.base_color_factor, material);
    if let Some(info) = &pbr.base_color_texture {
        pending.push((TextureSlot::Map, info.clone()));
    }
}

fn extend_metal_roughness(def: &MaterialDef, material: &mut Material, pending: &mut PendingTextures) {
    extend_unlit(def, material, pending);
    let Some(pbr) = &def.pbr_metallic_roughness else {
        return;
    };
    material.metalness = pbr.metallic_factor.unwrap_or(1.0);
    material.roughness = pbr.roughness_factor.unwrap_or(1.0);
    if let Some(info) = &pbr.metallic_roughness_texture {
        pending.push((TextureSlot::MetalnessMap, info.clone()));
        pending.push((TextureSlot::RoughnessMap, info.clone()));
    }
}

fn extend_specular_glossiness(
    def: &MaterialDef,
    material: &mut Material,
    pending: &mut PendingTextures,
) -> Result<()> {
    let params: SpecularGlossinessDef = parse_extension(
        &def.extensions,
        KnownExtension::MaterialsPbrSpecularGlossiness,
    )?
    .unwrap_or_default();

    apply_base_color(params.diffuse_factor, material);
    material.emissive = [0.0, 0.0, 0.0];
    material.glossiness = params.glossiness_factor.unwrap_or(1.0);
    material.specular = params.specular_factor.unwrap_or([1.0, 1.0, 1.0]);

    if let Some(info) = params.diffuse_texture {
        pending.push((TextureSlot::Map, info));
    }
    if let Some(info) = params.specular_glossiness_texture {
        pending.push((TextureSlot::GlossinessMap, info.clone()));
        pending.push((TextureSlot::SpecularMap, info));
    }
    Ok(())
}

fn extend_common(def: &MaterialDef, material: &mut Material, pending: &mut PendingTextures) {
    if def.double_sided {
        material.side = Side::Double;
    }

    material.alpha_mode = AlphaMode::from_name(def.alpha_mode.as_deref());
    match material.alpha_mode {
        AlphaMode::Blend => material.transparent = true,
        AlphaMode::Mask => {
            material.transparent = false;
            material.alpha_test = def.alpha_cutoff.unwrap_or(0.5);
        }
        AlphaMode::Opaque => material.transparent = false,
    }

    if material.kind == MaterialKind::Basic {
        return;
    }

    if let Some(info) = &def.normal_texture {
        pending.push((TextureSlot::NormalMap, info.clone()));
        material.normal_scale = [1.0, 1.0];
        if let Some(scale) = info.scale {
            material.normal_scale = [scale, scale];
        }
    }
    if let Some(info) = &def.occlusion_texture {
        pending.push((TextureSlot::AoMap, info.clone()));
        if let Some(strength) = info.strength {
            material.ao_map_intensity = strength;
        }
    }
    if let Some(emissive) = def.emissive_factor {
        material.emissive = emissive;
    }
    if let Some(info) = &def.emissive_texture {
        pending.push((TextureSlot::EmissiveMap, info.clone()));
    }
}
