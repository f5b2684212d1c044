//! Shader program derivation for specular-glossiness materials
//!
//! The specular-glossiness model reuses the standard physically based program
//! and swaps its roughness/metalness inputs for specular/glossiness ones.

use std::collections::BTreeMap;

/// Value of a shader uniform
#[derive(Debug, Clone, PartialEq)]
pub enum Uniform {
    Float(f32),
    Color([f32; 3]),
    /// Texture slot, bound later by the renderer
    Sampler,
}

/// Source and uniforms of a program
#[derive(Debug, Clone, PartialEq)]
pub struct ShaderProgram {
    pub vertex_shader: String,
    pub fragment_shader: String,
    pub uniforms: BTreeMap<String, Uniform>,
    pub defines: BTreeMap<String, String>,
}

const STANDARD_VERTEX: &str = "\
#define STANDARD
varying vec3 vViewPosition;
#include <common>
#include <uv_pars_vertex>
#include <uv2_pars_vertex>
#include <color_pars_vertex>
#include <morphtarget_pars_vertex>
#include <skinning_pars_vertex>
void main() {
#include <uv_vertex>
#include <uv2_vertex>
#include <color_vertex>
#include <beginnormal_vertex>
#include <morphnormal_vertex>
#include <skinbase_vertex>
#include <skinnormal_vertex>
#include <defaultnormal_vertex>
#include <begin_vertex>
#include <morphtarget_vertex>
#include <skinning_vertex>
#include <project_vertex>
	vViewPosition = - mvPosition.xyz;
#include <worldpos_vertex>
}
";

const STANDARD_FRAGMENT: &str = "\
#define STANDARD
uniform vec3 diffuse;
uniform vec3 emissive;
uniform float roughness;
uniform float metalness;
uniform float opacity;
varying vec3 vViewPosition;
#include <common>
#include <packing>
#include <color_pars_fragment>
#include <uv_pars_fragment>
#include <uv2_pars_fragment>
#include <map_pars_fragment>
#include <aomap_pars_fragment>
#include <emissivemap_pars_fragment>
#include <bsdfs>
#include <lights_pars_begin>
#include <lights_physical_pars_fragment>
#include <normalmap_pars_fragment>
#include <roughnessmap_pars_fragment>
#include <metalnessmap_pars_fragment>
void main() {
	vec4 diffuseColor = vec4( diffuse, opacity );
	ReflectedLight reflectedLight = ReflectedLight( vec3( 0.0 ), vec3( 0.0 ), vec3( 0.0 ), vec3( 0.0 ) );
	vec3 totalEmissiveRadiance = emissive;
#include <map_fragment>
#include <color_fragment>
#include <alphatest_fragment>
#include <roughnessmap_fragment>
#include <metalnessmap_fragment>
#include <normal_fragment_begin>
#include <normal_fragment_maps>
#include <emissivemap_fragment>
#include <lights_physical_fragment>
#include <lights_fragment_begin>
#include <lights_fragment_maps>
#include <lights_fragment_end>
#include <aomap_fragment>
	vec3 outgoingLight = reflectedLight.directDiffuse + reflectedLight.indirectDiffuse + reflectedLight.directSpecular + reflectedLight.indirectSpecular + totalEmissiveRadiance;
	gl_FragColor = vec4( outgoingLight, diffuseColor.a );
}
";

const SPECULAR_MAP_PARS: &str = "\
#ifdef USE_SPECULARMAP
	uniform sampler2D specularMap;
#endif";

const GLOSSINESS_MAP_PARS: &str = "\
#ifdef USE_GLOSSINESSMAP
	uniform sampler2D glossinessMap;
#endif";

const SPECULAR_MAP_FRAGMENT: &str = "\
vec3 specularFactor = specular;
#ifdef USE_SPECULARMAP
	vec4 texelSpecular = texture2D( specularMap, vUv );
	texelSpecular = sRGBToLinear( texelSpecular );
	// reads channel RGB, compatible with a glTF Specular-Glossiness (RGBA) texture
	specularFactor *= texelSpecular.rgb;
#endif";

const GLOSSINESS_MAP_FRAGMENT: &str = "\
float glossinessFactor = glossiness;
#ifdef USE_GLOSSINESSMAP
	vec4 texelGlossiness = texture2D( glossinessMap, vUv );
	// reads channel A, compatible with a glTF Specular-Glossiness (RGBA) texture
	glossinessFactor *= texelGlossiness.a;
#endif";

const LIGHTS_PHYSICAL_FRAGMENT: &str = "\
PhysicalMaterial material;
material.diffuseColor = diffuseColor.rgb;
material.specularRoughness = clamp( 1.0 - glossinessFactor, 0.04, 1.0 );
material.specularColor = specularFactor.rgb;";

impl ShaderProgram {
    /// The standard metal-roughness program
    pub fn standard() -> Self {
        let uniforms = [
            ("diffuse", Uniform::Color([1.0, 1.0, 1.0])),
            ("opacity", Uniform::Float(1.0)),
            ("emissive", Uniform::Color([0.0, 0.0, 0.0])),
            ("roughness", Uniform::Float(0.5)),
            ("metalness", Uniform::Float(0.5)),
            ("map", Uniform::Sampler),
            ("aoMap", Uniform::Sampler),
            ("aoMapIntensity", Uniform::Float(1.0)),
            ("emissiveMap", Uniform::Sampler),
            ("normalMap", Uniform::Sampler),
            ("roughnessMap", Uniform::Sampler),
            ("metalnessMap", Uniform::Sampler),
        ]
        .into_iter()
        .map(|(name, value)| (name.to_string(), value))
        .collect();

        Self {
            vertex_shader: STANDARD_VERTEX.to_string(),
            fragment_shader: STANDARD_FRAGMENT.to_string(),
            uniforms,
            defines: BTreeMap::new(),
        }
    }

    /// Derive the specular-glossiness program from the standard one
    pub fn specular_glossiness() -> Self {
        let standard = Self::standard();

        let fragment_shader = [
            ("uniform float roughness;", "uniform vec3 specular;"),
            ("uniform float metalness;", "uniform float glossiness;"),
            ("#include <roughnessmap_pars_fragment>", SPECULAR_MAP_PARS),
            ("#include <metalnessmap_pars_fragment>", GLOSSINESS_MAP_PARS),
            ("#include <roughnessmap_fragment>", SPECULAR_MAP_FRAGMENT),
            ("#include <metalnessmap_fragment>", GLOSSINESS_MAP_FRAGMENT),
            ("#include <lights_physical_fragment>", LIGHTS_PHYSICAL_FRAGMENT),
        ]
        .into_iter()
        .fold(standard.fragment_shader, |source, (from, to)| {
            source.replacen(from, to, 1)
        });

        let mut uniforms = standard.uniforms;
        for removed in ["roughness", "metalness", "roughnessMap", "metalnessMap"] {
            uniforms.remove(removed);
        }
        uniforms.insert("specular".into(), Uniform::Color(hex_color(0x111111)));
        uniforms.insert("glossiness".into(), Uniform::Float(0.5));
        uniforms.insert("specularMap".into(), Uniform::Sampler);
        uniforms.insert("glossinessMap".into(), Uniform::Sampler);

        let mut defines = BTreeMap::new();
        defines.insert("STANDARD".to_string(), String::new());

        Self {
            vertex_shader: standard.vertex_shader,
            fragment_shader,
            uniforms,
            defines,
        }
    }
}

/// `0xRRGGBB` to linear 0..1 components
pub fn hex_color(hex: u32) -> [f32; 3] {
    [
        ((hex >> 16) & 0xff) as f32 / 255.0,
        ((hex >> 8) & 0xff) as f32 / 255.0,
        (hex & 0xff) as f32 / 255.0,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_specular_glossiness_rewrites_fragment() {
        let program = ShaderProgram::specular_glossiness();
        let fragment = &program.fragment_shader;
        assert!(fragment.contains("uniform vec3 specular;"));
        assert!(fragment.contains("uniform float glossiness;"));
        assert!(fragment.contains("uniform sampler2D specularMap;"));
        assert!(fragment.contains("glossinessFactor *= texelGlossiness.a;"));
        assert!(fragment.contains("material.specularColor = specularFactor.rgb;"));
        assert!(!fragment.contains("uniform float roughness;"));
        assert!(!fragment.contains("#include <metalnessmap_fragment>"));
        assert!(!fragment.contains("#include <lights_physical_fragment>"));
    }

    #[test]
    fn test_specular_glossiness_uniforms() {
        let program = ShaderProgram::specular_glossiness();
        assert!(!program.uniforms.contains_key("roughness"));
        assert!(!program.uniforms.contains_key("metalnessMap"));
        assert_eq!(
            program.uniforms.get("glossiness"),
            Some(&Uniform::Float(0.5))
        );
        assert_eq!(
            program.uniforms.get("specular"),
            Some(&Uniform::Color(hex_color(0x111111)))
        );
        assert_eq!(program.defines.get("STANDARD").map(String::as_str), Some(""));
    }

    #[test]
    fn test_hex_color() {
        assert_eq!(hex_color(0xff0000), [1.0, 0.0, 0.0]);
    }
}
