//! Basic loading example for archetype_gltf
//!
//! Usage: `cargo run --example basic_loading -- path/to/model.glb`

use archetype_gltf::{GltfLoader, NodeKind};

fn main() -> anyhow::Result<()> {
    println!("archetype_gltf v{}", archetype_gltf::VERSION);

    let Some(path) = std::env::args().nth(1) else {
        println!("Pass a .gltf or .glb file to print its contents.");
        return Ok(());
    };

    let loader = GltfLoader::new();
    let asset = futures::executor::block_on(loader.load(&path))?;

    if let Some(generator) = &asset.asset.generator {
        println!("Generator: {generator}");
    }
    println!(
        "{} scenes, {} animations, {} cameras",
        asset.scenes.len(),
        asset.animations.len(),
        asset.cameras.len()
    );

    if let Some(scene) = &asset.scene {
        for id in scene.traverse() {
            let Some(entry) = scene.get(id) else { continue };
            let depth = std::iter::successors(entry.parent, |&p| scene.get(p)?.parent).count();
            let name = entry.node.name.as_deref().unwrap_or("<unnamed>");
            match entry.node.kind() {
                NodeKind::Mesh | NodeKind::Group => {
                    let vertices: usize = entry
                        .node
                        .renderables()
                        .iter()
                        .map(|r| r.geometry.vertex_count())
                        .sum();
                    println!("{:indent$}{name} ({vertices} vertices)", "", indent = depth * 2);
                }
                kind => println!("{:indent$}{name} [{kind:?}]", "", indent = depth * 2),
            }
        }
    }

    for clip in &asset.animations {
        println!("Animation \"{}\": {:.2}s, {} tracks", clip.name, clip.duration, clip.tracks.len());
    }

    let metrics = &asset.metrics;
    println!(
        "{} decodes, {:.1}% cache hits, {} bytes fetched",
        metrics.total_decodes(),
        metrics.cache_hit_rate(),
        metrics.total_bytes_fetched()
    );
    Ok(())
}
