//! Background loading example for archetype_gltf
//!
//! Usage: `cargo run --example background_loading --features runtime-tokio -- model.glb`

#[cfg(feature = "runtime-tokio")]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    use archetype_gltf::{GltfLoader, TokioSpawner};
    use std::time::Duration;

    let Some(path) = std::env::args().nth(1) else {
        println!("Pass a .gltf or .glb file to load it in the background.");
        return Ok(());
    };

    let handle = GltfLoader::new().load_in_background(&TokioSpawner::new(), path);

    // stand-in for a render loop
    while handle.is_loading() {
        println!("Loading: {:.0}%", handle.progress() * 100.0);
        tokio::time::sleep(Duration::from_millis(16)).await;
    }

    let asset = handle.result()?;
    let renderables = asset.scene.as_ref().map_or(0, |scene| scene.renderables().count());
    println!("Loaded {} with {renderables} renderables", handle.url());
    Ok(())
}

#[cfg(not(feature = "runtime-tokio"))]
fn main() {
    println!("This example requires the runtime-tokio feature.");
    println!("Run with: cargo run --example background_loading --features runtime-tokio");
}
