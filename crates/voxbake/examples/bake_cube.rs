//! Bakes two boxes into a volume and writes it next to a PNG of one slice.
//!
//! Usage: `cargo run --example bake_cube -- [config.json] [output dir]`

use voxbake::*;

fn main() -> Result<()> {
    init_logging();

    let mut args = std::env::args().skip(1);
    let config = match args.next() {
        Some(path) => VoxelizerConfig::from_json_file(path)?,
        None => VoxelizerConfig {
            extent: Vec3::splat(4.0),
            voxel_density: 0.125,
            ..Default::default()
        },
    };
    let out_dir = args.next().unwrap_or_else(|| "bake_output".to_string());

    let voxelizer = Voxelizer::new(config)?;
    let mut scene = MeshScene::new();
    scene
        .add_box(Vec3::ZERO, Vec3::splat(1.0), Vec4::new(0.9, 0.4, 0.1, 1.0))
        .add_box(
            Vec3::new(0.8, 0.8, 0.8),
            Vec3::splat(0.5),
            Vec4::new(0.1, 0.5, 0.9, 1.0),
        );

    let SweepOutput { volume, stats } = voxelizer.voxelize_with_progress(&mut scene, |p| {
        if p.slice + 1 == p.slice_count {
            log::info!("axis {} done ({}/{})", p.axis, p.axis_index + 1, p.axis_count);
        }
    })?;
    let volume = voxelizer.materialize(volume.into_image())?;
    println!(
        "{} captures, {} dispatches in {:?}; {} of {} voxels occupied",
        stats.captures,
        stats.dispatches,
        stats.elapsed,
        volume.occupancy(0.0),
        volume.size().element_product()
    );

    let mut store = FileStore::new(out_dir);
    let middle = volume.depth() / 2;
    let slice = z_slice(&volume, middle)?;
    store
        .store(slice, &format!("slice_z{middle}"))
        .map_err(|e| VoxelError::Persistence(e.to_string()))?;
    store
        .store(volume, "volume")
        .map_err(|e| VoxelError::Persistence(e.to_string()))?;
    println!("wrote {}", store.root().display());
    Ok(())
}

/// Copies one z layer of a volume into a 2D image.
fn z_slice(volume: &MaterializedImage, z: u32) -> Result<MaterializedImage> {
    let layer = volume.width() as usize * volume.height() as usize * 4;
    let start = z as usize * layer;
    MaterializedImage::new(
        UVec3::new(volume.width(), volume.height(), 1),
        volume.format(),
        volume.filter(),
        volume.data()[start..start + layer].to_vec(),
    )
}
