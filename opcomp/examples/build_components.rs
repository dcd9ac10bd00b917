//! Build a block's operator components, renormalise them and persist one
//!
//! Run with `RUST_LOG=debug cargo run --example build_components` to see the
//! staging files being written and read back.

use opcomp::dense::{DenseBlock, DenseBlockOperator, SiteBasis, StateInfo};
use opcomp::{
    make_component, restore_component, ComponentConfig, ComponentRegistry, OperatorCategory,
    OperatorComponentBase, OrbitalIndices, SpinQuantum,
};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let staging = tempfile::tempdir()?;
    let config = ComponentConfig::default().with_staging_dir(staging.path());
    let registry = ComponentRegistry::new();
    let basis = SiteBasis::full(4, StateInfo::new(vec![3, 2]));

    type Component = Box<dyn OperatorComponentBase<DenseBlockOperator>>;
    let mut components: Vec<Component> = OperatorCategory::ALL
        .iter()
        .map(|&category| make_component(category, &registry, config.clone()))
        .collect();

    println!("Building {} components over 4 orbitals...", components.len());
    for component in &mut components {
        component.build(&basis)?;
        println!(
            "   {:<14} id {:>2}  {:>2} indices  {:>3} slots  ({})",
            component.op_string(),
            component.unique_id(),
            component.num_indices(),
            component.global_count(),
            component.unique_filename()
        );
    }

    // Truncate each sector to its first state
    let rotations = vec![
        DenseBlock::from_fn(3, 1, |r, _| if r == 0 { 1.0 } else { 0.0 }),
        DenseBlock::from_fn(2, 1, |r, _| if r == 0 { 1.0 } else { 0.0 }),
    ];
    let truncated = StateInfo::new(vec![1, 1]);
    for component in &mut components {
        component.renormalise_transform(&rotations, &truncated)?;
    }
    println!("\nRenormalised every component to {} states", truncated.total_dim());

    let crecre = &components[OperatorCategory::CreCre.to_u8() as usize];
    let op = crecre.get_op_rep(SpinQuantum::new(2, 2, 0), OrbitalIndices::two(3, 1))?;
    println!("CRECRE(1, 3) triplet block: {:?}", op.blocks()[0].data());

    let json = crecre.to_json()?;
    let restored = restore_component::<DenseBlockOperator>(&json, &registry, config)?;
    println!(
        "Restored {} #{} from {} bytes of JSON with {} slots",
        restored.op_string(),
        restored.unique_id(),
        json.len(),
        restored.global_count()
    );

    for component in &mut components {
        component.clear();
    }
    let remaining: usize = components.iter().map(|c| c.global_count()).sum();
    println!("Cleared every component, {remaining} slots remain");

    Ok(())
}
