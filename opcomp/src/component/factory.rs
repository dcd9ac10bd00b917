//! Category-agnostic construction of components

use opcomp_core::{kinds, OperatorCategory};
use serde::Deserialize;

use super::{OperatorComponent, OperatorComponentBase};
use crate::config::ComponentConfig;
use crate::error::Result;
use crate::matrix::OperatorMatrix;
use crate::registry::ComponentRegistry;

/// Bind `$kind` to the marker type of `$category` and evaluate `$body`
macro_rules! with_kind {
    ($category:expr, $kind:ident => $body:expr) => {
        match $category {
            OperatorCategory::Ham => { type $kind = kinds::Ham; $body }
            OperatorCategory::Cre => { type $kind = kinds::Cre; $body }
            OperatorCategory::Des => { type $kind = kinds::Des; $body }
            OperatorCategory::CreCre => { type $kind = kinds::CreCre; $body }
            OperatorCategory::CreDes => { type $kind = kinds::CreDes; $body }
            OperatorCategory::DesCre => { type $kind = kinds::DesCre; $body }
            OperatorCategory::CreDesComp => { type $kind = kinds::CreDesComp; $body }
            OperatorCategory::DesDesComp => { type $kind = kinds::DesDesComp; $body }
            OperatorCategory::CreCreDesComp => { type $kind = kinds::CreCreDesComp; $body }
            OperatorCategory::CreCreDes => { type $kind = kinds::CreCreDes; $body }
            OperatorCategory::CreDesDes => { type $kind = kinds::CreDesDes; $body }
            OperatorCategory::CreDesCre => { type $kind = kinds::CreDesCre; $body }
            OperatorCategory::CreCreCre => { type $kind = kinds::CreCreCre; $body }
            OperatorCategory::DesCreDes => { type $kind = kinds::DesCreDes; $body }
            OperatorCategory::DesDesCre => { type $kind = kinds::DesDesCre; $body }
        }
    };
}

/// Empty component of `category`, stored in that category's topology
pub fn make_component<M: OperatorMatrix + 'static>(
    category: OperatorCategory,
    registry: &ComponentRegistry,
    config: ComponentConfig,
) -> Box<dyn OperatorComponentBase<M>> {
    with_kind!(category, K => Box::new(OperatorComponent::<K, M>::new(registry, config)))
}

/// Restore a component of whichever category the JSON snapshot holds
pub fn restore_component<M: OperatorMatrix + 'static>(
    json: &str,
    registry: &ComponentRegistry,
    config: ComponentConfig,
) -> Result<Box<dyn OperatorComponentBase<M>>> {
    #[derive(Deserialize)]
    struct Tag {
        category: OperatorCategory,
    }

    let tag: Tag = serde_json::from_str(json)?;
    with_kind!(tag.category, K => {
        let component = OperatorComponent::<K, M>::from_json(json, registry, config)?;
        Ok(Box::new(component))
    })
}
