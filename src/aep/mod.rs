//! AEP parser (C2): materializes the Project → Item → Layer → Property → TextDocument
//! model from a decoded RIFX tree (C1).

pub mod model;
pub mod parser;
pub mod text_extract;

pub use model::{
    BitDepth, Composition, Folder, Footage, FootageKind, Item, ItemKind, Layer, LayerFlags,
    ParseWarning, ParseWarningKind, Project, Property, PropertyKind, Quality, Sampling,
    TextDocument,
};
pub use parser::{parse_project, validate_invariants};

use crate::error::Result;

/// Parse raw AEP file bytes end to end: RIFX decode (C1) followed by the AEP model
/// walk (C2).
pub fn parse(bytes: &[u8]) -> Result<Project> {
    let tree = crate::rifx::decode(bytes)?;
    let project = parse_project(&tree)?;
    Ok(project)
}
