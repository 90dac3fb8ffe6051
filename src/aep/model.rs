//! The AEP semantic data model: Project → Item → Layer → Property → TextDocument.
//!
//! Recursive structures are arena-keyed by stable numeric ids rather than owned via
//! direct references, per the design notes on cyclic ownership: a `Project` owns every
//! `Item` in a flat map; folders and layer source references hold `item_id`s, not `Item`s.

use std::collections::HashMap;

/// Bit depth per pixel channel, as stored by the project's depth marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitDepth {
    Eight,
    Sixteen,
    ThirtyTwo,
}

impl BitDepth {
    pub fn from_marker(value: u8) -> Option<Self> {
        match value {
            8 => Some(BitDepth::Eight),
            16 => Some(BitDepth::Sixteen),
            32 => Some(BitDepth::ThirtyTwo),
            _ => None,
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            BitDepth::Eight => 8,
            BitDepth::Sixteen => 16,
            BitDepth::ThirtyTwo => 32,
        }
    }
}

/// A warning recorded during parsing for ambiguous on-disk layouts (see §9).
/// Parsing never fails because of a warning; it is informational only.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseWarning {
    pub kind: ParseWarningKind,
    pub message: String,
    pub byte_offset: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseWarningKind {
    AmbiguousFrameRateLayout,
    EmptyTextExtraction,
    UnknownItemType,
}

/// Root of one parsed AEP document.
#[derive(Debug, Clone)]
pub struct Project {
    pub bit_depth: BitDepth,
    pub expression_engine: String,
    pub items: HashMap<u32, Item>,
    pub root_item_id: Option<u32>,
    /// Content-addressable hash of the normalized model, used for dedup.
    pub fingerprint: String,
    pub warnings: Vec<ParseWarning>,
}

impl Project {
    /// Every Composition reachable from the project, in map-iteration order is not
    /// guaranteed; callers that need determinism should sort by item id.
    pub fn compositions(&self) -> impl Iterator<Item = (&u32, &Composition)> {
        self.items.iter().filter_map(|(id, item)| match &item.kind {
            ItemKind::Composition(comp) => Some((id, comp)),
            _ => None,
        })
    }

    pub fn total_layer_count(&self) -> usize {
        self.compositions().map(|(_, c)| c.layers.len()).sum()
    }

    pub fn total_effect_count(&self) -> usize {
        self.compositions()
            .flat_map(|(_, c)| c.layers.iter())
            .map(|l| count_effects(&l.properties))
            .sum()
    }

    pub fn max_property_nesting(&self) -> usize {
        self.compositions()
            .flat_map(|(_, c)| c.layers.iter())
            .map(|l| max_depth(&l.properties, 1))
            .max()
            .unwrap_or(0)
    }

    pub fn has_expressions(&self) -> bool {
        !self.expression_engine.is_empty()
    }
}

fn count_effects(props: &[Property]) -> usize {
    props
        .iter()
        .map(|p| {
            let self_count = if p.match_name == "ADBE Effect Parade" { 1 } else { 0 };
            self_count + count_effects(&p.children)
        })
        .sum()
}

fn max_depth(props: &[Property], current: usize) -> usize {
    props
        .iter()
        .map(|p| {
            if p.children.is_empty() {
                current
            } else {
                max_depth(&p.children, current + 1)
            }
        })
        .max()
        .unwrap_or(current)
}

/// One item in the project's item table.
#[derive(Debug, Clone)]
pub struct Item {
    pub id: u32,
    pub name: String,
    pub kind: ItemKind,
}

#[derive(Debug, Clone)]
pub enum ItemKind {
    Folder(Folder),
    Composition(Composition),
    Footage(Footage),
    /// An item whose type discriminant was not recognized. Recorded, not fatal.
    Unknown { discriminant: u8 },
}

#[derive(Debug, Clone, Default)]
pub struct Folder {
    pub child_item_ids: Vec<u32>,
}

#[derive(Debug, Clone)]
pub struct Composition {
    pub width: u16,
    pub height: u16,
    pub frame_rate: f64,
    pub duration_seconds: f64,
    pub background_color: (u8, u8, u8),
    pub layers: Vec<Layer>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FootageKind {
    Solid,
    Placeholder,
    File,
    Other,
}

#[derive(Debug, Clone)]
pub struct Footage {
    pub footage_kind: FootageKind,
    pub width: u16,
    pub height: u16,
    pub frame_rate: f64,
    pub duration_seconds: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quality {
    Best,
    Draft,
    Wireframe,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sampling {
    Bilinear,
    Bicubic,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LayerFlags {
    pub three_d: bool,
    pub solo: bool,
    pub guide: bool,
    pub adjustment: bool,
    pub shy: bool,
    pub locked: bool,
    pub motion_blur: bool,
    pub effects_enabled: bool,
    pub collapse_transform: bool,
}

#[derive(Debug, Clone)]
pub struct Layer {
    /// 1-based, dense within its composition.
    pub index: u32,
    pub name: String,
    pub source_item_id: u32,
    pub quality: Quality,
    pub sampling: Sampling,
    pub flags: LayerFlags,
    pub properties: Vec<Property>,
    pub text: Option<TextDocument>,
}

impl Layer {
    pub fn is_text_layer(&self) -> bool {
        find_match_name(&self.properties, "ADBE Text Properties")
            .map(|text_props| find_match_name(&text_props.children, "ADBE Text Document").is_some())
            .unwrap_or(false)
    }
}

fn find_match_name<'a>(props: &'a [Property], match_name: &str) -> Option<&'a Property> {
    for p in props {
        if p.match_name == match_name {
            return Some(p);
        }
        if let Some(found) = find_match_name(&p.children, match_name) {
            return Some(found);
        }
    }
    None
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyKind {
    Boolean,
    OneD,
    TwoD,
    ThreeD,
    Color,
    Angle,
    LayerSelect,
    Select,
    Group,
    Custom,
}

impl Default for PropertyKind {
    fn default() -> Self {
        PropertyKind::Custom
    }
}

/// Recursive property-tree node.
#[derive(Debug, Clone)]
pub struct Property {
    pub match_name: String,
    pub display_name: String,
    pub user_label: Option<String>,
    pub property_kind: PropertyKind,
    /// Pipe-separated dropdown options for `select`-kind properties.
    pub select_options: Vec<String>,
    /// 1-based position within its parent group, assigned in document order.
    pub index: u32,
    pub children: Vec<Property>,
    pub raw_payload: Vec<u8>,
    pub text_document: Option<TextDocument>,
}

impl Property {
    pub fn new(match_name: impl Into<String>) -> Self {
        let match_name = match_name.into();
        Property {
            display_name: match_name.clone(),
            match_name,
            user_label: None,
            property_kind: PropertyKind::Custom,
            select_options: Vec::new(),
            index: 0,
            children: Vec::new(),
            raw_payload: Vec::new(),
            text_document: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextDocument {
    pub text: String,
    pub font_name: Option<String>,
    pub font_size: Option<f32>,
    pub fill_color: Option<(u8, u8, u8)>,
    pub is_animated: bool,
}
