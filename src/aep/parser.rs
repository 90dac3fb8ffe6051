//! Recursive-descent AEP parser (C2): walks a decoded RIFX tree (C1) and materializes
//! the Project → Item → Layer → Property → TextDocument model.

use std::io::Cursor;

use binrw::BinRead;

use crate::error::{AepError, CrateError};
use crate::rifx::{self, Node};

use super::model::*;
use super::text_extract;

const SENTINEL_GROUP_END: &str = "ADBE Group End";
const SENTINEL_EFFECT_BUILT_IN: &str = "ADBE Effect Built In Params";

#[derive(BinRead, Debug, Clone, Copy)]
#[br(big)]
struct IdtaRecord {
    id: u32,
    item_type: u8,
}

#[derive(BinRead, Debug, Clone, Copy)]
#[br(big)]
struct CdtaRecord {
    width: u16,
    height: u16,
    frame_rate_raw: [u8; 4],
    duration_raw: [u8; 8],
    bg_r: u8,
    bg_g: u8,
    bg_b: u8,
}

#[derive(BinRead, Debug, Clone, Copy)]
#[br(big)]
struct SspcRecord {
    width: u16,
    height: u16,
    frame_rate_raw: [u8; 4],
}

#[derive(BinRead, Debug, Clone, Copy)]
#[br(big)]
struct LdtaRecord {
    source_id: u32,
    index: u32,
    quality: u8,
    sampling: u8,
    flags: u16,
}

/// Parse a full `Project` out of a decoded RIFX tree rooted at the `Egg!` form.
/// Warnings accumulated along the way are returned alongside the project rather than
/// failing the parse, per §9's open questions.
pub fn parse_project(tree: &Node) -> Result<Project, CrateError> {
    if tree.identifier().and_then(|id| id.as_str().map(str::to_string)).as_deref() != Some("Egg!")
    {
        return Err(CrateError::Aep(AepError::MalformedHeader));
    }

    let mut warnings = Vec::new();
    let mut bit_depth = BitDepth::Eight;
    let mut expression_engine = String::new();
    let mut items = std::collections::HashMap::new();
    let mut root_item_id = None;

    let children = tree.children();
    let mut i = 0;
    while i < children.len() {
        let node = &children[i];
        match node.kind.as_str() {
            Some("tdb4") => {
                if let Some(bytes) = node.bytes() {
                    if let Some(&depth_byte) = bytes.first() {
                        if let Some(depth) = BitDepth::from_marker(depth_byte) {
                            bit_depth = depth;
                        }
                    }
                }
                i += 1;
            }
            Some("expr") => {
                if let Some(text) = utf8_from_bytes(node.bytes()) {
                    expression_engine = text;
                }
                i += 1;
            }
            Some("idta") => {
                let (item, consumed, child_items) = parse_item(&children[i..], &mut warnings)?;
                if root_item_id.is_none() {
                    root_item_id = Some(item.id);
                }
                items.insert(item.id, item);
                for child in child_items {
                    items.insert(child.id, child);
                }
                i += consumed;
            }
            _ => {
                i += 1;
            }
        }
    }

    let fingerprint = compute_fingerprint(&items);

    Ok(Project {
        bit_depth,
        expression_engine,
        items,
        root_item_id,
        fingerprint,
        warnings,
    })
}

/// Parse one item starting at `nodes[0]` (an `idta` block). Returns the item, the
/// number of sibling nodes consumed, and any additional items discovered recursively
/// (e.g. a folder's descendants), which the caller flattens into the project map.
fn parse_item(
    nodes: &[Node],
    warnings: &mut Vec<ParseWarning>,
) -> Result<(Item, usize, Vec<Item>), CrateError> {
    let idta_node = &nodes[0];
    let record = read_fixed::<IdtaRecord>(idta_node.bytes().unwrap_or(&[]))
        .ok_or_else(|| CrateError::Aep(AepError::Truncated(0)))?;

    let mut i = 1;
    let mut name = String::new();
    if let Some(n) = nodes.get(i) {
        if n.kind.as_str() == Some("Utf8") {
            name = utf8_from_bytes(n.bytes()).unwrap_or_default();
            i += 1;
        }
    }

    let (kind, consumed_extra, extra_items) = match record.item_type {
        0x01 => {
            let mut child_ids = Vec::new();
            let mut extra_items = Vec::new();
            let mut consumed = 0;
            if let Some(n) = nodes.get(i) {
                if n.identifier().and_then(|id| id.as_str().map(str::to_string)).as_deref()
                    == Some("Sfdr")
                {
                    let mut j = 0;
                    let sub_children = n.children();
                    while j < sub_children.len() {
                        if sub_children[j].kind.as_str() == Some("idta") {
                            let (child_item, used, mut nested) =
                                parse_item(&sub_children[j..], warnings)?;
                            child_ids.push(child_item.id);
                            extra_items.push(child_item);
                            extra_items.append(&mut nested);
                            j += used;
                        } else {
                            j += 1;
                        }
                    }
                    consumed = 1;
                }
            }
            (ItemKind::Folder(Folder { child_item_ids: child_ids }), consumed, extra_items)
        }
        0x04 => {
            let mut consumed = 0;
            let mut comp = Composition {
                width: 0,
                height: 0,
                frame_rate: 0.0,
                duration_seconds: 0.0,
                background_color: (0, 0, 0),
                layers: Vec::new(),
            };
            if let Some(n) = nodes.get(i) {
                if n.kind.as_str() == Some("cdta") {
                    if let Some(rec) = read_fixed::<CdtaRecord>(n.bytes().unwrap_or(&[])) {
                        comp.width = rec.width;
                        comp.height = rec.height;
                        let (fps, ambiguous) = read_frame_rate(&rec.frame_rate_raw);
                        comp.frame_rate = fps;
                        if ambiguous {
                            warnings.push(ParseWarning {
                                kind: ParseWarningKind::AmbiguousFrameRateLayout,
                                message: "cdta frame rate fell outside plausible float range; used fixed-point reinterpretation".to_string(),
                                byte_offset: None,
                            });
                        }
                        comp.duration_seconds = f64::from_be_bytes(rec.duration_raw);
                        comp.background_color = (rec.bg_r, rec.bg_g, rec.bg_b);
                    }
                    consumed += 1;
                }
            }
            if let Some(n) = nodes.get(i + consumed) {
                if n.identifier().and_then(|id| id.as_str().map(str::to_string)).as_deref()
                    == Some("Layr")
                {
                    comp.layers = parse_layers(n.children(), warnings);
                    consumed += 1;
                }
            }
            (ItemKind::Composition(comp), consumed, Vec::new())
        }
        0x07 => {
            let mut consumed = 0;
            let mut footage = Footage {
                footage_kind: FootageKind::Other,
                width: 0,
                height: 0,
                frame_rate: 0.0,
                duration_seconds: 0.0,
            };
            if let Some(n) = nodes.get(i) {
                if n.kind.as_str() == Some("sspc") {
                    if let Some(rec) = read_fixed::<SspcRecord>(n.bytes().unwrap_or(&[])) {
                        footage.width = rec.width;
                        footage.height = rec.height;
                        let (fps, ambiguous) = read_frame_rate(&rec.frame_rate_raw);
                        footage.frame_rate = fps;
                        if ambiguous {
                            warnings.push(ParseWarning {
                                kind: ParseWarningKind::AmbiguousFrameRateLayout,
                                message: "sspc frame rate fell outside plausible float range; used fixed-point reinterpretation".to_string(),
                                byte_offset: None,
                            });
                        }
                    }
                    consumed += 1;
                }
            }
            if let Some(n) = nodes.get(i + consumed) {
                if n.kind.as_str() == Some("opti") {
                    let tag = n.bytes().unwrap_or(&[]);
                    footage.footage_kind = match tag {
                        b"Soli" => FootageKind::Solid,
                        b"None" => FootageKind::Placeholder,
                        [b'F', b'i', b'l', b'e'] => FootageKind::File,
                        _ => FootageKind::Other,
                    };
                    consumed += 1;
                }
            }
            (ItemKind::Footage(footage), consumed, Vec::new())
        }
        other => {
            warnings.push(ParseWarning {
                kind: ParseWarningKind::UnknownItemType,
                message: format!("unrecognized item type discriminant {other:#04x}"),
                byte_offset: None,
            });
            (ItemKind::Unknown { discriminant: other }, 0, Vec::new())
        }
    };

    let item = Item {
        id: record.id,
        name,
        kind,
    };

    Ok((item, i + consumed_extra, extra_items))
}

fn parse_layers(nodes: &[Node], warnings: &mut Vec<ParseWarning>) -> Vec<Layer> {
    let mut layers = Vec::new();
    let mut i = 0;
    while i < nodes.len() {
        if nodes[i].kind.as_str() != Some("ldta") {
            i += 1;
            continue;
        }
        let record = match read_fixed::<LdtaRecord>(nodes[i].bytes().unwrap_or(&[])) {
            Some(r) => r,
            None => {
                i += 1;
                continue;
            }
        };
        let mut j = i + 1;
        let mut name = String::new();
        if let Some(n) = nodes.get(j) {
            if n.kind.as_str() == Some("Utf8") {
                name = utf8_from_bytes(n.bytes()).unwrap_or_default();
                j += 1;
            }
        }
        let body_start = j;
        while j < nodes.len() && nodes[j].kind.as_str() != Some("ldta") {
            j += 1;
        }
        let properties = parse_properties(&nodes[body_start..j], warnings);
        let is_text = Layer {
            index: record.index,
            name: name.clone(),
            source_item_id: record.source_id,
            quality: quality_from_byte(record.quality),
            sampling: sampling_from_byte(record.sampling),
            flags: flags_from_bitfield(record.flags),
            properties,
            text: None,
        };
        let mut layer = is_text;
        if layer.is_text_layer() {
            if let Some(text_doc) = find_text_document(&layer.properties) {
                layer.text = Some(text_doc);
            }
        }
        layers.push(layer);
        i = j;
    }
    layers.sort_by_key(|l| l.index);
    layers
}

fn find_text_document(props: &[Property]) -> Option<TextDocument> {
    for p in props {
        if p.match_name == "ADBE Text Document" {
            if let Some(doc) = &p.text_document {
                return Some(doc.clone());
            }
        }
        if let Some(found) = find_text_document(&p.children) {
            return Some(found);
        }
    }
    None
}

/// Parse a flat run of `tdmn`+payload block pairs into a property list, honoring the
/// group-end / effect-built-in sentinels and all documented tie-break rules.
pub(crate) fn parse_properties(nodes: &[Node], warnings: &mut Vec<ParseWarning>) -> Vec<Property> {
    let mut result = Vec::new();
    let mut i = 0;

    while i < nodes.len() {
        if nodes[i].kind.as_str() != Some("tdmn") {
            i += 1;
            continue;
        }
        let match_name = nul_padded_string(nodes[i].bytes().unwrap_or(&[]));
        i += 1;

        if match_name == SENTINEL_GROUP_END {
            // Marks the end of the enclosing group in the original property stream, but
            // carries no structural meaning here: each `tdgp`'s children already come from
            // a self-delimited RIFX block, so the sentinel itself is simply dropped and
            // scanning continues for any real properties that follow it.
            continue;
        }
        if match_name == SENTINEL_EFFECT_BUILT_IN {
            // Skip the following block entirely and resume scanning for the next tdmn.
            i += 1;
            continue;
        }

        let mut prop = Property::new(match_name);
        let mut pdnm_name_candidate: Option<String> = None;

        while i < nodes.len() && nodes[i].kind.as_str() != Some("tdmn") {
            let block = &nodes[i];
            match block.kind.as_str() {
                Some("pard") => apply_pard(&mut prop, block.bytes().unwrap_or(&[])),
                Some("tdgp") => {
                    let children = parse_properties(block.children(), warnings);
                    prop.children = children;
                }
                Some("fnam") => {
                    if let Some(name) = utf8_from_bytes(block.bytes()) {
                        if !name.is_empty() {
                            prop.display_name = name;
                        }
                    }
                }
                Some("tdsn") => {
                    if let Some(label) = utf8_from_bytes(block.bytes()) {
                        if label != "-_0_/-" {
                            prop.user_label = Some(label);
                        }
                    }
                }
                Some("pdnm") => {
                    if let Some(s) = utf8_from_bytes(block.bytes()) {
                        if !s.is_empty() {
                            prop.select_options =
                                s.split('|').map(|opt| opt.to_string()).collect();
                            pdnm_name_candidate = Some(s);
                        }
                    }
                }
                Some("tdbs") => {
                    let raw = block.bytes().unwrap_or(&[]).to_vec();
                    let (doc, warning) = text_extract::extract_text_document(&raw);
                    prop.raw_payload = raw;
                    prop.text_document = doc;
                    if let Some(w) = warning {
                        warnings.push(w);
                    }
                }
                Some("Utf8") => {
                    prop.raw_payload = block.bytes().unwrap_or(&[]).to_vec();
                }
                _ => {
                    prop.raw_payload = block.bytes().unwrap_or(&[]).to_vec();
                }
            }
            i += 1;
        }

        if prop.display_name == prop.match_name {
            if let Some(candidate) = pdnm_name_candidate {
                prop.display_name = candidate;
            }
        }

        result.push(prop);
    }

    for (idx, p) in result.iter_mut().enumerate() {
        p.index = (idx + 1) as u32;
    }
    result
}

fn apply_pard(prop: &mut Property, bytes: &[u8]) {
    if bytes.len() >= 16 {
        let kind_raw = u16::from_be_bytes([bytes[14], bytes[15]]);
        prop.property_kind = property_kind_from_raw(kind_raw);
    }
    if bytes.len() >= 48 {
        let name = nul_padded_string(&bytes[16..48]);
        if !name.is_empty() {
            prop.display_name = name;
        }
    }
    prop.raw_payload = bytes.to_vec();
}

fn property_kind_from_raw(raw: u16) -> PropertyKind {
    match raw {
        0x00 => PropertyKind::Boolean,
        0x01 => PropertyKind::OneD,
        0x0a => PropertyKind::OneD, // normalized per the documented tie-break
        0x02 => PropertyKind::TwoD,
        0x03 => PropertyKind::ThreeD,
        0x04 => PropertyKind::Color,
        0x05 => PropertyKind::Angle,
        0x06 => PropertyKind::LayerSelect,
        0x07 => PropertyKind::Select,
        0x0b => PropertyKind::Group,
        _ => PropertyKind::Custom,
    }
}

fn quality_from_byte(b: u8) -> Quality {
    match b {
        1 => Quality::Draft,
        2 => Quality::Wireframe,
        _ => Quality::Best,
    }
}

fn sampling_from_byte(b: u8) -> Sampling {
    match b {
        1 => Sampling::Bicubic,
        _ => Sampling::Bilinear,
    }
}

fn flags_from_bitfield(bits: u16) -> LayerFlags {
    LayerFlags {
        three_d: bits & 0x0001 != 0,
        solo: bits & 0x0002 != 0,
        guide: bits & 0x0004 != 0,
        adjustment: bits & 0x0008 != 0,
        shy: bits & 0x0010 != 0,
        locked: bits & 0x0020 != 0,
        motion_blur: bits & 0x0040 != 0,
        effects_enabled: bits & 0x0080 != 0,
        collapse_transform: bits & 0x0100 != 0,
    }
}

/// Feature-detect the on-disk `cdta`/`sspc` frame-rate layout: try an IEEE-754
/// big-endian float first; fall back to a fixed-point reinterpretation (u16 numerator
/// over a fixed denominator) if the float is implausible. See DESIGN.md open question 1.
fn read_frame_rate(raw: &[u8; 4]) -> (f64, bool) {
    let as_f32 = f32::from_be_bytes(*raw) as f64;
    if as_f32.is_finite() && as_f32 > 0.0 && as_f32 <= 999.0 {
        return (as_f32, false);
    }
    let numerator = u16::from_be_bytes([raw[0], raw[1]]);
    (numerator as f64 / 100.0, true)
}

fn read_fixed<T: BinRead>(bytes: &[u8]) -> Option<T>
where
    for<'a> T::Args<'a>: Default,
{
    let mut cursor = Cursor::new(bytes);
    T::read(&mut cursor).ok()
}

fn utf8_from_bytes(bytes: Option<&[u8]>) -> Option<String> {
    bytes.and_then(|b| std::str::from_utf8(b).ok()).map(|s| s.to_string())
}

fn nul_padded_string(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).to_string()
}

fn compute_fingerprint(items: &std::collections::HashMap<u32, Item>) -> String {
    let mut ids: Vec<&u32> = items.keys().collect();
    ids.sort();
    let mut hash: u64 = 0xcbf29ce484222325; // FNV-1a offset basis
    for id in ids {
        for byte in id.to_be_bytes() {
            hash ^= byte as u64;
            hash = hash.wrapping_mul(0x100000001b3);
        }
        if let Some(item) = items.get(id) {
            for byte in item.name.as_bytes() {
                hash ^= *byte as u64;
                hash = hash.wrapping_mul(0x100000001b3);
            }
        }
    }
    format!("{hash:016x}")
}

/// Validate the universal invariants from §8 against a parsed project. Used by tests and
/// may be used by callers that want to assert structural soundness before persisting.
pub fn validate_invariants(project: &Project) -> Result<(), CrateError> {
    for (id, item) in &project.items {
        if item.id != *id {
            return Err(CrateError::Aep(AepError::DanglingReference(*id)));
        }
        if let ItemKind::Composition(comp) = &item.kind {
            if comp.width == 0 || comp.height == 0 {
                return Err(CrateError::Aep(AepError::Truncated(0)));
            }
            for layer in &comp.layers {
                if layer.source_item_id != 0 && !project.items.contains_key(&layer.source_item_id) {
                    return Err(CrateError::Aep(AepError::DanglingReference(
                        layer.source_item_id,
                    )));
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(kind: &[u8; 4], payload: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(kind);
        out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        out.extend_from_slice(payload);
        if payload.len() % 2 == 1 {
            out.push(0);
        }
        out
    }

    fn rifx_doc(body: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(b"RIFX");
        out.extend_from_slice(&((body.len() as u32) + 4).to_be_bytes());
        out.extend_from_slice(b"Egg!");
        out.extend_from_slice(body);
        out
    }

    #[test]
    fn minimal_valid_file() {
        let idta = block(b"idta", &[0, 0, 0, 1, 0x01, 0, 0, 0]);
        let name = block(b"Utf8", b"root");
        let mut body = Vec::new();
        body.extend_from_slice(&idta);
        body.extend_from_slice(&name);
        let bytes = rifx_doc(&body);

        let tree = rifx::decode(&bytes).unwrap();
        let project = parse_project(&tree).unwrap();
        assert_eq!(project.items.len(), 1);
        let item = &project.items[&1];
        assert_eq!(item.name, "root");
        assert!(matches!(item.kind, ItemKind::Folder(ref f) if f.child_item_ids.is_empty()));
    }

    #[test]
    fn bit_depth_detection() {
        let tdb4 = block(b"tdb4", &[16]);
        let bytes = rifx_doc(&tdb4);
        let tree = rifx::decode(&bytes).unwrap();
        let project = parse_project(&tree).unwrap();
        assert_eq!(project.bit_depth.as_u8(), 16);
    }

    fn composition_body() -> Vec<u8> {
        let mut cdta_payload = Vec::new();
        cdta_payload.extend_from_slice(&1920u16.to_be_bytes());
        cdta_payload.extend_from_slice(&1080u16.to_be_bytes());
        cdta_payload.extend_from_slice(&24.0f32.to_be_bytes());
        cdta_payload.extend_from_slice(&5.0f64.to_be_bytes());
        cdta_payload.extend_from_slice(&[0, 0, 0]);

        let idta = block(b"idta", &[0, 0, 0, 2, 0x04, 0, 0, 0]);
        let name = block(b"Utf8", b"Comp 1");
        let cdta = block(b"cdta", &cdta_payload);
        let mut body = Vec::new();
        body.extend_from_slice(&idta);
        body.extend_from_slice(&name);
        body.extend_from_slice(&cdta);
        body
    }

    #[test]
    fn composition_dimensions() {
        let bytes = rifx_doc(&composition_body());
        let tree = rifx::decode(&bytes).unwrap();
        let project = parse_project(&tree).unwrap();
        let (_, comp) = project.compositions().next().unwrap();
        assert_eq!(comp.width, 1920);
        assert_eq!(comp.height, 1080);
        assert!((comp.frame_rate - 24.0).abs() < 0.001);
        assert!((comp.duration_seconds - 5.0).abs() < 0.001);
        assert_eq!(comp.background_color, (0, 0, 0));
    }

    #[test]
    fn unknown_chunk_tolerance() {
        let unknown = block(b"XXXX", &[1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16]);
        let mut body = unknown;
        body.extend_from_slice(&composition_body());
        let bytes = rifx_doc(&body);
        let tree = rifx::decode(&bytes).unwrap();
        let project = parse_project(&tree).unwrap();
        let (_, comp) = project.compositions().next().unwrap();
        assert_eq!(comp.width, 1920);
        assert_eq!(comp.height, 1080);
    }

    #[test]
    fn sentinel_handling() {
        let group_end_name = {
            let mut v = b"ADBE Group End".to_vec();
            v.push(0);
            v
        };
        let real_name = {
            let mut v = b"ADBE Real Property".to_vec();
            v.push(0);
            v
        };
        let mut props = Vec::new();
        props.extend_from_slice(&block(b"tdmn", &group_end_name));
        props.extend_from_slice(&block(b"XXXX", b"junk"));
        props.extend_from_slice(&block(b"tdmn", &real_name));
        props.extend_from_slice(&block(b"pard", &[0u8; 48]));

        // A leading "ADBE Group End" sentinel (plus unrelated junk) is dropped without
        // ending the scan, so the real property that follows it is still parsed.
        let nodes = decode_block_list(&props);
        let mut warnings = Vec::new();
        let result = parse_properties(&nodes, &mut warnings);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].match_name, "ADBE Real Property");
    }

    #[test]
    fn sentinel_does_not_terminate_when_not_first() {
        let real_name_1 = {
            let mut v = b"ADBE First".to_vec();
            v.push(0);
            v
        };
        let real_name_2 = {
            let mut v = b"ADBE Real Property".to_vec();
            v.push(0);
            v
        };
        let mut props = Vec::new();
        props.extend_from_slice(&block(b"tdmn", &real_name_1));
        props.extend_from_slice(&block(b"pard", &[0u8; 48]));
        props.extend_from_slice(&block(b"tdmn", &real_name_2));
        props.extend_from_slice(&block(b"pard", &[0u8; 48]));

        let nodes = decode_block_list(&props);
        let mut warnings = Vec::new();
        let result = parse_properties(&nodes, &mut warnings);
        assert_eq!(result.len(), 2);
        assert_eq!(result[1].match_name, "ADBE Real Property");
        assert_eq!(result[1].index, 2);
    }

    fn decode_block_list(bytes: &[u8]) -> Vec<Node> {
        let wrapped = rifx_doc(bytes);
        let tree = rifx::decode(&wrapped).unwrap();
        tree.children().to_vec()
    }

    #[test]
    fn pard_kind_0a_normalizes_to_one_d() {
        let mut pard = vec![0u8; 48];
        pard[14] = 0x00;
        pard[15] = 0x0a;
        let mut prop = Property::new("test");
        apply_pard(&mut prop, &pard);
        assert_eq!(prop.property_kind, PropertyKind::OneD);
    }

    #[test]
    fn default_kind_is_custom_without_pard() {
        let prop = Property::new("test");
        assert_eq!(prop.property_kind, PropertyKind::Custom);
    }

    #[test]
    fn tdsn_sentinel_label_is_dropped() {
        let label = {
            let mut v = b"-_0_/-".to_vec();
            v.push(0);
            v
        };
        let mut props = Vec::new();
        let name = {
            let mut v = b"ADBE Prop".to_vec();
            v.push(0);
            v
        };
        props.extend_from_slice(&block(b"tdmn", &name));
        props.extend_from_slice(&block(b"tdsn", &label));

        let nodes = decode_block_list(&props);
        let mut warnings = Vec::new();
        let result = parse_properties(&nodes, &mut warnings);
        assert_eq!(result.len(), 1);
        assert!(result[0].user_label.is_none());
    }
}
