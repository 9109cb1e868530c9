//! Embedded TrueType font for PDF reports.
//!
//! Report text is shown with a composite (`Type0`) font over a
//! `CIDFontType2` descendant. Every distinct character in a document gets
//! its own CID, numbered from 1 in order of first use. A `CIDToGIDMap`
//! points each CID at the font's glyph and a `ToUnicode` CMap maps it back
//! to the character, so text extracts exactly even when the font has no
//! glyph for it (the viewer then draws the font's `.notdef` box).
//!
//! The built-in font is DejaVu Sans Mono (Bitstream Vera license, see
//! `assets/DejaVuSansMono.LICENSE`). Any TrueType font with a `glyf` table
//! can replace it, e.g. one with CJK coverage.

use lopdf::{dictionary, Document, Object, ObjectId, Stream};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use ttf_parser::{name_id, Face, GlyphId};

use crate::error::ExportError;

static DEJAVU_SANS_MONO: &[u8] = include_bytes!("../../assets/DejaVuSansMono.ttf");

/// `ToUnicode` CMaps may hold at most 100 entries per `bfchar` block.
const BFCHAR_BLOCK: usize = 100;

/// A TrueType font program embedded into every rendered report.
#[derive(Clone)]
pub struct ReportFont {
    name: String,
    data: Arc<[u8]>,
}

impl ReportFont {
    pub fn builtin() -> Self {
        Self {
            name: "DejaVuSansMono".to_string(),
            data: Arc::from(DEJAVU_SANS_MONO),
        }
    }

    /// Load a TrueType font. Fonts with CFF outlines are rejected.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self, ExportError> {
        if ttf_parser::fonts_in_collection(&data).is_some() {
            return Err(ExportError::Font(
                "font collections (.ttc) cannot be embedded; use a single .ttf".to_string(),
            ));
        }
        let face = Face::parse(&data, 0).map_err(|e| ExportError::Font(e.to_string()))?;
        if face.tables().glyf.is_none() {
            return Err(ExportError::Font(
                "no TrueType outlines (glyf table)".to_string(),
            ));
        }
        if face.tables().cmap.is_none() {
            return Err(ExportError::Font("no character map (cmap table)".to_string()));
        }

        let name = face
            .names()
            .into_iter()
            .filter(|n| n.name_id == name_id::POST_SCRIPT_NAME)
            .find_map(|n| n.to_string())
            .map(|n| n.chars().filter(|c| c.is_ascii_alphanumeric() || *c == '-').collect::<String>())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| "ReportFont".to_string());

        Ok(Self {
            name,
            data: Arc::from(data),
        })
    }

    /// PostScript name written as the PDF `BaseFont`.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn metrics(&self) -> Result<Metrics<'_>, ExportError> {
        let face = Face::parse(&self.data, 0).map_err(|e| ExportError::Font(e.to_string()))?;
        Ok(Metrics::new(face))
    }

    /// Add the font objects covering every character `cids` has handed out.
    /// Returns the id of the `Type0` font dictionary.
    pub(crate) fn embed(&self, doc: &mut Document, cids: &CidMap) -> Result<ObjectId, ExportError> {
        let metrics = self.metrics()?;
        let face = &metrics.face;
        let bbox = face.global_bounding_box();
        let base_font = Object::Name(self.name.as_bytes().to_vec());

        let file_id = doc.add_object(Stream::new(
            dictionary! { "Length1" => self.data.len() as i64 },
            self.data.to_vec(),
        ));

        // Nonsymbolic, plus FixedPitch when the font says so.
        let flags: i64 = if face.is_monospaced() { 32 | 1 } else { 32 };
        let descriptor_id = doc.add_object(dictionary! {
            "Type" => "FontDescriptor",
            "FontName" => base_font.clone(),
            "Flags" => flags,
            "FontBBox" => vec![
                metrics.scale(bbox.x_min).into(),
                metrics.scale(bbox.y_min).into(),
                metrics.scale(bbox.x_max).into(),
                metrics.scale(bbox.y_max).into(),
            ],
            "ItalicAngle" => face.italic_angle().round() as i64,
            "Ascent" => metrics.scale(face.ascender()),
            "Descent" => metrics.scale(face.descender()),
            "CapHeight" => metrics.scale(face.capital_height().unwrap_or(face.ascender())),
            "StemV" => 80,
            "FontFile2" => file_id,
        });

        let mut gid_map = vec![0u8, 0u8];
        let mut widths = Vec::with_capacity(cids.chars.len());
        for c in &cids.chars {
            gid_map.extend_from_slice(&metrics.glyph(*c).0.to_be_bytes());
            widths.push(Object::Integer(metrics.width(*c)));
        }
        let gid_map_id = doc.add_object(Stream::new(dictionary! {}, gid_map));
        let w: Vec<Object> = if widths.is_empty() {
            Vec::new()
        } else {
            vec![Object::Integer(1), Object::Array(widths)]
        };

        let cid_font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "CIDFontType2",
            "BaseFont" => base_font.clone(),
            "CIDSystemInfo" => dictionary! {
                "Registry" => Object::string_literal("Adobe"),
                "Ordering" => Object::string_literal("Identity"),
                "Supplement" => 0,
            },
            "FontDescriptor" => descriptor_id,
            "DW" => metrics.width('0'),
            "W" => w,
            "CIDToGIDMap" => gid_map_id,
        });

        let to_unicode_id = doc.add_object(Stream::new(
            dictionary! {},
            to_unicode_cmap(&cids.chars).into_bytes(),
        ));

        Ok(doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type0",
            "BaseFont" => base_font,
            "Encoding" => "Identity-H",
            "DescendantFonts" => vec![cid_font_id.into()],
            "ToUnicode" => to_unicode_id,
        }))
    }
}

impl Default for ReportFont {
    fn default() -> Self {
        Self::builtin()
    }
}

impl fmt::Debug for ReportFont {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReportFont")
            .field("name", &self.name)
            .field("bytes", &self.data.len())
            .finish()
    }
}

/// Glyph lookups and advance widths for one parsed font.
pub(crate) struct Metrics<'a> {
    face: Face<'a>,
    /// Advance of `0`, in font units; one layout column.
    cell: u16,
}

impl<'a> Metrics<'a> {
    fn new(face: Face<'a>) -> Self {
        let half_em = (face.units_per_em() / 2).max(1);
        let cell = face
            .glyph_index('0')
            .and_then(|g| face.glyph_hor_advance(g))
            .filter(|a| *a > 0)
            .unwrap_or(half_em);
        Self { face, cell }
    }

    fn glyph(&self, c: char) -> GlyphId {
        self.face.glyph_index(c).unwrap_or(GlyphId(0))
    }

    fn advance(&self, c: char) -> u16 {
        self.face
            .glyph_hor_advance(self.glyph(c))
            .unwrap_or(self.cell)
    }

    fn scale(&self, units: i16) -> i64 {
        i64::from(units) * 1000 / i64::from(self.face.units_per_em().max(1))
    }

    /// Advance width of `c` in text space (thousandths of the font size).
    pub(crate) fn width(&self, c: char) -> i64 {
        i64::from(self.advance(c)) * 1000 / i64::from(self.face.units_per_em().max(1))
    }

    /// Width of one layout column in text space.
    pub(crate) fn cell_width(&self) -> i64 {
        i64::from(self.cell) * 1000 / i64::from(self.face.units_per_em().max(1))
    }

    /// Layout columns `c` occupies: its advance rounded to whole cells, at least one.
    pub(crate) fn columns(&self, c: char) -> usize {
        let cell = usize::from(self.cell);
        ((usize::from(self.advance(c)) + cell / 2) / cell).max(1)
    }
}

/// Hands out two-byte CIDs to characters in order of first use.
#[derive(Debug, Default)]
pub(crate) struct CidMap {
    cids: HashMap<char, u16>,
    chars: Vec<char>,
}

impl CidMap {
    /// Encode `text` as a big-endian CID string for an `Identity-H` font.
    pub(crate) fn encode(&mut self, text: &str) -> Result<Vec<u8>, ExportError> {
        let mut out = Vec::with_capacity(text.len() * 2);
        for c in text.chars() {
            let cid = match self.cids.get(&c) {
                Some(cid) => *cid,
                None => {
                    let cid = u16::try_from(self.chars.len() + 1).map_err(|_| {
                        ExportError::Pdf("more than 65535 distinct characters".to_string())
                    })?;
                    self.cids.insert(c, cid);
                    self.chars.push(c);
                    cid
                }
            };
            out.extend_from_slice(&cid.to_be_bytes());
        }
        Ok(out)
    }
}

fn to_unicode_cmap(chars: &[char]) -> String {
    let mut cmap = String::from(
        "/CIDInit /ProcSet findresource begin\n\
         12 dict begin\n\
         begincmap\n\
         /CIDSystemInfo << /Registry (Adobe) /Ordering (UCS) /Supplement 0 >> def\n\
         /CMapName /Adobe-Identity-UCS def\n\
         /CMapType 2 def\n\
         1 begincodespacerange\n\
         <0000> <FFFF>\n\
         endcodespacerange\n",
    );

    for (block, chunk) in chars.chunks(BFCHAR_BLOCK).enumerate() {
        cmap.push_str(&format!("{} beginbfchar\n", chunk.len()));
        for (i, c) in chunk.iter().enumerate() {
            let cid = block * BFCHAR_BLOCK + i + 1;
            let mut units = [0u16; 2];
            let utf16: String = c
                .encode_utf16(&mut units)
                .iter()
                .map(|u| format!("{:04X}", u))
                .collect();
            cmap.push_str(&format!("<{:04X}> <{}>\n", cid, utf16));
        }
        cmap.push_str("endbfchar\n");
    }

    cmap.push_str("endcmap\nCMapName currentdict /CMap defineresource pop\nend\nend\n");
    cmap
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_font_metrics() {
        let font = ReportFont::builtin();
        assert_eq!(font.name(), "DejaVuSansMono");
        let metrics = font.metrics().unwrap();
        // 1233 / 2048 em
        assert_eq!(metrics.cell_width(), 602);
        assert_eq!(metrics.width('W'), metrics.cell_width());
        assert_eq!(metrics.columns('a'), 1);
        assert_ne!(metrics.glyph('é'), GlyphId(0));
    }

    #[test]
    fn test_cids_follow_first_use() {
        let mut cids = CidMap::default();
        assert_eq!(cids.encode("aba").unwrap(), vec![0, 1, 0, 2, 0, 1]);
        assert_eq!(cids.encode("退b").unwrap(), vec![0, 3, 0, 2]);
        assert_eq!(cids.chars, vec!['a', 'b', '退']);
    }

    #[test]
    fn test_to_unicode_cmap_blocks() {
        let chars: Vec<char> = ('a'..='z').chain('\u{4e00}'..'\u{4e64}').collect();
        let cmap = to_unicode_cmap(&chars);
        assert!(cmap.contains("100 beginbfchar\n<0001> <0061>\n"));
        assert!(cmap.contains("26 beginbfchar\n"));
        assert!(cmap.contains("<001B> <4E00>\n"));
        assert!(cmap.ends_with("endcmap\nCMapName currentdict /CMap defineresource pop\nend\nend\n"));
    }

    #[test]
    fn test_astral_characters_map_to_surrogate_pairs() {
        let cmap = to_unicode_cmap(&['😀']);
        assert!(cmap.contains("<0001> <D83DDE00>\n"));
    }

    #[test]
    fn test_rejects_non_font_bytes() {
        let err = ReportFont::from_bytes(b"not a font".to_vec()).unwrap_err();
        assert!(matches!(err, ExportError::Font(_)));
    }

    #[test]
    fn test_rejects_font_collections() {
        // ttcf header, version 1.0, one font at offset 16
        let mut data = b"ttcf".to_vec();
        data.extend_from_slice(&[0, 1, 0, 0, 0, 0, 0, 1, 0, 0, 0, 16]);
        data.extend_from_slice(DEJAVU_SANS_MONO);
        let err = ReportFont::from_bytes(data).unwrap_err();
        assert!(err.to_string().contains(".ttc"));
    }

    #[test]
    fn test_loads_builtin_bytes_by_postscript_name() {
        let font = ReportFont::from_bytes(DEJAVU_SANS_MONO.to_vec()).unwrap();
        assert_eq!(font.name(), "DejaVuSansMono");
    }
}
