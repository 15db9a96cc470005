use crate::{
    chart::{diff_percent, AxisLabels, ChartRenderer},
    config::Config,
    error::ReportError,
    fonts::ReportFont,
    input::InputRow,
    stats::{CategoryEnvelope, EnvelopeTable},
};
use pdf_writer::types::{CidFontType, FontFlags, SystemInfo};
use pdf_writer::{Content, Filter, Finish, Name, Pdf, Rect, Ref, Str, TextStr};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Cursor;
use tracing::{debug, info};

const FONT_NAME: Name<'static> = Name(b"F1");
const IMAGE_NAME: Name<'static> = Name(b"Im1");
const BASE_FONT: Name<'static> = Name(b"ReportFont");
const PT_PER_MM: f32 = 72.0 / 25.4;

/// What ended up on one page, kept for run summaries and tests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageRecord {
    pub page: usize,
    pub header: Vec<String>,
    pub category: Option<String>,
    pub left_value: f64,
    pub right_value: f64,
    pub diff_pct: f64,
    pub envelope: CategoryEnvelope,
    pub fallback_envelope: bool,
}

#[derive(Debug, Clone)]
pub struct ComposedReport {
    pub pdf: Vec<u8>,
    pub pages: Vec<PageRecord>,
}

impl ComposedReport {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn into_reader(self) -> Cursor<Vec<u8>> {
        Cursor::new(self.pdf)
    }
}

struct RefAlloc(i32);

impl RefAlloc {
    fn next(&mut self) -> Ref {
        let r = Ref::new(self.0);
        self.0 += 1;
        r
    }
}

struct FontRefs {
    type0: Ref,
    cid: Ref,
    descriptor: Ref,
    to_unicode: Ref,
    file: Ref,
}

pub struct Composer<'a> {
    cfg: &'a Config,
    font: &'a ReportFont,
}

impl<'a> Composer<'a> {
    pub fn new(cfg: &'a Config, font: &'a ReportFont) -> Self {
        Self { cfg, font }
    }

    /// Builds one page per row, in row order. Any failing row aborts the
    /// whole document.
    pub fn compose(
        &self,
        rows: &[InputRow],
        envelopes: &EnvelopeTable,
        labels: &AxisLabels,
    ) -> Result<ComposedReport, ReportError> {
        let page_cfg = &self.cfg.report;
        let renderer = ChartRenderer::new(&self.cfg.chart, self.font);

        let mut pdf = Pdf::new();
        let mut alloc = RefAlloc(1);
        let catalog_id = alloc.next();
        let tree_id = alloc.next();
        let font_refs = FontRefs {
            type0: alloc.next(),
            cid: alloc.next(),
            descriptor: alloc.next(),
            to_unicode: alloc.next(),
            file: alloc.next(),
        };

        let mut glyphs: BTreeMap<u16, char> = BTreeMap::new();
        let mut page_ids = Vec::with_capacity(rows.len());
        let mut records = Vec::with_capacity(rows.len());

        for (i, row) in rows.iter().enumerate() {
            let envelope = envelopes.lookup(row.category.as_deref());
            let fallback_envelope = envelopes.get(row.category.as_deref()).is_none();
            debug!(
                "page {} name={:?} category={:?} fallback={}",
                i + 1,
                row.name,
                row.category,
                fallback_envelope
            );

            let png = renderer.render(row, &envelope, labels)?;
            let image = decode_png(&png)?;

            let page_id = alloc.next();
            let content_id = alloc.next();
            let image_id = alloc.next();

            let mut content = Content::new();
            let header = row.header_lines();
            for (line_no, text) in header.iter().enumerate() {
                self.header_line(&mut content, line_no, text, &mut glyphs);
            }
            self.place_image(&mut content, image.width, image.height);

            write_image(&mut pdf, image_id, &image);
            let raw = content.finish();
            let compressed = miniz_oxide::deflate::compress_to_vec_zlib(&raw, 6);
            pdf.stream(content_id, &compressed).filter(Filter::FlateDecode);

            let mut page = pdf.page(page_id);
            page.media_box(Rect::new(
                0.0,
                0.0,
                page_cfg.page_width_mm * PT_PER_MM,
                page_cfg.page_height_mm * PT_PER_MM,
            ))
            .parent(tree_id)
            .contents(content_id);
            {
                let mut resources = page.resources();
                resources.fonts().pair(FONT_NAME, font_refs.type0);
                resources.x_objects().pair(IMAGE_NAME, image_id);
            }
            page.finish();
            page_ids.push(page_id);

            records.push(PageRecord {
                page: i + 1,
                header: header.iter().map(|s| s.to_string()).collect(),
                category: row.category.clone(),
                left_value: row.left_value,
                right_value: row.right_value,
                diff_pct: diff_percent(row)?,
                envelope,
                fallback_envelope,
            });
        }

        self.write_font(&mut pdf, &font_refs, &glyphs);

        pdf.catalog(catalog_id).pages(tree_id);
        pdf.pages(tree_id)
            .kids(page_ids.iter().copied())
            .count(page_ids.len() as i32);
        pdf.document_info(alloc.next())
            .title(TextStr(&page_cfg.title))
            .producer(TextStr("decel-report"));

        let bytes = pdf.finish();
        info!("composed {} pages, {} bytes", records.len(), bytes.len());
        Ok(ComposedReport {
            pdf: bytes,
            pages: records,
        })
    }

    /// Centered text cell on the page's top band, mirroring a full-width cell
    /// between the side margins.
    fn header_line(
        &self,
        content: &mut Content,
        line_no: usize,
        text: &str,
        glyphs: &mut BTreeMap<u16, char>,
    ) {
        let r = &self.cfg.report;
        let size = r.header_font_size;
        let cell_width = (r.page_width_mm - 2.0 * r.margin_mm) * PT_PER_MM;
        let width = self.font.text_width(text, size);
        let x = r.margin_mm * PT_PER_MM + (cell_width - width) / 2.0;

        let cell_top = r.margin_mm + r.header_line_height_mm * line_no as f32;
        let baseline_mm = cell_top + r.header_line_height_mm / 2.0 + 0.3 * size / PT_PER_MM;
        let y = (r.page_height_mm - baseline_mm) * PT_PER_MM;

        let mut encoded = Vec::with_capacity(text.len() * 2);
        for ch in text.chars() {
            let gid = self.font.glyph_id(ch);
            glyphs.entry(gid).or_insert(ch);
            encoded.extend_from_slice(&gid.to_be_bytes());
        }

        content.begin_text();
        content.set_font(FONT_NAME, size);
        content.next_line(x, y);
        content.show(Str(&encoded));
        content.end_text();
    }

    fn place_image(&self, content: &mut Content, px_width: u32, px_height: u32) {
        let r = &self.cfg.report;
        let w = r.image_width_mm * PT_PER_MM;
        let h = w * px_height as f32 / px_width as f32;
        let x = r.image_x_mm * PT_PER_MM;
        let y = r.page_height_mm * PT_PER_MM - r.image_y_mm * PT_PER_MM - h;

        content.save_state();
        content.transform([w, 0.0, 0.0, h, x, y]);
        content.x_object(IMAGE_NAME);
        content.restore_state();
    }

    fn write_font(&self, pdf: &mut Pdf, refs: &FontRefs, glyphs: &BTreeMap<u16, char>) {
        let metrics = self.font.vertical_metrics();

        pdf.type0_font(refs.type0)
            .base_font(BASE_FONT)
            .encoding_predefined(Name(b"Identity-H"))
            .descendant_font(refs.cid)
            .to_unicode(refs.to_unicode);

        let mut cid = pdf.cid_font(refs.cid);
        cid.subtype(CidFontType::Type2);
        cid.base_font(BASE_FONT);
        cid.system_info(SystemInfo {
            registry: Str(b"Adobe"),
            ordering: Str(b"Identity"),
            supplement: 0,
        });
        cid.font_descriptor(refs.descriptor);
        cid.default_width(0.0);
        cid.cid_to_gid_map_predefined(Name(b"Identity"));
        {
            let mut widths = cid.widths();
            for &gid in glyphs.keys() {
                widths.consecutive(gid, [self.font.advance(gid)]);
            }
        }
        cid.finish();

        pdf.font_descriptor(refs.descriptor)
            .name(BASE_FONT)
            .flags(FontFlags::NON_SYMBOLIC)
            .bbox(Rect::new(0.0, metrics.descent, 1000.0, metrics.ascent))
            .italic_angle(0.0)
            .ascent(metrics.ascent)
            .descent(metrics.descent)
            .cap_height(metrics.ascent * 0.7)
            .stem_v(80.0)
            .font_file2(refs.file);

        let cmap = to_unicode_cmap(glyphs);
        pdf.stream(refs.to_unicode, cmap.as_bytes());

        let data = self.font.data();
        let compressed = miniz_oxide::deflate::compress_to_vec_zlib(data, 6);
        let mut file = pdf.stream(refs.file, &compressed);
        file.filter(Filter::FlateDecode);
        file.pair(Name(b"Length1"), data.len() as i32);
        file.finish();
    }
}

struct DecodedImage {
    width: u32,
    height: u32,
    rgb: Vec<u8>,
}

fn decode_png(png_bytes: &[u8]) -> Result<DecodedImage, ReportError> {
    let decoder = png::Decoder::new(Cursor::new(png_bytes));
    let mut reader = decoder.read_info().map_err(ReportError::image)?;
    let mut buf = vec![0; reader.output_buffer_size()];
    let info = reader.next_frame(&mut buf).map_err(ReportError::image)?;
    let bytes = &buf[..info.buffer_size()];

    if info.bit_depth != png::BitDepth::Eight {
        return Err(ReportError::Image(format!(
            "unsupported bit depth {:?}",
            info.bit_depth
        )));
    }
    let rgb = match info.color_type {
        png::ColorType::Rgb => bytes.to_vec(),
        png::ColorType::Rgba => bytes
            .chunks_exact(4)
            .flat_map(|p| [p[0], p[1], p[2]])
            .collect(),
        other => {
            return Err(ReportError::Image(format!(
                "unsupported color type {other:?}"
            )));
        }
    };

    Ok(DecodedImage {
        width: info.width,
        height: info.height,
        rgb,
    })
}

fn write_image(pdf: &mut Pdf, id: Ref, image: &DecodedImage) {
    let compressed = miniz_oxide::deflate::compress_to_vec_zlib(&image.rgb, 6);
    let mut xobj = pdf.image_xobject(id, &compressed);
    xobj.filter(Filter::FlateDecode);
    xobj.width(image.width as i32);
    xobj.height(image.height as i32);
    xobj.color_space().device_rgb();
    xobj.bits_per_component(8);
}

fn to_unicode_cmap(glyphs: &BTreeMap<u16, char>) -> String {
    let mut cmap = String::from(
        "/CIDInit /ProcSet findresource begin\n\
         12 dict begin\n\
         begincmap\n\
         /CIDSystemInfo << /Registry (Adobe) /Ordering (UCS) /Supplement 0 >> def\n\
         /CMapName /Adobe-Identity-UCS def\n\
         /CMapType 2 def\n\
         1 begincodespacerange\n<0000> <FFFF>\nendcodespacerange\n",
    );

    let entries: Vec<(&u16, &char)> = glyphs.iter().collect();
    for block in entries.chunks(100) {
        cmap.push_str(&format!("{} beginbfchar\n", block.len()));
        for (gid, ch) in block {
            let mut units = [0u16; 2];
            let hex: String = ch
                .encode_utf16(&mut units)
                .iter()
                .map(|u| format!("{u:04X}"))
                .collect();
            cmap.push_str(&format!("<{gid:04X}> <{hex}>\n"));
        }
        cmap.push_str("endbfchar\n");
    }

    cmap.push_str(
        "endcmap\n\
         CMapName currentdict /CIDInit /ProcSet findresource /CMap defineresource pop\n\
         end\n\
         end\n",
    );
    cmap
}
