//! PDF rendering: a tier distribution table followed by per-query detail
//! tables, laid out as fixed-width text on A4 pages.
//!
//! Rendering happens in two steps. [`layout`] turns summaries into
//! paginated [`Line`]s (pure, easy to inspect); [`to_pdf`] writes those
//! lines into a PDF document with `lopdf`, embedding the [`ReportFont`].
//! Line widths are measured with the font's own advances, so wide glyphs
//! (CJK) take two columns. Nothing time- or environment-dependent is
//! written, so output is byte-stable.

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream, StringFormat};

use super::font::{CidMap, Metrics, ReportFont};
use super::{check, EXPORT_CONTENT_CHARS};
use crate::aggregate::QuerySummary;
use crate::dedupe::truncate_chars;
use crate::error::ExportError;
use crate::tier::tier_index;
use crate::window::RecordFilter;

const PAGE_WIDTH: i64 = 595;
const PAGE_HEIGHT: i64 = 842;
const MARGIN: i64 = 40;
const FONT_SIZE: i64 = 8;
const TITLE_SIZE: i64 = 13;
const LEADING: i64 = 12;
/// Stroke width of the fill-and-stroke text used for bold lines.
const BOLD_STROKE: f32 = 0.3;

const TIER_LABEL_WIDTH: usize = 11;
const INDEX_WIDTH: usize = 5;
const SOURCE_WIDTH: usize = 18;
const SCORE_WIDTH: usize = 6;
/// Narrowest body a wrapped row is given, whatever its prefix.
const MIN_BODY_COLUMNS: usize = 16;

/// Report rendering options.
#[derive(Debug, Clone)]
pub struct PdfOptions {
    pub title: String,
    /// Body lines per page, excluding the footer.
    pub lines_per_page: usize,
    pub font: ReportFont,
}

impl Default for PdfOptions {
    fn default() -> Self {
        Self {
            title: "Low relevance results report".to_string(),
            lines_per_page: 60,
            font: ReportFont::builtin(),
        }
    }
}

/// One line of laid-out report text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line {
    Title(String),
    Heading(String),
    Text(String),
    /// Column header of a table.
    TableHeader(String),
    /// Tier distribution row (first line of a tier).
    TierRow(String),
    /// First line of one detail record.
    RecordRow(String),
    /// Wrapped remainder of the previous row.
    Continuation(String),
    /// First line of a row repeated at the top of a page the row spills onto.
    Carried(String),
    Blank,
}

impl Line {
    fn text(&self) -> &str {
        match self {
            Line::Title(t)
            | Line::Heading(t)
            | Line::Text(t)
            | Line::TableHeader(t)
            | Line::TierRow(t)
            | Line::RecordRow(t)
            | Line::Continuation(t)
            | Line::Carried(t) => t,
            Line::Blank => "",
        }
    }
}

/// Paginated report text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfLayout {
    pub pages: Vec<Vec<Line>>,
}

impl PdfLayout {
    pub fn lines(&self) -> impl Iterator<Item = &Line> {
        self.pages.iter().flatten()
    }

    /// Number of detail rows, one per record.
    pub fn record_rows(&self) -> usize {
        self.lines()
            .filter(|l| matches!(l, Line::RecordRow(_)))
            .count()
    }
}

/// Column measurement for one font at body size.
struct Measure<'a> {
    metrics: Metrics<'a>,
    /// Columns that fit between the margins.
    line: usize,
}

impl<'a> Measure<'a> {
    fn new(metrics: Metrics<'a>) -> Self {
        let cell = (FONT_SIZE * metrics.cell_width()).max(1);
        let line = ((PAGE_WIDTH - 2 * MARGIN) * 1000 / cell) as usize;
        Self { metrics, line }
    }

    fn columns(&self, text: &str) -> usize {
        text.chars().map(|c| self.metrics.columns(c)).sum()
    }
}

/// Lay the report out into pages of text lines.
pub fn layout(
    summaries: &[QuerySummary],
    filter: &RecordFilter,
    options: &PdfOptions,
) -> Result<PdfLayout, ExportError> {
    check(summaries)?;
    let measure = Measure::new(options.font.metrics()?);

    let mut lines = vec![
        Line::Title(options.title.clone()),
        Line::Text(format!("Filters: {}", filter.describe())),
        Line::Text(format!(
            "Queries: {}    Records: {} (duplicates removed)",
            summaries.len(),
            super::row_count(summaries)
        )),
        Line::Blank,
    ];

    lines.push(Line::Heading("Relevance tier distribution".to_string()));
    lines.push(Line::TableHeader(format!(
        "{:<width$} Queries",
        "Tier",
        width = TIER_LABEL_WIDTH
    )));
    let all_details: Vec<_> = summaries
        .iter()
        .flat_map(|s| s.details.iter().cloned())
        .collect();
    for bucket in tier_index(&all_details) {
        let queries = if bucket.queries.is_empty() {
            "-".to_string()
        } else {
            bucket.queries.join(", ")
        };
        push_wrapped(
            &mut lines,
            &measure,
            &format!("{:<width$}", bucket.label, width = TIER_LABEL_WIDTH),
            &queries,
            Line::TierRow,
        );
    }
    lines.push(Line::Blank);

    lines.push(Line::Heading("Details by query".to_string()));
    for summary in summaries.iter().filter(|s| !s.details.is_empty()) {
        lines.push(Line::Blank);
        push_wrapped(
            &mut lines,
            &measure,
            "",
            &format!(
                "{} ({} records, avg {:.4})",
                summary.query, summary.count, summary.avg_score
            ),
            Line::Heading,
        );
        lines.push(Line::TableHeader(format!(
            "{:>iw$} {:<sw$} {:>cw$} Content",
            "Index",
            "Task",
            "Score",
            iw = INDEX_WIDTH,
            sw = SOURCE_WIDTH,
            cw = SCORE_WIDTH
        )));
        for record in &summary.details {
            let prefix = format!(
                "{:>iw$} {:<sw$} {:>cw$.4}",
                record.original_index,
                truncate_chars(&record.source_id, SOURCE_WIDTH),
                record.score,
                iw = INDEX_WIDTH,
                sw = SOURCE_WIDTH,
                cw = SCORE_WIDTH
            );
            let content = record
                .content
                .as_deref()
                .map(|c| truncate_chars(c, EXPORT_CONTENT_CHARS))
                .unwrap_or("");
            push_wrapped(
                &mut lines,
                &measure,
                &format!("{} ", prefix),
                content,
                Line::RecordRow,
            );
        }
    }

    Ok(paginate(lines, options.lines_per_page.max(1)))
}

/// Render summaries into a complete PDF document.
pub fn to_pdf(
    summaries: &[QuerySummary],
    filter: &RecordFilter,
    options: &PdfOptions,
) -> Result<Vec<u8>, ExportError> {
    let layout = layout(summaries, filter, options)?;
    render(&layout, &options.font)
}

fn render(layout: &PdfLayout, font: &ReportFont) -> Result<Vec<u8>, ExportError> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    // filled in once every page has been encoded and the font knows its CIDs
    let resources_id = doc.new_object_id();
    let mut cids = CidMap::default();

    let page_count = layout.pages.len();
    let mut kids: Vec<Object> = Vec::with_capacity(page_count);

    for (i, page) in layout.pages.iter().enumerate() {
        let mut ops = vec![
            Operation::new("w", vec![Object::Real(BOLD_STROKE)]),
            Operation::new("BT", vec![]),
            Operation::new("TL", vec![Object::Integer(LEADING)]),
            Operation::new(
                "Td",
                vec![
                    Object::Integer(MARGIN),
                    Object::Integer(PAGE_HEIGHT - MARGIN),
                ],
            ),
        ];
        for line in page {
            let (size, bold) = match line {
                Line::Title(_) => (TITLE_SIZE, true),
                Line::Heading(_) | Line::TableHeader(_) => (FONT_SIZE, true),
                _ => (FONT_SIZE, false),
            };
            ops.push(font_op(size));
            ops.push(Operation::new("Tr", vec![Object::Integer(if bold { 2 } else { 0 })]));
            ops.push(text_op(&mut cids, line.text())?);
            ops.push(Operation::new("T*", vec![]));
        }
        ops.push(Operation::new("ET", vec![]));

        // footer
        ops.push(Operation::new("BT", vec![]));
        ops.push(font_op(FONT_SIZE));
        ops.push(Operation::new("Tr", vec![Object::Integer(0)]));
        ops.push(Operation::new(
            "Td",
            vec![Object::Integer(MARGIN), Object::Integer(MARGIN / 2)],
        ));
        ops.push(text_op(&mut cids, &format!("Page {} / {}", i + 1, page_count))?);
        ops.push(Operation::new("ET", vec![]));

        let content = Content { operations: ops }
            .encode()
            .map_err(|e| ExportError::Pdf(e.to_string()))?;
        let content_id = doc.add_object(Stream::new(dictionary! {}, content));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let font_id = font.embed(&mut doc, &cids)?;
    doc.objects.insert(
        resources_id,
        Object::Dictionary(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        }),
    );

    let pages = dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => Object::Integer(page_count as i64),
        "Resources" => resources_id,
        "MediaBox" => vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Integer(PAGE_WIDTH),
            Object::Integer(PAGE_HEIGHT),
        ],
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages));

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut out = Vec::new();
    doc.save_to(&mut out)
        .map_err(|e| ExportError::Pdf(e.to_string()))?;
    Ok(out)
}

fn font_op(size: i64) -> Operation {
    Operation::new(
        "Tf",
        vec![Object::Name(b"F1".to_vec()), Object::Integer(size)],
    )
}

fn text_op(cids: &mut CidMap, text: &str) -> Result<Operation, ExportError> {
    Ok(Operation::new(
        "Tj",
        vec![Object::String(cids.encode(text)?, StringFormat::Hexadecimal)],
    ))
}

/// Append `prefix + body`, wrapping `body` to the page width. The first line
/// is built with `first`; wrapped lines are indented under the body.
fn push_wrapped(
    lines: &mut Vec<Line>,
    measure: &Measure<'_>,
    prefix: &str,
    body: &str,
    first: fn(String) -> Line,
) {
    let indent = measure.columns(prefix);
    let width = measure.line.saturating_sub(indent).max(MIN_BODY_COLUMNS);
    let flat: String = body
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect();

    let mut chunks = wrap(&flat, width, |c| measure.metrics.columns(c)).into_iter();
    let head = chunks.next().unwrap_or_default();
    lines.push(first(format!("{}{}", prefix, head)));
    for chunk in chunks {
        lines.push(Line::Continuation(format!("{}{}", " ".repeat(indent), chunk)));
    }
}

/// Break text into pieces at most `width` columns wide, preferring spaces.
fn wrap(text: &str, width: usize, columns: impl Fn(char) -> usize) -> Vec<String> {
    let mut out = Vec::new();
    let mut rest: Vec<char> = text.trim_end().chars().collect();

    loop {
        let mut used = 0;
        let fit = rest
            .iter()
            .take_while(|c| {
                used += columns(**c);
                used <= width
            })
            .count();
        if fit == rest.len() {
            break;
        }

        let fit = fit.max(1);
        let cut = rest[..=fit]
            .iter()
            .rposition(|c| *c == ' ')
            .filter(|&p| p > 0)
            .unwrap_or(fit);
        out.push(rest[..cut].iter().collect::<String>().trim_end().to_string());
        let skip = if rest.get(cut) == Some(&' ') { cut + 1 } else { cut };
        rest.drain(..skip);
    }
    out.push(rest.into_iter().collect());
    out
}

/// Split lines into pages. A row that breaks across pages moves whole to the
/// next page when it fits there; a row longer than a page is split and its
/// first line is repeated as [`Line::Carried`] on the following page. No
/// page ever starts with a bare [`Line::Continuation`].
fn paginate(lines: Vec<Line>, per_page: usize) -> PdfLayout {
    let mut pages: Vec<Vec<Line>> = Vec::new();
    let mut current: Vec<Line> = Vec::with_capacity(per_page);
    let mut row_head = String::new();

    for line in lines {
        if current.len() >= per_page {
            let mut carried = Vec::new();
            if matches!(line, Line::Continuation(_)) {
                let start = current
                    .iter()
                    .rposition(|l| !matches!(l, Line::Continuation(_)));
                match start {
                    Some(start) if start > 0 => carried = current.split_off(start),
                    _ => carried.push(Line::Carried(row_head.clone())),
                }
            }
            pages.push(std::mem::take(&mut current));
            current = carried;
        }
        if !matches!(line, Line::Continuation(_)) {
            row_head = line.text().to_string();
        }
        current.push(line);
    }
    if !current.is_empty() || pages.is_empty() {
        pages.push(current);
    }

    PdfLayout { pages }
}
