//! Positioned text extraction and reading-order line assembly.
//!
//! Spans are decoded straight from page content streams with the font's
//! encoding, then grouped into lines per detected column.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use lopdf::{Dictionary, Document as LopdfDocument, Object, ObjectId, Stream};

use crate::error::{Error, Result};

use super::rulings::Matrix;

/// Word-space threshold for TJ adjustments, in thousandths of text space.
const TJ_SPACE_THRESHOLD: f32 = 200.0;

/// A text span with position and font information.
#[derive(Debug, Clone, PartialEq)]
pub struct TextSpan {
    /// The text content
    pub text: String,
    /// X position (left edge)
    pub x: f32,
    /// Y position (baseline)
    pub y: f32,
    /// Estimated advance width
    pub width: f32,
    /// Font size in points
    pub font_size: f32,
    /// Font name (e.g., "Helvetica-Bold")
    pub font_name: String,
}

impl TextSpan {
    /// Create a new text span; width is estimated from the glyph count.
    pub fn new(text: String, x: f32, y: f32, font_size: f32, font_name: String) -> Self {
        let width = text.chars().count() as f32 * font_size * 0.5;
        Self {
            text,
            x,
            y,
            width,
            font_size,
            font_name,
        }
    }

    /// Approximate visual center, used to place spans inside table cells.
    pub fn center(&self) -> (f32, f32) {
        (self.x + self.width / 2.0, self.y + self.font_size * 0.3)
    }
}

/// Spans sharing a baseline, sorted left to right.
#[derive(Debug, Clone)]
pub struct TextLine {
    pub spans: Vec<TextSpan>,
    /// Y position (baseline)
    pub y: f32,
}

impl TextLine {
    /// Create a new text line from spans.
    pub fn from_spans(mut spans: Vec<TextSpan>) -> Self {
        spans.sort_by(|a, b| a.x.partial_cmp(&b.x).unwrap_or(Ordering::Equal));
        let y = spans.first().map(|s| s.y).unwrap_or(0.0);
        Self { spans, y }
    }

    /// Combined text of all spans, with spaces inserted at visible gaps.
    ///
    /// No space goes between two characters of a spaceless script.
    pub fn text(&self) -> String {
        let mut result = String::new();

        for (i, span) in self.spans.iter().enumerate() {
            if i > 0 {
                let prev = &self.spans[i - 1];
                let gap = span.x - (prev.x + prev.width);

                let char_count = span.text.chars().count();
                let avg_char_width = if char_count > 0 && span.width > 0.0 {
                    span.width / char_count as f32
                } else {
                    span.font_size * 0.5
                };

                let joins_spaceless = prev.text.chars().last().is_some_and(is_spaceless_script_char)
                    && span.text.chars().next().is_some_and(is_spaceless_script_char);
                let has_space = ends_with_space(&prev.text) || starts_with_space(&span.text);

                if gap > avg_char_width * 0.2 && !joins_spaceless && !has_space {
                    result.push(' ');
                }
            }
            result.push_str(&span.text);
        }

        result
    }
}

/// A column of a multi-column page.
#[derive(Debug, Clone)]
pub struct Column {
    pub left: f32,
    pub right: f32,
}

impl Column {
    fn contains(&self, x: f32) -> bool {
        x >= self.left && x <= self.right
    }

    /// A span belongs to a column if its left edge or center lies inside.
    pub fn contains_span(&self, span: &TextSpan) -> bool {
        self.contains(span.x) || self.contains(span.x + span.width / 2.0)
    }
}

/// Extracts positioned spans from the pages of a lopdf document.
pub struct LayoutAnalyzer<'a> {
    doc: &'a LopdfDocument,
}

impl<'a> LayoutAnalyzer<'a> {
    pub fn new(doc: &'a LopdfDocument) -> Self {
        Self { doc }
    }

    /// Extract text spans from a page with position and font information.
    pub fn extract_page_spans(&self, page_id: ObjectId) -> Result<Vec<TextSpan>> {
        let fonts = self
            .doc
            .get_page_fonts(page_id)
            .map_err(|e| Error::PdfParse(e.to_string()))?;

        let content = page_content(self.doc, page_id)?;
        self.parse_content_stream(&content, &fonts)
    }

    fn parse_content_stream(
        &self,
        content: &[u8],
        fonts: &BTreeMap<Vec<u8>, &'a Dictionary>,
    ) -> Result<Vec<TextSpan>> {
        let content =
            lopdf::content::Content::decode(content).map_err(|e| Error::PdfParse(e.to_string()))?;

        let mut spans = Vec::new();
        let mut font = ActiveFont {
            size: 12.0,
            ..ActiveFont::default()
        };
        let mut matrix = TextMatrix::default();
        let mut ctm = Matrix::IDENTITY;
        let mut saved: Vec<Matrix> = Vec::new();
        let mut in_text = false;

        for op in &content.operations {
            let operands = &op.operands;
            match op.operator.as_str() {
                "q" => saved.push(ctm),
                "Q" => ctm = saved.pop().unwrap_or(Matrix::IDENTITY),
                "cm" if operands.len() >= 6 => {
                    let n: Vec<f32> = operands.iter().map(|o| get_number(o).unwrap_or(0.0)).collect();
                    ctm = ctm.pre_multiply([n[0], n[1], n[2], n[3], n[4], n[5]]);
                }
                "BT" => {
                    in_text = true;
                    matrix = TextMatrix {
                        leading: matrix.leading,
                        ..TextMatrix::default()
                    };
                }
                "ET" => in_text = false,
                "Tf" if operands.len() >= 2 => {
                    if let Object::Name(resource) = &operands[0] {
                        font = ActiveFont::resolve(self.doc, fonts, resource);
                    }
                    font.size = get_number(&operands[1]).unwrap_or(12.0);
                }
                "TL" => {
                    if let Some(leading) = operands.first().and_then(get_number) {
                        matrix.leading = leading;
                    }
                }
                "Td" | "TD" if operands.len() >= 2 => {
                    let tx = get_number(&operands[0]).unwrap_or(0.0);
                    let ty = get_number(&operands[1]).unwrap_or(0.0);
                    if op.operator == "TD" {
                        matrix.leading = -ty;
                    }
                    matrix.translate(tx, ty);
                }
                "Tm" if operands.len() >= 6 => {
                    let n: Vec<f32> = operands.iter().map(|o| get_number(o).unwrap_or(0.0)).collect();
                    matrix.set(n[0], n[1], n[2], n[3], n[4], n[5]);
                }
                "T*" => matrix.next_line(),
                "Tj" if in_text => {
                    if let Some(Object::String(bytes, _)) = operands.first() {
                        push_span(&mut spans, font.decode(bytes), &matrix, &ctm, &font);
                    }
                }
                "TJ" if in_text => {
                    if let Some(Object::Array(items)) = operands.first() {
                        push_span(&mut spans, font.decode_array(items), &matrix, &ctm, &font);
                    }
                }
                "'" | "\"" => {
                    matrix.next_line();
                    let index = if op.operator == "\"" { 2 } else { 0 };
                    if let (true, Some(Object::String(bytes, _))) = (in_text, operands.get(index)) {
                        push_span(&mut spans, font.decode(bytes), &matrix, &ctm, &font);
                    }
                }
                _ => {}
            }
        }

        Ok(spans)
    }
}

/// Record a span at the text-space origin mapped into page space (`Tm × CTM`).
fn push_span(spans: &mut Vec<TextSpan>, text: String, matrix: &TextMatrix, ctm: &Matrix, font: &ActiveFont) {
    if text.trim().is_empty() {
        return;
    }
    let (tx, ty) = matrix.position();
    let (x, y) = ctm.apply(tx, ty);
    spans.push(TextSpan::new(
        text,
        x,
        y,
        font.size * matrix.scale() * ctm.vertical_scale(),
        font.name.clone(),
    ));
}

/// Font selected by the last `Tf`.
#[derive(Default)]
struct ActiveFont<'a> {
    name: String,
    size: f32,
    font: Option<(&'a LopdfDocument, &'a Dictionary)>,
}

impl<'a> ActiveFont<'a> {
    fn resolve(
        doc: &'a LopdfDocument,
        fonts: &BTreeMap<Vec<u8>, &'a Dictionary>,
        resource: &[u8],
    ) -> Self {
        let dict = fonts.get(resource).copied();
        let name = dict
            .and_then(|f| f.get(b"BaseFont").ok())
            .and_then(|o| o.as_name().ok())
            .map(|n| String::from_utf8_lossy(n).to_string())
            .unwrap_or_else(|| String::from_utf8_lossy(resource).to_string());

        Self {
            name,
            size: 12.0,
            font: dict.map(|d| (doc, d)),
        }
    }

    fn decode(&self, bytes: &[u8]) -> String {
        let encoding = self
            .font
            .and_then(|(doc, dict)| dict.get_font_encoding(doc).ok());
        match encoding {
            Some(enc) => LopdfDocument::decode_text(&enc, bytes).unwrap_or_default(),
            None => decode_text_simple(bytes),
        }
    }

    /// Decode a TJ array; large negative adjustments become word spaces.
    fn decode_array(&self, items: &[Object]) -> String {
        let mut combined = String::new();
        for item in items {
            let adjustment = match item {
                Object::String(bytes, _) => {
                    combined.push_str(&self.decode(bytes));
                    continue;
                }
                Object::Integer(n) => -(*n as f32),
                Object::Real(n) => -*n,
                _ => continue,
            };
            let needs_space = adjustment > TJ_SPACE_THRESHOLD
                && !ends_with_space(&combined)
                && combined
                    .chars()
                    .last()
                    .is_some_and(|c| !is_spaceless_script_char(c));
            if needs_space {
                combined.push(' ');
            }
        }
        combined
    }
}

/// Concatenated, decompressed content streams of a page.
pub(crate) fn page_content(doc: &LopdfDocument, page_id: ObjectId) -> Result<Vec<u8>> {
    let page_dict = doc
        .get_dictionary(page_id)
        .map_err(|e| Error::PdfParse(e.to_string()))?;

    let contents = match page_dict.get(b"Contents") {
        Ok(contents) => contents,
        // A page without contents is blank, not broken
        Err(_) => return Ok(Vec::new()),
    };

    match contents {
        Object::Reference(r) => match doc.get_object(*r) {
            Ok(Object::Stream(s)) => stream_bytes(s),
            Ok(Object::Array(arr)) => Ok(concat_streams(doc, arr)),
            _ => Err(Error::PdfParse("Invalid content stream".to_string())),
        },
        Object::Array(arr) => Ok(concat_streams(doc, arr)),
        Object::Stream(s) => stream_bytes(s),
        _ => Err(Error::PdfParse("Invalid content stream".to_string())),
    }
}

fn stream_bytes(stream: &Stream) -> Result<Vec<u8>> {
    if stream.dict.get(b"Filter").is_err() {
        return Ok(stream.content.clone());
    }
    stream
        .decompressed_content()
        .map_err(|e| Error::PdfParse(e.to_string()))
}

fn concat_streams(doc: &LopdfDocument, refs: &[Object]) -> Vec<u8> {
    let mut content = Vec::new();
    for obj in refs {
        if let Object::Reference(r) = obj {
            if let Ok(Object::Stream(s)) = doc.get_object(*r) {
                match stream_bytes(s) {
                    Ok(data) => {
                        content.extend_from_slice(&data);
                        content.push(b' ');
                    }
                    Err(e) => log::warn!("Skipping unreadable content stream {:?}: {}", r, e),
                }
            }
        }
    }
    content
}

/// Group spans into reading-order lines, respecting column boundaries.
///
/// Lines on the same baseline in different columns stay separate and are
/// ordered top to bottom, then left to right.
pub fn group_into_lines(spans: Vec<TextSpan>) -> Vec<TextLine> {
    if spans.is_empty() {
        return vec![];
    }

    let columns = detect_columns(&spans);
    if columns.len() <= 1 {
        return group_single_column(spans);
    }

    let mut column_spans: Vec<Vec<TextSpan>> = vec![Vec::new(); columns.len()];
    for span in spans {
        let idx = columns
            .iter()
            .position(|c| c.contains_span(&span))
            .unwrap_or(0);
        column_spans[idx].push(span);
    }

    let mut all_lines: Vec<(usize, TextLine)> = column_spans
        .into_iter()
        .enumerate()
        .flat_map(|(idx, spans)| group_single_column(spans).into_iter().map(move |l| (idx, l)))
        .collect();

    all_lines.sort_by(|(col_a, a), (col_b, b)| {
        b.y.partial_cmp(&a.y)
            .unwrap_or(Ordering::Equal)
            .then(col_a.cmp(col_b))
    });

    all_lines.into_iter().map(|(_, line)| line).collect()
}

/// Plain text of a page: one line of output per text line.
pub fn spans_to_text(spans: Vec<TextSpan>) -> String {
    group_into_lines(spans)
        .iter()
        .map(TextLine::text)
        .collect::<Vec<_>>()
        .join("\n")
}

fn group_single_column(mut spans: Vec<TextSpan>) -> Vec<TextLine> {
    // PDF y grows upward, so sort descending for top-to-bottom order
    spans.sort_by(|a, b| {
        b.y.partial_cmp(&a.y)
            .unwrap_or(Ordering::Equal)
            .then(a.x.partial_cmp(&b.x).unwrap_or(Ordering::Equal))
    });

    let mut lines = Vec::new();
    let mut current: Vec<TextSpan> = Vec::new();
    let mut current_y: Option<f32> = None;

    for span in spans {
        let tolerance = span.font_size * 0.3;
        match current_y {
            Some(y) if (span.y - y).abs() <= tolerance => current.push(span),
            _ => {
                if !current.is_empty() {
                    lines.push(TextLine::from_spans(std::mem::take(&mut current)));
                }
                current_y = Some(span.y);
                current.push(span);
            }
        }
    }
    if !current.is_empty() {
        lines.push(TextLine::from_spans(current));
    }

    lines
}

/// Find a two-column split from the widest vertical gutter near the page center.
fn detect_columns(spans: &[TextSpan]) -> Vec<Column> {
    let min_x = spans.iter().map(|s| s.x).fold(f32::MAX, f32::min);
    let max_x = spans.iter().map(|s| s.x + s.width).fold(f32::MIN, f32::max);
    let single = vec![Column {
        left: min_x - 10.0,
        right: max_x + 10.0,
    }];

    let page_width = max_x - min_x;
    if page_width < 250.0 {
        return single;
    }

    let slice_width = 3.0;
    let num_slices = (page_width / slice_width) as usize + 1;
    let mut occupancy = vec![0usize; num_slices];
    for span in spans {
        let start = ((span.x - min_x) / slice_width) as usize;
        let end = ((span.x + span.width - min_x) / slice_width) as usize;
        for slot in occupancy
            .iter_mut()
            .take(end.min(num_slices - 1) + 1)
            .skip(start)
        {
            *slot += 1;
        }
    }

    // Search the middle 70% of the page for empty runs
    let search_start = num_slices * 15 / 100;
    let search_end = num_slices * 85 / 100;
    let center = (num_slices / 2) as f32;

    let mut best: Option<(usize, usize)> = None;
    let mut best_dist = f32::MAX;
    let mut run_start = 0;
    let mut run_len = 0;

    let mut consider = |start: usize, len: usize, best: &mut Option<(usize, usize)>| {
        let width = len as f32 * slice_width;
        if width < 10.0 {
            return;
        }
        let dist = ((start + len / 2) as f32 - center).abs();
        let best_width = best.map(|(_, l)| l as f32 * slice_width).unwrap_or(0.0);
        if width > best_width * 1.5 || (width >= best_width * 0.7 && dist < best_dist) {
            *best = Some((start, len));
            best_dist = dist;
        }
    };

    for (i, &count) in occupancy
        .iter()
        .enumerate()
        .take(search_end)
        .skip(search_start)
    {
        if count == 0 {
            if run_len == 0 {
                run_start = i;
            }
            run_len += 1;
        } else {
            if run_len > 0 {
                consider(run_start, run_len, &mut best);
            }
            run_len = 0;
        }
    }
    if run_len > 0 {
        consider(run_start, run_len, &mut best);
    }

    let Some((gap_start, gap_len)) = best else {
        return single;
    };
    if gap_len as f32 * slice_width < 12.0 {
        return single;
    }

    let gutter = min_x + (gap_start as f32 + gap_len as f32 / 2.0) * slice_width;
    if gutter - min_x < 80.0 || max_x - gutter < 80.0 {
        return single;
    }

    let left = spans
        .iter()
        .filter(|s| s.x + s.width / 2.0 < gutter)
        .count();
    let right = spans.len() - left;
    let min_spans = (spans.len() / 10).max(2);
    if left < min_spans || right < min_spans {
        log::debug!("Column split rejected: {} left, {} right spans", left, right);
        return single;
    }

    log::debug!("Two-column layout, gutter at x={:.1}", gutter);
    vec![
        Column {
            left: min_x - 10.0,
            right: gutter,
        },
        Column {
            left: gutter,
            right: max_x + 10.0,
        },
    ]
}

/// Text matrix for tracking position in a content stream.
#[derive(Debug, Clone)]
struct TextMatrix {
    a: f32,
    b: f32,
    c: f32,
    d: f32,
    e: f32,
    f: f32,
    leading: f32,
}

impl Default for TextMatrix {
    fn default() -> Self {
        Self {
            a: 1.0,
            b: 0.0,
            c: 0.0,
            d: 1.0,
            e: 0.0,
            f: 0.0,
            leading: 12.0,
        }
    }
}

impl TextMatrix {
    fn set(&mut self, a: f32, b: f32, c: f32, d: f32, e: f32, f: f32) {
        self.a = a;
        self.b = b;
        self.c = c;
        self.d = d;
        self.e = e;
        self.f = f;
    }

    fn translate(&mut self, tx: f32, ty: f32) {
        self.e += tx * self.a + ty * self.c;
        self.f += tx * self.b + ty * self.d;
    }

    fn next_line(&mut self) {
        self.translate(0.0, -self.leading);
    }

    fn position(&self) -> (f32, f32) {
        (self.e, self.f)
    }

    fn scale(&self) -> f32 {
        (self.a * self.a + self.c * self.c).sqrt()
    }
}

pub(crate) fn get_number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}

fn ends_with_space(s: &str) -> bool {
    s.ends_with(' ') || s.ends_with('\u{00A0}')
}

fn starts_with_space(s: &str) -> bool {
    s.starts_with(' ') || s.starts_with('\u{00A0}')
}

/// Scripts written without word spaces (Han, kana, CJK punctuation).
/// Hangul is excluded: Korean uses word spaces.
fn is_spaceless_script_char(c: char) -> bool {
    let code = c as u32;
    (0x4E00..=0x9FFF).contains(&code)
        || (0x3400..=0x4DBF).contains(&code)
        || (0x20000..=0x2EBEF).contains(&code)
        || (0x3040..=0x30FF).contains(&code)
        || (0x3000..=0x303F).contains(&code)
}

/// Fallback decoding when a font has no usable encoding:
/// UTF-16BE with BOM, then UTF-8, then Latin-1.
pub(crate) fn decode_text_simple(bytes: &[u8]) -> String {
    if let [0xFE, 0xFF, rest @ ..] = bytes {
        let utf16: Vec<u16> = rest
            .chunks_exact(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect();
        return String::from_utf16_lossy(&utf16);
    }

    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}
