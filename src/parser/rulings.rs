//! Ruling-line extraction from page content streams.
//!
//! Painted path segments that are horizontal or vertical become rulings,
//! the raw material of lattice table detection. Coordinates are converted
//! to a top-down system (y grows downward from the top of the page).

use lopdf::content::Content;
use lopdf::Object;

use crate::error::{Error, Result};

use super::layout::get_number;

/// Segments shorter than this along both axes are ignored.
const MIN_LENGTH: f32 = 1.0;

/// Maximum drift across the main axis for a segment to count as straight.
const AXIS_TOLERANCE: f32 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Horizontal,
    Vertical,
}

/// An axis-aligned ruling in top-down page coordinates.
///
/// For horizontal rulings `top == bottom`; for vertical ones `x0 == x1`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ruling {
    pub x0: f32,
    pub top: f32,
    pub x1: f32,
    pub bottom: f32,
    pub orientation: Orientation,
}

impl Ruling {
    /// Horizontal ruling at `y` from `x0` to `x1`.
    pub fn horizontal(x0: f32, x1: f32, y: f32) -> Self {
        Self {
            x0: x0.min(x1),
            top: y,
            x1: x0.max(x1),
            bottom: y,
            orientation: Orientation::Horizontal,
        }
    }

    /// Vertical ruling at `x` from `top` to `bottom`.
    pub fn vertical(x: f32, top: f32, bottom: f32) -> Self {
        Self {
            x0: x,
            top: top.min(bottom),
            x1: x,
            bottom: top.max(bottom),
            orientation: Orientation::Vertical,
        }
    }

    fn from_segment(a: (f32, f32), b: (f32, f32)) -> Option<Self> {
        let dx = (a.0 - b.0).abs();
        let dy = (a.1 - b.1).abs();
        if dx < MIN_LENGTH && dy < MIN_LENGTH {
            return None;
        }
        if dy <= AXIS_TOLERANCE && dx >= MIN_LENGTH {
            Some(Ruling::horizontal(a.0, b.0, (a.1 + b.1) / 2.0))
        } else if dx <= AXIS_TOLERANCE && dy >= MIN_LENGTH {
            Some(Ruling::vertical((a.0 + b.0) / 2.0, a.1, b.1))
        } else {
            None
        }
    }
}

/// Affine transform `[a b c d e f]` as used by `cm`.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Matrix([f32; 6]);

impl Matrix {
    pub(crate) const IDENTITY: Matrix = Matrix([1.0, 0.0, 0.0, 1.0, 0.0, 0.0]);

    /// Concatenate `m` onto this matrix (`cm` semantics: `m × self`).
    pub(crate) fn pre_multiply(&self, m: [f32; 6]) -> Matrix {
        let [a, b, c, d, e, f] = self.0;
        Matrix([
            m[0] * a + m[1] * c,
            m[0] * b + m[1] * d,
            m[2] * a + m[3] * c,
            m[2] * b + m[3] * d,
            m[4] * a + m[5] * c + e,
            m[4] * b + m[5] * d + f,
        ])
    }

    pub(crate) fn apply(&self, x: f32, y: f32) -> (f32, f32) {
        let [a, b, c, d, e, f] = self.0;
        (a * x + c * y + e, b * x + d * y + f)
    }

    /// Length a unit vertical vector has after the transform.
    pub(crate) fn vertical_scale(&self) -> f32 {
        let [_, _, c, d, _, _] = self.0;
        (c * c + d * d).sqrt()
    }
}

/// Path under construction between painting operators.
#[derive(Default)]
struct PathBuilder {
    segments: Vec<((f32, f32), (f32, f32))>,
    current: Option<(f32, f32)>,
    start: Option<(f32, f32)>,
}

impl PathBuilder {
    fn move_to(&mut self, p: (f32, f32)) {
        self.current = Some(p);
        self.start = Some(p);
    }

    fn line_to(&mut self, p: (f32, f32)) {
        if let Some(from) = self.current {
            self.segments.push((from, p));
        }
        self.current = Some(p);
    }

    /// Curves are never rulings; only the current point moves.
    fn curve_to(&mut self, p: (f32, f32)) {
        self.current = Some(p);
    }

    fn close(&mut self) {
        if let (Some(from), Some(start)) = (self.current, self.start) {
            self.segments.push((from, start));
            self.current = Some(start);
        }
    }

    fn take(&mut self) -> Vec<((f32, f32), (f32, f32))> {
        self.current = None;
        self.start = None;
        std::mem::take(&mut self.segments)
    }
}

/// Extract rulings from decoded content-stream bytes.
pub fn rulings_from_content(content: &[u8], page_height: f32) -> Result<Vec<Ruling>> {
    let content = Content::decode(content).map_err(|e| Error::PdfParse(e.to_string()))?;

    let mut rulings = Vec::new();
    let mut ctm = Matrix::IDENTITY;
    let mut stack: Vec<Matrix> = Vec::new();
    let mut path = PathBuilder::default();

    for op in &content.operations {
        let nums: Vec<f32> = op.operands.iter().filter_map(get_number).collect();
        match op.operator.as_str() {
            "q" => stack.push(ctm),
            "Q" => ctm = stack.pop().unwrap_or(Matrix::IDENTITY),
            "cm" if nums.len() >= 6 => {
                ctm = ctm.pre_multiply([nums[0], nums[1], nums[2], nums[3], nums[4], nums[5]]);
            }
            "m" if nums.len() >= 2 => path.move_to(ctm.apply(nums[0], nums[1])),
            "l" if nums.len() >= 2 => path.line_to(ctm.apply(nums[0], nums[1])),
            "c" if nums.len() >= 6 => path.curve_to(ctm.apply(nums[4], nums[5])),
            "v" | "y" if nums.len() >= 4 => path.curve_to(ctm.apply(nums[2], nums[3])),
            "re" if nums.len() >= 4 => {
                let (x, y, w, h) = (nums[0], nums[1], nums[2], nums[3]);
                path.move_to(ctm.apply(x, y));
                path.line_to(ctm.apply(x + w, y));
                path.line_to(ctm.apply(x + w, y + h));
                path.line_to(ctm.apply(x, y + h));
                path.close();
            }
            "h" => path.close(),
            "s" | "b" | "b*" => {
                path.close();
                commit(&mut rulings, path.take(), page_height);
            }
            "S" | "f" | "F" | "f*" | "B" | "B*" => {
                commit(&mut rulings, path.take(), page_height);
            }
            "n" => {
                path.take();
            }
            _ => {}
        }
    }

    Ok(rulings)
}

fn commit(rulings: &mut Vec<Ruling>, segments: Vec<((f32, f32), (f32, f32))>, page_height: f32) {
    rulings.extend(segments.into_iter().filter_map(|(a, b)| {
        Ruling::from_segment((a.0, page_height - a.1), (b.0, page_height - b.1))
    }));
}

/// Page height from the MediaBox, defaulting to US Letter.
pub(crate) fn media_box_height(media_box: Option<&[Object]>) -> f32 {
    media_box
        .filter(|arr| arr.len() >= 4)
        .and_then(|arr| Some(get_number(&arr[3])? - get_number(&arr[1])?))
        .unwrap_or(792.0)
}
