//! 2D geometry primitives for aperture rasterisation.
//!
//! All clipping arithmetic is carried out in `f64`, even though the fluence
//! grid itself stores `f32`. Intersection areas below [`AREA_EPSILON`] are
//! treated as zero.

/// Intersection areas below this value are considered degenerate.
pub const AREA_EPSILON: f64 = 1e-12;

/// A point in the beam's eye view, in cm.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// An axis-aligned rectangle with `x0 <= x1` and `y0 <= y1`.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Rect {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

impl Rect {
    pub fn new(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self { x0, y0, x1, y1 }
    }

    pub fn width(&self) -> f64 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f64 {
        self.y1 - self.y0
    }

    pub fn is_empty(&self) -> bool {
        self.x1 <= self.x0 || self.y1 <= self.y0
    }

    /// Intersection of two rectangles, or `None` when they do not overlap.
    pub fn intersect(&self, other: &Rect) -> Option<Rect> {
        let r = Rect::new(
            self.x0.max(other.x0),
            self.y0.max(other.y0),
            self.x1.min(other.x1),
            self.y1.min(other.y1),
        );
        if r.is_empty() { None } else { Some(r) }
    }

    /// Grow the rectangle so it also covers `p`.
    pub fn expand(&mut self, p: Point) {
        self.x0 = self.x0.min(p.x);
        self.y0 = self.y0.min(p.y);
        self.x1 = self.x1.max(p.x);
        self.y1 = self.y1.max(p.y);
    }

    /// The four corners in counter-clockwise order.
    pub fn corners(&self) -> [Point; 4] {
        [
            Point::new(self.x0, self.y0),
            Point::new(self.x1, self.y0),
            Point::new(self.x1, self.y1),
            Point::new(self.x0, self.y1),
        ]
    }
}

/// A simple polygon, stored as an open vertex ring.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Polygon {
    pub vertices: Vec<Point>,
}

impl Polygon {
    pub fn new(vertices: Vec<Point>) -> Self {
        Self { vertices }
    }

    pub fn from_rect(r: &Rect) -> Self {
        Self {
            vertices: r.corners().to_vec(),
        }
    }

    pub fn clear(&mut self) {
        self.vertices.clear();
    }

    /// Rotate every vertex about the origin by `angle_deg` degrees,
    /// counter-clockwise.
    pub fn rotate_deg(&mut self, angle_deg: f64) {
        if angle_deg == 0.0 {
            return;
        }
        let (sin, cos) = angle_deg.to_radians().sin_cos();
        for v in &mut self.vertices {
            let (x, y) = (v.x, v.y);
            v.x = x * cos - y * sin;
            v.y = x * sin + y * cos;
        }
    }

    /// Axis-aligned bounding box, or `None` for an empty polygon.
    pub fn bbox(&self) -> Option<Rect> {
        let first = self.vertices.first()?;
        let mut r = Rect::new(first.x, first.y, first.x, first.y);
        for v in &self.vertices[1..] {
            r.expand(*v);
        }
        Some(r)
    }

    pub fn area(&self) -> f64 {
        signed_area(&self.vertices).abs()
    }

    /// Point-in-polygon test for convex polygons of either winding.
    /// Points on an edge count as inside.
    pub fn contains(&self, p: Point) -> bool {
        let n = self.vertices.len();
        if n < 3 {
            return false;
        }
        let orient = signed_area(&self.vertices).signum();
        if orient == 0.0 {
            return false;
        }
        for i in 0..n {
            let a = self.vertices[i];
            let b = self.vertices[(i + 1) % n];
            if orient * cross(a, b, p) < 0.0 {
                return false;
            }
        }
        true
    }
}

/// Signed area of a vertex ring; positive for counter-clockwise winding.
pub fn signed_area(vertices: &[Point]) -> f64 {
    let n = vertices.len();
    if n < 3 {
        return 0.0;
    }
    let mut sum = 0.0;
    for i in 0..n {
        let a = vertices[i];
        let b = vertices[(i + 1) % n];
        sum += a.x * b.y - b.x * a.y;
    }
    0.5 * sum
}

/// Cross product of (b - a) x (p - a).
fn cross(a: Point, b: Point, p: Point) -> f64 {
    (b.x - a.x) * (p.y - a.y) - (b.y - a.y) * (p.x - a.x)
}

/// Reusable vertex buffers for [`clip_convex`], recycled per worker to avoid
/// allocation churn in the per-cell loop.
#[derive(Clone, Debug, Default)]
pub struct ClipScratch {
    input: Vec<Point>,
    output: Vec<Point>,
}

/// Sutherland-Hodgman clipping of `subject` against the convex polygon
/// `clip`. Returns the vertices of the intersection; an empty slice when the
/// polygons do not intersect. Consecutive duplicate vertices produced by
/// collinear edges are dropped.
pub fn clip_convex<'a>(
    subject: &[Point],
    clip: &[Point],
    scratch: &'a mut ClipScratch,
) -> &'a [Point] {
    scratch.output.clear();
    if subject.len() < 3 || clip.len() < 3 {
        return &scratch.output;
    }
    scratch.output.extend_from_slice(subject);

    // Winding of the clip polygon decides which side is "inside".
    let orient = signed_area(clip).signum();
    if orient == 0.0 {
        scratch.output.clear();
        return &scratch.output;
    }

    let m = clip.len();
    for i in 0..m {
        let a = clip[i];
        let b = clip[(i + 1) % m];

        std::mem::swap(&mut scratch.input, &mut scratch.output);
        scratch.output.clear();
        if scratch.input.is_empty() {
            break;
        }

        let n = scratch.input.len();
        for j in 0..n {
            let s = scratch.input[j];
            let e = scratch.input[(j + 1) % n];
            let s_in = orient * cross(a, b, s) >= 0.0;
            let e_in = orient * cross(a, b, e) >= 0.0;
            if e_in {
                if !s_in {
                    push_vertex(&mut scratch.output, edge_intersection(a, b, s, e));
                }
                push_vertex(&mut scratch.output, e);
            } else if s_in {
                push_vertex(&mut scratch.output, edge_intersection(a, b, s, e));
            }
        }
    }

    // Close the ring: the last vertex may duplicate the first.
    while scratch.output.len() > 1 && coincident(scratch.output[0], *scratch.output.last().unwrap())
    {
        scratch.output.pop();
    }
    &scratch.output
}

/// Area of the intersection of `subject` with the convex polygon `clip`.
/// Degenerate intersections (fewer than 3 vertices or area below
/// [`AREA_EPSILON`]) yield 0.
pub fn intersection_area(subject: &[Point], clip: &[Point], scratch: &mut ClipScratch) -> f64 {
    let out = clip_convex(subject, clip, scratch);
    if out.len() < 3 {
        return 0.0;
    }
    let area = signed_area(out).abs();
    if area < AREA_EPSILON { 0.0 } else { area }
}

fn push_vertex(out: &mut Vec<Point>, p: Point) {
    if let Some(last) = out.last()
        && coincident(*last, p)
    {
        return;
    }
    out.push(p);
}

fn coincident(a: Point, b: Point) -> bool {
    (a.x - b.x).abs() < 1e-12 && (a.y - b.y).abs() < 1e-12
}

/// Intersection of segment (s, e) with the infinite line through (a, b).
fn edge_intersection(a: Point, b: Point, s: Point, e: Point) -> Point {
    let dx_c = b.x - a.x;
    let dy_c = b.y - a.y;
    let dx_s = e.x - s.x;
    let dy_s = e.y - s.y;
    let den = dx_c * dy_s - dy_c * dx_s;
    if den.abs() < f64::EPSILON {
        // Grazing parallel edges; either endpoint is on the clip line.
        return s;
    }
    let t = (dy_c * (s.x - a.x) - dx_c * (s.y - a.y)) / den;
    Point::new(s.x + t * dx_s, s.y + t * dy_s)
}
