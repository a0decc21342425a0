//! Builds the open-aperture polygon set of a single field frame.

use crate::geom::{Point, Polygon, Rect};
use crate::mlc::MlcModel;
use crate::sample::FieldFrame;
use crate::scale::Bank;

/// The open aperture of one frame in BEV cm: one convex quadrilateral per
/// open leaf pair, already rotated by the collimator angle, plus the
/// bounding box of their union. Recomputed per sample; the buffers are
/// recycled through [`build_aperture`].
#[derive(Clone, Debug, Default)]
pub struct Aperture {
    pub polygons: Vec<Polygon>,
    pub bbox: Option<Rect>,
}

impl Aperture {
    pub fn clear(&mut self) {
        self.polygons.clear();
        self.bbox = None;
    }

    pub fn is_empty(&self) -> bool {
        self.polygons.is_empty()
    }
}

/// Populate `out` with the aperture polygons of `frame`.
///
/// Per leaf pair: the pair is discarded when its band centre lies outside
/// the Y jaws; the open interval between the two leaves is clipped against
/// the X jaws and its band against the Y jaws; surviving rectangles are
/// rotated about the BEV origin by the collimator angle.
pub fn build_aperture<F: FieldFrame + ?Sized>(frame: &F, mlc: &dyn MlcModel, out: &mut Aperture) {
    out.clear();

    let (jx0, jx1) = ordered(frame.x1(), frame.x2());
    let (jy0, jy1) = ordered(frame.y1(), frame.y2());
    let collimator = frame.collimator();

    for i in 0..mlc.leaf_pair_count() {
        let info = mlc.leaf_info(i);
        // mm to cm for geometry.
        let y_c = info.y_centre_mm / 10.0;
        let half_w = 0.5 * info.width_mm / 10.0;
        if y_c < jy0 || y_c > jy1 {
            continue;
        }
        let y_lo = (y_c - half_w).max(jy0);
        let y_hi = (y_c + half_w).min(jy1);
        if y_hi - y_lo <= 0.0 {
            continue;
        }

        let (x_lo, x_hi) = ordered(
            frame.leaf_position(Bank::A, i),
            frame.leaf_position(Bank::B, i),
        );
        let x_lo = x_lo.max(jx0);
        let x_hi = x_hi.min(jx1);
        if x_hi - x_lo <= 0.0 {
            continue;
        }

        let mut poly = Polygon::from_rect(&Rect::new(x_lo, y_lo, x_hi, y_hi));
        poly.rotate_deg(collimator);
        if let Some(pb) = poly.bbox() {
            match &mut out.bbox {
                Some(bb) => {
                    bb.expand(Point::new(pb.x0, pb.y0));
                    bb.expand(Point::new(pb.x1, pb.y1));
                }
                None => out.bbox = Some(pb),
            }
        }
        out.polygons.push(poly);
    }
}

/// The rotated jaw rectangle of `frame`, captured for inspection.
pub fn jaw_outline<F: FieldFrame + ?Sized>(frame: &F) -> Polygon {
    let (jx0, jx1) = ordered(frame.x1(), frame.x2());
    let (jy0, jy1) = ordered(frame.y1(), frame.y2());
    let mut poly = Polygon::from_rect(&Rect::new(jx0, jy0, jx1, jy1));
    poly.rotate_deg(frame.collimator());
    poly
}

fn ordered(a: f64, b: f64) -> (f64, f64) {
    if a <= b { (a, b) } else { (b, a) }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::mlc::Millennium120;
    use crate::sample::FieldSample;

    fn open_field(jaw: f64, leaves: usize, gap: f64) -> FieldSample {
        FieldSample {
            x1: -jaw,
            x2: jaw,
            y1: -jaw,
            y2: jaw,
            bank_a: vec![-gap; leaves],
            bank_b: vec![gap; leaves],
            delta_mu: 1.0,
            ..Default::default()
        }
    }

    #[test]
    fn open_field_covers_jaw_rectangle() {
        let mlc = Millennium120::new();
        let frame = open_field(5.0, 60, 20.0);
        let mut ap = Aperture::default();
        build_aperture(&frame, &mlc, &mut ap);

        // 5 cm of 5 mm central leaves on each side of the origin.
        assert_eq!(ap.polygons.len(), 20);
        let total: f64 = ap.polygons.iter().map(|p| p.area()).sum();
        assert!((total - 100.0).abs() < 1e-9);
        let bb = ap.bbox.unwrap();
        assert_eq!(bb, Rect::new(-5.0, -5.0, 5.0, 5.0));
    }

    #[test]
    fn closed_pairs_are_discarded() {
        let mlc = Millennium120::new();
        let mut frame = open_field(5.0, 60, 20.0);
        frame.bank_a = vec![1.0; 60];
        frame.bank_b = vec![1.0; 60];
        let mut ap = Aperture::default();
        build_aperture(&frame, &mlc, &mut ap);
        assert!(ap.is_empty());
        assert!(ap.bbox.is_none());
    }

    #[test]
    fn leaves_clipped_by_x_jaws() {
        let mlc = Millennium120::new();
        let mut frame = open_field(5.0, 60, 20.0);
        frame.x1 = -2.0;
        frame.x2 = 1.0;
        let mut ap = Aperture::default();
        build_aperture(&frame, &mlc, &mut ap);
        let total: f64 = ap.polygons.iter().map(|p| p.area()).sum();
        assert!((total - 30.0).abs() < 1e-9);
    }

    #[test]
    fn pair_outside_y_jaws_is_discarded() {
        let mlc = Millennium120::new();
        // Jaws covering only the upper half.
        let mut frame = open_field(5.0, 60, 20.0);
        frame.y1 = 0.0;
        frame.y2 = 5.0;
        let mut ap = Aperture::default();
        build_aperture(&frame, &mlc, &mut ap);
        assert_eq!(ap.polygons.len(), 10);
        let bb = ap.bbox.unwrap();
        assert!(bb.y0 >= 0.0 - 1e-12);
    }

    #[test]
    fn collimator_rotation_preserves_area() {
        let mlc = Millennium120::new();
        let mut frame = open_field(5.0, 60, 20.0);
        frame.collimator = 45.0;
        let mut ap = Aperture::default();
        build_aperture(&frame, &mlc, &mut ap);
        let total: f64 = ap.polygons.iter().map(|p| p.area()).sum();
        assert!((total - 100.0).abs() < 1e-9);
        // The bounding box of the rotated square grows by sqrt(2).
        let bb = ap.bbox.unwrap();
        assert!((bb.width() - 10.0 * std::f64::consts::SQRT_2).abs() < 1e-6);
    }

    #[test]
    fn jaw_outline_is_rotated_jaw_rect() {
        let mut frame = open_field(5.0, 60, 20.0);
        frame.collimator = 90.0;
        let outline = jaw_outline(&frame);
        assert!((outline.area() - 100.0).abs() < 1e-9);
    }
}
