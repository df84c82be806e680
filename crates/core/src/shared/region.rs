use crate::shared::constants::{DRIVER_COORD_MAX, DRIVER_COORD_MIN};
use crate::shared::frame::{FrameGeometry, Rotation};

/// An axis-aligned rectangle with inclusive-exclusive edges.
///
/// Face detectors report regions in driver space (`[-1000, 1000]` on both
/// axes, independent of preview size); [`Region::map_to`] converts them
/// into preview pixel space for the analysis port.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Region {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Region {
    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }

    pub fn center_x(&self) -> i32 {
        (self.left + self.right) >> 1
    }

    pub fn center_y(&self) -> i32 {
        (self.top + self.bottom) >> 1
    }

    /// Grows (or shrinks) the region around its center.
    pub fn scaled(&self, x_scale: f32, y_scale: f32) -> Region {
        let dw = ((self.width() as f32 * x_scale - self.width() as f32) * 0.5) as i32;
        let dh = ((self.height() as f32 * y_scale - self.height() as f32) * 0.5) as i32;
        Region::new(
            self.left - dw,
            self.top - dh,
            self.right + dw,
            self.bottom + dh,
        )
    }

    /// Clamps each edge independently into the given bounds.
    pub fn clamped(&self, left: i32, top: i32, right: i32, bottom: i32) -> Region {
        Region::new(
            self.left.max(left),
            self.top.max(top),
            self.right.min(right),
            self.bottom.min(bottom),
        )
    }

    /// Region sent along with capture requests: 10% larger than the face and
    /// kept inside driver space.
    pub fn capture_region(&self, scale: f32) -> Region {
        self.scaled(scale, scale).clamped(
            DRIVER_COORD_MIN,
            DRIVER_COORD_MIN,
            DRIVER_COORD_MAX,
            DRIVER_COORD_MAX,
        )
    }

    /// Maps a driver-space face region into preview pixel space.
    ///
    /// The region is first squared around its center (side = mean of the
    /// half extents), normalised to `[0, 1]`, then projected according to
    /// the display rotation. Landscape modes swap the half extents after
    /// projection because the sensor is mounted in portrait.
    pub fn map_to(&self, geometry: FrameGeometry) -> Region {
        let hw = self.width() as f32 / 2.0;
        let hh = self.height() as f32 / 2.0;
        let cx = self.left as f32 + hw;
        let cy = self.top as f32 + hh;
        let side = (hh + hw) / 2.0;

        let span = (DRIVER_COORD_MAX - DRIVER_COORD_MIN) as f32;
        let norm = |v: f32| (v - DRIVER_COORD_MIN as f32) / span;
        let l = norm(cx - side);
        let r = norm(cx + side);
        let t = norm(cy - side);
        let b = norm(cy + side);

        let width = geometry.width as f32;
        let height = geometry.height as f32;
        let (short, long) = if width > height {
            (height, width)
        } else {
            (width, height)
        };

        match geometry.rotation {
            Rotation::Deg90 => Region::new(
                round(short - short * b),
                round(long - long * r),
                round(short - short * t),
                round(long - long * l),
            ),
            Rotation::Deg270 => Region::new(
                round(short * t),
                round(long * l),
                round(short * b),
                round(long * r),
            ),
            Rotation::Deg0 => Region::new(
                round(long - long * r),
                round(short * t),
                round(long - long * l),
                round(short * b),
            )
            .transposed_extents(),
            Rotation::Deg180 => Region::new(
                round(long * l),
                round(short - short * b),
                round(long * r),
                round(short - short * t),
            )
            .transposed_extents(),
        }
    }

    /// Keeps the center but swaps the horizontal and vertical half extents.
    fn transposed_extents(&self) -> Region {
        let half_w = self.width() as f32 * 0.5;
        let half_h = self.height() as f32 * 0.5;
        let x0 = self.center_x() as f32;
        let y0 = self.center_y() as f32;
        Region::new(
            (x0 - half_h) as i32,
            (y0 - half_w) as i32,
            (x0 + half_h) as i32,
            (y0 + half_w) as i32,
        )
    }
}

/// Round half up, matching the driver's integer rounding.
fn round(v: f32) -> i32 {
    (v + 0.5).floor() as i32
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn geometry(rotation: Rotation) -> FrameGeometry {
        FrameGeometry::new(640, 480, rotation)
    }

    // ── Basic geometry ──────────────────────────────────────────────

    #[test]
    fn test_width_height_center() {
        let r = Region::new(10, 20, 50, 100);
        assert_eq!(r.width(), 40);
        assert_eq!(r.height(), 80);
        assert_eq!(r.center_x(), 30);
        assert_eq!(r.center_y(), 60);
    }

    #[test]
    fn test_center_of_negative_region_floors() {
        let r = Region::new(-101, -101, 0, 0);
        assert_eq!(r.center_x(), -51);
    }

    #[test]
    fn test_scaled_grows_symmetrically() {
        let r = Region::new(-100, -100, 100, 100).scaled(1.1, 1.1);
        assert_eq!(r, Region::new(-110, -110, 110, 110));
    }

    #[test]
    fn test_clamped_limits_each_edge() {
        let r = Region::new(-1200, -50, 900, 1100).clamped(-1000, -1000, 1000, 1000);
        assert_eq!(r, Region::new(-1000, -50, 900, 1000));
    }

    #[test]
    fn test_capture_region_scales_then_clamps() {
        let r = Region::new(800, -100, 1000, 100).capture_region(1.1);
        assert_eq!(r, Region::new(790, -110, 1000, 110));
    }

    // ── Rotation-aware mapping ──────────────────────────────────────

    #[test]
    fn test_map_portrait_centered_face() {
        // Square face at the driver origin: l = t = 0.45, r = b = 0.55.
        // Portrait uses short = 480, long = 640.
        let mapped = Region::new(-100, -100, 100, 100).map_to(geometry(Rotation::Deg90));
        assert_eq!(mapped, Region::new(216, 288, 264, 352));
    }

    #[test]
    fn test_map_landscape_left_swaps_extents() {
        // Before the swap: (288, 216)-(352, 264), 64x48 around (320, 240).
        let mapped = Region::new(-100, -100, 100, 100).map_to(geometry(Rotation::Deg0));
        assert_eq!(mapped, Region::new(296, 208, 344, 272));
    }

    #[test]
    fn test_map_landscape_right_mirrors_left() {
        let mapped = Region::new(-100, -100, 100, 100).map_to(geometry(Rotation::Deg180));
        assert_eq!(mapped, Region::new(296, 208, 344, 272));
    }

    #[test]
    fn test_map_reverse_portrait() {
        let mapped = Region::new(-100, -100, 100, 100).map_to(geometry(Rotation::Deg270));
        assert_eq!(mapped, Region::new(216, 288, 264, 352));
    }

    #[test]
    fn test_map_squares_non_square_face() {
        // 200x100 face: side = (100 + 50) / 2 = 75, so the mapped region is square
        // in normalised space.
        let mapped = Region::new(-100, -50, 100, 50).map_to(geometry(Rotation::Deg90));
        assert_eq!(mapped.width(), 36);
        assert_eq!(mapped.height(), 48);
    }

    #[rstest]
    #[case::portrait(Rotation::Deg90)]
    #[case::landscape_left(Rotation::Deg0)]
    #[case::landscape_right(Rotation::Deg180)]
    #[case::reverse_portrait(Rotation::Deg270)]
    fn test_map_is_independent_of_preview_orientation(#[case] rotation: Rotation) {
        // The driver reports sensor-relative regions, so a 640x480 and a
        // 480x640 preview must map identically.
        let face = Region::new(-300, 100, -100, 300);
        let a = face.map_to(FrameGeometry::new(640, 480, rotation));
        let b = face.map_to(FrameGeometry::new(480, 640, rotation));
        assert_eq!(a, b);
    }

    #[rstest]
    #[case::portrait(Rotation::Deg90)]
    #[case::landscape_left(Rotation::Deg0)]
    #[case::landscape_right(Rotation::Deg180)]
    #[case::reverse_portrait(Rotation::Deg270)]
    fn test_map_keeps_full_range_face_inside_preview(#[case] rotation: Rotation) {
        let mapped = Region::new(-500, -500, 500, 500).map_to(geometry(rotation));
        assert!(mapped.left >= 0 && mapped.top >= 0);
        assert!(mapped.right <= 640 && mapped.bottom <= 640);
        assert!(mapped.width() > 0 && mapped.height() > 0);
    }
}
