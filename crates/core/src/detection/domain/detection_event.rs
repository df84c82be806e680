use crate::detection::domain::landmarks::LandmarkSet;
use crate::shared::region::Region;

/// What the overlay should draw after one detection cycle.
///
/// Landmarks can only be attached to a face; the constructors are the only
/// way to build one.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DetectionEvent {
    face: Option<Region>,
    landmarks: Option<LandmarkSet>,
}

impl DetectionEvent {
    /// Nothing to draw: clears any previous overlay.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn face_only(face: Region) -> Self {
        Self {
            face: Some(face),
            landmarks: None,
        }
    }

    pub fn with_landmarks(face: Region, landmarks: LandmarkSet) -> Self {
        Self {
            face: Some(face),
            landmarks: Some(landmarks),
        }
    }

    pub fn face(&self) -> Option<&Region> {
        self.face.as_ref()
    }

    pub fn landmarks(&self) -> Option<&LandmarkSet> {
        self.landmarks.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.face.is_none()
    }

    pub fn has_landmarks(&self) -> bool {
        self.landmarks.as_ref().is_some_and(|l| !l.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_has_neither() {
        let event = DetectionEvent::empty();
        assert!(event.is_empty());
        assert!(event.landmarks().is_none());
    }

    #[test]
    fn test_face_only() {
        let face = Region::new(1, 2, 3, 4);
        let event = DetectionEvent::face_only(face);
        assert_eq!(event.face(), Some(&face));
        assert!(!event.has_landmarks());
    }

    #[test]
    fn test_has_landmarks_ignores_empty_set() {
        let face = Region::new(1, 2, 3, 4);
        assert!(!DetectionEvent::with_landmarks(face, LandmarkSet::default()).has_landmarks());
        assert!(DetectionEvent::with_landmarks(face, LandmarkSet::new(vec![(1, 1)])).has_landmarks());
    }
}
