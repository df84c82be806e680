use crate::detection::domain::analysis_port::AnalysisError;

/// Ordered landmark points produced by the analysis port, in preview pixels.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LandmarkSet {
    points: Vec<(i64, i64)>,
}

impl LandmarkSet {
    pub fn new(points: Vec<(i64, i64)>) -> Self {
        Self { points }
    }

    /// Decodes the native runtime's flat `[x0, y0, x1, y1, ...]` layout.
    pub fn from_flat(values: &[i64]) -> Result<Self, AnalysisError> {
        if values.len() % 2 != 0 {
            return Err(AnalysisError::MalformedOutput(values.len()));
        }
        Ok(Self {
            points: values.chunks_exact(2).map(|p| (p[0], p[1])).collect(),
        })
    }

    pub fn points(&self) -> &[(i64, i64)] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}
