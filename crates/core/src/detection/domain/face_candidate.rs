use crate::shared::region::Region;

/// A face reported by the camera's face detector for one cycle, in driver
/// coordinates, with a 0-100 confidence score.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FaceCandidate {
    pub region: Region,
    pub score: i32,
}

impl FaceCandidate {
    pub fn new(region: Region, score: i32) -> Self {
        Self { region, score }
    }
}

/// Picks the highest-scoring candidate strictly above `threshold`.
///
/// On equal scores the earliest candidate wins.
pub fn select_best(candidates: &[FaceCandidate], threshold: i32) -> Option<&FaceCandidate> {
    candidates
        .iter()
        .filter(|c| c.score > threshold)
        .fold(None, |best: Option<&FaceCandidate>, c| match best {
            Some(b) if b.score >= c.score => Some(b),
            _ => Some(c),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::constants::CONFIDENCE_THRESHOLD;
    use rstest::rstest;

    fn candidate(id: i32, score: i32) -> FaceCandidate {
        FaceCandidate::new(Region::new(id, id, id + 10, id + 10), score)
    }

    #[test]
    fn test_empty_batch_selects_nothing() {
        assert!(select_best(&[], CONFIDENCE_THRESHOLD).is_none());
    }

    #[test]
    fn test_picks_maximum_above_threshold() {
        let batch = [candidate(1, 20), candidate(2, 45)];
        let best = select_best(&batch, CONFIDENCE_THRESHOLD).unwrap();
        assert_eq!(best.score, 45);
        assert_eq!(best.region, batch[1].region);
    }

    #[rstest]
    #[case::all_below(&[10, 20, 29])]
    #[case::exactly_threshold(&[30])]
    fn test_nothing_strictly_above_threshold(#[case] scores: &[i32]) {
        let batch: Vec<_> = scores.iter().map(|&s| candidate(s, s)).collect();
        assert!(select_best(&batch, CONFIDENCE_THRESHOLD).is_none());
    }

    #[test]
    fn test_ties_go_to_first_seen() {
        let batch = [candidate(1, 80), candidate(2, 90), candidate(3, 90)];
        let best = select_best(&batch, CONFIDENCE_THRESHOLD).unwrap();
        assert_eq!(best.region, batch[1].region);
    }

    #[test]
    fn test_low_scores_never_win_over_filtered_set() {
        let batch = [candidate(1, 31), candidate(2, 5), candidate(3, 100)];
        let best = select_best(&batch, CONFIDENCE_THRESHOLD).unwrap();
        assert_eq!(best.score, 100);
    }
}
