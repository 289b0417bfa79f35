use std::ops::RangeInclusive;

/// COCO-WholeBody (133 keypoints) bone list. Indices must match the
/// inference service's output ordering; a mismatch draws wrong bones.
pub const WHOLEBODY_CONNECTIONS: &[(usize, usize)] = &[
    // body
    (5, 6), (6, 8), (8, 10), (5, 7), (7, 9), (6, 12), (5, 11), (12, 14), (14, 16), (11, 13),
    (13, 15),
    // face
    (23, 24), (24, 25), (25, 26), (26, 27), (27, 28), (28, 29), (29, 30), (30, 31),
    (31, 32), (32, 33), (33, 34), (34, 35), (35, 36), (36, 37), (37, 38), (38, 39),
    (45, 46), (46, 47), (47, 48), (48, 49), (41, 42), (42, 43), (43, 44), (44, 45),
    (50, 51), (51, 52), (52, 53), (53, 56), (56, 55), (55, 54), (56, 57), (57, 58),
    (65, 66), (66, 67), (67, 68), (68, 69), (69, 70), (59, 60), (60, 61), (61, 62),
    (62, 63), (63, 64), (71, 72), (72, 73), (73, 74), (74, 75), (75, 76), (76, 77),
    (77, 78), (78, 79), (79, 80), (80, 81), (72, 84), (84, 85), (85, 86), (86, 87),
    (87, 77),
    // left hand
    (91, 92), (92, 93), (93, 94), (91, 95), (95, 96), (96, 97), (91, 98), (98, 99),
    (99, 100), (91, 101), (101, 102), (102, 103), (91, 104), (104, 105), (105, 106),
    // right hand
    (112, 113), (113, 114), (114, 115), (112, 116), (116, 117), (117, 118), (112, 119),
    (119, 120), (120, 121), (112, 122), (122, 123), (123, 124), (112, 125), (125, 126),
    (126, 127),
];

#[derive(Clone, Debug, PartialEq)]
pub struct PartRanges {
    pub face: Vec<RangeInclusive<usize>>,
    pub left_hand: Vec<RangeInclusive<usize>>,
    pub right_hand: Vec<RangeInclusive<usize>>,
    pub upper_body: Vec<RangeInclusive<usize>>,
    pub lower_body: Vec<RangeInclusive<usize>>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SkeletonSchema {
    pub edges: Vec<(usize, usize)>,
    pub parts: PartRanges,
}

impl SkeletonSchema {
    pub fn coco_wholebody() -> Self {
        Self {
            edges: WHOLEBODY_CONNECTIONS.to_vec(),
            parts: PartRanges {
                // nose, eyes, ears plus the 68 face landmarks
                face: vec![0..=4, 23..=90],
                // shoulders, elbows, wrists, hips
                upper_body: vec![5..=12],
                // hips, knees, ankles, feet
                lower_body: vec![11..=22],
                left_hand: vec![91..=111],
                right_hand: vec![112..=132],
            },
        }
    }

    /// One past the highest index any part range covers.
    pub fn index_span(&self) -> usize {
        let p = &self.parts;
        [&p.face, &p.left_hand, &p.right_hand, &p.upper_body, &p.lower_body]
            .into_iter()
            .flatten()
            .map(|r| r.end() + 1)
            .max()
            .unwrap_or(0)
    }
}

impl Default for SkeletonSchema {
    fn default() -> Self {
        Self::coco_wholebody()
    }
}
