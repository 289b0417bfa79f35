use super::topology::SkeletonSchema;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BodyPart {
    Face,
    LeftHand,
    RightHand,
    UpperBody,
    LowerBody,
}

impl BodyPart {
    pub const ALL: [BodyPart; 5] = [
        BodyPart::Face,
        BodyPart::LeftHand,
        BodyPart::RightHand,
        BodyPart::UpperBody,
        BodyPart::LowerBody,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            BodyPart::Face => "Face & Head",
            BodyPart::LeftHand => "Left Hand",
            BodyPart::RightHand => "Right Hand",
            BodyPart::UpperBody => "Upper Body",
            BodyPart::LowerBody => "Lower Body",
        }
    }

    pub fn parse(name: &str) -> Option<BodyPart> {
        match name.to_ascii_lowercase().as_str() {
            "face" | "head" => Some(BodyPart::Face),
            "left" | "left_hand" | "lefthand" => Some(BodyPart::LeftHand),
            "right" | "right_hand" | "righthand" => Some(BodyPart::RightHand),
            "upper" | "upper_body" => Some(BodyPart::UpperBody),
            "lower" | "lower_body" => Some(BodyPart::LowerBody),
            _ => None,
        }
    }
}

/// Per-part drawing toggles. Everything is visible until the user says otherwise.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PartVisibility {
    pub face: bool,
    pub left_hand: bool,
    pub right_hand: bool,
    pub upper_body: bool,
    pub lower_body: bool,
}

impl Default for PartVisibility {
    fn default() -> Self {
        Self {
            face: true,
            left_hand: true,
            right_hand: true,
            upper_body: true,
            lower_body: true,
        }
    }
}

impl PartVisibility {
    pub fn is_visible(&self, part: BodyPart) -> bool {
        match part {
            BodyPart::Face => self.face,
            BodyPart::LeftHand => self.left_hand,
            BodyPart::RightHand => self.right_hand,
            BodyPart::UpperBody => self.upper_body,
            BodyPart::LowerBody => self.lower_body,
        }
    }

    pub fn set(&mut self, part: BodyPart, visible: bool) {
        let slot = match part {
            BodyPart::Face => &mut self.face,
            BodyPart::LeftHand => &mut self.left_hand,
            BodyPart::RightHand => &mut self.right_hand,
            BodyPart::UpperBody => &mut self.upper_body,
            BodyPart::LowerBody => &mut self.lower_body,
        };
        *slot = visible;
    }

    pub fn toggle(&mut self, part: BodyPart) -> bool {
        let visible = !self.is_visible(part);
        self.set(part, visible);
        visible
    }

    pub fn active_count(&self) -> usize {
        BodyPart::ALL
            .iter()
            .filter(|part| self.is_visible(**part))
            .count()
    }

    /// Union of the index ranges of every enabled part.
    pub fn enabled_indices(&self, schema: &SkeletonSchema) -> EnabledIndices {
        let mut mask = vec![false; schema.index_span()];
        let parts = &schema.parts;
        let groups = [
            (self.face, &parts.face),
            (self.left_hand, &parts.left_hand),
            (self.right_hand, &parts.right_hand),
            (self.upper_body, &parts.upper_body),
            (self.lower_body, &parts.lower_body),
        ];
        for (_, ranges) in groups.into_iter().filter(|(on, _)| *on) {
            for range in ranges {
                for idx in range.clone() {
                    mask[idx] = true;
                }
            }
        }
        EnabledIndices { mask }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EnabledIndices {
    mask: Vec<bool>,
}

impl EnabledIndices {
    pub fn contains(&self, index: usize) -> bool {
        self.mask.get(index).copied().unwrap_or(false)
    }

    pub fn count(&self) -> usize {
        self.mask.iter().filter(|on| **on).count()
    }
}
