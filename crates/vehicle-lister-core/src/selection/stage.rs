use std::fmt;

/// Position in the brand -> chassis -> car drill-down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Brand,
    Chassis,
    Car,
}

/// Every legal move. Advancing and retreating are one step at a time.
const TRANSITIONS: &[(Stage, Stage)] = &[
    (Stage::Brand, Stage::Chassis),
    (Stage::Chassis, Stage::Car),
    (Stage::Car, Stage::Chassis),
    (Stage::Chassis, Stage::Brand),
];

impl Stage {
    pub fn can_transition(from: Stage, to: Stage) -> bool {
        TRANSITIONS.contains(&(from, to))
    }

    /// The stage a selection advances to, None at the last stage.
    pub fn next(self) -> Option<Stage> {
        match self {
            Stage::Brand => Some(Stage::Chassis),
            Stage::Chassis => Some(Stage::Car),
            Stage::Car => None,
        }
    }

    /// The stage a back action returns to, None at the first stage.
    pub fn previous(self) -> Option<Stage> {
        match self {
            Stage::Brand => None,
            Stage::Chassis => Some(Stage::Brand),
            Stage::Car => Some(Stage::Chassis),
        }
    }

    pub fn depth(self) -> u8 {
        match self {
            Stage::Brand => 0,
            Stage::Chassis => 1,
            Stage::Car => 2,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Stage::Brand => "brand",
            Stage::Chassis => "chassis",
            Stage::Car => "car",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [Stage; 3] = [Stage::Brand, Stage::Chassis, Stage::Car];

    #[test]
    fn test_next_and_previous_agree_with_table() {
        for stage in ALL {
            if let Some(next) = stage.next() {
                assert!(Stage::can_transition(stage, next));
                assert_eq!(next.previous(), Some(stage));
            }
            if let Some(prev) = stage.previous() {
                assert!(Stage::can_transition(stage, prev));
            }
        }
    }

    #[test]
    fn test_skips_and_self_loops_are_illegal() {
        assert!(!Stage::can_transition(Stage::Brand, Stage::Car));
        assert!(!Stage::can_transition(Stage::Car, Stage::Brand));
        for stage in ALL {
            assert!(!Stage::can_transition(stage, stage));
        }
    }

    #[test]
    fn test_depth_ordering() {
        let depths: Vec<u8> = ALL.iter().map(|s| s.depth()).collect();
        assert_eq!(depths, vec![0, 1, 2]);
        assert_eq!(Stage::Car.to_string(), "car");
    }
}
