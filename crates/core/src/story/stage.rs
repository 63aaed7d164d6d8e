use std::fmt;

/// A named text value flowing through the pipeline.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub enum StoryField {
    Request,
    Plot,
    Character,
    Setting,
    Dialogue,
    Emotion,
}

impl StoryField {
    pub const ALL: [StoryField; 6] = [
        StoryField::Request,
        StoryField::Plot,
        StoryField::Character,
        StoryField::Setting,
        StoryField::Dialogue,
        StoryField::Emotion,
    ];

    /// Placeholder name used in prompt templates.
    pub fn key(&self) -> &'static str {
        match self {
            Self::Request => "request",
            Self::Plot => "plot",
            Self::Character => "character",
            Self::Setting => "setting",
            Self::Dialogue => "dialogue",
            Self::Emotion => "emotion",
        }
    }
}

impl fmt::Display for StoryField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum StoryStage {
    Plot,
    Character,
    Setting,
    Dialogue,
    Emotion,
}

impl StoryStage {
    /// Pipeline order.
    pub const ALL: [StoryStage; 5] = [
        StoryStage::Plot,
        StoryStage::Character,
        StoryStage::Setting,
        StoryStage::Dialogue,
        StoryStage::Emotion,
    ];

    /// Prompt registry key of the agent producing this stage.
    pub fn key(&self) -> &'static str {
        self.output().key()
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Plot => "plot outline",
            Self::Character => "character",
            Self::Setting => "setting",
            Self::Dialogue => "dialogue",
            Self::Emotion => "emotional twist",
        }
    }

    pub fn heading(&self) -> &'static str {
        match self {
            Self::Plot => "Story Outline",
            Self::Character => "Character Development",
            Self::Setting => "Setting Description",
            Self::Dialogue => "First Dialogue",
            Self::Emotion => "Emotional Twist",
        }
    }

    pub fn output(&self) -> StoryField {
        match self {
            Self::Plot => StoryField::Plot,
            Self::Character => StoryField::Character,
            Self::Setting => StoryField::Setting,
            Self::Dialogue => StoryField::Dialogue,
            Self::Emotion => StoryField::Emotion,
        }
    }

    pub fn dependencies(&self) -> &'static [StoryField] {
        match self {
            Self::Plot => &[StoryField::Request],
            Self::Character => &[StoryField::Plot],
            Self::Setting => &[StoryField::Plot],
            Self::Dialogue => &[StoryField::Character, StoryField::Setting],
            Self::Emotion => &[StoryField::Character, StoryField::Plot],
        }
    }

    /// 1-based position in the pipeline.
    pub fn position(&self) -> usize {
        Self::ALL
            .iter()
            .position(|stage| stage == self)
            .map_or(0, |index| index + 1)
    }
}

impl fmt::Display for StoryStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dependencies_are_produced_earlier() {
        for stage in StoryStage::ALL {
            for dependency in stage.dependencies() {
                if *dependency == StoryField::Request {
                    continue;
                }
                let producer = StoryStage::ALL
                    .iter()
                    .find(|candidate| candidate.output() == *dependency)
                    .expect("every dependency has a producer");
                assert!(producer.position() < stage.position());
            }
        }
    }

    #[test]
    fn positions_follow_pipeline_order() {
        let positions: Vec<usize> = StoryStage::ALL.iter().map(StoryStage::position).collect();
        assert_eq!(positions, vec![1, 2, 3, 4, 5]);
        assert_eq!(StoryStage::Dialogue.key(), "dialogue");
    }
}
