use std::fmt;

use super::stage::StoryStage;

/// The five agent outputs, kept verbatim.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StoryDocument {
    plot: String,
    character: String,
    setting: String,
    dialogue: String,
    emotion: String,
}

impl StoryDocument {
    pub fn new(
        plot: impl Into<String>,
        character: impl Into<String>,
        setting: impl Into<String>,
        dialogue: impl Into<String>,
        emotion: impl Into<String>,
    ) -> Self {
        Self {
            plot: plot.into(),
            character: character.into(),
            setting: setting.into(),
            dialogue: dialogue.into(),
            emotion: emotion.into(),
        }
    }

    pub fn section(&self, stage: StoryStage) -> &str {
        match stage {
            StoryStage::Plot => &self.plot,
            StoryStage::Character => &self.character,
            StoryStage::Setting => &self.setting,
            StoryStage::Dialogue => &self.dialogue,
            StoryStage::Emotion => &self.emotion,
        }
    }

    pub fn sections(&self) -> impl Iterator<Item = (StoryStage, &str)> {
        StoryStage::ALL
            .into_iter()
            .map(move |stage| (stage, self.section(stage)))
    }

    /// Markdown rendering: one `### Heading:` section per stage, separated by
    /// a blank line, ending with a single newline.
    pub fn render(&self) -> String {
        let mut output = String::new();
        for (index, (stage, body)) in self.sections().enumerate() {
            if index > 0 {
                output.push('\n');
            }
            output.push_str("### ");
            output.push_str(stage.heading());
            output.push_str(":\n");
            output.push_str(body);
            output.push('\n');
        }
        output
    }
}

impl fmt::Display for StoryDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_sections_in_pipeline_order() {
        let document = StoryDocument::new("P", "C", "S", "D", "E");
        assert_eq!(
            document.render(),
            "### Story Outline:\nP\n\n### Character Development:\nC\n\n### Setting Description:\nS\n\n### First Dialogue:\nD\n\n### Emotional Twist:\nE\n"
        );
    }

    #[test]
    fn multi_line_bodies_are_kept_verbatim() {
        let document = StoryDocument::new("Act I\nAct II", "", "  rain  ", "D", "E");
        let rendered = document.to_string();
        assert!(rendered.starts_with("### Story Outline:\nAct I\nAct II\n\n"));
        assert!(rendered.contains("### Character Development:\n\n\n### Setting"));
        assert!(rendered.contains(":\n  rain  \n"));
    }
}
