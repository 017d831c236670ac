//! Instruct templates: typed role segments rendered to a single prompt string.

use serde::{Deserialize, Serialize};

/// Turn role within an instruct transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One turn of the transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub role: Role,
    pub text: String,
    /// Left without an end-of-turn token so the model continues it.
    pub open: bool,
}

impl Segment {
    pub fn system(text: impl Into<String>) -> Self {
        Self::closed(Role::System, text)
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::closed(Role::User, text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::closed(Role::Assistant, text)
    }

    /// An assistant turn the model is asked to complete.
    pub fn open_assistant(prefix: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            text: prefix.into(),
            open: true,
        }
    }

    fn closed(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
            open: false,
        }
    }
}

/// Role-delimiter convention understood by the loaded model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum InstructFormat {
    /// `<|start_header_id|>role<|end_header_id|>text<|eot_id|>`
    #[default]
    #[serde(rename = "llama3")]
    Llama3,
    /// `<|im_start|>role\ntext<|im_end|>\n`
    #[serde(rename = "chatml")]
    ChatMl,
}

impl InstructFormat {
    /// Render segments in order into one prompt string.
    pub fn render(&self, segments: &[Segment]) -> String {
        let mut prompt = String::new();

        if *self == InstructFormat::Llama3 {
            prompt.push_str("<|begin_of_text|>");
        }

        for segment in segments {
            match self {
                InstructFormat::Llama3 => {
                    prompt.push_str("<|start_header_id|>");
                    prompt.push_str(segment.role.as_str());
                    prompt.push_str("<|end_header_id|>");
                    prompt.push_str(&segment.text);
                    if !segment.open {
                        prompt.push_str("<|eot_id|>");
                    }
                }
                InstructFormat::ChatMl => {
                    prompt.push_str("<|im_start|>");
                    prompt.push_str(segment.role.as_str());
                    prompt.push('\n');
                    prompt.push_str(&segment.text);
                    if !segment.open {
                        prompt.push_str("<|im_end|>\n");
                    }
                }
            }
        }

        prompt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transcript() -> Vec<Segment> {
        vec![
            Segment::system("Be brief."),
            Segment::user("Alice: hi"),
            Segment::open_assistant("Cirno: "),
        ]
    }

    #[test]
    fn llama3_leaves_final_turn_open() {
        let prompt = InstructFormat::Llama3.render(&transcript());

        assert_eq!(
            prompt,
            "<|begin_of_text|>\
             <|start_header_id|>system<|end_header_id|>Be brief.<|eot_id|>\
             <|start_header_id|>user<|end_header_id|>Alice: hi<|eot_id|>\
             <|start_header_id|>assistant<|end_header_id|>Cirno: "
        );
    }

    #[test]
    fn chatml_leaves_final_turn_open() {
        let prompt = InstructFormat::ChatMl.render(&transcript());

        assert_eq!(
            prompt,
            "<|im_start|>system\nBe brief.<|im_end|>\n\
             <|im_start|>user\nAlice: hi<|im_end|>\n\
             <|im_start|>assistant\nCirno: "
        );
    }

    #[test]
    fn empty_segment_list_renders_only_preamble() {
        assert_eq!(InstructFormat::Llama3.render(&[]), "<|begin_of_text|>");
        assert_eq!(InstructFormat::ChatMl.render(&[]), "");
    }
}
