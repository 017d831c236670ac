//! Prompt assembly: persona, replayed history, and the current turn.

pub mod instruct;
pub mod request;

pub use instruct::{InstructFormat, Role, Segment};
pub use request::GenerationRequest;

use crate::config::{Config, SamplingParameters};
use crate::conversation::InteractionRecord;

/// The bot identity injected into every prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Persona {
    /// Name the bot speaks as in assistant turns.
    pub name: String,
    /// System instruction.
    pub instruction: String,
}

/// Builds generation requests from history and the current turn.
#[derive(Debug, Clone)]
pub struct PromptAssembler {
    persona: Persona,
    format: InstructFormat,
    params: SamplingParameters,
}

impl PromptAssembler {
    pub fn new(persona: Persona, format: InstructFormat, params: SamplingParameters) -> Self {
        Self {
            persona,
            format,
            params,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            Persona {
                name: config.bot.name.clone(),
                instruction: config.bot.instruction(),
            },
            config.inference.format,
            config.sampling.clone(),
        )
    }

    pub fn persona(&self) -> &Persona {
        &self.persona
    }

    /// Assemble the request for `speaker_name` saying `current_text`.
    ///
    /// Both texts are expected to be sanitized already. History is replayed
    /// oldest first and left untouched.
    pub fn build(
        &self,
        history: &[InteractionRecord],
        speaker_name: &str,
        current_text: &str,
    ) -> GenerationRequest {
        let bot_name = &self.persona.name;
        let mut segments = Vec::with_capacity(history.len() * 2 + 3);

        segments.push(Segment::system(self.persona.instruction.as_str()));

        for record in history {
            segments.push(Segment::user(format!(
                "{}: {}",
                record.user_name(),
                record.user_prompt()
            )));
            segments.push(Segment::assistant(format!(
                "{bot_name}: {}",
                record.bot_response()
            )));
        }

        segments.push(Segment::user(format!("{speaker_name}: {current_text}")));
        segments.push(Segment::open_assistant(format!("{bot_name}: ")));

        GenerationRequest::new(segments, self.format, &self.params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assembler() -> PromptAssembler {
        PromptAssembler::from_config(&Config::default())
    }

    fn count(request: &GenerationRequest, role: Role, open: bool) -> usize {
        request
            .segments()
            .iter()
            .filter(|s| s.role == role && s.open == open)
            .count()
    }

    #[test]
    fn empty_history_has_system_and_current_turn_only() {
        let request = assembler().build(&[], "Alice", "hello");

        assert_eq!(request.segments().len(), 3);
        assert_eq!(count(&request, Role::System, false), 1);
        assert_eq!(count(&request, Role::User, false), 1);
        assert_eq!(count(&request, Role::Assistant, false), 0);
        assert_eq!(count(&request, Role::Assistant, true), 1);
        assert!(request.prompt().ends_with(
            "<|start_header_id|>user<|end_header_id|>Alice: hello<|eot_id|>\
             <|start_header_id|>assistant<|end_header_id|>Cirno: "
        ));
    }

    #[test]
    fn history_is_replayed_in_order_before_current_turn() {
        let history = vec![
            InteractionRecord::new("Alice", "first", "one"),
            InteractionRecord::new("Bob", "second", "two"),
        ];

        let request = assembler().build(&history, "Alice", "third");

        let texts: Vec<_> = request
            .segments()
            .iter()
            .skip(1)
            .map(|s| (s.role, s.text.as_str()))
            .collect();
        assert_eq!(
            texts,
            vec![
                (Role::User, "Alice: first"),
                (Role::Assistant, "Cirno: one"),
                (Role::User, "Bob: second"),
                (Role::Assistant, "Cirno: two"),
                (Role::User, "Alice: third"),
                (Role::Assistant, "Cirno: "),
            ]
        );

        let prompt = request.prompt();
        let positions: Vec<_> = ["Alice: first", "Cirno: one", "Bob: second", "Cirno: two", "Alice: third"]
            .iter()
            .map(|needle| prompt.find(needle).expect("segment rendered"))
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn system_segment_carries_persona() {
        let request = assembler().build(&[], "Alice", "hi");
        let system = &request.segments()[0];

        assert_eq!(system.role, Role::System);
        assert!(system.text.starts_with("You are Cirno"));
    }

    #[test]
    fn payload_matches_server_schema() {
        let request = assembler().build(&[], "Alice", "say \\\"hi\\\"");
        let body = serde_json::to_value(&request).expect("request serializes");
        let object = body.as_object().expect("request is an object");

        let keys: Vec<_> = object.keys().map(String::as_str).collect();
        for expected in [
            "max_context_length",
            "max_length",
            "prompt",
            "quiet",
            "rep_pen",
            "rep_pen_range",
            "rep_pen_slope",
            "temperature",
            "tfs",
            "top_a",
            "top_k",
            "top_p",
            "typical",
            "dynamic_temperature",
            "dynatemp_low",
            "dynatemp_high",
            "dynatemp_range",
            "dynatemp_exponent",
            "stopping_strings",
            "stop",
        ] {
            assert!(keys.contains(&expected), "missing {expected}");
        }
        assert_eq!(keys.len(), 20);
        assert_eq!(body["max_context_length"], 2048);
        assert_eq!(body["quiet"], false);
        assert_eq!(body["dynamic_temperature"], true);
        assert_eq!(body["stop"], serde_json::json!(["<|im_end|>", "<|"]));
        assert_eq!(body["stopping_strings"], body["stop"]);
        assert_eq!(body["prompt"], request.prompt());
    }

    #[test]
    fn build_does_not_touch_history() {
        let history = vec![InteractionRecord::new("Alice", "first", "one")];
        let before = history.clone();

        let _ = assembler().build(&history, "Alice", "again");

        assert_eq!(history, before);
    }

    #[test]
    fn chatml_format_is_honored() {
        let assembler = PromptAssembler::new(
            Persona {
                name: "Cirno".into(),
                instruction: "Be cold.".into(),
            },
            InstructFormat::ChatMl,
            SamplingParameters::default(),
        );

        let request = assembler.build(&[], "Alice", "hi");

        assert_eq!(
            request.prompt(),
            "<|im_start|>system\nBe cold.<|im_end|>\n\
             <|im_start|>user\nAlice: hi<|im_end|>\n\
             <|im_start|>assistant\nCirno: "
        );
    }
}
