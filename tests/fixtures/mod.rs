//! Prompt fixtures for E2E testing

/// A generation request together with what the server should do with it
#[derive(Debug, Clone)]
pub struct PromptFixture {
    pub prompt: &'static str,
    pub video_length: Option<u32>,
    pub infer_steps: Option<u32>,
    pub seed: Option<u64>,
    pub description: &'static str,
}

/// Requests kept small (few inference steps) so a simulated model finishes quickly.
pub const PROMPT_FIXTURES: &[PromptFixture] = &[
    PromptFixture {
        prompt: "A cat walks on the grass, realistic style.",
        video_length: Some(65),
        infer_steps: Some(5),
        seed: None,
        description: "Short clip, producer-chosen seed",
    },
    PromptFixture {
        prompt: "An eagle soaring over snowy mountains at sunrise.",
        video_length: None,
        infer_steps: Some(10),
        seed: Some(42),
        description: "Default length, fixed seed",
    },
    PromptFixture {
        prompt: "Rain falling on a neon-lit city street at night.",
        video_length: Some(33),
        infer_steps: Some(3),
        seed: Some(7),
        description: "Very short clip, fixed seed",
    },
];

/// Bodies the server must reject with 400 INVALID_SPECIFICATION
pub const INVALID_BODIES: &[(&str, &str)] = &[
    ("{}", "missing prompt"),
    (r#"{"prompt": "   "}"#, "blank prompt"),
    (r#"{"prompt": "ok", "video_width": 0}"#, "zero width"),
    (r#"{"prompt": "ok", "infer_steps": 100000}"#, "too many steps"),
];
