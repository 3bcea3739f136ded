pub mod character;
pub mod disambiguate;
pub mod fallback;
pub mod identify;
pub mod label;
pub mod llm;
pub mod parse;
pub mod pipeline;
pub mod prompts;
pub mod research;
pub mod transcription;
pub mod voice;
