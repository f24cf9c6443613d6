//! Entity-specific ingestion pipelines.

pub mod anime;
pub mod character;
pub mod company;
pub mod genre;

pub use anime::AnimePipeline;
pub use character::CharacterPipeline;
pub use company::CompanyPipeline;
pub use genre::GenrePipeline;

/// Cap free-text fields at a character budget, respecting char boundaries
pub(crate) fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        text.chars().take(max_chars).collect()
    }
}

/// Maximum stored length for synopsis and description text
pub(crate) const MAX_TEXT_CHARS: usize = 5000;
