//! crates/book_alchemist_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs carry no I/O; serde derives exist only so that adapters can
//! persist them without a second set of record types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Placeholder name for a project whose title has not been set yet.
pub const UNNAMED_PROJECT: &str = "Unbenanntes Projekt";

/// The emotions a user can pick from on the "soul" step.
pub const EMOTIONS: [&str; 7] = [
    "Hoffnung",
    "Mut",
    "Liebe",
    "Staunen",
    "Trost",
    "Inspiration",
    "Transformation",
];

//=========================================================================================
// Creative Parameters
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Audience {
    Children,
    Adults,
}

impl Audience {
    pub const ALL: [Audience; 2] = [Audience::Children, Audience::Adults];

    pub fn label(self) -> &'static str {
        match self {
            Audience::Children => "Für junge, erwachende Geister (Kinder)",
            Audience::Adults => "Für weise, suchende Seelen (Erwachsene)",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WritingStyle {
    Poetic,
    Dynamic,
    Humorous,
    Wise,
}

impl WritingStyle {
    pub const ALL: [WritingStyle; 4] = [
        WritingStyle::Poetic,
        WritingStyle::Dynamic,
        WritingStyle::Humorous,
        WritingStyle::Wise,
    ];

    pub fn label(self) -> &'static str {
        match self {
            WritingStyle::Poetic => "Poetischer Seelengesang",
            WritingStyle::Dynamic => "Dynamischer Energiefluss",
            WritingStyle::Humorous => "Herzliches Lachen des Universums",
            WritingStyle::Wise => "Weisheit der Zeitalter",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Genre {
    Fantasy,
    SciFi,
    Adventure,
    FairyTale,
    Spiritual,
}

impl Genre {
    pub const ALL: [Genre; 5] = [
        Genre::Fantasy,
        Genre::SciFi,
        Genre::Adventure,
        Genre::FairyTale,
        Genre::Spiritual,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Genre::Fantasy => "Fantasy",
            Genre::SciFi => "Science-Fiction",
            Genre::Adventure => "Abenteuer",
            Genre::FairyTale => "Märchen",
            Genre::Spiritual => "Lebenshilfe/Spiritueller Ratgeber",
        }
    }
}

/// The three size tiers a book can be generated in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    Spark,
    Heartbeat,
    Epic,
}

impl Scope {
    pub const ALL: [Scope; 3] = [Scope::Spark, Scope::Heartbeat, Scope::Epic];

    pub fn label(self) -> &'static str {
        match self {
            Scope::Spark => "Seelenfunke (~20-40 S.)",
            Scope::Heartbeat => "Herzschlag (~80-120 S.)",
            Scope::Epic => "Epos des Lebens (~200+ S.)",
        }
    }
}

/// The flat record of everything the wizard collects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookData {
    pub story: String,
    pub core_message: String,
    pub emotions: Vec<String>,
    pub audience: Audience,
    pub writing_style: WritingStyle,
    pub genre: Genre,
    pub title: String,
    pub author: String,
    pub scope: Scope,
}

impl Default for BookData {
    fn default() -> Self {
        Self {
            story: String::new(),
            core_message: String::new(),
            emotions: Vec::new(),
            audience: Audience::Adults,
            writing_style: WritingStyle::Poetic,
            genre: Genre::Fantasy,
            title: String::new(),
            author: String::new(),
            scope: Scope::Heartbeat,
        }
    }
}

impl BookData {
    /// Selects the emotion if it is not chosen yet, otherwise deselects it.
    /// Selection order is preserved.
    pub fn toggle_emotion(&mut self, emotion: &str) {
        if let Some(pos) = self.emotions.iter().position(|e| e == emotion) {
            self.emotions.remove(pos);
        } else {
            self.emotions.push(emotion.to_string());
        }
    }
}

//=========================================================================================
// Projects
//=========================================================================================

/// Wizard step numbers a project can sit on.
pub struct WizardStep;

impl WizardStep {
    pub const STORY: u8 = 1;
    pub const SOUL: u8 = 2;
    pub const AUDIENCE: u8 = 3;
    pub const DETAILS: u8 = 4;
    pub const SUMMARY: u8 = 5;
    /// The summary again, shown together with a generation error.
    pub const SUMMARY_WITH_ERROR: u8 = 6;
    pub const MANIFESTING: u8 = 7;
    pub const MOMENT_OF_CREATION: u8 = 8;
    pub const READER: u8 = 9;

    pub fn clamp(step: u8) -> u8 {
        step.clamp(Self::STORY, Self::READER)
    }
}

/// The aggregate root: one book in the making.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub current_step: u8,
    pub data: BookData,
    /// Generated pages, appended in whole batches only.
    #[serde(default)]
    pub pages: Vec<String>,
}

impl Project {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            name: UNNAMED_PROJECT.to_string(),
            created_at: Utc::now(),
            current_step: WizardStep::STORY,
            data: BookData::default(),
            pages: Vec::new(),
        }
    }

    pub fn last_page(&self) -> Option<&str> {
        self.pages.last().map(String::as_str)
    }
}

impl Default for Project {
    fn default() -> Self {
        Self::new()
    }
}

//=========================================================================================
// API Configuration
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AiProvider {
    Gemini,
    OpenAi,
}

impl AiProvider {
    pub const ALL: [AiProvider; 2] = [AiProvider::Gemini, AiProvider::OpenAi];

    pub fn label(self) -> &'static str {
        match self {
            AiProvider::Gemini => "Google Gemini",
            AiProvider::OpenAi => "OpenAI GPT",
        }
    }
}

impl fmt::Display for AiProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Which backend to talk to, and with which credential.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiConfig {
    pub provider: AiProvider,
    pub key: String,
}

// Hand-written so the credential never ends up in a log line.
impl fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiConfig")
            .field("provider", &self.provider)
            .field("key", &"<redacted>")
            .finish()
    }
}

//=========================================================================================
// Conversation Messages
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// One message of a conversation, in the shape chat-completion backends expect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: ChatRole::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: ChatRole::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: ChatRole::Assistant, content: content.into() }
    }
}
