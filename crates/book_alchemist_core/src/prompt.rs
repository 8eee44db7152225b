//! crates/book_alchemist_core/src/prompt.rs
//!
//! Builds the conversation seed from the collected creative parameters.

use crate::domain::{BookData, ChatMessage, Scope};

/// The first real turn of every generation run.
pub const FIRST_TURN: &str = "Beginne jetzt mit der Cover-Vision.";

const ACK_REQUEST: &str = "Bitte bestätige, dass du die Anweisungen verstanden hast und bereit bist. Gib nur eine kurze Bestätigung aus.";

const ACK_WITH_SETUP: &str = "Verstanden. Ich bin bereit, die Schöpfung zu beginnen. Ich warte auf den Befehl, mit der Cover-Vision zu starten.";

const ACK_IN_SESSION: &str = "Verstanden. Ich bin bereit, die Schöpfung zu beginnen. Ich werde mit der Cover-Vision starten und dann auf den Befehl 'next' für jede weitere Seite warten.";

/// The instructions that open a conversation, derived from one `BookData`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationSeed {
    pub instructions: String,
}

impl ConversationSeed {
    /// Three-message seed for chat-completion backends:
    /// system instructions, an acknowledgement request, the canned acknowledgement.
    pub fn setup_messages(&self) -> Vec<ChatMessage> {
        vec![
            ChatMessage::system(self.instructions.clone()),
            ChatMessage::user(ACK_REQUEST),
            ChatMessage::assistant(ACK_WITH_SETUP),
        ]
    }

    /// Two-turn history for session backends: the instructions as a user turn
    /// followed by the model's acknowledgement.
    pub fn session_history(&self) -> Vec<ChatMessage> {
        vec![
            ChatMessage::user(self.instructions.clone()),
            ChatMessage::assistant(ACK_IN_SESSION),
        ]
    }
}

/// Page-count band and pacing guidance for each scope.
pub fn scope_instructions(scope: Scope) -> &'static str {
    match scope {
        Scope::Spark => "Dies ist ein 'Seelenfunke' mit einem Ziel von ca. 20-40 Seiten. Erzähle knapp und fokussiert, ohne Nebenhandlungen. Das Tempo ist zügig, jedes Kapitel kurz und wirkungsvoll.",
        Scope::Heartbeat => "Dies ist ein 'Herzschlag' mit einem Ziel von ca. 80-120 Seiten. Es gibt Raum für ausführlichere Charakterentwicklung, lebendige Weltbeschreibungen und längere Szenen. Das Tempo ist moderat; kleinere Nebenhandlungen dürfen die Hauptgeschichte stützen.",
        Scope::Epic => "Dies ist ein 'Epos des Lebens' mit einem Ziel von über 200 Seiten. Entwickle komplexe Nebenhandlungen und vielschichtige Nebenfiguren, baue die Welt sehr detailreich auf und beleuchte die Kernthemen aus mehreren Perspektiven. Das Tempo ist bewusst langsam. Erweitere die Original-Story kräftig um neue Ereignisse, Dialoge und Wendungen in ihrem Geist.",
    }
}

/// Builds the seed. Pure and deterministic.
pub fn build_seed(data: &BookData) -> ConversationSeed {
    let instructions = format!(
        r#"Handle als weiser Geschichtenerzähler, spiritueller Ghostwriter und liebevoller Mentor. Erschaffe aus der folgenden Story-Essenz und ihren Parametern ein vollständiges, strukturiertes Buch.

LEITPLANKE: Das Werk trägt eine positive, aufbauende und heilsame Grundenergie.

WICHTIG: Das Buch entsteht Seite für Seite. Jede Antwort enthält NUR den Inhalt EINER Seite. Beende jede Seite mit einer Seitenangabe (z.B. 'Seite X von ca. Y'). Beginne IMMER mit der Cover-Vision.

Parameter der Schöpfung:
 * Original-Story: "{story}"
 * Kernbotschaft: "{core_message}". Sie ist der rote Faden jeder Zeile.
 * Emotionale Resonanz: "{emotions}". Webe sie in Atmosphäre, Dialoge und Beschreibungen ein.
 * Zielgruppe: "{audience}". Passe Sprache und Komplexität an.
 * Stil: "{style}".
 * Genre: "{genre}".
 * Buchtitel: "{title}"
 * Autor: "{author}"
 * Umfang: "{scope}"

UMFANG & TAKTUNG:
{scope_instructions}
Die Angabe 'ca. Y' auf jeder Seite spiegelt diesen Umfang wider.

Reihenfolge: Cover-Vision, Titelseite, Impressum mit allen Parametern dieser Schöpfung, Widmung, Inhaltsverzeichnis, Hauptteil, Epilog, Danksagung, Klapptext.

Wenn das Buch vollständig ist, schreibe auf die letzte Seite den Satz "Ende der Buch-Manifestation".

Antworte IMMER NUR mit EINER Seite und warte danach auf den Befehl 'next'."#,
        story = data.story,
        core_message = data.core_message,
        emotions = data.emotions.join(", "),
        audience = data.audience.label(),
        style = data.writing_style.label(),
        genre = data.genre.label(),
        title = data.title,
        author = data.author,
        scope = data.scope.label(),
        scope_instructions = scope_instructions(data.scope),
    );

    ConversationSeed { instructions }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Audience, ChatRole, Genre, WritingStyle};

    fn sample() -> BookData {
        BookData {
            story: "Ein Fuchs sucht das Licht.".into(),
            core_message: "Mut wächst im Dunkeln".into(),
            emotions: vec!["Staunen".into(), "Mut".into(), "Hoffnung".into()],
            audience: Audience::Children,
            writing_style: WritingStyle::Humorous,
            genre: Genre::FairyTale,
            title: "Der Lichtfuchs".into(),
            author: "Mira Sand".into(),
            scope: Scope::Spark,
        }
    }

    #[test]
    fn seed_encodes_every_parameter() {
        let seed = build_seed(&sample());
        let text = &seed.instructions;
        assert!(text.contains("Ein Fuchs sucht das Licht."));
        assert!(text.contains("Mut wächst im Dunkeln"));
        assert!(text.contains("\"Staunen, Mut, Hoffnung\""));
        assert!(text.contains(Audience::Children.label()));
        assert!(text.contains(WritingStyle::Humorous.label()));
        assert!(text.contains(Genre::FairyTale.label()));
        assert!(text.contains("Der Lichtfuchs"));
        assert!(text.contains("Mira Sand"));
        assert!(text.contains(Scope::Spark.label()));
        assert!(text.contains(scope_instructions(Scope::Spark)));
    }

    #[test]
    fn seed_is_deterministic() {
        assert_eq!(build_seed(&sample()), build_seed(&sample()));
    }

    #[test]
    fn each_scope_has_its_own_guidance() {
        assert!(scope_instructions(Scope::Spark).contains("20-40"));
        assert!(scope_instructions(Scope::Heartbeat).contains("80-120"));
        assert!(scope_instructions(Scope::Epic).contains("200"));
    }

    #[test]
    fn setup_messages_are_system_user_assistant() {
        let seed = build_seed(&sample());
        let roles: Vec<ChatRole> = seed.setup_messages().iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![ChatRole::System, ChatRole::User, ChatRole::Assistant]);
        assert_eq!(seed.setup_messages()[0].content, seed.instructions);

        let history = seed.session_history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].role, ChatRole::User);
        assert_eq!(history[1].role, ChatRole::Assistant);
    }
}
