//! services/alchemist/src/bin/alchemist.rs
//!
//! Interactive terminal front end: API setup, the project wizard, generation
//! and the reader.

use alchemist_lib::{config::Config, error::AppError, export::write_exports, state::AppState};
use book_alchemist_core::{
    AiProvider, ApiConfig, Audience, GenerationOutcome, GenerationPhase, Genre, Project, Scope,
    WizardStep, WritingStyle, EMOTIONS,
};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
    info!("Configuration loaded. Starting Buch-Alchemist...");

    // --- 2. Load the Workspace & Wire the Controller ---
    let app = AppState::build(config).await?;
    let mut console = Console::new();

    // --- 3. Run the Interactive Loop ---
    loop {
        if app.store.current_api_config().await.is_none() {
            if !setup_api(&app, &mut console).await? {
                break;
            }
            continue;
        }
        match app.store.active().await {
            None => {
                if !welcome(&app, &mut console).await? {
                    break;
                }
            }
            Some(project) => project_step(&app, &mut console, project).await?,
        }
    }

    info!("Goodbye.");
    Ok(())
}

//=========================================================================================
// Console Helpers
//=========================================================================================

struct Console {
    lines: Lines<BufReader<Stdin>>,
}

impl Console {
    fn new() -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
        }
    }

    /// Prints the label and reads one trimmed line; `None` on end of input.
    async fn ask(&mut self, label: &str) -> Result<Option<String>, AppError> {
        println!("{}", label);
        Ok(self.lines.next_line().await?.map(|line| line.trim().to_string()))
    }

    /// Like `ask`, but an empty answer keeps `current`.
    async fn ask_or_keep(&mut self, label: &str, current: &str) -> Result<String, AppError> {
        let answer = self.ask(&format!("{} [{}]", label, current)).await?;
        Ok(match answer {
            Some(a) if !a.is_empty() => a,
            _ => current.to_string(),
        })
    }

    /// Offers numbered options and returns the chosen index.
    async fn choose(&mut self, label: &str, options: &[&str], current: usize) -> Result<usize, AppError> {
        println!("{}", label);
        for (i, option) in options.iter().enumerate() {
            let marker = if i == current { "*" } else { " " };
            println!(" {} {}) {}", marker, i + 1, option);
        }
        let answer = self.ask("Nummer (Enter behält die Auswahl):").await?;
        Ok(answer
            .and_then(|a| a.parse::<usize>().ok())
            .filter(|n| (1..=options.len()).contains(n))
            .map(|n| n - 1)
            .unwrap_or(current))
    }
}

//=========================================================================================
// Screens
//=========================================================================================

/// Returns `false` when the user wants to quit.
async fn setup_api(app: &AppState, console: &mut Console) -> Result<bool, AppError> {
    println!("\n== Verbindung zur Quelle ==");
    let labels: Vec<&str> = AiProvider::ALL.iter().map(|p| p.label()).collect();
    let provider = AiProvider::ALL[console.choose("Anbieter:", &labels, 0).await?];
    let Some(key) = console.ask("API-Schlüssel (leer = beenden):").await? else {
        return Ok(false);
    };
    if key.is_empty() {
        return Ok(false);
    }
    app.store.set_api_config(Some(ApiConfig { provider, key })).await?;
    Ok(true)
}

/// Returns `false` when the user wants to quit.
async fn welcome(app: &AppState, console: &mut Console) -> Result<bool, AppError> {
    let projects = app.store.projects().await;
    println!("\n== Buch-Alchemist ==");
    for (i, project) in projects.iter().enumerate() {
        println!(
            " {}) {} ({} Seiten, erstellt {})",
            i + 1,
            project.name,
            project.pages.len(),
            project.created_at.format("%d.%m.%Y")
        );
    }
    let Some(answer) = console
        .ask("[n]eues Projekt, [l <nr>] laden, [d <nr>] löschen, [k] API-Schlüssel, [q] beenden")
        .await?
    else {
        return Ok(false);
    };

    let mut parts = answer.split_whitespace();
    let command = parts.next().unwrap_or_default();
    let picked = parts
        .next()
        .and_then(|n| n.parse::<usize>().ok())
        .and_then(|n| n.checked_sub(1))
        .and_then(|i| projects.get(i))
        .map(|p| p.id);

    match (command, picked) {
        ("n", _) => {
            app.store.start_new_project().await?;
        }
        ("l", Some(id)) => {
            app.store.load_project(id).await?;
        }
        ("d", Some(id)) => {
            app.controller.discard_session().await;
            app.store.delete_project(id).await?;
        }
        ("k", _) => {
            setup_api(app, console).await?;
        }
        ("q", _) => return Ok(false),
        _ => println!("Unbekannte Eingabe."),
    }
    Ok(true)
}

async fn project_step(app: &AppState, console: &mut Console, project: Project) -> Result<(), AppError> {
    match project.current_step {
        WizardStep::STORY => story_step(app, console, &project).await,
        WizardStep::SOUL => soul_step(app, console, &project).await,
        WizardStep::AUDIENCE => audience_step(app, console, &project).await,
        WizardStep::DETAILS => details_step(app, console, &project).await,
        WizardStep::SUMMARY | WizardStep::SUMMARY_WITH_ERROR => summary_step(app, console, &project).await,
        WizardStep::MOMENT_OF_CREATION => {
            println!("\n✨ Dein Buch ist erschaffen. ✨");
            if let Some(message) = app.controller.status().error {
                println!("{}", message);
            }
            console.ask("Enter zum Lesen.").await?;
            app.store.set_current_step(WizardStep::READER).await?;
            Ok(())
        }
        WizardStep::READER => reader_step(app, console, &project).await,
        _ => {
            app.store.set_current_step(WizardStep::SUMMARY).await?;
            Ok(())
        }
    }
}

async fn story_step(app: &AppState, console: &mut Console, project: &Project) -> Result<(), AppError> {
    println!("\n== 1. Der göttliche Funke ==");
    let story = console.ask_or_keep("Deine Geschichte:", &project.data.story).await?;
    app.store.update_book_data(|data| data.story = story).await?;
    app.store.next_step().await?;
    Ok(())
}

async fn soul_step(app: &AppState, console: &mut Console, project: &Project) -> Result<(), AppError> {
    println!("\n== 2. Die Seele ==");
    let core_message = console
        .ask_or_keep("Kernbotschaft:", &project.data.core_message)
        .await?;
    println!("Emotionen (Nummern umschalten, Enter = fertig):");
    let mut draft = project.data.clone();
    loop {
        for (i, emotion) in EMOTIONS.iter().enumerate() {
            let marker = if draft.emotions.iter().any(|e| e == emotion) { "x" } else { " " };
            println!(" [{}] {}) {}", marker, i + 1, emotion);
        }
        let Some(answer) = console.ask("Nummer:").await? else { break };
        let Some(index) = answer.parse::<usize>().ok().and_then(|n| n.checked_sub(1)) else {
            break;
        };
        if let Some(emotion) = EMOTIONS.get(index) {
            draft.toggle_emotion(emotion);
        }
    }
    app.store
        .update_book_data(|data| {
            data.core_message = core_message;
            data.emotions = draft.emotions;
        })
        .await?;
    app.store.next_step().await?;
    Ok(())
}

async fn audience_step(app: &AppState, console: &mut Console, project: &Project) -> Result<(), AppError> {
    println!("\n== 3. Die Signatur ==");
    let data = &project.data;
    let audience = pick(console, "Zielgruppe:", &Audience::ALL, data.audience, |a| a.label()).await?;
    let style = pick(console, "Stil:", &WritingStyle::ALL, data.writing_style, |s| s.label()).await?;
    let genre = pick(console, "Genre:", &Genre::ALL, data.genre, |g| g.label()).await?;
    app.store
        .update_book_data(|data| {
            data.audience = audience;
            data.writing_style = style;
            data.genre = genre;
        })
        .await?;
    app.store.next_step().await?;
    Ok(())
}

async fn details_step(app: &AppState, console: &mut Console, project: &Project) -> Result<(), AppError> {
    println!("\n== 4. Der Name ==");
    let title = console.ask_or_keep("Titel:", &project.data.title).await?;
    let author = console.ask_or_keep("Autor:", &project.data.author).await?;
    let scope = pick(console, "Umfang:", &Scope::ALL, project.data.scope, |s| s.label()).await?;
    app.store
        .update_book_data(|data| {
            data.title = title;
            data.author = author;
            data.scope = scope;
        })
        .await?;
    app.store.next_step().await?;
    Ok(())
}

async fn pick<T: Copy + PartialEq>(
    console: &mut Console,
    label: &str,
    all: &[T],
    current: T,
    label_of: impl Fn(T) -> &'static str,
) -> Result<T, AppError> {
    let labels: Vec<&str> = all.iter().map(|v| label_of(*v)).collect();
    let index = all.iter().position(|v| *v == current).unwrap_or(0);
    Ok(all[console.choose(label, &labels, index).await?])
}

async fn summary_step(app: &AppState, console: &mut Console, project: &Project) -> Result<(), AppError> {
    let data = &project.data;
    println!("\n== 5. Die Kristallisation ==");
    println!("Titel: {} / Autor: {}", data.title, data.author);
    println!("Geschichte: {}", data.story);
    println!("Kernbotschaft: {}", data.core_message);
    println!("Emotionen: {}", data.emotions.join(", "));
    println!(
        "{} / {} / {} / {}",
        data.audience.label(),
        data.writing_style.label(),
        data.genre.label(),
        data.scope.label()
    );
    if project.current_step == WizardStep::SUMMARY_WITH_ERROR {
        if let Some(message) = app.controller.status().error {
            println!("⚠ {}", message);
        }
    }

    let Some(answer) = console
        .ask("[s] Seite für Seite, [a] ganzes Buch, [e <schritt>] bearbeiten, [z]urück, [x] Projekt verlassen")
        .await?
    else {
        app.store.exit_project().await?;
        return Ok(());
    };
    let mut parts = answer.split_whitespace();
    match parts.next().unwrap_or_default() {
        "s" => {
            println!("Die Schöpfung beginnt...");
            report(app.controller.start_interactive().await?);
        }
        "a" => run_automatic(app).await?,
        "e" => {
            let step = parts.next().and_then(|s| s.parse::<u8>().ok()).unwrap_or(WizardStep::STORY);
            app.store.set_current_step(step.min(WizardStep::DETAILS)).await?;
        }
        "z" => {
            app.store.set_current_step(WizardStep::DETAILS).await?;
        }
        "x" => app.store.exit_project().await?,
        _ => println!("Unbekannte Eingabe."),
    }
    Ok(())
}

/// Runs the automatic loop while printing progress as pages arrive.
async fn run_automatic(app: &AppState) -> Result<(), AppError> {
    let mut updates = app.controller.subscribe();
    let progress = tokio::spawn(async move {
        let mut shown = 0;
        while updates.changed().await.is_ok() {
            let status = updates.borrow_and_update().clone();
            if status.phase == GenerationPhase::AutoLooping && status.progress > shown {
                shown = status.progress;
                println!("… {} Seiten manifestiert", shown);
            }
        }
    });
    let outcome = app.controller.start_automatic().await;
    progress.abort();
    report(outcome?);
    Ok(())
}

fn report(outcome: GenerationOutcome) {
    match outcome {
        GenerationOutcome::Ready { pages } | GenerationOutcome::Appended { pages } => {
            println!("{} neue Seite(n).", pages)
        }
        GenerationOutcome::Completed { pages, .. } => println!("Fertig: {} Seiten.", pages),
        GenerationOutcome::Interrupted { message, .. } | GenerationOutcome::Failed { message } => {
            error!("{}", message);
            println!("⚠ {}", message);
        }
        GenerationOutcome::Skipped => println!("Keine weitere Seite angefordert."),
        GenerationOutcome::Abandoned => println!("Das Projekt wurde verlassen."),
    }
}

async fn reader_step(app: &AppState, console: &mut Console, project: &Project) -> Result<(), AppError> {
    println!("\n== {} ==", project.data.title);
    for (i, page) in project.pages.iter().enumerate() {
        println!("\n--- Seite {} ---\n{}", i + 1, page);
    }
    let Some(answer) = console
        .ask("\n[n] nächste Seite, [e] exportieren, [x] Projekt verlassen")
        .await?
    else {
        leave(app).await?;
        return Ok(());
    };
    match answer.as_str() {
        "n" => {
            if !app.controller.has_session().await {
                println!("Keine laufende Sitzung. Starte die Schöpfung in der Zusammenfassung neu.");
            }
            report(app.controller.fetch_next_page().await);
        }
        "e" => {
            let dir = app.config.data_dir.join("exports").join(project_dir(project.id));
            match write_exports(&dir, project).await {
                Ok((text, document)) => {
                    println!("Gespeichert: {} und {}", text.display(), document.display())
                }
                Err(e) => {
                    error!(project_id = %project.id, error = %e, "Export failed.");
                    println!("⚠ Export fehlgeschlagen: {}", e);
                }
            }
        }
        "x" => leave(app).await?,
        _ => println!("Unbekannte Eingabe."),
    }
    Ok(())
}

async fn leave(app: &AppState) -> Result<(), AppError> {
    app.controller.discard_session().await;
    app.store.exit_project().await
}

fn project_dir(id: Uuid) -> String {
    id.simple().to_string()
}
