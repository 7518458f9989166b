//! Terminal flashcard loop: Enter moves forward, `b` goes back, `q` quits.

use std::error::Error;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::warn;

use learn_core::study::Step;
use services::{FlashcardSession, LearnUpdate, PointService};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Next,
    Back,
    Quit,
    Unknown(String),
}

#[must_use]
pub fn parse_input(line: &str) -> Input {
    match line.trim() {
        "" | "n" => Input::Next,
        "b" => Input::Back,
        "q" => Input::Quit,
        other => Input::Unknown(other.to_owned()),
    }
}

/// How a study run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StudyOutcome {
    pub completed: bool,
    pub cards: usize,
}

#[must_use]
pub fn render_card(session: &FlashcardSession) -> String {
    let Some(word) = session.current() else {
        return "(this course has no words)\n".to_owned();
    };
    let total = session.cards().len();
    let mut out = format!("[{}/{}] {}", session.position() + 1, total, word.text);
    if let Some(pronunciation) = &word.pronunciation {
        out.push_str(&format!("  ({pronunciation})"));
    }
    out.push('\n');
    if !word.meaning.is_empty() {
        out.push_str(&format!("      {}\n", word.meaning));
    }
    out
}

fn describe(step: Step, update: Option<LearnUpdate>) -> String {
    let saved = match update {
        Some(LearnUpdate::Written { .. }) => "saved",
        Some(LearnUpdate::NotAdvanced { .. }) => "already recorded",
        Some(LearnUpdate::MissingRecord) | None => "not tracked",
    };
    format!("progress {} ({saved})\n", step.percentage())
}

/// Drive `session` from `input` until completion, quit, or end of input.
///
/// Completing the course saves one point per card.
///
/// # Errors
///
/// Returns an error if reading input, writing output, or saving the point fails.
pub async fn run_session<R, W>(
    session: &mut FlashcardSession,
    points: &PointService,
    input: R,
    output: &mut W,
) -> Result<StudyOutcome, Box<dyn Error>>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let cards = session.cards().len();
    if !session.is_tracking() {
        output
            .write_all(b"warning: progress is not being recorded this time\n")
            .await?;
    }
    output.write_all(render_card(session).as_bytes()).await?;

    let mut lines = input.lines();
    loop {
        output.write_all(b"[Enter] next  [b] back  [q] quit > ").await?;
        output.flush().await?;
        let Some(line) = lines.next_line().await? else {
            return Ok(StudyOutcome {
                completed: false,
                cards,
            });
        };

        match parse_input(&line) {
            Input::Next => {
                let step = match session.next().await {
                    Ok(advance) => {
                        output
                            .write_all(describe(advance.step, advance.update).as_bytes())
                            .await?;
                        advance.step
                    }
                    Err(err) => {
                        warn!(error = %err, "failed to report learn progress");
                        output.write_all(format!("warning: {err}\n").as_bytes()).await?;
                        continue;
                    }
                };
                if step == Step::Completed {
                    let score = u32::try_from(cards).unwrap_or(u32::MAX);
                    points
                        .save_point(session.user_id(), session.course_id(), score)
                        .await?;
                    output
                        .write_all(format!("course complete, +{score} points\n").as_bytes())
                        .await?;
                    return Ok(StudyOutcome {
                        completed: true,
                        cards,
                    });
                }
                output.write_all(render_card(session).as_bytes()).await?;
            }
            Input::Back => {
                if session.back() {
                    output.write_all(render_card(session).as_bytes()).await?;
                } else {
                    output.write_all(b"already on the first card\n").await?;
                }
            }
            Input::Quit => {
                return Ok(StudyOutcome {
                    completed: false,
                    cards,
                });
            }
            Input::Unknown(other) => {
                output
                    .write_all(format!("unknown command: {other}\n").as_bytes())
                    .await?;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use learn_core::model::{CourseId, Percentage, UserId};
    use learn_core::time::fixed_now;
    use services::{AppServices, CardOrder, Clock, ServicesConfig};
    use storage::Storage;
    use storage::seed::seed_demo_course;

    async fn seeded() -> (AppServices, FlashcardSession) {
        let storage = Storage::in_memory();
        let course = CourseId::new("spanish").unwrap();
        seed_demo_course(storage.documents.as_ref(), &course)
            .await
            .unwrap();
        let services =
            AppServices::new(&storage, Clock::fixed(fixed_now()), ServicesConfig::default());
        let session = services
            .open_flashcards(UserId::new("u1").unwrap(), course, CardOrder::Delivered)
            .await
            .unwrap();
        (services, session)
    }

    #[test]
    fn parses_commands() {
        assert_eq!(parse_input(""), Input::Next);
        assert_eq!(parse_input(" b "), Input::Back);
        assert_eq!(parse_input("q"), Input::Quit);
        assert_eq!(parse_input("x"), Input::Unknown("x".into()));
    }

    #[tokio::test]
    async fn quitting_keeps_partial_progress() {
        let (services, mut session) = seeded().await;
        let mut out = Vec::new();

        let outcome = run_session(&mut session, &services.points(), &b"\n\nb\nq\n"[..], &mut out)
            .await
            .unwrap();

        assert!(!outcome.completed);
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("[1/6] "));
        assert!(text.contains("progress 33% (saved)"));
        assert!(text.contains("[2/6]"));

        let id = session.progress_id().unwrap().clone();
        let stored = services.progress().get_progress(&id).await.unwrap().unwrap();
        assert_eq!(stored.learn_progress, Some(Percentage::of(2, 6)));
        assert_eq!(services.points().total_score(session.user_id()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn finishing_saves_a_point() {
        let (services, mut session) = seeded().await;
        let mut out = Vec::new();

        let outcome = run_session(&mut session, &services.points(), &b"\n\n\n\n\n\n"[..], &mut out)
            .await
            .unwrap();

        assert_eq!(
            outcome,
            StudyOutcome {
                completed: true,
                cards: 6
            }
        );
        assert_eq!(services.points().total_score(session.user_id()).await.unwrap(), 6);
    }

    #[tokio::test]
    async fn end_of_input_stops_without_completing() {
        let (services, mut session) = seeded().await;
        let mut out = Vec::new();

        let outcome = run_session(&mut session, &services.points(), &b""[..], &mut out)
            .await
            .unwrap();
        assert!(!outcome.completed);
        assert_eq!(session.position(), 0);
    }
}
