//! Digit menu: announces the choices and answers each key until 0 is pressed.

use super::{spaced, AppTask, Prompts};
use async_trait::async_trait;
use aui_core::{AppMeta, Application, AuiResult, Lifecycle, SessionContext};
use std::time::Duration;
use tracing::debug;

pub(crate) const NAME: &str = "menu";

const CHOICE_TIMEOUT: Duration = Duration::from_secs(10);
/// Unanswered menu rounds before the dialog gives up.
const MAX_SILENT_ROUNDS: u32 = 3;
const NUMBER_LENGTH: usize = 4;

/// Digit menu: `1` runs a yes/no confirmation, `2` reads a short number back,
/// `#` repeats the menu and `0` ends the call.
pub struct MenuApp {
    task: AppTask,
}

impl MenuApp {
    pub fn new() -> Self {
        Self {
            task: AppTask::new(NAME),
        }
    }
}

impl Default for MenuApp {
    fn default() -> Self {
        Self::new()
    }
}

async fn dialog(ctx: SessionContext) -> AuiResult<()> {
    let prompts = Prompts::for_lang(ctx.options().lang);
    ctx.say_wait(prompts.welcome).await?;

    let mut silent_rounds = 0;
    loop {
        let Some(choice) = ctx
            .say_and_get_digit(prompts.menu, Some(CHOICE_TIMEOUT))
            .await?
        else {
            silent_rounds += 1;
            if silent_rounds >= MAX_SILENT_ROUNDS {
                ctx.say_wait(prompts.goodbye).await?;
                return Ok(());
            }
            continue;
        };
        silent_rounds = 0;
        debug!(choice = %choice, "menu choice");

        match choice.as_char() {
            '1' => {
                let reply = match ctx.confirm(prompts.confirm, Some(CHOICE_TIMEOUT)).await? {
                    Some(true) => prompts.confirmed,
                    Some(false) => prompts.declined,
                    None => prompts.no_answer,
                };
                ctx.say_wait(reply).await?;
            }
            '2' => {
                ctx.say_wait(prompts.enter_number).await?;
                let number = ctx
                    .read_digits(NUMBER_LENGTH, Some(CHOICE_TIMEOUT), Some('#'))
                    .await;
                if number.is_empty() {
                    ctx.say_wait(prompts.no_answer).await?;
                } else {
                    ctx.say_wait(&format!("{} {}", prompts.you_entered, spaced(&number)))
                        .await?;
                }
            }
            '#' => {}
            '0' => {
                ctx.say_wait(prompts.goodbye).await?;
                return Ok(());
            }
            _ => {
                ctx.say_wait(prompts.invalid).await?;
            }
        }
    }
}

#[async_trait]
impl Lifecycle for MenuApp {
    async fn start(&self) -> AuiResult<()> {
        self.task.spawn(dialog)
    }

    async fn stop(&self) -> AuiResult<()> {
        self.task.halt().await;
        Ok(())
    }
}

#[async_trait]
impl Application for MenuApp {
    fn meta(&self) -> AppMeta {
        AppMeta::new(NAME, "Digit menu")
            .with_description("Confirmation, number entry, repeat with #, end with 0")
    }

    async fn init(&self, ctx: SessionContext) -> AuiResult<()> {
        self.task.bind(ctx);
        Ok(())
    }

    async fn finished(&self) {
        self.task.finished().await
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::headless;
    use std::time::Duration;
    use tokio_test::assert_ok;

    async fn run_to_end(digits: &str) {
        let orchestrator = headless(digits).await;
        assert_ok!(orchestrator.start_app("menu").await);
        assert_ok!(tokio::time::timeout(Duration::from_secs(5), orchestrator.wait_app()).await);
        let ctx = orchestrator.current_context().await.unwrap();
        assert!(ctx.digits().is_empty());
        orchestrator.shutdown().await;
    }

    #[tokio::test]
    async fn zero_ends_the_call() {
        run_to_end("0").await;
    }

    #[tokio::test]
    async fn confirmation_then_end() {
        run_to_end("110").await;
        run_to_end("120").await;
    }

    #[tokio::test]
    async fn number_entry_stops_at_terminator() {
        run_to_end("242#0").await;
    }

    #[tokio::test]
    async fn repeat_and_invalid_choices_keep_the_menu_running() {
        run_to_end("#9*0").await;
    }

    #[tokio::test]
    async fn stop_interrupts_a_waiting_dialog() {
        let orchestrator = headless("").await;
        assert_ok!(orchestrator.start_app("menu").await);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(orchestrator.stop_app().await);
        assert!(orchestrator.app_name().await.is_none());
        orchestrator.shutdown().await;
    }
}
