//! Echo: reads every key back to the caller.

use super::{AppTask, Prompts};
use async_trait::async_trait;
use aui_core::{AppMeta, Application, AuiResult, Lifecycle, SessionContext};

pub(crate) const NAME: &str = "echo";

/// Speaks back every key until `*`.
pub struct EchoApp {
    task: AppTask,
}

impl EchoApp {
    pub fn new() -> Self {
        Self {
            task: AppTask::new(NAME),
        }
    }
}

impl Default for EchoApp {
    fn default() -> Self {
        Self::new()
    }
}

async fn dialog(ctx: SessionContext) -> AuiResult<()> {
    let prompts = Prompts::for_lang(ctx.options().lang);
    ctx.say_wait(prompts.echo_intro).await?;
    while let Some(key) = ctx.get_digit(None).await {
        if key == '*' {
            break;
        }
        ctx.say_wait(&key.to_string()).await?;
    }
    ctx.say_wait(prompts.goodbye).await?;
    Ok(())
}

#[async_trait]
impl Lifecycle for EchoApp {
    async fn start(&self) -> AuiResult<()> {
        self.task.spawn(dialog)
    }

    async fn stop(&self) -> AuiResult<()> {
        self.task.halt().await;
        Ok(())
    }
}

#[async_trait]
impl Application for EchoApp {
    fn meta(&self) -> AppMeta {
        AppMeta::new(NAME, "Key echo").with_description("Repeats every key, * ends")
    }

    async fn init(&self, ctx: SessionContext) -> AuiResult<()> {
        self.task.bind(ctx);
        Ok(())
    }

    async fn finished(&self) {
        self.task.finished().await
    }
}
