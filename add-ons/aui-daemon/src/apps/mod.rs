//! Demo voice applications shipped with the daemon.

mod echo;
mod menu;

pub use echo::EchoApp;
pub use menu::MenuApp;

use aui_core::{Application, AuiError, AuiResult, CancelToken, Extensions, Lang, SessionContext};
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Publish `menu` and `echo`.
pub fn register_apps(extensions: &Extensions) {
    extensions
        .apps
        .register(menu::NAME, |_| Ok(Arc::new(MenuApp::new()) as Arc<dyn Application>));
    extensions
        .apps
        .register(echo::NAME, |_| Ok(Arc::new(EchoApp::new()) as Arc<dyn Application>));
}

/// The dialog task of one application instance.
///
/// `spawn` runs the dialog on the runtime; `finished` resolves once it returns
/// (or `halt` is called). An instance runs at most once.
pub(crate) struct AppTask {
    name: &'static str,
    ctx: Mutex<Option<SessionContext>>,
    task: Mutex<Option<JoinHandle<()>>>,
    done: CancelToken,
}

impl AppTask {
    pub(crate) fn new(name: &'static str) -> Self {
        Self {
            name,
            ctx: Mutex::new(None),
            task: Mutex::new(None),
            done: CancelToken::new(),
        }
    }

    pub(crate) fn bind(&self, ctx: SessionContext) {
        *self.ctx.lock().unwrap_or_else(PoisonError::into_inner) = Some(ctx);
    }

    fn context(&self) -> Option<SessionContext> {
        self.ctx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn spawn<F, Fut>(&self, dialog: F) -> AuiResult<()>
    where
        F: FnOnce(SessionContext) -> Fut,
        Fut: Future<Output = AuiResult<()>> + Send + 'static,
    {
        let ctx = self.context().ok_or(AuiError::ContextUnavailable)?;
        let name = self.name;
        let done = self.done.clone();
        let dialog = dialog(ctx);
        let handle = tokio::spawn(async move {
            match dialog.await {
                Ok(()) => info!(app = name, "dialog finished"),
                Err(e) => error!(app = name, error = %e, "dialog failed"),
            }
            done.cancel();
        });
        if let Some(previous) = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(handle)
        {
            previous.abort();
        }
        Ok(())
    }

    /// Abort the dialog and silence the line.
    pub(crate) async fn halt(&self) {
        let handle = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            handle.abort();
        }
        if let Some(ctx) = self.context() {
            ctx.stop_audio().await;
        }
        self.done.cancel();
    }

    pub(crate) async fn finished(&self) {
        self.done.cancelled().await
    }
}

/// Prompt texts of the demo applications.
pub(crate) struct Prompts {
    pub welcome: &'static str,
    pub menu: &'static str,
    pub confirm: &'static str,
    pub confirmed: &'static str,
    pub declined: &'static str,
    pub no_answer: &'static str,
    pub enter_number: &'static str,
    pub you_entered: &'static str,
    pub invalid: &'static str,
    pub goodbye: &'static str,
    pub echo_intro: &'static str,
}

const PROMPTS_DE: Prompts = Prompts {
    welcome: "Willkommen beim Sprachdialog.",
    menu: "Für eine Bestätigung drücken Sie 1. Für eine Nummerneingabe drücken Sie 2. \
           Zum Wiederholen drücken Sie #. Zum Beenden drücken Sie 0.",
    confirm: "Möchten Sie fortfahren? Ja mit 1, nein mit 2.",
    confirmed: "Bestätigt.",
    declined: "Abgebrochen.",
    no_answer: "Keine Eingabe erkannt.",
    enter_number: "Bitte geben Sie bis zu vier Ziffern ein und schließen Sie mit # ab.",
    you_entered: "Sie haben eingegeben:",
    invalid: "Ungültige Eingabe.",
    goodbye: "Auf Wiederhören.",
    echo_intro: "Jede Taste wird wiederholt. Mit * beenden Sie.",
};

const PROMPTS_EN: Prompts = Prompts {
    welcome: "Welcome to the voice dialog.",
    menu: "For a confirmation press 1. To enter a number press 2. \
           To repeat press #. To end press 0.",
    confirm: "Do you want to continue? Yes with 1, no with 2.",
    confirmed: "Confirmed.",
    declined: "Cancelled.",
    no_answer: "No input detected.",
    enter_number: "Please enter up to four digits and finish with #.",
    you_entered: "You entered:",
    invalid: "Invalid input.",
    goodbye: "Goodbye.",
    echo_intro: "Every key is repeated. Press * to end.",
};

impl Prompts {
    pub(crate) fn for_lang(lang: Lang) -> &'static Prompts {
        match lang {
            Lang::De => &PROMPTS_DE,
            Lang::En => &PROMPTS_EN,
        }
    }
}

/// `"123"` → `"1 2 3"`, so engines read digits one by one.
pub(crate) fn spaced(digits: &str) -> String {
    digits
        .chars()
        .map(String::from)
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
pub(crate) mod testing {
    use super::register_apps;
    use aui_core::{Extensions, InitArgs, Orchestrator, SessionOptions};

    /// Orchestrator on the headless line with `digits` scripted and fast playback.
    pub(crate) async fn headless(digits: &str) -> Orchestrator {
        let extensions = Extensions::default();
        aui_voice::register_defaults(&extensions);
        register_apps(&extensions);

        let orchestrator = Orchestrator::new(&extensions, SessionOptions::default());
        let adapter_args = InitArgs::from([
            ("digits".to_string(), digits.to_string()),
            ("speed".to_string(), "50".to_string()),
        ]);
        let tts_args = InitArgs::from([("word_ms".to_string(), "10".to_string())]);
        orchestrator
            .select_backends_with(Some(("null", &adapter_args)), Some(("tone", &tts_args)))
            .await
            .unwrap();
        orchestrator
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spaced_separates_digits() {
        assert_eq!(spaced("4711"), "4 7 1 1");
        assert_eq!(spaced(""), "");
    }

    #[tokio::test]
    async fn apps_are_listed_with_meta() {
        let orchestrator = testing::headless("").await;
        let names: Vec<_> = orchestrator.list_apps().into_iter().map(|m| m.name).collect();
        assert_eq!(names, vec!["echo", "menu"]);
    }

    #[tokio::test]
    async fn spawn_without_context_is_rejected() {
        let task = AppTask::new("unbound");
        assert!(matches!(
            task.spawn(|_| async { Ok(()) }),
            Err(AuiError::ContextUnavailable)
        ));
    }
}
