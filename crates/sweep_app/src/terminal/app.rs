use std::io::{self, BufRead, Write};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use sweep_core::{normalize_domain, update, AppState, Msg, PageLimits, ScanStatus};
use sweep_engine::{
    ensure_state_dir, ApiSettings, CommandTokenProvider, EngineConfig, EngineHandle, FileStore,
    MissingTokenProvider, StaticTokenProvider, SweepSettings, TokenProvider,
};
use sweep_logging::{sweep_debug, sweep_info};

use super::effects::EffectRunner;
use super::render;
use crate::cli::{Args, Command};

pub fn run(args: Args) -> Result<ExitCode> {
    ensure_state_dir(&args.state_dir)
        .with_context(|| format!("cannot use state directory {}", args.state_dir.display()))?;

    let config = EngineConfig {
        api: ApiSettings {
            api_base: args.api_base.clone(),
            ..ApiSettings::default()
        },
        sweep: SweepSettings {
            fetch_concurrency: usize::from(args.concurrency),
            ..SweepSettings::default()
        },
    };
    let limits = page_limits(&config.sweep);
    let store = Arc::new(FileStore::new(args.state_dir.clone()));
    let engine = EngineHandle::new(config, token_provider(&args), store)
        .context("failed to set up the mail client")?;

    let mut session = Session::new(EffectRunner::new(engine), limits);
    let outcome = session.execute(&args.command, args.top, confirm_on_stdin);
    session.shutdown();
    let output = outcome?;
    sweep_info!("Command finished (failed: {})", output.failed);
    print!("{}", output.stdout);
    if !output.status.is_empty() {
        eprintln!("{}", output.status);
    }
    Ok(if output.failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

/// The core clamps page requests with the same bounds the engine scans with.
fn page_limits(settings: &SweepSettings) -> PageLimits {
    PageLimits {
        default_pages: settings.default_pages,
        max_pages: settings.max_pages,
    }
}

fn token_provider(args: &Args) -> Arc<dyn TokenProvider> {
    if let Some(token) = &args.token {
        Arc::new(StaticTokenProvider::new(token.clone()))
    } else if let Some(command) = &args.token_command {
        Arc::new(CommandTokenProvider::new(command.clone()))
    } else {
        Arc::new(MissingTokenProvider)
    }
}

fn confirm_on_stdin(question: &str) -> bool {
    eprint!("{question} [y/N] ");
    let _ = io::stderr().flush();
    let mut answer = String::new();
    if io::stdin().lock().read_line(&mut answer).is_err() {
        return false;
    }
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

/// What a finished command leaves on the terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CommandOutput {
    pub stdout: String,
    pub status: String,
    pub failed: bool,
}

/// Drives the core state machine against the engine for one command.
pub(crate) struct Session {
    state: AppState,
    limits: PageLimits,
    runner: EffectRunner,
}

impl Session {
    pub(crate) fn new(runner: EffectRunner, limits: PageLimits) -> Self {
        Self {
            state: AppState::new(limits),
            limits,
            runner,
        }
    }

    pub(crate) fn execute(
        &mut self,
        command: &Command,
        top: usize,
        confirm: impl Fn(&str) -> bool,
    ) -> Result<CommandOutput> {
        self.dispatch(Msg::Startup);
        self.settle()?;

        let (msg, show_table) = match command {
            Command::Show => (None, true),
            Command::Ignored => (None, false),
            Command::Scan { pages } => (Some(Msg::ScanRequested { pages: *pages }), true),
            Command::Trash { domain, yes } => {
                let Some(domain) = normalize_domain(domain) else {
                    anyhow::bail!("no domain given");
                };
                if !*yes && !confirm(&format!("Move all unlabeled mail from {domain} to trash?")) {
                    return Ok(self.cancelled());
                }
                (Some(Msg::TrashDomainRequested { domain }), true)
            }
            Command::Purge { query, yes } => {
                if !*yes && !confirm(&format!("Move all mail matching \"{query}\" to trash?")) {
                    return Ok(self.cancelled());
                }
                (
                    Some(Msg::PurgeRequested {
                        query: query.clone(),
                    }),
                    false,
                )
            }
            Command::Ignore { domain } => (
                Some(Msg::IgnoreRequested {
                    domain: domain.clone(),
                }),
                true,
            ),
            Command::Unignore { domain } => (
                Some(Msg::UnignoreRequested {
                    domain: domain.clone(),
                }),
                false,
            ),
        };

        if let Some(msg) = msg {
            self.dispatch(msg);
            self.settle()?;
        }

        let view = self.state.view();
        let stdout = match command {
            Command::Ignored => render::ignored_list(&view),
            _ if show_table => render::domain_table(&view, top),
            _ => String::new(),
        };
        Ok(CommandOutput {
            stdout,
            status: render::status_line(&view),
            failed: view.is_failure(),
        })
    }

    pub(crate) fn shutdown(self) {
        self.runner.shutdown();
    }

    fn cancelled(&self) -> CommandOutput {
        CommandOutput {
            stdout: String::new(),
            status: "Cancelled.".to_string(),
            failed: false,
        }
    }

    /// Feeds engine events into the state machine until nothing is outstanding.
    fn settle(&mut self) -> Result<()> {
        while self.state.is_busy() {
            let msg = self
                .runner
                .next_msg()
                .context("mail engine stopped unexpectedly")?;
            self.dispatch(msg);
        }
        Ok(())
    }

    fn dispatch(&mut self, msg: Msg) {
        let state = std::mem::replace(&mut self.state, AppState::new(self.limits));
        let (mut state, effects) = update(state, msg);
        if state.consume_dirty() {
            let view = state.view();
            if view.scan == ScanStatus::Scanning || view.mutation.is_some() {
                let line = render::status_line(&view);
                if !line.is_empty() {
                    eprintln!("{line}");
                }
            }
        }
        if !effects.is_empty() {
            sweep_debug!("Dispatching {} effect(s)", effects.len());
        }
        self.state = state;
        self.runner.enqueue(effects);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sweep_engine::{KeyValueStore, MemoryStore, ReqwestMailApi};

    fn session(store: Arc<MemoryStore>) -> Session {
        let api = ReqwestMailApi::new(ApiSettings::default(), Arc::new(MissingTokenProvider))
            .expect("client");
        let settings = SweepSettings::default();
        let limits = page_limits(&settings);
        let engine = EngineHandle::with_api(Arc::new(api), settings, store);
        Session::new(EffectRunner::new(engine), limits)
    }

    fn execute(store: &Arc<MemoryStore>, command: Command) -> CommandOutput {
        let mut session = session(Arc::clone(store));
        let output = session
            .execute(&command, 20, |_| panic!("no prompt expected"))
            .expect("command runs");
        session.shutdown();
        output
    }

    #[test]
    fn show_without_saved_state() {
        sweep_logging::initialize_for_tests();
        let output = execute(&Arc::new(MemoryStore::new()), Command::Show);

        assert_eq!(
            output,
            CommandOutput {
                stdout: String::new(),
                status: "No saved scan yet. Run `inbox-sweep scan` first.".to_string(),
                failed: false,
            }
        );
    }

    #[test]
    fn ignored_domains_survive_between_runs() {
        sweep_logging::initialize_for_tests();
        let store = Arc::new(MemoryStore::new());

        let output = execute(
            &store,
            Command::Ignore {
                domain: " News.Example ".into(),
            },
        );
        assert_eq!(output.status, "Ignoring news.example in future scans.");
        assert!(store.read("ignored_domains").expect("read").is_some());

        let output = execute(&store, Command::Ignored);
        assert_eq!(output.stdout, "news.example\n");

        let output = execute(
            &store,
            Command::Unignore {
                domain: "news.example".into(),
            },
        );
        assert_eq!(output.status, "news.example will be counted in the next scan.");
        let output = execute(&store, Command::Ignored);
        assert_eq!(output.stdout, "No ignored domains.\n");
    }

    #[test]
    fn scan_without_token_fails_cleanly() {
        sweep_logging::initialize_for_tests();
        let output = execute(&Arc::new(MemoryStore::new()), Command::Scan { pages: Some(1) });

        assert!(output.failed);
        assert!(output.stdout.is_empty());
        assert!(
            output
                .status
                .starts_with("Scan failed: authentication failed: no access token configured"),
            "unexpected status: {}",
            output.status
        );
    }

    #[test]
    fn declined_trash_sends_nothing() {
        sweep_logging::initialize_for_tests();
        let mut session = session(Arc::new(MemoryStore::new()));
        let output = session
            .execute(
                &Command::Trash {
                    domain: "a.example".into(),
                    yes: false,
                },
                20,
                |_| false,
            )
            .expect("command runs");
        session.shutdown();

        assert_eq!(output.status, "Cancelled.");
        assert!(!output.failed);
    }

    #[test]
    fn trash_prompt_names_the_normalized_domain() {
        sweep_logging::initialize_for_tests();
        let prompts = std::cell::RefCell::new(Vec::new());
        let mut session = session(Arc::new(MemoryStore::new()));
        let output = session
            .execute(
                &Command::Trash {
                    domain: " @News.Example ".into(),
                    yes: false,
                },
                20,
                |prompt| {
                    prompts.borrow_mut().push(prompt.to_string());
                    false
                },
            )
            .expect("command runs");
        session.shutdown();

        assert_eq!(
            prompts.into_inner(),
            vec!["Move all unlabeled mail from news.example to trash?".to_string()]
        );
        assert_eq!(output.status, "Cancelled.");
    }

    #[test]
    fn blank_trash_domain_is_an_error() {
        sweep_logging::initialize_for_tests();
        let mut session = session(Arc::new(MemoryStore::new()));
        let outcome = session.execute(
            &Command::Trash {
                domain: "  ".into(),
                yes: true,
            },
            20,
            |_| panic!("no prompt expected"),
        );
        session.shutdown();

        assert!(outcome.is_err());
    }
}
