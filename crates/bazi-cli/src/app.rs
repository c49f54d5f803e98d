//! Shell state and command handling.

use std::io::{self, Write};
use std::sync::Arc;

use anyhow::Result;
use bazi_core::api::HttpTransport;
use bazi_core::{
    ApiError, ApiGateway, AuthError, BaziApi, BirthData, Config, CredentialBackend, CrossTabSync,
    Effect, ErrorKind, FileCredentialStore, KeyringCredentialStore, MemoryCredentialStore,
    Pillars, SavedChart, Screen, SessionEvent, SessionManager, SessionState, View, ViewRouter,
};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, warn};

use crate::commands::{Command, HELP};

/// Keychain account holding the session
const KEYRING_ACCOUNT: &str = "session";

/// Buffer size for cross-tab notifications
const CHANNEL_BUFFER_SIZE: usize = 16;

pub struct App {
    config: Config,
    api: BaziApi,
    router: ViewRouter,
    session_events: broadcast::Receiver<SessionEvent>,
    sync_rx: mpsc::Receiver<SessionState>,
    /// Last successful calculation, kept for `save`
    last_chart: Option<(BirthData, Pillars)>,
    charts: Vec<SavedChart>,
}

impl App {
    pub fn new(config: Config) -> Result<Self> {
        let session = Arc::new(open_session(&config)?);
        let transport = Arc::new(HttpTransport::new()?);
        let gateway = ApiGateway::new(transport, Arc::clone(&session), config.api_base_url.clone());
        let api = BaziApi::new(Arc::new(gateway));

        let (tx, sync_rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);
        let mut sync = CrossTabSync::new(Arc::clone(&session));
        sync.on_change(move |state| {
            if tx.try_send(state.clone()).is_err() {
                debug!("Dropped cross-tab notification");
            }
        });
        tokio::spawn(sync.run());

        Ok(Self {
            session_events: session.subscribe_events(),
            config,
            api,
            router: ViewRouter::new(),
            sync_rx,
            last_chart: None,
            charts: Vec::new(),
        })
    }

    fn session(&self) -> &Arc<SessionManager> {
        self.api.session()
    }

    pub async fn run(&mut self) -> Result<()> {
        println!("Bazi four-pillar calculator. Type 'help' for commands.");
        if let Some(user) = self.session().current_user() {
            println!("Welcome back, {}.", user.display_name());
        }

        let stdin = io::stdin();
        loop {
            self.check_background_tasks().await;

            print!("{}> ", self.router.current());
            io::stdout().flush()?;
            let mut line = String::new();
            if stdin.read_line(&mut line)? == 0 {
                break;
            }

            match Command::parse(&line) {
                Ok(Some(Command::Quit)) => break,
                Ok(Some(command)) => self.execute(command).await?,
                Ok(None) => {}
                Err(e) => println!("{}", e),
            }
        }
        Ok(())
    }

    /// Apply session transitions and cross-tab changes that arrived since the last prompt
    async fn check_background_tasks(&mut self) {
        let mut effects = Vec::new();
        loop {
            match self.session_events.try_recv() {
                Ok(event) => {
                    if let SessionEvent::LoggedOut(reason) = &event {
                        debug!(?reason, "Session ended");
                    }
                    effects.extend(self.router.handle_session_event(&event));
                }
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    warn!(skipped = n, "Missed session events");
                }
                Err(_) => break,
            }
        }

        while let Ok(state) = self.sync_rx.try_recv() {
            if self.router.handle_session_state(&state) {
                println!("You were logged out in another window.");
            }
        }

        for effect in effects {
            self.run_effect(effect).await;
        }
    }

    async fn execute(&mut self, command: Command) -> Result<()> {
        match command {
            Command::Calculate(birth) => self.calculate(birth).await,
            Command::Save => self.save().await,
            Command::Charts => self.go(View::SavedCharts).await?,
            Command::Delete(id) => self.delete(id).await,
            Command::Login => self.go(View::Login).await?,
            Command::Register => self.go(View::Register).await?,
            Command::Logout => {
                self.api.logout();
                self.charts.clear();
                println!("Logged out.");
            }
            Command::Go(view) => self.go(view).await?,
            Command::Status => self.status(),
            Command::Health => self.health().await,
            Command::Help => println!("{}", HELP),
            Command::Quit => {}
        }
        Ok(())
    }

    async fn go(&mut self, view: View) -> Result<()> {
        if let Some(effect) = self.router.navigate(view, self.api.session()) {
            self.run_effect(effect).await;
        }
        self.enter_screen().await
    }

    /// Show whatever the router says is on screen now
    async fn enter_screen(&mut self) -> Result<()> {
        match self.router.screen() {
            Screen::LoginPrompt { then } => {
                if confirm(&format!("The {} view needs a login. Log in now? [Y/n]: ", then))? {
                    self.router.accept_prompt();
                    self.login_form().await?;
                } else {
                    self.router.dismiss_prompt();
                }
            }
            Screen::View(View::Login) => self.login_form().await?,
            Screen::View(View::Register) => self.register_form().await?,
            Screen::View(View::Calculator) => println!("Enter: calc <year> <month> <day> <hour>"),
            Screen::View(View::SavedCharts) => {}
        }
        Ok(())
    }

    async fn run_effect(&mut self, effect: Effect) {
        match effect {
            Effect::FetchCharts => match self.api.my_charts().await {
                Ok(charts) => {
                    self.charts = charts;
                    self.print_charts();
                }
                Err(e) => println!("{}", describe(&e)),
            },
        }
    }

    // ===== Account =====

    async fn login_form(&mut self) -> Result<()> {
        let email = match &self.config.last_email {
            Some(last) => {
                let input = prompt(&format!("Email [{}]: ", last))?;
                if input.is_empty() {
                    last.clone()
                } else {
                    input
                }
            }
            None => prompt("Email: ")?,
        };
        if email.is_empty() {
            self.router.navigate(View::Calculator, self.api.session());
            return Ok(());
        }
        let password = rpassword::prompt_password("Password: ")?;

        match self.api.login(&email, &password).await {
            Ok(user) => {
                match &user {
                    Some(user) => println!("Logged in as {}.", user.display_name()),
                    None => println!("Logged in."),
                }
                self.config.last_email = Some(user.map(|u| u.email).unwrap_or(email));
                if let Err(e) = self.config.save() {
                    warn!(error = %e, "Failed to save config");
                }
            }
            Err(e) => println!("{}", describe_auth(&e)),
        }
        Ok(())
    }

    async fn register_form(&mut self) -> Result<()> {
        let nickname = prompt("Nickname: ")?;
        if nickname.is_empty() {
            self.router.navigate(View::Calculator, self.api.session());
            return Ok(());
        }
        let email = prompt("Email: ")?;
        let password = rpassword::prompt_password("Password: ")?;
        let confirm_password = rpassword::prompt_password("Confirm password: ")?;

        match self
            .api
            .register(&nickname, &email, &password, &confirm_password)
            .await
        {
            Ok(user) => {
                println!("Registered {}. Please log in.", user.display_name());
                self.config.last_email = Some(user.email);
                self.router.on_registered();
                self.login_form().await?;
            }
            Err(e) => println!("{}", describe(&e)),
        }
        Ok(())
    }

    fn status(&self) {
        match self.session().credential() {
            Some(credential) => {
                let name = credential
                    .user
                    .as_ref()
                    .map(|u| u.display_name().to_string())
                    .unwrap_or_else(|| "unknown user".to_string());
                println!(
                    "Logged in as {} ({} minutes left).",
                    name,
                    credential.minutes_until_expiry(self.session().now())
                );
            }
            None => println!("Not logged in."),
        }
        println!("View: {}", self.router.current());
    }

    // ===== Charts =====

    async fn calculate(&mut self, birth: BirthData) {
        self.router.navigate(View::Calculator, self.api.session());
        match self.api.calculate(&birth).await {
            Ok(pillars) => {
                println!("Chart for {}:", birth);
                for (label, pillar) in pillars.labeled() {
                    println!("  {:<6} {}", label, pillar);
                }
                self.last_chart = Some((birth, pillars));
            }
            Err(e) => println!("{}", describe(&e)),
        }
    }

    async fn save(&mut self) {
        let Some((birth, pillars)) = self.last_chart else {
            println!("Nothing to save yet. Run 'calc' first.");
            return;
        };
        match self.api.save_chart(&birth, &pillars).await {
            Ok(saved) => println!("Saved as chart #{}.", saved.chart_id),
            Err(e) => println!("{}", describe(&e)),
        }
    }

    async fn delete(&mut self, id: i64) {
        match self.api.delete_chart(id).await {
            Ok(()) => {
                self.charts.retain(|c| c.id != id);
                println!("Deleted chart #{}.", id);
            }
            Err(e) => println!("{}", describe(&e)),
        }
    }

    fn print_charts(&self) {
        if self.charts.is_empty() {
            println!("No saved charts.");
            return;
        }
        for chart in &self.charts {
            println!("#{:<5} {}  {}", chart.id, chart.title(), chart.pillars);
        }
    }

    async fn health(&self) {
        match self.api.health().await {
            Ok(health) => println!(
                "Service is {}{}",
                health.status,
                health.version.map(|v| format!(" (v{})", v)).unwrap_or_default()
            ),
            Err(e) => println!("{}", describe(&e)),
        }
    }
}

fn open_session(config: &Config) -> Result<SessionManager> {
    let backend = match config.credential_backend {
        CredentialBackend::Keyring if !KeyringCredentialStore::is_durable() => {
            warn!("No persistent keychain on this platform, storing the session in a file");
            CredentialBackend::File
        }
        backend => backend,
    };
    Ok(match backend {
        CredentialBackend::File => {
            SessionManager::with_system_clock(FileCredentialStore::new(Config::cache_dir()?))
        }
        CredentialBackend::Keyring => {
            SessionManager::with_system_clock(KeyringCredentialStore::new(KEYRING_ACCOUNT)?)
        }
        CredentialBackend::Memory => SessionManager::with_system_clock(MemoryCredentialStore::new()),
    })
}

/// User-facing text for an API failure
fn describe(err: &ApiError) -> String {
    match err.kind() {
        ErrorKind::Network => {
            "Unable to reach the chart service. Check that it is running.".to_string()
        }
        ErrorKind::Unauthorized => format!("{}. Please log in again.", err),
        _ => err.to_string(),
    }
}

fn describe_auth(err: &AuthError) -> String {
    match err {
        AuthError::Api(e) if e.kind() == ErrorKind::Unauthorized => {
            "Invalid email or password.".to_string()
        }
        AuthError::Api(e) => describe(e),
        other => other.to_string(),
    }
}

fn prompt(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}

fn confirm(label: &str) -> Result<bool> {
    let answer = prompt(label)?;
    Ok(!answer.eq_ignore_ascii_case("n") && !answer.eq_ignore_ascii_case("no"))
}
