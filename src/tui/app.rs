use std::sync::Arc;

use tracing::{debug, info};

use recipe_browser::access::AccessGate;
use recipe_browser::availability::{AvailabilityMonitor, AvailabilityState, MonitorUpdate, Transition};
use recipe_browser::catalog::source::UNKNOWN_SUBMIT_ERROR;
use recipe_browser::catalog::{RecipeSource, SubmitOutcome};
use recipe_browser::remote::HealthProber;
use recipe_browser::types::{Category, DataOrigin, Fetched, Recipe};

use super::compose::{Draft, DraftField};

pub const LOGIN_TO_ADD: &str = "Log in with [l] to add a recipe";

// ---------------------------------------------------------------------------
// View state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum View {
    List,
    Detail(Box<Recipe>),
    /// Recipe lookup found nothing.
    NotFound(String),
    /// Slug of a recipe the backend just accepted.
    Submitted(String),
    /// Submission failed; stays up until dismissed.
    SubmitError(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Search,
    LoginName,
    LoginSecret,
    Compose(DraftField),
}

pub struct App {
    source: Arc<RecipeSource>,
    monitor: Arc<AvailabilityMonitor>,
    access: Arc<AccessGate>,
    prober: Arc<HealthProber>,

    pub recipes: Vec<Recipe>,
    pub origin: DataOrigin,
    pub categories: Vec<Category>,
    /// Index into `categories`; None shows every recipe.
    pub category: Option<usize>,
    pub search: String,
    pub input: InputMode,
    pub view: View,

    pub availability: AvailabilityState,
    pub remaining_secs: u64,
    /// One-line feedback in the footer (login result, reload reason).
    pub notice: Option<String>,

    pub login_name: String,
    pub login_secret: String,
    pub draft: Draft,
}

impl App {
    pub fn new(
        source: Arc<RecipeSource>,
        monitor: Arc<AvailabilityMonitor>,
        access: Arc<AccessGate>,
        prober: Arc<HealthProber>,
    ) -> Self {
        let availability = monitor.state();
        Self {
            source,
            monitor,
            access,
            prober,
            recipes: Vec::new(),
            origin: DataOrigin::Fallback,
            categories: Vec::new(),
            category: None,
            search: String::new(),
            input: InputMode::Normal,
            view: View::List,
            availability,
            remaining_secs: 0,
            notice: None,
            login_name: String::new(),
            login_secret: String::new(),
            draft: Draft::default(),
        }
    }

    // -----------------------------------------------------------------------
    // Data
    // -----------------------------------------------------------------------

    /// Re-run the current search (or list) and reload categories.
    pub async fn reload(&mut self) {
        let (recipes, categories) = tokio::join!(self.source.search(&self.search), self.source.categories());
        self.apply_recipes(recipes);
        let selected = self.selected_category_slug().map(str::to_string);
        self.categories = categories.data;
        self.category = selected.and_then(|slug| self.categories.iter().position(|c| c.slug == slug));
        debug!(recipes = self.recipes.len(), origin = %self.origin, "data reloaded");
    }

    fn apply_recipes(&mut self, fetched: Fetched<Vec<Recipe>>) {
        self.origin = fetched.origin;
        self.recipes = fetched.data;
    }

    /// Recipes passing the category filter, in list order.
    pub fn visible(&self) -> Vec<&Recipe> {
        match self.selected_category_slug() {
            Some(slug) => self.recipes.iter().filter(|r| r.in_category(slug)).collect(),
            None => self.recipes.iter().collect(),
        }
    }

    pub fn selected_category_slug(&self) -> Option<&str> {
        self.category
            .and_then(|i| self.categories.get(i))
            .map(|c| c.slug.as_str())
    }

    /// All → first → … → last → All.
    pub fn cycle_category(&mut self) {
        self.category = match self.category {
            None if !self.categories.is_empty() => Some(0),
            Some(i) if i + 1 < self.categories.len() => Some(i + 1),
            _ => None,
        };
    }

    /// Fetch the full recipe behind the `index`-th visible row.
    pub async fn open(&mut self, index: usize) {
        let Some(slug) = self.visible().get(index).map(|r| r.slug.clone()) else {
            return;
        };
        let fetched = self.source.recipe_by_slug(&slug).await;
        self.view = match fetched.data {
            Some(recipe) => View::Detail(Box::new(recipe)),
            None => View::NotFound(slug),
        };
    }

    pub fn back(&mut self) {
        self.view = View::List;
    }

    // -----------------------------------------------------------------------
    // Availability
    // -----------------------------------------------------------------------

    /// Refresh the countdown from the monitor. Called every frame.
    pub fn sync_availability(&mut self) {
        self.availability = self.monitor.state();
        self.remaining_secs = self.monitor.remaining_secs();
    }

    /// True when the update means live data is worth fetching again.
    pub fn on_update(&mut self, update: &MonitorUpdate) -> bool {
        self.availability = update.state.clone();
        match update.transition {
            Some(Transition::WindowElapsed) => {
                info!("wake-up window over, reloading data");
                self.notice = Some("Backend should be awake now, reloading recipes".into());
                true
            }
            Some(Transition::Recovered) => {
                self.notice = Some("Backend is back, loading live recipes".into());
                true
            }
            // Another process finished its countdown.
            Some(Transition::Synced) => !update.state.is_waking_up && self.origin == DataOrigin::Fallback,
            _ => false,
        }
    }

    pub fn probe_summary(&self) -> String {
        let latency = self
            .source
            .client()
            .latency()
            .percentiles_ms()
            .map(|(p50, p95)| format!(" (p50 {p50}ms, p95 {p95}ms)"))
            .unwrap_or_default();
        match self.prober.last_status() {
            Some(result) => format!("{}{latency}", result.message),
            None if !self.source.client().is_configured() => {
                "Backend URL not configured. Loaded sample data.".to_string()
            }
            None => "Checking backend...".to_string(),
        }
    }

    // -----------------------------------------------------------------------
    // Access
    // -----------------------------------------------------------------------

    pub fn access_label(&self) -> Option<String> {
        if !self.access.is_configured() {
            return None;
        }
        Some(match self.access.name() {
            Some(name) => format!("chef {name} ({:.1}h left)", self.access.remaining_hours()),
            None => "guest".to_string(),
        })
    }

    /// Start the login prompt, or log out when already granted.
    pub fn toggle_login(&mut self) {
        if !self.access.is_configured() {
            self.notice = Some("Access gate is not configured".into());
            return;
        }
        if self.access.is_granted() {
            self.access.clear();
            self.notice = Some("Logged out".into());
        } else {
            self.login_name.clear();
            self.login_secret.clear();
            self.input = InputMode::LoginName;
        }
    }

    pub fn submit_login(&mut self) {
        let result = self.access.verify(&self.login_name, &self.login_secret);
        self.login_secret.clear();
        self.input = InputMode::Normal;
        self.notice = Some(match result {
            Ok(grant) => format!("Welcome, {}", grant.name),
            Err(e) => e.to_string(),
        });
    }

    // -----------------------------------------------------------------------
    // Add recipe
    // -----------------------------------------------------------------------

    /// Open the add-recipe prompts. Needs a valid access grant.
    pub fn start_compose(&mut self) {
        if !self.access.is_granted() {
            self.notice = Some(LOGIN_TO_ADD.into());
            return;
        }
        self.view = View::List;
        self.input = InputMode::Compose(DraftField::Title);
    }

    /// Read the images, validate and send the draft. Input problems return to
    /// the offending prompt; backend failures get their own view.
    pub async fn submit_draft(&mut self) {
        self.input = InputMode::Normal;
        // The grant may have expired while typing.
        if !self.access.is_granted() {
            self.notice = Some(LOGIN_TO_ADD.into());
            return;
        }

        let recipe = match self.draft.to_recipe().await {
            Ok(recipe) => recipe,
            Err((field, message)) => {
                self.notice = Some(message);
                self.input = InputMode::Compose(field);
                return;
            }
        };
        if let Err(e) = recipe.validate() {
            self.notice = Some(e.to_string());
            self.input = InputMode::Compose(DraftField::from(e));
            return;
        }

        let outcome = SubmitOutcome::from(self.source.submit(&recipe).await);
        match (outcome.ok, outcome.slug) {
            (true, Some(slug)) => {
                info!(%slug, "recipe submitted");
                self.draft = Draft::default();
                self.notice = Some("Recipe created".into());
                self.reload().await;
                self.view = View::Submitted(slug);
            }
            _ => {
                let message = outcome.error.unwrap_or_else(|| UNKNOWN_SUBMIT_ERROR.to_string());
                self.view = View::SubmitError(message);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Formatting helpers
// ---------------------------------------------------------------------------

pub fn format_minutes(m: u32) -> String {
    if m >= 60 {
        format!("{}h {:02}m", m / 60, m % 60)
    } else {
        format!("{m}m")
    }
}

pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{head}…")
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
