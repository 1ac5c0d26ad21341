use std::sync::Arc;

use reqwest::header::AUTHORIZATION;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::access::AccessGate;
use crate::catalog::sample::{find_by_slug, sample_categories, sample_recipes};
use crate::catalog::search::filter;
use crate::catalog::submit::NewRecipe;
use crate::error::{AppError, Result};
use crate::remote::mapping::{flatten_category, flatten_recipe, list_rows};
use crate::remote::BackendClient;
use crate::types::{Category, Fetched, Recipe};

const RECIPES_PATH: &str = "/api/recipes";
const CATEGORIES_PATH: &str = "/api/categories";
const CREATE_PATH: &str = "/api/recipes/create-from-access";

pub const UNKNOWN_SUBMIT_ERROR: &str = "Unknown error occurred while creating recipe";

/// A recipe the content service accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedRecipe {
    pub id: Option<String>,
    pub slug: String,
}

/// `{ ok, id?, slug?, error? }` view of a submission result for the UI.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmitOutcome {
    pub ok: bool,
    pub id: Option<String>,
    pub slug: Option<String>,
    pub error: Option<String>,
}

impl From<Result<CreatedRecipe>> for SubmitOutcome {
    fn from(result: Result<CreatedRecipe>) -> Self {
        match result {
            Ok(created) => Self {
                ok: true,
                id: created.id,
                slug: Some(created.slug),
                error: None,
            },
            Err(e) => Self {
                ok: false,
                error: Some(e.to_string()),
                ..Self::default()
            },
        }
    }
}

/// Read operations try the backend once and fall back to the bundled sample
/// data on any failure. Submission has no fallback.
pub struct RecipeSource {
    client: Arc<BackendClient>,
    access: Option<Arc<AccessGate>>,
}

impl RecipeSource {
    pub fn new(client: Arc<BackendClient>) -> Arc<Self> {
        Arc::new(Self { client, access: None })
    }

    /// Submissions carry the current access grant as a bearer token.
    pub fn with_access(client: Arc<BackendClient>, access: Arc<AccessGate>) -> Arc<Self> {
        Arc::new(Self {
            client,
            access: Some(access),
        })
    }

    pub fn client(&self) -> &Arc<BackendClient> {
        &self.client
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    pub async fn list_recipes(&self) -> Fetched<Vec<Recipe>> {
        if !self.client.is_configured() {
            return Fetched::fallback(sample_recipes().to_vec());
        }
        match self.fetch_recipes(&[("populate", "*")]).await {
            Ok(recipes) => Fetched::live(recipes),
            Err(e) => {
                warn!("listing recipes failed, serving sample data: {e}");
                Fetched::fallback(sample_recipes().to_vec())
            }
        }
    }

    /// A live lookup that matches nothing is `live(None)`, not sample data.
    pub async fn recipe_by_slug(&self, slug: &str) -> Fetched<Option<Recipe>> {
        if !self.client.is_configured() {
            return Fetched::fallback(find_by_slug(slug));
        }
        let query = [("filters[slug][$eq]", slug), ("populate", "*")];
        match self.fetch_recipes(&query).await {
            Ok(recipes) => Fetched::live(recipes.into_iter().next()),
            Err(e) => {
                warn!(slug, "recipe lookup failed, serving sample data: {e}");
                Fetched::fallback(find_by_slug(slug))
            }
        }
    }

    pub async fn categories(&self) -> Fetched<Vec<Category>> {
        if !self.client.is_configured() {
            return Fetched::fallback(sample_categories());
        }
        match self.client.get_json(CATEGORIES_PATH, &[]).await {
            Ok(body) => {
                self.client.status().set_healthy(true);
                Fetched::live(list_rows(&body).iter().map(flatten_category).collect())
            }
            Err(e) => {
                self.client.status().set_healthy(false);
                warn!("listing categories failed, serving sample categories: {e}");
                Fetched::fallback(sample_categories())
            }
        }
    }

    /// Remote contains-match on title, description and tags. When that finds
    /// nothing, or fails, the local matcher runs over the full recipe list.
    pub async fn search(&self, term: &str) -> Fetched<Vec<Recipe>> {
        let term = term.trim();
        if term.is_empty() {
            return self.list_recipes().await;
        }
        if !self.client.is_configured() {
            return Fetched::fallback(filter(sample_recipes(), term));
        }

        let query = [
            ("filters[$or][0][title][$containsi]", term),
            ("filters[$or][1][description][$containsi]", term),
            ("filters[$or][2][tags][$containsi]", term),
            ("populate", "*"),
        ];
        match self.fetch_recipes(&query).await {
            Ok(found) if !found.is_empty() => return Fetched::live(found),
            Ok(_) => debug!(term, "remote search empty, matching locally"),
            Err(e) => warn!(term, "remote search failed, matching locally: {e}"),
        }

        let all = self.list_recipes().await;
        Fetched {
            data: filter(&all.data, term),
            origin: all.origin,
        }
    }

    async fn fetch_recipes(&self, query: &[(&str, &str)]) -> Result<Vec<Recipe>> {
        let outcome = self.client.get_json(RECIPES_PATH, query).await;
        self.client.status().set_healthy(outcome.is_ok());
        let body = outcome?;
        let base = self.client.base_url();
        Ok(list_rows(&body)
            .iter()
            .map(|row| flatten_recipe(row, base))
            .collect())
    }

    // -----------------------------------------------------------------------
    // Submission
    // -----------------------------------------------------------------------

    /// Validate locally, then POST the multipart body. Never retried.
    pub async fn submit(&self, recipe: &NewRecipe) -> Result<CreatedRecipe> {
        let form = recipe.to_multipart()?;
        let url = self.client.url(CREATE_PATH)?;

        let mut request = self.client.http().post(&url).multipart(form);
        if let Some(token) = self.access.as_ref().and_then(|a| a.bearer_token()) {
            request = request.header(AUTHORIZATION, format!("Bearer {token}"));
        }

        let resp = request.send().await?;
        let status = resp.status();
        // A body that is not JSON is treated as empty.
        let body: Value = resp.json().await.unwrap_or(Value::Null);

        if !status.is_success() {
            let message = error_text(&body).unwrap_or_else(|| format!("HTTP {}", status.as_u16()));
            warn!(status = status.as_u16(), "recipe submission rejected: {message}");
            return Err(AppError::Submission(message));
        }

        let Some(slug) = body.get("slug").and_then(Value::as_str).filter(|s| !s.is_empty()) else {
            warn!("recipe submission answered without a slug");
            return Err(AppError::Submission(UNKNOWN_SUBMIT_ERROR.to_string()));
        };
        let id = match body.get("id") {
            Some(Value::Number(n)) => Some(n.to_string()),
            Some(Value::String(s)) => Some(s.clone()),
            _ => None,
        };
        info!(slug, "recipe created");
        Ok(CreatedRecipe {
            id,
            slug: slug.to_string(),
        })
    }
}

/// `error` as a string, or `error.message`.
fn error_text(body: &Value) -> Option<String> {
    let error = body.get("error")?;
    error
        .as_str()
        .or_else(|| error.get("message").and_then(Value::as_str))
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
