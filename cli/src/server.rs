use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::Context;
use axum::{
    Json, Router,
    extract::{Path, Query, Request, State},
    http::{HeaderValue, StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{delete, get, patch, post},
};
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{error, info};

use crate::gemini::GeminiClient;
use nutritrack_core::ai::{
    AiError, Generated, GenerationRequest, GeneratedRecipe, GoalTag, MealSuggestion,
};
use nutritrack_core::db::Database;
use nutritrack_core::models::{
    DailyLogEntry, DailySummary, Goals, GroceryList, ManualGroceryItem, Meal, NewMeal,
    PlannedMeal, validate_goals, validate_new_meal, validate_servings,
};
use nutritrack_core::service::NutritionService;

const BODY_LIMIT: usize = 1024 * 1024; // 1 MB

type Service = NutritionService<Database>;

#[derive(Clone)]
struct AppState {
    svc: Arc<Mutex<Service>>,
    gemini: Option<Arc<GeminiClient>>,
    api_key: Option<String>,
}

impl AppState {
    /// The guard must be dropped before any `.await`.
    fn svc(&self) -> MutexGuard<'_, Service> {
        self.svc.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// --- Request / Response types ---

#[derive(Deserialize)]
struct LogQuery {
    date: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServingsRequest {
    meal_id: String,
    servings: f64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PlanTotal {
    meal_id: String,
    servings: f64,
}

#[derive(Deserialize)]
struct ManualItemRequest {
    text: String,
}

#[derive(Deserialize)]
struct SuggestionsRequest {
    goal: String,
}

#[derive(Deserialize)]
struct RecipeRequest {
    ingredients: String,
    #[serde(default)]
    save: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RecipeResponse {
    recipe: GeneratedRecipe,
    #[serde(skip_serializing_if = "Option::is_none")]
    saved_meal: Option<Meal>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

// --- Error handling ---

enum ApiError {
    NotFound(String),
    BadRequest(String),
    /// A required external service is not configured.
    Unavailable(String),
    /// The external service failed; carries the user-facing message only.
    BadGateway(String),
    Internal(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            Self::BadGateway(msg) => (StatusCode::BAD_GATEWAY, msg),
            Self::Internal(err) => {
                error!(error = %format!("{err:#}"), "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err)
    }
}

impl From<AiError> for ApiError {
    fn from(err: AiError) -> Self {
        match err {
            AiError::EmptyIngredients => Self::BadRequest(err.to_string()),
            AiError::Suggestions | AiError::Recipe => Self::BadGateway(err.to_string()),
        }
    }
}

fn bad_request(err: &anyhow::Error) -> ApiError {
    ApiError::BadRequest(format!("{err}"))
}

fn parse_date(s: &str) -> Result<NaiveDate, ApiError> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|_| ApiError::BadRequest(format!("Invalid date '{s}'. Use YYYY-MM-DD")))
}

// --- Middleware ---

async fn require_auth(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if let Some(ref expected_key) = state.api_key {
        let authorized = request
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .is_some_and(|token| token == expected_key);

        if !authorized {
            return (
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse {
                    error: "Invalid or missing API key".to_string(),
                }),
            )
                .into_response();
        }
    }
    next.run(request).await
}

async fn security_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(
        "x-content-type-options",
        HeaderValue::from_static("nosniff"),
    );
    headers.insert("x-frame-options", HeaderValue::from_static("DENY"));
    headers.insert(
        "content-security-policy",
        HeaderValue::from_static("default-src 'none'"),
    );
    response
}

// --- Meals ---

async fn list_meals(State(state): State<AppState>) -> Result<Json<Vec<Meal>>, ApiError> {
    Ok(Json(state.svc().meals()?))
}

async fn create_meal(
    State(state): State<AppState>,
    Json(req): Json<NewMeal>,
) -> Result<(StatusCode, Json<Meal>), ApiError> {
    validate_new_meal(&req).map_err(|e| bad_request(&e))?;
    let meal = state.svc().add_meal(req).context("failed to add meal")?;
    Ok((StatusCode::CREATED, Json(meal)))
}

async fn get_meal(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Meal>, ApiError> {
    state
        .svc()
        .get_meal(&id)?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Meal {id} not found")))
}

/// Full replacement: the body carries every field except the id. Ingredients
/// keep their ids when the name is unchanged.
async fn update_meal(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<NewMeal>,
) -> Result<Json<Meal>, ApiError> {
    validate_new_meal(&req).map_err(|e| bad_request(&e))?;
    let mut svc = state.svc();
    let Some(existing) = svc.get_meal(&id)? else {
        return Err(ApiError::NotFound(format!("Meal {id} not found")));
    };
    let meal = req.into_replacement_of(&existing);
    if !svc.update_meal(meal.clone())? {
        return Err(ApiError::NotFound(format!("Meal {id} not found")));
    }
    Ok(Json(meal))
}

async fn delete_meal(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    if state.svc().delete_meal(&id)? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("Meal {id} not found")))
    }
}

// --- Log ---

async fn get_log(
    State(state): State<AppState>,
    Query(query): Query<LogQuery>,
) -> Result<Json<Vec<DailyLogEntry>>, ApiError> {
    let date = match query.date {
        Some(ref d) => parse_date(d)?,
        None => Local::now().date_naive(),
    };
    Ok(Json(state.svc().entries_for_date(date)?))
}

async fn create_log_entry(
    State(state): State<AppState>,
    Json(req): Json<ServingsRequest>,
) -> Result<(StatusCode, Json<DailyLogEntry>), ApiError> {
    validate_servings(req.servings).map_err(|e| bad_request(&e))?;
    let entry = state
        .svc()
        .add_entry_to_log(&req.meal_id, req.servings)?
        .ok_or_else(|| ApiError::NotFound(format!("Meal {} not found", req.meal_id)))?;
    Ok((StatusCode::CREATED, Json(entry)))
}

async fn delete_log_entry(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    if state.svc().remove_entry_from_log(&id)? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("Entry {id} not found")))
    }
}

async fn get_totals(
    State(state): State<AppState>,
    Path(date): Path<String>,
) -> Result<Json<DailySummary>, ApiError> {
    let date = parse_date(&date)?;
    Ok(Json(state.svc().daily_summary(date)?))
}

// --- Goals ---

async fn get_goals(State(state): State<AppState>) -> Result<Json<Goals>, ApiError> {
    Ok(Json(state.svc().goals()?))
}

async fn set_goals(
    State(state): State<AppState>,
    Json(req): Json<Goals>,
) -> Result<Json<Goals>, ApiError> {
    validate_goals(&req).map_err(|e| bad_request(&e))?;
    Ok(Json(state.svc().set_goals(req)?))
}

// --- Plan ---

async fn get_plan(State(state): State<AppState>) -> Result<Json<Vec<PlannedMeal>>, ApiError> {
    Ok(Json(state.svc().planned_meals()?))
}

async fn add_to_plan(
    State(state): State<AppState>,
    Json(req): Json<ServingsRequest>,
) -> Result<Json<PlanTotal>, ApiError> {
    validate_servings(req.servings).map_err(|e| bad_request(&e))?;
    let servings = state.svc().add_meal_to_plan(&req.meal_id, req.servings)?;
    Ok(Json(PlanTotal {
        meal_id: req.meal_id,
        servings,
    }))
}

async fn clear_plan(State(state): State<AppState>) -> Result<Json<serde_json::Value>, ApiError> {
    let cleared = state.svc().clear_plan()?;
    Ok(Json(serde_json::json!({ "cleared": cleared })))
}

async fn remove_from_plan(
    State(state): State<AppState>,
    Path(meal_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    if state.svc().remove_meal_from_plan(&meal_id)? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("Meal {meal_id} is not planned")))
    }
}

// --- Grocery ---

async fn get_grocery(State(state): State<AppState>) -> Result<Json<GroceryList>, ApiError> {
    Ok(Json(state.svc().grocery_list()?))
}

async fn add_manual_item(
    State(state): State<AppState>,
    Json(req): Json<ManualItemRequest>,
) -> Result<(StatusCode, Json<ManualGroceryItem>), ApiError> {
    let item = state
        .svc()
        .add_manual_item(&req.text)?
        .ok_or_else(|| ApiError::BadRequest("text must not be empty".to_string()))?;
    Ok((StatusCode::CREATED, Json(item)))
}

async fn toggle_manual_item(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ManualGroceryItem>, ApiError> {
    state
        .svc()
        .toggle_manual_item(&id)?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Item {id} not found")))
}

async fn delete_manual_item(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    if state.svc().delete_manual_item(&id)? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("Item {id} not found")))
    }
}

// --- AI ---

fn gemini(state: &AppState) -> Result<Arc<GeminiClient>, ApiError> {
    state.gemini.clone().ok_or_else(|| {
        ApiError::Unavailable("AI features are not configured (GEMINI_API_KEY is not set)".into())
    })
}

async fn ai_suggestions(
    State(state): State<AppState>,
    Json(req): Json<SuggestionsRequest>,
) -> Result<Json<Vec<MealSuggestion>>, ApiError> {
    let client = gemini(&state)?;
    let goal: GoalTag = req.goal.parse().map_err(|e| bad_request(&e))?;
    let request = GenerationRequest::suggestions(goal);
    match client.generate(&request).await? {
        Generated::Suggestions(list) => Ok(Json(list)),
        Generated::Recipe(_) => Err(AiError::Suggestions.into()),
    }
}

async fn ai_recipe(
    State(state): State<AppState>,
    Json(req): Json<RecipeRequest>,
) -> Result<Json<RecipeResponse>, ApiError> {
    let client = gemini(&state)?;
    let request = GenerationRequest::recipe(&req.ingredients)?;
    let recipe = match client.generate(&request).await? {
        Generated::Recipe(recipe) => recipe,
        Generated::Suggestions(_) => return Err(AiError::Recipe.into()),
    };
    let saved_meal = if req.save {
        Some(state.svc().save_generated_recipe(&recipe)?)
    } else {
        None
    };
    Ok(Json(RecipeResponse { recipe, saved_meal }))
}

fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/meals", get(list_meals).post(create_meal))
        .route(
            "/api/meals/{id}",
            get(get_meal).put(update_meal).delete(delete_meal),
        )
        .route("/api/log", get(get_log).post(create_log_entry))
        .route("/api/log/{id}", delete(delete_log_entry))
        .route("/api/totals/{date}", get(get_totals))
        .route("/api/goals", get(get_goals).put(set_goals))
        .route(
            "/api/plan",
            get(get_plan).post(add_to_plan).delete(clear_plan),
        )
        .route("/api/plan/{meal_id}", delete(remove_from_plan))
        .route("/api/grocery", get(get_grocery))
        .route("/api/grocery/manual", post(add_manual_item))
        .route(
            "/api/grocery/manual/{id}",
            patch(toggle_manual_item).delete(delete_manual_item),
        )
        .route("/api/ai/suggestions", post(ai_suggestions))
        .route("/api/ai/recipe", post(ai_recipe))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT))
        .layer(middleware::from_fn(security_headers))
        .with_state(state)
}

// --- Server startup ---

pub async fn start_server(
    svc: Service,
    gemini: Option<GeminiClient>,
    port: u16,
    bind: &str,
    api_key: Option<String>,
) -> anyhow::Result<()> {
    if gemini.is_none() {
        eprintln!("Note: GEMINI_API_KEY is not set; /api/ai/* will return 503.");
    }

    let state = AppState {
        svc: Arc::new(Mutex::new(svc)),
        gemini: gemini.map(Arc::new),
        api_key: api_key.clone(),
    };

    let app = build_router(state);

    if let Some(ref key) = api_key {
        let head: String = key.chars().take(4).collect();
        eprintln!("API key: {head}... (see api_key file in data directory)");
    } else {
        eprintln!("Warning: Authentication disabled (--no-auth). API is open to anyone.");
    }

    if bind != "127.0.0.1" && bind != "localhost" && api_key.is_none() {
        eprintln!(
            "Warning: Listening on {bind} with no authentication. Any device on your network can access this API."
        );
    }

    let listener = tokio::net::TcpListener::bind(format!("{bind}:{port}"))
        .await
        .with_context(|| format!("Failed to bind {bind}:{port}"))?;
    info!(%bind, port, "server started");
    eprintln!("Listening on http://{bind}:{port}");
    axum::serve(listener, app).await?;

    Ok(())
}
