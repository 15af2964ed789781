// HTTP surface: admin API, frontend API, and the plain web form. Handlers
// stay thin; everything of substance happens in the comment service.

use axum::{
    extract::{Path, Query, Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Form, Json, Router,
};
use tracing::warn;

use crate::{
    app_state::AppState,
    error::{AppError, AppResult},
    models::{
        BulkStatusInput, Comment, CommentForm, CommentInput, CommentPage, DataResponse,
        StatusInput, SuccessResponse,
    },
    query::ListParams,
};

/// Mount points, also used as the base of pagination links.
pub const ADMIN_COMMENTS_PATH: &str = "/api/admin/comments";
pub const FRONTEND_COMMENTS_PATH: &str = "/api/comments";

pub fn app_router(state: AppState) -> Router {
    let admin = Router::new()
        .route("/", get(admin_list).post(admin_create))
        .route("/status/bulk", put(admin_bulk_status))
        .route("/status/{id}", put(admin_update_status))
        .route(
            "/{id}",
            get(admin_get).put(admin_update).delete(admin_delete),
        );

    let frontend = Router::new()
        .route("/", get(frontend_list).post(frontend_create))
        .route("/report/{id}", put(frontend_report))
        .route("/{id}", get(frontend_get));

    Router::new()
        .nest(ADMIN_COMMENTS_PATH, admin)
        .nest(FRONTEND_COMMENTS_PATH, frontend)
        .route("/comment", post(web_create))
        // The guard sits on the outer router: nested services see the
        // prefix-stripped URI, the full path is only visible here.
        .layer(middleware::from_fn_with_state(state.clone(), admin_guard))
        .with_state(state)
}

/// Static bearer-token check for the admin routes. Disabled when no token is
/// configured; paths listed in `open_admin_routes` pass through.
async fn admin_guard(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let path = request.uri().path();
    if !path.starts_with(ADMIN_COMMENTS_PATH) {
        return Ok(next.run(request).await);
    }
    let Some(expected) = state.config.api.admin_token.as_deref() else {
        return Ok(next.run(request).await);
    };
    if state
        .config
        .api
        .open_admin_routes
        .iter()
        .any(|route| route == path)
    {
        return Ok(next.run(request).await);
    }
    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));
    if token == Some(expected) {
        Ok(next.run(request).await)
    } else {
        Err(AppError::Unauthorized("Admin token required".to_string()))
    }
}

async fn list(state: AppState, params: ListParams, base_path: &str) -> AppResult<Json<CommentPage>> {
    let page = state.service.list(&params, base_path).await?;
    Ok(Json(page))
}

async fn admin_list(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> AppResult<Json<CommentPage>> {
    list(state, params, ADMIN_COMMENTS_PATH).await
}

async fn frontend_list(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> AppResult<Json<CommentPage>> {
    list(state, params, FRONTEND_COMMENTS_PATH).await
}

async fn admin_get(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<DataResponse<Comment>>> {
    let comment = state.service.get(id).await?;
    Ok(Json(DataResponse { data: comment }))
}

async fn frontend_get(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<DataResponse<Comment>>> {
    admin_get(State(state), Path(id)).await
}

async fn admin_create(
    State(state): State<AppState>,
    Json(input): Json<CommentInput>,
) -> AppResult<Json<DataResponse<Comment>>> {
    let comment = state.service.create(input).await?;
    Ok(Json(DataResponse { data: comment }))
}

async fn frontend_create(
    State(state): State<AppState>,
    Json(input): Json<CommentInput>,
) -> AppResult<Json<DataResponse<Comment>>> {
    admin_create(State(state), Json(input)).await
}

async fn admin_update(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(input): Json<CommentInput>,
) -> AppResult<Json<DataResponse<Comment>>> {
    let comment = state.service.update(id, input).await?;
    Ok(Json(DataResponse { data: comment }))
}

async fn admin_delete(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<SuccessResponse>> {
    state.service.delete(id).await?;
    Ok(Json(SuccessResponse::ok()))
}

async fn admin_update_status(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(input): Json<StatusInput>,
) -> AppResult<Json<SuccessResponse>> {
    state.service.update_status(id, input.status).await?;
    Ok(Json(SuccessResponse::ok()))
}

async fn admin_bulk_status(
    State(state): State<AppState>,
    Json(input): Json<BulkStatusInput>,
) -> AppResult<Json<SuccessResponse>> {
    state
        .service
        .bulk_update_status(&input.id, input.status)
        .await?;
    Ok(Json(SuccessResponse::ok()))
}

async fn frontend_report(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(input): Json<StatusInput>,
) -> AppResult<Json<SuccessResponse>> {
    state.service.report(id, input.status).await?;
    Ok(Json(SuccessResponse::ok()))
}

/// The form endpoint always answers 302 back to the referring page,
/// validation failures included; failures only surface in the log.
async fn web_create(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<CommentForm>,
) -> Response {
    let back = headers
        .get(header::REFERER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("/")
        .to_string();

    if let Err(err) = state.service.create_from_form(form).await {
        warn!("web comment rejected: {}", err);
    }

    (StatusCode::FOUND, [(header::LOCATION, back)]).into_response()
}
