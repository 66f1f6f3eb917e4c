//! Routing and page handlers: public gallery views plus the admin
//! dashboard, all rendered server-side with askama templates.

mod error;
pub mod flash;
mod templates;

use askama::Template;
use axum::{
    extract::{Multipart, Path, Query, Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::{self, Next},
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
    Form, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use tower_http::{services::ServeDir, trace::TraceLayer};

use crate::auth::{self, CurrentAdmin};
use crate::db::models::{normalize_completed_at, Admin, Project, STATUS_COMPLETED};
use crate::web::flash::Flash;
use crate::AppState;

pub use error::WebError;
pub use templates::*;

const CATEGORY_PAGE_SIZE: usize = 6;
const COMPLETED_PAGE_SIZE: usize = 8;

const MOBILE_KEYWORDS: &[&str] = &[
    "iphone",
    "android",
    "ipod",
    "ipad",
    "mobile",
    "blackberry",
    "opera mini",
    "windows phone",
];

pub fn create_router(state: Arc<AppState>) -> Router {
    let static_dir = state.config.server.static_dir.clone();

    Router::new()
        // Public routes
        .route("/", get(home))
        .route("/category/:category", get(show_category))
        .route("/login", get(login_page).post(login_submit))
        .route("/logout", get(logout))
        .route("/check_session", get(check_session))
        // Admin-only routes (guarded by the CurrentAdmin extractor)
        .route("/dashboard", get(dashboard))
        .route("/completed_projects", get(completed_projects))
        .route("/add_project", get(add_project_form).post(add_project_submit))
        .route("/edit_project/:id", get(edit_project_form).post(edit_project_submit))
        .route("/delete_project/:id", get(delete_project))
        .route("/add_admin", get(add_admin_form).post(add_admin_submit))
        .route("/health", get(health_check))
        .nest_service("/static", ServeDir::new(static_dir))
        .layer(middleware::from_fn_with_state(state.clone(), touch_session))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Slide the idle window for any request carrying a session cookie, public
/// pages included. Expired rows are reaped here; the admin guard still
/// decides access on its own lookup.
async fn touch_session(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let jar = CookieJar::from_headers(request.headers());
    if let Some(cookie) = jar.get(auth::SESSION_COOKIE) {
        if let Err(e) = auth::validate_session(&state.db, cookie.value(), Utc::now()).await {
            tracing::error!(error = %e, "Session touch failed");
        }
    }
    next.run(request).await
}

async fn health_check() -> &'static str {
    "OK"
}

fn render_template<T: Template>(template: T) -> Result<Response, WebError> {
    Ok(Html(template.render()?).into_response())
}

/// Coarse device sniffing from the user-agent; heuristic, best-effort.
fn device_type(headers: &HeaderMap) -> &'static str {
    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_lowercase();
    if MOBILE_KEYWORDS.iter().any(|k| user_agent.contains(k)) {
        "mobile"
    } else {
        "desktop"
    }
}

fn background(device: &str) -> &'static str {
    if device == "mobile" {
        "/static/pe.png"
    } else {
        "/static/pc.png"
    }
}

#[derive(Debug, Deserialize)]
struct PageQuery {
    page: Option<String>,
}

impl PageQuery {
    /// Page number, defaulting to 1 on absent or unparseable input.
    fn number(&self) -> usize {
        self.page
            .as_deref()
            .and_then(|s| s.parse().ok())
            .unwrap_or(1)
            .max(1)
    }
}

/// Slice one page out of an ordered listing. Out-of-range pages yield an
/// empty slice rather than an error.
fn paginate<T>(items: Vec<T>, page: usize, per_page: usize) -> (Vec<T>, usize) {
    let total_pages = items.len().div_ceil(per_page);
    let start = (page - 1).saturating_mul(per_page);
    let paginated = items.into_iter().skip(start).take(per_page).collect();
    (paginated, total_pages)
}

// ---------------------------------------------------------------------------
// Public views
// ---------------------------------------------------------------------------

async fn home(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    jar: CookieJar,
) -> Result<Response, WebError> {
    let device = device_type(&headers);
    let (jar, flashes) = flash::take(jar);

    let latest_projects: Vec<Project> = Project::list(&state.db, None)
        .await?
        .into_iter()
        .take(4)
        .collect();

    let template = IndexTemplate {
        background: background(device),
        device_type: device,
        flashes,
        latest_projects,
    };
    Ok((jar, render_template(template)?).into_response())
}

async fn show_category(
    State(state): State<Arc<AppState>>,
    Path(category): Path<String>,
    Query(query): Query<PageQuery>,
    headers: HeaderMap,
    jar: CookieJar,
) -> Result<Response, WebError> {
    let device = device_type(&headers);
    let (jar, flashes) = flash::take(jar);
    let page = query.number();

    let projects = Project::list(&state.db, Some(&category)).await?;
    let (projects, total_pages) = paginate(projects, page, CATEGORY_PAGE_SIZE);

    let template = CategoryTemplate {
        background: background(device),
        device_type: device,
        flashes,
        category,
        projects,
        pages: page_links(total_pages, page),
    };
    Ok((jar, render_template(template)?).into_response())
}

// ---------------------------------------------------------------------------
// Login / logout
// ---------------------------------------------------------------------------

async fn login_page(headers: HeaderMap, jar: CookieJar) -> Result<Response, WebError> {
    let device = device_type(&headers);
    let (jar, flashes) = flash::take(jar);
    let template = LoginTemplate {
        background: background(device),
        device_type: device,
        flashes,
    };
    Ok((jar, render_template(template)?).into_response())
}

#[derive(Debug, Deserialize)]
struct LoginForm {
    username: String,
    password: String,
}

async fn login_submit(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> Result<Response, WebError> {
    if Admin::verify(&state.db, &form.username, &form.password).await? {
        let token = auth::create_session(&state.db, &form.username).await?;
        let jar = jar.add(
            Cookie::build((auth::SESSION_COOKIE, token))
                .path("/")
                .http_only(true)
                .same_site(SameSite::Lax)
                .build(),
        );
        let jar = flash::push(jar, Flash::success("登录成功"));
        Ok((jar, Redirect::to("/dashboard")).into_response())
    } else {
        let jar = flash::push(jar, Flash::error("用户名或密码错误"));
        Ok((jar, Redirect::to("/login")).into_response())
    }
}

async fn logout(State(state): State<Arc<AppState>>, jar: CookieJar) -> Result<Response, WebError> {
    if let Some(cookie) = jar.get(auth::SESSION_COOKIE) {
        auth::destroy_session(&state.db, cookie.value()).await?;
    }
    let jar = jar.remove(Cookie::build((auth::SESSION_COOKIE, "")).path("/").build());
    let jar = flash::push(jar, Flash::success("已成功退出登录"));
    Ok((jar, Redirect::to("/")).into_response())
}

/// Session checkpoint: 204 while the session is valid, otherwise the guard
/// redirects to the login page.
async fn check_session(_admin: CurrentAdmin) -> StatusCode {
    StatusCode::NO_CONTENT
}

// ---------------------------------------------------------------------------
// Admin views
// ---------------------------------------------------------------------------

async fn dashboard(
    State(state): State<Arc<AppState>>,
    _admin: CurrentAdmin,
    headers: HeaderMap,
    jar: CookieJar,
) -> Result<Response, WebError> {
    let device = device_type(&headers);
    let (jar, flashes) = flash::take(jar);

    let active = |projects: Vec<Project>| -> Vec<Project> {
        projects
            .into_iter()
            .filter(|p| p.status != STATUS_COMPLETED)
            .collect()
    };
    let knitting_projects = active(Project::list(&state.db, Some("knitting")).await?);
    let crafting_projects = active(Project::list(&state.db, Some("crafting")).await?);

    let template = DashboardTemplate {
        background: background(device),
        device_type: device,
        flashes,
        knitting_projects,
        crafting_projects,
    };
    Ok((jar, render_template(template)?).into_response())
}

async fn completed_projects(
    State(state): State<Arc<AppState>>,
    _admin: CurrentAdmin,
    Query(query): Query<PageQuery>,
    headers: HeaderMap,
    jar: CookieJar,
) -> Result<Response, WebError> {
    let device = device_type(&headers);
    let (jar, flashes) = flash::take(jar);
    let page = query.number();

    let completed: Vec<Project> = Project::list(&state.db, None)
        .await?
        .into_iter()
        .filter(|p| p.status.trim() == STATUS_COMPLETED)
        .collect();
    let (projects, total_pages) = paginate(completed, page, COMPLETED_PAGE_SIZE);

    let template = CompletedProjectsTemplate {
        background: background(device),
        device_type: device,
        flashes,
        projects,
        pages: page_links(total_pages, page),
    };
    Ok((jar, render_template(template)?).into_response())
}

// ---------------------------------------------------------------------------
// Project add / edit / delete
// ---------------------------------------------------------------------------

struct ProjectForm {
    title: String,
    description: Option<String>,
    category: String,
    status: String,
    completed_at: Option<String>,
    image: Option<(String, Vec<u8>)>,
}

async fn read_project_form(mut multipart: Multipart) -> Result<ProjectForm, WebError> {
    let mut form = ProjectForm {
        title: String::new(),
        description: None,
        category: String::new(),
        status: String::new(),
        completed_at: None,
        image: None,
    };

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "title" => form.title = field.text().await?,
            "description" => {
                let text = field.text().await?;
                let trimmed = text.trim();
                form.description = (!trimmed.is_empty()).then(|| trimmed.to_string());
            }
            "category" => form.category = field.text().await?,
            "status" => form.status = field.text().await?,
            "completed_at" => {
                let text = field.text().await?;
                let trimmed = text.trim();
                form.completed_at = (!trimmed.is_empty()).then(|| trimmed.to_string());
            }
            "image" => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let data = field.bytes().await?;
                if !filename.is_empty() && !data.is_empty() {
                    form.image = Some((filename, data.to_vec()));
                }
            }
            _ => {}
        }
    }

    Ok(form)
}

async fn add_project_form(
    _admin: CurrentAdmin,
    headers: HeaderMap,
    jar: CookieJar,
) -> Result<Response, WebError> {
    let device = device_type(&headers);
    let (jar, flashes) = flash::take(jar);
    let template = AddProjectTemplate {
        background: background(device),
        device_type: device,
        flashes,
    };
    Ok((jar, render_template(template)?).into_response())
}

async fn add_project_submit(
    State(state): State<Arc<AppState>>,
    _admin: CurrentAdmin,
    jar: CookieJar,
    multipart: Multipart,
) -> Result<Response, WebError> {
    let form = read_project_form(multipart).await?;
    let mut jar = jar;

    let (completed_at, invalid_date) =
        normalize_completed_at(&form.status, form.completed_at.as_deref());
    if invalid_date {
        jar = flash::push(jar, Flash::warning("完成时间格式无效，已忽略"));
    }

    let mut project = Project::new(
        &form.title,
        form.description.as_deref(),
        &form.category,
        &form.status,
    );
    project.completed_at = completed_at;

    if let Some((filename, data)) = &form.image {
        let (image_path, thumbnail_path) = state.media.store(filename, data).await?;
        project.image_path = image_path;
        project.thumbnail_path = thumbnail_path;
    }

    project.save(&state.db).await?;

    let jar = flash::push(jar, Flash::success("项目添加成功"));
    Ok((jar, Redirect::to("/dashboard")).into_response())
}

async fn edit_project_form(
    State(state): State<Arc<AppState>>,
    _admin: CurrentAdmin,
    Path(id): Path<i64>,
    headers: HeaderMap,
    jar: CookieJar,
) -> Result<Response, WebError> {
    let device = device_type(&headers);
    let (jar, flashes) = flash::take(jar);

    let Some(project) = Project::get(&state.db, id).await? else {
        let jar = flash::push(jar, Flash::error("项目不存在"));
        return Ok((jar, Redirect::to("/dashboard")).into_response());
    };

    let template = EditProjectTemplate {
        background: background(device),
        device_type: device,
        flashes,
        project,
    };
    Ok((jar, render_template(template)?).into_response())
}

async fn edit_project_submit(
    State(state): State<Arc<AppState>>,
    _admin: CurrentAdmin,
    Path(id): Path<i64>,
    jar: CookieJar,
    multipart: Multipart,
) -> Result<Response, WebError> {
    let Some(mut project) = Project::get(&state.db, id).await? else {
        let jar = flash::push(jar, Flash::error("项目不存在"));
        return Ok((jar, Redirect::to("/dashboard")).into_response());
    };

    let form = read_project_form(multipart).await?;
    let mut jar = jar;

    project.title = form.title;
    project.description = form.description;
    project.category = form.category;
    project.status = form.status;

    let (completed_at, invalid_date) =
        normalize_completed_at(&project.status, form.completed_at.as_deref());
    if invalid_date {
        jar = flash::push(jar, Flash::warning("完成时间格式无效，已忽略"));
    }
    project.completed_at = completed_at;

    // Replace the image only when a new file was supplied; the previous
    // non-placeholder files are removed best-effort
    if let Some((filename, data)) = &form.image {
        let old_image = std::mem::take(&mut project.image_path);
        let old_thumbnail = std::mem::take(&mut project.thumbnail_path);

        let (image_path, thumbnail_path) = state.media.store(filename, data).await?;
        project.image_path = image_path;
        project.thumbnail_path = thumbnail_path;

        state.media.remove(&old_image).await;
        state.media.remove(&old_thumbnail).await;
    }

    project.save(&state.db).await?;
    let jar = flash::push(jar, Flash::success("项目更新成功"));

    let target = if project.status == STATUS_COMPLETED {
        "/completed_projects"
    } else {
        "/dashboard"
    };
    Ok((jar, Redirect::to(target)).into_response())
}

async fn delete_project(
    State(state): State<Arc<AppState>>,
    _admin: CurrentAdmin,
    Path(id): Path<i64>,
    jar: CookieJar,
) -> Result<Response, WebError> {
    let jar = match Project::get(&state.db, id).await? {
        Some(project) => {
            // Files first, best-effort; the record goes away regardless
            state.media.remove(&project.image_path).await;
            state.media.remove(&project.thumbnail_path).await;
            Project::delete(&state.db, id).await?;
            flash::push(jar, Flash::success("项目已删除"))
        }
        None => flash::push(jar, Flash::error("项目不存在")),
    };
    Ok((jar, Redirect::to("/dashboard")).into_response())
}

// ---------------------------------------------------------------------------
// Admin management
// ---------------------------------------------------------------------------

async fn add_admin_form(
    State(state): State<Arc<AppState>>,
    _admin: CurrentAdmin,
    headers: HeaderMap,
    jar: CookieJar,
) -> Result<Response, WebError> {
    let device = device_type(&headers);
    let (jar, flashes) = flash::take(jar);

    let template = AddAdminTemplate {
        background: background(device),
        device_type: device,
        flashes,
        admins: Admin::list(&state.db).await?,
    };
    Ok((jar, render_template(template)?).into_response())
}

#[derive(Debug, Deserialize)]
struct AddAdminForm {
    username: String,
    password: String,
}

async fn add_admin_submit(
    State(state): State<Arc<AppState>>,
    _admin: CurrentAdmin,
    jar: CookieJar,
    Form(form): Form<AddAdminForm>,
) -> Result<Response, WebError> {
    let jar = if Admin::create(&state.db, &form.username, &form.password).await? {
        flash::push(jar, Flash::success("管理员添加成功"))
    } else {
        flash::push(jar, Flash::error("用户名已存在"))
    };
    Ok((jar, Redirect::to("/add_admin")).into_response())
}
