// Askama template definitions

use askama::Template;

use crate::db::models::{AdminListing, Project};
use crate::web::flash::Flash;

/// One pagination entry; precomputed so templates stay comparison-free.
pub struct PageLink {
    pub number: usize,
    pub current: bool,
}

pub fn page_links(total_pages: usize, current: usize) -> Vec<PageLink> {
    (1..=total_pages)
        .map(|number| PageLink {
            number,
            current: number == current,
        })
        .collect()
}

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub background: &'static str,
    pub device_type: &'static str,
    pub flashes: Vec<Flash>,
    pub latest_projects: Vec<Project>,
}

#[derive(Template)]
#[template(path = "category.html")]
pub struct CategoryTemplate {
    pub background: &'static str,
    pub device_type: &'static str,
    pub flashes: Vec<Flash>,
    pub category: String,
    pub projects: Vec<Project>,
    pub pages: Vec<PageLink>,
}

#[derive(Template)]
#[template(path = "login.html")]
pub struct LoginTemplate {
    pub background: &'static str,
    pub device_type: &'static str,
    pub flashes: Vec<Flash>,
}

#[derive(Template)]
#[template(path = "dashboard.html")]
pub struct DashboardTemplate {
    pub background: &'static str,
    pub device_type: &'static str,
    pub flashes: Vec<Flash>,
    pub knitting_projects: Vec<Project>,
    pub crafting_projects: Vec<Project>,
}

#[derive(Template)]
#[template(path = "completed_projects.html")]
pub struct CompletedProjectsTemplate {
    pub background: &'static str,
    pub device_type: &'static str,
    pub flashes: Vec<Flash>,
    pub projects: Vec<Project>,
    pub pages: Vec<PageLink>,
}

#[derive(Template)]
#[template(path = "add_project.html")]
pub struct AddProjectTemplate {
    pub background: &'static str,
    pub device_type: &'static str,
    pub flashes: Vec<Flash>,
}

#[derive(Template)]
#[template(path = "edit_project.html")]
pub struct EditProjectTemplate {
    pub background: &'static str,
    pub device_type: &'static str,
    pub flashes: Vec<Flash>,
    pub project: Project,
}

#[derive(Template)]
#[template(path = "add_admin.html")]
pub struct AddAdminTemplate {
    pub background: &'static str,
    pub device_type: &'static str,
    pub flashes: Vec<Flash>,
    pub admins: Vec<AdminListing>,
}
