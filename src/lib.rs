/*!
# Gantt Tracker

A multi-user project tracker that presents each project's tasks on a Gantt chart.

## Overview

Users register, log in and create projects. Each project holds tasks with a
name, an optional date range, a progress percentage, a status, an optional
predecessor and a free-text comment. The project page shows the tasks as a
table and as a timeline; the timeline keeps itself current by polling a JSON
endpoint.

## Architecture

### Frontend Layer
- **Technologies**: HTML (Handlebars templates), CSS, JavaScript
- **Key Components**:
  - Project list and task forms
  - Gantt chart (frappe-gantt) fed by embedded JSON, then by polling
  - Comment modal backed by the comment API

### Backend Layer
- **Technologies**: Rust, axum, tokio
- **Core Components**:
  - Chart Data Deriver - turns a project's tasks into table rows and ordered
    Gantt records, resolving name-based dependencies to task ids
  - Form validation - parses submitted fields once at the request boundary
  - Authentication - argon2 password hashes, cookie sessions, auth middleware

### Data Persistence Layer
- SQLite through sqlx
- Every write runs inside an explicit transaction owned by the handler

## Modules

- **models**: User, Project and Task records, task statuses
- **chart**: Chart data derivation (table rows, Gantt records, bar colours)
- **forms**: Task and project form parsing and validation
- **db**: Schema, queries and transactional writes
- **login**: Password hashing, sessions, registration and login handlers
- **csrf**: Per-session CSRF tokens checked on every state-changing request
- **projects**: Project list, creation, deletion and project page
- **tasks**: Task add/edit/delete handlers
- **api**: JSON endpoints for the task list and comments
- **render**: Template registry and flash redirects
- **config**: Environment and command-line configuration
- **error**: Error type and its HTTP mapping
- **app**: Shared state, routing and server start-up

## REST API Endpoints

- `GET /api/projects/{id}/tasks` - Task rows and Gantt records of a project
- `GET /api/tasks/{id}/comment` - Read a task comment
- `POST /api/tasks/{id}/comment` - Replace a task comment
- `POST /projects/{project_id}/update_comment/{task_id}` - Set a non-empty comment
*/

pub mod chart;
pub mod forms;
pub mod models;

#[cfg(feature = "web")]
pub mod api;
#[cfg(feature = "web")]
pub mod app;
#[cfg(feature = "web")]
pub mod config;
#[cfg(feature = "web")]
pub mod csrf;
#[cfg(feature = "web")]
pub mod db;
#[cfg(feature = "web")]
pub mod error;
#[cfg(feature = "web")]
pub mod login;
#[cfg(feature = "web")]
pub mod projects;
#[cfg(feature = "web")]
pub mod render;
#[cfg(feature = "web")]
pub mod tasks;

pub use chart::{ChartData, GanttRecord, TaskListItem, VisualClass, derive};
pub use models::{Project, Task, TaskStatus, User};
