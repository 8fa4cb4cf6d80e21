//! Read-only admin dashboard, rendered server side from `list_users` and `stats`.

use std::fmt::Write;

use axum::{extract::State, response::Html, routing::get, Router};
use tracing::instrument;

use crate::{
    accounts::{
        errors::AccountError,
        repo_types::{PublicUser, Stats},
        services,
    },
    state::AppState,
};

const REFRESH_SECS: u32 = 30;

pub fn router() -> Router<AppState> {
    Router::new().route("/admin", get(dashboard))
}

#[instrument(skip(state))]
pub async fn dashboard(State(state): State<AppState>) -> Result<Html<String>, AccountError> {
    let stats = services::stats(&state.db).await?;
    let users = services::list_users(&state.db).await?;
    Ok(Html(render(&stats, &users)))
}

fn render(stats: &Stats, users: &[PublicUser]) -> String {
    let mut rows = String::new();
    for u in users {
        let created = u
            .created_at
            .format(&time::format_description::well_known::Rfc3339)
            .unwrap_or_default();
        // Writing into a String cannot fail.
        let _ = write!(
            rows,
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
            u.id,
            escape(&u.username),
            escape(&u.email),
            escape(u.mood.as_deref().unwrap_or("N/A")),
            created,
        );
    }

    let mut moods = String::new();
    for m in &stats.mood_distribution {
        let _ = write!(moods, "<li>{}: {}</li>", escape(&m.mood), m.count);
    }

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<meta http-equiv="refresh" content="{refresh}">
<title>User Management Dashboard</title>
<style>
body {{ font-family: Arial, sans-serif; margin: 40px; }}
table {{ border-collapse: collapse; width: 100%; }}
th, td {{ border: 1px solid #ddd; padding: 12px; text-align: left; }}
th {{ background-color: #f2f2f2; }}
.stats {{ display: flex; gap: 20px; margin-bottom: 30px; }}
.stat-box {{ padding: 20px; background: #f5f5f5; border-radius: 5px; }}
</style>
</head>
<body>
<h1>User Management Dashboard</h1>
<div class="stats">
<div class="stat-box"><h3>Total Users: <span id="totalUsers">{total}</span></h3></div>
<div class="stat-box"><h3>Recent Signups: <span id="recentSignups">{recent}</span></h3></div>
<div class="stat-box"><h3>Moods</h3><ul>{moods}</ul></div>
</div>
<table id="usersTable">
<thead><tr><th>ID</th><th>Username</th><th>Email</th><th>Mood</th><th>Created At</th></tr></thead>
<tbody>{rows}</tbody>
</table>
</body>
</html>
"#,
        refresh = REFRESH_SECS,
        total = stats.total_users,
        recent = stats.recent_signups,
        moods = moods,
        rows = rows,
    )
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
