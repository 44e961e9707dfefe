use std::fmt::Write;

use chrono::SecondsFormat;

use crate::StateStore;
use crate::WatchConfig;

/// One dashboard row, read under the client's lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientRow {
    pub id: String,
    pub name: String,
    pub status: String,
    pub last_alert: String,
}

pub fn rows(
    store: &StateStore,
    watch: &WatchConfig,
) -> Vec<ClientRow> {
    store
        .list_client_ids()
        .filter_map(|id| {
            // Ids come from the store itself
            let guard = store.acquire(id).ok()?;
            Some(ClientRow {
                id: id.to_string(),
                name: watch.display_name(id).to_string(),
                status: guard.status(watch.down_interval).to_string(),
                last_alert: guard
                    .last_alert_wall_time()
                    .map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true))
                    .unwrap_or_else(|| "never".to_string()),
            })
        })
        .collect()
}

pub fn render(
    store: &StateStore,
    watch: &WatchConfig,
) -> String {
    let mut html = String::from(
        "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"><title>deadman</title></head>\n<body>\n<h1>deadman</h1>\n<table>\n<tr><th>Client</th><th>Name</th><th>Status</th><th>Last alert</th></tr>\n",
    );
    for row in rows(store, watch) {
        // Writing into a String cannot fail
        let _ = writeln!(
            html,
            "<tr class=\"{}\"><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
            row.status,
            escape(&row.id),
            escape(&row.name),
            row.status,
            row.last_alert
        );
    }
    html.push_str("</table>\n</body>\n</html>\n");
    html
}

fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}
