use chrono::{Duration, Utc};
use serde::Serialize;

use modhub_shared::errors::AppResult;

use crate::store::{AuthorStats, CategoryModCount, DailyDownloads, Store};

pub const DASHBOARD_DAYS: i64 = 30;
pub const TOP_AUTHORS: u64 = 5;

#[derive(Debug, Serialize)]
pub struct Dashboard {
    pub downloads_per_day: Vec<DailyDownloads>,
    pub mods_per_category: Vec<CategoryModCount>,
    pub top_authors: Vec<AuthorStats>,
}

pub fn dashboard(store: &dyn Store) -> AppResult<Dashboard> {
    let since = Utc::now() - Duration::days(DASHBOARD_DAYS);
    Ok(Dashboard {
        downloads_per_day: store.downloads_per_day(since)?,
        mods_per_category: store.mods_per_category()?,
        top_authors: store.top_authors(TOP_AUTHORS)?,
    })
}
