//! Shared utilities for CLI commands.

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use chrono_tz::Tz;
use wls_core::{NameLookup, RawTimeEntry, local_day_bounds, resolve_timezone};
use wls_db::Database;
use wls_http::{BambooClient, ClockifyClient};

use crate::Config;

/// Parses a `YYYY-MM-DD` command-line date.
pub fn parse_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|_| format!("invalid date '{s}', expected YYYY-MM-DD"))
}

/// Opens the configured database, creating its parent directory if needed.
pub fn open_database(config: &Config) -> Result<Database> {
    if let Some(parent) = config.database_path.parent() {
        std::fs::create_dir_all(parent).context("failed to create database directory")?;
    }
    Database::open(&config.database_path)
        .with_context(|| format!("failed to open {}", config.database_path.display()))
}

fn required<'a>(value: Option<&'a String>, hint: &str) -> Result<&'a str> {
    value
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| anyhow::anyhow!("missing {hint}"))
}

pub fn clockify_client(config: &Config) -> Result<ClockifyClient> {
    let api_key = required(
        config.clockify.api_key.as_ref(),
        "Clockify API key (set WLS_CLOCKIFY__API_KEY or [clockify] api_key in config.toml)",
    )?;
    Ok(ClockifyClient::new(api_key)
        .context("failed to create Clockify client")?
        .with_base_url(&config.clockify.base_url)
        .with_retry(config.retry.policy()))
}

pub fn bamboo_client(config: &Config) -> Result<BambooClient> {
    let api_key = required(
        config.bamboohr.api_key.as_ref(),
        "BambooHR API key (set WLS_BAMBOOHR__API_KEY or [bamboohr] api_key in config.toml)",
    )?;
    let client = match (&config.bamboohr.base_url, &config.bamboohr.domain) {
        (Some(base_url), _) => BambooClient::new("", api_key)?.with_base_url(base_url),
        (None, Some(domain)) if !domain.trim().is_empty() => {
            BambooClient::new(domain.trim(), api_key)?
        }
        _ => bail!("missing BambooHR domain (set WLS_BAMBOOHR__DOMAIN or [bamboohr] domain)"),
    };
    Ok(client.with_retry(config.retry.policy()))
}

/// Everything fetched from the source for one date range.
pub struct SourceBatch {
    pub entries: Vec<RawTimeEntry>,
    pub names: NameLookup,
    pub tz: Tz,
}

/// Fetches the user's entries and name lookup for the local days `[from, to]`.
///
/// The zone is the configured override, else the Clockify profile zone,
/// else UTC. Day boundaries are taken in that zone.
pub async fn fetch_source(
    client: &ClockifyClient,
    config: &Config,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<SourceBatch> {
    let user = client
        .current_user()
        .await
        .context("failed to fetch Clockify user")?;
    let workspace = match config.clockify.workspace_id.as_deref() {
        Some(id) if !id.trim().is_empty() => id.trim().to_string(),
        _ => user
            .workspace()
            .map(str::to_string)
            .context("no Clockify workspace configured and the user has no active workspace")?,
    };
    let tz = resolve_timezone(config.timezone.as_deref().or(user.time_zone()))?;
    tracing::debug!(user = %user.id, %workspace, %tz, "resolved source context");

    let (start, end) = local_day_bounds(from, to, &tz);
    let entries = client
        .time_entries(&workspace, &user.id, start, end)
        .await
        .context("failed to fetch Clockify time entries")?;
    let names = client
        .name_lookup(&workspace)
        .await
        .context("failed to fetch Clockify projects")?;

    Ok(SourceBatch { entries, names, tz })
}
