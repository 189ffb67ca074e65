//! Aircall record formatters, dataset schemas and the teams joins.

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use tabula::{FormatterRegistry, ResourceCollection, Result, ResultAssembler, Row, Schema};

pub const CALLS: &str = "calls";
pub const USERS: &str = "users";
pub const TAGS: &str = "tags";
pub const TEAMS: &str = "teams";

pub const CALLS_COLUMNS: &[&str] = &[
    "id",
    "direction",
    "duration",
    "answered_at",
    "ended_at",
    "user_id",
    "tags",
    "user_name",
    "team",
    "day",
];
pub const TAGS_COLUMNS: &[&str] = &["id", "name", "color", "description"];
pub const TEAMS_COLUMNS: &[&str] = &["team", "user_id", "user_name", "user_created_at"];
pub const USERS_COLUMNS: &[&str] = &["user_id", "user_name", "user_created_at"];

fn row(value: Value) -> Row {
    match value {
        Value::Object(map) => map,
        _ => Row::new(),
    }
}

fn field(record: &Value, key: &str) -> Value {
    record.get(key).cloned().unwrap_or(Value::Null)
}

/// `started_at` (epoch seconds) as a `YYYY-MM-DD` UTC date.
fn call_day(record: &Value) -> Value {
    record
        .get("started_at")
        .and_then(Value::as_i64)
        .and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0))
        .map(|started| Value::String(started.format("%Y-%m-%d").to_string()))
        .unwrap_or(Value::Null)
}

pub fn format_call(record: &Value) -> Result<Vec<Row>> {
    let user = record.get("user").unwrap_or(&Value::Null);
    Ok(vec![row(json!({
        "id": field(record, "id"),
        "direction": field(record, "direction"),
        "duration": field(record, "duration"),
        "answered_at": field(record, "answered_at"),
        "ended_at": field(record, "ended_at"),
        "user_id": field(user, "id"),
        "tags": field(record, "tags"),
        "user_name": field(user, "name"),
        "day": call_day(record),
    }))])
}

pub fn format_user(record: &Value) -> Result<Vec<Row>> {
    Ok(vec![row(json!({
        "user_id": field(record, "id"),
        "user_name": field(record, "name"),
        "user_created_at": field(record, "created_at"),
    }))])
}

/// One row per team member.
pub fn format_team(record: &Value) -> Result<Vec<Row>> {
    let team = field(record, "name");
    let members = record
        .get("users")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    Ok(members
        .iter()
        .map(|user| {
            row(json!({
                "team": team.clone(),
                "user_id": field(user, "id"),
                "user_name": field(user, "name"),
                "user_created_at": field(user, "created_at"),
            }))
        })
        .collect())
}

pub fn format_tag(record: &Value) -> Result<Vec<Row>> {
    Ok(vec![row(json!({
        "id": field(record, "id"),
        "name": field(record, "name"),
        "color": field(record, "color"),
        "description": field(record, "description"),
    }))])
}

pub fn formatters() -> Result<FormatterRegistry> {
    FormatterRegistry::new([CALLS, USERS, TAGS, TEAMS])
        .with(CALLS, format_call)?
        .with(USERS, format_user)?
        .with(TAGS, format_tag)?
        .with(TEAMS, format_team)
}

pub fn assembler() -> ResultAssembler {
    ResultAssembler::new()
        .with_schema(CALLS, Schema::new(CALLS_COLUMNS.iter().copied()))
        .with_schema(USERS, Schema::new(USERS_COLUMNS.iter().copied()))
        .with_schema(TAGS, Schema::new(TAGS_COLUMNS.iter().copied()))
        .with_schema(TEAMS, Schema::new(TEAMS_COLUMNS.iter().copied()))
}

// Values are not hashable; their JSON text is.
fn lookup_key(value: &Value) -> Option<String> {
    (!value.is_null()).then(|| value.to_string())
}

/// Team assigned to calls whose user belongs to no team.
pub const NO_TEAM: &str = "NO TEAM";

/// Fill the `team` column of calls from the team membership table.
///
/// A user in several teams gets the first team listed; a user in none gets
/// [`NO_TEAM`].
pub fn calls_with_teams(mut calls: ResourceCollection, teams: &ResourceCollection) -> ResourceCollection {
    let mut team_of_user: HashMap<String, Value> = HashMap::new();
    if let (Some(user_col), Some(team_col)) =
        (teams.column_index("user_id"), teams.column_index("team"))
    {
        for member in &teams.rows {
            if let Some(key) = lookup_key(&member[user_col]) {
                team_of_user.entry(key).or_insert_with(|| member[team_col].clone());
            }
        }
    }

    let (Some(call_user_col), Some(call_team_col)) =
        (calls.column_index("user_id"), calls.column_index("team"))
    else {
        return calls;
    };
    for call in &mut calls.rows {
        call[call_team_col] = lookup_key(&call[call_user_col])
            .and_then(|k| team_of_user.get(&k))
            .cloned()
            .unwrap_or_else(|| Value::String(NO_TEAM.to_string()));
    }
    calls
}

/// Users as team memberships: every member row, then users without a team.
///
/// The result carries the teams columns and the `users` dataset name.
pub fn users_with_teams(users: &ResourceCollection, teams: &ResourceCollection) -> ResourceCollection {
    let schema = Schema::new(TEAMS_COLUMNS.iter().copied());
    let mut result = schema.collect(USERS, &teams.to_records());

    let members: HashSet<String> = teams
        .column("user_id")
        .unwrap_or_default()
        .into_iter()
        .filter_map(lookup_key)
        .collect();

    for user in users.to_records() {
        let in_team = user
            .get("user_id")
            .and_then(lookup_key)
            .is_some_and(|key| members.contains(&key));
        if !in_team {
            result.push(&user);
        }
    }
    result
}
