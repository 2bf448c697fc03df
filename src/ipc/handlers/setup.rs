use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::reports::ReportOptions;
use rusqlite::Connection;
use serde_json::{json, Map, Value};

#[derive(Clone, Copy)]
pub enum SetupSection {
    Academic,
    Attendance,
    Reports,
}

impl SetupSection {
    const ALL: [SetupSection; 3] = [Self::Academic, Self::Attendance, Self::Reports];

    fn parse(s: &str) -> Option<Self> {
        match s {
            "academic" => Some(Self::Academic),
            "attendance" => Some(Self::Attendance),
            "reports" => Some(Self::Reports),
            _ => None,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Academic => "academic",
            Self::Attendance => "attendance",
            Self::Reports => "reports",
        }
    }

    fn key(self) -> &'static str {
        match self {
            Self::Academic => "setup.academic",
            Self::Attendance => "setup.attendance",
            Self::Reports => "setup.reports",
        }
    }
}

fn default_section(section: SetupSection) -> Value {
    match section {
        SetupSection::Academic => json!({
            "academicYear": "2024-25",
            "maxSemester": 8
        }),
        SetupSection::Attendance => json!({
            "shortageThresholdPercent": 75
        }),
        SetupSection::Reports => json!({
            "collegeName": "NPV College",
            "currencySymbol": "₹",
            "includeFees": true
        }),
    }
}

fn as_object_mut(value: &mut Value) -> Result<&mut Map<String, Value>, String> {
    value
        .as_object_mut()
        .ok_or_else(|| "internal setup object must be a JSON object".to_string())
}

fn parse_bool(v: &Value, key: &str) -> Result<bool, String> {
    v.as_bool().ok_or_else(|| format!("{} must be boolean", key))
}

fn parse_i64_range(v: &Value, key: &str, min: i64, max: i64) -> Result<i64, String> {
    let n = v.as_i64().ok_or_else(|| format!("{} must be integer", key))?;
    if !(min..=max).contains(&n) {
        return Err(format!("{} must be in {}..={}", key, min, max));
    }
    Ok(n)
}

fn parse_string_max(v: &Value, key: &str, max_len: usize) -> Result<String, String> {
    let s = v.as_str().ok_or_else(|| format!("{} must be string", key))?;
    let s = s.trim();
    if s.chars().count() > max_len {
        return Err(format!("{} length must be <= {}", key, max_len));
    }
    Ok(s.to_string())
}

/// `YYYY-YY` where the second year follows the first, e.g. `2024-25`.
fn parse_academic_year(v: &Value, key: &str) -> Result<String, String> {
    let s = parse_string_max(v, key, 7)?;
    let bad = || format!("{} must look like 2024-25", key);
    let (start, end) = s.split_once('-').ok_or_else(bad)?;
    if start.len() != 4 || end.len() != 2 {
        return Err(bad());
    }
    let start: u32 = start.parse().map_err(|_| bad())?;
    let end: u32 = end.parse().map_err(|_| bad())?;
    if (start + 1) % 100 != end {
        return Err(bad());
    }
    Ok(s)
}

fn merge_section_patch(
    section: SetupSection,
    current: &mut Value,
    patch: &Map<String, Value>,
) -> Result<(), String> {
    let obj = as_object_mut(current)?;
    for (k, v) in patch {
        match section {
            SetupSection::Academic => match k.as_str() {
                "academicYear" => {
                    obj.insert(k.clone(), Value::String(parse_academic_year(v, k)?));
                }
                "maxSemester" => {
                    obj.insert(k.clone(), Value::from(parse_i64_range(v, k, 1, 12)?));
                }
                _ => return Err(format!("unknown academic field: {}", k)),
            },
            SetupSection::Attendance => match k.as_str() {
                "shortageThresholdPercent" => {
                    obj.insert(k.clone(), Value::from(parse_i64_range(v, k, 0, 100)?));
                }
                _ => return Err(format!("unknown attendance field: {}", k)),
            },
            SetupSection::Reports => match k.as_str() {
                "collegeName" => {
                    let s = parse_string_max(v, k, 120)?;
                    if s.is_empty() {
                        return Err("collegeName must not be empty".into());
                    }
                    obj.insert(k.clone(), Value::String(s));
                }
                "currencySymbol" => {
                    obj.insert(k.clone(), Value::String(parse_string_max(v, k, 8)?));
                }
                "includeFees" => {
                    obj.insert(k.clone(), Value::Bool(parse_bool(v, k)?));
                }
                _ => return Err(format!("unknown reports field: {}", k)),
            },
        }
    }
    Ok(())
}

pub fn load_section(conn: &Connection, section: SetupSection) -> anyhow::Result<Value> {
    let mut current = default_section(section);
    if let Some(saved) = db::settings_get_json(conn, section.key())? {
        if let Some(saved_obj) = saved.as_object() {
            // Malformed historical values fall back to defaults field by field.
            for (k, v) in saved_obj {
                let mut one = Map::new();
                one.insert(k.clone(), v.clone());
                if let Err(e) = merge_section_patch(section, &mut current, &one) {
                    tracing::warn!(section = section.name(), error = %e, "ignoring saved setting");
                }
            }
        }
    }
    Ok(current)
}

pub fn academic_year(conn: &Connection) -> anyhow::Result<String> {
    let v = load_section(conn, SetupSection::Academic)?;
    Ok(v["academicYear"].as_str().unwrap_or("2024-25").to_string())
}

pub fn max_semester(conn: &Connection) -> anyhow::Result<u32> {
    let v = load_section(conn, SetupSection::Academic)?;
    Ok(v["maxSemester"].as_u64().and_then(|n| u32::try_from(n).ok()).unwrap_or(8))
}

pub fn shortage_threshold(conn: &Connection) -> anyhow::Result<u32> {
    let v = load_section(conn, SetupSection::Attendance)?;
    Ok(v["shortageThresholdPercent"]
        .as_u64()
        .and_then(|n| u32::try_from(n).ok())
        .unwrap_or(75))
}

pub fn report_options(conn: &Connection) -> anyhow::Result<ReportOptions> {
    let v = load_section(conn, SetupSection::Reports)?;
    Ok(ReportOptions {
        college_name: v["collegeName"].as_str().unwrap_or("NPV College").to_string(),
        currency_symbol: v["currencySymbol"].as_str().unwrap_or("₹").to_string(),
        include_fees: v["includeFees"].as_bool().unwrap_or(true),
        max_semester: max_semester(conn)?,
    })
}

fn handle_setup_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let mut out = Map::new();
    for section in SetupSection::ALL {
        match load_section(store.conn(), section) {
            Ok(v) => {
                out.insert(section.name().to_string(), v);
            }
            Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
        }
    }
    ok(&req.id, Value::Object(out))
}

fn handle_setup_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let conn = store.conn();
    let Some(section_raw) = req.params.get("section").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing section", None);
    };
    let Some(section) = SetupSection::parse(section_raw) else {
        return err(&req.id, "bad_params", "unknown section", None);
    };
    let Some(patch_obj) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "patch must be an object", None);
    };

    let mut current = match load_section(conn, section) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    if let Err(msg) = merge_section_patch(section, &mut current, patch_obj) {
        return err(&req.id, "bad_params", msg, None);
    }
    if let Err(e) = db::settings_set_json(conn, section.key(), &current) {
        return err(&req.id, "db_update_failed", e.to_string(), None);
    }
    let mut result = json!({ "ok": true });
    result[section.name()] = current;
    ok(&req.id, result)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "setup.get" => Some(handle_setup_get(state, req)),
        "setup.update" => Some(handle_setup_update(state, req)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn academic_year_must_be_consecutive() {
        assert!(parse_academic_year(&json!("2024-25"), "academicYear").is_ok());
        assert!(parse_academic_year(&json!("2099-00"), "academicYear").is_ok());
        assert!(parse_academic_year(&json!("2024-26"), "academicYear").is_err());
        assert!(parse_academic_year(&json!("24-25"), "academicYear").is_err());
        assert!(parse_academic_year(&json!(2024), "academicYear").is_err());
    }

    #[test]
    fn saved_values_overlay_defaults_and_bad_ones_are_skipped() {
        let conn = Connection::open_in_memory().expect("open");
        db::init_schema(&conn).expect("schema");
        db::settings_set_json(
            &conn,
            "setup.academic",
            &json!({ "academicYear": "2025-26", "maxSemester": 99 }),
        )
        .expect("set");
        let v = load_section(&conn, SetupSection::Academic).expect("load");
        assert_eq!(v["academicYear"], "2025-26");
        assert_eq!(v["maxSemester"], 8);
        assert_eq!(academic_year(&conn).expect("year"), "2025-26");
        assert_eq!(shortage_threshold(&conn).expect("threshold"), 75);
    }
}
