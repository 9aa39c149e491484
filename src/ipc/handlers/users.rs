use serde_json::json;
use uuid::Uuid;

use crate::ipc::error::{err, ok};
use crate::ipc::helpers;
use crate::ipc::types::{AppState, Request};
use crate::store::{Role, User};

fn handle_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let role = match helpers::parse_opt_string(req.params.get("role")) {
        Ok(v) => v,
        Err(msg) => return err(&req.id, "bad_params", format!("role: {}", msg), None),
    };
    let role = match role {
        None => None,
        Some(raw) => match Role::parse(&raw) {
            Some(r) => Some(r),
            None => {
                return err(&req.id, "bad_params", "role must be direccion or profesor", None)
            }
        },
    };
    let data = match helpers::dataset(state, req) {
        Ok(d) => d,
        Err(e) => return e,
    };
    let users: Vec<&User> = data
        .users
        .iter()
        .filter(|u| role.map_or(true, |r| u.role == r))
        .collect();
    ok(&req.id, json!({ "users": users }))
}

fn handle_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let name = match helpers::required_str(req, "name") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let ci = match helpers::required_str(req, "ci") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let username = match helpers::required_str(req, "username") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let password = match helpers::required_str(req, "password") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let role_raw = match helpers::required_str(req, "role") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let role = match Role::parse(&role_raw) {
        Some(r) => r,
        None => return err(&req.id, "bad_params", "role must be direccion or profesor", None),
    };
    let specialty = match helpers::parse_opt_string(req.params.get("specialty")) {
        Ok(v) => v,
        Err(msg) => return err(&req.id, "bad_params", format!("specialty: {}", msg), None),
    };

    let data = match helpers::dataset_mut(state, req) {
        Ok(d) => d,
        Err(e) => return e,
    };
    let user = User {
        id: Uuid::new_v4().to_string(),
        name,
        ci,
        username,
        password,
        role,
        specialty,
    };
    data.users.push(user.clone());
    let save = helpers::save_after_mutation(state);
    ok(&req.id, json!({ "user": user, "save": save }))
}

fn handle_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let user_id = match helpers::required_str(req, "userId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let patch = match req.params.get("patch").and_then(|v| v.as_object()) {
        Some(p) => p.clone(),
        None => return err(&req.id, "bad_params", "missing patch", None),
    };

    // Parse the whole patch before assigning anything; a rejected field
    // must leave the record as it was.
    let mut new_name = None;
    let mut new_ci = None;
    let mut new_username = None;
    let mut new_password = None;
    let mut new_specialty: Option<Option<String>> = None;
    for (key, value) in &patch {
        match key.as_str() {
            "name" | "ci" | "username" | "password" => {
                let s = match value.as_str().map(str::trim).filter(|s| !s.is_empty()) {
                    Some(s) => s.to_string(),
                    None => {
                        return err(
                            &req.id,
                            "bad_params",
                            format!("patch.{} must be a non-empty string", key),
                            None,
                        )
                    }
                };
                match key.as_str() {
                    "name" => new_name = Some(s),
                    "ci" => new_ci = Some(s),
                    "username" => new_username = Some(s),
                    _ => new_password = Some(s),
                }
            }
            "specialty" => {
                new_specialty = match helpers::parse_opt_string(Some(value)) {
                    Ok(v) => Some(v),
                    Err(msg) => {
                        return err(
                            &req.id,
                            "bad_params",
                            format!("patch.specialty: {}", msg),
                            None,
                        )
                    }
                };
            }
            other => {
                return err(
                    &req.id,
                    "bad_params",
                    format!("unknown patch field: {}", other),
                    None,
                )
            }
        }
    }

    let data = match helpers::dataset_mut(state, req) {
        Ok(d) => d,
        Err(e) => return e,
    };
    let user = match data.users.iter_mut().find(|u| u.id == user_id) {
        Some(u) => u,
        None => {
            return err(&req.id, "not_found", format!("unknown user: {}", user_id), None)
        }
    };
    if let Some(v) = new_name {
        user.name = v;
    }
    if let Some(v) = new_ci {
        user.ci = v;
    }
    if let Some(v) = new_username {
        user.username = v;
    }
    if let Some(v) = new_password {
        user.password = v;
    }
    if let Some(v) = new_specialty {
        user.specialty = v;
    }
    let user = user.clone();
    let save = helpers::save_after_mutation(state);
    ok(&req.id, json!({ "user": user, "save": save }))
}

/// Removing a profesor detaches them from any courses they taught; the
/// courses stay, unassigned.
fn handle_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let user_id = match helpers::required_str(req, "userId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let data = match helpers::dataset_mut(state, req) {
        Ok(d) => d,
        Err(e) => return e,
    };
    let role = match data.users.iter().find(|u| u.id == user_id) {
        Some(u) => u.role,
        None => {
            return err(&req.id, "not_found", format!("unknown user: {}", user_id), None)
        }
    };
    data.users.retain(|u| u.id != user_id);

    let mut unassigned = 0usize;
    if role == Role::Profesor {
        for course in data.courses.iter_mut() {
            if course.teacher_id.as_deref() == Some(user_id.as_str()) {
                course.teacher_id = None;
                unassigned += 1;
            }
        }
    }
    if unassigned > 0 {
        tracing::info!("user {} deleted, {} courses unassigned", user_id, unassigned);
    }
    let save = helpers::save_after_mutation(state);
    ok(&req.id, json!({ "coursesUnassigned": unassigned, "save": save }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "users.list" => Some(handle_list(state, req)),
        "users.create" => Some(handle_create(state, req)),
        "users.update" => Some(handle_update(state, req)),
        "users.delete" => Some(handle_delete(state, req)),
        _ => None,
    }
}
