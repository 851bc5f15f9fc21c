// Employees service: login, self-service profile and the organisation
// directory (departments, teams, memberships).

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::{hash_password, issue_token, Claims};
use crate::db::employees::NewEmployee;
use crate::db::{DbDepartment, DbEmployee, DbTeam, PulseDb};
use crate::error::ApiError;
use crate::util::{format_ts, parse_ts};

const INVALID_CREDENTIALS: &str = "Invalid email or password";

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub employee: DbEmployee,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileView {
    #[serde(flatten)]
    pub employee: DbEmployee,
    pub department_name: Option<String>,
    pub team_names: Vec<String>,
    pub manager_name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    pub location: Option<String>,
    pub job_title: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateEmployeeRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub department_id: Option<String>,
    pub location: Option<String>,
    pub people_leader_id: Option<String>,
    pub is_admin: bool,
    pub is_people_leader: bool,
    pub job_title: Option<String>,
    pub hire_date: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTeamRequest {
    #[serde(default)]
    pub name: String,
    pub department_id: Option<String>,
}

/// Check credentials and issue a token. Unknown email and wrong password
/// produce the same error.
pub fn login(
    db: &PulseDb,
    secret: &[u8],
    ttl_hours: i64,
    req: &LoginRequest,
    now: DateTime<Utc>,
) -> Result<LoginResponse, ApiError> {
    let employee = db
        .get_employee_by_email(&req.email)?
        .filter(|e| e.matches_password(&req.password))
        .ok_or_else(|| ApiError::Unauthorized(INVALID_CREDENTIALS.into()))?;

    let expires_at = Duration::try_hours(ttl_hours.max(1))
        .and_then(|ttl| now.checked_add_signed(ttl))
        .ok_or_else(|| {
            ApiError::Internal(format!(
                "Configuration error: tokenTtlHours is out of range (got {})",
                ttl_hours
            ))
        })?;
    let claims = Claims {
        sub: employee.id.clone(),
        leader: employee.is_people_leader,
        admin: employee.is_admin,
        exp: expires_at.timestamp(),
    };
    let token = issue_token(secret, &claims)?;
    log::info!("Employee {} logged in", employee.id);
    Ok(LoginResponse { token, employee })
}

pub fn get_profile(db: &PulseDb, employee_id: &str) -> Result<ProfileView, ApiError> {
    let employee = db
        .get_employee(employee_id)?
        .ok_or_else(|| ApiError::not_found("Employee"))?;
    let department_name = match employee.department_id.as_deref() {
        Some(id) => db.get_department(id)?.map(|d| d.name),
        None => None,
    };
    let team_names = db
        .get_employee_teams(&employee.id)?
        .into_iter()
        .map(|t| t.name)
        .collect();
    let manager_name = match employee.people_leader_id.as_deref() {
        Some(id) => db.get_employee(id)?.map(|m| m.name),
        None => None,
    };
    Ok(ProfileView {
        employee,
        department_name,
        team_names,
        manager_name,
    })
}

pub fn update_profile(
    db: &PulseDb,
    employee_id: &str,
    req: &UpdateProfileRequest,
) -> Result<ProfileView, ApiError> {
    let location = req.location.as_deref().map(str::trim);
    let job_title = req.job_title.as_deref().map(str::trim);
    if !db.update_employee_profile(employee_id, location, job_title)? {
        return Err(ApiError::not_found("Employee"));
    }
    get_profile(db, employee_id)
}

pub fn create_employee(db: &PulseDb, req: &CreateEmployeeRequest) -> Result<DbEmployee, ApiError> {
    let name = req.name.trim();
    let email = req.email.trim();
    if name.is_empty() || email.is_empty() || req.password.is_empty() {
        return Err(ApiError::Validation("name, email and password are required".into()));
    }
    if !email.contains('@') {
        return Err(ApiError::Validation(format!("Invalid email: {}", email)));
    }
    if let Some(dept) = req.department_id.as_deref() {
        if db.get_department(dept)?.is_none() {
            return Err(ApiError::Validation(format!("Unknown department: {}", dept)));
        }
    }
    if let Some(leader) = req.people_leader_id.as_deref() {
        if db.get_employee(leader)?.is_none() {
            return Err(ApiError::Validation(format!("Unknown people leader: {}", leader)));
        }
    }
    let hire_date = match req.hire_date.as_deref().filter(|d| !d.trim().is_empty()) {
        Some(raw) => Some(format_ts(parse_ts(raw).ok_or_else(|| {
            ApiError::Validation(format!("Invalid hire date: {}", raw))
        })?)),
        None => None,
    };

    let new_employee = NewEmployee {
        name,
        email,
        password_hash: hash_password(&req.password),
        department_id: req.department_id.as_deref(),
        location: req.location.as_deref().map(str::trim).filter(|l| !l.is_empty()),
        people_leader_id: req.people_leader_id.as_deref(),
        is_admin: req.is_admin,
        is_people_leader: req.is_people_leader,
        job_title: req.job_title.as_deref(),
        hire_date: hire_date.as_deref(),
    };
    db.insert_employee(&new_employee).map_err(|e| {
        if e.is_unique_violation() {
            ApiError::Validation(format!("Email already registered: {}", email))
        } else {
            e.into()
        }
    })
}

pub fn create_department(db: &PulseDb, name: &str) -> Result<DbDepartment, ApiError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ApiError::Validation("Department name is required".into()));
    }
    db.insert_department(name).map_err(|e| {
        if e.is_unique_violation() {
            ApiError::Validation(format!("Department '{}' already exists", name))
        } else {
            e.into()
        }
    })
}

pub fn create_team(db: &PulseDb, req: &CreateTeamRequest) -> Result<DbTeam, ApiError> {
    let name = req.name.trim();
    if name.is_empty() {
        return Err(ApiError::Validation("Team name is required".into()));
    }
    if let Some(dept) = req.department_id.as_deref() {
        if db.get_department(dept)?.is_none() {
            return Err(ApiError::Validation(format!("Unknown department: {}", dept)));
        }
    }
    db.insert_team(name, req.department_id.as_deref()).map_err(|e| {
        if e.is_unique_violation() {
            ApiError::Validation(format!("Team '{}' already exists", name))
        } else {
            e.into()
        }
    })
}

pub fn team_members(db: &PulseDb, team_id: &str) -> Result<Vec<DbEmployee>, ApiError> {
    if db.get_team(team_id)?.is_none() {
        return Err(ApiError::not_found("Team"));
    }
    Ok(db.get_team_members(team_id)?)
}

/// Add a member; adding an existing member is a no-op.
pub fn add_team_member(db: &PulseDb, team_id: &str, employee_id: &str) -> Result<bool, ApiError> {
    if db.get_team(team_id)?.is_none() {
        return Err(ApiError::not_found("Team"));
    }
    if db.get_employee(employee_id)?.is_none() {
        return Err(ApiError::not_found("Employee"));
    }
    Ok(db.add_team_member(team_id, employee_id)?)
}

pub fn remove_team_member(db: &PulseDb, team_id: &str, employee_id: &str) -> Result<(), ApiError> {
    if db.remove_team_member(team_id, employee_id)? {
        Ok(())
    } else {
        Err(ApiError::not_found("Team membership"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::verify_token;
    use crate::db::test_utils::*;

    const SECRET: &[u8] = b"test-secret";

    fn now() -> DateTime<Utc> {
        parse_ts("2026-10-18T12:00:00Z").expect("timestamp")
    }

    #[test]
    fn test_login_issues_verifiable_token() {
        let db = test_db();
        let emp = seed_employee(&db, "Ana Lima", None, None, None);
        let resp = login(
            &db,
            SECRET,
            12,
            &LoginRequest {
                email: "ANA.LIMA@pulse.test".into(),
                password: "secret".into(),
            },
            now(),
        )
        .expect("login");
        let claims = verify_token(SECRET, &resp.token, now().timestamp()).expect("valid");
        assert_eq!(claims.sub, emp);
        assert!(!claims.leader);
    }

    #[test]
    fn test_login_with_out_of_range_ttl_is_an_error() {
        let db = test_db();
        seed_employee(&db, "Ana", None, None, None);
        let result = login(
            &db,
            SECRET,
            i64::MAX,
            &LoginRequest {
                email: "ana@pulse.test".into(),
                password: "secret".into(),
            },
            now(),
        );
        assert!(matches!(result, Err(ApiError::Internal(_))));
    }

    #[test]
    fn test_login_failures_look_alike() {
        let db = test_db();
        seed_employee(&db, "Ana", None, None, None);
        let wrong_password = login(
            &db,
            SECRET,
            12,
            &LoginRequest {
                email: "ana@pulse.test".into(),
                password: "nope".into(),
            },
            now(),
        )
        .expect_err("wrong password");
        let unknown = login(
            &db,
            SECRET,
            12,
            &LoginRequest {
                email: "ghost@pulse.test".into(),
                password: "secret".into(),
            },
            now(),
        )
        .expect_err("unknown");
        assert_eq!(wrong_password.to_string(), unknown.to_string());
        assert!(matches!(unknown, ApiError::Unauthorized(_)));
    }

    #[test]
    fn test_profile_joins_names() {
        let db = test_db();
        let dept = seed_department(&db, "Engineering");
        let team = seed_team(&db, "Platform");
        let boss = seed_employee(&db, "Boss", None, None, None);
        let emp = seed_employee(&db, "Ana", Some(&dept), Some("Lisbon"), Some(&boss));
        add_to_team(&db, &team, &emp);

        let profile = update_profile(
            &db,
            &emp,
            &UpdateProfileRequest {
                location: None,
                job_title: Some("Engineer".into()),
            },
        )
        .expect("profile");
        assert_eq!(profile.department_name.as_deref(), Some("Engineering"));
        assert_eq!(profile.team_names, vec!["Platform".to_string()]);
        assert_eq!(profile.manager_name.as_deref(), Some("Boss"));
        assert_eq!(profile.employee.location.as_deref(), Some("Lisbon"));
        assert_eq!(profile.employee.job_title.as_deref(), Some("Engineer"));
    }

    #[test]
    fn test_create_employee_and_membership() {
        let db = test_db();
        let req = CreateEmployeeRequest {
            name: "New Hire".into(),
            email: "new@pulse.test".into(),
            password: "pw".into(),
            hire_date: Some("2026-01-05".into()),
            ..Default::default()
        };
        let created = create_employee(&db, &req).expect("create");
        assert!(created.matches_password("pw"));
        assert_eq!(created.hire_date.as_deref(), Some("2026-01-05T00:00:00Z"));
        assert!(matches!(create_employee(&db, &req), Err(ApiError::Validation(_))));

        let team = create_team(
            &db,
            &CreateTeamRequest {
                name: "Ops".into(),
                department_id: None,
            },
        )
        .expect("team");
        assert!(add_team_member(&db, &team.id, &created.id).expect("add"));
        assert!(!add_team_member(&db, &team.id, &created.id).expect("idempotent"));
        assert!(matches!(
            add_team_member(&db, "missing", &created.id),
            Err(ApiError::NotFound(_))
        ));
        remove_team_member(&db, &team.id, &created.id).expect("remove");
        assert!(matches!(
            remove_team_member(&db, &team.id, &created.id),
            Err(ApiError::NotFound(_))
        ));
    }
}
