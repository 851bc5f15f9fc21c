// Posts service: targeted announcements.

use serde::Deserialize;

use crate::db::targeting::{Targets, POST_TARGETS};
use crate::db::{DbPost, PulseDb};
use crate::error::ApiError;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePostRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub target: Targets,
}

/// Reject empty or dangling targeting before anything is written.
pub(crate) fn validate_targets(db: &PulseDb, targets: &Targets) -> Result<(), ApiError> {
    if targets.is_empty() {
        return Err(ApiError::Validation(
            "At least one target (or everyone) is required".into(),
        ));
    }
    let unknown = db.unknown_target_ids(targets)?;
    if !unknown.is_empty() {
        return Err(ApiError::Validation(format!(
            "Unknown target ids: {}",
            unknown.join(", ")
        )));
    }
    Ok(())
}

/// Create a post and its targeting rows in one transaction.
pub fn create_post(
    db: &PulseDb,
    author_id: &str,
    req: &CreatePostRequest,
) -> Result<DbPost, ApiError> {
    let title = req.title.trim();
    let content = req.content.trim();
    if title.is_empty() || content.is_empty() {
        return Err(ApiError::Validation("Title and content are required".into()));
    }
    validate_targets(db, &req.target)?;

    let post = db.with_transaction(|tx| -> Result<DbPost, ApiError> {
        let post = tx.insert_post(author_id, title, content, req.target.everyone)?;
        let written = tx.insert_targets(&POST_TARGETS, &post.id, &req.target)?;
        log::debug!("Post {} targeted with {} rows", post.id, written);
        Ok(post)
    })?;
    log::info!("Post {} created by {}", post.id, author_id);
    Ok(post)
}

/// Posts targeted at the employee that are currently visible, newest first.
pub fn list_visible_posts(db: &PulseDb, employee_id: &str) -> Result<Vec<DbPost>, ApiError> {
    let audience = db
        .audience_for(employee_id)?
        .ok_or_else(|| ApiError::not_found("Employee"))?;
    let ids: Vec<String> = db
        .visible_entity_ids(&POST_TARGETS, &audience)?
        .into_iter()
        .collect();
    Ok(db.get_visible_posts_by_ids(&ids)?)
}

pub fn set_post_visibility(
    db: &PulseDb,
    post_id: &str,
    author_id: &str,
    visibility: bool,
) -> Result<DbPost, ApiError> {
    if !db.set_post_visibility(post_id, author_id, visibility)? {
        return Err(ApiError::not_found("Post"));
    }
    db.get_post(post_id)?
        .ok_or_else(|| ApiError::not_found("Post"))
}

pub fn delete_post(db: &PulseDb, post_id: &str, author_id: &str) -> Result<(), ApiError> {
    db.with_transaction(|tx| -> Result<(), ApiError> {
        if tx.get_post(post_id)?.map(|p| p.author_id) != Some(author_id.to_string()) {
            return Err(ApiError::not_found("Post"));
        }
        tx.delete_targets(&POST_TARGETS, post_id)?;
        tx.delete_post(post_id, author_id)?;
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_utils::*;

    fn targeted(target: Targets) -> CreatePostRequest {
        CreatePostRequest {
            title: "Hello".into(),
            content: "World".into(),
            target,
        }
    }

    #[test]
    fn test_non_matching_targets_invisible_and_matches_once() {
        let db = test_db();
        let d = seed_department(&db, "Eng");
        let d_other = seed_department(&db, "Sales");
        let t1 = seed_team(&db, "T1");
        let t2 = seed_team(&db, "T2");
        let t3 = seed_team(&db, "T3");
        let author = seed_employee(&db, "Author", None, None, None);
        let emp = seed_employee(&db, "Ana", Some(&d), Some("Lisbon"), None);
        add_to_team(&db, &t1, &emp);
        add_to_team(&db, &t2, &emp);

        create_post(
            &db,
            &author,
            &targeted(Targets {
                department_ids: vec![d_other],
                team_ids: vec![t3],
                locations: vec!["Porto".into()],
                ..Default::default()
            }),
        )
        .expect("elsewhere post");
        let matching = create_post(
            &db,
            &author,
            &targeted(Targets {
                department_ids: vec![d],
                team_ids: vec![t1, t2],
                locations: vec!["Lisbon".into()],
                ..Default::default()
            }),
        )
        .expect("matching post");

        let posts = list_visible_posts(&db, &emp).expect("list");
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].id, matching.id);
    }

    #[test]
    fn test_everyone_reaches_employee() {
        let db = test_db();
        let d = seed_department(&db, "Eng");
        let author = seed_employee(&db, "Author", None, None, None);
        let emp = seed_employee(&db, "Ana", Some(&d), None, None);
        create_post(
            &db,
            &author,
            &targeted(Targets {
                everyone: true,
                ..Default::default()
            }),
        )
        .expect("post");
        assert_eq!(list_visible_posts(&db, &emp).expect("list").len(), 1);
    }

    #[test]
    fn test_validation_writes_nothing() {
        let db = test_db();
        let author = seed_employee(&db, "Author", None, None, None);
        let err = create_post(&db, &author, &targeted(Targets::default())).expect_err("no target");
        assert!(matches!(err, ApiError::Validation(_)));
        let err = create_post(
            &db,
            &author,
            &targeted(Targets {
                team_ids: vec!["missing".into()],
                ..Default::default()
            }),
        )
        .expect_err("unknown team");
        assert!(matches!(err, ApiError::Validation(_)));
        assert!(db.get_posts_by_author(&author).expect("mine").is_empty());
    }

    #[test]
    fn test_visibility_on_unowned_post_is_not_found() {
        let db = test_db();
        let d = seed_department(&db, "Eng");
        let author = seed_employee(&db, "Author", None, None, None);
        let other = seed_employee(&db, "Other", Some(&d), None, None);
        let post = create_post(
            &db,
            &author,
            &targeted(Targets {
                department_ids: vec![d],
                ..Default::default()
            }),
        )
        .expect("post");
        let err = set_post_visibility(&db, &post.id, &other, false).expect_err("not owner");
        assert!(matches!(err, ApiError::NotFound(_)));

        set_post_visibility(&db, &post.id, &author, false).expect("owner hides");
        assert!(list_visible_posts(&db, &other).expect("list").is_empty());

        assert!(matches!(
            delete_post(&db, &post.id, &other),
            Err(ApiError::NotFound(_))
        ));
        delete_post(&db, &post.id, &author).expect("owner deletes");
        assert!(db.get_post(&post.id).expect("get").is_none());
    }
}
