//! User model and auth plumbing tests — CRUD, password hashing, the static
//! permission table, and input validation.

mod common;

use common::*;
use thesisflow::auth::{password, roles, validate};
use thesisflow::models::user::{self, NewUser};

#[test]
fn password_hash_and_verify_round_trip() {
    let hash = password::hash_password("correct horse battery").expect("hash");
    assert!(hash.starts_with("$argon2"));
    assert!(password::verify_password("correct horse battery", &hash).unwrap());
    assert!(!password::verify_password("wrong", &hash).unwrap());
}

#[test]
fn create_find_update_delete_round_trip() {
    let (_dir, conn) = setup_test_db();
    let hash = password::hash_password("password123").unwrap();
    let id = user::create(&conn, &NewUser {
        username: "alice".to_string(),
        password: hash,
        email: "alice@example.com".to_string(),
        display_name: "Alice".to_string(),
        role: roles::STUDENT.to_string(),
    })
    .unwrap();

    let found = user::find_by_username(&conn, "alice").unwrap().unwrap();
    assert_eq!(found.id, id);
    assert_eq!(found.role, roles::STUDENT);
    assert!(password::verify_password("password123", &found.password).unwrap());

    user::update(&conn, id, "alice", None, "alice@uni.edu", "Alice A.", roles::ADVISER).unwrap();
    let updated = user::find_by_id(&conn, id).unwrap().unwrap();
    assert_eq!(updated.email, "alice@uni.edu");
    assert_eq!(updated.role, roles::ADVISER);
    // Password untouched when none provided.
    assert!(password::verify_password("password123", &updated.password).unwrap());

    let new_hash = password::hash_password("another-pass").unwrap();
    user::update_password(&conn, id, &new_hash).unwrap();
    let hash = user::find_password_hash_by_id(&conn, id).unwrap().unwrap();
    assert!(password::verify_password("another-pass", &hash).unwrap());

    user::delete(&conn, id).unwrap();
    assert!(user::find_by_id(&conn, id).unwrap().is_none());
}

#[test]
fn duplicate_usernames_are_rejected_by_the_schema() {
    let (_dir, conn) = setup_test_db();
    create_user(&conn, "alice", roles::STUDENT);
    let result = user::create(&conn, &NewUser {
        username: "alice".to_string(),
        password: "x".to_string(),
        email: "dup@example.com".to_string(),
        display_name: "Dup".to_string(),
        role: roles::STUDENT.to_string(),
    });
    assert!(result.is_err());
}

#[test]
fn pagination_and_search() {
    let (_dir, conn) = setup_test_db();
    for i in 0..5 {
        create_user(&conn, &format!("student_{i}"), roles::STUDENT);
    }
    create_user(&conn, "adviser_a", roles::ADVISER);

    let page1 = user::find_paginated(&conn, 1, 2, None).unwrap();
    assert_eq!(page1.users.len(), 2);
    assert_eq!(page1.total_count, 6);
    assert_eq!(page1.total_pages, 3);

    let page3 = user::find_paginated(&conn, 3, 2, None).unwrap();
    assert_eq!(page3.users.len(), 2);

    let found = user::find_paginated(&conn, 1, 10, Some("student")).unwrap();
    assert_eq!(found.total_count, 5);

    let ids = user::find_ids_by_role(&conn, roles::ADVISER).unwrap();
    assert_eq!(ids.len(), 1);
}

#[test]
fn role_table_grants_expected_permissions() {
    let student = roles::permission_codes(roles::STUDENT);
    assert!(student.contains(&"topics.edit"));
    assert!(!student.contains(&"topics.review.moderator"));

    let moderator = roles::permission_codes(roles::MODERATOR);
    assert!(moderator.contains(&"topics.review.moderator"));
    assert!(!moderator.contains(&"topics.review.head"));

    let head = roles::permission_codes(roles::HEAD);
    assert!(head.contains(&"topics.review.head"));

    let admin = roles::permission_codes(roles::ADMIN);
    assert!(admin.contains(&"users.manage"));
    assert!(admin.contains(&"audit.view"));

    assert!(roles::permission_codes("nonsense").is_empty());
    assert!(roles::is_valid_role(roles::STUDENT));
    assert!(!roles::is_valid_role("nonsense"));
}

#[test]
fn validators_reject_bad_input() {
    assert!(validate::validate_username("ok_name").is_none());
    assert!(validate::validate_username("").is_some());
    assert!(validate::validate_username("x").is_some());
    assert!(validate::validate_username("has spaces").is_some());

    assert!(validate::validate_email("a@b.com").is_none());
    assert!(validate::validate_email("not-an-email").is_some());

    assert!(validate::validate_password("longenough").is_none());
    assert!(validate::validate_password("short").is_some());

    assert!(validate::validate_required("value", "Field", 10).is_none());
    assert!(validate::validate_required("  ", "Field", 10).is_some());
    assert!(validate::validate_required("toolongvalue", "Field", 5).is_some());
    assert!(validate::validate_optional("", "Field", 5).is_none());
}
