mod common;

use anyhow::{Context, Result};
use axum::http::StatusCode;
use common::{error_message, json_body, TestApp};
use lotes::domain::Role;
use lotes::routes::users::UserResponse;
use serde_json::json;

async fn list(app: &TestApp, token: &str) -> Result<Vec<UserResponse>> {
    let response = app.get("/api/users", Some(token)).await?;
    assert_eq!(response.status(), StatusCode::OK);
    json_body(response).await
}

#[tokio::test]
async fn admin_manages_users() -> Result<()> {
    let app = TestApp::new().await?;
    let admin = app.admin_token().await?;

    let response = app
        .post_json(
            "/api/users",
            &json!({
                "username": " maria ",
                "password": "1234",
                "role": "cfc",
                "cfcName": "CFC Central",
                "name": "Maria"
            }),
            Some(&admin),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::CREATED);
    let created: UserResponse = json_body(response).await?;
    assert_eq!(created.username, "maria");
    assert_eq!(created.role, "cfc");
    assert_eq!(created.cfc_name.as_deref(), Some("CFC Central"));
    assert!(!created.require_password_change);

    let duplicate = app
        .post_json(
            "/api/users",
            &json!({
                "username": "maria",
                "password": "1234",
                "role": "operador",
                "name": "Outra Maria"
            }),
            Some(&admin),
        )
        .await?;
    assert_eq!(duplicate.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_message(duplicate).await?, "username already exists");

    let updated = app
        .put_json(
            &format!("/api/users/{}", created.id),
            &json!({ "name": "Maria Souza", "role": "interno", "cfcName": null, "password": "" }),
            Some(&admin),
        )
        .await?;
    assert_eq!(updated.status(), StatusCode::OK);

    let users = list(&app, &admin).await?;
    assert_eq!(users.len(), 2);
    let maria = users
        .iter()
        .find(|user| user.username == "maria")
        .context("maria missing from list")?;
    assert_eq!(maria.name, "Maria Souza");
    assert_eq!(maria.role, "interno");
    assert!(maria.cfc_name.is_none());

    // The blank password in the update kept the original one.
    app.login_token("maria", "1234").await?;

    let deleted = app
        .delete(&format!("/api/users/{}", created.id), Some(&admin))
        .await?;
    assert_eq!(deleted.status(), StatusCode::OK);
    assert_eq!(list(&app, &admin).await?.len(), 1);

    let again = app
        .delete(&format!("/api/users/{}", created.id), Some(&admin))
        .await?;
    assert_eq!(again.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn updating_an_unknown_user_is_not_found() -> Result<()> {
    let app = TestApp::new().await?;
    let admin = app.admin_token().await?;

    let response = app
        .put_json("/api/users/9999", &json!({ "name": "Fantasma" }), Some(&admin))
        .await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn administrators_cannot_be_deleted() -> Result<()> {
    let app = TestApp::new().await?;
    let admin = app.admin_token().await?;

    let users = list(&app, &admin).await?;
    let bootstrap = users
        .iter()
        .find(|user| user.username == "vini")
        .context("bootstrap admin missing")?;

    let response = app
        .delete(&format!("/api/users/{}", bootstrap.id), Some(&admin))
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(list(&app, &admin).await?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn only_admins_reach_user_management() -> Result<()> {
    let app = TestApp::new().await?;

    for (username, role) in [
        ("operador1", Role::Operador),
        ("interno1", Role::Interno),
        ("cfc1", Role::Cfc),
    ] {
        let token = app.token_for(username, role, None).await?;

        let listing = app.get("/api/users", Some(&token)).await?;
        assert_eq!(listing.status(), StatusCode::FORBIDDEN, "{role}");
        assert_eq!(error_message(listing).await?, "access denied");

        let creating = app
            .post_json(
                "/api/users",
                &json!({ "username": "x-user", "password": "1234", "role": "cfc", "name": "X" }),
                Some(&token),
            )
            .await?;
        assert_eq!(creating.status(), StatusCode::FORBIDDEN, "{role}");
    }
    Ok(())
}
