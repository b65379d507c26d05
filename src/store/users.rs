use chrono::Utc;
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel::sqlite::SqliteConnection;
use thiserror::Error;

use crate::auth::password;
use crate::domain::Role;
use crate::models::{NewUser, User, UserSummary};
use crate::schema::users;

pub const BOOTSTRAP_USERNAME: &str = "vini";
pub const BOOTSTRAP_PASSWORD: &str = "328624";
pub const BOOTSTRAP_NAME: &str = "Administrador";

/// Initial password handed to CFC accounts created during ingestion.
pub const PROVISIONED_CFC_PASSWORD: &str = "12345";

pub const MIN_PASSWORD_LEN: usize = 4;

#[derive(Debug, Error)]
pub enum UserStoreError {
    #[error("username already exists")]
    DuplicateUsername,
    #[error("password hashing failed: {0}")]
    Hash(#[from] anyhow::Error),
    #[error("database error: {0}")]
    Database(DieselError),
}

impl From<DieselError> for UserStoreError {
    fn from(value: DieselError) -> Self {
        match value {
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                UserStoreError::DuplicateUsername
            }
            other => UserStoreError::Database(other),
        }
    }
}

pub type UserStoreResult<T> = Result<T, UserStoreError>;

#[derive(Debug, Clone)]
pub struct CreateUser<'a> {
    pub username: &'a str,
    pub password: &'a str,
    pub role: Role,
    pub cfc_name: Option<&'a str>,
    pub name: &'a str,
    pub require_password_change: bool,
}

/// Partial update; `None` leaves a column untouched. `cfc_name: Some(None)` clears it.
#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    pub username: Option<String>,
    pub password: Option<String>,
    pub role: Option<Role>,
    pub cfc_name: Option<Option<String>>,
    pub name: Option<String>,
    pub require_password_change: Option<bool>,
}

impl UserUpdate {
    pub fn is_empty(&self) -> bool {
        self.username.is_none()
            && self.password.is_none()
            && self.role.is_none()
            && self.cfc_name.is_none()
            && self.name.is_none()
            && self.require_password_change.is_none()
    }
}

#[derive(AsChangeset, Default)]
#[diesel(table_name = users)]
struct UserChangeset<'a> {
    username: Option<&'a str>,
    password_hash: Option<String>,
    role: Option<&'a str>,
    cfc_name: Option<Option<&'a str>>,
    name: Option<&'a str>,
    require_password_change: Option<bool>,
}

pub fn create_user(conn: &mut SqliteConnection, input: &CreateUser<'_>) -> UserStoreResult<User> {
    let new_user = NewUser {
        username: input.username,
        password_hash: password::hash_password(input.password)?,
        role: input.role.as_str(),
        cfc_name: input.cfc_name,
        name: input.name,
        created_at: Utc::now().naive_utc(),
        require_password_change: input.require_password_change,
    };

    let user = diesel::insert_into(users::table)
        .values(&new_user)
        .returning(User::as_returning())
        .get_result(conn)?;
    Ok(user)
}

pub fn get_user(conn: &mut SqliteConnection, id: i32) -> UserStoreResult<Option<User>> {
    Ok(users::table
        .find(id)
        .select(User::as_select())
        .first(conn)
        .optional()?)
}

pub fn get_user_by_username(
    conn: &mut SqliteConnection,
    username: &str,
) -> UserStoreResult<Option<User>> {
    Ok(users::table
        .filter(users::username.eq(username))
        .select(User::as_select())
        .first(conn)
        .optional()?)
}

pub fn list_users(conn: &mut SqliteConnection) -> UserStoreResult<Vec<UserSummary>> {
    Ok(users::table.select(UserSummary::as_select()).load(conn)?)
}

/// Returns the number of rows changed (0 when `id` does not exist).
pub fn update_user(
    conn: &mut SqliteConnection,
    id: i32,
    update: &UserUpdate,
) -> UserStoreResult<usize> {
    if update.is_empty() {
        let exists = users::table
            .find(id)
            .select(users::id)
            .first::<i32>(conn)
            .optional()?;
        return Ok(usize::from(exists.is_some()));
    }

    let password_hash = update
        .password
        .as_deref()
        .map(password::hash_password)
        .transpose()?;

    let changeset = UserChangeset {
        username: update.username.as_deref(),
        password_hash,
        role: update.role.map(Role::as_str),
        cfc_name: update.cfc_name.as_ref().map(|value| value.as_deref()),
        name: update.name.as_deref(),
        require_password_change: update.require_password_change,
    };

    Ok(diesel::update(users::table.find(id))
        .set(&changeset)
        .execute(conn)?)
}

/// Sets a new password chosen by the user and clears the forced-change flag.
pub fn change_own_password(
    conn: &mut SqliteConnection,
    id: i32,
    new_password: &str,
) -> UserStoreResult<usize> {
    update_user(
        conn,
        id,
        &UserUpdate {
            password: Some(new_password.to_string()),
            require_password_change: Some(false),
            ..UserUpdate::default()
        },
    )
}

/// Idempotent: deleting a missing id reports zero rows.
pub fn delete_user(conn: &mut SqliteConnection, id: i32) -> UserStoreResult<usize> {
    Ok(diesel::delete(users::table.find(id)).execute(conn)?)
}

/// Guarantees first-run access. Returns `true` when the account was created.
pub fn ensure_bootstrap_admin(conn: &mut SqliteConnection) -> UserStoreResult<bool> {
    if get_user_by_username(conn, BOOTSTRAP_USERNAME)?.is_some() {
        return Ok(false);
    }

    match create_user(
        conn,
        &CreateUser {
            username: BOOTSTRAP_USERNAME,
            password: BOOTSTRAP_PASSWORD,
            role: Role::Admin,
            cfc_name: None,
            name: BOOTSTRAP_NAME,
            require_password_change: false,
        },
    ) {
        Ok(_) => {
            tracing::info!(username = BOOTSTRAP_USERNAME, "created bootstrap administrator");
            Ok(true)
        }
        // Another process won the race.
        Err(UserStoreError::DuplicateUsername) => Ok(false),
        Err(err) => Err(err),
    }
}

/// Username assigned to an auto-provisioned CFC account: lower-cased, whitespace removed.
pub fn cfc_username(cfc_name: &str) -> String {
    cfc_name
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Creates a `cfc` account for every CFC name that has none yet.
pub fn provision_cfc_users(
    conn: &mut SqliteConnection,
    cfc_names: &[String],
) -> UserStoreResult<Vec<User>> {
    let mut created = Vec::new();

    for cfc_name in cfc_names {
        let existing: Option<i32> = users::table
            .filter(users::role.eq(Role::Cfc.as_str()))
            .filter(users::cfc_name.eq(cfc_name))
            .select(users::id)
            .first(conn)
            .optional()?;
        if existing.is_some() {
            continue;
        }

        let username = cfc_username(cfc_name);
        if username.is_empty() {
            continue;
        }

        match create_user(
            conn,
            &CreateUser {
                username: &username,
                password: PROVISIONED_CFC_PASSWORD,
                role: Role::Cfc,
                cfc_name: Some(cfc_name),
                name: cfc_name,
                require_password_change: true,
            },
        ) {
            Ok(user) => {
                tracing::info!(username = %user.username, cfc = %cfc_name, "provisioned cfc user");
                created.push(user);
            }
            Err(UserStoreError::DuplicateUsername) => {
                tracing::warn!(
                    username = %username,
                    cfc = %cfc_name,
                    "skipping cfc provisioning: username already taken"
                );
            }
            Err(err) => return Err(err),
        }
    }

    Ok(created)
}
