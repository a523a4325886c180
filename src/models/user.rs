use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ApiResult, Violations};

use super::text;

choice_enum!(Role {
    Admin => "admin",
    User => "user",
});

/// Stored account. `password_hash` is `None` for accounts created through
/// Google sign-in, which can never log in with a password.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    // ---
    pub id: i64,
    pub email: String,
    pub username: String,
    pub password_hash: Option<String>,
    #[sqlx(try_from = "String")]
    pub role: Role,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Public view of a user returned by the auth endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserProfile {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        UserProfile {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            role: user.role.as_str().to_string(),
            created_at: user.created_at,
        }
    }
}

/// Lower-case the domain part of an address, leaving the local part intact.
pub fn normalize_email(email: &str) -> String {
    // ---
    let email = email.trim();
    match email.rsplit_once('@') {
        Some((local, domain)) => format!("{}@{}", local, domain.to_lowercase()),
        None => email.to_string(),
    }
}

fn is_valid_email(email: &str) -> bool {
    // ---
    match email.rsplit_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && domain.contains('.')
                && !email.chars().any(char::is_whitespace)
                && !domain.contains('@')
        }
        None => false,
    }
}

fn email(v: &mut Violations, field: &str, value: Option<String>) -> Option<String> {
    // ---
    let value = text(v, field, value)?;
    if !is_valid_email(&value) {
        v.add(field, "Enter a valid email address.");
        return None;
    }
    Some(normalize_email(&value))
}

#[derive(Debug, Default, Deserialize)]
pub struct RegisterRequest {
    pub email: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug)]
pub struct NewUser {
    pub email: String,
    pub username: String,
    pub password: String,
}

impl RegisterRequest {
    pub fn validate(self) -> ApiResult<NewUser> {
        // ---
        let mut v = Violations::new();
        v.require("email", &self.email);
        v.require("username", &self.username);
        v.require("password", &self.password);

        let email = email(&mut v, "email", self.email);
        let username = text(&mut v, "username", self.username);
        let password = match self.password {
            Some(p) if p.is_empty() => {
                v.add("password", "This field may not be blank.");
                None
            }
            other => other,
        };
        let new_user = email
            .zip(username)
            .zip(password)
            .map(|((email, username), password)| NewUser {
                email,
                username,
                password,
            });
        v.conclude(new_user)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

impl LoginRequest {
    /// Returns the normalized email and the password as entered.
    pub fn validate(self) -> ApiResult<(String, String)> {
        // ---
        let mut v = Violations::new();
        v.require("email", &self.email);
        v.require("password", &self.password);
        let email = email(&mut v, "email", self.email);
        v.conclude(email.zip(self.password))
    }
}

/// `PUT /auth/update_profile` body. Empty strings count as "not supplied".
#[derive(Debug, Default, Deserialize)]
pub struct ProfileUpdate {
    pub username: Option<String>,
    pub email: Option<String>,
    #[serde(rename = "currentPassword", alias = "current_password")]
    pub current_password: Option<String>,
    #[serde(rename = "newPassword", alias = "new_password")]
    pub new_password: Option<String>,
    #[serde(rename = "confirmPassword", alias = "confirm_password")]
    pub confirm_password: Option<String>,
}

#[derive(Debug, PartialEq)]
pub struct PasswordChange {
    pub current: String,
    pub new: String,
    pub confirm: Option<String>,
}

impl PasswordChange {
    pub fn confirmed(&self) -> bool {
        self.confirm.as_deref() == Some(self.new.as_str())
    }
}

impl ProfileUpdate {
    /// Validated username/email changes plus the requested password change.
    pub fn validate(self) -> ApiResult<(Option<String>, Option<String>, Option<PasswordChange>)> {
        // ---
        let mut v = Violations::new();
        let username = text(&mut v, "username", non_empty(self.username));
        let email = email(&mut v, "email", non_empty(self.email));
        v.finish()?;

        let password = match (
            non_empty(self.current_password),
            non_empty(self.new_password),
        ) {
            (Some(current), Some(new)) => Some(PasswordChange {
                current,
                new,
                confirm: self.confirm_password,
            }),
            _ => None,
        };
        Ok((username, email, password))
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}
