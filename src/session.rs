//! セッション（モック認証）
//!
//! 入力形式だけを検証して常に成功する。実際の認証基盤への差し替えを想定したスタブ。

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub name: String,
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(name: impl Into<String>, email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            password: password.into(),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Please enter your name.")]
    NameRequired,

    #[error("Please enter a valid email address.")]
    InvalidEmail,

    #[error("Password must be at least 6 characters long.")]
    PasswordTooShort,
}

impl AuthError {
    /// 通知タイトル
    pub fn title(&self) -> &'static str {
        match self {
            AuthError::NameRequired => "Name required",
            AuthError::InvalidEmail => "Invalid email",
            AuthError::PasswordTooShort => "Password too short",
        }
    }
}

/// 入力チェック（名前 → メール → パスワードの順）
pub fn validate_credentials(credentials: &Credentials) -> Result<(), AuthError> {
    if credentials.name.trim().is_empty() {
        return Err(AuthError::NameRequired);
    }

    let email = credentials.email.trim();
    if email.is_empty() || !email.contains('@') {
        return Err(AuthError::InvalidEmail);
    }

    if credentials.password.trim().is_empty() || credentials.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AuthError::PasswordTooShort);
    }

    Ok(())
}

/// ログイン中のユーザーを保持するコンテキスト
///
/// アプリ起動時に作り、ログアウトで破棄する。永続化はしない。
#[derive(Debug, Default)]
pub struct Session {
    user: Option<User>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    pub fn login(&mut self, credentials: &Credentials) -> Result<&User, AuthError> {
        validate_credentials(credentials)?;

        let user = User {
            id: uuid::Uuid::new_v4().to_string(),
            name: credentials.name.trim().to_string(),
            email: credentials.email.trim().to_string(),
        };
        Ok(&*self.user.insert(user))
    }

    /// ログアウト（ログイン中だったユーザーを返す）
    pub fn logout(&mut self) -> Option<User> {
        self.user.take()
    }
}
