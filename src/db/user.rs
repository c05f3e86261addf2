//! User model.

/// A registered user, identified by their Telegram account.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    /// Unique user ID.
    pub id: i64,
    /// Telegram user ID.
    pub telegram_id: i64,
    /// Telegram username (without @).
    pub username: Option<String>,
    /// First name.
    pub first_name: Option<String>,
    /// Last name.
    pub last_name: Option<String>,
    /// Avatar URL.
    pub photo_url: Option<String>,
    /// Bytes occupied by the user's files.
    pub used_space: i64,
    /// Storage quota in bytes.
    pub quota: i64,
    /// Account creation timestamp.
    pub created_at: String,
    /// Last login timestamp.
    pub last_login: Option<String>,
    /// Whether the account is active.
    pub is_active: bool,
}

impl User {
    /// Name to greet the user with.
    pub fn display_name(&self) -> String {
        match (&self.first_name, &self.last_name) {
            (Some(first), Some(last)) if !last.is_empty() => format!("{first} {last}"),
            (Some(first), _) if !first.is_empty() => first.clone(),
            _ => self
                .username
                .clone()
                .unwrap_or_else(|| self.telegram_id.to_string()),
        }
    }

    /// Bytes still available under the quota.
    pub fn free_space(&self) -> i64 {
        (self.quota - self.used_space).max(0)
    }

    /// Percentage of the quota in use, rounded to two decimals.
    ///
    /// A zero quota reports 0%.
    pub fn usage_percent(&self) -> f64 {
        if self.quota <= 0 {
            return 0.0;
        }
        let percent = self.used_space as f64 / self.quota as f64 * 100.0;
        (percent * 100.0).round() / 100.0
    }
}

/// Profile fields supplied by Telegram, either from the login widget or a
/// bot update.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TelegramProfile {
    /// Telegram user ID.
    pub telegram_id: i64,
    /// Username.
    pub username: Option<String>,
    /// First name.
    pub first_name: Option<String>,
    /// Last name.
    pub last_name: Option<String>,
    /// Avatar URL.
    pub photo_url: Option<String>,
}

impl TelegramProfile {
    /// Create a profile with only the Telegram ID set.
    pub fn new(telegram_id: i64) -> Self {
        Self {
            telegram_id,
            ..Default::default()
        }
    }

    /// Set the username.
    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Set the first name.
    pub fn with_first_name(mut self, first_name: impl Into<String>) -> Self {
        self.first_name = Some(first_name.into());
        self
    }

    /// Set the last name.
    pub fn with_last_name(mut self, last_name: impl Into<String>) -> Self {
        self.last_name = Some(last_name.into());
        self
    }

    /// Set the avatar URL.
    pub fn with_photo_url(mut self, photo_url: impl Into<String>) -> Self {
        self.photo_url = Some(photo_url.into());
        self
    }
}

/// Data for creating a new user.
#[derive(Debug, Clone)]
pub struct NewUser {
    /// Telegram profile.
    pub profile: TelegramProfile,
    /// Initial quota in bytes.
    pub quota: i64,
}

impl NewUser {
    /// Create a new user from a Telegram profile.
    pub fn new(profile: TelegramProfile, quota: i64) -> Self {
        Self { profile, quota }
    }
}

/// Data for updating an existing user.
#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    /// New username.
    pub username: Option<Option<String>>,
    /// New first name.
    pub first_name: Option<Option<String>>,
    /// New last name.
    pub last_name: Option<Option<String>>,
    /// New avatar URL.
    pub photo_url: Option<Option<String>>,
    /// New quota in bytes.
    pub quota: Option<i64>,
    /// New active status.
    pub is_active: Option<bool>,
}

impl UserUpdate {
    /// Create an empty update.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set new username.
    pub fn username(mut self, username: Option<String>) -> Self {
        self.username = Some(username);
        self
    }

    /// Set new first name.
    pub fn first_name(mut self, first_name: Option<String>) -> Self {
        self.first_name = Some(first_name);
        self
    }

    /// Set new last name.
    pub fn last_name(mut self, last_name: Option<String>) -> Self {
        self.last_name = Some(last_name);
        self
    }

    /// Set new avatar URL.
    pub fn photo_url(mut self, photo_url: Option<String>) -> Self {
        self.photo_url = Some(photo_url);
        self
    }

    /// Set new quota.
    pub fn quota(mut self, quota: i64) -> Self {
        self.quota = Some(quota);
        self
    }

    /// Set active status.
    pub fn is_active(mut self, is_active: bool) -> Self {
        self.is_active = Some(is_active);
        self
    }

    /// Check if any fields are set.
    pub fn is_empty(&self) -> bool {
        self.username.is_none()
            && self.first_name.is_none()
            && self.last_name.is_none()
            && self.photo_url.is_none()
            && self.quota.is_none()
            && self.is_active.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user(used_space: i64, quota: i64) -> User {
        User {
            id: 1,
            telegram_id: 1001,
            username: Some("alice".to_string()),
            first_name: Some("Alice".to_string()),
            last_name: None,
            photo_url: None,
            used_space,
            quota,
            created_at: "2024-01-01 00:00:00".to_string(),
            last_login: None,
            is_active: true,
        }
    }

    #[test]
    fn test_usage_percent() {
        assert_eq!(sample_user(0, 100).usage_percent(), 0.0);
        assert_eq!(sample_user(50, 200).usage_percent(), 25.0);
        assert_eq!(sample_user(1, 3).usage_percent(), 33.33);
    }

    #[test]
    fn test_usage_percent_zero_quota() {
        assert_eq!(sample_user(10, 0).usage_percent(), 0.0);
    }

    #[test]
    fn test_free_space_never_negative() {
        assert_eq!(sample_user(30, 100).free_space(), 70);
        assert_eq!(sample_user(150, 100).free_space(), 0);
    }

    #[test]
    fn test_display_name() {
        let mut user = sample_user(0, 1);
        assert_eq!(user.display_name(), "Alice");

        user.last_name = Some("Smith".to_string());
        assert_eq!(user.display_name(), "Alice Smith");

        user.first_name = None;
        assert_eq!(user.display_name(), "alice");

        user.username = None;
        assert_eq!(user.display_name(), "1001");
    }

    #[test]
    fn test_telegram_profile_builder() {
        let profile = TelegramProfile::new(42)
            .with_username("bob")
            .with_first_name("Bob")
            .with_last_name("Builder")
            .with_photo_url("https://t.me/i/userpic/bob.jpg");

        assert_eq!(profile.telegram_id, 42);
        assert_eq!(profile.username.as_deref(), Some("bob"));
        assert_eq!(profile.first_name.as_deref(), Some("Bob"));
        assert_eq!(profile.last_name.as_deref(), Some("Builder"));
        assert!(profile.photo_url.is_some());
    }

    #[test]
    fn test_user_update_builder() {
        assert!(UserUpdate::new().is_empty());

        let update = UserUpdate::new()
            .username(Some("new".to_string()))
            .photo_url(None)
            .quota(10)
            .is_active(false);

        assert!(!update.is_empty());
        assert_eq!(update.username, Some(Some("new".to_string())));
        assert_eq!(update.photo_url, Some(None));
        assert_eq!(update.quota, Some(10));
        assert_eq!(update.is_active, Some(false));
    }
}
