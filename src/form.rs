//! Submitted form data and its validation.
//!
//! Each form is a plain struct. `validator` covers the per-field rules; the
//! `clean` methods add the cross-field and time-dependent rules and turn the
//! raw strings into typed input for the repositories.

use crate::orm::{categories, locations, posts, users};
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer};
use std::borrow::Cow;
use std::collections::BTreeMap;
use validator::{Validate, ValidateEmail, ValidationError, ValidationErrors};

pub const MAX_TITLE_LENGTH: usize = 256;
pub const MAX_NAME_LENGTH: usize = 150;
pub const MAX_SLUG_LENGTH: usize = 50;
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Value format of `<input type="datetime-local">`.
pub const DATETIME_INPUT_FORMAT: &str = "%Y-%m-%dT%H:%M";

static USERNAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[\w.@+-]+$").unwrap());
/// Usernames that collide with literal `/profile/...` routes.
const RESERVED_USERNAMES: &[&str] = &["edit"];

static SLUG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[-a-zA-Z0-9_]+$").unwrap());

/// Per-field error messages rendered inline next to inputs.
#[derive(Clone, Debug, Default)]
pub struct FormErrors(BTreeMap<String, Vec<String>>);

impl FormErrors {
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_owned())
            .or_default()
            .push(message.into());
    }

    pub fn get(&self, field: &str) -> &[String] {
        self.0.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn has(&self, field: &str) -> bool {
        !self.get(field).is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `Ok(value)` when nothing was recorded.
    pub fn or_ok<T>(self, value: T) -> Result<T, FormErrors> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }
}

impl From<ValidationErrors> for FormErrors {
    fn from(errors: ValidationErrors) -> Self {
        let mut out = FormErrors::default();
        for (field, list) in errors.field_errors() {
            for error in list.iter() {
                let message = match &error.message {
                    Some(message) => message.to_string(),
                    None => error.code.to_string(),
                };
                out.add(&field, message);
            }
        }
        out
    }
}

fn invalid(code: &'static str, message: &'static str) -> ValidationError {
    let mut error = ValidationError::new(code);
    error.message = Some(Cow::Borrowed(message));
    error
}

fn check_title(title: &str) -> Result<(), ValidationError> {
    let title = title.trim();
    if title.is_empty() {
        Err(invalid("required", "This field is required."))
    } else if title.chars().count() > MAX_TITLE_LENGTH {
        Err(invalid("max_length", "Ensure this value has at most 256 characters."))
    } else {
        Ok(())
    }
}

fn check_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(invalid("required", "This field is required."))
    } else {
        Ok(())
    }
}

fn check_username(username: &str) -> Result<(), ValidationError> {
    if username.is_empty() {
        Err(invalid("required", "This field is required."))
    } else if username.chars().count() > MAX_NAME_LENGTH {
        Err(invalid("max_length", "Ensure this value has at most 150 characters."))
    } else if !USERNAME_RE.is_match(username) {
        Err(invalid(
            "invalid",
            "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.",
        ))
    } else if RESERVED_USERNAMES
        .iter()
        .any(|reserved| reserved.eq_ignore_ascii_case(username))
    {
        Err(invalid("reserved", "This username is reserved."))
    } else {
        Ok(())
    }
}

fn check_slug(slug: &str) -> Result<(), ValidationError> {
    if slug.is_empty() {
        Err(invalid("required", "This field is required."))
    } else if slug.len() > MAX_SLUG_LENGTH || !SLUG_RE.is_match(slug) {
        Err(invalid(
            "invalid",
            "Enter a valid slug consisting of letters, numbers, underscores or hyphens.",
        ))
    } else {
        Ok(())
    }
}

/// HTML checkboxes are absent when unchecked and `on` when checked.
fn checkbox<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(matches!(value.as_deref(), Some("on" | "true" | "1")))
}

/// Password rules applied on registration, change and reset.
pub fn password_problems(password: &str, username: Option<&str>) -> Vec<&'static str> {
    let mut problems = Vec::new();
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        problems.push("This password is too short. It must contain at least 8 characters.");
    }
    if !password.is_empty() && password.chars().all(|c| c.is_ascii_digit()) {
        problems.push("This password is entirely numeric.");
    }
    if let Some(username) = username {
        if !username.is_empty() && password.eq_ignore_ascii_case(username) {
            problems.push("The password is too similar to the username.");
        }
    }
    problems
}

fn check_new_password(
    errors: &mut FormErrors,
    password1: &str,
    password2: &str,
    username: Option<&str>,
) {
    if password1 != password2 {
        errors.add("password2", "The two password fields didn't match.");
    }
    for problem in password_problems(password1, username) {
        errors.add("password2", problem);
    }
}

/// Accepts the `datetime-local` value plus a few looser spellings; naive values are UTC.
pub fn parse_datetime(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    for format in [
        DATETIME_INPUT_FORMAT,
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%d %H:%M:%S",
    ] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

pub fn format_datetime(value: &DateTime<Utc>) -> String {
    value.format(DATETIME_INPUT_FORMAT).to_string()
}

fn parse_choice(errors: &mut FormErrors, field: &str, value: &str) -> Option<i32> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    match value.parse::<i32>() {
        Ok(id) => Some(id),
        Err(_) => {
            errors.add(field, "Select a valid choice.");
            None
        }
    }
}

/// Post create/edit form. Arrives as multipart because of the image field.
#[derive(Clone, Debug, Default, Validate)]
pub struct PostForm {
    #[validate(custom(function = "check_title"))]
    pub title: String,
    #[validate(custom(function = "check_not_blank"))]
    pub text: String,
    pub pub_date: String,
    pub category: String,
    pub location: String,
    pub is_published: bool,
    pub clear_image: bool,
    pub csrf_token: String,
}

/// Typed result of a valid [`PostForm`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PostInput {
    pub title: String,
    pub text: String,
    pub pub_date: DateTime<Utc>,
    pub category_id: Option<i32>,
    pub location_id: Option<i32>,
    pub is_published: bool,
}

impl PostForm {
    /// Blank form for a new post, due now and published.
    pub fn new_at(now: DateTime<Utc>) -> Self {
        Self {
            pub_date: format_datetime(&now),
            is_published: true,
            ..Default::default()
        }
    }

    pub fn from_model(post: &posts::Model) -> Self {
        Self {
            title: post.title.to_owned(),
            text: post.text.to_owned(),
            pub_date: format_datetime(&post.pub_date),
            category: post.category_id.map(|id| id.to_string()).unwrap_or_default(),
            location: post.location_id.map(|id| id.to_string()).unwrap_or_default(),
            is_published: post.is_published,
            clear_image: false,
            csrf_token: String::new(),
        }
    }

    /// Assigns a multipart text field by name. Unknown names are ignored.
    pub fn set_field(&mut self, name: &str, value: String) {
        match name {
            "title" => self.title = value,
            "text" => self.text = value,
            "pub_date" => self.pub_date = value,
            "category" => self.category = value,
            "location" => self.location = value,
            "is_published" => self.is_published = matches!(value.as_str(), "on" | "true" | "1"),
            "image-clear" => self.clear_image = matches!(value.as_str(), "on" | "true" | "1"),
            "csrf_token" => self.csrf_token = value,
            _ => {}
        }
    }

    /// New posts may not be dated before today; edits keep whatever date they had.
    pub fn clean(&self, now: DateTime<Utc>, is_new: bool) -> Result<PostInput, FormErrors> {
        let mut errors = match self.validate() {
            Ok(()) => FormErrors::default(),
            Err(e) => FormErrors::from(e),
        };

        let pub_date = match parse_datetime(&self.pub_date) {
            Some(pub_date) => {
                if is_new && pub_date.date_naive() < now.date_naive() {
                    errors.add("pub_date", "A post cannot be published in the past.");
                }
                Some(pub_date)
            }
            None if self.pub_date.trim().is_empty() => {
                errors.add("pub_date", "This field is required.");
                None
            }
            None => {
                errors.add("pub_date", "Enter a valid date/time.");
                None
            }
        };
        let category_id = parse_choice(&mut errors, "category", &self.category);
        let location_id = parse_choice(&mut errors, "location", &self.location);

        match pub_date {
            Some(pub_date) if errors.is_empty() => Ok(PostInput {
                title: self.title.trim().to_owned(),
                text: self.text.trim().to_owned(),
                pub_date,
                category_id,
                location_id,
                is_published: self.is_published,
            }),
            _ => Err(errors),
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, Validate)]
pub struct CommentForm {
    #[serde(default)]
    #[validate(custom(function = "check_not_blank"))]
    pub text: String,
    #[serde(default)]
    pub csrf_token: String,
}

impl CommentForm {
    pub fn clean(&self) -> Result<String, FormErrors> {
        self.validate()?;
        Ok(self.text.trim().to_owned())
    }
}

#[derive(Clone, Debug, Default, Deserialize, Validate)]
pub struct RegistrationForm {
    #[validate(custom(function = "check_username"))]
    pub username: String,
    #[serde(default)]
    #[validate(length(max = 150, message = "Ensure this value has at most 150 characters."))]
    pub first_name: String,
    #[serde(default)]
    #[validate(length(max = 150, message = "Ensure this value has at most 150 characters."))]
    pub last_name: String,
    #[validate(email(message = "Enter a valid email address."))]
    pub email: String,
    pub password1: String,
    pub password2: String,
    #[serde(default)]
    pub csrf_token: String,
}

impl RegistrationForm {
    /// Checks everything except username uniqueness, which needs the database.
    pub fn clean(&self) -> Result<(), FormErrors> {
        let mut errors = match self.validate() {
            Ok(()) => FormErrors::default(),
            Err(e) => FormErrors::from(e),
        };
        if self.email.trim().is_empty() && !errors.has("email") {
            errors.add("email", "This field is required.");
        }
        check_new_password(
            &mut errors,
            &self.password1,
            &self.password2,
            Some(&self.username),
        );
        errors.or_ok(())
    }
}

#[derive(Clone, Debug, Default, Deserialize, Validate)]
pub struct ProfileForm {
    #[validate(custom(function = "check_username"))]
    pub username: String,
    #[serde(default)]
    #[validate(length(max = 150, message = "Ensure this value has at most 150 characters."))]
    pub first_name: String,
    #[serde(default)]
    #[validate(length(max = 150, message = "Ensure this value has at most 150 characters."))]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub csrf_token: String,
}

impl ProfileForm {
    pub fn from_model(user: &users::Model) -> Self {
        Self {
            username: user.username.to_owned(),
            first_name: user.first_name.to_owned(),
            last_name: user.last_name.to_owned(),
            email: user.email.to_owned(),
            csrf_token: String::new(),
        }
    }

    pub fn clean(&self) -> Result<(), FormErrors> {
        let mut errors = match self.validate() {
            Ok(()) => FormErrors::default(),
            Err(e) => FormErrors::from(e),
        };
        let email = self.email.trim();
        if !email.is_empty() && !email.validate_email() {
            errors.add("email", "Enter a valid email address.");
        }
        errors.or_ok(())
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub csrf_token: String,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct PasswordChangeForm {
    pub old_password: String,
    pub new_password1: String,
    pub new_password2: String,
    #[serde(default)]
    pub csrf_token: String,
}

impl PasswordChangeForm {
    pub fn clean(&self, username: &str) -> Result<(), FormErrors> {
        let mut errors = FormErrors::default();
        check_new_password(
            &mut errors,
            &self.new_password1,
            &self.new_password2,
            Some(username),
        );
        errors.or_ok(())
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct PasswordResetForm {
    pub email: String,
    #[serde(default)]
    pub csrf_token: String,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct SetPasswordForm {
    pub new_password1: String,
    pub new_password2: String,
    #[serde(default)]
    pub csrf_token: String,
}

impl SetPasswordForm {
    pub fn clean(&self, username: &str) -> Result<(), FormErrors> {
        let mut errors = FormErrors::default();
        check_new_password(
            &mut errors,
            &self.new_password1,
            &self.new_password2,
            Some(username),
        );
        errors.or_ok(())
    }
}

#[derive(Clone, Debug, Default, Deserialize, Validate)]
pub struct CategoryForm {
    #[validate(custom(function = "check_title"))]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[validate(custom(function = "check_slug"))]
    pub slug: String,
    #[serde(default, deserialize_with = "checkbox")]
    pub is_published: bool,
    #[serde(default)]
    pub csrf_token: String,
}

impl CategoryForm {
    pub fn from_model(category: &categories::Model) -> Self {
        Self {
            title: category.title.to_owned(),
            description: category.description.to_owned(),
            slug: category.slug.to_owned(),
            is_published: category.is_published,
            csrf_token: String::new(),
        }
    }

    pub fn clean(&self) -> Result<(), FormErrors> {
        self.validate()?;
        Ok(())
    }
}

#[derive(Clone, Debug, Default, Deserialize, Validate)]
pub struct LocationForm {
    #[validate(custom(function = "check_title"))]
    pub name: String,
    #[serde(default, deserialize_with = "checkbox")]
    pub is_published: bool,
    #[serde(default)]
    pub csrf_token: String,
}

impl LocationForm {
    pub fn from_model(location: &locations::Model) -> Self {
        Self {
            name: location.name.to_owned(),
            is_published: location.is_published,
            csrf_token: String::new(),
        }
    }

    pub fn clean(&self) -> Result<(), FormErrors> {
        self.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 12, 12, 18, 30, 0).unwrap()
    }

    fn post_form(pub_date: DateTime<Utc>) -> PostForm {
        PostForm {
            title: "  Sunset at the pier ".to_owned(),
            text: "It was orange.".to_owned(),
            pub_date: format_datetime(&pub_date),
            category: "2".to_owned(),
            location: String::new(),
            is_published: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_new_post_dated_yesterday_is_rejected() {
        let errors = post_form(now() - Duration::days(1))
            .clean(now(), true)
            .unwrap_err();

        assert!(errors.has("pub_date"));
        assert!(!errors.has("title"));
    }

    #[test]
    fn test_new_post_earlier_today_is_accepted() {
        let input = post_form(now() - Duration::hours(3)).clean(now(), true).unwrap();

        assert_eq!(input.title, "Sunset at the pier");
        assert_eq!(input.category_id, Some(2));
        assert_eq!(input.location_id, None);
        assert!(input.is_published);
    }

    #[test]
    fn test_edit_keeps_past_dates() {
        assert!(post_form(now() - Duration::days(30)).clean(now(), false).is_ok());
    }

    #[test]
    fn test_post_field_errors() {
        let form = PostForm {
            title: "   ".to_owned(),
            text: String::new(),
            pub_date: "tomorrow-ish".to_owned(),
            category: "travel".to_owned(),
            ..Default::default()
        };
        let errors = form.clean(now(), true).unwrap_err();

        assert!(errors.has("title"));
        assert!(errors.has("text"));
        assert!(errors.has("pub_date"));
        assert!(errors.has("category"));
        assert!(!errors.has("location"));
    }

    #[test]
    fn test_title_length_counts_characters() {
        let mut form = post_form(now());
        form.title = "ж".repeat(MAX_TITLE_LENGTH);
        assert!(form.clean(now(), true).is_ok());

        form.title.push('ж');
        assert!(form.clean(now(), true).unwrap_err().has("title"));
    }

    #[test]
    fn test_multipart_fields() {
        let mut form = PostForm::default();
        form.set_field("is_published", "on".to_owned());
        form.set_field("image-clear", "on".to_owned());
        form.set_field("title", "Hello".to_owned());
        form.set_field("unknown", "ignored".to_owned());

        assert!(form.is_published);
        assert!(form.clear_image);
        assert_eq!(form.title, "Hello");
    }

    #[test]
    fn test_parse_datetime() {
        let expected = Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 0).unwrap();

        assert_eq!(parse_datetime("2025-01-02T03:04"), Some(expected));
        assert_eq!(parse_datetime("2025-01-02 03:04:00"), Some(expected));
        assert_eq!(
            parse_datetime("2025-01-02"),
            Some(Utc.with_ymd_and_hms(2025, 1, 2, 0, 0, 0).unwrap())
        );
        assert_eq!(parse_datetime("02.01.2025"), None);
    }

    #[test]
    fn test_registration_rules() {
        let mut form = RegistrationForm {
            username: "leo".to_owned(),
            email: "leo@example.com".to_owned(),
            password1: "correct horse".to_owned(),
            password2: "correct horse".to_owned(),
            ..Default::default()
        };
        assert!(form.clean().is_ok());

        form.password2 = "correct horse!".to_owned();
        assert!(form.clean().unwrap_err().has("password2"));

        form.password1 = "12345678".to_owned();
        form.password2 = "12345678".to_owned();
        assert!(form.clean().unwrap_err().has("password2"));

        form.password1 = "correct horse".to_owned();
        form.password2 = "correct horse".to_owned();
        form.username = "leo tolstoy".to_owned();
        form.email = "not-an-email".to_owned();
        let errors = form.clean().unwrap_err();
        assert!(errors.has("username"));
        assert!(errors.has("email"));
    }

    #[test]
    fn test_blank_post_form_is_published() {
        let form = PostForm::new_at(now());

        assert!(form.is_published);
        assert_eq!(form.pub_date, "2024-12-12T18:30");
        // Multipart bodies start from an unchecked box.
        assert!(!PostForm::default().is_published);
    }

    #[test]
    fn test_route_names_are_not_usernames() {
        let mut form = RegistrationForm {
            username: "edit".to_owned(),
            email: "edit@example.com".to_owned(),
            password1: "correct horse".to_owned(),
            password2: "correct horse".to_owned(),
            ..Default::default()
        };
        assert!(form.clean().unwrap_err().has("username"));

        form.username = "Edit".to_owned();
        assert!(form.clean().unwrap_err().has("username"));

        form.username = "editor".to_owned();
        assert!(form.clean().is_ok());
    }

    #[test]
    fn test_password_problems() {
        assert!(password_problems("s3cret-enough", Some("leo")).is_empty());
        assert_eq!(password_problems("short", None).len(), 1);
        assert_eq!(password_problems("LeonardoX", Some("leonardox")).len(), 1);
    }

    #[test]
    fn test_slug_rules() {
        let mut form = CategoryForm {
            title: "Travel".to_owned(),
            slug: "travel_2024".to_owned(),
            ..Default::default()
        };
        assert!(form.clean().is_ok());

        form.slug = "travel 2024".to_owned();
        assert!(form.clean().unwrap_err().has("slug"));
    }
}
