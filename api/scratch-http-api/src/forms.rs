use serde::Deserialize;
use validator::{Validate, ValidationErrors};

#[derive(Deserialize, Validate, Debug)]
pub struct LoginForm {
    #[validate(length(min = 1, message = "Username is required"))]
    pub username: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
    /// Checkbox; present when ticked.
    pub remember: Option<String>,
}

#[derive(Deserialize, Validate, Debug)]
pub struct TotpForm {
    #[validate(length(min = 1, message = "Token is required"))]
    pub token: String,
}

#[derive(Deserialize, Validate, Debug)]
pub struct RegisterForm {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(length(min = 1, max = 64, message = "Username is required"))]
    pub username: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
    #[validate(must_match(other = "password", message = "Passwords must match"))]
    pub confirm_password: String,
}

#[derive(Deserialize, Debug)]
pub struct SettingsForm {
    pub website: Option<String>,
    pub about: Option<String>,
}

#[derive(Deserialize, Validate, Debug)]
pub struct PasswordForm {
    #[validate(length(min = 1, message = "Current password is required"))]
    pub current_password: String,
    #[validate(length(min = 1, message = "New password is required"))]
    pub new_password: String,
    #[validate(must_match(other = "new_password", message = "Passwords must match"))]
    pub confirm_password: String,
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TwoFactorAction {
    Enable,
    Disable,
}

#[derive(Deserialize, Validate, Debug)]
pub struct TwoFactorForm {
    pub action: TwoFactorAction,
    #[validate(length(min = 1, message = "Token is required"))]
    pub token: String,
}

#[derive(Deserialize, Validate, Debug)]
pub struct ResetPasswordRequestForm {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
}

#[derive(Deserialize, Validate, Debug)]
pub struct ResetPasswordForm {
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
    #[validate(must_match(other = "password", message = "Passwords must match"))]
    pub confirm_password: String,
}

#[derive(Deserialize, Validate, Debug)]
pub struct CommentForm {
    #[validate(length(min = 1, message = "Comment must not be empty"))]
    pub comment: String,
}

#[derive(Deserialize, Debug, Default)]
pub struct PageQuery {
    pub page: Option<u64>,
}

#[derive(Deserialize, Debug, Default)]
pub struct NextQuery {
    pub next: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
pub struct SearchQuery {
    pub q: Option<String>,
    pub page: Option<u64>,
}

/// Messages of all failed validations, ordered by field name.
pub fn validation_messages(errors: &ValidationErrors) -> Vec<String> {
    let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
    fields.sort_by(|(a, _), (b, _)| a.cmp(b));
    fields
        .into_iter()
        .flat_map(|(field, errors)| {
            errors.iter().map(move |error| {
                error
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("Invalid {}", field))
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_form_validation() {
        let form = RegisterForm {
            email: "not an email".to_string(),
            username: "alice".to_string(),
            password: "correct horse".to_string(),
            confirm_password: "battery staple".to_string(),
        };
        let errors = form.validate().unwrap_err();
        assert_eq!(
            validation_messages(&errors),
            vec!["Passwords must match", "Invalid email address"]
        );
    }

    #[test]
    fn test_two_factor_form_parses_action() {
        let form: TwoFactorForm =
            serde_json::from_value(serde_json::json!({"action": "disable", "token": "123456"}))
                .unwrap();
        assert_eq!(form.action, TwoFactorAction::Disable);
        assert!(form.validate().is_ok());
    }
}
