use rand::{distr::Alphanumeric, Rng};

/// Referral codes are the username plus a short random suffix, e.g.
/// `alice-x4k2qz`. Collisions are treated as negligible; the store still
/// carries a unique constraint as the final guard.
pub fn generate_referral_code(username: &str) -> String {
    let suffix: String = rand::rng()
        .sample_iter(Alphanumeric)
        .take(6)
        .map(|b| (b as char).to_ascii_lowercase())
        .collect();

    format!("{}-{}", username, suffix)
}

pub fn is_valid_username(username: &str) -> bool {
    !username.trim().is_empty()
}

pub fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };

    if local.is_empty() || email.chars().any(char::is_whitespace) {
        return false;
    }

    let labels: Vec<&str> = domain.split('.').collect();
    labels.len() >= 2 && labels.iter().all(|label| !label.is_empty())
}

/// Minimum 6 characters, at least one letter and one number.
pub fn is_valid_password(password: &str) -> bool {
    password.len() >= 6
        && password.chars().any(|c| c.is_ascii_alphabetic())
        && password.chars().any(|c| c.is_ascii_digit())
}

pub fn validate_registration(username: &str, email: &str, password: &str) -> Vec<String> {
    let mut errors = Vec::new();

    if !is_valid_username(username) {
        errors.push("Username is required".to_string());
    }
    if !is_valid_email(email) {
        errors.push("Please enter a valid email".to_string());
    }
    if !is_valid_password(password) {
        errors.push(
            "Password must be at least 6 characters long and contain a letter and a number"
                .to_string(),
        );
    }

    errors
}
