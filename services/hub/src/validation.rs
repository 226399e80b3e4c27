//! Input validation utilities
//!
//! Every rule runs before any store access. Patch fields follow one rule
//! everywhere: an omitted field is left unchanged, an explicitly supplied
//! empty value is rejected here.

use regex::Regex;
use std::sync::OnceLock;

/// Normalize an email for storage and lookup
pub fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

/// Validate email shape
pub fn validate_email(email: &str) -> Result<(), String> {
    if email.is_empty() {
        return Err("Email is required".to_string());
    }

    if email.len() > 254 {
        return Err("Email must be at most 254 characters long".to_string());
    }

    static EMAIL_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = EMAIL_REGEX.get_or_init(|| {
        Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
            .expect("Failed to compile email regex")
    });

    if !regex.is_match(email) {
        return Err("Invalid email format".to_string());
    }

    Ok(())
}

/// Validate password: 6-20 characters, at least one letter and one digit
pub fn validate_password(password: &str) -> Result<(), String> {
    if password.is_empty() {
        return Err("Password is required".to_string());
    }

    if password.len() < 6 {
        return Err("Password must be at least 6 characters long".to_string());
    }

    if password.len() > 20 {
        return Err("Password must be at most 20 characters long".to_string());
    }

    let mut has_letter = false;
    let mut has_digit = false;

    for c in password.chars() {
        if c.is_ascii_alphabetic() {
            has_letter = true;
        } else if c.is_ascii_digit() {
            has_digit = true;
        }
    }

    if !has_letter {
        return Err("Password must contain at least one letter".to_string());
    }

    if !has_digit {
        return Err("Password must contain at least one digit".to_string());
    }

    Ok(())
}

/// Validate display name: 2-20 characters, letters and spaces only
pub fn validate_user_name(user_name: &str) -> Result<(), String> {
    let length = user_name.chars().count();
    if length < 2 {
        return Err("Name must be at least 2 characters long".to_string());
    }

    if length > 20 {
        return Err("Name must be at most 20 characters long".to_string());
    }

    if !user_name.chars().all(|c| c.is_alphabetic() || c == ' ') {
        return Err("Name can only contain letters and spaces".to_string());
    }

    Ok(())
}

/// Validate phone number: dashed `XX(X)-XXX(X)-XXXX` or 10-11 plain digits
pub fn validate_phone_number(phone_number: &str) -> Result<(), String> {
    if phone_number.is_empty() {
        return Err("Phone number is required".to_string());
    }

    static PHONE_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = PHONE_REGEX.get_or_init(|| {
        Regex::new(r"^(\d{2,3}-\d{3,4}-\d{4}|\d{10,11})$")
            .expect("Failed to compile phone number regex")
    });

    if !regex.is_match(phone_number) {
        return Err("Invalid phone number format (e.g. 010-1234-5678)".to_string());
    }

    Ok(())
}

/// Validate MAC address: six colon-separated hex octets
pub fn validate_mac_address(mac_address: &str) -> Result<(), String> {
    static MAC_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = MAC_REGEX.get_or_init(|| {
        Regex::new(r"^[0-9A-Fa-f]{2}(:[0-9A-Fa-f]{2}){5}$")
            .expect("Failed to compile MAC address regex")
    });

    if !regex.is_match(mac_address) {
        return Err("Invalid MAC address format (e.g. AA:BB:CC:DD:EE:FF)".to_string());
    }

    Ok(())
}

/// Validate a device-group name
pub fn validate_group_name(group_name: &str) -> Result<(), String> {
    if group_name.trim().is_empty() {
        return Err("Group name is required".to_string());
    }

    if group_name.chars().count() > 50 {
        return Err("Group name must be at most 50 characters long".to_string());
    }

    Ok(())
}

/// Reject explicitly supplied empty values in patch fields
pub fn require_non_empty(field: &str, value: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{field} must not be empty when supplied"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_email_lowercases_and_trims() {
        assert_eq!(normalize_email(" Jamie@Example.COM "), "jamie@example.com");
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email("jamie@example.com").is_ok());
        assert!(validate_email("").is_err());
        assert!(validate_email("jamie@example").is_err());
        assert!(validate_email("not-an-email").is_err());
    }

    #[test]
    fn test_validate_password_requires_letter_and_digit() {
        assert!(validate_password("abc123").is_ok());
        assert!(validate_password("abcdef").is_err());
        assert!(validate_password("123456").is_err());
        assert!(validate_password("ab1").is_err());
        assert!(validate_password("a1234567890123456789x").is_err());
    }

    #[test]
    fn test_validate_user_name() {
        assert!(validate_user_name("Jamie Park").is_ok());
        assert!(validate_user_name("J").is_err());
        assert!(validate_user_name("Jamie99").is_err());
    }

    #[test]
    fn test_validate_phone_number() {
        assert!(validate_phone_number("010-1234-5678").is_ok());
        assert!(validate_phone_number("01012345678").is_ok());
        assert!(validate_phone_number("12-34").is_err());
        assert!(validate_phone_number("").is_err());
    }

    #[test]
    fn test_validate_mac_address() {
        assert!(validate_mac_address("AA:BB:CC:DD:EE:FF").is_ok());
        assert!(validate_mac_address("9c:95:6e:40:0f:75").is_ok());
        assert!(validate_mac_address("AA:BB:CC:DD:EE").is_err());
        assert!(validate_mac_address("AA-BB-CC-DD-EE-FF").is_err());
        assert!(validate_mac_address("").is_err());
    }

    #[test]
    fn test_validate_group_name() {
        assert!(validate_group_name("default_group").is_ok());
        assert!(validate_group_name("  ").is_err());
    }

    #[test]
    fn test_require_non_empty_rejects_explicit_empty() {
        assert!(require_non_empty("deviceName", "sensor").is_ok());
        assert!(require_non_empty("deviceName", "").is_err());
        assert!(require_non_empty("deviceName", "   ").is_err());
    }
}
