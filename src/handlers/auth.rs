use teloxide::prelude::*;

use crate::db::models::UserProfile;
use crate::error::PharmacyError;
use crate::services::Pharmacy;
use crate::utils::parse_fields;
use crate::Error;

/// Splits `<email> <password>`; the password may not contain whitespace.
pub fn parse_credentials(args: &str) -> Option<(&str, &str)> {
    let mut parts = args.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some(email), Some(password), None) => Some((email, password)),
        _ => None,
    }
}

pub async fn signup(
    bot: &Bot,
    msg: &Message,
    pharmacy: &mut Pharmacy,
    args: &str,
) -> Result<(), Error> {
    let Some((email, password)) = parse_credentials(args) else {
        bot.send_message(msg.chat.id, "Usage: /signup <email> <password>")
            .await?;
        return Ok(());
    };

    let text = match pharmacy.signup(email, password).await {
        Ok(_) => format!("Welcome, {}! Your account is ready.", email),
        Err(_) => auth_failure(pharmacy),
    };
    bot.send_message(msg.chat.id, text).await?;
    Ok(())
}

pub async fn login(
    bot: &Bot,
    msg: &Message,
    pharmacy: &mut Pharmacy,
    args: &str,
) -> Result<(), Error> {
    let Some((email, password)) = parse_credentials(args) else {
        bot.send_message(msg.chat.id, "Usage: /login <email> <password>")
            .await?;
        return Ok(());
    };

    let text = match pharmacy.login(email, password).await {
        Ok(role) => {
            if let Err(e) = pharmacy.load_user_profile().await {
                log::warn!("Could not load profile after login: {}", e);
            }
            let name = match pharmacy.profile().name.as_str() {
                "" => email.to_string(),
                name => name.to_string(),
            };
            format!("Welcome back, {}! Logged in as {}.", name, role)
        }
        Err(_) => auth_failure(pharmacy),
    };
    bot.send_message(msg.chat.id, text).await?;
    Ok(())
}

fn auth_failure(pharmacy: &Pharmacy) -> String {
    pharmacy
        .auth_error()
        .unwrap_or("Authentication failed.")
        .to_string()
}

pub async fn logout(bot: &Bot, msg: &Message, pharmacy: &mut Pharmacy) -> Result<(), Error> {
    let text = if pharmacy.is_logged_in() {
        pharmacy.logout().await?;
        "You have been logged out."
    } else {
        "You are not logged in."
    };
    bot.send_message(msg.chat.id, text).await?;
    Ok(())
}

pub async fn show_profile(
    bot: &Bot,
    msg: &Message,
    pharmacy: &mut Pharmacy,
) -> Result<(), Error> {
    let Some(email) = pharmacy.current_user().map(|u| u.email.clone()) else {
        bot.send_message(msg.chat.id, PharmacyError::NotAuthenticated.to_string())
            .await?;
        return Ok(());
    };

    pharmacy.load_user_profile().await?;
    bot.send_message(msg.chat.id, render_profile(&email, pharmacy.profile()))
        .await?;
    Ok(())
}

pub async fn set_profile(
    bot: &Bot,
    msg: &Message,
    pharmacy: &mut Pharmacy,
    args: &str,
) -> Result<(), Error> {
    let Some(fields) = parse_fields(args, 3) else {
        bot.send_message(msg.chat.id, "Usage: /setprofile <name>; <email>; <phone>")
            .await?;
        return Ok(());
    };

    let profile = UserProfile {
        name: fields[0].clone(),
        email: fields[1].clone(),
        phone: fields[2].clone(),
    };
    let text = match pharmacy.update_user_profile(profile).await {
        Ok(()) => "Profile updated.".to_string(),
        Err(PharmacyError::NotAuthenticated) => PharmacyError::NotAuthenticated.to_string(),
        Err(e) => {
            log::error!("Failed to update profile: {}", e);
            "Failed to update your profile, please try again later.".to_string()
        }
    };
    bot.send_message(msg.chat.id, text).await?;
    Ok(())
}

pub fn render_profile(account_email: &str, profile: &UserProfile) -> String {
    let or_dash = |value: &str| {
        if value.is_empty() {
            "-".to_string()
        } else {
            value.to_string()
        }
    };
    format!(
        "Account: {}\nName: {}\nEmail: {}\nPhone: {}",
        account_email,
        or_dash(&profile.name),
        or_dash(&profile.email),
        or_dash(&profile.phone)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_email_and_password() {
        assert_eq!(
            parse_credentials("  jane@example.com   secret1 "),
            Some(("jane@example.com", "secret1"))
        );
        assert_eq!(parse_credentials("jane@example.com"), None);
        assert_eq!(parse_credentials("a b c"), None);
    }

    #[test]
    fn renders_profile_placeholders() {
        let profile = UserProfile {
            name: "Jane".into(),
            email: String::new(),
            phone: "555".into(),
        };
        assert_eq!(
            render_profile("jane@example.com", &profile),
            "Account: jane@example.com\nName: Jane\nEmail: -\nPhone: 555"
        );
    }
}
