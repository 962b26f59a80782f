//! Plain-text bodies for verification and reset emails.

use super::EmailMessage;

pub fn verification_code(to: &str, code: &str, ttl_minutes: i64) -> EmailMessage {
    EmailMessage {
        to: to.to_string(),
        subject: "Verify your email address".into(),
        body: format!(
            "Welcome!\n\
             \n\
             Your verification code is: {code}\n\
             \n\
             The code expires in {ttl_minutes} minutes. If you did not create an account, ignore this email.\n"
        ),
    }
}

pub fn password_reset(to: &str, link: &str, ttl_minutes: i64) -> EmailMessage {
    EmailMessage {
        to: to.to_string(),
        subject: "Reset your password".into(),
        body: format!(
            "A password reset was requested for this address.\n\
             \n\
             Open the link below to choose a new password:\n\
             {link}\n\
             \n\
             The link is valid for {ttl_minutes} minutes. If you did not ask for a reset, ignore this email.\n"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_appears_in_body() {
        let m = verification_code("alice@example.com", "042317", 10);
        assert_eq!(m.to, "alice@example.com");
        assert!(m.body.contains("042317"));
        assert!(m.body.contains("10 minutes"));
    }
}
