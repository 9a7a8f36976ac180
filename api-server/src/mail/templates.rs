//! HTML email templates.
//!
//! Every interpolated value is escaped: form fields are untrusted and even
//! provider-supplied URLs end up inside attributes.

use super::EmailMessage;
use crate::web::ContactSubmission;

/// Placeholder rendered for an absent or empty comment.
pub const NO_COMMENTS: &str = "—";

/// A rendered subject and body, not yet addressed.
#[derive(Debug, Clone, PartialEq)]
pub struct Rendered {
    pub subject: String,
    pub html: String,
}

impl Rendered {
    pub fn into_message(self, from: impl Into<String>, to: impl Into<String>) -> EmailMessage {
        EmailMessage {
            from: from.into(),
            to: to.into(),
            subject: self.subject,
            html: self.html,
        }
    }
}

/// Notification to the site operator about a new inquiry.
pub fn contact_notification(submission: &ContactSubmission) -> Rendered {
    let comments = submission
        .comments
        .as_deref()
        .filter(|c| !c.is_empty())
        .unwrap_or(NO_COMMENTS);
    let services = submission.services.join(", ");

    let rows = [
        ("Name", submission.name.as_str()),
        ("Email", submission.email.as_str()),
        ("Phone", submission.phone.as_str()),
        ("Journey", submission.journey.as_str()),
        ("Referral", submission.referral.as_str()),
        ("Industry", submission.industry.as_str()),
        ("Position", submission.position.as_str()),
        ("Services", services.as_str()),
        ("Comments", comments),
    ]
    .iter()
    .map(|(label, value)| {
        format!(
            "      <li><strong>{}:</strong> {}</li>\n",
            label,
            escape_html(value)
        )
    })
    .collect::<String>();

    Rendered {
        subject: "📩 New Contact Form Submission".to_string(),
        html: format!(
            "\n    <h2>New Wintersmith.AI Inquiry</h2>\n    <ul>\n{}    </ul>\n",
            rows
        ),
    }
}

/// Payment link sent to whoever requested the invoice.
pub fn invoice_ready(name: &str, hosted_url: &str) -> Rendered {
    let name = escape_html(name);
    let url = escape_html(hosted_url);

    Rendered {
        subject: "Your Wintersmith.AI Invoice".to_string(),
        html: format!(
            r#"
    <p>Hi {name},</p>
    <p>Your Wintersmith.AI invoice is ready. You can view and pay it securely here:</p>
    <p><a href="{url}">{url}</a></p>
    <p>Thanks for your business!</p>
"#
        ),
    }
}

/// Thank-you note after an invoice is paid.
pub fn payment_received(name: &str, amount_paid: i64) -> Rendered {
    let name = escape_html(name);
    let amount = format_amount(amount_paid);

    Rendered {
        subject: "Payment Received – Thank You!".to_string(),
        html: format!(
            r#"
    <p>Hi {name},</p>
    <p>We’ve received your payment of <strong>${amount}</strong>.</p>
    <p>Thank you for choosing Wintersmith.AI—let’s build something amazing!</p>
"#
        ),
    }
}

/// Render minor currency units as a two-decimal amount: `1999` -> `19.99`.
pub fn format_amount(minor_units: i64) -> String {
    let sign = if minor_units < 0 { "-" } else { "" };
    let abs = minor_units.unsigned_abs();
    format!("{}{}.{:02}", sign, abs / 100, abs % 100)
}

/// Escape text for inclusion in HTML element content or quoted attributes.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn submission() -> ContactSubmission {
        ContactSubmission {
            name: "Ada Lovelace".to_string(),
            email: "ada@example.com".to_string(),
            phone: "555-0100".to_string(),
            journey: "Exploring".to_string(),
            referral: "Conference".to_string(),
            industry: "Manufacturing".to_string(),
            position: "CTO".to_string(),
            services: vec!["Strategy".to_string(), "Automation".to_string()],
            comments: None,
            token: "tok".to_string(),
        }
    }

    #[test]
    fn test_contact_notification_fields() {
        let rendered = contact_notification(&submission());

        assert_eq!(rendered.subject, "📩 New Contact Form Submission");
        for expected in [
            "<strong>Name:</strong> Ada Lovelace",
            "<strong>Email:</strong> ada@example.com",
            "<strong>Phone:</strong> 555-0100",
            "<strong>Journey:</strong> Exploring",
            "<strong>Referral:</strong> Conference",
            "<strong>Industry:</strong> Manufacturing",
            "<strong>Position:</strong> CTO",
            "<strong>Services:</strong> Strategy, Automation",
            "<strong>Comments:</strong> —",
        ] {
            assert!(rendered.html.contains(expected), "missing {:?}", expected);
        }
    }

    #[test]
    fn test_contact_notification_empty_services_and_comment() {
        let mut form = submission();
        form.services.clear();
        form.comments = Some(String::new());

        let rendered = contact_notification(&form);

        assert!(rendered.html.contains("<strong>Services:</strong> </li>"));
        assert!(rendered.html.contains("<strong>Comments:</strong> —"));
    }

    #[test]
    fn test_contact_notification_escapes_input() {
        let mut form = submission();
        form.comments = Some("<script>alert('x')</script>".to_string());

        let rendered = contact_notification(&form);

        assert!(!rendered.html.contains("<script>"));
        assert!(rendered
            .html
            .contains("&lt;script&gt;alert(&#x27;x&#x27;)&lt;/script&gt;"));
    }

    #[test]
    fn test_invoice_ready_contains_link() {
        let url = "https://invoice.stripe.com/i/acct_1/test_abc";

        let rendered = invoice_ready("Ada", url);

        assert_eq!(rendered.subject, "Your Wintersmith.AI Invoice");
        assert!(rendered.html.contains("Hi Ada,"));
        assert!(rendered.html.contains(&format!(r#"<a href="{url}">{url}</a>"#)));
    }

    #[test]
    fn test_payment_received_amount() {
        let rendered = payment_received("Ada", 123456);

        assert!(rendered.html.contains("<strong>$1234.56</strong>"));
        assert!(rendered.html.contains("Hi Ada,"));
        assert!(rendered
            .html
            .contains("Thank you for choosing Wintersmith.AI—let’s build something amazing!"));
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(0), "0.00");
        assert_eq!(format_amount(5), "0.05");
        assert_eq!(format_amount(1999), "19.99");
        assert_eq!(format_amount(100000), "1000.00");
        assert_eq!(format_amount(-250), "-2.50");
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("plain"), "plain");
        assert_eq!(escape_html("a & b"), "a &amp; b");
        assert_eq!(escape_html(r#""q""#), "&quot;q&quot;");
    }

    #[test]
    fn test_into_message() {
        let message = invoice_ready("Ada", "https://x").into_message("from@x.y", "to@x.y");

        assert_eq!(message.from, "from@x.y");
        assert_eq!(message.to, "to@x.y");
        assert_eq!(message.subject, "Your Wintersmith.AI Invoice");
    }
}
