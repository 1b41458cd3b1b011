//! Who may submit a URL, and whether it counts against the daily quota.

use chrono::{DateTime, Utc};

use dropcore::core::{escape_html, Settings};
use dropcore::storage::User;

pub const BANNED: &str = "You are banned from using this bot.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// `metered` users have the submission counted against their quota
    Allowed { metered: bool },
    Banned,
    QuotaExceeded { limit: u32 },
}

/// Admins, users listed as paid in the settings and users with a live
/// subscription are never metered. Everyone else gets `daily_task_limit`
/// submissions a day.
pub fn check_access(
    user_id: i64,
    user: Option<&User>,
    settings: &Settings,
    used_today: u32,
    now: DateTime<Utc>,
) -> Access {
    if user.is_some_and(|u| u.banned) {
        return Access::Banned;
    }
    let unmetered = settings.is_admin(user_id)
        || settings.is_listed_paid(user_id)
        || user.is_some_and(|u| u.has_active_subscription(now));
    if unmetered {
        return Access::Allowed { metered: false };
    }
    if used_today >= settings.daily_task_limit {
        return Access::QuotaExceeded {
            limit: settings.daily_task_limit,
        };
    }
    Access::Allowed { metered: true }
}

pub fn quota_exceeded_text(limit: u32) -> String {
    format!(
        "⚠️ You have reached your daily limit of {} downloads.\n\nPlease try again tomorrow or ask an admin for unlimited downloads.",
        limit
    )
}

pub fn usage_text(used: u32, limit: u32) -> String {
    format!(
        "📊 You have used {}/{} downloads today. {} remaining.",
        used,
        limit,
        limit.saturating_sub(used)
    )
}

const STAMP: &str = "%Y-%m-%d %H:%M:%S UTC";

fn days_phrase(days: i64) -> String {
    match days {
        d if d <= 0 => "less than a day".to_string(),
        1 => "1 day".to_string(),
        d => format!("{} days", d),
    }
}

/// Reply to `/upgrade`: the caller's own subscription.
pub fn subscription_text(user: Option<&User>, now: DateTime<Utc>) -> String {
    let Some(user) = user.filter(|u| u.has_active_subscription(now)) else {
        return "❌ <b>You don't have an active premium subscription.</b>\n\n\
                Premium users have no daily download limit.\n\n\
                Contact an admin to purchase a subscription."
            .to_string();
    };
    let (Some(expiry), Some(days)) = (user.paid_expiry, user.days_remaining(now)) else {
        return "✅ <b>You have an active premium subscription without expiration!</b>".to_string();
    };

    let mut text = String::from("✅ <b>You have an active premium subscription!</b>\n\n");
    if let Some(start) = user.subscription_start {
        text.push_str(&format!("📅 <b>Started on:</b> {}\n", start.format(STAMP)));
    }
    text.push_str(&format!(
        "📅 <b>Expires on:</b> {}\n⏱️ <b>Time remaining:</b> {}\n\n",
        expiry.format(STAMP),
        days_phrase(days)
    ));
    if days < 7 {
        text.push_str("⚠️ Your subscription is ending soon. Contact an admin to renew.");
    } else {
        text.push_str("Enjoy unlimited downloads!");
    }
    text
}

/// Reply to `/paidusers`: every live subscription, one entry per user.
pub fn paid_users_text(users: &[User], now: DateTime<Utc>) -> String {
    if users.is_empty() {
        return "No active paid users found.".to_string();
    }
    let mut text = format!("📊 <b>Active Paid Users: {}</b>\n", users.len());
    for (i, user) in users.iter().enumerate() {
        let name = user
            .username
            .as_deref()
            .map(|u| format!(" (@{})", escape_html(u)))
            .unwrap_or_default();
        let expiry = match (user.paid_expiry, user.days_remaining(now)) {
            (Some(expiry), Some(days)) => format!("Expires: {} ({} left)", expiry.format("%Y-%m-%d"), days_phrase(days)),
            _ => "No expiration date".to_string(),
        };
        text.push_str(&format!(
            "\n{}. User ID: <code>{}</code>{}\n   {}\n",
            i + 1,
            user.user_id,
            name,
            expiry
        ));
    }
    text
}
