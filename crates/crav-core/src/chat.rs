//! Canned replies for the site chat widget.
//!
//! Matching is deliberately simple: lowercase the message, walk the rules in
//! order, and answer with the first rule that has any keyword contained in
//! the message.

use serde::Serialize;

use crate::error::CoreError;

/// Longest message the widget accepts.
pub const MAX_MESSAGE_CHARS: usize = 2000;

/// Topic reported when no rule matched.
pub const FALLBACK_TOPIC: &str = "fallback";

const FALLBACK_REPLY: &str = "Thanks for reaching out! I'm not sure about that one yet. \
     You can browse our FAQ or email support@craudiovizai.com and a human will get back to you.";

/// One keyword rule.
#[derive(Debug, Clone, Copy)]
pub struct ChatRule {
    /// Topic name returned to the widget.
    pub topic: &'static str,
    /// Lowercase keywords; any one matches.
    pub keywords: &'static [&'static str],
    /// Reply text.
    pub reply: &'static str,
}

/// The reply chosen for a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatReply {
    /// Matched topic, or [`FALLBACK_TOPIC`].
    pub topic: &'static str,
    /// Reply text.
    pub reply: &'static str,
}

/// Rules in priority order.
pub const RULES: &[ChatRule] = &[
    ChatRule {
        topic: "greeting",
        keywords: &["hello", "hi there", "good morning", "good evening"],
        reply: "Hi! I'm the CR AudioViz AI assistant. Ask me about pricing, credits or our creative tools.",
    },
    ChatRule {
        topic: "refund",
        keywords: &["refund", "money back", "charged twice"],
        reply: "Credits for failed operations are refunded automatically. For payment refunds, \
                contact support@craudiovizai.com with your receipt.",
    },
    ChatRule {
        topic: "credits",
        keywords: &["credit", "balance", "top up", "top-up"],
        reply: "Every tool uses credits. You can see your balance in the dashboard and buy credit \
                packs from the Pricing page; paid plans include monthly credits.",
    },
    ChatRule {
        topic: "pricing",
        keywords: &["price", "pricing", "cost", "plan", "subscription", "how much"],
        reply: "We have a free tier plus Starter ($9/mo), Pro ($29/mo) and Business ($99/mo) \
                plans. See the Pricing page for what each includes.",
    },
    ChatRule {
        topic: "payment",
        keywords: &["paypal", "stripe", "card", "payment", "invoice"],
        reply: "We accept cards through Stripe and PayPal. Receipts are emailed after each purchase.",
    },
    ChatRule {
        topic: "tools",
        keywords: &["visualiz", "logo", "image", "video", "voice", "audio"],
        reply: "Our studio includes audio visualizers, logo and image generation, voice cloning and \
                video rendering. Each tool shows its credit cost before you run it.",
    },
    ChatRule {
        topic: "account",
        keywords: &["password", "login", "log in", "sign in", "account", "delete my"],
        reply: "You can manage your account from Settings. If you're locked out, use \
                'Forgot password' on the sign-in page.",
    },
    ChatRule {
        topic: "support",
        keywords: &["help", "support", "bug", "broken", "not working", "error"],
        reply: "Sorry about the trouble! Please describe what happened and we'll open a support \
                ticket for you, or email support@craudiovizai.com.",
    },
];

/// Pick the canned reply for a message.
///
/// # Errors
///
/// `InvalidInput` when the message is blank or longer than
/// [`MAX_MESSAGE_CHARS`].
pub fn reply_to(message: &str) -> Result<ChatReply, CoreError> {
    let trimmed = message.trim();
    if trimmed.is_empty() {
        return Err(CoreError::InvalidInput("message must not be empty".into()));
    }
    if trimmed.chars().count() > MAX_MESSAGE_CHARS {
        return Err(CoreError::InvalidInput(format!(
            "message must be at most {MAX_MESSAGE_CHARS} characters"
        )));
    }

    let lowered = trimmed.to_lowercase();
    let reply = RULES
        .iter()
        .find(|rule| rule.keywords.iter().any(|k| lowered.contains(k)))
        .map_or(
            ChatReply {
                topic: FALLBACK_TOPIC,
                reply: FALLBACK_REPLY,
            },
            |rule| ChatReply {
                topic: rule.topic,
                reply: rule.reply,
            },
        );
    Ok(reply)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_case_insensitively() {
        assert_eq!(reply_to("What does the PRO PLAN cost?").unwrap().topic, "pricing");
    }

    #[test]
    fn first_rule_in_order_wins() {
        // "refund" and "credit" both match; refund is listed first.
        assert_eq!(reply_to("can I get a refund on my credits").unwrap().topic, "refund");
    }

    #[test]
    fn unmatched_message_gets_fallback() {
        let reply = reply_to("tell me about quantum chromodynamics").unwrap();
        assert_eq!(reply.topic, FALLBACK_TOPIC);
        assert!(reply.reply.contains("support@"));
    }

    #[test]
    fn rejects_blank_and_oversized_messages() {
        assert!(reply_to("   ").is_err());
        assert!(reply_to(&"a".repeat(MAX_MESSAGE_CHARS + 1)).is_err());
        assert!(reply_to(&"a".repeat(MAX_MESSAGE_CHARS)).is_ok());
    }

    #[test]
    fn partial_keywords_match_word_stems() {
        assert_eq!(reply_to("do you have a visualizer?").unwrap().topic, "tools");
    }
}
