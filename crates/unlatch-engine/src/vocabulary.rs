//! Keyword vocabularies and selector lists shared by the detector and the
//! action catalog.

use once_cell::sync::Lazy;
use regex::Regex;

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("vocabulary pattern is a valid regex")
}

/// `<number> sec|seconds|wait` countdown text.
pub static COUNTDOWN: Lazy<Regex> =
    Lazy::new(|| compile(r"(?i)\b\d{1,3}\s*(?:s|secs?|seconds?|wait)\b"));

/// Class or id fragments used by known gate templates.
pub static GATE_MARKER: Lazy<Regex> = Lazy::new(|| {
    compile(
        r"(?i)(countdown|timer|captcha|locker|content-?lock|wpsafe|safelink|get-?link|go-?link|interstitial|human-?check|verify|unlock)",
    )
});

/// Helper text that moves a gate to its final step.
pub static FINAL_STEP_TEXT: Lazy<Regex> = Lazy::new(|| {
    compile(r"(?i)\b(get\s*(the\s*)?link|go\s*to\s*link|open\s*link|download)\b")
});

/// Helper text that advances a gate by one step.
pub static CONTINUE_TEXT: Lazy<Regex> =
    Lazy::new(|| compile(r"(?i)\b(continue|next|proceed|skip(\s*ad)?)\b"));

/// Helper text for the first, human-check step.
pub static VERIFY_TEXT: Lazy<Regex> = Lazy::new(|| {
    compile(r"(?i)\b(verify|i\s*(am|'m)\s*not\s*a\s*robot|i\s*am\s*human|click\s*to\s*verify)\b")
});

/// Script text referencing timers or redirection.
pub static REDIRECT_SCRIPT: Lazy<Regex> = Lazy::new(|| {
    compile(r"(setTimeout|setInterval|location\.(href|replace|assign)|window\.open)")
});

/// Ad-blocker nag text.
pub static ADBLOCK_TEXT: Lazy<Regex> = Lazy::new(|| {
    compile(
        r"(?i)(ad\s*-?block(er)?\s+(is\s+)?(detected|enabled)|(disable|turn\s+off|whitelist)\s+(your\s+)?ad\s*-?block)",
    )
});

/// Form actions that are never gate forms.
pub static NON_GATE_FORM_ACTION: Lazy<Regex> = Lazy::new(|| {
    compile(r"(?i)(wp-comments-post\.php|comment|contact|newsletter|subscribe|login|signin|search)")
});

/// Whether `text` contains any helper action keyword.
pub fn is_action_text(text: &str) -> bool {
    FINAL_STEP_TEXT.is_match(text) || CONTINUE_TEXT.is_match(text) || VERIFY_TEXT.is_match(text)
}

/// Form ids used by known gate templates.
pub const GATE_FORM_IDS: &[&str] = &["rtg", "wpsafelink-landing", "go-link", "link-view", "getlink"];

/// Landmarks whose contents are never helper candidates.
pub const LANDMARK_TAGS: &[&str] = &["nav", "header", "footer"];

/// Stacking order above which a visible element counts as an overlay.
pub const OVERLAY_Z_INDEX: i64 = 999;

/// Controls of known link-shortener templates.
pub const HELPER_SELECTORS: &[&str] = &[
    "#tp-snp2",
    "#btn7",
    "#btn7 button",
    "#btn7 .ce-btn",
    "#btn6",
    "#wpsafelink-landing",
    "#wpsafe-link",
    "#wpsafe-link a",
    "#wpsafe-link img",
    "#image3",
    "a[onclick*='safelink_redirect']",
    ".ce-btn.ce-blue",
    "center a button.ce-btn",
    "center a .ce-blue",
    "[id*='getlink'], [id*='continue'], [id*='proceed']",
    "[class*='getlink'], [class*='continue'], [class*='proceed']",
    "#link",
    "#rtg button",
    "#rtg .button",
];

/// Close buttons of ad overlays; clicked only when nothing better exists.
pub const DISMISS_SELECTORS: &[&str] = &[
    ".BR-Footer-Ads-close",
    ".close, .close-btn, .ad-close, .close-ad",
    "button[aria-label='Close'], .modal-close",
];

/// Nuisance elements removed by cleanup.
pub const NUISANCE_SELECTORS: &[&str] = &[
    "#adblock-modal",
    ".popup, .pop-up",
    ".ad-banner, .ads-banner",
    ".ad-container, .ads-container",
    ".newsletter-popup, .subscribe-popup",
    ".modal-backdrop, .overlay",
    "iframe[src*='googleads'], iframe[src*='doubleclick']",
    "#BR-Footer-Ads",
    ".BR-Overlay",
    ".footer-ad, .bottom-ad, .sticky-ad",
    ".comments-area, #comments, .comment-respond",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_countdown_pattern() {
        assert!(COUNTDOWN.is_match("Wait 5 seconds"));
        assert!(COUNTDOWN.is_match("Please wait 10 sec"));
        assert!(COUNTDOWN.is_match("15s"));
        assert!(COUNTDOWN.is_match("3 wait"));
        assert!(!COUNTDOWN.is_match("Posted 2024"));
        assert!(!COUNTDOWN.is_match("5 seasons"));
    }

    #[test]
    fn test_action_text() {
        assert!(is_action_text("Click to Verify"));
        assert!(is_action_text("I'm not a robot"));
        assert!(is_action_text("Continue"));
        assert!(is_action_text("Get Link"));
        assert!(is_action_text("Go To Link"));
        assert!(!is_action_text("Read our privacy policy"));
        assert!(!is_action_text("Nextcloud"));
    }

    #[test]
    fn test_gate_marker() {
        assert!(GATE_MARKER.is_match("wpsafe-link"));
        assert!(GATE_MARKER.is_match("content-locker"));
        assert!(GATE_MARKER.is_match("g-recaptcha"));
        assert!(!GATE_MARKER.is_match("article-body"));
    }

    #[test]
    fn test_non_gate_form_actions() {
        assert!(NON_GATE_FORM_ACTION.is_match("https://blog.test/wp-comments-post.php"));
        assert!(NON_GATE_FORM_ACTION.is_match("/contact-us"));
        assert!(!NON_GATE_FORM_ACTION.is_match("/links/go"));
    }

    #[test]
    fn test_redirect_and_adblock_patterns() {
        assert!(REDIRECT_SCRIPT.is_match("setTimeout(function(){ window.location.href = u; }, 5000)"));
        assert!(!REDIRECT_SCRIPT.is_match("console.log('hi')"));
        assert!(ADBLOCK_TEXT.is_match("AdBlock detected! Please disable your adblocker"));
        assert!(ADBLOCK_TEXT.is_match("Please turn off your ad-block"));
        assert!(!ADBLOCK_TEXT.is_match("Block of text"));
    }

    #[test]
    fn test_builtin_selectors_parse() {
        for text in HELPER_SELECTORS
            .iter()
            .chain(DISMISS_SELECTORS)
            .chain(NUISANCE_SELECTORS)
        {
            assert!(unlatch_dom::Selector::parse(text).is_ok(), "{}", text);
        }
    }
}
