//! Page probes: the scripts claimcheck evaluates and typed helpers around them
//!
//! Every script is a self-contained JavaScript expression. Builders are
//! deterministic, so a mock driver can be primed with the exact script a
//! helper will evaluate.

use crate::driver::PageDriver;
use crate::error::Result;
use serde_json::{json, Value};
use tracing::debug;

/// Visible text of the whole page
pub const VISIBLE_TEXT: &str = "(() => document.body ? document.body.innerText : '')()";

/// Number of resource entries the page has fetched so far
pub const RESOURCE_COUNT: &str = "(() => performance.getEntriesByType('resource').length)()";

/// All values in `localStorage`, in key order
pub const LOCAL_STORAGE_VALUES: &str = "(() => { \
    const out = []; \
    for (let i = 0; i < localStorage.length; i++) { \
        out.push(localStorage.getItem(localStorage.key(i)) || ''); \
    } \
    return out; \
})()";

/// Raw `href` of the first link that contains a workspace-id shaped token
pub const TOKEN_LINK_HREF: &str = "(() => { \
    const re = /[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}/i; \
    const link = Array.from(document.querySelectorAll('a[href]')) \
        .find(a => re.test(a.getAttribute('href'))); \
    return link ? link.getAttribute('href') : null; \
})()";

fn encode(value: impl serde::Serialize) -> String {
    json!(value).to_string()
}

/// First selector in `selectors` that matches any element
pub fn first_present_script(selectors: &[String]) -> String {
    format!(
        "((sels) => {{ \
            for (const s of sels) {{ \
                try {{ if (document.querySelector(s)) return s; }} catch (e) {{}} \
            }} \
            return null; \
        }})({})",
        encode(selectors)
    )
}

/// First selector in `selectors` that matches a rendered element
pub fn first_visible_script(selectors: &[String]) -> String {
    format!(
        "((sels) => {{ \
            for (const s of sels) {{ \
                try {{ \
                    const hit = Array.from(document.querySelectorAll(s)) \
                        .some(el => el.getClientRects().length > 0); \
                    if (hit) return s; \
                }} catch (e) {{}} \
            }} \
            return null; \
        }})({})",
        encode(selectors)
    )
}

/// Whether any rendered, enabled input matches one of `selectors`
pub fn credential_input_script(selectors: &[String]) -> String {
    format!(
        "((sels) => sels.some(s => {{ \
            try {{ \
                return Array.from(document.querySelectorAll(s)) \
                    .some(el => !el.disabled && el.getClientRects().length > 0); \
            }} catch (e) {{ return false; }} \
        }}))({})",
        encode(selectors)
    )
}

/// Whether the page shows a login form
///
/// A rendered, enabled password input is enough. An email input only counts
/// when its form also holds a password input, rendered or not, so an
/// invite-by-email box on an authenticated page does not look logged out.
pub fn login_form_script(password_selectors: &[String], email_selectors: &[String]) -> String {
    format!(
        "((pw, em) => {{ \
            const all = (sels, root) => sels.flatMap(s => {{ \
                try {{ return Array.from(root.querySelectorAll(s)); }} catch (e) {{ return []; }} \
            }}); \
            const live = el => !el.disabled && el.getClientRects().length > 0; \
            if (all(pw, document).some(live)) return true; \
            return all(em, document).some(el => live(el) && !!el.form && all(pw, el.form).length > 0); \
        }})({}, {})",
        encode(password_selectors),
        encode(email_selectors)
    )
}

/// Submit the form that owns the element matching `selector`
pub fn submit_form_script(selector: &str) -> String {
    format!(
        "((sel) => {{ \
            const el = document.querySelector(sel); \
            const form = el && el.form; \
            if (!form) return false; \
            if (form.requestSubmit) {{ form.requestSubmit(); }} else {{ form.submit(); }} \
            return true; \
        }})({})",
        encode(selector)
    )
}

/// Click the first element in `scope` whose visible text equals `text`
pub fn click_by_text_script(scope: &str, text: &str) -> String {
    format!(
        "((scope, text) => {{ \
            const want = text.trim().toLowerCase(); \
            const el = Array.from(document.querySelectorAll(scope)).find(e => \
                !e.disabled && (e.innerText || e.value || '').trim().toLowerCase() === want); \
            if (!el) return false; \
            el.click(); \
            return true; \
        }})({}, {})",
        encode(scope),
        encode(text)
    )
}

/// Whether the element matching `selector` is rendered
pub fn is_visible_script(selector: &str) -> String {
    format!(
        "((sel) => {{ \
            const el = document.querySelector(sel); \
            return !!el && el.getClientRects().length > 0; \
        }})({})",
        encode(selector)
    )
}

fn as_selector(value: Value) -> Option<String> {
    value.as_str().map(str::to_string)
}

pub async fn visible_text<D: PageDriver + ?Sized>(driver: &D) -> Result<String> {
    let value = driver.evaluate(VISIBLE_TEXT).await?;
    Ok(value.as_str().unwrap_or("").to_string())
}

pub async fn first_present<D: PageDriver + ?Sized>(
    driver: &D,
    selectors: &[String],
) -> Result<Option<String>> {
    if selectors.is_empty() {
        return Ok(None);
    }
    Ok(as_selector(driver.evaluate(&first_present_script(selectors)).await?))
}

pub async fn first_visible<D: PageDriver + ?Sized>(
    driver: &D,
    selectors: &[String],
) -> Result<Option<String>> {
    if selectors.is_empty() {
        return Ok(None);
    }
    Ok(as_selector(driver.evaluate(&first_visible_script(selectors)).await?))
}

pub async fn credential_input_visible<D: PageDriver + ?Sized>(
    driver: &D,
    selectors: &[String],
) -> Result<bool> {
    if selectors.is_empty() {
        return Ok(false);
    }
    let value = driver.evaluate(&credential_input_script(selectors)).await?;
    Ok(value.as_bool().unwrap_or(false))
}

pub async fn login_form_visible<D: PageDriver + ?Sized>(
    driver: &D,
    password_selectors: &[String],
    email_selectors: &[String],
) -> Result<bool> {
    if password_selectors.is_empty() {
        return Ok(false);
    }
    let value = driver
        .evaluate(&login_form_script(password_selectors, email_selectors))
        .await?;
    Ok(value.as_bool().unwrap_or(false))
}

/// `None` when the page does not expose resource timing
pub async fn resource_count<D: PageDriver + ?Sized>(driver: &D) -> Result<Option<u64>> {
    Ok(driver.evaluate(RESOURCE_COUNT).await?.as_u64())
}

pub async fn local_storage_values<D: PageDriver + ?Sized>(driver: &D) -> Result<Vec<String>> {
    let value = driver.evaluate(LOCAL_STORAGE_VALUES).await?;
    let values: Vec<String> = serde_json::from_value(value).unwrap_or_default();
    debug!("Read {} localStorage values", values.len());
    Ok(values)
}

pub async fn token_link_href<D: PageDriver + ?Sized>(driver: &D) -> Result<Option<String>> {
    Ok(as_selector(driver.evaluate(TOKEN_LINK_HREF).await?))
}

pub async fn submit_enclosing_form<D: PageDriver + ?Sized>(
    driver: &D,
    selector: &str,
) -> Result<bool> {
    let value = driver.evaluate(&submit_form_script(selector)).await?;
    Ok(value.as_bool().unwrap_or(false))
}

/// First phrase of `phrases` contained in `text`, compared case-insensitively
pub fn first_phrase_in<'p>(text: &str, phrases: &'p [String]) -> Option<&'p str> {
    let haystack = text.to_lowercase();
    phrases
        .iter()
        .find(|phrase| !phrase.is_empty() && haystack.contains(&phrase.to_lowercase()))
        .map(String::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockPageDriver;

    fn sels(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_scripts_embed_json_arguments() {
        let script = first_present_script(&sels(&["main h1", "[data-testid=\"x\"]"]));
        assert!(script.contains(r#"["main h1","[data-testid=\"x\"]"]"#));

        let script = click_by_text_script("button", "Say \"hi\"");
        assert!(script.contains(r#""Say \"hi\"""#));
    }

    #[test]
    fn test_login_form_script_ties_email_to_a_password_form() {
        let script = login_form_script(
            &sels(&["input[type=\"password\"]"]),
            &sels(&["input[type=\"email\"]"]),
        );
        assert!(script.contains(r#"["input[type=\"password\"]"], ["input[type=\"email\"]"]"#));
        assert!(script.contains("el.form && all(pw, el.form)"));
    }

    #[tokio::test]
    async fn test_login_form_needs_password_selectors() {
        let driver = MockPageDriver::new();
        assert!(!login_form_visible(&driver, &[], &sels(&["input[type=\"email\"]"]))
            .await
            .unwrap());
        assert!(driver.evaluations().await.is_empty());
    }

    #[test]
    fn test_scripts_are_deterministic() {
        let selectors = sels(&[".spinner"]);
        assert_eq!(first_visible_script(&selectors), first_visible_script(&selectors));
    }

    #[test]
    fn test_first_phrase_in_respects_order() {
        let phrases = sels(&["Something went wrong", "Failed to load"]);
        let text = "Failed to load widgets. Something went wrong.";
        assert_eq!(first_phrase_in(text, &phrases), Some("Something went wrong"));
        assert_eq!(first_phrase_in("all good", &phrases), None);
        assert_eq!(first_phrase_in("FAILED TO LOAD", &phrases), Some("Failed to load"));
    }

    #[tokio::test]
    async fn test_helpers_default_to_nothing_present() {
        let driver = MockPageDriver::new();
        let selectors = sels(&["main"]);

        assert_eq!(visible_text(&driver).await.unwrap(), "");
        assert_eq!(first_present(&driver, &selectors).await.unwrap(), None);
        assert!(!credential_input_visible(&driver, &selectors).await.unwrap());
        assert_eq!(resource_count(&driver).await.unwrap(), None);
        assert!(local_storage_values(&driver).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_helpers_read_canned_values() {
        let selectors = sels(&["main", "table"]);
        let driver = MockPageDriver::new()
            .with_evaluate(VISIBLE_TEXT, json!("Agents\nCreate agent"))
            .with_evaluate(&first_present_script(&selectors), json!("table"))
            .with_evaluate(LOCAL_STORAGE_VALUES, json!(["a", "b"]));

        assert_eq!(visible_text(&driver).await.unwrap(), "Agents\nCreate agent");
        assert_eq!(
            first_present(&driver, &selectors).await.unwrap().as_deref(),
            Some("table")
        );
        assert_eq!(local_storage_values(&driver).await.unwrap(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_empty_selector_lists_skip_evaluation() {
        let driver = MockPageDriver::new();
        assert_eq!(first_visible(&driver, &[]).await.unwrap(), None);
        assert!(driver.evaluations().await.is_empty());
    }
}
