//! Builders for the evaluation snippets the chrome backend runs in-page.
//!
//! Every snippet is an IIFE returning `{ ok, value }` on success or
//! `{ ok: false, error }` when the selector does not resolve, so the driver
//! can map outcomes onto the error taxonomy without string-scraping.

/// Escape a string for embedding inside a single-quoted JS literal.
pub fn escape(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('\'', "\\'")
        .replace('\n', "\\n")
        .replace('\r', "\\r")
}

fn with_element(selector: &str, body: &str) -> String {
    format!(
        r#"
        (function() {{
            const el = document.querySelector('{}');
            if (!el) return {{ ok: false, error: 'not found' }};
            try {{
                {}
            }} catch (e) {{
                return {{ ok: false, error: e.message }};
            }}
        }})()
        "#,
        escape(selector),
        body
    )
}

pub fn click_script(selector: &str) -> String {
    with_element(
        selector,
        r#"
            el.scrollIntoView({ block: 'center' });
            el.focus();
            el.click();
            return { ok: true, value: el.tagName.toLowerCase() };
        "#,
    )
}

pub fn fill_script(selector: &str, value: &str) -> String {
    with_element(
        selector,
        &format!(
            r#"
            el.focus();
            el.value = '{}';
            el.dispatchEvent(new Event('input', {{ bubbles: true }}));
            el.dispatchEvent(new Event('change', {{ bubbles: true }}));
            return {{ ok: true, value: el.value }};
            "#,
            escape(value)
        ),
    )
}

pub fn type_script(selector: &str, text: &str) -> String {
    with_element(
        selector,
        &format!(
            r#"
            el.focus();
            el.value = (el.value || '') + '{}';
            el.dispatchEvent(new Event('input', {{ bubbles: true }}));
            el.dispatchEvent(new Event('change', {{ bubbles: true }}));
            return {{ ok: true, value: el.value }};
            "#,
            escape(text)
        ),
    )
}

pub fn select_script(selector: &str, options_json: &str) -> String {
    with_element(
        selector,
        &format!(
            r#"
            const wanted = {};
            const available = Array.from(el.options).map(o => o.value);
            const missing = wanted.filter(w => !available.includes(w));
            if (missing.length > 0) {{
                return {{ ok: false, error: 'options unavailable: ' + missing.join(', ') }};
            }}
            for (const option of el.options) {{
                option.selected = wanted.includes(option.value);
            }}
            el.dispatchEvent(new Event('change', {{ bubbles: true }}));
            return {{ ok: true, value: wanted }};
            "#,
            options_json
        ),
    )
}

pub fn text_script(selector: &str) -> String {
    with_element(
        selector,
        "return { ok: true, value: (el.textContent || '').trim() };",
    )
}

/// Returns `value: null` when the element has no value property; the driver
/// normalizes that case to an empty string.
pub fn value_script(selector: &str) -> String {
    with_element(
        selector,
        "return { ok: true, value: el.value === undefined ? null : el.value };",
    )
}

pub fn exists_script(selector: &str) -> String {
    format!(
        "document.querySelector('{}') !== null",
        escape(selector)
    )
}

pub fn visible_script(selector: &str) -> String {
    with_element(
        selector,
        r#"
            const rect = el.getBoundingClientRect();
            const style = window.getComputedStyle(el);
            const visible = rect.width > 0 && rect.height > 0
                && style.visibility !== 'hidden' && style.display !== 'none';
            return { ok: true, value: visible };
        "#,
    )
}

/// Full document extent, for sizing a full-page screenshot clip.
pub fn document_size_script() -> String {
    r#"
    (function() {
        const d = document.documentElement;
        const b = document.body;
        return { ok: true, value: {
            width: Math.max(d.scrollWidth, b ? b.scrollWidth : 0),
            height: Math.max(d.scrollHeight, b ? b.scrollHeight : 0),
        } };
    })()
    "#
    .to_string()
}

pub fn viewport_script() -> String {
    "({ ok: true, value: { width: window.innerWidth, height: window.innerHeight } })".to_string()
}

pub fn resize_script(width: u32, height: u32) -> String {
    format!(
        r#"
        (function() {{
            window.resizeTo({}, {});
            return {{ ok: true, value: {{ width: window.innerWidth, height: window.innerHeight }} }};
        }})()
        "#,
        width, height
    )
}
