use std::time::Duration;

use chromiumoxide::page::Page as CdpPage;

use crate::error::{Error, Result};
use crate::fields::{AnswerMap, FieldDescriptor};

/// Wrapper around a chromiumoxide Page with the surface the fill flow needs.
pub struct Page {
    inner: CdpPage,
    default_timeout: Duration,
}

impl Page {
    pub(crate) fn new(inner: CdpPage, default_timeout: Duration) -> Self {
        Self {
            inner,
            default_timeout,
        }
    }

    /// Returns a reference to the underlying chromiumoxide Page.
    pub fn inner(&self) -> &CdpPage {
        &self.inner
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    // ── Navigation ──────────────────────────────────────────────────

    /// Navigate to the given URL and wait for the page to load.
    pub async fn goto(&self, url: &str) -> Result<()> {
        self.inner
            .goto(url)
            .await
            .map_err(|e| Error::NavigationError(e.to_string()))?;
        Ok(())
    }

    /// Get the current page URL.
    pub async fn url(&self) -> Result<String> {
        self.inner
            .url()
            .await
            .map_err(|e| Error::NavigationError(e.to_string()))?
            .ok_or_else(|| Error::NavigationError("No URL found".into()))
    }

    /// Get the current page title.
    pub async fn title(&self) -> Result<String> {
        let result = self
            .inner
            .evaluate("document.title")
            .await
            .map_err(|e| Error::JsError(e.to_string()))?;
        match result.into_value::<String>() {
            Ok(title) => Ok(title),
            Err(_) => Ok(String::new()),
        }
    }

    /// Wait for a navigation to complete.
    pub async fn wait_for_navigation(&self) -> Result<()> {
        self.inner
            .wait_for_navigation()
            .await
            .map_err(|e| Error::NavigationError(e.to_string()))?;
        Ok(())
    }

    /// Get the full HTML content of the page.
    pub async fn html(&self) -> Result<String> {
        self.inner
            .content()
            .await
            .map_err(|e| Error::JsError(e.to_string()))
    }

    // ── Form filling ────────────────────────────────────────────────

    /// Scan the page for fillable controls.
    ///
    /// Enumerates every `input`, `textarea` and `select` element, skipping
    /// controls of type `hidden`, `submit` and `button`. Synthetic
    /// `field_<index>` ids are numbered over the full unfiltered query
    /// result, so skipped controls still consume an index. Pure read:
    /// returns an empty list when the page has no fields.
    pub async fn detect_form_fields(&self) -> Result<Vec<FieldDescriptor>> {
        let js = r#"
            JSON.stringify((() => {
                const fields = [];
                const inputs = document.querySelectorAll('input, textarea, select');
                inputs.forEach((input, index) => {
                    if (input.type === 'hidden' || input.type === 'submit' || input.type === 'button') return;

                    let label = '';
                    if (input.id) {
                        const labelEl = document.querySelector(`label[for="${input.id}"]`);
                        if (labelEl) label = (labelEl.textContent || '').trim();
                    }
                    if (!label) {
                        const parent = input.closest('label');
                        if (parent) label = (parent.textContent || '').trim();
                    }
                    if (!label && input.getAttribute('aria-label')) {
                        label = input.getAttribute('aria-label');
                    }
                    if (!label) label = input.name || input.placeholder || '';

                    fields.push({
                        id: input.id || input.name || `field_${index}`,
                        type: input.type || input.tagName.toLowerCase(),
                        label: label,
                        placeholder: input.placeholder || ''
                    });
                });
                return fields;
            })())
        "#;
        let result = self
            .inner
            .evaluate(js)
            .await
            .map_err(|e| Error::JsError(e.to_string()))?;
        let json_str: String = result
            .into_value()
            .map_err(|e| Error::JsError(e.to_string()))?;
        let fields: Vec<FieldDescriptor> = serde_json::from_str(&json_str)?;
        Ok(fields)
    }

    /// Write generated answers back into the page.
    ///
    /// Each field is located by `id` first, then by `name`; missing
    /// controls are silently skipped (the model may answer an id the page
    /// no longer has). Both an `input` and a `change` event are dispatched,
    /// bubbling, so reactive frameworks observe the mutation. Returns the
    /// ids that were actually written.
    pub async fn write_answers(&self, answers: &AnswerMap) -> Result<Vec<String>> {
        let answers_json = serde_json::to_string(answers)?;
        let js = format!(
            r#"
            JSON.stringify((() => {{
                const answers = {answers_json};
                const written = [];
                for (const [fieldId, answer] of Object.entries(answers)) {{
                    const field =
                        document.getElementById(fieldId) ||
                        document.querySelector(`[name="${{fieldId}}"]`);
                    if (!field) continue;
                    field.value = answer;
                    field.dispatchEvent(new Event('input', {{ bubbles: true }}));
                    field.dispatchEvent(new Event('change', {{ bubbles: true }}));
                    written.push(fieldId);
                }}
                return written;
            }})())
            "#,
        );
        let result = self
            .inner
            .evaluate(js)
            .await
            .map_err(|e| Error::JsError(e.to_string()))?;
        let json_str: String = result
            .into_value()
            .map_err(|e| Error::JsError(e.to_string()))?;
        let written: Vec<String> = serde_json::from_str(&json_str)?;
        Ok(written)
    }

    /// Outline the given fields, clearing the outline after `clear_after`.
    ///
    /// Presentation only: the effect expires in-page and never touches the
    /// underlying values.
    pub async fn highlight_fields(&self, ids: &[String], clear_after: Duration) -> Result<()> {
        let ids_json = serde_json::to_string(ids)?;
        let ms = clear_after.as_millis();
        let js = format!(
            r#"
            (() => {{
                const ids = {ids_json};
                for (const fieldId of ids) {{
                    const field =
                        document.getElementById(fieldId) ||
                        document.querySelector(`[name="${{fieldId}}"]`);
                    if (!field) continue;
                    const prev = field.style.outline;
                    field.style.outline = '2px solid #4ade80';
                    setTimeout(() => {{ field.style.outline = prev; }}, {ms});
                }}
            }})()
            "#,
        );
        self.inner
            .evaluate(js)
            .await
            .map_err(|e| Error::JsError(e.to_string()))?;
        Ok(())
    }

    // ── Scripting ───────────────────────────────────────────────────

    /// Evaluate a JavaScript expression and return the result as a string.
    pub async fn evaluate(&self, expression: &str) -> Result<String> {
        let result = self
            .inner
            .evaluate(expression)
            .await
            .map_err(|e| Error::JsError(e.to_string()))?;
        match result.value() {
            Some(val) => Ok(val.to_string()),
            None => Ok(String::new()),
        }
    }

    /// Evaluate a JavaScript expression without caring about the return value.
    pub async fn evaluate_void(&self, expression: &str) -> Result<()> {
        self.inner
            .evaluate(expression)
            .await
            .map_err(|e| Error::JsError(e.to_string()))?;
        Ok(())
    }
}
