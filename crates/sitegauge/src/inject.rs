//! Script-tag injection for audited pages.

use crate::config::ScriptInjection;
use anyhow::{bail, Context, Result};
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chromiumoxide::Page;
use std::fs;
use tracing::info;

/// Resolve a `contentFile` reference into literal `content`.
///
/// The file is read exactly once; the returned injection never carries the
/// original file reference.
pub fn resolve(script: &ScriptInjection) -> Result<ScriptInjection> {
    let mut resolved = script.clone();
    if let Some(path) = resolved.content_file.take() {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read script file: {}", path))?;
        resolved.content = Some(content);
    }
    Ok(resolved)
}

/// Install a resolved injection on a page, to take effect on the next
/// document.
///
/// Inline `content` is installed directly as a new-document script. A `url`
/// injection installs a loader that appends a script element once the DOM is
/// available.
pub async fn apply(page: &Page, script: &ScriptInjection) -> Result<()> {
    let source = if let Some(content) = &script.content {
        info!(">> Injecting script tag (raw)");
        content.clone()
    } else if let Some(url) = &script.url {
        info!(">> Injecting script tag ({})", url);
        let src = serde_json::to_string(url).context("Failed to encode script URL")?;
        format!(
            r#"(function() {{
    function addScriptTag() {{
        var el = document.createElement('script');
        el.src = {src};
        document.head.appendChild(el);
    }}
    if (document.readyState === 'loading') {{
        document.addEventListener('DOMContentLoaded', addScriptTag);
    }} else {{
        addScriptTag();
    }}
}})();"#
        )
    } else {
        bail!("script injection has neither content nor url");
    };

    page.execute(AddScriptToEvaluateOnNewDocumentParams::new(source))
        .await
        .context("Failed to install injected script")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_resolve_reads_content_file_once() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "console.log('injected');").unwrap();

        let script = ScriptInjection {
            url: None,
            content: None,
            content_file: Some(file.path().to_string_lossy().into_owned()),
        };

        let resolved = resolve(&script).unwrap();
        assert!(resolved.content_file.is_none());
        assert!(resolved.content.unwrap().contains("console.log('injected');"));
    }

    #[test]
    fn test_resolve_missing_file_is_an_error() {
        let script = ScriptInjection {
            url: None,
            content: None,
            content_file: Some("/nonexistent/sitegauge-script.js".to_string()),
        };
        assert!(resolve(&script).is_err());
    }

    #[test]
    fn test_resolve_passes_through_inline_content() {
        let script = ScriptInjection {
            url: Some("https://cdn/x.js".to_string()),
            content: Some("var a = 1;".to_string()),
            content_file: None,
        };
        let resolved = resolve(&script).unwrap();
        assert_eq!(resolved.content.as_deref(), Some("var a = 1;"));
        assert_eq!(resolved.url.as_deref(), Some("https://cdn/x.js"));
    }
}
