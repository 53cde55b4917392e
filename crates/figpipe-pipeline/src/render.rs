//! Headless Chrome renderer for generated components.
//!
//! The component is dropped into a single-page HTML harness (React 18 UMD +
//! Babel standalone, optional Tailwind CDN) and captured with Chrome's
//! `--screenshot` flag at the requested viewport.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;

use figpipe_types::{AssetManifestItem, FigpipeError, Result};

use crate::deps::{ImplementationRenderer, RenderOutcome, RenderRequest};

pub struct ChromeRenderer {
    chrome_bin: PathBuf,
    timeout: Duration,
    settle_ms: u64,
}

impl ChromeRenderer {
    pub fn new(chrome_bin: impl Into<PathBuf>) -> Self {
        Self {
            chrome_bin: chrome_bin.into(),
            timeout: Duration::from_secs(45),
            settle_ms: 1500,
        }
    }

    /// Binary from `CHROME_BIN`, else `chromium` on `PATH`.
    pub fn from_env() -> Self {
        let bin = std::env::var("CHROME_BIN")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| "chromium".to_string());
        Self::new(bin)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn capture(&self, html_path: &Path, request: &RenderRequest) -> Result<()> {
        let mut cmd = tokio::process::Command::new(&self.chrome_bin);
        cmd.arg("--headless=new")
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--hide-scrollbars")
            .arg("--default-background-color=00000000")
            .arg(format!("--window-size={},{}", request.width.max(1), request.height.max(1)))
            .arg(format!("--virtual-time-budget={}", self.settle_ms))
            .arg(format!("--screenshot={}", request.output_path.display()))
            .arg(file_uri(html_path));
        cmd.stdout(std::process::Stdio::piped());
        cmd.stderr(std::process::Stdio::piped());
        cmd.kill_on_drop(true);

        let child = cmd.spawn().map_err(|e| {
            FigpipeError::RenderFailed(format!("failed to launch {}: {e}", self.chrome_bin.display()))
        })?;
        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| FigpipeError::RenderTimeout {
                timeout_ms: self.timeout.as_millis() as u64,
            })?
            .map_err(|e| FigpipeError::RenderFailed(format!("browser execution failed: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(FigpipeError::RenderFailed(format!(
                "browser exited with code {}: {}",
                output.status.code().unwrap_or(-1),
                stderr.trim()
            )));
        }
        Ok(())
    }

    /// Write the harness page into a scratch directory and capture it.
    async fn render_to_file(&self, request: &RenderRequest) -> Result<()> {
        if let Some(parent) = request.output_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let temp = tempfile::Builder::new().prefix("figpipe_render_").tempdir()?;
        let html_path = temp.path().join("render.html");
        tokio::fs::write(&html_path, build_harness(request)).await?;

        tracing::info!(
            component = %request.component_name,
            width = request.width,
            height = request.height,
            "Rendering implementation screenshot"
        );
        self.capture(&html_path, request).await?;

        if !request.output_path.exists() {
            return Err(FigpipeError::RenderFailed("browser produced no image".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl ImplementationRenderer for ChromeRenderer {
    async fn render(&self, request: &RenderRequest) -> RenderOutcome {
        match self.render_to_file(request).await {
            Ok(()) => RenderOutcome::rendered(&request.output_path),
            Err(e) => {
                tracing::warn!(error = %e, "Implementation render failed");
                RenderOutcome::failed(e.to_string())
            }
        }
    }
}

fn file_uri(path: &Path) -> String {
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    format!("file://{}", absolute.to_string_lossy().replace(' ', "%20"))
}

/// Point logical asset paths in string literals at the local asset store.
pub fn rewrite_asset_paths(code: &str, manifest: &[AssetManifestItem]) -> String {
    let mut code = code.to_string();
    for item in manifest {
        if item.logical_path.is_empty() || item.local_path.is_empty() {
            continue;
        }
        let uri = file_uri(Path::new(&item.local_path));
        code = code
            .replace(&format!("\"{}\"", item.logical_path), &format!("\"{uri}\""))
            .replace(&format!("'{}'", item.logical_path), &format!("'{uri}'"));
    }
    code
}

/// Strip module syntax so the source runs as a plain Babel script.
pub fn to_babel_script(code: &str) -> String {
    static RULES: OnceLock<Vec<(Regex, &'static str)>> = OnceLock::new();
    let rules = RULES.get_or_init(|| {
        [
            (r"(?m)^\s*import\s+[^;]+;\s*$", ""),
            (r"(?m)^\s*export\s+const\s+", "const "),
            (r"(?m)^\s*export\s+function\s+", "function "),
            (r"(?m)^\s*export\s+default\s+", "const __FigpipeDefault = "),
            (r"(?m)^\s*export\s*\{[^}]+\};?\s*$", ""),
        ]
        .into_iter()
        .map(|(pattern, replacement)| (Regex::new(pattern).expect("static pattern"), replacement))
        .collect()
    });

    rules
        .iter()
        .fold(code.to_string(), |acc, (re, replacement)| {
            re.replace_all(&acc, *replacement).into_owned()
        })
}

/// Full HTML page that mounts the component into `#root`.
pub fn build_harness(request: &RenderRequest) -> String {
    let width = request.width.max(1);
    let height = request.height.max(1);
    let script = to_babel_script(&rewrite_asset_paths(&request.code, &request.manifest));
    let tailwind = if request.use_tailwind {
        r#"<script src="https://cdn.tailwindcss.com"></script>"#
    } else {
        ""
    };
    let name = &request.component_name;

    format!(
        r#"<!doctype html>
<html>
  <head>
    <meta charset="utf-8" />
    <meta name="viewport" content="width={width}, initial-scale=1.0" />
    {tailwind}
    <script crossorigin src="https://unpkg.com/react@18/umd/react.production.min.js"></script>
    <script crossorigin src="https://unpkg.com/react-dom@18/umd/react-dom.production.min.js"></script>
    <script src="https://unpkg.com/@babel/standalone/babel.min.js"></script>
    <style>
      html, body {{ margin: 0; padding: 0; width: {width}px; height: {height}px; overflow: hidden; background: transparent; }}
      #root {{ width: {width}px; height: {height}px; }}
    </style>
  </head>
  <body>
    <div id="root"></div>
    <script type="text/babel" data-presets="typescript,react">
{script}
const __FigpipeTarget = (typeof {name} !== 'undefined')
  ? {name}
  : (typeof __FigpipeDefault !== 'undefined' ? __FigpipeDefault : null);
if (!__FigpipeTarget) {{
  throw new Error("Renderable component not found: {name}");
}}
ReactDOM.createRoot(document.getElementById("root")).render(React.createElement(__FigpipeTarget));
    </script>
  </body>
</html>
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(code: &str, use_tailwind: bool) -> RenderRequest {
        RenderRequest {
            code: code.to_string(),
            component_name: "Card".into(),
            manifest: vec![AssetManifestItem {
                asset_id: "0123456789abcdef".into(),
                source_node_id: "1:2".into(),
                image_ref: "ref".into(),
                local_path: "/cache/assets/0123456789abcdef.png".into(),
                logical_path: "/assets/figma/0123456789abcdef.png".into(),
                hash: "h".into(),
                mime: "image/png".into(),
            }],
            width: 320,
            height: 200,
            output_path: PathBuf::from("/tmp/out.png"),
            use_tailwind,
        }
    }

    #[test]
    fn strips_module_syntax() {
        let code = "import React from 'react';\nexport function Card() { return null; }\nexport default Card;\nexport { Card };\n";
        let script = to_babel_script(code);
        assert!(!script.contains("import"));
        assert!(script.contains("function Card()"));
        assert!(script.contains("const __FigpipeDefault = Card;"));
        assert!(!script.contains("export"));
    }

    #[test]
    fn rewrites_logical_paths_in_literals() {
        let req = request("<img src=\"/assets/figma/0123456789abcdef.png\" />", true);
        let code = rewrite_asset_paths(&req.code, &req.manifest);
        assert!(code.contains("\"file:///cache/assets/0123456789abcdef.png\""));
    }

    #[test]
    fn harness_sizes_viewport_and_toggles_tailwind() {
        let html = build_harness(&request("export function Card() {}", true));
        assert!(html.contains("width: 320px; height: 200px;"));
        assert!(html.contains("cdn.tailwindcss.com"));
        assert!(html.contains("typeof Card !== 'undefined'"));

        let html = build_harness(&request("export function Card() {}", false));
        assert!(!html.contains("cdn.tailwindcss.com"));
    }

    #[tokio::test]
    async fn missing_browser_reports_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut req = request("export function Card() {}", false);
        req.output_path = dir.path().join("impl.png");
        let renderer = ChromeRenderer::new(dir.path().join("no-such-browser"));
        let outcome = renderer.render(&req).await;
        assert!(outcome.path.is_none());
        let error = outcome.error.unwrap();
        assert!(error.starts_with("Implementation render failed: failed to launch"), "{error}");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn slow_browser_reports_timeout() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("slow-browser.sh");
        std::fs::write(&script, "#!/bin/sh\nsleep 5\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let mut req = request("export function Card() {}", false);
        req.output_path = dir.path().join("impl.png");
        let renderer = ChromeRenderer::new(&script).with_timeout(Duration::from_millis(200));
        let outcome = renderer.render(&req).await;
        assert!(outcome.path.is_none());
        assert_eq!(
            outcome.error.as_deref(),
            Some("Implementation render timed out after 200ms")
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn browser_without_screenshot_is_a_failure() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("noop-browser.sh");
        std::fs::write(&script, "#!/bin/sh\nexit 0\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let mut req = request("export function Card() {}", false);
        req.output_path = dir.path().join("impl.png");
        let outcome = ChromeRenderer::new(&script).render(&req).await;
        assert_eq!(
            outcome.error.as_deref(),
            Some("Implementation render failed: browser produced no image")
        );
    }
}
