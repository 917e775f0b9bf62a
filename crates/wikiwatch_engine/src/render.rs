use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use ego_tree::NodeRef;
use scraper::node::Node;
use scraper::{ElementRef, Html, Selector};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

const PICTURE_HEADER: &str =
    "<meta charset=\"UTF-8\" /><div style=\"background:#f8f3e6\"><font face=\"sans-serif\">";
const PICTURE_FOOTER: &str = "</font></div>";
const ELLIPSIS_ROW: &str = "<br />    …………    <br /><br />";
const INSERT_STYLE: &str = "color:blue;";

/// Builds the self-contained HTML page that gets rendered into the post
/// picture: a heading plus every diff line with its `+`/`- ` prefix, and
/// an ellipsis row for each elided stretch. Styled lines keep their full
/// markup so the picture shows the wiki's own coloring.
pub fn build_picture_html(page_name: &str, page_html: &str) -> String {
    let document = Html::parse_document(page_html);
    let mut out = String::from(PICTURE_HEADER);
    out.push_str(&format!("<h3>「{page_name}」的最新版变更点</h3>"));

    let container = Selector::parse("pre.diff")
        .ok()
        .and_then(|selector| document.select(&selector).next());
    if let Some(container) = container {
        for child in container.children() {
            append_fragment(child, &mut out);
        }
    }

    out.push_str(PICTURE_FOOTER);
    out
}

fn append_fragment(node: NodeRef<'_, Node>, out: &mut String) {
    match node.value() {
        Node::Text(text) => {
            if text.trim().chars().count() > 2 {
                out.push_str(ELLIPSIS_ROW);
            }
        }
        Node::Element(element) => {
            let Some(style) = element.attr("style") else {
                return;
            };
            let prefix = if style == INSERT_STYLE { "+" } else { "- " };
            out.push_str(prefix);
            if let Some(element_ref) = ElementRef::wrap(node) {
                out.push_str(&element_ref.html());
            }
            out.push_str("<br />");
        }
        _ => {}
    }
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to run renderer: {0}")]
    Io(#[from] std::io::Error),
    #[error("renderer exited with {status}: {stderr}")]
    Failed {
        status: std::process::ExitStatus,
        stderr: String,
    },
}

/// Turns caption HTML into a picture file on disk.
#[async_trait]
pub trait CaptionRenderer: Send + Sync {
    async fn render(&self, html: &str, output: &Path) -> Result<(), RenderError>;
}

/// Renderer shelling out to the `wkhtmltoimage` binary, feeding the HTML
/// through stdin.
pub struct WkhtmltoimageRenderer {
    binary: PathBuf,
}

impl WkhtmltoimageRenderer {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl Default for WkhtmltoimageRenderer {
    fn default() -> Self {
        Self::new("wkhtmltoimage")
    }
}

#[async_trait]
impl CaptionRenderer for WkhtmltoimageRenderer {
    async fn render(&self, html: &str, output: &Path) -> Result<(), RenderError> {
        let mut child = Command::new(&self.binary)
            .arg("--quiet")
            .arg("-")
            .arg(output)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(html.as_bytes()).await?;
        }

        let result = child.wait_with_output().await?;
        if !result.status.success() {
            return Err(RenderError::Failed {
                status: result.status,
                stderr: String::from_utf8_lossy(&result.stderr).into_owned(),
            });
        }
        Ok(())
    }
}
