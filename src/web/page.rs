//! Server-rendered HTML for the upload form.

use crate::domain::model::{Batch, DatasetInfo};
use std::fmt::Write;
use uuid::Uuid;

pub const MISSING_INPUTS_MESSAGE: &str = "Please provide all required inputs to proceed with the upload.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Info(String),
    Success(String),
    Error(String),
}

/// Everything one render of the page needs.
#[derive(Debug, Default)]
pub struct PageView<'a> {
    pub database_url: &'a str,
    pub root_node: &'a str,
    pub preview: Option<PreviewView<'a>>,
    pub notice: Option<Notice>,
    pub uploaded_at: Option<String>,
}

#[derive(Debug)]
pub struct PreviewView<'a> {
    pub batch_id: Uuid,
    pub file_name: &'a str,
    pub batch: &'a Batch,
    pub info: DatasetInfo,
    pub rows: usize,
}

pub fn escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

pub fn render(view: &PageView<'_>) -> String {
    let mut body = String::new();

    let replaces = view
        .preview
        .as_ref()
        .map(|p| format!(r#"<input type="hidden" name="replaces" value="{}" />"#, p.batch_id))
        .unwrap_or_default();

    let _ = write!(
        body,
        r#"<form class="card" method="post" action="/preview" enctype="multipart/form-data">
    <label for="file">Choose a CSV file</label>
    <input id="file" name="file" type="file" accept=".csv,text/csv" required />
    <label for="root_node">Firebase Root Node</label>
    <input id="root_node" name="root_node" type="text" value="{root_node}"
           placeholder="Enter the path where data should be stored (e.g., 'data/csv_uploads')" required />
    <small>This is the location in your Firebase Realtime Database where the data will be stored.</small>
    {replaces}
    <button type="submit">Preview</button>
  </form>
"#,
        root_node = escape(view.root_node),
        replaces = replaces,
    );

    if let Some(preview) = &view.preview {
        render_preview(&mut body, preview, view.root_node);
    }

    if let Some(notice) = &view.notice {
        let (class, text) = match notice {
            Notice::Info(text) => ("info", text),
            Notice::Success(text) => ("success", text),
            Notice::Error(text) => ("error", text),
        };
        let _ = writeln!(body, r#"  <div class="notice {}">{}</div>"#, class, escape(text));
    }

    if let Some(at) = &view.uploaded_at {
        let _ = writeln!(body, "  <p>Uploaded at: {}</p>", escape(at));
    }

    if view.preview.is_none() {
        body.push_str(HELP);
    }

    format!(
        r#"<!doctype html>
<html lang="en">
<head>
  <meta charset="utf-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1" />
  <title>Firebase CSV Uploader</title>
  <style>{style}</style>
</head>
<body>
  <aside>
    <h2>Firebase Configuration</h2>
    <p>Database URL</p>
    <code>{database_url}</code>
  </aside>
  <main>
  <h1>Firebase CSV Uploader</h1>
  <p>Upload your CSV file and configure where to store it in Firebase.</p>
  {body}
  <hr />
  <footer>Made with Rust and Firebase</footer>
  </main>
  <script>{script}</script>
</body>
</html>
"#,
        style = STYLE,
        database_url = escape(view.database_url),
        body = body,
        script = SCRIPT,
    )
}

fn render_preview(out: &mut String, preview: &PreviewView<'_>, root_node: &str) {
    let _ = writeln!(out, "  <h2>Data Preview</h2>");
    let _ = writeln!(out, "  <p class=\"file\">{}</p>", escape(preview.file_name));
    out.push_str("  <table>\n    <thead><tr><th></th>");
    for column in preview.batch.columns() {
        let _ = write!(out, "<th>{}</th>", escape(column));
    }
    out.push_str("</tr></thead>\n    <tbody>\n");
    for (index, record) in preview.batch.head(preview.rows).enumerate() {
        let _ = write!(out, "      <tr><th>{}</th>", index);
        for cell in record.cells() {
            let _ = write!(out, "<td>{}</td>", escape(&cell.to_string()));
        }
        out.push_str("</tr>\n");
    }
    out.push_str("    </tbody>\n  </table>\n");

    let _ = write!(
        out,
        r#"  <h2>Dataset Information</h2>
  <div class="metrics">
    <div class="metric"><span>Rows</span><strong>{rows}</strong></div>
    <div class="metric"><span>Columns</span><strong>{columns}</strong></div>
    <div class="metric"><span>Size (KB)</span><strong>{size_kb}</strong></div>
  </div>
  <form id="upload-form" class="card" method="post" action="/upload">
    <input type="hidden" name="batch_id" value="{batch_id}" />
    <label for="upload_root_node">Firebase Root Node</label>
    <input id="upload_root_node" name="root_node" type="text" value="{root_node}" required />
    <button id="upload-button" type="submit" class="primary">Upload to Firebase</button>
    <span id="spinner" hidden>Uploading to Firebase...</span>
  </form>
"#,
        rows = preview.info.rows,
        columns = preview.info.columns,
        size_kb = preview.info.size_kb(),
        batch_id = preview.batch_id,
        root_node = escape(root_node),
    );
}

const STYLE: &str = r#"
    body { font-family: sans-serif; margin: 0; display: flex; color: #262730; }
    aside { width: 16rem; padding: 1.5rem; background: #f0f2f6; min-height: 100vh; }
    main { flex: 1; padding: 2rem; max-width: 60rem; }
    label { display: block; margin-top: 0.75rem; font-weight: 600; }
    input[type=text] { width: 100%; padding: 0.5rem; }
    button { margin-top: 1rem; padding: 0.5rem 1rem; }
    button.primary { background: #ff4b4b; color: white; border: none; border-radius: 4px; }
    button:disabled { opacity: 0.5; }
    table { border-collapse: collapse; margin: 1rem 0; }
    th, td { border: 1px solid #ddd; padding: 0.25rem 0.5rem; text-align: left; }
    .metrics { display: flex; gap: 2rem; }
    .metric span { display: block; font-size: 0.85rem; }
    .metric strong { font-size: 1.8rem; }
    .notice { padding: 0.75rem 1rem; border-radius: 4px; margin: 1rem 0; }
    .notice.info { background: #e8f0fe; }
    .notice.success { background: #e6f4ea; }
    .notice.error { background: #fce8e6; }
"#;

// Keeps the upload button disabled while the root node is blank.
const SCRIPT: &str = r#"
    const form = document.getElementById('upload-form');
    if (form) {
      const input = document.getElementById('upload_root_node');
      const button = document.getElementById('upload-button');
      const sync = () => { button.disabled = input.value.trim() === ''; };
      input.addEventListener('input', sync);
      sync();
      form.addEventListener('submit', () => {
        button.disabled = true;
        document.getElementById('spinner').hidden = false;
      });
    }
"#;

const HELP: &str = r#"
  <details>
    <summary>Need Help?</summary>
    <h3>How to use this app:</h3>
    <ol>
      <li><strong>Upload Data</strong>: choose your CSV file and specify the root node (database path) where data should be stored.</li>
      <li><strong>Review &amp; Upload</strong>: preview your data, then click 'Upload to Firebase' when ready.</li>
    </ol>
    <h3>Getting Firebase Credentials:</h3>
    <ol>
      <li>Go to Firebase Console</li>
      <li>Select your project</li>
      <li>Go to Project Settings &gt; Service Accounts</li>
      <li>Generate new private key (JSON file) and point <code>store.credentials_path</code> or <code>GOOGLE_APPLICATION_CREDENTIALS</code> at it</li>
    </ol>
  </details>
"#;
